use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use super::permission::PermissionChecker;
use super::principal::Principal;
use super::registry::AuthRequirement;
use super::scope::{RegionPolicy, RegionScope};
use super::section::{Action, Section};
use super::store::AccessStore;
use super::{AccessContext, AccessError, AuthzFailure, Rejection};

/// Named authorization rule over section/action grants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Policy {
    Require(Section, Action),
    AnyOf(Vec<Policy>),
    AllOf(Vec<Policy>),
}

impl Policy {
    fn leaves(&self, out: &mut BTreeSet<(Section, Action)>) {
        match self {
            Policy::Require(section, action) => {
                out.insert((*section, *action));
            }
            Policy::AnyOf(parts) | Policy::AllOf(parts) => parts.iter().for_each(|p| p.leaves(out)),
        }
    }

    fn holds(&self, granted: &HashMap<(Section, Action), bool>) -> bool {
        match self {
            Policy::Require(section, action) => granted.get(&(*section, *action)).copied().unwrap_or(false),
            Policy::AnyOf(parts) => parts.iter().any(|p| p.holds(granted)),
            // An empty AllOf would vacuously allow; treat it as deny.
            Policy::AllOf(parts) => !parts.is_empty() && parts.iter().all(|p| p.holds(granted)),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PolicyRegistry {
    policies: HashMap<String, Policy>,
}

impl PolicyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `"<Section>.<Action>"` for every section and action.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        for section in Section::ALL {
            for action in [Action::View, Action::Create, Action::Edit, Action::Delete] {
                registry.register(Self::name_for(section, action), Policy::Require(section, action));
            }
        }
        registry
    }

    pub fn name_for(section: Section, action: Action) -> String {
        format!("{}.{}", section, action)
    }

    pub fn register(&mut self, name: impl Into<String>, policy: Policy) -> &mut Self {
        self.policies.insert(name.into(), policy);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Policy> {
        self.policies.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.policies.contains_key(name)
    }
}

/// Why a request was refused. Logged, never returned to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    NotAuthenticated,
    RegionMembershipLost,
    RegionNotPermitted,
    RoleMissing,
    NoRegionSelected,
    UnknownPolicy,
    PolicyDenied,
}

impl DenyReason {
    pub fn rejection(self) -> Rejection {
        match self {
            DenyReason::NotAuthenticated => Rejection::Unauthorized,
            _ => Rejection::Forbidden,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthzState {
    Start,
    CredentialChecked,
    RegionRoleChecked,
    PolicyChecked,
    Allowed,
    Rejected(DenyReason),
}

/// Linear authorization state machine run once per request before the handler.
#[derive(Clone)]
pub struct AuthorizationStage {
    checker: PermissionChecker,
    store: Arc<dyn AccessStore>,
    policies: Arc<PolicyRegistry>,
    region_policy: RegionPolicy,
    audit: bool,
}

impl AuthorizationStage {
    pub fn new(
        store: Arc<dyn AccessStore>,
        policies: Arc<PolicyRegistry>,
        region_policy: RegionPolicy,
    ) -> Self {
        Self {
            checker: PermissionChecker::new(store.clone()),
            store,
            policies,
            region_policy,
            audit: false,
        }
    }

    /// Log rejections at `warn` instead of `debug`.
    pub fn with_audit_logging(mut self, audit: bool) -> Self {
        self.audit = audit;
        self
    }

    pub fn checker(&self) -> &PermissionChecker {
        &self.checker
    }

    pub fn policies(&self) -> &PolicyRegistry {
        &self.policies
    }

    pub fn region_policy(&self) -> RegionPolicy {
        self.region_policy
    }

    /// Runs the state machine and, when allowed, yields the context for handlers.
    pub async fn authorize(
        &self,
        operation: &str,
        principal: &Principal,
        requirement: &AuthRequirement,
    ) -> Result<AccessContext, AuthzFailure> {
        let mut state = AuthzState::Start;
        let mut scope = RegionScope::empty(self.region_policy);

        loop {
            state = match state {
                AuthzState::Start => Self::check_credential(principal, requirement),
                AuthzState::CredentialChecked => {
                    scope = self.load_scope(principal).await?;
                    Self::check_region_role(principal, requirement, &scope)
                }
                AuthzState::RegionRoleChecked => self.check_policy(principal, requirement).await?,
                AuthzState::PolicyChecked => AuthzState::Allowed,
                AuthzState::Allowed => {
                    tracing::debug!(
                        operation,
                        user_id = ?principal.user_id,
                        region_id = ?principal.region_id,
                        "Authorization allowed"
                    );
                    return Ok(AccessContext {
                        principal: principal.clone(),
                        scope,
                        operation: operation.to_string(),
                    });
                }
                AuthzState::Rejected(reason) => {
                    self.log_rejection(operation, principal, reason);
                    return Err(AuthzFailure::Rejected(reason.rejection()));
                }
            };
        }
    }

    /// The principal's active memberships as a scope.
    pub async fn load_scope(&self, principal: &Principal) -> Result<RegionScope, AccessError> {
        match principal.user_id {
            Some(user_id) if principal.is_authenticated => {
                let regions = self.store.accessible_regions(user_id).await?;
                Ok(RegionScope::new(regions, self.region_policy))
            }
            _ => Ok(RegionScope::empty(self.region_policy)),
        }
    }

    fn check_credential(principal: &Principal, requirement: &AuthRequirement) -> AuthzState {
        if !requirement.requires_auth {
            AuthzState::Allowed
        } else if !principal.is_authenticated {
            AuthzState::Rejected(DenyReason::NotAuthenticated)
        } else {
            AuthzState::CredentialChecked
        }
    }

    fn check_region_role(principal: &Principal, requirement: &AuthRequirement, scope: &RegionScope) -> AuthzState {
        if let Some(region_id) = principal.region_id {
            if !scope.contains_region(region_id) {
                return AuthzState::Rejected(DenyReason::RegionMembershipLost);
            }
        }

        if let Some(regions) = &requirement.regions {
            match principal.region_id {
                Some(region_id) if regions.contains(&region_id) => {}
                _ => return AuthzState::Rejected(DenyReason::RegionNotPermitted),
            }
        }

        if let Some(roles) = &requirement.roles {
            if !principal.has_any_role(roles) {
                return AuthzState::Rejected(DenyReason::RoleMissing);
            }
        }

        AuthzState::RegionRoleChecked
    }

    async fn check_policy(&self, principal: &Principal, requirement: &AuthRequirement) -> Result<AuthzState, AccessError> {
        let Some(name) = requirement.policy.as_deref() else {
            return Ok(AuthzState::PolicyChecked);
        };

        let Some(policy) = self.policies.get(name) else {
            tracing::error!("Operation requires undefined policy '{}'", name);
            return Ok(AuthzState::Rejected(DenyReason::UnknownPolicy));
        };

        if principal.region_id.is_none() {
            return Ok(AuthzState::Rejected(DenyReason::NoRegionSelected));
        }

        let mut leaves = BTreeSet::new();
        policy.leaves(&mut leaves);

        let mut granted = HashMap::with_capacity(leaves.len());
        for (section, action) in leaves {
            let allowed = self.checker.check_access(principal, section, action).await?;
            granted.insert((section, action), allowed);
        }

        Ok(if policy.holds(&granted) {
            AuthzState::PolicyChecked
        } else {
            AuthzState::Rejected(DenyReason::PolicyDenied)
        })
    }

    fn log_rejection(&self, operation: &str, principal: &Principal, reason: DenyReason) {
        if self.audit {
            tracing::warn!(
                operation,
                user_id = ?principal.user_id,
                region_id = ?principal.region_id,
                ?reason,
                "Authorization rejected"
            );
        } else {
            tracing::debug!(
                operation,
                user_id = ?principal.user_id,
                region_id = ?principal.region_id,
                ?reason,
                "Authorization rejected"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::memory::MemoryAccessStore;
    use uuid::Uuid;

    struct Fixture {
        stage: AuthorizationStage,
        store: Arc<MemoryAccessStore>,
        user: Uuid,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(MemoryAccessStore::new());
        store.add_region(5, "North", "north.test", true).await;
        store.add_region(7, "South", "south.test", true).await;
        store.add_role("Lawyer").await;
        let user = store.add_user("ana", "pw").await.unwrap();
        store.add_membership(user, 5).await;
        store.add_membership(user, 7).await;
        store.grant("Lawyer", 5, Section::CaseManagement, [Action::View]).await;

        let mut policies = PolicyRegistry::standard();
        policies.register(
            "Cases.Manage",
            Policy::AllOf(vec![
                Policy::Require(Section::CaseManagement, Action::View),
                Policy::Require(Section::CaseManagement, Action::Edit),
            ]),
        );
        policies.register(
            "Cases.ViewOrJudges",
            Policy::AnyOf(vec![
                Policy::Require(Section::Judges, Action::View),
                Policy::Require(Section::CaseManagement, Action::View),
            ]),
        );

        let stage = AuthorizationStage::new(store.clone(), Arc::new(policies), RegionPolicy::MembersOnly);
        Fixture { stage, store, user }
    }

    fn principal(user: Uuid, region_id: Option<i32>, roles: &[&str]) -> Principal {
        Principal {
            user_id: Some(user),
            is_authenticated: true,
            region_id,
            roles: roles.iter().map(|r| r.to_string()).collect(),
        }
    }

    fn rejection(result: Result<AccessContext, AuthzFailure>) -> Option<Rejection> {
        match result {
            Err(AuthzFailure::Rejected(r)) => Some(r),
            _ => None,
        }
    }

    #[tokio::test]
    async fn public_operations_skip_every_check() {
        let f = fixture().await;
        let ctx = f
            .stage
            .authorize("public", &Principal::unauthenticated(), &AuthRequirement::public())
            .await
            .unwrap();
        assert!(ctx.scope.is_empty());
    }

    #[tokio::test]
    async fn unauthenticated_principal_is_unauthorized() {
        let f = fixture().await;
        let result = f
            .stage
            .authorize("cases.list", &Principal::unauthenticated(), &AuthRequirement::authenticated())
            .await;
        assert_eq!(rejection(result), Some(Rejection::Unauthorized));
    }

    #[tokio::test]
    async fn allowed_context_carries_memberships() {
        let f = fixture().await;
        let p = principal(f.user, Some(5), &["Lawyer"]);
        let req = AuthRequirement::authenticated().with_policy("CaseManagement.View");
        let ctx = f.stage.authorize("cases.list", &p, &req).await.unwrap();
        assert_eq!(ctx.scope.regions().iter().copied().collect::<Vec<_>>(), vec![5, 7]);
        assert_eq!(ctx.operation, "cases.list");
    }

    #[tokio::test]
    async fn region_requirement_is_enforced() {
        let f = fixture().await;
        let p = principal(f.user, Some(7), &["Lawyer"]);
        let req = AuthRequirement::authenticated().in_regions([5]);
        assert_eq!(rejection(f.stage.authorize("op", &p, &req).await), Some(Rejection::Forbidden));

        let p = principal(f.user, Some(5), &["Lawyer"]);
        assert!(f.stage.authorize("op", &p, &req).await.is_ok());

        let p = principal(f.user, None, &["Lawyer"]);
        assert_eq!(rejection(f.stage.authorize("op", &p, &req).await), Some(Rejection::Forbidden));
    }

    #[tokio::test]
    async fn any_listed_role_satisfies_role_requirement() {
        let f = fixture().await;
        let req = AuthRequirement::authenticated().with_roles("Admin,Lawyer");
        let p = principal(f.user, Some(5), &["Lawyer"]);
        assert!(f.stage.authorize("op", &p, &req).await.is_ok());

        let p = principal(f.user, Some(5), &["Clerk"]);
        assert_eq!(rejection(f.stage.authorize("op", &p, &req).await), Some(Rejection::Forbidden));
    }

    #[tokio::test]
    async fn policy_follows_current_region() {
        let f = fixture().await;
        let req = AuthRequirement::authenticated().with_policy("CaseManagement.View");

        let in_5 = principal(f.user, Some(5), &["Lawyer"]);
        assert!(f.stage.authorize("op", &in_5, &req).await.is_ok());

        let in_7 = principal(f.user, Some(7), &["Lawyer"]);
        assert_eq!(rejection(f.stage.authorize("op", &in_7, &req).await), Some(Rejection::Forbidden));

        let no_region = principal(f.user, None, &["Lawyer"]);
        assert_eq!(rejection(f.stage.authorize("op", &no_region, &req).await), Some(Rejection::Forbidden));
    }

    #[tokio::test]
    async fn composite_policies() {
        let f = fixture().await;
        let p = principal(f.user, Some(5), &["Lawyer"]);

        let all = AuthRequirement::authenticated().with_policy("Cases.Manage");
        assert_eq!(rejection(f.stage.authorize("op", &p, &all).await), Some(Rejection::Forbidden));

        f.store.grant("Lawyer", 5, Section::CaseManagement, [Action::View, Action::Edit]).await;
        assert!(f.stage.authorize("op", &p, &all).await.is_ok());

        let any = AuthRequirement::authenticated().with_policy("Cases.ViewOrJudges");
        assert!(f.stage.authorize("op", &p, &any).await.is_ok());
    }

    #[tokio::test]
    async fn undefined_policy_fails_closed() {
        let f = fixture().await;
        let p = principal(f.user, Some(5), &["Lawyer"]);
        let req = AuthRequirement::authenticated().with_policy("Nope.Nothing");
        assert_eq!(rejection(f.stage.authorize("op", &p, &req).await), Some(Rejection::Forbidden));
    }

    #[tokio::test]
    async fn lost_membership_is_forbidden() {
        let f = fixture().await;
        f.store.remove_membership(f.user, 5).await;
        let p = principal(f.user, Some(5), &["Lawyer"]);
        let result = f.stage.authorize("op", &p, &AuthRequirement::authenticated()).await;
        assert_eq!(rejection(result), Some(Rejection::Forbidden));
    }

    #[tokio::test]
    async fn store_failure_is_internal_not_allow() {
        let f = fixture().await;
        f.store.set_unavailable(true).await;
        let p = principal(f.user, Some(5), &["Lawyer"]);
        let req = AuthRequirement::authenticated().with_policy("CaseManagement.View");
        assert!(matches!(f.stage.authorize("op", &p, &req).await, Err(AuthzFailure::Internal(_))));
    }

    #[test]
    fn empty_all_of_denies() {
        assert!(!Policy::AllOf(vec![]).holds(&HashMap::new()));
        assert!(!Policy::AnyOf(vec![]).holds(&HashMap::new()));
    }
}
