use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::str::FromStr;

use crate::filter::{Filter, FilterError, Predicate};

/// Region id conventionally marking a global/system record.
pub const GLOBAL_REGION: i32 = 0;

/// How records without an owning region are treated.
///
/// One policy is configured per deployment and every visibility decision
/// (collection filters, id lookups, mutations) goes through [`RegionScope`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionPolicy {
    /// Only records whose region is one of the principal's regions.
    MembersOnly,
    /// Additionally records with a null or `0` region.
    MembersAndGlobal,
}

impl FromStr for RegionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "members_only" | "members-only" | "strict" => Ok(RegionPolicy::MembersOnly),
            "members_and_global" | "members-and-global" | "global" => Ok(RegionPolicy::MembersAndGlobal),
            other => Err(format!("unknown region policy '{}'", other)),
        }
    }
}

/// Anything carrying a nullable owning region.
pub trait RegionScoped {
    fn region_id(&self) -> Option<i32>;
}

/// The set of regions a principal may touch, paired with the visibility policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegionScope {
    regions: BTreeSet<i32>,
    policy: RegionPolicy,
}

impl RegionScope {
    pub fn new(regions: impl IntoIterator<Item = i32>, policy: RegionPolicy) -> Self {
        Self {
            // `0` is the global marker, never a membership.
            regions: regions.into_iter().filter(|id| *id != GLOBAL_REGION).collect(),
            policy,
        }
    }

    pub fn empty(policy: RegionPolicy) -> Self {
        Self::new(std::iter::empty(), policy)
    }

    pub fn regions(&self) -> &BTreeSet<i32> {
        &self.regions
    }

    pub fn policy(&self) -> RegionPolicy {
        self.policy
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn contains_region(&self, region_id: i32) -> bool {
        self.regions.contains(&region_id)
    }

    /// Whether a record owned by `region_id` is visible.
    pub fn admits(&self, region_id: Option<i32>) -> bool {
        if self.regions.is_empty() {
            return false;
        }
        match (self.policy, region_id) {
            (RegionPolicy::MembersAndGlobal, None) | (RegionPolicy::MembersAndGlobal, Some(GLOBAL_REGION)) => true,
            (_, Some(id)) => self.regions.contains(&id),
            (RegionPolicy::MembersOnly, None) => false,
        }
    }

    /// SQL predicate equivalent to [`RegionScope::admits`] over `column`.
    pub fn predicate(&self, column: &str) -> Predicate {
        if self.regions.is_empty() {
            return Predicate::False;
        }
        match self.policy {
            RegionPolicy::MembersOnly => Predicate::is_not_null(column)
                .and(Predicate::in_list(column, self.regions.iter().copied())),
            RegionPolicy::MembersAndGlobal => Predicate::is_null(column).or(Predicate::in_list(
                column,
                std::iter::once(GLOBAL_REGION).chain(self.regions.iter().copied()),
            )),
        }
    }
}

/// Narrows `filter` to rows admitted by `scope`.
pub fn filter_by_access<'f>(
    filter: &'f mut Filter,
    scope: &RegionScope,
) -> Result<&'f mut Filter, FilterError> {
    filter.restrict(scope.predicate("region_id"))
}

/// In-memory counterpart of [`filter_by_access`].
pub fn retain_accessible<T, I>(records: I, scope: &RegionScope) -> Vec<T>
where
    T: RegionScoped,
    I: IntoIterator<Item = T>,
{
    records.into_iter().filter(|r| scope.admits(r.region_id())).collect()
}
