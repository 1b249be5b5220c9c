use std::collections::HashMap;
use std::sync::Arc;

use super::case_gate::ScopedTable;

/// Declarative authorization requirement attached to an operation at registration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthRequirement {
    pub requires_auth: bool,
    /// The principal's current region must be one of these.
    pub regions: Option<Vec<i32>>,
    /// Alternatives; holding any one is enough.
    pub roles: Option<Vec<String>>,
    /// Name of a policy in the [`super::PolicyRegistry`].
    pub policy: Option<String>,
}

impl AuthRequirement {
    pub fn public() -> Self {
        Self::default()
    }

    pub fn authenticated() -> Self {
        Self { requires_auth: true, ..Self::default() }
    }

    pub fn in_regions(mut self, regions: impl IntoIterator<Item = i32>) -> Self {
        self.regions = Some(regions.into_iter().collect());
        self
    }

    /// Accepts the comma-separated alternatives form, e.g. `"Admin, Manager"`.
    pub fn with_roles(mut self, roles: &str) -> Self {
        let parsed: Vec<String> = roles
            .split(',')
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(str::to_string)
            .collect();
        self.roles = if parsed.is_empty() { None } else { Some(parsed) };
        self
    }

    pub fn with_policy(mut self, policy: impl Into<String>) -> Self {
        self.policy = Some(policy.into());
        self
    }
}

/// Marks an operation as addressing one region-scoped record by id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseAddressing {
    /// Path parameter holding the record id.
    pub id_field: String,
    pub table: ScopedTable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationSpec {
    pub name: String,
    pub requirement: AuthRequirement,
    pub case_addressing: Option<CaseAddressing>,
}

impl OperationSpec {
    pub fn new(name: impl Into<String>, requirement: AuthRequirement) -> Self {
        Self { name: name.into(), requirement, case_addressing: None }
    }

    pub fn addressing(mut self, table: ScopedTable, id_field: impl Into<String>) -> Self {
        self.case_addressing = Some(CaseAddressing { id_field: id_field.into(), table });
        self
    }
}

/// Capability lookup the pipeline uses to find an operation's declaration.
pub trait RequirementLookup: Send + Sync {
    fn lookup(&self, operation: &str) -> Option<Arc<OperationSpec>>;
}

#[derive(Debug, Default)]
pub struct OperationRegistry {
    operations: HashMap<String, Arc<OperationSpec>>,
}

impl OperationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, spec: OperationSpec) -> &mut Self {
        if self.operations.contains_key(&spec.name) {
            tracing::warn!("Operation '{}' registered twice; keeping the latest declaration", spec.name);
        }
        tracing::debug!("Registered operation '{}'", spec.name);
        self.operations.insert(spec.name.clone(), Arc::new(spec));
        self
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &OperationSpec> {
        self.operations.values().map(|spec| spec.as_ref())
    }
}

impl RequirementLookup for OperationRegistry {
    fn lookup(&self, operation: &str) -> Option<Arc<OperationSpec>> {
        self.operations.get(operation).cloned()
    }
}
