//! Region-scoped authorization: who the caller is, which regions they may
//! touch, and whether a declared operation may run for them.
//!
//! Request flow: [`principal::PrincipalResolver`] turns a credential into a
//! [`Principal`], [`pipeline::AuthorizationStage`] walks the declared
//! [`registry::AuthRequirement`] and yields an [`AccessContext`], handlers
//! then narrow collection reads with [`scope::filter_by_access`] and guard
//! id-addressed records with [`case_gate::CaseAccessGate`].

pub mod case_gate;
pub mod permission;
pub mod pipeline;
pub mod principal;
pub mod registry;
pub mod scope;
pub mod section;
pub mod store;

use serde::Serialize;
use thiserror::Error;

use crate::database::DatabaseError;

pub use case_gate::{CaseAccessGate, OwningRegionLookup, ScopedTable};
pub use permission::PermissionChecker;
pub use pipeline::{AuthorizationStage, AuthzState, Policy, PolicyRegistry};
pub use principal::{Principal, PrincipalResolver};
pub use registry::{AuthRequirement, CaseAddressing, OperationRegistry, OperationSpec, RequirementLookup};
pub use scope::{filter_by_access, retain_accessible, RegionPolicy, RegionScope, RegionScoped, GLOBAL_REGION};
pub use section::{Action, Section};
pub use store::{AccessStore, PermissionUpdate, Region, RolePermission, UserAccount};

/// Infrastructure failure while making an access decision. Never treated as "allow".
#[derive(Debug, Error)]
pub enum AccessError {
    #[error("access store failure: {0}")]
    Store(String),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// Category of a refused request. Carries no detail on purpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Rejection {
    Unauthorized,
    Forbidden,
    NotFound,
}

#[derive(Debug, Error)]
pub enum AuthzFailure {
    #[error("request rejected: {0:?}")]
    Rejected(Rejection),

    #[error(transparent)]
    Internal(#[from] AccessError),
}

impl From<Rejection> for AuthzFailure {
    fn from(rejection: Rejection) -> Self {
        AuthzFailure::Rejected(rejection)
    }
}

/// Resolved authorization context handed to handlers once the pipeline allows a request.
#[derive(Debug, Clone)]
pub struct AccessContext {
    pub principal: Principal,
    pub scope: RegionScope,
    pub operation: String,
}

impl AccessContext {
    /// Region selected by the caller's credential; rejects region-less credentials.
    pub fn require_region(&self) -> Result<i32, Rejection> {
        self.principal.region_id.ok_or(Rejection::Forbidden)
    }
}
