pub mod guard;
pub mod principal;
pub mod response;

pub use guard::{authorize_operation, Guard};
pub use principal::{resolve_principal, tenant_hint};
pub use response::{ApiResponse, ApiResult};
