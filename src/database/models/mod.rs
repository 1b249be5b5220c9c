pub mod case;
pub mod lookup;

pub use case::{Case, CaseUpdate, NewCase};
pub use lookup::LookupRecord;
