pub mod error;
pub mod filter;
pub mod filter_order;
pub mod predicate;
pub mod types;

pub use error::FilterError;
pub use filter::Filter;
pub use predicate::Predicate;
pub use types::*;

/// Identifiers are interpolated into SQL, so only `[A-Za-z_][A-Za-z0-9_]*` passes.
pub(crate) fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
