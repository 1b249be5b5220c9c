// Handler tiers:
// Public (no credential) → Protected (credential plus per-operation guard)
pub mod protected;
pub mod public;
