pub mod cases;
pub mod chat;
pub mod lookups;
pub mod permissions;
pub mod regions;
pub mod session;
