pub mod root;
pub mod session;

pub use root::{health, root};
pub use session::{login, refresh};
