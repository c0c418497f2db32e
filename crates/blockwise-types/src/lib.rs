pub mod auth;
pub mod chapter;
pub mod compile;
pub mod task;

pub use auth::*;
pub use chapter::*;
pub use compile::*;
pub use task::*;
