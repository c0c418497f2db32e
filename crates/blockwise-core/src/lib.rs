pub mod authoring;
pub mod compile;
pub mod config;
pub mod editor;
pub mod lesson;
pub mod notify;
pub mod session;
pub mod storage_paths;

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8084";

pub use authoring::*;
pub use compile::*;
pub use config::*;
pub use editor::*;
pub use lesson::*;
pub use notify::*;
pub use session::*;
pub use storage_paths::*;
