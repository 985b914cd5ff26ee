pub mod context;
pub mod progress;
pub mod types;
pub mod utils;

pub mod clone;
pub mod list;
pub mod validate;

pub use context::MirrorContext;
pub use types::*;
