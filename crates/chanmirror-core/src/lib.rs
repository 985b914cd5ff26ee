use error::MirrorError;

pub mod constants;
pub mod ensure;
pub mod error;
pub mod package;
pub mod repodata;
pub mod resolver;
pub mod state;
pub mod validate;

pub type MirrorResult<T> = std::result::Result<T, MirrorError>;
