//! Upstream channel access for chanmirror.
//!
//! This crate fetches per-platform `repodata.json` indexes from a conda channel and
//! provides [`ChannelResolver`], a greedy [`Resolver`](chanmirror_core::resolver::Resolver)
//! over those indexes.
//!
//! # Example
//!
//! ```no_run
//! use chanmirror_core::resolver::Resolver;
//! use chanmirror_dl::transport::HttpTransport;
//! use chanmirror_registry::{Channel, ChannelResolver};
//!
//! fn closure() -> chanmirror_registry::Result<()> {
//!     let channel = Channel::parse("conda-forge")?;
//!     let platforms = vec!["noarch".to_string(), "linux-64".to_string()];
//!     let resolver = ChannelResolver::from_channel(&channel, &platforms, &HttpTransport)?;
//!     let records = resolver.resolve_spec("numpy", &[], false);
//!     println!("{records:?}");
//!     Ok(())
//! }
//! ```

pub mod channel;
pub mod error;
pub mod matchspec;
pub mod metadata;
pub mod solver;
pub mod version;

pub use channel::{Channel, DEFAULT_CHANNEL_ALIAS};
pub use error::{RegistryError, Result};
pub use matchspec::{MatchSpec, VersionSpec};
pub use metadata::{fetch_repodata, process_repodata_content};
pub use solver::ChannelResolver;
pub use version::Version;
