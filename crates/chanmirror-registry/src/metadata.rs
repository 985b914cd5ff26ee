//! Fetching per-platform repodata from an upstream channel.

use chanmirror_core::{
    constants::BZIP2_MAGIC_BYTES,
    package::PlatformPackages,
    repodata::{decompress_bz2, RepodataDocument},
};
use chanmirror_dl::transport::Transport;
use chanmirror_utils::path::is_single_component;
use tracing::{debug, warn};

use crate::{
    channel::Channel,
    error::{RegistryError, Result},
};

/// Fetches `<channel>/<platform>/repodata.json` and returns its mirrorable records.
///
/// # Errors
///
/// Returns [`RegistryError`] if the request fails or the body is not repodata.
pub fn fetch_repodata(
    channel: &Channel,
    platform: &str,
    transport: &dyn Transport,
) -> Result<PlatformPackages> {
    let url = channel.repodata_url(platform);
    debug!("Fetching repodata from {}", url);

    let content = transport.get_bytes(&url)?;
    process_repodata_content(content, channel, platform)
}

/// Parses a repodata body, plain or bzip2-compressed.
///
/// Every record gets its `fn`, `subdir` and `url` filled in; the map key is taken as the
/// file name. Keys that are not a plain file name are dropped, as are records without a
/// positive size or a SHA-256 digest, which cannot be verified after download.
pub fn process_repodata_content(
    content: Vec<u8>,
    channel: &Channel,
    platform: &str,
) -> Result<PlatformPackages> {
    let origin = channel.repodata_url(platform);
    if content.len() < BZIP2_MAGIC_BYTES.len() {
        return Err(RegistryError::MetadataTooShort(origin));
    }

    let content = if content.starts_with(&BZIP2_MAGIC_BYTES) {
        decompress_bz2(&content)?
    } else {
        content
    };

    let document = RepodataDocument::from_slice(&content, &origin, Some(platform))?;

    let total = document.packages.len();
    let mut packages = PlatformPackages::new();
    for (filename, mut record) in document.packages {
        if !is_single_component(&filename) {
            warn!("Skipping {:?} in {}: not a plain file name", filename, origin);
            continue;
        }
        if record.filename != filename {
            debug!("{} declares fn {}, using the key", filename, record.filename);
            record.filename = filename.clone();
        }
        if record.platform != platform {
            debug!(
                "{} declares subdir {}, using {}",
                filename, record.platform, platform
            );
            record.platform = platform.to_string();
        }
        if record.url.is_empty() {
            record.url = channel.package_url(platform, &filename);
        }
        if !record.is_mirrorable() {
            debug!("Skipping {}: missing size or sha256", filename);
            continue;
        }
        packages.insert(filename, record);
    }

    debug!(
        "{}: {} of {} records usable",
        origin,
        packages.len(),
        total
    );
    Ok(packages)
}
