use std::fmt;

use url::Url;

use crate::error::{RegistryError, Result};

/// Host that bare channel names resolve against.
pub const DEFAULT_CHANNEL_ALIAS: &str = "https://conda.anaconda.org";

/// An upstream channel, identified by its base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    name: String,
    base_url: String,
}

impl Channel {
    /// Accepts a channel name (`conda-forge`) or a full URL. Trailing slashes are ignored.
    pub fn parse(value: &str) -> Result<Self> {
        let value = value.trim().trim_end_matches('/');
        if value.is_empty() {
            return Err(RegistryError::InvalidChannel(value.to_string()));
        }

        let base_url = if value.contains("://") {
            value.to_string()
        } else {
            format!("{DEFAULT_CHANNEL_ALIAS}/{value}")
        };
        Url::parse(&base_url).map_err(|err| RegistryError::InvalidUrl(format!("{base_url}: {err}")))?;

        let name = base_url
            .rsplit('/')
            .next()
            .filter(|segment| !segment.is_empty())
            .unwrap_or(value)
            .to_string();

        Ok(Self {
            name,
            base_url,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn platform_url(&self, platform: &str) -> String {
        format!("{}/{}", self.base_url, platform)
    }

    pub fn repodata_url(&self, platform: &str) -> String {
        format!("{}/{}/repodata.json", self.base_url, platform)
    }

    pub fn package_url(&self, platform: &str, filename: &str) -> String {
        format!("{}/{}/{}", self.base_url, platform, filename)
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.base_url)
    }
}
