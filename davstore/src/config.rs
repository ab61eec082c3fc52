use std::fmt;

use serde::Deserialize;

use crate::error::ConfigError;

pub const DEFAULT_PUBLIC_PREFIX: &str = "/content/images";

pub const ENV_SERVER_URL: &str = "WEBDAV_SERVER_URL";
pub const ENV_USERNAME: &str = "WEBDAV_USERNAME";
pub const ENV_PASSWORD: &str = "WEBDAV_PASSWORD";
pub const ENV_ROOT_PREFIX: &str = "WEBDAV_PATH_PREFIX";
pub const ENV_PUBLIC_PREFIX: &str = "WEBDAV_STORAGE_PATH_PREFIX";

/// Adapter configuration as written by the host, before environment fallbacks.
///
/// Precedence is fixed: a non-empty explicit value always wins, the matching
/// `WEBDAV_*` environment variable is consulted only when the explicit value
/// is missing or empty.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DavConfig {
    pub url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    #[serde(alias = "path_prefix")]
    pub root_prefix: Option<String>,
    #[serde(alias = "storage_path_prefix")]
    pub public_prefix: Option<String>,
}

/// Fully resolved, immutable configuration.
#[derive(Clone, PartialEq, Eq)]
pub struct StorageConfig {
    pub url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub root_prefix: String,
    pub public_prefix: String,
}

impl fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageConfig")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("root_prefix", &self.root_prefix)
            .field("public_prefix", &self.public_prefix)
            .finish()
    }
}

impl DavConfig {
    /// Resolve against the process environment.
    pub fn resolve(self) -> Result<StorageConfig, ConfigError> {
        self.resolve_with(|key| std::env::var(key).ok())
    }

    /// Resolve against an arbitrary lookup; `resolve` passes `std::env::var`.
    pub fn resolve_with<F>(self, lookup: F) -> Result<StorageConfig, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let pick = |explicit: Option<String>, key: &str| -> Option<String> {
            non_empty(explicit).or_else(|| non_empty(lookup(key)))
        };

        let url = pick(self.url, ENV_SERVER_URL).ok_or(ConfigError::MissingUrl)?;
        validate_url(&url)?;

        Ok(StorageConfig {
            url,
            username: pick(self.username, ENV_USERNAME),
            password: pick(self.password, ENV_PASSWORD),
            root_prefix: pick(self.root_prefix, ENV_ROOT_PREFIX).unwrap_or_default(),
            public_prefix: pick(self.public_prefix, ENV_PUBLIC_PREFIX)
                .unwrap_or_else(|| DEFAULT_PUBLIC_PREFIX.to_string()),
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn validate_url(url: &str) -> Result<(), ConfigError> {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .ok_or_else(|| ConfigError::InvalidUrl {
            url: url.to_string(),
            reason: "scheme must be http or https".to_string(),
        })?;
    if rest.split('/').next().unwrap_or("").is_empty() {
        return Err(ConfigError::InvalidUrl {
            url: url.to_string(),
            reason: "missing host".to_string(),
        });
    }
    Ok(())
}
