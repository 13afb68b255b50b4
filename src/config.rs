use serde::Deserialize;
use std::path::{Path, PathBuf};
use time::UtcOffset;
use time::macros::format_description;
use url::Url;

pub const DEFAULT_ROLE_CLAIM: &str = "http://schemas.microsoft.com/ws/2008/06/identity/claims/role";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub api_url: Url,
    pub push_url: Url,
    pub credential_file: PathBuf,
    pub role_claim: String,
    pub utc_offset: UtcOffset,
    pub auth_key: Option<String>,
}

impl AppConfig {
    pub fn decoder_options(&self) -> crate::session::DecoderOptions {
        crate::session::DecoderOptions {
            role_claim: self.role_claim.clone(),
            verification_key: self.auth_key.clone(),
        }
    }
}

#[cfg(test)]
impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_url: Url::parse("http://127.0.0.1:5000/").expect("default api url"),
            push_url: Url::parse("ws://127.0.0.1:5000/hubs/notifications").expect("default push url"),
            credential_file: "/tmp/bookhaven-credential".into(),
            role_claim: DEFAULT_ROLE_CLAIM.to_string(),
            utc_offset: UtcOffset::UTC,
            auth_key: None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("{0} is required")]
    Missing(&'static str),
    #[error("invalid {field} '{value}'")]
    Invalid { field: &'static str, value: String },
}

/// Values that may come from the optional TOML file. Command line flags win.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub api_url: Option<String>,
    pub push_url: Option<String>,
    pub credential_file: Option<PathBuf>,
    pub role_claim: Option<String>,
    pub utc_offset: Option<String>,
    pub auth_key: Option<String>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(path, &raw)
    }

    fn parse(path: &Path, raw: &str) -> Result<Self, ConfigError> {
        toml::from_str(raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Fields set on `overrides` replace the ones loaded from the file.
    pub fn merge(self, overrides: FileConfig) -> FileConfig {
        FileConfig {
            api_url: overrides.api_url.or(self.api_url),
            push_url: overrides.push_url.or(self.push_url),
            credential_file: overrides.credential_file.or(self.credential_file),
            role_claim: overrides.role_claim.or(self.role_claim),
            utc_offset: overrides.utc_offset.or(self.utc_offset),
            auth_key: overrides.auth_key.or(self.auth_key),
        }
    }

    pub fn resolve(self, default_credential_file: PathBuf) -> Result<AppConfig, ConfigError> {
        let api_url = self.api_url.ok_or(ConfigError::Missing("api url"))?;
        let api_url = parse_base_url("api url", &api_url)?;

        let push_url = match self.push_url {
            Some(raw) => parse_url("push url", &raw)?,
            None => default_push_url(&api_url)?,
        };
        if !matches!(push_url.scheme(), "ws" | "wss") {
            return Err(ConfigError::Invalid {
                field: "push url",
                value: push_url.to_string(),
            });
        }

        let role_claim = match self.role_claim.as_deref().map(str::trim) {
            Some("") => {
                return Err(ConfigError::Invalid {
                    field: "role claim",
                    value: String::new(),
                });
            }
            Some(claim) => claim.to_string(),
            None => DEFAULT_ROLE_CLAIM.to_string(),
        };

        let utc_offset = match self.utc_offset.as_deref() {
            Some(raw) => parse_utc_offset(raw)?,
            None => UtcOffset::UTC,
        };

        let auth_key = self
            .auth_key
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty());

        Ok(AppConfig {
            api_url,
            push_url,
            credential_file: self.credential_file.unwrap_or(default_credential_file),
            role_claim,
            utc_offset,
            auth_key,
        })
    }
}

fn parse_url(field: &'static str, raw: &str) -> Result<Url, ConfigError> {
    Url::parse(raw.trim()).map_err(|_| ConfigError::Invalid {
        field,
        value: raw.to_string(),
    })
}

/// Relative endpoint joins need a trailing slash on the base.
fn parse_base_url(field: &'static str, raw: &str) -> Result<Url, ConfigError> {
    let mut url = parse_url(field, raw)?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::Invalid {
            field,
            value: raw.to_string(),
        });
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

fn default_push_url(api_url: &Url) -> Result<Url, ConfigError> {
    let mut url = api_url
        .join("hubs/notifications")
        .map_err(|_| ConfigError::Invalid {
            field: "api url",
            value: api_url.to_string(),
        })?;
    let scheme = if url.scheme() == "https" { "wss" } else { "ws" };
    url.set_scheme(scheme).map_err(|_| ConfigError::Invalid {
        field: "api url",
        value: api_url.to_string(),
    })?;
    Ok(url)
}

pub(crate) fn parse_utc_offset(raw: &str) -> Result<UtcOffset, ConfigError> {
    let value = raw.trim();
    if value.eq_ignore_ascii_case("z") || value.eq_ignore_ascii_case("utc") {
        return Ok(UtcOffset::UTC);
    }
    UtcOffset::parse(
        value,
        format_description!("[offset_hour sign:mandatory]:[offset_minute]"),
    )
    .map_err(|_| ConfigError::Invalid {
        field: "utc offset",
        value: value.to_string(),
    })
}
