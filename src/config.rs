// src/config.rs
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::errors::{ClientError, Result};

pub const DEFAULT_URL_BASE: &str = "https://magic-pod.com";

/// Connection settings shared by every request.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub url_base: String,
    pub api_token: String,
    pub organization: String,
    pub project: String,
    pub http_headers: BTreeMap<String, String>,
}

/// Values taken from command line flags or their `MAGICPOD_*` environment variables.
#[derive(Debug, Clone, Default)]
pub struct ConnectionOptions {
    pub url_base: Option<String>,
    pub token: Option<String>,
    pub organization: Option<String>,
    pub project: Option<String>,
    /// Extra headers as a JSON object string.
    pub http_headers: Option<String>,
}

/// Optional TOML profile, consulted for anything the command line leaves unset.
///
/// ```toml
/// token = "..."
/// organization = "my-org"
/// project = "my-project"
///
/// [http_headers]
/// X-Proxy-Auth = "..."
/// ```
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct FileConfig {
    pub url_base: Option<String>,
    pub token: Option<String>,
    pub organization: Option<String>,
    pub project: Option<String>,
    pub http_headers: BTreeMap<String, String>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// `<config dir>/magicpod-api-client/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("magicpod-api-client").join("config.toml"))
    }

    /// Loads `path` if given, otherwise the default profile when it exists.
    pub fn load_optional(path: Option<&Path>) -> Result<Option<Self>> {
        if let Some(path) = path {
            return Self::load(path).map(Some);
        }
        match Self::default_path() {
            Some(default) if default.is_file() => {
                log::debug!("Loading profile from {}", default.display());
                Self::load(&default).map(Some)
            }
            _ => Ok(None),
        }
    }
}

impl ClientConfig {
    /// Combines command line values with the profile file and validates the result.
    pub fn resolve(options: ConnectionOptions, file: Option<FileConfig>) -> Result<Self> {
        let file = file.unwrap_or_default();

        let url_base = match options.url_base {
            Some(url_base) if url_base.is_empty() => {
                return Err(ClientError::Validation("url-base argument cannot be empty".to_string()));
            }
            Some(url_base) => url_base,
            None => file.url_base.unwrap_or_else(|| DEFAULT_URL_BASE.to_string()),
        };

        let api_token = required(options.token, file.token, "--token option is required")?;
        let organization = required(
            options.organization,
            file.organization,
            "--organization option is required",
        )?;
        let project = required(options.project, file.project, "--project option is required")?;

        let mut http_headers = file.http_headers;
        if let Some(raw) = options.http_headers.filter(|s| !s.is_empty()) {
            http_headers.extend(parse_http_headers(&raw)?);
        }

        Ok(ClientConfig {
            url_base,
            api_token,
            organization,
            project,
            http_headers,
        })
    }
}

fn required(flag: Option<String>, profile: Option<String>, message: &str) -> Result<String> {
    flag.filter(|s| !s.is_empty())
        .or(profile.filter(|s| !s.is_empty()))
        .ok_or_else(|| ClientError::Validation(message.to_string()))
}

/// Parses `--http_headers`, which must be a JSON object whose values are all strings.
pub fn parse_http_headers(raw: &str) -> Result<BTreeMap<String, String>> {
    serde_json::from_str(raw).map_err(|_| {
        ClientError::Validation(
            "http headers must be in JSON string format whose keys and values are string".to_string(),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn options() -> ConnectionOptions {
        ConnectionOptions {
            url_base: None,
            token: Some("secret".to_string()),
            organization: Some("org".to_string()),
            project: Some("proj".to_string()),
            http_headers: None,
        }
    }

    #[test]
    fn test_resolve_uses_default_url_base() {
        let config = ClientConfig::resolve(options(), None).unwrap();
        assert_eq!(config.url_base, DEFAULT_URL_BASE);
        assert_eq!(config.api_token, "secret");
        assert!(config.http_headers.is_empty());
    }

    #[test]
    fn test_missing_token_is_rejected() {
        let mut opts = options();
        opts.token = Some(String::new());
        let err = ClientConfig::resolve(opts, None).unwrap_err();
        assert_eq!(err.to_string(), "--token option is required");
        assert!(err.is_validation());
    }

    #[test]
    fn test_empty_url_base_is_rejected() {
        let mut opts = options();
        opts.url_base = Some(String::new());
        let err = ClientConfig::resolve(opts, None).unwrap_err();
        assert_eq!(err.to_string(), "url-base argument cannot be empty");
    }

    #[test]
    fn test_profile_fills_gaps_and_flags_win() {
        let file = FileConfig {
            url_base: Some("http://localhost:8000".to_string()),
            token: Some("from-file".to_string()),
            organization: Some("file-org".to_string()),
            project: None,
            http_headers: BTreeMap::from([("X-A".to_string(), "file".to_string())]),
        };
        let opts = ConnectionOptions {
            token: None,
            http_headers: Some(r#"{"X-A":"flag","X-B":"b"}"#.to_string()),
            ..options()
        };
        let config = ClientConfig::resolve(opts, Some(file)).unwrap();
        assert_eq!(config.url_base, "http://localhost:8000");
        assert_eq!(config.api_token, "from-file");
        assert_eq!(config.organization, "org");
        assert_eq!(config.http_headers["X-A"], "flag");
        assert_eq!(config.http_headers["X-B"], "b");
    }

    #[test]
    fn test_http_headers_must_be_string_map() {
        assert!(parse_http_headers(r#"{"X-Trace":"1"}"#).is_ok());
        let err = parse_http_headers(r#"{"X-Trace":1}"#).unwrap_err();
        assert!(err.to_string().starts_with("http headers must be in JSON"));
        assert!(parse_http_headers("not json").is_err());
    }

    #[test]
    fn test_load_profile_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "token = \"t\"\norganization = \"o\"\nproject = \"p\"\n\n[http_headers]\nX-Env = \"ci\""
        )
        .unwrap();

        let loaded = FileConfig::load_optional(Some(file.path())).unwrap().unwrap();
        assert_eq!(loaded.token.as_deref(), Some("t"));
        assert_eq!(loaded.http_headers["X-Env"], "ci");
        assert!(loaded.url_base.is_none());
    }
}
