//! Configuration types and loading

use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::time::Duration;

use bridge_git::naming::is_valid_branch_name;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const DEFAULT_BRANCH: &str = "main";
pub const DEFAULT_GITHUB_API: &str = "https://api.github.com";
pub const DEFAULT_RENDER_API: &str = "https://api.render.com";
pub const DEFAULT_PORT: u16 = 3000;
const DEFAULT_BIND: &str = "0.0.0.0";
const DEFAULT_COMMIT_TIMEOUT_SECS: u64 = 60;

/// Config files larger than this are refused.
const MAX_CONFIG_SIZE: u64 = 1024 * 1024;

/// Top-level bridge configuration
#[derive(Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BridgeConfig {
    #[serde(default)]
    pub github: GithubConfig,
    /// Absent when deploys are not wired up.
    #[serde(default)]
    pub render: Option<RenderConfig>,
    #[serde(default)]
    pub server: ServerConfig,
}

/// Target repository and credentials
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct GithubConfig {
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub repo: String,
    /// Personal access token with contents write permission.
    #[serde(default)]
    pub token: String,
    #[serde(default = "default_branch")]
    pub default_branch: String,
    #[serde(default = "default_github_api")]
    pub api_base: String,
}

/// Render deploy settings
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderConfig {
    #[serde(default)]
    pub api_key: String,
    /// Service deployed when a request names none.
    #[serde(default)]
    pub service_id: Option<String>,
    #[serde(default = "default_render_api")]
    pub api_base: String,
}

/// HTTP listener settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Upper bound on one commit, all steps included.
    #[serde(default = "default_commit_timeout")]
    pub commit_timeout_secs: u64,
}

fn default_branch() -> String {
    DEFAULT_BRANCH.to_string()
}

fn default_github_api() -> String {
    DEFAULT_GITHUB_API.to_string()
}

fn default_render_api() -> String {
    DEFAULT_RENDER_API.to_string()
}

fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_commit_timeout() -> u64 {
    DEFAULT_COMMIT_TIMEOUT_SECS
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            owner: String::new(),
            repo: String::new(),
            token: String::new(),
            default_branch: default_branch(),
            api_base: default_github_api(),
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            service_id: None,
            api_base: default_render_api(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            commit_timeout_secs: default_commit_timeout(),
        }
    }
}

fn redact(secret: &str) -> &'static str {
    if secret.is_empty() { "<unset>" } else { "<redacted>" }
}

impl fmt::Debug for BridgeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BridgeConfig")
            .field("github", &self.github)
            .field("render", &self.render)
            .field("server", &self.server)
            .finish()
    }
}

impl fmt::Debug for GithubConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GithubConfig")
            .field("owner", &self.owner)
            .field("repo", &self.repo)
            .field("token", &redact(&self.token))
            .field("default_branch", &self.default_branch)
            .field("api_base", &self.api_base)
            .finish()
    }
}

impl fmt::Debug for RenderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("service_id", &self.service_id)
            .field("api_base", &self.api_base)
            .finish()
    }
}

impl ServerConfig {
    pub fn commit_timeout(&self) -> Duration {
        Duration::from_secs(self.commit_timeout_secs)
    }

    /// Address to listen on.
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        let ip: IpAddr = self.bind.parse().map_err(|_| Error::Invalid {
            key: "BIND_ADDRESS",
            message: format!("{:?} is not an IP address", self.bind),
        })?;
        Ok(SocketAddr::new(ip, self.port))
    }
}

impl RenderConfig {
    /// Whether deploys can be triggered at all.
    pub fn is_configured(&self) -> bool {
        !self.api_key.trim().is_empty()
    }
}

impl BridgeConfig {
    /// Parse TOML text. `origin` is only used in error messages.
    pub fn from_toml_str(content: &str, origin: &Path) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Parse {
            path: origin.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Read and parse a TOML config file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let io_error = |source| Error::Io {
            path: path.to_path_buf(),
            source,
        };
        let size = std::fs::metadata(path).map_err(io_error)?.len();
        if size > MAX_CONFIG_SIZE {
            return Err(Error::ConfigTooLarge {
                path: path.to_path_buf(),
                size,
                max: MAX_CONFIG_SIZE,
            });
        }
        let content = std::fs::read_to_string(path).map_err(io_error)?;
        Self::from_toml_str(&content, path)
    }

    /// Overlay environment variables, looked up through `lookup`.
    ///
    /// Unset and empty variables leave the current value alone.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("GITHUB_OWNER") {
            self.github.owner = v;
        }
        if let Some(v) = get("GITHUB_REPO") {
            self.github.repo = v;
        }
        if let Some(v) = get("GITHUB_PAT") {
            self.github.token = v;
        }
        if let Some(v) = get("DEFAULT_BRANCH") {
            self.github.default_branch = v;
        }
        if let Some(v) = get("GITHUB_API_URL") {
            self.github.api_base = v;
        }

        let render_key = get("RENDER_API_KEY");
        let render_service = get("RENDER_SERVICE_ID");
        let render_api = get("RENDER_API_URL");
        if render_key.is_some() || render_service.is_some() || render_api.is_some() {
            let render = self.render.get_or_insert_with(RenderConfig::default);
            if let Some(v) = render_key {
                render.api_key = v;
            }
            if let Some(v) = render_service {
                render.service_id = Some(v);
            }
            if let Some(v) = render_api {
                render.api_base = v;
            }
        }

        if let Some(v) = get("BIND_ADDRESS") {
            self.server.bind = v;
        }
        if let Some(v) = get("PORT") {
            self.server.port = v.trim().parse().map_err(|_| Error::Invalid {
                key: "PORT",
                message: format!("{v:?} is not a port number"),
            })?;
        }
        if let Some(v) = get("COMMIT_TIMEOUT_SECS") {
            self.server.commit_timeout_secs = v.trim().parse().map_err(|_| Error::Invalid {
                key: "COMMIT_TIMEOUT_SECS",
                message: format!("{v:?} is not a whole number of seconds"),
            })?;
        }
        Ok(())
    }

    /// Check that everything needed to serve commits is present.
    pub fn validate(&self) -> Result<()> {
        if self.github.owner.trim().is_empty() {
            return Err(Error::Missing {
                key: "GITHUB_OWNER",
            });
        }
        if self.github.repo.trim().is_empty() {
            return Err(Error::Missing { key: "GITHUB_REPO" });
        }
        if self.github.token.trim().is_empty() {
            return Err(Error::Missing { key: "GITHUB_PAT" });
        }
        if self.github.default_branch.trim().is_empty() {
            return Err(Error::Missing {
                key: "DEFAULT_BRANCH",
            });
        }
        if !is_valid_branch_name(&self.github.default_branch) {
            return Err(Error::Invalid {
                key: "DEFAULT_BRANCH",
                message: format!("{:?} is not a valid branch name", self.github.default_branch),
            });
        }
        if self.server.commit_timeout_secs == 0 {
            return Err(Error::Invalid {
                key: "COMMIT_TIMEOUT_SECS",
                message: "must be at least 1".into(),
            });
        }
        self.server.socket_addr()?;
        Ok(())
    }

    /// Load the optional file, overlay the environment and validate.
    pub fn load<F>(path: Option<&Path>, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(lookup)?;
        config.validate()?;

        tracing::debug!(
            repository = %format!("{}/{}", config.github.owner, config.github.repo),
            default_branch = %config.github.default_branch,
            render = config.render.as_ref().is_some_and(RenderConfig::is_configured),
            "Configuration loaded"
        );
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = BridgeConfig::default();
        assert_eq!(config.github.default_branch, "main");
        assert_eq!(config.github.api_base, DEFAULT_GITHUB_API);
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.bind, "0.0.0.0");
        assert_eq!(config.server.commit_timeout(), Duration::from_secs(60));
        assert!(config.render.is_none());
    }

    #[test]
    fn test_env_fills_everything() {
        let mut config = BridgeConfig::default();
        config
            .apply_env(env(&[
                ("GITHUB_OWNER", "octo"),
                ("GITHUB_REPO", "site"),
                ("GITHUB_PAT", "ghp_x"),
                ("DEFAULT_BRANCH", "trunk"),
                ("RENDER_API_KEY", "rnd_x"),
                ("RENDER_SERVICE_ID", "srv-1"),
                ("PORT", "10000"),
            ]))
            .unwrap();

        assert_eq!(config.github.owner, "octo");
        assert_eq!(config.github.default_branch, "trunk");
        assert_eq!(config.server.port, 10000);
        let render = config.render.as_ref().unwrap();
        assert!(render.is_configured());
        assert_eq!(render.service_id.as_deref(), Some("srv-1"));
        config.validate().unwrap();
    }

    #[test]
    fn test_empty_env_values_are_ignored() {
        let mut config = BridgeConfig::default();
        config
            .apply_env(env(&[("DEFAULT_BRANCH", ""), ("PORT", " ")]))
            .unwrap();
        assert_eq!(config.github.default_branch, "main");
        assert_eq!(config.server.port, 3000);
    }

    #[test]
    fn test_bad_port_is_invalid() {
        let mut config = BridgeConfig::default();
        let err = config.apply_env(env(&[("PORT", "http")])).unwrap_err();
        assert!(matches!(err, Error::Invalid { key: "PORT", .. }));
    }

    #[test]
    fn test_validate_reports_first_missing_key() {
        let mut config = BridgeConfig::default();
        config.apply_env(env(&[("GITHUB_OWNER", "octo")])).unwrap();
        assert!(matches!(
            config.validate(),
            Err(Error::Missing { key: "GITHUB_REPO" })
        ));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let mut config = BridgeConfig::default();
        config
            .apply_env(env(&[("GITHUB_PAT", "ghp_secret"), ("RENDER_API_KEY", "rnd_secret")]))
            .unwrap();
        let shown = format!("{config:?}");
        assert!(!shown.contains("ghp_secret"));
        assert!(!shown.contains("rnd_secret"));
        assert!(shown.contains("<redacted>"));
    }

    #[test]
    fn test_socket_addr_rejects_hostnames() {
        let server = ServerConfig {
            bind: "localhost".into(),
            ..ServerConfig::default()
        };
        assert!(server.socket_addr().is_err());
        let server = ServerConfig {
            bind: "::1".into(),
            port: 8080,
            ..ServerConfig::default()
        };
        assert_eq!(server.socket_addr().unwrap().to_string(), "[::1]:8080");
    }
}
