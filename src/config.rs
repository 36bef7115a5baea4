//! Settings for the chat service and the chat client
//!
//! Credentials and URLs are gathered into plain structs once at startup and
//! passed to constructors. `from_env` reads the process environment;
//! `from_lookup` takes any key lookup so tests need not touch it.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;

use thiserror::Error;

use crate::agent::AgentConfig;
use crate::llm::groq::DEFAULT_GROQ_BASE_URL;
use crate::search::tavily::DEFAULT_TAVILY_BASE_URL;

/// Address the chat service listens on by default
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8000";

/// Where the chat client looks for the service by default
pub const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:8000";

/// Outbound provider request timeout in seconds
const DEFAULT_PROVIDER_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("required environment variable {0} is not set")]
    Missing(&'static str),
    #[error("invalid value {value:?} for {var}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Provider credentials and endpoints
#[derive(Clone)]
pub struct ProviderSettings {
    pub groq_api_key: String,
    pub groq_base_url: String,
    /// `None` disables web search
    pub tavily_api_key: Option<String>,
    pub tavily_base_url: String,
    pub request_timeout: Duration,
}

impl std::fmt::Debug for ProviderSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderSettings")
            .field("groq_api_key", &"<redacted>")
            .field("groq_base_url", &self.groq_base_url)
            .field("tavily_api_key", &self.tavily_api_key.as_ref().map(|_| "<redacted>"))
            .field("tavily_base_url", &self.tavily_base_url)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl ProviderSettings {
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let timeout_secs = parse_var(&get, "CHATVISOR_PROVIDER_TIMEOUT_SECS")?
            .unwrap_or(DEFAULT_PROVIDER_TIMEOUT_SECS);

        Ok(Self {
            groq_api_key: get("GROQ_API_KEY").ok_or(ConfigError::Missing("GROQ_API_KEY"))?,
            groq_base_url: get("GROQ_BASE_URL").unwrap_or_else(|| DEFAULT_GROQ_BASE_URL.to_string()),
            tavily_api_key: get("TAVILY_API_KEY").or_else(|| get("TAV_API_KEY")),
            tavily_base_url: get("TAVILY_BASE_URL")
                .unwrap_or_else(|| DEFAULT_TAVILY_BASE_URL.to_string()),
            request_timeout: Duration::from_secs(timeout_secs),
        })
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }
}

/// Everything the chat service needs at startup
#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub bind: SocketAddr,
    pub providers: ProviderSettings,
    pub agent: AgentConfig,
}

impl ServerSettings {
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let bind = resolve_bind(&lookup)?;

        let mut agent = AgentConfig::default();
        let max_steps: Option<usize> = parse_var(&get, "CHATVISOR_MAX_STEPS")?;
        if let Some(max_steps) = max_steps {
            if max_steps == 0 {
                return Err(ConfigError::Invalid {
                    var: "CHATVISOR_MAX_STEPS",
                    value: "0".to_string(),
                    reason: "must be at least 1".to_string(),
                });
            }
            agent.max_steps = max_steps;
        }

        Ok(Self {
            bind,
            providers: ProviderSettings::from_lookup(&lookup)?,
            agent,
        })
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }
}

/// Settings for the terminal chat client
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub backend_url: String,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.to_string(),
        }
    }
}

impl ClientSettings {
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let backend_url = lookup("BACKEND_API_URL")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BACKEND_URL.to_string());
        Self { backend_url }
    }

    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }
}

/// Chat service listen address: `CHATVISOR_BIND`, else [`DEFAULT_BIND_ADDR`]
pub fn resolve_bind(lookup: impl Fn(&str) -> Option<String>) -> Result<SocketAddr, ConfigError> {
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    match parse_var(&get, "CHATVISOR_BIND")? {
        Some(addr) => Ok(addr),
        None => DEFAULT_BIND_ADDR.parse().map_err(|e: std::net::AddrParseError| {
            ConfigError::Invalid {
                var: "CHATVISOR_BIND",
                value: DEFAULT_BIND_ADDR.to_string(),
                reason: e.to_string(),
            }
        }),
    }
}

/// URL a client on the same host uses to reach a service bound to `bind`
///
/// Wildcard addresses are not connectable, so they map to loopback.
pub fn backend_url_for(bind: SocketAddr) -> String {
    let ip = match bind.ip() {
        IpAddr::V4(ip) if ip.is_unspecified() => IpAddr::V4(Ipv4Addr::LOCALHOST),
        IpAddr::V6(ip) if ip.is_unspecified() => IpAddr::V6(Ipv6Addr::LOCALHOST),
        ip => ip,
    };
    format!("http://{}", SocketAddr::new(ip, bind.port()))
}

fn parse_var<T>(
    get: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get(var)
        .map(|value| {
            value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
                var,
                reason: e.to_string(),
                value,
            })
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_server_defaults() {
        let settings = ServerSettings::from_lookup(lookup(&[("GROQ_API_KEY", "gsk")])).unwrap();
        assert_eq!(settings.bind, "0.0.0.0:8000".parse::<SocketAddr>().unwrap());
        assert_eq!(settings.agent.max_steps, 10);
        assert_eq!(settings.providers.groq_api_key, "gsk");
        assert_eq!(settings.providers.groq_base_url, DEFAULT_GROQ_BASE_URL);
        assert!(settings.providers.tavily_api_key.is_none());
        assert_eq!(settings.providers.request_timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_missing_groq_key() {
        let err = ServerSettings::from_lookup(lookup(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("GROQ_API_KEY")));

        // Blank counts as unset
        let err = ProviderSettings::from_lookup(lookup(&[("GROQ_API_KEY", "  ")])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("GROQ_API_KEY")));
    }

    #[test]
    fn test_overrides_and_legacy_tavily_name() {
        let settings = ServerSettings::from_lookup(lookup(&[
            ("GROQ_API_KEY", "gsk"),
            ("TAV_API_KEY", "tvly"),
            ("CHATVISOR_BIND", "127.0.0.1:9000"),
            ("CHATVISOR_MAX_STEPS", "4"),
            ("CHATVISOR_PROVIDER_TIMEOUT_SECS", "5"),
        ]))
        .unwrap();
        assert_eq!(settings.bind.port(), 9000);
        assert_eq!(settings.agent.max_steps, 4);
        assert_eq!(settings.providers.tavily_api_key.as_deref(), Some("tvly"));
        assert_eq!(settings.providers.request_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let err = ServerSettings::from_lookup(lookup(&[
            ("GROQ_API_KEY", "gsk"),
            ("CHATVISOR_MAX_STEPS", "many"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "CHATVISOR_MAX_STEPS", .. }));

        let err = ServerSettings::from_lookup(lookup(&[
            ("GROQ_API_KEY", "gsk"),
            ("CHATVISOR_MAX_STEPS", "0"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("at least 1"));
    }

    #[test]
    fn test_client_backend_url() {
        assert_eq!(ClientSettings::from_lookup(lookup(&[])).backend_url, DEFAULT_BACKEND_URL);
        let settings = ClientSettings::from_lookup(lookup(&[("BACKEND_API_URL", "http://api:8000")]));
        assert_eq!(settings.backend_url, "http://api:8000");
    }

    #[test]
    fn test_resolve_bind_follows_env() {
        assert_eq!(
            resolve_bind(lookup(&[])).unwrap(),
            DEFAULT_BIND_ADDR.parse::<SocketAddr>().unwrap()
        );
        assert_eq!(
            resolve_bind(lookup(&[("CHATVISOR_BIND", "0.0.0.0:9000")])).unwrap(),
            "0.0.0.0:9000".parse::<SocketAddr>().unwrap()
        );
        assert!(resolve_bind(lookup(&[("CHATVISOR_BIND", "nowhere")])).is_err());
    }

    #[test]
    fn test_backend_url_for_bind_address() {
        let url = |addr: &str| backend_url_for(addr.parse().unwrap());

        // Wildcards go through loopback, on the bound port
        assert_eq!(url("0.0.0.0:9000"), "http://127.0.0.1:9000");
        assert_eq!(url("[::]:9000"), "http://[::1]:9000");
        // A specific interface is used as-is
        assert_eq!(url("10.0.0.5:9000"), "http://10.0.0.5:9000");
        assert_eq!(url("127.0.0.1:8000"), DEFAULT_BACKEND_URL);

        let env_bind = resolve_bind(lookup(&[("CHATVISOR_BIND", "0.0.0.0:9000")])).unwrap();
        assert_eq!(backend_url_for(env_bind), "http://127.0.0.1:9000");
    }

    #[test]
    fn test_debug_redacts_keys() {
        let settings = ProviderSettings::from_lookup(lookup(&[("GROQ_API_KEY", "secret-key")])).unwrap();
        assert!(!format!("{:?}", settings).contains("secret-key"));
    }
}
