//! Gateway configuration: which agent to talk to, how, and where to listen.

use std::collections::HashMap;
use std::fmt;
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Wire protocol spoken by the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transport {
    /// gRPC, forwarded without conversion.
    Native,
    /// A2A JSON-RPC 2.0 over HTTP.
    Dialect,
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transport::Native => write!(f, "grpc"),
            Transport::Dialect => write!(f, "jsonrpc"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("agent address is empty")]
    EmptyAddress,

    #[error("invalid agent address {address:?} for JSON-RPC: an http:// or https:// scheme is required")]
    MissingScheme { address: String },

    #[error("invalid agent address {address:?}: {reason}")]
    InvalidAddress { address: String, reason: String },
}

/// A validated agent address plus the transport used to reach it.
///
/// Native addresses are stored as `host:port` with any `http://`/`https://`
/// prefix removed. Dialect addresses keep their full URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentEndpoint {
    address: String,
    transport: Transport,
}

impl AgentEndpoint {
    pub fn new(address: &str, transport: Transport) -> Result<Self, ConfigError> {
        let address = address.trim();
        if address.is_empty() {
            return Err(ConfigError::EmptyAddress);
        }

        let address = match transport {
            Transport::Native => {
                let stripped = address
                    .strip_prefix("http://")
                    .or_else(|| address.strip_prefix("https://"))
                    .unwrap_or(address)
                    .trim_end_matches('/');
                if stripped.is_empty() {
                    return Err(ConfigError::EmptyAddress);
                }
                stripped.to_string()
            }
            Transport::Dialect => {
                if !(address.starts_with("http://") || address.starts_with("https://")) {
                    return Err(ConfigError::MissingScheme {
                        address: address.to_string(),
                    });
                }
                reqwest::Url::parse(address).map_err(|e| ConfigError::InvalidAddress {
                    address: address.to_string(),
                    reason: e.to_string(),
                })?;
                address.to_string()
            }
        };

        Ok(Self { address, transport })
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn transport(&self) -> Transport {
        self.transport
    }

    /// The gRPC dial target. Only meaningful for [`Transport::Native`].
    pub fn native_target(&self) -> NativeTarget {
        NativeTarget::parse(&self.address)
    }
}

impl fmt::Display for AgentEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.address, self.transport)
    }
}

/// Scheme-less gRPC target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeTarget {
    /// `host:port`
    pub authority: String,
    /// Loopback targets are dialed in plaintext, everything else over TLS.
    pub loopback: bool,
}

impl NativeTarget {
    fn parse(authority: &str) -> Self {
        let host = host_of(authority);
        let loopback = host.eq_ignore_ascii_case("localhost")
            || host
                .parse::<IpAddr>()
                .map(|ip| ip.is_loopback())
                .unwrap_or(false);
        Self {
            authority: authority.to_string(),
            loopback,
        }
    }

    /// URI handed to the channel builder.
    pub fn uri(&self) -> String {
        let scheme = if self.loopback { "http" } else { "https" };
        format!("{scheme}://{}", self.authority)
    }
}

// "[::1]:8080" -> "::1", "localhost:8080" -> "localhost", "::1" -> "::1"
fn host_of(authority: &str) -> &str {
    let authority = authority.split('/').next().unwrap_or(authority);
    if let Some(rest) = authority.strip_prefix('[') {
        return rest.split(']').next().unwrap_or(rest);
    }
    if authority.matches(':').count() > 1 {
        return authority;
    }
    authority.split(':').next().unwrap_or(authority)
}

/// Settings for the outbound connection to the agent.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Connection establishment timeout. Defaults to 10 seconds.
    pub connect_timeout: Duration,
    /// Per-call timeout for unary calls. Defaults to 60 seconds.
    pub request_timeout: Duration,
    /// Additional headers sent on every outbound call.
    pub headers: HashMap<String, String>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(60),
            headers: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub port: u16,
    pub endpoint: AgentEndpoint,
    /// Directory served for every path outside the A2A service.
    pub static_dir: Option<PathBuf>,
    /// Allow cross-origin requests (useful when the UI runs on its own dev server).
    pub cors: bool,
    pub transport: TransportConfig,
}

impl GatewayConfig {
    pub fn new(endpoint: AgentEndpoint) -> Self {
        Self {
            port: 3000,
            endpoint,
            static_dir: None,
            cors: false,
            transport: TransportConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn native_strips_scheme() {
        for input in ["localhost:8080", "http://localhost:8080", "https://localhost:8080"] {
            let endpoint = AgentEndpoint::new(input, Transport::Native).unwrap();
            assert_eq!(endpoint.address(), "localhost:8080", "input {input}");
        }
    }

    #[test]
    fn dialect_requires_scheme() {
        let err = AgentEndpoint::new("localhost:8080", Transport::Dialect).unwrap_err();
        assert!(matches!(err, ConfigError::MissingScheme { .. }));

        let endpoint = AgentEndpoint::new(" http://localhost:8080/jsonrpc ", Transport::Dialect)
            .unwrap();
        assert_eq!(endpoint.address(), "http://localhost:8080/jsonrpc");
    }

    #[test]
    fn empty_address_rejected() {
        assert_eq!(
            AgentEndpoint::new("  ", Transport::Native),
            Err(ConfigError::EmptyAddress)
        );
        assert_eq!(
            AgentEndpoint::new("", Transport::Dialect),
            Err(ConfigError::EmptyAddress)
        );
        assert_eq!(
            AgentEndpoint::new("http://", Transport::Native),
            Err(ConfigError::EmptyAddress)
        );
    }

    #[test]
    fn loopback_detection() {
        let cases = [
            ("localhost:8080", true),
            ("127.0.0.1:50051", true),
            ("127.9.9.9:1", true),
            ("[::1]:8080", true),
            ("agent.example.com:443", false),
            ("10.0.0.5:8080", false),
        ];
        for (authority, loopback) in cases {
            let endpoint = AgentEndpoint::new(authority, Transport::Native).unwrap();
            assert_eq!(endpoint.native_target().loopback, loopback, "{authority}");
        }
    }

    #[test]
    fn native_uri_scheme_follows_loopback() {
        let local = AgentEndpoint::new("localhost:8080", Transport::Native).unwrap();
        assert_eq!(local.native_target().uri(), "http://localhost:8080");
        let remote = AgentEndpoint::new("https://agent.example.com:443", Transport::Native).unwrap();
        assert_eq!(remote.native_target().uri(), "https://agent.example.com:443");
    }

    #[test]
    fn transport_defaults() {
        let config = TransportConfig::default();
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.request_timeout, Duration::from_secs(60));
        assert!(config.headers.is_empty());
    }
}
