//! Endpoint resolution for the three supported network topologies.
//!
//! Computes the channel URL for the current environment: an operator
//! override, the sandboxed reverse-proxy tunnel, or same-origin. Pure
//! functions only, no network I/O.

use tracing::warn;

use pd_core::constants;
use pd_core::error::{PdError, PdResult};

/// Security scheme of the origin the client is running from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OriginScheme {
    Http,
    Https,
}

impl OriginScheme {
    /// The channel scheme matching this HTTP scheme.
    pub fn channel_scheme(self) -> &'static str {
        match self {
            Self::Http => "ws",
            Self::Https => "wss",
        }
    }
}

/// The address context the client is running in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Origin {
    pub scheme: OriginScheme,
    pub host: String,
}

impl Origin {
    /// Create an origin from a scheme and host.
    pub fn new(scheme: OriginScheme, host: impl Into<String>) -> Self {
        Self {
            scheme,
            host: host.into(),
        }
    }

    /// Parse an origin like `https://abc123.playdeck.run` or `localhost:3000`.
    ///
    /// A bare host defaults to the secure scheme.
    pub fn parse(raw: &str) -> PdResult<Self> {
        let trimmed = raw.trim();
        let (scheme, rest) = if let Some(rest) = trimmed.strip_prefix("https://") {
            (OriginScheme::Https, rest)
        } else if let Some(rest) = trimmed.strip_prefix("http://") {
            (OriginScheme::Http, rest)
        } else if trimmed.contains("://") {
            return Err(PdError::AddressResolution(format!(
                "unsupported origin scheme in {trimmed:?}"
            )));
        } else {
            (OriginScheme::Https, trimmed)
        };

        let host = rest.trim_end_matches('/');
        if host.is_empty() || host.contains(' ') || host.contains('/') {
            return Err(PdError::AddressResolution(format!(
                "invalid origin host {host:?}"
            )));
        }

        Ok(Self::new(scheme, host))
    }

    /// Whether this origin is served from the sandboxed hosting environment.
    pub fn is_sandbox_host(&self) -> bool {
        self.tunnel_id().is_some()
    }

    /// The tunnel identifier: the leading subdomain label of a sandbox host.
    pub fn tunnel_id(&self) -> Option<&str> {
        let prefix = self.host.strip_suffix(constants::SANDBOX_HOST_SUFFIX)?;
        prefix.split('.').next().filter(|label| !label.is_empty())
    }
}

/// Resolved channel endpoint for the current environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointConfig {
    /// Fully resolved channel URL.
    pub resolved_url: String,
    /// Whether the client is running inside the sandboxed hosting
    /// environment and should use the pub/sub relay beside the channel.
    pub is_relay_environment: bool,
    /// The raw operator override this endpoint was derived from, if any.
    pub custom_override_url: Option<String>,
}

/// Compute the channel endpoint for the current environment.
///
/// Priority order: operator override, sandbox tunnel, same-origin with an
/// optional dev-host substitution. A malformed override is logged and the
/// resolver falls through to the automatic rules.
pub fn resolve(origin: &Origin, override_url: Option<&str>, dev_host: Option<&str>) -> EndpointConfig {
    if let Some(raw) = override_url {
        match normalize_override(raw) {
            Ok(url) => {
                return EndpointConfig {
                    resolved_url: url,
                    is_relay_environment: false,
                    custom_override_url: Some(raw.to_string()),
                }
            }
            Err(e) => warn!("{e}, falling back to automatic detection"),
        }
    }

    if let Some(tunnel) = origin.tunnel_id() {
        return EndpointConfig {
            resolved_url: format!(
                "wss://{tunnel}{}{}",
                constants::SANDBOX_HOST_SUFFIX,
                constants::SANDBOX_PROXY_PATH
            ),
            is_relay_environment: true,
            custom_override_url: None,
        };
    }

    let host = dev_host
        .filter(|h| !h.trim().is_empty())
        .unwrap_or(&origin.host);
    EndpointConfig {
        resolved_url: format!(
            "{}://{}{}",
            origin.scheme.channel_scheme(),
            host,
            constants::DEFAULT_CHANNEL_PATH
        ),
        is_relay_environment: false,
        custom_override_url: None,
    }
}

/// Normalize an operator-supplied override into a channel URL.
///
/// The channel scheme follows the declared HTTP scheme; bare hosts get the
/// secure scheme since override targets are deployed backends behind TLS.
/// The canonical path suffix is appended when absent.
fn normalize_override(raw: &str) -> PdResult<String> {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(PdError::AddressResolution("override url is empty".into()));
    }

    let (scheme, rest) = if let Some(rest) = trimmed.strip_prefix("wss://") {
        ("wss", rest)
    } else if let Some(rest) = trimmed.strip_prefix("ws://") {
        ("ws", rest)
    } else if let Some(rest) = trimmed.strip_prefix("https://") {
        ("wss", rest)
    } else if let Some(rest) = trimmed.strip_prefix("http://") {
        ("ws", rest)
    } else if trimmed.contains("://") {
        return Err(PdError::AddressResolution(format!(
            "unsupported scheme in override url {trimmed:?}"
        )));
    } else {
        ("wss", trimmed)
    };

    if rest.is_empty() || rest.contains(' ') {
        return Err(PdError::AddressResolution(format!(
            "invalid override url {raw:?}"
        )));
    }

    let url = format!("{scheme}://{rest}");
    if url.ends_with(constants::DEFAULT_CHANNEL_PATH) {
        Ok(url)
    } else {
        Ok(format!("{url}{}", constants::DEFAULT_CHANNEL_PATH))
    }
}
