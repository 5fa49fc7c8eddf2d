//! Proxy endpoint model.
//!
//! Endpoints are kept as the raw string loaded from the proxies file. They
//! are only parsed into a [`ProxyRoute`] when a session handle is built, so
//! a malformed line surfaces as a construction error for the one session it
//! was assigned to.

use std::fmt::{Debug, Display, Formatter};

use serde::{Serialize, Serializer};

use crate::{AppError, Result};

/// Tunnel protocol of a proxy endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyScheme {
    /// HTTP `CONNECT` proxy.
    Http,
    /// HTTP `CONNECT` over TLS.
    Https,
    /// SOCKS v4.
    Socks4,
    /// SOCKS v5.
    Socks5,
}

impl ProxyScheme {
    fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "http" => Some(Self::Http),
            "https" => Some(Self::Https),
            "socks4" | "socks4a" => Some(Self::Socks4),
            "socks5" | "socks5h" | "socks" => Some(Self::Socks5),
            _ => None,
        }
    }

    /// Port assumed when the endpoint does not name one.
    #[must_use]
    pub fn default_port(self) -> u16 {
        match self {
            Self::Http => 80,
            Self::Https => 443,
            Self::Socks4 | Self::Socks5 => 1080,
        }
    }
}

/// Opaque connection-routing string, e.g. `socks5://10.0.0.2:1080`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProxyEndpoint(String);

impl ProxyEndpoint {
    /// Wrap a raw endpoint string. No validation happens here.
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// The endpoint exactly as loaded.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parse the endpoint into a route usable by a connector.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Construction` if the scheme is missing or
    /// unsupported, the host is empty, or the port is not a valid `u16`.
    pub fn route(&self) -> Result<ProxyRoute> {
        let malformed =
            |why: &str| AppError::Construction(format!("proxy {}: {why}", self.redacted()));

        let (scheme_raw, rest) = self
            .0
            .split_once("://")
            .ok_or_else(|| malformed("missing scheme"))?;
        let scheme = ProxyScheme::parse(scheme_raw)
            .ok_or_else(|| malformed(&format!("unsupported scheme '{scheme_raw}'")))?;

        let authority = rest.split('/').next().unwrap_or_default();
        let (credentials, host_port) = match authority.rsplit_once('@') {
            Some((creds, hp)) => (Some(creds), hp),
            None => (None, authority),
        };

        let (host, port) = split_host_port(host_port).map_err(|why| malformed(why))?;
        if host.is_empty() {
            return Err(malformed("missing host"));
        }

        let (username, password) = match credentials.filter(|c| !c.is_empty()) {
            Some(creds) => match creds.split_once(':') {
                Some((user, pass)) => (Some(user.to_owned()), Some(pass.to_owned())),
                None => (Some(creds.to_owned()), None),
            },
            None => (None, None),
        };

        Ok(ProxyRoute {
            scheme,
            host: host.to_owned(),
            port: port.unwrap_or_else(|| scheme.default_port()),
            username,
            password,
        })
    }

    /// Display form with any `user:pass@` section masked.
    #[must_use]
    pub fn redacted(&self) -> String {
        let Some((scheme, rest)) = self.0.split_once("://") else {
            return self.0.clone();
        };
        match rest.rsplit_once('@') {
            Some((_, host)) => format!("{scheme}://***@{host}"),
            None => self.0.clone(),
        }
    }
}

impl Display for ProxyEndpoint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.redacted())
    }
}

impl Serialize for ProxyEndpoint {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.redacted())
    }
}

/// Parsed proxy route handed to the protocol-client connector.
///
/// `Debug` output masks the password.
#[derive(Clone, PartialEq, Eq)]
pub struct ProxyRoute {
    /// Tunnel protocol.
    pub scheme: ProxyScheme,
    /// Proxy host name or address.
    pub host: String,
    /// Proxy port (scheme default when omitted).
    pub port: u16,
    /// User name from the `user:pass@` section.
    pub username: Option<String>,
    /// Password from the `user:pass@` section.
    pub password: Option<String>,
}

impl ProxyRoute {
    /// Whether the proxy expects credentials.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.username.is_some()
    }
}

impl Debug for ProxyRoute {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyRoute")
            .field("scheme", &self.scheme)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "********"))
            .finish()
    }
}

/// Split `host[:port]`, accepting a bracketed IPv6 literal as the host.
///
/// An unbracketed host may not contain `:`.
pub(crate) fn split_host_port(raw: &str) -> std::result::Result<(&str, Option<u16>), &'static str> {
    // Bracketed IPv6 literal: `[::1]:1080`.
    if let Some(stripped) = raw.strip_prefix('[') {
        let (host, after) = stripped
            .split_once(']')
            .ok_or("unterminated ipv6 literal")?;
        return match after.strip_prefix(':') {
            Some(port) => Ok((host, Some(parse_port(port)?))),
            None if after.is_empty() => Ok((host, None)),
            None => Err("unexpected characters after ipv6 literal"),
        };
    }

    let (host, port) = match raw.rsplit_once(':') {
        Some((host, port)) => (host, Some(parse_port(port)?)),
        None => (raw, None),
    };
    if host.contains(':') {
        return Err("ipv6 literal must be bracketed");
    }
    Ok((host, port))
}

fn parse_port(raw: &str) -> std::result::Result<u16, &'static str> {
    match raw.parse::<u16>() {
        Ok(0) | Err(_) => Err("invalid port"),
        Ok(port) => Ok(port),
    }
}
