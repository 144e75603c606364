use crate::core::{CartError, Result};
use std::time::Duration;

const URL_SCHEME_HTTP: &str = "storecart+http://";
const URL_SCHEME_HTTPS: &str = "storecart+https://";

/// Remote cart endpoint configuration
///
/// Can be built field by field or parsed from a connection string.
#[derive(Debug, Clone)]
pub struct HttpGatewayConfig {
    /// Use TLS
    pub secure: bool,

    /// Cart service host
    pub host: String,

    /// Cart service port
    pub port: u16,

    /// Path prefix the cart routes are mounted under (no trailing slash)
    pub path_prefix: String,

    /// Bearer token sent with every call
    pub token: Option<String>,

    /// Per-request timeout
    pub request_timeout: Duration,

    /// Connection timeout
    pub connect_timeout: Duration,
}

impl HttpGatewayConfig {
    pub fn new(host: &str) -> Self {
        Self {
            secure: true,
            host: host.to_string(),
            port: 443,
            path_prefix: String::new(),
            token: None,
            request_timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(5),
        }
    }

    pub fn insecure(mut self) -> Self {
        self.secure = false;
        if self.port == 443 {
            self.port = 80;
        }
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn path_prefix(mut self, prefix: &str) -> Self {
        self.path_prefix = normalize_prefix(prefix);
        self
    }

    pub fn token(mut self, token: &str) -> Self {
        self.token = Some(token.to_string());
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Parse from connection string
    ///
    /// Format: `storecart+https://token@host:port/prefix`. The token and the
    /// port are optional; the port defaults to 443 (https) or 80 (http).
    ///
    /// # Examples
    ///
    /// ```
    /// use storecart::HttpGatewayConfig;
    ///
    /// let config = HttpGatewayConfig::from_url("storecart+http://secret@localhost:8080/api")?;
    /// assert_eq!(config.base_url(), "http://localhost:8080/api");
    /// # Ok::<(), storecart::CartError>(())
    /// ```
    pub fn from_url(url: &str) -> Result<Self> {
        let (secure, rest) = if let Some(rest) = url.strip_prefix(URL_SCHEME_HTTPS) {
            (true, rest)
        } else if let Some(rest) = url.strip_prefix(URL_SCHEME_HTTP) {
            (false, rest)
        } else {
            return Err(CartError::config(
                "URL must start with 'storecart+http://' or 'storecart+https://'",
            ));
        };

        let (token, rest) = match rest.split_once('@') {
            Some((token, rest)) if !token.is_empty() => (Some(token), rest),
            Some(_) => return Err(CartError::config("Empty token before '@'")),
            None => (None, rest),
        };

        let (authority, prefix) = match rest.split_once('/') {
            Some((authority, prefix)) => (authority, prefix),
            None => (rest, ""),
        };

        let (host, port) = match authority.split_once(':') {
            Some((host, port)) => {
                let port = port
                    .parse::<u16>()
                    .map_err(|_| CartError::config(format!("Invalid port '{}'", port)))?;
                (host, Some(port))
            }
            None => (authority, None),
        };

        let mut config = Self::new(host).path_prefix(prefix);
        if !secure {
            config = config.insecure();
        }
        if let Some(port) = port {
            config = config.port(port);
        }
        if let Some(token) = token {
            config = config.token(token);
        }
        config.validate()?;
        Ok(config)
    }

    /// Convert to connection string
    pub fn to_url(&self) -> String {
        let scheme = if self.secure {
            URL_SCHEME_HTTPS
        } else {
            URL_SCHEME_HTTP
        };
        let token = if self.token.is_some() { "***@" } else { "" };
        format!(
            "{}{}{}:{}{}",
            scheme, token, self.host, self.port, self.path_prefix
        )
    }

    /// Plain HTTP base URL the cart routes are joined onto.
    pub fn base_url(&self) -> String {
        let scheme = if self.secure { "https" } else { "http" };
        format!("{}://{}:{}{}", scheme, self.host, self.port, self.path_prefix)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.host.is_empty() {
            return Err(CartError::config("Host cannot be empty"));
        }

        if self.port == 0 {
            return Err(CartError::config("Port must be > 0"));
        }

        if self.request_timeout.is_zero() {
            return Err(CartError::config("request_timeout must be > 0"));
        }

        Ok(())
    }
}

fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{}", trimmed)
    }
}
