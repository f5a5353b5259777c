//! Transport configuration.
//!
//! Options are fixed when a transport is built. They can be assembled in
//! code or loaded from TOML:
//!
//! ```toml
//! hostname = "example.com"
//! port = 443
//! path = "/rt"
//! secure = true
//! timestamp_requests = true
//!
//! [query]
//! token = "abc"
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tether_protocol::BinaryType;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum OptionsError {
    /// Failed to read a config file.
    #[error("Failed to read {}: {source}", path.display())]
    Read {
        /// File that could not be read.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// TOML could not be parsed.
    #[error("Failed to parse options: {0}")]
    Parse(#[from] toml::de::Error),

    /// Hostname is empty.
    #[error("Hostname cannot be empty")]
    EmptyHostname,

    /// Path does not start with `/`.
    #[error("Path must start with '/': {0}")]
    InvalidPath(String),

    /// Cache-busting parameter name is empty.
    #[error("Timestamp parameter name cannot be empty")]
    EmptyTimestampParam,
}

/// URI scheme family requested by a concrete transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    /// `http` / `https`, used by polling transports.
    Http,
    /// `ws` / `wss`, used by socket transports.
    Ws,
}

impl Scheme {
    fn as_str(self, secure: bool) -> &'static str {
        match (self, secure) {
            (Scheme::Http, false) => "http",
            (Scheme::Http, true) => "https",
            (Scheme::Ws, false) => "ws",
            (Scheme::Ws, true) => "wss",
        }
    }
}

/// Shared view of the owning connection.
///
/// The client keeps one context per connection and hands clones to each
/// transport it builds; changing the binary type is visible to all of them.
#[derive(Debug, Clone, Default)]
pub struct ConnectionContext {
    binary_type: Arc<AtomicU8>,
}

impl ConnectionContext {
    /// Create a context with the given binary type.
    #[must_use]
    pub fn new(binary_type: BinaryType) -> Self {
        Self {
            binary_type: Arc::new(AtomicU8::new(binary_type.into())),
        }
    }

    /// Get the binary type used when decoding inbound data.
    #[must_use]
    pub fn binary_type(&self) -> BinaryType {
        BinaryType::try_from(self.binary_type.load(Ordering::Acquire)).unwrap_or_default()
    }

    /// Change the binary type.
    pub fn set_binary_type(&self, binary_type: BinaryType) {
        self.binary_type.store(binary_type.into(), Ordering::Release);
    }
}

/// TLS material for clients that terminate TLS themselves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TlsOptions {
    /// PKCS#12 bundle.
    #[serde(default)]
    pub pfx: Option<PathBuf>,

    /// Private key.
    #[serde(default)]
    pub key: Option<PathBuf>,

    /// Passphrase for the key or bundle.
    #[serde(default)]
    pub passphrase: Option<String>,

    /// Client certificate.
    #[serde(default)]
    pub cert: Option<PathBuf>,

    /// Trusted CA certificates.
    #[serde(default)]
    pub ca: Option<PathBuf>,

    /// Cipher suite list.
    #[serde(default)]
    pub ciphers: Option<String>,

    /// Verify the server certificate.
    #[serde(default = "default_true")]
    pub reject_unauthorized: bool,
}

impl Default for TlsOptions {
    fn default() -> Self {
        Self {
            pfx: None,
            key: None,
            passphrase: None,
            cert: None,
            ca: None,
            ciphers: None,
            reject_unauthorized: true,
        }
    }
}

/// Transport configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransportOptions {
    /// Host to connect to.
    #[serde(default = "default_hostname")]
    pub hostname: String,

    /// Port to connect to.
    #[serde(default)]
    pub port: Option<u16>,

    /// Request path.
    #[serde(default = "default_path")]
    pub path: String,

    /// Use TLS.
    #[serde(default)]
    pub secure: bool,

    /// Query parameters sent with every request.
    #[serde(default)]
    pub query: BTreeMap<String, String>,

    /// Append a cache-busting timestamp to every request.
    #[serde(default)]
    pub timestamp_requests: bool,

    /// Name of the cache-busting parameter.
    #[serde(default = "default_timestamp_param")]
    pub timestamp_param: String,

    /// Proxy URL.
    #[serde(default)]
    pub proxy: Option<String>,

    /// TLS material.
    #[serde(default)]
    pub tls: TlsOptions,

    /// Extra headers sent with the handshake.
    #[serde(default)]
    pub extra_headers: BTreeMap<String, String>,

    /// Local address to bind outgoing connections to.
    #[serde(default)]
    pub local_address: Option<IpAddr>,

    /// Owning connection context.
    #[serde(skip)]
    pub context: ConnectionContext,
}

// Default value functions
fn default_hostname() -> String {
    "localhost".to_string()
}

fn default_path() -> String {
    "/tether/".to_string()
}

fn default_timestamp_param() -> String {
    "t".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            hostname: default_hostname(),
            port: None,
            path: default_path(),
            secure: false,
            query: BTreeMap::new(),
            timestamp_requests: false,
            timestamp_param: default_timestamp_param(),
            proxy: None,
            tls: TlsOptions::default(),
            extra_headers: BTreeMap::new(),
            local_address: None,
            context: ConnectionContext::default(),
        }
    }
}

impl TransportOptions {
    /// Create options for a target.
    #[must_use]
    pub fn new(hostname: impl Into<String>, port: u16, path: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            port: Some(port),
            path: path.into(),
            ..Default::default()
        }
    }

    /// Enable or disable TLS.
    #[must_use]
    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    /// Add a query parameter.
    #[must_use]
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    /// Enable cache-busting timestamps.
    #[must_use]
    pub fn with_timestamp_requests(mut self, enabled: bool) -> Self {
        self.timestamp_requests = enabled;
        self
    }

    /// Add a handshake header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_headers.insert(name.into(), value.into());
        self
    }

    /// Use a specific connection context.
    #[must_use]
    pub fn with_context(mut self, context: ConnectionContext) -> Self {
        self.context = context;
        self
    }

    /// Check the options for values no transport can use.
    ///
    /// # Errors
    ///
    /// Returns the first invalid field found.
    pub fn validate(&self) -> Result<(), OptionsError> {
        if self.hostname.is_empty() {
            return Err(OptionsError::EmptyHostname);
        }
        if !self.path.starts_with('/') {
            return Err(OptionsError::InvalidPath(self.path.clone()));
        }
        if self.timestamp_param.is_empty() {
            return Err(OptionsError::EmptyTimestampParam);
        }
        Ok(())
    }

    /// Parse and validate options from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if parsing or validation fails.
    pub fn from_toml(s: &str) -> Result<Self, OptionsError> {
        let options: TransportOptions = toml::from_str(s)?;
        options.validate()?;
        Ok(options)
    }

    /// Load options from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or validated.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, OptionsError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| OptionsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&contents)
    }

    /// Build the request URI for a concrete transport.
    ///
    /// The port is left out when it matches the scheme default. When
    /// `timestamp_requests` is set, a fresh cache buster is appended.
    #[must_use]
    pub fn uri(&self, scheme: Scheme) -> String {
        let scheme_str = scheme.as_str(self.secure);
        let mut uri = String::with_capacity(64);
        uri.push_str(scheme_str);
        uri.push_str("://");

        if self.hostname.contains(':') {
            let _ = write!(uri, "[{}]", self.hostname);
        } else {
            uri.push_str(&self.hostname);
        }

        let default_port = if self.secure { 443 } else { 80 };
        if let Some(port) = self.port.filter(|p| *p != default_port) {
            let _ = write!(uri, ":{port}");
        }

        uri.push_str(&self.path);

        let mut params: Vec<(&str, String)> = self
            .query
            .iter()
            .map(|(k, v)| (k.as_str(), v.clone()))
            .collect();
        if self.timestamp_requests {
            params.push((self.timestamp_param.as_str(), cache_buster()));
        }

        for (i, (key, value)) in params.iter().enumerate() {
            uri.push(if i == 0 { '?' } else { '&' });
            uri.push_str(&encode_component(key));
            uri.push('=');
            uri.push_str(&encode_component(value));
        }

        uri
    }
}

const CACHE_BUSTER_ALPHABET: &[u8; 64] =
    b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz-_";

/// Tie-breaker for buster values produced within the same millisecond.
static BUSTER_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generate a short cache-busting value.
///
/// The value is the current millisecond timestamp in a URL-safe base-64
/// alphabet, followed by `.<n>` when the counter has to break a tie.
#[must_use]
pub fn cache_buster() -> String {
    static LAST_MILLIS: AtomicU64 = AtomicU64::new(0);

    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default();

    let mut out = String::with_capacity(12);
    let mut n = millis;
    loop {
        out.insert(0, char::from(CACHE_BUSTER_ALPHABET[(n % 64) as usize]));
        n /= 64;
        if n == 0 {
            break;
        }
    }

    if LAST_MILLIS.swap(millis, Ordering::AcqRel) == millis {
        let seq = BUSTER_COUNTER.fetch_add(1, Ordering::Relaxed);
        let _ = write!(out, ".{seq}");
    }

    out
}

/// Percent-encode a query component, leaving RFC 3986 unreserved
/// characters as they are.
fn encode_component(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(char::from(b));
            }
            _ => {
                let _ = write!(out, "%{b:02X}");
            }
        }
    }
    out
}
