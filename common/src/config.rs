//! Configuration parsing – reads a `KEY=VALUE` file such as `probe.conf`.
//!
//! Every key is optional; a missing file yields the defaults, so the server
//! can start from a bare checkout.

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    // ── storage ──────────────────────────────────────────────────────
    /// Directory every submission is written to.
    pub data_dir: PathBuf,
    /// Directory served under `/static`; may hold an `index.html` override.
    pub static_dir: PathBuf,

    // ── network ──────────────────────────────────────────────────────
    /// Bind host.  `None` means "resolve the host's own address".
    pub listen_host: Option<IpAddr>,
    pub listen_port: u16,
    /// Maximum accepted request body (base64 media inflates by ~4/3).
    pub max_body_bytes: usize,

    // ── media ────────────────────────────────────────────────────────
    pub jpeg_quality: u8,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            static_dir: PathBuf::from("static"),
            listen_host: None,
            listen_port: 5000,
            max_body_bytes: 32 * 1024 * 1024,
            jpeg_quality: 90,
        }
    }
}

impl Config {
    /// Default config path, relative to the working directory.
    pub fn default_path() -> &'static str {
        "probe.conf"
    }

    /// The socket address the HTTP server binds to.
    pub fn listen_addr(&self) -> SocketAddr {
        let host = self.listen_host.unwrap_or_else(resolve_host_ip);
        SocketAddr::new(host, self.listen_port)
    }
}

/// Load the config at `path`, falling back to defaults if it does not exist.
pub fn load_or_default(path: &Path) -> Result<Config> {
    if !path.exists() {
        warn!("No config at {}, using defaults", path.display());
        return Ok(Config::default());
    }
    load(path)
}

/// Parse a `KEY=VALUE` configuration file.
///
/// Lines starting with `#` are comments.  Values may be optionally
/// double-quoted.  Unknown keys are silently ignored.
pub fn load(path: &Path) -> Result<Config> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Cannot read config: {}", path.display()))?;

    let config = from_map(&parse_conf(&text))?;
    info!("Loaded config from {}", path.display());
    Ok(config)
}

fn from_map(map: &HashMap<String, String>) -> Result<Config> {
    let defaults = Config::default();
    let get = |key: &str| -> Option<String> { map.get(key).filter(|v| !v.is_empty()).cloned() };

    let listen_host = match get("LISTEN_HOST") {
        None => None,
        Some(v) if v.eq_ignore_ascii_case("auto") => None,
        Some(v) => Some(
            v.parse::<IpAddr>()
                .with_context(|| format!("Invalid LISTEN_HOST: {v}"))?,
        ),
    };

    let jpeg_quality = get("JPEG_QUALITY")
        .and_then(|v| v.parse::<u32>().ok())
        .map(|q| q.clamp(1, 100) as u8)
        .unwrap_or(defaults.jpeg_quality);

    Ok(Config {
        data_dir: get("DATA_DIR").map(PathBuf::from).unwrap_or(defaults.data_dir),
        static_dir: get("STATIC_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.static_dir),
        listen_host,
        listen_port: get("LISTEN_PORT")
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.listen_port),
        max_body_bytes: get("MAX_BODY_BYTES")
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.max_body_bytes),
        jpeg_quality,
    })
}

/// Parse `KEY=VALUE` lines into a map, stripping optional double-quotes.
fn parse_conf(text: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((key, val)) = line.split_once('=') {
            let key = key.trim();
            let val = val.trim().trim_matches('"');
            map.insert(key.to_string(), val.to_string());
        }
    }
    map
}

/// Best-effort lookup of the address other machines reach this host on.
///
/// Connecting a UDP socket only selects a route; nothing is sent.
fn resolve_host_ip() -> IpAddr {
    let probe = || -> std::io::Result<IpAddr> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))?;
        socket.connect((Ipv4Addr::new(192, 0, 2, 1), 9))?;
        Ok(socket.local_addr()?.ip())
    };
    match probe() {
        Ok(ip) if !ip.is_unspecified() => {
            debug!("Resolved host address {ip}");
            ip
        }
        Ok(_) | Err(_) => {
            warn!("Cannot resolve host address, binding to all interfaces");
            IpAddr::V4(Ipv4Addr::UNSPECIFIED)
        }
    }
}

// ─── tests ───────────────────────────────────────────────────────────────
