// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Environment variable names and defaults for the JWKS host binary, plus the
//! tunables of the avatar cache. The library itself reads no environment;
//! only `main.rs` calls [`ServerConfig::from_env`] and [`init_tracing`].
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `DATA_DIR` | Directory holding the redb store | `./data` |
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::avatar::{
    DEFAULT_BATCH_DELAY, DEFAULT_BATCH_SIZE, DEFAULT_MAINTENANCE_INTERVAL, DEFAULT_MAX_AGE,
    DEFAULT_PROBE_TIMEOUT, DEFAULT_RESOLVE_TIMEOUT, DEFAULT_SAMPLE_SIZE,
};

/// Environment variable name for the storage directory.
///
/// The redb file `client-vault.redb` is created inside it.
pub const DATA_DIR_ENV: &str = "DATA_DIR";

/// Default storage directory, relative to the working directory.
pub const DEFAULT_DATA_DIR: &str = "./data";

/// Environment variable name for the bind address.
pub const HOST_ENV: &str = "HOST";

/// Default bind address.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Environment variable name for the bind port.
pub const PORT_ENV: &str = "PORT";

/// Default bind port.
pub const DEFAULT_PORT: u16 = 8080;

/// Environment variable name for the log output format.
///
/// `json` selects one JSON object per line; anything else is human-readable.
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

/// Environment variable name for the log filter.
pub const RUST_LOG_ENV: &str = "RUST_LOG";

/// Filter used when `RUST_LOG` is unset or invalid.
pub const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug";

/// Settings for the JWKS host binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub data_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
        }
    }
}

impl ServerConfig {
    /// Read settings from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read settings through `lookup`; unset or unparseable values fall back
    /// to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            host: lookup(HOST_ENV).unwrap_or(defaults.host),
            port: lookup(PORT_ENV)
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            data_dir: lookup(DATA_DIR_ENV)
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
        }
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }
}

/// Tunables of the avatar cache and its coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSettings {
    pub max_age: Duration,
    pub batch_size: usize,
    pub batch_delay: Duration,
    pub sample_size: usize,
    pub resolve_timeout: Duration,
    pub probe_timeout: Duration,
    pub maintenance_interval: Duration,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            max_age: DEFAULT_MAX_AGE,
            batch_size: DEFAULT_BATCH_SIZE,
            batch_delay: DEFAULT_BATCH_DELAY,
            sample_size: DEFAULT_SAMPLE_SIZE,
            resolve_timeout: DEFAULT_RESOLVE_TIMEOUT,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            maintenance_interval: DEFAULT_MAINTENANCE_INTERVAL,
        }
    }
}

/// Install the global `tracing` subscriber.
///
/// Panics if a global subscriber is already set.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_env(RUST_LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let json = std::env::var(LOG_FORMAT_ENV)
        .map(|f| f.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}
