//! Runtime configuration loaded from the environment

use std::net::SocketAddr;
use std::path::PathBuf;

pub const DEFAULT_GRID_SIZE: usize = 5;
pub const MAX_GRID_SIZE: usize = 15;
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;
pub const DEFAULT_MAX_RESOLUTION_CHARS: usize = 500;

#[derive(Debug, Clone)]
pub struct BingoConfig {
    /// Side length of every card. Always odd so the joker has a true center.
    pub grid_size: usize,
    /// Directory the local blob store writes proof images into
    pub uploads_dir: PathBuf,
    /// Largest accepted proof upload
    pub max_upload_bytes: usize,
    /// Longest accepted resolution text, in characters
    pub max_resolution_chars: usize,
    pub bind_addr: SocketAddr,
}

impl Default for BingoConfig {
    fn default() -> Self {
        Self {
            grid_size: DEFAULT_GRID_SIZE,
            uploads_dir: PathBuf::from("./uploads"),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            max_resolution_chars: DEFAULT_MAX_RESOLUTION_CHARS,
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
        }
    }
}

impl BingoConfig {
    /// Load configuration from environment variables.
    /// Unparseable or out-of-range values fall back to the defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let grid_size = match env_trimmed("BINGO_GRID_SIZE") {
            Some(raw) => match raw.parse::<usize>() {
                Ok(n) if is_valid_grid_size(n) => n,
                _ => {
                    tracing::warn!(
                        "BINGO_GRID_SIZE={} is not an odd number between 1 and {}, using {}",
                        raw,
                        MAX_GRID_SIZE,
                        DEFAULT_GRID_SIZE
                    );
                    DEFAULT_GRID_SIZE
                }
            },
            None => DEFAULT_GRID_SIZE,
        };

        let uploads_dir = env_trimmed("UPLOADS_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.uploads_dir);

        let max_upload_bytes = env_trimmed("MAX_UPLOAD_BYTES")
            .and_then(|s| s.parse().ok())
            .filter(|n: &usize| *n > 0)
            .unwrap_or(defaults.max_upload_bytes);

        let max_resolution_chars = env_trimmed("MAX_RESOLUTION_CHARS")
            .and_then(|s| s.parse().ok())
            .filter(|n: &usize| *n > 0)
            .unwrap_or(defaults.max_resolution_chars);

        let bind_addr = match env_trimmed("BIND_ADDR") {
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                tracing::warn!("BIND_ADDR={} is not a socket address, using default", raw);
                defaults.bind_addr
            }),
            None => defaults.bind_addr,
        };

        Self {
            grid_size,
            uploads_dir,
            max_upload_bytes,
            max_resolution_chars,
            bind_addr,
        }
    }
}

/// A grid needs a true center cell for the joker and must stay small enough to lay out
pub fn is_valid_grid_size(n: usize) -> bool {
    n % 2 == 1 && n <= MAX_GRID_SIZE
}

fn env_trimmed(key: &str) -> Option<String> {
    std::env::var(key).ok().and_then(|v| {
        let trimmed = v.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}
