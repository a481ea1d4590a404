//! Runtime configuration from the environment (and `.env`)

use pdfsign_core::DEFAULT_FETCH_TIMEOUT;
use std::path::PathBuf;
use std::time::Duration;

/// Request bodies carry base64 PDFs and `data:` signature images
pub const DEFAULT_MAX_BODY_BYTES: usize = 50 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    /// Directory uploaded and signed PDFs are written under
    pub upload_root: PathBuf,
    /// URL prefix the upload root is served from
    pub public_upload_prefix: String,
    pub fetch_timeout: Duration,
    /// Matte requests allowed to queue before callers wait
    pub matte_queue_depth: usize,
    /// Largest accepted request body
    pub max_body_bytes: usize,
}

impl Config {
    pub fn from_env() -> Self {
        let port = std::env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(3001);

        // Get database path from env or use default
        let database_url = std::env::var("DATABASE_URL").unwrap_or_else(|_| {
            let data_dir = dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("pdfsign-api");
            std::fs::create_dir_all(&data_dir).ok();
            format!("sqlite:{}/pdfsign.db?mode=rwc", data_dir.display())
        });

        let upload_root = std::env::var("UPLOAD_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("uploads"));

        let public_upload_prefix = std::env::var("PUBLIC_UPLOAD_PREFIX")
            .unwrap_or_else(|_| "/uploads".to_string());

        let fetch_timeout = std::env::var("FETCH_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_FETCH_TIMEOUT);

        let matte_queue_depth = std::env::var("MATTE_QUEUE_DEPTH")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(16);

        let max_body_bytes = std::env::var("MAX_BODY_BYTES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_MAX_BODY_BYTES);

        Self {
            port,
            database_url,
            upload_root,
            public_upload_prefix,
            fetch_timeout,
            matte_queue_depth,
            max_body_bytes,
        }
    }

    /// Config for tests: in-memory database, uploads under `upload_root`
    pub fn for_tests(upload_root: PathBuf) -> Self {
        Self {
            port: 0,
            database_url: "sqlite::memory:".to_string(),
            upload_root,
            public_upload_prefix: "/uploads".to_string(),
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            matte_queue_depth: 4,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

/// Get platform-specific data directory
mod dirs {
    use std::path::PathBuf;

    pub fn data_dir() -> Option<PathBuf> {
        #[cfg(target_os = "macos")]
        {
            std::env::var("HOME")
                .ok()
                .map(|h| PathBuf::from(h).join("Library/Application Support"))
        }
        #[cfg(target_os = "linux")]
        {
            std::env::var("XDG_DATA_HOME")
                .ok()
                .map(PathBuf::from)
                .or_else(|| {
                    std::env::var("HOME")
                        .ok()
                        .map(|h| PathBuf::from(h).join(".local/share"))
                })
        }
        #[cfg(target_os = "windows")]
        {
            std::env::var("APPDATA").ok().map(PathBuf::from)
        }
        #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
        {
            None
        }
    }
}
