//! Service configuration loaded from environment variables.

use std::path::PathBuf;

const DEFAULT_PORT: u16 = 8080;

/// Runtime settings for the chat service.
///
/// Environment variables:
/// - `MKCHAT_PORT`: HTTP listen port (default: 8080)
/// - `MKCHAT_DATA_DIR`: directory for topic documents; unset means in-memory storage
/// - `MKCHAT_ASSISTANTS_FILE`: path to the assistant registry JSON
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub port: u16,
    pub data_dir: Option<PathBuf>,
    pub assistants_file: Option<PathBuf>,
}

impl ServiceConfig {
    pub fn from_env() -> Self {
        Self {
            port: std::env::var("MKCHAT_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_PORT),
            data_dir: std::env::var("MKCHAT_DATA_DIR").ok().map(PathBuf::from),
            assistants_file: std::env::var("MKCHAT_ASSISTANTS_FILE")
                .ok()
                .map(PathBuf::from),
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            data_dir: None,
            assistants_file: None,
        }
    }
}
