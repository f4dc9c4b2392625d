//! Server settings

use fieldbook_ingest::IngestConfig;
use serde::{Deserialize, Serialize};

/// Default bind address
pub const DEFAULT_ADDR: &str = "127.0.0.1:8080";

/// Maximum request body size (1MB)
pub const MAX_BODY_SIZE: usize = 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub addr: String,

    /// Bearer token of the import route; import is refused when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub import_token: Option<String>,

    /// Origins allowed by CORS
    pub allowed_origins: Vec<String>,

    pub ingest: IngestConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: DEFAULT_ADDR.to_string(),
            import_token: None,
            allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://127.0.0.1:3000".to_string(),
            ],
            ingest: IngestConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn with_import_token(mut self, token: impl Into<String>) -> Self {
        self.import_token = Some(token.into());
        self
    }

    pub fn with_ingest(mut self, ingest: IngestConfig) -> Self {
        self.ingest = ingest;
        self
    }
}
