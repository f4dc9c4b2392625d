//! Fieldbook Server - HTTP surface of the ingestion pipeline
//!
//! Routes:
//! - `POST /api/upload/:project_id` uploads from collectors
//! - `POST /api/import/:project_id` private server-to-server import
//! - `POST /api/unique/:project_id` pre-submission uniqueness check
//! - `GET /health`

pub mod auth;
pub mod config;
pub mod response;
pub mod routes;

pub use config::ServerConfig;
pub use routes::{create_router, run_server, AppState};
