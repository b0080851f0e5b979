//! # Color Quality Backend
//!
//! Non-UI logic for the color quality tracker: the SQLite record store, the
//! spreadsheet report exporter and the HTTP API a data-entry front end talks to.
//!
//! ## Architecture
//!
//! ```text
//! Form front end
//!     ↓
//! rest      (axum handlers)
//!     ↓
//! domain    (QualityService)   export (ExportService)
//!     ↓                            ↓
//! db        (DbConnection, quality_data table)
//! ```

pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod export;
pub mod rest;
mod search;

use tracing::info;

pub use config::AppConfig;
pub use db::DbConnection;
pub use domain::QualityService;
pub use error::{ExportError, StorageError};
pub use export::ExportService;
pub use rest::{create_router, AppState};

/// Open the database and build the services the API needs
pub async fn initialize_backend(
    config: &AppConfig,
) -> Result<(AppState, DbConnection), StorageError> {
    info!("Setting up database");
    let db_conn = DbConnection::new(&config.database_url).await?;

    info!("Setting up domain model");
    let quality_service = QualityService::new(db_conn.clone());
    let export_service = ExportService::new(db_conn.clone(), config.export_path.clone());
    info!("Reports export to {:?} by default", export_service.default_path());

    Ok((AppState::new(quality_service, export_service), db_conn))
}
