//! docket - task and document tracking API
//!
//! This crate provides REST management of divisions, tasks and their documents with:
//! - A document lifecycle that keeps database rows and stored files consistent
//! - A traversal-guarded file server over a primary root and a public mirror
//! - redb embedded database for records (ACID, MVCC, crash-safe)
//! - REST API accepting multipart uploads or JSON bodies

pub mod api;
pub mod config;
pub mod content_type;
pub mod credentials;
pub mod file_server;
pub mod lifecycle;
pub mod object_store;
pub mod storage;
pub mod validation;

use std::sync::Arc;

use config::Config;
use file_server::FileServer;
use lifecycle::DocumentLifecycle;
use object_store::ObjectStore;
use storage::Database;

/// Shared application state
pub struct AppState {
    pub config: Config,
    pub db: Database,
    pub lifecycle: DocumentLifecycle,
    pub file_server: FileServer,
}

impl AppState {
    pub fn new(config: Config, db: Database, object_store: Arc<dyn ObjectStore>) -> Self {
        let lifecycle = DocumentLifecycle::new(db.clone(), object_store, config.max_upload_size);
        let file_server = FileServer::from_config(&config.storage);
        Self {
            config,
            db,
            lifecycle,
            file_server,
        }
    }
}
