//! Shared application state, passed explicitly to everything that needs it.
//!
//! One `AppState` is built at startup and wrapped in `Arc`. It owns the seams
//! to the outside world (database path, attachment store, realtime hub, AI
//! and payment clients); request handlers borrow from it rather than reaching
//! for globals. Tests build it against a temp directory and mock clients.

use std::path::PathBuf;
use std::sync::Arc;

use rusqlite::Connection;

use crate::attachments::AttachmentStore;
use crate::config::ServiceConfig;
use crate::db::{self, DatabaseError};
use crate::payments::{HttpPaymentClient, PaymentClient, PAYMENT_TIMEOUT_SECS};
use crate::realtime::ChangeHub;
use crate::triage::{CompletionClient, HttpCompletionClient, COMPLETION_TIMEOUT_SECS};

pub struct AppState {
    db_path: PathBuf,
    pub hub: ChangeHub,
    pub attachments: AttachmentStore,
    pub ai: Arc<dyn CompletionClient>,
    pub payments: Arc<dyn PaymentClient>,
}

impl AppState {
    pub fn new(
        db_path: PathBuf,
        attachments: AttachmentStore,
        ai: Arc<dyn CompletionClient>,
        payments: Arc<dyn PaymentClient>,
    ) -> Self {
        Self {
            db_path,
            hub: ChangeHub::new(),
            attachments,
            ai,
            payments,
        }
    }

    /// Wire up production state from config: file-backed database, on-disk
    /// attachment store, HTTP clients for the AI and payment providers.
    pub fn from_config(config: &ServiceConfig) -> std::io::Result<Self> {
        let data_dir = crate::config::app_data_dir();
        std::fs::create_dir_all(&data_dir)?;
        let attachments = AttachmentStore::new(crate::config::attachments_dir())?;

        Ok(Self::new(
            crate::config::database_path(),
            attachments,
            Arc::new(HttpCompletionClient::new(
                &config.ai_base_url,
                &config.ai_api_key,
                &config.ai_model,
                COMPLETION_TIMEOUT_SECS,
            )),
            Arc::new(HttpPaymentClient::new(
                &config.payment_base_url,
                &config.payment_secret_key,
                PAYMENT_TIMEOUT_SECS,
            )),
        ))
    }

    /// Open a connection for one operation. Opening is cheap under WAL and
    /// the migration check is a single version lookup once the schema is
    /// current.
    pub fn open_db(&self) -> Result<Connection, DatabaseError> {
        db::open_database(&self.db_path)
    }
}
