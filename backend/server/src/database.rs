//! # Realtime Database
//!
//! Hosted JSON tree holding every collection.
//!
//! Core purpose is to keep task, chat and trip records plus one integer counter per
//! collection. Everything durable lives there, the server itself keeps no records.
//!
//! ## Requirements
//!
//! - Path addressed reads and writes
//! - Whole-collection reads for listing and id scans
//! - Conditional writes when ids are allocated transactionally
//!
//! ## Implementation
//!
//! - REST API, one request per store call, each bounded by `STORE_TIMEOUT_MS`
//! - Service account JSON when present, else the legacy database secret, else anonymous
//! - `STORE_BACKEND=memory` swaps in an in-process tree, nothing survives a restart
use std::sync::Arc;

use anyhow::Context;
use store::{Credentials, FirebaseStore, MemoryStore, RecordStore, ServiceAccount};
use tracing::{info, warn};

use crate::config::{Backend, Config};

pub fn init_store(config: &Config) -> anyhow::Result<Arc<dyn RecordStore>> {
    let firebase = match &config.backend {
        Backend::Memory => {
            warn!("Using the in-memory store, records are lost on restart");
            return Ok(Arc::new(MemoryStore::new()));
        }
        Backend::Firebase(firebase) => firebase,
    };

    let credentials = match (&firebase.service_account, &firebase.secret) {
        (Some(blob), _) => {
            let account =
                ServiceAccount::from_json(blob).context("FIREBASE_SERVICE_ACCOUNT is not valid")?;
            info!("Authenticating as {}", account.client_email);
            Credentials::service_account(account)
        }
        (None, Some(secret)) => Credentials::Secret(secret.clone()),
        (None, None) => {
            warn!("No database credentials configured, connecting anonymously");
            Credentials::Anonymous
        }
    };

    let store = FirebaseStore::new(&firebase.database_url, credentials, config.store_timeout)?;
    info!("Using database at {}", firebase.database_url);

    Ok(Arc::new(store))
}
