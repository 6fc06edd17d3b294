//! Login reader module initialization.
//!
//! Converts `LoginpostConfig.login` into a `ReaderConfig`, opens the
//! state store and optional passwd lookup, and wraps the resulting
//! `LoginPipeline` in a `ModuleHandle`.
//!
//! # Channel Wiring
//!
//! ```text
//! LoginPipeline --LoginRecord--> record_tx --> record logger
//! ```

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::mpsc;

use loginpost_core::config::LoginpostConfig;
use loginpost_core::event::{LoginRecord, MODULE_LOGIN_READER};
use loginpost_login_reader::{
    FileStateStore, LoginPipelineBuilder, PasswdLookup, ReaderConfig, UserLookup,
};

use super::ModuleHandle;

/// Initialize the login reader module.
///
/// # Returns
///
/// * `Ok(Some(ModuleHandle))` - Pipeline built and ready to start
/// * `Ok(None)` - Module disabled in configuration
/// * `Err(_)` - Configuration, state store or state restore failed
pub fn init(
    config: &LoginpostConfig,
    record_tx: mpsc::Sender<LoginRecord>,
) -> Result<Option<ModuleHandle>> {
    if !config.login.enabled {
        tracing::info!("login reader disabled in configuration");
        return Ok(None);
    }

    let reader_config = ReaderConfig::from_core(&config.login);
    let store = FileStateStore::open(&reader_config.state_dir)
        .map_err(|e| anyhow::anyhow!("failed to open state store: {}", e))?;

    let mut builder = LoginPipelineBuilder::new()
        .config(reader_config.clone())
        .store(Arc::new(store))
        .record_sender(record_tx);

    if let Some(users) = load_user_lookup(&reader_config) {
        builder = builder.user_lookup(users);
    }

    let (pipeline, _) = builder
        .build()
        .map_err(|e| anyhow::anyhow!("failed to build login reader: {}", e))?;

    Ok(Some(ModuleHandle::new(MODULE_LOGIN_READER, Box::new(pipeline))))
}

/// Load the passwd table when uid resolution is enabled.
///
/// A missing or unreadable passwd file only disables uid resolution.
fn load_user_lookup(config: &ReaderConfig) -> Option<Arc<dyn UserLookup>> {
    if !config.resolve_uids {
        return None;
    }

    match PasswdLookup::load(&config.passwd_path) {
        Ok(lookup) => {
            tracing::info!(path = %config.passwd_path, users = lookup.len(), "uid lookup loaded");
            Some(Arc::new(lookup))
        }
        Err(e) => {
            tracing::warn!(
                path = %config.passwd_path,
                error = %e,
                "failed to read passwd file, uid resolution disabled"
            );
            None
        }
    }
}
