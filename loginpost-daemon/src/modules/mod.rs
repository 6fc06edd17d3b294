//! Daemon modules.
//!
//! The daemon drives one pipeline, the login reader. [`ModuleHandle`]
//! pairs it with its name and tracks whether it is running, so a stop
//! after a failed or skipped start is a no-op.

pub mod login_reader;

use loginpost_core::pipeline::DynPipeline;

use crate::health::ModuleHealth;

/// A built module and its lifecycle state.
pub struct ModuleHandle {
    name: &'static str,
    pipeline: Box<dyn DynPipeline>,
    running: bool,
}

impl ModuleHandle {
    pub fn new(name: &'static str, pipeline: Box<dyn DynPipeline>) -> Self {
        Self {
            name,
            pipeline,
            running: false,
        }
    }

    /// Module name used in logs and health reports.
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Start the pipeline.
    pub async fn start(&mut self) -> anyhow::Result<()> {
        tracing::info!(module = self.name, "starting module");
        self.pipeline
            .start()
            .await
            .map_err(|e| anyhow::anyhow!("failed to start module '{}': {}", self.name, e))?;
        self.running = true;
        Ok(())
    }

    /// Stop the pipeline if it was started.
    pub async fn stop(&mut self) -> anyhow::Result<()> {
        if !self.running {
            tracing::debug!(module = self.name, "module not running, nothing to stop");
            return Ok(());
        }
        self.running = false;

        tracing::info!(module = self.name, "stopping module");
        self.pipeline.stop().await.map_err(|e| {
            tracing::error!(module = self.name, error = %e, "failed to stop module");
            anyhow::anyhow!("failed to stop module '{}': {}", self.name, e)
        })
    }

    pub async fn health(&self) -> ModuleHealth {
        ModuleHealth {
            name: self.name.to_owned(),
            status: self.pipeline.health_check().await,
        }
    }
}
