//! Klipper around provisioning: stopped before flashing, configured and
//! restarted once both boards are known.

use async_trait::async_trait;

use crate::errors::ProvisionResult;
use crate::workflow::{Stage, StageContext};

pub struct StopHost;

#[async_trait]
impl Stage for StopHost {
    fn name(&self) -> &'static str {
        "stop-host"
    }

    async fn run(&self, ctx: &mut StageContext) -> ProvisionResult<()> {
        ctx.host().stop_if_active().await?;
        Ok(())
    }
}

pub struct HostConfig;

#[async_trait]
impl Stage for HostConfig {
    fn name(&self) -> &'static str {
        "host-config"
    }

    async fn run(&self, ctx: &mut StageContext) -> ProvisionResult<()> {
        ctx.host().write_config(ctx.state())?;
        Ok(())
    }
}

pub struct StartHost;

#[async_trait]
impl Stage for StartHost {
    fn name(&self) -> &'static str {
        "start-host"
    }

    async fn run(&self, ctx: &mut StageContext) -> ProvisionResult<()> {
        ctx.host().start().await
    }
}

pub struct Summary;

#[async_trait]
impl Stage for Summary {
    fn name(&self) -> &'static str {
        "summary"
    }

    async fn run(&self, ctx: &mut StageContext) -> ProvisionResult<()> {
        tracing::info!("OpenAMS setup summary");
        for (component, uuid) in ctx.state().summary_rows() {
            tracing::info!("  {:<10} {}", component, uuid);
        }
        tracing::info!("Log file: {}", ctx.layout().log_file().display());
        Ok(())
    }
}
