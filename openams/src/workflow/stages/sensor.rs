//! FPS sensor board: flash it as a USB-to-CAN bridge and record its identity.

use async_trait::async_trait;

use super::Checkpoint;
use crate::errors::ProvisionResult;
use crate::firmware::{Board, DeployRequest, FlashMode, ToolPolicy};
use crate::state::ProvisioningState;
use crate::workflow::{Stage, StageContext};

pub struct FpsBootloader;

#[async_trait]
impl Stage for FpsBootloader {
    fn name(&self) -> &'static str {
        "fps-bootloader"
    }

    fn is_complete(&self, state: &ProvisioningState) -> bool {
        Checkpoint::Fps.reached(state)
    }

    async fn run(&self, ctx: &mut StageContext) -> ProvisionResult<()> {
        ctx.deployer(ctx.interactive_poller())
            .wait_for_bootloader()
            .await
    }
}

pub struct FpsFlash {
    pub programmer: ToolPolicy,
}

#[async_trait]
impl Stage for FpsFlash {
    fn name(&self) -> &'static str {
        "fps-flash"
    }

    fn is_complete(&self, state: &ProvisioningState) -> bool {
        Checkpoint::Fps.reached(state)
    }

    async fn run(&self, ctx: &mut StageContext) -> ProvisionResult<()> {
        let request = DeployRequest {
            board: Board::Fps,
            mode: FlashMode::Bridge,
            programmer: self.programmer,
        };
        ctx.deployer(ctx.interactive_poller())
            .deploy(&request)
            .await
    }
}

/// The FPS is the only board on the bus at this point, so exactly one
/// identity must answer.
pub struct FpsIdentity;

#[async_trait]
impl Stage for FpsIdentity {
    fn name(&self) -> &'static str {
        "fps-identity"
    }

    fn is_complete(&self, state: &ProvisioningState) -> bool {
        Checkpoint::Fps.reached(state)
    }

    async fn run(&self, ctx: &mut StageContext) -> ProvisionResult<()> {
        let fps = ctx.discovery()?.discover_single().await?;
        ctx.update(|state| state.record_fps(fps.clone()))?;
        tracing::info!(uuid = %fps, "FPS identity recorded");
        Ok(())
    }
}
