//! Mainboard: flash it as a CAN node, and (after the reboot) tell it apart
//! from the FPS on the bus.

use async_trait::async_trait;

use super::Checkpoint;
use crate::discovery::Disambiguation;
use crate::errors::{ProvisionError, ProvisionResult};
use crate::firmware::{Board, DeployRequest, FlashMode, ToolPolicy};
use crate::state::ProvisioningState;
use crate::workflow::{Stage, StageContext};

pub struct MainboardFlash {
    pub programmer: ToolPolicy,
}

#[async_trait]
impl Stage for MainboardFlash {
    fn name(&self) -> &'static str {
        "mainboard-flash"
    }

    fn is_complete(&self, state: &ProvisioningState) -> bool {
        Checkpoint::Mainboard.reached(state)
    }

    async fn run(&self, ctx: &mut StageContext) -> ProvisionResult<()> {
        tracing::info!("Connect the mainboard over USB with its BOOT jumper in place");
        let request = DeployRequest {
            board: Board::Mainboard,
            mode: FlashMode::Canbus,
            programmer: self.programmer,
        };
        ctx.deployer(ctx.interactive_poller())
            .deploy(&request)
            .await
    }
}

/// Wait for the FPS plus exactly one other board, and record the other.
pub struct MainboardIdentity;

#[async_trait]
impl Stage for MainboardIdentity {
    fn name(&self) -> &'static str {
        "mainboard-identity"
    }

    fn is_complete(&self, state: &ProvisioningState) -> bool {
        Checkpoint::Mainboard.reached(state)
    }

    async fn run(&self, ctx: &mut StageContext) -> ProvisionResult<()> {
        let fps = ctx.state().fps().cloned().ok_or_else(|| {
            ProvisionError::PreconditionUnmet(
                "FPS identity not recorded; run `openams assist` first".to_string(),
            )
        })?;

        let discovery = ctx.discovery()?;
        let discovery = &discovery;
        let known = &fps;
        let mainboard = ctx
            .continuation_poller()
            .require("FPS and mainboard on the CAN bus", move || {
                async move {
                    match discovery.disambiguate(known).await? {
                        Disambiguation::Resolved(other) => Ok(Some(other)),
                        Disambiguation::Pending => Ok(None),
                        Disambiguation::Ambiguous(found) => {
                            let ids: Vec<&str> = found.iter().map(|id| id.as_str()).collect();
                            Err(ProvisionError::Ambiguous(format!(
                                "{} boards on the bus besides the FPS: {}",
                                found.len() - 1,
                                ids.join(", ")
                            )))
                        }
                    }
                }
            })
            .await?;

        ctx.update(|state| state.record_mainboard(mainboard.clone()))?;
        tracing::info!(uuid = %mainboard, "Mainboard identity recorded");
        Ok(())
    }
}
