//! Operator synchronization barriers.

use async_trait::async_trait;

use super::Checkpoint;
use crate::errors::ProvisionResult;
use crate::state::ProvisioningState;
use crate::workflow::{Stage, StageContext};

/// Block until the operator confirms a physical step.
pub struct OperatorPrompt {
    name: &'static str,
    message: &'static str,
    checkpoint: Checkpoint,
}

impl OperatorPrompt {
    pub fn fps_jumper() -> Self {
        Self {
            name: "fps-jumper",
            message: "Place the BOOT jumper on the FPS board and connect it to this host over USB.",
            checkpoint: Checkpoint::Fps,
        }
    }

    pub fn fps_reconnect() -> Self {
        Self {
            name: "fps-reconnect",
            message: "Remove the BOOT jumper from the FPS board, then unplug it and plug it back in.",
            checkpoint: Checkpoint::Fps,
        }
    }

    pub fn hardware_install() -> Self {
        Self {
            name: "hardware-install",
            message: "Install the FPS and the mainboard and make all connections. \
                      Restart the printer after pressing Enter; provisioning resumes on its own.",
            checkpoint: Checkpoint::Never,
        }
    }

    pub fn message(&self) -> &str {
        self.message
    }
}

#[async_trait]
impl Stage for OperatorPrompt {
    fn name(&self) -> &'static str {
        self.name
    }

    fn is_complete(&self, state: &ProvisioningState) -> bool {
        self.checkpoint.reached(state)
    }

    async fn run(&self, ctx: &mut StageContext) -> ProvisionResult<()> {
        ctx.confirm(self.message).await
    }
}
