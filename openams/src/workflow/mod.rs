//! Provisioning sequence.
//!
//! ## Architecture
//!
//! The sequence is split into two portions run by separate processes:
//!
//! ```text
//! front end (operator present)                 continuation (service)
//! environment → stop-host → fps-* → can-* →    mainboard-identity →
//! mainboard-flash → hardware-install           host-config → start-host → summary
//!        │                                            │
//!        └──→ install continuation service            └──→ uninstall service
//!                (handoff)            reboot                 (complete)
//! ```
//!
//! Stages run strictly in order. A stage whose checkpoint is already in
//! the persisted record is skipped, which makes re-running after a failure
//! safe. Any stage error aborts the whole portion; nothing is rolled back.

mod context;
pub mod stages;

pub use context::StageContext;

use async_trait::async_trait;

use crate::errors::ProvisionResult;
use crate::firmware::ToolPolicy;
use crate::state::ProvisioningState;

#[async_trait]
pub trait Stage: Send + Sync {
    fn name(&self) -> &'static str;

    /// The stage's checkpoint is already recorded.
    fn is_complete(&self, _state: &ProvisioningState) -> bool {
        false
    }

    async fn run(&self, ctx: &mut StageContext) -> ProvisionResult<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Portion {
    FrontEnd,
    Continuation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The continuation service is installed and owns the rest.
    Handoff,
    /// Provisioning finished and the service removed itself.
    Complete,
}

pub struct Sequencer {
    portion: Portion,
    stages: Vec<Box<dyn Stage>>,
}

impl Sequencer {
    /// The interactive portion. `programmer` governs a missing option-byte
    /// programmer during flashing.
    pub fn front_end(programmer: ToolPolicy) -> Self {
        Self::with_stages(Portion::FrontEnd, stages::front_end(programmer))
    }

    pub fn continuation() -> Self {
        Self::with_stages(Portion::Continuation, stages::continuation())
    }

    pub fn with_stages(portion: Portion, stages: Vec<Box<dyn Stage>>) -> Self {
        Self { portion, stages }
    }

    pub fn portion(&self) -> Portion {
        self.portion
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Run every stage, then the portion's terminal action.
    pub async fn run(&self, ctx: &mut StageContext) -> ProvisionResult<Outcome> {
        let total = self.stages.len();
        tracing::info!(portion = ?self.portion, stages = total, "Starting provisioning");

        for (index, stage) in self.stages.iter().enumerate() {
            let step = index + 1;
            if stage.is_complete(ctx.state()) {
                tracing::info!("Step {}/{}: {} (already complete)", step, total, stage.name());
                continue;
            }

            tracing::info!("Step {}/{}: {}", step, total, stage.name());
            if let Err(e) = stage.run(ctx).await {
                if e.is_timeout() {
                    tracing::error!(stage = stage.name(), "Hardware never appeared: {}", e);
                } else {
                    tracing::error!(stage = stage.name(), "Stage failed: {}", e);
                }
                return Err(e);
            }
        }

        self.finish(ctx).await
    }

    async fn finish(&self, ctx: &mut StageContext) -> ProvisionResult<Outcome> {
        let services = ctx.services();
        match self.portion {
            Portion::FrontEnd => {
                let binary = ctx.continuation_binary()?;
                let unit = services.continuation_unit(ctx.home_dir());
                services.install(&binary, &unit).await?;
                tracing::info!("Handed off to the {} service", unit.name);
                Ok(Outcome::Handoff)
            }
            Portion::Continuation => {
                services.uninstall(&ctx.options().service.name).await?;
                tracing::info!("Provisioning complete");
                Ok(Outcome::Complete)
            }
        }
    }
}
