//! CAN link: wait for the bridge interface, then configure it.

use async_trait::async_trait;

use super::Checkpoint;
use crate::errors::ProvisionResult;
use crate::state::ProvisioningState;
use crate::workflow::{Stage, StageContext};

/// Wait for the interface the freshly flashed bridge creates.
pub struct CanLink;

#[async_trait]
impl Stage for CanLink {
    fn name(&self) -> &'static str {
        "can-link"
    }

    fn is_complete(&self, state: &ProvisioningState) -> bool {
        Checkpoint::Fps.reached(state)
    }

    async fn run(&self, ctx: &mut StageContext) -> ProvisionResult<()> {
        let probes = ctx.probes();
        let what = format!("CAN interface {}", ctx.options().can.interface);
        ctx.interactive_poller()
            .require_true(&what, || probes.link_present())
            .await
    }
}

pub struct CanConfigure;

#[async_trait]
impl Stage for CanConfigure {
    fn name(&self) -> &'static str {
        "can-setup"
    }

    fn is_complete(&self, state: &ProvisioningState) -> bool {
        Checkpoint::Fps.reached(state)
    }

    async fn run(&self, ctx: &mut StageContext) -> ProvisionResult<()> {
        ctx.can().apply().await
    }
}
