//! Toolchain presence.

use async_trait::async_trait;

use crate::errors::ProvisionResult;
use crate::workflow::{Stage, StageContext};

/// Install the build and flash tools that are not on `PATH`.
pub struct Environment;

#[async_trait]
impl Stage for Environment {
    fn name(&self) -> &'static str {
        "environment"
    }

    async fn run(&self, ctx: &mut StageContext) -> ProvisionResult<()> {
        let installed = ctx.packages().ensure().await?;
        if !installed.is_empty() {
            tracing::info!(packages = %installed.join(" "), "Installed missing tools");
        }
        Ok(())
    }
}
