//! Operator synchronization points.
//!
//! A confirmation carries no data; it blocks until a human has done the
//! physical step (placing a jumper, replugging a board).

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::errors::{ProvisionError, ProvisionResult};

#[async_trait]
pub trait Confirm: Send + Sync {
    async fn await_confirmation(&self, message: &str) -> ProvisionResult<()>;
}

/// Prints the instruction and waits for Enter on stdin.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalConfirm;

#[async_trait]
impl Confirm for TerminalConfirm {
    async fn await_confirmation(&self, message: &str) -> ProvisionResult<()> {
        tracing::info!("Awaiting operator: {}", message);

        let mut stdout = tokio::io::stdout();
        stdout
            .write_all(format!("\n{}\nPress Enter to continue... ", message).as_bytes())
            .await?;
        stdout.flush().await?;

        let mut line = String::new();
        let read = BufReader::new(tokio::io::stdin()).read_line(&mut line).await?;
        if read == 0 {
            return Err(ProvisionError::PreconditionUnmet(
                "no operator input (stdin closed); run `openams assist` from a terminal".to_string(),
            ));
        }
        tracing::debug!("Operator confirmed");
        Ok(())
    }
}
