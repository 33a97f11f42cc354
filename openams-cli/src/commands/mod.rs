pub mod assist;
pub mod canbus;
pub mod deploy;
pub mod host_config;
pub mod query;
pub mod resume;
pub mod service;
pub mod setup;
pub mod status;

use std::sync::Arc;

use openams::options::ProvisionOptions;
use openams::prompt::TerminalConfirm;
use openams::{OutputMode, StageContext, SystemRunner};

/// Stage context backed by real processes and the terminal.
pub(crate) fn context(options: ProvisionOptions, mode: OutputMode) -> StageContext {
    StageContext::new(
        options,
        Arc::new(SystemRunner::new(mode)),
        Arc::new(TerminalConfirm),
    )
}
