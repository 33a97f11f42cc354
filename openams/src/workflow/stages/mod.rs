//! Provisioning stages.
//!
//! Front end:
//!
//! ```text
//! environment → stop-host → fps-jumper → fps-bootloader → fps-flash →
//! fps-reconnect → can-link → can-setup → fps-identity → mainboard-flash →
//! hardware-install
//! ```
//!
//! Continuation:
//!
//! ```text
//! mainboard-identity → host-config → start-host → summary
//! ```

pub mod canbus;
pub mod environment;
pub mod host;
pub mod mainboard;
pub mod operator;
pub mod sensor;

use super::Stage;
use crate::firmware::ToolPolicy;
use crate::state::ProvisioningState;

/// Which recorded identity marks a stage as done.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Checkpoint {
    /// Always runs.
    Never,
    /// Done once the FPS identity is recorded.
    Fps,
    /// Done once the mainboard identity is recorded.
    Mainboard,
}

impl Checkpoint {
    pub fn reached(self, state: &ProvisioningState) -> bool {
        match self {
            Checkpoint::Never => false,
            Checkpoint::Fps => state.fps().is_some(),
            Checkpoint::Mainboard => state.mainboard().is_some(),
        }
    }
}

pub fn front_end(programmer: ToolPolicy) -> Vec<Box<dyn Stage>> {
    vec![
        Box::new(environment::Environment),
        Box::new(host::StopHost),
        Box::new(operator::OperatorPrompt::fps_jumper()),
        Box::new(sensor::FpsBootloader),
        Box::new(sensor::FpsFlash { programmer }),
        Box::new(operator::OperatorPrompt::fps_reconnect()),
        Box::new(canbus::CanLink),
        Box::new(canbus::CanConfigure),
        Box::new(sensor::FpsIdentity),
        Box::new(mainboard::MainboardFlash { programmer }),
        Box::new(operator::OperatorPrompt::hardware_install()),
    ]
}

pub fn continuation() -> Vec<Box<dyn Stage>> {
    vec![
        Box::new(mainboard::MainboardIdentity),
        Box::new(host::HostConfig),
        Box::new(host::StartHost),
        Box::new(host::Summary),
    ]
}
