//! OpenAMS provisioning.
//!
//! Flashes the FPS sensor board and the OpenAMS mainboard, brings up the CAN
//! link, discovers the boards' identifiers and binds them into the Klipper
//! configuration. The workflow is split between an interactive front end and
//! a headless continuation that survives the host reboot in between; the two
//! hand off through the persisted [`ProvisioningState`].

pub mod canbus;
pub mod discovery;
pub mod errors;
pub mod firmware;
pub mod host;
pub mod layout;
pub mod logging;
pub mod options;
pub mod poll;
pub mod probe;
pub mod prompt;
pub mod runner;
pub mod service;
pub mod setup;
pub mod state;
pub mod util;
pub mod workflow;

pub use discovery::{Disambiguation, Identifier, IdentityDiscovery};
pub use errors::{ProvisionError, ProvisionResult};
pub use layout::FilesystemLayout;
pub use options::ProvisionOptions;
pub use poll::{Poller, Readiness};
pub use runner::{CommandRunner, CommandSpec, OutputMode, SystemRunner};
pub use state::{ProvisioningState, StateLock, StateStore};
pub use workflow::{Outcome, Portion, Sequencer, StageContext};
