//! Shared state handed to every stage.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::canbus::CanSetup;
use crate::discovery::IdentityDiscovery;
use crate::errors::ProvisionResult;
use crate::firmware::FirmwareDeployer;
use crate::host::HostApplication;
use crate::layout::FilesystemLayout;
use crate::options::ProvisionOptions;
use crate::poll::Poller;
use crate::probe::HardwareProbes;
use crate::prompt::Confirm;
use crate::runner::CommandRunner;
use crate::service::ServiceManager;
use crate::setup::PackageInstaller;
use crate::state::{ProvisioningState, StateStore};

/// Collaborators and the in-memory provisioning record.
///
/// Components are built on demand from the options; nothing here is global.
/// The record is loaded once at construction and written back whole by
/// [`StageContext::update`].
pub struct StageContext {
    options: Arc<ProvisionOptions>,
    layout: FilesystemLayout,
    runner: Arc<dyn CommandRunner>,
    confirm: Arc<dyn Confirm>,
    store: StateStore,
    state: ProvisioningState,
    continuation_binary: Option<PathBuf>,
}

impl StageContext {
    pub fn new(
        options: ProvisionOptions,
        runner: Arc<dyn CommandRunner>,
        confirm: Arc<dyn Confirm>,
    ) -> Self {
        let layout = options.layout();
        let store = StateStore::new(layout.state_file());
        let state = store.load();
        Self {
            options: Arc::new(options),
            layout,
            runner,
            confirm,
            store,
            state,
            continuation_binary: None,
        }
    }

    /// Executable installed as the continuation service. Defaults to the
    /// running executable.
    pub fn with_continuation_binary(mut self, path: impl Into<PathBuf>) -> Self {
        self.continuation_binary = Some(path.into());
        self
    }

    pub fn continuation_binary(&self) -> ProvisionResult<PathBuf> {
        match &self.continuation_binary {
            Some(path) => Ok(path.clone()),
            None => Ok(std::env::current_exe()?),
        }
    }

    pub fn options(&self) -> &ProvisionOptions {
        &self.options
    }

    pub fn layout(&self) -> &FilesystemLayout {
        &self.layout
    }

    pub fn home_dir(&self) -> &Path {
        self.layout.home_dir()
    }

    pub fn runner(&self) -> Arc<dyn CommandRunner> {
        Arc::clone(&self.runner)
    }

    pub fn state(&self) -> &ProvisioningState {
        &self.state
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    /// Apply `change` to a copy of the record and persist it whole.
    ///
    /// Nothing is written when `change` fails or reports no change; the
    /// in-memory record only moves forward once the save succeeded.
    pub fn update<F>(&mut self, change: F) -> ProvisionResult<bool>
    where
        F: FnOnce(&mut ProvisioningState) -> ProvisionResult<bool>,
    {
        let mut next = self.state.clone();
        if !change(&mut next)? {
            return Ok(false);
        }
        self.store.save(&next)?;
        self.state = next;
        Ok(true)
    }

    pub async fn confirm(&self, message: &str) -> ProvisionResult<()> {
        self.confirm.await_confirmation(message).await
    }

    /// Indefinite wait with an operator present.
    pub fn interactive_poller(&self) -> Poller {
        Poller::new(self.options.poll.interactive_interval())
    }

    /// Bounded wait for the headless continuation.
    pub fn continuation_poller(&self) -> Poller {
        Poller::new(self.options.poll.continuation_interval())
            .with_timeout(self.options.poll.continuation_timeout())
    }

    pub fn probes(&self) -> HardwareProbes {
        HardwareProbes::new(self.runner(), &self.options.probes, &self.options.can)
    }

    pub fn services(&self) -> ServiceManager {
        ServiceManager::new(
            self.runner(),
            &self.options.service,
            self.options.privileged,
            self.layout.temp_dir(),
        )
    }

    pub fn host(&self) -> HostApplication {
        HostApplication::new(
            self.services(),
            &self.options.host,
            &self.options.can,
            &self.options.probes,
        )
    }

    pub fn discovery(&self) -> ProvisionResult<IdentityDiscovery> {
        Ok(IdentityDiscovery::new(self.runner(), self.host().query_spec()?))
    }

    pub fn can(&self) -> CanSetup {
        CanSetup::new(
            self.runner(),
            &self.options.can,
            self.options.privileged,
            self.layout.temp_dir(),
        )
    }

    pub fn packages(&self) -> PackageInstaller {
        PackageInstaller::new(self.runner(), self.options.privileged)
    }

    pub fn deployer(&self, poller: Poller) -> FirmwareDeployer {
        FirmwareDeployer::new(
            self.runner(),
            &self.options.host,
            &self.options.firmware,
            self.probes(),
            poller,
            self.options.privileged,
        )
    }
}
