//! Test doubles for OpenAMS provisioning.
//!
//! - [`ScriptedRunner`]: answers commands from substring-matched rules and
//!   records every invocation
//! - [`ScriptedConfirm`]: confirms every prompt and records the messages
//! - [`TestHome`]: an isolated home with build profiles, artifacts and a
//!   printer configuration in place

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tempfile::TempDir;

use openams::errors::ProvisionResult;
use openams::options::ProvisionOptions;
use openams::prompt::Confirm;
use openams::runner::{Captured, CommandRunner, CommandSpec};
use openams::workflow::StageContext;
use openams::{ProvisioningState, StateStore};

// ============================================================================
// SCRIPTED RUNNER
// ============================================================================

/// One scripted answer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reply {
    pub code: i32,
    pub stdout: String,
}

impl Reply {
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            code: 0,
            stdout: stdout.into(),
        }
    }

    pub fn exit(code: i32) -> Self {
        Self {
            code,
            stdout: String::new(),
        }
    }
}

struct Rule {
    pattern: String,
    replies: VecDeque<Reply>,
}

impl Rule {
    /// Replies are consumed in order; the last one repeats.
    fn next(&mut self) -> Reply {
        if self.replies.len() > 1 {
            self.replies.pop_front().unwrap_or_default()
        } else {
            self.replies.front().cloned().unwrap_or_default()
        }
    }
}

/// Command runner driven by rules instead of processes.
///
/// A command matches the first rule whose pattern is a substring of its
/// rendered command line (`program arg arg`). Unmatched commands succeed
/// with empty output.
#[derive(Default)]
pub struct ScriptedRunner {
    rules: Mutex<Vec<Rule>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedRunner {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Answer commands containing `pattern` with `replies`, in order.
    pub fn on(&self, pattern: &str, replies: impl IntoIterator<Item = Reply>) -> &Self {
        let replies: VecDeque<Reply> = replies.into_iter().collect();
        let mut rules = self.rules.lock();
        match rules.iter_mut().find(|r| r.pattern == pattern) {
            Some(rule) => rule.replies.extend(replies),
            None => rules.push(Rule {
                pattern: pattern.to_string(),
                replies,
            }),
        }
        self
    }

    /// Rendered command lines, in invocation order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    /// Invocations whose command line contains `pattern`.
    pub fn count(&self, pattern: &str) -> usize {
        self.calls.lock().iter().filter(|c| c.contains(pattern)).count()
    }

    fn answer(&self, spec: &CommandSpec) -> Reply {
        let line = spec.to_string();
        self.calls.lock().push(line.clone());
        self.rules
            .lock()
            .iter_mut()
            .find(|r| line.contains(&r.pattern))
            .map(Rule::next)
            .unwrap_or_default()
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, spec: &CommandSpec) -> ProvisionResult<i32> {
        Ok(self.answer(spec).code)
    }

    async fn capture(&self, spec: &CommandSpec) -> ProvisionResult<Captured> {
        let reply = self.answer(spec);
        Ok(Captured {
            code: reply.code,
            stdout: reply.stdout,
        })
    }
}

// ============================================================================
// SCRIPTED CONFIRM
// ============================================================================

#[derive(Default)]
pub struct ScriptedConfirm {
    prompts: Mutex<Vec<String>>,
}

impl ScriptedConfirm {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }
}

#[async_trait]
impl Confirm for ScriptedConfirm {
    async fn await_confirmation(&self, message: &str) -> ProvisionResult<()> {
        self.prompts.lock().push(message.to_string());
        Ok(())
    }
}

// ============================================================================
// TEST HOME
// ============================================================================

/// Identity query used by [`TestHome`] options.
pub const QUERY_COMMAND: &str = "canbus-query";

/// Canned `dfu-util -l` output with an STM32 in DFU mode.
pub const DFU_LISTING: &str =
    "Found DFU: [0483:df11] ver=0200, devnum=7, cfg=1, intf=0, path=\"1-1.3\", alt=0\n";

/// `canbus_query.py`-style output listing `ids`.
pub fn query_output(ids: &[&str]) -> String {
    let mut out = String::new();
    for id in ids {
        out.push_str(&format!("Found canbus_uuid={}, Application: Klipper\n", id));
    }
    out.push_str(&format!("Total {} uuids found\n", ids.len()));
    out
}

/// Isolated home directory with everything the workflow reads from disk.
pub struct TestHome {
    pub options: ProvisionOptions,
    pub root: PathBuf,
    _temp_dir: TempDir,
}

impl TestHome {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let root = temp_dir.path().to_path_buf();

        let mut options = ProvisionOptions::default();
        options.home_dir = root.join("home");
        options.privileged = false;

        options.poll.interactive_interval_ms = 10;
        options.poll.continuation_interval_ms = 20;
        options.poll.continuation_timeout_secs = 1;

        options.can.interfaces_dir = root.join("etc").join("network").join("interfaces.d");
        options.probes.identity_query = Some(vec![QUERY_COMMAND.to_string()]);

        options.host.klipper_dir = root.join("klipper");
        options.host.katapult_dir = root.join("katapult");
        options.host.printer_config_dir = root.join("printer_data").join("config");
        options.host.python = root.join("klippy-env").join("bin").join("python");

        options.firmware.profile_dir = root.join("profiles");
        options.firmware.programmer = root.join("no-programmer").display().to_string();

        options.service.unit_dir = root.join("etc").join("systemd").join("system");
        options.service.bin_dir = root.join("usr").join("local").join("bin");
        options.service.user = "tester".to_string();

        let home = Self {
            options,
            root,
            _temp_dir: temp_dir,
        };
        home.seed();
        home
    }

    fn seed(&self) {
        let write = |path: &Path, contents: &str| {
            std::fs::create_dir_all(path.parent().expect("path has a parent"))
                .expect("Failed to create parent dir");
            std::fs::write(path, contents).expect("Failed to seed file");
        };

        for (image, dir) in [
            ("katapult", &self.options.host.katapult_dir),
            ("klipper", &self.options.host.klipper_dir),
        ] {
            write(&dir.join("out").join(format!("{image}.bin")), "firmware");
            for board in ["fps", "mainboard"] {
                for mode in ["bridge", "canbus"] {
                    write(
                        &self
                            .options
                            .firmware
                            .profile_dir
                            .join(format!(".config-{image}-{board}-{mode}")),
                        &format!("# {image} {board} {mode}\n"),
                    );
                }
            }
        }

        write(
            &self.options.host.printer_config(),
            "[printer]\nkinematics: corexy\n",
        );
        write(&self.binary(), "#!/bin/sh\n");
    }

    pub fn home_dir(&self) -> &Path {
        &self.options.home_dir
    }

    /// Stand-in for the executable installed as the continuation.
    pub fn binary(&self) -> PathBuf {
        self.root.join("build").join("openams")
    }

    pub fn store(&self) -> StateStore {
        StateStore::new(self.options.layout().state_file())
    }

    pub fn seed_state(&self, state: &ProvisioningState) {
        self.store().save(state).expect("Failed to seed state");
    }

    /// A fresh context, loading whatever state is on disk.
    pub fn context(
        &self,
        runner: Arc<ScriptedRunner>,
        confirm: Arc<ScriptedConfirm>,
    ) -> StageContext {
        StageContext::new(self.options.clone(), runner, confirm)
            .with_continuation_binary(self.binary())
    }
}

impl Default for TestHome {
    fn default() -> Self {
        Self::new()
    }
}
