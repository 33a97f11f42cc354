//! CAN interface bring-up.

use std::path::PathBuf;
use std::sync::Arc;

use crate::errors::ProvisionResult;
use crate::options::CanOptions;
use crate::runner::{CommandRunner, CommandSpec};
use crate::util::stage_file;

/// ifupdown stanza for the interface.
pub fn render_interface(can: &CanOptions) -> String {
    format!(
        "allow-hotplug {iface}\n\
         iface {iface} can static\n\
         \x20   bitrate {bitrate}\n\
         \x20   up ip link set $IFACE txqueuelen {txqueuelen}\n",
        iface = can.interface,
        bitrate = can.bitrate,
        txqueuelen = can.txqueuelen,
    )
}

/// Whether `ip link show` output lists the `UP` flag.
fn link_is_up(output: &str) -> bool {
    output
        .split_once('<')
        .and_then(|(_, rest)| rest.split_once('>'))
        .is_some_and(|(flags, _)| flags.split(',').any(|f| f == "UP"))
}

pub struct CanSetup {
    runner: Arc<dyn CommandRunner>,
    can: CanOptions,
    privileged: bool,
    scratch_dir: PathBuf,
}

impl CanSetup {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        can: &CanOptions,
        privileged: bool,
        scratch_dir: PathBuf,
    ) -> Self {
        Self {
            runner,
            can: can.clone(),
            privileged,
            scratch_dir,
        }
    }

    pub fn stanza_path(&self) -> PathBuf {
        self.can.interfaces_dir.join(&self.can.interface)
    }

    /// Persist the interface configuration and bring the link up now.
    ///
    /// Re-running rewrites the same stanza and leaves an up link alone.
    pub async fn apply(&self) -> ProvisionResult<()> {
        let iface = self.can.interface.as_str();
        let staged = stage_file(&self.scratch_dir, &render_interface(&self.can))?;
        self.runner
            .run_ok(
                &CommandSpec::new("install")
                    .args(["-D", "-m", "0644"])
                    .path_arg(staged.path())
                    .path_arg(&self.stanza_path())
                    .elevated(self.privileged),
            )
            .await?;
        tracing::info!(path = %self.stanza_path().display(), "Wrote {} interface configuration", iface);

        let shown = self
            .runner
            .capture(&CommandSpec::new("ip").args(["-details", "link", "show", iface]))
            .await?;
        if shown.success() && link_is_up(&shown.stdout) {
            tracing::info!("{} already up", iface);
            return Ok(());
        }

        self.runner
            .run_ok(
                &CommandSpec::new("ip")
                    .args(["link", "set", iface, "up", "type", "can", "bitrate"])
                    .arg(self.can.bitrate.to_string())
                    .elevated(self.privileged),
            )
            .await?;
        self.runner
            .run_ok(
                &CommandSpec::new("ip")
                    .args(["link", "set", iface, "txqueuelen"])
                    .arg(self.can.txqueuelen.to_string())
                    .elevated(self.privileged),
            )
            .await?;
        tracing::info!(bitrate = self.can.bitrate, "{} is up", iface);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::Captured;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tempfile::TempDir;

    struct LinkRunner {
        show: &'static str,
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl CommandRunner for LinkRunner {
        async fn run(&self, spec: &CommandSpec) -> ProvisionResult<i32> {
            self.calls.lock().unwrap().push(spec.to_string());
            Ok(0)
        }

        async fn capture(&self, spec: &CommandSpec) -> ProvisionResult<Captured> {
            self.calls.lock().unwrap().push(spec.to_string());
            Ok(Captured {
                code: 0,
                stdout: self.show.to_string(),
            })
        }
    }

    fn setup(temp: &TempDir, show: &'static str) -> (CanSetup, Arc<LinkRunner>) {
        let runner = Arc::new(LinkRunner {
            show,
            calls: Mutex::new(Vec::new()),
        });
        let can = CanOptions {
            interfaces_dir: temp.path().join("interfaces.d"),
            ..CanOptions::default()
        };
        (
            CanSetup::new(runner.clone(), &can, true, temp.path().join("tmp")),
            runner,
        )
    }

    #[test]
    fn test_render_interface() {
        assert_eq!(
            render_interface(&CanOptions::default()),
            "allow-hotplug can0\n\
             iface can0 can static\n    bitrate 1000000\n    up ip link set $IFACE txqueuelen 1024\n"
        );
    }

    #[test]
    fn test_link_flags() {
        assert!(link_is_up(
            "3: can0: <NOARP,UP,LOWER_UP,ECHO> mtu 16 qdisc pfifo_fast state UP"
        ));
        assert!(!link_is_up("3: can0: <NOARP,ECHO> mtu 16 qdisc noop state DOWN"));
        assert!(!link_is_up("Device \"can0\" does not exist."));
    }

    #[tokio::test]
    async fn test_apply_brings_down_link_up() {
        let temp = TempDir::new().unwrap();
        let (setup, runner) = setup(&temp, "3: can0: <NOARP,ECHO> mtu 16 state DOWN");
        setup.apply().await.unwrap();

        let calls = runner.calls.lock().unwrap().clone();
        assert!(calls[0].starts_with("sudo install -D -m 0644"));
        assert!(calls[0].ends_with("interfaces.d/can0"));
        assert_eq!(calls[1], "ip -details link show can0");
        assert_eq!(calls[2], "sudo ip link set can0 up type can bitrate 1000000");
        assert_eq!(calls[3], "sudo ip link set can0 txqueuelen 1024");
    }

    #[tokio::test]
    async fn test_apply_leaves_up_link_alone() {
        let temp = TempDir::new().unwrap();
        let (setup, runner) = setup(&temp, "3: can0: <NOARP,UP,LOWER_UP,ECHO> state UP");
        setup.apply().await.unwrap();
        assert_eq!(runner.calls.lock().unwrap().len(), 2);
    }
}
