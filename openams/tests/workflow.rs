//! Integration tests for the provisioning sequence.
//!
//! Both portions run against scripted hardware:
//! - front end: flashes, records the FPS identity, installs the service
//! - continuation: resolves the mainboard, writes config, removes the service
//! - resume: completed checkpoints are skipped, never re-derived

use openams::errors::ProvisionError;
use openams::firmware::ToolPolicy;
use openams::workflow::{Outcome, Sequencer};
use openams::{Identifier, ProvisioningState};
use openams_test_utils::{
    DFU_LISTING, QUERY_COMMAND, Reply, ScriptedConfirm, ScriptedRunner, TestHome, query_output,
};

// ============================================================================
// FIXTURES
// ============================================================================

fn id(s: &str) -> Identifier {
    s.parse().unwrap()
}

fn state_with_fps(fps: &str) -> ProvisioningState {
    let mut state = ProvisioningState::new();
    state.record_fps(id(fps)).unwrap();
    state
}

/// Hardware that enumerates in DFU mode and answers the identity query
/// with `ids`.
fn hardware(ids: &[&str]) -> std::sync::Arc<ScriptedRunner> {
    let runner = ScriptedRunner::new();
    runner
        .on("dfu-util -l", [Reply::ok(DFU_LISTING)])
        .on(QUERY_COMMAND, [Reply::ok(query_output(ids))]);
    runner
}

// ============================================================================
// END TO END
// ============================================================================

#[tokio::test]
async fn front_end_then_continuation_provisions_both_boards() {
    let home = TestHome::new();

    // Front end: only the FPS is on the bus.
    let runner = hardware(&["1a2b3c"]);
    let confirm = ScriptedConfirm::new();
    let mut ctx = home.context(runner.clone(), confirm.clone());
    assert!(ctx.state().is_empty());

    let outcome = Sequencer::front_end(ToolPolicy::AllowMissing)
        .run(&mut ctx)
        .await
        .unwrap();

    assert_eq!(outcome, Outcome::Handoff);
    assert_eq!(confirm.prompts().len(), 3);
    assert_eq!(runner.count("dfu-util -a 0 -s 0x08000000:force:mass-erase"), 2);
    assert_eq!(runner.count("dfu-util -a 0 -s 0x08002000"), 2);
    assert_eq!(runner.count("systemctl enable --now openams-daemon.service"), 1);
    assert_eq!(runner.count("systemctl disable"), 0);

    let unit = home
        .options
        .service
        .unit_dir
        .join("openams-daemon.service");
    let installs: Vec<String> = runner
        .calls()
        .into_iter()
        .filter(|c| c.starts_with("install -m 0644"))
        .collect();
    assert_eq!(installs.len(), 1);
    assert!(installs[0].ends_with(&unit.display().to_string()));

    // Process restart: the record is all that carries over.
    let persisted = home.store().load();
    assert_eq!(persisted, state_with_fps("1a2b3c"));

    // Continuation: the mainboard joins after a few polls.
    let runner = ScriptedRunner::new();
    runner.on(
        QUERY_COMMAND,
        [
            Reply::ok(query_output(&[])),
            Reply::ok(query_output(&["1a2b3c"])),
            Reply::ok(query_output(&["4D5E6F", "1a2b3c"])),
        ],
    );
    let mut ctx = home.context(runner.clone(), ScriptedConfirm::new());

    let outcome = Sequencer::continuation().run(&mut ctx).await.unwrap();

    assert_eq!(outcome, Outcome::Complete);
    let final_state = home.store().load();
    assert_eq!(final_state.fps(), Some(&id("1a2b3c")));
    assert_eq!(final_state.mainboard(), Some(&id("4d5e6f")));
    assert_eq!(runner.count(QUERY_COMMAND), 3);

    let generated =
        std::fs::read_to_string(home.options.host.generated_config_path()).unwrap();
    assert!(generated.contains("canbus_uuid: 1a2b3c"));
    assert!(generated.contains("canbus_uuid: 4d5e6f"));

    assert_eq!(runner.count("systemctl enable klipper.service"), 1);
    assert_eq!(runner.count("systemctl start klipper.service"), 1);
    assert_eq!(runner.count("systemctl disable openams-daemon.service"), 1);
    assert_eq!(runner.count("systemctl stop --no-block openams-daemon.service"), 1);
}

// ============================================================================
// RESUME
// ============================================================================

#[tokio::test]
async fn continuation_rerun_keeps_recorded_identities() {
    let home = TestHome::new();
    home.seed_state(&state_with_fps("1a2b3c"));

    let runner = hardware(&["1a2b3c", "4d5e6f"]);
    let mut ctx = home.context(runner.clone(), ScriptedConfirm::new());
    Sequencer::continuation().run(&mut ctx).await.unwrap();
    assert_eq!(runner.count(QUERY_COMMAND), 1);

    // A later run sees different hardware; the recorded checkpoint wins.
    let runner = hardware(&["1a2b3c", "999999"]);
    let mut ctx = home.context(runner.clone(), ScriptedConfirm::new());
    Sequencer::continuation().run(&mut ctx).await.unwrap();

    assert_eq!(runner.count(QUERY_COMMAND), 0);
    let state = home.store().load();
    assert_eq!(state.fps(), Some(&id("1a2b3c")));
    assert_eq!(state.mainboard(), Some(&id("4d5e6f")));
}

#[tokio::test]
async fn front_end_rerun_skips_fps_stages() {
    let home = TestHome::new();
    home.seed_state(&state_with_fps("1a2b3c"));

    let runner = hardware(&["1a2b3c"]);
    let confirm = ScriptedConfirm::new();
    let mut ctx = home.context(runner.clone(), confirm.clone());
    Sequencer::front_end(ToolPolicy::AllowMissing)
        .run(&mut ctx)
        .await
        .unwrap();

    // Only the mainboard is flashed, and only the final prompt is shown.
    assert_eq!(runner.count("dfu-util -a 0 -s 0x08000000:force:mass-erase"), 1);
    assert_eq!(runner.count(QUERY_COMMAND), 0);
    assert_eq!(runner.count("ip link set"), 0);
    assert_eq!(confirm.prompts().len(), 1);
    assert_eq!(home.store().load(), state_with_fps("1a2b3c"));
}

// ============================================================================
// FAILURES
// ============================================================================

#[tokio::test]
async fn fps_identity_requires_exactly_one_board() {
    let cases: [&[&str]; 2] = [&[], &["1a2b3c", "4d5e6f"]];
    for ids in cases {
        let home = TestHome::new();
        let runner = hardware(ids);
        let mut ctx = home.context(runner.clone(), ScriptedConfirm::new());

        let err = Sequencer::front_end(ToolPolicy::AllowMissing)
            .run(&mut ctx)
            .await
            .unwrap_err();

        assert!(matches!(err, ProvisionError::Ambiguous(_)), "{err}");
        assert!(home.store().load().is_empty());
        assert_eq!(runner.count("enable --now"), 0);
    }
}

#[tokio::test]
async fn failed_flash_aborts_without_recording() {
    let home = TestHome::new();
    let runner = hardware(&["1a2b3c"]);
    runner.on("dfu-util -a 0", [Reply::exit(74)]);
    let mut ctx = home.context(runner.clone(), ScriptedConfirm::new());

    let err = Sequencer::front_end(ToolPolicy::AllowMissing)
        .run(&mut ctx)
        .await
        .unwrap_err();

    assert!(matches!(err, ProvisionError::CommandFailed { code: 74, .. }));
    assert_eq!(runner.count(QUERY_COMMAND), 0);
    assert!(home.store().load().is_empty());
}

#[tokio::test]
async fn required_programmer_missing_is_fatal() {
    let home = TestHome::new();
    let runner = hardware(&["1a2b3c"]);
    let mut ctx = home.context(runner.clone(), ScriptedConfirm::new());

    let err = Sequencer::front_end(ToolPolicy::Require)
        .run(&mut ctx)
        .await
        .unwrap_err();

    assert!(matches!(err, ProvisionError::ToolMissing(_)));
    assert_eq!(runner.count("dfu-util -a 0"), 0);
}

#[tokio::test(start_paused = true)]
async fn continuation_times_out_when_mainboard_never_appears() {
    let home = TestHome::new();
    home.seed_state(&state_with_fps("1a2b3c"));

    let runner = hardware(&["1a2b3c"]);
    let mut ctx = home.context(runner.clone(), ScriptedConfirm::new());

    let err = Sequencer::continuation().run(&mut ctx).await.unwrap_err();

    assert!(err.is_timeout(), "{err}");
    assert!(runner.count(QUERY_COMMAND) > 1);
    assert_eq!(runner.count("systemctl disable"), 0);
    assert_eq!(home.store().load(), state_with_fps("1a2b3c"));
}

#[tokio::test]
async fn third_board_on_the_bus_is_ambiguous() {
    let home = TestHome::new();
    home.seed_state(&state_with_fps("1a2b3c"));

    let runner = hardware(&["1a2b3c", "4d5e6f", "777777"]);
    let mut ctx = home.context(runner.clone(), ScriptedConfirm::new());

    let err = Sequencer::continuation().run(&mut ctx).await.unwrap_err();

    assert!(matches!(err, ProvisionError::Ambiguous(_)));
    assert!(home.store().load().mainboard().is_none());
    assert_eq!(runner.count("systemctl disable"), 0);
}

#[tokio::test]
async fn continuation_without_fps_is_precondition_unmet() {
    let home = TestHome::new();
    let runner = hardware(&["1a2b3c", "4d5e6f"]);
    let mut ctx = home.context(runner.clone(), ScriptedConfirm::new());

    let err = Sequencer::continuation().run(&mut ctx).await.unwrap_err();

    assert!(matches!(err, ProvisionError::PreconditionUnmet(_)));
    assert_eq!(runner.count(QUERY_COMMAND), 0);
}
