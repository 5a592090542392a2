mod common;

use common::ScriptedApi;
use meshmap::discovery::{DiscoveryCommand, DiscoveryController};
use meshmap::error::{CommandRejected, DiscoveryError};
use meshmap::model::{DiscoveryState, DiscoveryStatus};
use tokio_test::{assert_err, assert_ok};

#[tokio::test]
async fn poll_replaces_snapshot() {
    let api = ScriptedApi::new();
    api.set_full_status(DiscoveryStatus {
        id: 0,
        status: DiscoveryState::Running,
        current_id: 0x1234,
        repeat: 2,
    });
    let mut ctl = DiscoveryController::new();

    let status = assert_ok!(ctl.poll(&api).await);
    assert_eq!(
        status.to_string(),
        "Discovery: running, CurrentId: N001234 Repetitions: 2"
    );
    assert!(ctl.is_busy());

    api.set_full_status(DiscoveryStatus {
        status: DiscoveryState::Done,
        current_id: -1,
        ..DiscoveryStatus::default()
    });
    let status = assert_ok!(ctl.poll(&api).await);
    assert_eq!(status.current_node(), None);
    assert_eq!(ctl.state(), DiscoveryState::Done);
    assert!(!ctl.is_busy());
}

#[tokio::test]
async fn start_from_idle_sends_one_command() {
    let api = ScriptedApi::new();
    let mut ctl = DiscoveryController::new();
    assert_ok!(ctl.poll(&api).await);

    assert_ok!(ctl.start(&api).await);
    assert_eq!(api.commands(), vec![DiscoveryCommand::Start]);

    // Controller is now running; a refresh must not go out
    assert_ok!(ctl.poll(&api).await);
    let err = assert_err!(ctl.refresh(&api).await);
    assert!(matches!(
        err,
        DiscoveryError::Rejected(CommandRejected::Busy(DiscoveryState::Running))
    ));
    assert_eq!(api.calls().commands, 1);
}

#[tokio::test]
async fn unknown_status_is_treated_as_busy() {
    let api = ScriptedApi::new();
    api.set_full_status(DiscoveryStatus::default());
    let mut ctl = DiscoveryController::new();
    assert_ok!(ctl.poll(&api).await);

    assert_eq!(ctl.state(), DiscoveryState::Unknown);
    assert_err!(ctl.start(&api).await);
    assert!(api.commands().is_empty());
}

#[tokio::test]
async fn failed_poll_surfaces_error() {
    let api = ScriptedApi::new();
    api.set_failing(meshmap::sync::FetchKind::Status, true);
    let mut ctl = DiscoveryController::new();

    assert_err!(ctl.poll(&api).await);
    assert!(ctl.latest().is_none());
    assert!(ctl.last_error().is_some());
    // Nothing observed yet, so the gate is open
    assert!(!ctl.is_busy());
}
