//! Integration Tests for the Reflow Host
//!
//! Spins up a `SharedBus` and the Monitor as the production code does,
//! then drives `control_state` and `ReflowController` the way the
//! reflow supervisor and an embedding process would, asserting on the
//! `reflow_status` stream end-to-end -- the same shape of test as
//! `thermal/tests/tests.rs` and `sim/tests/run_sim.rs`, one level up.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use reflow_host::data_model::ControlState;
use reflow_shared::SharedBus;
use reflow_sim::SimTms;
use tempfile::tempdir;
use tokio::sync::mpsc;

/// The host doesn't expose a way to point the TMS link at a Unix socket
/// instead of a real serial port -- `tokio-serial` only opens device
/// paths. This test exercises the monitor/bus/controller wiring
/// directly against a `SimTms`-equivalent fault path instead: it drives
/// `control_state` by hand the way the reflow supervisor would, and
/// checks the Monitor reacts correctly. A full hardware-free run of
/// `tms_link` itself is out of scope without a PTY bridge.
#[tokio::test]
async fn monitor_forces_fault_when_supervisor_process_is_missing() {
    let dir = tempdir().unwrap();
    let bus_path = dir.path().join("bus.bin");
    let bus = Arc::new(SharedBus::create(&bus_path).unwrap());

    let (_supervisor_tx, supervisor_rx) = mpsc::channel(1);
    let (_events_tx, events_rx) = mpsc::channel(1);
    let channels = Arc::new(reflow_host::monitor::MonitorChannels::new(16));
    let mut reflow_status_rx = channels.reflow_status.subscribe();

    let monitor_bus = bus.clone();
    let monitor_handle = tokio::spawn(reflow_host::monitor::run(
        monitor_bus,
        supervisor_rx,
        events_rx,
        channels,
    ));

    // No supervisor child was ever handed to the monitor, so moving to
    // RUNNING with no live process should be observed as a fault.
    bus.set_control_state(reflow_shared::control_state::RUNNING);

    let status = tokio::time::timeout(Duration::from_secs(2), reflow_status_rx.recv())
        .await
        .expect("monitor should publish a status")
        .unwrap();
    assert_eq!(status.state, ControlState::Fault);

    bus.set_should_exit(true);
    let _ = monitor_handle.await;
}

#[tokio::test]
async fn controller_rejects_a_second_start_while_a_run_is_active() {
    let dir = tempdir().unwrap();
    let bus_path = dir.path().join("bus.bin");
    let bus = Arc::new(SharedBus::create(&bus_path).unwrap());

    let (supervisor_tx, _supervisor_rx) = mpsc::channel(1);
    let config = reflow_host::config::ReflowConfig::defaults();
    let controller = reflow_host::controller::ReflowController::new(
        bus.clone(),
        bus_path.clone(),
        PathBuf::from("/bin/true"),
        config.supervisor,
        config.mpc,
        supervisor_tx,
    );

    bus.set_control_state(reflow_shared::control_state::RUNNING);
    let curve_path = dir.path().join("curve.json");
    std::fs::write(&curve_path, r#"{"times":[0,1],"temperatures":[25.0,150.0]}"#).unwrap();

    let result = controller.start(&curve_path).await;
    assert!(result.is_err());
}

/// Exercises `SimTms` directly as a sanity check that the simulation
/// collaborator used by the other tests in this workspace actually
/// speaks the wire protocol the host expects.
#[tokio::test]
async fn sim_tms_speaks_the_same_protocol_the_host_link_decodes() {
    let socket_path = "/tmp/reflow_host_integration_sim.sock";
    let _ = std::fs::remove_file(socket_path);
    let tms = SimTms::new(socket_path);
    let server = tokio::spawn(async move { tms.run().await.unwrap() });
    tokio::time::sleep(Duration::from_millis(50)).await;

    let mut host = reflow_sim::SimHost::connect(socket_path).await.unwrap();
    host.send(reflow_proto::OutboundFrame {
        state: reflow_proto::OvenState::Idle,
        pwm: 0,
    })
    .await
    .unwrap();
    let frame = host.recv().await.unwrap();
    assert!(matches!(frame, reflow_proto::InboundFrame::Status(_)));

    server.abort();
    let _ = std::fs::remove_file(socket_path);
}
