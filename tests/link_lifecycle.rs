mod common;

use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::time::sleep;

use uartwatch_lib::config::MonitorSettings;
use uartwatch_lib::status::{DeviceStatus, LinkStatus};
use uartwatch_lib::{ConnectionState, DeviceError, DeviceEvent, DeviceManager};

use common::{read_command, send_text, FaultyConnector, Harness, RefusingConnector};

#[tokio::test(start_paused = true)]
async fn test_frames_split_across_reads_update_status() {
    let mut harness = Harness::new();
    let mut device = harness.connect().await;
    let mut status_rx = harness.manager.subscribe_status();

    for piece in ["*MA", "C:24:6F:28:AA:BB", ":CC:SN-0042", "#\r\n*FW:*1.4.2 build 7#", "\r\n*SSID,3,home,", "lab,cafe#"] {
        send_text(&mut device, piece).await;
    }

    let status = status_rx.wait_for(|s| s.ssid3 == "cafe").await.unwrap().clone();
    assert_eq!(status.mac_id, "24:6F:28:AA:BB:CC");
    assert_eq!(status.serial_number, "SN-0042");
    assert_eq!(status.fw_version, "1.4.2");
    assert_eq!(status.ssid1, "home");
    assert_eq!(status.ssid2, "lab");
}

#[tokio::test(start_paused = true)]
async fn test_short_identity_frame_is_ignored() {
    let mut harness = Harness::new();
    let mut device = harness.connect().await;
    let mut status_rx = harness.manager.subscribe_status();

    send_text(&mut device, "*MAC:24:6F:28:AA:BB:CC:SN-1#\n").await;
    status_rx.wait_for(|s| s.serial_number == "SN-1").await.unwrap();

    send_text(&mut device, "*MAC:AA:BB:CC#\n*HBT-1#\n").await;
    let status = status_rx.wait_for(|s| s.hbt_counter == 1).await.unwrap().clone();
    assert_eq!(status.mac_id, "24:6F:28:AA:BB:CC");
    assert_eq!(status.serial_number, "SN-1");
}

#[tokio::test(start_paused = true)]
async fn test_link_error_counters_count_episodes() {
    let mut harness = Harness::new();
    let mut device = harness.connect().await;
    let mut status_rx = harness.manager.subscribe_status();

    send_text(&mut device, "*TCP-NOTOK#*TCP-NOTOK#*TCP-OK#").await;
    send_text(&mut device, "*TCP-NOTOK#*TCP-NOTOK#*TCP-NOTOK#*HBT-1#").await;

    let status = status_rx.wait_for(|s| s.hbt_counter == 1).await.unwrap().clone();
    assert_eq!(status.tcp_status, Some(LinkStatus::Failed));
    assert_eq!(status.tcp_errors, 1);
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_zeroes_status_and_stops_writes() {
    let mut harness = Harness::new();
    let mut device = harness.connect().await;
    let mut status_rx = harness.manager.subscribe_status();

    send_text(&mut device, "*FW:2.0.0#\n*HBT-1#\n").await;
    status_rx.wait_for(|s| s.hbt_counter == 1).await.unwrap();
    sleep(Duration::from_secs(2)).await;
    assert!(harness.manager.status().hbt_timer > 0);

    harness.manager.disconnect().await.unwrap();
    assert_eq!(*harness.manager.status(), DeviceStatus::default());
    assert_eq!(harness.manager.connection_state(), ConnectionState::Disconnected);
    assert!(!harness.manager.is_connected().await);

    // Well past every scheduled query
    sleep(Duration::from_secs(30)).await;
    let mut written = String::new();
    device.read_to_string(&mut written).await.unwrap();
    assert_eq!(written, "*RST#\n");

    // Terminal keeps the last session's text
    assert_eq!(harness.manager.terminal_text().await, "*FW:2.0.0#\n*HBT-1#\n");
}

#[tokio::test(start_paused = true)]
async fn test_device_closing_link_ends_session() {
    let mut harness = Harness::new();
    let mut device = harness.connect().await;
    let mut state_rx = harness.manager.subscribe_state();
    let mut events_rx = harness.manager.subscribe_events();

    assert_eq!(read_command(&mut device).await, "*RST#");
    send_text(&mut device, "*FW:3.1#").await;
    drop(device);

    state_rx.wait_for(|s| *s == ConnectionState::Disconnected).await.unwrap();
    assert_eq!(*harness.manager.status(), DeviceStatus::default());
    assert!(!harness.manager.is_connected().await);
    assert!(matches!(harness.manager.send("*RST#").await, Err(DeviceError::NotConnected)));

    let mut saw_notice = false;
    while let Ok(event) = events_rx.try_recv() {
        if matches!(event, DeviceEvent::Notice { .. }) {
            saw_notice = true;
        }
    }
    assert!(saw_notice);

    // A fresh connection works after the device went away
    let mut device = harness.connect().await;
    assert_eq!(read_command(&mut device).await, "*RST#");
    assert_eq!(harness.manager.terminal_text().await, "");
}

#[tokio::test(start_paused = true)]
async fn test_read_fault_sets_error_state() {
    let manager = DeviceManager::with_connector(Arc::new(FaultyConnector), MonitorSettings::default());
    let mut state_rx = manager.subscribe_state();

    manager.connect("/dev/ttyTEST1").await.unwrap();
    let state = state_rx
        .wait_for(|s| matches!(s, ConnectionState::Error(_)))
        .await
        .unwrap()
        .clone();

    match state {
        ConnectionState::Error(message) => assert!(message.contains("cable pulled")),
        other => panic!("unexpected state {:?}", other),
    }
    assert_eq!(*manager.status(), DeviceStatus::default());
}

#[tokio::test]
async fn test_connect_failure_is_reported() {
    let manager = DeviceManager::with_connector(Arc::new(RefusingConnector), MonitorSettings::default());

    let result = manager.connect("/dev/ttyMISSING").await;
    assert!(matches!(result, Err(DeviceError::SerialError(_))));
    assert!(matches!(manager.connection_state(), ConnectionState::Error(_)));
    assert!(!manager.is_connected().await);
}

#[tokio::test(start_paused = true)]
async fn test_second_connect_is_rejected() {
    let mut harness = Harness::new();
    let _device = harness.connect().await;

    let result = harness.manager.connect("/dev/ttyTEST0").await;
    assert!(matches!(result, Err(DeviceError::AlreadyConnected)));
    assert!(harness.manager.connection_info().await.is_some());

    harness.manager.disconnect().await.unwrap();
    assert!(matches!(harness.manager.disconnect().await, Err(DeviceError::NotConnected)));
}
