mod common;

use std::time::Duration;

use tokio::time::{sleep, Instant};

use common::{read_command, send_text, within, Harness};

#[tokio::test(start_paused = true)]
async fn test_connect_sends_reset_then_queries_on_schedule() {
    let mut harness = Harness::new();
    let started = Instant::now();
    let mut device = harness.connect().await;

    assert_eq!(read_command(&mut device).await, "*RST#");
    assert!(within(started.elapsed(), Duration::ZERO));

    assert_eq!(read_command(&mut device).await, "*SSID?#");
    assert!(within(started.elapsed(), Duration::from_secs(5)), "network query at {:?}", started.elapsed());

    assert_eq!(read_command(&mut device).await, "*TC?#");
    assert!(within(started.elapsed(), Duration::from_secs(10)), "counter query at {:?}", started.elapsed());

    assert_eq!(read_command(&mut device).await, "*PULSES?#");
    assert!(within(started.elapsed(), Duration::from_secs(12)), "pulse query at {:?}", started.elapsed());
}

#[tokio::test(start_paused = true)]
async fn test_manual_reset_clears_ssid_and_requeries() {
    let mut harness = Harness::new();
    let started = Instant::now();
    let mut device = harness.connect().await;
    assert_eq!(read_command(&mut device).await, "*RST#");

    let mut status_rx = harness.manager.subscribe_status();
    send_text(&mut device, "*WiFi:2#\r\n").await;
    status_rx.wait_for(|s| s.ssid == "2").await.unwrap();

    sleep(Duration::from_secs(1)).await;
    harness.manager.send("*RST#").await.unwrap();
    assert_eq!(harness.manager.status().ssid, "0");
    assert_eq!(read_command(&mut device).await, "*RST#");

    // One query from connect, one from the manual reset
    assert_eq!(read_command(&mut device).await, "*SSID?#");
    assert!(within(started.elapsed(), Duration::from_secs(5)));
    assert_eq!(read_command(&mut device).await, "*SSID?#");
    assert!(within(started.elapsed(), Duration::from_secs(6)), "requery at {:?}", started.elapsed());
}

#[tokio::test(start_paused = true)]
async fn test_operator_text_goes_out_verbatim() {
    let mut harness = Harness::new();
    let mut device = harness.connect().await;
    assert_eq!(read_command(&mut device).await, "*RST#");

    harness.manager.send("*FW?#").await.unwrap();
    assert_eq!(read_command(&mut device).await, "*FW?#");

    // Only an exact reset restarts the network query
    harness.manager.send("*RST#extra").await.unwrap();
    assert_eq!(read_command(&mut device).await, "*RST#extra");
    assert_eq!(read_command(&mut device).await, "*SSID?#");
    assert_eq!(read_command(&mut device).await, "*TC?#");
}

#[tokio::test(start_paused = true)]
async fn test_heartbeat_zeroes_timer_and_restarts_phase() {
    let mut harness = Harness::new();
    let mut device = harness.connect().await;
    let mut status_rx = harness.manager.subscribe_status();

    sleep(Duration::from_millis(3500)).await;
    assert_eq!(harness.manager.status().hbt_timer, 3);

    send_text(&mut device, "*HBT-17#\n").await;
    let status = status_rx.wait_for(|s| s.hbt_counter == 1).await.unwrap().clone();
    assert_eq!(status.hbt_timer, 0);

    // The old phase would have ticked at 4 s
    sleep(Duration::from_millis(700)).await;
    assert_eq!(harness.manager.status().hbt_timer, 0);

    sleep(Duration::from_millis(500)).await;
    assert_eq!(harness.manager.status().hbt_timer, 1);
}
