use std::time::Duration;

use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

use crate::status::DeviceStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockState {
    Idle,
    Running,
}

/// Local seconds-since-heartbeat clock.
///
/// Ticks only while running. A heartbeat frame zeroes the timer and
/// restarts the tick phase, so the next increment lands a full period
/// after the heartbeat.
#[derive(Debug)]
pub struct HeartbeatClock {
    period: Duration,
    interval: Option<Interval>,
}

impl HeartbeatClock {
    pub fn new(period: Duration) -> Self {
        Self { period, interval: None }
    }

    pub fn state(&self) -> ClockState {
        if self.interval.is_some() {
            ClockState::Running
        } else {
            ClockState::Idle
        }
    }

    /// Idle -> Running
    pub fn start(&mut self) {
        if self.interval.is_some() {
            return;
        }
        let mut interval = interval_at(Instant::now() + self.period, self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.interval = Some(interval);
    }

    /// Running -> Idle; the timer goes back to zero
    pub fn stop(&mut self, status: &mut DeviceStatus) {
        self.interval = None;
        status.hbt_timer = 0;
    }

    /// Resolve on the next tick. Never resolves while idle.
    pub async fn wait_tick(&mut self) {
        match self.interval.as_mut() {
            Some(interval) => {
                interval.tick().await;
            }
            None => std::future::pending::<()>().await,
        }
    }

    pub fn on_tick(&self, status: &mut DeviceStatus) {
        if self.state() == ClockState::Running {
            status.hbt_timer += 1;
        }
    }

    pub fn on_heartbeat(&mut self, status: &mut DeviceStatus) {
        status.hbt_timer = 0;
        if let Some(interval) = self.interval.as_mut() {
            interval.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_ticks_once_per_period() {
        let mut clock = HeartbeatClock::new(Duration::from_secs(1));
        let mut status = DeviceStatus::default();
        clock.start();

        let started = Instant::now();
        for _ in 0..3 {
            clock.wait_tick().await;
            clock.on_tick(&mut status);
        }
        assert_eq!(status.hbt_timer, 3);
        assert_eq!(started.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_heartbeat_restarts_phase() {
        let mut clock = HeartbeatClock::new(Duration::from_secs(1));
        let mut status = DeviceStatus::default();
        clock.start();

        tokio::time::advance(Duration::from_millis(600)).await;
        clock.on_heartbeat(&mut status);
        let reset_at = Instant::now();

        clock.wait_tick().await;
        clock.on_tick(&mut status);
        assert_eq!(reset_at.elapsed(), Duration::from_secs(1));
        assert_eq!(status.hbt_timer, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_goes_idle_and_zeroes() {
        let mut clock = HeartbeatClock::new(Duration::from_secs(1));
        let mut status = DeviceStatus { hbt_timer: 9, ..Default::default() };
        clock.start();
        assert_eq!(clock.state(), ClockState::Running);

        clock.stop(&mut status);
        assert_eq!(clock.state(), ClockState::Idle);
        assert_eq!(status.hbt_timer, 0);

        clock.on_tick(&mut status);
        assert_eq!(status.hbt_timer, 0);
        let waited = tokio::time::timeout(Duration::from_secs(5), clock.wait_tick()).await;
        assert!(waited.is_err());
    }
}
