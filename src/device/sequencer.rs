use std::time::Duration;

use tokio::time::Instant;

use crate::config::MonitorSettings;
use crate::serial::DeviceCommand;

/// Identifies one scheduled write so it can be cancelled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScheduleHandle(u64);

#[derive(Debug, Clone)]
struct ScheduledCommand {
    handle: ScheduleHandle,
    due: Instant,
    command: DeviceCommand,
    /// Scheduled relative to this entry's deadline once it fires
    follow_up: Option<(Duration, DeviceCommand)>,
}

/// Post-connect query schedule.
///
/// A deadline queue owned by the session loop. The loop sleeps until
/// `next_deadline`, then collects what is due with `take_due` and checks
/// the link is still up before writing anything.
#[derive(Debug)]
pub struct CommandSequencer {
    network_query_delay: Duration,
    counter_query_delay: Duration,
    pulse_query_delay: Duration,
    pending: Vec<ScheduledCommand>,
    next_handle: u64,
}

impl CommandSequencer {
    pub fn new(settings: &MonitorSettings) -> Self {
        Self {
            network_query_delay: settings.network_query_delay(),
            counter_query_delay: settings.counter_query_delay(),
            pulse_query_delay: settings.pulse_query_delay(),
            pending: Vec::new(),
            next_handle: 0,
        }
    }

    /// Schedule the follow-up queries and return the command to write
    /// immediately.
    pub fn on_connect(&mut self, now: Instant) -> DeviceCommand {
        self.cancel_all();
        self.schedule(now + self.network_query_delay, DeviceCommand::QueryNetworks);
        self.schedule_with_follow_up(
            now + self.counter_query_delay,
            DeviceCommand::QueryCounters,
            Some((self.pulse_query_delay, DeviceCommand::QueryPulses)),
        );
        DeviceCommand::Reset
    }

    /// The operator reset the device by hand; ask for its networks again
    pub fn on_manual_reset(&mut self, now: Instant) -> ScheduleHandle {
        self.schedule(now + self.network_query_delay, DeviceCommand::QueryNetworks)
    }

    pub fn schedule(&mut self, due: Instant, command: DeviceCommand) -> ScheduleHandle {
        self.schedule_with_follow_up(due, command, None)
    }

    fn schedule_with_follow_up(
        &mut self,
        due: Instant,
        command: DeviceCommand,
        follow_up: Option<(Duration, DeviceCommand)>,
    ) -> ScheduleHandle {
        let handle = ScheduleHandle(self.next_handle);
        self.next_handle += 1;
        self.pending.push(ScheduledCommand { handle, due, command, follow_up });
        handle
    }

    pub fn cancel(&mut self, handle: ScheduleHandle) -> bool {
        let before = self.pending.len();
        self.pending.retain(|entry| entry.handle != handle);
        self.pending.len() != before
    }

    /// Drop every scheduled write. Returns how many were pending.
    pub fn cancel_all(&mut self) -> usize {
        let cancelled = self.pending.len();
        self.pending.clear();
        cancelled
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.iter().map(|entry| entry.due).min()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Remove and return every command due at `now`, earliest first
    pub fn take_due(&mut self, now: Instant) -> Vec<DeviceCommand> {
        let (mut due, waiting): (Vec<_>, Vec<_>) =
            self.pending.drain(..).partition(|entry| entry.due <= now);
        self.pending = waiting;
        due.sort_by_key(|entry| (entry.due, entry.handle));

        let mut commands = Vec::with_capacity(due.len());
        for entry in due {
            if let Some((delay, next)) = entry.follow_up {
                self.schedule(entry.due + delay, next);
            }
            commands.push(entry.command);
        }
        commands
    }
}
