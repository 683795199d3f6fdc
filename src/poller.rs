use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{Notify, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::Error;
use crate::api::DeviceApi;
use crate::capability::Capability;
use crate::command::PendingCommand;
use crate::events::EventSink;
use crate::types::{DeviceDescriptor, DeviceInfo, DeviceState, Event};

/// Applied after every cycle, successful or not.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PollPhase {
    /// Spawned, not yet polled.
    #[default]
    Idle,
    Polling,
    Settled,
    Errored,
}

#[derive(Debug, Clone, Default)]
pub struct PollStatus {
    pub phase: PollPhase,
    /// Most recent successful fetch. Kept through later failures.
    pub state: Option<DeviceState>,
    pub cycles: u64,
}

struct Shared {
    device: Arc<DeviceDescriptor>,
    capability: Capability,
    trigger: Notify,
    status: watch::Sender<PollStatus>,
    cycles_started: AtomicU64,
    /// Tagged with the number of cycles started when it was recorded.
    pending: Mutex<Option<(u64, PendingCommand)>>,
}

impl Shared {
    fn set_phase(&self, phase: PollPhase) {
        self.status.send_modify(|s| s.phase = phase);
    }

    fn begin_cycle(&self) -> u64 {
        self.cycles_started.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Only a cycle that began after the command was recorded clears it; a
    /// command sent while a cycle was already in flight stays pending.
    fn settle_pending(&self, cycle: u64) {
        if let Ok(mut pending) = self.pending.lock()
            && pending.as_ref().is_some_and(|(recorded, _)| *recorded < cycle)
        {
            *pending = None;
        }
    }
}

/// Fetch-decode-emit-reschedule loop for one device.
pub(crate) struct Poller<A> {
    api: Arc<A>,
    shared: Arc<Shared>,
    events: EventSink,
    interval: Duration,
}

impl<A: DeviceApi> Poller<A> {
    pub fn spawn(
        api: Arc<A>,
        device: Arc<DeviceDescriptor>,
        capability: Capability,
        events: EventSink,
        interval: Duration,
        cancel: CancellationToken,
    ) -> PollerHandle {
        let (status, _) = watch::channel(PollStatus::default());
        let shared = Arc::new(Shared {
            device,
            capability,
            trigger: Notify::new(),
            status,
            cycles_started: AtomicU64::new(0),
            pending: Mutex::new(None),
        });
        let poller = Poller {
            api,
            shared: shared.clone(),
            events,
            interval,
        };
        let task = tokio::spawn(poller.run(cancel.clone()));
        PollerHandle {
            shared,
            cancel,
            task: Some(task),
        }
    }

    async fn run(self, cancel: CancellationToken) {
        let device_id = self.shared.device.device_id;
        debug!(device_id, interval = ?self.interval, "poller started");

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                () = self.cycle() => {}
            }

            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                () = self.shared.trigger.notified() => {
                    trace!(device_id, "out-of-band poll");
                }
                () = tokio::time::sleep(self.interval) => {}
            }
        }

        debug!(device_id, "poller stopped");
    }

    /// One iteration. Failures become events and never escape.
    async fn cycle(&self) {
        let device = &self.shared.device;
        let cycle = self.shared.begin_cycle();
        self.shared.set_phase(PollPhase::Polling);

        let outcome = match self.api.fetch_state(device).await {
            Ok(raw) => self.shared.capability.decode(&raw),
            Err(e) => Err(e),
        };

        match outcome {
            Ok(state) => {
                self.shared.settle_pending(cycle);
                self.shared.status.send_modify(|s| {
                    s.phase = PollPhase::Settled;
                    s.state = Some(state.clone());
                    s.cycles += 1;
                });
                trace!(device_id = device.device_id, power = state.power, "state fetched");
                self.events.emit(&Event::StateChanged {
                    device: device.clone(),
                    state,
                });
                self.events.emit(&Event::InfoChanged {
                    device_id: device.device_id,
                    info: DeviceInfo::from_descriptor(device),
                });
            }
            Err(source) => {
                let err = Error::Poll {
                    device_id: device.device_id,
                    source: Box::new(source),
                };
                warn!(device = %device.name, error = %err, "poll failed");
                self.shared.status.send_modify(|s| {
                    s.phase = PollPhase::Errored;
                    s.cycles += 1;
                });
                self.events.error(Some(device.device_id), err.to_string());
            }
        }
    }
}

/// Owner's view of a running poller. Dropping it stops the loop.
pub struct PollerHandle {
    shared: Arc<Shared>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl PollerHandle {
    pub fn device(&self) -> &Arc<DeviceDescriptor> {
        &self.shared.device
    }

    pub fn capability(&self) -> Capability {
        self.shared.capability
    }

    pub fn phase(&self) -> PollPhase {
        self.shared.status.borrow().phase
    }

    pub fn latest_state(&self) -> Option<DeviceState> {
        self.shared.status.borrow().state.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PollStatus> {
        self.shared.status.subscribe()
    }

    pub fn pending_command(&self) -> Option<PendingCommand> {
        self.shared
            .pending
            .lock()
            .ok()
            .and_then(|p| p.as_ref().map(|(_, command)| command.clone()))
    }

    /// Runs the next cycle now instead of after the interval. A request
    /// made while a fetch is in flight starts a cycle right after it.
    pub fn poll_now(&self) {
        self.shared.trigger.notify_one();
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    pub async fn stop(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take()
            && let Err(e) = task.await
        {
            warn!(device_id = self.shared.device.device_id, error = %e, "poller task ended abnormally");
        }
    }

    pub(crate) fn set_pending(&self, command: PendingCommand) {
        if let Ok(mut pending) = self.shared.pending.lock() {
            let recorded = self.shared.cycles_started.load(Ordering::SeqCst);
            *pending = Some((recorded, command));
        }
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
