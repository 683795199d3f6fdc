use std::sync::Arc;

use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::api::DeviceApi;
use crate::events::EventSink;
use crate::poller::PollerHandle;
use crate::protocol::substitute_ids;
use crate::types::CommandKind;
use crate::{Error, Result};

/// The last command sent to a device. A newer command replaces it; a poll
/// that started after it was sent clears it.
#[derive(Debug, Clone)]
pub struct PendingCommand {
    pub id: Uuid,
    pub device_id: i64,
    pub kind: CommandKind,
    pub path: String,
    pub payload: Value,
    pub sent_at: Instant,
}

pub struct CommandDispatcher<A> {
    api: Arc<A>,
    events: EventSink,
}

impl<A: DeviceApi> CommandDispatcher<A> {
    pub(crate) fn new(api: Arc<A>, events: EventSink) -> Self {
        Self { api, events }
    }

    /// Posts a complete-state body for the device behind `target`, then asks
    /// its poller for an immediate cycle. No retry on failure, and the pending
    /// marker is left in place.
    pub async fn send(
        &self,
        target: &PollerHandle,
        template: &str,
        mut payload: Value,
        kind: CommandKind,
    ) -> Result<()> {
        let device = target.device();

        let Some(body) = payload.as_object_mut() else {
            return Err(self.fail(device.device_id, Error::Protocol("command body must be a JSON object".into())));
        };
        if kind == CommandKind::Power {
            body.insert("HasPendingCommand".to_string(), Value::Bool(true));
        }

        let command = PendingCommand {
            id: Uuid::new_v4(),
            device_id: device.device_id,
            kind,
            path: substitute_ids(template, device.device_id, device.building_id),
            payload,
            sent_at: Instant::now(),
        };
        debug!(command_id = %command.id, device_id = device.device_id, ?kind, "sending command");
        target.set_pending(command.clone());

        match self.api.post_command(&command).await {
            Ok(()) => {
                target.poll_now();
                Ok(())
            }
            Err(source) => Err(self.fail(device.device_id, source)),
        }
    }

    fn fail(&self, device_id: i64, source: Error) -> Error {
        let err = Error::Command {
            device_id,
            source: Box::new(source),
        };
        warn!(error = %err, "command failed");
        self.events.error(Some(device_id), err.to_string());
        err
    }
}
