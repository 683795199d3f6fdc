use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{Value, json};
use tokio::time::Instant;

use crate::api::DeviceApi;
use crate::command::PendingCommand;
use crate::events::{EventCallback, EventSink};
use crate::types::{DeviceDescriptor, DeviceType, Event};
use crate::{Error, Result};

/// Replays canned fetch results in order and records when calls happened.
pub(crate) struct ScriptedApi {
    script: Mutex<VecDeque<Result<Value>>>,
    fetches: Mutex<Vec<Instant>>,
    posts: Mutex<Vec<(Instant, String, Value)>>,
    fail_posts: bool,
    fetch_delay: Duration,
}

impl ScriptedApi {
    pub fn new(script: Vec<Result<Value>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fetches: Mutex::new(Vec::new()),
            posts: Mutex::new(Vec::new()),
            fail_posts: false,
            fetch_delay: Duration::ZERO,
        }
    }

    /// Each fetch stays in flight this long before answering.
    pub fn with_fetch_delay(mut self, delay: Duration) -> Self {
        self.fetch_delay = delay;
        self
    }

    pub fn failing_posts(mut self) -> Self {
        self.fail_posts = true;
        self
    }

    pub fn fetch_times(&self) -> Vec<Instant> {
        self.fetches.lock().unwrap().clone()
    }

    pub fn posts(&self) -> Vec<(Instant, String, Value)> {
        self.posts.lock().unwrap().clone()
    }
}

impl DeviceApi for ScriptedApi {
    async fn fetch_state(&self, _device: &DeviceDescriptor) -> Result<Value> {
        self.fetches.lock().unwrap().push(Instant::now());
        let next = self.script.lock().unwrap().pop_front();
        if !self.fetch_delay.is_zero() {
            tokio::time::sleep(self.fetch_delay).await;
        }
        next.unwrap_or_else(|| Err(Error::Protocol("script exhausted".into())))
    }

    async fn post_command(&self, command: &PendingCommand) -> Result<()> {
        self.posts
            .lock()
            .unwrap()
            .push((Instant::now(), command.path.clone(), command.payload.clone()));
        if self.fail_posts {
            return Err(Error::Status {
                status: 500,
                body: "rejected".into(),
            });
        }
        Ok(())
    }
}

pub(crate) fn recording_sink() -> (EventSink, Arc<Mutex<Vec<Event>>>) {
    let seen: Arc<Mutex<Vec<Event>>> = Arc::new(Mutex::new(Vec::new()));
    let seen_clone = seen.clone();
    let callback: EventCallback = Box::new(move |event: &Event| {
        seen_clone.lock().unwrap().push(event.clone());
    });
    (EventSink::new(vec![callback]), seen)
}

pub(crate) fn ata_device() -> DeviceDescriptor {
    DeviceDescriptor {
        device_id: 100,
        building_id: 7,
        device_type: DeviceType::Ata,
        name: "Lounge".into(),
        static_info: json!({
            "DeviceID": 100,
            "SerialNumber": "SN-100",
            "Device": {"Units": [{"IsIndoor": true, "Model": "MSZ-AP25"}]}
        }),
    }
}

pub(crate) fn ata_payload(room: f64) -> Value {
    json!({
        "DeviceID": 100,
        "Power": true,
        "RoomTemperature": room,
        "SetTemperature": 22.0,
        "SetFanSpeed": 2,
        "OperationMode": 1,
        "InStandbyMode": false,
        "HasPendingCommand": false,
        "Offline": false,
        "LastCommunication": "2024-03-01T10:00:00"
    })
}
