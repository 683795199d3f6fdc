use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::api::{DEFAULT_REQUEST_TIMEOUT, HttpApi, SessionApi};
use crate::capability::Capability;
use crate::command::CommandDispatcher;
use crate::directory::discover;
use crate::dump::{FileStore, PayloadStore};
use crate::events::{EventCallback, EventSink};
use crate::logger::{MessageLogMode, MessageLogger};
use crate::poller::{DEFAULT_POLL_INTERVAL, Poller, PollerHandle};
use crate::protocol::{DEFAULT_BASE_URL, command_template};
use crate::session::{Credentials, Session, login};
use crate::types::*;
use crate::{Error, Result};

pub struct MelCloudClientBuilder {
    credentials: Credentials,
    account_label: Option<String>,
    base_url: String,
    language: u32,
    request_timeout: Duration,
    poll_interval: Duration,
    event_callbacks: Vec<EventCallback>,
    log_mode: Option<MessageLogMode>,
    log_path: Option<String>,
    store: Option<Box<dyn PayloadStore>>,
}

impl MelCloudClientBuilder {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            credentials: Credentials::new(email, password),
            account_label: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            language: 0,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            event_callbacks: Vec::new(),
            log_mode: None,
            log_path: None,
            store: None,
        }
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Name used in log lines and error messages. Defaults to the account
    /// name the provider returns at login.
    pub fn account_label(mut self, label: impl Into<String>) -> Self {
        self.account_label = Some(label.into());
        self
    }

    /// MELCloud language code sent at login.
    pub fn language(mut self, language: u32) -> Self {
        self.language = language;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn on_event(mut self, f: impl Fn(&Event) + Send + Sync + 'static) -> Self {
        self.event_callbacks.push(Box::new(f));
        self
    }

    pub fn message_log(mut self, mode: MessageLogMode, path: impl Into<String>) -> Self {
        self.log_mode = Some(mode);
        self.log_path = Some(path.into());
        self
    }

    /// Saves the raw login and device listing bodies under `dir`.
    pub fn payload_dump(self, dir: impl Into<std::path::PathBuf>) -> Self {
        self.payload_store(FileStore::new(dir))
    }

    pub fn payload_store(mut self, store: impl PayloadStore + 'static) -> Self {
        self.store = Some(Box::new(store));
        self
    }

    pub fn build(self) -> Result<MelCloudClient> {
        let logger = match (self.log_mode, self.log_path) {
            (Some(mode), Some(path)) => Some(MessageLogger::new(mode, &path)?),
            _ => None,
        };
        let http = HttpApi::new(self.base_url, self.request_timeout, logger)?;

        Ok(MelCloudClient {
            http,
            credentials: self.credentials,
            account_label: self.account_label.unwrap_or_default(),
            language: self.language,
            poll_interval: self.poll_interval,
            events: EventSink::new(self.event_callbacks),
            store: self.store,
            session: None,
            devices: Vec::new(),
            dispatcher: None,
            pollers: Vec::new(),
            cancel: CancellationToken::new(),
        })
    }
}

/// One account: login, discovery, a poller per device, and commands.
pub struct MelCloudClient {
    http: HttpApi,
    credentials: Credentials,
    account_label: String,
    language: u32,
    poll_interval: Duration,
    events: EventSink,
    store: Option<Box<dyn PayloadStore>>,
    session: Option<Arc<Session>>,
    devices: Vec<Arc<DeviceDescriptor>>,
    dispatcher: Option<CommandDispatcher<SessionApi>>,
    pollers: Vec<PollerHandle>,
    cancel: CancellationToken,
}

impl MelCloudClient {
    pub fn builder(email: impl Into<String>, password: impl Into<String>) -> MelCloudClientBuilder {
        MelCloudClientBuilder::new(email, password)
    }

    /// Logs in and discovers devices. Reconnecting stops any running
    /// pollers first and drops the previous session, so a failed reconnect
    /// leaves the client disconnected.
    pub async fn connect(&mut self) -> Result<&[Arc<DeviceDescriptor>]> {
        self.shutdown().await;
        self.session = None;
        self.dispatcher = None;
        self.devices.clear();

        let session = login(
            &self.http,
            &self.account_label,
            &self.credentials,
            self.language,
            &self.events,
            self.store.as_deref(),
        )
        .await?;
        let session = Arc::new(session);

        let devices: Vec<Arc<DeviceDescriptor>> = discover(&self.http, &session, self.store.as_deref())
            .await?
            .into_iter()
            .map(Arc::new)
            .collect();

        let unit = session.temperature_unit();
        info!(account = %session.account_label(), devices = devices.len(), unit = unit.label(), "connected");
        self.events.emit(&Event::Connected {
            account: session.account_label().to_string(),
            context_key: session.token().to_string(),
            devices: devices.clone(),
            device_count: devices.len(),
            unit,
            unit_label: unit.label(),
        });

        let api = Arc::new(SessionApi::new(self.http.clone(), session.clone()));
        self.dispatcher = Some(CommandDispatcher::new(api, self.events.clone()));
        self.session = Some(session);
        self.devices = devices;
        Ok(self.devices.as_slice())
    }

    /// Spawns one poller per device that has a capability class. Returns the
    /// number of running pollers; calling it again is a no-op.
    pub fn start(&mut self) -> Result<usize> {
        let session = self.session.as_ref().ok_or(Error::NotConnected)?;
        if !self.pollers.is_empty() {
            return Ok(self.pollers.len());
        }

        let api = Arc::new(SessionApi::new(self.http.clone(), session.clone()));
        for device in &self.devices {
            let Some(capability) = Capability::for_type(device.device_type) else {
                debug!(device_id = device.device_id, device_type = ?device.device_type, "no poller for device type");
                continue;
            };
            self.pollers.push(Poller::spawn(
                api.clone(),
                device.clone(),
                capability,
                self.events.clone(),
                self.poll_interval,
                self.cancel.child_token(),
            ));
        }
        Ok(self.pollers.len())
    }

    /// Sends a complete-state body to the device's default command endpoint.
    pub async fn send(&self, device_id: i64, kind: CommandKind, payload: Value) -> Result<()> {
        let handle = self.handle_for(device_id)?;
        let device = handle.device();
        let template = command_template(device.device_type).ok_or(Error::UnsupportedDevice {
            device_id,
            device_type: device.device_type.code(),
        })?;
        self.send_with_template(device_id, template, payload, kind).await
    }

    /// `template` may carry `DID`/`BID` placeholders.
    pub async fn send_with_template(
        &self,
        device_id: i64,
        template: &str,
        payload: Value,
        kind: CommandKind,
    ) -> Result<()> {
        let dispatcher = self.dispatcher.as_ref().ok_or(Error::NotConnected)?;
        let handle = self.handle_for(device_id)?;
        dispatcher.send(handle, template, payload, kind).await
    }

    /// Stops every poller and waits for them to finish.
    pub async fn shutdown(&mut self) {
        if self.pollers.is_empty() {
            return;
        }
        self.cancel.cancel();
        for handle in self.pollers.drain(..) {
            handle.stop().await;
        }
        self.cancel = CancellationToken::new();
        debug!("all pollers stopped");
    }

    pub fn devices(&self) -> &[Arc<DeviceDescriptor>] {
        &self.devices
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_deref()
    }

    pub fn temperature_unit(&self) -> Option<TemperatureUnit> {
        self.session.as_ref().map(|s| s.temperature_unit())
    }

    pub fn pollers(&self) -> &[PollerHandle] {
        &self.pollers
    }

    pub fn poller(&self, device_id: i64) -> Option<&PollerHandle> {
        self.pollers.iter().find(|p| p.device().device_id == device_id)
    }

    fn handle_for(&self, device_id: i64) -> Result<&PollerHandle> {
        if let Some(handle) = self.poller(device_id) {
            return Ok(handle);
        }
        match self.devices.iter().find(|d| d.device_id == device_id) {
            None => Err(Error::UnknownDevice(device_id)),
            Some(d) if Capability::for_type(d.device_type).is_none() => Err(Error::UnsupportedDevice {
                device_id,
                device_type: d.device_type.code(),
            }),
            Some(_) => Err(Error::NotConnected),
        }
    }
}
