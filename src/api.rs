use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, trace};

use crate::command::PendingCommand;
use crate::logger::MessageLogger;
use crate::protocol::{CONTEXT_KEY_HEADER, DEVICE_STATE_TEMPLATE, LIST_DEVICES_PATH, LOGIN_PATH, substitute_ids};
use crate::session::Session;
use crate::types::DeviceDescriptor;
use crate::{Error, Result};

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// What a poller and the command dispatcher need from the provider.
pub trait DeviceApi: Send + Sync + 'static {
    /// Fetches the full state payload of one device.
    fn fetch_state(&self, device: &DeviceDescriptor) -> impl Future<Output = Result<Value>> + Send;

    /// Posts a complete-state command body to `command.path`.
    fn post_command(&self, command: &PendingCommand) -> impl Future<Output = Result<()>> + Send;
}

#[derive(Clone)]
pub(crate) struct HttpApi {
    http: reqwest::Client,
    base_url: String,
    timeout: Duration,
    logger: Option<Arc<Mutex<MessageLogger>>>,
}

impl HttpApi {
    pub fn new(
        base_url: impl Into<String>,
        timeout: Duration,
        logger: Option<MessageLogger>,
    ) -> Result<Self> {
        let http = reqwest::Client::builder().build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
            logger: logger.map(|l| Arc::new(Mutex::new(l))),
        })
    }

    pub fn log(&self, f: impl FnOnce(&mut MessageLogger)) {
        if let Some(logger) = &self.logger
            && let Ok(mut logger) = logger.lock()
        {
            f(&mut logger);
        }
    }

    /// Returns the raw response body; callers parse it.
    pub async fn login(&self, body: &Value) -> Result<String> {
        let url = format!("{}{LOGIN_PATH}", self.base_url);
        debug!(url = %url, "logging in");
        self.log(|l| l.log_request("POST", LOGIN_PATH));

        let resp = self
            .http
            .post(&url)
            .timeout(self.timeout)
            .json(body)
            .send()
            .await?;
        let status = resp.status().as_u16();
        let text = checked_text(resp).await?;

        self.log(|l| l.log_response(LOGIN_PATH, status, &as_json(&text)));
        Ok(text)
    }

    pub async fn list_devices(&self, token: &str) -> Result<String> {
        let url = format!("{}{LIST_DEVICES_PATH}", self.base_url);
        debug!(url = %url, "listing devices");
        self.log(|l| l.log_request("GET", LIST_DEVICES_PATH));

        let resp = self
            .http
            .get(&url)
            .header(CONTEXT_KEY_HEADER, token)
            .timeout(self.timeout)
            .send()
            .await?;
        let status = resp.status().as_u16();
        let text = checked_text(resp).await?;

        self.log(|l| l.log_response(LIST_DEVICES_PATH, status, &as_json(&text)));
        Ok(text)
    }

    async fn get_json(&self, token: &str, path: &str) -> Result<(u16, Value)> {
        let url = format!("{}{path}", self.base_url);
        trace!(url = %url, "GET");
        let resp = self
            .http
            .get(&url)
            .header(CONTEXT_KEY_HEADER, token)
            .timeout(self.timeout)
            .send()
            .await?;
        let status = resp.status().as_u16();
        let text = checked_text(resp).await?;
        Ok((status, serde_json::from_str(&text)?))
    }

    async fn post_json(&self, token: &str, path: &str, body: &Value) -> Result<()> {
        let url = format!("{}{path}", self.base_url);
        trace!(url = %url, "POST");
        let resp = self
            .http
            .post(&url)
            .header(CONTEXT_KEY_HEADER, token)
            .timeout(self.timeout)
            .json(body)
            .send()
            .await?;
        checked_text(resp).await?;
        Ok(())
    }
}

async fn checked_text(resp: reqwest::Response) -> Result<String> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(Error::Status {
            status: status.as_u16(),
            body,
        });
    }
    Ok(resp.text().await?)
}

fn as_json(text: &str) -> Value {
    serde_json::from_str(text).unwrap_or(Value::Null)
}

/// [`DeviceApi`] over HTTP, authorized by one shared, read-only session.
#[derive(Clone)]
pub struct SessionApi {
    http: HttpApi,
    session: Arc<Session>,
}

impl SessionApi {
    pub(crate) fn new(http: HttpApi, session: Arc<Session>) -> Self {
        Self { http, session }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }
}

impl DeviceApi for SessionApi {
    async fn fetch_state(&self, device: &DeviceDescriptor) -> Result<Value> {
        let path = substitute_ids(DEVICE_STATE_TEMPLATE, device.device_id, device.building_id);
        match self.http.get_json(self.session.token(), &path).await {
            Ok((status, body)) => {
                self.http.log(|l| l.log_poll(device.device_id, status, &body));
                Ok(body)
            }
            Err(e) => {
                self.http.log(|l| l.log_poll_failure(device.device_id, &e));
                Err(e)
            }
        }
    }

    async fn post_command(&self, command: &PendingCommand) -> Result<()> {
        debug!(command_id = %command.id, device_id = command.device_id, path = %command.path, "posting command");
        self.http
            .log(|l| l.log_command(command.id, command.device_id, command.kind, &command.payload));
        self.http
            .post_json(self.session.token(), &command.path, &command.payload)
            .await
    }
}
