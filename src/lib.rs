mod api;
mod capability;
mod client;
mod command;
mod directory;
mod dump;
mod error;
mod events;
mod info;
mod logger;
mod poller;
mod protocol;
mod session;
#[cfg(test)]
mod testing;
mod types;

pub use api::{DEFAULT_REQUEST_TIMEOUT, DeviceApi, SessionApi};
pub use capability::Capability;
pub use client::{MelCloudClient, MelCloudClientBuilder};
pub use command::{CommandDispatcher, PendingCommand};
pub use dump::{FileStore, PayloadKind, PayloadStore};
pub use error::{Error, Result};
pub use info::{MANUFACTURER, UNDEFINED};
pub use logger::MessageLogMode;
pub use poller::{DEFAULT_POLL_INTERVAL, PollPhase, PollStatus, PollerHandle};
pub use protocol::{
    APP_VERSION, ATA_COMMAND_TEMPLATE, CONTEXT_KEY_HEADER, DEFAULT_BASE_URL, DEVICE_STATE_TEMPLATE,
    ERV_COMMAND_TEMPLATE, LIST_DEVICES_PATH, LOGIN_PATH,
};
pub use session::{Credentials, Session};
pub use types::*;
