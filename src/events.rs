use std::sync::Arc;

use crate::types::Event;

pub(crate) type EventCallback = Box<dyn Fn(&Event) + Send + Sync>;

/// Fan-out to the registered callbacks. Cloned into every poller.
#[derive(Clone, Default)]
pub(crate) struct EventSink {
    callbacks: Arc<Vec<EventCallback>>,
}

impl EventSink {
    pub fn new(callbacks: Vec<EventCallback>) -> Self {
        Self {
            callbacks: Arc::new(callbacks),
        }
    }

    pub fn emit(&self, event: &Event) {
        for cb in self.callbacks.iter() {
            cb(event);
        }
    }

    pub fn error(&self, device_id: Option<i64>, message: impl Into<String>) {
        self.emit(&Event::Error {
            device_id,
            message: message.into(),
        });
    }

    pub fn debug(&self, message: impl Into<String>) {
        self.emit(&Event::Debug {
            message: message.into(),
        });
    }
}
