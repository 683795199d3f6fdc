use std::fmt;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, warn};

use crate::api::HttpApi;
use crate::dump::{PayloadKind, PayloadStore};
use crate::events::EventSink;
use crate::protocol::{login_body, parse_login_response};
use crate::types::TemperatureUnit;
use crate::{Error, Result};

#[derive(Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Result of one successful login. Never mutated; a fresh login replaces it.
#[derive(Clone)]
pub struct Session {
    token: String,
    account_label: String,
    created_at: DateTime<Utc>,
    use_fahrenheit: bool,
    raw: Value,
}

impl Session {
    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn account_label(&self) -> &str {
        &self.account_label
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn use_fahrenheit(&self) -> bool {
        self.use_fahrenheit
    }

    pub fn temperature_unit(&self) -> TemperatureUnit {
        TemperatureUnit::from_use_fahrenheit(self.use_fahrenheit)
    }

    /// The login response body as received.
    pub fn raw(&self) -> &Value {
        &self.raw
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("account_label", &self.account_label)
            .field("created_at", &self.created_at)
            .field("use_fahrenheit", &self.use_fahrenheit)
            .finish_non_exhaustive()
    }
}

/// Logs in once. No retry; every failure is an [`Error::Authentication`].
pub(crate) async fn login(
    http: &HttpApi,
    account_label: &str,
    credentials: &Credentials,
    language: u32,
    events: &EventSink,
    store: Option<&dyn PayloadStore>,
) -> Result<Session> {
    let account = if account_label.is_empty() {
        credentials.email.as_str()
    } else {
        account_label
    };
    let fail = |source: Error| Error::Authentication {
        account: account.to_string(),
        source: Box::new(source),
    };

    let body = login_body(&credentials.email, &credentials.password, language);
    let text = http.login(&body).await.map_err(fail)?;

    if let Some(store) = store
        && let Err(e) = store.save(PayloadKind::Login, &text)
    {
        warn!(error = %e, "failed to save login payload");
    }
    events.debug(format!("login response for {account}: {text}"));

    let data = parse_login_response(&text).map_err(fail)?;
    let raw = serde_json::from_str(&text).map_err(|e| fail(e.into()))?;

    let label = if account_label.is_empty() {
        data.name.unwrap_or_else(|| credentials.email.clone())
    } else {
        account_label.to_string()
    };
    debug!(account = %label, use_fahrenheit = data.use_fahrenheit, "logged in");

    Ok(Session {
        token: data.context_key,
        account_label: label,
        created_at: Utc::now(),
        use_fahrenheit: data.use_fahrenheit,
        raw,
    })
}

#[cfg(test)]
impl Session {
    pub(crate) fn for_tests(token: &str, use_fahrenheit: bool) -> Self {
        Self {
            token: token.to_string(),
            account_label: "test".into(),
            created_at: Utc::now(),
            use_fahrenheit,
            raw: Value::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credentials_debug_hides_password() {
        let creds = Credentials::new("a@b.c", "hunter2");
        let shown = format!("{creds:?}");
        assert!(shown.contains("a@b.c"));
        assert!(!shown.contains("hunter2"));
    }

    #[test]
    fn session_debug_hides_token() {
        let session = Session::for_tests("very-secret", true);
        assert!(!format!("{session:?}").contains("very-secret"));
        assert_eq!(session.temperature_unit(), TemperatureUnit::Fahrenheit);
    }
}
