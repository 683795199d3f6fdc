use serde::Deserialize;
use serde_json::{Value, json};

use crate::types::DeviceType;
use crate::{Error, Result};

pub const DEFAULT_BASE_URL: &str = "https://app.melcloud.com/Mitsubishi.Wifi.Client";
pub const APP_VERSION: &str = "1.19.1.1";
pub const CONTEXT_KEY_HEADER: &str = "X-MitsContextKey";

pub const LOGIN_PATH: &str = "/Login/ClientLogin";
pub const LIST_DEVICES_PATH: &str = "/User/ListDevices";
pub const DEVICE_STATE_TEMPLATE: &str = "/Device/Get?id=DID&buildingID=BID";
pub const ATA_COMMAND_TEMPLATE: &str = "/Device/SetAta";
pub const ERV_COMMAND_TEMPLATE: &str = "/Device/SetErv";

const DEVICE_PLACEHOLDER: &str = "DID";
const BUILDING_PLACEHOLDER: &str = "BID";

pub fn login_body(email: &str, password: &str, language: u32) -> Value {
    json!({
        "Email": email,
        "Password": password,
        "Language": language,
        "AppVersion": APP_VERSION,
        "Persist": true,
        "CaptchaResponse": null
    })
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct LoginResponse {
    #[serde(default)]
    pub error_id: Option<i64>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub login_data: Option<LoginData>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct LoginData {
    pub context_key: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub use_fahrenheit: bool,
}

/// Accepts only a response with no `ErrorId` and a `LoginData` block.
pub(crate) fn parse_login_response(body: &str) -> Result<LoginData> {
    let resp: LoginResponse = serde_json::from_str(body)?;
    if let Some(id) = resp.error_id {
        let msg = resp.error_message.unwrap_or_default();
        return Err(Error::Protocol(format!("login rejected (ErrorId {id}) {msg}").trim_end().to_string()));
    }
    match resp.login_data {
        Some(data) if !data.context_key.is_empty() => Ok(data),
        _ => Err(Error::Protocol("login response has no context key".into())),
    }
}

pub fn substitute_ids(template: &str, device_id: i64, building_id: i64) -> String {
    template
        .replace(DEVICE_PLACEHOLDER, &device_id.to_string())
        .replace(BUILDING_PLACEHOLDER, &building_id.to_string())
}

pub fn command_template(device_type: DeviceType) -> Option<&'static str> {
    match device_type {
        DeviceType::Ata => Some(ATA_COMMAND_TEMPLATE),
        DeviceType::Erv => Some(ERV_COMMAND_TEMPLATE),
        DeviceType::Atw | DeviceType::Other(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_body_structure() {
        let body = login_body("me@example.com", "secret", 4);
        assert_eq!(body["Email"], "me@example.com");
        assert_eq!(body["Language"], 4);
        assert_eq!(body["AppVersion"], APP_VERSION);
        assert_eq!(body["Persist"], true);
        assert!(body["CaptchaResponse"].is_null());
    }

    #[test]
    fn parse_login_success() {
        let body = r#"{"ErrorId":null,"LoginData":{"ContextKey":"abc","Name":"Home","UseFahrenheit":true}}"#;
        let data = parse_login_response(body).unwrap();
        assert_eq!(data.context_key, "abc");
        assert_eq!(data.name.as_deref(), Some("Home"));
        assert!(data.use_fahrenheit);
    }

    #[test]
    fn parse_login_error_id() {
        let body = r#"{"ErrorId":1,"ErrorMessage":"Bad credentials","LoginData":null}"#;
        let err = parse_login_response(body).unwrap_err();
        assert!(err.to_string().contains("ErrorId 1"), "{err}");
        assert!(err.to_string().contains("Bad credentials"), "{err}");
    }

    #[test]
    fn parse_login_missing_data() {
        assert!(parse_login_response(r#"{"ErrorId":null}"#).is_err());
        assert!(parse_login_response("not json").is_err());
    }

    #[test]
    fn state_path_substitution() {
        assert_eq!(
            substitute_ids(DEVICE_STATE_TEMPLATE, 1234, 56),
            "/Device/Get?id=1234&buildingID=56"
        );
    }

    #[test]
    fn command_templates_by_type() {
        assert_eq!(command_template(DeviceType::Ata), Some("/Device/SetAta"));
        assert_eq!(command_template(DeviceType::Erv), Some("/Device/SetErv"));
        assert_eq!(command_template(DeviceType::Atw), None);
    }
}
