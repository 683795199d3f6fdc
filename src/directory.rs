use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::api::HttpApi;
use crate::dump::{PayloadKind, PayloadStore};
use crate::session::Session;
use crate::types::{DeviceDescriptor, DeviceType};
use crate::{Error, Result};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Building {
    #[serde(rename = "ID")]
    id: i64,
    #[serde(default)]
    structure: Structure,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Structure {
    #[serde(default)]
    floors: Vec<Floor>,
    #[serde(default)]
    areas: Vec<Area>,
    #[serde(default)]
    devices: Vec<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Floor {
    #[serde(default)]
    areas: Vec<Area>,
    #[serde(default)]
    devices: Vec<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Area {
    #[serde(default)]
    devices: Vec<Value>,
}

/// Lists every device the session can see. No retry; failures are
/// [`Error::Discovery`].
pub(crate) async fn discover(
    http: &HttpApi,
    session: &Session,
    store: Option<&dyn PayloadStore>,
) -> Result<Vec<DeviceDescriptor>> {
    let fail = |source: Error| Error::Discovery {
        account: session.account_label().to_string(),
        source: Box::new(source),
    };

    let text = http.list_devices(session.token()).await.map_err(fail)?;
    if let Some(store) = store
        && let Err(e) = store.save(PayloadKind::DeviceList, &text)
    {
        warn!(error = %e, "failed to save device listing");
    }

    let devices = parse_device_list(&text).map_err(fail)?;
    debug!(account = %session.account_label(), count = devices.len(), "discovered devices");
    Ok(devices)
}

pub(crate) fn parse_device_list(body: &str) -> Result<Vec<DeviceDescriptor>> {
    let buildings: Vec<Building> = serde_json::from_str(body)?;
    Ok(flatten(&buildings))
}

/// Per building: each floor's area devices then the floor's own devices,
/// then the building's area devices, then the building's own devices.
fn flatten(buildings: &[Building]) -> Vec<DeviceDescriptor> {
    let mut out = Vec::new();
    for building in buildings {
        let structure = &building.structure;
        let entries = structure
            .floors
            .iter()
            .flat_map(|floor| floor.areas.iter().flat_map(|a| &a.devices).chain(&floor.devices))
            .chain(structure.areas.iter().flat_map(|a| &a.devices))
            .chain(&structure.devices);

        for entry in entries {
            match descriptor_from_entry(entry, building.id) {
                Some(device) => out.push(device),
                None => warn!(building = building.id, "skipping device entry without DeviceID"),
            }
        }
    }
    out
}

fn descriptor_from_entry(entry: &Value, building_id: i64) -> Option<DeviceDescriptor> {
    let device_id = entry.get("DeviceID").and_then(|v| v.as_i64())?;
    let type_code = entry
        .get("Type")
        .or_else(|| entry.pointer("/Device/DeviceType"))
        .and_then(|v| v.as_u64())
        .and_then(|v| u8::try_from(v).ok())
        .unwrap_or(0);

    Some(DeviceDescriptor {
        device_id,
        building_id: entry
            .get("BuildingID")
            .and_then(|v| v.as_i64())
            .unwrap_or(building_id),
        device_type: DeviceType::from_melcloud(type_code),
        name: entry
            .get("DeviceName")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string(),
        static_info: entry.clone(),
    })
}
