//! Wire constants and request builders for the `/dsiot/multireq` endpoint.

use serde_json::{json, Value};

use crate::codec::WriteBlock;

pub(crate) const ENDPOINT_PATH: &str = "/dsiot/multireq";

pub(crate) const OP_READ: u8 = 2;
pub(crate) const OP_WRITE: u8 = 3;

/// Primary (indoor) unit status tree.
pub(crate) const DEST_MAIN: &str = "/dsiot/edge/adr_0100.dgc_status";
/// Outdoor unit status tree.
pub(crate) const DEST_OUTDOOR: &str = "/dsiot/edge/adr_0200.dgc_status";
/// Rolling weekly power-usage log.
pub(crate) const DEST_WEEK_POWER: &str = "/dsiot/edge/adr_0100.i_power.week_power";
/// Adapter info block; holds the MAC used for a stable identity.
pub(crate) const DEST_IDENTITY: &str = "/dsiot/edge.adp_i";

pub(crate) const POWER_ON: &str = "01";
pub(crate) const POWER_OFF: &str = "00";

/// Attribute that tells the device to apply pending changes atomically.
pub(crate) const COMMIT_MARKER: &str = "p_2D";
pub(crate) const COMMIT_VALUE: &str = "02";

pub(crate) const SWING_AXIS_ON: &str = "0F0000";

/// Write acknowledgements observed across firmware revisions.
pub(crate) const SUCCESS_CODES: [u16; 2] = [2000, 2004];

// Write paths, relative to the destination's root node.
pub(crate) const PATH_POWER: [&str; 2] = ["e_1002", "e_A002"];
pub(crate) const PATH_SETTINGS: [&str; 2] = ["e_1002", "e_3001"];
pub(crate) const PATH_HUMIDITY_CTRL: [&str; 2] = ["e_1002", "e_3003"];

// Read key chains, starting at the root node name.
pub(crate) const KEYS_POWER: [&str; 4] = ["dgc_status", "e_1002", "e_A002", "p_01"];
pub(crate) const KEYS_INDOOR_TEMP: [&str; 4] = ["dgc_status", "e_1002", "e_A00B", "p_01"];
pub(crate) const KEYS_INDOOR_HUMIDITY: [&str; 4] = ["dgc_status", "e_1002", "e_A00B", "p_02"];
pub(crate) const KEYS_OUTDOOR_TEMP: [&str; 4] = ["dgc_status", "e_1003", "e_A00D", "p_01"];
pub(crate) const KEYS_WEEK_ENERGY: [&str; 2] = ["week_power", "datas"];
pub(crate) const KEYS_TODAY_RUNTIME: [&str; 2] = ["week_power", "today_runtime"];
pub(crate) const KEYS_HUMIDITY_CTRL_ENABLED: [&str; 4] = ["dgc_status", "e_1002", "e_3003", "p_2C"];
pub(crate) const KEYS_HUMIDITY_CTRL_TARGET: [&str; 4] = ["dgc_status", "e_1002", "e_3003", "p_1A"];
pub(crate) const KEYS_MAC: [&str; 2] = ["adp_i", "mac"];

/// Key chain for a slot under the settings subtree (mode, setpoints,
/// fan speed, vanes).
pub(crate) fn setting_keys(slot: &str) -> [&str; 4] {
    ["dgc_status", "e_1002", "e_3001", slot]
}

/// Combined status read covering the three destinations the poll cycle
/// reconciles into one snapshot.
pub(crate) fn read_request() -> Value {
    json!({
        "requests": [
            {"op": OP_READ, "to": format!("{DEST_MAIN}?filter=pv,pt,md")},
            {"op": OP_READ, "to": format!("{DEST_OUTDOOR}?filter=pv,pt,md")},
            {"op": OP_READ, "to": format!("{DEST_WEEK_POWER}?filter=pv,pt,md")},
        ]
    })
}

pub(crate) fn identity_request() -> Value {
    json!({"requests": [{"op": OP_READ, "to": DEST_IDENTITY}]})
}

pub(crate) fn write_payload(blocks: &[WriteBlock]) -> Value {
    json!({"requests": blocks})
}

/// Normalize a reported MAC to lowercase colon-separated pairs.
pub(crate) fn format_mac(raw: &str) -> String {
    let hex: String = raw
        .chars()
        .filter(|c| c.is_ascii_hexdigit())
        .collect::<String>()
        .to_lowercase();
    if hex.len() == 12 {
        hex.as_bytes()
            .chunks(2)
            .map(|pair| std::str::from_utf8(pair).unwrap())
            .collect::<Vec<_>>()
            .join(":")
    } else {
        raw.to_lowercase()
    }
}
