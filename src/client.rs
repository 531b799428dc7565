use std::time::{Duration, Instant};

use serde_json::Value;
use tracing::{debug, trace, warn};

use crate::codec::{self, Attribute, ResponseEnvelope, WriteBlock};
use crate::convert::{hex_to_percentage, hex_to_temperature, percentage_to_hex, temperature_to_hex};
use crate::logger::MessageLogger;
use crate::protocol::{
    self, COMMIT_MARKER, COMMIT_VALUE, DEST_MAIN, DEST_OUTDOOR, DEST_WEEK_POWER,
    KEYS_HUMIDITY_CTRL_ENABLED, KEYS_HUMIDITY_CTRL_TARGET, KEYS_INDOOR_HUMIDITY,
    KEYS_INDOOR_TEMP, KEYS_MAC, KEYS_OUTDOOR_TEMP, KEYS_POWER, KEYS_TODAY_RUNTIME,
    KEYS_WEEK_ENERGY, PATH_HUMIDITY_CTRL, PATH_POWER, PATH_SETTINGS, POWER_OFF, POWER_ON,
    SUCCESS_CODES, SWING_AXIS_ON,
};
use crate::types::*;
use crate::{Error, Result};

/// Escalating retry delays after consecutive transport failures,
/// saturating at the last entry. One success resets the ladder.
const BACKOFFS: [Duration; 5] = [
    Duration::from_secs(10),
    Duration::from_secs(30),
    Duration::from_secs(60),
    Duration::from_secs(120),
    Duration::from_secs(300),
];

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_MIN_TEMP: f64 = 10.0;
const DEFAULT_MAX_TEMP: f64 = 30.0;

type SnapshotCallback = Box<dyn Fn(&DeviceState) + Send + Sync>;

pub struct DaikinClientBuilder {
    host: String,
    name: Option<String>,
    timeout: Duration,
    min_temp: f64,
    max_temp: f64,
    log_path: Option<String>,
    snapshot_callbacks: Vec<SnapshotCallback>,
}

impl DaikinClientBuilder {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            name: None,
            timeout: DEFAULT_TIMEOUT,
            min_temp: DEFAULT_MIN_TEMP,
            max_temp: DEFAULT_MAX_TEMP,
            log_path: None,
            snapshot_callbacks: Vec::new(),
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Setpoint clamp range in degrees Celsius. Defaults to 10..30.
    pub fn temperature_limits(mut self, min: f64, max: f64) -> Self {
        self.min_temp = min;
        self.max_temp = max;
        self
    }

    /// Append all device traffic to an NDJSON file at `path`.
    pub fn message_log(mut self, path: impl Into<String>) -> Self {
        self.log_path = Some(path.into());
        self
    }

    /// Called with the fresh snapshot after every successful poll.
    pub fn on_snapshot(mut self, f: impl Fn(&DeviceState) + Send + Sync + 'static) -> Self {
        self.snapshot_callbacks.push(Box::new(f));
        self
    }

    pub fn build(self) -> DaikinClient {
        let http = reqwest::Client::builder()
            .timeout(self.timeout)
            .build()
            .expect("failed to build HTTP client");

        let logger = self
            .log_path
            .map(|path| MessageLogger::new(&path).expect("failed to open log file"));

        let name = self
            .name
            .unwrap_or_else(|| format!("Daikin ({})", self.host));

        DaikinClient {
            http,
            endpoint: format!("http://{}{}", self.host, protocol::ENDPOINT_PATH),
            host: self.host,
            name,
            min_temp: self.min_temp,
            max_temp: self.max_temp,
            state: DeviceState::default(),
            available: true,
            fail_count: 0,
            next_retry: None,
            device_id: None,
            logger,
            snapshot_callbacks: self.snapshot_callbacks,
        }
    }
}

/// Polling client for one air conditioner on the local network.
///
/// Holds the single snapshot for its host; the poll cycle is the only
/// writer. Callers are expected to serialize access (methods take
/// `&mut self`), matching the device's one-request-at-a-time firmware.
pub struct DaikinClient {
    http: reqwest::Client,
    endpoint: String,
    host: String,
    name: String,
    min_temp: f64,
    max_temp: f64,
    state: DeviceState,
    available: bool,
    fail_count: u8,
    next_retry: Option<Instant>,
    device_id: Option<String>,
    logger: Option<MessageLogger>,
    snapshot_callbacks: Vec<SnapshotCallback>,
}

impl DaikinClient {
    pub fn builder(host: impl Into<String>) -> DaikinClientBuilder {
        DaikinClientBuilder::new(host)
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> &DeviceState {
        &self.state
    }

    pub fn available(&self) -> bool {
        self.available
    }

    pub fn failure_count(&self) -> u8 {
        self.fail_count
    }

    /// Time until the next poll attempt is allowed, when backing off.
    pub fn next_retry_in(&self) -> Option<Duration> {
        self.next_retry
            .map(|at| at.saturating_duration_since(Instant::now()))
    }

    /// Clear the retry window so the next poll is attempted immediately.
    /// The failure count is kept; only a successful poll resets it.
    pub fn reset_backoff(&mut self) {
        self.next_retry = None;
    }

    /// Identity suitable for a stable unique id: the adapter MAC, or a
    /// host-derived fallback when the lookup fails. Cached after the
    /// first call.
    pub async fn resolve_identity(&mut self) -> String {
        if let Some(ref id) = self.device_id {
            return id.clone();
        }
        let id = match self.fetch_mac().await {
            Ok(mac) => mac,
            Err(err) => {
                warn!(error = %err, "identity lookup failed, using host-derived id");
                format!("daikin-{}", self.host)
            }
        };
        self.device_id = Some(id.clone());
        id
    }

    pub fn device_id(&self) -> Option<&str> {
        self.device_id.as_deref()
    }

    async fn fetch_mac(&mut self) -> Result<String> {
        let payload = protocol::identity_request();
        let env = self.post(&payload, "identity").await?;
        let mac = codec::find_str(&env, protocol::DEST_IDENTITY, &KEYS_MAC)?;
        Ok(protocol::format_mac(mac))
    }

    /// Run one poll cycle, refreshing the snapshot.
    ///
    /// Never propagates: transport failures flip the availability flag
    /// and schedule a backoff window, per-field extraction failures
    /// leave the affected field at its previous or unknown value. A
    /// no-op while the backoff window is still open.
    pub async fn poll(&mut self) {
        let now = Instant::now();
        if let Some(retry_at) = self.next_retry
            && now < retry_at
        {
            trace!(
                remaining_secs = (retry_at - now).as_secs(),
                "poll skipped, still backing off"
            );
            return;
        }

        match self.try_poll().await {
            Ok(()) => {
                self.available = true;
                self.fail_count = 0;
                self.next_retry = None;
                for cb in &self.snapshot_callbacks {
                    cb(&self.state);
                }
            }
            Err(err) => self.record_failure(&err),
        }
    }

    async fn try_poll(&mut self) -> Result<()> {
        let payload = protocol::read_request();
        let env = self.post(&payload, "poll").await?;

        // Power and mode are the core fields; if these cannot be read
        // the cycle counts as failed.
        let power = codec::find_str(&env, DEST_MAIN, &KEYS_POWER)?;
        if power == POWER_OFF {
            self.state.mode = Mode::Off;
        } else {
            let mode_hex = codec::find_str(&env, DEST_MAIN, &protocol::setting_keys("p_01"))?;
            self.state.mode = Mode::from_wire_hex(mode_hex);
        }
        let mode = self.state.mode;

        self.state.outside_temperature = codec::find_str(&env, DEST_OUTDOOR, &KEYS_OUTDOOR_TEMP)
            .ok()
            .and_then(|hex| hex_to_temperature(hex, 2.0).ok());

        // Target temperature lives in a mode-dependent slot and firmware
        // revisions disagree on which one; try the candidates in order
        // and keep the previous value on total failure so a bound UI
        // slider never disappears.
        let mut target = None;
        for slot in mode.temperature_slot_candidates() {
            if let Ok(hex) = codec::find_str(&env, DEST_MAIN, &protocol::setting_keys(slot))
                && let Ok(temp) = hex_to_temperature(hex, 2.0)
            {
                target = Some(temp);
                break;
            }
        }
        if target.is_some() {
            self.state.target_temperature = target;
        }

        // The indoor sensor reports whole degrees (divisor 1).
        self.state.current_temperature = codec::find_str(&env, DEST_MAIN, &KEYS_INDOOR_TEMP)
            .ok()
            .and_then(|hex| hex_to_temperature(hex, 1.0).ok());

        self.state.fan_speed = match mode.fan_speed_slot() {
            Some(slot) => codec::find_str(&env, DEST_MAIN, &protocol::setting_keys(slot))
                .map(FanSpeed::from_wire_hex)
                .unwrap_or(FanSpeed::Auto),
            None => FanSpeed::Auto,
        };

        self.state.current_humidity = codec::find_str(&env, DEST_MAIN, &KEYS_INDOOR_HUMIDITY)
            .ok()
            .and_then(|hex| hex_to_percentage(hex).ok());

        let (v_slot, h_slot) = mode.vane_slots();
        self.state.vertical_vane_hex = None;
        self.state.horizontal_vane_hex = None;
        if mode != Mode::Off {
            if let Some(slot) = v_slot {
                self.state.vertical_vane_hex =
                    codec::find_str(&env, DEST_MAIN, &protocol::setting_keys(slot))
                        .ok()
                        .map(str::to_string);
            }
            if let Some(slot) = h_slot {
                self.state.horizontal_vane_hex =
                    codec::find_str(&env, DEST_MAIN, &protocol::setting_keys(slot))
                        .ok()
                        .map(str::to_string);
            }
            let v_on = self.state.vertical_vane_hex.as_deref() == Some(SWING_AXIS_ON);
            let h_on = self.state.horizontal_vane_hex.as_deref() == Some(SWING_AXIS_ON);
            self.state.swing = SwingMode::from_axes(v_on, h_on);
        } else {
            self.state.swing = SwingMode::Off;
        }
        self.state.vertical_vane = self
            .state
            .vertical_vane_hex
            .as_deref()
            .and_then(VerticalVane::from_wire_hex);
        self.state.horizontal_vane = self
            .state
            .horizontal_vane_hex
            .as_deref()
            .and_then(HorizontalVane::from_wire_hex);

        // Weekly energy log: today is the last sample, yesterday the
        // second-to-last. Zero is the device's "no data yet" sentinel,
        // not a reading.
        let samples: Vec<f64> = match codec::find_value(&env, DEST_WEEK_POWER, &KEYS_WEEK_ENERGY) {
            Ok(Value::Array(arr)) => arr.iter().filter_map(|v| v.as_f64()).collect(),
            _ => Vec::new(),
        };
        self.state.energy_today_kwh = samples.last().copied().filter(|v| *v != 0.0);
        self.state.energy_yesterday_kwh = samples
            .len()
            .checked_sub(2)
            .and_then(|i| samples.get(i))
            .copied()
            .filter(|v| *v != 0.0);
        let week_total: f64 = samples.iter().sum();
        self.state.energy_week_total_kwh =
            (!samples.is_empty() && week_total != 0.0).then_some(week_total);

        self.state.runtime_today_min = codec::find_value(&env, DEST_WEEK_POWER, &KEYS_TODAY_RUNTIME)
            .ok()
            .and_then(|v| v.as_u64())
            .map(|v| v as u32);

        self.state.humidity_control_enabled =
            codec::find_str(&env, DEST_MAIN, &KEYS_HUMIDITY_CTRL_ENABLED)
                .ok()
                .map(|v| v == "01");
        self.state.humidity_control_target =
            codec::find_str(&env, DEST_MAIN, &KEYS_HUMIDITY_CTRL_TARGET)
                .ok()
                .and_then(|hex| hex_to_percentage(hex).ok());

        Ok(())
    }

    // -- Command methods --

    /// Switch the operating mode. Turning off is a single power write;
    /// turning on sends power-on first, then the mode with a commit
    /// marker, since some firmware rejects both in one request. One
    /// refresh poll follows the final write.
    pub async fn set_mode(&mut self, mode: Mode) -> Result<()> {
        let Some(mode_hex) = mode.as_wire_hex() else {
            let off = [Attribute::new("p_01", POWER_OFF, &PATH_POWER, DEST_MAIN)];
            return self.dispatch_write("power_off", &off).await;
        };

        let on = [Attribute::new("p_01", POWER_ON, &PATH_POWER, DEST_MAIN)];
        self.send_write("power_on", &on).await?;

        let attrs = [
            Attribute::new("p_01", mode_hex, &PATH_SETTINGS, DEST_MAIN),
            commit_marker(),
        ];
        self.dispatch_write("set_mode", &attrs).await
    }

    /// Set the target temperature, clamped to the configured limits.
    /// A logged no-op in modes without an adjustable setpoint.
    pub async fn set_temperature(&mut self, celsius: f64) -> Result<()> {
        let mode = self.state.mode;
        let Some(slot) = mode.temperature_slot() else {
            debug!(mode = %mode, "target temperature not adjustable in this mode");
            return Ok(());
        };
        let hex = temperature_to_hex(celsius, self.min_temp, self.max_temp);
        let attrs = [
            commit_marker(),
            Attribute::new(slot, &hex, &PATH_SETTINGS, DEST_MAIN),
        ];
        self.dispatch_write("set_temperature", &attrs).await
    }

    /// Set the fan speed. Routed to the current mode's slot; a logged
    /// no-op when the mode has none (Dry).
    pub async fn set_fan_speed(&mut self, speed: FanSpeed) -> Result<()> {
        let mode = self.state.mode;
        let Some(slot) = mode.fan_speed_slot() else {
            debug!(mode = %mode, "fan speed not adjustable in this mode");
            return Ok(());
        };
        let attrs = [
            commit_marker(),
            Attribute::new(slot, speed.as_wire_hex(), &PATH_SETTINGS, DEST_MAIN),
        ];
        self.dispatch_write("set_fan_speed", &attrs).await
    }

    /// Turn each vane axis' oscillation on or off.
    pub async fn set_swing(&mut self, swing: SwingMode) -> Result<()> {
        let mode = self.state.mode;
        let (v_slot, h_slot) = mode.vane_slots();
        if v_slot.is_none() && h_slot.is_none() {
            debug!(mode = %mode, "swing not adjustable in this mode");
            return Ok(());
        }
        let v_vane = match swing {
            SwingMode::Both | SwingMode::Vertical => VerticalVane::Swing,
            _ => VerticalVane::Off,
        };
        let h_vane = match swing {
            SwingMode::Both | SwingMode::Horizontal => HorizontalVane::Swing,
            _ => HorizontalVane::Off,
        };
        let mut attrs = vec![commit_marker()];
        if let Some(slot) = v_slot {
            attrs.push(Attribute::new(slot, v_vane.as_wire_hex(), &PATH_SETTINGS, DEST_MAIN));
        }
        if let Some(slot) = h_slot {
            attrs.push(Attribute::new(slot, h_vane.as_wire_hex(), &PATH_SETTINGS, DEST_MAIN));
        }
        self.dispatch_write("set_swing", &attrs).await
    }

    /// Position one or both vanes. Axes passed as `None` are left
    /// untouched; a no-op when nothing resolves to a writable slot.
    pub async fn set_vane_position(
        &mut self,
        vertical: Option<VerticalVane>,
        horizontal: Option<HorizontalVane>,
    ) -> Result<()> {
        if vertical.is_none() && horizontal.is_none() {
            return Ok(());
        }
        let mode = self.state.mode;
        let (v_slot, h_slot) = mode.vane_slots();
        let mut attrs = vec![commit_marker()];
        if let (Some(vane), Some(slot)) = (vertical, v_slot) {
            attrs.push(Attribute::new(slot, vane.as_wire_hex(), &PATH_SETTINGS, DEST_MAIN));
        }
        if let (Some(vane), Some(slot)) = (horizontal, h_slot) {
            attrs.push(Attribute::new(slot, vane.as_wire_hex(), &PATH_SETTINGS, DEST_MAIN));
        }
        if attrs.len() == 1 {
            debug!(mode = %mode, "vane position not adjustable in this mode");
            return Ok(());
        }
        self.dispatch_write("set_vane_position", &attrs).await
    }

    /// Enable or disable humidity control, optionally with a new target
    /// percentage (clamped to 0..=100).
    pub async fn set_humidity_control(
        &mut self,
        enabled: bool,
        target: Option<u8>,
    ) -> Result<()> {
        let mut attrs = vec![
            commit_marker(),
            Attribute::new(
                "p_2C",
                if enabled { "01" } else { "00" },
                &PATH_HUMIDITY_CTRL,
                DEST_MAIN,
            ),
        ];
        if let Some(percent) = target {
            attrs.push(Attribute::new(
                "p_1A",
                &percentage_to_hex(percent),
                &PATH_HUMIDITY_CTRL,
                DEST_MAIN,
            ));
        }
        self.dispatch_write("set_humidity_control", &attrs).await
    }

    // -- Write path --

    async fn dispatch_write(&mut self, action: &str, attrs: &[Attribute]) -> Result<()> {
        self.send_write(action, attrs).await?;
        self.poll().await;
        Ok(())
    }

    async fn send_write(&mut self, action: &str, attrs: &[Attribute]) -> Result<()> {
        let blocks = codec::serialize_writes(attrs);
        let payload = protocol::write_payload(&blocks);
        if let Some(ref mut logger) = self.logger {
            logger.log_command(action, &payload);
        }

        let env = self.post_for_write(&payload, action).await?;
        let code = response_code(&env)?;
        if SUCCESS_CODES.contains(&code) {
            return Ok(());
        }

        // Some firmware rejects requests mixing the commit marker with
        // other attribute writes. Retry as two sub-requests isolating
        // the marker; anything else is a protocol anomaly.
        if blocks_mix_commit(&blocks) {
            warn!(code, action, "write rejected, retrying with commit marker isolated");
            let settings = filter_blocks(&blocks, |name| name != COMMIT_MARKER);
            self.send_split(action, &settings).await?;
            let marker = filter_blocks(&blocks, |name| name == COMMIT_MARKER);
            self.send_split(action, &marker).await?;
            Ok(())
        } else {
            warn!(code, action, "write acknowledged with unexpected code");
            Err(Error::UnexpectedResponseCode(code))
        }
    }

    async fn send_split(&mut self, action: &str, blocks: &[WriteBlock]) -> Result<()> {
        if blocks.is_empty() {
            return Ok(());
        }
        let payload = protocol::write_payload(blocks);
        if let Some(ref mut logger) = self.logger {
            logger.log_command(action, &payload);
        }
        let env = self.post_for_write(&payload, action).await?;
        let code = response_code(&env)?;
        if SUCCESS_CODES.contains(&code) {
            Ok(())
        } else {
            Err(Error::UnexpectedResponseCode(code))
        }
    }

    // -- Transport --

    async fn post(&mut self, payload: &Value, kind: &str) -> Result<ResponseEnvelope> {
        if let Some(ref mut logger) = self.logger {
            logger.log_request(kind, payload);
        }
        let resp = self
            .http
            .post(&self.endpoint)
            .json(payload)
            .send()
            .await?
            .error_for_status()?;
        let status = resp.status().as_u16();
        let body: Value = resp.json().await?;
        if let Some(ref mut logger) = self.logger {
            logger.log_response(status, &body);
        }
        serde_json::from_value(body)
            .map_err(|e| Error::Protocol(format!("malformed response envelope: {e}")))
    }

    /// Transport failures during writes feed the same availability and
    /// backoff bookkeeping as the poll cycle.
    async fn post_for_write(&mut self, payload: &Value, action: &str) -> Result<ResponseEnvelope> {
        match self.post(payload, action).await {
            Ok(env) => Ok(env),
            Err(err) => {
                if matches!(err, Error::Http(_)) {
                    self.record_failure(&err);
                }
                Err(err)
            }
        }
    }

    fn record_failure(&mut self, err: &Error) {
        self.available = false;
        self.fail_count = (self.fail_count + 1).min(BACKOFFS.len() as u8);
        let backoff = BACKOFFS[self.fail_count as usize - 1];
        self.next_retry = Some(Instant::now() + backoff);
        warn!(
            error = %err,
            failures = self.fail_count,
            backoff_secs = backoff.as_secs(),
            "device update failed, backing off"
        );
    }
}

fn commit_marker() -> Attribute {
    Attribute::new(COMMIT_MARKER, COMMIT_VALUE, &PATH_HUMIDITY_CTRL, DEST_MAIN)
}

fn response_code(env: &ResponseEnvelope) -> Result<u16> {
    env.responses
        .first()
        .and_then(|b| b.rsc)
        .ok_or_else(|| Error::Protocol("write response missing rsc".to_string()))
}

fn blocks_mix_commit(blocks: &[WriteBlock]) -> bool {
    blocks.iter().any(|b| {
        b.pc.any_leaf(&|name| name == COMMIT_MARKER)
            && b.pc.any_leaf(&|name| name.starts_with("p_") && name != COMMIT_MARKER)
    })
}

fn filter_blocks(blocks: &[WriteBlock], keep: impl Fn(&str) -> bool + Copy) -> Vec<WriteBlock> {
    blocks
        .iter()
        .map(|b| {
            let mut filtered = b.clone();
            filtered.pc.retain_leaves(&keep);
            filtered
        })
        .filter(|b| b.pc.any_leaf(&|_| true))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_blocks(attrs: &[Attribute]) -> Vec<WriteBlock> {
        codec::serialize_writes(attrs)
    }

    #[test]
    fn mixed_commit_detection() {
        let mixed = write_blocks(&[
            commit_marker(),
            Attribute::new("p_02", "34", &PATH_SETTINGS, DEST_MAIN),
        ]);
        assert!(blocks_mix_commit(&mixed));

        let power_only = write_blocks(&[Attribute::new("p_01", "00", &PATH_POWER, DEST_MAIN)]);
        assert!(!blocks_mix_commit(&power_only));

        let commit_only = write_blocks(&[commit_marker()]);
        assert!(!blocks_mix_commit(&commit_only));
    }

    #[test]
    fn filter_blocks_isolates_commit_marker() {
        let blocks = write_blocks(&[
            commit_marker(),
            Attribute::new("p_02", "34", &PATH_SETTINGS, DEST_MAIN),
        ]);

        let settings = filter_blocks(&blocks, |name| name != COMMIT_MARKER);
        assert_eq!(settings.len(), 1);
        assert!(!settings[0].pc.any_leaf(&|n| n == COMMIT_MARKER));
        assert!(settings[0].pc.any_leaf(&|n| n == "p_02"));

        let marker = filter_blocks(&blocks, |name| name == COMMIT_MARKER);
        assert_eq!(marker.len(), 1);
        assert!(marker[0].pc.any_leaf(&|n| n == COMMIT_MARKER));
        assert!(!marker[0].pc.any_leaf(&|n| n == "p_02"));
    }

    #[test]
    fn filter_blocks_drops_empty_blocks() {
        let blocks = write_blocks(&[Attribute::new("p_01", "00", &PATH_POWER, DEST_MAIN)]);
        let marker_only = filter_blocks(&blocks, |name| name == COMMIT_MARKER);
        assert!(marker_only.is_empty());
    }

    #[test]
    fn backoff_ladder_saturates() {
        let mut client = DaikinClient::builder("127.0.0.1").build();
        let err = Error::Protocol("test".to_string());
        for expected in [10, 30, 60, 120, 300, 300, 300] {
            client.record_failure(&err);
            let wait = client.next_retry_in().unwrap();
            assert!(wait <= Duration::from_secs(expected));
            assert!(wait > Duration::from_secs(expected - 2));
        }
        assert_eq!(client.failure_count(), 5);
        assert!(!client.available());
    }
}
