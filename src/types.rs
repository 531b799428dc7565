use std::fmt;

/// Operating mode. `Off` is carried by a separate power flag on the wire;
/// the mode hex only covers the on-modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Off,
    Heat,
    Cool,
    Auto,
    Dry,
    FanOnly,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Off => "off",
            Mode::Heat => "heat",
            Mode::Cool => "cool",
            Mode::Auto => "auto",
            Mode::Dry => "dry",
            Mode::FanOnly => "fan_only",
        }
    }

    pub fn as_wire_hex(&self) -> Option<&'static str> {
        match self {
            Mode::Off => None,
            Mode::Heat => Some("0100"),
            Mode::Cool => Some("0200"),
            Mode::Auto => Some("0300"),
            Mode::Dry => Some("0500"),
            Mode::FanOnly => Some("0000"),
        }
    }

    /// Map a mode hex reported by the device. Unknown values fall back to
    /// Cool rather than failing the poll cycle.
    pub fn from_wire_hex(hex: &str) -> Self {
        match hex {
            "0000" => Mode::FanOnly,
            "0100" => Mode::Heat,
            "0200" => Mode::Cool,
            "0300" => Mode::Auto,
            "0500" => Mode::Dry,
            _ => Mode::Cool,
        }
    }

    /// Slot holding the target temperature for writes in this mode.
    /// None means the mode has no adjustable setpoint.
    pub fn temperature_slot(&self) -> Option<&'static str> {
        match self {
            Mode::Cool | Mode::Auto => Some("p_02"),
            Mode::Heat => Some("p_03"),
            Mode::Off | Mode::Dry | Mode::FanOnly => None,
        }
    }

    /// Candidate slots to try, in order, when reading the target
    /// temperature back. Firmware revisions disagree on which slot is
    /// populated, so the first parseable value wins.
    pub fn temperature_slot_candidates(&self) -> &'static [&'static str] {
        match self {
            Mode::Cool => &["p_02", "p_04", "p_03"],
            Mode::Heat => &["p_03", "p_02", "p_04"],
            Mode::Auto => &["p_02", "p_03", "p_04"],
            Mode::Off | Mode::Dry | Mode::FanOnly => &[],
        }
    }

    /// Slot holding the fan speed, where the mode allows changing it.
    /// Dry mode has no fan-speed slot.
    pub fn fan_speed_slot(&self) -> Option<&'static str> {
        match self {
            Mode::Heat | Mode::Cool | Mode::Auto | Mode::FanOnly => Some("p_09"),
            Mode::Off | Mode::Dry => None,
        }
    }

    /// (vertical, horizontal) vane slots for this mode.
    pub fn vane_slots(&self) -> (Option<&'static str>, Option<&'static str>) {
        match self {
            Mode::Off => (None, None),
            _ => (Some("p_05"), Some("p_06")),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FanSpeed {
    Quiet,
    #[default]
    Auto,
    Level1,
    Level2,
    Level3,
    Level4,
    Level5,
}

impl FanSpeed {
    pub fn as_str(&self) -> &'static str {
        match self {
            FanSpeed::Quiet => "Quiet",
            FanSpeed::Auto => "Auto",
            FanSpeed::Level1 => "Level 1",
            FanSpeed::Level2 => "Level 2",
            FanSpeed::Level3 => "Level 3",
            FanSpeed::Level4 => "Level 4",
            FanSpeed::Level5 => "Level 5",
        }
    }

    pub fn as_wire_hex(&self) -> &'static str {
        match self {
            FanSpeed::Quiet => "0B00",
            FanSpeed::Auto => "0A00",
            FanSpeed::Level1 => "0300",
            FanSpeed::Level2 => "0400",
            FanSpeed::Level3 => "0500",
            FanSpeed::Level4 => "0600",
            FanSpeed::Level5 => "0700",
        }
    }

    /// Unknown hex falls back to Auto; one odd value must not fail a poll.
    pub fn from_wire_hex(hex: &str) -> Self {
        match hex {
            "0B00" => FanSpeed::Quiet,
            "0A00" => FanSpeed::Auto,
            "0300" => FanSpeed::Level1,
            "0400" => FanSpeed::Level2,
            "0500" => FanSpeed::Level3,
            "0600" => FanSpeed::Level4,
            "0700" => FanSpeed::Level5,
            _ => FanSpeed::Auto,
        }
    }
}

impl fmt::Display for FanSpeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Combined oscillation indicator derived from the two vane axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SwingMode {
    #[default]
    Off,
    Vertical,
    Horizontal,
    Both,
}

impl SwingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SwingMode::Off => "off",
            SwingMode::Vertical => "vertical",
            SwingMode::Horizontal => "horizontal",
            SwingMode::Both => "both",
        }
    }

    pub(crate) fn from_axes(vertical_on: bool, horizontal_on: bool) -> Self {
        match (vertical_on, horizontal_on) {
            (true, true) => SwingMode::Both,
            (true, false) => SwingMode::Vertical,
            (false, true) => SwingMode::Horizontal,
            (false, false) => SwingMode::Off,
        }
    }
}

impl fmt::Display for SwingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerticalVane {
    Off,
    Auto,
    Swing,
    Circulation,
    Top,
    Upper,
    UpperMiddle,
    LowerMiddle,
    Lower,
    Bottom,
}

impl VerticalVane {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerticalVane::Off => "Off",
            VerticalVane::Auto => "Auto",
            VerticalVane::Swing => "Swing",
            VerticalVane::Circulation => "Circulation",
            VerticalVane::Top => "Top",
            VerticalVane::Upper => "Upper",
            VerticalVane::UpperMiddle => "Upper-Middle",
            VerticalVane::LowerMiddle => "Lower-Middle",
            VerticalVane::Lower => "Lower",
            VerticalVane::Bottom => "Bottom",
        }
    }

    pub fn as_wire_hex(&self) -> &'static str {
        match self {
            VerticalVane::Off => "000000",
            VerticalVane::Auto => "100000",
            VerticalVane::Swing => "0F0000",
            VerticalVane::Circulation => "140000",
            VerticalVane::Top => "010000",
            VerticalVane::Upper => "020000",
            VerticalVane::UpperMiddle => "030000",
            VerticalVane::LowerMiddle => "040000",
            VerticalVane::Lower => "050000",
            VerticalVane::Bottom => "060000",
        }
    }

    pub fn from_wire_hex(hex: &str) -> Option<Self> {
        match hex {
            "000000" => Some(VerticalVane::Off),
            "100000" => Some(VerticalVane::Auto),
            "0F0000" => Some(VerticalVane::Swing),
            "140000" => Some(VerticalVane::Circulation),
            "010000" => Some(VerticalVane::Top),
            "020000" => Some(VerticalVane::Upper),
            "030000" => Some(VerticalVane::UpperMiddle),
            "040000" => Some(VerticalVane::LowerMiddle),
            "050000" => Some(VerticalVane::Lower),
            "060000" => Some(VerticalVane::Bottom),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HorizontalVane {
    Off,
    Swing,
    Left,
    LeftCenter,
    Center,
    RightCenter,
    Right,
}

impl HorizontalVane {
    pub fn as_str(&self) -> &'static str {
        match self {
            HorizontalVane::Off => "Off",
            HorizontalVane::Swing => "Swing",
            HorizontalVane::Left => "Left",
            HorizontalVane::LeftCenter => "Left-Center",
            HorizontalVane::Center => "Center",
            HorizontalVane::RightCenter => "Right-Center",
            HorizontalVane::Right => "Right",
        }
    }

    pub fn as_wire_hex(&self) -> &'static str {
        match self {
            HorizontalVane::Off => "000000",
            HorizontalVane::Swing => "0F0000",
            HorizontalVane::Left => "010000",
            HorizontalVane::LeftCenter => "020000",
            HorizontalVane::Center => "030000",
            HorizontalVane::RightCenter => "040000",
            HorizontalVane::Right => "050000",
        }
    }

    pub fn from_wire_hex(hex: &str) -> Option<Self> {
        match hex {
            "000000" => Some(HorizontalVane::Off),
            "0F0000" => Some(HorizontalVane::Swing),
            "010000" => Some(HorizontalVane::Left),
            "020000" => Some(HorizontalVane::LeftCenter),
            "030000" => Some(HorizontalVane::Center),
            "040000" => Some(HorizontalVane::RightCenter),
            "050000" => Some(HorizontalVane::Right),
            _ => None,
        }
    }
}

/// Current device snapshot, mutated only by the poll cycle.
///
/// Optional fields stay None when the device did not report them; the
/// target temperature keeps its previous value instead so a UI slider
/// bound to it never disappears mid-session.
#[derive(Debug, Clone)]
pub struct DeviceState {
    pub mode: Mode,
    pub fan_speed: FanSpeed,
    pub swing: SwingMode,
    pub target_temperature: Option<f64>,
    pub current_temperature: Option<f64>,
    pub outside_temperature: Option<f64>,
    pub current_humidity: Option<u8>,
    pub humidity_control_enabled: Option<bool>,
    pub humidity_control_target: Option<u8>,
    pub energy_today_kwh: Option<f64>,
    pub energy_yesterday_kwh: Option<f64>,
    pub energy_week_total_kwh: Option<f64>,
    pub runtime_today_min: Option<u32>,
    pub vertical_vane: Option<VerticalVane>,
    pub horizontal_vane: Option<HorizontalVane>,
    /// Raw axis hex as last reported, kept for diagnostics.
    pub vertical_vane_hex: Option<String>,
    pub horizontal_vane_hex: Option<String>,
}

impl Default for DeviceState {
    fn default() -> Self {
        Self {
            mode: Mode::Off,
            fan_speed: FanSpeed::Auto,
            swing: SwingMode::Off,
            // 26.0 so UIs have a sane slider position before the first poll.
            target_temperature: Some(26.0),
            current_temperature: None,
            outside_temperature: None,
            current_humidity: None,
            humidity_control_enabled: None,
            humidity_control_target: None,
            energy_today_kwh: None,
            energy_yesterday_kwh: None,
            energy_week_total_kwh: None,
            runtime_today_min: None,
            vertical_vane: None,
            horizontal_vane: None,
            vertical_vane_hex: None,
            horizontal_vane_hex: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_hex_roundtrip() {
        for mode in [Mode::Heat, Mode::Cool, Mode::Auto, Mode::Dry, Mode::FanOnly] {
            let hex = mode.as_wire_hex().unwrap();
            assert_eq!(Mode::from_wire_hex(hex), mode);
        }
        assert!(Mode::Off.as_wire_hex().is_none());
    }

    #[test]
    fn unknown_mode_hex_defaults_to_cool() {
        assert_eq!(Mode::from_wire_hex("4242"), Mode::Cool);
    }

    #[test]
    fn fan_speed_hex_roundtrip() {
        for speed in [
            FanSpeed::Quiet,
            FanSpeed::Auto,
            FanSpeed::Level1,
            FanSpeed::Level2,
            FanSpeed::Level3,
            FanSpeed::Level4,
            FanSpeed::Level5,
        ] {
            assert_eq!(FanSpeed::from_wire_hex(speed.as_wire_hex()), speed);
        }
        assert_eq!(FanSpeed::from_wire_hex("FFFF"), FanSpeed::Auto);
    }

    #[test]
    fn dry_mode_has_no_fan_slot() {
        assert_eq!(Mode::Dry.fan_speed_slot(), None);
        assert_eq!(Mode::Cool.fan_speed_slot(), Some("p_09"));
    }

    #[test]
    fn temperature_routing_per_mode() {
        assert_eq!(Mode::Cool.temperature_slot(), Some("p_02"));
        assert_eq!(Mode::Heat.temperature_slot(), Some("p_03"));
        assert_eq!(Mode::Dry.temperature_slot(), None);
        assert_eq!(Mode::Cool.temperature_slot_candidates(), &["p_02", "p_04", "p_03"]);
        assert!(Mode::FanOnly.temperature_slot_candidates().is_empty());
    }

    #[test]
    fn swing_from_axes() {
        assert_eq!(SwingMode::from_axes(true, true), SwingMode::Both);
        assert_eq!(SwingMode::from_axes(true, false), SwingMode::Vertical);
        assert_eq!(SwingMode::from_axes(false, true), SwingMode::Horizontal);
        assert_eq!(SwingMode::from_axes(false, false), SwingMode::Off);
    }

    #[test]
    fn vane_tables_differ_per_axis() {
        assert_eq!(VerticalVane::Swing.as_wire_hex(), "0F0000");
        assert_eq!(HorizontalVane::Swing.as_wire_hex(), "0F0000");
        // 010000 means Top vertically but Left horizontally.
        assert_eq!(VerticalVane::from_wire_hex("010000"), Some(VerticalVane::Top));
        assert_eq!(HorizontalVane::from_wire_hex("010000"), Some(HorizontalVane::Left));
        assert_eq!(VerticalVane::from_wire_hex("ABCDEF"), None);
    }

    #[test]
    fn default_snapshot_sentinels() {
        let state = DeviceState::default();
        assert_eq!(state.mode, Mode::Off);
        assert_eq!(state.target_temperature, Some(26.0));
        assert_eq!(state.fan_speed, FanSpeed::Auto);
        assert_eq!(state.swing, SwingMode::Off);
        assert!(state.current_temperature.is_none());
    }
}
