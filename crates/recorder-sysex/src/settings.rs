//! Configuration field codec
//!
//! Maps each configuration field to the command that reads it, the command
//! that writes it, and the decoder for the read reply. Encoders validate
//! their inputs; nothing here touches the transport.
//!
//! | Field         | Read            | Write                                 |
//! |---------------|-----------------|---------------------------------------|
//! | User mode     | `22 05`         | `21 05 <mode>`                        |
//! | MIDI channel  | `22 03`         | `21 03 <channel>`                     |
//! | Easy-connect  | `22 01`         | `21 01 <0=on,1=off>`                  |
//! | Smoothing     | `31 08 01`      | `30 08 02 03 <maintain> 04 <smooth>`  |
//! | Sensitivity   | `31 07 01`      | `30 07 02 00 <hi7> <lo7> 01 <vel>`    |
//! | Controllers   | `31 01 01`      | `30 <template>`                       |
//! | Chart         | `31 00 00`      | `30 00 00 <records>`                  |
//! | Battery       | `3A 02`         |                                       |

use crate::error::{RecorderError, Result, ValidationError};
use crate::fingering::FingeringRecord;
use crate::framing::hex;
use crate::tables::{CodeTable, CURVES, USER_MODES};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const MIN_THRESHOLD: u16 = 601;
pub const MAX_THRESHOLD: u16 = 0x3FFF;
pub const MAX_SMOOTHING: u8 = 4;

const READ_SETTING: u8 = 0x22;
const WRITE_SETTING: u8 = 0x21;
const READ_PARAMS: u8 = 0x31;
const WRITE_PARAMS: u8 = 0x30;

const SETTING_EASY_CONNECT: u8 = 0x01;
const SETTING_MIDI_CHANNEL: u8 = 0x03;
const SETTING_USER_MODE: u8 = 0x05;

const PARAMS_CHART: u8 = 0x00;
const PARAMS_CONTROLLERS: u8 = 0x01;
const PARAMS_SENSITIVITY: u8 = 0x07;
const PARAMS_SMOOTHING: u8 = 0x08;

const BATTERY: u8 = 0x3A;
const FACTORY_RESET: u8 = 0x10;
const RESTORE_DEFAULTS: u8 = 0x2F;

/// Controller write payload before the mappings are filled in
const CONTROLLER_TEMPLATE: [u8; 27] = [
    0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x7F, 0x01, 0x00, 0x7F, 0x00, 0x7F, 0x02, 0x00, 0x7F,
    0x00, 0x7F, 0x03, 0x00, 0x7F, 0x00, 0x7F, 0x04, 0x00, 0x7F, 0x00, 0x7F,
];
const AFTERTOUCH_SLOT: usize = 5;
/// Controller read reply, up to and including the AccZ curve
const CONTROLLER_REPLY_LEN: usize = 25;

/// One request: opcode bytes plus payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// Bytes the device echoes back in its reply
    pub opcode: Vec<u8>,
    pub data: Vec<u8>,
}

impl Command {
    fn new(opcode: &[u8], data: &[u8]) -> Self {
        Self {
            opcode: opcode.to_vec(),
            data: data.to_vec(),
        }
    }
}

// ============================================================================
// Named codes
// ============================================================================

fn name_of(table: &CodeTable, code: u8) -> &'static str {
    table.name(code).unwrap_or("?")
}

/// User mode, stored as its device code
///
/// Only codes present in the user mode table can be constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserMode(u8);

impl UserMode {
    pub const BREATH: UserMode = UserMode(1);
    pub const LIP: UserMode = UserMode(2);
    pub const KEYBOARD: UserMode = UserMode(3);

    pub fn from_code(code: u8) -> Option<Self> {
        USER_MODES.name(code).map(|_| Self(code))
    }

    pub fn from_name(name: &str) -> std::result::Result<Self, ValidationError> {
        USER_MODES.require_code(name).map(Self)
    }

    pub fn code(&self) -> u8 {
        self.0
    }

    pub fn name(&self) -> &'static str {
        name_of(&USER_MODES, self.0)
    }
}

impl fmt::Display for UserMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl TryFrom<String> for UserMode {
    type Error = ValidationError;

    fn try_from(name: String) -> std::result::Result<Self, Self::Error> {
        Self::from_name(&name)
    }
}

impl From<UserMode> for String {
    fn from(mode: UserMode) -> Self {
        mode.name().to_string()
    }
}

/// Response curve, stored as its device code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Curve(u8);

impl Curve {
    pub const NONE: Curve = Curve(0);
    pub const LINEAR: Curve = Curve(1);

    pub fn from_code(code: u8) -> Option<Self> {
        CURVES.name(code).map(|_| Self(code))
    }

    pub fn from_name(name: &str) -> std::result::Result<Self, ValidationError> {
        CURVES.require_code(name).map(Self)
    }

    pub fn code(&self) -> u8 {
        self.0
    }

    pub fn name(&self) -> &'static str {
        name_of(&CURVES, self.0)
    }
}

impl fmt::Display for Curve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl TryFrom<String> for Curve {
    type Error = ValidationError;

    fn try_from(name: String) -> std::result::Result<Self, Self::Error> {
        Self::from_name(&name)
    }
}

impl From<Curve> for String {
    fn from(curve: Curve) -> Self {
        curve.name().to_string()
    }
}

// ============================================================================
// Configuration types
// ============================================================================

/// CC number and response curve for one sensor axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerMapping {
    pub ctrl: u8,
    pub curve: Curve,
}

/// Mappings for all four sensor axes plus the aftertouch curve
///
/// Field order matches sorted JSON keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerSettings {
    #[serde(rename = "AccX")]
    pub acc_x: ControllerMapping,
    #[serde(rename = "AccY")]
    pub acc_y: ControllerMapping,
    #[serde(rename = "AccZ")]
    pub acc_z: ControllerMapping,
    #[serde(rename = "Pressure")]
    pub pressure: ControllerMapping,
    pub aftertouch: Curve,
}

impl ControllerSettings {
    /// Mappings in device order (Pressure, AccX, AccY, AccZ)
    fn mappings(&self) -> [&ControllerMapping; 4] {
        [&self.pressure, &self.acc_x, &self.acc_y, &self.acc_z]
    }
}

/// Every configurable field of the device
///
/// Field order matches sorted JSON keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigurationSnapshot {
    pub controllers: ControllerSettings,
    pub easy_connect: bool,
    pub maintain_note: bool,
    pub midi_channel: u8,
    pub smooth_acc: u8,
    pub threshold: u16,
    pub user_mode: UserMode,
    pub velocity: u8,
}

/// Per-axis controller overrides; absent axes keep their current mapping
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerOverride {
    #[serde(rename = "AccX", skip_serializing_if = "Option::is_none")]
    pub acc_x: Option<ControllerMapping>,
    #[serde(rename = "AccY", skip_serializing_if = "Option::is_none")]
    pub acc_y: Option<ControllerMapping>,
    #[serde(rename = "AccZ", skip_serializing_if = "Option::is_none")]
    pub acc_z: Option<ControllerMapping>,
    #[serde(rename = "Pressure", skip_serializing_if = "Option::is_none")]
    pub pressure: Option<ControllerMapping>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aftertouch: Option<Curve>,
}

impl ControllerOverride {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Combine two overrides; `other` wins per axis
    pub fn merge(self, other: ControllerOverride) -> Self {
        Self {
            acc_x: other.acc_x.or(self.acc_x),
            acc_y: other.acc_y.or(self.acc_y),
            acc_z: other.acc_z.or(self.acc_z),
            pressure: other.pressure.or(self.pressure),
            aftertouch: other.aftertouch.or(self.aftertouch),
        }
    }

    pub fn apply(&self, base: ControllerSettings) -> ControllerSettings {
        ControllerSettings {
            acc_x: self.acc_x.unwrap_or(base.acc_x),
            acc_y: self.acc_y.unwrap_or(base.acc_y),
            acc_z: self.acc_z.unwrap_or(base.acc_z),
            pressure: self.pressure.unwrap_or(base.pressure),
            aftertouch: self.aftertouch.unwrap_or(base.aftertouch),
        }
    }
}

/// Partial configuration, as loaded from a settings file or the command line
///
/// Only fields that are present get written to the device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsOverride {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub controllers: Option<ControllerOverride>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub easy_connect: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maintain_note: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub midi_channel: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub smooth_acc: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_mode: Option<UserMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub velocity: Option<u8>,
}

impl SettingsOverride {
    /// Combine two overrides; fields present in `other` win, controller
    /// overrides are combined per axis
    pub fn merge(self, other: SettingsOverride) -> Self {
        let controllers = match (self.controllers, other.controllers) {
            (Some(a), Some(b)) => Some(a.merge(b)),
            (a, b) => b.or(a),
        };
        Self {
            controllers,
            easy_connect: other.easy_connect.or(self.easy_connect),
            maintain_note: other.maintain_note.or(self.maintain_note),
            midi_channel: other.midi_channel.or(self.midi_channel),
            smooth_acc: other.smooth_acc.or(self.smooth_acc),
            threshold: other.threshold.or(self.threshold),
            user_mode: other.user_mode.or(self.user_mode),
            velocity: other.velocity.or(self.velocity),
        }
    }

    /// Overlay the present fields onto a snapshot
    pub fn apply(&self, base: &ConfigurationSnapshot) -> ConfigurationSnapshot {
        ConfigurationSnapshot {
            controllers: self
                .controllers
                .map(|c| c.apply(base.controllers))
                .unwrap_or(base.controllers),
            easy_connect: self.easy_connect.unwrap_or(base.easy_connect),
            maintain_note: self.maintain_note.unwrap_or(base.maintain_note),
            midi_channel: self.midi_channel.unwrap_or(base.midi_channel),
            smooth_acc: self.smooth_acc.unwrap_or(base.smooth_acc),
            threshold: self.threshold.unwrap_or(base.threshold),
            user_mode: self.user_mode.unwrap_or(base.user_mode),
            velocity: self.velocity.unwrap_or(base.velocity),
        }
    }

    pub fn writes_sensitivity(&self) -> bool {
        self.threshold.is_some() || self.velocity.is_some()
    }

    pub fn writes_smoothing(&self) -> bool {
        self.maintain_note.is_some() || self.smooth_acc.is_some()
    }

    pub fn writes_controllers(&self) -> bool {
        self.controllers.is_some()
    }

    /// Check every present value on its own
    ///
    /// None of these checks needs the device's current configuration.
    pub fn validate(&self) -> std::result::Result<(), ValidationError> {
        if let Some(channel) = self.midi_channel {
            validate_midi_channel(channel)?;
        }
        if let Some(threshold) = self.threshold {
            validate_threshold(threshold)?;
        }
        if let Some(velocity) = self.velocity {
            validate_velocity(velocity)?;
        }
        if let Some(smooth) = self.smooth_acc {
            validate_smoothing(smooth)?;
        }
        if let Some(ctrls) = &self.controllers {
            for mapping in [ctrls.pressure, ctrls.acc_x, ctrls.acc_y, ctrls.acc_z]
                .iter()
                .flatten()
            {
                validate_controller_number(mapping.ctrl)?;
            }
        }
        Ok(())
    }
}

// ============================================================================
// Validation
// ============================================================================

pub fn validate_midi_channel(channel: u8) -> std::result::Result<(), ValidationError> {
    if !(1..=16).contains(&channel) {
        return Err(ValidationError::MidiChannel(channel));
    }
    Ok(())
}

pub fn validate_threshold(threshold: u16) -> std::result::Result<(), ValidationError> {
    if !(MIN_THRESHOLD..=MAX_THRESHOLD).contains(&threshold) {
        return Err(ValidationError::Threshold(threshold));
    }
    Ok(())
}

pub fn validate_velocity(velocity: u8) -> std::result::Result<(), ValidationError> {
    if velocity > 0x7F {
        return Err(ValidationError::Velocity(velocity));
    }
    Ok(())
}

pub fn validate_sensitivity(threshold: u16, velocity: u8) -> std::result::Result<(), ValidationError> {
    validate_threshold(threshold)?;
    validate_velocity(velocity)
}

pub fn validate_smoothing(smooth: u8) -> std::result::Result<(), ValidationError> {
    if smooth > MAX_SMOOTHING {
        return Err(ValidationError::Smoothing(smooth));
    }
    Ok(())
}

pub fn validate_controllers(ctrls: &ControllerSettings) -> std::result::Result<(), ValidationError> {
    for mapping in ctrls.mappings() {
        validate_controller_number(mapping.ctrl)?;
    }
    Ok(())
}

pub fn validate_controller_number(ctrl: u8) -> std::result::Result<(), ValidationError> {
    if ctrl > 0x7F {
        return Err(ValidationError::ControllerNumber(ctrl));
    }
    Ok(())
}

// ============================================================================
// Reads
// ============================================================================

pub fn read_user_mode() -> Command {
    Command::new(&[READ_SETTING, SETTING_USER_MODE], &[])
}

pub fn read_midi_channel() -> Command {
    Command::new(&[READ_SETTING, SETTING_MIDI_CHANNEL], &[])
}

pub fn read_easy_connect() -> Command {
    Command::new(&[READ_SETTING, SETTING_EASY_CONNECT], &[])
}

pub fn read_smoothing() -> Command {
    Command::new(&[READ_PARAMS, PARAMS_SMOOTHING], &[0x01])
}

pub fn read_sensitivity() -> Command {
    Command::new(&[READ_PARAMS, PARAMS_SENSITIVITY], &[0x01])
}

pub fn read_controllers() -> Command {
    Command::new(&[READ_PARAMS, PARAMS_CONTROLLERS], &[0x01])
}

pub fn read_fingering_chart() -> Command {
    Command::new(&[READ_PARAMS, PARAMS_CHART], &[0x00])
}

pub fn read_battery_level() -> Command {
    Command::new(&[BATTERY], &[0x02])
}

pub fn factory_reset() -> Command {
    Command::new(&[FACTORY_RESET], &[])
}

pub fn restore_defaults() -> Command {
    Command::new(&[RESTORE_DEFAULTS], &[])
}

// ============================================================================
// Writes
// ============================================================================

pub fn write_user_mode(mode: UserMode) -> Command {
    Command::new(&[WRITE_SETTING], &[SETTING_USER_MODE, mode.code()])
}

pub fn write_midi_channel(channel: u8) -> std::result::Result<Command, ValidationError> {
    validate_midi_channel(channel)?;
    Ok(Command::new(&[WRITE_SETTING], &[SETTING_MIDI_CHANNEL, channel]))
}

pub fn write_easy_connect(on: bool) -> Command {
    Command::new(&[WRITE_SETTING], &[SETTING_EASY_CONNECT, if on { 0 } else { 1 }])
}

pub fn write_smoothing(maintain_note: bool, smooth: u8) -> std::result::Result<Command, ValidationError> {
    validate_smoothing(smooth)?;
    Ok(Command::new(
        &[WRITE_PARAMS],
        &[PARAMS_SMOOTHING, 0x02, 0x03, maintain_note as u8, 0x04, smooth],
    ))
}

pub fn write_sensitivity(threshold: u16, velocity: u8) -> std::result::Result<Command, ValidationError> {
    validate_sensitivity(threshold, velocity)?;
    Ok(Command::new(
        &[WRITE_PARAMS],
        &[
            PARAMS_SENSITIVITY,
            0x02,
            0x00,
            (threshold >> 7) as u8,
            (threshold & 0x7F) as u8,
            0x01,
            velocity,
        ],
    ))
}

/// Fill the controller template
///
/// Controller i (1-based) has its CC at `5i+3` and curve at `5i+5`. A
/// non-None aftertouch curve goes into its own slot and zeroes the pressure
/// curve, which aftertouch replaces.
pub fn write_controllers(ctrls: &ControllerSettings) -> std::result::Result<Command, ValidationError> {
    validate_controllers(ctrls)?;
    let mut data = CONTROLLER_TEMPLATE;
    for (i, mapping) in (1..).zip(ctrls.mappings()) {
        data[5 * i + 3] = mapping.ctrl;
        data[5 * i + 5] = mapping.curve.code();
    }
    if ctrls.aftertouch != Curve::NONE {
        data[AFTERTOUCH_SLOT] = ctrls.aftertouch.code();
        data[10] = 0;
    }
    Ok(Command::new(&[WRITE_PARAMS], &data))
}

/// Records are written as given; callers sort them
pub fn write_fingering_chart(records: &[FingeringRecord]) -> Command {
    let mut data = vec![PARAMS_CHART, 0x00];
    for record in records {
        data.extend_from_slice(&record.to_bytes());
    }
    Command::new(&[WRITE_PARAMS], &data)
}

// ============================================================================
// Reply decoders (input is the data after the echoed opcode)
// ============================================================================

fn field<'a>(data: &'a [u8], len: usize, what: &str) -> Result<&'a [u8]> {
    if data.len() < len {
        return Err(RecorderError::failed(
            format!("Short {} reply: {}", what, hex(data)),
            data,
        ));
    }
    Ok(&data[..len])
}

fn unknown_code(what: &str, code: u8, data: &[u8]) -> RecorderError {
    RecorderError::failed(format!("Unknown {} code {} in reply", what, code), data)
}

pub fn decode_user_mode(data: &[u8]) -> Result<UserMode> {
    let code = field(data, 1, "user mode")?[0];
    UserMode::from_code(code).ok_or_else(|| unknown_code("user mode", code, data))
}

pub fn decode_midi_channel(data: &[u8]) -> Result<u8> {
    Ok(field(data, 1, "MIDI channel")?[0])
}

/// The device reports 0 for on
pub fn decode_easy_connect(data: &[u8]) -> Result<bool> {
    Ok(field(data, 1, "easy-connect")?[0] == 0)
}

/// Returns `(maintain_note, smooth_acc)`
pub fn decode_smoothing(data: &[u8]) -> Result<(bool, u8)> {
    let f = field(data, 5, "smoothing")?;
    Ok((f[2] != 0, f[4]))
}

/// Returns `(threshold, velocity)`
pub fn decode_sensitivity(data: &[u8]) -> Result<(u16, u8)> {
    let f = field(data, 6, "sensitivity")?;
    Ok(((f[2] as u16) << 7 | f[3] as u16, f[5]))
}

pub fn decode_controllers(data: &[u8]) -> Result<ControllerSettings> {
    let f = field(data, CONTROLLER_REPLY_LEN, "controller")?;
    let curve = |code: u8| Curve::from_code(code).ok_or_else(|| unknown_code("curve", code, data));
    let mapping = |i: usize| -> Result<ControllerMapping> {
        Ok(ControllerMapping {
            ctrl: f[5 * i + 2],
            curve: curve(f[5 * i + 4])?,
        })
    };
    Ok(ControllerSettings {
        pressure: mapping(1)?,
        acc_x: mapping(2)?,
        acc_y: mapping(3)?,
        acc_z: mapping(4)?,
        aftertouch: curve(f[AFTERTOUCH_SLOT - 1])?,
    })
}

/// Returns the mode byte and the records
pub fn decode_fingering_chart(data: &[u8]) -> Result<(UserMode, Vec<FingeringRecord>)> {
    let code = field(data, 1, "fingering chart")?[0];
    let mode = UserMode::from_code(code).ok_or_else(|| unknown_code("user mode", code, data))?;
    let records = crate::fingering::parse_records(&data[1..])?;
    Ok((mode, records))
}

pub fn decode_battery_level(data: &[u8]) -> Result<u16> {
    let f = field(data, 4, "battery")?;
    Ok((f[2] as u16) << 7 | f[3] as u16)
}
