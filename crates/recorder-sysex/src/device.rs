//! High-level device handle
//!
//! `Recorder` owns the MIDI connections and the request engine and exposes
//! one method per configuration operation. Every setter validates before
//! sending anything.

use crate::engine::{RequestEngine, SysexSink};
use crate::error::{RecorderError, Result, ValidationError};
use crate::files::ChartFile;
use crate::fingering::{
    decode_chart, decode_keyboard_chart, encode_chart, encode_keyboard_chart, FingeringRecord,
    MAX_CHART_LEN,
};
use crate::mailbox::reply_channel;
use crate::router::{EventReceiver, EventRouter};
use crate::settings::{
    self, Command, ConfigurationSnapshot, ControllerSettings, SettingsOverride, UserMode,
};
use crate::transport::MidiTransport;
use midir::{MidiInputConnection, MidiOutputConnection};

/// Result of a factory reset
///
/// A successful reset drops the Bluetooth connection, so silence is success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FactoryResetOutcome {
    /// The device went away as expected
    Disconnected,
    /// The device answered; the reset did not happen
    StillConnected,
}

/// Fingering chart as stored on the device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceChart {
    /// User mode the chart belongs to
    pub mode: UserMode,
    pub records: Vec<FingeringRecord>,
}

/// Connected re.corder
pub struct Recorder<S: SysexSink = MidiOutputConnection> {
    engine: RequestEngine<S>,
    /// Keeps the input callback alive
    _input: Option<MidiInputConnection<EventRouter>>,
    port_name: Option<String>,
}

impl Recorder<MidiOutputConnection> {
    /// Connect to the first MIDI port pair whose name contains `port_match`
    ///
    /// Button events, stray SysEx and note messages go to `receiver`.
    pub fn connect(port_match: &str, receiver: Box<dyn EventReceiver>) -> Result<Self> {
        let (replies, mailbox) = reply_channel();
        let router = EventRouter::new(replies, receiver);
        let transport = MidiTransport::connect(port_match, router)?;
        let port_name = transport.port_name.clone();
        let (input, output) = transport.into_parts();

        Ok(Self {
            engine: RequestEngine::new(output, mailbox),
            _input: Some(input),
            port_name: Some(port_name),
        })
    }
}

impl<S: SysexSink> Recorder<S> {
    /// Wrap an existing engine (no input connection is held)
    pub fn from_engine(engine: RequestEngine<S>) -> Self {
        Self {
            engine,
            _input: None,
            port_name: None,
        }
    }

    /// Name of the connected MIDI port
    pub fn port_name(&self) -> Option<&str> {
        self.port_name.as_deref()
    }

    pub fn engine(&self) -> &RequestEngine<S> {
        &self.engine
    }

    fn run(&self, command: Command) -> Result<Vec<u8>> {
        self.engine.execute(&command.opcode, &command.data)
    }

    // --- Reads ---

    pub fn get_user_mode(&self) -> Result<UserMode> {
        settings::decode_user_mode(&self.run(settings::read_user_mode())?)
    }

    pub fn get_midi_channel(&self) -> Result<u8> {
        settings::decode_midi_channel(&self.run(settings::read_midi_channel())?)
    }

    pub fn get_easy_connect(&self) -> Result<bool> {
        settings::decode_easy_connect(&self.run(settings::read_easy_connect())?)
    }

    /// Returns `(maintain_note, smooth_acc)`
    pub fn get_smoothing(&self) -> Result<(bool, u8)> {
        settings::decode_smoothing(&self.run(settings::read_smoothing())?)
    }

    /// Returns `(threshold, velocity)`
    pub fn get_sensitivity(&self) -> Result<(u16, u8)> {
        settings::decode_sensitivity(&self.run(settings::read_sensitivity())?)
    }

    pub fn get_controller_config(&self) -> Result<ControllerSettings> {
        settings::decode_controllers(&self.run(settings::read_controllers())?)
    }

    pub fn get_fingering_chart(&self) -> Result<DeviceChart> {
        let (mode, records) =
            settings::decode_fingering_chart(&self.run(settings::read_fingering_chart())?)?;
        Ok(DeviceChart { mode, records })
    }

    pub fn get_battery_level(&self) -> Result<u16> {
        settings::decode_battery_level(&self.run(settings::read_battery_level())?)
    }

    /// Read every configuration field
    pub fn read_configuration(&self) -> Result<ConfigurationSnapshot> {
        let user_mode = self.get_user_mode()?;
        let midi_channel = self.get_midi_channel()?;
        let (threshold, velocity) = self.get_sensitivity()?;
        let controllers = self.get_controller_config()?;
        let easy_connect = self.get_easy_connect()?;
        let (maintain_note, smooth_acc) = self.get_smoothing()?;
        Ok(ConfigurationSnapshot {
            controllers,
            easy_connect,
            maintain_note,
            midi_channel,
            smooth_acc,
            threshold,
            user_mode,
            velocity,
        })
    }

    /// Read the device chart and decode it for its mode
    pub fn read_chart_file(&self) -> Result<ChartFile> {
        let chart = self.get_fingering_chart()?;
        if chart.mode == UserMode::KEYBOARD {
            Ok(ChartFile::Keyboard(decode_keyboard_chart(&chart.records)?))
        } else {
            Ok(ChartFile::Fingering(decode_chart(&chart.records)))
        }
    }

    // --- Writes ---

    pub fn set_user_mode(&self, mode: UserMode) -> Result<()> {
        self.run(settings::write_user_mode(mode)).map(drop)
    }

    pub fn set_midi_channel(&self, channel: u8) -> Result<()> {
        self.run(settings::write_midi_channel(channel)?).map(drop)
    }

    pub fn set_easy_connect(&self, on: bool) -> Result<()> {
        self.run(settings::write_easy_connect(on)).map(drop)
    }

    pub fn set_smoothing(&self, maintain_note: bool, smooth_acc: u8) -> Result<()> {
        self.run(settings::write_smoothing(maintain_note, smooth_acc)?).map(drop)
    }

    pub fn set_sensitivity(&self, threshold: u16, velocity: u8) -> Result<()> {
        self.run(settings::write_sensitivity(threshold, velocity)?).map(drop)
    }

    pub fn set_controller_config(&self, ctrls: &ControllerSettings) -> Result<()> {
        self.run(settings::write_controllers(ctrls)?).map(drop)
    }

    /// Write packed records as given (1-62 of them)
    pub fn set_fingering_chart(&self, records: &[FingeringRecord]) -> Result<()> {
        if records.is_empty() || records.len() > MAX_CHART_LEN {
            return Err(ValidationError::ChartLength(records.len()).into());
        }
        self.run(settings::write_fingering_chart(records)).map(drop)
    }

    pub fn restore_default_settings(&self) -> Result<()> {
        self.run(settings::restore_defaults()).map(drop)
    }

    /// Reset the device to factory state; this closes the Bluetooth connection
    pub fn factory_reset(&self) -> Result<FactoryResetOutcome> {
        match self.run(settings::factory_reset()) {
            Err(RecorderError::NoSysexResponse) => Ok(FactoryResetOutcome::Disconnected),
            Ok(_) | Err(RecorderError::FailedRequest { .. }) => {
                log::warn!("Still connected after factory reset");
                Ok(FactoryResetOutcome::StillConnected)
            }
            Err(e) => Err(e),
        }
    }

    /// Apply a partial configuration and optionally a chart
    ///
    /// Reads the current configuration, overlays `changes`, and writes only the
    /// fields present in `changes`: mode, channel, sensitivity, controllers,
    /// easy-connect, smoothing, then the chart. Override values are validated
    /// and the chart encoded before anything is sent; the chart's mode is
    /// checked once the current mode is known. Returns the resulting
    /// configuration.
    pub fn update_settings(
        &self,
        changes: &SettingsOverride,
        chart: Option<&ChartFile>,
    ) -> Result<ConfigurationSnapshot> {
        changes.validate()?;
        let chart = chart.map(encode_chart_file).transpose()?;

        let current = self.read_configuration()?;
        let conf = changes.apply(&current);

        let mut writes: Vec<(&str, Command)> = Vec::new();
        if changes.user_mode.is_some() {
            writes.push(("user mode", settings::write_user_mode(conf.user_mode)));
        }
        if changes.midi_channel.is_some() {
            writes.push(("MIDI channel", settings::write_midi_channel(conf.midi_channel)?));
        }
        if changes.writes_sensitivity() {
            writes.push((
                "sensitivity",
                settings::write_sensitivity(conf.threshold, conf.velocity)?,
            ));
        }
        if changes.writes_controllers() {
            writes.push((
                "aftertouch and controllers",
                settings::write_controllers(&conf.controllers)?,
            ));
        }
        if changes.easy_connect.is_some() {
            writes.push(("EasyConnect status", settings::write_easy_connect(conf.easy_connect)));
        }
        if changes.writes_smoothing() {
            writes.push((
                "maintain note/smooth accelerometer status",
                settings::write_smoothing(conf.maintain_note, conf.smooth_acc)?,
            ));
        }
        if let Some((keyboard, records)) = chart {
            if keyboard != (conf.user_mode == UserMode::KEYBOARD) {
                return Err(ValidationError::ChartMode(conf.user_mode.name().to_string()).into());
            }
            writes.push(("fingering chart", settings::write_fingering_chart(&records)));
        }

        for (what, command) in writes {
            log::info!("Setting {}", what);
            self.run(command)?;
        }
        Ok(conf)
    }
}

/// Encode a chart file; returns whether it is a keyboard chart along with the records
fn encode_chart_file(
    chart: &ChartFile,
) -> std::result::Result<(bool, Vec<FingeringRecord>), ValidationError> {
    match chart {
        ChartFile::Keyboard(notes) => Ok((true, encode_keyboard_chart(notes.as_slice())?)),
        ChartFile::Fingering(fingerings) => Ok((false, encode_chart(fingerings)?)),
    }
}
