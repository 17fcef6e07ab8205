//! MIDI port discovery and connection
//!
//! Uses midir for cross-platform MIDI I/O (ALSA on Linux, CoreMIDI on macOS, WinMM on Windows).
//! The re.corder shows up as an input and an output port with the same name;
//! both are matched by a case-insensitive substring.

use crate::engine::SysexSink;
use crate::error::{RecorderError, Result};
use crate::router::EventRouter;
use midir::{Ignore, MidiInput, MidiInputConnection, MidiOutput, MidiOutputConnection};

/// Default port name substring
pub const DEFAULT_PORT_MATCH: &str = "re.corder";

const CLIENT_NAME: &str = "recorder-sysex";

impl SysexSink for MidiOutputConnection {
    fn send(&mut self, message: &[u8]) -> Result<()> {
        MidiOutputConnection::send(self, message)
            .map_err(|e| RecorderError::Transport(e.to_string()))
    }
}

/// Open input and output connections to a device
pub struct MidiTransport {
    /// Input connection (kept alive for the lifetime of the transport)
    pub input: MidiInputConnection<EventRouter>,
    /// Output connection
    pub output: MidiOutputConnection,
    /// Name of the matched port
    pub port_name: String,
}

impl MidiTransport {
    /// Find and connect to the first port pair whose name contains `port_match`
    ///
    /// SysEx reception is enabled on the input; every inbound message is
    /// handed to `router` on the MIDI driver thread.
    pub fn connect(port_match: &str, router: EventRouter) -> Result<Self> {
        let pattern = port_match.to_lowercase();

        let mut midi_in = MidiInput::new(&format!("{}-in", CLIENT_NAME))
            .map_err(|e| RecorderError::Connection(e.to_string()))?;
        midi_in.ignore(Ignore::None);

        let midi_out = MidiOutput::new(&format!("{}-out", CLIENT_NAME))
            .map_err(|e| RecorderError::Connection(e.to_string()))?;

        let input_port = midi_in
            .ports()
            .into_iter()
            .find(|port| {
                midi_in
                    .port_name(port)
                    .map(|name| name.to_lowercase().contains(&pattern))
                    .unwrap_or(false)
            })
            .ok_or_else(|| RecorderError::NoMatchingPort(port_match.to_string()))?;

        let port_name = midi_in
            .port_name(&input_port)
            .map_err(|e| RecorderError::Connection(e.to_string()))?;
        log::info!("MIDI: Found input port: {}", port_name);

        let output_port = midi_out
            .ports()
            .into_iter()
            .find(|port| {
                midi_out
                    .port_name(port)
                    .map(|name| name.to_lowercase().contains(&pattern))
                    .unwrap_or(false)
            })
            .ok_or_else(|| RecorderError::NoMatchingPort(port_match.to_string()))?;

        if let Ok(name) = midi_out.port_name(&output_port) {
            log::info!("MIDI: Found output port: {}", name);
        }

        // Open output first so a failure doesn't leave a dangling input callback
        let output = midi_out
            .connect(&output_port, &format!("{}-output", CLIENT_NAME))
            .map_err(|e| RecorderError::Connection(e.to_string()))?;

        let input = midi_in
            .connect(
                &input_port,
                &format!("{}-input", CLIENT_NAME),
                EventRouter::midi_callback,
                router,
            )
            .map_err(|e| RecorderError::Connection(e.to_string()))?;

        log::info!("MIDI: Connected to '{}'", port_name);

        Ok(Self {
            input,
            output,
            port_name,
        })
    }

    /// Split into the keep-alive input connection and the sink for the engine
    pub fn into_parts(self) -> (MidiInputConnection<EventRouter>, MidiOutputConnection) {
        (self.input, self.output)
    }
}

/// List all available MIDI input ports
pub fn list_input_ports() -> Result<Vec<String>> {
    let midi_in = MidiInput::new(&format!("{}-list", CLIENT_NAME))
        .map_err(|e| RecorderError::Connection(e.to_string()))?;

    let ports: Vec<String> = midi_in
        .ports()
        .iter()
        .filter_map(|port| midi_in.port_name(port).ok())
        .collect();

    Ok(ports)
}
