//! SysEx configuration for the re.corder breath controller
//!
//! This crate provides:
//! - MIDI port discovery and connection via midir
//! - SysEx framing and inbound event classification
//! - Synchronous request/response over the asynchronous MIDI input
//! - Codecs for every configuration field, fingering charts and keyboard charts
//! - JSON settings and chart files
//!
//! # Architecture
//!
//! ```text
//! caller → Recorder → RequestEngine → midir output ──────→ device
//!                          ↑                                 │
//!                     ReplyMailbox ←flume← EventRouter ← midir callback
//!                                              │
//!                                              └→ EventReceiver (buttons, notes)
//! ```
//!
//! The midir callback never blocks; the engine waits on the mailbox with a
//! timeout and only ever has one exchange in flight.

mod device;
mod engine;
mod error;
mod files;
mod fingering;
mod framing;
mod mailbox;
mod router;
mod settings;
mod tables;
mod transport;

pub use device::{DeviceChart, FactoryResetOutcome, Recorder};
pub use engine::{RequestEngine, SysexSink, DEFAULT_REPLY_TIMEOUT};
pub use error::{RecorderError, Result, ValidationError};
pub use files::{load_json, save_json, ChartFile};
pub use fingering::{
    decode_chart, decode_fingering, decode_keyboard_chart, encode_chart, encode_fingering,
    encode_keyboard_chart, note_name, parse_note, Fingering, FingeringRecord, KEYBOARD_POSITIONS,
    MAX_CHART_LEN,
};
pub use framing::{hex, unwrap as unwrap_sysex, wrap as wrap_sysex};
pub use mailbox::{reply_channel, ReplyMailbox, ReplySender};
pub use router::{EventReceiver, EventRouter, LoggingReceiver, RoutedEvent};
pub use settings::{
    ConfigurationSnapshot, ControllerMapping, ControllerOverride, ControllerSettings, Curve,
    SettingsOverride, UserMode,
};
pub use tables::{CodeTable, TableError, BUTTONS, CONTROLLERS, CURVES, USER_MODES};
pub use transport::{list_input_ports, MidiTransport, DEFAULT_PORT_MATCH};
