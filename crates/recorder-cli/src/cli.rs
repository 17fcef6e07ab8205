//! Command line arguments
//!
//! Short flags match the long-standing `re_configure` tool; long flags accept
//! both `--user-mode` and `--user_mode` spellings.

use clap::Parser;
use recorder_sysex::{SettingsOverride, UserMode, DEFAULT_PORT_MATCH};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "re-configure",
    version,
    about = "Unofficial configuration tool for the re.corder",
    long_about = "Unofficial configuration tool for the re.corder; use at your own risk.\n\n\
        Changes the configuration according to the given arguments, then prints the \
        resulting configuration as JSON. With no arguments, just prints the current \
        configuration. Command line values override the settings file."
)]
pub struct Cli {
    /// List available MIDI ports and exit
    #[arg(short = 'l', long)]
    pub list: bool,

    /// Identifying substring of the MIDI port name
    #[arg(short = 'p', long, default_value = DEFAULT_PORT_MATCH)]
    pub port: String,

    /// Factory reset; closes the Bluetooth connection
    #[arg(short = 'f', long, alias = "factory_reset")]
    pub factory_reset: bool,

    /// Restore default settings before applying changes
    #[arg(short = 'r', long)]
    pub restore: bool,

    /// User mode: Breath, Lip or Keyboard
    #[arg(short = 'u', long, alias = "user_mode", value_parser = parse_user_mode)]
    pub user_mode: Option<UserMode>,

    /// MIDI channel 1-16
    #[arg(short = 'm', long, alias = "midi_channel")]
    pub midi_channel: Option<u8>,

    /// Maintain note flag, 0 or 1
    #[arg(short = 'n', long, alias = "maintain_note", value_parser = parse_flag)]
    pub maintain_note: Option<bool>,

    /// Accelerometer smoothing, 0-4
    #[arg(short = 'a', long, alias = "smooth_acc")]
    pub smooth_acc: Option<u8>,

    /// Breath pressure threshold, 601-16383 (default 3000; the app's low
    /// setting is 6000 and its high setting 1000)
    #[arg(short = 't', long)]
    pub threshold: Option<u16>,

    /// Note on velocity 0-127; 0 means dynamic velocity
    #[arg(short = 'v', long)]
    pub velocity: Option<u8>,

    /// EasyConnect flag, 0 or 1
    #[arg(short = 'e', long, alias = "easy_connect", value_parser = parse_flag)]
    pub easy_connect: Option<bool>,

    /// Settings file (JSON)
    #[arg(short = 's', long)]
    pub settings: Option<PathBuf>,

    /// Fingering chart to load (JSON)
    #[arg(short = 'c', long)]
    pub chart: Option<PathBuf>,

    /// Dump the device's fingering chart to a JSON file
    #[arg(short = 'd', long)]
    pub dump: Option<PathBuf>,

    /// Export the resulting configuration to a JSON file
    #[arg(short = 'x', long)]
    pub export: Option<PathBuf>,

    /// Keep running and print button and MIDI events
    #[arg(short = 'w', long)]
    pub wait: bool,
}

impl Cli {
    /// Settings given directly on the command line
    pub fn overrides(&self) -> SettingsOverride {
        SettingsOverride {
            controllers: None,
            easy_connect: self.easy_connect,
            maintain_note: self.maintain_note,
            midi_channel: self.midi_channel,
            smooth_acc: self.smooth_acc,
            threshold: self.threshold,
            user_mode: self.user_mode,
            velocity: self.velocity,
        }
    }
}

fn parse_user_mode(s: &str) -> Result<UserMode, String> {
    UserMode::from_name(s).map_err(|e| e.to_string())
}

/// Integer flag; any nonzero value is true
fn parse_flag(s: &str) -> Result<bool, String> {
    s.parse::<i64>()
        .map(|n| n != 0)
        .map_err(|_| format!("expected 0 or 1, got '{}'", s))
}
