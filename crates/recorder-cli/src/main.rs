//! re.corder configuration tool
//!
//! Applies settings from the command line and an optional settings file,
//! optionally loads a fingering chart, then prints the resulting
//! configuration as JSON along with the battery level.
//!
//! ```text
//! re-configure -u Breath -m 5 -t 2000 -v 0 -s all_sensors_off.json -c tin_whistle_d.json
//! ```
//!
//! Set RUST_LOG=debug to see SysEx traffic.

mod cli;
mod receiver;

use anyhow::{bail, Context, Result};
use clap::Parser;
use recorder_sysex::{
    list_input_ports, load_json, save_json, ChartFile, FactoryResetOutcome, Recorder,
    SettingsOverride,
};
use std::time::Duration;

use cli::Cli;
use receiver::ConsoleReceiver;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logger - set RUST_LOG=debug for verbose output
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    if cli.list {
        for port in list_input_ports()? {
            println!("{}", port);
        }
        return Ok(());
    }

    // Files are read before connecting; a bad file must not leave a half-applied configuration
    let file_settings: SettingsOverride = match &cli.settings {
        Some(path) => load_json(path)?,
        None => SettingsOverride::default(),
    };
    let changes = file_settings.merge(cli.overrides());
    let chart: Option<ChartFile> = cli.chart.as_deref().map(load_json).transpose()?;

    let recorder = Recorder::connect(&cli.port, Box::new(ConsoleReceiver))
        .with_context(|| format!("Failed to connect to a MIDI port matching '{}'", cli.port))?;

    if cli.factory_reset {
        println!("Performing factory reset.");
        match recorder.factory_reset()? {
            FactoryResetOutcome::Disconnected => return Ok(()),
            FactoryResetOutcome::StillConnected => bail!("Still connected after factory reset."),
        }
    }

    if cli.restore {
        println!("Restoring default settings.");
        recorder.restore_default_settings()?;
    }

    let conf = recorder.update_settings(&changes, chart.as_ref())?;

    if let Some(path) = &cli.export {
        save_json(&conf, path)?;
    }
    if let Some(path) = &cli.dump {
        save_json(&recorder.read_chart_file()?, path)?;
    }

    println!("{}", serde_json::to_string_pretty(&conf)?);
    println!("Battery state: {}", recorder.get_battery_level()?);

    if cli.wait {
        log::info!("Waiting for MIDI messages (Ctrl-C to quit)");
        loop {
            std::thread::sleep(Duration::from_secs(10));
        }
    }

    Ok(())
}
