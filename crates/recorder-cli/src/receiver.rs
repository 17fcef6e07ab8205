//! Prints device events to stdout while `--wait` keeps the tool running

use midly::live::LiveEvent;
use midly::MidiMessage;
use recorder_sysex::{hex, note_name, EventReceiver, BUTTONS};

pub struct ConsoleReceiver;

impl EventReceiver for ConsoleReceiver {
    fn handle_button(&mut self, button: u8, value: u8) {
        let name = BUTTONS.name(button).unwrap_or("Unknown button");
        println!("Button: {} {}", name, value);
    }

    fn unhandled(&mut self, payload: &[u8]) {
        println!("Unhandled SysEx: {}", hex(payload));
    }

    fn handle_midi(&mut self, message: &[u8]) {
        match describe_midi(message) {
            Some(text) => println!("{}", text),
            None => println!("MIDI: {}", hex(message)),
        }
    }
}

/// Human-readable note on/off, or None for anything else
fn describe_midi(message: &[u8]) -> Option<String> {
    let (channel, message) = match LiveEvent::parse(message).ok()? {
        LiveEvent::Midi { channel, message } => (channel.as_int() + 1, message),
        _ => return None,
    };
    match message {
        MidiMessage::NoteOn { key, vel } if vel.as_int() > 0 => Some(format!(
            "Note on:  {:<4} velocity {:>3} (channel {})",
            note_name(key.as_int()),
            vel.as_int(),
            channel
        )),
        MidiMessage::NoteOn { key, .. } | MidiMessage::NoteOff { key, .. } => Some(format!(
            "Note off: {:<4} (channel {})",
            note_name(key.as_int()),
            channel
        )),
        _ => None,
    }
}
