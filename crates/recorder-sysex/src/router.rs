//! Inbound event classification
//!
//! Every message delivered by the MIDI input callback passes through
//! `EventRouter::route`. Command replies go to the engine's mailbox; button
//! events, unexpected SysEx and note messages go to an `EventReceiver`.
//!
//! Runs on the MIDI driver thread. Must be fast and non-blocking.

use crate::framing::{self, hex};
use crate::mailbox::ReplySender;
use crate::tables::BUTTONS;

/// Reply status: request succeeded
pub const REPLY_OK: u8 = 0x01;
/// Reply status: request failed
pub const REPLY_FAILED: u8 = 0x02;
/// Unsolicited button event
pub const BUTTON_EVENT: u8 = 0x34;

/// Receiver for events that are not command replies
///
/// All methods have logging defaults; implement only what you care about.
pub trait EventReceiver: Send {
    /// A hardware button changed state
    fn handle_button(&mut self, button: u8, value: u8) {
        log::info!(
            "Button: {} {}",
            BUTTONS.name(button).unwrap_or("unknown"),
            value
        );
    }

    /// A framed SysEx message that is neither a reply nor a button event
    fn unhandled(&mut self, payload: &[u8]) {
        log::warn!("Unhandled SysEx payload: {}", hex(payload));
    }

    /// A note on/off message
    fn handle_midi(&mut self, message: &[u8]) {
        log::debug!("MIDI: {}", hex(message));
    }
}

/// Receiver that only logs
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingReceiver;

impl EventReceiver for LoggingReceiver {}

/// How an inbound message was dispatched
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoutedEvent {
    /// Command reply forwarded to the mailbox (`delivered` is false if dropped)
    Reply { delivered: bool },
    /// Button event passed to the receiver
    Button { button: u8, value: u8 },
    /// Framed SysEx passed to `EventReceiver::unhandled`
    Unhandled,
    /// Note message passed to `EventReceiver::handle_midi`
    Midi,
    /// Anything else
    Ignored,
}

/// Callback state handed to midir
pub struct EventRouter {
    replies: ReplySender,
    receiver: Box<dyn EventReceiver>,
}

impl EventRouter {
    pub fn new(replies: ReplySender, receiver: Box<dyn EventReceiver>) -> Self {
        Self { replies, receiver }
    }

    /// Classify and dispatch one inbound message
    pub fn route(&mut self, message: &[u8]) -> RoutedEvent {
        match framing::unwrap(message) {
            Some(payload) => self.route_sysex(payload),
            None => self.route_midi(message),
        }
    }

    fn route_sysex(&mut self, payload: &[u8]) -> RoutedEvent {
        match payload.first() {
            Some(&REPLY_OK) | Some(&REPLY_FAILED) => {
                log::debug!("[SYSEX IN] reply {}", hex(payload));
                let delivered = self.replies.deliver(payload.to_vec());
                RoutedEvent::Reply { delivered }
            }
            Some(&BUTTON_EVENT) if payload.len() >= 3 => {
                let (button, value) = (payload[1], payload[2]);
                log::debug!("[SYSEX IN] button {} value {}", button, value);
                self.receiver.handle_button(button, value);
                RoutedEvent::Button { button, value }
            }
            _ => {
                self.receiver.unhandled(payload);
                RoutedEvent::Unhandled
            }
        }
    }

    fn route_midi(&mut self, message: &[u8]) -> RoutedEvent {
        match message.first() {
            // Note Off (0x8n) and Note On (0x9n)
            Some(status) if status & 0xE0 == 0x80 => {
                self.receiver.handle_midi(message);
                RoutedEvent::Midi
            }
            _ => {
                log::trace!("[MIDI IN] ignored {}", hex(message));
                RoutedEvent::Ignored
            }
        }
    }

    /// The midir callback function
    pub fn midi_callback(_timestamp: u64, message: &[u8], router: &mut EventRouter) {
        router.route(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framing::wrap;
    use crate::mailbox::reply_channel;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    #[derive(Debug, Clone, PartialEq)]
    enum Seen {
        Button(u8, u8),
        Unhandled(Vec<u8>),
        Midi(Vec<u8>),
    }

    struct RecordingReceiver(Arc<Mutex<Vec<Seen>>>);

    impl EventReceiver for RecordingReceiver {
        fn handle_button(&mut self, button: u8, value: u8) {
            self.0.lock().unwrap().push(Seen::Button(button, value));
        }

        fn unhandled(&mut self, payload: &[u8]) {
            self.0.lock().unwrap().push(Seen::Unhandled(payload.to_vec()));
        }

        fn handle_midi(&mut self, message: &[u8]) {
            self.0.lock().unwrap().push(Seen::Midi(message.to_vec()));
        }
    }

    fn router() -> (EventRouter, crate::mailbox::ReplyMailbox, Arc<Mutex<Vec<Seen>>>) {
        let (tx, mailbox) = reply_channel();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let router = EventRouter::new(tx, Box::new(RecordingReceiver(seen.clone())));
        (router, mailbox, seen)
    }

    #[test]
    fn test_replies_go_to_mailbox() {
        let (mut router, mailbox, seen) = router();
        assert_eq!(
            router.route(&wrap(&[0x01, 0x22, 0x05, 0x01])),
            RoutedEvent::Reply { delivered: true }
        );
        assert_eq!(
            router.route(&wrap(&[0x02, 0x30])),
            RoutedEvent::Reply { delivered: true }
        );
        assert_eq!(
            mailbox.wait(Duration::from_millis(10)),
            Some(vec![0x01, 0x22, 0x05, 0x01])
        );
        assert_eq!(mailbox.wait(Duration::from_millis(10)), Some(vec![0x02, 0x30]));
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_button_event() {
        let (mut router, mailbox, seen) = router();
        assert_eq!(
            router.route(&wrap(&[0x34, 0x02, 0x01])),
            RoutedEvent::Button { button: 2, value: 1 }
        );
        assert_eq!(*seen.lock().unwrap(), vec![Seen::Button(2, 1)]);
        assert_eq!(mailbox.pending(), 0);
    }

    #[test]
    fn test_truncated_button_event_is_unhandled() {
        let (mut router, _mailbox, seen) = router();
        assert_eq!(router.route(&wrap(&[0x34, 0x02])), RoutedEvent::Unhandled);
        assert_eq!(*seen.lock().unwrap(), vec![Seen::Unhandled(vec![0x34, 0x02])]);
    }

    #[test]
    fn test_unclassified_sysex() {
        let (mut router, mailbox, seen) = router();
        assert_eq!(router.route(&wrap(&[0x55, 0x01])), RoutedEvent::Unhandled);
        assert_eq!(router.route(&wrap(&[])), RoutedEvent::Unhandled);
        assert_eq!(
            *seen.lock().unwrap(),
            vec![Seen::Unhandled(vec![0x55, 0x01]), Seen::Unhandled(vec![])]
        );
        assert_eq!(mailbox.pending(), 0);
    }

    #[test]
    fn test_note_messages_are_raw_midi() {
        let (mut router, _mailbox, seen) = router();
        assert_eq!(router.route(&[0x90, 0x3C, 0x7F]), RoutedEvent::Midi);
        assert_eq!(router.route(&[0x81, 0x3C, 0x00]), RoutedEvent::Midi);
        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                Seen::Midi(vec![0x90, 0x3C, 0x7F]),
                Seen::Midi(vec![0x81, 0x3C, 0x00])
            ]
        );
    }

    #[test]
    fn test_other_messages_ignored() {
        let (mut router, _mailbox, seen) = router();
        // Control Change, clock, foreign SysEx, empty
        assert_eq!(router.route(&[0xB0, 0x07, 0x64]), RoutedEvent::Ignored);
        assert_eq!(router.route(&[0xF8]), RoutedEvent::Ignored);
        assert_eq!(router.route(&[0xF0, 0x42, 0x30, 0xF7]), RoutedEvent::Ignored);
        assert_eq!(router.route(&[]), RoutedEvent::Ignored);
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_default_receiver_methods() {
        let (tx, _mailbox) = reply_channel();
        let mut router = EventRouter::new(tx, Box::new(LoggingReceiver));
        assert_eq!(
            router.route(&wrap(&[0x34, 0x09, 0x00])),
            RoutedEvent::Button { button: 9, value: 0 }
        );
        assert_eq!(router.route(&[0x90, 0x40, 0x40]), RoutedEvent::Midi);
    }
}
