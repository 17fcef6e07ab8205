//! Synchronous request/response over an asynchronous MIDI stream
//!
//! `RequestEngine::execute` frames and sends one command, then blocks the
//! calling thread until the matching reply shows up in the mailbox or the
//! timeout expires. Only one exchange is in flight per engine: the sink and
//! the mailbox sit behind one mutex that is held for the whole exchange.

use crate::error::{RecorderError, Result};
use crate::framing::{self, hex};
use crate::mailbox::ReplyMailbox;
use crate::router::REPLY_OK;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// How long to wait for a reply before giving up
pub const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_millis(250);

/// Shown when the device refuses a request; it usually means the device
/// is not accepting configuration changes right now.
const FAILED_REQUEST_HINT: &str =
    "Request failed. Try holding Record (the circle button) on the re.corder, perhaps?";

/// Outbound half of the MIDI transport
pub trait SysexSink: Send {
    /// Send one complete MIDI message
    fn send(&mut self, message: &[u8]) -> Result<()>;
}

struct Exchange<S> {
    sink: S,
    mailbox: ReplyMailbox,
}

/// Request/response engine
pub struct RequestEngine<S: SysexSink> {
    exchange: Mutex<Exchange<S>>,
    timeout: Duration,
    /// Total stale replies drained before exchanges
    stale_drained: AtomicUsize,
}

impl<S: SysexSink> RequestEngine<S> {
    /// Create an engine with the default reply timeout
    pub fn new(sink: S, mailbox: ReplyMailbox) -> Self {
        Self::with_timeout(sink, mailbox, DEFAULT_REPLY_TIMEOUT)
    }

    pub fn with_timeout(sink: S, mailbox: ReplyMailbox, timeout: Duration) -> Self {
        Self {
            exchange: Mutex::new(Exchange { sink, mailbox }),
            timeout,
            stale_drained: AtomicUsize::new(0),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Number of late replies discarded so far
    pub fn stale_replies_drained(&self) -> usize {
        self.stale_drained.load(Ordering::Relaxed)
    }

    /// Send `command ++ data` and return the reply data after the echoed command
    ///
    /// # Errors
    /// - `NoSysexResponse` if nothing arrives within the timeout
    /// - `FailedRequest` if the device reports failure or echoes a different command
    pub fn execute(&self, command: &[u8], data: &[u8]) -> Result<Vec<u8>> {
        let mut exchange = self
            .exchange
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        // A reply that arrived after an earlier timeout must not be taken
        // for this exchange's reply.
        let stale = exchange.mailbox.drain_stale();
        if !stale.is_empty() {
            self.stale_drained.fetch_add(stale.len(), Ordering::Relaxed);
        }

        let mut payload = Vec::with_capacity(command.len() + data.len());
        payload.extend_from_slice(command);
        payload.extend_from_slice(data);
        log::debug!("[SYSEX OUT] {}", hex(&payload));
        exchange.sink.send(&framing::wrap(&payload))?;

        let reply = exchange
            .mailbox
            .wait(self.timeout)
            .ok_or(RecorderError::NoSysexResponse)?;
        drop(exchange);

        check_reply(command, &reply)
    }
}

/// Validate a reply against the command that was sent and strip the echo
fn check_reply(command: &[u8], reply: &[u8]) -> Result<Vec<u8>> {
    if reply.first() != Some(&REPLY_OK) {
        return Err(RecorderError::failed(FAILED_REQUEST_HINT, reply));
    }
    let body = &reply[1..];
    if !body.starts_with(command) {
        return Err(RecorderError::failed(
            format!("Unexpected response: {}", hex(reply)),
            reply,
        ));
    }
    Ok(body[command.len()..].to_vec())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::mailbox::{reply_channel, ReplySender};
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// Scripted device: answers each sent message with the next queued reply
    ///
    /// A queued `None` means "stay silent". Sent messages are recorded.
    pub(crate) struct ScriptedDevice {
        replies: ReplySender,
        script: Arc<Mutex<VecDeque<Option<Vec<u8>>>>>,
        pub(crate) sent: Arc<Mutex<Vec<Vec<u8>>>>,
    }

    impl SysexSink for ScriptedDevice {
        fn send(&mut self, message: &[u8]) -> Result<()> {
            self.sent.lock().unwrap().push(message.to_vec());
            if let Some(Some(reply)) = self.script.lock().unwrap().pop_front() {
                self.replies.deliver(reply);
            }
            Ok(())
        }
    }

    /// Handles for scripting and inspecting a `ScriptedDevice`
    pub(crate) struct Script {
        pub(crate) replies: ReplySender,
        pub(crate) queue: Arc<Mutex<VecDeque<Option<Vec<u8>>>>>,
        pub(crate) sent: Arc<Mutex<Vec<Vec<u8>>>>,
    }

    impl Script {
        pub(crate) fn reply(&self, payload: &[u8]) {
            self.queue.lock().unwrap().push_back(Some(payload.to_vec()));
        }

        pub(crate) fn silence(&self) {
            self.queue.lock().unwrap().push_back(None);
        }

        /// Payloads sent so far, envelope stripped
        pub(crate) fn sent_payloads(&self) -> Vec<Vec<u8>> {
            self.sent
                .lock()
                .unwrap()
                .iter()
                .map(|m| framing::unwrap(m).expect("framed message").to_vec())
                .collect()
        }
    }

    pub(crate) fn scripted_engine() -> (RequestEngine<ScriptedDevice>, Script) {
        let (tx, mailbox) = reply_channel();
        let queue = Arc::new(Mutex::new(VecDeque::new()));
        let sent = Arc::new(Mutex::new(Vec::new()));
        let device = ScriptedDevice {
            replies: tx.clone(),
            script: queue.clone(),
            sent: sent.clone(),
        };
        let engine = RequestEngine::with_timeout(device, mailbox, Duration::from_millis(20));
        (
            engine,
            Script {
                replies: tx,
                queue,
                sent,
            },
        )
    }

    #[test]
    fn test_execute_strips_echo() {
        let (engine, script) = scripted_engine();
        script.reply(&[0x01, 0x22, 0x05, 0x02]);
        assert_eq!(engine.execute(&[0x22, 0x05], &[]).unwrap(), vec![0x02]);
        assert_eq!(
            *script.sent.lock().unwrap(),
            vec![vec![0xF0, 0x00, 0x2F, 0x7F, 0x00, 0x01, 0x22, 0x05, 0xF7]]
        );
    }

    #[test]
    fn test_execute_sends_command_and_data() {
        let (engine, script) = scripted_engine();
        script.reply(&[0x01, 0x31, 0x07, 0x02, 0x00, 0x17, 0x38, 0x01, 0x00]);
        let data = engine.execute(&[0x31, 0x07], &[0x01]).unwrap();
        assert_eq!(data, vec![0x02, 0x00, 0x17, 0x38, 0x01, 0x00]);
        assert_eq!(script.sent_payloads(), vec![vec![0x31, 0x07, 0x01]]);
    }

    #[test]
    fn test_timeout() {
        let (engine, script) = scripted_engine();
        script.silence();
        let err = engine.execute(&[0x22, 0x05], &[]).unwrap_err();
        assert!(matches!(err, RecorderError::NoSysexResponse));
    }

    #[test]
    fn test_failure_status_keeps_payload() {
        let (engine, script) = scripted_engine();
        script.reply(&[0x02, 0x30, 0x07]);
        let err = engine.execute(&[0x30], &[0x07]).unwrap_err();
        match &err {
            RecorderError::FailedRequest { message, payload } => {
                assert!(message.contains("Record"));
                assert_eq!(payload, &vec![0x02, 0x30, 0x07]);
            }
            other => panic!("Expected FailedRequest, got {:?}", other),
        }
        assert_eq!(err.payload(), Some(&[0x02, 0x30, 0x07][..]));
    }

    #[test]
    fn test_mismatched_echo() {
        let (engine, script) = scripted_engine();
        script.reply(&[0x01, 0x22, 0x03, 0x05]);
        let err = engine.execute(&[0x22, 0x05], &[]).unwrap_err();
        match err {
            RecorderError::FailedRequest { message, payload } => {
                assert_eq!(message, "Unexpected response: 01220305");
                assert_eq!(payload, vec![0x01, 0x22, 0x03, 0x05]);
            }
            other => panic!("Expected FailedRequest, got {:?}", other),
        }
    }

    #[test]
    fn test_short_echo_is_mismatch() {
        let (engine, script) = scripted_engine();
        script.reply(&[0x01, 0x22]);
        assert!(matches!(
            engine.execute(&[0x22, 0x05], &[]),
            Err(RecorderError::FailedRequest { .. })
        ));
    }

    #[test]
    fn test_late_reply_is_drained_before_next_exchange() {
        let _ = env_logger::builder().is_test(true).try_init();
        let (engine, script) = scripted_engine();

        // First exchange times out
        script.silence();
        assert!(matches!(
            engine.execute(&[0x22, 0x05], &[]),
            Err(RecorderError::NoSysexResponse)
        ));

        // Its reply shows up late, between exchanges
        script.replies.deliver(vec![0x01, 0x22, 0x05, 0x01]);

        // Second exchange must see its own reply, not the late one
        script.reply(&[0x01, 0x22, 0x05, 0x03]);
        assert_eq!(engine.execute(&[0x22, 0x05], &[]).unwrap(), vec![0x03]);
        assert_eq!(engine.stale_replies_drained(), 1);
    }

    #[test]
    fn test_concurrent_callers_are_serialized() {
        let (engine, script) = scripted_engine();
        for i in 0..8u8 {
            script.reply(&[0x01, 0x22, 0x03, i]);
        }
        let engine = Arc::new(engine);
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let engine = engine.clone();
                std::thread::spawn(move || engine.execute(&[0x22, 0x03], &[]).unwrap())
            })
            .collect();
        let mut seen: Vec<u8> = handles
            .into_iter()
            .map(|h| h.join().unwrap()[0])
            .collect();
        seen.sort();
        assert_eq!(seen, (0..8).collect::<Vec<u8>>());
        assert_eq!(engine.stale_replies_drained(), 0);
    }
}
