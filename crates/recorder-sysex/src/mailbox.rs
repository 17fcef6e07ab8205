//! Pending-reply mailbox between the MIDI callback and the request engine
//!
//! ```text
//! midir callback → EventRouter → ReplySender ──flume──→ ReplyMailbox → RequestEngine
//! ```
//!
//! The sending half lives on the MIDI driver thread and must never block, so
//! delivery is `try_send` into a small bounded channel. Replies queue in arrival
//! order. Anything still queued when a new exchange starts is stale and gets
//! drained by the engine before the command is sent.

use crate::framing::hex;
use flume::{Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

/// Replies that may queue up before the router starts dropping them
///
/// Only one exchange is in flight at a time, so anything beyond the first
/// entry is leftover from timed-out exchanges.
const MAILBOX_DEPTH: usize = 4;

/// Create a connected sender/mailbox pair
pub fn reply_channel() -> (ReplySender, ReplyMailbox) {
    let (tx, rx) = flume::bounded(MAILBOX_DEPTH);
    (ReplySender { tx }, ReplyMailbox { rx })
}

/// Producer half, owned by the event router
#[derive(Clone)]
pub struct ReplySender {
    tx: Sender<Vec<u8>>,
}

impl ReplySender {
    /// Hand a reply payload to the waiting exchange (non-blocking)
    ///
    /// Returns false if the reply was dropped because the mailbox is full or
    /// the engine is gone.
    pub fn deliver(&self, payload: Vec<u8>) -> bool {
        match self.tx.try_send(payload) {
            Ok(()) => true,
            Err(flume::TrySendError::Full(payload)) => {
                log::warn!("MIDI: Reply mailbox full, dropping reply {}", hex(&payload));
                false
            }
            Err(flume::TrySendError::Disconnected(payload)) => {
                log::debug!("MIDI: No engine listening, dropping reply {}", hex(&payload));
                false
            }
        }
    }
}

/// Consumer half, owned by the request engine
pub struct ReplyMailbox {
    rx: Receiver<Vec<u8>>,
}

impl ReplyMailbox {
    /// Remove every queued reply, returning them in arrival order
    pub fn drain_stale(&self) -> Vec<Vec<u8>> {
        let stale: Vec<Vec<u8>> = self.rx.try_iter().collect();
        for payload in &stale {
            log::warn!("MIDI: Dangling reply in mailbox: {}", hex(payload));
        }
        stale
    }

    /// Block until a reply arrives or the timeout expires
    pub fn wait(&self, timeout: Duration) -> Option<Vec<u8>> {
        match self.rx.recv_timeout(timeout) {
            Ok(payload) => Some(payload),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => {
                log::debug!("MIDI: Reply sender disconnected");
                None
            }
        }
    }

    /// Number of replies currently queued
    pub fn pending(&self) -> usize {
        self.rx.len()
    }
}
