//! SysEx envelope handling
//!
//! Every message to and from the re.corder is wrapped as
//! `F0 00 2F 7F 00 01 <payload> F7`.

/// Start-of-SysEx, manufacturer ID and device address
pub const PREFIX: [u8; 6] = [0xF0, 0x00, 0x2F, 0x7F, 0x00, 0x01];

/// End-of-SysEx
pub const SUFFIX: [u8; 1] = [0xF7];

/// Wrap a payload in the device envelope
pub fn wrap(payload: &[u8]) -> Vec<u8> {
    let mut message = Vec::with_capacity(PREFIX.len() + payload.len() + SUFFIX.len());
    message.extend_from_slice(&PREFIX);
    message.extend_from_slice(payload);
    message.extend_from_slice(&SUFFIX);
    message
}

/// Strip the device envelope
///
/// Returns `None` if the message is not a framed re.corder SysEx message.
pub fn unwrap(message: &[u8]) -> Option<&[u8]> {
    if message.len() < PREFIX.len() + SUFFIX.len() {
        return None;
    }
    if !message.starts_with(&PREFIX) || !message.ends_with(&SUFFIX) {
        return None;
    }
    Some(&message[PREFIX.len()..message.len() - SUFFIX.len()])
}

/// Lowercase hex dump, used in log lines and error messages
pub fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
