//! Fingering chart codec
//!
//! The device stores its fingering table as packed 3-byte records
//! `note, pattern >> 8, pattern & 0x7F`, where `pattern` is an 11-bit hole
//! state. Humans write fingerings left thumb → right pinkie as a string:
//!
//! | Symbol | Meaning |
//! |--------|---------|
//! | `*`    | closed hole |
//! | `@`    | partially closed hole |
//! | `e`    | partially closed the opposite way (left-handed fingerings) |
//! | `o`    | open hole |
//! | `.`    | separator, ignored |
//!
//! e.g. `["D#5", "*.***.**@o"]` packs to `3f017f`.
//!
//! In keyboard mode the same record layout maps nine single-bit positions to notes.

use crate::error::{RecorderError, Result, ValidationError};
use crate::framing::hex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Valid bits of a packed record
const RECORD_MASK: u32 = 0x7F0F7F;

/// Maximum number of records in a fingering chart
pub const MAX_CHART_LEN: usize = 62;

/// Pitch class names; each pitch class appears twice so the index halves to it
const NOTE_NAMES: [&str; 24] = [
    "C", "C", "C#", "Db", "D", "D", "D#", "Eb", "E", "E", "F", "F", "F#", "Gb", "G", "G", "G#",
    "Ab", "A", "A", "A#", "Bb", "B", "B",
];

/// Bits of one finger position
#[derive(Debug, Clone, Copy)]
struct Hole {
    /// All bits set when the hole is fully closed
    full: u16,
    /// Bits set when the hole is partially closed
    partial: u16,
}

impl Hole {
    const fn new(full: u16, partial: u16) -> Self {
        Self { full, partial }
    }

    fn has_partial(&self) -> bool {
        self.full != self.partial
    }
}

/// Finger positions, left thumb to right pinkie
const RECORDER_HOLES: [Hole; 8] = [
    Hole::new(0x0003, 0x0002), // Left thumb
    Hole::new(0x0004, 0x0004), // Left index finger
    Hole::new(0x0008, 0x0008), // Left middle finger
    Hole::new(0x0010, 0x0010), // Left ring finger
    Hole::new(0x0020, 0x0020), // Right index finger
    Hole::new(0x0040, 0x0040), // Right middle finger
    Hole::new(0x0300, 0x0100), // Right ring finger
    Hole::new(0x0C00, 0x0400), // Right pinkie
];

/// Keyboard mode positions, leftmost hole (not the thumb) first
pub const KEYBOARD_POSITIONS: [u16; 9] = [
    0x0002, 0x0004, 0x0008, 0x0010, 0x0020, 0x0040, 0x0100, 0x0200, 0x0400,
];

/// Parse a note name such as `C5`, `D#5` or `Bb4` into a MIDI note number
pub fn parse_note(note: &str) -> std::result::Result<u8, ValidationError> {
    let bad = || ValidationError::Note(note.to_string());
    let mut chars = note.chars();
    let octave = chars.next_back().and_then(|c| c.to_digit(10)).ok_or_else(bad)?;
    let pitch = chars.as_str();
    let index = NOTE_NAMES
        .iter()
        .position(|name| *name == pitch)
        .ok_or_else(bad)?;
    let midi = octave * 12 + (index / 2) as u32;
    u8::try_from(midi).ok().filter(|n| *n <= 0x7F).ok_or_else(bad)
}

/// Name a MIDI note number, using sharps
pub fn note_name(note: u8) -> String {
    format!("{}{}", NOTE_NAMES[(note % 12) as usize * 2], note / 12)
}

/// One packed 3-byte fingering record
///
/// Always satisfies `record & 0x7F0F7F == record`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FingeringRecord(u32);

impl FingeringRecord {
    /// Pack a note and an 11-bit hole pattern
    pub fn new(note: u8, pattern: u16) -> std::result::Result<Self, ValidationError> {
        Self::from_value((note as u32) << 16 | pattern as u32)
    }

    /// Validate a raw 24-bit value
    pub fn from_value(value: u32) -> std::result::Result<Self, ValidationError> {
        if value & RECORD_MASK != value {
            return Err(ValidationError::Record(format!("{:06x}", value)));
        }
        Ok(Self(value))
    }

    pub fn from_bytes(bytes: [u8; 3]) -> std::result::Result<Self, ValidationError> {
        Self::from_value(u32::from_be_bytes([0, bytes[0], bytes[1], bytes[2]]))
    }

    /// Parse six hex digits, e.g. `3f017f`
    pub fn from_hex(s: &str) -> std::result::Result<Self, ValidationError> {
        if s.len() != 6 || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(ValidationError::Record(s.to_string()));
        }
        let value =
            u32::from_str_radix(s, 16).map_err(|_| ValidationError::Record(s.to_string()))?;
        Self::from_value(value)
    }

    pub fn value(&self) -> u32 {
        self.0
    }

    pub fn to_bytes(&self) -> [u8; 3] {
        let [_, a, b, c] = self.0.to_be_bytes();
        [a, b, c]
    }

    /// MIDI note number
    pub fn note(&self) -> u8 {
        (self.0 >> 16) as u8
    }

    /// 11-bit hole state
    pub fn pattern(&self) -> u16 {
        (self.0 & 0xFFFF) as u16
    }
}

impl fmt::Display for FingeringRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:06x}", self.0)
    }
}

impl TryFrom<String> for FingeringRecord {
    type Error = ValidationError;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        Self::from_hex(&s)
    }
}

impl From<FingeringRecord> for String {
    fn from(record: FingeringRecord) -> Self {
        record.to_string()
    }
}

/// A note and its human-readable fingering
///
/// Serialized as a two-element array: `["G5", "*.***.oooo"]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(String, String)", into = "(String, String)")]
pub struct Fingering {
    pub note: String,
    pub holes: String,
}

impl Fingering {
    pub fn new(note: impl Into<String>, holes: impl Into<String>) -> Self {
        Self {
            note: note.into(),
            holes: holes.into(),
        }
    }
}

impl From<(String, String)> for Fingering {
    fn from((note, holes): (String, String)) -> Self {
        Self { note, holes }
    }
}

impl From<Fingering> for (String, String) {
    fn from(f: Fingering) -> Self {
        (f.note, f.holes)
    }
}

/// Encode one fingering into a packed record
pub fn encode_fingering(note: &str, holes: &str) -> std::result::Result<FingeringRecord, ValidationError> {
    let bad = || ValidationError::Fingering(holes.to_string());
    let symbols: Vec<char> = holes.chars().filter(|c| *c != '.').collect();
    if symbols.len() > RECORDER_HOLES.len() {
        return Err(bad());
    }

    let mut pattern = 0u16;
    for (symbol, hole) in symbols.iter().zip(RECORDER_HOLES.iter()) {
        match symbol {
            '*' => pattern |= hole.full,
            '@' if hole.has_partial() => pattern |= hole.partial,
            'e' if hole.has_partial() => pattern |= hole.full ^ hole.partial,
            'o' => {}
            _ => return Err(bad()),
        }
    }

    FingeringRecord::new(parse_note(note)?, pattern)
}

/// Decode a packed record into its note name and canonical fingering
pub fn decode_fingering(record: FingeringRecord) -> Fingering {
    let pattern = record.pattern();
    let mut holes = String::with_capacity(RECORDER_HOLES.len() + 2);
    for (i, hole) in RECORDER_HOLES.iter().enumerate() {
        // Separators before the left index and right index fingers
        if i == 1 || i == 4 {
            holes.push('.');
        }
        let symbol = if pattern & hole.full == hole.full {
            '*'
        } else if pattern & hole.partial != 0 {
            '@'
        } else if pattern & hole.full != 0 {
            'e'
        } else {
            'o'
        };
        holes.push(symbol);
    }
    Fingering {
        note: note_name(record.note()),
        holes,
    }
}

fn check_chart_len(len: usize) -> std::result::Result<(), ValidationError> {
    if len == 0 || len > MAX_CHART_LEN {
        return Err(ValidationError::ChartLength(len));
    }
    Ok(())
}

/// Encode a fingering chart, sorted by packed value
pub fn encode_chart(chart: &[Fingering]) -> std::result::Result<Vec<FingeringRecord>, ValidationError> {
    check_chart_len(chart.len())?;
    let mut records = chart
        .iter()
        .map(|f| encode_fingering(&f.note, &f.holes))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    records.sort();
    Ok(records)
}

/// Decode a fingering chart in packed-value order
pub fn decode_chart(records: &[FingeringRecord]) -> Vec<Fingering> {
    let mut sorted = records.to_vec();
    sorted.sort();
    sorted.into_iter().map(decode_fingering).collect()
}

/// Encode nine notes, one per keyboard position, in position order
pub fn encode_keyboard_chart<S: AsRef<str>>(
    notes: &[S],
) -> std::result::Result<Vec<FingeringRecord>, ValidationError> {
    if notes.len() != KEYBOARD_POSITIONS.len() {
        return Err(ValidationError::KeyboardChart(format!(
            "expected {} notes, got {}",
            KEYBOARD_POSITIONS.len(),
            notes.len()
        )));
    }
    notes
        .iter()
        .zip(KEYBOARD_POSITIONS.iter())
        .map(|(note, &bit)| FingeringRecord::new(parse_note(note.as_ref())?, bit))
        .collect()
}

/// Decode a keyboard chart into nine note names in position order
///
/// Every record must name exactly one known position, and every position
/// must appear exactly once.
pub fn decode_keyboard_chart(
    records: &[FingeringRecord],
) -> std::result::Result<Vec<String>, ValidationError> {
    let mut by_position = BTreeMap::new();
    for record in records {
        let position = record.pattern();
        if !KEYBOARD_POSITIONS.contains(&position) {
            return Err(ValidationError::KeyboardChart(format!(
                "{} is not a keyboard position",
                record
            )));
        }
        if by_position.insert(position, record.note()).is_some() {
            return Err(ValidationError::KeyboardChart(format!(
                "position {:#05x} assigned twice",
                position
            )));
        }
    }
    KEYBOARD_POSITIONS
        .iter()
        .map(|position| {
            by_position
                .get(position)
                .map(|&note| note_name(note))
                .ok_or_else(|| {
                    ValidationError::KeyboardChart(format!("position {:#05x} missing", position))
                })
        })
        .collect()
}

/// Split a raw chart reply into packed records
pub fn parse_records(data: &[u8]) -> Result<Vec<FingeringRecord>> {
    if data.len() % 3 != 0 {
        return Err(RecorderError::failed(
            format!("Fingering chart length is not a multiple of 3: {}", hex(data)),
            data,
        ));
    }
    data.chunks_exact(3)
        .map(|chunk| {
            FingeringRecord::from_bytes([chunk[0], chunk[1], chunk[2]])
                .map_err(|e| RecorderError::failed(e.to_string(), data))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(s: &str) -> FingeringRecord {
        FingeringRecord::from_hex(s).unwrap()
    }

    #[test]
    fn test_parse_note() {
        assert_eq!(parse_note("C0"), Ok(0));
        assert_eq!(parse_note("C5"), Ok(60));
        assert_eq!(parse_note("D#5"), Ok(63));
        assert_eq!(parse_note("Eb5"), Ok(63));
        assert_eq!(parse_note("B9"), Ok(119));
        assert!(parse_note("H5").is_err());
        assert!(parse_note("C").is_err());
        assert!(parse_note("").is_err());
        assert!(parse_note("c5").is_err());
        assert!(parse_note("C#").is_err());
    }

    #[test]
    fn test_note_name_uses_sharps() {
        assert_eq!(note_name(60), "C5");
        assert_eq!(note_name(63), "D#5");
        assert_eq!(note_name(70), "A#5");
        assert_eq!(note_name(127), "G10");
    }

    #[test]
    fn test_documented_d_sharp_5() {
        let packed = encode_fingering("D#5", "*.***.**@o").unwrap();
        assert_eq!(packed.to_string(), "3f017f");
        assert_eq!(
            decode_chart(&[record("3f017f")]),
            vec![Fingering::new("D#5", "*.***.**@o")]
        );
    }

    #[test]
    fn test_encode_fingering_examples() {
        // All closed
        assert_eq!(encode_fingering("C5", "*.***.****").unwrap().to_string(), "3c0f7f");
        // Thumb + left hand only
        assert_eq!(encode_fingering("G5", "*.***.oooo").unwrap().to_string(), "43001f");
        // Half-holed thumb
        assert_eq!(encode_fingering("E6", "@.***.oooo").unwrap().to_string(), "4c001e");
        // Opposite partial on the thumb and pinkie
        assert_eq!(encode_fingering("C5", "e.ooo.oooe").unwrap().to_string(), "3c0801");
    }

    #[test]
    fn test_separators_are_cosmetic() {
        let a = encode_fingering("A5", "*.**o.oooo").unwrap();
        let b = encode_fingering("A5", "***ooooo").unwrap();
        let c = encode_fingering("A5", "*..**o.oo.oo").unwrap();
        assert_eq!(a, b);
        assert_eq!(a, c);
    }

    #[test]
    fn test_short_fingering_leaves_rest_open() {
        assert_eq!(
            encode_fingering("A5", "***").unwrap(),
            encode_fingering("A5", "*.**o.oooo").unwrap()
        );
    }

    #[test]
    fn test_bad_fingerings() {
        // Too many positions
        assert!(matches!(
            encode_fingering("C5", "*.***.*****"),
            Err(ValidationError::Fingering(_))
        ));
        // Unknown symbol
        assert!(encode_fingering("C5", "*.*x*.****").is_err());
        // Partial on a hole without one
        assert!(encode_fingering("C5", "*.@**.****").is_err());
        assert!(encode_fingering("C5", "*.*e*.****").is_err());
        // Bad note
        assert!(matches!(
            encode_fingering("X5", "*.***.****"),
            Err(ValidationError::Note(_))
        ));
    }

    #[test]
    fn test_decode_encode_round_trip() {
        let symbols = ['*', '@', 'e', 'o'];
        let holes_with_partial = [0usize, 6, 7];
        for &thumb in &symbols {
            for &ring in &symbols {
                for &pinkie in &symbols {
                    let mut positions = vec!['*', 'o', '*', 'o', '*', 'o', 'o', 'o'];
                    positions[holes_with_partial[0]] = thumb;
                    positions[holes_with_partial[1]] = ring;
                    positions[holes_with_partial[2]] = pinkie;
                    let raw: String = positions.iter().collect();
                    let canonical = format!("{}.{}.{}", &raw[0..1], &raw[1..4], &raw[4..8]);

                    let packed = encode_fingering("F#6", &raw).unwrap();
                    assert_eq!(decode_fingering(packed), Fingering::new("F#6", canonical));
                }
            }
        }
    }

    #[test]
    fn test_record_mask() {
        assert!(FingeringRecord::from_value(0x7F0F7F).is_ok());
        assert!(FingeringRecord::from_value(0x800000).is_err());
        assert!(FingeringRecord::from_value(0x001000).is_err());
        assert!(FingeringRecord::from_value(0x000080).is_err());
        assert!(FingeringRecord::from_hex("3f017").is_err());
        assert!(FingeringRecord::from_hex("zz017f").is_err());
        assert!(FingeringRecord::from_bytes([0x3F, 0x10, 0x00]).is_err());
    }

    #[test]
    fn test_new_rejects_pattern_outside_mask() {
        assert!(matches!(
            FingeringRecord::new(60, 0x0080),
            Err(ValidationError::Record(_))
        ));
        assert!(matches!(
            FingeringRecord::new(60, 0x00FF),
            Err(ValidationError::Record(_))
        ));
        assert!(FingeringRecord::new(60, 0x1000).is_err());
        assert!(FingeringRecord::new(128, 0x0000).is_err());
        assert_eq!(FingeringRecord::new(63, 0x017F).unwrap().value(), 0x3F017F);
    }

    #[test]
    fn test_hex_digits_only() {
        assert!(FingeringRecord::from_hex("+00001").is_err());
        assert!(FingeringRecord::from_hex("-00001").is_err());
        assert!(FingeringRecord::from_hex(" 3f017").is_err());
        assert_eq!(FingeringRecord::from_hex("3F017F").unwrap().value(), 0x3F017F);
    }

    #[test]
    fn test_encoder_output_is_masked() {
        let packed = encode_fingering("G9", "e.***.**ee").unwrap();
        assert_eq!(packed.value() & RECORD_MASK, packed.value());
    }

    #[test]
    fn test_chart_length_bounds() {
        let entry = Fingering::new("C5", "*.***.****");
        assert_eq!(encode_chart(&[]), Err(ValidationError::ChartLength(0)));
        assert_eq!(encode_chart(&[entry.clone()]).unwrap().len(), 1);
        assert_eq!(encode_chart(&vec![entry.clone(); 62]).unwrap().len(), 62);
        assert_eq!(
            encode_chart(&vec![entry; 63]),
            Err(ValidationError::ChartLength(63))
        );
    }

    #[test]
    fn test_encode_chart_sorted_and_idempotent() {
        let chart = vec![
            Fingering::new("A5", "*.**o.oooo"),
            Fingering::new("C5", "*.***.****"),
            Fingering::new("G#5", "*.**o.**@o"),
            Fingering::new("G5", "*.***.oooo"),
        ];
        let encoded = encode_chart(&chart).unwrap();
        let mut sorted = encoded.clone();
        sorted.sort();
        assert_eq!(encoded, sorted);

        let mut reversed = chart.clone();
        reversed.reverse();
        assert_eq!(encode_chart(&reversed).unwrap(), encoded);

        let decoded = decode_chart(&encoded);
        assert_eq!(decoded[0], Fingering::new("C5", "*.***.****"));
        assert_eq!(encode_chart(&decoded).unwrap(), encoded);
    }

    #[test]
    fn test_keyboard_round_trip() {
        let notes = ["C5", "D5", "E5", "F5", "G5", "A5", "B5", "C6", "D6"];
        let records = encode_keyboard_chart(&notes).unwrap();
        assert_eq!(records[0].to_string(), "3c0002");
        assert_eq!(records[6].to_string(), "470100");
        assert_eq!(records[8].to_string(), "4a0400");

        let mut shuffled = records.clone();
        shuffled.reverse();
        assert_eq!(decode_keyboard_chart(&shuffled).unwrap(), notes.to_vec());
    }

    #[test]
    fn test_keyboard_chart_wrong_length() {
        let eight = ["C5", "D5", "E5", "F5", "G5", "A5", "B5", "C6"];
        assert!(matches!(
            encode_keyboard_chart(&eight),
            Err(ValidationError::KeyboardChart(_))
        ));
        let ten = ["C5", "D5", "E5", "F5", "G5", "A5", "B5", "C6", "D6", "E6"];
        assert!(encode_keyboard_chart(&ten).is_err());
    }

    #[test]
    fn test_keyboard_chart_duplicate_or_missing_position() {
        let notes = ["C5", "D5", "E5", "F5", "G5", "A5", "B5", "C6", "D6"];
        let mut records = encode_keyboard_chart(&notes).unwrap();

        let mut missing = records.clone();
        missing.pop();
        assert!(decode_keyboard_chart(&missing).is_err());

        records[8] = FingeringRecord::new(74, 0x0002).unwrap();
        assert!(decode_keyboard_chart(&records).is_err());

        let combined = vec![FingeringRecord::new(60, 0x0006).unwrap()];
        assert!(decode_keyboard_chart(&combined).is_err());
    }

    #[test]
    fn test_parse_records() {
        let records = parse_records(&[0x3F, 0x01, 0x7F, 0x3C, 0x0F, 0x7F]).unwrap();
        assert_eq!(records, vec![record("3f017f"), record("3c0f7f")]);
        assert!(matches!(
            parse_records(&[0x3F, 0x01]),
            Err(RecorderError::FailedRequest { .. })
        ));
        assert!(parse_records(&[0x3F, 0x81, 0x7F]).is_err());
        assert!(parse_records(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_serde_formats() {
        let fingering: Fingering = serde_json::from_str(r#"["G5", "*.***.oooo"]"#).unwrap();
        assert_eq!(fingering, Fingering::new("G5", "*.***.oooo"));
        assert_eq!(
            serde_json::to_string(&fingering).unwrap(),
            r#"["G5","*.***.oooo"]"#
        );

        let packed: FingeringRecord = serde_json::from_str(r#""3f017f""#).unwrap();
        assert_eq!(packed, record("3f017f"));
        assert!(serde_json::from_str::<FingeringRecord>(r#""ff017f""#).is_err());
    }
}
