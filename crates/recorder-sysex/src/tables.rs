//! Bidirectional name ↔ code tables
//!
//! The device speaks in small integer codes; settings files and the command line
//! use names. Each table is validated once on first access: a duplicate code or
//! name is a programming error and is reported at construction, never as a
//! lookup miss later on.

use crate::error::ValidationError;
use std::collections::{BTreeMap, HashMap};
use std::sync::LazyLock;

/// Error raised when a table definition is not a bijection
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TableError {
    #[error("Duplicate code {code} in {kind} table")]
    DuplicateCode { kind: &'static str, code: u8 },

    #[error("Duplicate name '{name}' in {kind} table")]
    DuplicateName { kind: &'static str, name: &'static str },
}

/// Validated bijective mapping between device codes and names
#[derive(Debug, Clone)]
pub struct CodeTable {
    /// What the table names (used in error messages)
    kind: &'static str,
    by_code: BTreeMap<u8, &'static str>,
    by_name: HashMap<&'static str, u8>,
}

impl CodeTable {
    /// Build a table, rejecting duplicate codes and names
    pub fn new(kind: &'static str, entries: &[(u8, &'static str)]) -> Result<Self, TableError> {
        let mut by_code = BTreeMap::new();
        let mut by_name = HashMap::new();
        for &(code, name) in entries {
            if by_code.insert(code, name).is_some() {
                return Err(TableError::DuplicateCode { kind, code });
            }
            if by_name.insert(name, code).is_some() {
                return Err(TableError::DuplicateName { kind, name });
            }
        }
        Ok(Self {
            kind,
            by_code,
            by_name,
        })
    }

    /// What the table names ("curve", "user mode", ...)
    pub fn kind(&self) -> &'static str {
        self.kind
    }

    /// Look up the name for a device code
    pub fn name(&self, code: u8) -> Option<&'static str> {
        self.by_code.get(&code).copied()
    }

    /// Look up the device code for a name
    pub fn code(&self, name: &str) -> Option<u8> {
        self.by_name.get(name).copied()
    }

    /// Look up the device code for a name, as a validation failure if unknown
    pub fn require_code(&self, name: &str) -> Result<u8, ValidationError> {
        self.code(name).ok_or_else(|| ValidationError::UnknownName {
            kind: self.kind,
            name: name.to_string(),
        })
    }

    /// All names in code order
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.by_code.values().copied()
    }

    pub fn len(&self) -> usize {
        self.by_code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_code.is_empty()
    }
}

fn build(kind: &'static str, entries: &[(u8, &'static str)]) -> CodeTable {
    CodeTable::new(kind, entries).unwrap_or_else(|e| panic!("Invalid built-in table: {}", e))
}

/// User modes
pub static USER_MODES: LazyLock<CodeTable> =
    LazyLock::new(|| build("user mode", &[(1, "Breath"), (2, "Lip"), (3, "Keyboard")]));

/// Sensor axes that can be mapped to a CC
pub static CONTROLLERS: LazyLock<CodeTable> = LazyLock::new(|| {
    build(
        "controller",
        &[(1, "Pressure"), (2, "AccX"), (3, "AccY"), (4, "AccZ")],
    )
});

/// Response curves ("None", "Linear", "Emb1".."Emb20")
pub static CURVES: LazyLock<CodeTable> = LazyLock::new(|| {
    build(
        "curve",
        &[
            (0, "None"),
            (1, "Linear"),
            (2, "Emb1"),
            (3, "Emb2"),
            (4, "Emb3"),
            (5, "Emb4"),
            (6, "Emb5"),
            (7, "Emb6"),
            (8, "Emb7"),
            (9, "Emb8"),
            (10, "Emb9"),
            (11, "Emb10"),
            (12, "Emb11"),
            (13, "Emb12"),
            (14, "Emb13"),
            (15, "Emb14"),
            (16, "Emb15"),
            (17, "Emb16"),
            (18, "Emb17"),
            (19, "Emb18"),
            (20, "Emb19"),
            (21, "Emb20"),
        ],
    )
});

/// Hardware buttons reported through button events
pub static BUTTONS: LazyLock<CodeTable> = LazyLock::new(|| {
    build(
        "button",
        &[
            (1, "Octave up/down"),
            (2, "Record"),
            (3, "Stop"),
            (4, "Play"),
            (5, "Disconnect"),
        ],
    )
});
