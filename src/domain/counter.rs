//! Counter state and sequence formatting.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default zero-padding width for formatted IDs.
pub const DEFAULT_SEQUENCE_LENGTH: usize = 4;

/// Widest padding accepted; `u64::MAX` has 20 digits.
pub const MAX_SEQUENCE_LENGTH: usize = 20;

/// Longest accepted counter name.
pub const MAX_COUNTER_NAME_LENGTH: usize = 64;

/// Check a counter name: 1 to 64 characters of `[A-Za-z0-9_-]`.
///
/// # Errors
///
/// Returns a description of the first problem found.
pub fn validate_counter_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("sequence name is required".to_string());
    }
    if name.len() > MAX_COUNTER_NAME_LENGTH {
        return Err(format!(
            "sequence name cannot exceed {MAX_COUNTER_NAME_LENGTH} characters"
        ));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(format!(
            "sequence name '{name}' may only contain letters, digits, '_' and '-'"
        ));
    }
    Ok(())
}

/// Persistent state of a named counter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Counter {
    /// Counter name, e.g. `Scope`.
    pub name: String,

    /// Last committed value. Starts at zero.
    pub sequence_value: u64,

    /// Last update time.
    pub updated_at: DateTime<Utc>,
}

impl Counter {
    /// Create a zero-valued counter.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sequence_value: 0,
            updated_at: Utc::now(),
        }
    }
}

/// Caller-supplied formatting options, as received over the API.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceOptions {
    /// Prefix placed before the padded digits, separated by `-`.
    #[serde(default)]
    pub prefix: Option<String>,

    /// Zero-padding width.
    #[serde(default)]
    pub length: Option<i64>,
}

impl SequenceOptions {
    /// Options with a prefix and explicit width.
    #[must_use]
    pub fn new(prefix: impl Into<String>, length: i64) -> Self {
        Self {
            prefix: Some(prefix.into()),
            length: Some(length),
        }
    }

    /// Validate the options and resolve defaults.
    ///
    /// # Errors
    ///
    /// Returns a message when the width is out of range or the prefix contains
    /// whitespace or control characters.
    pub fn resolve(&self, default_length: usize) -> Result<SequenceFormat, String> {
        let length = match self.length {
            None => default_length,
            Some(raw) => usize::try_from(raw)
                .ok()
                .filter(|len| (1..=MAX_SEQUENCE_LENGTH).contains(len))
                .ok_or_else(|| {
                    format!("length must be between 1 and {MAX_SEQUENCE_LENGTH}, got {raw}")
                })?,
        };

        let prefix = match self.prefix.as_deref() {
            None | Some("") => None,
            Some(prefix) => {
                if prefix
                    .chars()
                    .any(|c| c.is_whitespace() || c.is_control())
                {
                    return Err(format!(
                        "prefix '{}' must not contain whitespace",
                        prefix.escape_debug()
                    ));
                }
                Some(prefix.to_string())
            }
        };

        Ok(SequenceFormat { prefix, length })
    }
}

/// Validated formatting rule for a sequence value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceFormat {
    prefix: Option<String>,
    length: usize,
}

impl SequenceFormat {
    /// Render a value, e.g. `SCP-0007`. Values wider than the padding keep all digits.
    #[must_use]
    pub fn render(&self, value: u64) -> String {
        let width = self.length;
        match &self.prefix {
            Some(prefix) => format!("{prefix}-{value:0>width$}"),
            None => format!("{value:0>width$}"),
        }
    }
}
