// File: src/memory/core/ids.rs

//! Identifier types for recall.
//!
//! Two identifiers cross every store boundary:
//! - [`RecordId`]: a UUID newtype naming one memory record.
//! - [`OwnerKey`]: the isolation partition (conversation + user + character).
//!   Every search and scan is scoped by it; a malformed key is a programmer
//!   error and fails fast with [`MemoryError::InvalidOwnerPartition`].
//!
//! ## Cargo features used by this module
//! - `uuid_v7`: enables `UUIDv7` generation via `uuid/v7`.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::memory::core::errors::{MemoryError, MemoryResult};

/// Generate an ID intended to have good DB insert locality.
///
/// With feature `uuid_v7` enabled, this uses `Uuid::now_v7()`.
/// Otherwise it falls back to `Uuid::new_v4()`.
#[inline]
#[must_use]
fn uuid_time_ordered() -> Uuid {
    #[cfg(feature = "uuid_v7")]
    {
        Uuid::now_v7()
    }
    #[cfg(not(feature = "uuid_v7"))]
    {
        Uuid::new_v4()
    }
}

/// Identifier for a stored memory record.
///
/// Ordering is the UUID byte order; fusion uses it as the final tie-break.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
#[serde(transparent)]
pub struct RecordId(pub Uuid);

impl Default for RecordId {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl RecordId {
    /// Create a new identifier.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(uuid_time_ordered())
    }

    /// Build a deterministic id from a small integer (fixtures, imports keyed by sequence).
    #[inline]
    #[must_use]
    pub const fn from_u128(value: u128) -> Self {
        Self(Uuid::from_u128(value))
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for RecordId {
    #[inline]
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl FromStr for RecordId {
    type Err = uuid::Error;

    #[inline]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Isolation partition for memory records.
///
/// Rendered as `conversation:user:character`. Components are trimmed, non-empty,
/// at most [`OwnerKey::MAX_COMPONENT_LEN`] bytes and drawn from a conservative
/// ASCII set, so the rendered key is unambiguous.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OwnerKey {
    conversation: String,
    user: String,
    character: String,
}

impl OwnerKey {
    /// Hard ceiling per component.
    pub const MAX_COMPONENT_LEN: usize = 128;

    /// Build a validated owner key.
    ///
    /// # Errors
    /// Returns [`MemoryError::InvalidOwnerPartition`] if any component is empty,
    /// too long, or contains a disallowed character.
    pub fn new(
        conversation: impl AsRef<str>,
        user: impl AsRef<str>,
        character: impl AsRef<str>,
    ) -> MemoryResult<Self> {
        Ok(Self {
            conversation: validate_component("conversation", conversation.as_ref())?,
            user: validate_component("user", user.as_ref())?,
            character: validate_component("character", character.as_ref())?,
        })
    }

    /// Stable partition string used as the store key.
    #[must_use]
    pub fn partition(&self) -> String {
        format!("{}:{}:{}", self.conversation, self.user, self.character)
    }

    /// Re-check the invariants (keys built through serde or `FromStr` already hold them).
    ///
    /// # Errors
    /// Returns [`MemoryError::InvalidOwnerPartition`] on a malformed key.
    pub fn validate(&self) -> MemoryResult<()> {
        validate_component("conversation", &self.conversation)?;
        validate_component("user", &self.user)?;
        validate_component("character", &self.character)?;
        Ok(())
    }
}

fn validate_component(field: &str, raw: &str) -> MemoryResult<String> {
    let s = raw.trim();
    if s.is_empty() {
        return Err(MemoryError::InvalidOwnerPartition(format!(
            "{field} must not be empty"
        )));
    }
    if s.len() > OwnerKey::MAX_COMPONENT_LEN {
        return Err(MemoryError::InvalidOwnerPartition(format!(
            "{field} too long: got {}, max {}",
            s.len(),
            OwnerKey::MAX_COMPONENT_LEN
        )));
    }
    if let Some((index, ch)) = s
        .chars()
        .enumerate()
        .find(|(_, ch)| !(ch.is_ascii_alphanumeric() || matches!(ch, '.' | '_' | '-' | '@')))
    {
        return Err(MemoryError::InvalidOwnerPartition(format!(
            "{field} contains invalid character {ch:?} at index {index}"
        )));
    }
    Ok(s.to_owned())
}

impl fmt::Display for OwnerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.conversation, self.user, self.character)
    }
}

impl FromStr for OwnerKey {
    type Err = MemoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split(':');
        match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(conversation), Some(user), Some(character), None) => {
                Self::new(conversation, user, character)
            }
            _ => Err(MemoryError::InvalidOwnerPartition(format!(
                "expected conversation:user:character, got {s:?}"
            ))),
        }
    }
}

impl TryFrom<String> for OwnerKey {
    type Error = MemoryError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<OwnerKey> for String {
    fn from(value: OwnerKey) -> Self {
        value.partition()
    }
}

// ===== Rusqlite integration ================================================

mod rusqlite_impl {
    use super::{OwnerKey, RecordId};

    use rusqlite::types::{
        FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, Value, ValueRef,
    };

    impl ToSql for RecordId {
        fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
            // Store UUIDs as TEXT for compatibility
            Ok(ToSqlOutput::Owned(Value::Text(self.0.to_string())))
        }
    }

    impl FromSql for RecordId {
        fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
            match value {
                ValueRef::Text(t) => {
                    let s = std::str::from_utf8(t).map_err(|e| FromSqlError::Other(Box::new(e)))?;
                    uuid::Uuid::parse_str(s)
                        .map(Self)
                        .map_err(|e| FromSqlError::Other(Box::new(e)))
                }
                _ => Err(FromSqlError::InvalidType),
            }
        }
    }

    impl ToSql for OwnerKey {
        fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
            Ok(ToSqlOutput::Owned(Value::Text(self.partition())))
        }
    }

    impl FromSql for OwnerKey {
        fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
            match value {
                ValueRef::Text(t) => {
                    let s = std::str::from_utf8(t).map_err(|e| FromSqlError::Other(Box::new(e)))?;
                    s.parse().map_err(|e: super::MemoryError| {
                        FromSqlError::Other(Box::new(std::io::Error::new(
                            std::io::ErrorKind::InvalidData,
                            e.to_string(),
                        )))
                    })
                }
                _ => Err(FromSqlError::InvalidType),
            }
        }
    }
}
