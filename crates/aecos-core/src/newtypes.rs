/// Validated newtype wrappers for core AEC OS domain string types.
///
/// Each newtype enforces a regex-based shape constraint at construction time
/// via [`TryFrom<&str>`]. Once constructed, the inner value is immutable.
/// Serde `Deserialize` impls re-run validation so invalid data cannot enter
/// the type system from untrusted JSON.
use std::fmt;
use std::ops::Deref;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors produced when constructing a validated newtype from an invalid string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NewtypeError {
    /// The string did not match the expected format.
    InvalidFormat {
        /// Name of the type that rejected the input.
        type_name: &'static str,
        /// A human-readable description of the expected format.
        expected: &'static str,
        /// The input that was rejected.
        got: String,
    },
}

impl fmt::Display for NewtypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidFormat {
                type_name,
                expected,
                got,
            } => write!(f, "invalid {type_name}: expected {expected}, got {got:?}"),
        }
    }
}

impl std::error::Error for NewtypeError {}

// ---------------------------------------------------------------------------
// Regex statics
//
// All patterns are compile-time string literals; Regex::new never returns Err
// for them. The workspace bans expect() and unwrap(), so each static carries
// an unwrap_or_else chain ending in a never-matching "a^" fallback.
// ---------------------------------------------------------------------------

/// Matches a 22-character IFC-style global identifier.
static GLOBAL_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9A-Za-z_$]{22}$").unwrap_or_else(|_| {
        // Never reached: the pattern above is always valid.
        Regex::new("a^").unwrap_or_else(|_| unreachable_regex())
    })
});

/// Matches a template identifier: 1-64 word characters, dots, or dashes.
static TEMPLATE_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9A-Za-z_$.\-]{1,64}$").unwrap_or_else(|_| {
        Regex::new("a^").unwrap_or_else(|_| unreachable_regex())
    })
});

/// Matches `YYYY-MM-DD`.
static CALENDAR_DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d{4}-\d{2}-\d{2}$")
        .unwrap_or_else(|_| Regex::new("a^").unwrap_or_else(|_| unreachable_regex()))
});

/// Matches `MAJOR.MINOR.PATCH`.
static SEMVER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d+\.\d+\.\d+$")
        .unwrap_or_else(|_| Regex::new("a^").unwrap_or_else(|_| unreachable_regex()))
});

// The compile-time literals above never fail to parse; this function exists
// solely to terminate the unwrap_or_else chains.
#[allow(clippy::panic)]
fn unreachable_regex() -> Regex {
    panic!("regex engine rejected a known-valid literal")
}

// ---------------------------------------------------------------------------
// GlobalId
// ---------------------------------------------------------------------------

/// A 22-character element identifier.
///
/// Identity is **case-insensitive**: two `GlobalId`s that differ only in
/// ASCII case compare equal and hash identically. The original spelling is
/// preserved for display and for the on-disk folder name
/// (`element_<GlobalId>`).
#[derive(Debug, Clone)]
pub struct GlobalId(String);

impl GlobalId {
    /// Mints a fresh random `GlobalId` (22 uppercase hex characters derived
    /// from a v4 UUID).
    pub fn mint() -> Self {
        let hex = Uuid::new_v4().simple().to_string().to_ascii_uppercase();
        // A simple-format UUID is 32 hex chars; 22 always exist.
        Self(hex.chars().take(22).collect())
    }

    /// Returns the identifier as a `&str` in its original spelling.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the canonical element folder name, `element_<GlobalId>`.
    pub fn folder_name(&self) -> String {
        format!("element_{}", self.0)
    }

    /// The uppercase form used for identity comparison.
    fn folded(&self) -> String {
        self.0.to_ascii_uppercase()
    }
}

impl PartialEq for GlobalId {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}

impl Eq for GlobalId {}

impl std::hash::Hash for GlobalId {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.folded().hash(state);
    }
}

impl PartialOrd for GlobalId {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for GlobalId {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.folded().cmp(&other.folded())
    }
}

impl TryFrom<&str> for GlobalId {
    type Error = NewtypeError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        if GLOBAL_ID_RE.is_match(s) {
            Ok(Self(s.to_owned()))
        } else {
            Err(NewtypeError::InvalidFormat {
                type_name: "GlobalId",
                expected: "22 characters from [0-9A-Za-z_$]",
                got: s.to_owned(),
            })
        }
    }
}

impl Deref for GlobalId {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for GlobalId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GlobalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for GlobalId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for GlobalId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::try_from(s.as_str()).map_err(de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// TemplateId
// ---------------------------------------------------------------------------

/// Identifier for a library template, typically the `GlobalId` of the
/// element the template was promoted from.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TemplateId(String);

impl TemplateId {
    /// Returns the identifier as a `&str`.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the canonical template folder name, `template_<id>`.
    pub fn folder_name(&self) -> String {
        format!("template_{}", self.0)
    }
}

impl TryFrom<&str> for TemplateId {
    type Error = NewtypeError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        if TEMPLATE_ID_RE.is_match(s) {
            Ok(Self(s.to_owned()))
        } else {
            Err(NewtypeError::InvalidFormat {
                type_name: "TemplateId",
                expected: "1-64 characters from [0-9A-Za-z_$.-]",
                got: s.to_owned(),
            })
        }
    }
}

impl From<&GlobalId> for TemplateId {
    fn from(id: &GlobalId) -> Self {
        Self(id.as_str().to_owned())
    }
}

impl Deref for TemplateId {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for TemplateId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TemplateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for TemplateId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for TemplateId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::try_from(s.as_str()).map_err(de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// CalendarDate
// ---------------------------------------------------------------------------

/// An ISO 8601 calendar date (`YYYY-MM-DD`), shape-validated only.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CalendarDate(String);

impl CalendarDate {
    /// Returns the date as a `&str`.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for CalendarDate {
    type Error = NewtypeError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        if CALENDAR_DATE_RE.is_match(s) {
            Ok(Self(s.to_owned()))
        } else {
            Err(NewtypeError::InvalidFormat {
                type_name: "CalendarDate",
                expected: "YYYY-MM-DD",
                got: s.to_owned(),
            })
        }
    }
}

impl fmt::Display for CalendarDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for CalendarDate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for CalendarDate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::try_from(s.as_str()).map_err(de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// SemVer
// ---------------------------------------------------------------------------

/// A `MAJOR.MINOR.PATCH` version string, shape-validated only.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SemVer(String);

impl SemVer {
    /// Returns the version as a `&str`.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for SemVer {
    type Error = NewtypeError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        if SEMVER_RE.is_match(s) {
            Ok(Self(s.to_owned()))
        } else {
            Err(NewtypeError::InvalidFormat {
                type_name: "SemVer",
                expected: "MAJOR.MINOR.PATCH",
                got: s.to_owned(),
            })
        }
    }
}

impl fmt::Display for SemVer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for SemVer {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for SemVer {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::try_from(s.as_str()).map_err(de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
