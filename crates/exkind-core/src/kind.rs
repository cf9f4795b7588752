//! The fixed vocabulary of the exception taxonomy.
//!
//! Tags are powers of two. Built-in kinds occupy `2^0..=2^5`, custom kinds
//! occupy `2^16..=2^31`, and `2^6..=2^15` is reserved.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// `E_GENERIC`: a generic exception.
pub const E_GENERIC: u32 = 1;
/// `E_INTERNAL`: an internal framework failure.
pub const E_INTERNAL: u32 = 2;
/// `E_HALTED`: request processing was halted on purpose.
pub const E_HALTED: u32 = 4;
/// `E_HOOK`: a hook failed.
pub const E_HOOK: u32 = 8;
/// `E_REQUEST`: a request-level failure.
pub const E_REQUEST: u32 = 16;
/// `E_SESSION`: a session-level failure.
pub const E_SESSION: u32 = 32;

/// First tag handed out to a custom kind (`2^16`).
pub const CUSTOM_BASE: u32 = 1 << 16;

/// Maximum number of custom kinds a registry accepts.
pub const CUSTOM_SLOTS: usize = 16;

// ─── Builtin ──────────────────────────────────────────────────────────────────

/// One of the six predefined kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u32)]
pub enum Builtin {
    #[serde(rename = "E_GENERIC")]
    Generic = E_GENERIC,
    #[serde(rename = "E_INTERNAL")]
    Internal = E_INTERNAL,
    #[serde(rename = "E_HALTED")]
    Halted = E_HALTED,
    #[serde(rename = "E_HOOK")]
    Hook = E_HOOK,
    #[serde(rename = "E_REQUEST")]
    Request = E_REQUEST,
    #[serde(rename = "E_SESSION")]
    Session = E_SESSION,
}

impl Builtin {
    /// All built-in kinds, in declaration order.
    pub const ALL: [Builtin; 6] = [
        Self::Generic,
        Self::Internal,
        Self::Halted,
        Self::Hook,
        Self::Request,
        Self::Session,
    ];

    /// The kind's tag.
    pub const fn tag(self) -> u32 {
        self as u32
    }

    /// The kind's public name, e.g. `"E_HALTED"`.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Generic => "E_GENERIC",
            Self::Internal => "E_INTERNAL",
            Self::Halted => "E_HALTED",
            Self::Hook => "E_HOOK",
            Self::Request => "E_REQUEST",
            Self::Session => "E_SESSION",
        }
    }

    /// Exact lookup by tag.
    pub fn from_tag(tag: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|b| b.tag() == tag)
    }

    /// Exact lookup by name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|b| b.name() == name)
    }
}

impl fmt::Display for Builtin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<Builtin> for u32 {
    fn from(kind: Builtin) -> Self {
        kind.tag()
    }
}

// ─── Classification ───────────────────────────────────────────────────────────

/// Which range a tag falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    /// Zero: not a kind at all.
    NotAKind,
    /// `0 < tag < 2^16`.
    Builtin,
    /// `tag >= 2^16`.
    Custom,
}

impl Classification {
    /// Classify a tag by range alone.
    ///
    /// A tag inside a range is accepted even if no kind was ever allocated
    /// for it. Use [`KindRegistry::is_registered`](crate::KindRegistry::is_registered)
    /// when strict membership matters.
    pub const fn of(tag: u32) -> Self {
        if tag == 0 {
            Self::NotAKind
        } else if tag < CUSTOM_BASE {
            Self::Builtin
        } else {
            Self::Custom
        }
    }

    /// Returns `true` unless this is [`Classification::NotAKind`].
    pub fn is_kind(self) -> bool {
        self != Self::NotAKind
    }
}

// ─── Filters ──────────────────────────────────────────────────────────────────

/// Which kind names [`KindRegistry::list`](crate::KindRegistry::list) returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListFilter {
    /// Built-in names followed by custom names.
    #[default]
    All,
    /// The six built-in names, in declaration order.
    BuiltinOnly,
    /// Registered custom names.
    CustomOnly,
}

/// Restricts which caught exceptions count as a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// Tag in the built-in range.
    Internal,
    /// Tag in the custom range.
    Custom,
}

impl Scope {
    /// Returns `true` if `tag` falls into this scope's range.
    pub fn admits(self, tag: u32) -> bool {
        matches!(
            (self, Classification::of(tag)),
            (Self::Internal, Classification::Builtin) | (Self::Custom, Classification::Custom)
        )
    }
}

/// Error returned when a scope string is neither `"internal"` nor `"custom"`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown exception scope: {0}")]
pub struct UnknownScope(pub String);

impl FromStr for Scope {
    type Err = UnknownScope;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "internal" => Ok(Self::Internal),
            "custom" => Ok(Self::Custom),
            other => Err(UnknownScope(other.to_string())),
        }
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_tags_are_distinct_powers_of_two() {
        let tags: Vec<u32> = Builtin::ALL.iter().map(|b| b.tag()).collect();
        assert_eq!(tags, vec![1, 2, 4, 8, 16, 32]);
        assert!(tags.iter().all(|t| t.is_power_of_two()));
    }

    #[test]
    fn builtin_name_lookup() {
        assert_eq!(Builtin::from_name("E_HOOK"), Some(Builtin::Hook));
        assert_eq!(Builtin::from_tag(E_SESSION), Some(Builtin::Session));
        assert_eq!(Builtin::from_tag(64), None);
        assert_eq!(Builtin::Halted.to_string(), "E_HALTED");
    }

    #[test]
    fn classification_is_range_based() {
        assert_eq!(Classification::of(0), Classification::NotAKind);
        assert_eq!(Classification::of(E_GENERIC), Classification::Builtin);
        // never allocated, still in the builtin range
        assert_eq!(Classification::of(1 << 10), Classification::Builtin);
        assert_eq!(Classification::of(CUSTOM_BASE - 1), Classification::Builtin);
        assert_eq!(Classification::of(CUSTOM_BASE), Classification::Custom);
        assert_eq!(Classification::of(1 << 31), Classification::Custom);
    }

    #[test]
    fn scope_parsing() {
        assert_eq!("internal".parse::<Scope>(), Ok(Scope::Internal));
        assert_eq!("custom".parse::<Scope>(), Ok(Scope::Custom));
        assert!("Internal".parse::<Scope>().is_err());
    }

    #[test]
    fn scope_admits() {
        assert!(Scope::Internal.admits(E_HALTED));
        assert!(!Scope::Internal.admits(CUSTOM_BASE));
        assert!(Scope::Custom.admits(CUSTOM_BASE << 3));
        assert!(!Scope::Custom.admits(0));
        assert!(!Scope::Internal.admits(0));
    }

    #[test]
    fn builtin_serde_uses_public_names() {
        let json = serde_json::to_string(&Builtin::Request).unwrap();
        assert_eq!(json, "\"E_REQUEST\"");
        let filter: ListFilter = serde_json::from_str("\"custom_only\"").unwrap();
        assert_eq!(filter, ListFilter::CustomOnly);
    }
}
