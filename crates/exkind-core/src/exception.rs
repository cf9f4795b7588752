//! The raised unit: [`Exception`], plus the raise and catch-side helpers.
//!
//! Raising is ordinary `Result` propagation. [`raise`] (or the [`raise!`]
//! macro) produces an `Err(Exception)` that travels up through `?` until a
//! handler inspects it with [`is_exception`] or [`exception_tag`].

use std::cmp::Ordering;
use std::error::Error as StdError;
use std::fmt;
use std::ops::{Add, BitAnd, BitOr, Div, Mul, Sub};

use serde::{Deserialize, Serialize};

use crate::kind::{Classification, Scope};
use crate::registry::KindRegistry;

// ─── Message ──────────────────────────────────────────────────────────────────

/// The message slot of an [`Exception`].
///
/// `Absent` and `Null` are different states: the first means no message was
/// supplied at all, the second means a message slot was set but holds nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "text", rename_all = "snake_case")]
pub enum Message {
    #[default]
    Absent,
    Null,
    Text(String),
}

impl Message {
    /// The message text, if any.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Absent | Self::Null => None,
        }
    }

    /// Returns `true` if any message slot was set, even a null one.
    pub fn is_given(&self) -> bool {
        !matches!(self, Self::Absent)
    }

    fn text_or_empty(&self) -> &str {
        self.as_str().unwrap_or("")
    }
}

impl From<&str> for Message {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Message {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

/// `None` maps to [`Message::Null`]: the caller did pass a message slot.
impl<S: Into<String>> From<Option<S>> for Message {
    fn from(s: Option<S>) -> Self {
        match s {
            Some(s) => Self::Text(s.into()),
            None => Self::Null,
        }
    }
}

// ─── Exception ────────────────────────────────────────────────────────────────

/// A raised exception value: a kind tag and an optional message.
///
/// The tag is not validated here. Handlers check it through [`is_exception`]
/// or [`Classification::of`].
///
/// Equality and ordering look at the tag only, both against another
/// `Exception` and against a bare `u32`. Comparing with a string looks at the
/// message instead. Operators act on the tag: `+ - *` yield an `i64` and never
/// overflow, `/ & |` yield a `u32`, so a handler can write
/// `(e & (E_HALTED | E_HOOK)) != 0`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Exception {
    tag: u32,
    #[serde(default)]
    message: Message,
}

impl Exception {
    /// An exception with no message.
    pub fn new(tag: u32) -> Self {
        Self {
            tag,
            message: Message::Absent,
        }
    }

    /// An exception with the given message slot.
    pub fn with_message(tag: u32, message: impl Into<Message>) -> Self {
        Self {
            tag,
            message: message.into(),
        }
    }

    /// The kind tag.
    pub fn tag(&self) -> u32 {
        self.tag
    }

    /// Same as [`Exception::tag`].
    pub fn value(&self) -> u32 {
        self.tag
    }

    /// The message slot.
    pub fn message(&self) -> &Message {
        &self.message
    }

    /// Overwrite the tag. Unchecked: nothing verifies the new value is a
    /// power of two or belongs to any kind.
    pub fn set_tag(&mut self, tag: u32) {
        self.tag = tag;
    }

    /// Overwrite the message slot. Unchecked.
    pub fn set_message(&mut self, message: impl Into<Message>) {
        self.message = message.into();
    }

    /// Range classification of this exception's tag.
    pub fn classification(&self) -> Classification {
        Classification::of(self.tag)
    }

    /// Name of the kind this tag was allocated to in the global registry.
    pub fn kind_name(&self) -> Option<String> {
        KindRegistry::global().name_of(self.tag)
    }

    /// Same tag, regardless of message.
    pub fn equals_by_tag(&self, other: &Exception) -> bool {
        self.tag == other.tag
    }

    /// Same message text, regardless of tag.
    pub fn equals_by_message(&self, other: &Exception) -> bool {
        self.message.text_or_empty() == other.message.text_or_empty()
    }

    /// Order two exceptions by message text. Absent and null messages sort
    /// as the empty string.
    pub fn cmp_message(&self, other: &Exception) -> Ordering {
        self.message.text_or_empty().cmp(other.message.text_or_empty())
    }

    /// Returns `true` if the tag shares at least one bit with `mask`.
    pub fn tag_mask_test(&self, mask: u32) -> bool {
        self.tag & mask != 0
    }
}

/// Writes the message, or nothing when there is none.
impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message.text_or_empty())
    }
}

impl StdError for Exception {}

impl From<&Exception> for u32 {
    fn from(e: &Exception) -> Self {
        e.tag
    }
}

impl From<Exception> for u32 {
    fn from(e: Exception) -> Self {
        e.tag
    }
}

// ─── Comparison ───────────────────────────────────────────────────────────────

impl PartialEq for Exception {
    fn eq(&self, other: &Self) -> bool {
        self.tag == other.tag
    }
}

impl Eq for Exception {}

impl PartialOrd for Exception {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Exception {
    fn cmp(&self, other: &Self) -> Ordering {
        self.tag.cmp(&other.tag)
    }
}

impl PartialEq<u32> for Exception {
    fn eq(&self, other: &u32) -> bool {
        self.tag == *other
    }
}

impl PartialEq<Exception> for u32 {
    fn eq(&self, other: &Exception) -> bool {
        *self == other.tag
    }
}

impl PartialOrd<u32> for Exception {
    fn partial_cmp(&self, other: &u32) -> Option<Ordering> {
        self.tag.partial_cmp(other)
    }
}

impl PartialOrd<Exception> for u32 {
    fn partial_cmp(&self, other: &Exception) -> Option<Ordering> {
        self.partial_cmp(&other.tag)
    }
}

impl PartialEq<str> for Exception {
    fn eq(&self, other: &str) -> bool {
        self.message.text_or_empty() == other
    }
}

impl PartialEq<&str> for Exception {
    fn eq(&self, other: &&str) -> bool {
        self.message.text_or_empty() == *other
    }
}

// ─── Tag arithmetic ───────────────────────────────────────────────────────────

/// Implements `$trait` for `Exception` against `u32` and `Exception`, with
/// both tags widened to `$out` before the operation.
macro_rules! tag_ops {
    ($out:ty => $($trait:ident :: $method:ident),* $(,)?) => {$(
        impl $trait<u32> for &Exception {
            type Output = $out;
            fn $method(self, rhs: u32) -> $out {
                $trait::$method(<$out>::from(self.tag), <$out>::from(rhs))
            }
        }

        impl $trait<u32> for Exception {
            type Output = $out;
            fn $method(self, rhs: u32) -> $out {
                $trait::$method(<$out>::from(self.tag), <$out>::from(rhs))
            }
        }

        impl $trait<&Exception> for &Exception {
            type Output = $out;
            fn $method(self, rhs: &Exception) -> $out {
                $trait::$method(<$out>::from(self.tag), <$out>::from(rhs.tag))
            }
        }

        impl $trait<Exception> for Exception {
            type Output = $out;
            fn $method(self, rhs: Exception) -> $out {
                $trait::$method(<$out>::from(self.tag), <$out>::from(rhs.tag))
            }
        }
    )*};
}

// Sums, differences and products of two 32-bit tags always fit in an i64.
tag_ops!(i64 => Add::add, Sub::sub, Mul::mul);

// Quotients never exceed the dividend. A zero divisor panics as for `u32`.
tag_ops!(u32 => Div::div);

tag_ops!(u32 => BitAnd::bitand, BitOr::bitor);

// ─── Raise / catch ────────────────────────────────────────────────────────────

/// Raise an exception: returns `Err` so the caller's `?` propagates it.
///
/// Pass [`Message::Absent`] for no message, `None::<String>` for a null one.
pub fn raise<T>(tag: u32, message: impl Into<Message>) -> Result<T, Exception> {
    let exception = Exception::with_message(tag, message);
    tracing::trace!(tag, message = ?exception.message, "exception raised");
    Err(exception)
}

/// Return early with an [`Exception`], optionally with a formatted message.
///
/// The error is converted with `Into`, so this works in functions returning
/// `Result<_, Exception>` as well as `anyhow::Result<_>`.
///
/// ```rust
/// use exkind_core::{raise, Exception, E_HALTED};
///
/// fn handler(stop: bool) -> Result<u32, Exception> {
///     if stop {
///         raise!(E_HALTED, "halted at step {}", 3);
///     }
///     Ok(1)
/// }
///
/// assert_eq!(handler(true).unwrap_err().message().as_str(), Some("halted at step 3"));
/// ```
#[macro_export]
macro_rules! raise {
    ($tag:expr $(,)?) => {
        return ::core::result::Result::Err($crate::Exception::new($tag).into())
    };
    ($tag:expr, $($fmt:tt)+) => {
        return ::core::result::Result::Err(
            $crate::Exception::with_message($tag, ::std::format!($($fmt)+)).into(),
        )
    };
}

/// Tag of `caught` if it is an [`Exception`] admitted by `scope`, else `0`.
pub fn exception_tag(caught: &(dyn StdError + 'static), scope: Option<Scope>) -> u32 {
    let Some(e) = caught.downcast_ref::<Exception>() else {
        return 0;
    };
    match scope {
        None => e.tag,
        Some(s) if s.admits(e.tag) => e.tag,
        Some(_) => 0,
    }
}

/// Tag of `caught` if it is an [`Exception`] matching `filter`, else `0`.
///
/// `filter` is `"internal"` (built-in range) or `"custom"` (custom range).
/// Any other filter string matches nothing. Membership is by range only, so
/// an in-range tag that was never registered still counts.
pub fn is_exception(caught: &(dyn StdError + 'static), filter: Option<&str>) -> u32 {
    match filter.map(str::parse::<Scope>) {
        None => exception_tag(caught, None),
        Some(Ok(scope)) => exception_tag(caught, Some(scope)),
        Some(Err(_)) => 0,
    }
}

/// Like [`is_exception`], for an `anyhow::Error`. Walks the source chain, so
/// an exception wrapped in `.context(..)` is still found.
pub fn is_exception_any(caught: &anyhow::Error, filter: Option<&str>) -> u32 {
    caught
        .chain()
        .map(|e| is_exception(e, filter))
        .find(|&tag| tag != 0)
        .unwrap_or(0)
}

// ─── Tests ────────────────────────────────────────────────────────────────────
