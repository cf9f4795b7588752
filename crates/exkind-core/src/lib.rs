//! exkind-core: flat, tag-based exception kinds.
//!
//! This crate defines:
//! - [`Builtin`] and the `E_*` constants: the six predefined kinds
//! - [`Exception`]: the raised unit (tag plus optional [`Message`])
//! - [`raise`] / [`raise!`]: raise an exception through `Result`
//! - [`is_exception`]: catch-side test, optionally scoped to built-in or custom kinds
//! - [`KindRegistry`]: allocation of up to 16 custom kinds at runtime
//!
//! # Range-based classification
//!
//! [`classify`] and [`is_exception`] decide by numeric range: any nonzero tag
//! below `2^16` is built-in and anything from `2^16` up is custom, whether or
//! not a kind was ever allocated for it. [`KindRegistry::is_registered`] is
//! the strict membership test.
//!
//! ```rust
//! use exkind_core::{classify, is_exception, raise, Classification, Exception, Message, E_HALTED};
//!
//! fn handle() -> Result<(), Exception> {
//!     raise(E_HALTED, Message::Absent)
//! }
//!
//! let caught = handle().unwrap_err();
//! assert_eq!(is_exception(&caught, None), 4);
//! assert_eq!(classify(4), Classification::Builtin);
//! ```

pub mod exception;
pub mod kind;
pub mod registry;

pub use exception::{exception_tag, is_exception, is_exception_any, raise, Exception, Message};
pub use kind::{
    Builtin, Classification, ListFilter, Scope, UnknownScope, CUSTOM_BASE, CUSTOM_SLOTS, E_GENERIC,
    E_HALTED, E_HOOK, E_INTERNAL, E_REQUEST, E_SESSION,
};
pub use registry::{classify, list, lookup, register, KindRegistry, RegistryError};
