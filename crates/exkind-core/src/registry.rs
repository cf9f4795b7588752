//! Kind registry: the six built-in kinds plus up to sixteen custom kinds
//! registered at runtime.
//!
//! Custom tags are allocated from `2^16` upward by doubling, skipping tags
//! already taken. There is no way to remove a kind once registered.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{OnceLock, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use thiserror::Error;

use crate::kind::{Builtin, Classification, ListFilter, CUSTOM_BASE, CUSTOM_SLOTS};

/// Errors returned by registration.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The name is already a built-in or custom kind.
    #[error("exception kind already registered: {name}")]
    DuplicateName { name: String },

    /// Every custom slot is taken.
    #[error("all {limit} custom exception slots are taken")]
    SlotsExhausted { limit: usize },

    /// A kind list passed to [`KindRegistry::load_json`] was not a JSON array of names.
    #[error("invalid kind list: {0}")]
    InvalidConfig(#[from] serde_json::Error),
}

// ─── Custom kind table ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
struct CustomKinds {
    by_name: HashMap<String, u32>,
    /// tag → name, ordered by tag
    by_tag: BTreeMap<u32, String>,
}

impl CustomKinds {
    fn next_free_tag(&self) -> Option<u32> {
        let mut tag = CUSTOM_BASE;
        while self.by_tag.contains_key(&tag) {
            tag = tag.checked_mul(2)?;
        }
        Some(tag)
    }

    fn claim(&mut self, name: &str) -> Result<u32, RegistryError> {
        if Builtin::from_name(name).is_some() || self.by_name.contains_key(name) {
            return Err(RegistryError::DuplicateName {
                name: name.to_string(),
            });
        }
        let exhausted = RegistryError::SlotsExhausted {
            limit: CUSTOM_SLOTS,
        };
        if self.by_tag.len() >= CUSTOM_SLOTS {
            return Err(exhausted);
        }
        let tag = self.next_free_tag().ok_or(exhausted)?;
        self.by_name.insert(name.to_string(), tag);
        self.by_tag.insert(tag, name.to_string());
        Ok(tag)
    }
}

// ─── KindRegistry ─────────────────────────────────────────────────────────────

/// The authority for allocating, listing and classifying exception kinds.
///
/// Built-in kinds are installed by the constructor; after that the registry
/// only ever grows. Registration holds the write lock across the whole
/// check-and-allocate step, so concurrent callers never share a slot and the
/// slot limit is exact.
///
/// Most code uses the process-wide instance through [`KindRegistry::global`]
/// or the free functions [`register`], [`list`] and [`classify`].
pub struct KindRegistry {
    custom: RwLock<CustomKinds>,
}

impl KindRegistry {
    /// A registry holding only the built-in kinds.
    pub fn new() -> Self {
        Self {
            custom: RwLock::new(CustomKinds::default()),
        }
    }

    /// The process-wide registry.
    pub fn global() -> &'static KindRegistry {
        static GLOBAL: OnceLock<KindRegistry> = OnceLock::new();
        GLOBAL.get_or_init(|| {
            tracing::info!(builtin = Builtin::ALL.len(), "exception kind registry live");
            KindRegistry::new()
        })
    }

    fn read(&self) -> RwLockReadGuard<'_, CustomKinds> {
        // every write validates before mutating, so a poisoned table is intact
        self.custom.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, CustomKinds> {
        self.custom.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a custom kind and return its tag.
    pub fn register(&self, name: &str) -> Result<u32, RegistryError> {
        let result = self.write().claim(name);
        match &result {
            Ok(tag) => tracing::debug!(name, tag, "registered exception kind"),
            Err(e) => tracing::warn!(name, error = %e, "exception kind registration rejected"),
        }
        result
    }

    /// Register several kinds at once. Either every name is registered, or
    /// none is and the first failure is returned.
    pub fn register_all<I, S>(&self, names: I) -> Result<Vec<u32>, RegistryError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut table = self.write();
        let mut staged = table.clone();
        let tags = names
            .into_iter()
            .map(|name| staged.claim(name.as_ref()))
            .collect::<Result<Vec<_>, _>>();
        match tags {
            Ok(tags) => {
                *table = staged;
                tracing::debug!(count = tags.len(), "registered exception kinds");
                Ok(tags)
            }
            Err(e) => {
                tracing::warn!(error = %e, "exception kind batch rejected");
                Err(e)
            }
        }
    }

    /// Register kinds from a JSON array of names, e.g. `["E_FROB", "E_QUUX"]`.
    pub fn load_json(&self, json: &str) -> Result<Vec<u32>, RegistryError> {
        let names: Vec<String> = serde_json::from_str(json)?;
        self.register_all(&names)
    }

    /// Kind names matching `filter`. Built-in names come in declaration
    /// order; custom names come in tag order.
    pub fn list(&self, filter: ListFilter) -> Vec<String> {
        let builtin = Builtin::ALL.iter().map(|b| b.name().to_string());
        match filter {
            ListFilter::BuiltinOnly => builtin.collect(),
            ListFilter::CustomOnly => self.read().by_tag.values().cloned().collect(),
            ListFilter::All => {
                let custom = self.read();
                builtin.chain(custom.by_tag.values().cloned()).collect()
            }
        }
    }

    /// Range classification; see [`Classification::of`].
    pub fn classify(&self, tag: u32) -> Classification {
        Classification::of(tag)
    }

    /// Tag of a built-in or custom kind.
    pub fn lookup(&self, name: &str) -> Option<u32> {
        match Builtin::from_name(name) {
            Some(b) => Some(b.tag()),
            None => self.read().by_name.get(name).copied(),
        }
    }

    /// Name of the kind that owns `tag`.
    pub fn name_of(&self, tag: u32) -> Option<String> {
        match Builtin::from_tag(tag) {
            Some(b) => Some(b.name().to_string()),
            None => self.read().by_tag.get(&tag).cloned(),
        }
    }

    /// Strict membership: `true` only for tags actually owned by a kind.
    pub fn is_registered(&self, tag: u32) -> bool {
        Builtin::from_tag(tag).is_some() || self.read().by_tag.contains_key(&tag)
    }

    /// Number of registered custom kinds.
    pub fn custom_len(&self) -> usize {
        self.read().by_tag.len()
    }

    /// Custom slots still free.
    pub fn remaining_slots(&self) -> usize {
        CUSTOM_SLOTS - self.custom_len()
    }
}

impl Default for KindRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for KindRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KindRegistry")
            .field("custom", &self.read().by_tag)
            .finish()
    }
}

// ─── Global shortcuts ─────────────────────────────────────────────────────────

/// Register a custom kind in the global registry.
pub fn register(name: &str) -> Result<u32, RegistryError> {
    KindRegistry::global().register(name)
}

/// List kind names in the global registry.
pub fn list(filter: ListFilter) -> Vec<String> {
    KindRegistry::global().list(filter)
}

/// Range classification of `tag`.
pub fn classify(tag: u32) -> Classification {
    Classification::of(tag)
}

/// Tag of a kind in the global registry.
pub fn lookup(name: &str) -> Option<u32> {
    KindRegistry::global().lookup(name)
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kind::{E_GENERIC, E_HALTED, E_SESSION};

    fn names(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("E_CUSTOM_{i}")).collect()
    }

    #[test]
    fn first_registration_gets_base_tag() {
        let reg = KindRegistry::new();
        assert_eq!(reg.register("E_FROB").unwrap(), 65536);
        assert_eq!(reg.register("E_QUUX").unwrap(), 131072);
        assert_eq!(reg.lookup("E_FROB"), Some(65536));
        assert_eq!(reg.name_of(131072).as_deref(), Some("E_QUUX"));
    }

    #[test]
    fn duplicate_name_rejected() {
        let reg = KindRegistry::new();
        reg.register("E_FROB").unwrap();
        let err = reg.register("E_FROB").unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateName { ref name } if name == "E_FROB"));
        assert_eq!(reg.custom_len(), 1);
    }

    #[test]
    fn builtin_names_cannot_be_registered() {
        let reg = KindRegistry::new();
        let err = reg.register("E_HALTED").unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateName { .. }));
    }

    #[test]
    fn seventeenth_registration_exhausts_slots() {
        let reg = KindRegistry::new();
        let mut seen = Vec::new();
        for name in names(16) {
            let tag = reg.register(&name).unwrap();
            assert!(tag >= CUSTOM_BASE);
            assert!(tag.is_power_of_two());
            assert!(!seen.contains(&tag));
            seen.push(tag);
        }
        assert_eq!(seen.last(), Some(&(1u32 << 31)));
        assert_eq!(reg.remaining_slots(), 0);
        let err = reg.register("E_ONE_TOO_MANY").unwrap_err();
        assert!(matches!(err, RegistryError::SlotsExhausted { limit: 16 }));
        assert_eq!(err.to_string(), "all 16 custom exception slots are taken");
    }

    #[test]
    fn allocation_skips_occupied_tags() {
        let mut table = CustomKinds::default();
        table.by_tag.insert(CUSTOM_BASE, "E_TAKEN".into());
        table.by_name.insert("E_TAKEN".into(), CUSTOM_BASE);
        table.by_tag.insert(CUSTOM_BASE << 2, "E_ALSO".into());
        table.by_name.insert("E_ALSO".into(), CUSTOM_BASE << 2);
        assert_eq!(table.claim("E_NEXT").unwrap(), CUSTOM_BASE << 1);
        assert_eq!(table.claim("E_AFTER").unwrap(), CUSTOM_BASE << 3);
    }

    #[test]
    fn list_filters() {
        let reg = KindRegistry::new();
        reg.register("E_FROB").unwrap();
        reg.register("E_QUUX").unwrap();
        assert_eq!(
            reg.list(ListFilter::BuiltinOnly),
            vec!["E_GENERIC", "E_INTERNAL", "E_HALTED", "E_HOOK", "E_REQUEST", "E_SESSION"]
        );
        assert_eq!(reg.list(ListFilter::CustomOnly), vec!["E_FROB", "E_QUUX"]);
        let all = reg.list(ListFilter::All);
        assert_eq!(all.len(), 8);
        assert_eq!(all[0], "E_GENERIC");
        assert_eq!(&all[6..], ["E_FROB", "E_QUUX"]);
    }

    #[test]
    fn classify_is_range_based_but_is_registered_is_strict() {
        let reg = KindRegistry::new();
        let tag = reg.register("E_FROB").unwrap();
        assert_eq!(reg.classify(E_HALTED), Classification::Builtin);
        assert_eq!(reg.classify(tag), Classification::Custom);
        assert_eq!(reg.classify(0), Classification::NotAKind);

        let never_allocated = tag << 5;
        assert_eq!(reg.classify(never_allocated), Classification::Custom);
        assert!(!reg.is_registered(never_allocated));
        assert!(reg.is_registered(tag));
        assert!(reg.is_registered(E_SESSION));
        assert!(!reg.is_registered(64));
    }

    #[test]
    fn builtin_lookups() {
        let reg = KindRegistry::new();
        assert_eq!(reg.lookup("E_GENERIC"), Some(E_GENERIC));
        assert_eq!(reg.name_of(E_HALTED).as_deref(), Some("E_HALTED"));
        assert_eq!(reg.lookup("E_NOPE"), None);
        assert_eq!(reg.name_of(0), None);
    }

    #[test]
    fn batch_registration_is_all_or_nothing() {
        let reg = KindRegistry::new();
        reg.register("E_FROB").unwrap();

        let err = reg.register_all(["E_A", "E_B", "E_FROB"]).unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateName { .. }));
        assert_eq!(reg.custom_len(), 1);
        assert_eq!(reg.lookup("E_A"), None);

        let err = reg.register_all(["E_C", "E_C"]).unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateName { .. }));
        assert_eq!(reg.custom_len(), 1);

        let err = reg.register_all(names(16)).unwrap_err();
        assert!(matches!(err, RegistryError::SlotsExhausted { .. }));
        assert_eq!(reg.custom_len(), 1);

        let tags = reg.register_all(["E_A", "E_B"]).unwrap();
        assert_eq!(tags, vec![CUSTOM_BASE << 1, CUSTOM_BASE << 2]);
    }

    #[test]
    fn load_json_names() {
        let reg = KindRegistry::new();
        let tags = reg.load_json(r#"["E_FROB", "E_QUUX"]"#).unwrap();
        assert_eq!(tags.len(), 2);
        assert_eq!(reg.list(ListFilter::CustomOnly), vec!["E_FROB", "E_QUUX"]);

        let err = reg.load_json(r#"{"E_FROB": 1}"#).unwrap_err();
        assert!(matches!(err, RegistryError::InvalidConfig(_)));
        assert_eq!(reg.load_json("[]").unwrap(), Vec::<u32>::new());
    }

    #[test]
    fn concurrent_registration_respects_slot_limit() {
        let reg = &KindRegistry::new();
        let all = names(32);
        let results: Vec<Result<u32, RegistryError>> = std::thread::scope(|s| {
            let handles: Vec<_> = all
                .iter()
                .map(|name| s.spawn(move || reg.register(name)))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let mut tags: Vec<u32> = results.iter().filter_map(|r| r.as_ref().ok().copied()).collect();
        assert_eq!(tags.len(), 16);
        tags.sort_unstable();
        tags.dedup();
        assert_eq!(tags.len(), 16);
        assert!(results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| matches!(e, RegistryError::SlotsExhausted { .. })));
    }

    #[test]
    fn concurrent_duplicate_registration_claims_once() {
        let reg = &KindRegistry::new();
        let ok = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8).map(|_| s.spawn(move || reg.register("E_RACE"))).collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap())
                .filter(Result::is_ok)
                .count()
        });
        assert_eq!(ok, 1);
        assert_eq!(reg.custom_len(), 1);
    }
}
