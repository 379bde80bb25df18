//! The process-wide symbol → outcome ledger.
//!
//! Every symbol the pipeline touches ends up here with its final status and either the
//! new name or the reason it was left alone. The map is the single source of truth for
//! the mapping-file writers and for the group-consistency invariant (all members of a
//! virtual-method group carry the same status and name).
//!
//! Entries are kept in first-touch order so the exported mapping is reproducible; reason
//! strings are diagnostics for the mapping file, never consulted for control flow.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

use crate::metadata::{EventKey, FieldKey, MethodKey, PropertyKey, TypeKey};

/// Outcome of processing one symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObfuscationStatus {
    /// Not yet decided
    Unknown,
    /// Deliberately left alone, with the reason
    Skipped(String),
    /// Rename decided but not yet applied (first pass of the virtual-method logic)
    WillRename(String),
    /// Rename applied; carries the new name
    Renamed(String),
}

impl ObfuscationStatus {
    /// Whether the symbol was skipped.
    #[must_use]
    pub fn is_skipped(&self) -> bool {
        matches!(self, ObfuscationStatus::Skipped(_))
    }

    /// Whether no decision has been made yet.
    #[must_use]
    pub fn is_unknown(&self) -> bool {
        matches!(self, ObfuscationStatus::Unknown)
    }

    /// The decided or applied new name, if any.
    #[must_use]
    pub fn new_name(&self) -> Option<&str> {
        match self {
            ObfuscationStatus::WillRename(name) | ObfuscationStatus::Renamed(name) => Some(name),
            _ => None,
        }
    }

    /// The skip reason, if skipped.
    #[must_use]
    pub fn reason(&self) -> Option<&str> {
        match self {
            ObfuscationStatus::Skipped(reason) => Some(reason),
            _ => None,
        }
    }
}

impl fmt::Display for ObfuscationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObfuscationStatus::Unknown => write!(f, "unknown"),
            ObfuscationStatus::Skipped(reason) => write!(f, "skipped ({reason})"),
            ObfuscationStatus::WillRename(name) => write!(f, "will rename to {name}"),
            ObfuscationStatus::Renamed(name) => write!(f, "renamed to {name}"),
        }
    }
}

/// Insertion-ordered key → status store.
#[derive(Debug)]
struct OrderedStatusMap<K> {
    entries: Vec<(K, ObfuscationStatus)>,
    index: HashMap<K, usize>,
}

impl<K> Default for OrderedStatusMap<K> {
    fn default() -> Self {
        OrderedStatusMap {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<K: Eq + Hash + Clone> OrderedStatusMap<K> {
    fn update(&mut self, key: &K, status: ObfuscationStatus) {
        match self.index.get(key) {
            Some(&at) => self.entries[at].1 = status,
            None => {
                self.index.insert(key.clone(), self.entries.len());
                self.entries.push((key.clone(), status));
            }
        }
    }

    fn status(&self, key: &K) -> ObfuscationStatus {
        self.index
            .get(key)
            .map_or(ObfuscationStatus::Unknown, |&at| self.entries[at].1.clone())
    }

    fn iter(&self) -> impl Iterator<Item = (&K, &ObfuscationStatus)> {
        self.entries.iter().map(|(k, s)| (k, s))
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// The global obfuscation ledger, one section per symbol kind plus resources.
#[derive(Debug, Default)]
pub struct ObfuscationMap {
    types: OrderedStatusMap<TypeKey>,
    methods: OrderedStatusMap<MethodKey>,
    fields: OrderedStatusMap<FieldKey>,
    properties: OrderedStatusMap<PropertyKey>,
    events: OrderedStatusMap<EventKey>,
    resources: Vec<(String, ObfuscationStatus)>,
}

impl ObfuscationMap {
    /// Create an empty map.
    #[must_use]
    pub fn new() -> Self {
        ObfuscationMap::default()
    }

    /// Record the outcome for a type.
    pub fn update_type(&mut self, key: &TypeKey, status: ObfuscationStatus) {
        self.types.update(key, status);
    }

    /// Record the outcome for a method.
    pub fn update_method(&mut self, key: &MethodKey, status: ObfuscationStatus) {
        self.methods.update(key, status);
    }

    /// Record the outcome for a field.
    pub fn update_field(&mut self, key: &FieldKey, status: ObfuscationStatus) {
        self.fields.update(key, status);
    }

    /// Record the outcome for a property.
    pub fn update_property(&mut self, key: &PropertyKey, status: ObfuscationStatus) {
        self.properties.update(key, status);
    }

    /// Record the outcome for an event.
    pub fn update_event(&mut self, key: &EventKey, status: ObfuscationStatus) {
        self.events.update(key, status);
    }

    /// Record the outcome for a resource entry.
    pub fn add_resource(&mut self, name: &str, status: ObfuscationStatus) {
        self.resources.push((name.to_string(), status));
    }

    /// Current status of a type ([`ObfuscationStatus::Unknown`] when untouched).
    #[must_use]
    pub fn type_status(&self, key: &TypeKey) -> ObfuscationStatus {
        self.types.status(key)
    }

    /// Current status of a method.
    #[must_use]
    pub fn method_status(&self, key: &MethodKey) -> ObfuscationStatus {
        self.methods.status(key)
    }

    /// Current status of a field.
    #[must_use]
    pub fn field_status(&self, key: &FieldKey) -> ObfuscationStatus {
        self.fields.status(key)
    }

    /// Current status of a property.
    #[must_use]
    pub fn property_status(&self, key: &PropertyKey) -> ObfuscationStatus {
        self.properties.status(key)
    }

    /// Current status of an event.
    #[must_use]
    pub fn event_status(&self, key: &EventKey) -> ObfuscationStatus {
        self.events.status(key)
    }

    /// All type entries, first-touch order.
    pub fn types(&self) -> impl Iterator<Item = (&TypeKey, &ObfuscationStatus)> {
        self.types.iter()
    }

    /// All method entries, first-touch order.
    pub fn methods(&self) -> impl Iterator<Item = (&MethodKey, &ObfuscationStatus)> {
        self.methods.iter()
    }

    /// All field entries, first-touch order.
    pub fn fields(&self) -> impl Iterator<Item = (&FieldKey, &ObfuscationStatus)> {
        self.fields.iter()
    }

    /// All property entries, first-touch order.
    pub fn properties(&self) -> impl Iterator<Item = (&PropertyKey, &ObfuscationStatus)> {
        self.properties.iter()
    }

    /// All event entries, first-touch order.
    pub fn events(&self) -> impl Iterator<Item = (&EventKey, &ObfuscationStatus)> {
        self.events.iter()
    }

    /// All resource entries, first-touch order.
    pub fn resources(&self) -> impl Iterator<Item = (&String, &ObfuscationStatus)> {
        self.resources.iter().map(|(n, s)| (n, s))
    }

    /// Total number of symbol entries (resources excluded).
    #[must_use]
    pub fn symbol_count(&self) -> usize {
        self.types.len()
            + self.methods.len()
            + self.fields.len()
            + self.properties.len()
            + self.events.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::ParamSig;

    fn method_key(name: &str) -> MethodKey {
        MethodKey::new(
            TypeKey::new("Lib", "Ns", "Widget"),
            name,
            ParamSig::new(&[], "System.Void"),
        )
    }

    #[test]
    fn test_unknown_until_touched() {
        let map = ObfuscationMap::new();
        assert!(map.method_status(&method_key("Run")).is_unknown());
    }

    #[test]
    fn test_update_replaces_in_place() {
        let mut map = ObfuscationMap::new();
        let key = method_key("Run");
        map.update_method(&key, ObfuscationStatus::WillRename("a".to_string()));
        map.update_method(&key, ObfuscationStatus::Renamed("a".to_string()));

        assert_eq!(
            map.method_status(&key),
            ObfuscationStatus::Renamed("a".to_string())
        );
        assert_eq!(map.methods().count(), 1);
    }

    #[test]
    fn test_iteration_is_first_touch_order() {
        let mut map = ObfuscationMap::new();
        for name in ["C", "A", "B"] {
            map.update_method(&method_key(name), ObfuscationStatus::Unknown);
        }
        let order: Vec<_> = map.methods().map(|(k, _)| k.name.clone()).collect();
        assert_eq!(order, vec!["C", "A", "B"]);
    }
}
