//! Attribute normalization
//!
//! Desired and observed attribute collections are compared in a canonical,
//! order-independent form. The caller's order is kept for what goes on the
//! wire.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use super::model::{AttributeMapping, AttributeSet};
use crate::error::ConfigurationError;
use crate::ssoadmin::api::{WireAttribute, WireAttributeValue, WireConfiguration};

/// Key -> sorted, de-duplicated sources
pub type CanonicalAttributes = BTreeMap<String, BTreeSet<String>>;

/// Validate desired mappings
///
/// Duplicate keys, empty keys, empty source lists and empty source
/// expressions are configuration errors.
pub fn validate(mappings: Vec<AttributeMapping>) -> Result<AttributeSet, ConfigurationError> {
    if mappings.is_empty() {
        return Err(ConfigurationError::NoAttributes);
    }

    let mut seen = HashSet::new();
    for mapping in &mappings {
        if mapping.key.trim().is_empty() {
            return Err(ConfigurationError::EmptyKey);
        }
        if !seen.insert(mapping.key.as_str()) {
            return Err(ConfigurationError::DuplicateKey(mapping.key.clone()));
        }
        if mapping.sources.is_empty() {
            return Err(ConfigurationError::EmptySources {
                key: mapping.key.clone(),
            });
        }
        if mapping.sources.iter().any(|s| s.trim().is_empty()) {
            return Err(ConfigurationError::EmptySource {
                key: mapping.key.clone(),
            });
        }
    }

    Ok(AttributeSet::from_unique(mappings))
}

/// Translate the remote shape, resolving duplicate keys last-write-wins
pub fn from_wire(configuration: &WireConfiguration) -> AttributeSet {
    let mut mappings: Vec<AttributeMapping> = Vec::new();

    for attribute in &configuration.access_control_attributes {
        let mapping = AttributeMapping {
            key: attribute.key.clone(),
            sources: attribute.value.source.clone(),
        };
        match mappings.iter_mut().find(|m| m.key == mapping.key) {
            Some(existing) => *existing = mapping,
            None => mappings.push(mapping),
        }
    }

    AttributeSet::from_unique(mappings)
}

/// Remote shape in caller order
pub fn to_wire(attributes: &AttributeSet) -> WireConfiguration {
    WireConfiguration {
        access_control_attributes: attributes
            .mappings()
            .iter()
            .map(|m| WireAttribute {
                key: m.key.clone(),
                value: WireAttributeValue {
                    source: m.sources.clone(),
                },
            })
            .collect(),
    }
}

pub fn canonical(attributes: &AttributeSet) -> CanonicalAttributes {
    attributes
        .mappings()
        .iter()
        .map(|m| (m.key.clone(), m.sources.iter().cloned().collect()))
        .collect()
}

/// Order-insensitive equality
pub fn equal(a: &AttributeSet, b: &AttributeSet) -> bool {
    a.len() == b.len() && canonical(a) == canonical(b)
}

/// Key-level difference between two attribute sets
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeDiff {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub changed: Vec<String>,
}

impl AttributeDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }
}

/// What changes going from `current` to `desired`
pub fn diff(current: &AttributeSet, desired: &AttributeSet) -> AttributeDiff {
    let current = canonical(current);
    let desired = canonical(desired);
    let mut result = AttributeDiff::default();

    for (key, sources) in &desired {
        match current.get(key) {
            None => result.added.push(key.clone()),
            Some(existing) if existing != sources => result.changed.push(key.clone()),
            Some(_) => {}
        }
    }
    for key in current.keys() {
        if !desired.contains_key(key) {
            result.removed.push(key.clone());
        }
    }

    result
}
