//! # Policy Registry
//!
//! Resolves policy keys to policies. Backed by a `BTreeMap` so listing order
//! is deterministic.

use std::collections::BTreeMap;

use dsc_core::PolicyKey;

use crate::model::Policy;
use crate::templates::standard_policies;

/// Keyed collection of policies.
#[derive(Debug, Clone, Default)]
pub struct PolicyRegistry {
    policies: BTreeMap<PolicyKey, Policy>,
}

impl PolicyRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry pre-loaded with the standard templates.
    pub fn standard() -> Self {
        Self {
            policies: standard_policies().into_iter().collect(),
        }
    }

    /// Register a policy. Replaces and returns any policy under the same key.
    pub fn register(&mut self, key: PolicyKey, policy: Policy) -> Option<Policy> {
        self.policies.insert(key, policy)
    }

    pub fn get(&self, key: &PolicyKey) -> Option<&Policy> {
        self.policies.get(key)
    }

    /// All policies in key order.
    pub fn list(&self) -> impl Iterator<Item = (&PolicyKey, &Policy)> {
        self.policies.iter()
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }
}
