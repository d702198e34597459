//! Identity primitives shared by every core entity.
//!
//! Mirrors `hbflow.utils.IdentifiableObject`: a globally unique id plus a
//! default human-readable name derived from a per-concrete-type sequence
//! counter that never resets and is never shared with other types.

use std::any::type_name;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use once_cell::sync::Lazy;
use uuid::Uuid;

static SEQUENCES: Lazy<DashMap<&'static str, AtomicU64>> = Lazy::new(DashMap::new);

fn short_type_name<T>() -> &'static str {
    let full = type_name::<T>();
    full.rsplit("::").next().unwrap_or(full)
}

fn next_sequence(type_key: &'static str) -> u64 {
    SEQUENCES
        .entry(type_key)
        .or_insert_with(|| AtomicU64::new(0))
        .fetch_add(1, Ordering::Relaxed)
        + 1
}

/// A globally unique id and a default name, assigned once at birth.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: Uuid,
    pub name: String,
}

impl Identity {
    /// Allocate an identity for a `T` instance. `explicit_name`, if given,
    /// wins; otherwise the name is `"<TypeName>_<seq>"`. The sequence
    /// counter always advances, even when an explicit name is supplied —
    /// the counter is a property of instantiation, not of naming.
    pub fn new<T>(explicit_name: Option<String>) -> Self {
        let type_key = short_type_name::<T>();
        let seq = next_sequence(type_key);
        let name = explicit_name.unwrap_or_else(|| format!("{type_key}_{seq}"));
        Self {
            id: Uuid::new_v4(),
            name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Source;
    struct Sink;

    #[test]
    fn default_name_follows_type_and_sequence() {
        let a = Identity::new::<Source>(None);
        let b = Identity::new::<Source>(None);
        assert!(a.name.starts_with("Source_"));
        assert!(b.name.starts_with("Source_"));
        assert_ne!(a.name, b.name, "sequence must advance");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn explicit_name_overrides_default_but_sequence_still_advances() {
        let a = Identity::new::<Sink>(None);
        let named = Identity::new::<Sink>(Some("my-sink".to_string()));
        let b = Identity::new::<Sink>(None);
        assert_eq!(named.name, "my-sink");
        assert!(a.name.starts_with("Sink_"));
        assert!(b.name.starts_with("Sink_"));
        assert_ne!(a.name, b.name);
    }

    #[test]
    fn sequence_counters_are_per_type_not_shared() {
        struct TypeA;
        struct TypeB;
        let a1 = Identity::new::<TypeA>(None);
        let b1 = Identity::new::<TypeB>(None);
        // Both are the first instance of their own type, regardless of
        // how many TypeA/TypeB siblings exist elsewhere in the suite.
        assert!(a1.name.ends_with(&format!("_{}", a1.name.rsplit('_').next().unwrap())));
        assert!(b1.name.starts_with("TypeB_"));
    }
}
