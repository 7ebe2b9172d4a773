//! Props canonicalization and fingerprinting.
//!
//! A fingerprint only answers "did this node's own props change". It never
//! covers descendants, so the engine recurses into children regardless.
use crate::props::{PropValue, Props};
use serde::Serialize;
use std::collections::BTreeSet;
use std::hash::{DefaultHasher, Hash, Hasher};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Fingerprint(pub u64);

/// Ordered, hashable form of a prop value. Maps become key-sorted pairs,
/// lists and object tuples become sequences.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Canonical {
    Null,
    Bool(bool),
    Int(i64),
    Float(u64),
    Str(String),
    Seq(Vec<Canonical>),
    Map(Vec<(String, Canonical)>),
    /// String fallback for objects without a canonical tuple.
    Opaque(String),
}

// i64::MIN as f64 is exact; i64::MAX as f64 rounds up to 2^63
const I64_RANGE: std::ops::Range<f64> = -9_223_372_036_854_775_808.0..9_223_372_036_854_775_808.0;

/// Integral floats canonicalize as ints (`1.0 == 1`, `-0.0 == 0`).
fn canonical_float(f: f64) -> Canonical {
    if f.is_nan() {
        Canonical::Float(f64::NAN.to_bits())
    } else if f.fract() == 0.0 && I64_RANGE.contains(&f) {
        Canonical::Int(f as i64)
    } else {
        Canonical::Float(f.to_bits())
    }
}

fn canonical_map<'a>(entries: impl Iterator<Item = (&'a String, &'a PropValue)>) -> Canonical {
    let mut pairs: Vec<(String, Canonical)> = entries
        .map(|(k, v)| (k.clone(), canonical_value(v)))
        .collect();
    pairs.sort_by(|a, b| a.0.cmp(&b.0));
    Canonical::Map(pairs)
}

pub fn canonical_value(value: &PropValue) -> Canonical {
    match value {
        PropValue::Null => Canonical::Null,
        PropValue::Bool(b) => Canonical::Bool(*b),
        PropValue::Int(i) => Canonical::Int(*i),
        PropValue::Float(f) => canonical_float(*f),
        PropValue::Str(s) => Canonical::Str(s.clone()),
        PropValue::List(items) => Canonical::Seq(items.iter().map(canonical_value).collect()),
        PropValue::Map(map) => canonical_map(map.iter()),
        PropValue::Object(obj) => match obj.canonical_tuple() {
            Some(items) => Canonical::Seq(items.iter().map(canonical_value).collect()),
            None => Canonical::Opaque(obj.to_string()),
        },
    }
}

pub fn canonicalize(props: &Props) -> Canonical {
    canonical_map(props.iter())
}

impl Canonical {
    /// Whether a string fallback was taken anywhere inside.
    pub fn is_lossy(&self) -> bool {
        match self {
            Canonical::Opaque(_) => true,
            Canonical::Seq(items) => items.iter().any(Canonical::is_lossy),
            Canonical::Map(pairs) => pairs.iter().any(|(_, v)| v.is_lossy()),
            _ => false,
        }
    }
}

/// Fingerprint of a node's own props. Logs one warning per call when some
/// props could only be compared through their string form.
pub fn fingerprint(props: &Props) -> Fingerprint {
    let canonical = canonicalize(props);
    if let Canonical::Map(pairs) = &canonical {
        let lossy: Vec<&str> = pairs
            .iter()
            .filter(|(_, v)| v.is_lossy())
            .map(|(k, _)| k.as_str())
            .collect();
        if !lossy.is_empty() {
            log::warn!(
                "Fingerprint: props {:?} hold objects without a canonical tuple, comparing their string form",
                lossy
            );
        }
    }

    let mut hasher = DefaultHasher::new();
    canonical.hash(&mut hasher);
    Fingerprint(hasher.finish())
}

/// Sorted keys whose canonical values differ, including keys present on one side only.
pub fn changed_keys(old: &Props, new: &Props) -> Vec<String> {
    let all_keys: BTreeSet<&String> = old.keys().chain(new.keys()).collect();
    all_keys
        .into_iter()
        .filter(|key| {
            old.get(*key).map(canonical_value) != new.get(*key).map(canonical_value)
        })
        .cloned()
        .collect()
}
