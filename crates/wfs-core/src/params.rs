//! Parameter store interface consumed by the core (§6, §9).
//!
//! The GUI/project-file/network layers own the real parameter tree; this
//! crate only needs read-only typed accessors keyed by `(section, attribute)`
//! plus a per-section version counter. Per §9's design note, dirty detection
//! is a version-compare, not a per-field listener list — the hierarchical
//! mutable tree with listener callbacks in the original implementation
//! (`original_source::WfsValueTreeState`) is replaced here by a plain
//! struct-of-arrays with an `AtomicU64` version per section.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

/// Which logical section of the parameter space an attribute lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Section {
    Input(usize),
    Output(usize),
    Config,
    Binaural,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Float(f64),
    Int(i64),
    Bool(bool),
    Text(String),
}

impl ParamValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Float(v) => Some(*v),
            ParamValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ParamValue::Int(v) => Some(*v),
            ParamValue::Float(v) => Some(*v as i64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Text(v) => Some(v),
            _ => None,
        }
    }
}

/// Read-only accessor the control thread consumes each tick.
///
/// A change-notification hook (`onChanged(section, attribute)` in the
/// external system) is how the real store drives dirty flags; all that this
/// trait needs from it is the resulting version bump, so `section_version`
/// is the only thing a caller polls.
pub trait ParameterStore: Send + Sync {
    fn get(&self, section: Section, attribute: &str) -> Option<ParamValue>;
    fn get_f64(&self, section: Section, attribute: &str, default: f64) -> f64 {
        self.get(section, attribute).and_then(|v| v.as_f64()).unwrap_or(default)
    }
    fn get_i64(&self, section: Section, attribute: &str, default: i64) -> i64 {
        self.get(section, attribute).and_then(|v| v.as_i64()).unwrap_or(default)
    }
    fn get_bool(&self, section: Section, attribute: &str, default: bool) -> bool {
        self.get(section, attribute).and_then(|v| v.as_bool()).unwrap_or(default)
    }

    /// Monotonically increasing version for the given section. The
    /// calculation engine's dirty flag is `last_seen_version != section_version()`.
    fn section_version(&self, section: Section) -> u64;
}

/// Simple in-process struct-of-arrays parameter store, suitable both for
/// tests and as the default backing when no external store is supplied.
#[derive(Default)]
pub struct InMemoryParameterStore {
    sections: RwLock<HashMap<Section, HashMap<String, ParamValue>>>,
    versions: RwLock<HashMap<Section, AtomicU64>>,
}

impl InMemoryParameterStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, section: Section, attribute: &str, value: ParamValue) {
        self.sections
            .write()
            .entry(section)
            .or_default()
            .insert(attribute.to_string(), value.clone());
        let version = self
            .versions
            .write()
            .entry(section)
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(1, Ordering::Release)
            + 1;
        log::trace!("{section:?}.{attribute} set to {value:?}, section now at version {version}");
    }
}

impl ParameterStore for InMemoryParameterStore {
    fn get(&self, section: Section, attribute: &str) -> Option<ParamValue> {
        self.sections.read().get(&section)?.get(attribute).cloned()
    }

    fn section_version(&self, section: Section) -> u64 {
        self.versions
            .read()
            .get(&section)
            .map(|v| v.load(Ordering::Acquire))
            .unwrap_or(0)
    }
}

/// Tracks whether a consumer has observed the latest version of a section.
#[derive(Debug, Default)]
pub struct DirtyTracker {
    last_seen: AtomicU64,
}

impl DirtyTracker {
    pub fn new() -> Self {
        Self { last_seen: AtomicU64::new(u64::MAX) }
    }

    /// Returns true (and advances the watermark) if `current_version` is newer
    /// than what this tracker last observed.
    pub fn poll(&self, current_version: u64) -> bool {
        let last = self.last_seen.swap(current_version, Ordering::AcqRel);
        last != current_version
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_bumps_on_every_set() {
        let store = InMemoryParameterStore::new();
        assert_eq!(store.section_version(Section::Input(0)), 0);
        store.set(Section::Input(0), "targetX", ParamValue::Float(1.0));
        assert_eq!(store.section_version(Section::Input(0)), 1);
        store.set(Section::Input(0), "targetY", ParamValue::Float(2.0));
        assert_eq!(store.section_version(Section::Input(0)), 2);
    }

    #[test]
    fn dirty_tracker_detects_change_once() {
        let tracker = DirtyTracker::new();
        assert!(tracker.poll(1));
        assert!(!tracker.poll(1));
        assert!(tracker.poll(2));
    }
}
