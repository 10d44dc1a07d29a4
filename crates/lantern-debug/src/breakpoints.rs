//! Per-unit breakpoint registry.

use std::collections::{BTreeMap, BTreeSet};

use smol_str::SmolStr;
use tracing::debug;

/// Ordered set of breakpoint lines per source unit.
///
/// Units that were never loaded are accepted; their lines simply never match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BreakpointRegistry {
    units: BTreeMap<SmolStr, BTreeSet<u32>>,
}

impl BreakpointRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a breakpoint. The unit's set is created on first use.
    pub fn add(&mut self, unit: &str, line: u32) {
        let inserted = self.units.entry(unit.into()).or_default().insert(line);
        if inserted {
            debug!(unit, line, "breakpoint added");
        }
    }

    /// Remove a breakpoint; missing entries are ignored.
    pub fn remove(&mut self, unit: &str, line: u32) {
        let Some(lines) = self.units.get_mut(unit) else {
            return;
        };
        if lines.remove(&line) {
            debug!(unit, line, "breakpoint removed");
        }
        if lines.is_empty() {
            self.units.remove(unit);
        }
    }

    /// Flip presence of a breakpoint. Returns whether it is now present.
    pub fn toggle(&mut self, unit: &str, line: u32) -> bool {
        if self.contains(unit, line) {
            self.remove(unit, line);
            false
        } else {
            self.add(unit, line);
            true
        }
    }

    #[must_use]
    pub fn contains(&self, unit: &str, line: u32) -> bool {
        self.units
            .get(unit)
            .is_some_and(|lines| lines.contains(&line))
    }

    /// Lines for a unit, sorted ascending.
    #[must_use]
    pub fn lines_for(&self, unit: &str) -> BTreeSet<u32> {
        self.units.get(unit).cloned().unwrap_or_default()
    }

    /// Drop every breakpoint of a unit.
    pub fn clear_unit(&mut self, unit: &str) {
        self.units.remove(unit);
    }

    pub fn clear(&mut self) {
        self.units.clear();
    }

    /// Units that currently hold at least one breakpoint.
    pub fn units(&self) -> impl Iterator<Item = &SmolStr> {
        self.units.keys()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.units.values().map(BTreeSet::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggle_parity_decides_presence() {
        let mut registry = BreakpointRegistry::new();
        for count in 1..=6 {
            registry.toggle("a.ls", 5);
            assert_eq!(registry.contains("a.ls", 5), count % 2 == 1, "after {count} toggles");
        }
        assert!(registry.is_empty());
    }

    #[test]
    fn remove_missing_entry_is_noop() {
        let mut registry = BreakpointRegistry::new();
        registry.remove("a.ls", 1);
        registry.add("a.ls", 3);
        registry.remove("a.ls", 4);
        registry.remove("b.ls", 3);
        assert_eq!(registry.lines_for("a.ls").into_iter().collect::<Vec<_>>(), vec![3]);
    }

    #[test]
    fn lines_are_sorted_and_unique() {
        let mut registry = BreakpointRegistry::new();
        for line in [9, 2, 9, 5] {
            registry.add("a.ls", line);
        }
        assert_eq!(
            registry.lines_for("a.ls").into_iter().collect::<Vec<_>>(),
            vec![2, 5, 9]
        );
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn unknown_units_are_kept() {
        let mut registry = BreakpointRegistry::new();
        registry.add("/never/loaded.ls", 42);
        assert!(registry.contains("/never/loaded.ls", 42));
        registry.clear_unit("/never/loaded.ls");
        assert!(!registry.contains("/never/loaded.ls", 42));
    }
}
