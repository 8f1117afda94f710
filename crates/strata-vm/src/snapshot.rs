//! Composite snapshots over independently journaled components.
//!
//! Every component keeps its own snapshot ids. The controller asks each
//! registered component for an id and bundles them, keyed by the component's
//! registry key, into an opaque `CompositeSnapshot`. Reverting hands every
//! component back its own id, so components never depend on each other's
//! revert order.

use std::collections::BTreeMap;

use tracing::trace;

use crate::error::VmError;

/// A component whose mutations can be checkpointed and rolled back.
pub trait Controllable {
    /// Stable name used to key this component inside a composite snapshot.
    fn registry_key(&self) -> &'static str;

    /// Take a snapshot and return its id.
    fn snapshot(&mut self) -> usize;

    /// Discard every mutation made after `id` was taken.
    fn revert_to_snapshot(&mut self, id: usize);

    /// Commit the journal after a transaction completes.
    fn finalize(&mut self);
}

/// Per-component snapshot ids taken at one instant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompositeSnapshot {
    ids: BTreeMap<&'static str, usize>,
}

impl CompositeSnapshot {
    /// Id recorded for a component, if it was registered at snapshot time.
    pub fn id_of(&self, key: &str) -> Option<usize> {
        self.ids.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Drives snapshot, revert and finalize across a set of components.
#[derive(Default)]
pub struct Controller<'a> {
    components: BTreeMap<&'static str, &'a mut dyn Controllable>,
}

impl<'a> Controller<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a component.
    ///
    /// # Errors
    /// Returns `DuplicateComponent` if another component already uses the key.
    pub fn register(&mut self, component: &'a mut dyn Controllable) -> Result<(), VmError> {
        let key = component.registry_key();
        if self.components.contains_key(key) {
            return Err(VmError::DuplicateComponent(key.to_string()));
        }
        self.components.insert(key, component);
        Ok(())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.components.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Snapshot every registered component.
    pub fn snapshot(&mut self) -> CompositeSnapshot {
        let ids = self
            .components
            .iter_mut()
            .map(|(key, component)| (*key, component.snapshot()))
            .collect();
        let snapshot = CompositeSnapshot { ids };
        trace!(?snapshot, "Took composite snapshot");
        snapshot
    }

    /// Revert every component recorded in `snapshot`.
    ///
    /// # Errors
    /// Returns `UnknownSnapshotComponent` if the snapshot names a component
    /// that is not registered; no component is reverted in that case.
    pub fn revert_to_snapshot(&mut self, snapshot: &CompositeSnapshot) -> Result<(), VmError> {
        if let Some(missing) = snapshot.ids.keys().find(|k| !self.components.contains_key(*k)) {
            return Err(VmError::UnknownSnapshotComponent(missing.to_string()));
        }
        for (key, id) in &snapshot.ids {
            if let Some(component) = self.components.get_mut(key) {
                component.revert_to_snapshot(*id);
            }
        }
        trace!(?snapshot, "Reverted to composite snapshot");
        Ok(())
    }

    /// Finalize every registered component.
    pub fn finalize(&mut self) {
        for component in self.components.values_mut() {
            component.finalize();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A counter that journals every value it has held.
    struct Counter {
        key: &'static str,
        history: Vec<u64>,
        finalized: bool,
    }

    impl Counter {
        fn new(key: &'static str) -> Self {
            Self { key, history: vec![0], finalized: false }
        }

        fn bump(&mut self) {
            let next = self.value() + 1;
            self.history.push(next);
        }

        fn value(&self) -> u64 {
            self.history.last().copied().unwrap_or(0)
        }
    }

    impl Controllable for Counter {
        fn registry_key(&self) -> &'static str {
            self.key
        }

        fn snapshot(&mut self) -> usize {
            self.history.len()
        }

        fn revert_to_snapshot(&mut self, id: usize) {
            self.history.truncate(id);
        }

        fn finalize(&mut self) {
            let value = self.value();
            self.history = vec![value];
            self.finalized = true;
        }
    }

    #[test]
    fn test_duplicate_registration() {
        let mut a = Counter::new("a");
        let mut b = Counter::new("a");
        let mut ctrl = Controller::new();
        ctrl.register(&mut a).unwrap();
        assert_eq!(
            ctrl.register(&mut b),
            Err(VmError::DuplicateComponent("a".to_string()))
        );
    }

    #[test]
    fn test_revert_restores_every_component() {
        let mut a = Counter::new("a");
        let mut b = Counter::new("b");
        a.bump();

        let snap = {
            let mut ctrl = Controller::new();
            ctrl.register(&mut a).unwrap();
            ctrl.register(&mut b).unwrap();
            ctrl.snapshot()
        };
        assert_eq!(snap.len(), 2);

        a.bump();
        b.bump();
        b.bump();

        let mut ctrl = Controller::new();
        ctrl.register(&mut b).unwrap();
        ctrl.register(&mut a).unwrap();
        ctrl.revert_to_snapshot(&snap).unwrap();
        drop(ctrl);

        assert_eq!(a.value(), 1);
        assert_eq!(b.value(), 0);
    }

    #[test]
    fn test_nested_snapshots_discard_later_work() {
        let mut a = Counter::new("a");
        let mut ctrl = Controller::new();
        ctrl.register(&mut a).unwrap();
        let outer = ctrl.snapshot();
        drop(ctrl);

        a.bump();
        let mut ctrl = Controller::new();
        ctrl.register(&mut a).unwrap();
        let inner = ctrl.snapshot();
        drop(ctrl);
        a.bump();

        let mut ctrl = Controller::new();
        ctrl.register(&mut a).unwrap();
        ctrl.revert_to_snapshot(&inner).unwrap();
        ctrl.revert_to_snapshot(&outer).unwrap();
        drop(ctrl);
        assert_eq!(a.value(), 0);
    }

    #[test]
    fn test_unknown_component() {
        let mut a = Counter::new("a");
        let mut b = Counter::new("b");
        let snap = {
            let mut ctrl = Controller::new();
            ctrl.register(&mut a).unwrap();
            ctrl.register(&mut b).unwrap();
            ctrl.snapshot()
        };
        a.bump();
        let mut ctrl = Controller::new();
        ctrl.register(&mut a).unwrap();
        assert_eq!(
            ctrl.revert_to_snapshot(&snap),
            Err(VmError::UnknownSnapshotComponent("b".to_string()))
        );
        drop(ctrl);
        assert_eq!(a.value(), 1);
    }

    #[test]
    fn test_finalize_all() {
        let mut a = Counter::new("a");
        let mut b = Counter::new("b");
        let mut ctrl = Controller::new();
        ctrl.register(&mut a).unwrap();
        ctrl.register(&mut b).unwrap();
        ctrl.finalize();
        drop(ctrl);
        assert!(a.finalized && b.finalized);
    }
}
