//! Latest-version storage for surface patches.

use hashbrown::HashMap;
use tracing::{debug, warn};

use crate::error::ScanResult;
use crate::patch::{PatchId, SurfacePatch};

/// Patch lifecycle notification from the capture service.
#[derive(Debug, Clone, PartialEq)]
pub enum PatchEvent {
    /// A new patch appeared.
    Added(SurfacePatch),
    /// An existing patch changed.
    Updated(SurfacePatch),
    /// A patch was discarded.
    Removed(PatchId),
}

/// Holds the latest version of each surface patch, keyed by id.
///
/// The store assigns revisions: a patch inserted for the first time gets
/// revision 0 and every replacement increments it. Revisions keep counting
/// across removal, so a patch re-added under a removed id never repeats a
/// revision it had before. Invalid patches are rejected and the previous
/// version is retained.
///
/// # Example
///
/// ```
/// use nalgebra::Point3;
/// use scan_types::{PatchEvent, PatchId, PatchStore, SurfacePatch};
///
/// let mut store = PatchStore::new();
/// let patch = SurfacePatch::new(PatchId(1), vec![Point3::origin()], vec![]);
/// store.apply(PatchEvent::Added(patch.clone()));
/// store.apply(PatchEvent::Updated(patch));
/// assert_eq!(store.get(PatchId(1)).map(|p| p.revision), Some(1));
/// ```
#[derive(Debug, Clone, Default)]
pub struct PatchStore {
    patches: HashMap<PatchId, SurfacePatch>,
    /// Last revision assigned to every id ever stored. Survives removal.
    revisions: HashMap<PatchId, u64>,
}

impl PatchStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies a lifecycle event. Returns true if the store changed.
    pub fn apply(&mut self, event: PatchEvent) -> bool {
        match event {
            PatchEvent::Added(patch) | PatchEvent::Updated(patch) => match self.upsert(patch) {
                Ok(_) => true,
                Err(e) => {
                    warn!(error = %e, "rejected invalid surface patch");
                    false
                }
            },
            PatchEvent::Removed(id) => self.remove(id).is_some(),
        }
    }

    /// Inserts or replaces a patch, assigning its revision.
    ///
    /// Returns the assigned revision.
    ///
    /// # Errors
    ///
    /// Returns the validation error if the patch violates its invariants;
    /// the stored version (if any) is left untouched.
    pub fn upsert(&mut self, mut patch: SurfacePatch) -> ScanResult<u64> {
        patch.validate()?;
        let revision = self
            .revisions
            .get(&patch.id)
            .map_or(0, |last| last.wrapping_add(1));
        self.revisions.insert(patch.id, revision);
        patch.revision = revision;
        debug!(id = %patch.id, revision, vertices = patch.vertex_count(), "stored surface patch");
        self.patches.insert(patch.id, patch);
        Ok(revision)
    }

    /// Removes a patch, returning it if it was present.
    pub fn remove(&mut self, id: PatchId) -> Option<SurfacePatch> {
        let removed = self.patches.remove(&id);
        if removed.is_some() {
            debug!(%id, "removed surface patch");
        }
        removed
    }

    /// Returns the stored patch for `id`.
    #[must_use]
    pub fn get(&self, id: PatchId) -> Option<&SurfacePatch> {
        self.patches.get(&id)
    }

    /// Number of stored patches.
    #[must_use]
    pub fn len(&self) -> usize {
        self.patches.len()
    }

    /// Returns true if no patches are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.patches.is_empty()
    }

    /// Iterates over stored patches in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = &SurfacePatch> {
        self.patches.values()
    }

    /// Copies all patches, sorted by id.
    #[must_use]
    pub fn snapshot(&self) -> Vec<SurfacePatch> {
        let mut patches: Vec<SurfacePatch> = self.patches.values().cloned().collect();
        patches.sort_by_key(|p| p.id);
        patches
    }

    /// Removes every patch. Revision history is kept.
    pub fn clear(&mut self) {
        self.patches.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point3;

    fn patch(id: u128, n: usize) -> SurfacePatch {
        SurfacePatch::new(PatchId(id), vec![Point3::origin(); n], Vec::new())
    }

    #[test]
    fn lifecycle() {
        let mut store = PatchStore::new();
        assert!(store.apply(PatchEvent::Added(patch(1, 3))));
        assert!(store.apply(PatchEvent::Added(patch(2, 3))));
        assert_eq!(store.len(), 2);

        assert!(store.apply(PatchEvent::Updated(patch(1, 5))));
        let stored = store.get(PatchId(1)).unwrap();
        assert_eq!(stored.revision, 1);
        assert_eq!(stored.vertex_count(), 5);

        assert!(store.apply(PatchEvent::Removed(PatchId(2))));
        assert!(!store.apply(PatchEvent::Removed(PatchId(2))));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn invalid_update_keeps_previous() {
        let mut store = PatchStore::new();
        store.apply(PatchEvent::Added(patch(1, 3)));

        let mut bad = patch(1, 3);
        bad.faces.push([0, 1, 9]);
        assert!(!store.apply(PatchEvent::Updated(bad)));

        let stored = store.get(PatchId(1)).unwrap();
        assert_eq!(stored.revision, 0);
        assert!(stored.faces.is_empty());
    }

    #[test]
    fn snapshot_sorted() {
        let mut store = PatchStore::new();
        for id in [5, 1, 3] {
            store.apply(PatchEvent::Added(patch(id, 1)));
        }
        let ids: Vec<u128> = store.snapshot().iter().map(|p| p.id.0).collect();
        assert_eq!(ids, vec![1, 3, 5]);

        store.clear();
        assert!(store.is_empty());
    }

    #[test]
    fn readded_patch_gets_fresh_revision() {
        let mut store = PatchStore::new();
        store.apply(PatchEvent::Added(patch(7, 1)));
        store.apply(PatchEvent::Updated(patch(7, 1)));
        assert!(store.apply(PatchEvent::Removed(PatchId(7))));

        assert_eq!(store.upsert(patch(7, 2)), Ok(2));

        store.clear();
        assert_eq!(store.upsert(patch(7, 2)), Ok(3));
        assert_eq!(store.upsert(patch(8, 2)), Ok(0));
    }
}
