use serde::{Deserialize, Serialize};

use crate::error::QueueError;

/// Ordered list of recording ids to train on
///
/// Ids are not checked against the recording store; dangling entries are
/// skipped at playback time. Duplicates are allowed unless added through
/// `append_unique`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrainingQueue {
    ids: Vec<String>,
}

impl TrainingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_ids(ids: Vec<String>) -> Self {
        Self { ids }
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    /// Copy of the current order, as handed to the scheduler at start
    pub fn snapshot(&self) -> Vec<String> {
        self.ids.clone()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn append(&mut self, id: impl Into<String>) {
        self.ids.push(id.into());
    }

    /// Append unless already queued. Returns whether the id was added.
    pub fn append_unique(&mut self, id: impl Into<String>) -> bool {
        let id = id.into();
        if self.ids.contains(&id) {
            return false;
        }
        self.ids.push(id);
        true
    }

    pub fn remove_at(&mut self, index: usize) -> Result<String, QueueError> {
        self.check(index)?;
        Ok(self.ids.remove(index))
    }

    /// Move the item at `index` so it sits directly before the item now at `target`
    pub fn move_before(&mut self, index: usize, target: usize) -> Result<(), QueueError> {
        self.check(index)?;
        self.check(target)?;

        if index == target {
            return Ok(());
        }

        let id = self.ids.remove(index);
        let target = if index < target { target - 1 } else { target };
        self.ids.insert(target, id);
        Ok(())
    }

    /// Move the item at `index` so it sits directly after the item now at `target`
    pub fn move_after(&mut self, index: usize, target: usize) -> Result<(), QueueError> {
        self.check(index)?;
        self.check(target)?;

        if index == target {
            return Ok(());
        }

        let id = self.ids.remove(index);
        let target = if index < target { target - 1 } else { target };
        self.ids.insert(target + 1, id);
        Ok(())
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    /// Drop ids not present in `existing`. Returns how many were removed.
    pub fn prune(&mut self, existing: &[String]) -> usize {
        let before = self.ids.len();
        self.ids.retain(|id| existing.contains(id));
        before - self.ids.len()
    }

    fn check(&self, index: usize) -> Result<(), QueueError> {
        if index < self.ids.len() {
            Ok(())
        } else {
            Err(QueueError::IndexOutOfRange {
                index,
                len: self.ids.len(),
            })
        }
    }
}
