use std::collections::VecDeque;

use crate::canvas::MaskSnapshot;
use crate::components::tools::ToolMode;

#[cfg(test)]
#[path = "history_test.rs"]
mod history_test;

/// One committed mask state plus the tool that produced it.
#[derive(Clone)]
pub struct HistoryEntry {
    pub snapshot: MaskSnapshot,
    pub tool: ToolMode,
    /// Bytes this entry holds beyond its predecessor (chunk sharing aware).
    memory: usize,
}

impl HistoryEntry {
    pub fn description(&self) -> &'static str {
        self.tool.label()
    }
}

// ============================================================================
// HISTORY MANAGER — linear snapshot log with a current index
// ============================================================================

/// Linear undo/redo over full mask snapshots.
///
/// Once reset, there is always at least one entry and `index` points at the
/// state the mask currently shows.  `can_undo ⇔ index > 0` and
/// `can_redo ⇔ index < len - 1`.  Committing after an undo drops everything
/// past `index`.
///
/// Snapshots share unchanged 64×64 chunks with each other, so the memory cap
/// counts only the chunks each entry does not share with the one before it.
pub struct HistoryManager {
    entries: VecDeque<HistoryEntry>,
    index: usize,
    /// Maximum number of undo steps (entries beyond the current one).
    max_undo_steps: usize,
    max_memory_bytes: Option<usize>,
    total_memory: usize,
}

impl Default for HistoryManager {
    fn default() -> Self {
        Self::new(50, Some(256 * 1024 * 1024))
    }
}

impl HistoryManager {
    pub fn new(max_undo_steps: usize, max_memory_bytes: Option<usize>) -> Self {
        Self {
            entries: VecDeque::new(),
            index: 0,
            max_undo_steps: max_undo_steps.max(1),
            max_memory_bytes,
            total_memory: 0,
        }
    }

    /// Start over with `initial` as the only entry (image load).
    pub fn reset(&mut self, initial: MaskSnapshot, tool: ToolMode) {
        self.clear();
        let memory = initial.memory_bytes();
        self.total_memory = memory;
        self.entries.push_back(HistoryEntry { snapshot: initial, tool, memory });
    }

    /// Record a new state.  Any redo branch is discarded.
    pub fn commit(&mut self, snapshot: MaskSnapshot, tool: ToolMode) {
        if self.entries.is_empty() {
            self.reset(snapshot, tool);
            return;
        }

        // Drop the redo branch.
        while self.entries.len() > self.index + 1 {
            if let Some(removed) = self.entries.pop_back() {
                self.total_memory = self.total_memory.saturating_sub(removed.memory);
            }
        }

        let memory = match self.entries.back() {
            Some(prev) => snapshot.unshared_bytes(&prev.snapshot),
            None => snapshot.memory_bytes(),
        };
        self.total_memory += memory;
        self.entries.push_back(HistoryEntry { snapshot, tool, memory });
        self.index = self.entries.len() - 1;

        self.prune();
    }

    /// Step back; returns the snapshot to restore.
    pub fn undo(&mut self) -> Option<&MaskSnapshot> {
        if !self.can_undo() {
            return None;
        }
        self.index -= 1;
        self.entries.get(self.index).map(|e| &e.snapshot)
    }

    pub fn redo(&mut self) -> Option<&MaskSnapshot> {
        if !self.can_redo() {
            return None;
        }
        self.index += 1;
        self.entries.get(self.index).map(|e| &e.snapshot)
    }

    /// Jump to position `index` of [`HistoryManager::undo_history`].  Returns
    /// `None` when out of range or already there.
    pub fn jump_to(&mut self, index: usize) -> Option<&MaskSnapshot> {
        if index >= self.entries.len() || index == self.index {
            return None;
        }
        self.index = index;
        self.entries.get(index).map(|e| &e.snapshot)
    }

    pub fn can_undo(&self) -> bool {
        self.index > 0
    }

    pub fn can_redo(&self) -> bool {
        self.index + 1 < self.entries.len()
    }

    pub fn current_index(&self) -> usize {
        self.index
    }

    pub fn current(&self) -> Option<&HistoryEntry> {
        self.entries.get(self.index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry descriptions, oldest first.
    pub fn undo_history(&self) -> Vec<&'static str> {
        self.entries.iter().map(HistoryEntry::description).collect()
    }

    /// Approximate bytes held by the history (O(1) via cached total).
    pub fn memory_usage(&self) -> usize {
        self.total_memory
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.index = 0;
        self.total_memory = 0;
    }

    /// Drop the oldest entries to stay within limits.  The current entry is
    /// never dropped.
    fn prune(&mut self) {
        while self.entries.len() > self.max_undo_steps + 1 && self.index > 0 {
            self.pop_oldest();
        }

        if let Some(max_bytes) = self.max_memory_bytes {
            while self.total_memory > max_bytes && self.index > 0 {
                self.pop_oldest();
            }
        }
    }

    fn pop_oldest(&mut self) {
        if let Some(removed) = self.entries.pop_front() {
            self.total_memory = self.total_memory.saturating_sub(removed.memory);
            self.index = self.index.saturating_sub(1);
        }
        // The new front no longer has a predecessor to share with.
        if let Some(front) = self.entries.front_mut() {
            let full = front.snapshot.memory_bytes();
            self.total_memory = self.total_memory.saturating_sub(front.memory) + full;
            front.memory = full;
        }
    }
}
