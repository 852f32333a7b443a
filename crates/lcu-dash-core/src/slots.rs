// Champion ban/pick slot lists.

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotKind {
    Ban,
    Pick,
}

impl SlotKind {
    /// Persistence key for this list.
    pub fn storage_key(self) -> &'static str {
        match self {
            SlotKind::Ban => "lcu_ui_ban_champions",
            SlotKind::Pick => "lcu_ui_pick_champions",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SlotError {
    #[error("slot {index} out of range (list has {len} slots)")]
    OutOfRange { index: usize, len: usize },
}

/// Ordered champion-id-or-empty slots. A fresh list is a single empty slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChampionSlots {
    slots: Vec<Option<u32>>,
}

impl Default for ChampionSlots {
    fn default() -> Self {
        Self { slots: vec![None] }
    }
}

impl ChampionSlots {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from persisted ids: the ids in order plus one trailing empty
    /// slot. An empty id list gives the default single empty slot.
    pub fn restore(ids: &[u32]) -> Self {
        let mut slots: Vec<Option<u32>> = ids.iter().copied().map(Some).collect();
        slots.push(None);
        Self { slots }
    }

    pub fn as_slice(&self) -> &[Option<u32>] {
        &self.slots
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Always appends exactly one empty slot, even after other empties.
    pub fn add_slot(&mut self) {
        self.slots.push(None);
    }

    pub fn set(&mut self, index: usize, champion: Option<u32>) -> Result<(), SlotError> {
        let len = self.slots.len();
        let slot = self
            .slots
            .get_mut(index)
            .ok_or(SlotError::OutOfRange { index, len })?;
        *slot = champion;
        Ok(())
    }

    /// Remove a slot; the list never drops below one slot.
    pub fn remove(&mut self, index: usize) -> Result<(), SlotError> {
        let len = self.slots.len();
        if index >= len {
            return Err(SlotError::OutOfRange { index, len });
        }
        self.slots.remove(index);
        if self.slots.is_empty() {
            self.slots.push(None);
        }
        Ok(())
    }

    /// The first slot's champion, `None` when the first slot is empty.
    pub fn first(&self) -> Option<u32> {
        self.slots.first().copied().flatten()
    }

    /// Non-empty ids in slot order.
    pub fn candidates(&self) -> Vec<u32> {
        self.slots.iter().copied().flatten().collect()
    }
}
