// src/services/ordering.rs

//! Position planning for sibling sets (questions of an exam, options of a
//! question).
//!
//! Every plan is computed against a locked snapshot of the siblings and
//! returns the rows whose position changes. Applying a plan to a contiguous
//! set `{1..n}` leaves a contiguous set again.

/// A sibling as seen in the locked snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub id: i64,
    pub position: i32,
}

/// New position for an existing row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reposition {
    pub id: i64,
    pub position: i32,
}

/// Where a new or arriving child lands, and what moves to make room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    pub position: i32,
    pub shifts: Vec<Reposition>,
}

/// Missing, zero or negative requested positions mean "first".
pub fn normalize_position(requested: Option<i32>) -> i32 {
    requested.filter(|p| *p > 0).unwrap_or(1)
}

fn clamp(requested: i32, upper: usize) -> i32 {
    let upper = i32::try_from(upper).unwrap_or(i32::MAX).max(1);
    requested.clamp(1, upper)
}

/// Snapshot of all children of one parent, ordered by position.
#[derive(Debug, Clone, Default)]
pub struct SiblingSet {
    slots: Vec<Slot>,
}

impl SiblingSet {
    pub fn new(mut slots: Vec<Slot>) -> Self {
        slots.sort_by_key(|s| (s.position, s.id));
        Self { slots }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn position_of(&self, id: i64) -> Option<i32> {
        self.slots.iter().find(|s| s.id == id).map(|s| s.position)
    }

    /// Places a new child at `requested`, capped to "append".
    /// Every sibling at or after the target moves up by one.
    pub fn insert(&self, requested: i32) -> Placement {
        let position = clamp(requested, self.slots.len() + 1);
        let shifts = self
            .slots
            .iter()
            .filter(|s| s.position >= position)
            .map(|s| Reposition {
                id: s.id,
                position: s.position + 1,
            })
            .collect();
        Placement { position, shifts }
    }

    /// Moves `id` to `requested` within this set by swapping it with the
    /// sibling currently holding the target slot. Siblings in between keep
    /// their positions.
    ///
    /// Returns `None` when `id` is not part of the set.
    pub fn swap(&self, id: i64, requested: i32) -> Option<Vec<Reposition>> {
        let current = self.position_of(id)?;
        let target = clamp(requested, self.slots.len());
        if target == current {
            return Some(Vec::new());
        }

        let mut moves = Vec::with_capacity(2);
        if let Some(occupant) = self
            .slots
            .iter()
            .find(|s| s.position == target && s.id != id)
        {
            moves.push(Reposition {
                id: occupant.id,
                position: current,
            });
        }
        moves.push(Reposition {
            id,
            position: target,
        });
        Some(moves)
    }

    /// Closes the gap left by `id` leaving the set, either deleted or moved to
    /// another parent. Every later sibling moves down by one.
    ///
    /// Returns `None` when `id` is not part of the set.
    pub fn detach(&self, id: i64) -> Option<Vec<Reposition>> {
        let old = self.position_of(id)?;
        Some(
            self.slots
                .iter()
                .filter(|s| s.position > old)
                .map(|s| Reposition {
                    id: s.id,
                    position: s.position - 1,
                })
                .collect(),
        )
    }
}
