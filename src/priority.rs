//! Priority lanes and the per-lane lookup table used by the classifier, forwarder and statistics.

use crate::packet::PacketKind;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Index, IndexMut};

/// Severity lanes ordered from most to least urgent.
///
/// The forwarder serves lanes in the order of [`Priority::ALL`]; the ordering is stable so lane
/// state can live in plain arrays indexed by [`Priority::index`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    /// Ordered list of all lanes (high → low), also the forwarder's polling order.
    pub const ALL: [Priority; 3] = [Priority::High, Priority::Medium, Priority::Low];

    /// Stable index for lane based arrays.
    pub const fn index(self) -> usize {
        match self {
            Priority::High => 0,
            Priority::Medium => 1,
            Priority::Low => 2,
        }
    }

    /// Lane a packet of the given kind is classified into.
    ///
    /// - `Video` → `High`
    /// - `Audio` → `Medium`
    /// - `Other` → `Low`
    pub const fn for_kind(kind: PacketKind) -> Priority {
        match kind {
            PacketKind::Video => Priority::High,
            PacketKind::Audio => Priority::Medium,
            PacketKind::Other => Priority::Low,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        };
        f.pad(label)
    }
}

/// Helper structure wrapping a value per [`Priority`].
///
/// Serializes as a plain `[high, medium, low]` array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PriorityTable<T> {
    values: [T; 3],
}

impl<T> PriorityTable<T> {
    /// Build a table by executing a closure for each lane, in [`Priority::ALL`] order.
    ///
    /// # Example
    /// ```
    /// use router_sim::priority::{Priority, PriorityTable};
    ///
    /// let capacities = PriorityTable::from_fn(|priority| match priority {
    ///     Priority::High => 2048,
    ///     _ => 1024,
    /// });
    /// assert_eq!(capacities[Priority::Low], 1024);
    /// ```
    pub fn from_fn(mut f: impl FnMut(Priority) -> T) -> Self {
        PriorityTable {
            values: Priority::ALL.map(&mut f),
        }
    }

    /// Borrow the value for a given lane.
    pub fn get(&self, priority: Priority) -> &T {
        &self.values[priority.index()]
    }

    /// Mutably borrow the value for a given lane.
    pub fn get_mut(&mut self, priority: Priority) -> &mut T {
        &mut self.values[priority.index()]
    }

    /// Iterate `(lane, value)` pairs in polling order.
    pub fn iter(&self) -> impl Iterator<Item = (Priority, &T)> {
        Priority::ALL.into_iter().zip(self.values.iter())
    }
}

impl<T> Index<Priority> for PriorityTable<T> {
    type Output = T;

    fn index(&self, index: Priority) -> &Self::Output {
        self.get(index)
    }
}

impl<T> IndexMut<Priority> for PriorityTable<T> {
    fn index_mut(&mut self, index: Priority) -> &mut Self::Output {
        self.get_mut(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_index_is_stable() {
        assert_eq!(Priority::High.index(), 0);
        assert_eq!(Priority::Medium.index(), 1);
        assert_eq!(Priority::Low.index(), 2);
    }

    #[test]
    fn kinds_map_to_lanes() {
        assert_eq!(Priority::for_kind(PacketKind::Video), Priority::High);
        assert_eq!(Priority::for_kind(PacketKind::Audio), Priority::Medium);
        assert_eq!(Priority::for_kind(PacketKind::Other), Priority::Low);
    }

    #[test]
    fn priority_table_builds_and_indexes() {
        let mut table = PriorityTable::from_fn(|p| p.index());
        assert_eq!(table[Priority::High], 0);
        assert_eq!(table[Priority::Low], 2);
        table[Priority::Medium] = 7;
        let collected: Vec<_> = table.iter().map(|(p, v)| (p, *v)).collect();
        assert_eq!(
            collected,
            vec![(Priority::High, 0), (Priority::Medium, 7), (Priority::Low, 2)]
        );
    }

    #[test]
    fn priority_table_serializes_as_plain_array() {
        let table = PriorityTable::from_fn(|p| p.index());
        assert_eq!(serde_json::to_string(&table).unwrap(), "[0,1,2]");
        let parsed: PriorityTable<usize> = serde_json::from_str("[4,5,6]").unwrap();
        assert_eq!(parsed[Priority::Medium], 5);
        assert!(serde_json::from_str::<PriorityTable<usize>>("[1,2]").is_err());
    }
}
