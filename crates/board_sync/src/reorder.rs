//! Pure reassignment of item ids across the ordered groups of a board.
//!
//! Nothing here touches the network or shared state: every function takes a
//! slice of groups and returns a new vector, leaving the input untouched on
//! error.

use std::collections::{btree_map::Entry, BTreeMap};

use shared::domain::{Group, GroupId, GroupPosition, ItemId, MoveRequest};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReorderError {
    #[error("unknown group {0}")]
    UnknownGroup(GroupId),
    #[error("source index {index} out of range for group {group_id} of length {len}")]
    SourceIndexOutOfRange {
        group_id: GroupId,
        index: usize,
        len: usize,
    },
    #[error("destination index {index} out of range for group {group_id} of length {len}")]
    DestinationIndexOutOfRange {
        group_id: GroupId,
        index: usize,
        len: usize,
    },
    #[error("item {0} appears more than once")]
    DuplicateItem(ItemId),
}

fn find_group(groups: &[Group], group_id: GroupId) -> Result<&Group, ReorderError> {
    groups
        .iter()
        .find(|g| g.group_id == group_id)
        .ok_or(ReorderError::UnknownGroup(group_id))
}

/// Checks the move against the current groups without applying it.
/// Returns the id of the item that would move.
pub fn validate(groups: &[Group], mv: &MoveRequest) -> Result<ItemId, ReorderError> {
    let source = find_group(groups, mv.source.group_id)?;
    let destination = find_group(groups, mv.destination.group_id)?;

    let item_id = source.item_ids.get(mv.source.index).copied().ok_or(
        ReorderError::SourceIndexOutOfRange {
            group_id: source.group_id,
            index: mv.source.index,
            len: source.item_ids.len(),
        },
    )?;

    if mv.destination.index > destination.item_ids.len() {
        return Err(ReorderError::DestinationIndexOutOfRange {
            group_id: destination.group_id,
            index: mv.destination.index,
            len: destination.item_ids.len(),
        });
    }

    Ok(item_id)
}

/// Moves one item from `mv.source` to `mv.destination`.
///
/// Within a single group the removal happens first and the destination index
/// is applied to the shortened sequence, so `[1, 2, 3]` moving index 0 to
/// index 2 yields `[2, 3, 1]`. A destination equal to the current length
/// appends. Across groups the two sequences are independent and no index
/// adjustment is made. Groups not named by the move are returned as-is.
pub fn reorder(groups: &[Group], mv: &MoveRequest) -> Result<Vec<Group>, ReorderError> {
    let item_id = validate(groups, mv)?;

    let result = groups
        .iter()
        .map(|group| {
            let is_source = group.group_id == mv.source.group_id;
            let is_destination = group.group_id == mv.destination.group_id;
            if !is_source && !is_destination {
                return group.clone();
            }

            let mut item_ids = group.item_ids.clone();
            if is_source {
                item_ids.remove(mv.source.index);
            }
            if is_destination {
                let at = mv.destination.index.min(item_ids.len());
                item_ids.insert(at, item_id);
            }
            Group {
                item_ids,
                ..group.clone()
            }
        })
        .collect();

    Ok(result)
}

/// Applies a drop gesture. A drop outside any group has no destination and
/// leaves the groups unchanged.
pub fn apply_drop(
    groups: &[Group],
    source: GroupPosition,
    destination: Option<GroupPosition>,
) -> Result<Vec<Group>, ReorderError> {
    match destination {
        Some(destination) => reorder(groups, &MoveRequest::new(source, destination)),
        None => Ok(groups.to_vec()),
    }
}

/// Adds a new item id at the end of `group_id`.
pub fn append_item(
    groups: &[Group],
    group_id: GroupId,
    item_id: ItemId,
) -> Result<Vec<Group>, ReorderError> {
    find_group(groups, group_id)?;
    if groups.iter().any(|g| g.item_ids.contains(&item_id)) {
        return Err(ReorderError::DuplicateItem(item_id));
    }

    Ok(groups
        .iter()
        .map(|group| {
            if group.group_id != group_id {
                return group.clone();
            }
            let mut item_ids = group.item_ids.clone();
            item_ids.push(item_id);
            Group {
                item_ids,
                ..group.clone()
            }
        })
        .collect())
}

/// Strips `item_id` from every group. Absent ids are a no-op.
pub fn remove_item(groups: &[Group], item_id: ItemId) -> Vec<Group> {
    groups
        .iter()
        .map(|group| Group {
            item_ids: group
                .item_ids
                .iter()
                .copied()
                .filter(|id| *id != item_id)
                .collect(),
            ..group.clone()
        })
        .collect()
}

/// Which group each item currently belongs to.
pub fn membership(groups: &[Group]) -> BTreeMap<ItemId, GroupId> {
    groups
        .iter()
        .flat_map(|g| g.item_ids.iter().map(move |id| (*id, g.group_id)))
        .collect()
}

/// Verifies that every item id appears exactly once across all groups.
pub fn check_membership(groups: &[Group]) -> Result<(), ReorderError> {
    let mut seen = BTreeMap::new();
    for group in groups {
        for item_id in &group.item_ids {
            match seen.entry(*item_id) {
                Entry::Occupied(_) => return Err(ReorderError::DuplicateItem(*item_id)),
                Entry::Vacant(slot) => {
                    slot.insert(group.group_id);
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "tests/reorder_tests.rs"]
mod tests;
