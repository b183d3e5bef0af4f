use super::*;
use proptest::prelude::*;
use proptest::test_runner::Config;

fn ids(raw: &[i64]) -> Vec<ItemId> {
    raw.iter().copied().map(ItemId).collect()
}

fn sample_groups() -> Vec<Group> {
    vec![
        Group::new(GroupId(1), "A", ids(&[1, 2, 3])),
        Group::new(GroupId(2), "B", ids(&[4, 5])),
        Group::new(GroupId(3), "C", Vec::new()),
    ]
}

fn mv(from_group: i64, from_index: usize, to_group: i64, to_index: usize) -> MoveRequest {
    MoveRequest::new(
        GroupPosition::new(GroupId(from_group), from_index),
        GroupPosition::new(GroupId(to_group), to_index),
    )
}

fn item_ids_of(groups: &[Group], group_id: i64) -> Vec<i64> {
    groups
        .iter()
        .find(|g| g.group_id == GroupId(group_id))
        .expect("group")
        .item_ids
        .iter()
        .map(|id| id.0)
        .collect()
}

#[test]
fn moves_item_into_other_group_at_index() {
    let result = reorder(&sample_groups(), &mv(1, 0, 2, 1)).expect("reorder");
    assert_eq!(item_ids_of(&result, 1), vec![2, 3]);
    assert_eq!(item_ids_of(&result, 2), vec![4, 1, 5]);
    assert_eq!(item_ids_of(&result, 3), Vec::<i64>::new());
}

#[test]
fn same_group_forward_move_applies_index_after_removal() {
    let result = reorder(&sample_groups(), &mv(1, 0, 1, 2)).expect("reorder");
    assert_eq!(item_ids_of(&result, 1), vec![2, 3, 1]);
}

#[test]
fn same_group_backward_move() {
    let result = reorder(&sample_groups(), &mv(1, 2, 1, 0)).expect("reorder");
    assert_eq!(item_ids_of(&result, 1), vec![3, 1, 2]);
}

#[test]
fn same_group_adjacent_forward_move_swaps() {
    let result = reorder(&sample_groups(), &mv(1, 0, 1, 1)).expect("reorder");
    assert_eq!(item_ids_of(&result, 1), vec![2, 1, 3]);
}

#[test]
fn same_group_destination_equal_to_length_appends() {
    let result = reorder(&sample_groups(), &mv(1, 0, 1, 3)).expect("reorder");
    assert_eq!(item_ids_of(&result, 1), vec![2, 3, 1]);
}

#[test]
fn cross_group_destination_equal_to_length_appends() {
    let result = reorder(&sample_groups(), &mv(1, 1, 2, 2)).expect("reorder");
    assert_eq!(item_ids_of(&result, 1), vec![1, 3]);
    assert_eq!(item_ids_of(&result, 2), vec![4, 5, 2]);
}

#[test]
fn moving_to_own_position_is_idempotent() {
    let groups = sample_groups();
    for index in 0..3 {
        let result = reorder(&groups, &mv(1, index, 1, index)).expect("reorder");
        assert_eq!(result, groups);
    }
}

#[test]
fn moving_last_item_out_keeps_empty_group() {
    let groups = vec![
        Group::new(GroupId(1), "A", ids(&[9])),
        Group::new(GroupId(2), "B", Vec::new()),
    ];
    let result = reorder(&groups, &mv(1, 0, 2, 0)).expect("reorder");
    assert_eq!(result.len(), 2);
    assert!(result[0].item_ids.is_empty());
    assert_eq!(item_ids_of(&result, 2), vec![9]);
}

#[test]
fn untouched_groups_keep_names_and_order() {
    let result = reorder(&sample_groups(), &mv(1, 0, 2, 0)).expect("reorder");
    let names: Vec<_> = result.iter().map(|g| g.name.as_str()).collect();
    assert_eq!(names, vec!["A", "B", "C"]);
    assert_eq!(result[2], sample_groups()[2]);
}

#[test]
fn rejects_unknown_groups() {
    assert_eq!(
        reorder(&sample_groups(), &mv(9, 0, 1, 0)),
        Err(ReorderError::UnknownGroup(GroupId(9)))
    );
    assert_eq!(
        reorder(&sample_groups(), &mv(1, 0, 9, 0)),
        Err(ReorderError::UnknownGroup(GroupId(9)))
    );
}

#[test]
fn rejects_out_of_range_indices() {
    assert_eq!(
        reorder(&sample_groups(), &mv(2, 2, 1, 0)),
        Err(ReorderError::SourceIndexOutOfRange {
            group_id: GroupId(2),
            index: 2,
            len: 2
        })
    );
    assert_eq!(
        reorder(&sample_groups(), &mv(1, 0, 2, 3)),
        Err(ReorderError::DestinationIndexOutOfRange {
            group_id: GroupId(2),
            index: 3,
            len: 2
        })
    );
    assert!(matches!(
        reorder(&sample_groups(), &mv(3, 0, 1, 0)),
        Err(ReorderError::SourceIndexOutOfRange { .. })
    ));
}

#[test]
fn drop_without_destination_is_noop() {
    let groups = sample_groups();
    let result =
        apply_drop(&groups, GroupPosition::new(GroupId(1), 0), None).expect("apply drop");
    assert_eq!(result, groups);
}

#[test]
fn drop_with_destination_reorders() {
    let result = apply_drop(
        &sample_groups(),
        GroupPosition::new(GroupId(2), 1),
        Some(GroupPosition::new(GroupId(3), 0)),
    )
    .expect("apply drop");
    assert_eq!(item_ids_of(&result, 2), vec![4]);
    assert_eq!(item_ids_of(&result, 3), vec![5]);
}

#[test]
fn append_item_adds_to_end_of_group() {
    let result = append_item(&sample_groups(), GroupId(2), ItemId(6)).expect("append");
    assert_eq!(item_ids_of(&result, 2), vec![4, 5, 6]);
    assert_eq!(item_ids_of(&result, 1), vec![1, 2, 3]);
}

#[test]
fn append_item_rejects_duplicates_and_unknown_groups() {
    assert_eq!(
        append_item(&sample_groups(), GroupId(3), ItemId(1)),
        Err(ReorderError::DuplicateItem(ItemId(1)))
    );
    assert_eq!(
        append_item(&sample_groups(), GroupId(7), ItemId(6)),
        Err(ReorderError::UnknownGroup(GroupId(7)))
    );
}

#[test]
fn remove_item_strips_id_everywhere() {
    let result = remove_item(&sample_groups(), ItemId(4));
    assert_eq!(item_ids_of(&result, 2), vec![5]);
    assert_eq!(remove_item(&sample_groups(), ItemId(42)), sample_groups());
}

#[test]
fn check_membership_detects_duplicates() {
    assert!(check_membership(&sample_groups()).is_ok());
    let mut groups = sample_groups();
    groups[2].item_ids.push(ItemId(2));
    assert_eq!(
        check_membership(&groups),
        Err(ReorderError::DuplicateItem(ItemId(2)))
    );
}

#[test]
fn membership_maps_items_to_groups() {
    let map = membership(&sample_groups());
    assert_eq!(map.len(), 5);
    assert_eq!(map.get(&ItemId(5)), Some(&GroupId(2)));
}

fn arb_groups() -> impl Strategy<Value = Vec<Group>> {
    prop::collection::vec(0_usize..6, 1..5).prop_map(|sizes| {
        let mut next = 1;
        sizes
            .into_iter()
            .enumerate()
            .map(|(idx, size)| {
                let item_ids = (next..next + size as i64).map(ItemId).collect();
                next += size as i64;
                Group::new(GroupId(idx as i64 + 1), format!("g{idx}"), item_ids)
            })
            .collect()
    })
}

proptest! {
    #![proptest_config(Config::with_cases(256))]
    #[test]
    fn valid_moves_preserve_membership(
        groups in arb_groups(),
        from in any::<prop::sample::Index>(),
        to in any::<prop::sample::Index>(),
        from_index in any::<prop::sample::Index>(),
        to_index in any::<prop::sample::Index>(),
    ) {
        let source = from.get(&groups).clone();
        prop_assume!(!source.item_ids.is_empty());
        let destination = to.get(&groups).clone();
        let request = MoveRequest::new(
            GroupPosition::new(source.group_id, from_index.index(source.item_ids.len())),
            GroupPosition::new(
                destination.group_id,
                to_index.index(destination.item_ids.len() + 1),
            ),
        );

        let result = reorder(&groups, &request).expect("valid move");
        let before: usize = groups.iter().map(|g| g.item_ids.len()).sum();
        let after: usize = result.iter().map(|g| g.item_ids.len()).sum();
        prop_assert_eq!(before, after);
        prop_assert!(check_membership(&result).is_ok());
        let mut before_ids: Vec<_> = membership(&groups).into_keys().collect();
        let mut after_ids: Vec<_> = membership(&result).into_keys().collect();
        before_ids.sort();
        after_ids.sort();
        prop_assert_eq!(before_ids, after_ids);
    }

    #[test]
    fn self_moves_are_idempotent(
        groups in arb_groups(),
        pick in any::<prop::sample::Index>(),
        index in any::<prop::sample::Index>(),
    ) {
        let group = pick.get(&groups).clone();
        prop_assume!(!group.item_ids.is_empty());
        let at = index.index(group.item_ids.len());
        let request = MoveRequest::new(
            GroupPosition::new(group.group_id, at),
            GroupPosition::new(group.group_id, at),
        );
        prop_assert_eq!(reorder(&groups, &request).expect("self move"), groups);
    }
}
