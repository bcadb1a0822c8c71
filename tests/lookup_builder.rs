mod common;

use std::collections::{BTreeMap, BTreeSet};

use scholarsim_core::{
    build_lookup, build_lookup_tagged, impact, EngineError, LookupBuilder, MemoryState,
    NEUTRAL_BASELINE,
};
use scholarsim_data::{
    FactorBatch, FactorCategory, FactorRecord, GroupKey, GroupedFactors, InstitutionalFactors,
    InternalFactors, RatingRange, SimulationKey,
};

fn internal(id: u64, simulation_id: u64, student_id: u64, value: f64) -> FactorRecord {
    InternalFactors::uniform(id, SimulationKey::new(simulation_id, student_id), value).into()
}

#[test]
fn test_three_students_map_to_their_own_records() {
    let mut grouped = GroupedFactors::new();
    grouped.insert(
        GroupKey::new(4, vec![10, 20, 30]),
        [
            internal(1, 4, 30, 3.0),
            internal(2, 4, 10, 1.0),
            internal(3, 4, 20, 2.0),
        ],
    );

    let lookup = build_lookup(&grouped, FactorCategory::Internal).unwrap();
    assert_eq!(lookup.len(), 3);
    for (student, id) in [(10, 2), (20, 3), (30, 1)] {
        let record = lookup.get(&SimulationKey::new(4, student)).unwrap();
        assert_eq!(record.id(), id);
        assert_eq!(record.student_id(), Some(student));
    }
}

#[test]
fn test_grouped_merge_keeps_every_record() {
    let key = GroupKey::new(1, vec![1, 2]);
    let mut left = GroupedFactors::new();
    left.insert(key.clone(), [internal(1, 1, 1, 5.0)]);
    let mut right = GroupedFactors::new();
    right.insert(key.clone(), [internal(2, 1, 2, 5.0)]);
    right.insert(GroupKey::new(2, vec![3]), [internal(3, 2, 3, 5.0)]);

    left.merge(right);
    assert_eq!(left.record_count(), 3);
    let ids: Vec<u64> = left
        .get(&key)
        .unwrap()
        .iter()
        .map(FactorRecord::id)
        .collect();
    assert_eq!(ids, vec![1, 2]);
}

fn ids_by_key(grouped: &GroupedFactors) -> BTreeMap<GroupKey, BTreeSet<u64>> {
    grouped
        .iter()
        .map(|(key, records)| (key.clone(), records.iter().map(FactorRecord::id).collect()))
        .collect()
}

#[test]
fn test_grouped_merge_is_order_independent() {
    let key = GroupKey::new(3, vec![1, 2]);
    let mut a = GroupedFactors::new();
    a.insert(key.clone(), [internal(1, 3, 1, 4.0)]);
    let mut b = GroupedFactors::new();
    b.insert(key.clone(), [internal(2, 3, 2, 6.0)]);
    b.insert(GroupKey::new(4, vec![9]), [internal(3, 4, 9, 6.0)]);

    let mut forward = a.clone();
    forward.merge(b.clone());
    let mut backward = b;
    backward.merge(a);

    assert_eq!(ids_by_key(&forward), ids_by_key(&backward));
    assert_eq!(ids_by_key(&forward)[&key], BTreeSet::from([1, 2]));
}

#[test]
fn test_memory_merge_is_last_write_wins() {
    let mut first = FactorBatch::new();
    first
        .internal
        .insert(GroupKey::new(1, vec![1]), [internal(1, 1, 1, 2.0)]);
    let mut second = FactorBatch::new();
    second
        .internal
        .insert(GroupKey::new(1, vec![1, 2]), [internal(9, 1, 1, 8.0)]);

    let merged = MemoryState::merge(
        MemoryState::create(&first).unwrap(),
        MemoryState::create(&second).unwrap(),
    );
    let record = merged
        .record(FactorCategory::Internal, &SimulationKey::new(1, 1))
        .unwrap();
    assert_eq!(record.id(), 9);
    assert_eq!(merged.collisions(), 1);
    assert_eq!(merged.roster.students(1), &[1, 2]);
}

#[test]
fn test_institutional_record_reaches_every_student() {
    let mut grouped = GroupedFactors::new();
    grouped.insert(
        GroupKey::new(2, vec![5, 6, 7]),
        [InstitutionalFactors::uniform(40, 2, 9, 4.0).into()],
    );
    let lookup = build_lookup_tagged(&grouped, "mem_institutional_factor").unwrap();
    assert_eq!(lookup.len(), 3);
    assert!(lookup.iter().all(|(_, record)| record.id() == 40));
}

#[test]
fn test_out_of_range_rating_is_malformed() {
    let mut grouped = GroupedFactors::new();
    grouped.insert(GroupKey::new(1, vec![1]), [internal(1, 1, 1, 11.0)]);
    assert!(matches!(
        build_lookup(&grouped, FactorCategory::Internal),
        Err(EngineError::MalformedInput(_))
    ));

    let wide = LookupBuilder::new(RatingRange::new(0.0, 20.0));
    assert_eq!(wide.build(&grouped, FactorCategory::Internal).unwrap().len(), 1);
}

#[test]
fn test_wrong_category_group_is_rejected() {
    let mut grouped = GroupedFactors::new();
    grouped.insert(GroupKey::new(1, vec![1]), [internal(1, 1, 1, 5.0)]);
    assert!(build_lookup(&grouped, FactorCategory::External).is_err());
    assert!(matches!(
        build_lookup_tagged(&grouped, "hobbies"),
        Err(EngineError::InvalidCategory(_))
    ));
}

#[test]
fn test_absent_record_has_neutral_impact() {
    assert_eq!(impact(None), NEUTRAL_BASELINE);
    assert_eq!(NEUTRAL_BASELINE, 1.0);
}
