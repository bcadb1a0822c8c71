use proptest::prelude::*;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use scholarsim_core::{
    build_lookup, FixedSource, Impacts, MemoryState, Orchestrator, RandomWalk, ScoringEngine,
};
use scholarsim_data::{
    ExternalFactors, FactorBatch, FactorCategory, FactorRecord, GroupKey, GroupedFactors,
    InstitutionalFactors, InternalFactors, RatingRange, SimulationKey,
};

fn arb_rating() -> impl Strategy<Value = f64> {
    0.0f64..=10.0
}

fn arb_record() -> impl Strategy<Value = FactorRecord> {
    (
        0usize..3,
        prop::collection::vec(arb_rating(), 10),
        1u64..50,
        1u64..50,
    )
        .prop_map(|(category, ratings, simulation_id, owner)| {
            let mut record: FactorRecord = match category {
                0 => InternalFactors::uniform(1, SimulationKey::new(simulation_id, owner), 0.0)
                    .into(),
                1 => ExternalFactors::uniform(2, SimulationKey::new(simulation_id, owner), 0.0)
                    .into(),
                _ => InstitutionalFactors::uniform(3, simulation_id, owner, 0.0).into(),
            };
            for (slot, value) in record.ratings_mut().into_iter().zip(ratings) {
                *slot = value;
            }
            record
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn perturbation_stays_in_range(
        mut record in arb_record(),
        step in 0.0f64..5.0,
        seed in any::<u64>(),
        rounds in 1usize..20,
    ) {
        let walk = RandomWalk::new(step, RatingRange::CANONICAL);
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        for _ in 0..rounds {
            walk.perturb(&mut record, &mut rng).unwrap();
        }
        for value in record.ratings() {
            prop_assert!(RatingRange::CANONICAL.contains(value));
        }
    }

    #[test]
    fn perturbation_leaves_identity_alone(
        record in arb_record(),
        seed in any::<u64>(),
    ) {
        let mut moved = record.clone();
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        RandomWalk::default().perturb(&mut moved, &mut rng).unwrap();
        prop_assert_eq!(moved.id(), record.id());
        prop_assert_eq!(moved.simulation_id(), record.simulation_id());
        prop_assert_eq!(moved.student_id(), record.student_id());
        prop_assert_eq!(moved.category(), record.category());
        for (before, after) in record.ratings().into_iter().zip(moved.ratings()) {
            prop_assert!((after - before).abs() <= 0.1 + 1e-12);
        }
    }

    #[test]
    fn zero_step_is_identity(record in arb_record(), fraction in 0.0f64..=1.0) {
        let mut moved = record.clone();
        RandomWalk::new(0.0, RatingRange::CANONICAL)
            .perturb(&mut moved, &mut FixedSource { fraction })
            .unwrap();
        prop_assert_eq!(moved, record);
    }

    #[test]
    fn score_is_always_a_percentage(
        internal in -1.0e6f64..1.0e6,
        external in -1.0e6f64..1.0e6,
        institutional in -1.0e6f64..1.0e6,
        fraction in 0.0f64..=1.0,
    ) {
        let impacts = Impacts { internal, external, institutional };
        let score = ScoringEngine::default().score(&impacts, &mut FixedSource { fraction });
        prop_assert!((0.0..=100.0).contains(&score));
    }

    #[test]
    fn impact_is_mean_of_ratings(record in arb_record()) {
        let ratings = record.ratings();
        let mean = ratings.iter().sum::<f64>() / ratings.len() as f64;
        let impact = ScoringEngine::default().impact(Some(&record));
        prop_assert!((impact - mean).abs() < 1e-9);
    }

    #[test]
    fn lookup_has_one_entry_per_enrolled_student(
        students in prop::collection::btree_set(1u64..500, 1..30),
    ) {
        let students: Vec<u64> = students.into_iter().collect();
        let key = GroupKey::new(7, students.clone());
        let mut grouped = GroupedFactors::new();
        grouped.insert(
            key,
            students
                .iter()
                .enumerate()
                .map(|(i, s)| {
                    InternalFactors::uniform(i as u64, SimulationKey::new(7, *s), 5.0).into()
                }),
        );
        let lookup = build_lookup(&grouped, FactorCategory::Internal).unwrap();
        prop_assert_eq!(lookup.len(), students.len());
        for student in &students {
            prop_assert!(lookup.contains_key(&SimulationKey::new(7, *student)));
        }
    }

    #[test]
    fn every_tick_scores_each_student_once(
        students in prop::collection::btree_set(1u64..200, 1..15),
        seed in any::<u64>(),
    ) {
        let students: Vec<u64> = students.into_iter().collect();
        let key = GroupKey::new(1, students.clone());
        let mut batch = FactorBatch::new();
        batch.internal.insert(
            key.clone(),
            students
                .iter()
                .map(|s| InternalFactors::uniform(*s, SimulationKey::new(1, *s), 4.0).into()),
        );
        batch
            .institutional
            .insert(key, [InstitutionalFactors::uniform(1, 1, 2, 6.0).into()]);
        let mut state = MemoryState::create(&batch).unwrap();

        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let report = Orchestrator::default().run_tick(&mut state, &mut rng);
        let scored: Vec<u64> = report.scores.iter().map(|s| s.student_id).collect();
        prop_assert_eq!(scored, students.clone());
        prop_assert_eq!(report.aggregates.len(), 1);
        prop_assert_eq!(report.missing_factor_count(), students.len());
    }
}
