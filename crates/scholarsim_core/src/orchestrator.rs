//! One simulation tick over an owned [`MemoryState`].
//!
//! Iteration order is fixed: simulations in id order, students in enrollment
//! order, then categories. Each found record is perturbed, every student is
//! scored, and one aggregate per simulation closes its block.

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::lookup::LookupMap;
use crate::memory::MemoryState;
use crate::perturbation::RandomWalk;
use crate::random::RandomSource;
use crate::scoring::{Impacts, ScoringEngine};
use scholarsim_data::{
    FactorCategory, FactorRecord, RecordId, SimulationId, SimulationKey, StudentId,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentScore {
    pub simulation_id: SimulationId,
    pub student_id: StudentId,
    pub score: f64,
}

/// Mean impact per category over the students scored in one simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationAggregate {
    pub simulation_id: SimulationId,
    pub avg_internal_factor: f64,
    pub avg_external_factor: f64,
    pub avg_institutional_factor: f64,
}

/// A student that could not be scored this tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentFailure {
    pub simulation_id: SimulationId,
    pub student_id: StudentId,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WarningKind {
    /// No record of this category; the neutral baseline was used.
    MissingFactor { category: FactorCategory },
    /// The record's impact could not be computed; the baseline was used.
    ComputationFallback {
        category: FactorCategory,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickWarning {
    pub simulation_id: SimulationId,
    pub student_id: StudentId,
    #[serde(flatten)]
    pub kind: WarningKind,
}

/// One output row of a tick, serialized without a tag so each row reads as
/// its own flat object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TickRow {
    Score(StudentScore),
    Aggregate(SimulationAggregate),
    Failure(StudentFailure),
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TickReport {
    /// Tick number this report completed, starting at 1.
    pub tick: u64,
    pub scores: Vec<StudentScore>,
    pub aggregates: Vec<SimulationAggregate>,
    pub failures: Vec<StudentFailure>,
    pub warnings: Vec<TickWarning>,
}

impl TickReport {
    /// Scores, then aggregates, then failures.
    #[must_use]
    pub fn rows(&self) -> Vec<TickRow> {
        self.scores
            .iter()
            .cloned()
            .map(TickRow::Score)
            .chain(self.aggregates.iter().cloned().map(TickRow::Aggregate))
            .chain(self.failures.iter().cloned().map(TickRow::Failure))
            .collect()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scores.is_empty() && self.aggregates.is_empty() && self.failures.is_empty()
    }

    #[must_use]
    pub fn missing_factor_count(&self) -> usize {
        self.warnings
            .iter()
            .filter(|w| matches!(w.kind, WarningKind::MissingFactor { .. }))
            .count()
    }
}

struct ImpactTotals {
    sums: Impacts,
    scored: usize,
}

impl ImpactTotals {
    fn new() -> Self {
        Self {
            sums: Impacts {
                internal: 0.0,
                external: 0.0,
                institutional: 0.0,
            },
            scored: 0,
        }
    }

    fn add(&mut self, impacts: &Impacts) {
        self.sums.internal += impacts.internal;
        self.sums.external += impacts.external;
        self.sums.institutional += impacts.institutional;
        self.scored += 1;
    }

    fn aggregate(&self, simulation_id: SimulationId) -> Option<SimulationAggregate> {
        if self.scored == 0 {
            return None;
        }
        let n = self.scored as f64;
        Some(SimulationAggregate {
            simulation_id,
            avg_internal_factor: self.sums.internal / n,
            avg_external_factor: self.sums.external / n,
            avg_institutional_factor: self.sums.institutional / n,
        })
    }
}

/// Runs ticks with one set of perturbation and scoring parameters.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Orchestrator {
    pub walk: RandomWalk,
    pub scoring: ScoringEngine,
}

impl Orchestrator {
    #[must_use]
    pub fn new(walk: RandomWalk, scoring: ScoringEngine) -> Self {
        Self { walk, scoring }
    }

    #[must_use]
    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.random_walk(), config.scoring())
    }

    /// Advances `state` by one tick.
    ///
    /// Never fails as a whole: per-student problems become failures or
    /// warnings in the report. An empty roster yields an empty report.
    pub fn run_tick<R: RandomSource + ?Sized>(
        &self,
        state: &mut MemoryState,
        rng: &mut R,
    ) -> TickReport {
        state.tick += 1;
        let mut report = TickReport {
            tick: state.tick,
            ..TickReport::default()
        };

        let simulations: Vec<(SimulationId, Vec<StudentId>)> = state
            .roster
            .iter()
            .map(|(id, students)| (id, students.to_vec()))
            .collect();

        for (simulation_id, students) in simulations {
            if students.is_empty() {
                continue;
            }
            let institutional_failures = self.perturb_shared(
                state.lookup_mut(FactorCategory::Institutional),
                simulation_id,
                &students,
                rng,
            );

            let mut totals = ImpactTotals::new();
            for student_id in students {
                let key = SimulationKey::new(simulation_id, student_id);
                let mut failure = institutional_failures.get(&key).cloned();

                for category in [FactorCategory::Internal, FactorCategory::External] {
                    if failure.is_some() {
                        break;
                    }
                    if let Some(record) = state.lookup_mut(category).get_mut(&key) {
                        if let Err(err) = self.walk.perturb(record, rng) {
                            failure = Some(err);
                        }
                    }
                }

                if let Some(err) = failure {
                    tracing::warn!(
                        simulation = simulation_id,
                        student = student_id,
                        error = %err,
                        "Student skipped this tick"
                    );
                    report.failures.push(StudentFailure {
                        simulation_id,
                        student_id,
                        error: err.to_string(),
                    });
                    continue;
                }

                let impacts = self.impacts(state, &key, &mut report.warnings);
                totals.add(&impacts);
                report.scores.push(StudentScore {
                    simulation_id,
                    student_id,
                    score: self.scoring.score(&impacts, rng),
                });
            }

            if let Some(aggregate) = totals.aggregate(simulation_id) {
                report.aggregates.push(aggregate);
            }
        }

        tracing::info!(
            tick = report.tick,
            scores = report.scores.len(),
            aggregates = report.aggregates.len(),
            failures = report.failures.len(),
            warnings = report.warnings.len(),
            "Tick complete"
        );
        report
    }

    /// Perturbs each distinct shared record of a simulation once and writes
    /// the result to every student key that carried it. Returns the error for
    /// each key whose record could not be perturbed.
    fn perturb_shared<R: RandomSource + ?Sized>(
        &self,
        lookup: &mut LookupMap,
        simulation_id: SimulationId,
        students: &[StudentId],
        rng: &mut R,
    ) -> HashMap<SimulationKey, EngineError> {
        let mut shared: BTreeMap<RecordId, (FactorRecord, Vec<SimulationKey>)> = BTreeMap::new();
        for student_id in students {
            let key = SimulationKey::new(simulation_id, *student_id);
            if let Some(record) = lookup.get(&key) {
                shared
                    .entry(record.id())
                    .or_insert_with(|| (record.clone(), Vec::new()))
                    .1
                    .push(key);
            }
        }

        let mut failures = HashMap::new();
        for (mut record, keys) in shared.into_values() {
            match self.walk.perturb(&mut record, rng) {
                Ok(()) => {
                    for key in keys {
                        if let Some(slot) = lookup.get_mut(&key) {
                            *slot = record.clone();
                        }
                    }
                }
                Err(err) => {
                    for key in keys {
                        failures.insert(key, err.clone());
                    }
                }
            }
        }
        failures
    }

    fn impacts(
        &self,
        state: &MemoryState,
        key: &SimulationKey,
        warnings: &mut Vec<TickWarning>,
    ) -> Impacts {
        let mut impacts = Impacts {
            internal: self.scoring.baseline,
            external: self.scoring.baseline,
            institutional: self.scoring.baseline,
        };
        for category in FactorCategory::ALL {
            let kind = match state.lookup(category).get(key) {
                None => WarningKind::MissingFactor { category },
                Some(record) => match self.scoring.try_impact(Some(record)) {
                    Ok(value) => {
                        impacts.set(category, value);
                        continue;
                    }
                    Err(err) => WarningKind::ComputationFallback {
                        category,
                        reason: err.to_string(),
                    },
                },
            };
            tracing::warn!(
                simulation = key.simulation_id,
                student = key.student_id,
                category = %category,
                "Using neutral baseline: {:?}",
                kind
            );
            warnings.push(TickWarning {
                simulation_id: key.simulation_id,
                student_id: key.student_id,
                kind,
            });
        }
        impacts
    }
}
