use super::FactorSource;
use crate::error::Result;
use crate::worker::SqliteWorker;
use rusqlite::{params, Connection, Row};
use scholarsim_data::{
    ExternalFactors, FactorBatch, FactorCategory, FactorRecord, FactorSchema, GroupKey,
    InstitutionalFactors, InternalFactors, SimulationId, StudentId, UniversityId,
};
use std::path::Path;
use std::time::Duration;

/// Tables the source reads. Rating columns carry the schema field names.
pub const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS simulations (
    id INTEGER PRIMARY KEY,
    university_id INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS enrollments (
    simulation_id INTEGER NOT NULL REFERENCES simulations(id),
    student_id INTEGER NOT NULL,
    position INTEGER NOT NULL,
    PRIMARY KEY (simulation_id, student_id)
);
CREATE TABLE IF NOT EXISTS internal_factors (
    id INTEGER PRIMARY KEY,
    simulation_id INTEGER NOT NULL,
    student_id INTEGER NOT NULL,
    goal_setting REAL NOT NULL,
    personal_ambition REAL NOT NULL,
    interest_subject REAL NOT NULL,
    scheduling REAL NOT NULL,
    prioritization REAL NOT NULL,
    consistency REAL NOT NULL,
    study_techniques REAL NOT NULL,
    focus_study REAL NOT NULL,
    self_assessment REAL NOT NULL
);
CREATE TABLE IF NOT EXISTS external_factors (
    id INTEGER PRIMARY KEY,
    simulation_id INTEGER NOT NULL,
    student_id INTEGER NOT NULL,
    family_expectations REAL NOT NULL,
    financial_stability REAL NOT NULL,
    access_to_resources REAL NOT NULL,
    family_support REAL NOT NULL,
    textbooks_availability REAL NOT NULL,
    internet_access REAL NOT NULL,
    lab_materials REAL NOT NULL,
    curriculum_relevance REAL NOT NULL,
    teaching_quality REAL NOT NULL,
    feedback_assessment REAL NOT NULL
);
CREATE TABLE IF NOT EXISTS institutional_factors (
    id INTEGER PRIMARY KEY,
    simulation_id INTEGER NOT NULL,
    university_id INTEGER NOT NULL,
    class_size REAL NOT NULL,
    facility_availability REAL NOT NULL,
    peer_support REAL NOT NULL,
    academic_guidance REAL NOT NULL,
    financial_aid REAL NOT NULL,
    extracurricular_opportunities REAL NOT NULL,
    cultural_norms REAL NOT NULL,
    peer_influence REAL NOT NULL
);";

fn init_source(conn: &mut Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)
}

fn table(category: FactorCategory) -> &'static str {
    match category {
        FactorCategory::Internal => "internal_factors",
        FactorCategory::External => "external_factors",
        FactorCategory::Institutional => "institutional_factors",
    }
}

/// Column holding the owner beside `simulation_id`.
fn owner_column(category: FactorCategory) -> &'static str {
    if category.is_shared() {
        "university_id"
    } else {
        "student_id"
    }
}

fn fields(category: FactorCategory) -> &'static [&'static str] {
    match category {
        FactorCategory::Internal => InternalFactors::FIELDS,
        FactorCategory::External => ExternalFactors::FIELDS,
        FactorCategory::Institutional => InstitutionalFactors::FIELDS,
    }
}

fn select_sql(category: FactorCategory) -> String {
    format!(
        "SELECT id, simulation_id, {}, {} FROM {} WHERE simulation_id = ?1 ORDER BY id",
        owner_column(category),
        fields(category).join(", "),
        table(category)
    )
}

fn insert_sql(category: FactorCategory) -> String {
    let columns = fields(category);
    let placeholders: Vec<String> = (1..=columns.len() + 3).map(|i| format!("?{i}")).collect();
    format!(
        "INSERT OR REPLACE INTO {} (id, simulation_id, {}, {}) VALUES ({})",
        table(category),
        owner_column(category),
        columns.join(", "),
        placeholders.join(", ")
    )
}

/// Builds a record from a row laid out as `id, simulation_id, owner, ratings...`.
fn record_from_row(category: FactorCategory, row: &Row<'_>) -> rusqlite::Result<FactorRecord> {
    let id = row.get::<_, i64>(0)? as u64;
    let simulation_id = row.get::<_, i64>(1)? as u64;
    let owner = row.get::<_, i64>(2)? as u64;

    let mut record: FactorRecord = match category {
        FactorCategory::Internal => InternalFactors {
            id,
            simulation_id,
            student_id: owner,
            ..Default::default()
        }
        .into(),
        FactorCategory::External => ExternalFactors {
            id,
            simulation_id,
            student_id: owner,
            ..Default::default()
        }
        .into(),
        FactorCategory::Institutional => InstitutionalFactors {
            id,
            simulation_id,
            university_id: owner,
            ..Default::default()
        }
        .into(),
    };
    for (i, rating) in record.ratings_mut().into_iter().enumerate() {
        *rating = row.get(3 + i)?;
    }
    Ok(record)
}

fn owner_of(record: &FactorRecord) -> u64 {
    match record {
        FactorRecord::Internal(r) => r.student_id,
        FactorRecord::External(r) => r.student_id,
        FactorRecord::Institutional(r) => r.university_id,
    }
}

/// Relational source in a SQLite database laid out as [`SCHEMA_SQL`].
pub struct SqliteSource {
    worker: SqliteWorker,
}

impl SqliteSource {
    pub fn open<P: AsRef<Path>>(path: P, timeout: Duration) -> Result<Self> {
        Ok(Self {
            worker: SqliteWorker::open(path, timeout, init_source)?,
        })
    }

    pub fn in_memory(timeout: Duration) -> Result<Self> {
        Ok(Self {
            worker: SqliteWorker::in_memory(timeout, init_source)?,
        })
    }

    /// Registers a simulation with its students in enrollment order.
    pub fn insert_simulation(
        &self,
        simulation_id: SimulationId,
        university_id: UniversityId,
        students: Vec<StudentId>,
    ) -> Result<()> {
        self.worker.call_guarded("insert simulation", move |conn, guard| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT OR REPLACE INTO simulations (id, university_id) VALUES (?1, ?2)",
                params![simulation_id as i64, university_id as i64],
            )?;
            for (position, student_id) in students.iter().enumerate() {
                tx.execute(
                    "INSERT OR REPLACE INTO enrollments (simulation_id, student_id, position)
                      VALUES (?1, ?2, ?3)",
                    params![simulation_id as i64, *student_id as i64, position as i64],
                )?;
            }
            guard.finish()?;
            tx.commit()?;
            Ok(())
        })
    }

    pub fn insert_records(&self, records: Vec<FactorRecord>) -> Result<()> {
        self.worker.call_guarded("insert records", move |conn, guard| {
            let tx = conn.transaction()?;
            for record in &records {
                let mut values: Vec<rusqlite::types::Value> = vec![
                    (record.id() as i64).into(),
                    (record.simulation_id() as i64).into(),
                    (owner_of(record) as i64).into(),
                ];
                values.extend(record.ratings().into_iter().map(rusqlite::types::Value::from));
                tx.execute(
                    &insert_sql(record.category()),
                    rusqlite::params_from_iter(values),
                )?;
            }
            guard.finish()?;
            tx.commit()?;
            Ok(())
        })
    }
}

impl FactorSource for SqliteSource {
    fn simulations(&self) -> Result<Vec<SimulationId>> {
        self.worker.call("list simulations", |conn| {
            let mut stmt = conn.prepare("SELECT id FROM simulations ORDER BY id")?;
            let ids = stmt
                .query_map([], |row| row.get::<_, i64>(0))?
                .map(|id| id.map(|id| id as SimulationId))
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(ids)
        })
    }

    fn load_simulation(&self, simulation_id: SimulationId) -> Result<FactorBatch> {
        self.worker.call("load simulation", move |conn| {
            let mut stmt = conn.prepare(
                "SELECT student_id FROM enrollments WHERE simulation_id = ?1 ORDER BY position, student_id",
            )?;
            let students = stmt
                .query_map(params![simulation_id as i64], |row| row.get::<_, i64>(0))?
                .map(|id| id.map(|id| id as StudentId))
                .collect::<rusqlite::Result<Vec<_>>>()?;
            let key = GroupKey::new(simulation_id, students);

            let mut batch = FactorBatch::new();
            for category in FactorCategory::ALL {
                let mut stmt = conn.prepare(&select_sql(category))?;
                let records = stmt
                    .query_map(params![simulation_id as i64], |row| {
                        record_from_row(category, row)
                    })?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                batch.get_mut(category).insert(key.clone(), records);
            }
            tracing::debug!(
                simulation = simulation_id,
                records = batch.record_count(),
                "Loaded simulation factors"
            );
            Ok(batch)
        })
    }
}
