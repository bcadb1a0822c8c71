use super::key::{RecordId, SimulationId, SimulationKey, StudentId, UniversityId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// The three influence categories that feed a student's performance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactorCategory {
    Internal,
    External,
    Institutional,
}

impl FactorCategory {
    pub const ALL: [FactorCategory; 3] = [
        FactorCategory::Internal,
        FactorCategory::External,
        FactorCategory::Institutional,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            FactorCategory::Internal => "internal",
            FactorCategory::External => "external",
            FactorCategory::Institutional => "institutional",
        }
    }

    /// Name of the cache entry holding this category's lookup.
    #[must_use]
    pub fn cache_name(self) -> &'static str {
        match self {
            FactorCategory::Internal => "mem_internal_factor",
            FactorCategory::External => "mem_external_factor",
            FactorCategory::Institutional => "mem_institutional_factor",
        }
    }

    /// Institutional records are owned by a whole simulation rather than by a student.
    #[must_use]
    pub fn is_shared(self) -> bool {
        matches!(self, FactorCategory::Institutional)
    }
}

impl fmt::Display for FactorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown factor category: {0:?}")]
pub struct UnknownCategory(pub String);

impl FromStr for FactorCategory {
    type Err = UnknownCategory;

    /// Accepts the short names (`internal`) as well as the cache names
    /// (`mem_internal_factor`) and their plural forms.
    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        let normalized = tag.trim().to_ascii_lowercase();
        let stem = normalized
            .strip_prefix("mem_")
            .unwrap_or(normalized.as_str())
            .trim_end_matches('s');
        let stem = stem.strip_suffix("_factor").unwrap_or(stem);
        match stem {
            "internal" => Ok(FactorCategory::Internal),
            "external" => Ok(FactorCategory::External),
            "institutional" => Ok(FactorCategory::Institutional),
            _ => Err(UnknownCategory(tag.to_string())),
        }
    }
}

/// Static description of one category's ratings.
///
/// Every rating is perturbable and scored; identifier and foreign-key fields
/// are typed integers and never appear here.
pub trait FactorSchema {
    const CATEGORY: FactorCategory;
    const FIELDS: &'static [&'static str];

    fn ratings(&self) -> Vec<f64>;
    fn ratings_mut(&mut self) -> Vec<&mut f64>;

    /// Sets every rating to `value`.
    fn fill(&mut self, value: f64) {
        for rating in self.ratings_mut() {
            *rating = value;
        }
    }

    fn named_ratings(&self) -> Vec<(&'static str, f64)> {
        Self::FIELDS
            .iter()
            .copied()
            .zip(self.ratings())
            .collect()
    }
}

macro_rules! factor_schema {
    ($ty:ident, $category:expr, [$($field:ident),+ $(,)?]) => {
        impl FactorSchema for $ty {
            const CATEGORY: FactorCategory = $category;
            const FIELDS: &'static [&'static str] = &[$(stringify!($field)),+];

            fn ratings(&self) -> Vec<f64> {
                vec![$(self.$field),+]
            }

            fn ratings_mut(&mut self) -> Vec<&mut f64> {
                vec![$(&mut self.$field),+]
            }
        }
    };
}

/// Motivation and study-habit ratings of one student.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct InternalFactors {
    pub id: RecordId,
    pub simulation_id: SimulationId,
    pub student_id: StudentId,
    pub goal_setting: f64,
    pub personal_ambition: f64,
    pub interest_subject: f64,
    pub scheduling: f64,
    pub prioritization: f64,
    pub consistency: f64,
    pub study_techniques: f64,
    pub focus_study: f64,
    pub self_assessment: f64,
}

factor_schema!(
    InternalFactors,
    FactorCategory::Internal,
    [
        goal_setting,
        personal_ambition,
        interest_subject,
        scheduling,
        prioritization,
        consistency,
        study_techniques,
        focus_study,
        self_assessment,
    ]
);

/// Family, resource and teaching environment ratings of one student.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ExternalFactors {
    pub id: RecordId,
    pub simulation_id: SimulationId,
    pub student_id: StudentId,
    pub family_expectations: f64,
    pub financial_stability: f64,
    pub access_to_resources: f64,
    pub family_support: f64,
    pub textbooks_availability: f64,
    pub internet_access: f64,
    pub lab_materials: f64,
    pub curriculum_relevance: f64,
    pub teaching_quality: f64,
    pub feedback_assessment: f64,
}

factor_schema!(
    ExternalFactors,
    FactorCategory::External,
    [
        family_expectations,
        financial_stability,
        access_to_resources,
        family_support,
        textbooks_availability,
        internet_access,
        lab_materials,
        curriculum_relevance,
        teaching_quality,
        feedback_assessment,
    ]
);

/// Quality ratings of the university a simulation runs against.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct InstitutionalFactors {
    pub id: RecordId,
    pub simulation_id: SimulationId,
    pub university_id: UniversityId,
    pub class_size: f64,
    pub facility_availability: f64,
    pub peer_support: f64,
    pub academic_guidance: f64,
    pub financial_aid: f64,
    pub extracurricular_opportunities: f64,
    pub cultural_norms: f64,
    pub peer_influence: f64,
}

factor_schema!(
    InstitutionalFactors,
    FactorCategory::Institutional,
    [
        class_size,
        facility_availability,
        peer_support,
        academic_guidance,
        financial_aid,
        extracurricular_opportunities,
        cultural_norms,
        peer_influence,
    ]
);

impl InternalFactors {
    #[must_use]
    pub fn uniform(id: RecordId, key: SimulationKey, value: f64) -> Self {
        let mut record = Self {
            id,
            simulation_id: key.simulation_id,
            student_id: key.student_id,
            ..Default::default()
        };
        record.fill(value);
        record
    }
}

impl ExternalFactors {
    #[must_use]
    pub fn uniform(id: RecordId, key: SimulationKey, value: f64) -> Self {
        let mut record = Self {
            id,
            simulation_id: key.simulation_id,
            student_id: key.student_id,
            ..Default::default()
        };
        record.fill(value);
        record
    }
}

impl InstitutionalFactors {
    #[must_use]
    pub fn uniform(
        id: RecordId,
        simulation_id: SimulationId,
        university_id: UniversityId,
        value: f64,
    ) -> Self {
        let mut record = Self {
            id,
            simulation_id,
            university_id,
            ..Default::default()
        };
        record.fill(value);
        record
    }
}

/// One factor record of any category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "category", rename_all = "snake_case")]
pub enum FactorRecord {
    Internal(InternalFactors),
    External(ExternalFactors),
    Institutional(InstitutionalFactors),
}

impl FactorRecord {
    #[must_use]
    pub fn category(&self) -> FactorCategory {
        match self {
            FactorRecord::Internal(_) => FactorCategory::Internal,
            FactorRecord::External(_) => FactorCategory::External,
            FactorRecord::Institutional(_) => FactorCategory::Institutional,
        }
    }

    #[must_use]
    pub fn id(&self) -> RecordId {
        match self {
            FactorRecord::Internal(r) => r.id,
            FactorRecord::External(r) => r.id,
            FactorRecord::Institutional(r) => r.id,
        }
    }

    #[must_use]
    pub fn simulation_id(&self) -> SimulationId {
        match self {
            FactorRecord::Internal(r) => r.simulation_id,
            FactorRecord::External(r) => r.simulation_id,
            FactorRecord::Institutional(r) => r.simulation_id,
        }
    }

    /// Owning student; `None` for records shared by a whole simulation.
    #[must_use]
    pub fn student_id(&self) -> Option<StudentId> {
        match self {
            FactorRecord::Internal(r) => Some(r.student_id),
            FactorRecord::External(r) => Some(r.student_id),
            FactorRecord::Institutional(_) => None,
        }
    }

    #[must_use]
    pub fn fields(&self) -> &'static [&'static str] {
        match self {
            FactorRecord::Internal(_) => InternalFactors::FIELDS,
            FactorRecord::External(_) => ExternalFactors::FIELDS,
            FactorRecord::Institutional(_) => InstitutionalFactors::FIELDS,
        }
    }

    #[must_use]
    pub fn ratings(&self) -> Vec<f64> {
        match self {
            FactorRecord::Internal(r) => r.ratings(),
            FactorRecord::External(r) => r.ratings(),
            FactorRecord::Institutional(r) => r.ratings(),
        }
    }

    pub fn ratings_mut(&mut self) -> Vec<&mut f64> {
        match self {
            FactorRecord::Internal(r) => r.ratings_mut(),
            FactorRecord::External(r) => r.ratings_mut(),
            FactorRecord::Institutional(r) => r.ratings_mut(),
        }
    }

    #[must_use]
    pub fn named_ratings(&self) -> Vec<(&'static str, f64)> {
        self.fields().iter().copied().zip(self.ratings()).collect()
    }
}

impl From<InternalFactors> for FactorRecord {
    fn from(record: InternalFactors) -> Self {
        FactorRecord::Internal(record)
    }
}

impl From<ExternalFactors> for FactorRecord {
    fn from(record: ExternalFactors) -> Self {
        FactorRecord::External(record)
    }
}

impl From<InstitutionalFactors> for FactorRecord {
    fn from(record: InstitutionalFactors) -> Self {
        FactorRecord::Institutional(record)
    }
}
