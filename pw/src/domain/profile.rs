//! DistrictProfile intake record

use serde::{Deserialize, Serialize};

/// Structured intake record describing a school district
///
/// Created once on wizard confirmation; read-only afterward except through
/// an explicit edit-and-resave.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DistrictProfile {
    /// District display name
    pub district_name: String,

    /// Grade levels served (e.g. "K-2", "3-5", "6-8")
    pub grade_levels: Vec<String>,

    /// Computer science offerings already in place
    pub current_offerings: Vec<String>,

    /// Budget band for new curriculum adoption
    pub budget: Option<String>,

    /// District goals driving the plan
    pub goals: Vec<String>,

    /// Career/graduation pathways of interest
    pub pathways: Vec<String>,

    /// Locale tag for generated output (e.g. "en-US")
    pub locale: String,
}

impl DistrictProfile {
    /// Names of required fields that are missing or empty
    ///
    /// An empty return value means the profile is structurally complete
    /// and may be persisted.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.district_name.trim().is_empty() {
            missing.push("district_name");
        }
        if self.grade_levels.is_empty() {
            missing.push("grade_levels");
        }
        if self.goals.is_empty() {
            missing.push("goals");
        }
        missing
    }

    pub fn is_complete(&self) -> bool {
        self.missing_fields().is_empty()
    }

    /// One-line summary used as retrieval query seed
    pub fn summary(&self) -> String {
        format!(
            "{} serving grades {}; goals: {}",
            self.district_name,
            self.grade_levels.join(", "),
            self.goals.join("; ")
        )
    }
}
