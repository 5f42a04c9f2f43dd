//! Plan entity and its structured sections

use serde::{Deserialize, Serialize};

/// One grade band's slice of the scope & sequence
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScopeSequenceEntry {
    /// Grade band (K-2, 3-5, 6-8, 9-10, 11-12)
    pub grade_band: String,
    /// Competencies targeted in this band
    pub competencies: Vec<String>,
    /// Curricula delivering the competencies
    pub curricula: Vec<String>,
    /// Standards covered (framework-qualified identifiers)
    pub standards: Vec<String>,
    /// Recommended weekly instruction hours
    pub weekly_hours: Option<f32>,
}

/// A recommended curriculum product or program
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CurriculumRecommendation {
    pub name: String,
    /// Grade bands the recommendation applies to
    pub grade_bands: Vec<String>,
    /// Why this curriculum fits the district
    pub rationale: String,
    /// Resolved link, when the lookup service knows the name
    pub url: Option<String>,
}

/// One phase of the implementation roadmap
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoadmapPhase {
    pub name: String,
    /// Timeframe label ("Year 1, Fall" etc.)
    pub timeframe: Option<String>,
    pub actions: Vec<String>,
}

/// A versioned curriculum plan
///
/// Every regeneration produces a new version; a version is never mutated
/// after being produced, since exports reference a specific version.
/// Fields that failed extraction stay empty - partial plans are valid.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    /// Monotonically increasing per conversation, starting at 1
    pub version: u32,
    pub title: String,
    pub executive_summary: String,
    pub scope_sequence: Vec<ScopeSequenceEntry>,
    pub recommendations: Vec<CurriculumRecommendation>,
    pub roadmap: Vec<RoadmapPhase>,
    pub professional_development: Vec<String>,
    pub success_metrics: Vec<String>,
    /// Full generated text the structured fields were extracted from
    pub raw_text: String,
    /// Creation timestamp (unix ms)
    pub created_at: i64,
}

impl Plan {
    /// Whether any structured section was successfully extracted
    ///
    /// A refinement answer that is plain conversation extracts nothing and
    /// is reported as an answer, not a plan update.
    pub fn is_structured(&self) -> bool {
        !self.title.is_empty()
            && (!self.scope_sequence.is_empty()
                || !self.recommendations.is_empty()
                || !self.roadmap.is_empty()
                || !self.executive_summary.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_plan_is_not_structured() {
        assert!(!Plan::default().is_structured());
    }

    #[test]
    fn test_plan_with_summary_is_structured() {
        let plan = Plan {
            version: 1,
            title: "CS Plan".to_string(),
            executive_summary: "A plan.".to_string(),
            ..Default::default()
        };
        assert!(plan.is_structured());
    }

    #[test]
    fn test_json_roundtrip_preserves_counts() {
        let plan = Plan {
            version: 2,
            title: "CS Plan".to_string(),
            scope_sequence: vec![ScopeSequenceEntry::default(), ScopeSequenceEntry::default()],
            recommendations: vec![CurriculumRecommendation::default()],
            ..Default::default()
        };

        let json = serde_json::to_string(&plan).unwrap();
        let back: Plan = serde_json::from_str(&json).unwrap();

        assert_eq!(back.scope_sequence.len(), 2);
        assert_eq!(back.recommendations.len(), 1);
        assert_eq!(back.version, 2);
    }
}
