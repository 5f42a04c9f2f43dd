//! Plan export rendering
//!
//! Two formats: a markdown document built from the structured fields
//! (falling back to the raw generated text when extraction found nothing)
//! and a JSON dump of the full plan for machine consumers.

use handlebars::Handlebars;
use std::str::FromStr;

use crate::domain::Plan;
use crate::error::PlanError;

const MARKDOWN_TEMPLATE: &str = "\
# {{plan.title}}

*Plan version {{plan.version}}*

## Executive Summary

{{plan.executive_summary}}
{{#if plan.scope_sequence}}

## Scope and Sequence
{{#each plan.scope_sequence}}

### {{this.grade_band}}

{{#if this.competencies}}- Competencies: {{#each this.competencies}}{{this}}{{#unless @last}}; {{/unless}}{{/each}}
{{/if}}{{#if this.curricula}}- Curricula: {{#each this.curricula}}{{this}}{{#unless @last}}; {{/unless}}{{/each}}
{{/if}}{{#if this.standards}}- Standards: {{#each this.standards}}{{this}}{{#unless @last}}; {{/unless}}{{/each}}
{{/if}}{{#if this.weekly_hours}}- Instruction time: {{this.weekly_hours}} hours/week
{{/if}}{{/each}}{{/if}}
{{#if plan.recommendations}}

## Curriculum Recommendations
{{#each plan.recommendations}}
- {{#if this.url}}[{{this.name}}]({{this.url}}){{else}}{{this.name}}{{/if}}{{#if this.grade_bands}} (grades {{#each this.grade_bands}}{{this}}{{#unless @last}}, {{/unless}}{{/each}}){{/if}}: {{this.rationale}}
{{/each}}{{/if}}
{{#if plan.roadmap}}

## Implementation Roadmap
{{#each plan.roadmap}}

### {{this.name}}{{#if this.timeframe}} ({{this.timeframe}}){{/if}}

{{#each this.actions}}- {{this}}
{{/each}}{{/each}}{{/if}}
{{#if plan.professional_development}}

## Professional Development

{{#each plan.professional_development}}- {{this}}
{{/each}}{{/if}}
{{#if plan.success_metrics}}

## Success Metrics

{{#each plan.success_metrics}}- {{this}}
{{/each}}{{/if}}";

/// Output format for a plan export
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Markdown,
    Json,
}

impl FromStr for ExportFormat {
    type Err = PlanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "markdown" | "md" => Ok(ExportFormat::Markdown),
            "json" => Ok(ExportFormat::Json),
            other => Err(PlanError::Configuration(format!(
                "unknown export format '{other}' (expected markdown or json)"
            ))),
        }
    }
}

/// Render a plan version for export
///
/// Exports are derived from the immutable plan version, so exporting never
/// changes what a later refinement sees.
pub fn export_plan(plan: &Plan, format: ExportFormat) -> Result<String, PlanError> {
    match format {
        ExportFormat::Json => {
            serde_json::to_string_pretty(plan).map_err(|e| PlanError::Parse(format!("plan serialization failed: {e}")))
        }
        ExportFormat::Markdown => {
            if !plan.is_structured() {
                return Ok(plan.raw_text.clone());
            }
            let mut registry = Handlebars::new();
            registry.register_escape_fn(handlebars::no_escape);
            registry
                .register_template_string("markdown", MARKDOWN_TEMPLATE)
                .map_err(|e| PlanError::Configuration(format!("bad export template: {e}")))?;
            registry
                .render("markdown", &serde_json::json!({ "plan": plan }))
                .map_err(|e| PlanError::Parse(format!("export render failed: {e}")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CurriculumRecommendation, RoadmapPhase, ScopeSequenceEntry};

    fn plan() -> Plan {
        Plan {
            version: 2,
            title: "Riverdale CS Plan".to_string(),
            executive_summary: "A phased expansion.".to_string(),
            scope_sequence: vec![ScopeSequenceEntry {
                grade_band: "Grades 6-8".to_string(),
                competencies: vec!["computational thinking".to_string()],
                curricula: vec!["CS Discoveries".to_string()],
                standards: vec!["CSTA 2-AP-11".to_string()],
                weekly_hours: Some(3.0),
            }],
            recommendations: vec![CurriculumRecommendation {
                name: "CS Discoveries".to_string(),
                grade_bands: vec!["6-8".to_string()],
                rationale: "solid fit".to_string(),
                url: Some("https://code.org/educate/csd".to_string()),
            }],
            roadmap: vec![RoadmapPhase {
                name: "Foundation".to_string(),
                timeframe: Some("Year 1".to_string()),
                actions: vec!["Train teachers".to_string()],
            }],
            professional_development: vec!["Summer institute".to_string()],
            success_metrics: vec!["80% completion".to_string()],
            raw_text: "raw".to_string(),
            created_at: 0,
        }
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("markdown".parse::<ExportFormat>().unwrap(), ExportFormat::Markdown);
        assert_eq!("MD".parse::<ExportFormat>().unwrap(), ExportFormat::Markdown);
        assert_eq!("json".parse::<ExportFormat>().unwrap(), ExportFormat::Json);
        assert!("pdf".parse::<ExportFormat>().is_err());
    }

    #[test]
    fn test_markdown_export_contains_all_sections() {
        let output = export_plan(&plan(), ExportFormat::Markdown).unwrap();

        assert!(output.contains("# Riverdale CS Plan"));
        assert!(output.contains("version 2"));
        assert!(output.contains("### Grades 6-8"));
        assert!(output.contains("- Standards: CSTA 2-AP-11"));
        assert!(output.contains("[CS Discoveries](https://code.org/educate/csd)"));
        assert!(output.contains("### Foundation (Year 1)"));
        assert!(output.contains("- Summer institute"));
        assert!(output.contains("- 80% completion"));
    }

    #[test]
    fn test_markdown_export_unstructured_falls_back_to_raw() {
        let plan = Plan {
            raw_text: "Just an answer.".to_string(),
            ..Default::default()
        };
        assert_eq!(export_plan(&plan, ExportFormat::Markdown).unwrap(), "Just an answer.");
    }

    #[test]
    fn test_json_export_roundtrips() {
        let original = plan();
        let json = export_plan(&original, ExportFormat::Json).unwrap();
        let back: Plan = serde_json::from_str(&json).unwrap();

        assert_eq!(back, original);
        assert_eq!(back.scope_sequence.len(), 1);
        assert_eq!(back.recommendations[0].url.as_deref(), Some("https://code.org/educate/csd"));
    }
}
