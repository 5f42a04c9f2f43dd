//! Prompt templates for plan generation and refinement
//!
//! Handlebars templates embedded at compile time, rendered with a serde
//! context. The generation template pins the output layout the extractor
//! parses (`extract::parse_plan`).

use handlebars::Handlebars;
use serde::Serialize;

use crate::domain::DistrictProfile;
use crate::error::PlanError;
use corpusstore::SearchHit;

const GENERATE_SYSTEM: &str = "\
You are a curriculum planning assistant for school districts.
Produce a complete computer science curriculum plan for the district below.
Respond in {{locale}}.

District profile:
- Name: {{profile.district_name}}
- Grade levels: {{#each profile.grade_levels}}{{this}}{{#unless @last}}, {{/unless}}{{/each}}
- Current offerings: {{#each profile.current_offerings}}{{this}}{{#unless @last}}, {{/unless}}{{/each}}
{{#if profile.budget}}- Budget: {{profile.budget}}{{/if}}
- Goals: {{#each profile.goals}}{{this}}{{#unless @last}}; {{/unless}}{{/each}}
{{#if profile.pathways}}- Pathways: {{#each profile.pathways}}{{this}}{{#unless @last}}, {{/unless}}{{/each}}{{/if}}

{{#if documents}}
Reference material (cite only what you use):
{{#each documents}}
[{{this.id}}] {{this.title}} ({{this.doc_type}})
{{this.excerpt}}

{{/each}}
{{/if}}
Structure the response exactly as:
# <plan title>
## Executive Summary
## Scope and Sequence
One '### <grade band>' subsection per band, each with bullets:
- Competencies: <semicolon-separated>
- Curricula: <semicolon-separated>
- Standards: <semicolon-separated>
- Instruction time: <N> hours/week
## Curriculum Recommendations
Bullets of the form '- <name> (grades <bands>): <rationale>'
## Implementation Roadmap
One '### <phase> (<timeframe>)' subsection per phase with action bullets.
## Professional Development
## Success Metrics
";

const REFINE_SYSTEM: &str = "\
You are refining an existing curriculum plan with the district.
Respond in {{locale}}.

Current plan (version {{plan_version}}):
{{plan_text}}

If the request changes the plan, emit the complete updated plan in the
same markdown structure, starting with a '# ' title line.
If the request is a question or comment, answer conversationally without
any markdown headings.
";

#[derive(Debug, Serialize)]
struct DocContext {
    id: String,
    title: String,
    doc_type: String,
    excerpt: String,
}

#[derive(Debug, Serialize)]
struct GenerateContext<'a> {
    profile: &'a DistrictProfile,
    locale: String,
    documents: Vec<DocContext>,
}

#[derive(Debug, Serialize)]
struct RefineContext<'a> {
    locale: String,
    plan_version: u32,
    plan_text: &'a str,
}

/// Characters of document content included per retrieved hit
const EXCERPT_CHARS: usize = 1200;

/// Template renderer constructed once and shared
pub struct PromptRenderer {
    registry: Handlebars<'static>,
}

impl PromptRenderer {
    pub fn new() -> Result<Self, PlanError> {
        let mut registry = Handlebars::new();
        registry.register_escape_fn(handlebars::no_escape);
        registry
            .register_template_string("generate", GENERATE_SYSTEM)
            .map_err(|e| PlanError::Configuration(format!("bad generate template: {e}")))?;
        registry
            .register_template_string("refine", REFINE_SYSTEM)
            .map_err(|e| PlanError::Configuration(format!("bad refine template: {e}")))?;
        Ok(Self { registry })
    }

    /// Render the initial-generation system prompt
    pub fn generate_prompt(&self, profile: &DistrictProfile, hits: &[SearchHit]) -> Result<String, PlanError> {
        let documents = hits
            .iter()
            .map(|hit| DocContext {
                id: hit.document.id.clone(),
                title: doc_title(&hit.document.content),
                doc_type: hit.document.doc_type.as_str().to_string(),
                excerpt: hit.document.content.chars().take(EXCERPT_CHARS).collect(),
            })
            .collect();

        let context = GenerateContext {
            profile,
            locale: locale_or_default(&profile.locale),
            documents,
        };
        self.registry
            .render("generate", &context)
            .map_err(|e| PlanError::Configuration(format!("prompt render failed: {e}")))
    }

    /// Render the refinement system prompt
    pub fn refine_prompt(&self, locale: &str, plan_version: u32, plan_text: &str) -> Result<String, PlanError> {
        let context = RefineContext {
            locale: locale_or_default(locale),
            plan_version,
            plan_text,
        };
        self.registry
            .render("refine", &context)
            .map_err(|e| PlanError::Configuration(format!("prompt render failed: {e}")))
    }
}

/// First line of canonical content doubles as a display title
pub fn doc_title(content: &str) -> String {
    content.lines().next().unwrap_or("").trim().to_string()
}

fn locale_or_default(locale: &str) -> String {
    if locale.trim().is_empty() {
        "en-US".to_string()
    } else {
        locale.to_string()
    }
}
