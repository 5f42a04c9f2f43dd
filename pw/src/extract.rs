//! Structured plan extraction from generated markdown
//!
//! Section-based parser for the layout the generation prompt asks for.
//! Tolerant by design: any section or bullet that fails to parse is left
//! absent rather than failing the extraction — partial plans are valid and
//! render sensibly downstream. Plain conversational text extracts nothing,
//! which is how refinement answers are told apart from plan updates.

use tracing::debug;

use crate::domain::{CurriculumRecommendation, Plan, RoadmapPhase, ScopeSequenceEntry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    None,
    ExecutiveSummary,
    ScopeSequence,
    Recommendations,
    Roadmap,
    ProfessionalDevelopment,
    SuccessMetrics,
}

/// Parse accumulated generation output into a plan
///
/// Never fails: the worst case is a raw-text-only plan with every
/// structured field empty.
pub fn parse_plan(raw: &str, version: u32) -> Plan {
    let mut plan = Plan {
        version,
        raw_text: raw.to_string(),
        created_at: chrono::Utc::now().timestamp_millis(),
        ..Default::default()
    };

    let mut section = Section::None;
    let mut summary_lines: Vec<&str> = Vec::new();

    for line in raw.lines() {
        let trimmed = line.trim();

        if let Some(title) = trimmed.strip_prefix("# ") {
            if plan.title.is_empty() {
                plan.title = title.trim().to_string();
            }
            continue;
        }

        if let Some(heading) = trimmed.strip_prefix("## ") {
            section = classify_heading(heading);
            continue;
        }

        match section {
            Section::None => {}
            Section::ExecutiveSummary => {
                if !trimmed.is_empty() {
                    summary_lines.push(trimmed);
                }
            }
            Section::ScopeSequence => {
                if let Some(band) = trimmed.strip_prefix("### ") {
                    plan.scope_sequence.push(ScopeSequenceEntry {
                        grade_band: band.trim().to_string(),
                        ..Default::default()
                    });
                } else if let Some(bullet) = trimmed.strip_prefix("- ") {
                    if let Some(entry) = plan.scope_sequence.last_mut() {
                        apply_scope_bullet(entry, bullet);
                    }
                }
            }
            Section::Recommendations => {
                if let Some(bullet) = trimmed.strip_prefix("- ") {
                    if let Some(rec) = parse_recommendation(bullet) {
                        plan.recommendations.push(rec);
                    }
                }
            }
            Section::Roadmap => {
                if let Some(heading) = trimmed.strip_prefix("### ") {
                    plan.roadmap.push(parse_phase_heading(heading));
                } else if let Some(bullet) = trimmed.strip_prefix("- ") {
                    if plan.roadmap.is_empty() {
                        plan.roadmap.push(RoadmapPhase {
                            name: "Implementation".to_string(),
                            ..Default::default()
                        });
                    }
                    if let Some(phase) = plan.roadmap.last_mut() {
                        phase.actions.push(bullet.trim().to_string());
                    }
                }
            }
            Section::ProfessionalDevelopment => {
                if let Some(bullet) = trimmed.strip_prefix("- ") {
                    plan.professional_development.push(bullet.trim().to_string());
                }
            }
            Section::SuccessMetrics => {
                if let Some(bullet) = trimmed.strip_prefix("- ") {
                    plan.success_metrics.push(bullet.trim().to_string());
                }
            }
        }
    }

    plan.executive_summary = summary_lines.join("\n");

    debug!(
        version,
        structured = plan.is_structured(),
        scope_entries = plan.scope_sequence.len(),
        recommendations = plan.recommendations.len(),
        "plan extraction complete"
    );
    plan
}

fn classify_heading(heading: &str) -> Section {
    let h = heading.to_lowercase();
    if h.contains("executive") || h.contains("summary") {
        Section::ExecutiveSummary
    } else if h.contains("scope") {
        Section::ScopeSequence
    } else if h.contains("recommendation") {
        Section::Recommendations
    } else if h.contains("roadmap") || h.contains("implementation") {
        Section::Roadmap
    } else if h.contains("professional") {
        Section::ProfessionalDevelopment
    } else if h.contains("metric") {
        Section::SuccessMetrics
    } else {
        Section::None
    }
}

/// Apply a `- Key: values` bullet to a scope-sequence entry
fn apply_scope_bullet(entry: &mut ScopeSequenceEntry, bullet: &str) {
    let Some((key, value)) = bullet.split_once(':') else {
        return;
    };
    let key = key.trim().to_lowercase();
    let value = value.trim();

    if key.contains("competenc") {
        entry.competencies = split_list(value);
    } else if key.contains("curricul") {
        entry.curricula = split_list(value);
    } else if key.contains("standard") {
        entry.standards = split_list(value);
    } else if key.contains("time") || key.contains("hours") {
        entry.weekly_hours = parse_hours(value);
    }
}

/// Parse `Name (bands): rationale` recommendation bullets
fn parse_recommendation(bullet: &str) -> Option<CurriculumRecommendation> {
    let (head, rationale) = bullet.split_once(':')?;
    let head = head.trim().trim_matches('*').trim();
    if head.is_empty() {
        return None;
    }

    let (name, grade_bands) = match head.split_once('(') {
        Some((name, rest)) => {
            let bands = rest
                .trim_end_matches(')')
                .trim_start_matches("grades")
                .trim_start_matches("Grades")
                .trim();
            (name.trim(), split_list(bands))
        }
        None => (head, Vec::new()),
    };

    Some(CurriculumRecommendation {
        name: name.trim_matches('*').trim().to_string(),
        grade_bands,
        rationale: rationale.trim().to_string(),
        url: None,
    })
}

/// Parse `Phase name (timeframe)` roadmap headings
fn parse_phase_heading(heading: &str) -> RoadmapPhase {
    match heading.trim().split_once('(') {
        Some((name, rest)) => RoadmapPhase {
            name: name.trim().to_string(),
            timeframe: Some(rest.trim_end_matches(')').trim().to_string()),
            actions: Vec::new(),
        },
        None => RoadmapPhase {
            name: heading.trim().to_string(),
            timeframe: None,
            actions: Vec::new(),
        },
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(';')
        .flat_map(|part| part.split(','))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_hours(value: &str) -> Option<f32> {
    let number: String = value
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    number.parse().ok()
}
