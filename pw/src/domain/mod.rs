//! Domain entities: district profile, conversation, plan

mod conversation;
mod plan;
mod profile;

pub use conversation::{Conversation, Message, SourceRef};
pub use plan::{CurriculumRecommendation, Plan, RoadmapPhase, ScopeSequenceEntry};
pub use profile::DistrictProfile;
