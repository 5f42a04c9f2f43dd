//! Planwizard - retrieval-augmented curriculum plan generation
//!
//! Planwizard turns a structured district profile into a versioned
//! computer science curriculum plan. Retrieval runs against a local
//! embedded corpus of standards, policies and curricula; generation
//! streams through a framed event protocol so consumers render partial
//! output and can abort mid-flight without corrupting conversation state.
//!
//! # Core Concepts
//!
//! - **Grounded generation**: every exchange retrieves corpus documents
//!   first and cites them as sources
//! - **Versioned plans**: each regeneration appends an immutable plan
//!   version; refinement answers leave the version untouched
//! - **Frozen history**: messages join the conversation only once an
//!   exchange succeeds, so aborts and failures leave no partial state
//!
//! # Modules
//!
//! - [`wizard`] - Session state machine (profile, review, generate, refine, export)
//! - [`orchestrator`] - Retrieval-augmented generation exchanges
//! - [`index`] / [`retrieve`] - Corpus embedding and similarity search
//! - [`stream`] - Framed streaming events and the NDJSON codec
//! - [`llm`] - Provider clients for generation and embeddings
//! - [`config`] - Configuration types and loading

pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod export;
pub mod extract;
pub mod index;
pub mod llm;
pub mod lookup;
pub mod orchestrator;
pub mod persist;
pub mod progress;
pub mod prompts;
pub mod retrieve;
pub mod stream;
pub mod wizard;

// Re-export commonly used types
pub use config::{Config, EmbeddingConfig, IndexingConfig, LlmConfig, RetrievalConfig, StorageConfig};
pub use domain::{Conversation, CurriculumRecommendation, DistrictProfile, Message, Plan, RoadmapPhase,
    ScopeSequenceEntry, SourceRef};
pub use error::PlanError;
pub use export::{ExportFormat, export_plan};
pub use extract::parse_plan;
pub use index::{CorpusRecord, IndexError, Indexer, IngestReport};
pub use llm::{EmbeddingClient, LlmClient, LlmError, create_embedding_client, create_llm_client};
pub use orchestrator::{ExchangeResult, GenerationHandle, Orchestrator};
pub use persist::{FileSessionStore, SessionStore};
pub use retrieve::Retriever;
pub use stream::{FrameDecoder, GenerationOutcome, StreamEvent, encode_frame};
pub use wizard::{WizardSession, WizardStep};
