//! Plan orchestrator: retrieval, prompting and streamed generation
//!
//! One exchange per call. The orchestrator retrieves context, emits a
//! sources event, streams content deltas as the provider produces them,
//! and closes with a terminal done or error event. The caller owns the
//! conversation; the orchestrator never mutates it, so aborting an
//! exchange discards its partial output with no cleanup.

use std::sync::{Arc, Mutex};

use corpusstore::{CorpusStore, DocFilter, SearchHit};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::config::{LlmConfig, RetrievalConfig};
use crate::domain::{DistrictProfile, Plan, SourceRef};
use crate::error::PlanError;
use crate::extract::parse_plan;
use crate::llm::{ChatChunk, ChatMessage, ChatRequest, EmbeddingClient, LlmClient};
use crate::lookup::StandardsLookup;
use crate::prompts::{PromptRenderer, doc_title};
use crate::retrieve::Retriever;
use crate::stream::{EVENT_CHANNEL_CAPACITY, GenerationOutcome, StreamEvent};

/// Internal chunk-channel capacity between provider and forwarder
const CHUNK_CHANNEL_CAPACITY: usize = 32;

/// Synthetic user message for the initial generation exchange
///
/// Shared with the wizard so the persisted user message always matches
/// what was sent to the provider.
pub(crate) const GENERATE_USER_PROMPT: &str = "Generate the complete curriculum plan for this district.";

/// What a completed exchange produced
#[derive(Debug)]
pub struct ExchangeResult {
    /// Full assistant text, already streamed as deltas
    pub assistant_text: String,
    /// Extracted plan when the output was a structured plan document
    pub plan: Option<Plan>,
    /// Documents cited for this exchange
    pub sources: Vec<SourceRef>,
}

/// A running exchange
///
/// Dropping the handle or calling [`abort`](Self::abort) cancels the
/// exchange; no terminal event is emitted and the result resolves to
/// [`PlanError::Cancelled`].
#[derive(Debug)]
pub struct GenerationHandle {
    events: mpsc::Receiver<StreamEvent>,
    result: oneshot::Receiver<Result<ExchangeResult, PlanError>>,
    task: JoinHandle<()>,
}

impl GenerationHandle {
    /// Next event, or None once the stream is finished or aborted
    pub async fn next_event(&mut self) -> Option<StreamEvent> {
        self.events.recv().await
    }

    /// Wait for the exchange outcome, discarding any unread events
    pub async fn into_result(self) -> Result<ExchangeResult, PlanError> {
        drop(self.events);
        self.result.await.unwrap_or(Err(PlanError::Cancelled))
    }

    /// Cancel the exchange without waiting for the provider
    pub fn abort(&self) {
        self.task.abort();
    }

    /// Detached handle for aborting after the receiver is handed off
    pub fn abort_handle(&self) -> tokio::task::AbortHandle {
        self.task.abort_handle()
    }
}

enum ExchangeKind {
    Generate,
    Refine { plan_text: String },
}

/// Drives retrieval-augmented generation exchanges
pub struct Orchestrator {
    llm: Arc<dyn LlmClient>,
    retriever: Arc<Retriever>,
    prompts: Arc<PromptRenderer>,
    lookup: Arc<StandardsLookup>,
    max_tokens: u32,
}

impl Orchestrator {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        embedder: Arc<dyn EmbeddingClient>,
        store: Arc<Mutex<CorpusStore>>,
        retrieval: RetrievalConfig,
        llm_config: &LlmConfig,
    ) -> Result<Self, PlanError> {
        Ok(Self {
            llm,
            retriever: Arc::new(Retriever::new(embedder, store, retrieval)),
            prompts: Arc::new(PromptRenderer::new()?),
            lookup: Arc::new(StandardsLookup::builtin()),
            max_tokens: llm_config.max_tokens,
        })
    }

    /// Start initial plan generation from a confirmed profile
    pub fn generate(&self, profile: DistrictProfile, next_version: u32) -> GenerationHandle {
        self.spawn_exchange(
            profile,
            Vec::new(),
            GENERATE_USER_PROMPT.to_string(),
            ExchangeKind::Generate,
            next_version,
        )
    }

    /// Start a refinement exchange against the current plan
    ///
    /// `history` is the frozen conversation so far; the new user message is
    /// appended by the orchestrator for the provider call only.
    pub fn refine(
        &self,
        profile: DistrictProfile,
        history: Vec<ChatMessage>,
        user_text: String,
        current_plan: &Plan,
        next_version: u32,
    ) -> GenerationHandle {
        self.spawn_exchange(
            profile,
            history,
            user_text,
            ExchangeKind::Refine {
                plan_text: current_plan.raw_text.clone(),
            },
            next_version,
        )
    }

    fn spawn_exchange(
        &self,
        profile: DistrictProfile,
        history: Vec<ChatMessage>,
        user_text: String,
        kind: ExchangeKind,
        next_version: u32,
    ) -> GenerationHandle {
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let (result_tx, result_rx) = oneshot::channel();

        let llm = self.llm.clone();
        let retriever = self.retriever.clone();
        let prompts = self.prompts.clone();
        let lookup = self.lookup.clone();
        let max_tokens = self.max_tokens;

        let task = tokio::spawn(async move {
            let outcome = run_exchange(
                llm, retriever, prompts, lookup, profile, history, user_text, kind, next_version, max_tokens,
                &event_tx,
            )
            .await;

            if let Err(e) = &outcome {
                if e.is_user_visible() {
                    error!(error = %e, "exchange failed");
                    let _ = event_tx.send(StreamEvent::error(e.to_string())).await;
                }
            }
            let _ = result_tx.send(outcome);
        });

        GenerationHandle {
            events: event_rx,
            result: result_rx,
            task,
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_exchange(
    llm: Arc<dyn LlmClient>,
    retriever: Arc<Retriever>,
    prompts: Arc<PromptRenderer>,
    lookup: Arc<StandardsLookup>,
    profile: DistrictProfile,
    mut history: Vec<ChatMessage>,
    user_text: String,
    kind: ExchangeKind,
    next_version: u32,
    max_tokens: u32,
    events: &mpsc::Sender<StreamEvent>,
) -> Result<ExchangeResult, PlanError> {
    let query = match &kind {
        ExchangeKind::Generate => profile.summary(),
        ExchangeKind::Refine { .. } => user_text.clone(),
    };

    let hits = retriever.retrieve(&query, &DocFilter::new()).await?;
    let sources = sources_from_hits(&hits, &lookup);
    debug!(count = sources.len(), "sources resolved");
    let _ = events
        .send(StreamEvent::Sources {
            documents: sources.clone(),
        })
        .await;

    let system_prompt = match &kind {
        ExchangeKind::Generate => prompts.generate_prompt(&profile, &hits)?,
        ExchangeKind::Refine { plan_text } => {
            prompts.refine_prompt(&profile.locale, next_version.saturating_sub(1), plan_text)?
        }
    };

    history.push(ChatMessage::user(user_text));
    let request = ChatRequest {
        system_prompt,
        messages: history,
        max_tokens,
    };

    let (chunk_tx, mut chunk_rx) = mpsc::channel(CHUNK_CHANNEL_CAPACITY);

    // The provider future stays inside this task so that aborting the
    // exchange drops the in-flight request too, instead of leaving it
    // streaming in a detached task.
    let stream_fut = llm.stream(request, chunk_tx);
    tokio::pin!(stream_fut);

    let mut assistant_text = String::new();
    let mut provider_result = None;
    loop {
        tokio::select! {
            chunk = chunk_rx.recv() => match chunk {
                Some(ChatChunk::TextDelta(delta)) => {
                    assistant_text.push_str(&delta);
                    let _ = events.send(StreamEvent::content(delta)).await;
                }
                Some(ChatChunk::Done { .. }) | None => break,
            },
            result = &mut stream_fut, if provider_result.is_none() => {
                provider_result = Some(result);
            }
        }
    }

    match provider_result {
        Some(result) => result?,
        None => stream_fut.await?,
    };

    let (plan, outcome) = finish_exchange(&assistant_text, next_version, &lookup);
    info!(version = next_version, structured = plan.is_some(), "exchange complete");
    let _ = events.send(StreamEvent::Done { outcome }).await;

    Ok(ExchangeResult {
        assistant_text,
        plan,
        sources,
    })
}

/// Classify the finished text as a plan update or a plain answer
fn finish_exchange(text: &str, next_version: u32, lookup: &StandardsLookup) -> (Option<Plan>, GenerationOutcome) {
    let mut plan = parse_plan(text, next_version);
    if !plan.is_structured() {
        return (None, GenerationOutcome::Answer);
    }
    for rec in &mut plan.recommendations {
        if rec.url.is_none() {
            rec.url = lookup.resolve(&rec.name).map(String::from);
        }
    }
    (Some(plan), GenerationOutcome::PlanUpdate { version: next_version })
}

/// Deduplicated source references in rank order
fn sources_from_hits(hits: &[SearchHit], lookup: &StandardsLookup) -> Vec<SourceRef> {
    let mut seen = std::collections::BTreeSet::new();
    hits.iter()
        .filter(|hit| seen.insert(hit.document.id.clone()))
        .map(|hit| {
            let title = doc_title(&hit.document.content);
            let url = lookup.resolve(&title).map(String::from);
            SourceRef {
                document_id: hit.document.id.clone(),
                title,
                doc_type: hit.document.doc_type.as_str().to_string(),
                url,
            }
        })
        .collect()
}
