//! Wizard session state machine
//!
//! Five steps: profile intake, review, generation, refinement, export.
//! The session owns the conversation and the plan version history; the
//! orchestrator runs exchanges without touching either, and results are
//! applied here once an exchange terminates. Aborted or failed exchanges
//! therefore leave the conversation exactly as it was.

use std::sync::Arc;

use tokio::task::AbortHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::{Conversation, DistrictProfile, Message, Plan};
use crate::error::PlanError;
use crate::orchestrator::{ExchangeResult, GenerationHandle, Orchestrator};
use crate::persist::SessionStore;

/// Where the session currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WizardStep {
    /// Collecting the district profile
    Profile,
    /// Profile confirmed, awaiting generation
    Review,
    /// Initial generation in flight
    Generate,
    /// A plan exists; conversational refinement
    Refine,
    /// Reviewing export output
    Export,
}

enum PendingExchange {
    Generate { user_text: String },
    Refine { user_text: String },
}

/// One user's planning session
pub struct WizardSession {
    orchestrator: Arc<Orchestrator>,
    sessions: Arc<dyn SessionStore>,
    step: WizardStep,
    profile: DistrictProfile,
    profile_id: Option<String>,
    conversation: Conversation,
    plans: Vec<Plan>,
    pending: Option<PendingExchange>,
    active: Option<AbortHandle>,
}

impl WizardSession {
    pub fn new(orchestrator: Arc<Orchestrator>, sessions: Arc<dyn SessionStore>) -> Self {
        Self {
            orchestrator,
            sessions,
            step: WizardStep::Profile,
            profile: DistrictProfile::default(),
            profile_id: None,
            conversation: Conversation::new(""),
            plans: Vec::new(),
            pending: None,
            active: None,
        }
    }

    pub fn step(&self) -> WizardStep {
        self.step
    }

    pub fn profile(&self) -> &DistrictProfile {
        &self.profile
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Latest plan version, if any has been produced
    pub fn current_plan(&self) -> Option<&Plan> {
        self.plans.last()
    }

    pub fn plan_versions(&self) -> &[Plan] {
        &self.plans
    }

    /// Validate and persist the profile, then advance to review
    ///
    /// An incomplete profile is rejected before any write happens; a failed
    /// save keeps the session in the profile step with the draft intact.
    /// Re-submitting from review is the explicit edit-and-resave path.
    pub fn submit_profile(&mut self, profile: DistrictProfile) -> Result<(), PlanError> {
        if !matches!(self.step, WizardStep::Profile | WizardStep::Review) {
            return Err(PlanError::InvalidTransition(format!(
                "cannot edit the profile during {:?}",
                self.step
            )));
        }

        let missing = profile.missing_fields();
        if !missing.is_empty() {
            return Err(PlanError::Configuration(format!(
                "profile incomplete: missing {}",
                missing.join(", ")
            )));
        }

        let profile_id = self
            .profile_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        self.sessions.save_profile(&profile_id, &profile)?;

        info!(profile_id = %profile_id, district = %profile.district_name, "profile confirmed");
        if self.profile_id.is_none() {
            self.conversation = Conversation::new(profile_id.clone());
        }
        self.profile = profile;
        self.profile_id = Some(profile_id);
        self.step = WizardStep::Review;
        Ok(())
    }

    /// Start the initial generation exchange
    ///
    /// Single-flight: any prior in-flight exchange is aborted first.
    pub fn begin_generation(&mut self) -> Result<GenerationHandle, PlanError> {
        if self.step != WizardStep::Review {
            return Err(PlanError::InvalidTransition(format!(
                "generation starts from review, not {:?}",
                self.step
            )));
        }

        self.abort_active();
        let handle = self.orchestrator.generate(self.profile.clone(), self.next_version());
        self.active = Some(handle.abort_handle());
        self.pending = Some(PendingExchange::Generate {
            user_text: crate::orchestrator::GENERATE_USER_PROMPT.to_string(),
        });
        self.step = WizardStep::Generate;
        Ok(handle)
    }

    /// Start a refinement exchange against the current plan
    pub fn request_refinement(&mut self, user_text: impl Into<String>) -> Result<GenerationHandle, PlanError> {
        if self.step != WizardStep::Refine {
            return Err(PlanError::InvalidTransition(format!(
                "refinement requires an existing plan, current step {:?}",
                self.step
            )));
        }
        if self.plans.is_empty() {
            return Err(PlanError::InvalidTransition("no plan to refine".to_string()));
        }

        let user_text = user_text.into();
        self.abort_active();
        let current = self
            .plans
            .last()
            .ok_or_else(|| PlanError::InvalidTransition("no plan to refine".to_string()))?;
        let history = self
            .conversation
            .messages
            .iter()
            .map(|m| crate::llm::ChatMessage {
                role: m.role,
                content: m.content.clone(),
            })
            .collect();
        let handle = self.orchestrator.refine(
            self.profile.clone(),
            history,
            user_text.clone(),
            current,
            self.next_version(),
        );
        self.active = Some(handle.abort_handle());
        self.pending = Some(PendingExchange::Refine { user_text });
        Ok(handle)
    }

    /// Apply a terminated exchange's outcome to the session
    ///
    /// Called with the value of [`GenerationHandle::into_result`]. On
    /// success the user and assistant messages are frozen into the
    /// conversation and saved; on failure or cancellation nothing is
    /// appended, so history reads as if the exchange never happened.
    pub fn complete_exchange(&mut self, outcome: Result<ExchangeResult, PlanError>) -> Result<(), PlanError> {
        let pending = self
            .pending
            .take()
            .ok_or_else(|| PlanError::InvalidTransition("no exchange in flight".to_string()))?;
        self.active = None;

        match outcome {
            Ok(result) => self.apply_result(pending, result),
            Err(PlanError::Cancelled) => {
                debug!("exchange cancelled, discarding partial output");
                if matches!(pending, PendingExchange::Generate { .. }) {
                    self.step = WizardStep::Review;
                }
                Ok(())
            }
            Err(e) => {
                if matches!(pending, PendingExchange::Generate { .. }) {
                    self.step = WizardStep::Review;
                }
                Err(e)
            }
        }
    }

    fn apply_result(&mut self, pending: PendingExchange, result: ExchangeResult) -> Result<(), PlanError> {
        let user_text = match &pending {
            PendingExchange::Generate { user_text } | PendingExchange::Refine { user_text } => user_text.clone(),
        };

        if matches!(pending, PendingExchange::Generate { .. }) && result.plan.is_none() {
            // Initial generation must yield a plan document
            self.step = WizardStep::Review;
            return Err(PlanError::Parse("generation produced no structured plan".to_string()));
        }

        self.conversation.append(Message::user(user_text));
        let mut assistant = Message::assistant(result.assistant_text);
        assistant.set_sources(result.sources);
        self.conversation.append(assistant);
        self.save_recent_messages(2);

        if let Some(plan) = result.plan {
            debug_assert_eq!(plan.version, self.next_version());
            if let Some(conversation_id) = self.conversation.id.clone() {
                if let Err(e) = self.sessions.save_plan(&conversation_id, &plan) {
                    warn!(error = %e, version = plan.version, "plan save failed");
                }
            }
            info!(version = plan.version, "plan version recorded");
            self.plans.push(plan);
        }

        self.step = WizardStep::Refine;
        Ok(())
    }

    /// Fire-and-forget persistence of the newest messages
    fn save_recent_messages(&self, count: usize) {
        let Some(conversation_id) = self.conversation.id.as_deref() else {
            return;
        };
        let start = self.conversation.len().saturating_sub(count);
        for message in &self.conversation.messages[start..] {
            if let Err(e) = self.sessions.save_message(conversation_id, message) {
                warn!(error = %e, "message save failed");
            }
        }
    }

    /// Move from refinement to export review
    pub fn advance_to_export(&mut self) -> Result<(), PlanError> {
        if self.step != WizardStep::Refine {
            return Err(PlanError::InvalidTransition(format!(
                "export requires a refined plan, current step {:?}",
                self.step
            )));
        }
        self.step = WizardStep::Export;
        Ok(())
    }

    /// Return from export review to refinement
    pub fn back_to_refine(&mut self) -> Result<(), PlanError> {
        if self.step != WizardStep::Export {
            return Err(PlanError::InvalidTransition(format!(
                "not reviewing an export, current step {:?}",
                self.step
            )));
        }
        self.step = WizardStep::Refine;
        Ok(())
    }

    /// Abandon the session from any step
    ///
    /// Aborts any in-flight exchange and clears profile, conversation and
    /// plan history. Persisted artifacts are left on disk.
    pub fn reset(&mut self) {
        self.abort_active();
        self.pending = None;
        self.step = WizardStep::Profile;
        self.profile = DistrictProfile::default();
        self.profile_id = None;
        self.conversation = Conversation::new("");
        self.plans.clear();
        info!("session reset");
    }

    fn abort_active(&mut self) {
        if let Some(active) = self.active.take() {
            debug!("aborting in-flight exchange");
            active.abort();
        }
        self.pending = None;
    }

    fn next_version(&self) -> u32 {
        self.plans.len() as u32 + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LlmConfig, RetrievalConfig};
    use crate::llm::client::mock::{MockEmbeddingClient, MockLlmClient};
    use crate::llm::{ChatResponse, FinishReason, Role};
    use crate::persist::FileSessionStore;
    use corpusstore::CorpusStore;
    use std::sync::Mutex;

    const PLAN_TEXT: &str = "\
# Test Plan

## Executive Summary
A plan.

## Curriculum Recommendations
- CS Discoveries (Grades 6-8): solid fit
";

    fn profile() -> DistrictProfile {
        DistrictProfile {
            district_name: "Riverdale USD".to_string(),
            grade_levels: vec!["6-8".to_string()],
            goals: vec!["expand CS".to_string()],
            ..Default::default()
        }
    }

    fn session_with(responses: Vec<&str>) -> (WizardSession, tempfile::TempDir) {
        let llm = Arc::new(MockLlmClient::new(
            responses
                .into_iter()
                .map(|text| ChatResponse {
                    content: text.to_string(),
                    finish_reason: FinishReason::Stop,
                })
                .collect(),
        ));
        let store = Arc::new(Mutex::new(CorpusStore::open_in_memory(4).unwrap()));
        let orchestrator = Arc::new(
            Orchestrator::new(
                llm,
                Arc::new(MockEmbeddingClient::new(4)),
                store,
                RetrievalConfig::default(),
                &LlmConfig::default(),
            )
            .unwrap(),
        );
        let dir = tempfile::tempdir().unwrap();
        let sessions = Arc::new(FileSessionStore::new(dir.path()));
        (WizardSession::new(orchestrator, sessions), dir)
    }

    async fn run_exchange(session: &mut WizardSession, handle: GenerationHandle) -> Result<(), PlanError> {
        let result = handle.into_result().await;
        session.complete_exchange(result)
    }

    #[tokio::test]
    async fn test_full_flow_to_refine() {
        let (mut session, _dir) = session_with(vec![PLAN_TEXT]);
        assert_eq!(session.step(), WizardStep::Profile);

        session.submit_profile(profile()).unwrap();
        assert_eq!(session.step(), WizardStep::Review);

        let handle = session.begin_generation().unwrap();
        assert_eq!(session.step(), WizardStep::Generate);
        run_exchange(&mut session, handle).await.unwrap();

        assert_eq!(session.step(), WizardStep::Refine);
        assert_eq!(session.current_plan().unwrap().version, 1);
        assert_eq!(session.conversation().len(), 2);
        assert_eq!(session.conversation().messages[1].role, Role::Assistant);
    }

    #[tokio::test]
    async fn test_incomplete_profile_rejected_and_not_persisted() {
        let (mut session, dir) = session_with(vec![]);
        let incomplete = DistrictProfile {
            district_name: "Riverdale USD".to_string(),
            ..Default::default()
        };

        let err = session.submit_profile(incomplete).unwrap_err();
        assert!(matches!(err, PlanError::Configuration(_)));
        assert_eq!(session.step(), WizardStep::Profile);
        assert!(!dir.path().join("profiles").exists());
    }

    #[tokio::test]
    async fn test_generation_failure_returns_to_review() {
        let (mut session, _dir) = session_with(vec![PLAN_TEXT]);
        session.submit_profile(profile()).unwrap();
        let handle = session.begin_generation().unwrap();
        drop(handle);

        let err = session
            .complete_exchange(Err(PlanError::Provider(crate::llm::LlmError::InvalidResponse(
                "boom".to_string(),
            ))))
            .unwrap_err();
        assert!(err.is_user_visible());
        assert_eq!(session.step(), WizardStep::Review);
        assert!(session.conversation().is_empty());
        assert!(session.current_plan().is_none());

        // Retry succeeds from review
        let handle = session.begin_generation().unwrap();
        run_exchange(&mut session, handle).await.unwrap();
        assert_eq!(session.step(), WizardStep::Refine);
    }

    #[tokio::test]
    async fn test_abort_leaves_history_unchanged() {
        let (mut session, _dir) = session_with(vec![PLAN_TEXT, "An answer.", PLAN_TEXT]);
        session.submit_profile(profile()).unwrap();
        let handle = session.begin_generation().unwrap();
        run_exchange(&mut session, handle).await.unwrap();

        let before = session.conversation().len();
        let handle = session.request_refinement("make it cheaper").unwrap();
        handle.abort();
        run_exchange(&mut session, handle).await.unwrap();

        assert_eq!(session.step(), WizardStep::Refine);
        assert_eq!(session.conversation().len(), before);
        assert_eq!(session.current_plan().unwrap().version, 1);
    }

    #[tokio::test]
    async fn test_new_refinement_aborts_prior_in_flight() {
        let (mut session, _dir) = session_with(vec![PLAN_TEXT, "All set."]);
        session.submit_profile(profile()).unwrap();
        let handle = session.begin_generation().unwrap();
        run_exchange(&mut session, handle).await.unwrap();

        let first = session.request_refinement("first question").unwrap();
        let second = session.request_refinement("second question").unwrap();

        assert!(matches!(first.into_result().await, Err(PlanError::Cancelled)));

        run_exchange(&mut session, second).await.unwrap();
        assert_eq!(session.conversation().len(), 4);
        assert_eq!(session.conversation().messages[2].content, "second question");
        assert_eq!(session.current_plan().unwrap().version, 1);
    }

    #[tokio::test]
    async fn test_refinement_answer_keeps_plan_version() {
        let (mut session, _dir) = session_with(vec![PLAN_TEXT, "The budget covers devices."]);
        session.submit_profile(profile()).unwrap();
        let handle = session.begin_generation().unwrap();
        run_exchange(&mut session, handle).await.unwrap();

        let handle = session.request_refinement("what about budget?").unwrap();
        run_exchange(&mut session, handle).await.unwrap();

        assert_eq!(session.current_plan().unwrap().version, 1);
        assert_eq!(session.conversation().len(), 4);
    }

    #[tokio::test]
    async fn test_refinement_plan_update_bumps_version() {
        let updated = PLAN_TEXT.replace("Test Plan", "Cheaper Plan");
        let (mut session, _dir) = session_with(vec![PLAN_TEXT, &updated]);
        session.submit_profile(profile()).unwrap();
        let handle = session.begin_generation().unwrap();
        run_exchange(&mut session, handle).await.unwrap();

        let handle = session.request_refinement("make it cheaper").unwrap();
        run_exchange(&mut session, handle).await.unwrap();

        assert_eq!(session.plan_versions().len(), 2);
        assert_eq!(session.current_plan().unwrap().version, 2);
        assert_eq!(session.current_plan().unwrap().title, "Cheaper Plan");
        // Prior version untouched
        assert_eq!(session.plan_versions()[0].title, "Test Plan");
    }

    #[tokio::test]
    async fn test_export_round_trip_and_invalid_transitions() {
        let (mut session, _dir) = session_with(vec![PLAN_TEXT]);
        assert!(matches!(
            session.advance_to_export().unwrap_err(),
            PlanError::InvalidTransition(_)
        ));
        assert!(matches!(
            session.request_refinement("x").unwrap_err(),
            PlanError::InvalidTransition(_)
        ));

        session.submit_profile(profile()).unwrap();
        let _first = session.begin_generation().unwrap();
        assert!(matches!(
            session.begin_generation().map(|_| ()),
            Err(PlanError::InvalidTransition(_))
        ));
    }

    #[tokio::test]
    async fn test_reset_from_any_step() {
        let (mut session, _dir) = session_with(vec![PLAN_TEXT]);
        session.submit_profile(profile()).unwrap();
        let handle = session.begin_generation().unwrap();
        run_exchange(&mut session, handle).await.unwrap();
        session.advance_to_export().unwrap();

        session.reset();
        assert_eq!(session.step(), WizardStep::Profile);
        assert!(session.conversation().is_empty());
        assert!(session.current_plan().is_none());
    }

    #[tokio::test]
    async fn test_messages_persisted_on_success() {
        let (mut session, dir) = session_with(vec![PLAN_TEXT]);
        session.submit_profile(profile()).unwrap();
        let handle = session.begin_generation().unwrap();
        run_exchange(&mut session, handle).await.unwrap();

        let conversation_id = session.conversation().id.clone().unwrap();
        let store = FileSessionStore::new(dir.path());
        let saved = store.load_messages(&conversation_id).unwrap();
        assert_eq!(saved.len(), 2);
        assert_eq!(saved[0].content, crate::orchestrator::GENERATE_USER_PROMPT);
        assert!(store.load_plan(&conversation_id, 1).unwrap().is_some());
        assert!(saved[1].sources.is_some());
    }
}
