//! Session persistence: profiles, conversation history, plan versions
//!
//! Writes are fire-and-forget from the wizard's point of view except for
//! profile confirmation, which must succeed before the session advances.
//! Layout under the data directory:
//!
//! ```text
//! profiles/{profile_id}.json
//! conversations/{conversation_id}.jsonl   (one message per line, append-only)
//! plans/{conversation_id}-v{version}.json
//! ```

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::domain::{DistrictProfile, Message, Plan};
use crate::error::PlanError;

/// Durable storage for wizard sessions
pub trait SessionStore: Send + Sync {
    fn save_profile(&self, profile_id: &str, profile: &DistrictProfile) -> Result<(), PlanError>;

    fn load_profile(&self, profile_id: &str) -> Result<Option<DistrictProfile>, PlanError>;

    /// Append one finalized message to a conversation log
    fn save_message(&self, conversation_id: &str, message: &Message) -> Result<(), PlanError>;

    fn load_messages(&self, conversation_id: &str) -> Result<Vec<Message>, PlanError>;

    /// Persist one immutable plan version
    fn save_plan(&self, conversation_id: &str, plan: &Plan) -> Result<(), PlanError>;

    fn load_plan(&self, conversation_id: &str, version: u32) -> Result<Option<Plan>, PlanError>;
}

/// JSON-file session store rooted at a data directory
pub struct FileSessionStore {
    root: PathBuf,
}

impl FileSessionStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn profile_path(&self, profile_id: &str) -> PathBuf {
        self.root.join("profiles").join(format!("{profile_id}.json"))
    }

    fn conversation_path(&self, conversation_id: &str) -> PathBuf {
        self.root.join("conversations").join(format!("{conversation_id}.jsonl"))
    }

    fn plan_path(&self, conversation_id: &str, version: u32) -> PathBuf {
        self.root.join("plans").join(format!("{conversation_id}-v{version}.json"))
    }

    fn ensure_parent(path: &Path) -> Result<(), PlanError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| PlanError::Persistence(format!("create {}: {e}", parent.display())))?;
        }
        Ok(())
    }

    fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<(), PlanError> {
        Self::ensure_parent(path)?;
        let json =
            serde_json::to_string_pretty(value).map_err(|e| PlanError::Persistence(format!("serialize: {e}")))?;
        fs::write(path, json).map_err(|e| PlanError::Persistence(format!("write {}: {e}", path.display())))
    }

    fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>, PlanError> {
        if !path.exists() {
            return Ok(None);
        }
        let content =
            fs::read_to_string(path).map_err(|e| PlanError::Persistence(format!("read {}: {e}", path.display())))?;
        let value =
            serde_json::from_str(&content).map_err(|e| PlanError::Persistence(format!("parse {}: {e}", path.display())))?;
        Ok(Some(value))
    }
}

impl SessionStore for FileSessionStore {
    fn save_profile(&self, profile_id: &str, profile: &DistrictProfile) -> Result<(), PlanError> {
        let path = self.profile_path(profile_id);
        Self::write_json(&path, profile)?;
        debug!(profile_id, "profile saved");
        Ok(())
    }

    fn load_profile(&self, profile_id: &str) -> Result<Option<DistrictProfile>, PlanError> {
        Self::read_json(&self.profile_path(profile_id))
    }

    fn save_message(&self, conversation_id: &str, message: &Message) -> Result<(), PlanError> {
        let path = self.conversation_path(conversation_id);
        Self::ensure_parent(&path)?;
        let line =
            serde_json::to_string(message).map_err(|e| PlanError::Persistence(format!("serialize message: {e}")))?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| PlanError::Persistence(format!("open {}: {e}", path.display())))?;
        writeln!(file, "{line}").map_err(|e| PlanError::Persistence(format!("append {}: {e}", path.display())))?;
        Ok(())
    }

    fn load_messages(&self, conversation_id: &str) -> Result<Vec<Message>, PlanError> {
        let path = self.conversation_path(conversation_id);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let content =
            fs::read_to_string(&path).map_err(|e| PlanError::Persistence(format!("read {}: {e}", path.display())))?;
        let mut messages = Vec::new();
        for line in content.lines().filter(|l| !l.trim().is_empty()) {
            let message =
                serde_json::from_str(line).map_err(|e| PlanError::Persistence(format!("parse message: {e}")))?;
            messages.push(message);
        }
        Ok(messages)
    }

    fn save_plan(&self, conversation_id: &str, plan: &Plan) -> Result<(), PlanError> {
        let path = self.plan_path(conversation_id, plan.version);
        Self::write_json(&path, plan)?;
        debug!(conversation_id, version = plan.version, "plan version saved");
        Ok(())
    }

    fn load_plan(&self, conversation_id: &str, version: u32) -> Result<Option<Plan>, PlanError> {
        Self::read_json(&self.plan_path(conversation_id, version))
    }
}
