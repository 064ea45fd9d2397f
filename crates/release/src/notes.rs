//! Release notes attached to a run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The notes text plus its provenance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseNotes {
    /// Rendered notes body.
    pub text: String,
    /// Intended audience, e.g. `users`, `developers`.
    pub audience: String,
    /// Writing tone, e.g. `neutral`, `marketing`.
    pub tone: String,
    /// Producer: a template name or an AI provider.
    pub provider: String,
    /// Model identifier when AI-generated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// When the notes were first generated.
    pub generated_at: DateTime<Utc>,
    /// False once a human has edited the text.
    #[serde(default)]
    pub ai_generated: bool,
}

impl ReleaseNotes {
    /// Template-produced notes.
    pub fn from_template(text: impl Into<String>, provider: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            audience: "users".into(),
            tone: "neutral".into(),
            provider: provider.into(),
            model: None,
            generated_at: Utc::now(),
            ai_generated: false,
        }
    }
}
