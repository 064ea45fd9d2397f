//! Actors that propose and approve releases.

use serde::{Deserialize, Serialize};

/// Classification of who (or what) is acting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorKind {
    /// A person.
    Human,
    /// An autonomous agent (LLM or otherwise).
    Agent,
    /// A CI system acting on schedule or trigger.
    Ci,
    /// The platform itself.
    System,
}

impl ActorKind {
    /// Stable lowercase name used in external ids and rule contexts.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Human => "human",
            Self::Agent => "agent",
            Self::Ci => "ci",
            Self::System => "system",
        }
    }
}

/// How much the platform trusts this actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrustLevel {
    /// No established trust.
    None,
    /// Routine trust; ordinary changes go through review.
    Basic,
    /// Fully trusted; eligible for auto-approval within risk bounds.
    Full,
}

impl TrustLevel {
    /// Stable lowercase name used in rule contexts.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Basic => "basic",
            Self::Full => "full",
        }
    }
}

/// The identity behind a proposal or an approval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    /// Actor classification.
    pub kind: ActorKind,
    /// Identifier unique within the kind (login, agent name, pipeline id).
    pub id: String,
    /// Display name.
    pub name: String,
    /// Trust granted to this actor.
    pub trust: TrustLevel,
    /// Model identifier when the actor is an agent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl Actor {
    /// A human actor with the given trust level.
    pub fn human(id: impl Into<String>, name: impl Into<String>, trust: TrustLevel) -> Self {
        Self { kind: ActorKind::Human, id: id.into(), name: name.into(), trust, model: None }
    }

    /// An agent actor; `model` names the backing model.
    pub fn agent(id: impl Into<String>, model: impl Into<String>) -> Self {
        let model = model.into();
        Self {
            kind: ActorKind::Agent,
            id: id.into(),
            name: model.clone(),
            trust: TrustLevel::Basic,
            model: Some(model),
        }
    }

    /// A CI actor.
    pub fn ci(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self { kind: ActorKind::Ci, id: id.into(), name: name.into(), trust: TrustLevel::Basic, model: None }
    }

    /// The platform acting on its own behalf.
    pub fn system(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            kind: ActorKind::System,
            id: name.clone(),
            name,
            trust: TrustLevel::Full,
            model: None,
        }
    }

    /// Kind-prefixed external identifier, e.g. `human:alice`.
    #[must_use]
    pub fn external_id(&self) -> String {
        format!("{}:{}", self.kind.as_str(), self.id)
    }
}
