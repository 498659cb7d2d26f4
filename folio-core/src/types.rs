use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Agent,
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Agent => "agent",
            Role::User => "user",
        }
    }

    /// Role name expected by the chat backend.
    pub fn wire_role(&self) -> &'static str {
        match self {
            Role::Agent => "assistant",
            Role::User => "user",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub role: Role,
    pub content: String,
}

impl TranscriptEntry {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn agent(content: impl Into<String>) -> Self {
        Self::new(Role::Agent, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Page {
    Landing,
    Personal,
    Education,
    #[default]
    Project,
    Resume,
    Guestbook,
}

impl Page {
    pub const ALL: [Page; 6] = [
        Page::Landing,
        Page::Personal,
        Page::Education,
        Page::Project,
        Page::Resume,
        Page::Guestbook,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Page::Landing => "landing",
            Page::Personal => "personal",
            Page::Education => "education",
            Page::Project => "project",
            Page::Resume => "resume",
            Page::Guestbook => "guestbook",
        }
    }
}

impl fmt::Display for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown page: {0:?}")]
pub struct UnknownPage(pub String);

impl FromStr for Page {
    type Err = UnknownPage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Page::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| UnknownPage(s.to_string()))
    }
}

/// Out-of-band signal emitted by the model alongside the conversation.
///
/// `page` stays a raw string so that unknown pages can be reported instead of
/// failing deserialization of the whole event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationMeta {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
}

impl NavigationMeta {
    pub const KIND_NAVIGATION: &'static str = "navigation";

    pub fn navigate(page: impl Into<String>) -> Self {
        Self {
            kind: Self::KIND_NAVIGATION.into(),
            page: Some(page.into()),
            project_id: None,
        }
    }

    pub fn with_project_id(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatMode {
    #[default]
    Voice,
    Text,
}
