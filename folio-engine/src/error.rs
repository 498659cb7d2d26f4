use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConversationError {
    #[error("not configured: {0}")]
    Configuration(String),
    #[error("transport failed: {0}")]
    Transport(String),
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("malformed data: {0}")]
    MalformedData(String),
}

impl ConversationError {
    pub fn transport(err: &anyhow::Error) -> Self {
        Self::Transport(format!("{err:#}"))
    }

    /// Text shown to the visitor. Malformed data is recovered locally and
    /// never reaches the UI.
    pub fn user_message(&self) -> Option<&'static str> {
        match self {
            Self::Configuration(_) => Some("Voice chat is not configured right now."),
            Self::Transport(_) => Some("Something went wrong. Please try again later."),
            Self::Auth(_) => Some("Authentication failed. Please refresh the page and try again."),
            Self::MalformedData(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Info,
    Error,
}

/// A toast-style message for the visitor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Info,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Error,
            message: message.into(),
        }
    }

    pub fn from_error(err: &ConversationError) -> Option<Self> {
        err.user_message().map(Self::error)
    }
}

pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);
}

pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<Notice>,
}

impl ChannelNotifier {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Notice>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, notice: Notice) {
        if self.tx.send(notice).is_err() {
            log::debug!("notice dropped: no receiver");
        }
    }
}
