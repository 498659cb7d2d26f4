use crate::error::{ConversationError, Notice, Notifier};
use crate::navigation::NavigationRouter;
use crate::reconciler::TranscriptReconciler;
use crate::traits::ChatBackend;
use folio_core::types::TranscriptEntry;
use folio_providers::chat::chat_history;
use folio_providers::frames::{ChatFrame, FrameDecoder, parse_chat_frame};
use futures_util::StreamExt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Blank,
    InFlight,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    Skipped(SkipReason),
    /// `reply` is `None` when the stream carried no content.
    Completed { reply: Option<String> },
    Failed(ConversationError),
}

struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct TextChatDriver {
    backend: Arc<dyn ChatBackend>,
    reconciler: TranscriptReconciler,
    router: NavigationRouter,
    notifier: Arc<dyn Notifier>,
    in_flight: AtomicBool,
}

impl TextChatDriver {
    pub fn new(
        backend: Arc<dyn ChatBackend>,
        reconciler: TranscriptReconciler,
        router: NavigationRouter,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            backend,
            reconciler,
            router,
            notifier,
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn is_sending(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Send one visitor message and stream the reply into the transcript.
    pub async fn send_message(&self, content: &str) -> SendOutcome {
        if content.trim().is_empty() {
            return SendOutcome::Skipped(SkipReason::Blank);
        }
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            log::debug!("chat send skipped: another message is in flight");
            return SendOutcome::Skipped(SkipReason::InFlight);
        }
        let _guard = InFlightGuard(&self.in_flight);

        self.reconciler.append(TranscriptEntry::user(content));
        let history = chat_history(&self.reconciler.snapshot());

        let mut stream = match self.backend.stream_chat(&history).await {
            Ok(stream) => stream,
            Err(e) => return self.fail(&e),
        };

        let mut decoder = FrameDecoder::new();
        let mut reply: Option<String> = None;
        let mut done = false;

        while !done {
            let Some(chunk) = stream.next().await else {
                break;
            };
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => return self.fail(&e),
            };
            for data in decoder.push(&chunk) {
                if self.handle_frame(&data, &mut reply) {
                    done = true;
                    break;
                }
            }
        }
        if !done {
            if let Some(data) = decoder.finish() {
                self.handle_frame(&data, &mut reply);
            }
        }

        SendOutcome::Completed { reply }
    }

    /// Summarize the conversation so far. An empty transcript has no summary.
    pub async fn summarize(&self) -> Result<Option<String>, ConversationError> {
        let transcript = self.reconciler.snapshot();
        if transcript.is_empty() {
            return Ok(None);
        }

        match self.backend.summarize(&chat_history(&transcript)).await {
            Ok(summary) => Ok(Some(summary)),
            Err(e) => {
                let err = ConversationError::transport(&e);
                log::warn!("summary failed: {err}");
                if let Some(notice) = Notice::from_error(&err) {
                    self.notifier.notify(notice);
                }
                Err(err)
            }
        }
    }

    // Returns true once the stream signals its end.
    fn handle_frame(&self, data: &str, reply: &mut Option<String>) -> bool {
        let frame = match parse_chat_frame(data) {
            Ok(frame) => frame,
            Err(e) => {
                log::debug!("skipping chat frame: {e:#}");
                return false;
            }
        };

        match frame {
            ChatFrame::Content(fragment) => match reply {
                Some(buf) => {
                    buf.push_str(&fragment);
                    self.reconciler.replace_streaming_tail(buf);
                }
                None => {
                    self.reconciler.append(TranscriptEntry::agent(fragment.as_str()));
                    *reply = Some(fragment);
                }
            },
            ChatFrame::Metadata(meta) => {
                self.router.apply(&meta);
            }
            ChatFrame::Error(message) => {
                log::warn!("chat stream reported an error: {message}");
                self.notifier.notify(Notice::error(message));
            }
            ChatFrame::Done => return true,
        }
        false
    }

    fn fail(&self, e: &anyhow::Error) -> SendOutcome {
        let err = ConversationError::transport(e);
        log::warn!("chat send failed: {err}");
        if let Some(notice) = Notice::from_error(&err) {
            self.notifier.notify(notice);
        }
        SendOutcome::Failed(err)
    }
}
