//! Send/retry controller: one logical turn from user input to exactly one
//! displayed outcome.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tokio::time::Duration;
use tracing::debug;

use crate::api::{ChatRequest, ChatTransport, Classification, TransportError, classify};
use crate::text::process_question_marks;

/// Shown when the backend cannot be reached at all.
pub const OFFLINE_MESSAGE: &str =
    "You appear to be offline. Check your connection and try again.";
/// Shown for the backend's 502/404 unstable-network signature.
pub const NETWORK_UNSTABLE_MESSAGE: &str =
    "The network seems unstable right now. Please try again in a moment.";
/// Transient notice appended before the soft-failure retry.
pub const SOFT_RETRY_NOTICE: &str = "Hmm, that didn't come through. Retrying...";
/// Transient notice appended before the re-query retry.
pub const REQUERY_NOTICE: &str = "Still thinking, give me another moment...";
/// Terminal message when the retry also comes back empty.
pub const SOFT_FAILURE_MESSAGE: &str =
    "I couldn't come up with an answer. Please try rephrasing your question.";

/// What the controller tells the UI. Applied strictly in channel order, so
/// the rendered list always equals append order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnEvent {
    /// Append the user's message (emitted once, before the first attempt)
    UserMessage(String),
    /// Append an assistant message (transient notice or final outcome)
    AssistantMessage(String),
    /// Busy flag: on for the whole logical turn, waits included
    Busy(bool),
}

/// Which attempt of the logical turn is running. At most one retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attempt {
    First,
    Retry,
}

/// Per-turn state machine. A turn starts in `Sending(First)` and every path
/// ends in `Done` after at most two attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
enum TurnState {
    Sending(Attempt),
    SoftRetryWait,
    RequeryWait,
    Done(String),
}

/// Drives logical turns against a [`ChatTransport`].
///
/// Each turn claims a sequence number; events from a turn that is no longer
/// the newest are discarded, so a stale retry can never render over a newer
/// conversation.
#[derive(Clone)]
pub struct SendController<T> {
    transport: Arc<T>,
    client_id: String,
    language: String,
    soft_retry_delay: Duration,
    requery_delay: Duration,
    turn_seq: Arc<AtomicU64>,
}

impl<T: ChatTransport + Send + Sync> SendController<T> {
    pub fn new(
        transport: T,
        client_id: String,
        language: String,
        soft_retry_delay: Duration,
        requery_delay: Duration,
    ) -> Self {
        Self {
            transport: Arc::new(transport),
            client_id,
            language,
            soft_retry_delay,
            requery_delay,
            turn_seq: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Run one logical turn: normalize, send, classify, retry at most once
    /// per category, and emit exactly one final message.
    ///
    /// Empty or whitespace-only input is a no-op: no events, no request.
    pub async fn run_turn(&self, input: &str, events: &mpsc::UnboundedSender<TurnEvent>) {
        let shown = input.trim();
        if shown.is_empty() {
            return;
        }

        let seq = self.turn_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let normalized = process_question_marks(shown);
        let request = ChatRequest::new(normalized, self.client_id.clone(), self.language.clone());

        // The user bubble must be visible before the network call starts;
        // the channel is FIFO, so emitting it first guarantees that.
        self.emit(seq, events, TurnEvent::Busy(true));
        self.emit(seq, events, TurnEvent::UserMessage(shown.to_string()));

        let mut state = TurnState::Sending(Attempt::First);
        loop {
            state = match state {
                TurnState::Sending(attempt) => {
                    debug!(seq, ?attempt, "sending chat request");
                    let outcome = self
                        .transport
                        .send_chat(&request)
                        .await
                        .map(|raw| classify(&raw));
                    if self.is_stale(seq) {
                        debug!(seq, "turn superseded, dropping result");
                        return;
                    }
                    transition(attempt, outcome)
                }
                TurnState::SoftRetryWait => {
                    self.emit(seq, events, TurnEvent::AssistantMessage(
                        SOFT_RETRY_NOTICE.to_string(),
                    ));
                    tokio::time::sleep(self.soft_retry_delay).await;
                    TurnState::Sending(Attempt::Retry)
                }
                TurnState::RequeryWait => {
                    self.emit(seq, events, TurnEvent::AssistantMessage(
                        REQUERY_NOTICE.to_string(),
                    ));
                    tokio::time::sleep(self.requery_delay).await;
                    TurnState::Sending(Attempt::Retry)
                }
                TurnState::Done(text) => {
                    self.emit(seq, events, TurnEvent::AssistantMessage(text));
                    self.emit(seq, events, TurnEvent::Busy(false));
                    return;
                }
            };
            if self.is_stale(seq) {
                debug!(seq, "turn superseded, stopping");
                return;
            }
        }
    }

    fn emit(&self, seq: u64, events: &mpsc::UnboundedSender<TurnEvent>, event: TurnEvent) {
        if self.is_stale(seq) {
            return;
        }
        let _ = events.send(event);
    }

    fn is_stale(&self, seq: u64) -> bool {
        self.turn_seq.load(Ordering::SeqCst) != seq
    }
}

/// The transition table: what one attempt's outcome means for the turn.
///
/// Pure so the at-most-one-retry-per-category rule is checkable in
/// isolation: `SoftRetryWait` and `RequeryWait` are only reachable from a
/// first attempt.
fn transition(attempt: Attempt, outcome: Result<Classification, TransportError>) -> TurnState {
    match outcome {
        Err(TransportError::Offline) => TurnState::Done(OFFLINE_MESSAGE.to_string()),
        Err(err) => TurnState::Done(format!("Something went wrong: {}", err)),
        Ok(Classification::NetworkUnstable) => {
            TurnState::Done(NETWORK_UNSTABLE_MESSAGE.to_string())
        }
        Ok(Classification::HttpError { status, message }) => TurnState::Done(match message {
            Some(message) => format!("The server reported an error: {}", message),
            None => format!("The server reported an error (HTTP {}).", status),
        }),
        Ok(Classification::BadPayload(body)) => {
            TurnState::Done(format!("Unexpected reply from the server: {}", body))
        }
        Ok(Classification::SoftFailure) => match attempt {
            Attempt::First => TurnState::SoftRetryWait,
            Attempt::Retry => TurnState::Done(SOFT_FAILURE_MESSAGE.to_string()),
        },
        Ok(Classification::Reply(text)) => {
            if attempt == Attempt::First && looks_like_search_dump(&text) {
                TurnState::RequeryWait
            } else {
                TurnState::Done(text)
            }
        }
    }
}

/// The backend's "still computing" signature: an interim page of search
/// results instead of an answer.
fn looks_like_search_dump(text: &str) -> bool {
    let lowered = text.to_lowercase();
    lowered.contains("search results") && lowered.contains("html")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::RawReply;
    use std::sync::Mutex;
    use std::sync::atomic::AtomicUsize;

    type Script = Mutex<Vec<Result<RawReply, TransportError>>>;

    /// Scripted transport: pops one canned outcome per call and counts
    /// calls. `on_call` lets a test supersede the turn mid-flight.
    struct FakeTransport {
        script: Script,
        calls: AtomicUsize,
        on_call: Option<Box<dyn Fn() + Send + Sync>>,
    }

    impl FakeTransport {
        fn new(outcomes: Vec<Result<RawReply, TransportError>>) -> Self {
            Self {
                script: Mutex::new(outcomes),
                calls: AtomicUsize::new(0),
                on_call: None,
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl ChatTransport for FakeTransport {
        async fn send_chat(&self, _request: &ChatRequest) -> Result<RawReply, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(hook) = &self.on_call {
                hook();
            }
            self.script
                .lock()
                .expect("script lock")
                .remove(0)
        }
    }

    fn ok(body: &str) -> Result<RawReply, TransportError> {
        Ok(RawReply {
            status: 200,
            body: body.to_string(),
        })
    }

    fn controller(transport: FakeTransport) -> SendController<FakeTransport> {
        // zero delays keep retry tests instant
        SendController::new(
            transport,
            "client-1".to_string(),
            "en-US".to_string(),
            Duration::ZERO,
            Duration::ZERO,
        )
    }

    async fn drive(
        controller: &SendController<FakeTransport>,
        input: &str,
    ) -> Vec<TurnEvent> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        controller.run_turn(input, &tx).await;
        drop(tx);
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        events
    }

    fn assistant_texts(events: &[TurnEvent]) -> Vec<&str> {
        events
            .iter()
            .filter_map(|e| match e {
                TurnEvent::AssistantMessage(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn empty_input_is_a_no_op() {
        let ctl = controller(FakeTransport::new(vec![]));
        let events = drive(&ctl, "   \n ").await;
        assert!(events.is_empty());
        assert_eq!(ctl.transport.calls(), 0);
    }

    #[tokio::test]
    async fn happy_path_appends_user_then_reply() {
        let ctl = controller(FakeTransport::new(vec![ok(r#"{"text": "<p>hi</p>"}"#)]));
        let events = drive(&ctl, "hello?").await;

        assert_eq!(
            events,
            vec![
                TurnEvent::Busy(true),
                TurnEvent::UserMessage("hello?".to_string()),
                TurnEvent::AssistantMessage("<p>hi</p>".to_string()),
                TurnEvent::Busy(false),
            ]
        );
        assert_eq!(ctl.transport.calls(), 1);
    }

    #[tokio::test]
    async fn persistent_soft_failure_retries_once_then_gives_up() {
        let ctl = controller(FakeTransport::new(vec![
            ok(r#"{"text": ""}"#),
            ok(r#"{"text": ""}"#),
        ]));
        let events = drive(&ctl, "anyone there").await;

        // two calls, two assistant messages: the notice and the terminal one
        assert_eq!(ctl.transport.calls(), 2);
        assert_eq!(
            assistant_texts(&events),
            vec![SOFT_RETRY_NOTICE, SOFT_FAILURE_MESSAGE]
        );
        // the user message is never duplicated by the retry
        let user_count = events
            .iter()
            .filter(|e| matches!(e, TurnEvent::UserMessage(_)))
            .count();
        assert_eq!(user_count, 1);
    }

    #[tokio::test]
    async fn soft_failure_then_answer_recovers() {
        let ctl = controller(FakeTransport::new(vec![
            ok("null"),
            ok(r#"{"text": "second time lucky"}"#),
        ]));
        let events = drive(&ctl, "query").await;

        assert_eq!(ctl.transport.calls(), 2);
        assert_eq!(
            assistant_texts(&events),
            vec![SOFT_RETRY_NOTICE, "second time lucky"]
        );
    }

    #[tokio::test]
    async fn search_dump_triggers_exactly_one_requery() {
        let dump = r#"{"text": "<div>Search Results in HTML</div>"}"#;
        let ctl = controller(FakeTransport::new(vec![ok(dump), ok(dump)]));
        let events = drive(&ctl, "query").await;

        // second occurrence is displayed verbatim, no third call
        assert_eq!(ctl.transport.calls(), 2);
        assert_eq!(
            assistant_texts(&events),
            vec![REQUERY_NOTICE, "<div>Search Results in HTML</div>"]
        );
    }

    #[tokio::test]
    async fn bad_gateway_fails_fast_without_retry() {
        let ctl = controller(FakeTransport::new(vec![Ok(RawReply {
            status: 502,
            body: String::new(),
        })]));
        let events = drive(&ctl, "query").await;

        assert_eq!(ctl.transport.calls(), 1);
        assert_eq!(assistant_texts(&events), vec![NETWORK_UNSTABLE_MESSAGE]);
    }

    #[tokio::test]
    async fn offline_shows_the_offline_message() {
        let ctl = controller(FakeTransport::new(vec![Err(TransportError::Offline)]));
        let events = drive(&ctl, "query").await;
        assert_eq!(assistant_texts(&events), vec![OFFLINE_MESSAGE]);
    }

    #[tokio::test]
    async fn http_error_surfaces_the_server_message() {
        let ctl = controller(FakeTransport::new(vec![Ok(RawReply {
            status: 500,
            body: r#"{"message": "backend on fire"}"#.to_string(),
        })]));
        let events = drive(&ctl, "query").await;
        let texts = assistant_texts(&events);
        assert_eq!(texts.len(), 1);
        assert!(texts[0].contains("backend on fire"));
    }

    #[tokio::test]
    async fn superseded_turn_emits_nothing_further() {
        let mut transport = FakeTransport::new(vec![ok(r#"{"text": "stale answer"}"#)]);
        let seq = Arc::new(AtomicU64::new(0));
        let seq_for_hook = seq.clone();
        // a newer turn claims the sequence while this request is in flight
        transport.on_call = Some(Box::new(move || {
            seq_for_hook.fetch_add(1, Ordering::SeqCst);
        }));

        let mut ctl = controller(transport);
        ctl.turn_seq = seq;

        let events = drive(&ctl, "old question").await;
        assert_eq!(
            events,
            vec![
                TurnEvent::Busy(true),
                TurnEvent::UserMessage("old question".to_string()),
            ]
        );
    }

    #[test]
    fn retry_states_are_unreachable_from_a_retry_attempt() {
        let soft = transition(Attempt::Retry, Ok(Classification::SoftFailure));
        assert_eq!(soft, TurnState::Done(SOFT_FAILURE_MESSAGE.to_string()));

        let dump = transition(
            Attempt::Retry,
            Ok(Classification::Reply("Search Results html".to_string())),
        );
        assert_eq!(dump, TurnState::Done("Search Results html".to_string()));
    }

    #[test]
    fn search_dump_detection_is_case_insensitive() {
        assert!(looks_like_search_dump("<HTML>SEARCH RESULTS</HTML>"));
        assert!(!looks_like_search_dump("search results only"));
        assert!(!looks_like_search_dump("plain html page"));
    }
}
