//! Conversation controller shared by front ends.
//!
//! A session owns the message store, the in-flight flag and the error
//! banner. Sending is split into `submit` and `complete` so a UI can run the
//! request on a background task and apply the outcome later; `send` does
//! both in one call.

use tracing::{info, warn};

use crate::state::{ChatTurn, MessageStore};
use crate::transport::{Transport, TransportError};

pub const APOLOGY: &str = "Sorry, I couldn't get a response right now. Please try again.";

#[derive(Debug, Default)]
pub struct ChatSession {
    store: MessageStore,
    loading: bool,
    error: Option<String>,
}

impl ChatSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(&self) -> &MessageStore {
        &self.store
    }

    pub fn turns(&self) -> &[ChatTurn] {
        self.store.turns()
    }

    /// True while a request is in flight; new submissions are refused
    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn dismiss_error(&mut self) {
        self.error = None;
    }

    /// Record the user's turn and decide whether a request should go out.
    ///
    /// Returns the message to send, or `None` when the input is blank, a
    /// request is already pending, or the transport is missing settings.
    pub fn submit(&mut self, input: &str, transport: &dyn Transport) -> Option<String> {
        if self.loading || input.trim().is_empty() {
            return None;
        }

        self.store.push(ChatTurn::user(input));

        if let Err(err) = transport.check_config() {
            warn!(transport = transport.name(), error = %err, "transport not configured");
            self.error = Some(err.to_string());
            return None;
        }

        self.error = None;
        self.loading = true;
        Some(input.to_string())
    }

    /// Apply the outcome of the request started by `submit`
    pub fn complete(&mut self, outcome: Result<String, TransportError>) {
        match outcome {
            Ok(reply) => {
                info!(chars = reply.len(), "assistant replied");
                self.store.push(ChatTurn::assistant(reply));
            }
            Err(err) => {
                warn!(error = %err, "request failed");
                self.store.push(ChatTurn::assistant(APOLOGY));
                self.error = Some(err.to_string());
            }
        }
        self.loading = false;
    }

    /// Submit, wait for the transport, and apply the outcome
    pub async fn send(&mut self, input: &str, transport: &dyn Transport) -> bool {
        let Some(message) = self.submit(input, transport) else {
            return false;
        };
        let outcome = transport.send(&message).await;
        self.complete(outcome);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::ChatRole;
    use async_trait::async_trait;
    use reqwest::StatusCode;
    use std::sync::atomic::{AtomicUsize, Ordering};

    enum Script {
        Reply(&'static str),
        Status(u16),
        Unconfigured,
    }

    struct ScriptedTransport {
        script: Script,
        calls: AtomicUsize,
    }

    impl ScriptedTransport {
        fn new(script: Script) -> Self {
            Self {
                script,
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        fn name(&self) -> &'static str {
            "scripted"
        }

        fn check_config(&self) -> Result<(), TransportError> {
            match self.script {
                Script::Unconfigured => Err(TransportError::MissingConfig("ASTRA_TOKEN")),
                _ => Ok(()),
            }
        }

        async fn send(&self, _message: &str) -> Result<String, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.script {
                Script::Reply(text) => Ok(text.to_string()),
                Script::Status(code) => Err(TransportError::Http {
                    status: StatusCode::from_u16(code).unwrap(),
                    body: String::new(),
                }),
                Script::Unconfigured => unreachable!("send after failed config check"),
            }
        }
    }

    fn roles(session: &ChatSession) -> Vec<ChatRole> {
        session.turns().iter().map(|t| t.role).collect()
    }

    #[tokio::test]
    async fn test_successful_round() {
        let transport = ScriptedTransport::new(Script::Reply("```py\nprint(1)\n```"));
        let mut session = ChatSession::new();

        assert!(session.send("hello", &transport).await);
        assert_eq!(roles(&session), vec![ChatRole::User, ChatRole::Assistant]);
        assert_eq!(session.turns()[0].content, "hello");
        assert!(session.turns()[1].is_code);
        assert!(!session.is_loading());
        assert!(session.error().is_none());
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn test_http_500_appends_one_error_turn() {
        let transport = ScriptedTransport::new(Script::Status(500));
        let mut session = ChatSession::new();

        session.send("hello", &transport).await;

        let assistant: Vec<&ChatTurn> = session
            .turns()
            .iter()
            .filter(|t| t.role == ChatRole::Assistant)
            .collect();
        assert_eq!(assistant.len(), 1);
        assert_eq!(assistant[0].content, APOLOGY);
        assert!(!session.is_loading());
        assert!(session.error().unwrap().contains("500"));
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn test_missing_config_sets_banner_without_request() {
        let transport = ScriptedTransport::new(Script::Unconfigured);
        let mut session = ChatSession::new();

        assert!(!session.send("hello", &transport).await);
        assert_eq!(roles(&session), vec![ChatRole::User]);
        assert_eq!(session.error(), Some("ASTRA_TOKEN is not configured"));
        assert!(!session.is_loading());
        assert_eq!(transport.calls(), 0);

        session.dismiss_error();
        assert!(session.error().is_none());
    }

    #[tokio::test]
    async fn test_blank_input_is_ignored() {
        let transport = ScriptedTransport::new(Script::Reply("hi"));
        let mut session = ChatSession::new();

        assert!(!session.send("   \n", &transport).await);
        assert!(session.turns().is_empty());
        assert_eq!(transport.calls(), 0);
    }

    #[test]
    fn test_submit_refused_while_loading() {
        let transport = ScriptedTransport::new(Script::Reply("hi"));
        let mut session = ChatSession::new();

        assert_eq!(session.submit("one", &transport), Some("one".to_string()));
        assert!(session.is_loading());
        assert_eq!(session.submit("two", &transport), None);
        assert_eq!(session.turns().len(), 1);

        session.complete(Ok("reply".to_string()));
        assert!(!session.is_loading());
        assert_eq!(roles(&session), vec![ChatRole::User, ChatRole::Assistant]);
    }

    #[test]
    fn test_success_clears_previous_error() {
        let transport = ScriptedTransport::new(Script::Reply("hi"));
        let mut session = ChatSession::new();

        session.submit("one", &transport);
        session.complete(Err(TransportError::MalformedResponse("x".to_string())));
        assert!(session.error().is_some());

        session.submit("two", &transport);
        assert!(session.error().is_none());
    }
}
