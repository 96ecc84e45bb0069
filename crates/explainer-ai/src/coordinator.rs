// ABOUTME: Turn-bounded chat exchange between the initiating proxy and a single role agent
// ABOUTME: Explicit state machine; termination detection is a pluggable predicate

use crate::agent::RoleAgent;
use explainer_core::PipelineConfig;
use std::sync::Arc;
use tracing::{debug, info_span, warn, Instrument};

/// Sender name used for messages the coordinator sends on the caller's behalf
pub const INITIATOR_NAME: &str = "UserProxy";

/// Decides whether a generated message ends the exchange
pub trait TerminationPolicy: Send + Sync {
    fn is_termination(&self, text: &str) -> bool;
}

impl<F> TerminationPolicy for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn is_termination(&self, text: &str) -> bool {
        self(text)
    }
}

/// Case-insensitive substring match on a fixed phrase
#[derive(Debug, Clone)]
pub struct PhraseTermination {
    phrase: String,
}

impl PhraseTermination {
    pub fn new(phrase: &str) -> Self {
        Self {
            phrase: phrase.to_lowercase(),
        }
    }
}

impl TerminationPolicy for PhraseTermination {
    /// A blank phrase never matches
    fn is_termination(&self, text: &str) -> bool {
        !self.phrase.trim().is_empty() && text.to_lowercase().contains(&self.phrase)
    }
}

/// One message of an exchange, attributed to its sender
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeMessage {
    pub sender: String,
    pub content: String,
}

impl ExchangeMessage {
    pub fn new(sender: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            content: content.into(),
        }
    }
}

/// Why an exchange closed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// The termination policy matched a generated message
    Terminated,
    /// The turn limit was reached
    TurnsExhausted,
    /// The role answered without producing a completion
    NoReply,
    /// The backend call failed or timed out
    BackendFailed,
}

/// Exchange lifecycle: `Started → AwaitingReply → Replied → AwaitingReply …`
/// until one of the closing conditions lands it in `Closed`. There is no
/// transition out of `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeState {
    Started,
    AwaitingReply,
    /// A reply arrived, did not terminate, and turns remain
    Replied,
    Closed(CloseReason),
}

/// Transient state of one bounded conversation
#[derive(Debug)]
pub struct ChatExchange {
    target: String,
    max_turns: usize,
    turns: usize,
    messages: Vec<ExchangeMessage>,
    state: ExchangeState,
    failure: Option<String>,
}

impl ChatExchange {
    fn new(target: &str, max_turns: usize, message: String) -> Self {
        Self {
            target: target.to_string(),
            max_turns,
            turns: 0,
            messages: vec![ExchangeMessage::new(INITIATOR_NAME, message)],
            state: ExchangeState::Started,
            failure: None,
        }
    }

    /// Start a turn. Only valid from `Started` or `Replied`.
    fn begin_turn(&mut self) {
        debug_assert!(matches!(
            self.state,
            ExchangeState::Started | ExchangeState::Replied
        ));
        debug_assert!(self.turns < self.max_turns);
        self.turns += 1;
        self.state = ExchangeState::AwaitingReply;
    }

    fn record_reply(&mut self, content: String, terminated: bool) {
        debug_assert_eq!(self.state, ExchangeState::AwaitingReply);
        self.messages
            .push(ExchangeMessage::new(self.target.clone(), content));

        self.state = if terminated {
            ExchangeState::Closed(CloseReason::Terminated)
        } else if self.turns >= self.max_turns {
            ExchangeState::Closed(CloseReason::TurnsExhausted)
        } else {
            ExchangeState::Replied
        };
    }

    fn record_auto_reply(&mut self, content: &str) {
        debug_assert_eq!(self.state, ExchangeState::Replied);
        self.messages
            .push(ExchangeMessage::new(INITIATOR_NAME, content));
    }

    fn close(&mut self, reason: CloseReason) {
        self.state = ExchangeState::Closed(reason);
    }

    fn record_failure(&mut self, failure: String) {
        self.failure = Some(failure);
        self.close(CloseReason::BackendFailed);
    }

    pub fn state(&self) -> ExchangeState {
        self.state
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.state, ExchangeState::Closed(_))
    }

    pub fn close_reason(&self) -> Option<CloseReason> {
        match self.state {
            ExchangeState::Closed(reason) => Some(reason),
            _ => None,
        }
    }

    /// Number of request/response pairs attempted so far
    pub fn turns(&self) -> usize {
        self.turns
    }

    pub fn max_turns(&self) -> usize {
        self.max_turns
    }

    pub fn messages(&self) -> &[ExchangeMessage] {
        &self.messages
    }

    /// The message that opened the exchange
    pub fn initiating_message(&self) -> &str {
        &self.messages[0].content
    }

    /// Backend failure that closed the exchange, if any
    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    /// Last message attributed to `role` in this exchange
    pub fn last_message(&self, role: &str) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.sender == role)
            .map(|m| m.content.as_str())
    }
}

/// Runs bounded exchanges. Holds only immutable settings, so one instance
/// serves concurrent requests.
#[derive(Clone)]
pub struct Coordinator {
    max_turns: usize,
    auto_reply: String,
    termination: Arc<dyn TerminationPolicy>,
}

impl Coordinator {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            max_turns: config.max_turns.max(1),
            auto_reply: config.auto_reply.clone(),
            termination: Arc::new(PhraseTermination::new(&config.termination_phrase)),
        }
    }

    /// Replace the termination predicate
    pub fn with_termination_policy(mut self, policy: impl TerminationPolicy + 'static) -> Self {
        self.termination = Arc::new(policy);
        self
    }

    pub fn max_turns(&self) -> usize {
        self.max_turns
    }

    /// Drive one exchange with `agent` to completion. Never fails: backend
    /// errors close the exchange and are kept on it for the caller.
    pub async fn run(&self, agent: &RoleAgent, message: String) -> ChatExchange {
        let span = info_span!("exchange", role = %agent.name(), max_turns = self.max_turns);
        self.drive(agent, message).instrument(span).await
    }

    async fn drive(&self, agent: &RoleAgent, message: String) -> ChatExchange {
        let mut exchange = ChatExchange::new(agent.name(), self.max_turns, message);

        while !exchange.is_closed() {
            exchange.begin_turn();

            let reply = agent.respond(exchange.messages()).await;
            match reply {
                Ok(Some(content)) => {
                    let terminated = self.termination.is_termination(&content);
                    exchange.record_reply(content, terminated);
                    debug!(
                        turn = exchange.turns(),
                        state = ?exchange.state(),
                        "Reply recorded"
                    );

                    if exchange.state() == ExchangeState::Replied {
                        exchange.record_auto_reply(&self.auto_reply);
                    }
                }
                Ok(None) => {
                    warn!(turn = exchange.turns(), "Role produced no completion");
                    exchange.close(CloseReason::NoReply);
                }
                Err(e) => {
                    warn!(turn = exchange.turns(), error = %e, "Backend call failed");
                    exchange.record_failure(e.to_string());
                }
            }
        }

        exchange
    }
}
