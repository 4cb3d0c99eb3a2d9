use crate::classifier::{Classification, IntentClassifier};
use crate::conversation::{ChatMessage, Sender, SessionStore};
use crate::provider::{LanguageModel, ProviderMessage};
use crate::responder::ResponseGenerator;
use serde::Serialize;
use std::sync::Arc;

/// Shown when the remote model call fails.
pub const PROVIDER_APOLOGY: &str =
    "I'm sorry, I couldn't come up with an answer just now. Please try asking in a different way.";

/// Where a turn's reply came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplySource {
    /// Answered from the static corpus.
    Local,
    /// Answered by the remote language model.
    Remote,
    /// Apology substituted after a remote failure.
    Fallback,
    /// A newer message arrived first; this reply was not logged.
    Superseded,
}

/// What one processed turn produced.
#[derive(Debug, Clone, Serialize)]
pub struct TurnOutcome {
    pub response: String,
    pub suggestions: Vec<String>,
    pub intent: String,
    pub confidence: f32,
    pub source: ReplySource,
}

/// Sequences one turn of conversation: log the user message, classify it,
/// answer locally or via the remote model, log the reply, publish the
/// suggestion set. Every failure terminates here as a friendly bot turn.
pub struct ChatEngine {
    classifier: IntentClassifier,
    responder: ResponseGenerator,
    provider: Arc<dyn LanguageModel>,
    sessions: Arc<dyn SessionStore>,
    routing_threshold: f32,
    history_window: usize,
}

impl ChatEngine {
    pub fn new(
        classifier: IntentClassifier,
        responder: ResponseGenerator,
        provider: Arc<dyn LanguageModel>,
        sessions: Arc<dyn SessionStore>,
        routing_threshold: f32,
        history_window: usize,
    ) -> Self {
        Self {
            classifier,
            responder,
            provider,
            sessions,
            routing_threshold,
            history_window,
        }
    }

    pub fn sessions(&self) -> &Arc<dyn SessionStore> {
        &self.sessions
    }

    pub async fn process(&self, conversation_id: &str, text: &str) -> TurnOutcome {
        let classification = self.classifier.classify(text);
        log::info!(
            "Classified message as '{}' (confidence {:.2})",
            classification.intent,
            classification.confidence
        );

        let user_message = ChatMessage::user(text.trim());

        if classification.confidence >= self.routing_threshold {
            return self.answer_locally(conversation_id, user_message, classification);
        }
        self.answer_remotely(conversation_id, user_message, classification, text)
            .await
    }

    fn answer_locally(
        &self,
        conversation_id: &str,
        user_message: ChatMessage,
        classification: Classification,
    ) -> TurnOutcome {
        let reply = self.responder.generate(&classification.intent);
        self.sessions.update(conversation_id, &mut |session| {
            session.push(user_message.clone());
            session.begin_turn();
            session.push(ChatMessage::bot(reply.response.clone()));
            session.set_suggestions(reply.suggestions.clone());
        });

        TurnOutcome {
            response: reply.response,
            suggestions: reply.suggestions,
            intent: classification.intent,
            confidence: classification.confidence,
            source: ReplySource::Local,
        }
    }

    async fn answer_remotely(
        &self,
        conversation_id: &str,
        user_message: ChatMessage,
        classification: Classification,
        text: &str,
    ) -> TurnOutcome {
        // Capture the context window and the turn number before suspending,
        // the reply may only be logged while this turn is still current.
        let mut turn = 0;
        let mut history = Vec::new();
        self.sessions.update(conversation_id, &mut |session| {
            history = session
                .recent(self.history_window)
                .iter()
                .map(provider_message)
                .collect();
            session.push(user_message.clone());
            turn = session.begin_turn();
        });

        match self.provider.complete(text, &history).await {
            Ok(reply_text) => {
                let mut stale = false;
                self.sessions.update(conversation_id, &mut |session| {
                    if session.current_turn() != turn {
                        stale = true;
                        return;
                    }
                    session.push(ChatMessage::bot(reply_text.clone()));
                    session.set_suggestions(ResponseGenerator::generic_suggestions());
                });

                if stale {
                    log::info!("Discarding superseded reply for conversation {conversation_id}");
                    TurnOutcome {
                        response: reply_text,
                        suggestions: Vec::new(),
                        intent: classification.intent,
                        confidence: classification.confidence,
                        source: ReplySource::Superseded,
                    }
                } else {
                    TurnOutcome {
                        response: reply_text,
                        suggestions: ResponseGenerator::generic_suggestions(),
                        intent: classification.intent,
                        confidence: classification.confidence,
                        source: ReplySource::Remote,
                    }
                }
            }
            Err(err) => {
                log::warn!("{} request failed: {err:#}", self.provider.name());
                let mut stale = false;
                self.sessions.update(conversation_id, &mut |session| {
                    if session.current_turn() != turn {
                        stale = true;
                        return;
                    }
                    session.push(ChatMessage::bot(PROVIDER_APOLOGY));
                    session.set_suggestions(Vec::new());
                });

                TurnOutcome {
                    response: PROVIDER_APOLOGY.to_string(),
                    suggestions: Vec::new(),
                    intent: classification.intent,
                    confidence: classification.confidence,
                    source: if stale {
                        ReplySource::Superseded
                    } else {
                        ReplySource::Fallback
                    },
                }
            }
        }
    }
}

fn provider_message(message: &ChatMessage) -> ProviderMessage {
    let role = match message.sender {
        Sender::User => "user",
        Sender::Bot => "assistant",
    };
    ProviderMessage::new(role, message.content.clone())
}
