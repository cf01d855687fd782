//! Main orchestrator that resolves commands end to end.

use std::sync::Arc;

use brain_core::{ChatMessage, LanguageModel};
use calendar::CalendarConnector;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use database::models::DEFAULT_CONVERSATION_TITLE;
use database::{conversation, message, user, Conversation, Database, DatabaseError, NewMessage, Sender};
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::chat::ChatResponder;
use crate::classifier::{Classifier, Intent};
use crate::command::{CommandRequest, CommandResponse, ConfirmationAction, ResponseType};
use crate::config::PipelineConfig;
use crate::confirmation::{parse_reply, Reply};
use crate::error::OrchestratorError;
use crate::executor::{execute, CONFIRM_NEEDS_CONNECTION};
use crate::extractor::{Action, Extractor, ExtractorOutcome};
use crate::handlers::{ActionContext, HandlerRegistry, Resolution};
use crate::heuristics::ListIntentPolicy;
use crate::locks::ConversationLocks;
use crate::pending::PendingAction;

/// Reply when a calendar action needs a connected account.
pub const NEEDS_CONNECTION_TEXT: &str = "Sure – I can do that once you connect your Google account.";

/// Reply when extraction fails outright.
pub const EXTRACTION_FAILED_TEXT: &str =
    "Sorry, I encountered an error while processing your calendar request. Please try again later.";

/// Reply to a confirmation for a draft that no longer exists.
pub const ALREADY_HANDLED_TEXT: &str = "That request has already been handled.";

const UNKNOWN_ACTION_TEXT: &str =
    "I'm not sure which calendar action you'd like me to take. Could you rephrase that?";
const CALENDAR_UNREACHABLE_TEXT: &str = "Sorry, I couldn't reach your calendar right now. Please try again later.";
const TEXT_CANCELLED: &str = "Deletion cancelled.";

/// One agent reply before it is stored.
struct AgentReply {
    response_type: ResponseType,
    text: String,
    content: Value,
    message_type: &'static str,
    /// Whether the reply is written to the conversation.
    persist: bool,
}

impl AgentReply {
    fn text(text: impl Into<String>) -> Self {
        Self {
            response_type: ResponseType::Text,
            text: text.into(),
            content: Value::Null,
            message_type: "text",
            persist: true,
        }
    }

    fn needs_connection(text: &str) -> Self {
        Self {
            response_type: ResponseType::NeedsConnection,
            text: text.to_string(),
            content: json!({"needs_connection": true}),
            message_type: "text",
            persist: false,
        }
    }
}

/// Main orchestrator that coordinates command processing.
///
/// The orchestrator:
/// - Serializes commands per conversation
/// - Resolves confirmations against the conversation's pending action
/// - Classifies intent and extracts calendar actions with the language model
/// - Dispatches actions to their handlers and stores drafts for confirmation
/// - Titles new conversations
pub struct Orchestrator {
    db: Database,
    connector: Arc<dyn CalendarConnector>,
    classifier: Classifier,
    extractor: Extractor,
    chat: ChatResponder,
    handlers: HandlerRegistry,
    locks: ConversationLocks,
    config: PipelineConfig,
}

impl Orchestrator {
    /// Create an orchestrator with default settings.
    pub fn new(db: Database, model: Arc<dyn LanguageModel>, connector: Arc<dyn CalendarConnector>) -> Self {
        Self::with_config(db, model, connector, PipelineConfig::default())
    }

    /// Create an orchestrator with settings from the environment.
    pub fn from_env(db: Database, model: Arc<dyn LanguageModel>, connector: Arc<dyn CalendarConnector>) -> Self {
        Self::with_config(db, model, connector, PipelineConfig::from_env())
    }

    pub fn with_config(
        db: Database,
        model: Arc<dyn LanguageModel>,
        connector: Arc<dyn CalendarConnector>,
        config: PipelineConfig,
    ) -> Self {
        let policy = if config.list_rewrite {
            ListIntentPolicy::default()
        } else {
            ListIntentPolicy::disabled()
        };
        Self {
            db,
            connector,
            classifier: Classifier::new(model.clone()).with_model_override(config.intent_model.clone()),
            extractor: Extractor::new(model.clone()).with_policy(policy),
            chat: ChatResponder::new(model),
            handlers: HandlerRegistry::standard(),
            locks: ConversationLocks::new(),
            config,
        }
    }

    /// Handle a command at the current time.
    pub async fn handle(&self, request: CommandRequest) -> Result<CommandResponse, OrchestratorError> {
        self.handle_at(request, Utc::now()).await
    }

    /// Handle a command against a fixed "now".
    pub async fn handle_at(
        &self,
        request: CommandRequest,
        now: DateTime<Utc>,
    ) -> Result<CommandResponse, OrchestratorError> {
        let tz = resolve_timezone(request.client_timezone.as_deref());
        let now = now.with_timezone(&tz);
        let pool = self.db.pool();

        self.ensure_user(&request.user_id).await?;
        let conversation_id = match &request.conversation_id {
            Some(id) => match conversation::get_user_conversation(pool, id, &request.user_id).await {
                Ok(existing) => existing.id,
                Err(DatabaseError::NotFound { .. }) => return Err(OrchestratorError::ConversationNotFound(id.clone())),
                Err(e) => return Err(e.into()),
            },
            None => {
                let id = Uuid::new_v4().to_string();
                conversation::create_conversation(pool, &id, &request.user_id).await?;
                info!(conversation_id = %id, user_id = %request.user_id, "CONVERSATION_CREATED");
                id
            }
        };

        let guard = self.locks.acquire(&conversation_id).await;
        let result = self.handle_locked(request, conversation_id, now).await;
        drop(guard);
        self.locks.prune();
        result
    }

    async fn handle_locked(
        &self,
        request: CommandRequest,
        conversation_id: String,
        now: DateTime<Tz>,
    ) -> Result<CommandResponse, OrchestratorError> {
        let tz = now.timezone();
        let pool = self.db.pool();
        // Re-read under the lock: the pending action may have changed while waiting.
        let conversation = conversation::get_conversation(pool, &conversation_id).await?;
        let history = message::recent_messages(pool, &conversation_id, self.config.history_limit).await?;
        let last_agent_id = history.iter().rev().find(|m| m.sender == Sender::Agent).map(|m| m.id);
        let chat_history: Vec<ChatMessage> = history
            .iter()
            .map(|m| match m.sender {
                Sender::User => ChatMessage::user(m.text.clone()),
                Sender::Agent => ChatMessage::assistant(m.text.clone()),
            })
            .collect();

        let text = request.text.trim();
        if !text.is_empty() {
            message::insert_message(pool, &NewMessage::text(&conversation_id, Sender::User, text)).await?;
        }

        let reply = if let Some(payload) = request.confirmation {
            self.confirm(&conversation, &request.user_id, payload.action, request.pending_message_id, false, tz)
                .await?
        } else if let Some(action) = self.text_confirmation(&conversation, text, last_agent_id) {
            debug!(conversation_id = %conversation_id, action = ?action, "CONFIRMATION_FROM_TEXT");
            self.confirm(&conversation, &request.user_id, action, conversation.pending_message_id, true, tz)
                .await?
        } else {
            self.converse(&conversation, &request.user_id, text, &chat_history, now).await?
        };

        self.store_reply(&conversation_id, &reply).await?;

        let mut title = conversation.title.clone();
        if title == DEFAULT_CONVERSATION_TITLE && !text.is_empty() {
            title = self.chat.title(text).await;
            conversation::update_title(pool, &conversation_id, &title).await?;
        }
        conversation::touch(pool, &conversation_id).await?;

        Ok(CommandResponse {
            response_type: reply.response_type,
            response_text: reply.text,
            structured_content: reply.content,
            conversation_id,
            conversation_title: title,
        })
    }

    async fn ensure_user(&self, user_id: &str) -> Result<(), OrchestratorError> {
        if user::ensure_user(self.db.pool(), user_id).await? {
            info!(user_id = %user_id, "USER_CREATED");
        }
        Ok(())
    }

    /// A typed yes/no that resolves the pending draft.
    ///
    /// Honored only for deletion drafts displayed by the latest agent message.
    fn text_confirmation(
        &self,
        conversation: &Conversation,
        text: &str,
        last_agent_id: Option<i64>,
    ) -> Option<ConfirmationAction> {
        let reply = parse_reply(text)?;
        let pending = PendingAction::from_json(conversation.pending_action.as_deref()?).ok()?;
        if !pending.accepts_text_reply() || last_agent_id.is_none() || last_agent_id != conversation.pending_message_id {
            return None;
        }
        Some(match (reply, &pending) {
            (Reply::Negative, _) => ConfirmationAction::Cancel,
            (Reply::Affirmative, PendingAction::DeleteBulk(_)) => ConfirmationAction::DeleteBulk,
            (Reply::Affirmative, _) => ConfirmationAction::Delete,
        })
    }

    async fn confirm(
        &self,
        conversation: &Conversation,
        user_id: &str,
        action: ConfirmationAction,
        pending_message_id: Option<i64>,
        from_text: bool,
        tz: Tz,
    ) -> Result<AgentReply, OrchestratorError> {
        let pool = self.db.pool();
        let Some(raw) = conversation.pending_action.as_deref() else {
            info!(conversation_id = %conversation.id, "CONFIRMATION_WITHOUT_PENDING");
            return Ok(AgentReply::text(ALREADY_HANDLED_TEXT));
        };
        let pending = PendingAction::from_json(raw)?;

        if let Some(id) = pending_message_id {
            if Some(id) != conversation.pending_message_id {
                return Err(OrchestratorError::InvalidConfirmation(format!(
                    "message {} does not hold the pending action",
                    id
                )));
            }
        }

        let Some(kind) = action.kind() else {
            conversation::set_pending_action(pool, &conversation.id, None, None).await?;
            info!(conversation_id = %conversation.id, kind = ?pending.kind(), "DRAFT_CANCELLED");
            return Ok(AgentReply::text(if from_text {
                TEXT_CANCELLED.to_string()
            } else {
                pending.cancel_text()
            }));
        };
        if kind != pending.kind() {
            return Err(OrchestratorError::InvalidConfirmation(format!(
                "confirmation is for {:?} but the pending action is {:?}",
                kind,
                pending.kind()
            )));
        }

        let provider = match self.connector.connect(user_id).await {
            Ok(provider) => provider,
            Err(e) if e.needs_connection() => return Ok(AgentReply::needs_connection(CONFIRM_NEEDS_CONNECTION)),
            Err(e) => {
                warn!(error = %e, "CONFIRMATION_CONNECT_FAILED");
                return Ok(AgentReply::text(CALENDAR_UNREACHABLE_TEXT));
            }
        };

        let outcome = execute(provider.as_ref(), &pending, tz).await;
        if outcome.response_type == ResponseType::NeedsConnection {
            return Ok(AgentReply::needs_connection(&outcome.text));
        }
        if outcome.succeeded() {
            if let Some(id) = conversation.pending_message_id {
                message::delete_message(pool, id).await?;
            }
        }
        conversation::set_pending_action(pool, &conversation.id, None, None).await?;
        info!(
            conversation_id = %conversation.id,
            kind = ?kind,
            succeeded = outcome.succeeded(),
            "DRAFT_EXECUTED"
        );
        Ok(AgentReply {
            response_type: outcome.response_type,
            text: outcome.text,
            content: outcome.content,
            message_type: outcome.message_type,
            persist: true,
        })
    }

    async fn converse(
        &self,
        conversation: &Conversation,
        user_id: &str,
        text: &str,
        history: &[ChatMessage],
        now: DateTime<Tz>,
    ) -> Result<AgentReply, OrchestratorError> {
        if self.classifier.classify(text, history).await == Intent::GeneralChat {
            return Ok(AgentReply::text(self.chat.reply(text, history).await));
        }

        let extraction = match self.extractor.extract(text, history, now).await {
            ExtractorOutcome::Action(extraction) => extraction,
            ExtractorOutcome::Clarification(question) => return Ok(AgentReply::text(question)),
            ExtractorOutcome::Reply(reply) => return Ok(AgentReply::text(reply)),
            ExtractorOutcome::Failed(error) => {
                warn!(error = %error, "EXTRACTION_FAILED");
                return Ok(AgentReply::text(EXTRACTION_FAILED_TEXT));
            }
        };

        let Some(handler) = self.handlers.get(extraction.action) else {
            let text = if extraction.user_message.is_empty() {
                UNKNOWN_ACTION_TEXT.to_string()
            } else {
                extraction.user_message.clone()
            };
            return Ok(AgentReply {
                response_type: ResponseType::CalendarActionRequest,
                text,
                content: json!({"action": Action::Unknown.as_str()}),
                message_type: "text",
                persist: true,
            });
        };

        let provider = match self.connector.connect(user_id).await {
            Ok(provider) => provider,
            Err(e) if e.needs_connection() => {
                info!(user_id = %user_id, action = extraction.action.as_str(), "CALENDAR_NOT_CONNECTED");
                return Ok(AgentReply::needs_connection(NEEDS_CONNECTION_TEXT));
            }
            Err(e) => {
                warn!(error = %e, "CALENDAR_CONNECT_FAILED");
                return Ok(AgentReply::text(CALENDAR_UNREACHABLE_TEXT));
            }
        };

        let ctx = ActionContext {
            provider: provider.as_ref(),
            text,
            now,
        };
        Ok(match handler.resolve(&ctx, &extraction.params).await {
            Resolution::Draft { action, text } => {
                let message_type = action.message_type();
                let response_type = action.response_type();
                let mut content = serde_json::to_value(&action)?;
                let message_id = self.stage_draft(&conversation.id, &action, &text).await?;
                if let Value::Object(map) = &mut content {
                    map.insert("message_id".to_string(), json!(message_id));
                }
                AgentReply {
                    response_type,
                    text,
                    content,
                    message_type,
                    persist: false,
                }
            }
            Resolution::Reply(text) | Resolution::Clarification(text) | Resolution::Failed(text) => AgentReply::text(text),
            Resolution::NeedsConnection => AgentReply::needs_connection(NEEDS_CONNECTION_TEXT),
        })
    }

    /// Store the draft message and make it the pending action, replacing any
    /// earlier draft.
    async fn stage_draft(&self, conversation_id: &str, action: &PendingAction, text: &str) -> Result<i64, OrchestratorError> {
        let pool = self.db.pool();
        let json = action.to_json()?;
        let message_id = message::insert_message(
            pool,
            &NewMessage::text(conversation_id, Sender::Agent, text).with_content(action.message_type(), Some(json.clone())),
        )
        .await?;
        conversation::set_pending_action(pool, conversation_id, Some(&json), Some(message_id)).await?;
        info!(conversation_id = %conversation_id, message_id, kind = ?action.kind(), "DRAFT_STAGED");
        Ok(message_id)
    }

    /// Persist the reply unless it is a draft or a connection prompt.
    async fn store_reply(&self, conversation_id: &str, reply: &AgentReply) -> Result<(), OrchestratorError> {
        if !reply.persist {
            return Ok(());
        }
        let content = match &reply.content {
            Value::Null => None,
            other => Some(other.to_string()),
        };
        message::insert_message(
            self.db.pool(),
            &NewMessage::text(conversation_id, Sender::Agent, reply.text.as_str()).with_content(reply.message_type, content),
        )
        .await?;
        Ok(())
    }
}

/// The client's zone, or UTC when absent or unknown.
pub fn resolve_timezone(name: Option<&str>) -> Tz {
    match name.map(str::trim).filter(|n| !n.is_empty()) {
        Some(name) => name.parse().unwrap_or_else(|_| {
            warn!(timezone = %name, "UNKNOWN_CLIENT_TIMEZONE");
            Tz::UTC
        }),
        None => Tz::UTC,
    }
}
