//! Session Management
//!
//! A chat session is the visible transcript of one UI session: an assistant
//! greeting followed by user/assistant pairs. The agent's own scratchpad is
//! never stored here.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

use crate::error::{AgentError, Result};
use crate::message::{Message, Role};
use crate::reasoning::{Agent, AgentEvent};
use crate::text::clean_text;

/// First transcript entry of every session
pub const GREETING: &str = "Hi, I'm a Math chatbot! Ask me any math-related question!";

/// Unique session identifier
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One UI session's chat transcript
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatSession {
    /// Unique identifier
    pub id: SessionId,

    /// User/assistant turns, append-only
    transcript: Vec<Message>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last activity timestamp
    pub updated_at: DateTime<Utc>,

    /// Whether session is active
    pub active: bool,
}

impl ChatSession {
    /// Create a new session seeded with the greeting
    pub fn new() -> Self {
        Self::with_id(SessionId::new())
    }

    /// Create with specific ID
    pub fn with_id(id: SessionId) -> Self {
        let now = Utc::now();
        Self {
            id,
            transcript: vec![Message::assistant(GREETING)],
            created_at: now,
            updated_at: now,
            active: true,
        }
    }

    /// The transcript in display order
    pub fn transcript(&self) -> &[Message] {
        &self.transcript
    }

    /// Ask the agent a question and record the exchange.
    ///
    /// A blank question is rejected with [`AgentError::EmptyQuestion`] and
    /// leaves the transcript untouched. The agent sees the cleaned question;
    /// the transcript keeps what the user typed. On success exactly one user
    /// and one assistant entry are appended; on failure nothing is.
    pub async fn submit(&mut self, agent: &Agent, question: &str) -> Result<String> {
        self.submit_inner(agent, question, None).await
    }

    /// Like [`ChatSession::submit`], reporting agent steps on `events`
    pub async fn submit_with_events(
        &mut self,
        agent: &Agent,
        question: &str,
        events: &UnboundedSender<AgentEvent>,
    ) -> Result<String> {
        self.submit_inner(agent, question, Some(events)).await
    }

    async fn submit_inner(
        &mut self,
        agent: &Agent,
        question: &str,
        events: Option<&UnboundedSender<AgentEvent>>,
    ) -> Result<String> {
        if !self.active {
            return Err(AgentError::Session(format!("session {} has ended", self.id)));
        }
        if question.trim().is_empty() {
            return Err(AgentError::EmptyQuestion);
        }

        let cleaned = clean_text(question);
        let answer = match events {
            Some(tx) => agent.ask_with_events(&cleaned, tx).await?,
            None => agent.ask(&cleaned).await?,
        };

        self.transcript.push(Message::user(question));
        self.transcript.push(Message::assistant(answer.clone()));
        self.touch();

        tracing::info!(session = %self.id, turns = self.transcript.len(), "Question answered");
        Ok(answer)
    }

    /// Update the activity timestamp
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// First user question, shortened, for listings
    pub fn title(&self) -> String {
        self.transcript
            .iter()
            .find(|m| m.role == Role::User)
            .map_or_else(
                || format!("Session {}", &self.id.0[..8.min(self.id.0.len())]),
                |m| {
                    let preview: String = m.content.chars().take(50).collect();
                    if m.content.chars().count() > 50 {
                        format!("{preview}...")
                    } else {
                        preview
                    }
                },
            )
    }

    /// End the session
    pub fn end(&mut self) {
        self.active = false;
        self.touch();
    }

    /// Transcript length, greeting included
    pub fn message_count(&self) -> usize {
        self.transcript.len()
    }
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new()
    }
}

/// Session store trait
pub trait SessionStore: Send + Sync {
    /// Save a session
    fn save(&self, session: &ChatSession) -> Result<()>;

    /// Load a session by ID
    fn load(&self, id: &SessionId) -> Result<Option<ChatSession>>;

    /// Delete a session
    fn delete(&self, id: &SessionId) -> Result<()>;

    /// Most recently active sessions first
    fn list(&self, limit: usize) -> Result<Vec<ChatSession>>;
}

/// In-memory session store; everything is gone when the process exits
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<SessionId, ChatSession>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<T>(_: T) -> AgentError {
    AgentError::Session("session store lock poisoned".into())
}

impl SessionStore for MemorySessionStore {
    fn save(&self, session: &ChatSession) -> Result<()> {
        let mut sessions = self.sessions.write().map_err(poisoned)?;
        sessions.insert(session.id.clone(), session.clone());
        Ok(())
    }

    fn load(&self, id: &SessionId) -> Result<Option<ChatSession>> {
        let sessions = self.sessions.read().map_err(poisoned)?;
        Ok(sessions.get(id).cloned())
    }

    fn delete(&self, id: &SessionId) -> Result<()> {
        let mut sessions = self.sessions.write().map_err(poisoned)?;
        sessions.remove(id);
        Ok(())
    }

    fn list(&self, limit: usize) -> Result<Vec<ChatSession>> {
        let sessions = self.sessions.read().map_err(poisoned)?;
        let mut result: Vec<_> = sessions.values().cloned().collect();

        result.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        result.truncate(limit);

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{
        Completion, CompletionStream, GenerationOptions, LlmProvider, ModelInfo, ProviderInfo,
    };
    use crate::reasoning::AgentBuilder;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    /// Answers every prompt with a fixed final answer and records the question
    struct FixedAnswer {
        reply: &'static str,
        questions: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl LlmProvider for FixedAnswer {
        fn info(&self) -> ProviderInfo {
            ProviderInfo {
                name: "Fixed".into(),
                base_url: String::new(),
                supports_streaming: false,
            }
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }

        async fn complete(
            &self,
            messages: &[Message],
            options: &GenerationOptions,
        ) -> Result<Completion> {
            if let Some(user) = messages.iter().find(|m| m.role == Role::User) {
                self.questions.lock().unwrap().push(user.content.clone());
            }
            if self.reply.is_empty() {
                return Err(AgentError::ProviderUnavailable("down".into()));
            }
            Ok(Completion::text(self.reply, &options.model))
        }

        async fn complete_stream(
            &self,
            _messages: &[Message],
            _options: &GenerationOptions,
        ) -> Result<CompletionStream> {
            Err(AgentError::Provider("unused".into()))
        }

        async fn list_models(&self) -> Result<Vec<ModelInfo>> {
            Ok(Vec::new())
        }
    }

    fn agent_with(reply: &'static str) -> (Agent, Arc<FixedAnswer>) {
        let provider = Arc::new(FixedAnswer {
            reply,
            questions: Mutex::new(Vec::new()),
        });
        let agent = AgentBuilder::new().provider(provider.clone()).build().unwrap();
        (agent, provider)
    }

    #[test]
    fn test_session_starts_with_greeting() {
        let session = ChatSession::new();
        assert!(session.active);
        assert_eq!(session.message_count(), 1);
        assert_eq!(session.transcript()[0].role, Role::Assistant);
        assert_eq!(session.transcript()[0].content, GREETING);
    }

    #[tokio::test]
    async fn test_submit_appends_exactly_two() {
        let (agent, _) = agent_with("Final Answer: -cos(x) + C");
        let mut session = ChatSession::new();

        let answer = session.submit(&agent, "Find the integral of sin(x)").await.unwrap();
        assert_eq!(answer, "-cos(x) + C");
        assert_eq!(session.message_count(), 3);

        session.submit(&agent, "And of cos(x)?").await.unwrap();
        assert_eq!(session.message_count(), 5);

        let roles: Vec<Role> = session.transcript().iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![Role::Assistant, Role::User, Role::Assistant, Role::User, Role::Assistant]
        );
    }

    #[tokio::test]
    async fn test_empty_question_rejected() {
        let (agent, provider) = agent_with("Final Answer: 1");
        let mut session = ChatSession::new();

        for blank in ["", "   ", "\n\t"] {
            let err = session.submit(&agent, blank).await.unwrap_err();
            assert!(matches!(err, AgentError::EmptyQuestion));
        }
        assert_eq!(session.message_count(), 1);
        assert!(provider.questions.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_agent_sees_cleaned_question() {
        let (agent, provider) = agent_with("Final Answer: 2");
        let mut session = ChatSession::new();

        session.submit(&agent, "What is √4?").await.unwrap();

        assert_eq!(session.transcript()[1].content, "What is √4?");
        let questions = provider.questions.lock().unwrap();
        assert_eq!(questions[0], "Question: What is 4?\nThought:");
    }

    #[tokio::test]
    async fn test_failed_submit_leaves_transcript() {
        let (agent, _) = agent_with("");
        let mut session = ChatSession::new();

        assert!(session.submit(&agent, "2 + 2").await.is_err());
        assert_eq!(session.message_count(), 1);
    }

    #[tokio::test]
    async fn test_ended_session_rejects() {
        let (agent, _) = agent_with("Final Answer: 1");
        let mut session = ChatSession::new();
        session.end();

        assert!(matches!(
            session.submit(&agent, "1").await,
            Err(AgentError::Session(_))
        ));
    }

    #[test]
    fn test_title() {
        let mut session = ChatSession::with_id(SessionId::from_string("abcdef123456"));
        assert_eq!(session.title(), "Session abcdef12");
        session.transcript.push(Message::user("What is 2 + 2?"));
        assert_eq!(session.title(), "What is 2 + 2?");
    }

    #[test]
    fn test_memory_store() {
        let store = MemorySessionStore::new();
        let session = ChatSession::new();
        let id = session.id.clone();

        store.save(&session).unwrap();

        let loaded = store.load(&id).unwrap();
        assert_eq!(loaded.unwrap().id, id);
        assert_eq!(store.list(10).unwrap().len(), 1);

        store.delete(&id).unwrap();
        assert!(store.load(&id).unwrap().is_none());
    }
}
