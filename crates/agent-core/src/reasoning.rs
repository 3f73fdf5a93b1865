//! Reasoning Loop
//!
//! Zero-shot ReAct (Reason + Act). The LLM is shown every tool's name and
//! description and answers in a fixed text format:
//!
//! ```text
//! Thought: I should integrate sin(x)
//! Action: Integral Solver
//! Action Input: sin(x)
//! Observation: -cos(x) + C
//! Thought: I now know the final answer
//! Final Answer: -cos(x) + C
//! ```
//!
//! Generation stops before `Observation:`; the loop runs the named tool and
//! feeds its output back as the observation until a `Final Answer:` arrives.

use std::sync::{Arc, LazyLock};

use futures::StreamExt;
use regex::Regex;
use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;

use crate::error::{AgentError, Result};
use crate::message::{Conversation, Message, Role};
use crate::provider::{GenerationOptions, LlmProvider};
use crate::tool::{ToolCall, ToolRegistry, ToolResult};

const FINAL_ANSWER: &str = "Final Answer:";
const OBSERVATION_STOP: &str = "\nObservation:";

const MISSING_ACTION: &str = "Invalid Format: Missing 'Action:' after 'Thought:'";
const MISSING_ACTION_INPUT: &str = "Invalid Format: Missing 'Action Input:' after 'Action:'";
const ANSWER_AND_ACTION: &str =
    "Parsing LLM output produced both a final answer and a parse-able action";

/// Observation for parse failures the model cannot act on
const INVALID_RESPONSE: &str = "Invalid or incomplete response";

/// Answer returned when the step limit runs out
pub const EARLY_STOP_ANSWER: &str = "Agent stopped due to iteration limit or time limit.";

static ACTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)Action\s*\d*\s*:[\s]*(.*?)[\s]*Action\s*\d*\s*Input\s*\d*\s*:[\s]*(.*)")
        .expect("action pattern is valid")
});
static ACTION_ONLY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Action\s*\d*\s*:").expect("action-only pattern is valid"));
static ACTION_INPUT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Action\s*\d*\s*Input\s*\d*\s*:").expect("action-input pattern is valid")
});

/// Agent configuration
#[derive(Clone, Debug)]
pub struct AgentConfig {
    /// Text placed before the tool list
    pub prefix: String,

    /// Maximum reasoning iterations before giving up
    pub max_iterations: usize,

    /// Generation options (stop sequences are added per step)
    pub generation: GenerationOptions,

    /// Feed malformed LLM output back as an observation instead of failing
    pub handle_parsing_errors: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_PREFIX.into(),
            max_iterations: 15,
            generation: GenerationOptions::default(),
            handle_parsing_errors: true,
        }
    }
}

const DEFAULT_PREFIX: &str =
    "Answer the following questions as best you can. You have access to the following tools:";

const FORMAT_INSTRUCTIONS: &str = "Use the following format:

Question: the input question you must answer
Thought: you should always think about what to do
Action: the action to take, should be one of [{tool_names}]
Action Input: the input to the action
Observation: the result of the action
... (this Thought/Action/Action Input/Observation can repeat N times)
Thought: I now know the final answer
Final Answer: the final answer to the original input question";

/// Progress of a single run, for live display
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AgentEvent {
    /// Text streamed by the model while it is still writing a step
    Token { text: String },
    /// Free text the model wrote before its action
    Thought { text: String },
    /// A tool is about to be invoked
    Action { tool: String, input: String },
    /// Tool output fed back to the model
    Observation { tool: String, output: String },
    /// The model's output could not be parsed
    ParseError { message: String },
    /// The run finished
    FinalAnswer { text: String },
}

/// One parsed model step
#[derive(Debug, PartialEq, Eq)]
enum Step {
    Action { thought: String, call: ToolCall },
    Finish { answer: String },
}

/// The main Agent struct
pub struct Agent {
    provider: Arc<dyn LlmProvider>,
    tools: Arc<ToolRegistry>,
    config: AgentConfig,
}

impl Agent {
    /// Create a new agent
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        tools: Arc<ToolRegistry>,
        config: AgentConfig,
    ) -> Self {
        Self {
            provider,
            tools,
            config,
        }
    }

    /// Create with default configuration
    pub fn with_defaults(provider: Arc<dyn LlmProvider>, tools: Arc<ToolRegistry>) -> Self {
        Self::new(provider, tools, AgentConfig::default())
    }

    /// Build the system prompt: prefix, tool list, format instructions
    pub fn build_system_prompt(&self) -> String {
        let names = self.tools.names().join(", ");
        format!(
            "{}\n\n{}\n\n{}\n\nBegin!",
            self.config.prefix,
            self.tools.describe(),
            FORMAT_INSTRUCTIONS.replace("{tool_names}", &names)
        )
    }

    /// Run the agent on a conversation whose last user message holds the question
    pub async fn run(&self, conversation: &mut Conversation) -> Result<String> {
        self.run_inner(conversation, None).await
    }

    /// Answer a single question in a fresh scratchpad
    pub async fn ask(&self, question: &str) -> Result<String> {
        let mut conversation = self.start(question);
        self.run_inner(&mut conversation, None).await
    }

    /// Like [`Agent::ask`], reporting each step on `events`
    pub async fn ask_with_events(
        &self,
        question: &str,
        events: &UnboundedSender<AgentEvent>,
    ) -> Result<String> {
        let mut conversation = self.start(question);
        self.run_inner(&mut conversation, Some(events)).await
    }

    fn start(&self, question: &str) -> Conversation {
        let mut conversation = Conversation::with_system_prompt(self.build_system_prompt());
        conversation.push(Message::user(format!("Question: {question}\nThought:")));
        conversation
    }

    async fn run_inner(
        &self,
        conversation: &mut Conversation,
        events: Option<&UnboundedSender<AgentEvent>>,
    ) -> Result<String> {
        if conversation.messages().first().map(|m| m.role) != Some(Role::System) {
            conversation
                .messages_mut()
                .insert(0, Message::system(self.build_system_prompt()));
        }

        let emit = |event: AgentEvent| {
            if let Some(tx) = events {
                // Receiver gone means nobody is watching; the run continues.
                let _ = tx.send(event);
            }
        };

        let options = self.config.generation.with_stop([OBSERVATION_STOP]);

        for iteration in 1..=self.config.max_iterations {
            conversation.truncate_to_fit();

            let content = self.complete_step(conversation.messages(), &options, events).await?;
            let output = strip_observation(&content);
            tracing::debug!(iteration, output = %output, "Agent step");

            conversation.push(Message::assistant(output));

            match parse_step(output) {
                Ok(Step::Finish { answer }) => {
                    emit(AgentEvent::FinalAnswer { text: answer.clone() });
                    return Ok(answer);
                }
                Ok(Step::Action { thought, mut call }) => {
                    if !thought.is_empty() {
                        emit(AgentEvent::Thought { text: thought });
                    }
                    call.id = Some(uuid::Uuid::new_v4().to_string());
                    emit(AgentEvent::Action {
                        tool: call.name.clone(),
                        input: call.input.clone(),
                    });

                    let result = self.execute_tool(&call).await;
                    emit(AgentEvent::Observation {
                        tool: result.name.clone(),
                        output: result.output.clone(),
                    });
                    conversation.push(Message::tool(
                        format!("Observation: {}\nThought:", result.output),
                        &call.name,
                        call.id.clone(),
                    ));
                }
                Err(detail) => {
                    if !self.config.handle_parsing_errors {
                        return Err(AgentError::Parse(detail));
                    }
                    tracing::warn!(iteration, %detail, "Could not parse LLM output, retrying");
                    let observation = parse_observation(&detail);
                    emit(AgentEvent::ParseError { message: observation.to_string() });
                    conversation.push(Message::new(
                        Role::Tool,
                        format!("Observation: {observation}\nThought:"),
                    ));
                }
            }
        }

        tracing::warn!(max_iterations = self.config.max_iterations, "Agent step limit reached");
        emit(AgentEvent::FinalAnswer { text: EARLY_STOP_ANSWER.into() });
        Ok(EARLY_STOP_ANSWER.into())
    }

    /// One model step; streamed token by token when someone is watching
    async fn complete_step(
        &self,
        messages: &[Message],
        options: &GenerationOptions,
        events: Option<&UnboundedSender<AgentEvent>>,
    ) -> Result<String> {
        let Some(tx) = events.filter(|_| self.provider.info().supports_streaming) else {
            return Ok(self.provider.complete(messages, options).await?.content);
        };

        let mut stream = self.provider.complete_stream(messages, options).await?;
        let mut content = String::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            if !chunk.delta.is_empty() {
                let _ = tx.send(AgentEvent::Token { text: chunk.delta.clone() });
                content.push_str(&chunk.delta);
            }
            if chunk.done {
                break;
            }
        }
        Ok(content)
    }

    /// Execute a tool call, turning every failure into an observation
    async fn execute_tool(&self, call: &ToolCall) -> ToolResult {
        tracing::debug!(tool = %call.name, input = %call.input, "Executing tool");

        let result = match self.tools.execute(call).await {
            Ok(result) => result,
            Err(AgentError::ToolNotFound(name)) => ToolResult::failure(
                &name,
                format!(
                    "{name} is not a valid tool, try one of [{}].",
                    self.tools.names().join(", ")
                ),
            ),
            Err(e) => {
                tracing::warn!(tool = %call.name, error = %e, "Tool failed");
                ToolResult::failure(&call.name, format!("Error: {e}"))
            }
        };

        match &call.id {
            Some(id) => result.with_id(id.clone()),
            None => result,
        }
    }

    /// Get the tool registry
    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Get configuration
    pub const fn config(&self) -> &AgentConfig {
        &self.config
    }
}

/// What the model is told about a parse failure: the format hints are
/// actionable, anything else is not worth echoing back
fn parse_observation(detail: &str) -> &str {
    match detail {
        MISSING_ACTION | MISSING_ACTION_INPUT => detail,
        _ => INVALID_RESPONSE,
    }
}

/// Cut anything the model wrote past the observation marker
fn strip_observation(text: &str) -> &str {
    text.find(OBSERVATION_STOP).map_or(text, |idx| &text[..idx]).trim_end()
}

fn parse_step(text: &str) -> std::result::Result<Step, String> {
    let has_answer = text.contains(FINAL_ANSWER);

    if let Some(caps) = ACTION_RE.captures(text) {
        if has_answer {
            return Err(format!("{ANSWER_AND_ACTION}: `{text}`"));
        }
        let whole = caps.get(0).map_or(0, |m| m.start());
        let thought = text[..whole].trim().trim_start_matches("Thought:").trim().to_string();
        let name = caps[1].trim().to_string();
        let input = caps[2].trim().trim_matches('"').to_string();
        return Ok(Step::Action {
            thought,
            call: ToolCall::new(name, input),
        });
    }

    if has_answer {
        let answer = text
            .rsplit(FINAL_ANSWER)
            .next()
            .unwrap_or_default()
            .trim()
            .to_string();
        return Ok(Step::Finish { answer });
    }

    if !ACTION_ONLY_RE.is_match(text) {
        Err(MISSING_ACTION.into())
    } else if !ACTION_INPUT_RE.is_match(text) {
        Err(MISSING_ACTION_INPUT.into())
    } else {
        Err(format!("Could not parse LLM output: `{text}`"))
    }
}

/// Builder for Agent configuration
pub struct AgentBuilder {
    provider: Option<Arc<dyn LlmProvider>>,
    tools: ToolRegistry,
    config: AgentConfig,
}

impl Default for AgentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentBuilder {
    pub fn new() -> Self {
        Self {
            provider: None,
            tools: ToolRegistry::new(),
            config: AgentConfig::default(),
        }
    }

    #[must_use]
    pub fn provider(mut self, provider: Arc<dyn LlmProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    #[must_use]
    pub fn tool<T: crate::tool::Tool + 'static>(mut self, tool: T) -> Self {
        self.tools.register(tool);
        self
    }

    #[must_use]
    pub fn generation(mut self, generation: GenerationOptions) -> Self {
        self.config.generation = generation;
        self
    }

    #[must_use]
    pub fn max_iterations(mut self, max: usize) -> Self {
        self.config.max_iterations = max;
        self
    }

    #[must_use]
    pub const fn handle_parsing_errors(mut self, handle: bool) -> Self {
        self.config.handle_parsing_errors = handle;
        self
    }

    pub fn build(self) -> Result<Agent> {
        let provider = self
            .provider
            .ok_or_else(|| AgentError::Config("Provider is required".into()))?;

        Ok(Agent::new(provider, Arc::new(self.tools), self.config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{Completion, CompletionStream, ModelInfo, ProviderInfo, StreamChunk};
    use crate::tool::{Tool, ToolSchema};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Replays canned completions and records what it was sent
    struct ScriptedProvider {
        replies: Mutex<Vec<String>>,
        seen: Mutex<Vec<Vec<Message>>>,
    }

    impl ScriptedProvider {
        fn new(replies: &[&str]) -> Arc<Self> {
            let mut replies: Vec<String> = replies.iter().map(|s| (*s).to_string()).collect();
            replies.reverse();
            Arc::new(Self {
                replies: Mutex::new(replies),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        fn info(&self) -> ProviderInfo {
            ProviderInfo {
                name: "Scripted".into(),
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
            assert_eq!(options.stop_sequences, vec![OBSERVATION_STOP.to_string()]);
            self.seen.lock().unwrap().push(messages.to_vec());
            let reply = self
                .replies
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| "Thought: still thinking".into());
            Ok(Completion::text(reply, &options.model))
        }

        async fn complete_stream(
            &self,
            _messages: &[Message],
            _options: &GenerationOptions,
        ) -> Result<CompletionStream> {
            Err(AgentError::Provider("streaming not scripted".into()))
        }

        async fn list_models(&self) -> Result<Vec<ModelInfo>> {
            Ok(Vec::new())
        }
    }

    struct UpperTool;

    #[async_trait]
    impl Tool for UpperTool {
        fn schema(&self) -> ToolSchema {
            ToolSchema {
                name: "Shout Tool".into(),
                description: "Upper-cases its input.".into(),
                category: None,
            }
        }

        async fn execute(&self, call: &ToolCall) -> Result<ToolResult> {
            Ok(ToolResult::success("Shout Tool", call.input.to_uppercase()))
        }
    }

    fn agent(provider: Arc<ScriptedProvider>) -> Agent {
        AgentBuilder::new()
            .provider(provider)
            .tool(UpperTool)
            .max_iterations(4)
            .build()
            .unwrap()
    }

    #[test]
    fn test_parse_action() {
        let step = parse_step(
            "I should shout.\nAction: Shout Tool\nAction Input: \"hello\"",
        )
        .unwrap();
        assert_eq!(
            step,
            Step::Action {
                thought: "I should shout.".into(),
                call: ToolCall::new("Shout Tool", "hello"),
            }
        );
    }

    #[test]
    fn test_parse_final_answer() {
        let step = parse_step("I now know the final answer\nFinal Answer: -cos(x) + C").unwrap();
        assert_eq!(step, Step::Finish { answer: "-cos(x) + C".into() });
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(parse_step("just musing").unwrap_err(), MISSING_ACTION);
        assert_eq!(parse_step("Action: Calculator").unwrap_err(), MISSING_ACTION_INPUT);
        assert!(
            parse_step("Action: Calculator\nAction Input: 2+2\nFinal Answer: 4")
                .unwrap_err()
                .starts_with(ANSWER_AND_ACTION)
        );
    }

    #[test]
    fn test_strip_observation() {
        assert_eq!(
            strip_observation("Action: A\nAction Input: x\nObservation: made up"),
            "Action: A\nAction Input: x"
        );
    }

    #[test]
    fn test_system_prompt_lists_tools() {
        let agent = agent(ScriptedProvider::new(&[]));
        let prompt = agent.build_system_prompt();
        assert!(prompt.contains("Shout Tool: Upper-cases its input."));
        assert!(prompt.contains("should be one of [Shout Tool]"));
        assert!(prompt.ends_with("Begin!"));
    }

    #[tokio::test]
    async fn test_tool_round_trip() {
        let provider = ScriptedProvider::new(&[
            "I should shout.\nAction: Shout Tool\nAction Input: hi",
            "I now know the final answer\nFinal Answer: HI",
        ]);
        let agent = agent(provider.clone());

        let answer = agent.ask("Shout hi").await.unwrap();
        assert_eq!(answer, "HI");

        let seen = provider.seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        let observation = seen[1].last().unwrap();
        assert_eq!(observation.role, Role::Tool);
        assert_eq!(observation.content, "Observation: HI\nThought:");
    }

    #[tokio::test]
    async fn test_unknown_tool_becomes_observation() {
        let provider = ScriptedProvider::new(&[
            "Action: Search\nAction Input: x",
            "Final Answer: gave up",
        ]);
        let agent = agent(provider.clone());

        assert_eq!(agent.ask("q").await.unwrap(), "gave up");
        let seen = provider.seen.lock().unwrap();
        assert_eq!(
            seen[1].last().unwrap().content,
            "Observation: Search is not a valid tool, try one of [Shout Tool].\nThought:"
        );
    }

    #[tokio::test]
    async fn test_parse_error_recovered() {
        let provider = ScriptedProvider::new(&["hmm", "Final Answer: 4"]);
        let agent = agent(provider);

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        assert_eq!(agent.ask_with_events("2+2", &tx).await.unwrap(), "4");
        drop(tx);

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        assert_eq!(
            events,
            vec![
                AgentEvent::ParseError { message: MISSING_ACTION.into() },
                AgentEvent::FinalAnswer { text: "4".into() },
            ]
        );
    }

    #[tokio::test]
    async fn test_parse_error_strict() {
        let provider = ScriptedProvider::new(&["hmm"]);
        let agent = AgentBuilder::new()
            .provider(provider)
            .handle_parsing_errors(false)
            .build()
            .unwrap();

        assert!(matches!(agent.ask("q").await, Err(AgentError::Parse(_))));
    }

    #[tokio::test]
    async fn test_step_limit_answers_with_early_stop() {
        let provider = ScriptedProvider::new(&[]);
        let agent = agent(provider.clone());

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        assert_eq!(agent.ask_with_events("q", &tx).await.unwrap(), EARLY_STOP_ANSWER);
        drop(tx);

        assert_eq!(provider.seen.lock().unwrap().len(), 4);
        let mut last = None;
        while let Some(event) = rx.recv().await {
            last = Some(event);
        }
        assert_eq!(last, Some(AgentEvent::FinalAnswer { text: EARLY_STOP_ANSWER.into() }));
    }

    #[tokio::test]
    async fn test_unparseable_output_is_not_echoed() {
        let provider = ScriptedProvider::new(&[
            "Action: Shout Tool\nAction Input: hi\nFinal Answer: HI",
            "Final Answer: HI",
        ]);
        let agent = agent(provider.clone());

        assert_eq!(agent.ask("q").await.unwrap(), "HI");
        let seen = provider.seen.lock().unwrap();
        assert_eq!(
            seen[1].last().unwrap().content,
            "Observation: Invalid or incomplete response\nThought:"
        );
    }

    #[test]
    fn test_parse_observation() {
        assert_eq!(parse_observation(MISSING_ACTION), MISSING_ACTION);
        assert_eq!(parse_observation(MISSING_ACTION_INPUT), MISSING_ACTION_INPUT);
        assert_eq!(
            parse_observation(&format!("{ANSWER_AND_ACTION}: `long model output`")),
            INVALID_RESPONSE
        );
    }

    /// Streams each scripted reply word by word
    struct StreamingProvider {
        replies: Mutex<Vec<&'static str>>,
    }

    #[async_trait]
    impl LlmProvider for StreamingProvider {
        fn info(&self) -> ProviderInfo {
            ProviderInfo {
                name: "Streaming".into(),
                base_url: String::new(),
                supports_streaming: true,
            }
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }

        async fn complete(
            &self,
            _messages: &[Message],
            _options: &GenerationOptions,
        ) -> Result<Completion> {
            Err(AgentError::Provider("evented runs must stream".into()))
        }

        async fn complete_stream(
            &self,
            _messages: &[Message],
            _options: &GenerationOptions,
        ) -> Result<CompletionStream> {
            let reply = self.replies.lock().unwrap().remove(0);
            let mut chunks: Vec<Result<StreamChunk>> = reply
                .split_inclusive(' ')
                .map(|w| Ok(StreamChunk { delta: w.to_string(), done: false }))
                .collect();
            chunks.push(Ok(StreamChunk { delta: String::new(), done: true }));
            Ok(Box::pin(futures::stream::iter(chunks)))
        }

        async fn list_models(&self) -> Result<Vec<ModelInfo>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_evented_run_streams_tokens() {
        let provider = Arc::new(StreamingProvider {
            replies: Mutex::new(vec![
                "Action: Shout Tool\nAction Input: hi",
                "Final Answer: HI there",
            ]),
        });
        let agent = AgentBuilder::new()
            .provider(provider)
            .tool(UpperTool)
            .build()
            .unwrap();

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        assert_eq!(agent.ask_with_events("Shout hi", &tx).await.unwrap(), "HI there");
        drop(tx);

        let mut tokens = String::new();
        let mut kinds = Vec::new();
        while let Some(event) = rx.recv().await {
            match event {
                AgentEvent::Token { text } => tokens.push_str(&text),
                AgentEvent::Action { .. } => kinds.push("action"),
                AgentEvent::Observation { .. } => kinds.push("observation"),
                AgentEvent::FinalAnswer { .. } => kinds.push("final_answer"),
                _ => {}
            }
        }
        assert_eq!(tokens, "Action: Shout Tool\nAction Input: hiFinal Answer: HI there");
        assert_eq!(kinds, vec!["action", "observation", "final_answer"]);
    }

    #[test]
    fn test_builder_requires_provider() {
        assert!(matches!(AgentBuilder::new().build(), Err(AgentError::Config(_))));
    }
}
