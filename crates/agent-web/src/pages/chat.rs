//! Chat Page

use leptos::prelude::*;
use crate::api;
use crate::components::{MessageBubble, Notice, Spinner};

const HEADING: &str = "Text-to-Math Problem Solver Using Google Gemma 2";
const GREETING: &str = "Hi, I'm a Math chatbot! Ask me any math-related question!";
const DEFAULT_QUESTION: &str = "Find the integral of sin(x)";

fn greeting() -> Vec<api::ChatMessage> {
    vec![api::ChatMessage {
        role: "assistant".into(),
        content: GREETING.into(),
    }]
}

#[component]
pub fn ChatPage() -> impl IntoView {
    let (messages, set_messages) = signal(greeting());
    let (input, set_input) = signal(String::from(DEFAULT_QUESTION));
    let (loading, set_loading) = signal(false);
    let (api_key, set_api_key) = signal(String::new());
    let (session_id, set_session_id) = signal(None::<String>);
    let (answer, set_answer) = signal(None::<String>);
    let (error, set_error) = signal(None::<String>);
    let (warning, set_warning) = signal(false);
    let (steps, set_steps) = signal(Vec::<String>::new());
    let (draft, set_draft) = signal(String::new());

    let send = move |_| {
        if loading.get() {
            return;
        }

        let question = input.get();
        set_answer.set(None);
        set_error.set(None);
        if question.trim().is_empty() {
            set_warning.set(true);
            return;
        }
        set_warning.set(false);
        set_loading.set(true);
        set_steps.set(Vec::new());
        set_draft.set(String::new());

        let key = api_key.get();
        let session = session_id.get();

        let on_frame = move |frame: api::StreamFrame| match frame {
            api::StreamFrame::Step { event: api::StepEvent::Token { text } } => {
                set_draft.update(|d| d.push_str(&text));
            }
            api::StreamFrame::Step { event } => {
                set_draft.set(String::new());
                if let Some(line) = event.describe() {
                    set_steps.update(|s| s.push(line));
                }
            }
            api::StreamFrame::Answer(reply) => {
                // The server transcript is authoritative.
                set_messages.set(reply.history);
                set_session_id.set(Some(reply.session_id));
                set_answer.set(Some(reply.message));
                set_loading.set(false);
            }
            api::StreamFrame::Error { error } => {
                set_error.set(Some(error));
                set_loading.set(false);
            }
        };

        let Err(e) = api::stream_chat(&question, &key, session.as_deref(), on_frame) else {
            return;
        };
        leptos::logging::warn!("WebSocket unavailable, falling back to HTTP: {e}");
        leptos::task::spawn_local(async move {
            match api::send_chat(&question, &key, session.as_deref()).await {
                Ok(reply) => {
                    set_messages.set(reply.history);
                    set_session_id.set(Some(reply.session_id));
                    set_answer.set(Some(reply.message));
                }
                Err(e) => set_error.set(Some(e)),
            }
            set_loading.set(false);
        });
    };

    let new_chat = move |_| {
        if let Some(id) = session_id.get() {
            leptos::task::spawn_local(async move {
                if let Err(e) = api::end_session(&id).await {
                    leptos::logging::warn!("{e}");
                }
            });
        }
        set_session_id.set(None);
        set_messages.set(greeting());
        set_steps.set(Vec::new());
        set_draft.set(String::new());
        set_answer.set(None);
        set_error.set(None);
    };

    view! {
        <div class="chat">
            <aside class="sidebar">
                <h2>"Settings"</h2>
                <div class="field">
                    <label>"Groq API Key"</label>
                    <input
                        type="password"
                        prop:value=move || api_key.get()
                        on:input=move |ev| set_api_key.set(event_target_value(&ev))
                    />
                </div>
                <button class="secondary" on:click=new_chat>"New chat"</button>
            </aside>

            <main class="chat-main">
                <h1>{HEADING}</h1>

                <Show
                    when=move || !api_key.get().trim().is_empty()
                    fallback=|| view! {
                        <Notice kind="info">"Please enter your Groq API key to continue."</Notice>
                    }
                >
                    <div class="messages">
                        <For
                            each=move || messages.get().into_iter().enumerate()
                            key=|(i, _)| *i
                            children=move |(_, msg)| view! { <MessageBubble message=msg /> }
                        />
                    </div>

                    <div class="input-area">
                        <textarea
                            prop:value=move || input.get()
                            on:input=move |ev| set_input.set(event_target_value(&ev))
                        />
                        <button on:click=send disabled=move || loading.get()>
                            "Find My Answer"
                        </button>
                    </div>

                    <Show when=move || warning.get()>
                        <Notice kind="warning">"Please enter a question."</Notice>
                    </Show>
                    <Show when=move || loading.get()>
                        <Spinner label="Generating response..." />
                    </Show>
                    <Show when=move || !steps.get().is_empty() || !draft.get().is_empty()>
                        <details class="thoughts" prop:open=move || loading.get()>
                            <summary>"Agent thoughts"</summary>
                            <For
                                each=move || steps.get().into_iter().enumerate()
                                key=|(i, _)| *i
                                children=move |(_, line)| view! { <pre class="step">{line}</pre> }
                            />
                            <pre class="step draft">{move || draft.get()}</pre>
                        </details>
                    </Show>
                    {move || error.get().map(|e| view! { <Notice kind="error">{e}</Notice> })}
                    {move || answer.get().map(|a| view! {
                        <div class="response">
                            <h3>"Response:"</h3>
                            <Notice kind="success">{a}</Notice>
                        </div>
                    })}
                </Show>
            </main>
        </div>
    }
}
