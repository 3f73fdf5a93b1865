//! UI Components

use leptos::prelude::*;
use crate::api::ChatMessage;

/// Message bubble component
#[component]
pub fn MessageBubble(message: ChatMessage) -> impl IntoView {
    let class = format!("message message-{}", message.role);

    view! {
        <div class=class>
            <span class="role">{message.role.clone()}</span>
            <p class="content">{message.content.clone()}</p>
        </div>
    }
}

/// Busy indicator with a caption
#[component]
pub fn Spinner(#[prop(into)] label: String) -> impl IntoView {
    view! {
        <div class="spinner" role="status">
            <span class="spinner-dot"></span>
            <span class="spinner-label">{label}</span>
        </div>
    }
}

/// Highlighted notice: `info`, `warning`, `error` or `success`
#[component]
pub fn Notice(kind: &'static str, children: Children) -> impl IntoView {
    view! {
        <div class=format!("notice notice-{kind}")>{children()}</div>
    }
}
