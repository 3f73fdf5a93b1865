//! mathgpt Web Frontend
//!
//! Leptos-based WASM frontend for the math assistant.

mod app;
mod pages;
mod components;
mod api;

pub use app::App;

use wasm_bindgen::prelude::*;

/// Browser tab title
pub const PAGE_TITLE: &str = "Math Problem Solver & Knowledge Assistant";

/// WASM entry point
#[wasm_bindgen(start)]
pub fn main() {
    console_error_panic_hook::set_once();
    if let Some(document) = web_sys::window().and_then(|w| w.document()) {
        document.set_title(PAGE_TITLE);
    }
    leptos::mount::mount_to_body(App);
}
