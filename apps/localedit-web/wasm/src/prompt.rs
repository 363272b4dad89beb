//! Blocking prompts through `window.prompt` / `window.alert`

use localedit_core::Prompter;

#[derive(Debug, Default, Clone, Copy)]
pub struct WindowPrompter;

impl Prompter for WindowPrompter {
    fn prompt(&self, message: &str, initial: &str) -> Option<String> {
        web_sys::window()?
            .prompt_with_message_and_default(message, initial)
            .ok()
            .flatten()
    }

    fn notify(&self, message: &str) {
        if let Some(window) = web_sys::window() {
            let _ = window.alert_with_message(message);
        }
    }
}
