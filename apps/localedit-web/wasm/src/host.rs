//! JavaScript bridge for hosts that expose their message store
//!
//! The host object passed in must provide `getCurrentUser()`,
//! `getMessage(id)` and `receiveMessage(channelId, message)`.

use std::cell::RefCell;
use std::collections::HashMap;

use js_sys::{Function, Object, Reflect};
use localedit_core::{HostEditOutcome, HostEditSession, HostMessage, HostMessenger};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;

fn method(target: &JsValue, name: &str) -> Option<Function> {
    Reflect::get(target, &JsValue::from_str(name))
        .ok()?
        .dyn_into::<Function>()
        .ok()
}

/// `HostMessenger` over a host's JavaScript message store
///
/// The raw host object fetched for a message is held until that message is
/// redrawn, so the redraw hands back a full copy with only `content` replaced.
pub struct JsMessenger {
    host: JsValue,
    raw: RefCell<HashMap<String, JsValue>>,
}

impl JsMessenger {
    pub fn new(host: JsValue) -> Self {
        Self {
            host,
            raw: RefCell::new(HashMap::new()),
        }
    }

    fn call(&self, name: &str, args: &[&JsValue]) -> Option<JsValue> {
        let func = method(&self.host, name)?;
        let result = match args {
            [] => func.call0(&self.host),
            [a] => func.call1(&self.host, a),
            [a, b] => func.call2(&self.host, a, b),
            _ => return None,
        };
        match result {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::warn!(method = name, error = ?err, "Host call failed");
                None
            }
        }
    }

    /// Parse and remember a raw host message
    pub fn adopt(&self, raw: JsValue) -> Option<HostMessage> {
        let message: HostMessage = serde_wasm_bindgen::from_value(raw.clone()).ok()?;
        self.raw.borrow_mut().insert(message.id.clone(), raw);
        Some(message)
    }

    /// Number of raw host objects awaiting a redraw
    pub fn pending_raw(&self) -> usize {
        self.raw.borrow().len()
    }

    pub fn forget_raw(&self) {
        self.raw.borrow_mut().clear();
    }

    fn to_js(&self, message: &HostMessage) -> Option<JsValue> {
        let raw = self.raw.borrow_mut().remove(&message.id);
        let copy = match raw.and_then(|r| r.dyn_into::<Object>().ok()) {
            Some(raw) => Object::assign(&Object::new(), &raw).into(),
            None => serde_wasm_bindgen::to_value(message).ok()?,
        };
        Reflect::set(
            &copy,
            &JsValue::from_str("content"),
            &JsValue::from_str(&message.content),
        )
        .ok()?;
        Some(copy)
    }
}

impl HostMessenger for JsMessenger {
    fn current_user_id(&self) -> Option<String> {
        let user = self.call("getCurrentUser", &[])?;
        Reflect::get(&user, &JsValue::from_str("id")).ok()?.as_string()
    }

    fn get_message(&self, id: &str) -> Option<HostMessage> {
        let raw = self.call("getMessage", &[&JsValue::from_str(id)])?;
        if raw.is_undefined() || raw.is_null() {
            return None;
        }
        self.adopt(raw)
    }

    fn receive_message(&self, channel_id: &str, message: &HostMessage) {
        let Some(copy) = self.to_js(message) else {
            tracing::warn!(message_id = %message.id, "Could not build host message copy");
            return;
        };
        self.call("receiveMessage", &[&JsValue::from_str(channel_id), &copy]);
    }
}

/// Edits host messages in place instead of rewriting DOM text
#[wasm_bindgen]
pub struct HostBridge {
    session: HostEditSession<JsMessenger>,
}

#[wasm_bindgen]
impl HostBridge {
    #[wasm_bindgen(constructor)]
    pub fn new(host: JsValue) -> Self {
        Self {
            session: HostEditSession::new(JsMessenger::new(host)),
        }
    }

    /// Replace the content of the host message `id`
    ///
    /// Returns false for unknown messages and for the user's own messages.
    #[wasm_bindgen(js_name = editLocally)]
    pub fn edit_locally(&mut self, id: &str, text: &str) -> bool {
        let Some(message) = self.session.messenger().get_message(id) else {
            return false;
        };
        self.session.edit_locally(&message, text) == HostEditOutcome::Edited
    }

    #[wasm_bindgen(js_name = originalContent)]
    pub fn original_content(&self, id: &str) -> Option<String> {
        self.session.original_content(id).map(str::to_string)
    }

    #[wasm_bindgen(js_name = editedCount)]
    pub fn edited_count(&self) -> usize {
        self.session.edited_count()
    }

    /// Put every edited message back; call on plugin unload
    #[wasm_bindgen(js_name = restoreAll)]
    pub fn restore_all(&mut self) -> usize {
        let restored = self.session.restore_all();
        self.session.messenger().forget_raw();
        restored
    }
}
