//! WASM bindings for local message overrides
//!
//! Implements the `localedit-core` capability traits on `web-sys` and wires
//! two `MutationObserver`s to the engine. State lives in Rust; JavaScript
//! only constructs the plugin and calls `start` / `stop`.
//!
//! ## Usage (JavaScript)
//!
//! ```javascript
//! import init, { LocalEditPlugin } from './pkg/localedit_wasm.js';
//!
//! await init();
//!
//! const plugin = new LocalEditPlugin({ modify_label: "Edit locally" });
//! plugin.start();
//! // ...
//! plugin.stop();
//! ```

pub mod dom;
pub mod host;
pub mod logging;
pub mod observer;
pub mod prompt;
pub mod storage;

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::{Rc, Weak};

use localedit_core::{
    ConfigError, DomAdapter, EngineConfig, LocalEdit, MenuAction, MutationBatch, Stream,
    Subscription,
};
use wasm_bindgen::prelude::*;
use web_sys::Node;

pub use dom::WebDom;
pub use host::HostBridge;
pub use prompt::WindowPrompter;
pub use storage::LocalStorage;

type Engine = LocalEdit<WebDom, LocalStorage, WindowPrompter>;

/// Initialize the WASM module
/// Called automatically by wasm-bindgen
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
    logging::init_logging();
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "localedit loaded");
}

/// Get the library version
#[wasm_bindgen]
pub fn get_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

/// Parse an optional JSON configuration, falling back to defaults
pub fn parse_config(json: Option<&str>) -> Result<EngineConfig, ConfigError> {
    match json {
        Some(text) if !text.trim().is_empty() => EngineConfig::from_json(text),
        _ => Ok(EngineConfig::default()),
    }
}

fn config_from_js(value: JsValue) -> Result<EngineConfig, JsValue> {
    if value.is_undefined() || value.is_null() {
        return Ok(EngineConfig::default());
    }
    if let Some(text) = value.as_string() {
        return parse_config(Some(&text)).map_err(|e| JsValue::from_str(&e.to_string()));
    }
    serde_wasm_bindgen::from_value(value)
        .map_err(|e| JsValue::from_str(&format!("Invalid configuration: {}", e)))
}

/// Work delivered by observers and menu clicks
enum Pending {
    Batch(Stream, MutationBatch<Node>),
    Menu(MenuAction, Node),
}

struct Shared {
    engine: RefCell<Engine>,
    backlog: RefCell<VecDeque<Pending>>,
}

impl Shared {
    /// Queue `item` and drain the backlog unless the engine is already busy
    ///
    /// A callback arriving while the engine is borrowed leaves its work in
    /// the backlog; the outer drain picks it up.
    fn deliver(&self, item: Pending) {
        self.backlog.borrow_mut().push_back(item);
        let Ok(mut engine) = self.engine.try_borrow_mut() else {
            return;
        };
        loop {
            let next = self.backlog.borrow_mut().pop_front();
            let Some(item) = next else {
                break;
            };
            match item {
                Pending::Batch(stream, batch) => {
                    engine.submit(stream, batch);
                }
                Pending::Menu(action, menu) => {
                    let outcome = engine.handle_menu_action(action, &menu);
                    tracing::debug!(?outcome, "Menu action handled");
                }
            }
        }
    }
}

fn batch_sink(shared: Weak<Shared>, stream: Stream) -> impl FnMut(MutationBatch<Node>) + 'static {
    move |batch| {
        if let Some(shared) = shared.upgrade() {
            shared.deliver(Pending::Batch(stream, batch));
        }
    }
}

fn busy() -> JsValue {
    JsValue::from_str("Engine is busy")
}

/// The plugin object a host loads
#[wasm_bindgen]
pub struct LocalEditPlugin {
    shared: Rc<Shared>,
}

#[wasm_bindgen]
impl LocalEditPlugin {
    /// Create a stopped plugin; `config` may be omitted, a JSON string or an object
    #[wasm_bindgen(constructor)]
    pub fn new(config: JsValue) -> Result<LocalEditPlugin, JsValue> {
        let config = config_from_js(config)?;
        let document = web_sys::window()
            .and_then(|w| w.document())
            .ok_or_else(|| JsValue::from_str("No document available"))?;

        let engine = LocalEdit::new(WebDom::new(document), LocalStorage, WindowPrompter, config);
        Ok(Self {
            shared: Rc::new(Shared {
                engine: RefCell::new(engine),
                backlog: RefCell::new(VecDeque::new()),
            }),
        })
    }

    /// Load saved overrides, apply them and begin observing
    pub fn start(&self) -> Result<(), JsValue> {
        let dom = {
            let engine = self.shared.engine.try_borrow().map_err(|_| busy())?;
            if engine.is_running() {
                return Ok(());
            }
            engine.dom().clone()
        };

        let weak = Rc::downgrade(&self.shared);
        let menu_target = weak.clone();
        dom.set_menu_dispatch(Rc::new(move |action, menu| {
            if let Some(shared) = menu_target.upgrade() {
                shared.deliver(Pending::Menu(action, menu));
            }
        }));

        let root = dom
            .root()
            .ok_or_else(|| JsValue::from_str("Document has no body"))?;
        let content = observer::observe(
            &root,
            Stream::Content,
            batch_sink(weak.clone(), Stream::Content),
        )?;
        let menu = observer::observe(&root, Stream::Menu, batch_sink(weak, Stream::Menu))?;
        let subscriptions: Vec<Box<dyn Subscription>> = vec![Box::new(content), Box::new(menu)];

        self.shared
            .engine
            .try_borrow_mut()
            .map_err(|_| busy())?
            .start(subscriptions);
        Ok(())
    }

    /// Stop observing and put the host's own text back
    pub fn stop(&self) -> Result<(), JsValue> {
        self.shared.engine.try_borrow_mut().map_err(|_| busy())?.stop();
        self.shared.backlog.borrow_mut().clear();
        Ok(())
    }

    #[wasm_bindgen(js_name = isRunning)]
    pub fn is_running(&self) -> bool {
        self.shared
            .engine
            .try_borrow()
            .map(|engine| engine.is_running())
            .unwrap_or(true)
    }

    #[wasm_bindgen(js_name = overrideCount)]
    pub fn override_count(&self) -> usize {
        self.shared
            .engine
            .try_borrow()
            .map(|engine| engine.store().len())
            .unwrap_or(0)
    }

    /// Re-apply every override to what is currently rendered
    #[wasm_bindgen(js_name = applyAll)]
    pub fn apply_all(&self) -> Result<usize, JsValue> {
        Ok(self.shared.engine.try_borrow_mut().map_err(|_| busy())?.apply_all())
    }

    /// Forget every override, in memory and in storage
    pub fn reset(&self) -> Result<(), JsValue> {
        self.shared
            .engine
            .try_borrow_mut()
            .map_err(|_| busy())?
            .reset()
            .map_err(|e| JsValue::from_str(&e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_version() {
        let version = get_version();
        assert!(!version.is_empty());
    }

    #[test]
    fn test_parse_config_defaults() {
        assert_eq!(parse_config(None).unwrap(), EngineConfig::default());
        assert_eq!(parse_config(Some("  ")).unwrap(), EngineConfig::default());
    }

    #[test]
    fn test_parse_config_overrides_fields() {
        let config = parse_config(Some(r#"{"modify_label":"Edit locally"}"#)).unwrap();
        assert_eq!(config.modify_label, "Edit locally");
        assert_eq!(config.container_search_depth, 10);
    }

    #[test]
    fn test_parse_config_rejects_garbage() {
        assert!(parse_config(Some("{not json")).is_err());
    }
}
