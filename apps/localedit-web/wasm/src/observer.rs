//! `MutationObserver` wiring for the two observation streams

use js_sys::Array;
use localedit_core::{Mutation, MutationBatch, Stream, Subscription};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{MutationObserver, MutationObserverInit, MutationRecord, Node};

type ObserverCallback = Closure<dyn FnMut(Array, MutationObserver)>;

/// A connected observer; dropping the subscription drops its callback
pub struct ObserverSubscription {
    observer: MutationObserver,
    _callback: ObserverCallback,
}

impl Subscription for ObserverSubscription {
    fn disconnect(&mut self) {
        self.observer.disconnect();
    }
}

/// Observe `root` for `stream`, handing every batch to `on_batch`
pub fn observe<F>(
    root: &Node,
    stream: Stream,
    mut on_batch: F,
) -> Result<ObserverSubscription, JsValue>
where
    F: FnMut(MutationBatch<Node>) + 'static,
{
    let callback: ObserverCallback =
        Closure::new(move |records: Array, _observer: MutationObserver| {
            let batch = to_batch(stream, &records);
            if !batch.is_empty() {
                on_batch(batch);
            }
        });

    let observer = MutationObserver::new(callback.as_ref().unchecked_ref())?;
    observer.observe_with_options(root, &options(stream))?;

    Ok(ObserverSubscription {
        observer,
        _callback: callback,
    })
}

fn options(stream: Stream) -> MutationObserverInit {
    let init = MutationObserverInit::new();
    init.set_child_list(true);
    init.set_subtree(true);
    if stream == Stream::Content {
        init.set_character_data(true);
    }
    init
}

/// Flatten observer records into mutations, keeping their order
fn to_batch(stream: Stream, records: &Array) -> MutationBatch<Node> {
    let mut mutations = Vec::new();
    for value in records.iter() {
        let Ok(record) = value.dyn_into::<MutationRecord>() else {
            continue;
        };
        match record.type_().as_str() {
            "childList" => {
                let added = record.added_nodes();
                for i in 0..added.length() {
                    if let Some(node) = added.get(i) {
                        mutations.push(Mutation::ChildAdded(node));
                    }
                }
            }
            "characterData" if stream == Stream::Content => {
                if let Some(target) = record.target() {
                    mutations.push(Mutation::CharacterData(target));
                }
            }
            _ => {}
        }
    }
    MutationBatch::new(mutations)
}
