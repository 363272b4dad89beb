//! Host message-store integration
//!
//! Some plugin hosts expose their message store directly. There the edit
//! is made on the message object itself and the host is asked to redraw it,
//! instead of rewriting DOM text. The original content is remembered the
//! first time a message is edited so it can be put back on unload.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostAuthor {
    pub id: String,
}

/// The parts of a host message the edit touches, in the host's field naming
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostMessage {
    pub id: String,
    pub channel_id: String,
    #[serde(default)]
    pub author: Option<HostAuthor>,
    pub content: String,
}

impl HostMessage {
    pub fn author_id(&self) -> Option<&str> {
        self.author.as_ref().map(|a| a.id.as_str())
    }
}

/// The host's message store
pub trait HostMessenger {
    fn current_user_id(&self) -> Option<String>;

    fn get_message(&self, id: &str) -> Option<HostMessage>;

    /// Hand the host a message to redraw in `channel_id`
    fn receive_message(&self, channel_id: &str, message: &HostMessage);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostEditOutcome {
    Edited,
    /// Own messages are edited through the host's real edit flow
    OwnMessage,
}

pub struct HostEditSession<M> {
    messenger: M,
    originals: BTreeMap<String, String>,
}

impl<M: HostMessenger> HostEditSession<M> {
    pub fn new(messenger: M) -> Self {
        Self {
            messenger,
            originals: BTreeMap::new(),
        }
    }

    /// Replace a message's content locally and redraw it
    pub fn edit_locally(&mut self, message: &HostMessage, text: &str) -> HostEditOutcome {
        let own = self.messenger.current_user_id();
        if own.is_some() && message.author_id() == own.as_deref() {
            return HostEditOutcome::OwnMessage;
        }

        self.originals
            .entry(message.id.clone())
            .or_insert_with(|| message.content.clone());

        let edited = HostMessage {
            content: text.to_string(),
            ..message.clone()
        };
        self.messenger.receive_message(&edited.channel_id, &edited);
        debug!(message_id = %message.id, "Edited host message locally");
        HostEditOutcome::Edited
    }

    pub fn original_content(&self, id: &str) -> Option<&str> {
        self.originals.get(id).map(String::as_str)
    }

    pub fn edited_count(&self) -> usize {
        self.originals.len()
    }

    /// Put back the original content of every edited message the host still knows
    ///
    /// Returns how many messages were redrawn.
    pub fn restore_all(&mut self) -> usize {
        let originals = std::mem::take(&mut self.originals);
        let mut restored = 0;
        for (id, content) in originals {
            let Some(message) = self.messenger.get_message(&id) else {
                continue;
            };
            let original = HostMessage { content, ..message };
            self.messenger
                .receive_message(&original.channel_id, &original);
            restored += 1;
        }
        info!(restored, "Restored locally edited host messages");
        restored
    }

    pub fn messenger(&self) -> &M {
        &self.messenger
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;

    #[derive(Default)]
    struct FakeMessenger {
        me: Option<String>,
        messages: RefCell<BTreeMap<String, HostMessage>>,
        redraws: RefCell<Vec<(String, HostMessage)>>,
    }

    impl FakeMessenger {
        fn with(me: &str, messages: &[HostMessage]) -> Self {
            Self {
                me: Some(me.to_string()),
                messages: RefCell::new(
                    messages
                        .iter()
                        .map(|m| (m.id.clone(), m.clone()))
                        .collect(),
                ),
                redraws: RefCell::new(Vec::new()),
            }
        }
    }

    impl HostMessenger for FakeMessenger {
        fn current_user_id(&self) -> Option<String> {
            self.me.clone()
        }

        fn get_message(&self, id: &str) -> Option<HostMessage> {
            self.messages.borrow().get(id).cloned()
        }

        fn receive_message(&self, channel_id: &str, message: &HostMessage) {
            self.messages
                .borrow_mut()
                .insert(message.id.clone(), message.clone());
            self.redraws
                .borrow_mut()
                .push((channel_id.to_string(), message.clone()));
        }
    }

    fn message(id: &str, author: &str, content: &str) -> HostMessage {
        HostMessage {
            id: id.to_string(),
            channel_id: "c1".to_string(),
            author: Some(HostAuthor {
                id: author.to_string(),
            }),
            content: content.to_string(),
        }
    }

    #[test]
    fn test_edit_then_restore() {
        let original = message("m1", "them", "hello");
        let mut session = HostEditSession::new(FakeMessenger::with("me", &[original.clone()]));

        assert_eq!(session.edit_locally(&original, "first"), HostEditOutcome::Edited);
        let edited = session.messenger().get_message("m1").unwrap();
        assert_eq!(session.edit_locally(&edited, "second"), HostEditOutcome::Edited);

        assert_eq!(session.original_content("m1"), Some("hello"));
        assert_eq!(
            session.messenger().get_message("m1").unwrap().content,
            "second"
        );

        assert_eq!(session.restore_all(), 1);
        assert_eq!(session.messenger().get_message("m1").unwrap(), original);
        assert_eq!(session.edited_count(), 0);

        let redraws = session.messenger().redraws.borrow();
        assert_eq!(redraws.len(), 3);
        assert_eq!(redraws[0].0, "c1");
    }

    #[test]
    fn test_own_messages_are_refused() {
        let mine = message("m2", "me", "my text");
        let mut session = HostEditSession::new(FakeMessenger::with("me", &[mine.clone()]));

        assert_eq!(session.edit_locally(&mine, "x"), HostEditOutcome::OwnMessage);
        assert!(session.messenger().redraws.borrow().is_empty());
        assert_eq!(session.edited_count(), 0);
    }

    #[test]
    fn test_restore_skips_messages_the_host_forgot() {
        let original = message("m3", "them", "gone soon");
        let mut session = HostEditSession::new(FakeMessenger::with("me", &[original.clone()]));
        session.edit_locally(&original, "edited");
        session.messenger().messages.borrow_mut().clear();

        assert_eq!(session.restore_all(), 0);
        assert_eq!(session.edited_count(), 0);
    }

    #[test]
    fn test_host_message_json_shape() {
        let json = r#"{"id":"1","channel_id":"9","content":"hi","flags":0}"#;
        let parsed: HostMessage = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.channel_id, "9");
        assert_eq!(parsed.author_id(), None);

        let json =
            r#"{"id":"2","channel_id":"9","content":"yo","author":{"id":"5","username":"x"}}"#;
        let parsed: HostMessage = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.author_id(), Some("5"));
    }
}
