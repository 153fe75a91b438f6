//! Recording fakes shared by the unit tests.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Mutex,
};

use async_trait::async_trait;

use crate::{
    domain::{ChatId, MessageId, MessageRef},
    errors::Error,
    messaging::{port::MessagingPort, types::InlineKeyboard},
    Result,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Sent {
    Message {
        msg: MessageRef,
        html: String,
        keyboard: Option<InlineKeyboard>,
    },
    Edit {
        msg: MessageRef,
        html: String,
        keyboard: Option<InlineKeyboard>,
    },
    Delete(MessageRef),
    Photo {
        msg: MessageRef,
        file_id: String,
        caption: String,
    },
    Document {
        msg: MessageRef,
        file_name: String,
        bytes: Vec<u8>,
    },
    CallbackAnswer {
        callback_id: String,
        text: Option<String>,
    },
}

#[derive(Default)]
pub struct FakeMessenger {
    next_id: Mutex<i32>,
    transcript: Mutex<Vec<Sent>>,
    fail_deletes: AtomicBool,
    fail_sends: AtomicBool,
}

impl FakeMessenger {
    pub fn failing_deletes() -> Self {
        let fake = Self::default();
        fake.fail_deletes.store(true, Ordering::SeqCst);
        fake
    }

    /// From now on, sending or editing a message fails with a transport error.
    pub fn fail_sends(&self) {
        self.fail_sends.store(true, Ordering::SeqCst);
    }

    fn check_send(&self) -> Result<()> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(Error::Transport("too many requests".to_string()));
        }
        Ok(())
    }

    fn alloc(&self, chat_id: ChatId) -> MessageRef {
        let mut guard = self.next_id.lock().unwrap();
        if *guard < 1000 {
            *guard = 1000;
        }
        let id = *guard;
        *guard += 1;
        MessageRef::new(chat_id, MessageId(id))
    }

    fn record(&self, sent: Sent) {
        self.transcript.lock().unwrap().push(sent);
    }

    pub fn transcript(&self) -> Vec<Sent> {
        self.transcript.lock().unwrap().clone()
    }

    /// Everything except callback acknowledgements.
    pub fn chat_transcript(&self) -> Vec<Sent> {
        self.transcript()
            .into_iter()
            .filter(|s| !matches!(s, Sent::CallbackAnswer { .. }))
            .collect()
    }

    pub fn deleted(&self) -> Vec<MessageRef> {
        self.transcript()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Delete(m) => Some(m),
                _ => None,
            })
            .collect()
    }

    pub fn callback_answers(&self) -> Vec<Option<String>> {
        self.transcript()
            .into_iter()
            .filter_map(|s| match s {
                Sent::CallbackAnswer { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }

    /// Last message sent or edited, with its keyboard.
    pub fn last_menu(&self) -> Option<(String, Option<InlineKeyboard>)> {
        self.transcript().into_iter().rev().find_map(|s| match s {
            Sent::Message { html, keyboard, .. } | Sent::Edit { html, keyboard, .. } => {
                Some((html, keyboard))
            }
            _ => None,
        })
    }
}

#[async_trait]
impl MessagingPort for FakeMessenger {
    async fn send_message(
        &self,
        chat_id: ChatId,
        html: &str,
        keyboard: Option<&InlineKeyboard>,
    ) -> Result<MessageRef> {
        self.check_send()?;
        let msg = self.alloc(chat_id);
        self.record(Sent::Message {
            msg,
            html: html.to_string(),
            keyboard: keyboard.cloned(),
        });
        Ok(msg)
    }

    async fn edit_message(
        &self,
        msg: MessageRef,
        html: &str,
        keyboard: Option<&InlineKeyboard>,
    ) -> Result<()> {
        self.check_send()?;
        self.record(Sent::Edit {
            msg,
            html: html.to_string(),
            keyboard: keyboard.cloned(),
        });
        Ok(())
    }

    async fn delete_message(&self, msg: MessageRef) -> Result<()> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(Error::Transport("message can't be deleted".to_string()));
        }
        self.record(Sent::Delete(msg));
        Ok(())
    }

    async fn send_photo(
        &self,
        chat_id: ChatId,
        file_id: &str,
        caption_html: &str,
        _keyboard: Option<&InlineKeyboard>,
    ) -> Result<MessageRef> {
        let msg = self.alloc(chat_id);
        self.record(Sent::Photo {
            msg,
            file_id: file_id.to_string(),
            caption: caption_html.to_string(),
        });
        Ok(msg)
    }

    async fn send_document(
        &self,
        chat_id: ChatId,
        file_name: &str,
        bytes: Vec<u8>,
        _caption: &str,
    ) -> Result<MessageRef> {
        let msg = self.alloc(chat_id);
        self.record(Sent::Document {
            msg,
            file_name: file_name.to_string(),
            bytes,
        });
        Ok(msg)
    }

    async fn answer_callback_query(&self, callback_id: &str, text: Option<&str>) -> Result<()> {
        self.record(Sent::CallbackAnswer {
            callback_id: callback_id.to_string(),
            text: text.map(str::to_string),
        });
        Ok(())
    }
}
