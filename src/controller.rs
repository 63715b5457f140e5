use crate::bedrock::{GenerationService, StreamEvent};
use crate::conversation::{self, Message};
use anyhow::{Result, bail};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

/// Immutable view of the conversation. A fresh reference is published on
/// every change, so observers can detect updates by reference identity.
pub type ConversationSnapshot = Arc<Vec<Message>>;

struct ChatState {
    messages: Vec<Message>,
    input_disabled: bool,
}

/// Mediates between user input and the generation service: owns the
/// conversation, runs one request cycle at a time, and republishes a
/// snapshot after every change.
///
/// The input gate is a boolean checked and set under one lock
/// acquisition; a submit while a cycle is in flight is dropped, not
/// queued. There is no way to cancel a cycle once it starts.
pub struct ChatController {
    service: Arc<dyn GenerationService>,
    state: Mutex<ChatState>,
    publisher: watch::Sender<ConversationSnapshot>,
    model_id: Mutex<String>,
    streaming: AtomicBool,
}

impl ChatController {
    pub fn new(
        service: Arc<dyn GenerationService>,
        model_id: impl Into<String>,
        streaming: bool,
    ) -> Self {
        let (publisher, _) = watch::channel(Arc::new(Vec::new()));
        Self {
            service,
            state: Mutex::new(ChatState {
                messages: Vec::new(),
                input_disabled: false,
            }),
            publisher,
            model_id: Mutex::new(model_id.into()),
            streaming: AtomicBool::new(streaming),
        }
    }

    /// Subscribe to conversation snapshots.
    pub fn subscribe(&self) -> watch::Receiver<ConversationSnapshot> {
        self.publisher.subscribe()
    }

    /// The most recently published snapshot.
    pub fn snapshot(&self) -> ConversationSnapshot {
        self.publisher.borrow().clone()
    }

    pub fn input_disabled(&self) -> bool {
        self.state.lock().unwrap().input_disabled
    }

    pub fn streaming(&self) -> bool {
        self.streaming.load(Ordering::Relaxed)
    }

    /// Flip between streaming and blocking delivery; returns the new mode.
    pub fn toggle_streaming(&self) -> bool {
        !self.streaming.fetch_xor(true, Ordering::Relaxed)
    }

    pub fn model_id(&self) -> String {
        self.model_id.lock().unwrap().clone()
    }

    pub fn set_model_id(&self, model_id: impl Into<String>) {
        *self.model_id.lock().unwrap() = model_id.into();
    }

    /// Submit a prompt: append the user turn and an empty assistant slot,
    /// close the gate, and run one request cycle to completion or
    /// failure. Empty prompts and submits while the gate is closed are
    /// ignored. On failure the partial response stays and one notice is
    /// appended; the gate reopens either way.
    pub async fn submit(&self, prompt: &str) {
        if prompt.is_empty() {
            return;
        }

        let payload = {
            let mut state = self.state.lock().unwrap();
            if state.input_disabled {
                return;
            }
            state.input_disabled = true;
            state.messages.push(Message::user(prompt));
            state.messages.push(Message::assistant_placeholder());
            self.publish(&state);
            conversation::request_messages(&state.messages)
        };

        let result = self.request_cycle(payload).await;

        let mut state = self.state.lock().unwrap();
        if let Some(Message::Turn(turn)) = state.messages.last_mut() {
            turn.pending = false;
        }
        if let Err(err) = result {
            state.messages.push(Message::notice(err.to_string()));
        }
        state.input_disabled = false;
        self.publish(&state);
    }

    /// Replace the conversation with an empty one and reopen the gate.
    pub fn reset(&self) {
        let mut state = self.state.lock().unwrap();
        state.messages.clear();
        state.input_disabled = false;
        self.publish(&state);
    }

    /// Replace the conversation with the fixed example transcript. The
    /// transcript is display-only, so the gate stays closed until
    /// `reset` starts a fresh conversation.
    pub fn load_example(&self) {
        let mut state = self.state.lock().unwrap();
        state.messages = conversation::example_transcript();
        state.input_disabled = true;
        self.publish(&state);
    }

    async fn request_cycle(&self, payload: Vec<conversation::ApiMessage>) -> Result<()> {
        let model_id = self.model_id();

        if self.streaming() {
            let mut events = self.service.converse_stream(&model_id, payload).await?;
            while let Some(event) = events.recv().await {
                match event {
                    StreamEvent::Delta(delta) => {
                        if !delta.is_empty() {
                            self.append_to_last_turn(&delta);
                        }
                    }
                    StreamEvent::Complete => break,
                    StreamEvent::Error(message) => bail!(message),
                }
            }
            Ok(())
        } else {
            let text = self.service.converse(&model_id, payload).await?;
            self.append_to_last_turn(&text);
            Ok(())
        }
    }

    fn append_to_last_turn(&self, text: &str) {
        let mut state = self.state.lock().unwrap();
        if let Some(Message::Turn(turn)) = state.messages.last_mut() {
            turn.text.push_str(text);
        }
        self.publish(&state);
    }

    fn publish(&self, state: &ChatState) {
        self.publisher.send_replace(Arc::new(state.messages.clone()));
    }
}
