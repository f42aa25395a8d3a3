use crate::providers::traits::ChatMessage;
use parking_lot::Mutex;
use std::collections::HashMap;

/// Conversation state carried through one retrieval loop and across turns
/// of the same thread.
#[derive(Debug, Clone, Default)]
pub struct AgentState {
    /// Full transcript: user turns, assistant turns and system notices.
    pub messages: Vec<ChatMessage>,
    /// Failed retrievals in the current turn. Reset when a new question
    /// arrives.
    pub loop_count: u32,
}

/// In-memory per-thread conversation store. The thread id is the caller's
/// identity; as long as it stays the same, the history does too.
#[derive(Default)]
pub struct SessionStore {
    sessions: Mutex<HashMap<String, AgentState>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(&self, thread_id: &str) -> AgentState {
        self.sessions
            .lock()
            .get(thread_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn save(&self, thread_id: &str, state: AgentState) {
        self.sessions.lock().insert(thread_id.to_string(), state);
    }

    pub fn clear(&self, thread_id: &str) {
        self.sessions.lock().remove(thread_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_thread_starts_empty() {
        let store = SessionStore::new();
        let state = store.load("nobody");
        assert!(state.messages.is_empty());
        assert_eq!(state.loop_count, 0);
    }

    #[test]
    fn threads_are_isolated() {
        let store = SessionStore::new();

        let mut state = store.load("alpha");
        state.messages.push(ChatMessage::user("hello"));
        store.save("alpha", state);

        assert_eq!(store.load("alpha").messages.len(), 1);
        assert!(store.load("beta").messages.is_empty());

        store.clear("alpha");
        assert!(store.load("alpha").messages.is_empty());
    }
}
