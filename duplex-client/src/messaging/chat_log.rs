use duplex_core::ChatMessage;

/// Ordered, append-only record of the conversation. Entries are never
/// deduplicated or rewritten; only [`ChatLog::clear`] removes them.
#[derive(Debug, Clone, Default)]
pub struct ChatLog {
    messages: Vec<ChatMessage>,
}

impl ChatLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }
}
