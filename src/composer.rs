use agent_stream::ContentBlock;

/// Local input buffer: draft text plus attachments waiting to be sent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Composer {
    text: String,
    attachments: Vec<ContentBlock>,
}

impl Composer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn attachments(&self) -> &[ContentBlock] {
        &self.attachments
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    pub fn push_attachment(&mut self, attachment: ContentBlock) {
        self.attachments.push(attachment);
    }

    /// Removes the attachment at `index`, returning it when present.
    pub fn remove_attachment(&mut self, index: usize) -> Option<ContentBlock> {
        if index < self.attachments.len() {
            Some(self.attachments.remove(index))
        } else {
            None
        }
    }

    pub fn clear(&mut self) {
        self.text.clear();
        self.attachments.clear();
    }

    /// True when there is neither non-whitespace text nor an attachment.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty() && self.attachments.is_empty()
    }
}
