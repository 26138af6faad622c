use crate::comment::mutation::MutationError;

pub const EMPTY_BODY: &str = "Comment cannot be empty.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    /// Nothing was changed; the field is back in display mode.
    Reverted,
    /// The draft differs from the original and discarding must be confirmed.
    NeedsConfirmation,
}

/// An in-progress inline edit of a comment body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditSession {
    original: String,
    draft: String,
    error: Option<String>,
    saving: bool,
    discard_prompt: bool,
}

impl EditSession {
    pub fn begin(original: &str) -> Self {
        Self {
            original: original.to_string(),
            draft: original.to_string(),
            error: None,
            saving: false,
            discard_prompt: false,
        }
    }

    pub fn original(&self) -> &str {
        &self.original
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_saving(&self) -> bool {
        self.saving
    }

    pub fn discard_prompt(&self) -> bool {
        self.discard_prompt
    }

    pub fn is_dirty(&self) -> bool {
        self.draft != self.original
    }

    pub fn set_draft(&mut self, value: impl Into<String>) {
        self.draft = value.into();
        self.discard_prompt = false;
    }

    pub fn cancel(&mut self) -> CancelOutcome {
        if self.is_dirty() {
            self.discard_prompt = true;
            CancelOutcome::NeedsConfirmation
        } else {
            CancelOutcome::Reverted
        }
    }

    pub fn keep_editing(&mut self) {
        self.discard_prompt = false;
    }

    /// Stores `value` as the draft and marks the session as saving. Returns
    /// the content to send, or the validation failure that was recorded
    /// instead.
    pub fn start_commit(&mut self, value: String) -> Result<String, MutationError> {
        self.draft = value;
        self.discard_prompt = false;
        if self.draft.trim().is_empty() {
            let err = MutationError::Validation(EMPTY_BODY.to_string());
            self.error = Some(err.to_string());
            return Err(err);
        }
        self.saving = true;
        self.error = None;
        Ok(self.draft.clone())
    }

    /// The backend rejected the commit. The draft is kept for a retry.
    pub fn fail(&mut self, err: &MutationError) {
        self.saving = false;
        self.error = Some(err.to_string());
    }
}
