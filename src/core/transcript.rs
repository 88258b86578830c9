//! Live transcript state.
//!
//! The assistant side keeps finalized history (`committed`) apart from the utterance currently
//! being synthesized (`streaming_line`); the two are only merged when a frame is rendered, so a
//! delta can never rewrite an earlier line. Renders requested while a frame is already pending
//! are absorbed into that frame.
//!
//! The user side is an append-only list of finalized utterances.
//!
//! # Example
//!
//! ```rust,ignore
//! let mut buffer = TranscriptBuffer::new("Assistant: ", "You: ");
//! buffer.start_streaming();
//! buffer.update_streaming("Sure, ");
//! buffer.update_streaming("Sure, let me help.");
//! let frame = buffer.take_frame(); // Some("Assistant: Sure, let me help.\n")
//! let outcome = buffer.finalize("Sure, let me help.");
//! assert!(outcome.persisted_line().is_some());
//! ```

use tracing::debug;

/// Why a finalize call did not commit a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Input was empty or whitespace-only
    Empty,
    /// Nothing remained after removing the speaker prefix
    EmptyAfterPrefix,
}

/// Result of [`TranscriptBuffer::finalize`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinalizeOutcome {
    Skipped(SkipReason),
    /// Candidate line equals the last committed line
    Duplicate { line: String },
    /// Line appended to history; `display` is the full text to show
    Committed { line: String, display: String },
}

impl FinalizeOutcome {
    /// The line to hand to persistence, if any.
    pub fn persisted_line(&self) -> Option<&str> {
        match self {
            FinalizeOutcome::Committed { line, .. } => Some(line),
            _ => None,
        }
    }
}

/// Committed and in-flight transcript text for one client.
#[derive(Debug, Clone)]
pub struct TranscriptBuffer {
    assistant_prefix: String,
    user_prefix: String,
    /// Assistant area still shows its initial placeholder
    placeholder: bool,
    /// Text currently shown in the assistant area
    displayed: String,
    committed: String,
    streaming_line: String,
    streaming: bool,
    frame_pending: bool,
    user_lines: Vec<String>,
}

impl TranscriptBuffer {
    pub fn new(assistant_prefix: impl Into<String>, user_prefix: impl Into<String>) -> Self {
        Self {
            assistant_prefix: assistant_prefix.into(),
            user_prefix: user_prefix.into(),
            placeholder: true,
            displayed: String::new(),
            committed: String::new(),
            streaming_line: String::new(),
            streaming: false,
            frame_pending: false,
            user_lines: Vec::new(),
        }
    }

    // -------------------------------------------------------------------------
    // Assistant streaming
    // -------------------------------------------------------------------------

    /// Begin a new streaming segment.
    ///
    /// Returns `true` when the caller must schedule a frame.
    pub fn start_streaming(&mut self) -> bool {
        if self.placeholder {
            self.placeholder = false;
            self.displayed.clear();
            self.committed.clear();
        } else {
            self.committed = self.displayed.trim_end_matches('\n').to_string();
        }
        self.streaming_line.clear();
        self.streaming = true;
        self.request_frame()
    }

    /// Replace the streaming line with the utterance so far.
    ///
    /// Returns `true` when the caller must schedule a frame.
    pub fn update_streaming(&mut self, text: &str) -> bool {
        self.streaming_line.clear();
        self.streaming_line.push_str(text);
        self.request_frame()
    }

    /// Commit the final text of the current utterance.
    pub fn finalize(&mut self, text: &str) -> FinalizeOutcome {
        let outcome = self.commit(text);
        self.clear_streaming();
        outcome
    }

    fn commit(&mut self, text: &str) -> FinalizeOutcome {
        if text.trim().is_empty() {
            debug!("Skipping finalize: empty text");
            return FinalizeOutcome::Skipped(SkipReason::Empty);
        }

        let normalized = match text.strip_prefix(self.assistant_prefix.as_str()) {
            Some(rest) if !self.assistant_prefix.is_empty() => rest.trim(),
            _ => text.trim(),
        };
        if normalized.is_empty() {
            debug!("Skipping finalize: nothing left after prefix");
            return FinalizeOutcome::Skipped(SkipReason::EmptyAfterPrefix);
        }

        let line = format!("{}{}", self.assistant_prefix, normalized);
        let last_line = self.committed.rsplit('\n').next().unwrap_or_default().trim();
        if last_line == line.trim() {
            debug!("Skipping duplicate finalize");
            return FinalizeOutcome::Duplicate { line };
        }

        if !self.committed.is_empty() {
            self.committed.push('\n');
        }
        self.committed.push_str(&line);
        self.placeholder = false;
        self.displayed = format!("{}\n", self.committed.trim());

        FinalizeOutcome::Committed {
            line,
            display: self.displayed.clone(),
        }
    }

    /// Drop the streaming line and leave streaming mode.
    pub fn clear_streaming(&mut self) {
        self.streaming_line.clear();
        self.streaming = false;
    }

    /// Append a complete line (canned reply, formatted summary) to the assistant area.
    ///
    /// Returns the full text to show.
    pub fn append_assistant_line(&mut self, text: &str) -> String {
        let base = if self.placeholder {
            ""
        } else {
            self.displayed.trim_end_matches('\n')
        };
        let mut committed = base.to_string();
        if !committed.is_empty() {
            committed.push('\n');
        }
        committed.push_str(text);

        self.placeholder = false;
        self.committed = committed;
        self.displayed = format!("{}\n", self.committed);
        self.displayed.clone()
    }

    // -------------------------------------------------------------------------
    // Rendering
    // -------------------------------------------------------------------------

    /// Merge committed history and the streaming line.
    pub fn render(&self) -> String {
        let render = if !self.committed.is_empty() {
            if self.streaming_line.is_empty() {
                self.committed.clone()
            } else {
                format!(
                    "{}\n{}{}",
                    self.committed, self.assistant_prefix, self.streaming_line
                )
            }
        } else if !self.streaming_line.is_empty() {
            format!("{}{}", self.assistant_prefix, self.streaming_line)
        } else {
            String::new()
        };

        if render.is_empty() {
            render
        } else {
            render + "\n"
        }
    }

    fn request_frame(&mut self) -> bool {
        if self.frame_pending {
            false
        } else {
            self.frame_pending = true;
            true
        }
    }

    /// Produce the pending frame, if one was requested.
    pub fn take_frame(&mut self) -> Option<String> {
        if !self.frame_pending {
            return None;
        }
        self.frame_pending = false;
        self.displayed = self.render();
        Some(self.displayed.clone())
    }

    // -------------------------------------------------------------------------
    // User lines
    // -------------------------------------------------------------------------

    /// Record a finalized user utterance and return its display line.
    pub fn push_user_line(&mut self, transcript: &str) -> String {
        let line = format!("{}{}", self.user_prefix, transcript);
        self.user_lines.push(line.clone());
        line
    }

    // -------------------------------------------------------------------------
    // Session boundaries
    // -------------------------------------------------------------------------

    /// Forget everything and return to the placeholder state.
    pub fn reset(&mut self) {
        self.placeholder = true;
        self.displayed.clear();
        self.committed.clear();
        self.user_lines.clear();
        self.frame_pending = false;
        self.clear_streaming();
    }

    /// Keep what is shown as the baseline for the next session.
    pub fn preserve(&mut self) {
        self.committed = self.displayed.trim_end_matches('\n').to_string();
        self.frame_pending = false;
        self.clear_streaming();
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    #[inline]
    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    #[inline]
    pub fn committed(&self) -> &str {
        &self.committed
    }

    #[inline]
    pub fn streaming_line(&self) -> &str {
        &self.streaming_line
    }

    #[inline]
    pub fn displayed(&self) -> &str {
        &self.displayed
    }

    #[inline]
    pub fn user_lines(&self) -> &[String] {
        &self.user_lines
    }

    #[inline]
    pub fn assistant_prefix(&self) -> &str {
        &self.assistant_prefix
    }

    /// Committed history as individual lines.
    pub fn committed_lines(&self) -> Vec<&str> {
        if self.committed.is_empty() {
            Vec::new()
        } else {
            self.committed.split('\n').collect()
        }
    }
}

impl Default for TranscriptBuffer {
    fn default() -> Self {
        Self::new("Assistant: ", "You: ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer() -> TranscriptBuffer {
        TranscriptBuffer::new("Assistant: ", "You: ")
    }

    #[test]
    fn test_duplicate_finalize_commits_once() {
        let mut buffer = buffer();
        buffer.start_streaming();

        let first = buffer.finalize("Hello");
        let second = buffer.finalize("Hello");

        assert_eq!(first.persisted_line(), Some("Assistant: Hello"));
        assert!(matches!(second, FinalizeOutcome::Duplicate { .. }));
        assert_eq!(buffer.committed_lines(), vec!["Assistant: Hello"]);
    }

    #[test]
    fn test_prefix_stripping_is_symmetric() {
        let mut with_prefix = buffer();
        let mut without_prefix = buffer();

        with_prefix.finalize("Assistant: X");
        without_prefix.finalize("X");

        assert_eq!(with_prefix.committed(), without_prefix.committed());
        assert_eq!(with_prefix.committed(), "Assistant: X");
    }

    #[test]
    fn test_prefixed_duplicate_is_suppressed() {
        let mut buffer = buffer();
        buffer.finalize("X");
        let outcome = buffer.finalize("Assistant: X");
        assert!(matches!(outcome, FinalizeOutcome::Duplicate { .. }));
        assert_eq!(buffer.committed_lines().len(), 1);
    }

    #[test]
    fn test_streaming_does_not_touch_history() {
        let mut buffer = buffer();
        buffer.start_streaming();
        buffer.update_streaming("a");
        let frame = buffer.take_frame().unwrap();
        assert_eq!(frame, "Assistant: a\n");
        assert_eq!(buffer.committed(), "");

        buffer.update_streaming("ab");
        buffer.take_frame();
        assert_eq!(buffer.committed(), "");

        buffer.finalize("ab");
        assert_eq!(buffer.committed_lines(), vec!["Assistant: ab"]);
        assert!(!buffer.is_streaming());
        assert_eq!(buffer.streaming_line(), "");
    }

    #[test]
    fn test_frame_requests_coalesce() {
        let mut buffer = buffer();
        assert!(buffer.start_streaming());
        assert!(!buffer.update_streaming("S"));
        assert!(!buffer.update_streaming("Su"));

        assert_eq!(buffer.take_frame().as_deref(), Some("Assistant: Su\n"));
        assert_eq!(buffer.take_frame(), None);

        assert!(buffer.update_streaming("Sur"));
    }

    #[test]
    fn test_render_with_history() {
        let mut buffer = buffer();
        buffer.finalize("First.");
        buffer.start_streaming();
        buffer.update_streaming("Second");

        assert_eq!(buffer.render(), "Assistant: First.\nAssistant: Second\n");

        buffer.update_streaming("");
        assert_eq!(buffer.render(), "Assistant: First.\n");
    }

    #[test]
    fn test_render_empty() {
        let buffer = buffer();
        assert_eq!(buffer.render(), "");
    }

    #[test]
    fn test_finalize_empty_clears_streaming() {
        let mut buffer = buffer();
        buffer.start_streaming();
        buffer.update_streaming("partial");

        let outcome = buffer.finalize("   ");
        assert_eq!(outcome, FinalizeOutcome::Skipped(SkipReason::Empty));
        assert!(!buffer.is_streaming());
        assert_eq!(buffer.streaming_line(), "");
        assert_eq!(buffer.committed(), "");
    }

    #[test]
    fn test_finalize_prefix_only_is_skipped() {
        let mut buffer = buffer();
        buffer.start_streaming();
        let outcome = buffer.finalize("Assistant:   ");
        assert_eq!(outcome, FinalizeOutcome::Skipped(SkipReason::EmptyAfterPrefix));
        assert!(!buffer.is_streaming());
    }

    #[test]
    fn test_start_streaming_captures_display_as_baseline() {
        let mut buffer = buffer();
        buffer.start_streaming();
        buffer.update_streaming("unfinished");
        buffer.take_frame();

        // A new response begins without a done event for the previous one.
        buffer.start_streaming();
        assert_eq!(buffer.committed(), "Assistant: unfinished");
        assert_eq!(buffer.streaming_line(), "");
    }

    #[test]
    fn test_append_assistant_line_joins_history() {
        let mut buffer = buffer();
        buffer.finalize("Hi there.");
        let display = buffer.append_assistant_line("Assistant: Let's talk first.");

        assert_eq!(display, "Assistant: Hi there.\nAssistant: Let's talk first.\n");
        buffer.start_streaming();
        assert_eq!(
            buffer.committed_lines(),
            vec!["Assistant: Hi there.", "Assistant: Let's talk first."]
        );
    }

    #[test]
    fn test_user_lines_are_prefixed() {
        let mut buffer = buffer();
        let line = buffer.push_user_line("I want an SUV");
        assert_eq!(line, "You: I want an SUV");
        assert_eq!(buffer.user_lines(), &["You: I want an SUV".to_string()]);
    }

    #[test]
    fn test_reset_and_preserve() {
        let mut buffer = buffer();
        buffer.finalize("Kept.");
        buffer.push_user_line("hello");

        let mut preserved = buffer.clone();
        preserved.start_streaming();
        preserved.update_streaming("dropped");
        preserved.preserve();
        assert_eq!(preserved.committed(), "Assistant: Kept.");
        assert!(!preserved.is_streaming());

        buffer.reset();
        assert_eq!(buffer.committed(), "");
        assert!(buffer.user_lines().is_empty());
        assert_eq!(buffer.render(), "");
    }
}
