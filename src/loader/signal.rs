//! "Script finished loading" detection.
//!
//! Environments report script completion differently: some fire a load
//! event, some only move the element through ready states, and the oldest
//! ones have to be polled. The loader only asks one question, through
//! [`CompletionSignal`], and the adapter picked at construction answers it.

/// Ready states reported by script elements and documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyState {
    Uninitialized,
    Loading,
    Loaded,
    Interactive,
    Complete,
}

impl ReadyState {
    pub fn is_done(self) -> bool {
        matches!(self, ReadyState::Loaded | ReadyState::Complete)
    }
}

/// Raw notification observed for an included script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptEvent {
    Load,
    ReadyStateChange(ReadyState),
    DocumentPoll(ReadyState),
}

pub trait CompletionSignal {
    fn name(&self) -> &str;

    /// Whether `event` means the script it was observed on has executed.
    fn is_complete(&self, event: &ScriptEvent) -> bool;
}

/// Load event only.
#[derive(Debug, Default, Clone, Copy)]
pub struct OnLoadSignal;

impl CompletionSignal for OnLoadSignal {
    fn name(&self) -> &str {
        "onload"
    }

    fn is_complete(&self, event: &ScriptEvent) -> bool {
        matches!(event, ScriptEvent::Load)
    }
}

/// Ready-state transitions, with the load event as a fallback since some
/// environments emit both.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReadyStateSignal;

impl CompletionSignal for ReadyStateSignal {
    fn name(&self) -> &str {
        "readystate"
    }

    fn is_complete(&self, event: &ScriptEvent) -> bool {
        match event {
            ScriptEvent::Load => true,
            ScriptEvent::ReadyStateChange(state) => state.is_done(),
            ScriptEvent::DocumentPoll(_) => false,
        }
    }
}

/// Polled document readiness, for environments without per-script events.
#[derive(Debug, Default, Clone, Copy)]
pub struct DocumentPollSignal;

impl CompletionSignal for DocumentPollSignal {
    fn name(&self) -> &str {
        "document_poll"
    }

    fn is_complete(&self, event: &ScriptEvent) -> bool {
        matches!(event, ScriptEvent::DocumentPoll(state) if state.is_done())
    }
}
