//! Best-effort clipboard writes for generated text.

use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
#[error("Clipboard unavailable: {0}")]
pub struct ClipboardError(pub String);

pub trait Clipboard: Send {
    fn write_text(&mut self, text: &str) -> Result<(), ClipboardError>;
    fn read_text(&self) -> Option<String>;
}

/// Clipboard held in memory, one per session.
#[derive(Debug, Clone, Default)]
pub struct MemoryClipboard {
    contents: Option<String>,
}

impl Clipboard for MemoryClipboard {
    fn write_text(&mut self, text: &str) -> Result<(), ClipboardError> {
        self.contents = Some(text.to_string());
        Ok(())
    }

    fn read_text(&self) -> Option<String> {
        self.contents.clone()
    }
}

/// Copies `text`, reporting success as a boolean. Never fails loudly.
pub fn copy_to_clipboard(clipboard: &mut dyn Clipboard, text: &str) -> bool {
    if text.is_empty() {
        return false;
    }
    match clipboard.write_text(text) {
        Ok(()) => true,
        Err(e) => {
            warn!("Failed to copy text: {e}");
            false
        }
    }
}
