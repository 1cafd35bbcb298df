use std::sync::mpsc;
use std::thread;

use anyhow::{Context, Result};

/// A source of pasted text. Reads may block, so they run off the UI thread.
pub trait ClipboardSource: Send + 'static {
    fn read_text(&mut self) -> Result<String>;
}

/// The system clipboard via `arboard`. Line endings come back as `\n`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ArboardClipboard;

impl ClipboardSource for ArboardClipboard {
    fn read_text(&mut self) -> Result<String> {
        let mut clipboard = arboard::Clipboard::new().context("Failed to open clipboard")?;
        let text = clipboard.get_text().context("Failed to read clipboard text")?;
        Ok(normalize_newlines(&text))
    }
}

pub fn normalize_newlines(text: &str) -> String {
    text.replace("\r\n", "\n")
}

/// Result received from the reader thread, tagged with the generation the
/// request was made in.
#[derive(Debug)]
pub struct PasteResult {
    pub generation: u64,
    pub text: Result<String>,
}

/// Sender/Receiver pair for communicating with the clipboard thread.
pub struct ClipboardReader {
    sender: mpsc::Sender<u64>,
    receiver: mpsc::Receiver<PasteResult>,
}

impl ClipboardReader {
    /// Spawn the background reader thread. It exits when the reader is dropped.
    pub fn spawn(mut source: Box<dyn ClipboardSource>) -> Self {
        let (request_tx, request_rx) = mpsc::channel::<u64>();
        let (result_tx, result_rx) = mpsc::channel::<PasteResult>();

        thread::spawn(move || {
            while let Ok(generation) = request_rx.recv() {
                let text = source.read_text();
                if result_tx.send(PasteResult { generation, text }).is_err() {
                    break;
                }
            }
        });

        Self {
            sender: request_tx,
            receiver: result_rx,
        }
    }

    /// Ask for one read (non-blocking). False if the thread is gone.
    pub fn request(&self, generation: u64) -> bool {
        self.sender.send(generation).is_ok()
    }

    /// Try to receive a result (non-blocking).
    pub fn try_recv(&self) -> Option<PasteResult> {
        self.receiver.try_recv().ok()
    }
}
