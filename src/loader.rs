// ============================================================================
// ASYNC IMAGE PIPELINE — background decoding with channel completion
// ============================================================================
//
// Imports and snapshot restores both follow "load, then draw": the decode
// runs on a worker thread and the finished pixels arrive over an mpsc
// channel, to be composited on the UI thread. Each request carries a
// monotonically increasing generation token; a completion older than the
// newest request is stale and gets dropped instead of overwriting newer
// content. Failures arrive as error completions — nothing is cleared until
// a decode has actually succeeded, so a bad file never blanks the grid.

use std::path::PathBuf;
use std::sync::mpsc::{Receiver, Sender, channel};
use std::thread;

use image::RgbaImage;

use crate::io;

/// What a decoded image is for, so the completion can be routed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadKind {
    /// A newly imported picture, to be fit into the grid.
    Import,
    /// A persisted snapshot being re-placed after construction or resize.
    Restore,
}

/// Where the pixels come from.
pub enum ImageSource {
    /// An image file on disk.
    Path(PathBuf),
    /// A `data:image/png;base64,` snapshot string.
    DataUri(String),
}

impl ImageSource {
    fn label(&self) -> String {
        match self {
            ImageSource::Path(p) => p.display().to_string(),
            ImageSource::DataUri(_) => "<snapshot>".to_string(),
        }
    }
}

/// Result delivered from a decode thread.
pub struct LoadOutcome {
    pub generation: u64,
    pub kind: LoadKind,
    pub label: String,
    pub result: Result<RgbaImage, String>,
}

/// Owns the completion channel and hands out generation tokens.
pub struct ImageLoader {
    tx: Sender<LoadOutcome>,
    rx: Receiver<LoadOutcome>,
    generation: u64,
}

impl Default for ImageLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageLoader {
    pub fn new() -> Self {
        let (tx, rx) = channel();
        Self {
            tx,
            rx,
            generation: 0,
        }
    }

    /// Kick off a background decode. Returns the request's generation token.
    pub fn request(&mut self, kind: LoadKind, source: ImageSource) -> u64 {
        self.generation += 1;
        let generation = self.generation;
        let label = source.label();
        let tx = self.tx.clone();

        log_info!("decode #{} requested: {} ({:?})", generation, label, kind);
        thread::spawn(move || {
            let result = match &source {
                ImageSource::Path(path) => {
                    io::decode_file(path).map_err(|e| e.to_string())
                }
                ImageSource::DataUri(uri) => {
                    io::decode_snapshot(uri).map_err(|e| e.to_string())
                }
            };
            // Receiver gone means the app is shutting down; nothing to do.
            let _ = tx.send(LoadOutcome {
                generation,
                kind,
                label,
                result,
            });
        });

        generation
    }

    /// `true` when a completion token no longer matches the newest request.
    pub fn is_stale(&self, generation: u64) -> bool {
        generation < self.generation
    }

    /// Drain the channel, dropping stale completions, and return the first
    /// current one (if any). Call once per frame.
    pub fn poll(&mut self) -> Option<LoadOutcome> {
        while let Ok(outcome) = self.rx.try_recv() {
            if self.is_stale(outcome.generation) {
                log_info!(
                    "decode #{} ({}) superseded by #{}, dropped",
                    outcome.generation,
                    outcome.label,
                    self.generation
                );
                continue;
            }
            return Some(outcome);
        }
        None
    }
}
