//! Scripted mock renderer for tests and dry runs.
//!
//! Replays a configured sample sequence per job so convergence behavior
//! (stable plateaus, flapping frames, capture faults, outright rejection)
//! can be exercised without a real visual engine. Unscripted jobs render
//! a stable frame derived from their input bytes.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::error::SampleError;
use crate::domain::models::JobId;
use crate::domain::ports::{Renderer, SampleSource};

/// One step of a scripted sample sequence.
#[derive(Debug, Clone)]
pub enum MockFrame {
    /// A successful capture returning these bytes.
    Image(Vec<u8>),
    /// A failed capture with this message.
    Fault(String),
}

/// Per-job script for the mock renderer.
#[derive(Debug, Clone, Default)]
pub struct MockScript {
    frames: Vec<MockFrame>,
    reject: Option<String>,
}

impl MockScript {
    /// Render the same image on every sample.
    pub fn stable(image: impl Into<Vec<u8>>) -> Self {
        Self {
            frames: vec![MockFrame::Image(image.into())],
            reject: None,
        }
    }

    /// Play these frames in order; after the script runs out the last
    /// image repeats, like a render that has finished animating.
    pub fn frames(frames: Vec<MockFrame>) -> Self {
        Self {
            frames,
            reject: None,
        }
    }

    /// Refuse to open a session at all.
    pub fn rejecting(reason: impl Into<String>) -> Self {
        Self {
            frames: Vec::new(),
            reject: Some(reason.into()),
        }
    }
}

/// Mock renderer with per-job scripted behavior.
pub struct MockRenderer {
    scripts: RwLock<HashMap<JobId, MockScript>>,
    opened: RwLock<Vec<JobId>>,
    active: Arc<AtomicUsize>,
    peak: AtomicUsize,
}

impl MockRenderer {
    /// Create a renderer with no scripts; every job renders stably.
    pub fn new() -> Self {
        Self {
            scripts: RwLock::new(HashMap::new()),
            opened: RwLock::new(Vec::new()),
            active: Arc::new(AtomicUsize::new(0)),
            peak: AtomicUsize::new(0),
        }
    }

    /// Set the script for a specific job.
    pub async fn script_job(&self, job_id: JobId, script: MockScript) {
        self.scripts.write().await.insert(job_id, script);
    }

    /// Job ids in the order sessions were opened.
    pub async fn opened_order(&self) -> Vec<JobId> {
        self.opened.read().await.clone()
    }

    /// Highest number of sessions ever open at once.
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

impl Default for MockRenderer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Renderer for MockRenderer {
    async fn open(
        &self,
        job_id: JobId,
        input: &[u8],
    ) -> Result<Box<dyn SampleSource>, SampleError> {
        self.opened.write().await.push(job_id);

        let script = self.scripts.read().await.get(&job_id).cloned();
        let script = script.unwrap_or_else(|| {
            MockScript::stable([b"PNG:".as_slice(), input].concat())
        });

        if let Some(reason) = script.reject {
            return Err(SampleError::Rejected(reason));
        }

        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        Ok(Box::new(MockSession {
            frames: script.frames,
            cursor: 0,
            active: Arc::clone(&self.active),
        }))
    }
}

#[derive(Debug)]
struct MockSession {
    frames: Vec<MockFrame>,
    cursor: usize,
    active: Arc<AtomicUsize>,
}

#[async_trait]
impl SampleSource for MockSession {
    async fn sample(&mut self) -> Result<Vec<u8>, SampleError> {
        let frame = self.frames.get(self.cursor).cloned();
        if self.cursor < self.frames.len() {
            self.cursor += 1;
        }

        match frame {
            Some(MockFrame::Image(bytes)) => Ok(bytes),
            Some(MockFrame::Fault(message)) => Err(SampleError::Capture(message)),
            None => {
                // Script exhausted: repeat the final image like a render
                // that has stopped changing.
                self.frames
                    .iter()
                    .rev()
                    .find_map(|frame| match frame {
                        MockFrame::Image(bytes) => Some(bytes.clone()),
                        MockFrame::Fault(_) => None,
                    })
                    .ok_or_else(|| {
                        SampleError::Capture("script has no image frames".to_string())
                    })
            }
        }
    }
}

impl Drop for MockSession {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}
