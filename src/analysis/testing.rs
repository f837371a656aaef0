//! In-process stand-ins for the decoder and the classifier.

use std::collections::{HashSet, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use ndarray::Array4;

use crate::media::{Frame, MediaError, PixelLayout, VideoOpener, VideoSource};
use crate::ml::{ClassifierConfig, ClassifierError, FrameClassifier};

#[derive(Debug, Default)]
pub struct SourceLog {
    pub reads: Mutex<Vec<u64>>,
    pub released: AtomicBool,
}

/// Serves solid 8x8 frames, failing on the configured indices.
pub struct ScriptedSource {
    pub frame_count: i64,
    pub failing: HashSet<u64>,
    pub log: Arc<SourceLog>,
}

impl ScriptedSource {
    pub fn new(frame_count: i64) -> Self {
        Self {
            frame_count,
            failing: HashSet::new(),
            log: Arc::new(SourceLog::default()),
        }
    }
}

impl VideoSource for ScriptedSource {
    fn reported_frame_count(&self) -> i64 {
        self.frame_count
    }

    fn read_frame(&mut self, index: u64) -> Result<Frame, MediaError> {
        self.log.reads.lock().unwrap().push(index);
        if self.failing.contains(&index) {
            return Err(MediaError::Decode {
                index,
                reason: "scripted failure".to_string(),
            });
        }
        Ok(Frame {
            index,
            width: 8,
            height: 8,
            layout: PixelLayout::Rgb,
            data: vec![120; 8 * 8 * 3],
        })
    }
}

impl Drop for ScriptedSource {
    fn drop(&mut self) {
        self.log.released.store(true, Ordering::SeqCst);
    }
}

pub struct ScriptedOpener {
    pub frame_count: i64,
    pub fail_open: bool,
    pub log: Arc<SourceLog>,
}

impl ScriptedOpener {
    pub fn new(frame_count: i64) -> Self {
        Self {
            frame_count,
            fail_open: false,
            log: Arc::new(SourceLog::default()),
        }
    }
}

impl VideoOpener for ScriptedOpener {
    fn open(&self, path: &Path) -> Result<Box<dyn VideoSource>, MediaError> {
        if self.fail_open {
            return Err(MediaError::Open {
                path: path.display().to_string(),
                reason: "scripted open failure".to_string(),
            });
        }
        Ok(Box::new(ScriptedSource {
            frame_count: self.frame_count,
            failing: HashSet::new(),
            log: self.log.clone(),
        }))
    }
}

/// Returns queued logits in order, then `fallback` once the queue is empty.
pub struct ScriptedClassifier {
    config: ClassifierConfig,
    queue: Mutex<VecDeque<Result<Vec<f32>, ClassifierError>>>,
    fallback: Vec<f32>,
    pub calls: AtomicUsize,
}

impl ScriptedClassifier {
    pub fn always(logits: Vec<f32>) -> Self {
        Self {
            config: ClassifierConfig {
                input_size: 4,
                ..ClassifierConfig::default()
            },
            queue: Mutex::new(VecDeque::new()),
            fallback: logits,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn then(self, next: Result<Vec<f32>, ClassifierError>) -> Self {
        self.queue.lock().unwrap().push_back(next);
        self
    }
}

impl FrameClassifier for ScriptedClassifier {
    fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    fn logits(&self, input: Array4<f32>) -> Result<Vec<f32>, ClassifierError> {
        assert_eq!(input.shape(), &[1, 3, 4, 4]);
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.queue.lock().unwrap().pop_front() {
            Some(next) => next,
            None => Ok(self.fallback.clone()),
        }
    }
}
