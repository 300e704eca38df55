//! Shared fakes and builders for pipeline tests.
//!
//! Task identity travels through the fakes as a "seed" encoded in the image
//! dimensions: a seed-`k` test image is a (k+1)x1 PNG, and `seed_of` recovers
//! `k` from the prepared payload. That lets a responder target specific
//! tasks regardless of admission or completion order.

use crate::config::Config;
use crate::convert::{SlideConverter, SlideImage};
use crate::error::{DecomposeError, TaskError};
use crate::pipeline::AssetPipeline;
use crate::types::{BatchId, BatchProgress, BatchState, PreparedImage, Task, UploadedFile};
use crate::vision::MetadataGenerator;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Seed base for slides produced by [`FakeConverter`], so slide seeds never
/// collide with plain-image seeds in the same test
pub(crate) const SLIDE_SEED_BASE: u8 = 100;

/// Deterministic test PNG whose width encodes the seed
pub(crate) fn test_png_bytes(seed: u8) -> Vec<u8> {
    let img = image::DynamicImage::ImageRgb8(image::RgbImage::from_pixel(
        seed as u32 + 1,
        1,
        image::Rgb([7, 7, 7]),
    ));
    let mut buf = Vec::new();
    img.write_to(
        &mut std::io::Cursor::new(&mut buf),
        image::ImageFormat::Png,
    )
    .unwrap();
    buf
}

/// Recover the seed from a prepared payload
pub(crate) fn seed_of(image: &PreparedImage) -> u8 {
    (image::load_from_memory(&image.bytes).unwrap().width() - 1) as u8
}

/// A contract-conforming metadata response for one seed
pub(crate) fn ok_metadata(seed: u8) -> String {
    format!("Asset Name: Asset {seed} / أصل {seed}\nTags: tag one, tag two")
}

type Responder = dyn Fn(u8, usize) -> Result<String, TaskError> + Send + Sync;
type DelayFn = dyn Fn(u8) -> Duration + Send + Sync;

/// Scripted metadata generator with in-flight accounting.
///
/// The responder receives `(seed, attempt)` where attempt is 1-based per
/// seed, so retry behavior can be scripted per task.
pub(crate) struct FakeGenerator {
    pub(crate) calls: AtomicUsize,
    pub(crate) in_flight: AtomicUsize,
    pub(crate) max_in_flight: AtomicUsize,
    pub(crate) seen_instructions: std::sync::Mutex<Vec<String>>,
    attempts: std::sync::Mutex<HashMap<u8, usize>>,
    delay_for: Box<DelayFn>,
    responder: Box<Responder>,
}

impl FakeGenerator {
    pub(crate) fn new(
        responder: impl Fn(u8, usize) -> Result<String, TaskError> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Self::with_delays(|_| Duration::ZERO, responder)
    }

    pub(crate) fn with_delays(
        delay_for: impl Fn(u8) -> Duration + Send + Sync + 'static,
        responder: impl Fn(u8, usize) -> Result<String, TaskError> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            seen_instructions: std::sync::Mutex::new(Vec::new()),
            attempts: std::sync::Mutex::new(HashMap::new()),
            delay_for: Box::new(delay_for),
            responder: Box::new(responder),
        })
    }

    /// Succeeds for every task with seed-derived metadata
    pub(crate) fn always_ok() -> Arc<Self> {
        Self::new(|seed, _| Ok(ok_metadata(seed)))
    }

    pub(crate) fn total_calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn observed_max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MetadataGenerator for FakeGenerator {
    async fn generate(
        &self,
        image: &PreparedImage,
        instructions: &str,
    ) -> Result<String, TaskError> {
        self.seen_instructions
            .lock()
            .unwrap()
            .push(instructions.to_string());
        let seed = seed_of(image);
        let attempt = {
            let mut attempts = self.attempts.lock().unwrap();
            let n = attempts.entry(seed).or_insert(0);
            *n += 1;
            *n
        };

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.calls.fetch_add(1, Ordering::SeqCst);

        let delay = (self.delay_for)(seed);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let result = (self.responder)(seed, attempt);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

/// Scripted slide converter
pub(crate) enum FakeConverter {
    /// Produce this many slides, seeded SLIDE_SEED_BASE+1.. in order
    Slides(u32),
    /// Reject every presentation with ConversionFailed
    Fails,
}

#[async_trait]
impl SlideConverter for FakeConverter {
    async fn convert(
        &self,
        file_name: &str,
        _bytes: &[u8],
    ) -> Result<Vec<SlideImage>, DecomposeError> {
        match self {
            FakeConverter::Slides(count) => Ok((1..=*count)
                .map(|i| SlideImage {
                    index: i,
                    bytes: test_png_bytes(SLIDE_SEED_BASE + i as u8),
                })
                .collect()),
            FakeConverter::Fails => Err(DecomposeError::ConversionFailed {
                file: file_name.to_string(),
                reason: "soffice exited with status 1".to_string(),
            }),
        }
    }

    fn available(&self) -> bool {
        matches!(self, FakeConverter::Slides(_))
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

/// Upload carrying a seed-`k` test image
pub(crate) fn image_upload(name: &str, seed: u8) -> UploadedFile {
    UploadedFile {
        name: name.to_string(),
        bytes: test_png_bytes(seed),
    }
}

/// Upload with a presentation extension (contents only matter to real converters)
pub(crate) fn pptx_upload(name: &str) -> UploadedFile {
    UploadedFile {
        name: name.to_string(),
        bytes: b"presentation bytes".to_vec(),
    }
}

/// Pipeline wired to fakes with the given concurrency cap
pub(crate) fn test_pipeline(
    max_concurrent_tasks: usize,
    generator: Arc<FakeGenerator>,
    converter: FakeConverter,
) -> AssetPipeline {
    let mut config = Config::default();
    config.pipeline.max_concurrent_tasks = max_concurrent_tasks;
    AssetPipeline::with_collaborators(config, generator, Arc::new(converter))
}

/// A task built directly, bypassing decomposition
pub(crate) fn make_task(index: usize, seed: u8) -> Task {
    Task {
        index,
        source_name: format!("file{seed}.png"),
        slide: None,
        image: PreparedImage {
            bytes: test_png_bytes(seed),
            format: crate::types::PayloadFormat::Png,
        },
        instructions: Arc::from("test instructions"),
    }
}

/// Poll until the batch reports Completed (or panic after ~5s)
pub(crate) async fn wait_for_completion(pipeline: &AssetPipeline, id: &BatchId) -> BatchProgress {
    for _ in 0..500 {
        let progress = pipeline.batch_progress(id).await.unwrap();
        if progress.state == BatchState::Completed {
            return progress;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("batch {id} did not complete in time");
}
