//! OCR Layer
//!
//! A fixed-size pool of OCR engine instances shared by every analysis.
//! Engines are built lazily on first use, exactly once, no matter how many
//! callers arrive while construction is in progress.

pub mod tesseract;

pub use tesseract::{TesseractConfig, TesseractEngine, TesseractFactory};

use async_trait::async_trait;
use futures_util::future::try_join_all;
use image::DynamicImage;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{OnceCell, Semaphore};
use tracing::{debug, info, warn};

use crate::error::OcrError;

/// Characters the engines are allowed to emit
pub const LABEL_WHITELIST: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789-. /:Ww";

/// Upper bound on the default pool size
pub const MAX_DEFAULT_WORKERS: usize = 4;

/// A single OCR engine instance
#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// Recognize all text in `image` as one block
    async fn recognize(&self, image: &DynamicImage) -> Result<String, OcrError>;
}

/// Builds engine instances for the pool
#[async_trait]
pub trait OcrEngineFactory: Send + Sync {
    async fn build(&self, worker: usize) -> Result<Box<dyn OcrEngine>, OcrError>;
}

/// Default pool size: available parallelism, capped at four
pub fn default_pool_size() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(MAX_DEFAULT_WORKERS)
        .min(MAX_DEFAULT_WORKERS)
}

struct Workers {
    idle: Mutex<Vec<Box<dyn OcrEngine>>>,
    permits: Semaphore,
}

/// Returns the engine to the idle list when dropped, even if the
/// recognizing future is cancelled
struct Checkout<'a> {
    engine: Option<Box<dyn OcrEngine>>,
    idle: &'a Mutex<Vec<Box<dyn OcrEngine>>>,
}

impl Drop for Checkout<'_> {
    fn drop(&mut self) {
        if let Some(engine) = self.engine.take() {
            self.idle.lock().push(engine);
        }
    }
}

/// Pool of OCR engines with single-flight lazy construction
pub struct OcrPool {
    size: usize,
    factory: Arc<dyn OcrEngineFactory>,
    workers: OnceCell<Workers>,
}

impl OcrPool {
    /// Create a pool of `size` engines built by `factory`.
    ///
    /// Nothing is constructed until the first `recognize` call.
    pub fn new(size: usize, factory: impl OcrEngineFactory + 'static) -> Result<Self, OcrError> {
        if size == 0 {
            return Err(OcrError::EmptyPool);
        }

        Ok(Self {
            size,
            factory: Arc::new(factory),
            workers: OnceCell::new(),
        })
    }

    /// Number of engines in the pool
    pub fn size(&self) -> usize {
        self.size
    }

    /// Whether the engines have been built
    pub fn is_initialized(&self) -> bool {
        self.workers.initialized()
    }

    async fn workers(&self) -> Result<&Workers, OcrError> {
        self.workers
            .get_or_try_init(|| async {
                let start = Instant::now();
                info!("Initializing OCR pool with {} workers", self.size);

                let engines = try_join_all((0..self.size).map(|i| self.factory.build(i)))
                    .await
                    .inspect_err(|e| warn!("OCR pool construction failed: {}", e))?;

                info!("OCR pool ready in {:?}", start.elapsed());
                Ok(Workers {
                    idle: Mutex::new(engines),
                    permits: Semaphore::new(self.size),
                })
            })
            .await
    }

    /// Recognize text in `image` on the next idle engine.
    ///
    /// Pool construction errors are returned to the caller and retried on the
    /// next call. A failing engine stays in the pool.
    pub async fn recognize(&self, image: &DynamicImage) -> Result<String, OcrError> {
        let workers = self.workers().await?;

        let _permit = workers
            .permits
            .acquire()
            .await
            .map_err(|_| OcrError::Engine("OCR pool closed".to_string()))?;

        let checkout = Checkout {
            engine: workers.idle.lock().pop(),
            idle: &workers.idle,
        };
        let Some(engine) = checkout.engine.as_ref() else {
            return Err(OcrError::Engine("no idle OCR engine".to_string()));
        };

        let start = Instant::now();
        let result = engine.recognize(image).await;
        debug!(
            "OCR on {}x{} finished in {:?} (ok: {})",
            image.width(),
            image.height(),
            start.elapsed(),
            result.is_ok()
        );

        result
    }
}
