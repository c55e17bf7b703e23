//! lumiscan - Nameplate recognition for luminaire inventory audits
//!
//! Turns field photos of street-light fixtures into (model, rated power)
//! records by fusing pixel-level segmentation, OCR, a fuzzy-matching
//! knowledge base, visual memory of confirmed fixtures and an optional
//! vision-model advisor. Low-confidence readings are routed to human review.

pub mod advisor;
pub mod analysis;
pub mod batch;
pub mod capture;
pub mod config;
pub mod error;
pub mod knowledge;
pub mod ocr;
pub mod vision;

pub use analysis::{AnalysisResult, ConsensusEngine, ReasonFragment, ReviewStatus, Source};
pub use batch::{select_best_image, JobOutcome, JobScheduler};
pub use capture::{ProcessingJob, RawImage};
pub use knowledge::{KnowledgeBase, TrainingExample};
pub use ocr::OcrPool;
pub use vision::{FeatureExtractor, PreprocessedImage, VisualFeatures};
