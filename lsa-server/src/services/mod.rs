//! Service layer for lsa-server
//!
//! Business rules live here; handlers only translate HTTP to service calls.
//! External collaborators (training gate, product classifier, screenshot
//! extractor) sit behind traits so tests can substitute them.

pub mod product_classifier;
pub mod product_dedup;
pub mod report_aggregator;
pub mod report_editor;
pub mod scope;
pub mod screenshot_extractor;
pub mod session_lifecycle;
pub mod training_gate;

pub use product_classifier::{
    ClassifierError, HttpProductClassifier, NameGroup, ProductClassifier, SimilarityClassifier,
};
pub use product_dedup::{ClassifierFlights, ProductDeduplicator};
pub use report_aggregator::{Funnel, ReportAggregator, ReportSummary, SummaryResponse};
pub use report_editor::ReportEditor;
pub use scope::{ReportQuery, ReportScope};
pub use screenshot_extractor::{ExtractorError, HttpScreenshotExtractor, Screenshot, ScreenshotExtractor};
pub use session_lifecycle::SessionLifecycle;
pub use training_gate::{SqliteTrainingGate, TrainingGate};
