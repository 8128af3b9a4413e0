pub mod config;
pub mod detector;
pub mod driver;
pub mod engine;
pub mod enrich;
pub mod error;
pub mod recovery;
pub mod retry;
pub mod session;
pub mod store;
pub mod surface;

pub use config::CollectorConfig;
pub use detector::{EndOfListDetector, ListObservation, StopReason};
pub use driver::{AdvanceReport, ScrollDriver, ScrollTechnique};
pub use engine::{CollectionEngine, CollectionOutcome, CollectionStats};
pub use enrich::{enrich_profiles, EnrichmentReport};
pub use error::{CollectError, FailureClass, StoreError};
pub use recovery::RecoveryController;
pub use retry::RetryPolicy;
pub use session::{CancelFlag, CollectionSession};
pub use store::{read_snapshot, CheckpointSink, Checkpoint, ProgressStore, SessionSummary};
pub use surface::{
    ContainerLocator, ItemExtractor, ProfileInspector, ScrollMetrics, ScrollSurface, SessionGuard,
};
