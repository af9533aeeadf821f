//! Batched log persistence pipeline
//!
//! caller → [`BatchLogger`] → [`RecordValidator`] → [`BatchBuffer`] →
//! (size trigger or timer) → [`FlushExecutor`] → [`LogStore`](crate::storage::LogStore)

pub mod buffer;
pub mod diagnostics;
pub mod error;
pub mod executor;
pub mod layer;
pub mod level;
pub mod logger;
pub mod record;
pub mod scheduler;
pub mod validator;

pub use buffer::{AddOutcome, BatchBuffer, BufferSealed};
pub use diagnostics::{PipelineStats, StatsSnapshot, DIAGNOSTICS_TARGET};
pub use error::{ShutdownFlushError, StorageError, ValidationError};
pub use executor::{FlushExecutor, FlushFailure, FlushOutcome};
pub use layer::{PipelineLayer, PipelineLayerHandle};
pub use level::LogLevel;
pub use logger::{BatchLogger, RequestContext, RequestLogger};
pub use record::{LogRecord, Metadata, RawEvent, RawMetadata, RawTimestamp, StoredLog};
pub use scheduler::FlushScheduler;
pub use validator::{RecordDefaults, RecordValidator};
