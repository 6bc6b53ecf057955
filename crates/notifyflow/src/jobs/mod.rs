pub mod dispatch;
pub mod error_codes;
pub mod memory;
pub mod model;
pub mod promoter;
pub mod retry;
pub mod runner;
pub mod store;

pub mod metrics;
pub use metrics::Metrics;

pub use dispatch::{
    boxed, BookingLookup, BookingRecord, HandlerOptions, HandlerRegistry, JobContext, JobError,
    LookupError, Transport, TransportError,
};
pub use memory::MemoryStore;
pub use model::{DeadLetterEntry, Job, JobStatus, NewJob};
pub use promoter::Promoter;
pub use runner::{JobRunner, RunnerOptions, Tick};
pub use store::{JobStore, StoreDepths, StoreError};
