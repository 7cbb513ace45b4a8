pub mod backoff;
pub mod pipeline;
pub mod replay;
pub mod source;
pub mod tibber;

pub use pipeline::StreamIngestor;
pub use source::TelemetrySource;
