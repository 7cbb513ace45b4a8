pub mod config;
pub mod error;
pub mod field;
pub mod model;
pub mod policy;
pub mod time;

pub use error::{ExporterError, Result};
pub use field::{Field, FieldGroup};
pub use model::metric::{FeedState, MetricSample};
pub use model::sample::{Readings, TelemetrySample};
pub use model::snapshot::MeasurementSnapshot;
pub use policy::{PolicyTable, UpdatePolicy};
