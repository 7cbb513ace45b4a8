pub mod db;
pub mod project;
pub mod write;

pub use db::{MeasurementStore, StoreStatus};
pub use project::MetricProjector;
