pub mod metric;
pub mod sample;
pub mod snapshot;
