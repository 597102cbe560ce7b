pub mod aggregator;
pub mod volume;

pub use aggregator::{GraduationEvent, MetricAggregator};
pub use volume::VolumeTracker;
