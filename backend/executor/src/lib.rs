pub mod executor;

pub use executor::{assemble_segments, BatchOutcome, PlannedBatch, Segment, ToolBridge};
