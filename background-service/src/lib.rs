pub mod coordinator;

pub use coordinator::{CoordinatorSettings, CoordinatorState, StreamCoordinator, StreamStats};
