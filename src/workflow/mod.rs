pub mod setup_tracker;

pub use setup_tracker::SetupTracker;
