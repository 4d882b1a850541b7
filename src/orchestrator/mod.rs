pub mod evaluation_session;
pub mod progress_coordinator;
pub mod screen_router;

pub use evaluation_session::EvaluationSession;
pub use progress_coordinator::{ProgressCoordinator, RunHandle};
pub use screen_router::{next_screen, RouterAction, Screen, ScreenRouter};
