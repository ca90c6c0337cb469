pub mod actor;
pub mod state;

pub use actor::{PulseActor, PulseHandle};
pub use state::{PulseEvent, PulseIntent, PulseJob, PulseState, PulseStateMachine};
