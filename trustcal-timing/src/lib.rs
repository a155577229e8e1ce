pub mod schedule;
pub mod timer;

pub use schedule::{Scheduler, TaskId};
pub use timer::{HighPrecisionTimer, ManualTimer, Timer};
