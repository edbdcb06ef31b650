mod reset_time;
mod task;

pub use reset_time::ResetTime;
pub use task::{Task, TaskKind};
