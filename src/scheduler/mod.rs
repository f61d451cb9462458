pub mod engine;
pub mod timing;

pub use engine::Scheduler;
pub use timing::{calc_next_run_time, next_run_time_max, NEXT_RUN_TIME_MAX};
