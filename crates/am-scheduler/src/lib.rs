pub mod manager;
pub mod prober;
pub mod scheduler;

pub use manager::ScheduleManager;
pub use prober::{Prober, ProbeResponse};
pub use scheduler::{SchedulerError, SchedulerHandle, TestScheduler};
