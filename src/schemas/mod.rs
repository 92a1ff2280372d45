pub mod generate;
pub mod task;
pub mod task_status;
pub mod user;
