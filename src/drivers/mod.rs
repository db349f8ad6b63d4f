//! Thread and supervision helpers.

pub mod task_pin;
pub mod watchdog;
