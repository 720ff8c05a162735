#![forbid(unsafe_code)]

pub mod deadline;
pub mod model;
pub mod time;

pub use deadline::Deadline;
pub use time::Clock;
