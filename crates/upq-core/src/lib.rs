pub mod config;
pub mod logging;

pub mod control;
pub mod queue;
pub mod registry;
pub mod retry;
pub mod scheduler;
pub mod store;
pub mod task;
pub mod transport;
pub mod view;
