pub mod alert;
pub mod board;
pub mod clock;
pub mod config;
pub mod manager;
pub mod model;
pub mod notifier;
pub mod opener;
pub mod output;
pub mod paths;
pub mod queue;
pub mod schedule;
pub mod scheduler;
pub mod store;
pub mod validate;
pub mod watch;
