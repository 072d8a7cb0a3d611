pub mod config;
pub mod runner;

pub use config::{Config, PollConfig, QueryConfig, WindowConfig};
pub use runner::{forward_signals, supervise, Check, CheckOptions};
