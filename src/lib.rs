// Library for tests and the two binaries

pub mod cli;
pub mod config;
pub mod crontab;
pub mod endpoint_file;
pub mod error;
pub mod logging;
pub mod models;
pub mod reporter;
pub mod sampler;
pub mod scheduler;
