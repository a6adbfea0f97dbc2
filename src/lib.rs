pub mod config;
pub mod db;
pub mod history;
pub mod metadata;
pub mod models;
pub mod segmentation;
pub mod utils;
pub mod walkthrough;

pub use config::{ConfigStore, StudyConfig};
pub use db::Database;
pub use walkthrough::{Outcome, Step, StudyService, Walkthrough};

/// Initializes logging from `RUST_LOG`, defaulting to `info`.
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .try_init();
}
