pub mod api;
pub mod config;
pub mod free_games;
pub mod logging;
pub mod scheduler;

pub mod util {
    pub mod db;
    pub mod env;
}

pub use config::SentinelConfig;
pub use free_games::FreeGameService;
pub use scheduler::{Scheduler, SchedulerConfig};
