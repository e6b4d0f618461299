//! Auto-T1: unattended submission of NCTS arrival declarations and
//! follow-up of previously submitted ones.

pub mod app;
pub mod config;

pub use app::{run_lookup, run_submission, RunReport};
pub use config::AppConfig;
