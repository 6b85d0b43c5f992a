mod app;
mod cli;
mod config;
mod effects;
mod logging;
mod parameters;
mod ui;

pub use app::run_app;
