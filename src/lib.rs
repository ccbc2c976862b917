pub mod app;
pub mod backend;
pub mod cli;
pub mod config;
pub mod cycle;
pub mod ledger;
pub mod process_guard;
pub mod report;
pub mod session;
pub mod timer;
pub mod ui;
pub mod util;
