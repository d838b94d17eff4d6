// Library surface for the binary and the headless integration tests.
pub mod app;
pub mod app_dirs;
pub mod audio;
pub mod config;
pub mod logging;
pub mod phase;
pub mod runtime;
pub mod session;
pub mod ui;
