pub mod app_config;
pub mod check_config;
pub mod logging;
