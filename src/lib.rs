pub mod ai;
pub mod bot;
pub mod config;
pub mod telegram_log;
