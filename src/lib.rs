pub mod cli;
pub mod config;
pub mod core;
pub mod engine;
pub mod exit;
pub mod lhr;
pub mod logs;
pub mod platform;
pub mod table;
pub mod ui;
