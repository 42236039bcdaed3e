pub mod audit;
pub mod config;
pub mod core;
pub mod main_module;
pub mod notifications;
pub mod reports;
pub mod security;
pub mod tickets;
