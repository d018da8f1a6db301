pub mod build_info;
pub mod cli;
pub mod commands;
pub mod config;
pub mod logging;
pub mod provider_client;
pub mod search_client;
pub mod server;
pub mod state;
pub mod sync_service;
