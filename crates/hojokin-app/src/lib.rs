pub mod cli;
pub mod config;
pub mod error;
pub mod jgrants;
pub mod portal;
pub mod server;
pub mod services;
