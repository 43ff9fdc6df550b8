// Public API exports
pub mod domain;
pub mod shared;
pub mod config;

pub mod infrastructure;
pub mod realtime;
pub mod handlers;
pub mod cli;
