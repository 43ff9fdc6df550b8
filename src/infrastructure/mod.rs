// Infrastructure: persistence and caching

pub mod cache;
pub mod database;
