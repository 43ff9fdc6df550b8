// Domain layer: entities and the services that act on them

pub mod models;
pub mod services;
