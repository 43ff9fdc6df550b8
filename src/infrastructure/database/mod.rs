//! SurrealDB persistence for the service desk
//!
//! This module provides:
//! - Connection setup for any SurrealDB endpoint (embedded RocksDB, remote, in-memory)
//! - Schema definitions for guests, conversations, messages, documents,
//!   guest requests and analytics events
//! - Repository layer for CRUD operations

pub mod connection;
pub mod schema;
pub mod repositories;

pub use connection::{Database, init_database, ping};
pub use schema::run_migrations;
pub use repositories::{
    AnalyticsRepository,
    ConversationListQuery,
    ConversationRepository,
    DocumentRepository,
    GuestRepository,
    GuestRequestRepository,
    MessageRepository,
};
