pub mod config;
pub mod error;
pub mod fetch;
pub mod list_cache;
pub mod messages;
pub mod models;
pub mod scope;
pub mod session;
pub mod storage;
