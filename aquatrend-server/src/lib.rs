pub mod config;
pub mod error;
pub mod pipeline;
pub mod routes;
pub mod scheduler;
pub mod server;
pub mod sources;
pub mod store;
