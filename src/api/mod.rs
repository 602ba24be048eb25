// HTTP API for the free-games dashboard

pub mod auth;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod server;

pub use error::ApiError;
pub use server::ApiServer;
