//! HTTP surface: router, health endpoint, static client bundle

pub mod routes;

pub use routes::build_router;
