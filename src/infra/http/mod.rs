//! HTTP adapter for the remote post collection.

mod gateway;

pub use gateway::HttpPostsGateway;
