// Library exports for rest-router

pub mod binding;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod route;
pub mod server;
pub mod writer;
