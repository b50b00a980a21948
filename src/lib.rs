pub mod auth;
pub mod cache;
pub mod config;
pub mod error;
pub mod gateway;
pub mod handlers;
pub mod invoke;
pub mod middleware;
pub mod transform;
pub mod validation;

pub use error::ApiError;
pub use gateway::{app, Gateway};
