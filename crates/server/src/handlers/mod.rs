//! HTTP request handlers.

pub mod config;
pub mod health;
pub mod stream;

pub use config::*;
pub use health::*;
pub use stream::*;
