//! HTTP API surface

mod channels;
mod health;
mod publish;

pub use channels::channel_routes;
pub use health::health_routes;
pub use publish::publish_routes;
