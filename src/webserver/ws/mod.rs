/// Pusher-style WebSocket front end
///
/// Each socket owns a `QueueConnection` registered with the fan-out engine;
/// the socket task drains its queue.
pub mod connection;
pub mod health;
pub mod message;

pub use connection::handle_connection;
