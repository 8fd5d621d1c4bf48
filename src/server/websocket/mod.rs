//! Live queue feed over WebSocket.

pub mod connection;
pub mod handler;
pub mod messages;

pub use connection::ConnectionManager;
pub use handler::ws_handler;
pub use messages::{msg_types, ServerMessage};
