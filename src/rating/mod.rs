pub mod code;
pub mod connection;
pub mod messages;
mod registry;
mod server;
pub mod stats;

pub use connection::ClientConnection;
pub use messages::{Ack, ClientMessage, ServerMessage};
pub use server::RatingServer;
pub use stats::Stats;
