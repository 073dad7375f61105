use tokio::sync::mpsc;
use warp::ws::Message;

use crate::error::Result;

/// One live client socket: the server-assigned connection id plus the
/// outbound channel drained by that socket's sender task.
///
/// The id doubles as the creator capability for rooms this connection
/// created, so it is never derived from client-supplied data.
pub struct ClientConnection {
    pub id: String,
    sender: mpsc::UnboundedSender<Message>,
}

impl ClientConnection {
    pub fn new(id: String, sender: mpsc::UnboundedSender<Message>) -> Self {
        Self { id, sender }
    }

    pub fn send(&self, message: Message) -> Result<()> {
        self.sender.send(message)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_delivers_to_channel() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let conn = ClientConnection::new("conn_1".to_string(), tx);

        conn.send(Message::text("hello")).unwrap();
        let received = rx.try_recv().unwrap();
        assert_eq!(received.to_str().unwrap(), "hello");
    }

    #[test]
    fn test_send_fails_after_receiver_drops() {
        let (tx, rx) = mpsc::unbounded_channel();
        let conn = ClientConnection::new("conn_1".to_string(), tx);
        drop(rx);

        assert!(conn.send(Message::text("hello")).is_err());
    }
}
