use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

use super::code;
use super::stats::{self, Stats};
use crate::error::{Result, RoomError};

/// Cap on collision retries when allocating a room code. The code space is
/// ~2^30, so hitting the cap means something is badly wrong, not bad luck.
const MAX_CODE_ATTEMPTS: u32 = 10;

/// One live room: the presenter who created it, the connections subscribed
/// to its broadcasts, and at most one rating per participant.
#[derive(Debug, Clone)]
pub struct Room {
    pub code: String,
    pub creator_id: String,
    pub members: HashSet<String>,
    pub ratings: HashMap<String, u8>,
    pub created_at: std::time::SystemTime,
}

impl Room {
    fn new(code: String, creator_id: String) -> Self {
        let mut members = HashSet::new();
        members.insert(creator_id.clone());

        Self {
            code,
            creator_id,
            members,
            ratings: HashMap::new(),
            created_at: std::time::SystemTime::now(),
        }
    }

    fn stats(&self) -> Stats {
        stats::aggregate(self.ratings.values())
    }

    /// Snapshot of the broadcast group, taken under the registry lock so
    /// every subscriber sees the same update.
    fn subscribers(&self) -> Vec<String> {
        self.members.iter().cloned().collect()
    }
}

/// What a dropped connection did to a room; the gateway turns these into
/// broadcasts. Cleanup itself never fails outward.
#[derive(Debug)]
pub enum DisconnectEvent {
    Update {
        code: String,
        stats: Stats,
        recipients: Vec<String>,
    },
    Ended {
        code: String,
        recipients: Vec<String>,
    },
}

/// Owns the code -> room table. All mutation goes through these methods;
/// each one takes the write lock once, so concurrent submissions against
/// the same room serialize here.
pub struct RoomRegistry {
    rooms: Arc<RwLock<HashMap<String, Room>>>,
}

impl RoomRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            rooms: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    /// Create a new room with `creator_id` as presenter, already subscribed.
    /// The collision check runs against the live table under the same write
    /// lock as the insert, so two concurrent creates cannot share a code.
    pub async fn create(&self, creator_id: &str) -> Result<(String, Stats)> {
        let mut rooms = self.rooms.write().await;

        for _ in 0..MAX_CODE_ATTEMPTS {
            let room_code = code::generate();
            if rooms.contains_key(&room_code) {
                continue;
            }

            let room = Room::new(room_code.clone(), creator_id.to_string());
            let room_stats = room.stats();
            rooms.insert(room_code.clone(), room);

            tracing::info!(code = %room_code, creator_id = %creator_id, "Room created");
            return Ok((room_code, room_stats));
        }

        tracing::error!(
            attempts = MAX_CODE_ATTEMPTS,
            live_rooms = rooms.len(),
            "Could not allocate a unique room code"
        );
        Err(RoomError::CodeSpaceExhausted(MAX_CODE_ATTEMPTS))
    }

    /// Subscribe `caller_id` to the room's broadcasts. Rejoining is
    /// idempotent. Returns current stats for the caller only; a join is
    /// not a room-wide event.
    pub async fn join(&self, room_code: &str, caller_id: &str) -> Result<Stats> {
        let mut rooms = self.rooms.write().await;
        let room = rooms.get_mut(room_code).ok_or(RoomError::RoomNotFound)?;

        room.members.insert(caller_id.to_string());

        tracing::info!(code = %room_code, caller_id = %caller_id, "Participant joined room");
        Ok(room.stats())
    }

    /// Upsert the caller's rating and recompute stats. Returns the new
    /// stats plus the subscriber snapshot to broadcast them to.
    pub async fn submit_rating(
        &self,
        room_code: &str,
        caller_id: &str,
        value: f64,
    ) -> Result<(Stats, Vec<String>)> {
        let mut rooms = self.rooms.write().await;
        let room = rooms.get_mut(room_code).ok_or(RoomError::RoomNotFound)?;

        // Whole numbers only; 3.5 is not a vote
        if value.fract() != 0.0 || !(1.0..=5.0).contains(&value) {
            return Err(RoomError::InvalidRating);
        }
        let value = value as u8;

        room.ratings.insert(caller_id.to_string(), value);
        let room_stats = room.stats();

        tracing::debug!(
            code = %room_code,
            caller_id = %caller_id,
            value = value,
            count = room_stats.count,
            "Rating recorded"
        );
        Ok((room_stats, room.subscribers()))
    }

    /// Wipe all ratings. Membership is untouched. Creator only.
    pub async fn clear(&self, room_code: &str, caller_id: &str) -> Result<(Stats, Vec<String>)> {
        let mut rooms = self.rooms.write().await;
        let room = rooms.get_mut(room_code).ok_or(RoomError::RoomNotFound)?;

        if room.creator_id != caller_id {
            return Err(RoomError::Forbidden("clear"));
        }

        room.ratings.clear();

        tracing::info!(code = %room_code, "Ratings cleared by creator");
        Ok((room.stats(), room.subscribers()))
    }

    /// Remove the room. Creator only. Returns the final subscriber snapshot
    /// so the gateway can deliver the terminal event; any later operation
    /// on this code reports NotFound.
    pub async fn end(&self, room_code: &str, caller_id: &str) -> Result<Vec<String>> {
        let mut rooms = self.rooms.write().await;
        let room = rooms.get(room_code).ok_or(RoomError::RoomNotFound)?;

        if room.creator_id != caller_id {
            return Err(RoomError::Forbidden("end"));
        }

        let recipients = room.subscribers();
        rooms.remove(room_code);

        tracing::info!(code = %room_code, "Room ended by creator");
        Ok(recipients)
    }

    /// Reconcile every live room after a connection drop: a creator takes
    /// the room down with them, a voter takes only their rating entry.
    /// Best-effort; a connection with no entries anywhere is a no-op.
    pub async fn handle_disconnect(&self, conn_id: &str) -> Vec<DisconnectEvent> {
        let mut rooms = self.rooms.write().await;
        let mut events = Vec::new();

        rooms.retain(|room_code, room| {
            if room.creator_id == conn_id {
                tracing::info!(code = %room_code, "Creator disconnected, closing room");
                let recipients = room
                    .members
                    .iter()
                    .filter(|member| member.as_str() != conn_id)
                    .cloned()
                    .collect();
                events.push(DisconnectEvent::Ended {
                    code: room_code.clone(),
                    recipients,
                });
                return false;
            }

            let voted = room.ratings.remove(conn_id).is_some();
            let was_member = room.members.remove(conn_id);

            if voted {
                tracing::info!(
                    code = %room_code,
                    conn_id = %conn_id,
                    "Voter disconnected, dropping their rating"
                );
                events.push(DisconnectEvent::Update {
                    code: room_code.clone(),
                    stats: room.stats(),
                    recipients: room.subscribers(),
                });
            } else if was_member {
                tracing::debug!(code = %room_code, conn_id = %conn_id, "Member disconnected");
            }

            true
        });

        events
    }

    pub async fn room_exists(&self, room_code: &str) -> bool {
        let rooms = self.rooms.read().await;
        rooms.contains_key(room_code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rating::code::{CODE_ALPHABET, CODE_LEN};

    #[tokio::test]
    async fn test_create_room() {
        let registry = RoomRegistry::new();

        let (room_code, room_stats) = registry.create("creator_1").await.unwrap();
        assert_eq!(room_code.len(), CODE_LEN);
        assert!(room_code.bytes().all(|b| CODE_ALPHABET.contains(&b)));
        assert_eq!(room_stats, Stats::empty());

        assert!(registry.room_exists(&room_code).await);
    }

    #[tokio::test]
    async fn test_join_nonexistent_room() {
        let registry = RoomRegistry::new();

        let result = registry.join("QQQQQQ", "participant_1").await;
        assert!(matches!(result, Err(RoomError::RoomNotFound)));
    }

    #[tokio::test]
    async fn test_rejoin_is_idempotent() {
        let registry = RoomRegistry::new();
        let (room_code, _) = registry.create("creator_1").await.unwrap();

        registry.join(&room_code, "participant_1").await.unwrap();
        registry.join(&room_code, "participant_1").await.unwrap();

        let (_, recipients) = registry
            .submit_rating(&room_code, "participant_1", 3.0)
            .await
            .unwrap();
        assert_eq!(
            recipients
                .iter()
                .filter(|id| id.as_str() == "participant_1")
                .count(),
            1
        );
    }

    #[tokio::test]
    async fn test_rating_upsert_shifts_buckets() {
        let registry = RoomRegistry::new();
        let (room_code, _) = registry.create("creator_1").await.unwrap();
        registry.join(&room_code, "participant_1").await.unwrap();

        let (room_stats, _) = registry
            .submit_rating(&room_code, "participant_1", 4.0)
            .await
            .unwrap();
        assert_eq!(room_stats.count, 1);
        assert_eq!(room_stats.avg, 4.0);
        assert_eq!(room_stats.distribution, [0, 0, 0, 1, 0]);

        // Same participant resubmits: old bucket -1, new bucket +1, count flat
        let (room_stats, _) = registry
            .submit_rating(&room_code, "participant_1", 2.0)
            .await
            .unwrap();
        assert_eq!(room_stats.count, 1);
        assert_eq!(room_stats.avg, 2.0);
        assert_eq!(room_stats.distribution, [0, 1, 0, 0, 0]);
    }

    #[tokio::test]
    async fn test_one_rating_per_connection() {
        let registry = RoomRegistry::new();
        let (room_code, _) = registry.create("creator_1").await.unwrap();
        registry.join(&room_code, "participant_1").await.unwrap();

        for _ in 0..5 {
            registry
                .submit_rating(&room_code, "participant_1", 5.0)
                .await
                .unwrap();
        }

        let (room_stats, _) = registry
            .submit_rating(&room_code, "participant_1", 5.0)
            .await
            .unwrap();
        assert_eq!(room_stats.count, 1);
    }

    #[tokio::test]
    async fn test_invalid_ratings_rejected() {
        let registry = RoomRegistry::new();
        let (room_code, _) = registry.create("creator_1").await.unwrap();
        registry.join(&room_code, "participant_1").await.unwrap();

        for bad in [0.0, 6.0, -1.0, 3.5, f64::NAN] {
            let result = registry.submit_rating(&room_code, "participant_1", bad).await;
            assert!(
                matches!(result, Err(RoomError::InvalidRating)),
                "value {} should be rejected",
                bad
            );
        }

        // Rejections leave no trace in the room
        let (room_stats, _) = registry
            .submit_rating(&room_code, "participant_2", 3.0)
            .await
            .unwrap();
        assert_eq!(room_stats.count, 1);
    }

    #[tokio::test]
    async fn test_clear_requires_creator() {
        let registry = RoomRegistry::new();
        let (room_code, _) = registry.create("creator_1").await.unwrap();
        registry.join(&room_code, "participant_1").await.unwrap();
        registry
            .submit_rating(&room_code, "participant_1", 5.0)
            .await
            .unwrap();

        let result = registry.clear(&room_code, "participant_1").await;
        assert!(matches!(result, Err(RoomError::Forbidden("clear"))));

        // Rejected clear changed nothing
        let (room_stats, _) = registry
            .submit_rating(&room_code, "participant_1", 5.0)
            .await
            .unwrap();
        assert_eq!(room_stats.count, 1);
        assert_eq!(room_stats.distribution, [0, 0, 0, 0, 1]);
    }

    #[tokio::test]
    async fn test_clear_wipes_ratings_keeps_members() {
        let registry = RoomRegistry::new();
        let (room_code, _) = registry.create("creator_1").await.unwrap();
        registry.join(&room_code, "participant_1").await.unwrap();
        registry
            .submit_rating(&room_code, "participant_1", 5.0)
            .await
            .unwrap();

        let (room_stats, recipients) = registry.clear(&room_code, "creator_1").await.unwrap();
        assert_eq!(room_stats, Stats::empty());
        assert!(recipients.contains(&"participant_1".to_string()));
        assert!(recipients.contains(&"creator_1".to_string()));
    }

    #[tokio::test]
    async fn test_end_requires_creator() {
        let registry = RoomRegistry::new();
        let (room_code, _) = registry.create("creator_1").await.unwrap();
        registry.join(&room_code, "participant_1").await.unwrap();

        let result = registry.end(&room_code, "participant_1").await;
        assert!(matches!(result, Err(RoomError::Forbidden("end"))));
        assert!(registry.room_exists(&room_code).await);
    }

    #[tokio::test]
    async fn test_end_removes_room() {
        let registry = RoomRegistry::new();
        let (room_code, _) = registry.create("creator_1").await.unwrap();
        registry.join(&room_code, "participant_1").await.unwrap();

        let recipients = registry.end(&room_code, "creator_1").await.unwrap();
        assert!(recipients.contains(&"participant_1".to_string()));

        assert!(!registry.room_exists(&room_code).await);
        let result = registry.join(&room_code, "participant_2").await;
        assert!(matches!(result, Err(RoomError::RoomNotFound)));
    }

    #[tokio::test]
    async fn test_creator_disconnect_closes_room() {
        let registry = RoomRegistry::new();
        let (room_code, _) = registry.create("creator_1").await.unwrap();
        registry.join(&room_code, "participant_1").await.unwrap();

        let events = registry.handle_disconnect("creator_1").await;
        assert_eq!(events.len(), 1);
        match &events[0] {
            DisconnectEvent::Ended { code, recipients } => {
                assert_eq!(code, &room_code);
                assert_eq!(recipients, &vec!["participant_1".to_string()]);
            }
            other => panic!("expected Ended, got {:?}", other),
        }

        assert!(!registry.room_exists(&room_code).await);
    }

    #[tokio::test]
    async fn test_voter_disconnect_drops_only_their_rating() {
        let registry = RoomRegistry::new();
        let (room_code, _) = registry.create("creator_1").await.unwrap();
        registry.join(&room_code, "participant_1").await.unwrap();
        registry.join(&room_code, "participant_2").await.unwrap();
        registry
            .submit_rating(&room_code, "participant_1", 4.0)
            .await
            .unwrap();
        registry
            .submit_rating(&room_code, "participant_2", 2.0)
            .await
            .unwrap();

        let events = registry.handle_disconnect("participant_1").await;
        assert_eq!(events.len(), 1);
        match &events[0] {
            DisconnectEvent::Update {
                code,
                stats: room_stats,
                recipients,
            } => {
                assert_eq!(code, &room_code);
                assert_eq!(room_stats.count, 1);
                assert_eq!(room_stats.distribution, [0, 1, 0, 0, 0]);
                assert!(!recipients.contains(&"participant_1".to_string()));
            }
            other => panic!("expected Update, got {:?}", other),
        }

        assert!(registry.room_exists(&room_code).await);
    }

    #[tokio::test]
    async fn test_disconnect_with_no_entries_is_noop() {
        let registry = RoomRegistry::new();
        let (room_code, _) = registry.create("creator_1").await.unwrap();

        let events = registry.handle_disconnect("stranger").await;
        assert!(events.is_empty());
        assert!(registry.room_exists(&room_code).await);
    }

    #[tokio::test]
    async fn test_full_session_lifecycle() {
        let registry = RoomRegistry::new();
        let (room_code, _) = registry.create("creator_1").await.unwrap();

        registry.join(&room_code, "participant_1").await.unwrap();

        let (room_stats, _) = registry
            .submit_rating(&room_code, "participant_1", 4.0)
            .await
            .unwrap();
        assert_eq!(
            room_stats,
            Stats {
                count: 1,
                avg: 4.0,
                distribution: [0, 0, 0, 1, 0]
            }
        );

        let (room_stats, _) = registry
            .submit_rating(&room_code, "participant_1", 2.0)
            .await
            .unwrap();
        assert_eq!(
            room_stats,
            Stats {
                count: 1,
                avg: 2.0,
                distribution: [0, 1, 0, 0, 0]
            }
        );

        let (room_stats, _) = registry.clear(&room_code, "creator_1").await.unwrap();
        assert_eq!(room_stats, Stats::empty());

        let recipients = registry.end(&room_code, "creator_1").await.unwrap();
        assert!(recipients.contains(&"participant_1".to_string()));
        assert!(matches!(
            registry.join(&room_code, "participant_1").await,
            Err(RoomError::RoomNotFound)
        ));
    }
}
