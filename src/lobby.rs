//! Process-wide room catalog: creation (with host uniqueness), lookup,
//! filtered listings, and the expiry sweep. The registry is the only shared
//! mutable structure in the process; everything per-room lives behind each
//! room's own lock.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::config::GameConfig;
use crate::metrics::ServerMetrics;
use crate::protocol::validation::{
    validate_access_code, validate_capacity, validate_nickname, validate_room_name,
};
use crate::protocol::{GameError, GameStatus, PlayerId, RoomId, RoomSummary};
use crate::room::{ClientSender, ListingSnapshot, Room, RoomOptions};

/// Filter predicates for room listings.
#[derive(Debug, Default, Clone)]
pub struct RoomFilter {
    pub is_private: Option<bool>,
    pub status: Option<GameStatus>,
    /// Only rooms that can seat another player.
    pub has_space: Option<bool>,
    /// Case-insensitive substring match on the room name.
    pub name_contains: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RoomSortKey {
    Name,
    #[default]
    Created,
    /// Match start when one ran, creation time otherwise.
    Activity,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

/// Pagination window; `limit` defaults to [`DEFAULT_PAGE_LIMIT`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RoomPage {
    pub offset: usize,
    pub limit: Option<usize>,
}

pub const DEFAULT_PAGE_LIMIT: usize = 20;

#[derive(Debug, Clone)]
pub struct RoomListing {
    pub items: Vec<RoomSummary>,
    pub total: usize,
    pub has_more: bool,
}

/// Validated-on-entry creation request. `host_key` is the creator's
/// connection identity: one live room per creator.
#[derive(Debug, Clone)]
pub struct CreateRoomRequest {
    pub host_key: Uuid,
    pub name: Option<String>,
    pub capacity: u8,
    pub is_private: bool,
    pub code: Option<String>,
    pub host_nickname: String,
}

pub struct LobbyRegistry {
    rooms: DashMap<RoomId, Arc<Room>>,
    /// Creator connection -> their live room.
    host_index: DashMap<Uuid, RoomId>,
    rules: GameConfig,
    metrics: Arc<ServerMetrics>,
    /// Handed to every room so self-closures come back to the purge task.
    closed_tx: mpsc::UnboundedSender<RoomId>,
}

impl LobbyRegistry {
    pub fn new(rules: GameConfig, metrics: Arc<ServerMetrics>) -> Arc<Self> {
        let (closed_tx, mut closed_rx) = mpsc::unbounded_channel();
        let registry = Arc::new(Self {
            rooms: DashMap::new(),
            host_index: DashMap::new(),
            rules,
            metrics,
            closed_tx,
        });

        // Purge rooms that close themselves (vote rejection/expiry, last
        // seat gone) without waiting for the next sweep.
        let purge = Arc::downgrade(&registry);
        tokio::spawn(async move {
            while let Some(room_id) = closed_rx.recv().await {
                let Some(registry) = purge.upgrade() else {
                    break;
                };
                registry.remove(room_id);
            }
        });

        registry
    }

    /// Validate, enforce host uniqueness, create the room, and seat the
    /// host. The host's welcome message lands on `host_sender`.
    pub fn create(
        &self,
        request: CreateRoomRequest,
        host_sender: ClientSender,
    ) -> Result<(Arc<Room>, PlayerId), GameError> {
        let host_nickname = validate_nickname(&request.host_nickname)?;
        let name = match request.name.as_deref() {
            Some(raw) => validate_room_name(raw)?,
            None => format!("{host_nickname}'s room"),
        };
        let capacity = validate_capacity(request.capacity)?;
        let code = match (request.is_private, request.code.as_deref()) {
            (true, Some(raw)) => Some(validate_access_code(raw)?),
            (true, None) => {
                return Err(GameError::InvalidInput(
                    "private rooms require an access code".into(),
                ))
            }
            (false, _) => None,
        };

        match self.host_index.entry(request.host_key) {
            dashmap::mapref::entry::Entry::Occupied(mut occupied) => {
                if self.rooms.contains_key(occupied.get()) {
                    return Err(GameError::HostBusy);
                }
                // Stale entry from a room that was already purged.
                let (room, host_id) =
                    self.open_room(name, capacity, request.is_private, code, host_nickname, host_sender);
                occupied.insert(room.id);
                Ok((room, host_id))
            }
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                let (room, host_id) =
                    self.open_room(name, capacity, request.is_private, code, host_nickname, host_sender);
                vacant.insert(room.id);
                Ok((room, host_id))
            }
        }
    }

    fn open_room(
        &self,
        name: String,
        capacity: u8,
        is_private: bool,
        code: Option<String>,
        host_nickname: String,
        host_sender: ClientSender,
    ) -> (Arc<Room>, PlayerId) {
        let (room, host_id) = Room::open(
            RoomOptions {
                name,
                capacity,
                is_private,
                code,
                host_nickname,
            },
            host_sender,
            self.rules,
            Arc::clone(&self.metrics),
            self.closed_tx.clone(),
        );
        self.rooms.insert(room.id, Arc::clone(&room));
        (room, host_id)
    }

    pub fn get(&self, room_id: RoomId) -> Option<Arc<Room>> {
        self.rooms.get(&room_id).map(|r| Arc::clone(r.value()))
    }

    /// Drop a room and every host-index entry pointing at it.
    pub fn remove(&self, room_id: RoomId) {
        if self.rooms.remove(&room_id).is_some() {
            tracing::debug!(%room_id, "Room purged from lobby");
        }
        self.host_index.retain(|_, id| *id != room_id);
    }

    /// Forget a creator's claim (called when their connection unbinds).
    pub fn release_host(&self, host_key: Uuid) {
        self.host_index.remove(&host_key);
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Filtered, sorted, paginated listing. Expired and closed rooms are
    /// dropped eagerly and never appear.
    pub async fn list(
        &self,
        filter: &RoomFilter,
        sort: RoomSortKey,
        order: SortOrder,
        page: RoomPage,
    ) -> RoomListing {
        let rooms: Vec<Arc<Room>> = self
            .rooms
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();

        let mut entries: Vec<ListingSnapshot> = Vec::with_capacity(rooms.len());
        for room in rooms {
            if let Some(snapshot) = room.listing_snapshot().await {
                entries.push(snapshot);
            }
        }

        entries.retain(|e| {
            if let Some(private) = filter.is_private {
                if e.summary.is_private != private {
                    return false;
                }
            }
            if let Some(status) = filter.status {
                if e.summary.status != status {
                    return false;
                }
            }
            if let Some(has_space) = filter.has_space {
                let space = e.summary.player_count < e.summary.capacity as usize;
                if space != has_space {
                    return false;
                }
            }
            if let Some(needle) = &filter.name_contains {
                if !e
                    .summary
                    .name
                    .to_lowercase()
                    .contains(&needle.to_lowercase())
                {
                    return false;
                }
            }
            true
        });

        match sort {
            RoomSortKey::Name => {
                entries.sort_by(|a, b| {
                    a.summary
                        .name
                        .to_lowercase()
                        .cmp(&b.summary.name.to_lowercase())
                });
            }
            RoomSortKey::Created => entries.sort_by_key(|e| e.created_at),
            RoomSortKey::Activity => entries.sort_by_key(|e| e.activity_at),
        }
        if order == SortOrder::Descending {
            entries.reverse();
        }

        let total = entries.len();
        let limit = page.limit.unwrap_or(DEFAULT_PAGE_LIMIT);
        let items: Vec<RoomSummary> = entries
            .into_iter()
            .skip(page.offset)
            .take(limit)
            .map(|e| e.summary)
            .collect();
        let has_more = page.offset + items.len() < total;

        RoomListing {
            items,
            total,
            has_more,
        }
    }

    /// Joinable rooms for the HTTP side-channel: waiting, not full, not
    /// expired.
    pub async fn joinable(&self) -> Vec<RoomSummary> {
        self.list(
            &RoomFilter {
                status: Some(GameStatus::Waiting),
                has_space: Some(true),
                ..RoomFilter::default()
            },
            RoomSortKey::Created,
            SortOrder::Ascending,
            RoomPage {
                offset: 0,
                limit: Some(usize::MAX),
            },
        )
        .await
        .items
    }

    /// Evict every expired or self-closed room. Returns how many went.
    pub async fn sweep(&self) -> usize {
        let rooms: Vec<Arc<Room>> = self
            .rooms
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();

        let mut evicted = 0;
        for room in rooms {
            if room.should_evict().await {
                room.shut_down("ttl expired").await;
                self.remove(room.id);
                self.metrics.increment_rooms_expired();
                evicted += 1;
            }
        }
        if evicted > 0 {
            tracing::info!(evicted, "Swept expired rooms");
        }
        evicted
    }

    /// Background sweep at the configured interval.
    pub fn spawn_sweeper(self: &Arc<Self>) {
        let registry = Arc::downgrade(self);
        let interval = self.rules.cleanup_sweep();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let Some(registry) = registry.upgrade() else {
                    break;
                };
                registry.sweep().await;
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::room::LeaveMode;
    use std::time::Duration;

    fn sender() -> ClientSender {
        ClientSender::new(
            mpsc::channel(64).0,
            tokio_util::sync::CancellationToken::new(),
        )
    }

    fn request(host_key: Uuid, name: &str) -> CreateRoomRequest {
        CreateRoomRequest {
            host_key,
            name: Some(name.into()),
            capacity: 3,
            is_private: false,
            code: None,
            host_nickname: "Host".into(),
        }
    }

    fn registry_with(rules: GameConfig) -> Arc<LobbyRegistry> {
        LobbyRegistry::new(rules, Arc::new(ServerMetrics::new()))
    }

    fn registry() -> Arc<LobbyRegistry> {
        registry_with(GameConfig {
            timer_tick_ms: 3_600_000,
            ..GameConfig::default()
        })
    }

    #[tokio::test]
    async fn create_validates_and_stores_the_room() {
        let lobby = registry();
        let (room, host_id) = lobby
            .create(request(Uuid::new_v4(), "Alpha"), sender())
            .unwrap();
        assert_eq!(lobby.room_count(), 1);
        assert!(lobby.get(room.id).is_some());
        assert!(room.contains_seat(host_id).await);

        let bad = CreateRoomRequest {
            capacity: 7,
            ..request(Uuid::new_v4(), "Beta")
        };
        assert!(matches!(
            lobby.create(bad, sender()),
            Err(GameError::InvalidInput(_))
        ));

        let private_without_code = CreateRoomRequest {
            is_private: true,
            code: None,
            ..request(Uuid::new_v4(), "Gamma")
        };
        assert!(matches!(
            lobby.create(private_without_code, sender()),
            Err(GameError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn a_host_may_only_run_one_live_room() {
        let lobby = registry();
        let host_key = Uuid::new_v4();
        let (room, _) = lobby.create(request(host_key, "First"), sender()).unwrap();

        assert_eq!(
            lobby
                .create(request(host_key, "Second"), sender())
                .map(|_| ()),
            Err(GameError::HostBusy)
        );

        // Once the first room is gone the same host may create again.
        lobby.remove(room.id);
        assert!(lobby.create(request(host_key, "Second"), sender()).is_ok());
    }

    #[tokio::test]
    async fn release_host_frees_the_claim_without_touching_the_room() {
        let lobby = registry();
        let host_key = Uuid::new_v4();
        let (room, _) = lobby.create(request(host_key, "First"), sender()).unwrap();
        lobby.release_host(host_key);
        assert!(lobby.get(room.id).is_some());
        assert!(lobby.create(request(host_key, "Second"), sender()).is_ok());
    }

    #[tokio::test]
    async fn self_closed_rooms_are_purged() {
        let lobby = registry();
        let (room, host_id) = lobby
            .create(request(Uuid::new_v4(), "Empties"), sender())
            .unwrap();
        // Last seat leaves; the room closes itself and reports back.
        room.leave(host_id, LeaveMode::Explicit).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(lobby.get(room.id).is_none());
        assert_eq!(lobby.room_count(), 0);
    }

    #[tokio::test]
    async fn listings_filter_sort_and_paginate() {
        let lobby = registry();
        lobby
            .create(request(Uuid::new_v4(), "Bravo lounge"), sender())
            .unwrap();
        lobby
            .create(request(Uuid::new_v4(), "alpha den"), sender())
            .unwrap();
        lobby
            .create(
                CreateRoomRequest {
                    is_private: true,
                    code: Some("sesame99".into()),
                    ..request(Uuid::new_v4(), "Charlie hideout")
                },
                sender(),
            )
            .unwrap();

        let all = lobby
            .list(
                &RoomFilter::default(),
                RoomSortKey::Name,
                SortOrder::Ascending,
                RoomPage::default(),
            )
            .await;
        assert_eq!(all.total, 3);
        let names: Vec<_> = all.items.iter().map(|r| r.name.clone()).collect();
        assert_eq!(names, vec!["alpha den", "Bravo lounge", "Charlie hideout"]);

        let public_only = lobby
            .list(
                &RoomFilter {
                    is_private: Some(false),
                    ..RoomFilter::default()
                },
                RoomSortKey::Name,
                SortOrder::Descending,
                RoomPage::default(),
            )
            .await;
        assert_eq!(public_only.total, 2);
        assert_eq!(public_only.items[0].name, "Bravo lounge");

        let by_substring = lobby
            .list(
                &RoomFilter {
                    name_contains: Some("ALPHA".into()),
                    ..RoomFilter::default()
                },
                RoomSortKey::Created,
                SortOrder::Ascending,
                RoomPage::default(),
            )
            .await;
        assert_eq!(by_substring.total, 1);
        assert_eq!(by_substring.items[0].name, "alpha den");

        let page = lobby
            .list(
                &RoomFilter::default(),
                RoomSortKey::Name,
                SortOrder::Ascending,
                RoomPage {
                    offset: 0,
                    limit: Some(2),
                },
            )
            .await;
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.total, 3);
        assert!(page.has_more);

        let rest = lobby
            .list(
                &RoomFilter::default(),
                RoomSortKey::Name,
                SortOrder::Ascending,
                RoomPage {
                    offset: 2,
                    limit: Some(2),
                },
            )
            .await;
        assert_eq!(rest.items.len(), 1);
        assert!(!rest.has_more);
    }

    #[tokio::test]
    async fn expired_rooms_disappear_from_listings_and_get_swept() {
        let lobby = registry_with(GameConfig {
            room_ttl_ms: 20,
            timer_tick_ms: 3_600_000,
            ..GameConfig::default()
        });
        let (room, _) = lobby
            .create(request(Uuid::new_v4(), "Mayfly"), sender())
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let listing = lobby
            .list(
                &RoomFilter::default(),
                RoomSortKey::Created,
                SortOrder::Ascending,
                RoomPage::default(),
            )
            .await;
        assert_eq!(listing.total, 0, "expired rooms are filtered eagerly");

        assert_eq!(lobby.sweep().await, 1);
        assert!(lobby.get(room.id).is_none());

        // Joining an expired-but-not-yet-swept room is impossible anyway.
        let (room2, _) = lobby
            .create(request(Uuid::new_v4(), "Mayfly II"), sender())
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(
            room2.join("Late".into(), None, sender()).await,
            Err(GameError::RoomExpired)
        );
    }

    #[tokio::test]
    async fn joinable_returns_only_waiting_rooms_with_space() {
        let lobby = registry();
        let (full_room, _) = lobby
            .create(
                CreateRoomRequest {
                    capacity: 2,
                    ..request(Uuid::new_v4(), "Fills up")
                },
                sender(),
            )
            .unwrap();
        lobby
            .create(request(Uuid::new_v4(), "Stays open"), sender())
            .unwrap();

        // Fill the first room; it starts playing and leaves the listing.
        full_room
            .join("Second".into(), None, sender())
            .await
            .unwrap();

        let joinable = lobby.joinable().await;
        assert_eq!(joinable.len(), 1);
        assert_eq!(joinable[0].name, "Stays open");
        assert_eq!(joinable[0].status, GameStatus::Waiting);
    }
}
