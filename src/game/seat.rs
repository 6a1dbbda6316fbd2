use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::protocol::{GameError, PieceInventory, PieceSize, PlayerColor, PlayerId, PlayerView};

/// One seat in a room. The id is minted here and stays stable for the seat's
/// lifetime within that room; all mutation happens under the owning room's
/// lock.
#[derive(Debug, Clone)]
pub struct Seat {
    pub id: PlayerId,
    pub nickname: String,
    pub color: PlayerColor,
    pub inventory: PieceInventory,
    pub connected: bool,
    pub skips_in_a_row: u32,
    pub is_eliminated: bool,
    pub is_host: bool,
    pub joined_at: DateTime<Utc>,
    /// Set while the seat's transport is down; gates the reconnect grace
    /// window.
    pub disconnected_at: Option<DateTime<Utc>>,
}

impl Seat {
    pub fn new(nickname: String, color: PlayerColor, is_host: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            nickname,
            color,
            inventory: PieceInventory::full(),
            connected: true,
            skips_in_a_row: 0,
            is_eliminated: false,
            is_host,
            joined_at: Utc::now(),
            disconnected_at: None,
        }
    }

    /// A seat takes turns only while it is neither eliminated nor
    /// disconnected.
    pub fn is_active(&self) -> bool {
        !self.is_eliminated && self.connected
    }

    pub fn use_piece(&mut self, size: PieceSize) -> Result<(), GameError> {
        if self.inventory.take(size) {
            Ok(())
        } else {
            Err(GameError::OutOfPieces(size))
        }
    }

    /// Record one skipped turn. Eliminates the seat when the streak reaches
    /// `limit`; returns `true` exactly when this call caused the
    /// elimination.
    pub fn register_skip(&mut self, limit: u32) -> bool {
        self.skips_in_a_row += 1;
        if !self.is_eliminated && self.skips_in_a_row >= limit {
            self.is_eliminated = true;
            return true;
        }
        false
    }

    pub fn reset_skips(&mut self) {
        self.skips_in_a_row = 0;
    }

    pub fn eliminate(&mut self) {
        self.is_eliminated = true;
    }

    pub fn set_connected(&mut self, connected: bool) {
        self.connected = connected;
        self.disconnected_at = if connected { None } else { Some(Utc::now()) };
    }

    pub fn set_host(&mut self, is_host: bool) {
        self.is_host = is_host;
    }

    /// Fresh inventory and a clean slate for a new match (initial start or
    /// accepted replay). Identity, nickname, color, and connection state
    /// survive.
    pub fn reset_for_match(&mut self) {
        self.inventory = PieceInventory::full();
        self.skips_in_a_row = 0;
        self.is_eliminated = false;
    }

    pub fn view(&self) -> PlayerView {
        PlayerView {
            id: self.id,
            nickname: self.nickname.clone(),
            color: self.color,
            inventory: self.inventory,
            connected: self.connected,
            is_host: self.is_host,
            is_eliminated: self.is_eliminated,
            skips_in_a_row: self.skips_in_a_row,
        }
    }
}
