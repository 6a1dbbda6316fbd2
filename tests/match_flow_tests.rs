//! End-to-end match scenarios driven through the dispatcher: wins, the
//! visible-piece rule, forfeits, timeout cascades, and replay votes.


use std::collections::HashMap;
use std::sync::Arc;

use mortpion_server::config::GameConfig;
use mortpion_server::protocol::{
    ClientMessage, GameStatus, PieceSize, PlayerId, RoomId, ServerMessage, SkipReason,
};
use mortpion_server::server::{ConnectionId, GameServer};
use test_helpers::{
    connect, create_room, create_test_server_with, join_room, quiet_game_config, wait_for, Rx,
};

struct Table {
    server: Arc<GameServer>,
    room_id: RoomId,
    /// Seat ids in join order.
    seats: Vec<PlayerId>,
    conns: HashMap<PlayerId, ConnectionId>,
    rxs: HashMap<PlayerId, Rx>,
    starter: PlayerId,
}

impl Table {
    /// Create a room of `n` players, join everyone, and consume the
    /// `game-started` broadcast.
    async fn start(n: u8, game: GameConfig) -> Table {
        let server = create_test_server_with(game);
        let (host_conn, mut host_rx) = connect(&server);
        let (room_id, host_id) = create_room(&server, host_conn, &mut host_rx, n).await;

        let mut seats = vec![host_id];
        let mut conns = HashMap::from([(host_id, host_conn)]);
        let mut rxs = HashMap::new();

        for i in 1..n {
            let (conn, mut rx) = connect(&server);
            let seat = join_room(&server, conn, &mut rx, room_id, &format!("Player{i}")).await;
            seats.push(seat);
            conns.insert(seat, conn);
            rxs.insert(seat, rx);
        }

        let msg = wait_for(&mut host_rx, |m| {
            matches!(m, ServerMessage::GameStarted { .. })
        })
        .await;
        let ServerMessage::GameStarted { game_state } = msg.as_ref() else {
            unreachable!()
        };
        let starter = game_state.current_player_id.expect("match has a starter");
        rxs.insert(host_id, host_rx);

        Table {
            server,
            room_id,
            seats,
            conns,
            rxs,
            starter,
        }
    }

    /// The non-starter seats, in join order.
    fn others(&self) -> Vec<PlayerId> {
        self.seats
            .iter()
            .copied()
            .filter(|&s| s != self.starter)
            .collect()
    }

    async fn make_move(&self, seat: PlayerId, cell: usize, size: PieceSize) {
        self.server
            .handle_client_message(
                self.conns[&seat],
                ClientMessage::MakeMove {
                    room_id: self.room_id,
                    cell_index: cell,
                    size,
                },
            )
            .await;
    }

    async fn cast_vote(&self, seat: PlayerId, vote: bool) {
        self.server
            .handle_client_message(
                self.conns[&seat],
                ClientMessage::CastReplayVote {
                    room_id: self.room_id,
                    vote,
                },
            )
            .await;
    }

    fn rx(&mut self, seat: PlayerId) -> &mut Rx {
        self.rxs.get_mut(&seat).expect("receiver for seat")
    }

    /// Starter wins with smalls on 0,1,2 while the opponent answers 3,4.
    async fn play_starter_row_win(&self) {
        let starter = self.starter;
        let other = self.others()[0];
        let s = PieceSize::Small;
        self.make_move(starter, 0, s).await;
        self.make_move(other, 3, s).await;
        self.make_move(starter, 1, s).await;
        self.make_move(other, 4, s).await;
        self.make_move(starter, 2, s).await;
    }
}

// S1: five alternating smalls give the starter a same-color top row.
#[tokio::test]
async fn same_color_row_ends_the_game_for_the_starter() {
    let mut table = Table::start(2, quiet_game_config()).await;
    let starter = table.starter;
    let other = table.others()[0];
    table.play_starter_row_win().await;

    for seat in [starter, other] {
        let msg = wait_for(table.rx(seat), |m| matches!(m, ServerMessage::GameEnded { .. })).await;
        let ServerMessage::GameEnded {
            winner_id,
            is_draw,
            game_state,
        } = msg.as_ref()
        else {
            unreachable!()
        };
        assert_eq!(*winner_id, Some(starter));
        assert!(!is_draw);
        assert_eq!(game_state.status, GameStatus::Finished);
        assert!(game_state.finished_at.is_some());
        // Terminal: no seat holds the turn and the timer is silent.
        assert_eq!(game_state.current_player_id, None);
    }
}

// S2: a stack of mixed sizes only counts through its visible piece, so
// nested alignments do not win on their own.
#[tokio::test]
async fn buried_pieces_do_not_win() {
    let mut table = Table::start(2, quiet_game_config()).await;
    let a = table.starter;
    let b = table.others()[0];

    // A P->0, B M->0, A M->1, B G->2, A G->0.
    table.make_move(a, 0, PieceSize::Small).await;
    table.make_move(b, 0, PieceSize::Medium).await;
    table.make_move(a, 1, PieceSize::Medium).await;
    table.make_move(b, 2, PieceSize::Large).await;
    table.make_move(a, 0, PieceSize::Large).await;

    // Five applied moves, five game-updated broadcasts; take the last.
    let mut last = None;
    for _ in 0..5 {
        let msg = wait_for(table.rx(a), |m| matches!(m, ServerMessage::GameUpdated { .. })).await;
        last = Some(msg);
    }
    let msg = last.unwrap();
    let ServerMessage::GameUpdated { game_state } = msg.as_ref() else {
        unreachable!()
    };

    // Row 0-1-2 shows A, A, B: the match keeps going.
    assert_eq!(game_state.status, GameStatus::Playing);
    assert_eq!(game_state.winner_id, None);
    let color_of = |seat: PlayerId| {
        game_state
            .players
            .iter()
            .find(|p| p.id == seat)
            .unwrap()
            .color
    };
    let board = &game_state.board;
    assert_eq!(board[0].small, Some(color_of(a)));
    assert_eq!(board[0].medium, Some(color_of(b)));
    assert_eq!(board[0].large, Some(color_of(a)));
    assert_eq!(board[1].medium, Some(color_of(a)));
    assert_eq!(board[2].large, Some(color_of(b)));
    assert_eq!(game_state.current_player_id, Some(b));
}

// S3: an explicit leave mid-match forfeits to the last uneliminated seat.
#[tokio::test]
async fn explicit_leave_forfeits_the_match() {
    let mut table = Table::start(2, quiet_game_config()).await;
    let starter = table.starter;
    let other = table.others()[0];

    table
        .server
        .handle_client_message(table.conns[&other], ClientMessage::LeaveRoom)
        .await;

    let msg = wait_for(table.rx(starter), |m| matches!(m, ServerMessage::GameEnded { .. })).await;
    let ServerMessage::GameEnded {
        winner_id,
        is_draw,
        game_state,
    } = msg.as_ref()
    else {
        unreachable!()
    };
    assert_eq!(*winner_id, Some(starter));
    assert!(!is_draw);
    let leaver = game_state.players.iter().find(|p| p.id == other).unwrap();
    assert!(leaver.is_eliminated);
}

// S4: timeouts skip, the second consecutive skip eliminates, and the match
// continues for the remaining seats.
#[tokio::test(flavor = "multi_thread")]
async fn timeouts_skip_then_eliminate_while_others_keep_playing() {
    let game = GameConfig {
        turn_timeout_ms: 150,
        ..quiet_game_config()
    };
    let mut table = Table::start(3, game).await;
    let idle = table.starter;

    // First timeout: the idle starter is skipped, not eliminated.
    let msg = wait_for(table.rx(idle), |m| matches!(m, ServerMessage::TurnSkipped { .. })).await;
    let ServerMessage::TurnSkipped {
        skipped_player_id,
        reason,
        game_state,
    } = msg.as_ref()
    else {
        unreachable!()
    };
    assert_eq!(*skipped_player_id, idle);
    assert_eq!(*reason, SkipReason::Timeout);
    let first_mover = game_state.current_player_id.expect("turn moved on");
    assert_ne!(first_mover, idle);

    // The two live seats each make one quick move.
    table.make_move(first_mover, 0, PieceSize::Small).await;
    let msg = wait_for(table.rx(idle), |m| matches!(m, ServerMessage::GameUpdated { .. })).await;
    let ServerMessage::GameUpdated { game_state } = msg.as_ref() else {
        unreachable!()
    };
    let second_mover = game_state.current_player_id.expect("turn moved on");
    assert_ne!(second_mover, idle);
    table.make_move(second_mover, 3, PieceSize::Small).await;

    // Back on the idle seat: the second timeout eliminates it.
    let msg = wait_for(table.rx(first_mover), |m| {
        matches!(m, ServerMessage::PlayerEliminated { .. })
    })
    .await;
    let ServerMessage::PlayerEliminated { player_id } = msg.as_ref() else {
        unreachable!()
    };
    assert_eq!(*player_id, idle);

    // Two seats remain; the match is still live.
    let room = table.server.registry().get(table.room_id).unwrap();
    let view = room.snapshot().await;
    assert_eq!(view.game.status, GameStatus::Playing);
    let idle_seat = view.game.players.iter().find(|p| p.id == idle).unwrap();
    assert!(idle_seat.is_eliminated);
    assert_eq!(idle_seat.skips_in_a_row, 2);
}

// S5: a unanimous replay vote restarts the match with the same seats.
#[tokio::test]
async fn unanimous_replay_restarts_the_table() {
    let mut table = Table::start(2, quiet_game_config()).await;
    let starter = table.starter;
    let other = table.others()[0];
    table.play_starter_row_win().await;

    let msg = wait_for(table.rx(other), |m| {
        matches!(m, ServerMessage::ReplayVotingStarted { .. })
    })
    .await;
    let ServerMessage::ReplayVotingStarted {
        replay_deadline,
        replay_votes,
    } = msg.as_ref()
    else {
        unreachable!()
    };
    assert!(*replay_deadline > chrono::Utc::now().timestamp_millis());
    assert_eq!(replay_votes.len(), 2);

    table.cast_vote(starter, true).await;
    wait_for(table.rx(other), |m| {
        matches!(m, ServerMessage::ReplayVoteUpdated { .. })
    })
    .await;
    table.cast_vote(other, true).await;

    for seat in [starter, other] {
        let msg = wait_for(table.rx(seat), |m| {
            matches!(m, ServerMessage::GameRestarted { .. })
        })
        .await;
        let ServerMessage::GameRestarted { game_state } = msg.as_ref() else {
            unreachable!()
        };
        assert_eq!(game_state.status, GameStatus::Playing);
        assert!(game_state.players.iter().all(|p| {
            p.inventory == mortpion_server::protocol::PieceInventory::full()
                && !p.is_eliminated
                && p.skips_in_a_row == 0
        }));
        assert!(game_state.board.iter().all(|cell| {
            cell.small.is_none() && cell.medium.is_none() && cell.large.is_none()
        }));
    }
}

// S6: one "no" rejects the replay as soon as every ballot is in.
#[tokio::test]
async fn replay_rejection_closes_the_room() {
    let mut table = Table::start(2, quiet_game_config()).await;
    let starter = table.starter;
    let other = table.others()[0];
    table.play_starter_row_win().await;
    wait_for(table.rx(other), |m| {
        matches!(m, ServerMessage::ReplayVotingStarted { .. })
    })
    .await;

    table.cast_vote(starter, false).await;
    table.cast_vote(other, true).await;

    wait_for(table.rx(other), |m| matches!(m, ServerMessage::ReplayRejected)).await;

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert!(table.server.registry().get(table.room_id).is_none());
}

// Replay votes that never complete expire and close the room.
#[tokio::test]
async fn replay_vote_expiry_closes_the_room() {
    let game = GameConfig {
        replay_vote_window_ms: 60,
        ..quiet_game_config()
    };
    let mut table = Table::start(2, game).await;
    let other = table.others()[0];
    table.play_starter_row_win().await;
    wait_for(table.rx(other), |m| {
        matches!(m, ServerMessage::ReplayVotingStarted { .. })
    })
    .await;

    wait_for(table.rx(other), |m| matches!(m, ServerMessage::ReplayTimeout)).await;
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert!(table.server.registry().get(table.room_id).is_none());
}
