//! Final standings and leaderboard period windows.

use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};
use game_types::{
    GameSession, GameSessionPlayer, GameState, LeaderboardPeriod, PlayerState, RoomId,
    ScoreMetrics, SessionData, SessionId,
};

/// Orders players for the final standings: higher score first, then fewer
/// errors, then earlier completion. Players who never finished sort after
/// everyone who did.
fn standings_key(p: &PlayerState) -> (i64, u32, u64) {
    (-p.score, p.errors, p.finished_at_ms.unwrap_or(u64::MAX))
}

/// Produces the ranked player list for a finished game. Ranks are dense
/// and unique (1..N); exact ties on all three criteria keep a stable
/// order but still receive distinct ranks.
pub fn rank_players(state: &GameState) -> Vec<GameSessionPlayer> {
    let mut players: Vec<&PlayerState> = state.players.values().collect();
    players.sort_by(|a, b| {
        standings_key(a)
            .cmp(&standings_key(b))
            .then_with(|| a.player_id.cmp(&b.player_id))
    });

    players
        .into_iter()
        .enumerate()
        .map(|(i, p)| GameSessionPlayer {
            player_id: p.player_id,
            player_type: p.player_type,
            display_name: p.display_name.clone(),
            score: p.score,
            rank: i as u32 + 1,
            metrics: ScoreMetrics {
                wpm: p.wpm,
                accuracy: p.accuracy,
                level: Some(p.level),
                time_ms: p.finished_at_ms,
            },
            completed_at: p
                .finished_at_ms
                .map(|ms| millis_to_rfc3339(state.started_at_ms + ms)),
            disconnected_at: p.disconnected_at.clone(),
        })
        .collect()
}

/// Assembles the immutable session record for a terminated game.
pub fn build_session(state: &GameState, room_id: RoomId, ended_at: DateTime<Utc>) -> GameSession {
    let players = rank_players(state);

    // The winner is only declared on a strict top score.
    let winner = match players.as_slice() {
        [] => None,
        [only] => Some(only.player_id),
        [first, second, ..] if first.score > second.score => Some(first.player_id),
        _ => None,
    };

    let count = state.players.len().max(1) as f64;
    let average_wpm = state.players.values().map(|p| p.wpm).sum::<f64>() / count;
    let total_keystrokes = state.players.values().map(|p| p.keystrokes as u64).sum();

    GameSession {
        id: SessionId::new_v4(),
        room_id,
        game_type: state.game_type,
        players,
        winner,
        data: SessionData {
            seed: state.settings.seed,
            duration_ms: state.elapsed_ms,
            average_wpm,
            total_keystrokes,
        },
        started_at: state.started_at.clone(),
        ended_at: ended_at.to_rfc3339(),
    }
}

fn millis_to_rfc3339(ms: u64) -> String {
    Utc.timestamp_millis_opt(ms as i64)
        .single()
        .unwrap_or_else(Utc::now)
        .to_rfc3339()
}

/// UTC window containing `at` for the given period. All-time has no end;
/// weekly windows start on Monday.
pub fn period_bounds(
    period: LeaderboardPeriod,
    at: DateTime<Utc>,
) -> (DateTime<Utc>, Option<DateTime<Utc>>) {
    let midnight = at
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .map(|naive| Utc.from_utc_datetime(&naive))
        .unwrap_or(at);

    match period {
        LeaderboardPeriod::AllTime => (Utc.timestamp_opt(0, 0).single().unwrap_or(at), None),
        LeaderboardPeriod::Daily => (midnight, Some(midnight + Duration::days(1))),
        LeaderboardPeriod::Weekly => {
            let start = midnight
                - Duration::days(at.date_naive().weekday().num_days_from_monday() as i64);
            (start, Some(start + Duration::days(7)))
        }
        LeaderboardPeriod::Monthly => {
            let start = midnight - Duration::days(at.day0() as i64);
            let end = if at.month() == 12 {
                Utc.with_ymd_and_hms(at.year() + 1, 1, 1, 0, 0, 0)
            } else {
                Utc.with_ymd_and_hms(at.year(), at.month() + 1, 1, 0, 0, 0)
            };
            (start, end.single())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use game_types::{
        GameSettings, GameSpecificState, GameStatus, GameType, PlayerGameData, PlayerId,
        PlayerType,
    };
    use std::collections::HashMap;

    fn player(score: i64, errors: u32, finished_at_ms: Option<u64>) -> PlayerState {
        PlayerState {
            player_id: PlayerId::new_v4(),
            player_type: PlayerType::Guest,
            display_name: "p".to_string(),
            score,
            level: 1,
            lives: None,
            keystrokes: 100,
            correct_keystrokes: 90,
            errors,
            wpm: 40.0,
            accuracy: 90.0,
            is_finished: finished_at_ms.is_some(),
            is_connected: true,
            finished_at_ms,
            disconnected_at: None,
            game_data: PlayerGameData::SpeedRace { position: 0 },
        }
    }

    fn state_with(players: Vec<PlayerState>) -> GameState {
        let map: HashMap<PlayerId, PlayerState> =
            players.into_iter().map(|p| (p.player_id, p)).collect();
        GameState {
            room_id: RoomId::new_v4(),
            game_type: GameType::SpeedRace,
            status: GameStatus::Finished,
            started_at: Utc::now().to_rfc3339(),
            started_at_ms: 0,
            elapsed_ms: 60_000,
            settings: GameSettings::with_seed(7),
            players: map,
            game_specific: GameSpecificState::SpeedRace {
                passage: "abc".to_string(),
            },
        }
    }

    #[test]
    fn test_ranks_are_dense_and_unique() {
        let state = state_with(vec![
            player(300, 2, Some(50_000)),
            player(300, 2, Some(50_000)),
            player(100, 0, None),
        ]);
        let ranked = rank_players(&state);
        let ranks: Vec<u32> = ranked.iter().map(|p| p.rank).collect();
        assert_eq!(ranks, vec![1, 2, 3]);
    }

    #[test]
    fn test_fewer_errors_break_score_ties() {
        let low_err = player(200, 1, Some(40_000));
        let high_err = player(200, 5, Some(30_000));
        let state = state_with(vec![high_err.clone(), low_err.clone()]);
        let ranked = rank_players(&state);
        assert_eq!(ranked[0].player_id, low_err.player_id);
        assert_eq!(ranked[1].player_id, high_err.player_id);
    }

    #[test]
    fn test_earlier_finish_breaks_full_ties() {
        let early = player(200, 1, Some(30_000));
        let late = player(200, 1, Some(40_000));
        let unfinished = player(200, 1, None);
        let state = state_with(vec![late.clone(), unfinished.clone(), early.clone()]);
        let ranked = rank_players(&state);
        assert_eq!(ranked[0].player_id, early.player_id);
        assert_eq!(ranked[1].player_id, late.player_id);
        assert_eq!(ranked[2].player_id, unfinished.player_id);
    }

    #[test]
    fn test_no_winner_on_tied_top_score() {
        let state = state_with(vec![
            player(300, 0, Some(10_000)),
            player(300, 0, Some(20_000)),
        ]);
        let session = build_session(&state, state.room_id, Utc::now());
        assert!(session.winner.is_none());
        // Ranks stay unique even though the winner is withheld.
        assert_eq!(session.players[0].rank, 1);
        assert_eq!(session.players[1].rank, 2);
    }

    #[test]
    fn test_strict_top_score_wins() {
        let top = player(500, 3, Some(10_000));
        let state = state_with(vec![top.clone(), player(300, 0, Some(5_000))]);
        let session = build_session(&state, state.room_id, Utc::now());
        assert_eq!(session.winner, Some(top.player_id));
    }

    #[test]
    fn test_session_aggregates() {
        let state = state_with(vec![player(100, 0, None), player(200, 0, None)]);
        let session = build_session(&state, state.room_id, Utc::now());
        assert_eq!(session.data.seed, 7);
        assert_eq!(session.data.duration_ms, 60_000);
        assert_eq!(session.data.total_keystrokes, 200);
        assert!((session.data.average_wpm - 40.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_daily_bounds() {
        let at = Utc.with_ymd_and_hms(2024, 3, 15, 13, 45, 12).unwrap();
        let (start, end) = period_bounds(LeaderboardPeriod::Daily, at);
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 3, 15, 0, 0, 0).unwrap());
        assert_eq!(
            end,
            Some(Utc.with_ymd_and_hms(2024, 3, 16, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_weekly_bounds_start_monday() {
        // 2024-03-15 is a Friday.
        let at = Utc.with_ymd_and_hms(2024, 3, 15, 13, 45, 12).unwrap();
        let (start, end) = period_bounds(LeaderboardPeriod::Weekly, at);
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 3, 11, 0, 0, 0).unwrap());
        assert_eq!(
            end,
            Some(Utc.with_ymd_and_hms(2024, 3, 18, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_monthly_bounds_cross_year() {
        let at = Utc.with_ymd_and_hms(2024, 12, 31, 23, 59, 59).unwrap();
        let (start, end) = period_bounds(LeaderboardPeriod::Monthly, at);
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 12, 1, 0, 0, 0).unwrap());
        assert_eq!(
            end,
            Some(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_all_time_has_no_end() {
        let at = Utc::now();
        let (start, end) = period_bounds(LeaderboardPeriod::AllTime, at);
        assert_eq!(start.timestamp(), 0);
        assert!(end.is_none());
    }
}
