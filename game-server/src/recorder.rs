use anyhow::Result;
use chrono::{DateTime, Utc};
use sea_orm::DatabaseConnection;
use std::time::Duration;
use tracing::{error, info, warn};

use game_core::ranking::period_bounds;
use game_persistence::{LeaderboardRepository, SessionRepository};
use game_types::{GameSession, GameSessionPlayer, LeaderboardEntry, LeaderboardPeriod};

const INSERT_ATTEMPTS: u32 = 3;

/// Persists finished games: the immutable session record first, then one
/// best-score submission per player per leaderboard period. A session
/// that cannot be stored is logged and dropped; gameplay never blocks on
/// the database.
pub struct SessionRecorder {
    sessions: SessionRepository,
    leaderboard: LeaderboardRepository,
}

impl SessionRecorder {
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            sessions: SessionRepository::new(db.clone()),
            leaderboard: LeaderboardRepository::new(db),
        }
    }

    pub async fn record(&self, session: &GameSession) {
        if let Err(err) = self.insert_with_retry(session).await {
            error!("Failed to store session {}: {}", session.id, err);
            return;
        }

        let ended_at = DateTime::parse_from_rfc3339(&session.ended_at)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());

        for player in &session.players {
            if let Err(err) = self.submit_player(session, player, ended_at).await {
                warn!(
                    "Leaderboard submission failed for player {} in session {}: {}",
                    player.player_id, session.id, err
                );
            }
        }
    }

    async fn insert_with_retry(&self, session: &GameSession) -> Result<()> {
        let mut last_err = None;
        for attempt in 1..=INSERT_ATTEMPTS {
            match self.sessions.insert_session(session).await {
                Ok(()) => {
                    info!(
                        "Stored session {} ({} players, winner: {:?})",
                        session.id,
                        session.players.len(),
                        session.winner
                    );
                    return Ok(());
                }
                Err(err) => {
                    warn!(
                        "Session insert attempt {}/{} failed: {}",
                        attempt, INSERT_ATTEMPTS, err
                    );
                    last_err = Some(err);
                    if attempt < INSERT_ATTEMPTS {
                        tokio::time::sleep(Duration::from_millis(100 * attempt as u64)).await;
                    }
                }
            }
        }
        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("session insert failed")))
    }

    async fn submit_player(
        &self,
        session: &GameSession,
        player: &GameSessionPlayer,
        ended_at: DateTime<Utc>,
    ) -> Result<()> {
        for period in LeaderboardPeriod::ALL {
            let (period_start, period_end) = period_bounds(period, ended_at);
            let entry = LeaderboardEntry {
                game_type: session.game_type,
                period,
                player_id: player.player_id,
                player_type: player.player_type,
                display_name: player.display_name.clone(),
                score: player.score,
                metrics: player.metrics.clone(),
                session_id: session.id,
                achieved_at: ended_at.to_rfc3339(),
                period_start: period_start.to_rfc3339(),
                period_end: period_end.map(|end| end.to_rfc3339()),
                rank: None,
                friend_ids: None,
            };
            if self.leaderboard.submit_score(&entry).await? {
                info!(
                    "New {} best for player {} on {}: {}",
                    period.as_str(),
                    player.player_id,
                    session.game_type.as_str(),
                    player.score
                );
            }
        }
        Ok(())
    }

    pub fn sessions(&self) -> &SessionRepository {
        &self.sessions
    }

    pub fn leaderboard(&self) -> &LeaderboardRepository {
        &self.leaderboard
    }
}
