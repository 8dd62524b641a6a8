use anyhow::Result;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, SqlErr,
};
use uuid::Uuid;

use crate::entities::{leaderboard_entries, prelude::*};
use game_types::{
    GameType, LeaderboardEntry, LeaderboardPeriod, PlayerType, ScoreMetrics,
};

/// How often a submit retries when it races another writer for the same
/// (player, game type, period window) row.
const SUBMIT_ATTEMPTS: usize = 3;

pub struct LeaderboardRepository {
    db: DatabaseConnection,
}

impl LeaderboardRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    fn model_to_entry(model: leaderboard_entries::Model) -> Result<LeaderboardEntry> {
        let game_type = GameType::from_str(&model.game_type)
            .ok_or_else(|| anyhow::anyhow!("Unknown game type: {}", model.game_type))?;
        let period = LeaderboardPeriod::from_str(&model.period)
            .ok_or_else(|| anyhow::anyhow!("Unknown period: {}", model.period))?;
        let player_type = match model.player_type.as_str() {
            "user" => PlayerType::User,
            _ => PlayerType::Guest,
        };

        Ok(LeaderboardEntry {
            game_type,
            period,
            player_id: model.player_id,
            player_type,
            display_name: model.display_name,
            score: model.score,
            metrics: ScoreMetrics {
                wpm: model.wpm,
                accuracy: model.accuracy,
                level: model.level.map(|l| l as u32),
                time_ms: model.time_ms.map(|t| t as u64),
            },
            session_id: model.session_id,
            achieved_at: model.achieved_at.to_rfc3339(),
            period_start: model.period_start.to_rfc3339(),
            period_end: model.period_end.map(|t| t.to_rfc3339()),
            rank: model.rank.map(|r| r as u32),
            friend_ids: None,
        })
    }

    fn scope_filter(
        game_type: GameType,
        period: LeaderboardPeriod,
        period_start: DateTime<Utc>,
    ) -> sea_orm::Condition {
        sea_orm::Condition::all()
            .add(leaderboard_entries::Column::GameType.eq(game_type.as_str()))
            .add(leaderboard_entries::Column::Period.eq(period.as_str()))
            .add(leaderboard_entries::Column::PeriodStart.eq(period_start))
    }

    /// Records a score if it beats the player's stored best for the
    /// window; a lower or equal score leaves the row untouched. Returns
    /// whether the stored best changed. Concurrent submissions are
    /// resolved by the unique (player, game type, period, period start)
    /// index rather than a read-then-write.
    pub async fn submit_score(&self, entry: &LeaderboardEntry) -> Result<bool> {
        let period_start = chrono::DateTime::parse_from_rfc3339(&entry.period_start)?;
        let period_end = entry
            .period_end
            .as_deref()
            .map(chrono::DateTime::parse_from_rfc3339)
            .transpose()?;
        let achieved_at = chrono::DateTime::parse_from_rfc3339(&entry.achieved_at)
            .unwrap_or_else(|_| chrono::Utc::now().into());
        let now: chrono::DateTime<chrono::FixedOffset> = chrono::Utc::now().into();

        for _ in 0..SUBMIT_ATTEMPTS {
            // Improve an existing row, guarded by the old score in the
            // WHERE clause so a stronger concurrent score is never clobbered.
            let update = LeaderboardEntries::update_many()
                .col_expr(leaderboard_entries::Column::Score, Expr::value(entry.score))
                .col_expr(
                    leaderboard_entries::Column::Wpm,
                    Expr::value(entry.metrics.wpm),
                )
                .col_expr(
                    leaderboard_entries::Column::Accuracy,
                    Expr::value(entry.metrics.accuracy),
                )
                .col_expr(
                    leaderboard_entries::Column::Level,
                    Expr::value(entry.metrics.level.map(|l| l as i32)),
                )
                .col_expr(
                    leaderboard_entries::Column::TimeMs,
                    Expr::value(entry.metrics.time_ms.map(|t| t as i64)),
                )
                .col_expr(
                    leaderboard_entries::Column::SessionId,
                    Expr::value(entry.session_id),
                )
                .col_expr(
                    leaderboard_entries::Column::DisplayName,
                    Expr::value(entry.display_name.clone()),
                )
                .col_expr(
                    leaderboard_entries::Column::AchievedAt,
                    Expr::value(achieved_at),
                )
                .col_expr(leaderboard_entries::Column::UpdatedAt, Expr::value(now))
                .filter(Self::scope_filter(
                    entry.game_type,
                    entry.period,
                    period_start.into(),
                ))
                .filter(leaderboard_entries::Column::PlayerId.eq(entry.player_id))
                .filter(leaderboard_entries::Column::Score.lt(entry.score))
                .exec(&self.db)
                .await?;
            if update.rows_affected > 0 {
                return Ok(true);
            }

            // No improvable row: either the stored best is already at least
            // as good, or no row exists yet.
            let existing = LeaderboardEntries::find()
                .filter(Self::scope_filter(
                    entry.game_type,
                    entry.period,
                    period_start.into(),
                ))
                .filter(leaderboard_entries::Column::PlayerId.eq(entry.player_id))
                .one(&self.db)
                .await?;
            if existing.is_some() {
                return Ok(false);
            }

            let model = leaderboard_entries::ActiveModel {
                player_id: sea_orm::ActiveValue::Set(entry.player_id),
                player_type: sea_orm::ActiveValue::Set(
                    match entry.player_type {
                        PlayerType::User => "user",
                        PlayerType::Guest => "guest",
                    }
                    .to_string(),
                ),
                display_name: sea_orm::ActiveValue::Set(entry.display_name.clone()),
                game_type: sea_orm::ActiveValue::Set(entry.game_type.as_str().to_string()),
                period: sea_orm::ActiveValue::Set(entry.period.as_str().to_string()),
                period_start: sea_orm::ActiveValue::Set(period_start),
                period_end: sea_orm::ActiveValue::Set(period_end),
                score: sea_orm::ActiveValue::Set(entry.score),
                wpm: sea_orm::ActiveValue::Set(entry.metrics.wpm),
                accuracy: sea_orm::ActiveValue::Set(entry.metrics.accuracy),
                level: sea_orm::ActiveValue::Set(entry.metrics.level.map(|l| l as i32)),
                time_ms: sea_orm::ActiveValue::Set(entry.metrics.time_ms.map(|t| t as i64)),
                session_id: sea_orm::ActiveValue::Set(entry.session_id),
                achieved_at: sea_orm::ActiveValue::Set(achieved_at),
                rank: sea_orm::ActiveValue::Set(None),
                created_at: sea_orm::ActiveValue::Set(now),
                updated_at: sea_orm::ActiveValue::Set(now),
                ..Default::default()
            };

            match LeaderboardEntries::insert(model).exec(&self.db).await {
                Ok(_) => return Ok(true),
                // A concurrent insert won the unique index; loop back and
                // try to improve the row it created.
                Err(err) if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
                    continue
                }
                Err(err) => return Err(err.into()),
            }
        }

        anyhow::bail!("Leaderboard submit kept losing races, giving up")
    }

    /// Top entries for one window ordered by score, ranked densely from 1.
    pub async fn get_top_players(
        &self,
        game_type: GameType,
        period: LeaderboardPeriod,
        period_start: DateTime<Utc>,
        limit: u64,
    ) -> Result<Vec<LeaderboardEntry>> {
        let models = LeaderboardEntries::find()
            .filter(Self::scope_filter(game_type, period, period_start))
            .order_by_desc(leaderboard_entries::Column::Score)
            .order_by_asc(leaderboard_entries::Column::AchievedAt)
            .limit(limit)
            .all(&self.db)
            .await?;

        models
            .into_iter()
            .enumerate()
            .map(|(index, model)| {
                let mut entry = Self::model_to_entry(model)?;
                entry.rank = Some(index as u32 + 1);
                Ok(entry)
            })
            .collect()
    }

    /// A player's rank within one window: one plus the number of strictly
    /// better scores. Absent when the player has no entry.
    pub async fn get_player_rank(
        &self,
        game_type: GameType,
        period: LeaderboardPeriod,
        period_start: DateTime<Utc>,
        player_id: Uuid,
    ) -> Result<Option<u32>> {
        let own = LeaderboardEntries::find()
            .filter(Self::scope_filter(game_type, period, period_start))
            .filter(leaderboard_entries::Column::PlayerId.eq(player_id))
            .one(&self.db)
            .await?;

        let Some(own) = own else {
            return Ok(None);
        };

        let better = LeaderboardEntries::find()
            .filter(Self::scope_filter(game_type, period, period_start))
            .filter(leaderboard_entries::Column::Score.gt(own.score))
            .count(&self.db)
            .await?;

        Ok(Some(better as u32 + 1))
    }

    /// Window entries restricted to the given players, ranked among
    /// themselves.
    pub async fn get_friends_leaderboard(
        &self,
        game_type: GameType,
        period: LeaderboardPeriod,
        period_start: DateTime<Utc>,
        friend_ids: &[Uuid],
    ) -> Result<Vec<LeaderboardEntry>> {
        if friend_ids.is_empty() {
            return Ok(Vec::new());
        }

        let models = LeaderboardEntries::find()
            .filter(Self::scope_filter(game_type, period, period_start))
            .filter(leaderboard_entries::Column::PlayerId.is_in(friend_ids.iter().copied()))
            .order_by_desc(leaderboard_entries::Column::Score)
            .order_by_asc(leaderboard_entries::Column::AchievedAt)
            .all(&self.db)
            .await?;

        models
            .into_iter()
            .enumerate()
            .map(|(index, model)| {
                let mut entry = Self::model_to_entry(model)?;
                entry.rank = Some(index as u32 + 1);
                entry.friend_ids = Some(friend_ids.to_vec());
                Ok(entry)
            })
            .collect()
    }

    /// Batch-refreshes the cached rank column for one window. Run
    /// periodically; reads never depend on it being current.
    pub async fn update_ranks(
        &self,
        game_type: GameType,
        period: LeaderboardPeriod,
        period_start: DateTime<Utc>,
    ) -> Result<u64> {
        let models = LeaderboardEntries::find()
            .filter(Self::scope_filter(game_type, period, period_start))
            .order_by_desc(leaderboard_entries::Column::Score)
            .order_by_asc(leaderboard_entries::Column::AchievedAt)
            .all(&self.db)
            .await?;

        let mut updated = 0u64;
        for (index, model) in models.into_iter().enumerate() {
            let rank = Some(index as i32 + 1);
            if model.rank == rank {
                continue;
            }
            let row_id = model.id;
            let mut active: leaderboard_entries::ActiveModel = model.into();
            active.rank = sea_orm::ActiveValue::Set(rank);
            LeaderboardEntries::update(active)
                .filter(leaderboard_entries::Column::Id.eq(row_id))
                .exec(&self.db)
                .await?;
            updated += 1;
        }
        Ok(updated)
    }

    /// Drops rows whose period window has closed. All-time rows have no
    /// period end and are never removed.
    pub async fn clean_expired_periods(&self, now: DateTime<Utc>) -> Result<u64> {
        let result = LeaderboardEntries::delete_many()
            .filter(leaderboard_entries::Column::PeriodEnd.is_not_null())
            .filter(leaderboard_entries::Column::PeriodEnd.lt(now))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected)
    }
}
