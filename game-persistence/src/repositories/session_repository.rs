use anyhow::Result;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, QuerySelect,
};
use uuid::Uuid;

use crate::entities::{game_sessions, prelude::*};
use game_types::{GameSession, GameSessionPlayer, GameType, SessionId};

pub struct SessionRepository {
    db: DatabaseConnection,
}

impl SessionRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    fn model_to_session(model: game_sessions::Model) -> Result<GameSession> {
        let players: Vec<GameSessionPlayer> = serde_json::from_value(model.players)?;
        let game_type = GameType::from_str(&model.game_type)
            .ok_or_else(|| anyhow::anyhow!("Unknown game type: {}", model.game_type))?;

        Ok(GameSession {
            id: model.id,
            room_id: model.room_id,
            game_type,
            players,
            winner: model.winner_id,
            data: game_types::SessionData {
                seed: model.seed as u64,
                duration_ms: model.duration_ms as u64,
                average_wpm: model.average_wpm,
                total_keystrokes: model.total_keystrokes as u64,
            },
            started_at: model.started_at.to_rfc3339(),
            ended_at: model.ended_at.to_rfc3339(),
        })
    }

    /// Stores one completed playthrough. Sessions are immutable; this is
    /// the only write this repository performs.
    pub async fn insert_session(&self, session: &GameSession) -> Result<()> {
        if session.players.is_empty() || session.players.len() > 8 {
            anyhow::bail!(
                "Session must have between 1 and 8 players, got {}",
                session.players.len()
            );
        }

        let started_at = chrono::DateTime::parse_from_rfc3339(&session.started_at)
            .unwrap_or_else(|_| chrono::Utc::now().into());
        let ended_at = chrono::DateTime::parse_from_rfc3339(&session.ended_at)
            .unwrap_or_else(|_| chrono::Utc::now().into());

        let model = game_sessions::ActiveModel {
            id: sea_orm::ActiveValue::Set(session.id),
            room_id: sea_orm::ActiveValue::Set(session.room_id),
            game_type: sea_orm::ActiveValue::Set(session.game_type.as_str().to_string()),
            players: sea_orm::ActiveValue::Set(serde_json::to_value(&session.players)?),
            winner_id: sea_orm::ActiveValue::Set(session.winner),
            seed: sea_orm::ActiveValue::Set(session.data.seed as i64),
            duration_ms: sea_orm::ActiveValue::Set(session.data.duration_ms as i64),
            average_wpm: sea_orm::ActiveValue::Set(session.data.average_wpm),
            total_keystrokes: sea_orm::ActiveValue::Set(session.data.total_keystrokes as i64),
            started_at: sea_orm::ActiveValue::Set(started_at),
            ended_at: sea_orm::ActiveValue::Set(ended_at),
            created_at: sea_orm::ActiveValue::Set(chrono::Utc::now().into()),
        };

        GameSessions::insert(model).exec(&self.db).await?;
        Ok(())
    }

    pub async fn find_by_id(&self, id: SessionId) -> Result<Option<GameSession>> {
        let model = GameSessions::find_by_id(id).one(&self.db).await?;
        model.map(Self::model_to_session).transpose()
    }

    /// Most recent sessions for one game type, newest first.
    pub async fn find_recent(&self, game_type: GameType, limit: u64) -> Result<Vec<GameSession>> {
        let models = GameSessions::find()
            .filter(game_sessions::Column::GameType.eq(game_type.as_str()))
            .order_by_desc(game_sessions::Column::EndedAt)
            .limit(limit)
            .all(&self.db)
            .await?;

        models.into_iter().map(Self::model_to_session).collect()
    }

    /// Sessions a player took part in, newest first. Player membership is
    /// stored inside the players JSON, so this filters in memory after a
    /// bounded scan.
    pub async fn find_recent_for_player(
        &self,
        player_id: Uuid,
        limit: usize,
    ) -> Result<Vec<GameSession>> {
        let models = GameSessions::find()
            .order_by_desc(game_sessions::Column::EndedAt)
            .limit(500)
            .all(&self.db)
            .await?;

        let mut sessions = Vec::new();
        for model in models {
            let session = Self::model_to_session(model)?;
            if session.players.iter().any(|p| p.player_id == player_id) {
                sessions.push(session);
                if sessions.len() >= limit {
                    break;
                }
            }
        }
        Ok(sessions)
    }
}
