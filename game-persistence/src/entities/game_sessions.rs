use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "game_sessions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub room_id: Uuid,
    pub game_type: String,
    pub players: Json,
    pub winner_id: Option<Uuid>,
    pub seed: i64,
    pub duration_ms: i64,
    pub average_wpm: f64,
    pub total_keystrokes: i64,
    pub started_at: DateTimeWithTimeZone,
    pub ended_at: DateTimeWithTimeZone,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
