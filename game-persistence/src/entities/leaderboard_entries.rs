use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "leaderboard_entries")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub player_id: Uuid,
    pub player_type: String,
    pub display_name: String,
    pub game_type: String,
    pub period: String,
    pub period_start: DateTimeWithTimeZone,
    pub period_end: Option<DateTimeWithTimeZone>,
    pub score: i64,
    pub wpm: f64,
    pub accuracy: f64,
    pub level: Option<i32>,
    pub time_ms: Option<i64>,
    pub session_id: Uuid,
    pub achieved_at: DateTimeWithTimeZone,
    pub rank: Option<i32>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
