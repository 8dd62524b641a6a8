use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(LeaderboardEntries::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(LeaderboardEntries::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(LeaderboardEntries::PlayerId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(LeaderboardEntries::PlayerType)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(LeaderboardEntries::DisplayName)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(LeaderboardEntries::GameType)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(LeaderboardEntries::Period)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(LeaderboardEntries::PeriodStart)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(LeaderboardEntries::PeriodEnd)
                            .timestamp_with_time_zone(),
                    )
                    .col(
                        ColumnDef::new(LeaderboardEntries::Score)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(LeaderboardEntries::Wpm).double().not_null())
                    .col(
                        ColumnDef::new(LeaderboardEntries::Accuracy)
                            .double()
                            .not_null(),
                    )
                    .col(ColumnDef::new(LeaderboardEntries::Level).integer())
                    .col(ColumnDef::new(LeaderboardEntries::TimeMs).big_integer())
                    .col(
                        ColumnDef::new(LeaderboardEntries::SessionId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(LeaderboardEntries::AchievedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(LeaderboardEntries::Rank).integer())
                    .col(
                        ColumnDef::new(LeaderboardEntries::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(LeaderboardEntries::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Exactly one best-score row per player, game type and period window
        manager
            .create_index(
                Index::create()
                    .name("idx_leaderboard_player_scope")
                    .table(LeaderboardEntries::Table)
                    .col(LeaderboardEntries::PlayerId)
                    .col(LeaderboardEntries::GameType)
                    .col(LeaderboardEntries::Period)
                    .col(LeaderboardEntries::PeriodStart)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Top-N queries scan one period window ordered by score
        manager
            .create_index(
                Index::create()
                    .name("idx_leaderboard_scope_score")
                    .table(LeaderboardEntries::Table)
                    .col(LeaderboardEntries::GameType)
                    .col(LeaderboardEntries::Period)
                    .col(LeaderboardEntries::PeriodStart)
                    .col(LeaderboardEntries::Score)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(LeaderboardEntries::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum LeaderboardEntries {
    Table,
    Id,
    PlayerId,
    PlayerType,
    DisplayName,
    GameType,
    Period,
    PeriodStart,
    PeriodEnd,
    Score,
    Wpm,
    Accuracy,
    Level,
    TimeMs,
    SessionId,
    AchievedAt,
    Rank,
    CreatedAt,
    UpdatedAt,
}
