use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(GameSessions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(GameSessions::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(GameSessions::RoomId).string().not_null())
                    .col(ColumnDef::new(GameSessions::GameType).string().not_null())
                    .col(ColumnDef::new(GameSessions::Players).json().not_null())
                    .col(ColumnDef::new(GameSessions::WinnerId).string())
                    .col(
                        ColumnDef::new(GameSessions::Seed)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(GameSessions::DurationMs)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(GameSessions::AverageWpm)
                            .double()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(GameSessions::TotalKeystrokes)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(GameSessions::StartedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(GameSessions::EndedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(GameSessions::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // History queries filter per game type and order by end time
        manager
            .create_index(
                Index::create()
                    .name("idx_game_sessions_game_type_ended_at")
                    .table(GameSessions::Table)
                    .col(GameSessions::GameType)
                    .col(GameSessions::EndedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(GameSessions::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum GameSessions {
    Table,
    Id,
    RoomId,
    GameType,
    Players,
    WinnerId,
    Seed,
    DurationMs,
    AverageWpm,
    TotalKeystrokes,
    StartedAt,
    EndedAt,
    CreatedAt,
}
