use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(NodeEvent::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(NodeEvent::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(NodeEvent::Stream).string().not_null())
                    .col(ColumnDef::new(NodeEvent::Payload).json_binary().not_null())
                    .col(
                        ColumnDef::new(NodeEvent::ReceivedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("node_event_stream_received_at_idx")
                    .table(NodeEvent::Table)
                    .col(NodeEvent::Stream)
                    .col(NodeEvent::ReceivedAt)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(NodeEvent::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum NodeEvent {
    Table,
    Id,
    Stream,
    Payload,
    ReceivedAt,
}
