use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

/// Identifiers for the `payment_transactions` table and its columns.
#[derive(DeriveIden)]
enum PaymentTransactions {
    Table,
    Id,
    OrderId,
    UserId,
    TransactionType,
    Reference,
    Amount,
    Status,
    CreatedAt,
    UpdatedAt,
}

/// Identifiers for the `withdrawal_requests` table and its columns.
#[derive(DeriveIden)]
enum WithdrawalRequests {
    Table,
    Id,
    SellerId,
    Amount,
    FirstName,
    LastName,
    Iban,
    IsProcessed,
    SettledAmount,
    CreatedAt,
    ProcessedAt,
}

#[derive(DeriveIden)]
enum Orders {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum Users {
    Table,
    Id,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(PaymentTransactions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PaymentTransactions::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(PaymentTransactions::OrderId).uuid().not_null())
                    .col(ColumnDef::new(PaymentTransactions::UserId).uuid().not_null())
                    .col(
                        ColumnDef::new(PaymentTransactions::TransactionType)
                            .string_len(10)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PaymentTransactions::Reference)
                            .string_len(100)
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(PaymentTransactions::Amount)
                            .decimal_len(10, 2)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PaymentTransactions::Status)
                            .string_len(20)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PaymentTransactions::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PaymentTransactions::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_payment_transactions_order_id")
                            .from(PaymentTransactions::Table, PaymentTransactions::OrderId)
                            .to(Orders::Table, Orders::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_payment_transactions_user_id")
                            .from(PaymentTransactions::Table, PaymentTransactions::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(WithdrawalRequests::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(WithdrawalRequests::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(WithdrawalRequests::SellerId).uuid().not_null())
                    .col(
                        ColumnDef::new(WithdrawalRequests::Amount)
                            .decimal_len(10, 2)
                            .not_null(),
                    )
                    .col(ColumnDef::new(WithdrawalRequests::FirstName).string().not_null())
                    .col(ColumnDef::new(WithdrawalRequests::LastName).string().not_null())
                    .col(
                        ColumnDef::new(WithdrawalRequests::Iban)
                            .string_len(34)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(WithdrawalRequests::IsProcessed)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(WithdrawalRequests::SettledAmount)
                            .decimal_len(10, 2)
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(WithdrawalRequests::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(WithdrawalRequests::ProcessedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_withdrawal_requests_seller_id")
                            .from(WithdrawalRequests::Table, WithdrawalRequests::SellerId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_payment_transactions_order_id")
                    .table(PaymentTransactions::Table)
                    .col(PaymentTransactions::OrderId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_withdrawal_requests_seller_id")
                    .table(WithdrawalRequests::Table)
                    .col(WithdrawalRequests::SellerId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(WithdrawalRequests::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(PaymentTransactions::Table).to_owned())
            .await
    }
}
