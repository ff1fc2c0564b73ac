use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

/// Identifiers for the `order_statuses` reference table.
#[derive(DeriveIden)]
enum OrderStatuses {
    Table,
    Id,
    Name,
    Description,
}

/// Seed rows. The ids are relied upon by `OrderState` in the application crate.
const STATUSES: [(i32, &str, &str); 5] = [
    (1, "In Progress", "The seller is working on the order"),
    (2, "Delivered", "The seller has delivered the work"),
    (3, "Completed", "The buyer accepted the delivery"),
    (4, "Cancelled", "The order was cancelled"),
    (5, "Revision Requested", "The buyer asked for changes after delivery"),
];

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(OrderStatuses::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(OrderStatuses::Id)
                            .integer()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(OrderStatuses::Name)
                            .string_len(50)
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(OrderStatuses::Description)
                            .text()
                            .not_null()
                            .default(""),
                    )
                    .to_owned(),
            )
            .await?;

        let mut insert = Query::insert();
        insert.into_table(OrderStatuses::Table).columns([
            OrderStatuses::Id,
            OrderStatuses::Name,
            OrderStatuses::Description,
        ]);
        for (id, name, description) in STATUSES {
            insert.values_panic([id.into(), name.into(), description.into()]);
        }
        manager.exec_stmt(insert.to_owned()).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(OrderStatuses::Table).to_owned())
            .await
    }
}
