use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260401_000001_create_products_table::Migration),
            Box::new(m20260401_000002_create_coupons_table::Migration),
            Box::new(m20260401_000003_create_shipping_rates_table::Migration),
            Box::new(m20260401_000004_create_checkout_sessions_table::Migration),
            Box::new(m20260401_000005_create_orders_table::Migration),
            Box::new(m20260401_000006_create_payment_transactions_table::Migration),
            Box::new(m20260401_000007_create_invoice_counters_table::Migration),
            Box::new(m20260401_000008_seed_shipping_rates::Migration),
        ]
    }
}

// Migration implementations

mod m20260401_000001_create_products_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20260401_000001_create_products_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            // Create products table aligned with entities::product::Model
            manager
                .create_table(
                    Table::create()
                        .table(Products::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Products::Id).uuid().primary_key().not_null())
                        .col(
                            ColumnDef::new(Products::Slug)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Products::Name).string().not_null())
                        .col(ColumnDef::new(Products::Description).text().null())
                        .col(ColumnDef::new(Products::Price).decimal().not_null())
                        .col(
                            ColumnDef::new(Products::Stock)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Products::SoldCount)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Products::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(Products::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_products_is_active")
                        .table(Products::Table)
                        .col(Products::IsActive)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Products::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Products {
        Table,
        Id,
        Slug,
        Name,
        Description,
        Price,
        Stock,
        SoldCount,
        IsActive,
        CreatedAt,
    }
}

mod m20260401_000002_create_coupons_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20260401_000002_create_coupons_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            // Create coupons table aligned with entities::coupon::Model
            manager
                .create_table(
                    Table::create()
                        .table(Coupons::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Coupons::Id).uuid().primary_key().not_null())
                        .col(
                            ColumnDef::new(Coupons::Code)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Coupons::DiscountType).string().not_null())
                        .col(ColumnDef::new(Coupons::DiscountValue).decimal().not_null())
                        .col(ColumnDef::new(Coupons::MinOrderValue).decimal().null())
                        .col(ColumnDef::new(Coupons::MaxUses).integer().null())
                        .col(
                            ColumnDef::new(Coupons::UsesCount)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Coupons::ValidFrom)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(Coupons::ValidUntil)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(Coupons::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(ColumnDef::new(Coupons::Description).text().null())
                        .col(
                            ColumnDef::new(Coupons::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Coupons::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Coupons {
        Table,
        Id,
        Code,
        DiscountType,
        DiscountValue,
        MinOrderValue,
        MaxUses,
        UsesCount,
        ValidFrom,
        ValidUntil,
        IsActive,
        Description,
        CreatedAt,
    }
}

mod m20260401_000003_create_shipping_rates_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20260401_000003_create_shipping_rates_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(ShippingRates::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ShippingRates::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ShippingRates::Country)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(ShippingRates::Rate).decimal().not_null())
                        .col(
                            ColumnDef::new(ShippingRates::FreeShippingThreshold)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(ShippingRates::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(ShippingRates::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(ShippingRates::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum ShippingRates {
        Table,
        Id,
        Country,
        Rate,
        FreeShippingThreshold,
        IsActive,
        CreatedAt,
    }
}

mod m20260401_000004_create_checkout_sessions_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20260401_000004_create_checkout_sessions_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(CheckoutSessions::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(CheckoutSessions::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(CheckoutSessions::SessionToken)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(
                            ColumnDef::new(CheckoutSessions::CustomerName)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(CheckoutSessions::CustomerEmail)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(CheckoutSessions::CustomerPhone)
                                .string()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(CheckoutSessions::ShippingAddress)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(CheckoutSessions::ShippingCity)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(CheckoutSessions::ShippingPostal)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(CheckoutSessions::ShippingCountry)
                                .string()
                                .not_null(),
                        )
                        .col(ColumnDef::new(CheckoutSessions::Items).json().not_null())
                        .col(
                            ColumnDef::new(CheckoutSessions::Subtotal)
                                .decimal()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(CheckoutSessions::ShippingCost)
                                .decimal()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(CheckoutSessions::DiscountAmount)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(CheckoutSessions::TotalAmount)
                                .decimal()
                                .not_null(),
                        )
                        .col(ColumnDef::new(CheckoutSessions::CouponCode).string().null())
                        .col(
                            ColumnDef::new(CheckoutSessions::CouponDetails)
                                .json()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(CheckoutSessions::Status)
                                .string()
                                .not_null()
                                .default("pending"),
                        )
                        .col(
                            ColumnDef::new(CheckoutSessions::IsDemo)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(
                            ColumnDef::new(CheckoutSessions::PaymentSessionId)
                                .string()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(CheckoutSessions::ExpiresAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(CheckoutSessions::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(CheckoutSessions::CompletedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_checkout_sessions_status")
                        .table(CheckoutSessions::Table)
                        .col(CheckoutSessions::Status)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_checkout_sessions_payment_session_id")
                        .table(CheckoutSessions::Table)
                        .col(CheckoutSessions::PaymentSessionId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(CheckoutSessions::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum CheckoutSessions {
        Table,
        Id,
        SessionToken,
        CustomerName,
        CustomerEmail,
        CustomerPhone,
        ShippingAddress,
        ShippingCity,
        ShippingPostal,
        ShippingCountry,
        Items,
        Subtotal,
        ShippingCost,
        DiscountAmount,
        TotalAmount,
        CouponCode,
        CouponDetails,
        Status,
        IsDemo,
        PaymentSessionId,
        ExpiresAt,
        CreatedAt,
        CompletedAt,
    }
}

mod m20260401_000005_create_orders_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20260401_000005_create_orders_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            // Unique keys on tracking_number, invoice_number,
            // checkout_session_token and payment_session_id back the
            // idempotent-finalization guarantee.
            manager
                .create_table(
                    Table::create()
                        .table(Orders::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Orders::Id).uuid().primary_key().not_null())
                        .col(
                            ColumnDef::new(Orders::TrackingNumber)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(
                            ColumnDef::new(Orders::InvoiceNumber)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(
                            ColumnDef::new(Orders::CheckoutSessionToken)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Orders::CustomerName).string().not_null())
                        .col(ColumnDef::new(Orders::CustomerEmail).string().not_null())
                        .col(ColumnDef::new(Orders::CustomerPhone).string().null())
                        .col(ColumnDef::new(Orders::ShippingAddress).string().not_null())
                        .col(ColumnDef::new(Orders::ShippingCity).string().not_null())
                        .col(ColumnDef::new(Orders::ShippingPostal).string().not_null())
                        .col(ColumnDef::new(Orders::ShippingCountry).string().not_null())
                        .col(ColumnDef::new(Orders::Items).json().not_null())
                        .col(ColumnDef::new(Orders::Subtotal).decimal().not_null())
                        .col(ColumnDef::new(Orders::ShippingCost).decimal().not_null())
                        .col(
                            ColumnDef::new(Orders::DiscountAmount)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Orders::TotalAmount).decimal().not_null())
                        .col(ColumnDef::new(Orders::CouponCode).string().null())
                        .col(ColumnDef::new(Orders::Status).string().not_null())
                        .col(ColumnDef::new(Orders::PaymentStatus).string().not_null())
                        .col(
                            ColumnDef::new(Orders::PaymentSessionId)
                                .string()
                                .null()
                                .unique_key(),
                        )
                        .col(
                            ColumnDef::new(Orders::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_orders_customer_email")
                        .table(Orders::Table)
                        .col(Orders::CustomerEmail)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_orders_status")
                        .table(Orders::Table)
                        .col(Orders::Status)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_orders_created_at")
                        .table(Orders::Table)
                        .col(Orders::CreatedAt)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Orders::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum Orders {
        Table,
        Id,
        TrackingNumber,
        InvoiceNumber,
        CheckoutSessionToken,
        CustomerName,
        CustomerEmail,
        CustomerPhone,
        ShippingAddress,
        ShippingCity,
        ShippingPostal,
        ShippingCountry,
        Items,
        Subtotal,
        ShippingCost,
        DiscountAmount,
        TotalAmount,
        CouponCode,
        Status,
        PaymentStatus,
        PaymentSessionId,
        CreatedAt,
    }
}

mod m20260401_000006_create_payment_transactions_table {
    use super::m20260401_000005_create_orders_table::Orders;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20260401_000006_create_payment_transactions_table"
        }
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
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PaymentTransactions::OrderId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PaymentTransactions::PaymentSessionId)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PaymentTransactions::Amount)
                                .decimal()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PaymentTransactions::Currency)
                                .string()
                                .not_null()
                                .default("eur"),
                        )
                        .col(
                            ColumnDef::new(PaymentTransactions::PaymentStatus)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PaymentTransactions::Metadata)
                                .json()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PaymentTransactions::CreatedAt)
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
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_payment_transactions_order_id")
                        .table(PaymentTransactions::Table)
                        .col(PaymentTransactions::OrderId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_payment_transactions_payment_session_id")
                        .table(PaymentTransactions::Table)
                        .col(PaymentTransactions::PaymentSessionId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(PaymentTransactions::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum PaymentTransactions {
        Table,
        Id,
        OrderId,
        PaymentSessionId,
        Amount,
        Currency,
        PaymentStatus,
        Metadata,
        CreatedAt,
    }
}

mod m20260401_000007_create_invoice_counters_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20260401_000007_create_invoice_counters_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(InvoiceCounters::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(InvoiceCounters::Year)
                                .integer()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InvoiceCounters::LastValue)
                                .big_integer()
                                .not_null()
                                .default(0),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(InvoiceCounters::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum InvoiceCounters {
        Table,
        Year,
        LastValue,
    }
}

mod m20260401_000008_seed_shipping_rates {
    use chrono::Utc;
    use rust_decimal::Decimal;
    use sea_orm_migration::prelude::*;
    use uuid::Uuid;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20260401_000008_seed_shipping_rates"
        }
    }

    /// (country, flat rate in cents, free-shipping threshold in euro)
    const SEED_RATES: &[(&str, i64, i64)] = &[
        ("Österreich", 590, 60),
        ("Deutschland", 990, 80),
        ("Schweiz", 1490, 100),
        ("Italien", 1290, 100),
        ("Frankreich", 1490, 100),
        ("Niederlande", 1290, 100),
        ("Belgien", 1290, 100),
    ];

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            let now = Utc::now();

            for (country, rate_cents, threshold) in SEED_RATES {
                let insert = Query::insert()
                    .into_table(ShippingRates::Table)
                    .columns([
                        ShippingRates::Id,
                        ShippingRates::Country,
                        ShippingRates::Rate,
                        ShippingRates::FreeShippingThreshold,
                        ShippingRates::IsActive,
                        ShippingRates::CreatedAt,
                    ])
                    .values_panic([
                        Uuid::new_v4().into(),
                        (*country).into(),
                        Decimal::new(*rate_cents, 2).into(),
                        Decimal::new(*threshold, 0).into(),
                        true.into(),
                        now.into(),
                    ])
                    .to_owned();

                manager.exec_stmt(insert).await?;
            }

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            let delete = Query::delete().from_table(ShippingRates::Table).to_owned();
            manager.exec_stmt(delete).await?;
            Ok(())
        }
    }

    #[derive(DeriveIden)]
    enum ShippingRates {
        Table,
        Id,
        Country,
        Rate,
        FreeShippingThreshold,
        IsActive,
        CreatedAt,
    }
}
