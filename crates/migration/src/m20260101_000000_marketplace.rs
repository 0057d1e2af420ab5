//! Initial schema for the marketplace:
//!
//! - `shipments`: transport requests posted by senders
//! - `offers`: carrier bids against a shipment
//! - `agreements`: the one accepted offer per shipment, with its price split
//! - `commissions`: reporting copy of each agreement's commission
//! - `wallets`: one balance per user
//! - `transactions`: append-only ledger entries per wallet

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

// ─────────────────────────────────────────────────────────────────────────────
// Table identifiers
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Iden)]
enum Shipments {
    Table,
    Id,
    OwnerId,
    Origin,
    Destination,
    WeightGrams,
    VolumeCm3,
    PriceMinor,
    Status,
    Priority,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum Offers {
    Table,
    Id,
    ShipmentId,
    CarrierId,
    PriceMinor,
    Message,
    EstimatedDelivery,
    ExpiresAt,
    Status,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum Agreements {
    Table,
    Id,
    OfferId,
    ShipmentId,
    SenderId,
    CarrierId,
    AgreedPriceMinor,
    CommissionMinor,
    CarrierReceivesMinor,
    CommissionRatePpm,
    Status,
    CreatedAt,
}

#[derive(Iden)]
enum Commissions {
    Table,
    Id,
    AgreementId,
    ShipmentId,
    CarrierId,
    AgreedPriceMinor,
    CommissionMinor,
    CarrierReceivesMinor,
    Status,
    CreatedAt,
}

#[derive(Iden)]
enum Wallets {
    Table,
    Id,
    UserId,
    Balance,
    Currency,
    IsActive,
    Version,
    CreatedAt,
}

#[derive(Iden)]
enum Transactions {
    Table,
    Id,
    WalletId,
    Sequence,
    Kind,
    AmountMinor,
    BalanceBefore,
    BalanceAfter,
    Status,
    Method,
    Description,
    ReferenceId,
    CreatedAt,
}

// ─────────────────────────────────────────────────────────────────────────────
// Migration implementation
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // ───────────────────────────────────────────────────────────────────
        // 1. Shipments
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Shipments::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Shipments::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Shipments::OwnerId).string().not_null())
                    .col(ColumnDef::new(Shipments::Origin).string().not_null())
                    .col(ColumnDef::new(Shipments::Destination).string().not_null())
                    .col(
                        ColumnDef::new(Shipments::WeightGrams)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Shipments::VolumeCm3).big_integer())
                    .col(
                        ColumnDef::new(Shipments::PriceMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Shipments::Status)
                            .string()
                            .not_null()
                            .default("pending"),
                    )
                    .col(
                        ColumnDef::new(Shipments::Priority)
                            .string()
                            .not_null()
                            .default("normal"),
                    )
                    .col(
                        ColumnDef::new(Shipments::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Shipments::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-shipments-owner_id-created_at")
                    .table(Shipments::Table)
                    .col(Shipments::OwnerId)
                    .col(Shipments::CreatedAt)
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 2. Offers
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Offers::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Offers::Id).string().not_null().primary_key())
                    .col(ColumnDef::new(Offers::ShipmentId).string().not_null())
                    .col(ColumnDef::new(Offers::CarrierId).string().not_null())
                    .col(ColumnDef::new(Offers::PriceMinor).big_integer().not_null())
                    .col(ColumnDef::new(Offers::Message).string())
                    .col(
                        ColumnDef::new(Offers::EstimatedDelivery)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Offers::ExpiresAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(Offers::Status)
                            .string()
                            .not_null()
                            .default("pending"),
                    )
                    .col(
                        ColumnDef::new(Offers::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Offers::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-offers-shipment_id")
                            .from(Offers::Table, Offers::ShipmentId)
                            .to(Shipments::Table, Shipments::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-offers-shipment_id-status")
                    .table(Offers::Table)
                    .col(Offers::ShipmentId)
                    .col(Offers::Status)
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 3. Agreements
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Agreements::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Agreements::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Agreements::OfferId).string().not_null())
                    .col(ColumnDef::new(Agreements::ShipmentId).string().not_null())
                    .col(ColumnDef::new(Agreements::SenderId).string().not_null())
                    .col(ColumnDef::new(Agreements::CarrierId).string().not_null())
                    .col(
                        ColumnDef::new(Agreements::AgreedPriceMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Agreements::CommissionMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Agreements::CarrierReceivesMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Agreements::CommissionRatePpm)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Agreements::Status).string().not_null())
                    .col(
                        ColumnDef::new(Agreements::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-agreements-offer_id")
                            .from(Agreements::Table, Agreements::OfferId)
                            .to(Offers::Table, Offers::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-agreements-shipment_id")
                            .from(Agreements::Table, Agreements::ShipmentId)
                            .to(Shipments::Table, Shipments::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-agreements-offer_id-unique")
                    .table(Agreements::Table)
                    .col(Agreements::OfferId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // One agreement per shipment backs the single-acceptance rule at the
        // storage level.
        manager
            .create_index(
                Index::create()
                    .name("idx-agreements-shipment_id-unique")
                    .table(Agreements::Table)
                    .col(Agreements::ShipmentId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 4. Commissions
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Commissions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Commissions::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Commissions::AgreementId).string().not_null())
                    .col(ColumnDef::new(Commissions::ShipmentId).string().not_null())
                    .col(ColumnDef::new(Commissions::CarrierId).string().not_null())
                    .col(
                        ColumnDef::new(Commissions::AgreedPriceMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Commissions::CommissionMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Commissions::CarrierReceivesMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Commissions::Status).string().not_null())
                    .col(
                        ColumnDef::new(Commissions::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-commissions-agreement_id")
                            .from(Commissions::Table, Commissions::AgreementId)
                            .to(Agreements::Table, Agreements::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-commissions-agreement_id-unique")
                    .table(Commissions::Table)
                    .col(Commissions::AgreementId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 5. Wallets
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Wallets::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Wallets::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Wallets::UserId).string().not_null())
                    .col(
                        ColumnDef::new(Wallets::Balance)
                            .big_integer()
                            .not_null()
                            .default(0)
                            .check(Expr::col(Wallets::Balance).gte(0)),
                    )
                    .col(
                        ColumnDef::new(Wallets::Currency)
                            .string()
                            .not_null()
                            .default("TRY"),
                    )
                    .col(
                        ColumnDef::new(Wallets::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(Wallets::Version)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Wallets::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-wallets-user_id-unique")
                    .table(Wallets::Table)
                    .col(Wallets::UserId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 6. Transactions (ledger)
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Transactions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Transactions::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Transactions::WalletId).string().not_null())
                    .col(
                        ColumnDef::new(Transactions::Sequence)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Transactions::Kind).string().not_null())
                    .col(
                        ColumnDef::new(Transactions::AmountMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Transactions::BalanceBefore)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Transactions::BalanceAfter)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Transactions::Status).string().not_null())
                    .col(ColumnDef::new(Transactions::Method).string())
                    .col(ColumnDef::new(Transactions::Description).string())
                    .col(ColumnDef::new(Transactions::ReferenceId).string())
                    .col(
                        ColumnDef::new(Transactions::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-transactions-wallet_id")
                            .from(Transactions::Table, Transactions::WalletId)
                            .to(Wallets::Table, Wallets::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-transactions-wallet_id-sequence-unique")
                    .table(Transactions::Table)
                    .col(Transactions::WalletId)
                    .col(Transactions::Sequence)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-transactions-reference_id")
                    .table(Transactions::Table)
                    .col(Transactions::ReferenceId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Drop in reverse order of creation (respecting FK dependencies)
        manager
            .drop_table(Table::drop().table(Transactions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Wallets::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Commissions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Agreements::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Offers::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Shipments::Table).to_owned())
            .await?;
        Ok(())
    }
}
