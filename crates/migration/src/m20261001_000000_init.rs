//! Initial schema migration - creates all tables from scratch.
//!
//! - `users`: authentication for the HTTP surface
//! - `groups`: shared-expense groups with their invite code
//! - `group_members`: linked members and unlinked placeholders
//! - `expenses`, `expense_payers`, `expense_splits`: expenses and their allocations
//! - `personal_transactions`: personal ledger entries mirrored from settlements
//! - `settlements`: transfers between members

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

// ─────────────────────────────────────────────────────────────────────────────
// Table identifiers
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Iden)]
enum Users {
    Table,
    Username,
    Password,
    Email,
}

#[derive(Iden)]
enum Groups {
    Table,
    Id,
    Name,
    Description,
    Category,
    Currency,
    InviteCode,
    IsSettled,
    IsActive,
    OwnerId,
    CreatedAt,
}

#[derive(Iden)]
enum GroupMembers {
    Table,
    Id,
    GroupId,
    Name,
    Email,
    UserId,
    IsCreator,
    JoinedAt,
    LeftAt,
}

#[derive(Iden)]
enum Expenses {
    Table,
    Id,
    GroupId,
    Description,
    AmountMinor,
    SplitType,
    ExpenseDate,
    Notes,
    PaidBy,
    CreatedBy,
    CreatedAt,
    IdempotencyKey,
}

#[derive(Iden)]
enum ExpensePayers {
    Table,
    ExpenseId,
    MemberId,
    AmountMinor,
}

#[derive(Iden)]
enum ExpenseSplits {
    Table,
    ExpenseId,
    MemberId,
    AmountMinor,
    PercentageBp,
    IsPaid,
}

#[derive(Iden)]
enum PersonalTransactions {
    Table,
    Id,
    UserId,
    Kind,
    AmountMinor,
    Currency,
    OccurredOn,
    Note,
    CreatedAt,
}

#[derive(Iden)]
enum Settlements {
    Table,
    Id,
    GroupId,
    FromMemberId,
    ToMemberId,
    AmountMinor,
    SettledOn,
    Note,
    PersonalTransactionId,
    CreatedBy,
    CreatedAt,
    IdempotencyKey,
}

// ─────────────────────────────────────────────────────────────────────────────
// Migration implementation
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // ───────────────────────────────────────────────────────────────────
        // 1. Users
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Users::Username)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Users::Password).string().not_null())
                    .col(ColumnDef::new(Users::Email).string())
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 2. Groups
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Groups::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Groups::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Groups::Name).string().not_null())
                    .col(ColumnDef::new(Groups::Description).string())
                    .col(
                        ColumnDef::new(Groups::Category)
                            .string()
                            .not_null()
                            .default("other"),
                    )
                    .col(
                        ColumnDef::new(Groups::Currency)
                            .string()
                            .not_null()
                            .default("EUR"),
                    )
                    .col(ColumnDef::new(Groups::InviteCode).string().not_null())
                    .col(
                        ColumnDef::new(Groups::IsSettled)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Groups::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(ColumnDef::new(Groups::OwnerId).string().not_null())
                    .col(
                        ColumnDef::new(Groups::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-groups-invite_code")
                    .table(Groups::Table)
                    .col(Groups::InviteCode)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 3. Group members
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(GroupMembers::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(GroupMembers::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(GroupMembers::GroupId).uuid().not_null())
                    .col(ColumnDef::new(GroupMembers::Name).string().not_null())
                    .col(ColumnDef::new(GroupMembers::Email).string())
                    .col(ColumnDef::new(GroupMembers::UserId).string())
                    .col(
                        ColumnDef::new(GroupMembers::IsCreator)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(GroupMembers::JoinedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(GroupMembers::LeftAt).timestamp_with_time_zone())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-group_members-group_id")
                            .from(GroupMembers::Table, GroupMembers::GroupId)
                            .to(Groups::Table, Groups::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // One row per identity and group; placeholders (NULL) are not constrained.
        manager
            .create_index(
                Index::create()
                    .name("idx-group_members-group_id-user_id")
                    .table(GroupMembers::Table)
                    .col(GroupMembers::GroupId)
                    .col(GroupMembers::UserId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-group_members-user_id")
                    .table(GroupMembers::Table)
                    .col(GroupMembers::UserId)
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 4. Expenses
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Expenses::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Expenses::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Expenses::GroupId).uuid().not_null())
                    .col(ColumnDef::new(Expenses::Description).string().not_null())
                    .col(ColumnDef::new(Expenses::AmountMinor).big_integer().not_null())
                    .col(ColumnDef::new(Expenses::SplitType).string().not_null())
                    .col(ColumnDef::new(Expenses::ExpenseDate).date().not_null())
                    .col(ColumnDef::new(Expenses::Notes).string())
                    .col(ColumnDef::new(Expenses::PaidBy).uuid())
                    .col(ColumnDef::new(Expenses::CreatedBy).string().not_null())
                    .col(
                        ColumnDef::new(Expenses::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Expenses::IdempotencyKey).string())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-expenses-group_id")
                            .from(Expenses::Table, Expenses::GroupId)
                            .to(Groups::Table, Groups::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-expenses-group_id-expense_date")
                    .table(Expenses::Table)
                    .col(Expenses::GroupId)
                    .col(Expenses::ExpenseDate)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-expenses-idempotency_key")
                    .table(Expenses::Table)
                    .col(Expenses::GroupId)
                    .col(Expenses::CreatedBy)
                    .col(Expenses::IdempotencyKey)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 5. Payer entries and splits
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(ExpensePayers::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(ExpensePayers::ExpenseId).uuid().not_null())
                    .col(ColumnDef::new(ExpensePayers::MemberId).uuid().not_null())
                    .col(
                        ColumnDef::new(ExpensePayers::AmountMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .primary_key(
                        Index::create()
                            .col(ExpensePayers::ExpenseId)
                            .col(ExpensePayers::MemberId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-expense_payers-expense_id")
                            .from(ExpensePayers::Table, ExpensePayers::ExpenseId)
                            .to(Expenses::Table, Expenses::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-expense_payers-member_id")
                            .from(ExpensePayers::Table, ExpensePayers::MemberId)
                            .to(GroupMembers::Table, GroupMembers::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ExpenseSplits::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(ExpenseSplits::ExpenseId).uuid().not_null())
                    .col(ColumnDef::new(ExpenseSplits::MemberId).uuid().not_null())
                    .col(
                        ColumnDef::new(ExpenseSplits::AmountMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ExpenseSplits::PercentageBp).big_integer())
                    .col(
                        ColumnDef::new(ExpenseSplits::IsPaid)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .primary_key(
                        Index::create()
                            .col(ExpenseSplits::ExpenseId)
                            .col(ExpenseSplits::MemberId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-expense_splits-expense_id")
                            .from(ExpenseSplits::Table, ExpenseSplits::ExpenseId)
                            .to(Expenses::Table, Expenses::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-expense_splits-member_id")
                            .from(ExpenseSplits::Table, ExpenseSplits::MemberId)
                            .to(GroupMembers::Table, GroupMembers::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 6. Personal transactions
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(PersonalTransactions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PersonalTransactions::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(PersonalTransactions::UserId)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(PersonalTransactions::Kind).string().not_null())
                    .col(
                        ColumnDef::new(PersonalTransactions::AmountMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PersonalTransactions::Currency)
                            .string()
                            .not_null()
                            .default("EUR"),
                    )
                    .col(
                        ColumnDef::new(PersonalTransactions::OccurredOn)
                            .date()
                            .not_null(),
                    )
                    .col(ColumnDef::new(PersonalTransactions::Note).string())
                    .col(
                        ColumnDef::new(PersonalTransactions::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-personal_transactions-user_id")
                    .table(PersonalTransactions::Table)
                    .col(PersonalTransactions::UserId)
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 7. Settlements
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Settlements::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Settlements::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Settlements::GroupId).uuid().not_null())
                    .col(ColumnDef::new(Settlements::FromMemberId).uuid().not_null())
                    .col(ColumnDef::new(Settlements::ToMemberId).uuid().not_null())
                    .col(
                        ColumnDef::new(Settlements::AmountMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Settlements::SettledOn).date().not_null())
                    .col(ColumnDef::new(Settlements::Note).string())
                    .col(ColumnDef::new(Settlements::PersonalTransactionId).uuid())
                    .col(ColumnDef::new(Settlements::CreatedBy).string().not_null())
                    .col(
                        ColumnDef::new(Settlements::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Settlements::IdempotencyKey).string())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-settlements-group_id")
                            .from(Settlements::Table, Settlements::GroupId)
                            .to(Groups::Table, Groups::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-settlements-from_member_id")
                            .from(Settlements::Table, Settlements::FromMemberId)
                            .to(GroupMembers::Table, GroupMembers::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-settlements-to_member_id")
                            .from(Settlements::Table, Settlements::ToMemberId)
                            .to(GroupMembers::Table, GroupMembers::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-settlements-personal_transaction_id")
                            .from(Settlements::Table, Settlements::PersonalTransactionId)
                            .to(PersonalTransactions::Table, PersonalTransactions::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-settlements-group_id-settled_on")
                    .table(Settlements::Table)
                    .col(Settlements::GroupId)
                    .col(Settlements::SettledOn)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-settlements-idempotency_key")
                    .table(Settlements::Table)
                    .col(Settlements::GroupId)
                    .col(Settlements::CreatedBy)
                    .col(Settlements::IdempotencyKey)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Settlements::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(PersonalTransactions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ExpenseSplits::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ExpensePayers::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Expenses::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(GroupMembers::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Groups::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Users::Table).to_owned())
            .await?;
        Ok(())
    }
}
