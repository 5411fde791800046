use std::collections::BTreeMap;

use chrono::NaiveDate;
use sea_orm::{Database, DatabaseConnection, EntityTrait};

use migration::MigratorTrait;
use split_engine::{
    Caller, Currency, Engine, EngineError, ExpenseCmd, Group, GroupPatch, LedgerPolicy, Member,
    MoneyCents, NewGroupCmd, Percentage, SettlementCmd, SettlementPatch, SplitStrategy,
    personal_transactions,
};
use uuid::Uuid;

async fn engine_with_db() -> (Engine, DatabaseConnection) {
    engine_with_policy(LedgerPolicy::default()).await
}

async fn engine_with_policy(policy: LedgerPolicy) -> (Engine, DatabaseConnection) {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let engine = Engine::builder()
        .database(db.clone())
        .policy(policy)
        .build()
        .await
        .unwrap();
    (engine, db)
}

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
}

fn cents(value: i64) -> MoneyCents {
    MoneyCents::new(value)
}

/// A group created by `alice` where every other name joins as a linked member.
async fn group_with(engine: &Engine, others: &[&str]) -> (Group, Vec<Member>) {
    let alice = Caller::new("alice");
    let group = engine
        .create_group(
            &alice,
            NewGroupCmd::new("Trip", Currency::Eur).creator_name("Alice"),
        )
        .await
        .unwrap();
    for name in others {
        let caller = Caller::new(name.to_lowercase());
        let outcome = engine
            .join_group(&caller, split_engine::JoinCmd::new(&group.invite_code, *name))
            .await
            .unwrap();
        assert!(outcome.member().is_some());
    }
    let members = engine.list_members(&alice, group.id).await.unwrap();
    (group, members)
}

fn id_of(members: &[Member], name: &str) -> Uuid {
    members.iter().find(|m| m.name == name).unwrap().id
}

#[tokio::test]
async fn scenario_equal_split_between_two() {
    let (engine, _db) = engine_with_db().await;
    let (group, members) = group_with(&engine, &["Bob"]).await;
    let (a, b) = (id_of(&members, "Alice"), id_of(&members, "Bob"));
    let alice = Caller::new("alice");

    engine
        .add_expense(
            &alice,
            ExpenseCmd::new(group.id, "Dinner", cents(100_00), day(1)).paid_by(a),
        )
        .await
        .unwrap();

    let balances = engine.group_balances(&alice, group.id).await.unwrap();
    assert_eq!(balances.balances.net(&a), cents(50_00));
    assert_eq!(balances.balances.net(&b), cents(-50_00));
    assert_eq!(balances.total(), MoneyCents::ZERO);

    let suggestions = engine.settlement_suggestions(&alice, group.id).await.unwrap();
    assert_eq!(suggestions.len(), 1);
    assert_eq!(suggestions[0].from_member_id, b);
    assert_eq!(suggestions[0].to_member_id, a);
    assert_eq!(suggestions[0].amount, cents(50_00));
}

#[tokio::test]
async fn scenario_percentage_split() {
    let (engine, _db) = engine_with_db().await;
    let (group, members) = group_with(&engine, &["Bob", "Carol"]).await;
    let (a, b, c) = (
        id_of(&members, "Alice"),
        id_of(&members, "Bob"),
        id_of(&members, "Carol"),
    );
    let alice = Caller::new("alice");

    let shares = BTreeMap::from([
        (a, Percentage::from_basis_points(5_000)),
        (b, Percentage::from_basis_points(3_000)),
        (c, Percentage::from_basis_points(2_000)),
    ]);
    let expense_id = engine
        .add_expense(
            &alice,
            ExpenseCmd::new(group.id, "Hotel", cents(90_00), day(2))
                .paid_by(a)
                .split(SplitStrategy::Percentage(shares)),
        )
        .await
        .unwrap();

    let balances = engine.group_balances(&alice, group.id).await.unwrap().balances;
    assert_eq!(balances.net(&a), cents(45_00));
    assert_eq!(balances.net(&b), cents(-27_00));
    assert_eq!(balances.net(&c), cents(-18_00));

    let expense = engine.expense(&alice, expense_id).await.unwrap();
    assert_eq!(expense.splits.len(), 3);
    let total_pct: Percentage = expense.splits.iter().filter_map(|s| s.percentage).sum();
    assert_eq!(total_pct, Percentage::HUNDRED);
}

#[tokio::test]
async fn scenario_multi_payer_equal_split() {
    let (engine, _db) = engine_with_db().await;
    let (group, members) = group_with(&engine, &["Bob", "Carol"]).await;
    let (a, b, c) = (
        id_of(&members, "Alice"),
        id_of(&members, "Bob"),
        id_of(&members, "Carol"),
    );
    let alice = Caller::new("alice");

    let expense_id = engine
        .add_expense(
            &alice,
            ExpenseCmd::new(group.id, "Car rental", cents(200_00), day(3))
                .payer(a, cents(120_00))
                .payer(b, cents(80_00)),
        )
        .await
        .unwrap();

    let expense = engine.expense(&alice, expense_id).await.unwrap();
    assert_eq!(expense.paid_by, None);
    let paid: MoneyCents = expense.payers.iter().map(|p| p.amount).sum();
    let owed: MoneyCents = expense.splits.iter().map(|s| s.amount).sum();
    assert_eq!(paid, cents(200_00));
    assert_eq!(owed, cents(200_00));

    let balances = engine.group_balances(&alice, group.id).await.unwrap().balances;
    // Each net is within one cent of the exact third.
    for (member, exact) in [(a, 53_33), (b, 13_33), (c, -66_67)] {
        assert!((balances.net(&member).cents() - exact).abs() <= 1);
    }
    assert_eq!(balances.total(), MoneyCents::ZERO);
}

#[tokio::test]
async fn equal_split_of_hundred_among_three() {
    let (engine, _db) = engine_with_db().await;
    let (group, _) = group_with(&engine, &["Bob", "Carol"]).await;
    let alice = Caller::new("alice");
    let payer = engine.list_members(&alice, group.id).await.unwrap()[0].id;

    let expense_id = engine
        .add_expense(
            &alice,
            ExpenseCmd::new(group.id, "Museum", cents(100_00), day(4)).paid_by(payer),
        )
        .await
        .unwrap();

    let expense = engine.expense(&alice, expense_id).await.unwrap();
    let mut amounts: Vec<i64> = expense.splits.iter().map(|s| s.amount.cents()).collect();
    amounts.sort_unstable();
    assert_eq!(amounts, vec![33_33, 33_33, 33_34]);
}

#[tokio::test]
async fn mismatched_payers_write_nothing() {
    let (engine, _db) = engine_with_db().await;
    let (group, members) = group_with(&engine, &["Bob"]).await;
    let (a, b) = (id_of(&members, "Alice"), id_of(&members, "Bob"));
    let alice = Caller::new("alice");

    let err = engine
        .add_expense(
            &alice,
            ExpenseCmd::new(group.id, "Groceries", cents(50_00), day(5))
                .payer(a, cents(30_00))
                .payer(b, cents(10_00)),
        )
        .await
        .unwrap_err();
    assert_eq!(
        err,
        EngineError::PayerMismatch {
            expected: cents(50_00),
            actual: cents(40_00),
        }
    );

    let custom = BTreeMap::from([(a, cents(20_00)), (b, cents(20_00))]);
    let err = engine
        .add_expense(
            &alice,
            ExpenseCmd::new(group.id, "Groceries", cents(50_00), day(5))
                .paid_by(a)
                .split(SplitStrategy::Custom(custom)),
        )
        .await
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "Split mismatch: splits total 40.00, expected 50.00"
    );

    assert!(engine.list_expenses(&alice, group.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn resubmitted_expense_is_recorded_once() {
    let (engine, _db) = engine_with_db().await;
    let (group, members) = group_with(&engine, &["Bob"]).await;
    let a = id_of(&members, "Alice");
    let alice = Caller::new("alice");

    let cmd = ExpenseCmd::new(group.id, "Taxi", cents(24_00), day(6))
        .paid_by(a)
        .idempotency_key("req-1");
    let first = engine.add_expense(&alice, cmd.clone()).await.unwrap();
    let second = engine.add_expense(&alice, cmd).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(engine.list_expenses(&alice, group.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn update_expense_replaces_rows() {
    let (engine, _db) = engine_with_db().await;
    let (group, members) = group_with(&engine, &["Bob"]).await;
    let (a, b) = (id_of(&members, "Alice"), id_of(&members, "Bob"));
    let alice = Caller::new("alice");
    let bob = Caller::new("bob");

    let expense_id = engine
        .add_expense(
            &alice,
            ExpenseCmd::new(group.id, "Lunch", cents(40_00), day(7)).paid_by(a),
        )
        .await
        .unwrap();

    let updated = engine
        .update_expense(
            &bob,
            expense_id,
            ExpenseCmd::new(group.id, "Lunch", cents(60_00), day(7))
                .paid_by(b)
                .split(SplitStrategy::Custom(BTreeMap::from([
                    (a, cents(60_00)),
                    (b, MoneyCents::ZERO),
                ]))),
        )
        .await
        .unwrap();
    assert_eq!(updated.amount, cents(60_00));
    assert_eq!(updated.payers.len(), 1);
    assert_eq!(updated.created_by, "alice");

    let balances = engine.group_balances(&alice, group.id).await.unwrap().balances;
    assert_eq!(balances.net(&a), cents(-60_00));
    assert_eq!(balances.net(&b), cents(60_00));
}

#[tokio::test]
async fn editing_keeps_removed_member_on_the_expense() {
    let (engine, _db) = engine_with_db().await;
    let (group, members) = group_with(&engine, &["Bob", "Carol"]).await;
    let (a, b, c) = (
        id_of(&members, "Alice"),
        id_of(&members, "Bob"),
        id_of(&members, "Carol"),
    );
    let alice = Caller::new("alice");

    let expense_id = engine
        .add_expense(
            &alice,
            ExpenseCmd::new(group.id, "Groceries", cents(90_00), day(3)).paid_by(a),
        )
        .await
        .unwrap();
    engine
        .record_settlement(&alice, SettlementCmd::new(group.id, c, a, cents(30_00), day(4)))
        .await
        .unwrap();
    engine.remove_member(&alice, group.id, c).await.unwrap();

    let updated = engine
        .update_expense(
            &alice,
            expense_id,
            ExpenseCmd::new(group.id, "Groceries and wine", cents(90_00), day(3)).paid_by(a),
        )
        .await
        .unwrap();
    assert_eq!(updated.splits.len(), 3);

    let balances = engine.group_balances(&alice, group.id).await.unwrap();
    assert_eq!(balances.balances.net(&c), MoneyCents::ZERO);
    assert_eq!(balances.balances.net(&a), cents(30_00));
    assert_eq!(balances.balances.net(&b), cents(-30_00));
    assert_eq!(balances.total(), MoneyCents::ZERO);
}

#[tokio::test]
async fn overflowing_payer_amounts_are_rejected() {
    let (engine, _db) = engine_with_db().await;
    let (group, members) = group_with(&engine, &["Bob", "Carol"]).await;
    let ids = ["Alice", "Bob", "Carol"].map(|name| id_of(&members, name));
    let alice = Caller::new("alice");

    let mut cmd = ExpenseCmd::new(group.id, "Typo", cents(1), day(5));
    for (id, amount) in ids.into_iter().zip([i64::MAX, i64::MAX, 3]) {
        cmd = cmd.payer(id, cents(amount));
    }
    let err = engine.add_expense(&alice, cmd).await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidAmount(_)));
    assert!(engine.list_expenses(&alice, group.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn edit_policy_and_admin_only_delete() {
    let policy = LedgerPolicy {
        expense_edit_requires_admin: true,
    };
    let (engine, _db) = engine_with_policy(policy).await;
    let (group, members) = group_with(&engine, &["Bob"]).await;
    let a = id_of(&members, "Alice");
    let alice = Caller::new("alice");
    let bob = Caller::new("bob");

    let cmd = ExpenseCmd::new(group.id, "Snacks", cents(8_00), day(8)).paid_by(a);
    let expense_id = engine.add_expense(&bob, cmd.clone()).await.unwrap();

    let err = engine
        .update_expense(&bob, expense_id, cmd.clone())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Forbidden(_)));
    engine.update_expense(&alice, expense_id, cmd).await.unwrap();

    let err = engine.delete_expense(&bob, expense_id).await.unwrap_err();
    assert!(matches!(err, EngineError::Forbidden(_)));
    engine.delete_expense(&alice, expense_id).await.unwrap();
    assert!(engine.list_expenses(&alice, group.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn outsiders_do_not_see_the_group() {
    let (engine, _db) = engine_with_db().await;
    let (group, _) = group_with(&engine, &[]).await;
    let mallory = Caller::new("mallory");

    let err = engine.group(&mallory, group.id).await.unwrap_err();
    assert_eq!(err, EngineError::KeyNotFound("group not exists".to_string()));
    assert!(engine.list_groups(&mallory).await.unwrap().is_empty());
}

#[tokio::test]
async fn settling_up_zeroes_balances_and_allows_mark_settled() {
    let (engine, _db) = engine_with_db().await;
    let (group, members) = group_with(&engine, &["Bob", "Carol"]).await;
    let a = id_of(&members, "Alice");
    let alice = Caller::new("alice");

    engine
        .add_expense(
            &alice,
            ExpenseCmd::new(group.id, "Boat", cents(150_00), day(9)).paid_by(a),
        )
        .await
        .unwrap();

    let err = engine.mark_settled(&alice, group.id).await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidState(_)));

    for suggestion in engine.settlement_suggestions(&alice, group.id).await.unwrap() {
        engine
            .record_settlement(
                &alice,
                SettlementCmd::from_suggestion(group.id, &suggestion, day(10)),
            )
            .await
            .unwrap();
    }

    let balances = engine.group_balances(&alice, group.id).await.unwrap();
    assert!(balances.balances.is_settled());
    assert!(engine.mark_settled(&alice, group.id).await.unwrap().is_settled);
    assert!(engine.group(&alice, group.id).await.unwrap().is_settled);
}

#[tokio::test]
async fn mirrored_settlement_follows_edits_and_delete() {
    let (engine, db) = engine_with_db().await;
    let (group, members) = group_with(&engine, &["Bob"]).await;
    let (a, b) = (id_of(&members, "Alice"), id_of(&members, "Bob"));
    let alice = Caller::new("alice");
    let bob = Caller::new("bob");

    let settlement = engine
        .record_settlement(
            &bob,
            SettlementCmd::new(group.id, b, a, cents(25_00), day(11))
                .note("cash")
                .mirror(),
        )
        .await
        .unwrap();
    let mirror_id = settlement.personal_transaction_id.unwrap();

    let mirror = personal_transactions::Entity::find_by_id(mirror_id)
        .one(&db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(mirror.user_id, "bob");
    assert_eq!(mirror.kind, "expense");
    assert_eq!(mirror.amount_minor, 25_00);
    assert_eq!(mirror.currency, "EUR");

    let err = engine
        .update_settlement(&bob, settlement.id, SettlementPatch::default())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Forbidden(_)));

    let patch = SettlementPatch {
        amount: Some(cents(30_00)),
        ..Default::default()
    };
    let updated = engine
        .update_settlement(&alice, settlement.id, patch)
        .await
        .unwrap();
    assert_eq!(updated.amount, cents(30_00));
    let mirror = personal_transactions::Entity::find_by_id(mirror_id)
        .one(&db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(mirror.amount_minor, 30_00);

    engine.delete_settlement(&alice, settlement.id).await.unwrap();
    assert!(
        personal_transactions::Entity::find_by_id(mirror_id)
            .one(&db)
            .await
            .unwrap()
            .is_none()
    );
    assert!(engine.list_settlements(&alice, group.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn receiving_side_mirrors_as_income() {
    let (engine, db) = engine_with_db().await;
    let (group, members) = group_with(&engine, &["Bob"]).await;
    let (a, b) = (id_of(&members, "Alice"), id_of(&members, "Bob"));
    let alice = Caller::new("alice");

    let settlement = engine
        .record_settlement(
            &alice,
            SettlementCmd::new(group.id, b, a, cents(5_00), day(12)).mirror(),
        )
        .await
        .unwrap();
    let mirror = personal_transactions::Entity::find_by_id(settlement.personal_transaction_id.unwrap())
        .one(&db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(mirror.user_id, "alice");
    assert_eq!(mirror.kind, "income");
}

#[tokio::test]
async fn settlement_validation() {
    let (engine, _db) = engine_with_db().await;
    let (group, members) = group_with(&engine, &["Bob"]).await;
    let (a, b) = (id_of(&members, "Alice"), id_of(&members, "Bob"));
    let alice = Caller::new("alice");

    let err = engine
        .record_settlement(&alice, SettlementCmd::new(group.id, a, a, cents(1_00), day(1)))
        .await
        .unwrap_err();
    assert!(err.is_validation());

    let err = engine
        .record_settlement(&alice, SettlementCmd::new(group.id, a, b, MoneyCents::ZERO, day(1)))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidAmount(_)));

    let cmd = SettlementCmd::new(group.id, b, a, cents(1_00), day(1)).idempotency_key("s-1");
    let first = engine.record_settlement(&alice, cmd.clone()).await.unwrap();
    let second = engine.record_settlement(&alice, cmd).await.unwrap();
    assert_eq!(first.id, second.id);
}

#[tokio::test]
async fn archived_group_rejects_new_rows() {
    let (engine, _db) = engine_with_db().await;
    let (group, members) = group_with(&engine, &["Bob"]).await;
    let a = id_of(&members, "Alice");
    let alice = Caller::new("alice");

    engine
        .update_group_settings(
            &alice,
            group.id,
            GroupPatch {
                is_active: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let err = engine
        .add_expense(
            &alice,
            ExpenseCmd::new(group.id, "Late fee", cents(3_00), day(13)).paid_by(a),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidState(_)));
}

#[tokio::test]
async fn currency_is_locked_once_expenses_exist() {
    let (engine, _db) = engine_with_db().await;
    let (group, members) = group_with(&engine, &["Bob"]).await;
    let a = id_of(&members, "Alice");
    let alice = Caller::new("alice");
    let bob = Caller::new("bob");

    let to_usd = GroupPatch {
        currency: Some(Currency::Usd),
        ..Default::default()
    };
    let err = engine
        .update_group_settings(&bob, group.id, to_usd.clone())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Forbidden(_)));

    let updated = engine
        .update_group_settings(&alice, group.id, to_usd)
        .await
        .unwrap();
    assert_eq!(updated.currency, Currency::Usd);

    engine
        .add_expense(
            &alice,
            ExpenseCmd::new(group.id, "Tickets", cents(12_00), day(14)).paid_by(a),
        )
        .await
        .unwrap();
    let err = engine
        .update_group_settings(
            &alice,
            group.id,
            GroupPatch {
                currency: Some(Currency::Gbp),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidState(_)));
}

#[tokio::test]
async fn split_paid_flag_is_informational() {
    let (engine, _db) = engine_with_db().await;
    let (group, members) = group_with(&engine, &["Bob", "Carol"]).await;
    let (a, b, c) = (
        id_of(&members, "Alice"),
        id_of(&members, "Bob"),
        id_of(&members, "Carol"),
    );
    let alice = Caller::new("alice");
    let bob = Caller::new("bob");

    let expense_id = engine
        .add_expense(
            &alice,
            ExpenseCmd::new(group.id, "Fuel", cents(30_00), day(15)).paid_by(a),
        )
        .await
        .unwrap();
    let before = engine.group_balances(&alice, group.id).await.unwrap();

    engine.set_split_paid(&bob, expense_id, b, true).await.unwrap();
    let err = engine
        .set_split_paid(&bob, expense_id, c, true)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Forbidden(_)));

    let expense = engine.expense(&alice, expense_id).await.unwrap();
    assert!(expense.splits.iter().any(|s| s.member_id == b && s.is_paid));
    assert_eq!(engine.group_balances(&alice, group.id).await.unwrap(), before);
}
