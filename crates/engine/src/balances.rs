//! Balance computation.
//!
//! Balances are never stored: they are derived from the expenses, payer
//! entries, splits and settlements of a group every time they are needed.
//!
//! For a member `m`:
//!
//! ```text
//! balance(m) = paid(m) - owed(m) + settled_out(m) - settled_in(m)
//! ```
//!
//! A positive balance means the others owe `m`; a negative one means `m`
//! owes. Paying a settlement moves the payer's balance up towards zero,
//! receiving one moves the receiver's balance down.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Expense, MoneyCents, Settlement};

/// The components of one member's balance.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberBalance {
    pub paid: MoneyCents,
    pub owed: MoneyCents,
    pub settled_out: MoneyCents,
    pub settled_in: MoneyCents,
}

impl MemberBalance {
    #[must_use]
    pub fn net(&self) -> MoneyCents {
        self.paid - self.owed + self.settled_out - self.settled_in
    }
}

/// Balances of every member of a group, keyed by member id.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balances(BTreeMap<Uuid, MemberBalance>);

impl Balances {
    /// Derive balances from a group's rows.
    ///
    /// `members` seeds a zero entry for everyone (including members without
    /// any row yet); members referenced only by rows are added as well.
    pub fn compute<'a>(
        members: impl IntoIterator<Item = Uuid>,
        expenses: impl IntoIterator<Item = &'a Expense>,
        settlements: impl IntoIterator<Item = &'a Settlement>,
    ) -> Self {
        let mut map: BTreeMap<Uuid, MemberBalance> = members
            .into_iter()
            .map(|id| (id, MemberBalance::default()))
            .collect();

        for expense in expenses {
            for payer in expense.effective_payers() {
                map.entry(payer.member_id).or_default().paid += payer.amount;
            }
            for split in &expense.splits {
                map.entry(split.member_id).or_default().owed += split.amount;
            }
        }

        for settlement in settlements {
            map.entry(settlement.from_member_id).or_default().settled_out += settlement.amount;
            map.entry(settlement.to_member_id).or_default().settled_in += settlement.amount;
        }

        Self(map)
    }

    pub fn get(&self, member_id: &Uuid) -> Option<&MemberBalance> {
        self.0.get(member_id)
    }

    /// Net balance of a member (zero for unknown members).
    pub fn net(&self, member_id: &Uuid) -> MoneyCents {
        self.0
            .get(member_id)
            .map(MemberBalance::net)
            .unwrap_or_default()
    }

    /// Net balance per member, in member id order.
    pub fn net_map(&self) -> BTreeMap<Uuid, MoneyCents> {
        self.0.iter().map(|(id, b)| (*id, b.net())).collect()
    }

    /// Sum of all net balances; zero for any consistent ledger.
    pub fn total(&self) -> MoneyCents {
        self.0.values().map(MemberBalance::net).sum()
    }

    /// `true` when every member's net balance is zero.
    pub fn is_settled(&self) -> bool {
        self.0.values().all(|b| b.net().is_zero())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Uuid, &MemberBalance)> {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, Utc};

    use super::*;
    use crate::{PayerEntry, SplitEntry, SplitType};

    fn expense(amount: i64, payers: &[(Uuid, i64)], splits: &[(Uuid, i64)]) -> Expense {
        Expense {
            id: Uuid::new_v4(),
            group_id: Uuid::nil(),
            description: "test".to_string(),
            amount: MoneyCents::new(amount),
            split_type: SplitType::Custom,
            expense_date: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            notes: None,
            paid_by: None,
            created_by: "alice".to_string(),
            created_at: Utc::now(),
            payers: payers
                .iter()
                .map(|(id, a)| PayerEntry {
                    member_id: *id,
                    amount: MoneyCents::new(*a),
                })
                .collect(),
            splits: splits
                .iter()
                .map(|(id, a)| SplitEntry {
                    member_id: *id,
                    amount: MoneyCents::new(*a),
                    percentage: None,
                    is_paid: false,
                })
                .collect(),
        }
    }

    fn settlement(from: Uuid, to: Uuid, amount: i64) -> Settlement {
        Settlement {
            id: Uuid::new_v4(),
            group_id: Uuid::nil(),
            from_member_id: from,
            to_member_id: to,
            amount: MoneyCents::new(amount),
            settled_on: NaiveDate::from_ymd_opt(2026, 1, 2).unwrap(),
            note: None,
            personal_transaction_id: None,
            created_by: "alice".to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn multi_payer_equal_split() {
        let (a, b, c) = (Uuid::from_u128(1), Uuid::from_u128(2), Uuid::from_u128(3));
        let e = expense(
            200_00,
            &[(a, 120_00), (b, 80_00)],
            &[(a, 66_67), (b, 66_67), (c, 66_66)],
        );
        let balances = Balances::compute([a, b, c], [&e], []);
        assert_eq!(balances.net(&a), MoneyCents::new(53_33));
        assert_eq!(balances.net(&b), MoneyCents::new(13_33));
        assert_eq!(balances.net(&c), MoneyCents::new(-66_66));
        assert_eq!(balances.total(), MoneyCents::ZERO);
    }

    #[test]
    fn settlement_moves_both_sides_towards_zero() {
        let (a, b) = (Uuid::from_u128(1), Uuid::from_u128(2));
        let e = expense(100_00, &[(a, 100_00)], &[(a, 50_00), (b, 50_00)]);
        let s = settlement(b, a, 50_00);
        let balances = Balances::compute([a, b], [&e], [&s]);
        assert!(balances.is_settled());
        assert_eq!(balances.get(&b).unwrap().settled_out, MoneyCents::new(50_00));
    }

    #[test]
    fn legacy_payer_counts_when_no_entries() {
        let (a, b) = (Uuid::from_u128(1), Uuid::from_u128(2));
        let mut e = expense(40_00, &[], &[(a, 20_00), (b, 20_00)]);
        e.paid_by = Some(b);
        let balances = Balances::compute([a, b], [&e], []);
        assert_eq!(balances.net(&b), MoneyCents::new(20_00));
        assert_eq!(balances.net(&a), MoneyCents::new(-20_00));
    }

    #[test]
    fn computation_is_repeatable() {
        let (a, b) = (Uuid::from_u128(1), Uuid::from_u128(2));
        let e = expense(10_00, &[(b, 10_00)], &[(a, 5_00), (b, 5_00)]);
        let first = Balances::compute([a, b], [&e], []);
        let second = Balances::compute([a, b], [&e], []);
        assert_eq!(first, second);
    }
}
