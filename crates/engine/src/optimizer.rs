//! Settlement suggestions.
//!
//! Given the net balance of every member, propose point-to-point transfers
//! that bring every balance to zero.
//!
//! The algorithm is greedy:
//! - split members into debtors (balance < 0) and creditors (balance > 0);
//! - take the debtor with the largest debt and the creditor with the largest
//!   credit (ties: lowest member id);
//! - let the debtor pay `min(debt, credit)` to the creditor and decrease both;
//! - drop whoever reached zero, repeat until nobody is left.
//!
//! It always terminates and always zeroes every balance, but it does not
//! guarantee the minimum number of transfers: finding that is NP-hard and
//! the greedy result is the accepted contract.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::MoneyCents;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementSuggestion {
    pub from_member_id: Uuid,
    pub to_member_id: Uuid,
    pub amount: MoneyCents,
}

/// Compute the transfers that settle `balances`.
///
/// If the balances do not sum to zero the surplus side is left partially
/// unsettled and a warning is logged.
pub fn suggest_settlements(balances: &BTreeMap<Uuid, MoneyCents>) -> Vec<SettlementSuggestion> {
    let mut debtors: Vec<(Uuid, MoneyCents)> = balances
        .iter()
        .filter(|(_, b)| b.is_negative())
        .map(|(id, b)| (*id, b.abs()))
        .collect();
    let mut creditors: Vec<(Uuid, MoneyCents)> = balances
        .iter()
        .filter(|(_, b)| b.is_positive())
        .map(|(id, b)| (*id, *b))
        .collect();

    let mut result = Vec::new();

    while let (Some(d_idx), Some(c_idx)) = (largest(&debtors), largest(&creditors)) {
        let (debtor, debt) = debtors[d_idx];
        let (creditor, credit) = creditors[c_idx];
        let amount = debt.min(credit);

        result.push(SettlementSuggestion {
            from_member_id: debtor,
            to_member_id: creditor,
            amount,
        });

        debtors[d_idx].1 -= amount;
        creditors[c_idx].1 -= amount;
        if debtors[d_idx].1.is_zero() {
            debtors.swap_remove(d_idx);
        }
        if creditors[c_idx].1.is_zero() {
            creditors.swap_remove(c_idx);
        }
    }

    if !debtors.is_empty() || !creditors.is_empty() {
        tracing::warn!(
            debtors = debtors.len(),
            creditors = creditors.len(),
            "balances do not sum to zero, suggestions are partial"
        );
    }

    result
}

/// Index of the entry with the largest amount; ties go to the lowest id.
fn largest(entries: &[(Uuid, MoneyCents)]) -> Option<usize> {
    entries
        .iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| a.1.cmp(&b.1).then_with(|| b.0.cmp(&a.0)))
        .map(|(idx, _)| idx)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply(
        balances: &BTreeMap<Uuid, MoneyCents>,
        suggestions: &[SettlementSuggestion],
    ) -> BTreeMap<Uuid, MoneyCents> {
        let mut out = balances.clone();
        for s in suggestions {
            *out.entry(s.from_member_id).or_default() += s.amount;
            *out.entry(s.to_member_id).or_default() -= s.amount;
        }
        out
    }

    #[test]
    fn two_members_single_transfer() {
        let (a, b) = (Uuid::from_u128(1), Uuid::from_u128(2));
        let balances = BTreeMap::from([(a, MoneyCents::new(50_00)), (b, MoneyCents::new(-50_00))]);
        let suggestions = suggest_settlements(&balances);
        assert_eq!(
            suggestions,
            vec![SettlementSuggestion {
                from_member_id: b,
                to_member_id: a,
                amount: MoneyCents::new(50_00),
            }]
        );
    }

    #[test]
    fn largest_debtor_pays_largest_creditor_first() {
        let ids: Vec<Uuid> = (1..=4).map(Uuid::from_u128).collect();
        let balances = BTreeMap::from([
            (ids[0], MoneyCents::new(70_00)),
            (ids[1], MoneyCents::new(10_00)),
            (ids[2], MoneyCents::new(-60_00)),
            (ids[3], MoneyCents::new(-20_00)),
        ]);
        let suggestions = suggest_settlements(&balances);
        assert_eq!(suggestions[0].from_member_id, ids[2]);
        assert_eq!(suggestions[0].to_member_id, ids[0]);
        assert_eq!(suggestions[0].amount, MoneyCents::new(60_00));
        assert_eq!(suggestions.len(), 3);
        assert!(apply(&balances, &suggestions).values().all(|b| b.is_zero()));
    }

    #[test]
    fn every_balance_reaches_zero() {
        let ids: Vec<Uuid> = (1..=6).map(Uuid::from_u128).collect();
        let amounts = [33_34, -12_01, 5_00, -41_00, 27_67, -13_00];
        let balances: BTreeMap<Uuid, MoneyCents> = ids
            .iter()
            .zip(amounts)
            .map(|(id, a)| (*id, MoneyCents::new(a)))
            .collect();
        let suggestions = suggest_settlements(&balances);
        assert!(suggestions.iter().all(|s| s.amount.is_positive()));
        assert!(apply(&balances, &suggestions).values().all(|b| b.is_zero()));
    }

    #[test]
    fn settled_group_needs_no_transfer() {
        let balances = BTreeMap::from([(Uuid::from_u128(1), MoneyCents::ZERO)]);
        assert!(suggest_settlements(&balances).is_empty());
    }
}
