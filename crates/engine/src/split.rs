//! Payer and split allocation for an expense.
//!
//! Everything here is pure: the engine resolves the active members of the
//! group, calls [`allocate_payers`] and [`allocate_splits`], and persists the
//! result only when both succeed. The returned allocations always sum to the
//! expense amount exactly.
//!
//! Rounding: whenever an amount cannot be divided exactly, the leftover cents
//! go one each to the members with the largest fractional share; ties are
//! broken by ascending member id.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    EngineError, MoneyCents, Percentage, ResultEngine, expenses::SplitType,
};

/// How an expense is divided among the members of its group.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "shares", rename_all = "snake_case")]
pub enum SplitStrategy {
    /// Every active member owes the same share.
    Equal,
    /// Share per member in percent; must total 100.
    Percentage(BTreeMap<Uuid, Percentage>),
    /// Share per member as an amount; must total the expense amount.
    Custom(BTreeMap<Uuid, MoneyCents>),
}

impl SplitStrategy {
    pub fn split_type(&self) -> SplitType {
        match self {
            Self::Equal => SplitType::Equal,
            Self::Percentage(_) => SplitType::Percentage,
            Self::Custom(_) => SplitType::Custom,
        }
    }
}

/// Amount contributed by one payer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayerShare {
    pub member_id: Uuid,
    /// Ignored when the expense has a single payer.
    pub amount: MoneyCents,
}

/// One computed split row.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SplitShare {
    pub member_id: Uuid,
    pub amount: MoneyCents,
    pub percentage: Option<Percentage>,
}

/// Validate the payers of an expense and return the allocation to persist.
///
/// - at least one payer;
/// - a single payer pays the full amount, whatever amount it carries;
/// - with more payers every amount must be > 0 and the total must match.
pub fn allocate_payers(
    amount: MoneyCents,
    payers: &[PayerShare],
    members: &[Uuid],
) -> ResultEngine<Vec<PayerShare>> {
    ensure_positive(amount)?;
    if payers.is_empty() {
        return Err(EngineError::InvalidAmount(
            "an expense needs at least one payer".to_string(),
        ));
    }

    let mut seen = HashSet::with_capacity(payers.len());
    for payer in payers {
        ensure_member(members, payer.member_id)?;
        if !seen.insert(payer.member_id) {
            return Err(EngineError::InvalidAmount(format!(
                "member {} appears twice among payers",
                payer.member_id
            )));
        }
    }

    if let [single] = payers {
        return Ok(vec![PayerShare {
            member_id: single.member_id,
            amount,
        }]);
    }

    if let Some(payer) = payers.iter().find(|p| !p.amount.is_positive()) {
        return Err(EngineError::InvalidAmount(format!(
            "payer {} amount must be > 0",
            payer.member_id
        )));
    }
    let total = checked_total(payers.iter().map(|p| p.amount), "payer")?;
    if total != amount {
        return Err(EngineError::PayerMismatch {
            expected: amount,
            actual: total,
        });
    }
    Ok(payers.to_vec())
}

/// Compute one split row per member in `members`.
///
/// Members absent from a percentage/custom map get a zero share; map keys
/// that are not in `members` are rejected.
pub fn allocate_splits(
    amount: MoneyCents,
    strategy: &SplitStrategy,
    members: &[Uuid],
) -> ResultEngine<Vec<SplitShare>> {
    ensure_positive(amount)?;
    if members.is_empty() {
        return Err(EngineError::InvalidState(
            "group has no active members".to_string(),
        ));
    }
    let mut members = members.to_vec();
    members.sort();
    members.dedup();

    match strategy {
        SplitStrategy::Equal => {
            let weights: Vec<(Uuid, i64)> = members.iter().map(|id| (*id, 1)).collect();
            let amounts = distribute(amount, &weights)?;
            Ok(amounts
                .into_iter()
                .map(|(member_id, amount)| SplitShare {
                    member_id,
                    amount,
                    percentage: None,
                })
                .collect())
        }
        SplitStrategy::Percentage(shares) => {
            for (member_id, pct) in shares {
                ensure_member(&members, *member_id)?;
                if pct.is_negative() {
                    return Err(EngineError::InvalidAmount(format!(
                        "percentage for member {member_id} must be >= 0"
                    )));
                }
            }
            let total = shares
                .values()
                .try_fold(0_i64, |acc, pct| acc.checked_add(pct.basis_points()))
                .map(Percentage::from_basis_points)
                .ok_or_else(|| {
                    EngineError::InvalidAmount("percentage total overflows".to_string())
                })?;
            if total != Percentage::HUNDRED {
                return Err(EngineError::PercentageMismatch { actual: total });
            }
            let weights: Vec<(Uuid, i64)> = members
                .iter()
                .map(|id| {
                    let bp = shares.get(id).copied().unwrap_or_default();
                    (*id, bp.basis_points())
                })
                .collect();
            let amounts = distribute(amount, &weights)?;
            Ok(amounts
                .into_iter()
                .map(|(member_id, amount)| SplitShare {
                    member_id,
                    amount,
                    percentage: Some(shares.get(&member_id).copied().unwrap_or_default()),
                })
                .collect())
        }
        SplitStrategy::Custom(shares) => {
            for (member_id, share) in shares {
                ensure_member(&members, *member_id)?;
                if share.is_negative() {
                    return Err(EngineError::InvalidAmount(format!(
                        "share for member {member_id} must be >= 0"
                    )));
                }
            }
            let total = checked_total(shares.values().copied(), "share")?;
            if total != amount {
                return Err(EngineError::SplitMismatch {
                    expected: amount,
                    actual: total,
                });
            }
            Ok(members
                .iter()
                .map(|id| SplitShare {
                    member_id: *id,
                    amount: shares.get(id).copied().unwrap_or_default(),
                    percentage: None,
                })
                .collect())
        }
    }
}

/// Largest-remainder distribution of `amount` proportionally to `weights`.
///
/// `weights` must be sorted by member id; the output keeps that order.
fn distribute(amount: MoneyCents, weights: &[(Uuid, i64)]) -> ResultEngine<Vec<(Uuid, MoneyCents)>> {
    let total_weight: i128 = weights.iter().map(|(_, w)| i128::from(*w)).sum();
    if total_weight <= 0 {
        return Err(EngineError::InvalidAmount(
            "split weights must total more than zero".to_string(),
        ));
    }
    let cents = i128::from(amount.cents());

    let mut floors: Vec<(Uuid, i128, i128)> = weights
        .iter()
        .map(|(id, w)| {
            let exact = cents * i128::from(*w);
            (*id, exact / total_weight, exact % total_weight)
        })
        .collect();

    let allocated: i128 = floors.iter().map(|(_, floor, _)| floor).sum();
    let leftover = usize::try_from(cents - allocated)
        .map_err(|_| EngineError::InvalidAmount("split rounding overflow".to_string()))?;

    // Largest fractional part first, then ascending member id.
    let mut order: Vec<usize> = (0..floors.len()).collect();
    order.sort_by(|&a, &b| {
        floors[b]
            .2
            .cmp(&floors[a].2)
            .then_with(|| floors[a].0.cmp(&floors[b].0))
    });
    for &idx in order.iter().take(leftover) {
        floors[idx].1 += 1;
    }

    floors
        .into_iter()
        .map(|(id, share, _)| {
            i64::try_from(share)
                .map(|c| (id, MoneyCents::new(c)))
                .map_err(|_| EngineError::InvalidAmount("amount too large".to_string()))
        })
        .collect()
}

fn checked_total(
    amounts: impl IntoIterator<Item = MoneyCents>,
    what: &str,
) -> ResultEngine<MoneyCents> {
    amounts
        .into_iter()
        .try_fold(MoneyCents::ZERO, MoneyCents::checked_add)
        .ok_or_else(|| EngineError::InvalidAmount(format!("{what} total overflows")))
}

fn ensure_positive(amount: MoneyCents) -> ResultEngine<()> {
    if !amount.is_positive() {
        return Err(EngineError::InvalidAmount(format!(
            "expense amount must be > 0, got {amount}"
        )));
    }
    Ok(())
}

fn ensure_member(members: &[Uuid], member_id: Uuid) -> ResultEngine<()> {
    if !members.contains(&member_id) {
        return Err(EngineError::KeyNotFound(format!("member {member_id}")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(n: u128) -> Vec<Uuid> {
        (1..=n).map(Uuid::from_u128).collect()
    }

    #[test]
    fn equal_split_gives_remainder_to_lowest_ids() {
        let members = ids(3);
        let splits =
            allocate_splits(MoneyCents::new(100_00), &SplitStrategy::Equal, &members).unwrap();
        let amounts: Vec<i64> = splits.iter().map(|s| s.amount.cents()).collect();
        assert_eq!(amounts, vec![33_34, 33_33, 33_33]);
        assert_eq!(splits[0].member_id, members[0]);
    }

    #[test]
    fn equal_split_of_two_hundred() {
        let splits =
            allocate_splits(MoneyCents::new(200_00), &SplitStrategy::Equal, &ids(3)).unwrap();
        let amounts: Vec<i64> = splits.iter().map(|s| s.amount.cents()).collect();
        assert_eq!(amounts, vec![66_67, 66_67, 66_66]);
    }

    #[test]
    fn percentage_split_derives_amounts() {
        let m = ids(3);
        let shares = BTreeMap::from([
            (m[0], Percentage::from_basis_points(5_000)),
            (m[1], Percentage::from_basis_points(3_000)),
            (m[2], Percentage::from_basis_points(2_000)),
        ]);
        let splits =
            allocate_splits(MoneyCents::new(90_00), &SplitStrategy::Percentage(shares), &m)
                .unwrap();
        let amounts: Vec<i64> = splits.iter().map(|s| s.amount.cents()).collect();
        assert_eq!(amounts, vec![45_00, 27_00, 18_00]);
        assert_eq!(
            splits.iter().filter_map(|s| s.percentage).sum::<Percentage>(),
            Percentage::HUNDRED
        );
    }

    #[test]
    fn percentage_rounding_still_sums_to_amount() {
        let m = ids(3);
        let shares = BTreeMap::from([
            (m[0], Percentage::from_basis_points(3_333)),
            (m[1], Percentage::from_basis_points(3_333)),
            (m[2], Percentage::from_basis_points(3_334)),
        ]);
        let splits =
            allocate_splits(MoneyCents::new(10_00), &SplitStrategy::Percentage(shares), &m)
                .unwrap();
        let total: MoneyCents = splits.iter().map(|s| s.amount).sum();
        assert_eq!(total, MoneyCents::new(10_00));
    }

    #[test]
    fn percentage_must_total_hundred() {
        let m = ids(2);
        let shares = BTreeMap::from([
            (m[0], Percentage::from_basis_points(5_000)),
            (m[1], Percentage::from_basis_points(4_850)),
        ]);
        let err = allocate_splits(MoneyCents::new(10_00), &SplitStrategy::Percentage(shares), &m)
            .unwrap_err();
        assert_eq!(
            err,
            EngineError::PercentageMismatch {
                actual: Percentage::from_basis_points(9_850)
            }
        );
    }

    #[test]
    fn custom_split_must_match_amount() {
        let m = ids(2);
        let shares = BTreeMap::from([(m[0], MoneyCents::new(60_00)), (m[1], MoneyCents::new(38_50))]);
        let err = allocate_splits(MoneyCents::new(100_00), &SplitStrategy::Custom(shares), &m)
            .unwrap_err();
        assert_eq!(err.to_string(), "Split mismatch: splits total 98.50, expected 100.00");
    }

    #[test]
    fn custom_split_fills_missing_members_with_zero() {
        let m = ids(3);
        let shares = BTreeMap::from([(m[0], MoneyCents::new(70_00)), (m[2], MoneyCents::new(30_00))]);
        let splits =
            allocate_splits(MoneyCents::new(100_00), &SplitStrategy::Custom(shares), &m).unwrap();
        assert_eq!(splits.len(), 3);
        assert_eq!(splits[1].amount, MoneyCents::ZERO);
    }

    #[test]
    fn split_rejects_unknown_member() {
        let m = ids(2);
        let shares = BTreeMap::from([(Uuid::from_u128(99), MoneyCents::new(10_00))]);
        assert!(matches!(
            allocate_splits(MoneyCents::new(10_00), &SplitStrategy::Custom(shares), &m),
            Err(EngineError::KeyNotFound(_))
        ));
    }

    #[test]
    fn single_payer_pays_everything() {
        let m = ids(2);
        let payers = allocate_payers(
            MoneyCents::new(100_00),
            &[PayerShare {
                member_id: m[0],
                amount: MoneyCents::ZERO,
            }],
            &m,
        )
        .unwrap();
        assert_eq!(payers[0].amount, MoneyCents::new(100_00));
    }

    #[test]
    fn multi_payer_total_must_match() {
        let m = ids(2);
        let err = allocate_payers(
            MoneyCents::new(200_00),
            &[
                PayerShare {
                    member_id: m[0],
                    amount: MoneyCents::new(120_00),
                },
                PayerShare {
                    member_id: m[1],
                    amount: MoneyCents::new(70_00),
                },
            ],
            &m,
        )
        .unwrap_err();
        assert_eq!(
            err,
            EngineError::PayerMismatch {
                expected: MoneyCents::new(200_00),
                actual: MoneyCents::new(190_00),
            }
        );
    }

    #[test]
    fn rejects_empty_payers_and_non_positive_amount() {
        let m = ids(1);
        assert!(allocate_payers(MoneyCents::new(10), &[], &m).is_err());
        assert!(
            allocate_payers(
                MoneyCents::ZERO,
                &[PayerShare {
                    member_id: m[0],
                    amount: MoneyCents::ZERO
                }],
                &m
            )
            .is_err()
        );
    }

    #[test]
    fn overflowing_payer_total_is_rejected() {
        let m = ids(3);
        let payers: Vec<PayerShare> = [i64::MAX, i64::MAX, 3]
            .into_iter()
            .zip(&m)
            .map(|(cents, id)| PayerShare {
                member_id: *id,
                amount: MoneyCents::new(cents),
            })
            .collect();
        let err = allocate_payers(MoneyCents::new(1), &payers, &m).unwrap_err();
        assert!(matches!(err, EngineError::InvalidAmount(msg) if msg.contains("overflows")));
    }

    #[test]
    fn overflowing_custom_shares_are_rejected() {
        let m = ids(3);
        let shares = BTreeMap::from([
            (m[0], MoneyCents::new(i64::MAX)),
            (m[1], MoneyCents::new(i64::MAX)),
            (m[2], MoneyCents::new(3)),
        ]);
        let err = allocate_splits(MoneyCents::new(1), &SplitStrategy::Custom(shares), &m)
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidAmount(msg) if msg.contains("overflows")));
    }

    #[test]
    fn overflowing_percentages_are_rejected() {
        let m = ids(2);
        let shares = BTreeMap::from([
            (m[0], Percentage::from_basis_points(i64::MAX)),
            (m[1], Percentage::from_basis_points(1)),
        ]);
        let err = allocate_splits(MoneyCents::new(10_00), &SplitStrategy::Percentage(shares), &m)
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidAmount(msg) if msg.contains("overflows")));
    }
}
