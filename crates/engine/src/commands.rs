//! Command structs for engine operations.
//!
//! These types group parameters for write operations (groups, joins,
//! expenses, settlements), keeping call sites readable and avoiding long
//! argument lists.

use chrono::NaiveDate;
use uuid::Uuid;

use crate::{Currency, GroupCategory, MoneyCents, PayerShare, SplitStrategy};

/// Who is calling, as told by the identity collaborator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Caller {
    pub user_id: String,
    pub email: Option<String>,
}

impl Caller {
    #[must_use]
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            email: None,
        }
    }

    #[must_use]
    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}

/// Create a group; the caller becomes its admin and first member.
#[derive(Clone, Debug)]
pub struct NewGroupCmd {
    pub name: String,
    pub description: Option<String>,
    pub category: GroupCategory,
    pub currency: Currency,
    /// Display name of the creator inside the group (defaults to the user id).
    pub creator_name: Option<String>,
}

impl NewGroupCmd {
    #[must_use]
    pub fn new(name: impl Into<String>, currency: Currency) -> Self {
        Self {
            name: name.into(),
            description: None,
            category: GroupCategory::default(),
            currency,
            creator_name: None,
        }
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn category(mut self, category: GroupCategory) -> Self {
        self.category = category;
        self
    }

    #[must_use]
    pub fn creator_name(mut self, name: impl Into<String>) -> Self {
        self.creator_name = Some(name.into());
        self
    }
}

/// Partial update of group settings; `None` leaves a field unchanged.
#[derive(Clone, Debug, Default)]
pub struct GroupPatch {
    pub name: Option<String>,
    /// `Some(None)` clears the description.
    pub description: Option<Option<String>>,
    pub category: Option<GroupCategory>,
    pub currency: Option<Currency>,
    pub is_active: Option<bool>,
}

/// Join a group through its invite code.
#[derive(Clone, Debug)]
pub struct JoinCmd {
    pub code: String,
    pub display_name: String,
    /// Skip the placeholder name match and join as a new member.
    pub force_new: bool,
}

impl JoinCmd {
    #[must_use]
    pub fn new(code: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            display_name: display_name.into(),
            force_new: false,
        }
    }

    #[must_use]
    pub fn force_new(mut self) -> Self {
        self.force_new = true;
        self
    }
}

/// Create or replace an expense.
#[derive(Clone, Debug)]
pub struct ExpenseCmd {
    pub group_id: Uuid,
    pub description: String,
    pub amount: MoneyCents,
    pub payers: Vec<PayerShare>,
    pub split: SplitStrategy,
    pub expense_date: NaiveDate,
    pub notes: Option<String>,
    pub idempotency_key: Option<String>,
}

impl ExpenseCmd {
    #[must_use]
    pub fn new(
        group_id: Uuid,
        description: impl Into<String>,
        amount: MoneyCents,
        expense_date: NaiveDate,
    ) -> Self {
        Self {
            group_id,
            description: description.into(),
            amount,
            payers: Vec::new(),
            split: SplitStrategy::Equal,
            expense_date,
            notes: None,
            idempotency_key: None,
        }
    }

    /// Single payer for the full amount.
    #[must_use]
    pub fn paid_by(mut self, member_id: Uuid) -> Self {
        self.payers = vec![PayerShare {
            member_id,
            amount: self.amount,
        }];
        self
    }

    /// Add one payer of a multi-payer expense.
    #[must_use]
    pub fn payer(mut self, member_id: Uuid, amount: MoneyCents) -> Self {
        self.payers.push(PayerShare { member_id, amount });
        self
    }

    #[must_use]
    pub fn split(mut self, split: SplitStrategy) -> Self {
        self.split = split;
        self
    }

    #[must_use]
    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    #[must_use]
    pub fn idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }
}

/// Record a settlement transfer.
#[derive(Clone, Debug)]
pub struct SettlementCmd {
    pub group_id: Uuid,
    pub from_member_id: Uuid,
    pub to_member_id: Uuid,
    pub amount: MoneyCents,
    pub settled_on: NaiveDate,
    pub note: Option<String>,
    /// Mirror the transfer into the caller's personal ledger.
    pub mirror: bool,
    pub idempotency_key: Option<String>,
}

impl SettlementCmd {
    #[must_use]
    pub fn new(
        group_id: Uuid,
        from_member_id: Uuid,
        to_member_id: Uuid,
        amount: MoneyCents,
        settled_on: NaiveDate,
    ) -> Self {
        Self {
            group_id,
            from_member_id,
            to_member_id,
            amount,
            settled_on,
            note: None,
            mirror: false,
            idempotency_key: None,
        }
    }

    /// Accept an optimizer suggestion as is.
    #[must_use]
    pub fn from_suggestion(
        group_id: Uuid,
        suggestion: &crate::SettlementSuggestion,
        settled_on: NaiveDate,
    ) -> Self {
        Self::new(
            group_id,
            suggestion.from_member_id,
            suggestion.to_member_id,
            suggestion.amount,
            settled_on,
        )
    }

    #[must_use]
    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    #[must_use]
    pub fn mirror(mut self) -> Self {
        self.mirror = true;
        self
    }

    #[must_use]
    pub fn idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }
}

/// Partial update of a settlement; `None` leaves a field unchanged.
#[derive(Clone, Debug, Default)]
pub struct SettlementPatch {
    pub from_member_id: Option<Uuid>,
    pub to_member_id: Option<Uuid>,
    pub amount: Option<MoneyCents>,
    pub settled_on: Option<NaiveDate>,
    /// `Some(None)` clears the note.
    pub note: Option<Option<String>>,
}
