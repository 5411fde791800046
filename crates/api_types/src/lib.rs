use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    #[default]
    Eur,
    Usd,
    Gbp,
    Sar,
    Aed,
    Egp,
}

pub mod group {
    use super::*;

    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum GroupCategory {
        Trip,
        Home,
        Couple,
        Friends,
        #[default]
        Other,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct GroupNew {
        pub name: String,
        pub description: Option<String>,
        #[serde(default)]
        pub category: GroupCategory,
        pub currency: Option<Currency>,
        /// Display name of the creator inside the group.
        pub display_name: Option<String>,
    }

    /// Partial settings update; absent fields are left unchanged.
    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct GroupUpdate {
        pub name: Option<String>,
        /// `null` clears the description, absence leaves it unchanged.
        #[serde(default, with = "double_option")]
        pub description: Option<Option<String>>,
        pub category: Option<GroupCategory>,
        pub currency: Option<Currency>,
        pub is_active: Option<bool>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct GroupView {
        pub id: Uuid,
        pub name: String,
        pub description: Option<String>,
        pub category: GroupCategory,
        pub currency: Currency,
        pub invite_code: String,
        pub is_settled: bool,
        pub is_active: bool,
        pub is_admin: bool,
        pub created_at: DateTime<Utc>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct GroupsResponse {
        pub groups: Vec<GroupView>,
    }

    /// What a visitor sees before joining through an invite link.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct GroupPreview {
        pub id: Uuid,
        pub name: String,
        pub currency: Currency,
        pub member_count: u64,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct InviteLink {
        pub code: String,
        pub link: String,
    }
}

pub mod member {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct MemberNew {
        pub name: String,
        pub email: Option<String>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct MemberView {
        pub id: Uuid,
        pub name: String,
        pub email: Option<String>,
        /// `true` once a real account is tied to this member.
        pub linked: bool,
        pub is_creator: bool,
        pub joined_at: DateTime<Utc>,
        pub left_at: Option<DateTime<Utc>>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct MembersResponse {
        pub members: Vec<MemberView>,
    }

    /// Join through an invite code or an invite link path segment.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct JoinRequest {
        pub code: String,
        pub display_name: String,
        /// Decline a placeholder with the same name and join as a new member.
        #[serde(default)]
        pub force_new: bool,
    }

    /// Confirm the link to a placeholder suggested by a join.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct JoinConfirm {
        pub code: String,
        pub member_id: Uuid,
        pub display_name: Option<String>,
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum JoinStatus {
        AlreadyMember,
        Rejoined,
        LinkedByEmail,
        /// A placeholder matches the name; confirm to link it.
        ConfirmPlaceholder,
        Joined,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct JoinResponse {
        pub status: JoinStatus,
        pub group_id: Uuid,
        pub member: MemberView,
    }
}

pub mod expense {
    use std::collections::BTreeMap;

    use super::*;

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum SplitType {
        Equal,
        Percentage,
        Custom,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct PayerInput {
        pub member_id: Uuid,
        /// Ignored when there is a single payer.
        #[serde(default)]
        pub amount_minor: i64,
    }

    /// Split of an expense. `shares` holds basis points for `percentage`
    /// (10000 = 100%) and minor units for `custom`; it is ignored for `equal`.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct SplitInput {
        #[serde(rename = "type")]
        pub split_type: SplitType,
        #[serde(default)]
        pub shares: BTreeMap<Uuid, i64>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ExpenseNew {
        pub description: String,
        pub amount_minor: i64,
        pub payers: Vec<PayerInput>,
        pub split: SplitInput,
        pub expense_date: NaiveDate,
        pub notes: Option<String>,
        /// Optional idempotency key for safely retrying the same create request.
        pub idempotency_key: Option<String>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ExpenseCreated {
        pub id: Uuid,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct PayerView {
        pub member_id: Uuid,
        pub amount_minor: i64,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct SplitView {
        pub member_id: Uuid,
        pub amount_minor: i64,
        pub percentage_bp: Option<i64>,
        pub is_paid: bool,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ExpenseView {
        pub id: Uuid,
        pub group_id: Uuid,
        pub description: String,
        pub amount_minor: i64,
        pub split_type: SplitType,
        pub expense_date: NaiveDate,
        pub notes: Option<String>,
        pub created_by: String,
        pub created_at: DateTime<Utc>,
        pub payers: Vec<PayerView>,
        pub splits: Vec<SplitView>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ExpensesResponse {
        pub expenses: Vec<ExpenseView>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct SplitPaid {
        pub is_paid: bool,
    }
}

pub mod settlement {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct SettlementNew {
        pub from_member_id: Uuid,
        pub to_member_id: Uuid,
        pub amount_minor: i64,
        pub settled_on: NaiveDate,
        pub note: Option<String>,
        /// Mirror the transfer into the caller's personal ledger.
        #[serde(default)]
        pub mirror: bool,
        /// Optional idempotency key for safely retrying the same create request.
        pub idempotency_key: Option<String>,
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct SettlementUpdate {
        pub from_member_id: Option<Uuid>,
        pub to_member_id: Option<Uuid>,
        pub amount_minor: Option<i64>,
        pub settled_on: Option<NaiveDate>,
        #[serde(default, with = "double_option")]
        pub note: Option<Option<String>>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct SettlementView {
        pub id: Uuid,
        pub group_id: Uuid,
        pub from_member_id: Uuid,
        pub to_member_id: Uuid,
        pub amount_minor: i64,
        pub settled_on: NaiveDate,
        pub note: Option<String>,
        pub mirrored: bool,
        pub created_by: String,
        pub created_at: DateTime<Utc>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct SettlementsResponse {
        pub settlements: Vec<SettlementView>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct SuggestionView {
        pub from_member_id: Uuid,
        pub to_member_id: Uuid,
        pub amount_minor: i64,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct SuggestionsResponse {
        pub suggestions: Vec<SuggestionView>,
    }
}

pub mod balance {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct MemberBalanceView {
        pub member_id: Uuid,
        pub name: String,
        pub paid_minor: i64,
        pub owed_minor: i64,
        pub settled_out_minor: i64,
        pub settled_in_minor: i64,
        /// Positive: the others owe this member. Negative: this member owes.
        pub net_minor: i64,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct BalancesResponse {
        pub currency: Currency,
        pub balances: Vec<MemberBalanceView>,
        /// Always zero for a consistent ledger.
        pub total_minor: i64,
    }
}

/// Serde helper telling an absent field (`None`) from an explicit `null`
/// (`Some(None)`).
mod double_option {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S, T>(value: &Option<Option<T>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        T: Serialize,
    {
        match value {
            Some(inner) => inner.serialize(serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
    where
        D: Deserializer<'de>,
        T: Deserialize<'de>,
    {
        Option::<T>::deserialize(deserializer).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_tells_null_from_absent() {
        let cleared: group::GroupUpdate =
            serde_json::from_str(r#"{"description": null}"#).unwrap();
        assert_eq!(cleared.description, Some(None));

        let untouched: group::GroupUpdate = serde_json::from_str(r#"{"name": "Trip"}"#).unwrap();
        assert_eq!(untouched.description, None);
        assert_eq!(untouched.name.as_deref(), Some("Trip"));
    }

    #[test]
    fn split_input_uses_type_tag() {
        let split: expense::SplitInput = serde_json::from_str(r#"{"type": "equal"}"#).unwrap();
        assert_eq!(split.split_type, expense::SplitType::Equal);
        assert!(split.shares.is_empty());
        assert_eq!(
            serde_json::to_string(&Currency::Sar).unwrap(),
            r#""SAR""#
        );
    }
}
