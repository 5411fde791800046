//! Shared-expense ledger engine.
//!
//! Groups of members record expenses (paid by one or more members, split
//! equally, by percentage or by custom amounts), derive balances from them
//! and settle up with direct transfers.
//!
//! The pure parts ([`split`], [`Balances`], [`suggest_settlements`]) have no
//! I/O; [`Engine`] wraps them with persistence, authorization and per-group
//! serialization.

pub use balances::{Balances, MemberBalance};
pub use commands::{
    Caller, ExpenseCmd, GroupPatch, JoinCmd, NewGroupCmd, SettlementCmd, SettlementPatch,
};
pub use currency::Currency;
pub use error::EngineError;
pub use expenses::{Expense, PayerEntry, SplitEntry, SplitType};
pub use groups::{Group, GroupCategory, GroupPreview};
pub use invite::{
    INVITE_CODE_LEN, code_from_link, code_from_segment, generate_invite_code, invite_link,
    normalize_invite_code, slugify,
};
pub use members::{Member, MemberLink};
pub use money::{MoneyCents, Percentage};
pub use ops::{Engine, EngineBuilder, GroupBalances, JoinOutcome, LedgerPolicy};
pub use optimizer::{SettlementSuggestion, suggest_settlements};
pub use settlements::Settlement;
pub use split::{PayerShare, SplitShare, SplitStrategy, allocate_payers, allocate_splits};

mod balances;
mod commands;
mod currency;
mod error;
pub mod expense_payers;
pub mod expense_splits;
pub mod expenses;
pub mod groups;
mod invite;
pub mod members;
mod money;
mod ops;
mod optimizer;
pub mod personal_transactions;
pub mod settlements;
pub mod split;
mod util;

pub type ResultEngine<T> = Result<T, EngineError>;
