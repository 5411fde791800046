use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    Balances, Caller, Currency, Member, MoneyCents, ResultEngine, SettlementSuggestion,
    suggest_settlements,
};

use super::Engine;

/// Balances of a group together with the members they refer to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupBalances {
    pub group_id: Uuid,
    pub currency: Currency,
    /// Every member with a row, including members that left.
    pub members: Vec<Member>,
    pub balances: Balances,
}

impl GroupBalances {
    /// Sum of all net balances; zero for a consistent ledger.
    pub fn total(&self) -> MoneyCents {
        self.balances.total()
    }
}

impl Engine {
    /// Current balance of every member, derived from expenses and settlements.
    pub async fn group_balances(
        &self,
        caller: &Caller,
        group_id: Uuid,
    ) -> ResultEngine<GroupBalances> {
        let (group, _) = self.require_group(&self.database, group_id, caller).await?;
        let members = self.load_members(&self.database, group_id).await?;
        let balances = self
            .compute_balances(&self.database, group_id, &members)
            .await?;
        Ok(GroupBalances {
            group_id,
            currency: group.currency,
            members,
            balances,
        })
    }

    /// Transfers that would bring every balance of the group to zero.
    pub async fn settlement_suggestions(
        &self,
        caller: &Caller,
        group_id: Uuid,
    ) -> ResultEngine<Vec<SettlementSuggestion>> {
        let balances = self.group_balances(caller, group_id).await?.balances;
        let suggestions = suggest_settlements(&balances.net_map());
        tracing::debug!(%group_id, count = suggestions.len(), "settlement suggestions computed");
        Ok(suggestions)
    }
}
