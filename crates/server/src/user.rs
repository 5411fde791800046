//! Accounts allowed to call the API; the identity collaborator of the ledger.

use sea_orm::entity::prelude::*;
use split_engine::Caller;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub username: String,
    pub password: String,
    pub email: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Identity handed to the engine: the username is the stable user id.
    pub fn caller(&self) -> Caller {
        let caller = Caller::new(&self.username);
        match self.email.as_deref() {
            Some(email) => caller.email(email),
            None => caller,
        }
    }
}
