use sea_orm::entity::prelude::*;

/// The at-most-once anchor: the composite primary key is the only
/// mutual-exclusion mechanism the claim protocol needs.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "claims")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub distribution_id: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub wallet: String,
    pub amount_lamports: String, // u64
    pub claimed_at_unix: i64,
    pub tx_sig: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
