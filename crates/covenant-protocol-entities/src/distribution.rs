use sea_orm::entity::prelude::*;

/// `settlement_key` carries a unique index: distribution creation is
/// insert-if-absent keyed by the natural parent key.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "distributions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub kind: String,
    pub commitment_id: String,
    pub milestone_id: Option<String>,
    #[sea_orm(unique)]
    pub settlement_key: String,
    pub pot_lamports: String,     // u64
    pub primary_wallet: String,
    pub primary_lamports: String, // u64
    pub voter_pot_lamports: String, // u64
    pub allocation_count: u32,
    pub status: String,
    pub created_at_unix: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
