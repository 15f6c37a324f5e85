use sea_orm::entity::prelude::*;

/// One row per (commitment, milestone, wallet); the composite primary key
/// is what makes the first vote win. Commitment-level votes store the empty
/// string in `milestone_id`.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "vote_signals")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub commitment_id: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub milestone_id: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub signer_wallet: String,
    pub vote: String,
    pub weight_usd: String, // Decimal
    pub created_at_unix: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
