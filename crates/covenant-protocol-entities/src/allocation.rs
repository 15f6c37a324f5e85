use sea_orm::entity::prelude::*;

/// Immutable after insertion; allocations are only ever recomputed by
/// recreating the whole distribution.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "allocations")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub distribution_id: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub wallet: String,
    pub amount_lamports: String, // u64
    pub weight: String,          // Decimal
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
