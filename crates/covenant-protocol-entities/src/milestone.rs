use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "milestones")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub commitment_id: String,
    pub position: u32,
    pub description: String,
    pub unlock_lamports: Option<String>, // u64
    pub unlock_percent: Option<u8>,
    pub status: String,
    pub completed_at_unix: Option<i64>,
    pub review_opened_at_unix: Option<i64>,
    pub due_at_unix: Option<i64>,
    pub claimable_at_unix: Option<i64>,
    pub became_claimable_at_unix: Option<i64>,
    pub released_at_unix: Option<i64>,
    pub released_tx_sig: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
