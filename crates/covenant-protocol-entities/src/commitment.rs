use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "commitments")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub kind: String,
    pub owner_wallet: String,
    pub escrow_pubkey: String,
    pub signer_kind: String,
    pub signer_payload: String,
    pub status: String,
    pub prior_status: Option<String>,
    pub amount_lamports: Option<String>, // u64
    pub deadline_unix: Option<i64>,
    pub total_funded_lamports: String, // u64
    pub unlocked_lamports: String,     // u64
    pub resolved_tx_sig: Option<String>,
    pub created_at_unix: i64,
    pub updated_at_unix: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
