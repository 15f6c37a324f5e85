use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Commitments::Table)
                    .if_not_exists()
                    .col(string(Commitments::Id).primary_key())
                    .col(string(Commitments::Kind))
                    .col(string(Commitments::OwnerWallet))
                    .col(string(Commitments::EscrowPubkey))
                    .col(string(Commitments::SignerKind))
                    .col(string(Commitments::SignerPayload))
                    .col(string(Commitments::Status))
                    .col(string_null(Commitments::PriorStatus))
                    .col(string_null(Commitments::AmountLamports)) // u64
                    .col(big_integer_null(Commitments::DeadlineUnix))
                    .col(string(Commitments::TotalFundedLamports)) // u64
                    .col(string(Commitments::UnlockedLamports)) // u64
                    .col(string_null(Commitments::ResolvedTxSig))
                    .col(big_integer(Commitments::CreatedAtUnix))
                    .col(big_integer(Commitments::UpdatedAtUnix))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Milestones::Table)
                    .if_not_exists()
                    .col(string(Milestones::Id).primary_key())
                    .col(string(Milestones::CommitmentId))
                    .col(unsigned(Milestones::Position))
                    .col(string(Milestones::Description))
                    .col(string_null(Milestones::UnlockLamports)) // u64
                    .col(small_unsigned_null(Milestones::UnlockPercent))
                    .col(string(Milestones::Status))
                    .col(big_integer_null(Milestones::CompletedAtUnix))
                    .col(big_integer_null(Milestones::ReviewOpenedAtUnix))
                    .col(big_integer_null(Milestones::DueAtUnix))
                    .col(big_integer_null(Milestones::ClaimableAtUnix))
                    .col(big_integer_null(Milestones::BecameClaimableAtUnix))
                    .col(big_integer_null(Milestones::ReleasedAtUnix))
                    .col(string_null(Milestones::ReleasedTxSig))
                    .index(
                        Index::create()
                            .col(Milestones::CommitmentId)
                            .col(Milestones::Position)
                            .unique(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(Milestones::Table, Milestones::CommitmentId)
                            .to(Commitments::Table, Commitments::Id)
                            .on_delete(ForeignKeyAction::Restrict)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(VoteSignals::Table)
                    .if_not_exists()
                    .col(string(VoteSignals::CommitmentId))
                    .col(string(VoteSignals::MilestoneId)) // "" = commitment-level vote
                    .col(string(VoteSignals::SignerWallet))
                    .col(string(VoteSignals::Vote))
                    .col(string(VoteSignals::WeightUsd)) // Decimal
                    .col(big_integer(VoteSignals::CreatedAtUnix))
                    .index(
                        Index::create()
                            .col(VoteSignals::CommitmentId)
                            .col(VoteSignals::MilestoneId)
                            .col(VoteSignals::SignerWallet)
                            .primary(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Distributions::Table)
                    .if_not_exists()
                    .col(string(Distributions::Id).primary_key())
                    .col(string(Distributions::Kind))
                    .col(string(Distributions::CommitmentId))
                    .col(string_null(Distributions::MilestoneId))
                    .col(string_uniq(Distributions::SettlementKey))
                    .col(string(Distributions::PotLamports)) // u64
                    .col(string(Distributions::PrimaryWallet))
                    .col(string(Distributions::PrimaryLamports)) // u64
                    .col(string(Distributions::VoterPotLamports)) // u64
                    .col(unsigned(Distributions::AllocationCount))
                    .col(string(Distributions::Status))
                    .col(big_integer(Distributions::CreatedAtUnix))
                    .foreign_key(
                        ForeignKey::create()
                            .from(Distributions::Table, Distributions::CommitmentId)
                            .to(Commitments::Table, Commitments::Id)
                            .on_delete(ForeignKeyAction::Restrict)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Allocations::Table)
                    .if_not_exists()
                    .col(string(Allocations::DistributionId))
                    .col(string(Allocations::Wallet))
                    .col(string(Allocations::AmountLamports)) // u64
                    .col(string(Allocations::Weight)) // Decimal
                    .index(
                        Index::create()
                            .col(Allocations::DistributionId)
                            .col(Allocations::Wallet)
                            .primary(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(Allocations::Table, Allocations::DistributionId)
                            .to(Distributions::Table, Distributions::Id)
                            .on_delete(ForeignKeyAction::Restrict)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Claims::Table)
                    .if_not_exists()
                    .col(string(Claims::DistributionId))
                    .col(string(Claims::Wallet))
                    .col(string(Claims::AmountLamports)) // u64
                    .col(big_integer(Claims::ClaimedAtUnix))
                    .col(string_null(Claims::TxSig))
                    .index(
                        Index::create()
                            .col(Claims::DistributionId)
                            .col(Claims::Wallet)
                            .primary(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(Claims::Table, Claims::DistributionId)
                            .to(Distributions::Table, Distributions::Id)
                            .on_delete(ForeignKeyAction::Restrict)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(FeeShareRotations::Table)
                    .if_not_exists()
                    .col(string(FeeShareRotations::Id).primary_key())
                    .col(string(FeeShareRotations::TokenMint))
                    .col(big_integer(FeeShareRotations::ExecutedAtUnix))
                    .col(string(FeeShareRotations::SharesJson))
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(FeeShareRotations::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Claims::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Allocations::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Distributions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(VoteSignals::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Milestones::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Commitments::Table).to_owned())
            .await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum Commitments {
    Table,
    Id,
    Kind,
    OwnerWallet,
    EscrowPubkey,

    SignerKind,    // "local" | "custodial"
    SignerPayload, // hex ciphertext or custodial wallet id

    Status,
    PriorStatus, // held while the resolving lock is taken

    AmountLamports, // personal commitments (u64)
    DeadlineUnix,   // personal commitments

    TotalFundedLamports, // reward commitments (u64)
    UnlockedLamports,    // reward commitments (u64)

    ResolvedTxSig,
    CreatedAtUnix,
    UpdatedAtUnix,
}

#[derive(DeriveIden)]
enum Milestones {
    Table,
    Id,
    CommitmentId, // foreign key to commitments.id
    Position,     // ordering, independent of id
    Description,

    UnlockLamports, // fixed unlock (u64); exactly one of lamports/percent set
    UnlockPercent,  // resolved against total funding at evaluation time

    Status,
    CompletedAtUnix,
    ReviewOpenedAtUnix, // set when completion is flagged "early review"
    DueAtUnix,
    ClaimableAtUnix,       // scheduled: completed_at + claim_delay
    BecameClaimableAtUnix, // actual
    ReleasedAtUnix,
    ReleasedTxSig,
}

#[derive(DeriveIden)]
enum VoteSignals {
    Table,
    CommitmentId, // -------\
    MilestoneId,  //         +---- first-vote-wins primary key
    SignerWallet, // -------/
    Vote,
    WeightUsd, // snapshot at vote time (Decimal)
    CreatedAtUnix,
}

#[derive(DeriveIden)]
enum Distributions {
    Table,
    Id,
    Kind,
    CommitmentId,
    MilestoneId,
    SettlementKey, // unique natural parent key: "<kind>:<commitment>[:<milestone>]"

    PotLamports,      // full pot (u64)
    PrimaryWallet,    // treasury (failure kinds) or owner (vote reward)
    PrimaryLamports,  // buyback / creator share (u64)
    VoterPotLamports, // remainder allocated to voters (u64)
    AllocationCount,  // stored explicitly for the retry comparison

    Status, // open | completed
    CreatedAtUnix,
}

#[derive(DeriveIden)]
enum Allocations {
    Table,
    DistributionId,
    Wallet,
    AmountLamports, // u64
    Weight,         // Decimal
}

#[derive(DeriveIden)]
enum Claims {
    Table,
    DistributionId,
    Wallet,
    AmountLamports, // u64
    ClaimedAtUnix,
    TxSig, // null until the transfer confirms
}

#[derive(DeriveIden)]
enum FeeShareRotations {
    Table,
    Id,
    TokenMint,
    ExecutedAtUnix,
    SharesJson,
}
