use crate::context::Context;
use crate::error::CliResult;
use covenant_protocol_engine::CommitmentView;

pub async fn execute(ctx: &Context, commitment: Option<String>) -> CliResult<()> {
    match commitment {
        Some(id) => {
            let view = ctx.commitments().load(&id).await?;
            print_view(ctx, &view).await?;
        }
        None => {
            let views = ctx.commitments().load_all().await?;
            if views.is_empty() {
                println!("no commitments");
            }
            for view in &views {
                print_view(ctx, view).await?;
                println!();
            }
        }
    }
    Ok(())
}

async fn print_view(ctx: &Context, view: &CommitmentView) -> CliResult<()> {
    let c = &view.commitment;
    println!("commitment {} [{}] {}", c.id, c.kind, c.status);
    println!("  owner:    {}", c.owner_wallet);
    println!("  escrow:   {}", c.escrow_pubkey);
    println!(
        "  funded:   {} lamports ({} unlocked)",
        c.total_funded_lamports, c.unlocked_lamports
    );
    if let (Some(amount), Some(deadline)) = (c.amount_lamports, c.deadline_unix) {
        println!("  amount:   {amount} lamports, deadline {deadline}");
        let tally = ctx.voting().tallies(&c.id, None).await?;
        println!(
            "  votes:    {} approve / {} reject",
            tally.approvals, tally.rejections
        );
    }
    if let Some(tx_sig) = &c.resolved_tx_sig {
        println!("  resolved: {tx_sig}");
    }
    for m in &view.milestones {
        println!(
            "  milestone {} #{} [{}] {}",
            m.id, m.position, m.status, m.description
        );
        let tally = ctx.voting().tallies(&c.id, Some(&m.id)).await?;
        println!(
            "    votes: {} approve / {} reject",
            tally.approvals, tally.rejections
        );
    }
    Ok(())
}
