//! Board commands: `dealflow board` and `dealflow move`.

use std::sync::Arc;

use anyhow::{Context, Result};

use dealflow::board::{BoardSync, CrmClient, DealApi, MoveOutcome, Session};
use dealflow::config::DealflowConfig;

fn connect(config: &DealflowConfig) -> Result<CrmClient> {
    let session = Session::new(
        config.client.base_url.clone(),
        config.client.token.clone().unwrap_or_default(),
    );
    CrmClient::new(session).context("Failed to create HTTP client")
}

fn print_board(board: &BoardSync) {
    println!();
    for column in board.columns() {
        let marker = match (column.is_final, column.is_won) {
            (true, true) => console::style("won").green().to_string(),
            (true, false) => console::style("lost").red().to_string(),
            _ => String::new(),
        };
        println!(
            "{} {} {} deals, {:.2} {}",
            console::style(format!("[{}]", column.stage_id)).dim(),
            console::style(&column.name).bold(),
            column.deals_count,
            column.total_amount,
            marker
        );
        for card in &column.cards {
            let pending = if card.pending {
                console::style(" (pending)").yellow().to_string()
            } else {
                String::new()
            };
            println!(
                "    #{} {}  {:.2} {} [{}]{}",
                card.deal.id,
                card.deal.title,
                card.deal.amount,
                card.deal.currency,
                card.deal.status,
                pending
            );
        }
    }
    println!();
}

pub async fn cmd_board(config: &DealflowConfig, pipeline_id: i64) -> Result<()> {
    let client = connect(config)?;
    let board = BoardSync::load(&client, pipeline_id)
        .await
        .with_context(|| format!("Failed to load board for pipeline {}", pipeline_id))?;
    print_board(&board);
    Ok(())
}

pub async fn cmd_move(
    config: &DealflowConfig,
    deal_id: i64,
    stage_id: i64,
    reason: Option<String>,
) -> Result<()> {
    let client = Arc::new(connect(config)?);
    let deal = client
        .get_deal(deal_id)
        .await
        .with_context(|| format!("Failed to look up deal {}", deal_id))?;
    let mut board = BoardSync::load(client.as_ref(), deal.pipeline_id)
        .await
        .with_context(|| format!("Failed to load board for pipeline {}", deal.pipeline_id))?;

    board.drag_start(deal_id)?;
    let api: Arc<dyn DealApi> = client;
    let outcome = board
        .drop_on(api, stage_id, reason, config.move_timeout())
        .await?;
    print_board(&board);

    match outcome {
        MoveOutcome::Committed(deal) => {
            println!(
                "{} Deal #{} moved to stage {} ({})",
                console::style("✓").green(),
                deal.id,
                deal.stage_id,
                deal.status
            );
            Ok(())
        }
        MoveOutcome::CommittedStale { deal, .. } => {
            println!(
                "{} Deal #{} moved to stage {}, but the board may be stale",
                console::style("⚠").yellow(),
                deal.id,
                deal.stage_id
            );
            Ok(())
        }
        MoveOutcome::RolledBack(err) => {
            if let Some(notice) = board.notice() {
                eprintln!("{} {}", console::style("Error:").red().bold(), notice);
            }
            Err(err).context("Move rejected")
        }
    }
}
