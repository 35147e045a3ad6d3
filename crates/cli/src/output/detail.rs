//! Detailed output formatting for reallocation plans.

use anyhow::Result;
use colored::Colorize;
use morpho_rs_simulation::{ReallocationPlan, Snapshot};
use tabled::{settings::Style, Table, Tabled};

use super::table::{format_amount, truncate_address};

#[derive(Tabled)]
struct WithdrawalRow {
    #[tabled(rename = "Round")]
    round: usize,
    #[tabled(rename = "Vault")]
    vault: String,
    #[tabled(rename = "Source Market")]
    market: String,
    #[tabled(rename = "Assets")]
    assets: String,
}

pub fn format_reallocation(plan: &ReallocationPlan, initial: &Snapshot) -> Result<String> {
    let mut output = String::new();
    let target = initial.market(plan.target_market_id)?;
    let loan_token = target.params.loan_token;
    let after = plan.snapshot.market(plan.target_market_id)?;

    output.push_str(&format!("{}\n", "=".repeat(60)));
    output.push_str(&format!("{}\n", "Reallocation Plan".bold()));
    output.push_str(&format!("{}\n\n", "=".repeat(60)));

    output.push_str(&format!("{}\n", "Target Market".cyan().bold()));
    output.push_str(&format!("  Id:               {}\n", plan.target_market_id));
    output.push_str(&format!(
        "  Liquidity before: {}\n",
        format_amount(initial, loan_token, target.liquidity())
    ));
    output.push_str(&format!(
        "  Liquidity after:  {}\n",
        format_amount(initial, loan_token, after.liquidity())
    ));
    output.push_str(&format!(
        "  Total withdrawn:  {}\n\n",
        format_amount(initial, loan_token, plan.total_withdrawn())
    ));

    if plan.withdrawals.is_empty() {
        output.push_str(&format!("{}\n", "No liquidity can be reallocated.".yellow()));
        return Ok(output);
    }

    let rows: Vec<WithdrawalRow> = plan
        .withdrawals
        .iter()
        .enumerate()
        .map(|(index, withdrawal)| WithdrawalRow {
            round: index + 1,
            vault: truncate_address(&withdrawal.vault.to_string()),
            market: truncate_address(&withdrawal.market_id.to_string()),
            assets: format_amount(initial, loan_token, withdrawal.assets),
        })
        .collect();
    output.push_str(&format!("{}\n", "Withdrawals".cyan().bold()));
    output.push_str(&Table::new(rows).with(Style::rounded()).to_string());
    output.push('\n');

    Ok(output)
}
