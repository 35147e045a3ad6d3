//! Table formatting for simulation results.

use alloy_primitives::utils::format_units;
use alloy_primitives::{Address, U256};
use morpho_rs_simulation::{Action, FundingRequirement, Snapshot};
use tabled::{
    settings::{object::Columns, Alignment, Modify, Style},
    Table, Tabled,
};

#[derive(Tabled)]
struct StepRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Action")]
    kind: String,
    #[tabled(rename = "Sender")]
    sender: String,
}

#[derive(Tabled)]
struct HoldingRow {
    #[tabled(rename = "User")]
    user: String,
    #[tabled(rename = "Token")]
    token: String,
    #[tabled(rename = "Balance")]
    balance: String,
}

#[derive(Tabled)]
struct PositionRow {
    #[tabled(rename = "User")]
    user: String,
    #[tabled(rename = "Market")]
    market: String,
    #[tabled(rename = "Supply Shares")]
    supply_shares: String,
    #[tabled(rename = "Borrow Shares")]
    borrow_shares: String,
    #[tabled(rename = "Collateral")]
    collateral: String,
}

#[derive(Tabled)]
struct FundingRow {
    #[tabled(rename = "Token")]
    token: String,
    #[tabled(rename = "Symbol")]
    symbol: String,
    #[tabled(rename = "Amount")]
    amount: String,
}

pub(crate) fn truncate_address(addr: &str) -> String {
    if addr.len() > 10 {
        format!("{}...{}", &addr[..6], &addr[addr.len() - 4..])
    } else {
        addr.to_string()
    }
}

/// Symbol of a token or vault share, else the truncated address
pub(crate) fn token_label(snapshot: &Snapshot, token: Address) -> String {
    snapshot
        .try_token(token)
        .map(|t| t.symbol.clone())
        .unwrap_or_else(|| truncate_address(&token.to_string()))
}

/// Amount in whole units when the token's decimals are known
pub(crate) fn format_amount(snapshot: &Snapshot, token: Address, amount: U256) -> String {
    let decimals = match snapshot.try_token(token) {
        Some(token) => token.decimals,
        None if snapshot.try_vault(token).is_some() => 18,
        None => return amount.to_string(),
    };
    format_units(amount, decimals).unwrap_or_else(|_| amount.to_string())
}

fn render<T: Tabled>(rows: Vec<T>) -> String {
    Table::new(rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::last()).with(Alignment::right()))
        .to_string()
}

pub fn format_simulation(actions: &[Action], snapshots: &[Snapshot]) -> String {
    let mut output = String::new();

    if !actions.is_empty() {
        let steps: Vec<StepRow> = actions
            .iter()
            .enumerate()
            .map(|(index, action)| StepRow {
                index: index + 1,
                kind: action.kind().to_string(),
                sender: truncate_address(&action.sender().to_string()),
            })
            .collect();
        output.push_str(&render(steps));
        output.push('\n');
    }

    let Some(last) = snapshots.last() else {
        return output;
    };

    let holdings: Vec<HoldingRow> = last
        .holdings()
        .map(|holding| HoldingRow {
            user: truncate_address(&holding.user.to_string()),
            token: token_label(last, holding.token),
            balance: format_amount(last, holding.token, holding.balance),
        })
        .collect();
    if holdings.is_empty() {
        output.push_str("No holdings tracked.\n");
    } else {
        output.push_str(&render(holdings));
        output.push('\n');
    }

    let positions: Vec<PositionRow> = last
        .positions()
        .map(|position| PositionRow {
            user: truncate_address(&position.user.to_string()),
            market: truncate_address(&position.market_id.to_string()),
            supply_shares: position.supply_shares.to_string(),
            borrow_shares: position.borrow_shares.to_string(),
            collateral: position.collateral.to_string(),
        })
        .collect();
    if !positions.is_empty() {
        output.push_str(&render(positions));
        output.push('\n');
    }

    output
}

pub fn format_funding_table(requirements: &[FundingRequirement], snapshot: &Snapshot) -> String {
    if requirements.is_empty() {
        return "No funding required.".to_string();
    }

    let rows: Vec<FundingRow> = requirements
        .iter()
        .map(|requirement| FundingRow {
            token: requirement.token.to_string(),
            symbol: token_label(snapshot, requirement.token),
            amount: format_amount(snapshot, requirement.token, requirement.amount),
        })
        .collect();
    render(rows)
}
