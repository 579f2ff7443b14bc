use super::ui;
use crate::core::UserId;
use crate::core::records::{Holding, PendingInvestment, PendingTransaction, RecordStore};
use anyhow::{Result, bail};
use comfy_table::Cell;
use serde_json::Value;
use uuid::Uuid;

fn fact_text(data: &serde_json::Map<String, Value>, keys: &[&str]) -> String {
    keys.iter()
        .find_map(|k| data.get(*k).filter(|v| !v.is_null()))
        .map(|v| match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .unwrap_or_else(|| "N/A".to_string())
}

pub fn display_transactions(records: &[PendingTransaction]) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Id"),
        ui::header_cell("Store"),
        ui::header_cell("Date"),
        ui::header_cell("Total"),
    ]);
    for record in records {
        table.add_row(vec![
            Cell::new(record.id),
            Cell::new(fact_text(&record.data, &["tienda", "store"])),
            Cell::new(fact_text(&record.data, &["fecha", "fecha_compra", "purchase_date"])),
            Cell::new(fact_text(&record.data, &["total"])),
        ]);
    }
    format!(
        "{}\n{}",
        ui::style_text("Pending transactions", ui::StyleType::Title),
        table
    )
}

pub fn display_investments(records: &[PendingInvestment]) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Id"),
        ui::header_cell("Ticker"),
        ui::header_cell("Purchased"),
        ui::header_cell("Quantity"),
        ui::header_cell("Cost (USD)"),
        ui::header_cell("Value (USD)"),
        ui::header_cell("Gain (USD)"),
        ui::header_cell("USD/MXN"),
    ]);
    for record in records {
        let gain = &record.gain;
        table.add_row(vec![
            Cell::new(record.id),
            Cell::new(&gain.ticker),
            Cell::new(gain.purchase_date),
            Cell::new(gain.quantity),
            ui::amount_cell(gain.acquisition_cost),
            ui::amount_cell(gain.current_value),
            ui::gain_cell(gain.unrealized_gain),
            ui::format_optional_cell(gain.exchange_rate, |r| format!("{r:.4}")),
        ]);
    }
    format!(
        "{}\n{}",
        ui::style_text("Pending investments", ui::StyleType::Title),
        table
    )
}

pub async fn run(records: &dyn RecordStore, user: UserId) -> Result<()> {
    let transactions = records.pending_transactions(user).await?;
    let investments = records.pending_investments(user).await?;
    println!("{}\n", display_transactions(&transactions));
    println!("{}", display_investments(&investments));
    Ok(())
}

pub async fn confirm(records: &dyn RecordStore, user: UserId, id: Uuid) -> Result<Holding> {
    match records.confirm_investment(user, id).await? {
        Some(holding) => {
            println!(
                "Confirmed {} x {} purchased on {}",
                holding.quantity, holding.ticker, holding.purchase_date
            );
            Ok(holding)
        }
        None => bail!("No pending investment {id} for user {user}"),
    }
}
