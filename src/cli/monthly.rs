use super::ui;
use crate::app::App;
use crate::core::UserId;
use crate::core::monthly::MonthlyGainSeries;
use anyhow::Result;
use comfy_table::Cell;

pub fn display_series(series: &MonthlyGainSeries) -> String {
    if series.is_empty() {
        return ui::style_text("No holdings with price data", ui::StyleType::Subtle);
    }

    let mut table = ui::new_styled_table();
    table.set_header(vec![ui::header_cell("Month"), ui::header_cell("Unrealized gain")]);
    for (month, gain) in series {
        table.add_row(vec![Cell::new(month.to_string()), ui::gain_cell(*gain)]);
    }

    let mut output = table.to_string();
    if let Some((month, gain)) = series.last_key_value() {
        output.push_str(&format!(
            "\n\n{} {}",
            ui::style_text(&format!("Latest ({month}):"), ui::StyleType::TotalLabel),
            ui::style_text(&format!("{:.2}", gain.round_dp(2)), ui::StyleType::TotalValue)
        ));
    }
    output
}

pub async fn run(app: &App, user: UserId) -> Result<()> {
    let series = app.compute_monthly_gain_series(user).await?;
    println!("{}", display_series(&series));
    Ok(())
}
