use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::catalog::{Catalog, FirmId, RiskTier, StrategyType};
use crate::exposure::PortfolioSummary;

/// "£12,345" - thousands separators, no decimals. Halves round to even.
pub fn format_currency(val: f64) -> String {
    let rounded = val.round_ties_even();
    let sign = if rounded < 0.0 { "-" } else { "" };
    let digits = format!("{:.0}", rounded.abs());

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    format!("{}£{}", sign, grouped)
}

fn risk_label(risk: RiskTier) -> String {
    format!("{} Risk", risk)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FirmReferenceRow {
    pub index: usize,
    pub firm: FirmId,
    /// e.g. "Property Lending (Low Risk), Renewables (Low Risk)"
    pub strategies_offered: String,
    /// e.g. "50% Property Lending (High Risk), 50% Renewables (Low Risk)"
    pub product_mix: String,
}

/// What each firm offers, firms sorted by name and numbered from 1.
pub fn firm_reference(catalog: &Catalog) -> Vec<FirmReferenceRow> {
    catalog
        .by_firm()
        .into_iter()
        .enumerate()
        .map(|(i, (firm, offerings))| FirmReferenceRow {
            index: i + 1,
            firm: firm.clone(),
            strategies_offered: offerings
                .iter()
                .map(|o| format!("{} ({})", o.strategy(), risk_label(o.risk())))
                .collect::<Vec<_>>()
                .join(", "),
            product_mix: offerings
                .iter()
                .map(|o| {
                    format!(
                        "{:.0}% {} ({})",
                        (o.mix * 100.0).round(),
                        o.strategy(),
                        risk_label(o.risk())
                    )
                })
                .collect::<Vec<_>>()
                .join(", "),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FirmAllocationRow {
    pub firm: FirmId,
    pub amount: f64,
    /// Strategy types this firm actually received money for.
    pub strategies: Vec<StrategyType>,
}

/// One row per funded firm, ordered by firm name.
pub fn firm_allocations(summary: &PortfolioSummary) -> Vec<FirmAllocationRow> {
    summary
        .per_firm
        .iter()
        .map(|(firm, amount)| FirmAllocationRow {
            firm: firm.clone(),
            amount: *amount,
            strategies: summary.strategies_for(firm).into_iter().cloned().collect(),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExposureRow {
    pub strategy: StrategyType,
    pub low: f64,
    pub high: f64,
    pub total: f64,
    /// Percentage of the whole portfolio, rounded to two decimal places.
    pub share_percent: f64,
}

/// Strategy types with a positive total. Empty when nothing was allocated.
pub fn exposure_rows(summary: &PortfolioSummary) -> Vec<ExposureRow> {
    let portfolio_total = summary.total();
    if portfolio_total <= 0.0 {
        return Vec::new();
    }

    summary
        .per_strategy_risk
        .iter()
        .filter(|(_, split)| split.total() > 0.0)
        .map(|(strategy, split)| ExposureRow {
            strategy: strategy.clone(),
            low: split.low,
            high: split.high,
            total: split.total(),
            share_percent: (split.total() / portfolio_total * 10_000.0).round() / 100.0,
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BarPoint {
    pub strategy: StrategyType,
    pub risk: RiskTier,
    pub amount: f64,
}

/// Stacked bar series: one point per strategy and tier holding money.
pub fn exposure_bars(summary: &PortfolioSummary) -> Vec<BarPoint> {
    let mut bars = Vec::new();
    for (strategy, split) in &summary.per_strategy_risk {
        for risk in RiskTier::ALL {
            let amount = split.get(risk);
            if amount > 0.0 {
                bars.push(BarPoint {
                    strategy: strategy.clone(),
                    risk,
                    amount,
                });
            }
        }
    }
    bars
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub generated_at: DateTime<Utc>,
    pub mode: String,
    pub total_investment: f64,
    pub allocated: f64,
    pub low_risk: f64,
    pub high_risk: f64,
    pub firms: Vec<FirmAllocationRow>,
    pub exposure: Vec<ExposureRow>,
    pub bars: Vec<BarPoint>,
}

impl Report {
    pub fn new(mode: &str, total_investment: f64, summary: &PortfolioSummary) -> Self {
        Report {
            generated_at: Utc::now(),
            mode: mode.to_string(),
            total_investment,
            allocated: summary.total(),
            low_risk: summary.tier_total(RiskTier::Low),
            high_risk: summary.tier_total(RiskTier::High),
            firms: firm_allocations(summary),
            exposure: exposure_rows(summary),
            bars: exposure_bars(summary),
        }
    }

    pub fn render_text(&self) -> String {
        let mut out = String::new();

        out.push_str(&format!("Firm Allocation ({})\n", self.mode));
        let mut rows: Vec<Vec<String>> = self
            .firms
            .iter()
            .map(|r| {
                vec![
                    r.firm.to_string(),
                    format_currency(r.amount),
                    r.strategies
                        .iter()
                        .map(|s| s.as_str())
                        .collect::<Vec<_>>()
                        .join(", "),
                ]
            })
            .collect();
        rows.push(vec!["Total".into(), format_currency(self.allocated), String::new()]);
        out.push_str(&render_table(&["Firm", "£ Allocation", "Strategy"], &rows));

        out.push_str("\nStrategy Exposure\n");
        let mut rows: Vec<Vec<String>> = self
            .exposure
            .iter()
            .map(|r| {
                vec![
                    r.strategy.to_string(),
                    format_currency(r.low),
                    format_currency(r.high),
                    format_currency(r.total),
                    format!("{}%", r.share_percent),
                ]
            })
            .collect();
        rows.push(vec![
            "Total".into(),
            format_currency(self.low_risk),
            format_currency(self.high_risk),
            format_currency(self.allocated),
            "100%".into(),
        ]);
        out.push_str(&render_table(
            &["Strategy Type", "Low Risk £", "High Risk £", "Total £", "% of Portfolio"],
            &rows,
        ));
        out
    }
}

pub fn render_reference(rows: &[FirmReferenceRow]) -> String {
    let body: Vec<Vec<String>> = rows
        .iter()
        .map(|r| vec![r.index.to_string(), r.firm.to_string(), r.strategies_offered.clone()])
        .collect();
    render_table(&["#", "Firm", "Strategies Offered"], &body)
}

/// Left-aligned plain text table.
pub fn render_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if i < widths.len() {
                widths[i] = widths[i].max(cell.chars().count());
            }
        }
    }

    let line = |cells: Vec<&str>| -> String {
        let padded: Vec<String> = cells
            .iter()
            .zip(&widths)
            .map(|(c, w)| format!("{:<width$}", c, width = *w))
            .collect();
        format!("{}\n", padded.join("  ").trim_end())
    };

    let mut out = line(headers.to_vec());
    let rules: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    out.push_str(&line(rules.iter().map(String::as_str).collect()));
    for row in rows {
        out.push_str(&line(row.iter().map(String::as_str).collect()));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::OfferingKey;
    use crate::exposure::AllocationResult;

    fn summary(entries: &[(&str, &str, RiskTier, f64)]) -> PortfolioSummary {
        let result = AllocationResult::from_offerings(
            entries
                .iter()
                .map(|(f, s, r, a)| {
                    (
                        OfferingKey {
                            firm: (*f).into(),
                            strategy: (*s).into(),
                            risk: *r,
                        },
                        *a,
                    )
                })
                .collect(),
        );
        [&result].into_iter().collect()
    }

    #[test]
    fn currency_has_separators_and_no_decimals() {
        assert_eq!(format_currency(0.0), "£0");
        assert_eq!(format_currency(999.4), "£999");
        assert_eq!(format_currency(1000.0), "£1,000");
        assert_eq!(format_currency(1095.238), "£1,095");
        assert_eq!(format_currency(1_234_567.8), "£1,234,568");
        assert_eq!(format_currency(-2500.0), "-£2,500");
    }

    #[test]
    fn currency_rounds_halves_to_even() {
        assert_eq!(format_currency(1234.5), "£1,234");
        assert_eq!(format_currency(1235.5), "£1,236");
        assert_eq!(format_currency(2.5), "£2");
        assert_eq!(format_currency(0.5), "£0");
    }

    #[test]
    fn reference_is_sorted_and_numbered() {
        let rows = firm_reference(Catalog::builtin());
        let firms: Vec<&str> = rows.iter().map(|r| r.firm.as_str()).collect();
        assert_eq!(firms, vec!["Downing", "Octopus", "Puma", "Time"]);
        assert_eq!(rows[0].index, 1);
        assert_eq!(
            rows[3].product_mix,
            "50% Property Lending (High Risk), 50% Renewables (Low Risk)"
        );
        assert_eq!(
            rows[0].product_mix,
            "33% Property Lending (Low Risk), 33% Renewables (Low Risk), 33% Forestry (High Risk)"
        );
        assert_eq!(rows[2].strategies_offered, "Property Lending (Low Risk)");
    }

    #[test]
    fn exposure_rows_skip_empty_strategies() {
        let s = summary(&[
            ("Time", "Renewables", RiskTier::Low, 750.0),
            ("Octopus", "Forestry", RiskTier::High, 250.0),
            ("Downing", "Forestry", RiskTier::High, 0.0),
            ("Puma", "Property Lending", RiskTier::Low, 0.0),
        ]);
        let rows = exposure_rows(&s);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].strategy.as_str(), "Forestry");
        assert_eq!(rows[0].share_percent, 25.0);
        assert_eq!(rows[1].share_percent, 75.0);

        let bars = exposure_bars(&s);
        assert_eq!(bars.len(), 2);
        assert!(bars.iter().all(|b| b.amount > 0.0));
    }

    #[test]
    fn firm_rows_are_ordered_by_name() {
        let s = summary(&[
            ("Puma", "Property Lending", RiskTier::Low, 100.0),
            ("Time", "Renewables", RiskTier::Low, 100.0),
            ("Octopus", "Forestry", RiskTier::High, 100.0),
            ("Downing", "Forestry", RiskTier::High, 100.0),
        ]);
        let firms: Vec<String> = firm_allocations(&s).into_iter().map(|r| r.firm.to_string()).collect();
        assert_eq!(firms, vec!["Downing", "Octopus", "Puma", "Time"]);
    }

    #[test]
    fn empty_summary_has_no_exposure_rows() {
        assert!(exposure_rows(&PortfolioSummary::new()).is_empty());
    }

    #[test]
    fn text_report_includes_totals() {
        let s = summary(&[
            ("Time", "Renewables", RiskTier::Low, 6000.0),
            ("Octopus", "Forestry", RiskTier::High, 4000.0),
        ]);
        let report = Report::new("Risk Exposure", 10_000.0, &s);
        let text = report.render_text();
        assert!(text.contains("£10,000"));
        assert!(text.contains("£6,000"));
        assert!(text.contains("Strategy Exposure"));

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["allocated"], 10_000.0);
        assert_eq!(json["firms"][0]["firm"], "Octopus");
        assert!(json["generated_at"].is_string());
    }
}
