use anyhow::Context;
use clap::ValueEnum;
use serde::Serialize;
use tantrata_core::analytics::{AnalyticsEngine, DashboardReport};
use tantrata_db::{SalesHistoryRepository, SqlSalesRepository};

use crate::commands::{open_current, prepare, CommandResult, EXIT_DATABASE, EXIT_RUNTIME};

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ReportKind {
    Forecast,
    Anomalies,
    Prices,
    Restock,
    Recommendations,
    Dashboard,
}

impl ReportKind {
    fn label(self) -> &'static str {
        match self {
            Self::Forecast => "forecast",
            Self::Anomalies => "anomalies",
            Self::Prices => "prices",
            Self::Restock => "restock",
            Self::Recommendations => "recommendations",
            Self::Dashboard => "dashboard",
        }
    }
}

#[derive(Debug, Serialize)]
struct ReportPayload<'a, T: Serialize> {
    command: &'static str,
    status: &'static str,
    report: &'static str,
    data: &'a T,
}

pub fn run(kind: ReportKind, json_output: bool) -> CommandResult {
    let (config, runtime) = match prepare("report") {
        Ok(prepared) => prepared,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let pool = open_current(&config).await?;
        let repo = SqlSalesRepository::new(pool.clone());

        let loaded = async {
            let facts = repo.load_sale_lines().await?;
            let baskets = repo.load_baskets().await?;
            Ok::<_, tantrata_db::RepositoryError>((facts, baskets))
        }
        .await;
        pool.close().await;

        loaded.map_err(|error| ("sales_history", error.to_string(), EXIT_DATABASE))
    });

    let (facts, baskets) = match result {
        Ok(loaded) => loaded,
        Err((error_class, message, exit_code)) => {
            return CommandResult::failure("report", error_class, message, exit_code);
        }
    };

    let engine = AnalyticsEngine::from_config(&config.analytics);
    let mut report = DashboardReport::default();
    match kind {
        ReportKind::Forecast => report.forecasts = engine.forecast(&facts),
        ReportKind::Anomalies => report.anomalies = engine.anomalies(&facts),
        ReportKind::Prices => report.optimal_prices = engine.optimal_prices(&facts),
        ReportKind::Restock => report.restock = engine.restock(&facts),
        ReportKind::Recommendations => report.recommendations = engine.recommendations(&baskets),
        ReportKind::Dashboard => report = engine.dashboard(&facts, &baskets),
    }

    let rendered =
        if json_output { render_json(kind, &report) } else { Ok(render_human(kind, &report)) };
    match rendered {
        Ok(output) => CommandResult { exit_code: 0, output },
        Err(error) => {
            CommandResult::failure("report", "serialization", format!("{error:#}"), EXIT_RUNTIME)
        }
    }
}

fn render_json(kind: ReportKind, report: &DashboardReport) -> anyhow::Result<String> {
    let output = match kind {
        ReportKind::Forecast => payload(kind, &report.forecasts),
        ReportKind::Anomalies => payload(kind, &report.anomalies),
        ReportKind::Prices => payload(kind, &report.optimal_prices),
        ReportKind::Restock => payload(kind, &report.restock),
        ReportKind::Recommendations => payload(kind, &report.recommendations),
        ReportKind::Dashboard => payload(kind, report),
    };
    output.with_context(|| format!("failed to serialize {} report", kind.label()))
}

fn payload<T: Serialize>(kind: ReportKind, data: &T) -> serde_json::Result<String> {
    serde_json::to_string(&ReportPayload {
        command: "report",
        status: "ok",
        report: kind.label(),
        data,
    })
}

fn render_human(kind: ReportKind, report: &DashboardReport) -> String {
    let mut lines = Vec::new();
    let show = |section: ReportKind| kind == section || kind == ReportKind::Dashboard;

    if show(ReportKind::Forecast) {
        lines.push(format!("Demand forecast ({} products)", report.forecasts.len()));
        for row in &report.forecasts {
            lines.push(format!("  {}: {}", row.product_name, row.predicted_quantity));
        }
    }
    if show(ReportKind::Anomalies) {
        lines.push(format!("Demand anomalies ({} days)", report.anomalies.len()));
        for row in &report.anomalies {
            lines.push(format!("  {} on {}: {}", row.product_name, row.date, row.quantity));
        }
    }
    if show(ReportKind::Prices) {
        lines.push(format!("Optimal prices ({} products)", report.optimal_prices.len()));
        for row in &report.optimal_prices {
            lines.push(format!("  {}: {}", row.product_name, row.optimal_price));
        }
    }
    if show(ReportKind::Restock) {
        lines.push(format!("Restock suggestions ({} products)", report.restock.len()));
        for row in &report.restock {
            lines.push(format!("  {}: {}", row.product_name, row.recommended_quantity));
        }
    }
    if show(ReportKind::Recommendations) {
        lines.push(format!("Bought together ({} products)", report.recommendations.len()));
        for row in &report.recommendations {
            lines.push(format!(
                "  {} -> {} ({} sales)",
                row.product_name, row.recommended_product, row.co_count
            ));
        }
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use tantrata_core::analytics::{DashboardReport, ForecastResult, Recommendation};
    use tantrata_core::domain::product::ProductId;

    use super::{render_human, render_json, ReportKind};

    fn sample() -> DashboardReport {
        DashboardReport {
            forecasts: vec![ForecastResult {
                product_id: ProductId(1),
                product_name: "Green Tea".to_string(),
                predicted_quantity: 42,
            }],
            recommendations: vec![Recommendation {
                product_name: "Green Tea".to_string(),
                recommended_product: "Honey Jar".to_string(),
                co_count: 3,
            }],
            ..DashboardReport::default()
        }
    }

    #[test]
    fn json_report_wraps_only_the_requested_section() {
        let output = render_json(ReportKind::Forecast, &sample()).expect("render");
        let payload: serde_json::Value = serde_json::from_str(&output).expect("json");

        assert_eq!(payload["report"], "forecast");
        assert_eq!(payload["data"][0]["product_name"], "Green Tea");
        assert_eq!(payload["data"][0]["predicted_quantity"], 42);
    }

    #[test]
    fn human_dashboard_lists_every_section() {
        let output = render_human(ReportKind::Dashboard, &sample());

        assert!(output.contains("Demand forecast (1 products)"));
        assert!(output.contains("  Green Tea: 42"));
        assert!(output.contains("Demand anomalies (0 days)"));
        assert!(output.contains("  Green Tea -> Honey Jar (3 sales)"));
    }

    #[test]
    fn human_single_report_hides_other_sections() {
        let output = render_human(ReportKind::Recommendations, &sample());

        assert!(!output.contains("Demand forecast"));
        assert!(output.starts_with("Bought together"));
    }
}
