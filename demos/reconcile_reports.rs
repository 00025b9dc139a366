use daily_profit_ledger::{process_reports, IngestionConfig, IngestionStatus, SourceFile};
use std::env;
use std::fs;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();
    if args.len() < 3 {
        eprintln!(
            "usage: {} <sales-report> <ads-report> [config.json]",
            args.first().map(String::as_str).unwrap_or("reconcile_reports")
        );
        std::process::exit(2);
    }

    let config = match args.get(3) {
        Some(path) => IngestionConfig::from_json_file(path)?,
        None => IngestionConfig::default(),
    };

    let sales = fs::read(&args[1])?;
    let ads = fs::read(&args[2])?;

    let outcome = process_reports(
        SourceFile::new(&args[1], &sales),
        SourceFile::new(&args[2], &ads),
        &config,
    );

    for (name, status) in [("Sales", &outcome.revenue_status), ("Ads", &outcome.spend_status)] {
        match status {
            IngestionStatus::Success {
                days,
                date_column,
                value_column,
            } => println!(
                "{}: {} days (date: '{}', value: '{}')",
                name, days, date_column, value_column
            ),
            IngestionStatus::Failed { reason } => println!("{}: {}", name, reason),
        }
    }

    let Some(ledger) = outcome.ledger else {
        println!("\nLedger withheld: both reports must be readable.");
        return Ok(());
    };

    println!(
        "\n{:<12} {:>12} {:>12} {:>12} {:>8}",
        "Date", "Revenue", "Cost", "Balance", "Ratio"
    );
    for row in &ledger.rows {
        let ratio = row
            .ratio
            .map(|r| format!("{:.2}", r))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<12} {:>12.2} {:>12.2} {:>12.2} {:>8}",
            row.date.to_string(), row.revenue, row.cost, row.balance, ratio
        );
    }

    let summary = ledger.summary();
    println!("\nTotal revenue: {:.2}", summary.total_revenue);
    println!("Total cost:    {:.2}", summary.total_cost);
    println!("Net balance:   {:.2}", summary.total_balance);
    match summary.roi_percent {
        Some(roi) => println!("ROI:           {:.1}%", roi),
        None => println!("ROI:           n/a (no spend)"),
    }

    Ok(())
}
