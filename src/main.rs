use clap::{Parser, Subcommand};
use diversify::investor::parse_target;
use diversify::report::{firm_reference, render_reference, Report};
use diversify::{AllocationMode, Diversifier, InvestmentRequest, Settings, StrategyTargets};
use log::{info, warn};
use std::error::Error;

#[derive(Parser, Debug)]
#[command(name = "diversify", about = "Investment diversification calculator")]
struct Args {
    /// JSON settings file overriding the built-in catalog, bias rules and cap
    #[arg(long, global = true)]
    config: Option<String>,

    /// Amount to invest (£); defaults to the configured investment
    #[arg(long, global = true)]
    amount: Option<f64>,

    /// Print the report as JSON instead of tables
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Split by product exposure, e.g. --target "Property Lending=30"
    Product {
        #[arg(long = "target")]
        targets: Vec<String>,
    },
    /// Split by risk exposure; the high-risk share is the complement
    Risk {
        #[arg(long)]
        low: Option<u32>,
    },
    /// Show which strategies each firm offers
    Firms,
}

fn load_settings(path: Option<&str>) -> Result<Settings, Box<dyn Error>> {
    match path {
        Some(p) => {
            info!("loading settings from {}", p);
            Ok(Settings::load(p)?)
        }
        None => Ok(Settings::default()),
    }
}

fn build_mode(command: &Command, settings: &Settings) -> Result<Option<AllocationMode>, Box<dyn Error>> {
    let mode = match command {
        Command::Firms => return Ok(None),
        Command::Product { targets } if targets.is_empty() => {
            let defaults = &settings.defaults.product_targets;
            AllocationMode::ByStrategy(StrategyTargets::from_percentages(
                defaults.iter().map(|t| (t.strategy.clone(), t.percent)),
            )?)
        }
        Command::Product { targets } => {
            let parsed = targets
                .iter()
                .map(|raw| parse_target(raw))
                .collect::<Result<Vec<_>, _>>()?;
            AllocationMode::ByStrategy(StrategyTargets::from_percentages(parsed)?)
        }
        Command::Risk { low } => AllocationMode::ByRisk {
            low_percent: low.unwrap_or(settings.defaults.low_risk_percent),
        },
    };
    Ok(Some(mode))
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let args = Args::parse();

    let settings = load_settings(args.config.as_deref())?;
    let diversifier = Diversifier::from_settings(&settings)?;

    let Some(mode) = build_mode(&args.command, &settings)? else {
        let rows = firm_reference(diversifier.catalog());
        if args.json {
            println!("{}", serde_json::to_string_pretty(&rows)?);
        } else {
            print!("{}", render_reference(&rows));
        }
        return Ok(());
    };

    let amount = args.amount.unwrap_or(settings.defaults.investment);
    if let AllocationMode::ByStrategy(targets) = &mode {
        let unassigned = 1.0 - targets.total();
        if unassigned > 0.0 {
            info!("{:.2}% of the investment has no target and stays unallocated", unassigned * 100.0);
        }
    }
    let request = InvestmentRequest::new(amount, mode);
    let summary = diversifier.run(&request)?;

    if summary.is_empty() {
        warn!("nothing allocated for £{:.2}", amount);
    }
    info!(
        "allocated {:.2} of {:.2} across {} firms",
        summary.total(),
        amount,
        summary.per_firm.len()
    );

    let report = Report::new(request.mode.label(), amount, &summary);
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", render_reference(&firm_reference(diversifier.catalog())));
        println!();
        print!("{}", report.render_text());
    }

    Ok(())
}
