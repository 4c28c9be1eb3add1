//! timestat - Aggregate tracked time and billable cost from timesheet datasets

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use timestat::{
    aggregation::{AggregationRequest, Aggregator},
    cli::{Cli, Command, rounding_from_args},
    cost_calculator::CostCalculator,
    data_loader::DataLoader,
    error::{Result, TimestatError},
    filters::TimeEntryFilter,
    output::{KeyLabels, RateRow, get_formatter},
    provider::RateScopeSource,
    rate_resolver::{RateResolver, RateUpdateScope},
    rate_table::RateTable,
    timezone::TimezoneConfig,
    types::TimeEntry,
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn dataset_path(cli: &Cli) -> Result<PathBuf> {
    cli.data.clone().ok_or_else(|| {
        TimestatError::Config("No dataset given. Pass --data or set TIMESTAT_DATA".to_string())
    })
}

/// Batch-load the rate scopes the filter can reach
async fn load_rate_table(loader: &DataLoader, filter: &TimeEntryFilter) -> Result<RateTable> {
    let scopes = loader.load_rate_scopes(filter.organization_id).await?;
    Ok(RateTable::from_scopes(&scopes))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first to check for quiet flag
    let cli = Cli::parse();

    // Initialize logging. The --quiet flag should override RUST_LOG.
    let filter = if cli.quiet {
        tracing_subscriber::EnvFilter::new("warn")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            tracing_subscriber::EnvFilter::new(if cli.verbose { "timestat=info" } else { "warn" })
        })
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let is_tty = is_terminal::is_terminal(std::io::stdout());
    if !is_tty {
        colored::control::set_override(false);
    }

    let tz_config =
        TimezoneConfig::from_cli(cli.calendar.timezone.as_deref(), cli.calendar.utc)?;
    info!("Using timezone: {}", tz_config.display_name());

    let entry_filter = cli.command.filters().to_filter(tz_config.tz)?;
    let path = dataset_path(&cli)?;
    let formatter = get_formatter(cli.json);

    match cli.command {
        Command::Aggregate {
            group,
            sub_group,
            fill_gaps,
            mode,
            round,
            round_minutes,
            ..
        } => {
            info!("Running aggregation");

            let loader = DataLoader::open(&path).await?;
            let rates = load_rate_table(&loader, &entry_filter).await?;
            let cost_calculator = Arc::new(CostCalculator::new(Arc::new(rates), mode));

            let mut request = AggregationRequest::new()
                .with_timezone(tz_config)
                .with_week_start(cli.calendar.week_start)
                .with_fill_gaps(fill_gaps);
            request.group = group;
            request.sub_group = sub_group;
            request.start = entry_filter.start;
            request.end = entry_filter.end;
            request.rounding = rounding_from_args(round, round_minutes);
            request.filter = entry_filter;

            let show_progress = !cli.json && is_tty;
            let aggregator = Aggregator::new(cost_calculator).with_progress(show_progress);
            let result = aggregator.aggregate_from(&loader, &request).await?;

            let labels = KeyLabels::from_dataset(loader.dataset());
            println!("{}", formatter.format_aggregation(&result, &labels));
        }

        Command::Rates {
            apply_scope, write, ..
        } => {
            info!("Resolving billable rates");

            let mut loader = DataLoader::open(&path).await?;
            let rates = load_rate_table(&loader, &entry_filter).await?;
            let resolver = RateResolver::new(&rates);

            let selected: Vec<usize> = loader
                .dataset()
                .time_entries
                .iter()
                .enumerate()
                .filter(|(_, entry)| entry_filter.matches(entry))
                .filter(|(_, entry)| apply_scope.is_none_or(|scope| scope.affects(entry)))
                .map(|(index, _)| index)
                .collect();
            let mut entries: Vec<TimeEntry> = selected
                .iter()
                .map(|&index| loader.dataset().time_entries[index].clone())
                .collect();

            let rows: Vec<RateRow> = entries
                .iter()
                .map(|entry| {
                    let resolved = resolver.resolve_with_scope(entry);
                    RateRow {
                        entry_id: entry.id,
                        billable: entry.billable,
                        stored: entry.billable_rate,
                        resolved: resolved.map(|(_, rate)| rate),
                        scope: resolved.map(|(scope, _)| scope),
                    }
                })
                .collect();
            println!("{}", formatter.format_rates(&rows));

            if write {
                let changed = store_rates(&resolver, &mut entries, apply_scope);
                let dataset = loader.dataset_mut();
                for (index, entry) in selected.into_iter().zip(entries) {
                    dataset.time_entries[index] = entry;
                }
                loader.save().await?;
                info!(changed, path = %path.display(), "Stored resolved rates");
            }
        }
    }

    Ok(())
}

/// Materialize resolved rates, returning how many stored rates changed
fn store_rates(
    resolver: &RateResolver<'_>,
    entries: &mut [TimeEntry],
    scope: Option<RateUpdateScope>,
) -> usize {
    match scope {
        Some(scope) => resolver.reapply(entries, scope),
        None => entries
            .iter_mut()
            .map(|entry| resolver.materialize(entry))
            .filter(|changed| *changed)
            .count(),
    }
}
