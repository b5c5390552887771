use std::{io, thread};

use beleg_config::ConfigManager;
use beleg_core::{LedgerStoreExt, ManualEntry, NewRecurring, RecurringOverview, ScanReport};
use beleg_domain::{
    Business, BusinessPatch, DependentResolution, Identifier, Record, RecordFilter,
    RecurringPatch,
};
use chrono::Datelike;
use uuid::Uuid;

use super::{
    output::{self, OutputPreferences},
    BusinessCommand, Cli, Command, ListArgs, RecurringCommand,
};
use crate::{AppError, Beleg};

/// Executes one parsed command line.
pub fn run(cli: Cli) -> Result<(), AppError> {
    output::set_preferences(OutputPreferences { plain: cli.plain });
    let manager = match &cli.home {
        Some(home) => ConfigManager::with_base_dir(home.clone())?,
        None => ConfigManager::from_env()?,
    };
    let mut config = manager.load()?;
    if let Command::Watch {
        interval: Some(secs),
    } = &cli.command
    {
        config.watch_interval_secs = *secs;
    }
    let app = Beleg::open_with(&manager, config)?;

    match cli.command {
        Command::Watch { .. } => watch(&app),
        Command::Scan => {
            print_scan(&app.watcher().scan_once());
            Ok(())
        }
        Command::Generate => {
            let summary = app.recurring().generate_now()?;
            output::success(format!(
                "{} occurrence(s) generated, {} archived",
                summary.created.len(),
                summary.archived.len()
            ));
            Ok(())
        }
        Command::List(args) => list(&app, &args),
        Command::Show { key } => {
            let record = resolve_record(&app, &key)?;
            print_record_detail(&app, &record)
        }
        Command::Review { key, fields } => {
            let record = resolve_record(&app, &key)?;
            let archived = app.lifecycle().review(record.id, &fields.to_patch())?;
            output::success(format!("archived as {}", identifier_label(&archived)));
            Ok(())
        }
        Command::Edit { key, fields } => {
            let record = resolve_record(&app, &key)?;
            let updated = app.lifecycle().update_fields(record.id, &fields.to_patch())?;
            output::success(format!("updated {}", identifier_label(&updated)));
            Ok(())
        }
        Command::Add(args) => {
            let business_id = optional_business(&app, args.business.as_deref())?.map(|b| b.id);
            let record = app.lifecycle().create_manual(ManualEntry {
                business_id,
                kind: args.kind,
                date: args.date,
                amount: args.amount,
                category: args.category,
                description: args.description,
            })?;
            output::success(format!("archived as {}", identifier_label(&record)));
            Ok(())
        }
        Command::Attach { key, file } => {
            let record = resolve_record(&app, &key)?;
            let updated = app.lifecycle().attach_scan(record.id, &file)?;
            output::success(format!(
                "{} now backed by {}",
                identifier_label(&updated),
                artifact_label(&updated)
            ));
            Ok(())
        }
        Command::Delete { key } => {
            let record = resolve_record(&app, &key)?;
            app.lifecycle().delete(record.id)?;
            output::success(format!("deleted {}", identifier_label(&record)));
            Ok(())
        }
        Command::Flag { key, off } => {
            let record = resolve_record(&app, &key)?;
            let updated = app.lifecycle().set_flagged(record.id, !off)?;
            let state = if updated.flagged { "flagged" } else { "unflagged" };
            output::success(format!("{} {state}", identifier_label(&updated)));
            Ok(())
        }
        Command::Business(command) => business(&app, command),
        Command::Recurring(command) => recurring(&app, command),
        Command::Summary { business, year } => summary(&app, business.as_deref(), year),
        Command::Stale => stale(&app),
    }
}

fn watch(app: &Beleg) -> Result<(), AppError> {
    let watcher = app.watcher();
    watcher.start()?;
    output::info(format!(
        "watching {} every {}s; press Enter to stop",
        app.lifecycle().layout().inbox_root().display(),
        watcher.interval().as_secs()
    ));
    let mut line = String::new();
    if io::stdin().read_line(&mut line)? == 0 {
        output::info("stdin closed; stop with Ctrl-C");
        loop {
            thread::park();
        }
    }
    watcher.stop()?;
    output::success("watcher stopped");
    Ok(())
}

fn print_scan(report: &ScanReport) {
    output::success(format!(
        "{} new file(s), {} archived, {} awaiting review",
        report.discovered, report.archived, report.awaiting_review
    ));
    if report.failed_files + report.failed_businesses > 0 {
        output::warning(format!(
            "{} file(s) and {} business folder(s) failed; see log",
            report.failed_files, report.failed_businesses
        ));
    }
    if report.generated > 0 {
        output::info(format!("{} recurring occurrence(s) generated", report.generated));
    }
}

fn list(app: &Beleg, args: &ListArgs) -> Result<(), AppError> {
    let filter = RecordFilter {
        kind: args.kind,
        category: args.category,
        year: args.year,
        date_from: args.from,
        date_to: args.to,
        business_id: optional_business(app, args.business.as_deref())?.map(|b| b.id),
        state: args.state.map(Into::into),
        search: args.search.clone(),
    };
    let records = app.lifecycle().list(&filter)?;
    if records.is_empty() {
        output::info("no records");
        return Ok(());
    }
    for record in &records {
        output::info(record_row(record));
    }
    output::info(format!("{} record(s)", records.len()));
    Ok(())
}

fn record_row(record: &Record) -> String {
    format!(
        "{:<18} {:<10} {:>11} {:<14} {:<9} {}{}",
        record
            .identifier
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_else(|| short_id(record.id)),
        record
            .date
            .map(|date| date.to_string())
            .unwrap_or_else(|| "-".into()),
        record
            .amount
            .map(|amount| amount.round_dp(2).to_string())
            .unwrap_or_else(|| "-".into()),
        record
            .category
            .map(|category| category.to_string())
            .unwrap_or_else(|| "-".into()),
        record.state().to_string(),
        record.description.as_deref().unwrap_or(""),
        if record.flagged { " [!]" } else { "" }
    )
}

fn print_record_detail(app: &Beleg, record: &Record) -> Result<(), AppError> {
    output::section(identifier_label(record));
    let business = match record.business_id {
        Some(id) => Some(app.businesses().get(id)?.name),
        None => None,
    };
    let rows = [
        ("id", record.id.to_string()),
        ("state", record.state().to_string()),
        ("business", business.unwrap_or_else(|| "-".into())),
        ("date", display_or_dash(record.date)),
        ("amount", display_or_dash(record.amount)),
        ("category", display_or_dash(record.category)),
        ("description", record.description.clone().unwrap_or_default()),
        ("artifact", artifact_label(record)),
        ("placeholder", record.placeholder.to_string()),
        ("recurring", record.recurring_generated.to_string()),
        ("flagged", record.flagged.to_string()),
    ];
    for (label, value) in rows {
        output::info(format!("{label:<12} {value}"));
    }
    let missing = record.missing_fields();
    if !missing.is_empty() {
        output::warning(format!("missing: {}", missing.join(", ")));
    }
    Ok(())
}

fn business(app: &Beleg, command: BusinessCommand) -> Result<(), AppError> {
    match command {
        BusinessCommand::Add {
            name,
            prefix,
            color,
        } => {
            let business = app.businesses().create(&name, &prefix, color.as_deref())?;
            output::success(format!("created {} [{}]", business.name, business.prefix));
        }
        BusinessCommand::List => {
            let businesses = app.businesses().list()?;
            if businesses.is_empty() {
                output::info("no businesses");
            }
            for business in businesses {
                let (records, definitions) = app
                    .store()
                    .query(|book| book.dependents_of(business.id))?;
                output::info(format!(
                    "{:<6} {:<24} {} record(s), {} recurring",
                    business.prefix, business.name, records, definitions
                ));
            }
        }
        BusinessCommand::Edit {
            key,
            name,
            prefix,
            color,
        } => {
            let business = resolve_business(app, &key)?;
            let patch = BusinessPatch {
                name,
                prefix,
                color,
            };
            let updated = app.businesses().update(business.id, &patch)?;
            output::success(format!("updated {} [{}]", updated.name, updated.prefix));
        }
        BusinessCommand::Remove {
            key,
            cascade,
            reassign_to,
        } => {
            let business = resolve_business(app, &key)?;
            let resolution = match (cascade, reassign_to) {
                (true, _) => DependentResolution::Cascade,
                (false, Some(target)) => {
                    DependentResolution::ReassignTo(resolve_business(app, &target)?.id)
                }
                (false, None) => DependentResolution::Block,
            };
            let removal = app.businesses().delete(business.id, resolution)?;
            output::success(format!(
                "removed {} ({} record(s), {} recurring deleted)",
                removal.business.name, removal.records_deleted, removal.definitions_deleted
            ));
        }
    }
    Ok(())
}

fn recurring(app: &Beleg, command: RecurringCommand) -> Result<(), AppError> {
    match command {
        RecurringCommand::Add(args) => {
            let business_id = optional_business(app, args.business.as_deref())?.map(|b| b.id);
            let (definition, summary) = app.recurring().create(NewRecurring {
                business_id,
                kind: args.kind,
                amount: args.amount,
                category: args.category,
                description: args.description,
                frequency: args.frequency,
                day_of_month: args.day,
                start_date: args.start,
                end_date: args.end,
            })?;
            output::success(format!(
                "recurring {} created; {} occurrence(s) archived",
                definition.id,
                summary.archived.len()
            ));
        }
        RecurringCommand::List { business, active } => {
            let business_id = optional_business(app, business.as_deref())?.map(|b| b.id);
            let overview = app.recurring().list(business_id, active)?;
            if overview.is_empty() {
                output::info("no recurring bookings");
            }
            for entry in &overview {
                output::info(recurring_row(entry));
            }
        }
        RecurringCommand::Pause { id } => {
            set_active(app, &id, false)?;
            output::success("paused");
        }
        RecurringCommand::Resume { id } => {
            let summary = set_active(app, &id, true)?;
            output::success(format!("resumed; {} occurrence(s) generated", summary));
        }
        RecurringCommand::Remove { id } => {
            let removed = app.recurring().delete(parse_uuid(&id)?)?;
            output::success(format!("removed {}", removed.description));
        }
    }
    Ok(())
}

fn set_active(app: &Beleg, id: &str, active: bool) -> Result<usize, AppError> {
    let patch = RecurringPatch {
        active: Some(active),
        ..RecurringPatch::default()
    };
    let (_, summary) = app.recurring().update(parse_uuid(id)?, &patch)?;
    Ok(summary.created.len())
}

fn recurring_row(entry: &RecurringOverview) -> String {
    let definition = &entry.definition;
    format!(
        "{} {:<9} {:>10} {:<14} {:<24} next after {} ({} generated){}",
        definition.id,
        definition.frequency.to_string(),
        definition.amount.round_dp(2).to_string(),
        definition.category.to_string(),
        definition.description,
        display_or_dash(definition.last_generated),
        entry.generated_count,
        if definition.active { "" } else { " [paused]" }
    )
}

fn summary(app: &Beleg, business: Option<&str>, year: Option<i32>) -> Result<(), AppError> {
    let business = optional_business(app, business)?;
    let year = year.unwrap_or_else(|| app.clock().today().year());
    let dashboard = app.dashboard(business.as_ref().map(|b| b.id), year)?;
    let scope = business.map_or_else(|| "all businesses".to_string(), |b| b.name);
    output::section(format!("{year}, {scope}"));
    output::info(format!("income    {:>12}", dashboard.year_totals.income.round_dp(2).to_string()));
    output::info(format!("expenses  {:>12}", dashboard.year_totals.expenses.round_dp(2).to_string()));
    output::info(format!("profit    {:>12}", dashboard.year_totals.profit().round_dp(2).to_string()));
    output::info(format!(
        "this month {:>11}",
        dashboard.month_totals.profit().round_dp(2).to_string()
    ));
    for entry in &dashboard.by_category {
        output::info(format!(
            "  {:<8} {:<16} {:>12}",
            entry.kind.to_string(),
            entry.category.to_string(),
            entry.total.round_dp(2).to_string()
        ));
    }
    if dashboard.pending_reviews > 0 {
        output::warning(format!("{} record(s) awaiting review", dashboard.pending_reviews));
    }
    Ok(())
}

fn stale(app: &Beleg) -> Result<(), AppError> {
    let stale = app.lifecycle().stale_artifacts()?;
    if stale.is_empty() {
        output::success("every archived record has its artifact in place");
        return Ok(());
    }
    for entry in &stale {
        output::warning(format!(
            "{} {:?}: {} (expected {})",
            identifier_label(&entry.record),
            entry.reason,
            artifact_label(&entry.record),
            entry
                .expected
                .as_deref()
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "-".into())
        ));
    }
    Ok(())
}

fn resolve_record(app: &Beleg, key: &str) -> Result<Record, AppError> {
    if let Ok(id) = Uuid::parse_str(key) {
        return Ok(app.lifecycle().get(id)?);
    }
    if let Ok(identifier) = Identifier::parse(key) {
        return app
            .store()
            .query(|book| book.record_by_identifier(&identifier).cloned())?
            .ok_or_else(|| AppError::usage(format!("no record with identifier {identifier}")));
    }
    // Short ids as printed by `list`.
    let prefix = key.to_ascii_lowercase();
    let mut matches = app.store().query(|book| {
        book.records
            .iter()
            .filter(|record| record.id.simple().to_string().starts_with(&prefix))
            .cloned()
            .collect::<Vec<_>>()
    })?;
    match matches.len() {
        1 if prefix.len() >= 4 => Ok(matches.remove(0)),
        0 => Err(AppError::usage(format!(
            "`{key}` is neither a record id nor an identifier"
        ))),
        _ => Err(AppError::usage(format!("`{key}` is ambiguous"))),
    }
}

fn resolve_business(app: &Beleg, key: &str) -> Result<Business, AppError> {
    app.businesses()
        .find(key)?
        .ok_or_else(|| AppError::usage(format!("unknown business `{key}`")))
}

fn optional_business(app: &Beleg, key: Option<&str>) -> Result<Option<Business>, AppError> {
    key.map(|key| resolve_business(app, key)).transpose()
}

fn parse_uuid(value: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(value).map_err(|_| AppError::usage(format!("`{value}` is not a valid id")))
}

fn identifier_label(record: &Record) -> String {
    record
        .identifier
        .as_ref()
        .map(ToString::to_string)
        .unwrap_or_else(|| format!("record {}", short_id(record.id)))
}

fn artifact_label(record: &Record) -> String {
    record
        .artifact
        .as_deref()
        .map(|path| path.display().to_string())
        .unwrap_or_else(|| "-".into())
}

fn short_id(id: Uuid) -> String {
    id.simple().to_string()[..8].to_string()
}

fn display_or_dash<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "-".into())
}
