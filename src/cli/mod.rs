//! The `beleg` command line.

mod handlers;
pub mod output;

use std::path::PathBuf;

use beleg_domain::{Category, Frequency, Kind, LifecycleState, RecordPatch};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};
use rust_decimal::Decimal;

pub use handlers::run;

#[derive(Debug, Parser)]
#[command(
    name = "beleg",
    version,
    about = "Files receipts and invoices under permanent identifiers"
)]
pub struct Cli {
    /// Application directory holding config, ledger and backups. Defaults to $BELEG_HOME
    /// or ~/.beleg.
    #[arg(long, global = true, value_name = "DIR")]
    pub home: Option<PathBuf>,

    /// Disable coloured output.
    #[arg(long, global = true)]
    pub plain: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Watch every business inbox until Enter is pressed.
    Watch {
        /// Seconds between scans; overrides the configured interval.
        #[arg(long)]
        interval: Option<u64>,
    },
    /// Scan every inbox once.
    Scan,
    /// Generate due recurring occurrences and archive their placeholders.
    Generate,
    /// List records, newest first.
    List(ListArgs),
    /// Show one record by id or identifier.
    Show { key: String },
    /// Complete the fields of an extracted record and archive it.
    Review {
        key: String,
        #[command(flatten)]
        fields: FieldArgs,
    },
    /// Change fields of a record; archived records keep their identifier.
    Edit {
        key: String,
        #[command(flatten)]
        fields: FieldArgs,
    },
    /// Book an entry without a scan; it is archived with a placeholder.
    Add(ManualArgs),
    /// Attach a scan to a record.
    Attach { key: String, file: PathBuf },
    /// Delete a record.
    Delete { key: String },
    /// Flag a record, or clear the flag with --off.
    Flag {
        key: String,
        #[arg(long)]
        off: bool,
    },
    /// Manage businesses.
    #[command(subcommand)]
    Business(BusinessCommand),
    /// Manage recurring bookings.
    #[command(subcommand)]
    Recurring(RecurringCommand),
    /// Income, expenses and profit for a year.
    Summary {
        #[arg(long)]
        business: Option<String>,
        #[arg(long)]
        year: Option<i32>,
    },
    /// Archived records whose artifact is missing or misplaced.
    Stale,
}

#[derive(Debug, Args)]
pub struct ListArgs {
    /// Business name or prefix.
    #[arg(long)]
    pub business: Option<String>,
    #[arg(long)]
    pub kind: Option<Kind>,
    #[arg(long)]
    pub category: Option<Category>,
    #[arg(long)]
    pub year: Option<i32>,
    /// Earliest booking date, inclusive.
    #[arg(long)]
    pub from: Option<NaiveDate>,
    /// Latest booking date, inclusive.
    #[arg(long)]
    pub to: Option<NaiveDate>,
    #[arg(long, value_enum)]
    pub state: Option<StateArg>,
    /// Matches description or identifier.
    #[arg(long)]
    pub search: Option<String>,
}

#[derive(Debug, Default, Args)]
pub struct FieldArgs {
    /// Booking date, YYYY-MM-DD.
    #[arg(long)]
    pub date: Option<NaiveDate>,
    #[arg(long)]
    pub amount: Option<Decimal>,
    #[arg(long)]
    pub category: Option<Category>,
    #[arg(long)]
    pub description: Option<String>,
}

impl FieldArgs {
    pub fn to_patch(&self) -> RecordPatch {
        RecordPatch {
            date: self.date,
            amount: self.amount,
            category: self.category,
            description: self.description.clone(),
            ..RecordPatch::default()
        }
    }
}

#[derive(Debug, Args)]
pub struct ManualArgs {
    #[arg(long)]
    pub kind: Kind,
    #[arg(long)]
    pub date: NaiveDate,
    #[arg(long)]
    pub amount: Decimal,
    #[arg(long)]
    pub category: Category,
    #[arg(long)]
    pub description: String,
    #[arg(long)]
    pub business: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum BusinessCommand {
    /// Register a business and create its folders.
    Add {
        name: String,
        /// Short code used in identifiers, e.g. TB.
        prefix: String,
        #[arg(long)]
        color: Option<String>,
    },
    List,
    /// Rename a business or change its prefix or colour.
    Edit {
        key: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        prefix: Option<String>,
        #[arg(long)]
        color: Option<String>,
    },
    /// Remove a business. Refused while records or recurring bookings depend on it.
    Remove {
        key: String,
        /// Delete dependent records and recurring bookings too.
        #[arg(long, conflicts_with = "reassign_to")]
        cascade: bool,
        /// Move dependents to this business.
        #[arg(long, value_name = "BUSINESS")]
        reassign_to: Option<String>,
    },
}

#[derive(Debug, Subcommand)]
pub enum RecurringCommand {
    /// Define a recurring booking; due occurrences are generated right away.
    Add(RecurringArgs),
    List {
        #[arg(long)]
        business: Option<String>,
        /// Only active definitions.
        #[arg(long)]
        active: bool,
    },
    Pause { id: String },
    Resume { id: String },
    /// Delete a definition. Archived occurrences stay in the ledger.
    Remove { id: String },
}

#[derive(Debug, Args)]
pub struct RecurringArgs {
    #[arg(long)]
    pub kind: Kind,
    #[arg(long)]
    pub amount: Decimal,
    #[arg(long)]
    pub category: Category,
    #[arg(long)]
    pub description: String,
    #[arg(long, default_value = "monthly")]
    pub frequency: Frequency,
    /// Day of month, 1-31. Short months use their last day.
    #[arg(long)]
    pub day: Option<u32>,
    #[arg(long)]
    pub start: NaiveDate,
    #[arg(long)]
    pub end: Option<NaiveDate>,
    #[arg(long)]
    pub business: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StateArg {
    Ingested,
    Extracted,
    Reviewed,
    Archived,
}

impl From<StateArg> for LifecycleState {
    fn from(value: StateArg) -> Self {
        match value {
            StateArg::Ingested => LifecycleState::Ingested,
            StateArg::Extracted => LifecycleState::Extracted,
            StateArg::Reviewed => LifecycleState::Reviewed,
            StateArg::Archived => LifecycleState::Archived,
        }
    }
}
