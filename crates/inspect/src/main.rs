// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! # revtrail-inspect
//!
//! Reads the audit history of a revtrail `SQLite` database.
//!
//! - `revisions` lists every revision with its timestamp and properties
//! - `history`, `at`, and `collection` follow one entity through time
//! - `changed` shows every audit row a revision wrote
//! - `demo` writes a short customer lifecycle so there is something to read
//!
//! The audit configuration comes from a JSON file (`--config`) or from
//! `revtrail.*` properties (`--set`); it must match the configuration the
//! history was written with.

#![deny(
    clippy::pedantic,
    clippy::cargo,
    clippy::nursery,
    clippy::style,
    clippy::correctness,
    clippy::all
)]
#![allow(clippy::multiple_crate_versions)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use clap_verbosity_flag::{InfoLevel, Verbosity};
use color_eyre::{Result, eyre::Context};
use revtrail::{AuditContext, DefaultRevisionInfoGenerator, RevisionData};
use revtrail_domain::{AuditConfiguration, EntityId, EntityName};
use revtrail_persistence::{AuditRecord, Database};
use tracing::info;
use tracing::level_filters::LevelFilter;
use tracing_log::AsTrace;

mod demo;
mod render;

fn main() -> Result<()> {
    color_eyre::install()?;
    let args: Args = Args::parse();
    tracing_subscriber::fmt()
        .with_max_level(args.log_level())
        .with_writer(std::io::stderr)
        .without_time()
        .init();

    match args.run() {
        Ok(lines) => {
            for line in lines {
                println!("{line}");
            }
        }
        Err(err) => {
            tracing::error!("{err:?}");
            std::process::exit(1);
        }
    }
    Ok(())
}

/// revtrail-inspect - read the audit history of a revtrail database
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the `SQLite` database file. If not provided, uses an in-memory database.
    #[arg(short, long)]
    database: Option<PathBuf>,

    /// JSON file holding the audit configuration
    #[arg(short, long, conflicts_with = "set")]
    config: Option<PathBuf>,

    /// Audit configuration property, e.g. `revtrail.audit_strategy=validity`
    #[arg(long, value_name = "KEY=VALUE", value_parser = parse_property)]
    set: Vec<(String, String)>,

    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    verbosity: Verbosity<InfoLevel>,
}

impl Args {
    fn run(self) -> Result<Vec<String>> {
        let config: AuditConfiguration = self.configuration()?;
        let context: Arc<AuditContext> = Arc::new(match &self.command {
            Command::Demo { user } => {
                let generator: DefaultRevisionInfoGenerator =
                    DefaultRevisionInfoGenerator::new(config.track_entities_changed_in_revision)
                        .with_listener(Arc::new(demo::UserListener::new(user)));
                AuditContext::new(config, Arc::new(generator))
            }
            _ => AuditContext::with_default_generator(config),
        });

        let mut db: Database = open_database(self.database.as_deref(), context)?;
        self.command.run(&mut db)
    }

    fn log_level(&self) -> LevelFilter {
        self.verbosity.log_level_filter().as_trace()
    }

    fn configuration(&self) -> Result<AuditConfiguration> {
        if let Some(path) = &self.config {
            let text: String = std::fs::read_to_string(path)
                .wrap_err_with(|| format!("Failed to read {}", path.display()))?;
            return serde_json::from_str(&text)
                .wrap_err_with(|| format!("Invalid audit configuration in {}", path.display()));
        }
        AuditConfiguration::from_properties(self.set.iter().map(|(k, v)| (k, v)))
            .wrap_err("Invalid audit configuration property")
    }
}

#[derive(Clone, Debug, Subcommand)]
enum Command {
    /// List every revision with its timestamp and properties
    #[command(visible_alias = "r")]
    Revisions,

    /// Show every audit row of one entity, oldest first
    #[command(visible_alias = "h")]
    History {
        /// Entity name, e.g. `Customer`
        entity: String,
        /// Entity identifier; integers are numeric ids
        id: String,
    },

    /// Show an entity as it was at a revision
    At {
        /// Entity name
        entity: String,
        /// Entity identifier
        id: String,
        /// Revision number
        #[arg(short, long)]
        revision: i64,
    },

    /// Show the audit rows written in a revision
    #[command(visible_alias = "c")]
    Changed {
        /// Revision number
        revision: i64,
    },

    /// Show element changes of one collection of an entity
    Collection {
        /// Owning entity name
        entity: String,
        /// Owning entity identifier
        id: String,
        /// Collection property
        role: String,
    },

    /// Write a sample customer lifecycle into the database
    Demo {
        /// Recorded as the `user` property of each revision
        #[arg(long, default_value = "demo")]
        user: String,
    },
}

impl Command {
    fn run(self, db: &mut Database) -> Result<Vec<String>> {
        match self {
            Self::Revisions => revision_lines(db),
            Self::History { entity, id } => {
                let records: Vec<AuditRecord> =
                    db.get_history(&EntityName::new(entity), &EntityId::parse_key(&id))?;
                Ok(records.iter().map(render::record).collect())
            }
            Self::At {
                entity,
                id,
                revision,
            } => {
                let found: Option<AuditRecord> = db.find_at_revision(
                    &EntityName::new(entity.as_str()),
                    &EntityId::parse_key(&id),
                    revision,
                )?;
                Ok(vec![found.map_or_else(
                    || format!("{entity} {id} did not exist at revision {revision}"),
                    |record| render::record(&record),
                )])
            }
            Self::Changed { revision } => {
                let data: RevisionData = db.get_revision(revision)?;
                let mut lines: Vec<String> = vec![render::revision(&data)];
                lines.extend(
                    db.get_entities_changed_at(revision)?
                        .iter()
                        .map(|record| format!("  {}", render::record(record))),
                );
                Ok(lines)
            }
            Self::Collection { entity, id, role } => {
                let records: Vec<AuditRecord> = db.get_collection_history(
                    &EntityName::new(entity),
                    &EntityId::parse_key(&id),
                    &role,
                )?;
                Ok(records.iter().map(render::record).collect())
            }
            Self::Demo { .. } => {
                demo::run(db).wrap_err("Failed to write the demo history")?;
                revision_lines(db)
            }
        }
    }
}

fn revision_lines(db: &mut Database) -> Result<Vec<String>> {
    let mut lines: Vec<String> = Vec::new();
    for revision in db.list_revisions()? {
        lines.push(render::revision(&db.get_revision(revision)?));
    }
    Ok(lines)
}

fn open_database(path: Option<&Path>, context: Arc<AuditContext>) -> Result<Database> {
    if let Some(path) = path {
        info!("Using file-based database at: {}", path.display());
        Database::new_with_file(path, context)
            .wrap_err_with(|| format!("Failed to open {}", path.display()))
    } else {
        info!("Using in-memory database");
        Ok(Database::new_in_memory(context)?)
    }
}

fn parse_property(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(key, value)| (key.trim().to_string(), value.to_string()))
        .ok_or_else(|| format!("expected KEY=VALUE, got `{raw}`"))
}
