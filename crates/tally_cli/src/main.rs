//! `tally` command-line front end.
//!
//! # Responsibility
//! - Load configuration and logging, open the counter database.
//! - Compose the repository and service, run one command, print JSON.

mod cli;

use anyhow::{bail, Context, Result};
use clap::Parser;
use cli::{Args, Commands, FilterArgs};
use log::debug;
use serde::Serialize;
use tally_core::db::open_db_with_options;
use tally_core::{
    init_logging_from_config, BatchItem, CounterRepository, CounterScope, CounterService,
    Isolation, SqliteCounterRepository, TallyConfig,
};

fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = match args.config.as_ref() {
        Some(path) => TallyConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => TallyConfig::default(),
    };
    if let Some(db) = args.db.clone() {
        config.database.path = db;
    }

    init_logging_from_config(&config.logging).context("initializing logging")?;
    debug!(
        "event=cli_start module=cli status=ok db={}",
        config.database.path.display()
    );

    let conn = open_db_with_options(&config.database.path, config.open_options())
        .with_context(|| format!("opening database {}", config.database.path.display()))?;
    let repo = SqliteCounterRepository::try_new(&conn)?;
    let service = CounterService::new(repo).with_default_per_page(config.pagination.per_page);

    run(&service, args.isolate, args.command)
}

fn run<R: CounterRepository>(
    service: &CounterService<R>,
    isolation: Option<Isolation>,
    command: Commands,
) -> Result<()> {
    let target = |title: String, key: String| {
        CounterScope::new()
            .with_isolation(isolation.clone())
            .title(title)
            .key(key)
    };

    match command {
        Commands::Increase { title, key, value } => {
            print_json(&service.increase(&target(title, key), value)?)
        }
        Commands::Decrease { title, key, value } => {
            print_json(&service.decrease(&target(title, key), value)?)
        }
        Commands::Replace { title, key, value } => {
            print_json(&service.replace(&target(title, key), value)?)
        }
        Commands::Increment { title, key } => {
            print_json(&service.increment(&target(title, key))?)
        }
        Commands::Decrement { title, key } => {
            print_json(&service.decrement(&target(title, key))?)
        }
        Commands::Find { filter } => {
            let scope = build_scope(filter, isolation.clone())?;
            print_json(&service.find(&scope)?)
        }
        Commands::Get { filter } => {
            let scope = build_scope(filter, isolation.clone())?;
            print_json(&service.get(&scope)?)
        }
        Commands::Paginate {
            filter,
            page,
            per_page,
        } => {
            let scope = build_scope(filter, isolation.clone())?;
            print_json(&service.paginate(&scope, page, per_page)?)
        }
        Commands::Remove { filter } => {
            let scope = build_scope(filter, isolation.clone())?;
            print_json(&service.remove(&scope)?)
        }
        Commands::RemoveId { id } => {
            service.remove_by_id(id)?;
            print_json(&id)
        }
        Commands::Batch {
            action,
            title,
            items,
        } => {
            let scope = CounterScope::new()
                .with_isolation(isolation.clone())
                .title(title);
            let items = parse_items(&items)?;
            print_json(&service.do_many(&scope, &action, &items)?)
        }
    }
}

fn build_scope(filter: FilterArgs, isolation: Option<Isolation>) -> Result<CounterScope> {
    let mut scope = CounterScope::new().with_isolation(isolation);

    if let Some(title) = filter.title {
        scope = scope.title(title);
    }
    if let Some(key) = filter.key {
        scope = scope.key(key);
    }
    if let Some(keys) = filter.keys {
        scope = scope.in_keys(keys);
    }
    if let Some(titles) = filter.titles {
        scope = scope.in_titles(titles);
    }
    if let Some(fragment) = filter.contains {
        scope = scope.contains(fragment);
    }
    if let Some(kind) = filter.kind {
        scope = scope.of_type(kind);
    }
    if let Some(join) = filter.join {
        let Some((table, pk)) = join.split_once(':') else {
            bail!("expected --join TABLE:PK, got `{join}`");
        };
        scope = scope.join(table, pk, filter.columns)?;
    }

    Ok(scope)
}

/// Accepts `{"k1":5}` or `[{"key":"k1","value":5}]`; object keys keep input order.
fn parse_items(text: &str) -> Result<Vec<BatchItem>> {
    let value: serde_json::Value =
        serde_json::from_str(text).context("batch items must be valid JSON")?;

    match value {
        serde_json::Value::Object(map) => map
            .into_iter()
            .map(|(key, value)| match value.as_i64() {
                Some(value) => Ok(BatchItem::new(key, value)),
                None => bail!("batch value for `{key}` must be an integer"),
            })
            .collect(),
        array @ serde_json::Value::Array(_) => {
            serde_json::from_value(array).context("batch items must be {key, value} objects")
        }
        _ => bail!("batch items must be a JSON object or array"),
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
