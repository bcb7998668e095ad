use clap::{Args as ClapArgs, Parser, Subcommand, ValueHint};
use std::path::PathBuf;
use tally_core::{CounterType, Isolation};

#[derive(Parser)]
#[command(
    name = "tally",
    version,
    about = "Named statistics counters stored in SQLite",
    arg_required_else_help = true
)]
pub struct Args {
    /// Provide custom config file
    #[arg(short, long, global = true, value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    /// Database file, overrides `database.path` from the config
    #[arg(long, global = true, value_hint = ValueHint::FilePath)]
    pub db: Option<PathBuf>,

    /// Restrict the command to one isolation instance, as NAME:ID
    #[arg(long, global = true, value_parser = parse_isolation)]
    pub isolate: Option<Isolation>,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Add a positive value to a counter, creating it when absent
    Increase {
        title: String,
        key: String,
        value: i64,
    },

    /// Subtract a value from an existing counter
    Decrease {
        title: String,
        key: String,
        value: i64,
    },

    /// Set a counter to a positive value, creating it when absent
    Replace {
        title: String,
        key: String,
        value: i64,
    },

    /// Add one to a counter
    Increment { title: String, key: String },

    /// Subtract one from a counter
    Decrement { title: String, key: String },

    /// Print the newest counter matching the filters
    Find {
        #[command(flatten)]
        filter: FilterArgs,
    },

    /// Print every counter matching the filters
    Get {
        #[command(flatten)]
        filter: FilterArgs,
    },

    /// Print one page of counters matching the filters
    Paginate {
        #[command(flatten)]
        filter: FilterArgs,

        /// 1-based page number
        #[arg(long, default_value_t = 1)]
        page: u32,

        /// Rows per page, defaults to `pagination.per_page`
        #[arg(long)]
        per_page: Option<u32>,
    },

    /// Delete every counter matching the filters
    #[command(arg_required_else_help = true)]
    Remove {
        #[command(flatten)]
        filter: FilterArgs,
    },

    /// Delete one counter by id
    #[clap(name = "remove-id")]
    RemoveId { id: i64 },

    /// Apply one action to many keys under a title
    ///
    /// Items are a JSON object (`{"k1":5,"k2":3}`) or an array of
    /// `{"key":..,"value":..}` objects.
    #[command(arg_required_else_help = true)]
    Batch {
        /// increase, decrease or replace
        action: String,
        title: String,
        items: String,
    },
}

#[derive(ClapArgs)]
pub struct FilterArgs {
    #[arg(short, long)]
    pub title: Option<String>,

    #[arg(short, long)]
    pub key: Option<String>,

    /// Match any of these keys
    #[arg(long, num_args = 1.., value_delimiter = ',')]
    pub keys: Option<Vec<String>>,

    /// Match any of these titles
    #[arg(long, num_args = 1.., value_delimiter = ',')]
    pub titles: Option<Vec<String>>,

    /// Match keys containing this literal text
    #[arg(long)]
    pub contains: Option<String>,

    /// Countable or Summable
    #[arg(long = "type", value_parser = parse_counter_type)]
    pub kind: Option<CounterType>,

    /// Join another table on TABLE:PK = counters.key
    #[arg(long)]
    pub join: Option<String>,

    /// Columns of the joined table to include in results
    #[arg(long, num_args = 1.., value_delimiter = ',', requires = "join")]
    pub columns: Vec<String>,
}

fn parse_isolation(value: &str) -> Result<Isolation, String> {
    let (name, id) = value
        .rsplit_once(':')
        .ok_or_else(|| format!("expected NAME:ID, got `{value}`"))?;
    if name.is_empty() {
        return Err("isolation name cannot be empty".to_string());
    }
    let id = id
        .parse::<i64>()
        .map_err(|err| format!("invalid isolation id `{id}`: {err}"))?;
    Ok(Isolation::new(name, id))
}

fn parse_counter_type(value: &str) -> Result<CounterType, String> {
    CounterType::parse(value).ok_or_else(|| format!("unknown counter type `{value}`"))
}

#[cfg(test)]
mod tests {
    use super::{parse_isolation, Args};
    use clap::{CommandFactory, Parser};
    use tally_core::Isolation;

    #[test]
    fn command_definition_is_valid() {
        Args::command().debug_assert();
    }

    #[test]
    fn isolation_splits_on_last_colon() {
        assert_eq!(
            parse_isolation("org:team:42").unwrap(),
            Isolation::new("org:team", 42)
        );
        assert!(parse_isolation("tenant").is_err());
        assert!(parse_isolation(":1").is_err());
        assert!(parse_isolation("tenant:x").is_err());
    }

    #[test]
    fn isolate_is_accepted_after_subcommand() {
        let args =
            Args::try_parse_from(["tally", "increase", "signups", "daily", "1", "--isolate", "tenant:7"])
                .unwrap();
        assert_eq!(args.isolate, Some(Isolation::new("tenant", 7)));
    }
}
