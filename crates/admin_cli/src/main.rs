use std::error::Error;

use clap::{Args, Parser, Subcommand};
use engine::{
    AdditionCmd, Engine, EngineError, Field, FilterSpec, FilterValue, PredicateSpec, QueryEntity,
    RemovalCmd, StockIdentifier, parse_date,
};
use migration::MigratorTrait;
use sea_orm::{Database, DatabaseConnection};
use serde::Serialize;

mod settings;

#[derive(Parser, Debug)]
#[command(name = "stock_admin")]
#[command(about = "Admin utilities for the batch inventory ledger")]
struct Cli {
    /// Database connection string (also read from `DATABASE_URL`).
    /// Overrides the `[database]` section of `settings.toml`.
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Manage the stock catalog.
    Stock(Stock),
    /// Receive a new batch.
    Add(AddArgs),
    /// Take stock out of a batch.
    Remove(RemoveArgs),
    /// Show one batch with its ledger entries.
    Batch(BatchArgs),
    /// Stock per catalog item, now or as of a date.
    Levels(LevelsArgs),
    /// Filtered search over batches, transactions or stock.
    Search(SearchArgs),
    /// Apply, revert or inspect schema migrations.
    Migrate(Migrate),
}

#[derive(Args, Debug)]
struct Migrate {
    #[command(subcommand)]
    action: MigrateAction,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum MigrateAction {
    /// Apply pending migrations, all of them unless `--steps` is given.
    Up {
        #[arg(long)]
        steps: Option<u32>,
    },
    /// Revert the most recent migrations.
    Down {
        #[arg(long, default_value_t = 1)]
        steps: u32,
    },
    /// Drop every table and apply all migrations again.
    Fresh,
    /// List each migration as applied or pending.
    Status,
}

#[derive(Args, Debug)]
struct Stock {
    #[command(subcommand)]
    command: StockCommand,
}

#[derive(Subcommand, Debug)]
enum StockCommand {
    Add { name: String },
    List,
}

#[derive(Args, Debug)]
struct AddArgs {
    #[arg(long)]
    stock: String,
    #[arg(long)]
    quantity: String,
    /// Delivery date, `YYYY-MM-DD`.
    #[arg(long)]
    delivered: String,
    /// Use-by date, `YYYY-MM-DD`.
    #[arg(long)]
    use_by: String,
}

#[derive(Args, Debug)]
struct RemoveArgs {
    #[arg(long)]
    batch: String,
    #[arg(long)]
    quantity: String,
    /// Removal date, `YYYY-MM-DD`.
    #[arg(long)]
    date: String,
    /// used, out_of_date, returned, lost or destroyed.
    #[arg(long)]
    reason: String,
}

#[derive(Args, Debug)]
struct BatchArgs {
    id: i32,
}

#[derive(Args, Debug)]
struct LevelsArgs {
    #[arg(long)]
    stock: Option<String>,
    /// Replay the ledger up to this date instead of reading current quantities.
    #[arg(long)]
    at: Option<String>,
}

#[derive(Args, Debug)]
struct SearchArgs {
    /// batches, transactions or stock.
    entity: String,
    /// Exact match, `field=value`. Repeatable.
    #[arg(long = "eq", value_name = "FIELD=VALUE")]
    equals: Vec<String>,
    /// Inclusive range, `field=low..high`. Repeatable.
    #[arg(long = "range", value_name = "FIELD=LOW..HIGH")]
    ranges: Vec<String>,
    /// Print the SQL and its parameters instead of running it.
    #[arg(long)]
    sql: bool,
}

fn parse_filter(args: &SearchArgs) -> Result<FilterSpec, String> {
    let mut filter = FilterSpec::new();
    for raw in &args.equals {
        let (field, value) = split_field(raw)?;
        filter = filter.set(field, PredicateSpec::Equals(FilterValue::from(value)));
    }
    for raw in &args.ranges {
        let (field, value) = split_field(raw)?;
        let (low, high) = value
            .split_once("..")
            .ok_or_else(|| format!("expected LOW..HIGH in '{raw}'"))?;
        filter = filter.set(
            field,
            PredicateSpec::Range(FilterValue::from(low), FilterValue::from(high)),
        );
    }
    Ok(filter)
}

fn split_field(raw: &str) -> Result<(Field, &str), String> {
    let (field, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected FIELD=VALUE in '{raw}'"))?;
    Ok((Field::try_from(field)?, value))
}

fn report(errors: &[EngineError]) -> ! {
    for err in errors {
        match err.field() {
            Some(field) => eprintln!("{field}: {err}"),
            None => eprintln!("{err}"),
        }
    }
    std::process::exit(2);
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn Error + Send + Sync>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn connect_db(
    database_url: &str,
    apply_migrations: bool,
) -> Result<DatabaseConnection, Box<dyn Error + Send + Sync>> {
    let db = Database::connect(database_url).await?;
    if apply_migrations {
        migration::Migrator::up(&db, None).await?;
    }
    Ok(db)
}

async fn migrate(
    db: &DatabaseConnection,
    action: MigrateAction,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    match action {
        MigrateAction::Up { steps } => migration::Migrator::up(db, steps).await?,
        MigrateAction::Down { steps } => migration::Migrator::down(db, Some(steps)).await?,
        MigrateAction::Fresh => migration::Migrator::fresh(db).await?,
        MigrateAction::Status => {
            for entry in migration::Migrator::get_migration_with_status(db).await? {
                println!("{:<8} {}", entry.status().to_string(), entry.name());
            }
            return Ok(());
        }
    }
    tracing::info!(?action, "migrations done");
    Ok(())
}

async fn run(
    cli: Cli,
    db: &DatabaseConnection,
    engine: Engine,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    match cli.command {
        Command::Stock(Stock {
            command: StockCommand::Add { name },
        }) => {
            let stock = engine.add_stock_name(&name).await?;
            println!("created stock item: {} ({})", stock.name, stock.id);
        }
        Command::Stock(Stock {
            command: StockCommand::List,
        }) => print_json(&engine.stock_names().await?)?,
        Command::Add(args) => {
            let cmd = AdditionCmd::parse(&args.stock, &args.quantity, &args.delivered, &args.use_by)
                .unwrap_or_else(|errors| report(&errors));
            let errors = cmd.validate(engine.today());
            if !errors.is_empty() {
                report(&errors);
            }
            let batch_id = engine.record_addition(cmd).await?;
            println!("created batch: {batch_id}");
        }
        Command::Remove(args) => {
            let cmd = RemovalCmd::parse(&args.batch, &args.quantity, &args.date, &args.reason)
                .unwrap_or_else(|errors| report(&errors));
            let errors = cmd.validate(engine.today());
            if !errors.is_empty() {
                report(&errors);
            }
            let batch_id = cmd.batch_id;
            engine.record_removal(cmd).await?;
            let batch = engine.batch(batch_id).await?;
            println!(
                "batch {batch_id}: {} of {} left",
                batch.quantity_current, batch.quantity_initial
            );
        }
        Command::Batch(args) => {
            #[derive(Serialize)]
            struct BatchView {
                batch: engine::Batch,
                transactions: Vec<engine::Transaction>,
            }
            let batch = engine.batch(args.id).await?;
            let transactions = engine.batch_transactions(args.id).await?;
            print_json(&BatchView {
                batch,
                transactions,
            })?;
        }
        Command::Levels(args) => {
            let stock = args.stock.as_deref().map(StockIdentifier::parse);
            let levels = match args.at {
                Some(raw) => {
                    let date = parse_date(Field::OccurredAt, &raw)?;
                    engine.stock_levels_at(date, stock.as_ref()).await?
                }
                None => engine.current_stock_levels(stock.as_ref()).await?,
            };
            print_json(&levels)?;
        }
        Command::Search(args) => {
            let entity = QueryEntity::try_from(args.entity.as_str())?;
            let filter = parse_filter(&args)?;
            if args.sql {
                let statement = engine.build_filter_query(entity, &filter).await?;
                println!("{}", statement.sql);
                for (idx, param) in statement.params.iter().enumerate() {
                    println!("  ?{} = {param:?}", idx + 1);
                }
            } else {
                print_json(&engine.search(entity, &filter).await?)?;
            }
        }
        Command::Migrate(Migrate { action }) => migrate(db, action).await?,
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let cli = Cli::parse();
    let settings = settings::Settings::new()?;

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(format!(
            "stock_admin={level},engine={level}",
            level = settings.app.level
        ))
        .init();

    let database_url = cli
        .database_url
        .clone()
        .unwrap_or_else(|| settings.database_url());
    tracing::debug!(%database_url, "connecting");
    // `migrate` manages the schema itself
    let apply_migrations = !matches!(cli.command, Command::Migrate(_));
    let db = connect_db(&database_url, apply_migrations).await?;

    let engine = Engine::builder().database(db.clone()).build().await?;
    run(cli, &db, engine).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn migrate_action(args: &[&str]) -> MigrateAction {
        let cli = Cli::try_parse_from(["stock_admin", "migrate"].into_iter().chain(args.iter().copied())).unwrap();
        match cli.command {
            Command::Migrate(Migrate { action }) => action,
            other => panic!("expected migrate, got {other:?}"),
        }
    }

    #[test]
    fn migrate_actions_parse_with_their_defaults() {
        assert_eq!(migrate_action(&["up"]), MigrateAction::Up { steps: None });
        assert_eq!(
            migrate_action(&["up", "--steps", "2"]),
            MigrateAction::Up { steps: Some(2) }
        );
        assert_eq!(migrate_action(&["down"]), MigrateAction::Down { steps: 1 });
        assert_eq!(migrate_action(&["fresh"]), MigrateAction::Fresh);
        assert_eq!(migrate_action(&["status"]), MigrateAction::Status);
        assert!(Cli::try_parse_from(["stock_admin", "migrate", "sideways"]).is_err());
    }

    #[tokio::test]
    async fn migrate_down_and_up_round_trip_the_schema() {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        migrate(&db, MigrateAction::Up { steps: None }).await.unwrap();
        let applied = migration::Migrator::get_applied_migrations(&db).await.unwrap();
        assert_eq!(applied.len(), 1);

        migrate(&db, MigrateAction::Down { steps: 1 }).await.unwrap();
        assert!(migration::Migrator::get_applied_migrations(&db).await.unwrap().is_empty());

        migrate(&db, MigrateAction::Fresh).await.unwrap();
        migrate(&db, MigrateAction::Status).await.unwrap();
        let pending = migration::Migrator::get_pending_migrations(&db).await.unwrap();
        assert!(pending.is_empty());
    }
}
