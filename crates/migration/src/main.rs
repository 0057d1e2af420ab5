use clap::{Parser, Subcommand};
use sea_orm::Database;
use sea_orm_migration::MigratorTrait;

use migration::Migrator;

/// Apply or roll back the marketplace schema.
#[derive(Debug, Parser)]
#[command(name = "migration", version)]
struct Cli {
    /// Database to migrate; shares its variable with the admin settings.
    #[arg(
        long,
        env = "NAKLIYE__DATABASE__URL",
        default_value = "sqlite:./nakliye.db?mode=rwc"
    )]
    database_url: String,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Clone, Copy, Subcommand)]
enum Command {
    /// Apply every pending migration (default).
    Up,
    /// Roll back the most recent migrations.
    Down {
        #[arg(long, default_value_t = 1)]
        steps: u32,
    },
    /// Drop all tables, then apply everything.
    Fresh,
    /// Roll back everything, then apply everything.
    Refresh,
    /// Print applied and pending migrations.
    Status,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter("sea_orm_migration=info")
        .init();

    let cli = Cli::parse();
    let db = Database::connect(&cli.database_url).await?;

    match cli.command.unwrap_or(Command::Up) {
        Command::Up => Migrator::up(&db, None).await?,
        Command::Down { steps } => Migrator::down(&db, Some(steps)).await?,
        Command::Fresh => Migrator::fresh(&db).await?,
        Command::Refresh => Migrator::refresh(&db).await?,
        Command::Status => Migrator::status(&db).await?,
    }

    Ok(())
}
