use std::error::Error;

use chrono::{Duration, Utc};
use clap::{Args, Parser, Subcommand};
use engine::{
    CancelActor, CreateShipmentCmd, Engine, Money, Priority, SubmitOfferCmd, pool,
};
use migration::{Migrator, MigratorTrait};
use serde::Serialize;
use uuid::Uuid;

mod settings;

#[derive(Parser, Debug)]
#[command(name = "nakliye_admin")]
#[command(about = "Operator utilities for the Nakliye marketplace engine")]
struct Cli {
    /// Settings file, without extension (also read from `NAKLIYE_SETTINGS`).
    #[arg(long, env = "NAKLIYE_SETTINGS", default_value = "settings")]
    settings: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Shipment(Shipment),
    Offer(Offer),
    Wallet(Wallet),
}

#[derive(Args, Debug)]
struct Shipment {
    #[command(subcommand)]
    command: ShipmentCommand,
}

#[derive(Subcommand, Debug)]
enum ShipmentCommand {
    Create(ShipmentCreateArgs),
    Show { id: Uuid },
    List {
        #[arg(long)]
        owner: String,
    },
    /// Cancel as the owner, or as an operator when `--owner` is omitted.
    Cancel {
        id: Uuid,
        #[arg(long)]
        owner: Option<String>,
    },
    Pickup {
        id: Uuid,
        #[arg(long)]
        carrier: String,
    },
    Deliver {
        id: Uuid,
        #[arg(long)]
        carrier: String,
    },
}

#[derive(Args, Debug)]
struct ShipmentCreateArgs {
    #[arg(long)]
    owner: String,
    #[arg(long)]
    origin: String,
    #[arg(long)]
    destination: String,
    #[arg(long)]
    weight_grams: i64,
    #[arg(long)]
    volume_cm3: Option<i64>,
    /// Declared price, e.g. `1500.00`.
    #[arg(long)]
    price: Money,
    #[arg(long, default_value = "normal")]
    priority: String,
}

#[derive(Args, Debug)]
struct Offer {
    #[command(subcommand)]
    command: OfferCommand,
}

#[derive(Subcommand, Debug)]
enum OfferCommand {
    Submit(OfferSubmitArgs),
    List {
        #[arg(long)]
        shipment: Uuid,
    },
    Accept {
        id: Uuid,
        #[arg(long)]
        sender: String,
    },
    Reject {
        id: Uuid,
        #[arg(long)]
        sender: String,
    },
    Cancel {
        id: Uuid,
        #[arg(long)]
        carrier: String,
    },
    /// Expire every pending offer past its deadline.
    Expire,
}

#[derive(Args, Debug)]
struct OfferSubmitArgs {
    #[arg(long)]
    shipment: Uuid,
    #[arg(long)]
    carrier: String,
    #[arg(long)]
    price: Money,
    /// Days until the estimated delivery.
    #[arg(long, default_value_t = 3)]
    eta_days: i64,
    /// Hours the offer stays open.
    #[arg(long)]
    valid_hours: Option<i64>,
    #[arg(long)]
    message: Option<String>,
}

#[derive(Args, Debug)]
struct Wallet {
    #[command(subcommand)]
    command: WalletCommand,
}

#[derive(Subcommand, Debug)]
enum WalletCommand {
    Show {
        user: String,
    },
    Deposit {
        user: String,
        amount: Money,
        #[arg(long, default_value = "manual")]
        method: String,
    },
    Withdraw {
        user: String,
        amount: Money,
        #[arg(long, default_value = "manual payout")]
        description: String,
    },
    Bonus {
        user: String,
        amount: Money,
        #[arg(long, default_value = "bonus")]
        description: String,
    },
    History {
        user: String,
        #[arg(long, default_value_t = 20)]
        limit: u64,
    },
    Verify {
        user: String,
    },
    Freeze {
        user: String,
    },
    Unfreeze {
        user: String,
    },
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn Error + Send + Sync>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn build_engine(
    settings: &settings::Settings,
) -> Result<Engine, Box<dyn Error + Send + Sync>> {
    let db = pool::connect(&settings.database.url, &settings.database.pool()).await?;
    Migrator::up(&db, None).await?;

    let rate = settings.commission_rate()?;
    let currency = settings.currency()?;
    let engine = Engine::builder()
        .database(db)
        .commission_rate(rate)
        .currency(currency)
        .build()
        .await?;
    tracing::info!(commission_rate = %rate, %currency, "engine ready");
    Ok(engine)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let cli = Cli::parse();
    let settings = settings::Settings::new(&cli.settings)?;

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "nakliye_admin={level},engine={level}",
            level = settings.app.level
        ))
        .init();

    let engine = build_engine(&settings).await?;

    match cli.command {
        Command::Shipment(Shipment { command }) => match command {
            ShipmentCommand::Create(args) => {
                let priority = Priority::try_from(args.priority.as_str())?;
                let mut cmd = CreateShipmentCmd::new(
                    args.owner,
                    args.origin,
                    args.destination,
                    args.weight_grams,
                    args.price.minor(),
                )
                .priority(priority);
                if let Some(volume) = args.volume_cm3 {
                    cmd = cmd.volume_cm3(volume);
                }
                let id = engine.create_shipment(cmd).await?;
                println!("created shipment: {id}");
            }
            ShipmentCommand::Show { id } => print_json(&engine.shipment(id).await?)?,
            ShipmentCommand::List { owner } => {
                print_json(&engine.shipments_for_owner(&owner).await?)?;
            }
            ShipmentCommand::Cancel { id, owner } => {
                let actor = owner.map_or(CancelActor::Admin, CancelActor::Owner);
                engine.cancel_shipment(id, actor).await?;
                println!("cancelled shipment: {id}");
            }
            ShipmentCommand::Pickup { id, carrier } => {
                print_json(&engine.confirm_pickup(id, &carrier).await?)?;
            }
            ShipmentCommand::Deliver { id, carrier } => {
                print_json(&engine.confirm_delivery(id, &carrier).await?)?;
            }
        },
        Command::Offer(Offer { command }) => match command {
            OfferCommand::Submit(args) => {
                let now = Utc::now();
                let mut cmd = SubmitOfferCmd::new(
                    args.shipment,
                    args.carrier,
                    args.price.minor(),
                    now + Duration::days(args.eta_days),
                );
                if let Some(hours) = args.valid_hours {
                    cmd = cmd.expires_at(now + Duration::hours(hours));
                }
                if let Some(message) = args.message {
                    cmd = cmd.message(message);
                }
                let id = engine.submit_offer(cmd).await?;
                println!("submitted offer: {id}");
            }
            OfferCommand::List { shipment } => print_json(&engine.list_offers(shipment).await?)?,
            OfferCommand::Accept { id, sender } => {
                print_json(&engine.accept_offer(id, &sender).await?)?;
            }
            OfferCommand::Reject { id, sender } => {
                engine.reject_offer(id, &sender).await?;
                println!("rejected offer: {id}");
            }
            OfferCommand::Cancel { id, carrier } => {
                engine.cancel_offer(id, &carrier).await?;
                println!("cancelled offer: {id}");
            }
            OfferCommand::Expire => {
                let expired = engine.expire_offers(Utc::now()).await?;
                println!("expired offers: {expired}");
            }
        },
        Command::Wallet(Wallet { command }) => match command {
            WalletCommand::Show { user } => print_json(&engine.wallet(&user).await?)?,
            WalletCommand::Deposit {
                user,
                amount,
                method,
            } => print_json(&engine.deposit(&user, amount.minor(), &method).await?)?,
            WalletCommand::Withdraw {
                user,
                amount,
                description,
            } => print_json(&engine.withdraw(&user, amount.minor(), &description).await?)?,
            WalletCommand::Bonus {
                user,
                amount,
                description,
            } => print_json(&engine.bonus(&user, amount.minor(), &description).await?)?,
            WalletCommand::History { user, limit } => {
                print_json(&engine.transaction_history(&user, limit).await?)?;
            }
            WalletCommand::Verify { user } => {
                let report = engine.verify_ledger(&user).await?;
                print_json(&report)?;
                if !report.is_consistent() {
                    std::process::exit(1);
                }
            }
            WalletCommand::Freeze { user } => {
                engine.set_wallet_active(&user, false).await?;
                println!("frozen wallet of {user}");
            }
            WalletCommand::Unfreeze { user } => {
                engine.set_wallet_active(&user, true).await?;
                println!("unfrozen wallet of {user}");
            }
        },
    }

    Ok(())
}
