use std::{error::Error, path::PathBuf};

use chrono::{NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use engine::{
    ConfirmInvestmentCmd, DepartmentInvestmentCmd, Engine, ImportStatementCmd, Money,
    RecordTransactionCmd, SplitAllocationCmd, discrepancy_report_csv, read_statement_rows,
    statement_template,
};
use migration::MigratorTrait;
use sea_orm::{Database, DatabaseConnection};
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "treasury_admin")]
#[command(about = "Admin utilities for the treasury ledger (record/import/allocate/confirm)")]
struct Cli {
    /// Database connection string (also read from `DATABASE_URL`).
    #[arg(
        long,
        env = "DATABASE_URL",
        default_value = "sqlite:./treasury.db?mode=rwc"
    )]
    database_url: String,

    /// Operator recorded in audit columns.
    #[arg(long, default_value = "admin")]
    user: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the Main account and the default Treasury department.
    Init,
    Department(Department),
    Transaction(Transaction),
    Statement(Statement),
    Allocation(Allocation),
    Investment(Investment),
    Tax(Tax),
}

#[derive(Args, Debug)]
struct Department {
    #[command(subcommand)]
    command: DepartmentCommand,
}

#[derive(Subcommand, Debug)]
enum DepartmentCommand {
    Create {
        #[arg(long)]
        name: String,
    },
    List,
}

#[derive(Args, Debug)]
struct Transaction {
    #[command(subcommand)]
    command: TransactionCommand,
}

#[derive(Subcommand, Debug)]
enum TransactionCommand {
    /// Record a single money movement against the Main account.
    Add(TransactionAddArgs),
    /// Show recent transactions.
    List {
        #[arg(long, default_value_t = 20)]
        limit: u64,
    },
}

#[derive(Args, Debug)]
struct TransactionAddArgs {
    #[arg(long)]
    date: String,
    #[arg(long)]
    value_date: Option<String>,
    #[arg(long)]
    narration: String,
    #[arg(long)]
    account: String,
    #[arg(long)]
    debit: Option<String>,
    #[arg(long)]
    credit: Option<String>,
    #[arg(long, default_value_t = 0.0)]
    tax_percentage: f64,
    /// Tag the movement as an investment (creates a pending investment).
    #[arg(long)]
    investment: bool,
}

#[derive(Args, Debug)]
struct Statement {
    #[command(subcommand)]
    command: StatementCommand,
}

#[derive(Subcommand, Debug)]
enum StatementCommand {
    /// Print the CSV import template.
    Template,
    /// Import a CSV of transactions as one statement.
    Import {
        #[arg(long)]
        file: PathBuf,
        #[arg(long)]
        account: String,
    },
    /// Export transactions in a date range as CSV.
    Export {
        #[arg(long)]
        start: String,
        #[arg(long)]
        end: String,
    },
    List,
}

#[derive(Args, Debug)]
struct Allocation {
    #[command(subcommand)]
    command: AllocationCommand,
}

#[derive(Subcommand, Debug)]
enum AllocationCommand {
    /// List pending allocations (ordinary or investment-backed).
    List {
        #[arg(long)]
        investments: bool,
    },
    /// Split a pending allocation across departments.
    Split {
        #[arg(long)]
        id: Uuid,
        /// Department share as `<department-uuid>=<amount>`; repeatable.
        #[arg(long = "share", required = true)]
        shares: Vec<String>,
    },
}

#[derive(Args, Debug)]
struct Investment {
    #[command(subcommand)]
    command: InvestmentCommand,
}

#[derive(Subcommand, Debug)]
enum InvestmentCommand {
    /// Confirm a pending, department-allocated investment.
    Confirm {
        #[arg(long = "ref")]
        ref_number: String,
        #[arg(long)]
        account: String,
        #[arg(long)]
        period: u64,
        #[arg(long)]
        rate: f64,
    },
    /// Self-service department investment in one step.
    Invest {
        #[arg(long)]
        department: Uuid,
        #[arg(long)]
        account: String,
        #[arg(long)]
        amount: String,
        #[arg(long)]
        period: u64,
        #[arg(long)]
        value_date: String,
        #[arg(long)]
        rate: f64,
        #[arg(long, default_value_t = 0.0)]
        tax_percentage: f64,
    },
    /// List investments by lifecycle stage.
    List {
        #[arg(long, value_parser = ["unallocated", "allocated", "active"])]
        stage: String,
    },
}

#[derive(Args, Debug)]
struct Tax {
    #[command(subcommand)]
    command: TaxCommand,
}

#[derive(Subcommand, Debug)]
enum TaxCommand {
    /// Add a tariff rule matched against transaction narrations.
    Add {
        #[arg(long)]
        description: String,
        #[arg(long)]
        rate: f64,
    },
    List,
    /// Verify recorded tax for a statement (latest when omitted).
    Verify {
        #[arg(long)]
        statement: Option<Uuid>,
        /// Restrict the check to one account name.
        #[arg(long)]
        account: Option<String>,
        /// Emit the full verification as JSON instead of a CSV report.
        #[arg(long)]
        json: bool,
    },
}

fn parse_date(raw: &str) -> Result<NaiveDate, Box<dyn Error + Send + Sync>> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| format!("invalid date (expected YYYY-MM-DD): {raw}").into())
}

fn parse_amount(raw: &str) -> Result<Money, Box<dyn Error + Send + Sync>> {
    raw.parse::<Money>().map_err(|err| err.to_string().into())
}

fn parse_share(raw: &str) -> Result<(Uuid, Money), Box<dyn Error + Send + Sync>> {
    let (department, amount) = raw
        .split_once('=')
        .ok_or_else(|| format!("invalid share (expected <uuid>=<amount>): {raw}"))?;
    Ok((Uuid::parse_str(department.trim())?, parse_amount(amount)?))
}

async fn connect_db(
    database_url: &str,
) -> Result<DatabaseConnection, Box<dyn Error + Send + Sync>> {
    let db = Database::connect(database_url).await?;
    migration::Migrator::up(&db, None).await?;
    Ok(db)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "treasury_admin=info".to_string()),
        )
        .init();

    let cli = Cli::parse();

    let db = connect_db(&cli.database_url).await?;
    let engine = Engine::builder().database(db).build();
    let user = cli.user.clone();

    match cli.command {
        Command::Init => {
            engine.bootstrap().await?;
            let main = engine.main_account().await?;
            tracing::info!(balance = %main.balance, "ledger initialized");
            println!("initialized: {} ({})", main.name, main.balance);
        }
        Command::Department(Department { command }) => match command {
            DepartmentCommand::Create { name } => {
                let id = engine.new_department(&name, &user).await?;
                println!("created department: {name} ({id})");
            }
            DepartmentCommand::List => {
                for department in engine.departments().await? {
                    println!(
                        "{}  {}  {}",
                        department.id, department.name, department.balance
                    );
                }
            }
        },
        Command::Transaction(Transaction { command }) => match command {
            TransactionCommand::Add(args) => {
                let mut cmd = RecordTransactionCmd::new(
                    &args.account,
                    &args.narration,
                    parse_date(&args.date)?,
                    &user,
                )
                .tax_percentage(args.tax_percentage);
                if let Some(raw) = args.value_date.as_deref() {
                    cmd = cmd.value_date(parse_date(raw)?);
                }
                if let Some(raw) = args.debit.as_deref() {
                    cmd = cmd.debit(parse_amount(raw)?);
                }
                if let Some(raw) = args.credit.as_deref() {
                    cmd = cmd.credit(parse_amount(raw)?);
                }
                if args.investment {
                    cmd = cmd.investment();
                }

                let balance = engine.record_transaction(cmd).await?;
                tracing::info!(%balance, "transaction recorded");
                println!("recorded; Main Account balance: {balance}");
            }
            TransactionCommand::List { limit } => {
                for tx in engine.recent_transactions(limit).await? {
                    println!(
                        "{}  {}  {}  debit {}  credit {}  tax {}",
                        tx.ref_number,
                        tx.transaction_date,
                        tx.narration,
                        tx.debit_amount,
                        tx.credit_amount,
                        tx.tax_amount
                    );
                }
            }
        },
        Command::Statement(Statement { command }) => match command {
            StatementCommand::Template => print!("{}", statement_template()),
            StatementCommand::Import { file, account } => {
                let content = std::fs::File::open(&file)?;
                let rows = read_statement_rows(content)?;
                let filename = file
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_else(|| file.display().to_string());

                let outcome = engine
                    .import_statement(ImportStatementCmd::new(filename, account, rows, &user))
                    .await?;
                tracing::info!(
                    statement = %outcome.statement_id,
                    rows = outcome.imported,
                    "statement imported"
                );
                println!(
                    "imported {} transactions as statement {}; Main Account balance: {}",
                    outcome.imported, outcome.statement_id, outcome.main_balance
                );
            }
            StatementCommand::Export { start, end } => {
                let csv = engine
                    .export_statement_csv(parse_date(&start)?, parse_date(&end)?)
                    .await?;
                print!("{csv}");
            }
            StatementCommand::List => {
                for statement in engine.statements().await? {
                    println!(
                        "{}  {}  {}",
                        statement.id, statement.filename, statement.upload_date
                    );
                }
            }
        },
        Command::Allocation(Allocation { command }) => match command {
            AllocationCommand::List { investments } => {
                let pending = if investments {
                    engine.pending_investment_allocations().await?
                } else {
                    engine.pending_allocations().await?
                };
                for entry in pending {
                    println!(
                        "{}  ref {}  {}  {:?}  {}",
                        entry.allocation.id,
                        entry.allocation.treasury_ref,
                        entry.allocation.amount,
                        entry.allocation.kind,
                        entry.transaction.narration
                    );
                }
            }
            AllocationCommand::Split { id, shares } => {
                let mut cmd = SplitAllocationCmd::new(id, &user);
                for raw in &shares {
                    let (department, amount) = parse_share(raw)?;
                    cmd = cmd.share(department, amount);
                }
                engine.split_allocation(cmd).await?;
                tracing::info!(allocation = %id, "allocation split");
                println!("allocation {id} split");
            }
        },
        Command::Investment(Investment { command }) => match command {
            InvestmentCommand::Confirm {
                ref_number,
                account,
                period,
                rate,
            } => {
                let (investment, note) = engine
                    .confirm_investment(ConfirmInvestmentCmd::new(
                        &ref_number,
                        &account,
                        period,
                        rate,
                        &user,
                    ))
                    .await?;
                tracing::info!(ref_number = %investment.ref_number, "investment confirmed");
                println!("{note}");
            }
            InvestmentCommand::Invest {
                department,
                account,
                amount,
                period,
                value_date,
                rate,
                tax_percentage,
            } => {
                let cmd = DepartmentInvestmentCmd::new(
                    department,
                    &account,
                    parse_amount(&amount)?,
                    period,
                    parse_date(&value_date)?,
                    &user,
                )
                .interest_rate(rate)
                .tax_percentage(tax_percentage);

                let (investment, note) = engine.department_investment(cmd).await?;
                tracing::info!(ref_number = %investment.ref_number, "department investment recorded");
                println!("{note}");
            }
            InvestmentCommand::List { stage } => match stage.as_str() {
                "unallocated" => {
                    for investment in engine.pending_unallocated_investments().await? {
                        println!("{}  {}", investment.ref_number, investment.amount);
                    }
                }
                "allocated" => {
                    for investment in engine.pending_allocated_investments().await? {
                        println!("{}  {}", investment.ref_number, investment.amount);
                    }
                }
                _ => {
                    let today = Utc::now().date_naive();
                    for active in engine.active_investments(today).await? {
                        println!(
                            "{}  {}  {}  matures {}  yield {:.2}%",
                            active.investment.ref_number,
                            active.department_name,
                            active.investment.amount,
                            active
                                .investment
                                .maturity_date
                                .map(|d| d.to_string())
                                .unwrap_or_default(),
                            active.after_tax_yield_pct
                        );
                    }
                }
            },
        },
        Command::Tax(Tax { command }) => match command {
            TaxCommand::Add { description, rate } => {
                let id = engine.new_tax_rate(&description, rate, &user).await?;
                println!("added tax rate {description} ({rate}%) as #{id}");
            }
            TaxCommand::List => {
                for rate in engine.tax_rates().await? {
                    println!("#{}  {}  {}%", rate.id, rate.description, rate.rate_percent);
                }
            }
            TaxCommand::Verify {
                statement,
                account,
                json,
            } => {
                let verification = match account {
                    Some(account) => {
                        let id = match statement {
                            Some(id) => id,
                            None => engine
                                .latest_statement()
                                .await?
                                .ok_or("no statements uploaded")?
                                .id,
                        };
                        engine.reconcile_account(id, &account).await?
                    }
                    None => engine.verify_taxes(statement).await?,
                };

                if json {
                    println!("{}", serde_json::to_string_pretty(&verification)?);
                } else if verification.discrepancies.is_empty() {
                    println!(
                        "no discrepancies in {} ({} rows checked)",
                        verification.statement.filename, verification.checked
                    );
                } else {
                    tracing::warn!(
                        count = verification.discrepancies.len(),
                        statement = %verification.statement.id,
                        "tax discrepancies found"
                    );
                    print!(
                        "{}",
                        discrepancy_report_csv(&verification.discrepancies)?
                    );
                }
            }
        },
    }

    Ok(())
}
