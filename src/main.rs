// Company Registry CLI
//
// Every command prints JSON on stdout. Set REGISTRY_DB_PATH to keep data
// between runs; without it each invocation starts from an empty store.

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use company_registry::{
    seed_from_files, CompanyFilters, CompanyRepository, CompanyService, CompanyStatus,
    CompanyType, CompanyUseCases, Database, InMemoryCompanyRepository,
    InMemoryTransferRepository, Pagination, RecordTransferCommand, RegisterCompanyCommand,
    RegistryConfig, RegistryError, SqliteCompanyRepository, SqliteTransferRepository,
    TransferRepository, TransferStatus,
};

#[derive(Parser)]
#[command(name = "company-registry")]
#[command(about = "Register companies and report on their recent activity")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Bulk load companies (and optionally transfers) from CSV
    Seed {
        #[arg(long)]
        companies: PathBuf,
        #[arg(long)]
        transfers: Option<PathBuf>,
    },
    /// Register one company
    Register {
        #[arg(long)]
        name: String,
        #[arg(long)]
        tax_id: String,
        /// SME or CORPORATE
        #[arg(long = "type")]
        company_type: String,
        #[arg(long)]
        email: Option<String>,
    },
    /// Show one company by ID
    Show { id: String },
    /// Filtered, paginated listing
    List {
        /// SME or CORPORATE
        #[arg(long = "type")]
        company_type: Option<String>,
        /// Substring of name or tax ID
        #[arg(long)]
        search: Option<String>,
        /// Substring of email
        #[arg(long)]
        email: Option<String>,
        #[arg(long, default_value_t = 1)]
        page: usize,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Companies registered in the last 30 days
    Recent,
    /// Companies with a completed transfer in the last 30 days
    Active,
    /// Count and total of completed transfers in the last 30 days
    Summary,
    /// Change a company's status (ACTIVE, INACTIVE, PENDING)
    SetStatus { id: String, status: String },
    /// Record a transfer for a company
    RecordTransfer {
        #[arg(long)]
        company_id: String,
        #[arg(long)]
        amount: Decimal,
        #[arg(long, default_value = "USD")]
        currency: String,
        /// RFC 3339; defaults to now
        #[arg(long)]
        date: Option<DateTime<Utc>>,
        #[arg(long, default_value = "COMPLETED")]
        status: String,
        #[arg(long)]
        description: Option<String>,
    },
    /// Transfers of one company
    Transfers { id: String },
    /// Audit trail of one company (SQLite store only)
    Events { id: String },
}

/// Wired-up service plus direct repository handles for seeding
struct Registry {
    service: CompanyService,
    companies: Arc<dyn CompanyRepository>,
    transfers: Arc<dyn TransferRepository>,
    audit: Option<Arc<SqliteCompanyRepository>>,
}

fn build_registry(config: &RegistryConfig) -> Result<Registry> {
    let companies: Arc<dyn CompanyRepository>;
    let transfers: Arc<dyn TransferRepository>;
    let mut audit = None;

    match &config.database_path {
        Some(path) => {
            tracing::info!(path = %path.display(), "using SQLite store");
            let db = Database::open(path, config.unique_email)?;
            let sqlite = Arc::new(SqliteCompanyRepository::new(db.clone()));
            companies = sqlite.clone();
            transfers = Arc::new(SqliteTransferRepository::new(db));
            audit = Some(sqlite);
        }
        None => {
            tracing::info!("using in-memory store");
            companies = Arc::new(InMemoryCompanyRepository::with_unique_email(config.unique_email));
            transfers = Arc::new(InMemoryTransferRepository::new());
        }
    }

    let service = CompanyService::new(companies.clone(), transfers.clone())
        .with_unique_email(config.unique_email);

    Ok(Registry {
        service,
        companies,
        transfers,
        audit,
    })
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn parse_type(raw: &str) -> Result<CompanyType> {
    CompanyType::parse(raw).ok_or_else(|| anyhow!("Type must be SME or CORPORATE, got '{raw}'"))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn,company_registry=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = RegistryConfig::from_env()?;
    let registry = build_registry(&config)?;

    match run(cli.command, &registry, &config).await {
        Ok(()) => Ok(()),
        Err(err) => {
            // Domain rejections are printed as data; anything else is fatal
            if let Some(domain) = err.downcast_ref::<RegistryError>().filter(|e| e.is_domain()) {
                print_json(&serde_json::json!({
                    "error": domain.to_string(),
                    "details": domain.field_errors(),
                }))?;
                std::process::exit(2);
            }
            Err(err)
        }
    }
}

async fn run(command: Commands, registry: &Registry, config: &RegistryConfig) -> Result<()> {
    let service = &registry.service;

    match command {
        Commands::Seed {
            companies,
            transfers,
        } => {
            let report = seed_from_files(
                registry.companies.as_ref(),
                registry.transfers.as_ref(),
                &companies,
                transfers.as_deref(),
                Utc::now(),
            )
            .await?;
            print_json(&report)
        }
        Commands::Register {
            name,
            tax_id,
            company_type,
            email,
        } => {
            let command = RegisterCompanyCommand {
                name: Some(name),
                tax_id: Some(tax_id),
                company_type: Some(company_type),
                email,
            };
            print_json(&service.register_company(command).await?)
        }
        Commands::Show { id } => print_json(&service.find_company_by_id(&id).await?),
        Commands::List {
            company_type,
            search,
            email,
            page,
            limit,
        } => {
            let filters = CompanyFilters {
                company_type: company_type.as_deref().map(parse_type).transpose()?,
                search,
                email,
            };
            let pagination = Pagination::new(page, limit.unwrap_or(config.default_page_size));
            print_json(&service.find_all_companies(&filters, pagination).await?)
        }
        Commands::Recent => print_json(&service.get_recently_registered_companies().await?),
        Commands::Active => print_json(&service.get_companies_with_recent_transfers().await?),
        Commands::Summary => print_json(&service.get_transfer_summary().await?),
        Commands::SetStatus { id, status } => {
            let status = CompanyStatus::parse(&status.to_uppercase())
                .ok_or_else(|| anyhow!("Unknown status '{status}'"))?;
            print_json(&service.update_company_status(&id, status).await?)
        }
        Commands::RecordTransfer {
            company_id,
            amount,
            currency,
            date,
            status,
            description,
        } => {
            let status = TransferStatus::parse(&status.to_uppercase())
                .ok_or_else(|| anyhow!("Unknown transfer status '{status}'"))?;
            let command = RecordTransferCommand {
                company_id,
                amount,
                currency,
                date,
                status,
                description,
            };
            print_json(&service.record_transfer(command).await?)
        }
        Commands::Transfers { id } => print_json(&service.get_company_transfers(&id).await?),
        Commands::Events { id } => match &registry.audit {
            Some(audit) => print_json(&audit.events_for(&id)?),
            None => Err(anyhow!("Audit trail needs a SQLite store; set REGISTRY_DB_PATH")),
        },
    }
}
