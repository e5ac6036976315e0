// Company Registry - Core Library
// Exposes all modules for use in the CLI and in tests

pub mod config;
pub mod db;          // SQLite backend + audit trail
pub mod entities;    // Company / Transfer
pub mod error;
pub mod repository;  // Contracts + in-memory backend
pub mod seed;        // CSV bulk import
pub mod service;     // Registration / query use-cases
pub mod temporal;    // Reporting window + clock
pub mod validation;  // Shape rules

// Re-export commonly used types
pub use config::{ConfigError, RegistryConfig};
pub use db::{Database, Event, SqliteCompanyRepository, SqliteTransferRepository};
pub use entities::{Company, CompanyStatus, CompanyType, Transfer, TransferStatus};
pub use error::{RegistryError, RegistryResult, UniqueField};
pub use repository::{
    CompanyFilters, CompanyRepository, InMemoryCompanyRepository, InMemoryTransferRepository,
    Page, Pagination, TransferRepository, DEFAULT_PAGE_SIZE,
};
pub use seed::{load_companies_csv, load_transfers_csv, seed_from_files, seed_store, SeedReport};
pub use service::{CompanyService, CompanyUseCases, TransferSummary};
pub use temporal::{Clock, ReportWindow, REPORTING_WINDOW_DAYS};
pub use validation::{
    validate_registration, validate_transfer, FieldError, RecordTransferCommand,
    RegisterCompanyCommand,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
