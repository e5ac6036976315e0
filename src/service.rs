// 🧭 Registration / Query Service
//
// Orchestrates registration (validate -> uniqueness pre-check -> persist)
// and the read use-cases. Depends only on the repository traits; the
// repository's own write-time guard stays authoritative for uniqueness.

use crate::entities::{Company, CompanyStatus, CompanyType, Transfer};
use crate::error::{RegistryError, RegistryResult, UniqueField};
use crate::repository::{CompanyFilters, CompanyRepository, Page, Pagination, TransferRepository};
use crate::temporal::{Clock, ReportWindow};
use crate::validation::{
    validate_registration, validate_transfer, FieldError, RecordTransferCommand,
    RegisterCompanyCommand,
};
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

// ============================================================================
// USE-CASE CONTRACT
// ============================================================================

/// Completed transfers inside the current reporting window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferSummary {
    pub window: ReportWindow,
    pub count: usize,
    pub total_amount: Decimal,
}

/// What an adapter (HTTP, CLI, queue...) is allowed to call
#[async_trait]
pub trait CompanyUseCases: Send + Sync {
    async fn register_company(&self, command: RegisterCompanyCommand) -> RegistryResult<Company>;

    async fn find_company_by_id(&self, id: &str) -> RegistryResult<Company>;

    async fn find_all_companies(
        &self,
        filters: &CompanyFilters,
        pagination: Pagination,
    ) -> RegistryResult<Page<Company>>;

    async fn get_companies_with_recent_transfers(&self) -> RegistryResult<Vec<Company>>;

    async fn get_recently_registered_companies(&self) -> RegistryResult<Vec<Company>>;

    async fn update_company_status(&self, id: &str, status: CompanyStatus)
        -> RegistryResult<Company>;

    async fn record_transfer(&self, command: RecordTransferCommand) -> RegistryResult<Transfer>;

    async fn get_company_transfers(&self, id: &str) -> RegistryResult<Vec<Transfer>>;

    async fn get_transfer_summary(&self) -> RegistryResult<TransferSummary>;
}

// ============================================================================
// SERVICE
// ============================================================================

pub struct CompanyService {
    companies: Arc<dyn CompanyRepository>,
    transfers: Arc<dyn TransferRepository>,
    clock: Clock,
    unique_email: bool,
}

impl CompanyService {
    pub fn new(
        companies: Arc<dyn CompanyRepository>,
        transfers: Arc<dyn TransferRepository>,
    ) -> Self {
        CompanyService {
            companies,
            transfers,
            clock: Clock::System,
            unique_email: true,
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Turn the email pre-check on or off. Keep it in line with the
    /// repository's own setting, or the storage guard will still fire.
    pub fn with_unique_email(mut self, unique_email: bool) -> Self {
        self.unique_email = unique_email;
        self
    }

    async fn ensure_unique(&self, tax_id: &str, email: Option<&str>) -> RegistryResult<()> {
        if self.companies.find_by_tax_id(tax_id).await?.is_some() {
            return Err(RegistryError::Conflict {
                field: UniqueField::TaxId,
            });
        }

        if self.unique_email {
            if let Some(email) = email {
                if self.companies.find_by_email(email).await?.is_some() {
                    return Err(RegistryError::Conflict {
                        field: UniqueField::Email,
                    });
                }
            }
        }

        Ok(())
    }
}

#[async_trait]
impl CompanyUseCases for CompanyService {
    async fn register_company(&self, command: RegisterCompanyCommand) -> RegistryResult<Company> {
        let errors = validate_registration(&command);
        if !errors.is_empty() {
            tracing::warn!(errors = errors.len(), "registration rejected: invalid input");
            return Err(RegistryError::Validation(errors));
        }

        // Validation guarantees these are present and well-formed
        let (Some(name), Some(tax_id), Some(company_type)) = (
            command.name.as_deref(),
            command.tax_id.as_deref(),
            command.company_type.as_deref().and_then(CompanyType::parse),
        ) else {
            return Err(RegistryError::Validation(vec![FieldError::new(
                "input",
                "Incomplete registration request",
            )]));
        };
        let email = command.normalized_email();

        if let Err(err) = self.ensure_unique(tax_id, email.as_deref()).await {
            tracing::warn!(tax_id, error = %err, "registration rejected");
            return Err(err);
        }

        let company = Company::new(
            name.trim().to_string(),
            tax_id.to_string(),
            company_type,
            email,
            self.clock.now(),
        );
        let stored = self.companies.save(company).await?;

        tracing::info!(id = %stored.id, tax_id = %stored.tax_id, "company registered");
        Ok(stored)
    }

    async fn find_company_by_id(&self, id: &str) -> RegistryResult<Company> {
        self.companies
            .find_by_id(id)
            .await?
            .ok_or_else(|| RegistryError::company_not_found(id))
    }

    async fn find_all_companies(
        &self,
        filters: &CompanyFilters,
        pagination: Pagination,
    ) -> RegistryResult<Page<Company>> {
        self.companies.find_all(filters, pagination).await
    }

    async fn get_companies_with_recent_transfers(&self) -> RegistryResult<Vec<Company>> {
        let recent = self
            .transfers
            .find_completed_in_last_month(self.clock.now())
            .await?;

        let company_ids: HashSet<&str> = recent.iter().map(|t| t.company_id.as_str()).collect();
        if company_ids.is_empty() {
            return Ok(Vec::new());
        }

        // One scan keeps store insertion order; dangling ids simply never match
        let everyone = Pagination::new(1, self.companies.count().await?);
        let companies: Vec<Company> = self
            .companies
            .find_all(&CompanyFilters::default(), everyone)
            .await?
            .data
            .into_iter()
            .filter(|c| company_ids.contains(c.id.as_str()))
            .collect();

        tracing::info!(
            transfers = recent.len(),
            companies = companies.len(),
            "companies with recent transfers"
        );
        Ok(companies)
    }

    async fn get_recently_registered_companies(&self) -> RegistryResult<Vec<Company>> {
        self.companies
            .find_registered_in_last_month(self.clock.now())
            .await
    }

    async fn update_company_status(
        &self,
        id: &str,
        status: CompanyStatus,
    ) -> RegistryResult<Company> {
        let mut company = self.find_company_by_id(id).await?;
        let previous = company.status;
        company.update_status(status, self.clock.now());

        let stored = self.companies.update(company).await?;
        tracing::info!(id, from = %previous, to = %status, "company status changed");
        Ok(stored)
    }

    async fn record_transfer(&self, command: RecordTransferCommand) -> RegistryResult<Transfer> {
        let errors = validate_transfer(&command);
        if !errors.is_empty() {
            return Err(RegistryError::Validation(errors));
        }

        let transfer = Transfer::new(
            command.company_id.trim().to_string(),
            command.amount,
            command.currency,
            command.date.unwrap_or_else(|| self.clock.now()),
            command.status,
            command.description,
        );
        let stored = self.transfers.save(transfer).await?;

        tracing::info!(id = %stored.id, company_id = %stored.company_id, "transfer recorded");
        Ok(stored)
    }

    async fn get_company_transfers(&self, id: &str) -> RegistryResult<Vec<Transfer>> {
        let company = self.find_company_by_id(id).await?;
        self.transfers.find_by_company_id(&company.id).await
    }

    async fn get_transfer_summary(&self) -> RegistryResult<TransferSummary> {
        let now = self.clock.now();
        Ok(TransferSummary {
            window: ReportWindow::last_month(now),
            count: self.transfers.count_in_last_month(now).await?,
            total_amount: self.transfers.sum_amount_in_last_month(now).await?,
        })
    }
}

// ============================================================================
// TESTS
// ============================================================================
