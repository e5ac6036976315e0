// Repository contracts - the service only ever sees these traits
//
// Two backends:
// - memory: arena of records + id / taxId / email indexes
// - sqlite (crate::db): durable, UNIQUE columns as the write-time guard
//
// Every method is async; callers must await before trusting the result.

pub mod memory;

use crate::entities::{Company, CompanyType, Transfer};
use crate::error::{RegistryError, RegistryResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub use memory::{InMemoryCompanyRepository, InMemoryTransferRepository};

pub const DEFAULT_PAGE_SIZE: usize = 10;

// ============================================================================
// QUERY TYPES
// ============================================================================

/// Filters for `find_all`, ANDed together. `None` means "don't filter".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyFilters {
    /// Exact match on the company type
    #[serde(rename = "type")]
    pub company_type: Option<CompanyType>,

    /// Case-insensitive substring of name OR tax ID
    pub search: Option<String>,

    /// Case-insensitive substring of email; companies without email never match
    pub email: Option<String>,
}

impl CompanyFilters {
    pub fn matches(&self, company: &Company) -> bool {
        if let Some(company_type) = self.company_type {
            if company.company_type != company_type {
                return false;
            }
        }

        if let Some(search) = &self.search {
            if !company.matches_search(search) {
                return false;
            }
        }

        if let Some(email) = &self.email {
            if !company.matches_email(email) {
                return false;
            }
        }

        true
    }
}

/// 1-based page over the filtered set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub page: usize,
    pub limit: usize,
}

impl Pagination {
    /// Page and limit below 1 are clamped to 1
    pub fn new(page: usize, limit: usize) -> Self {
        Pagination {
            page: page.max(1),
            limit: limit.max(1),
        }
    }

    pub fn offset(&self) -> usize {
        self.page.max(1).saturating_sub(1).saturating_mul(self.limit.max(1))
    }

    /// Cut this page out of an already filtered sequence
    pub fn slice<T: Clone>(&self, items: &[T]) -> Vec<T> {
        items
            .iter()
            .skip(self.offset())
            .take(self.limit.max(1))
            .cloned()
            .collect()
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Pagination::new(1, DEFAULT_PAGE_SIZE)
    }
}

/// One page of results; `total` counts the whole filtered set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub total: usize,
}

/// Exact sum of transfer amounts; overflow is a storage fault, not a panic
pub fn total_amount(transfers: &[Transfer]) -> RegistryResult<Decimal> {
    transfers
        .iter()
        .try_fold(Decimal::ZERO, |acc, t| acc.checked_add(t.amount))
        .ok_or_else(|| {
            RegistryError::Storage(anyhow::anyhow!(
                "transfer total overflows over {} transfers",
                transfers.len()
            ))
        })
}

// ============================================================================
// CONTRACTS
// ============================================================================

#[async_trait]
pub trait CompanyRepository: Send + Sync {
    /// Insert a new company. Fails with Conflict if its tax ID (or, when
    /// email uniqueness is on, its normalized email) is already taken.
    async fn save(&self, company: Company) -> RegistryResult<Company>;

    /// Replace a stored company's mutable fields (status, updated_at)
    async fn update(&self, company: Company) -> RegistryResult<Company>;

    async fn find_by_id(&self, id: &str) -> RegistryResult<Option<Company>>;

    /// Exact match
    async fn find_by_tax_id(&self, tax_id: &str) -> RegistryResult<Option<Company>>;

    /// Case-insensitive match
    async fn find_by_email(&self, email: &str) -> RegistryResult<Option<Company>>;

    /// Filtered scan in insertion order, windowed by `pagination`
    async fn find_all(
        &self,
        filters: &CompanyFilters,
        pagination: Pagination,
    ) -> RegistryResult<Page<Company>>;

    async fn find_registered_in_last_month(
        &self,
        as_of: DateTime<Utc>,
    ) -> RegistryResult<Vec<Company>>;

    async fn count(&self) -> RegistryResult<usize>;
}

#[async_trait]
pub trait TransferRepository: Send + Sync {
    async fn save(&self, transfer: Transfer) -> RegistryResult<Transfer>;

    /// COMPLETED transfers dated inside the trailing window
    async fn find_completed_in_last_month(
        &self,
        as_of: DateTime<Utc>,
    ) -> RegistryResult<Vec<Transfer>>;

    async fn find_by_company_id(&self, company_id: &str) -> RegistryResult<Vec<Transfer>>;

    async fn count_in_last_month(&self, as_of: DateTime<Utc>) -> RegistryResult<usize>;

    /// Exact decimal sum over the same predicate as `find_completed_in_last_month`
    async fn sum_amount_in_last_month(&self, as_of: DateTime<Utc>) -> RegistryResult<Decimal>;
}
