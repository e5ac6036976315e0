// 🗂️ In-memory repositories
//
// Append-only arena of records behind an RwLock. Secondary indexes map
// id / tax ID / normalized email to the arena slot, so uniqueness probes
// are O(1) and scans keep insertion order for free.
//
// Stores always start empty; seed data comes from the caller.

use super::{
    total_amount, CompanyFilters, CompanyRepository, Page, Pagination, TransferRepository,
};
use crate::entities::{normalize_email, Company, Transfer};
use crate::error::{RegistryError, RegistryResult, UniqueField};
use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

fn poisoned() -> RegistryError {
    RegistryError::Storage(anyhow!("in-memory store lock poisoned"))
}

// ============================================================================
// COMPANY STORE
// ============================================================================

#[derive(Debug, Default)]
struct CompanyArena {
    records: Vec<Company>,
    by_id: HashMap<String, usize>,
    by_tax_id: HashMap<String, usize>,
    by_email: HashMap<String, usize>,
}

impl CompanyArena {
    fn get(&self, slot: Option<&usize>) -> Option<Company> {
        slot.and_then(|&i| self.records.get(i)).cloned()
    }
}

pub struct InMemoryCompanyRepository {
    arena: RwLock<CompanyArena>,
    unique_email: bool,
}

impl InMemoryCompanyRepository {
    /// Empty store with email uniqueness enforced
    pub fn new() -> Self {
        Self::with_unique_email(true)
    }

    pub fn with_unique_email(unique_email: bool) -> Self {
        InMemoryCompanyRepository {
            arena: RwLock::new(CompanyArena::default()),
            unique_email,
        }
    }

    fn read(&self) -> RegistryResult<RwLockReadGuard<'_, CompanyArena>> {
        self.arena.read().map_err(|_| poisoned())
    }

    fn write(&self) -> RegistryResult<RwLockWriteGuard<'_, CompanyArena>> {
        self.arena.write().map_err(|_| poisoned())
    }
}

impl Default for InMemoryCompanyRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CompanyRepository for InMemoryCompanyRepository {
    async fn save(&self, company: Company) -> RegistryResult<Company> {
        let mut arena = self.write()?;

        // Check every key before touching any index
        if arena.by_tax_id.contains_key(&company.tax_id) {
            return Err(RegistryError::Conflict {
                field: UniqueField::TaxId,
            });
        }
        let email_key = company.email_key();
        if self.unique_email {
            if let Some(key) = &email_key {
                if arena.by_email.contains_key(key) {
                    return Err(RegistryError::Conflict {
                        field: UniqueField::Email,
                    });
                }
            }
        }
        if arena.by_id.contains_key(&company.id) {
            return Err(RegistryError::Storage(anyhow!(
                "company id {} already stored",
                company.id
            )));
        }

        let slot = arena.records.len();
        arena.by_id.insert(company.id.clone(), slot);
        arena.by_tax_id.insert(company.tax_id.clone(), slot);
        if let Some(key) = email_key {
            arena.by_email.entry(key).or_insert(slot);
        }
        arena.records.push(company.clone());

        tracing::debug!(id = %company.id, tax_id = %company.tax_id, "company stored");
        Ok(company)
    }

    async fn update(&self, company: Company) -> RegistryResult<Company> {
        let mut arena = self.write()?;
        let slot = *arena
            .by_id
            .get(&company.id)
            .ok_or_else(|| RegistryError::company_not_found(&company.id))?;

        let stored = &mut arena.records[slot];
        stored.status = company.status;
        stored.updated_at = company.updated_at;
        Ok(stored.clone())
    }

    async fn find_by_id(&self, id: &str) -> RegistryResult<Option<Company>> {
        let arena = self.read()?;
        Ok(arena.get(arena.by_id.get(id)))
    }

    async fn find_by_tax_id(&self, tax_id: &str) -> RegistryResult<Option<Company>> {
        let arena = self.read()?;
        Ok(arena.get(arena.by_tax_id.get(tax_id)))
    }

    async fn find_by_email(&self, email: &str) -> RegistryResult<Option<Company>> {
        let arena = self.read()?;
        Ok(arena.get(arena.by_email.get(&normalize_email(email))))
    }

    async fn find_all(
        &self,
        filters: &CompanyFilters,
        pagination: Pagination,
    ) -> RegistryResult<Page<Company>> {
        let arena = self.read()?;
        let filtered: Vec<&Company> = arena
            .records
            .iter()
            .filter(|c| filters.matches(c))
            .collect();

        Ok(Page {
            total: filtered.len(),
            data: pagination.slice(&filtered).into_iter().cloned().collect(),
        })
    }

    async fn find_registered_in_last_month(
        &self,
        as_of: DateTime<Utc>,
    ) -> RegistryResult<Vec<Company>> {
        let arena = self.read()?;
        Ok(arena
            .records
            .iter()
            .filter(|c| c.is_registered_in_last_month(as_of))
            .cloned()
            .collect())
    }

    async fn count(&self) -> RegistryResult<usize> {
        Ok(self.read()?.records.len())
    }
}

// ============================================================================
// TRANSFER STORE
// ============================================================================

pub struct InMemoryTransferRepository {
    transfers: RwLock<Vec<Transfer>>,
}

impl InMemoryTransferRepository {
    pub fn new() -> Self {
        InMemoryTransferRepository {
            transfers: RwLock::new(Vec::new()),
        }
    }

    fn completed_in_last_month(&self, as_of: DateTime<Utc>) -> RegistryResult<Vec<Transfer>> {
        let transfers = self.transfers.read().map_err(|_| poisoned())?;
        Ok(transfers
            .iter()
            .filter(|t| t.is_completed_in_last_month(as_of))
            .cloned()
            .collect())
    }
}

impl Default for InMemoryTransferRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TransferRepository for InMemoryTransferRepository {
    async fn save(&self, transfer: Transfer) -> RegistryResult<Transfer> {
        let mut transfers = self.transfers.write().map_err(|_| poisoned())?;
        if transfers.iter().any(|t| t.id == transfer.id) {
            return Err(RegistryError::Storage(anyhow!(
                "transfer id {} already stored",
                transfer.id
            )));
        }
        transfers.push(transfer.clone());
        Ok(transfer)
    }

    async fn find_completed_in_last_month(
        &self,
        as_of: DateTime<Utc>,
    ) -> RegistryResult<Vec<Transfer>> {
        self.completed_in_last_month(as_of)
    }

    async fn find_by_company_id(&self, company_id: &str) -> RegistryResult<Vec<Transfer>> {
        let transfers = self.transfers.read().map_err(|_| poisoned())?;
        Ok(transfers
            .iter()
            .filter(|t| t.company_id == company_id)
            .cloned()
            .collect())
    }

    async fn count_in_last_month(&self, as_of: DateTime<Utc>) -> RegistryResult<usize> {
        Ok(self.completed_in_last_month(as_of)?.len())
    }

    async fn sum_amount_in_last_month(&self, as_of: DateTime<Utc>) -> RegistryResult<Decimal> {
        total_amount(&self.completed_in_last_month(as_of)?)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{CompanyType, TransferStatus};
    use chrono::Duration;

    fn company(name: &str, tax_id: &str, company_type: CompanyType, email: Option<&str>) -> Company {
        Company::new(
            name.to_string(),
            tax_id.to_string(),
            company_type,
            email.map(str::to_string),
            Utc::now(),
        )
    }

    async fn seeded() -> InMemoryCompanyRepository {
        let repo = InMemoryCompanyRepository::new();
        repo.save(company("Tech Solutions Inc", "30-12345678-9", CompanyType::Sme, Some("info@techsolutions.com")))
            .await
            .unwrap();
        repo.save(company("Global Corp", "30-98765432-1", CompanyType::Corporate, Some("contact@globalcorp.com")))
            .await
            .unwrap();
        repo.save(company("Old Company Ltd", "30-55555555-5", CompanyType::Sme, None))
            .await
            .unwrap();
        repo
    }

    #[tokio::test]
    async fn test_starts_empty() {
        let repo = InMemoryCompanyRepository::new();
        assert_eq!(repo.count().await.unwrap(), 0);
        assert!(InMemoryTransferRepository::new()
            .find_by_company_id("1")
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_lookups() {
        let repo = seeded().await;

        let found = repo.find_by_tax_id("30-98765432-1").await.unwrap().unwrap();
        assert_eq!(found.name, "Global Corp");
        assert_eq!(repo.find_by_id(&found.id).await.unwrap(), Some(found));

        let by_email = repo.find_by_email("INFO@TechSolutions.com").await.unwrap().unwrap();
        assert_eq!(by_email.name, "Tech Solutions Inc");

        assert!(repo.find_by_id("missing").await.unwrap().is_none());
        assert!(repo.find_by_tax_id("99-99999999-9").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_write_time_tax_id_guard() {
        let repo = seeded().await;
        let err = repo
            .save(company("Clone", "30-12345678-9", CompanyType::Sme, None))
            .await
            .unwrap_err();

        assert!(matches!(err, RegistryError::Conflict { field: UniqueField::TaxId }));
        assert_eq!(repo.count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_write_time_email_guard() {
        let repo = seeded().await;
        let err = repo
            .save(company("Clone", "11-11111111-1", CompanyType::Sme, Some("Contact@GlobalCorp.com")))
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::Conflict { field: UniqueField::Email }));

        // Same email passes when uniqueness is switched off
        let relaxed = InMemoryCompanyRepository::with_unique_email(false);
        relaxed
            .save(company("First", "11-11111111-1", CompanyType::Sme, Some("a@b.com")))
            .await
            .unwrap();
        relaxed
            .save(company("Second", "22-22222222-2", CompanyType::Sme, Some("A@B.com")))
            .await
            .unwrap();
        assert_eq!(relaxed.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_find_all_filters() {
        let repo = seeded().await;

        let smes = repo
            .find_all(
                &CompanyFilters {
                    company_type: Some(CompanyType::Sme),
                    ..Default::default()
                },
                Pagination::default(),
            )
            .await
            .unwrap();
        assert_eq!(smes.total, 2);

        let search = repo
            .find_all(
                &CompanyFilters {
                    search: Some("GLOBAL".to_string()),
                    ..Default::default()
                },
                Pagination::default(),
            )
            .await
            .unwrap();
        assert_eq!(search.total, 1);
        assert_eq!(search.data[0].name, "Global Corp");

        let by_tax = repo
            .find_all(
                &CompanyFilters {
                    search: Some("55555".to_string()),
                    ..Default::default()
                },
                Pagination::default(),
            )
            .await
            .unwrap();
        assert_eq!(by_tax.data[0].name, "Old Company Ltd");

        // No email never matches an email filter
        let email = repo
            .find_all(
                &CompanyFilters {
                    email: Some(".COM".to_string()),
                    ..Default::default()
                },
                Pagination::default(),
            )
            .await
            .unwrap();
        assert_eq!(email.total, 2);

        let combined = repo
            .find_all(
                &CompanyFilters {
                    company_type: Some(CompanyType::Sme),
                    search: Some("corp".to_string()),
                    email: None,
                },
                Pagination::default(),
            )
            .await
            .unwrap();
        assert_eq!(combined.total, 0);
    }

    #[tokio::test]
    async fn test_find_all_pagination_keeps_insertion_order() {
        let repo = seeded().await;

        let first = repo
            .find_all(&CompanyFilters::default(), Pagination::new(1, 2))
            .await
            .unwrap();
        assert_eq!(first.total, 3);
        let names: Vec<&str> = first.data.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Tech Solutions Inc", "Global Corp"]);

        let second = repo
            .find_all(&CompanyFilters::default(), Pagination::new(2, 2))
            .await
            .unwrap();
        assert_eq!(second.data.len(), 1);
        assert_eq!(second.data[0].name, "Old Company Ltd");

        let beyond = repo
            .find_all(&CompanyFilters::default(), Pagination::new(9, 2))
            .await
            .unwrap();
        assert!(beyond.data.is_empty());
        assert_eq!(beyond.total, 3);
    }

    #[tokio::test]
    async fn test_update_only_touches_status() {
        let repo = seeded().await;
        let mut company = repo.find_by_tax_id("30-12345678-9").await.unwrap().unwrap();
        let later = company.updated_at + Duration::hours(1);

        company.name = "Renamed".to_string();
        company.update_status(crate::entities::CompanyStatus::Inactive, later);
        let stored = repo.update(company.clone()).await.unwrap();

        assert_eq!(stored.name, "Tech Solutions Inc");
        assert_eq!(stored.status, crate::entities::CompanyStatus::Inactive);
        assert_eq!(stored.updated_at, later);

        company.id = "missing".to_string();
        assert!(matches!(
            repo.update(company).await.unwrap_err(),
            RegistryError::NotFound { .. }
        ));
    }

    #[tokio::test]
    async fn test_registered_in_last_month() {
        let repo = InMemoryCompanyRepository::new();
        let now = Utc::now();

        for (days, tax_id) in [(15, "11-11111111-1"), (45, "22-22222222-2"), (30, "33-33333333-3")] {
            let mut c = company("Some Co", tax_id, CompanyType::Sme, None);
            c.registration_date = now - Duration::days(days);
            repo.save(c).await.unwrap();
        }

        let recent = repo.find_registered_in_last_month(now).await.unwrap();
        let tax_ids: Vec<&str> = recent.iter().map(|c| c.tax_id.as_str()).collect();
        assert_eq!(tax_ids, vec!["11-11111111-1", "33-33333333-3"]);
    }

    #[tokio::test]
    async fn test_transfer_aggregates() {
        let repo = InMemoryTransferRepository::new();
        let now = Utc::now();

        let rows = [
            ("1", "0.10", 5, TransferStatus::Completed),
            ("1", "0.20", 2, TransferStatus::Completed),
            ("2", "100", 10, TransferStatus::Pending),
            ("2", "100", 10, TransferStatus::Failed),
            ("3", "999", 60, TransferStatus::Completed),
        ];
        for (company_id, amount, days, status) in rows {
            repo.save(Transfer::new(
                company_id.to_string(),
                amount.parse().unwrap(),
                "USD".to_string(),
                now - Duration::days(days),
                status,
                None,
            ))
            .await
            .unwrap();
        }

        assert_eq!(repo.find_completed_in_last_month(now).await.unwrap().len(), 2);
        assert_eq!(repo.count_in_last_month(now).await.unwrap(), 2);
        // 0.1 + 0.2 without float drift
        assert_eq!(
            repo.sum_amount_in_last_month(now).await.unwrap(),
            "0.30".parse::<Decimal>().unwrap()
        );
        assert_eq!(repo.find_by_company_id("2").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_sum_overflow_is_storage_error() {
        let repo = InMemoryTransferRepository::new();
        let now = Utc::now();
        for _ in 0..2 {
            repo.save(Transfer::new(
                "1".to_string(),
                Decimal::MAX,
                "USD".to_string(),
                now - Duration::days(1),
                TransferStatus::Completed,
                None,
            ))
            .await
            .unwrap();
        }

        let err = repo.sum_amount_in_last_month(now).await.unwrap_err();
        assert!(matches!(err, RegistryError::Storage(_)));
        assert_eq!(repo.count_in_last_month(now).await.unwrap(), 2);
    }
}
