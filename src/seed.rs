// 🌱 Seed loader - bulk import of companies and transfers from CSV
//
// Company rows go through the same shape rules as a live registration,
// but keep the registration date written in the file so historical data
// lands in (or out of) the reporting window as recorded.
//
// Transfer rows name their company by tax ID or by company ID. Unknown
// references are kept verbatim; reports drop them later.

use crate::entities::{Company, CompanyStatus, CompanyType, Transfer, TransferStatus};
use crate::error::RegistryError;
use crate::repository::{CompanyRepository, TransferRepository};
use crate::validation::{validate_registration, validate_transfer, RecordTransferCommand, RegisterCompanyCommand};
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::Path;

// ============================================================================
// CSV ROWS
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct CompanyRow {
    pub name: String,
    pub tax_id: String,
    #[serde(rename = "type")]
    pub company_type: String,
    pub email: Option<String>,
    pub status: Option<String>,
    /// RFC 3339; empty means "at load time"
    pub registration_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransferRow {
    /// Tax ID or company ID
    pub company: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub amount: Decimal,
    pub currency: String,
    pub date: Option<DateTime<Utc>>,
    pub status: String,
    pub description: Option<String>,
}

pub fn load_companies_csv(csv_path: &Path) -> Result<Vec<CompanyRow>> {
    let mut rdr = csv::Reader::from_path(csv_path)
        .with_context(|| format!("Failed to open CSV file {}", csv_path.display()))?;

    let mut rows = Vec::new();
    for (line, result) in rdr.deserialize().enumerate() {
        let row: CompanyRow =
            result.with_context(|| format!("Failed to deserialize company row {}", line + 1))?;
        rows.push(row);
    }

    Ok(rows)
}

pub fn load_transfers_csv(csv_path: &Path) -> Result<Vec<TransferRow>> {
    let mut rdr = csv::Reader::from_path(csv_path)
        .with_context(|| format!("Failed to open CSV file {}", csv_path.display()))?;

    let mut rows = Vec::new();
    for (line, result) in rdr.deserialize().enumerate() {
        let row: TransferRow =
            result.with_context(|| format!("Failed to deserialize transfer row {}", line + 1))?;
        rows.push(row);
    }

    Ok(rows)
}

// ============================================================================
// ROW -> ENTITY
// ============================================================================

impl CompanyRow {
    pub fn into_company(self, now: DateTime<Utc>) -> Result<Company> {
        let command = RegisterCompanyCommand {
            name: Some(self.name.clone()),
            tax_id: Some(self.tax_id.clone()),
            company_type: Some(self.company_type.clone()),
            email: self.email.clone(),
        };
        let errors = validate_registration(&command);
        if !errors.is_empty() {
            return Err(RegistryError::Validation(errors))
                .with_context(|| format!("Invalid company row for tax ID {}", self.tax_id));
        }

        let company_type = CompanyType::parse(&self.company_type)
            .ok_or_else(|| anyhow!("Unknown company type: {}", self.company_type))?;
        let status = match self.status.as_deref().map(str::trim) {
            None | Some("") => CompanyStatus::default(),
            Some(raw) => {
                CompanyStatus::parse(raw).ok_or_else(|| anyhow!("Unknown company status: {raw}"))?
            }
        };

        let mut company = Company::new(
            self.name.trim().to_string(),
            self.tax_id,
            company_type,
            command.normalized_email(),
            now,
        );
        company.status = status;
        if let Some(registered) = self.registration_date {
            company.registration_date = registered;
        }

        Ok(company)
    }
}

impl TransferRow {
    pub fn into_transfer(self, company_id: String, now: DateTime<Utc>) -> Result<Transfer> {
        let status = TransferStatus::parse(self.status.trim())
            .ok_or_else(|| anyhow!("Unknown transfer status: {}", self.status))?;

        let command = RecordTransferCommand {
            company_id,
            amount: self.amount,
            currency: self.currency,
            date: self.date,
            status,
            description: self.description.filter(|d| !d.trim().is_empty()),
        };
        let errors = validate_transfer(&command);
        if !errors.is_empty() {
            return Err(RegistryError::Validation(errors)).context("Invalid transfer row");
        }

        Ok(Transfer::new(
            command.company_id,
            command.amount,
            command.currency,
            command.date.unwrap_or(now),
            command.status,
            command.description,
        ))
    }
}

// ============================================================================
// SEEDING
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedReport {
    pub companies_inserted: usize,
    pub companies_skipped: usize,
    pub transfers_inserted: usize,
}

/// Insert rows through the repository contracts.
///
/// Companies whose tax ID or email already exists are skipped so a seed
/// file can be loaded twice. Any other failure stops the load.
pub async fn seed_store(
    companies: &dyn CompanyRepository,
    transfers: &dyn TransferRepository,
    company_rows: Vec<CompanyRow>,
    transfer_rows: Vec<TransferRow>,
    now: DateTime<Utc>,
) -> Result<SeedReport> {
    let mut report = SeedReport::default();

    for row in company_rows {
        let tax_id = row.tax_id.clone();
        let company = row.into_company(now)?;
        match companies.save(company).await {
            Ok(_) => report.companies_inserted += 1,
            Err(RegistryError::Conflict { field }) => {
                tracing::warn!(tax_id = %tax_id, %field, "seed row skipped: already registered");
                report.companies_skipped += 1;
            }
            Err(err) => return Err(err.into()),
        }
    }

    for row in transfer_rows {
        let company_id = match companies.find_by_tax_id(row.company.trim()).await? {
            Some(company) => company.id,
            None => row.company.trim().to_string(),
        };
        let transfer = row.into_transfer(company_id, now)?;
        transfers.save(transfer).await?;
        report.transfers_inserted += 1;
    }

    tracing::info!(
        companies = report.companies_inserted,
        skipped = report.companies_skipped,
        transfers = report.transfers_inserted,
        "seed complete"
    );
    Ok(report)
}

/// Load both files (transfers optional) and seed them
pub async fn seed_from_files(
    companies: &dyn CompanyRepository,
    transfers: &dyn TransferRepository,
    companies_csv: &Path,
    transfers_csv: Option<&Path>,
    now: DateTime<Utc>,
) -> Result<SeedReport> {
    let company_rows = load_companies_csv(companies_csv)?;
    let transfer_rows = match transfers_csv {
        Some(path) => load_transfers_csv(path)?,
        None => Vec::new(),
    };

    seed_store(companies, transfers, company_rows, transfer_rows, now).await
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{InMemoryCompanyRepository, InMemoryTransferRepository};
    use chrono::{Duration, TimeZone};
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 11, 20, 10, 0, 0).unwrap()
    }

    fn csv_file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    const COMPANIES: &str = "\
name,tax_id,type,email,status,registration_date
Tech Solutions Inc,30-12345678-9,SME,info@techsolutions.com,,2024-11-05T10:00:00Z
Global Corp,30-98765432-1,CORPORATE,,INACTIVE,2024-09-01T00:00:00Z
Fresh Startup,30-55555555-5,SME,hello@fresh.io,,
";

    const TRANSFERS: &str = "\
company,amount,currency,date,status,description
30-12345678-9,50000.00,USD,2024-11-15T10:00:00Z,COMPLETED,Service payment
30-98765432-1,1000.50,EUR,2024-10-01T10:00:00Z,COMPLETED,
ghost-company,10.00,USD,2024-11-18T10:00:00Z,PENDING,
";

    #[test]
    fn test_load_companies_csv() {
        let file = csv_file(COMPANIES);
        let rows = load_companies_csv(file.path()).unwrap();

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].company_type, "SME");
        assert_eq!(rows[1].email, None);
        assert_eq!(rows[2].registration_date, None);
    }

    #[test]
    fn test_company_row_keeps_recorded_date() {
        let file = csv_file(COMPANIES);
        let rows = load_companies_csv(file.path()).unwrap();

        let global = rows[1].clone().into_company(now()).unwrap();
        assert_eq!(global.status, CompanyStatus::Inactive);
        assert_eq!(global.registration_date, now() - Duration::days(80) - Duration::hours(10));

        let fresh = rows[2].clone().into_company(now()).unwrap();
        assert_eq!(fresh.registration_date, now());
    }

    #[test]
    fn test_invalid_company_row_is_rejected() {
        let row = CompanyRow {
            name: "AB".to_string(),
            tax_id: "bad".to_string(),
            company_type: "SME".to_string(),
            email: None,
            status: None,
            registration_date: None,
        };
        let err = row.into_company(now()).unwrap_err();
        assert!(err.to_string().contains("bad"));
    }

    #[tokio::test]
    async fn test_seed_store_resolves_tax_ids_and_skips_duplicates() {
        let companies = InMemoryCompanyRepository::new();
        let transfers = InMemoryTransferRepository::new();
        let company_file = csv_file(COMPANIES);
        let transfer_file = csv_file(TRANSFERS);

        let report = seed_from_files(
            &companies,
            &transfers,
            company_file.path(),
            Some(transfer_file.path()),
            now(),
        )
        .await
        .unwrap();
        assert_eq!(
            report,
            SeedReport {
                companies_inserted: 3,
                companies_skipped: 0,
                transfers_inserted: 3,
            }
        );

        let tech = companies.find_by_tax_id("30-12345678-9").await.unwrap().unwrap();
        let tech_transfers = transfers.find_by_company_id(&tech.id).await.unwrap();
        assert_eq!(tech_transfers.len(), 1);
        assert_eq!(tech_transfers[0].amount, Decimal::new(5000000, 2));
        assert_eq!(transfers.find_by_company_id("ghost-company").await.unwrap().len(), 1);

        // Second load of the same company file only skips
        let again = seed_from_files(&companies, &transfers, company_file.path(), None, now())
            .await
            .unwrap();
        assert_eq!(again.companies_inserted, 0);
        assert_eq!(again.companies_skipped, 3);
        assert_eq!(companies.count().await.unwrap(), 3);
    }

    #[test]
    fn test_missing_file_has_context() {
        let err = load_companies_csv(Path::new("/nonexistent/companies.csv")).unwrap_err();
        assert!(err.to_string().contains("Failed to open CSV file"));
    }
}
