// 🗄️ SQLite repositories - durable backend behind the same contracts
//
// The UNIQUE columns are the authoritative uniqueness guard: a racing
// writer that slips past the service pre-check still hits the constraint
// and gets a Conflict back.
//
// Timestamps are stored as fixed-width RFC 3339 (nanoseconds, `Z`) so
// lexical order in SQL equals chronological order and a read returns the
// exact instant that was written.

use crate::entities::{normalize_email, Company, CompanyStatus, CompanyType, Transfer, TransferStatus};
use crate::error::{RegistryError, RegistryResult, UniqueField};
use crate::repository::{
    total_amount, CompanyFilters, CompanyRepository, Page, Pagination, TransferRepository,
};
use crate::temporal::ReportWindow;
use anyhow::{anyhow, Context};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

// ============================================================================
// DATABASE HANDLE
// ============================================================================

/// Shared connection; both repositories of one dataset hold a clone
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn open(path: &Path, unique_email: bool) -> anyhow::Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database at {}", path.display()))?;
        setup_database(&conn, unique_email)?;
        Ok(Database {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_in_memory(unique_email: bool) -> anyhow::Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        setup_database(&conn, unique_email)?;
        Ok(Database {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> RegistryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| RegistryError::Storage(anyhow!("database connection lock poisoned")))
    }
}

pub fn setup_database(conn: &Connection, unique_email: bool) -> anyhow::Result<()> {
    // WAL for crash recovery; in-memory databases report "memory" instead
    let _mode: String =
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS companies (
            row_id INTEGER PRIMARY KEY AUTOINCREMENT,
            id TEXT UNIQUE NOT NULL,
            name TEXT NOT NULL,
            tax_id TEXT UNIQUE NOT NULL,
            company_type TEXT NOT NULL,
            email TEXT,
            email_key TEXT,
            status TEXT NOT NULL,
            registration_date TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS transfers (
            row_id INTEGER PRIMARY KEY AUTOINCREMENT,
            id TEXT UNIQUE NOT NULL,
            company_id TEXT NOT NULL,
            amount TEXT NOT NULL,
            currency TEXT NOT NULL,
            date TEXT NOT NULL,
            status TEXT NOT NULL,
            description TEXT
        )",
        [],
    )?;

    // Audit trail: every change is an event
    conn.execute(
        "CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT UNIQUE NOT NULL,
            timestamp TEXT NOT NULL,
            event_type TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            data TEXT NOT NULL,
            actor TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_companies_registration ON companies(registration_date)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_transfers_company ON transfers(company_id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_transfers_status_date ON transfers(status, date)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_events_entity ON events(entity_type, entity_id)",
        [],
    )?;

    // Follows the setting of the current open; switching it back on fails
    // if duplicate emails were stored meanwhile
    if unique_email {
        conn.execute(
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_companies_email_key
             ON companies(email_key) WHERE email_key IS NOT NULL",
            [],
        )
        .context("Failed to enforce email uniqueness (duplicate emails already stored?)")?;
    } else {
        conn.execute("DROP INDEX IF EXISTS idx_companies_email_key", [])?;
    }

    Ok(())
}

// ============================================================================
// AUDIT EVENTS
// ============================================================================

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Event {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub entity_type: String,
    pub entity_id: String,
    pub data: serde_json::Value,
    pub actor: String,
}

impl Event {
    pub fn new(
        event_type: &str,
        entity_type: &str,
        entity_id: &str,
        data: serde_json::Value,
        actor: &str,
    ) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type: event_type.to_string(),
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            data,
            actor: actor.to_string(),
        }
    }
}

pub fn insert_event(conn: &Connection, event: &Event) -> anyhow::Result<()> {
    let data_json = serde_json::to_string(&event.data)?;

    conn.execute(
        "INSERT INTO events (
            event_id, timestamp, event_type, entity_type, entity_id, data, actor
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            event.event_id,
            ts(event.timestamp),
            event.event_type,
            event.entity_type,
            event.entity_id,
            data_json,
            event.actor,
        ],
    )?;

    Ok(())
}

pub fn get_events_for_entity(
    conn: &Connection,
    entity_type: &str,
    entity_id: &str,
) -> anyhow::Result<Vec<Event>> {
    let mut stmt = conn.prepare(
        "SELECT event_id, timestamp, event_type, entity_type, entity_id, data, actor
         FROM events
         WHERE entity_type = ?1 AND entity_id = ?2
         ORDER BY id ASC",
    )?;

    let events = stmt
        .query_map(params![entity_type, entity_id], |row| {
            let data_json: String = row.get(5)?;
            Ok(Event {
                event_id: row.get(0)?,
                timestamp: parse_ts(row, 1)?,
                event_type: row.get(2)?,
                entity_type: row.get(3)?,
                entity_id: row.get(4)?,
                data: serde_json::from_str(&data_json)
                    .map_err(|e| rusqlite::Error::FromSqlConversionFailure(5, Type::Text, Box::new(e)))?,
                actor: row.get(6)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(events)
}

// ============================================================================
// ROW HELPERS
// ============================================================================

fn ts(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_ts(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn parse_enum<T>(row: &Row<'_>, idx: usize, parse: fn(&str) -> Option<T>) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    parse(&raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, format!("unknown value {raw}").into())
    })
}

const COMPANY_COLUMNS: &str = "id, name, tax_id, company_type, email, status,
    registration_date, created_at, updated_at";

fn company_from_row(row: &Row<'_>) -> rusqlite::Result<Company> {
    Ok(Company {
        id: row.get(0)?,
        name: row.get(1)?,
        tax_id: row.get(2)?,
        company_type: parse_enum(row, 3, CompanyType::parse)?,
        email: row.get(4)?,
        status: parse_enum(row, 5, CompanyStatus::parse)?,
        registration_date: parse_ts(row, 6)?,
        created_at: parse_ts(row, 7)?,
        updated_at: parse_ts(row, 8)?,
    })
}

const TRANSFER_COLUMNS: &str = "id, company_id, amount, currency, date, status, description";

fn transfer_from_row(row: &Row<'_>) -> rusqlite::Result<Transfer> {
    let amount: String = row.get(2)?;
    Ok(Transfer {
        id: row.get(0)?,
        company_id: row.get(1)?,
        amount: amount
            .parse::<Decimal>()
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e)))?,
        currency: row.get(3)?,
        date: parse_ts(row, 4)?,
        status: parse_enum(row, 5, TransferStatus::parse)?,
        description: row.get(6)?,
    })
}

/// Map UNIQUE violations on business keys to Conflict; anything else is storage
fn classify_insert_error(err: rusqlite::Error) -> RegistryError {
    if let rusqlite::Error::SqliteFailure(failure, Some(message)) = &err {
        if failure.code == rusqlite::ErrorCode::ConstraintViolation {
            if message.contains("companies.tax_id") {
                return RegistryError::Conflict {
                    field: UniqueField::TaxId,
                };
            }
            if message.contains("companies.email_key") {
                return RegistryError::Conflict {
                    field: UniqueField::Email,
                };
            }
        }
    }
    RegistryError::Storage(anyhow::Error::new(err).context("Failed to insert row"))
}

fn query_companies(
    conn: &Connection,
    where_clause: &str,
    args: &[&dyn rusqlite::ToSql],
) -> anyhow::Result<Vec<Company>> {
    let sql = format!("SELECT {COMPANY_COLUMNS} FROM companies {where_clause} ORDER BY row_id ASC");
    let mut stmt = conn.prepare(&sql)?;
    let companies = stmt
        .query_map(args, company_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(companies)
}

fn query_transfers(
    conn: &Connection,
    where_clause: &str,
    args: &[&dyn rusqlite::ToSql],
) -> anyhow::Result<Vec<Transfer>> {
    let sql = format!("SELECT {TRANSFER_COLUMNS} FROM transfers {where_clause} ORDER BY row_id ASC");
    let mut stmt = conn.prepare(&sql)?;
    let transfers = stmt
        .query_map(args, transfer_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(transfers)
}

// ============================================================================
// COMPANY REPOSITORY
// ============================================================================

pub struct SqliteCompanyRepository {
    db: Database,
}

impl SqliteCompanyRepository {
    pub fn new(db: Database) -> Self {
        SqliteCompanyRepository { db }
    }

    /// Audit events recorded for one company, oldest first
    pub fn events_for(&self, company_id: &str) -> RegistryResult<Vec<Event>> {
        let conn = self.db.lock()?;
        Ok(get_events_for_entity(&conn, "company", company_id)?)
    }
}

#[async_trait]
impl CompanyRepository for SqliteCompanyRepository {
    async fn save(&self, company: Company) -> RegistryResult<Company> {
        let mut conn = self.db.lock()?;
        let tx = conn.transaction().context("Failed to begin transaction")?;

        tx.execute(
            "INSERT INTO companies (
                id, name, tax_id, company_type, email, email_key, status,
                registration_date, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                company.id,
                company.name,
                company.tax_id,
                company.company_type.as_str(),
                company.email,
                company.email_key(),
                company.status.as_str(),
                ts(company.registration_date),
                ts(company.created_at),
                ts(company.updated_at),
            ],
        )
        .map_err(classify_insert_error)?;

        let event = Event::new(
            "company_registered",
            "company",
            &company.id,
            serde_json::json!({
                "tax_id": company.tax_id,
                "type": company.company_type.as_str(),
            }),
            "registry",
        );
        insert_event(&tx, &event)?;
        tx.commit().context("Failed to commit company insert")?;

        tracing::debug!(id = %company.id, tax_id = %company.tax_id, "company persisted");
        Ok(company)
    }

    async fn update(&self, company: Company) -> RegistryResult<Company> {
        let mut conn = self.db.lock()?;
        let tx = conn.transaction().context("Failed to begin transaction")?;

        let changed = tx
            .execute(
                "UPDATE companies SET status = ?1, updated_at = ?2 WHERE id = ?3",
                params![company.status.as_str(), ts(company.updated_at), company.id],
            )
            .context("Failed to update company")?;
        if changed == 0 {
            return Err(RegistryError::company_not_found(&company.id));
        }

        let event = Event::new(
            "company_status_changed",
            "company",
            &company.id,
            serde_json::json!({ "status": company.status.as_str() }),
            "registry",
        );
        insert_event(&tx, &event)?;

        let stored = query_companies(&tx, "WHERE id = ?1", &[&company.id])?
            .into_iter()
            .next()
            .ok_or_else(|| RegistryError::company_not_found(&company.id))?;
        tx.commit().context("Failed to commit company update")?;
        Ok(stored)
    }

    async fn find_by_id(&self, id: &str) -> RegistryResult<Option<Company>> {
        let conn = self.db.lock()?;
        let sql = format!("SELECT {COMPANY_COLUMNS} FROM companies WHERE id = ?1");
        Ok(conn
            .query_row(&sql, params![id], company_from_row)
            .optional()
            .context("Failed to look up company by id")?)
    }

    async fn find_by_tax_id(&self, tax_id: &str) -> RegistryResult<Option<Company>> {
        let conn = self.db.lock()?;
        let sql = format!("SELECT {COMPANY_COLUMNS} FROM companies WHERE tax_id = ?1");
        Ok(conn
            .query_row(&sql, params![tax_id], company_from_row)
            .optional()
            .context("Failed to look up company by tax id")?)
    }

    async fn find_by_email(&self, email: &str) -> RegistryResult<Option<Company>> {
        let conn = self.db.lock()?;
        let key = normalize_email(email);
        Ok(query_companies(&conn, "WHERE email_key = ?1", &[&key])?
            .into_iter()
            .next())
    }

    async fn find_all(
        &self,
        filters: &CompanyFilters,
        pagination: Pagination,
    ) -> RegistryResult<Page<Company>> {
        let conn = self.db.lock()?;
        // Substring filters run in Rust so both backends share one matcher
        let filtered: Vec<Company> = query_companies(&conn, "", &[])?
            .into_iter()
            .filter(|c| filters.matches(c))
            .collect();

        Ok(Page {
            total: filtered.len(),
            data: pagination.slice(&filtered),
        })
    }

    async fn find_registered_in_last_month(
        &self,
        as_of: DateTime<Utc>,
    ) -> RegistryResult<Vec<Company>> {
        let conn = self.db.lock()?;
        let window = ReportWindow::last_month(as_of);
        Ok(query_companies(
            &conn,
            "WHERE registration_date >= ?1 AND registration_date <= ?2",
            &[&ts(window.start), &ts(window.end)],
        )?)
    }

    async fn count(&self) -> RegistryResult<usize> {
        let conn = self.db.lock()?;
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM companies", [], |row| row.get(0))
            .context("Failed to count companies")?;
        Ok(usize::try_from(count).unwrap_or_default())
    }
}

// ============================================================================
// TRANSFER REPOSITORY
// ============================================================================

pub struct SqliteTransferRepository {
    db: Database,
}

impl SqliteTransferRepository {
    pub fn new(db: Database) -> Self {
        SqliteTransferRepository { db }
    }

    fn completed_in_last_month(&self, as_of: DateTime<Utc>) -> RegistryResult<Vec<Transfer>> {
        let conn = self.db.lock()?;
        let window = ReportWindow::last_month(as_of);
        Ok(query_transfers(
            &conn,
            "WHERE status = ?1 AND date >= ?2 AND date <= ?3",
            &[&TransferStatus::Completed.as_str(), &ts(window.start), &ts(window.end)],
        )?)
    }
}

#[async_trait]
impl TransferRepository for SqliteTransferRepository {
    async fn save(&self, transfer: Transfer) -> RegistryResult<Transfer> {
        let conn = self.db.lock()?;
        conn.execute(
            "INSERT INTO transfers (id, company_id, amount, currency, date, status, description)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                transfer.id,
                transfer.company_id,
                transfer.amount.to_string(),
                transfer.currency,
                ts(transfer.date),
                transfer.status.as_str(),
                transfer.description,
            ],
        )
        .map_err(classify_insert_error)?;
        Ok(transfer)
    }

    async fn find_completed_in_last_month(
        &self,
        as_of: DateTime<Utc>,
    ) -> RegistryResult<Vec<Transfer>> {
        self.completed_in_last_month(as_of)
    }

    async fn find_by_company_id(&self, company_id: &str) -> RegistryResult<Vec<Transfer>> {
        let conn = self.db.lock()?;
        Ok(query_transfers(&conn, "WHERE company_id = ?1", &[&company_id])?)
    }

    async fn count_in_last_month(&self, as_of: DateTime<Utc>) -> RegistryResult<usize> {
        Ok(self.completed_in_last_month(as_of)?.len())
    }

    async fn sum_amount_in_last_month(&self, as_of: DateTime<Utc>) -> RegistryResult<Decimal> {
        // TEXT amounts are summed in Rust; SQLite SUM() would go through REAL
        total_amount(&self.completed_in_last_month(as_of)?)
    }
}

// ============================================================================
// TESTS
// ============================================================================
