// 🏢 Company Entity - Stable identity + unique tax ID
//
// Identity: UUID assigned at registration, never reused.
// Values: name, tax_id, type, email are fixed after creation.
// Only `status` moves, and every move stamps `updated_at`.

use crate::temporal::ReportWindow;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// COMPANY TYPE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CompanyType {
    /// Small / medium enterprise
    Sme,

    Corporate,
}

impl CompanyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompanyType::Sme => "SME",
            CompanyType::Corporate => "CORPORATE",
        }
    }

    /// Exact, case-sensitive match against the closed set
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "SME" => Some(CompanyType::Sme),
            "CORPORATE" => Some(CompanyType::Corporate),
            _ => None,
        }
    }
}

impl std::fmt::Display for CompanyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// COMPANY STATUS
// ============================================================================

/// No ordering is enforced: any status is reachable from any other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CompanyStatus {
    #[default]
    Active,
    Inactive,
    Pending,
}

impl CompanyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompanyStatus::Active => "ACTIVE",
            CompanyStatus::Inactive => "INACTIVE",
            CompanyStatus::Pending => "PENDING",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "ACTIVE" => Some(CompanyStatus::Active),
            "INACTIVE" => Some(CompanyStatus::Inactive),
            "PENDING" => Some(CompanyStatus::Pending),
            _ => None,
        }
    }
}

impl std::fmt::Display for CompanyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// COMPANY ENTITY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Company {
    /// Stable identity (UUID) - NEVER changes
    pub id: String,

    /// Trimmed display name, 3-100 characters
    pub name: String,

    /// Canonical `DD-DDDDDDDD-D`, unique across the registry
    pub tax_id: String,

    #[serde(rename = "type")]
    pub company_type: CompanyType,

    pub email: Option<String>,

    pub status: CompanyStatus,

    /// Drives every "recently registered" report
    pub registration_date: DateTime<Utc>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Company {
    /// New ACTIVE company registered at `now`, with a fresh UUID
    pub fn new(
        name: String,
        tax_id: String,
        company_type: CompanyType,
        email: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Company {
            id: uuid::Uuid::new_v4().to_string(),
            name,
            tax_id,
            company_type,
            email,
            status: CompanyStatus::Active,
            registration_date: now,
            created_at: now,
            updated_at: now,
        }
    }

    /// Lower-cased email used as the uniqueness key
    pub fn email_key(&self) -> Option<String> {
        self.email.as_deref().map(normalize_email)
    }

    pub fn update_status(&mut self, status: CompanyStatus, now: DateTime<Utc>) {
        self.status = status;
        self.updated_at = now;
    }

    pub fn is_registered_in_last_month(&self, as_of: DateTime<Utc>) -> bool {
        ReportWindow::last_month(as_of).contains(self.registration_date)
    }

    /// Case-insensitive containment against name or tax ID
    pub fn matches_search(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        self.name.to_lowercase().contains(&needle) || self.tax_id.to_lowercase().contains(&needle)
    }

    /// Case-insensitive containment against email; no email never matches
    pub fn matches_email(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        self.email
            .as_deref()
            .is_some_and(|email| email.to_lowercase().contains(&needle))
    }
}

/// Uniqueness key for emails: trimmed and case-folded
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn company_registered(days_ago: i64, now: DateTime<Utc>) -> Company {
        let mut company = Company::new(
            "Test Company".to_string(),
            "30-12345678-9".to_string(),
            CompanyType::Sme,
            Some("email@example.com".to_string()),
            now,
        );
        company.registration_date = now - Duration::days(days_ago);
        company
    }

    #[test]
    fn test_company_creation() {
        let now = Utc::now();
        let company = Company::new(
            "Test Company".to_string(),
            "30-12345678-9".to_string(),
            CompanyType::Corporate,
            None,
            now,
        );

        assert!(!company.id.is_empty());
        assert_eq!(company.status, CompanyStatus::Active);
        assert_eq!(company.registration_date, now);
        assert_eq!(company.created_at, company.updated_at);
        assert_eq!(company.email_key(), None);
    }

    #[test]
    fn test_ids_are_not_reused() {
        let now = Utc::now();
        let a = Company::new("Aaa".into(), "30-12345678-9".into(), CompanyType::Sme, None, now);
        let b = Company::new("Aaa".into(), "30-12345678-9".into(), CompanyType::Sme, None, now);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_registered_in_last_month() {
        let now = Utc::now();

        assert!(company_registered(15, now).is_registered_in_last_month(now));
        assert!(!company_registered(45, now).is_registered_in_last_month(now));
        // Boundary is inclusive
        assert!(company_registered(30, now).is_registered_in_last_month(now));
    }

    #[test]
    fn test_update_status_stamps_updated_at() {
        let now = Utc::now();
        let mut company = company_registered(1, now);
        let later = now + Duration::minutes(5);

        company.update_status(CompanyStatus::Inactive, later);
        assert_eq!(company.status, CompanyStatus::Inactive);
        assert_eq!(company.updated_at, later);

        // Any status reachable from any other
        company.update_status(CompanyStatus::Pending, later);
        company.update_status(CompanyStatus::Active, later);
        assert_eq!(company.status, CompanyStatus::Active);
        assert_eq!(company.created_at, now);
    }

    #[test]
    fn test_search_and_email_matching() {
        let mut company = company_registered(1, Utc::now());
        company.name = "Tech Solutions Inc".to_string();

        assert!(company.matches_search("tech"));
        assert!(company.matches_search("SOLUTIONS"));
        assert!(company.matches_search("12345678"));
        assert!(!company.matches_search("global"));

        assert!(company.matches_email("EXAMPLE"));
        company.email = None;
        assert!(!company.matches_email("example"));
    }

    #[test]
    fn test_type_serializes_uppercase() {
        assert_eq!(serde_json::to_string(&CompanyType::Sme).unwrap(), "\"SME\"");
        assert_eq!(CompanyType::parse("CORPORATE"), Some(CompanyType::Corporate));
        assert_eq!(CompanyType::parse("Corporate"), None);
        assert_eq!(CompanyStatus::parse("PENDING"), Some(CompanyStatus::Pending));
    }
}
