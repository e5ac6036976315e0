// 💸 Transfer Entity - money movement linked to a company
//
// company_id is a plain foreign key. Nothing checks it at write time;
// reports that join against companies drop dangling references.

use crate::temporal::ReportWindow;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// ============================================================================
// TRANSFER STATUS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransferStatus {
    Pending,
    Completed,
    Failed,
}

impl TransferStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferStatus::Pending => "PENDING",
            TransferStatus::Completed => "COMPLETED",
            TransferStatus::Failed => "FAILED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "PENDING" => Some(TransferStatus::Pending),
            "COMPLETED" => Some(TransferStatus::Completed),
            "FAILED" => Some(TransferStatus::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// TRANSFER ENTITY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transfer {
    pub id: String,

    /// Foreign key to Company (not enforced)
    pub company_id: String,

    /// Non-negative, exact decimal in the currency's units
    pub amount: Decimal,

    /// ISO 4217 code: USD, EUR, ARS...
    pub currency: String,

    /// When the money moved
    pub date: DateTime<Utc>,

    pub status: TransferStatus,

    pub description: Option<String>,
}

impl Transfer {
    pub fn new(
        company_id: String,
        amount: Decimal,
        currency: String,
        date: DateTime<Utc>,
        status: TransferStatus,
        description: Option<String>,
    ) -> Self {
        Transfer {
            id: uuid::Uuid::new_v4().to_string(),
            company_id,
            amount,
            currency,
            date,
            status,
            description,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == TransferStatus::Completed
    }

    /// COMPLETED and dated inside the trailing reporting window
    pub fn is_completed_in_last_month(&self, as_of: DateTime<Utc>) -> bool {
        self.is_completed() && ReportWindow::last_month(as_of).contains(self.date)
    }
}
