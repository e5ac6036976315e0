// Entity Models
//
// Each entity has:
// - Stable identity (UUID) that NEVER changes
// - Values fixed at creation (Company status is the one exception)
// - A derived "in the last month" predicate over the shared ReportWindow

pub mod company;
pub mod transfer;

pub use company::{normalize_email, Company, CompanyStatus, CompanyType};
pub use transfer::{Transfer, TransferStatus};
