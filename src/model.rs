use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle states of a lease. Draft is the only creatable state;
/// expired and terminated are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "lease_status", rename_all = "snake_case")]
pub enum LeaseStatus {
    Draft,
    Active,
    Expired,
    Terminated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "payment_status", rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Refunded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "payment_method", rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Transfer,
    Check,
    Card,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "exit_notice_status", rename_all = "snake_case")]
pub enum ExitNoticeStatus {
    Pending,
    Confirmed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "unit_occupancy", rename_all = "snake_case")]
pub enum UnitOccupancy {
    Vacant,
    Occupied,
}

/// A tenancy agreement. Monetary fields are integer currency units.
/// Leases are never physically deleted; they are financial history.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Lease {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub unit_id: Uuid,
    pub renter_id: Uuid,
    pub starts_on: NaiveDate,
    pub ends_on: NaiveDate,
    pub monthly_rent: i64,
    pub security_deposit: Option<i64>,
    pub status: LeaseStatus,
    pub notes: Option<String>,
    pub contract_document_ref: Option<String>,
    /// Preserved across renewals; set once at creation.
    pub original_ends_on: NaiveDate,
    pub renewal_count: i32,
    pub notice_required_days: i32,
    pub early_termination_penalty: Option<i64>,
    pub last_increase_on: Option<NaiveDate>,
    /// Pre-existing contract imported mid-life. Obligations start at
    /// `first_payment_on` instead of `starts_on`; no retroactive periods.
    pub is_migrated: bool,
    pub first_payment_on: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Lease {
    /// The date the first billing period is anchored to.
    pub fn effective_first_payment_on(&self) -> NaiveDate {
        if self.is_migrated {
            self.first_payment_on.unwrap_or(self.starts_on)
        } else {
            self.starts_on
        }
    }
}

/// One billing period's obligation and/or its settlement.
/// Generated rows are identified by (lease_id, period_start).
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Payment {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub lease_id: Uuid,
    pub amount: i64,
    pub payment_date: NaiveDate,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub method: Option<PaymentMethod>,
    pub status: PaymentStatus,
    pub reference: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Immutable record of a rent change. Append-only.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct RentIncrease {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub lease_id: Uuid,
    pub old_rent: i64,
    pub new_rent: i64,
    pub increase_percentage: i32,
    pub effective_on: NaiveDate,
    pub reason: Option<String>,
    pub applied_by: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ExitNotice {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub lease_id: Uuid,
    pub notice_date: NaiveDate,
    pub planned_exit_on: NaiveDate,
    pub reason: Option<String>,
    pub mutual_agreement: bool,
    pub penalty_amount: Option<i64>,
    pub penalty_waived: bool,
    pub status: ExitNoticeStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Minimal unit surface consumed by the engine: occupancy is derived
/// from the presence of an active lease.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Unit {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub property_id: Uuid,
    pub occupancy: UnitOccupancy,
}

/// Minimal renter surface: lease creation verifies the renter belongs
/// to the acting organization before binding it.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Renter {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub full_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn lease_with(migrated: bool, first_payment: Option<NaiveDate>) -> Lease {
        Lease {
            id: Uuid::new_v4(),
            organization_id: Uuid::new_v4(),
            unit_id: Uuid::new_v4(),
            renter_id: Uuid::new_v4(),
            starts_on: date(2024, 1, 1),
            ends_on: date(2025, 1, 1),
            monthly_rent: 1_000_000,
            security_deposit: None,
            status: LeaseStatus::Draft,
            notes: None,
            contract_document_ref: None,
            original_ends_on: date(2025, 1, 1),
            renewal_count: 0,
            notice_required_days: 90,
            early_termination_penalty: None,
            last_increase_on: None,
            is_migrated: migrated,
            first_payment_on: first_payment,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn migrated_lease_anchors_on_first_payment_date() {
        let lease = lease_with(true, Some(date(2024, 6, 15)));
        assert_eq!(lease.effective_first_payment_on(), date(2024, 6, 15));
    }

    #[test]
    fn regular_lease_anchors_on_start_date() {
        let lease = lease_with(false, Some(date(2024, 6, 15)));
        assert_eq!(lease.effective_first_payment_on(), date(2024, 1, 1));
        let lease = lease_with(true, None);
        assert_eq!(lease.effective_first_payment_on(), date(2024, 1, 1));
    }
}
