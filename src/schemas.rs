use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::error::AppError;
use crate::model::{LeaseStatus, PaymentMethod, PaymentStatus};

pub fn validate_input<T: Validate>(input: &T) -> Result<(), AppError> {
    input
        .validate()
        .map_err(|errors| AppError::Validation(format!("Validation failed: {errors}")))
}

pub fn clamp_limit_in_range(limit: Option<i64>, min: i64, max: i64) -> i64 {
    limit.unwrap_or(max).clamp(min, max)
}

fn default_notice_days() -> i32 {
    90
}
fn default_false() -> bool {
    false
}

// ── Paths & queries ────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct LeasePath {
    pub lease_id: Uuid,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentPath {
    pub payment_id: Uuid,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExitNoticePath {
    pub notice_id: Uuid,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrgQuery {
    pub org_id: Uuid,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LeasesQuery {
    pub org_id: Uuid,
    pub status: Option<LeaseStatus>,
    pub unit_id: Option<Uuid>,
    pub renter_id: Option<Uuid>,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentsQuery {
    pub org_id: Uuid,
    pub status: Option<PaymentStatus>,
    pub limit: Option<i64>,
}

// ── Lease inputs ───────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct CreateLeaseInput {
    pub organization_id: Uuid,
    pub unit_id: Uuid,
    pub renter_id: Uuid,
    pub starts_on: NaiveDate,
    pub ends_on: NaiveDate,
    #[validate(range(min = 1))]
    pub monthly_rent: i64,
    #[validate(range(min = 0))]
    pub security_deposit: Option<i64>,
    pub notes: Option<String>,
    pub contract_document_ref: Option<String>,
    #[serde(default = "default_notice_days")]
    #[validate(range(min = 0, max = 365))]
    pub notice_required_days: i32,
    #[validate(range(min = 1))]
    pub early_termination_penalty: Option<i64>,
    #[serde(default = "default_false")]
    pub is_migrated: bool,
    pub first_payment_on: Option<NaiveDate>,
}

impl CreateLeaseInput {
    /// Date rules that cut across fields: the term must be non-empty,
    /// migrated contracts carry a billing anchor, and the anchor falls
    /// inside the term.
    pub fn check_dates(&self) -> Result<(), AppError> {
        if self.ends_on <= self.starts_on {
            return Err(AppError::Validation(
                "End date must be after the start date.".to_string(),
            ));
        }
        if self.is_migrated && self.first_payment_on.is_none() {
            return Err(AppError::Validation(
                "Migrated leases require a first payment date.".to_string(),
            ));
        }
        if let Some(first_payment_on) = self.first_payment_on {
            if first_payment_on < self.starts_on || first_payment_on >= self.ends_on {
                return Err(AppError::Validation(
                    "First payment date must fall within the lease term.".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Draft leases accept contract edits; active leases only notes and the
/// contract document reference.
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct UpdateLeaseInput {
    pub starts_on: Option<NaiveDate>,
    pub ends_on: Option<NaiveDate>,
    #[validate(range(min = 1))]
    pub monthly_rent: Option<i64>,
    #[validate(range(min = 0))]
    pub security_deposit: Option<i64>,
    #[validate(range(min = 0, max = 365))]
    pub notice_required_days: Option<i32>,
    #[validate(range(min = 1))]
    pub early_termination_penalty: Option<i64>,
    pub notes: Option<String>,
    pub contract_document_ref: Option<String>,
}

impl UpdateLeaseInput {
    /// True when the patch touches contract terms that are frozen once a
    /// lease leaves draft.
    pub fn touches_contract_terms(&self) -> bool {
        self.starts_on.is_some()
            || self.ends_on.is_some()
            || self.monthly_rent.is_some()
            || self.security_deposit.is_some()
            || self.notice_required_days.is_some()
            || self.early_termination_penalty.is_some()
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct RenewLeaseInput {
    pub new_ends_on: NaiveDate,
    #[validate(range(min = 1))]
    pub new_monthly_rent: Option<i64>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct RentIncreaseInput {
    #[validate(range(min = 1))]
    pub new_rent: i64,
    pub effective_on: NaiveDate,
    pub reason: Option<String>,
}

// ── Payment inputs ─────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct RecordPaymentInput {
    pub organization_id: Uuid,
    pub lease_id: Uuid,
    #[validate(range(min = 1))]
    pub amount: i64,
    pub payment_date: NaiveDate,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub method: PaymentMethod,
    pub reference: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct CompletePaymentInput {
    #[validate(range(min = 1))]
    pub amount: i64,
    pub payment_date: NaiveDate,
    pub method: PaymentMethod,
    pub reference: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct UpdatePaymentInput {
    #[validate(range(min = 1))]
    pub amount: Option<i64>,
    pub payment_date: Option<NaiveDate>,
    pub method: Option<PaymentMethod>,
    pub reference: Option<String>,
    pub notes: Option<String>,
}

// ── Exit notice inputs ─────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct SubmitExitNoticeInput {
    pub planned_exit_on: NaiveDate,
    pub reason: Option<String>,
    #[serde(default = "default_false")]
    pub mutual_agreement: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamps_limits() {
        assert_eq!(clamp_limit_in_range(None, 1, 500), 500);
        assert_eq!(clamp_limit_in_range(Some(0), 1, 500), 1);
        assert_eq!(clamp_limit_in_range(Some(50), 1, 500), 50);
        assert_eq!(clamp_limit_in_range(Some(9999), 1, 500), 500);
    }

    #[test]
    fn rejects_non_positive_rent() {
        let input = RentIncreaseInput {
            new_rent: 0,
            effective_on: NaiveDate::from_ymd_opt(2026, 1, 1).expect("valid date"),
            reason: None,
        };
        assert!(validate_input(&input).is_err());
    }

    fn lease_input() -> CreateLeaseInput {
        CreateLeaseInput {
            organization_id: Uuid::new_v4(),
            unit_id: Uuid::new_v4(),
            renter_id: Uuid::new_v4(),
            starts_on: NaiveDate::from_ymd_opt(2024, 1, 1).expect("valid date"),
            ends_on: NaiveDate::from_ymd_opt(2025, 1, 1).expect("valid date"),
            monthly_rent: 1_000_000,
            security_deposit: None,
            notes: None,
            contract_document_ref: None,
            notice_required_days: 90,
            early_termination_penalty: None,
            is_migrated: false,
            first_payment_on: None,
        }
    }

    #[test]
    fn rejects_empty_or_inverted_terms() {
        let mut input = lease_input();
        input.ends_on = input.starts_on;
        assert!(input.check_dates().is_err());
        input.ends_on = NaiveDate::from_ymd_opt(2023, 12, 1).expect("valid date");
        assert!(input.check_dates().is_err());
    }

    #[test]
    fn migrated_lease_requires_a_billing_anchor() {
        let mut input = lease_input();
        input.is_migrated = true;
        assert!(input.check_dates().is_err());
        input.first_payment_on = NaiveDate::from_ymd_opt(2024, 6, 15);
        assert!(input.check_dates().is_ok());
    }

    #[test]
    fn billing_anchor_must_fall_within_the_term() {
        let mut input = lease_input();
        input.is_migrated = true;

        // Inclusive at the start, exclusive at the end.
        input.first_payment_on = input.starts_on.into();
        assert!(input.check_dates().is_ok());
        input.first_payment_on = NaiveDate::from_ymd_opt(2024, 12, 31);
        assert!(input.check_dates().is_ok());
        input.first_payment_on = Some(input.ends_on);
        assert!(input.check_dates().is_err());
        input.first_payment_on = NaiveDate::from_ymd_opt(2023, 12, 31);
        assert!(input.check_dates().is_err());
        input.first_payment_on = NaiveDate::from_ymd_opt(2025, 6, 1);
        assert!(input.check_dates().is_err());
    }

    #[test]
    fn detects_contract_term_patches() {
        let mut patch = UpdateLeaseInput {
            starts_on: None,
            ends_on: None,
            monthly_rent: None,
            security_deposit: None,
            notice_required_days: None,
            early_termination_penalty: None,
            notes: Some("note".to_string()),
            contract_document_ref: None,
        };
        assert!(!patch.touches_contract_terms());
        patch.monthly_rent = Some(1);
        assert!(patch.touches_contract_terms());
    }
}
