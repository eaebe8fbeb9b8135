use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{round_money, RecordId};
use crate::validate::{FieldErrors, Validator};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostelVisit {
    pub id: RecordId,
    pub student_id: RecordId,
    #[serde(default)]
    pub student_name: Option<String>,
    pub visitor_name: String,
    #[serde(default)]
    pub relation: Option<String>,
    #[serde(default)]
    pub purpose: Option<String>,
    pub check_in: String,
    #[serde(default)]
    pub check_out: Option<String>,
}

impl HostelVisit {
    pub fn is_open(&self) -> bool {
        self.check_out.is_none()
    }
}

/// Parses RFC 3339 or a naive `YYYY-MM-DDTHH:MM[:SS]` timestamp as UTC.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let t = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(t) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(n) = NaiveDateTime::parse_from_str(t, fmt) {
            return Some(n.and_utc());
        }
    }
    None
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckInInput {
    #[serde(default)]
    pub student_id: Option<RecordId>,
    #[serde(default)]
    pub visitor_name: Option<String>,
    #[serde(default)]
    pub relation: Option<String>,
    #[serde(default)]
    pub purpose: Option<String>,
    #[serde(default)]
    pub check_in: Option<String>,
}

impl CheckInInput {
    pub fn validate(&self) -> Result<(), FieldErrors> {
        let check_in_ok = self
            .check_in
            .as_deref()
            .map(|s| parse_timestamp(s).is_some())
            .unwrap_or(true);
        Validator::new()
            .required(
                "student_id",
                "Student",
                self.student_id.as_ref().map(|s| s.as_str()),
            )
            .required("visitor_name", "Visitor name", self.visitor_name.as_deref())
            .check(check_in_ok, "check_in", "Check-in time is not valid")
            .finish()
    }
}

/// A visit can be checked out once, and not before it started.
pub fn validate_check_out(visit: &HostelVisit, check_out: &str) -> Result<(), FieldErrors> {
    let out = parse_timestamp(check_out);
    let ordered = match (parse_timestamp(&visit.check_in), out) {
        (Some(i), Some(o)) => o >= i,
        _ => true,
    };
    Validator::new()
        .check(visit.is_open(), "check_out", "Visitor has already checked out")
        .check(out.is_some(), "check_out", "Check-out time is not valid")
        .check(ordered, "check_out", "Check-out cannot be before check-in")
        .finish()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeeStatus {
    Pending,
    Partial,
    Paid,
    Waived,
}

impl FeeStatus {
    /// Status implied by amounts; a waived fee stays waived.
    pub fn from_amounts(current: FeeStatus, final_amount: f64, amount_paid: f64) -> FeeStatus {
        if current == FeeStatus::Waived {
            return FeeStatus::Waived;
        }
        if amount_paid <= 0.0 {
            FeeStatus::Pending
        } else if amount_paid + 0.005 < final_amount {
            FeeStatus::Partial
        } else {
            FeeStatus::Paid
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostelRentalFee {
    pub id: RecordId,
    pub student_id: RecordId,
    #[serde(default)]
    pub student_name: Option<String>,
    #[serde(default)]
    pub month: Option<String>,
    pub base_amount: f64,
    pub final_amount: f64,
    #[serde(default)]
    pub amount_paid: f64,
    pub status: FeeStatus,
}

impl HostelRentalFee {
    /// Re-derives `status` from the amounts, so a payment response carrying
    /// a stale status still lands in the right bucket.
    pub fn with_derived_status(mut self) -> Self {
        self.status = FeeStatus::from_amounts(self.status, self.final_amount, self.amount_paid);
        self
    }

    pub fn outstanding(&self) -> f64 {
        if self.status == FeeStatus::Waived {
            return 0.0;
        }
        round_money((self.final_amount - self.amount_paid).max(0.0))
    }

    pub fn validate_payment(&self, amount: Option<f64>) -> Result<(), FieldErrors> {
        let outstanding = self.outstanding();
        Validator::new()
            .check(self.status != FeeStatus::Waived, "amount", "This fee has been waived")
            .check(self.status != FeeStatus::Paid, "amount", "This fee is already paid")
            .required_number("amount", "Amount", amount)
            .positive("amount", "Amount", amount)
            .at_most("amount", "Amount", amount, outstanding)
            .finish()
    }

    pub fn validate_waive(&self) -> Result<(), FieldErrors> {
        Validator::new()
            .check(self.status != FeeStatus::Paid, "status", "A paid fee cannot be waived")
            .check(self.status != FeeStatus::Waived, "status", "This fee is already waived")
            .finish()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeTotals {
    pub billed: f64,
    pub collected: f64,
    pub outstanding: f64,
    pub waived_count: usize,
}

impl FeeTotals {
    pub fn from_fees(fees: &[HostelRentalFee]) -> Self {
        let mut t = Self::default();
        for f in fees {
            if f.status == FeeStatus::Waived {
                t.waived_count += 1;
                continue;
            }
            t.billed += f.final_amount;
            t.collected += f.amount_paid;
            t.outstanding += f.outstanding();
        }
        t.billed = round_money(t.billed);
        t.collected = round_money(t.collected);
        t.outstanding = round_money(t.outstanding);
        t
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fee(final_amount: f64, paid: f64, status: &str) -> HostelRentalFee {
        serde_json::from_value(json!({
            "id": 1, "student_id": 9, "base_amount": final_amount,
            "final_amount": final_amount, "amount_paid": paid, "status": status
        }))
        .expect("fee")
    }

    #[test]
    fn status_follows_amounts() {
        assert_eq!(FeeStatus::from_amounts(FeeStatus::Pending, 100.0, 0.0), FeeStatus::Pending);
        assert_eq!(FeeStatus::from_amounts(FeeStatus::Pending, 100.0, 40.0), FeeStatus::Partial);
        assert_eq!(FeeStatus::from_amounts(FeeStatus::Partial, 100.0, 100.0), FeeStatus::Paid);
        assert_eq!(FeeStatus::from_amounts(FeeStatus::Waived, 100.0, 0.0), FeeStatus::Waived);
    }

    #[test]
    fn payment_cannot_exceed_outstanding() {
        let f = fee(100.0, 60.0, "partial");
        assert_eq!(f.outstanding(), 40.0);
        assert!(f.validate_payment(Some(40.0)).is_ok());
        let errs = f.validate_payment(Some(40.5)).expect_err("too much");
        assert_eq!(errs.get("amount"), Some("Amount cannot exceed 40"));
        assert!(f.validate_payment(Some(0.0)).is_err());
    }

    #[test]
    fn paid_fee_cannot_be_waived() {
        assert!(fee(100.0, 100.0, "paid").validate_waive().is_err());
        assert!(fee(100.0, 0.0, "pending").validate_waive().is_ok());
    }

    #[test]
    fn check_out_rules() {
        let mut visit: HostelVisit = serde_json::from_value(json!({
            "id": 5, "student_id": 9, "visitor_name": "R. Khan",
            "check_in": "2025-03-01T10:00:00Z", "check_out": null
        }))
        .expect("visit");
        assert!(validate_check_out(&visit, "2025-03-01T12:00:00Z").is_ok());
        assert!(validate_check_out(&visit, "2025-03-01T09:00").is_err());
        visit.check_out = Some("2025-03-01T11:00:00Z".into());
        let errs = validate_check_out(&visit, "2025-03-01T12:00:00Z").expect_err("closed");
        assert_eq!(errs.get("check_out"), Some("Visitor has already checked out"));
    }

    #[test]
    fn totals_skip_waived_fees() {
        let t = FeeTotals::from_fees(&[
            fee(100.0, 100.0, "paid"),
            fee(80.0, 20.0, "partial"),
            fee(50.0, 0.0, "waived"),
        ]);
        assert_eq!(t.billed, 180.0);
        assert_eq!(t.collected, 120.0);
        assert_eq!(t.outstanding, 60.0);
        assert_eq!(t.waived_count, 1);
    }
}
