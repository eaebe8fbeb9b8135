use serde::{Deserialize, Serialize};

use super::{round_money, RecordId};
use crate::validate::{FieldErrors, Validator};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Paid,
    Unpaid,
    Overdue,
    Pending,
}

impl PaymentStatus {
    pub const ALL: [PaymentStatus; 4] = [Self::Paid, Self::Unpaid, Self::Overdue, Self::Pending];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Paid => "paid",
            Self::Unpaid => "unpaid",
            Self::Overdue => "overdue",
            Self::Pending => "pending",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Paid => "Paid",
            Self::Unpaid => "Unpaid",
            Self::Overdue => "Overdue",
            Self::Pending => "Pending",
        }
    }

    /// The only transition the client can request is `* -> paid`.
    pub fn can_mark_paid(self) -> bool {
        !matches!(self, Self::Paid)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BillingCycle {
    Monthly,
    Quarterly,
    Yearly,
}

impl BillingCycle {
    pub fn label(self) -> &'static str {
        match self {
            Self::Monthly => "Monthly",
            Self::Quarterly => "Quarterly",
            Self::Yearly => "Yearly",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillingPlan {
    pub id: RecordId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub monthly_price: f64,
    #[serde(default)]
    pub quarterly_price: Option<f64>,
    #[serde(default)]
    pub yearly_price: Option<f64>,
    #[serde(default)]
    pub max_students: Option<i64>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub created_at: Option<String>,
}

fn default_true() -> bool {
    true
}

impl BillingPlan {
    /// Price for a cycle; cycles without an explicit price are billed as the
    /// equivalent number of months.
    pub fn price_for(&self, cycle: BillingCycle) -> f64 {
        match cycle {
            BillingCycle::Monthly => self.monthly_price,
            BillingCycle::Quarterly => self
                .quarterly_price
                .unwrap_or_else(|| round_money(self.monthly_price * 3.0)),
            BillingCycle::Yearly => self
                .yearly_price
                .unwrap_or_else(|| round_money(self.monthly_price * 12.0)),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BillingPlanInput {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub monthly_price: Option<f64>,
    #[serde(default)]
    pub quarterly_price: Option<f64>,
    #[serde(default)]
    pub yearly_price: Option<f64>,
    #[serde(default)]
    pub max_students: Option<i64>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

impl BillingPlanInput {
    pub fn validate(&self) -> Result<(), FieldErrors> {
        Validator::new()
            .required("name", "Plan name", self.name.as_deref())
            .required_number("monthly_price", "Monthly price", self.monthly_price)
            .non_negative("monthly_price", "Monthly price", self.monthly_price)
            .non_negative("quarterly_price", "Quarterly price", self.quarterly_price)
            .non_negative("yearly_price", "Yearly price", self.yearly_price)
            .positive("max_students", "Max students", self.max_students.map(|n| n as f64))
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillingRecord {
    pub id: RecordId,
    pub school_id: RecordId,
    #[serde(default)]
    pub school_name: Option<String>,
    pub invoice_number: String,
    #[serde(default)]
    pub subscription_plan: Option<String>,
    pub billing_cycle: BillingCycle,
    pub amount: f64,
    pub due_date: String,
    pub payment_status: PaymentStatus,
    #[serde(default)]
    pub payment_date: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusTotal {
    pub count: usize,
    pub amount: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BillingSummary {
    pub record_count: usize,
    pub total_billed: f64,
    pub total_collected: f64,
    pub total_outstanding: f64,
    /// Percentage of billed amount collected, 1 decimal.
    pub collection_rate: f64,
    pub paid: StatusTotal,
    pub unpaid: StatusTotal,
    pub overdue: StatusTotal,
    pub pending: StatusTotal,
}

impl BillingSummary {
    pub fn from_records(records: &[BillingRecord]) -> Self {
        let mut s = Self::default();
        for r in records {
            s.record_count += 1;
            s.total_billed += r.amount;
            let bucket = match r.payment_status {
                PaymentStatus::Paid => {
                    s.total_collected += r.amount;
                    &mut s.paid
                }
                PaymentStatus::Unpaid => &mut s.unpaid,
                PaymentStatus::Overdue => &mut s.overdue,
                PaymentStatus::Pending => &mut s.pending,
            };
            bucket.count += 1;
            bucket.amount += r.amount;
        }
        s.total_billed = round_money(s.total_billed);
        s.total_collected = round_money(s.total_collected);
        s.total_outstanding = round_money(s.total_billed - s.total_collected);
        for b in [&mut s.paid, &mut s.unpaid, &mut s.overdue, &mut s.pending] {
            b.amount = round_money(b.amount);
        }
        s.collection_rate = if s.total_billed > 0.0 {
            super::round_off_1_decimal(100.0 * s.total_collected / s.total_billed)
        } else {
            0.0
        };
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(id: i64, amount: f64, status: &str) -> BillingRecord {
        serde_json::from_value(json!({
            "id": id,
            "school_id": "sch-1",
            "school_name": "Maple High",
            "invoice_number": format!("INV-{id:04}"),
            "billing_cycle": "monthly",
            "amount": amount,
            "due_date": "2025-05-01",
            "payment_status": status
        }))
        .expect("record")
    }

    #[test]
    fn only_unsettled_records_can_be_marked_paid() {
        assert!(!PaymentStatus::Paid.can_mark_paid());
        for s in [PaymentStatus::Unpaid, PaymentStatus::Overdue, PaymentStatus::Pending] {
            assert!(s.can_mark_paid());
        }
    }

    #[test]
    fn unknown_status_is_rejected_at_the_boundary() {
        let res: Result<BillingRecord, _> = serde_json::from_value(json!({
            "id": 1, "school_id": 1, "invoice_number": "X", "billing_cycle": "monthly",
            "amount": 1.0, "due_date": "2025-01-01", "payment_status": "refunded"
        }));
        assert!(res.is_err());
    }

    #[test]
    fn summary_is_derived_from_rows() {
        let rows = vec![
            record(1, 100.0, "paid"),
            record(2, 50.0, "overdue"),
            record(3, 50.0, "unpaid"),
        ];
        let s = BillingSummary::from_records(&rows);
        assert_eq!(s.record_count, 3);
        assert_eq!(s.total_billed, 200.0);
        assert_eq!(s.total_collected, 100.0);
        assert_eq!(s.total_outstanding, 100.0);
        assert_eq!(s.collection_rate, 50.0);
        assert_eq!(s.overdue, StatusTotal { count: 1, amount: 50.0 });
        assert_eq!(s.pending.count, 0);
    }

    #[test]
    fn plan_prices_fall_back_to_monthly_multiples() {
        let plan: BillingPlan = serde_json::from_value(json!({
            "id": 2, "name": "Pro", "monthly_price": 150, "yearly_price": 1500
        }))
        .expect("plan");
        assert!(plan.is_active);
        assert_eq!(plan.price_for(BillingCycle::Quarterly), 450.0);
        assert_eq!(plan.price_for(BillingCycle::Yearly), 1500.0);
    }

    #[test]
    fn plan_input_validation() {
        let input = BillingPlanInput {
            name: Some("Basic".into()),
            monthly_price: Some(-5.0),
            max_students: Some(0),
            ..Default::default()
        };
        let errs = input.validate().expect_err("invalid");
        assert_eq!(errs.get("monthly_price"), Some("Monthly price cannot be negative"));
        assert_eq!(errs.get("max_students"), Some("Max students must be greater than 0"));
    }
}
