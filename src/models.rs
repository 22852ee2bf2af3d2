// Copyright (c) 2025 Billfold Contributors.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub user_id: String,
    pub date: DateTime<Utc>,
    pub amount: Decimal,
    pub kind: String,
    pub description: String,
    pub category_id: Option<i64>,
    pub payment_method_id: Option<i64>,
    pub group_id: Option<String>,
    pub card_id: Option<i64>,
    pub is_card_payment: bool,
    pub is_paid: bool,
    pub is_summary_payment: bool,
    pub savings_fund_id: Option<i64>,
    pub billing_cycle_id: Option<i64>,
}

/// A user-defined accounting period. `end_date` absent means the cycle is
/// still open.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillingCycle {
    pub id: i64,
    pub user_id: String,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
}

impl BillingCycle {
    pub fn is_open(&self) -> bool {
        self.end_date.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentMethod {
    pub id: i64,
    pub user_id: String,
    pub name: String,
    pub kind: String,
    pub closing_day: Option<u32>,
    pub enabled: bool,
}

impl PaymentMethod {
    pub fn is_credit_card(&self) -> bool {
        self.kind == "credit_card"
    }
}

/// One occurrence of a recurring charge. `month` (0-11) and `year` are the
/// period key; legacy rows carry neither until the reconciler fills them in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tax {
    pub id: i64,
    pub user_id: String,
    pub name: String,
    pub date: DateTime<Utc>,
    pub amount: Decimal,
    pub month: Option<u32>,
    pub year: Option<i32>,
    pub is_paid: bool,
}

/// Unpaid charges attributable to one card's current statement window.
#[derive(Debug, Clone, Serialize)]
pub struct CardSummary {
    pub card_id: i64,
    pub card_name: String,
    pub total: Decimal,
    pub charge_count: usize,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PaidSummary {
    pub id: i64,
    pub date: DateTime<Utc>,
    pub amount: Decimal,
    pub description: String,
}

/// One installment group, re-aggregated from its member transactions.
#[derive(Debug, Clone, Serialize)]
pub struct InstallmentGroup {
    pub group_id: String,
    pub description: String,
    pub per_installment: Decimal,
    pub installment_count: usize,
    pub current_index: usize,
    pub pending_amount: Decimal,
    pub first_date: NaiveDate,
    pub last_date: NaiveDate,
    pub completed: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct InstallmentDetails {
    pub pending: Vec<InstallmentGroup>,
    pub completed: Vec<InstallmentGroup>,
}

/// One calendar month's installment load in the rolling projection.
#[derive(Debug, Clone, Serialize)]
pub struct MonthBucket {
    pub year: i32,
    pub month: u32,
    pub total: Decimal,
}
