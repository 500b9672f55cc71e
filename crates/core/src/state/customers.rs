//! # Customers and Credits
//!
//! Every release order costs one credit. Customers get a free allowance once
//! at signup and buy more through a pricing plan. Each balance change writes a
//! ledger row with the resulting balance.

use anyhow::Context;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

use super::db::{lock, parse_ts, parse_ts_opt, PressroomDb};
use crate::error::{ReleaseError, ReleaseResult};
use crate::pricing;

/// A paying (or trialling) customer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    pub id: String,
    pub email: String,
    pub company_name: String,
    #[serde(default)]
    pub contact_name: Option<String>,
    /// Bearer token for the customer dashboard API
    #[serde(skip_serializing)]
    pub api_key: String,
    pub credits: i64,
    #[serde(default)]
    pub free_credit_granted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Why a balance changed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreditReason {
    FreeGrant,
    PlanPurchase,
    AdminAdjustment,
    ReleaseOrder,
    Refund,
}

impl CreditReason {
    fn as_str(&self) -> &'static str {
        match self {
            Self::FreeGrant => "free_grant",
            Self::PlanPurchase => "plan_purchase",
            Self::AdminAdjustment => "admin_adjustment",
            Self::ReleaseOrder => "release_order",
            Self::Refund => "refund",
        }
    }

    fn from_str(s: &str) -> Self {
        match s {
            "free_grant" => Self::FreeGrant,
            "plan_purchase" => Self::PlanPurchase,
            "release_order" => Self::ReleaseOrder,
            "refund" => Self::Refund,
            _ => Self::AdminAdjustment,
        }
    }
}

/// One row of the credit ledger
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditEntry {
    pub id: i64,
    pub customer_id: String,
    pub delta: i64,
    pub reason: CreditReason,
    #[serde(default)]
    pub plan: Option<String>,
    #[serde(default)]
    pub release_id: Option<String>,
    pub balance_after: i64,
    pub created_at: DateTime<Utc>,
}

/// Signup form
#[derive(Debug, Clone, Deserialize)]
pub struct NewCustomer {
    pub email: String,
    pub company_name: String,
    #[serde(default)]
    pub contact_name: Option<String>,
}

/// Manager for customers and their credit ledger
pub struct CustomerManager {
    conn: Arc<Mutex<Connection>>,
}

impl CustomerManager {
    pub fn new(db: &PressroomDb) -> Self {
        Self {
            conn: db.connection(),
        }
    }

    /// Create a customer and grant the free allowance
    pub fn signup(&self, form: NewCustomer, free_credits: i64) -> ReleaseResult<Customer> {
        let email = normalize_email(&form.email)?;
        let company_name = form.company_name.trim().to_string();
        if company_name.is_empty() {
            return Err(ReleaseError::Validation("company name is required".into()));
        }

        if self.find_by_email(&email)?.is_some() {
            return Err(ReleaseError::Validation(format!(
                "a customer with email {} already exists",
                email
            )));
        }

        let customer_id = {
            let conn = lock(&self.conn)?;
            let id = uuid::Uuid::new_v4().to_string();
            conn.execute(
                r#"
                INSERT INTO customers (id, email, company_name, contact_name, api_key, credits, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6)
                "#,
                params![
                    id,
                    email,
                    company_name,
                    form.contact_name.filter(|n| !n.trim().is_empty()),
                    generate_api_key(),
                    Utc::now().to_rfc3339(),
                ],
            )
            .context("Failed to create customer")?;
            id
        };

        tracing::info!(customer_id = %customer_id, "Customer signed up");
        self.grant_free_credits(&customer_id, free_credits)?;
        self.get(&customer_id)
    }

    pub fn get(&self, id: &str) -> ReleaseResult<Customer> {
        let conn = lock(&self.conn)?;
        load_customer(&conn, "id", id)?.ok_or_else(|| ReleaseError::not_found("customer", id))
    }

    pub fn find_by_api_key(&self, api_key: &str) -> ReleaseResult<Option<Customer>> {
        let conn = lock(&self.conn)?;
        load_customer(&conn, "api_key", api_key)
    }

    pub fn find_by_email(&self, email: &str) -> ReleaseResult<Option<Customer>> {
        let conn = lock(&self.conn)?;
        load_customer(&conn, "email", &email.trim().to_lowercase())
    }

    pub fn list(&self) -> ReleaseResult<Vec<Customer>> {
        let conn = lock(&self.conn)?;
        let mut stmt = conn.prepare(&format!("{} ORDER BY created_at DESC", CUSTOMER_SELECT))?;
        let customers = stmt
            .query_map([], row_to_customer)?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to list customers")?;
        Ok(customers)
    }

    /// Grant the free allowance. Returns `false` if it was already granted.
    pub fn grant_free_credits(&self, customer_id: &str, amount: i64) -> ReleaseResult<bool> {
        let mut conn = lock(&self.conn)?;
        let tx = conn.transaction()?;

        let granted_at = Utc::now().to_rfc3339();
        let claimed = tx.execute(
            "UPDATE customers SET free_credit_granted_at = ?1 WHERE id = ?2 AND free_credit_granted_at IS NULL",
            params![granted_at, customer_id],
        )?;
        if claimed == 0 {
            let exists: bool = tx
                .query_row(
                    "SELECT 1 FROM customers WHERE id = ?1",
                    params![customer_id],
                    |_| Ok(true),
                )
                .optional()?
                .unwrap_or(false);
            if !exists {
                return Err(ReleaseError::not_found("customer", customer_id));
            }
            tracing::debug!(customer_id, "Free credits already granted");
            return Ok(false);
        }

        if amount > 0 {
            adjust_credits(&tx, customer_id, amount, CreditReason::FreeGrant, None, None)?;
        }
        tx.commit()?;
        Ok(true)
    }

    /// Record a plan purchase; credits come from the pricing catalog
    pub fn purchase_plan(&self, customer_id: &str, plan_id: &str) -> ReleaseResult<Customer> {
        let plan = pricing::find_plan(plan_id)
            .ok_or_else(|| ReleaseError::Validation(format!("unknown plan '{}'", plan_id)))?;

        let mut conn = lock(&self.conn)?;
        let tx = conn.transaction()?;
        adjust_credits(
            &tx,
            customer_id,
            plan.credits,
            CreditReason::PlanPurchase,
            Some(plan.id),
            None,
        )?;
        tx.commit()?;
        drop(conn);

        tracing::info!(customer_id, plan = plan.id, credits = plan.credits, "Plan purchased");
        self.get(customer_id)
    }

    /// Manual correction by an admin; may be negative but never below zero
    pub fn adjust(&self, customer_id: &str, delta: i64) -> ReleaseResult<Customer> {
        if delta == 0 {
            return Err(ReleaseError::Validation("credit adjustment must be non-zero".into()));
        }
        let mut conn = lock(&self.conn)?;
        let tx = conn.transaction()?;
        adjust_credits(&tx, customer_id, delta, CreditReason::AdminAdjustment, None, None)?;
        tx.commit()?;
        drop(conn);
        self.get(customer_id)
    }

    /// Ledger rows, newest first
    pub fn ledger(&self, customer_id: &str) -> ReleaseResult<Vec<CreditEntry>> {
        let conn = lock(&self.conn)?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, customer_id, delta, reason, plan, release_id, balance_after, created_at
            FROM credit_ledger
            WHERE customer_id = ?1
            ORDER BY id DESC
            "#,
        )?;
        let entries = stmt
            .query_map(params![customer_id], |row| {
                let reason: String = row.get(3)?;
                let created_at: String = row.get(7)?;
                Ok(CreditEntry {
                    id: row.get(0)?,
                    customer_id: row.get(1)?,
                    delta: row.get(2)?,
                    reason: CreditReason::from_str(&reason),
                    plan: row.get(4)?,
                    release_id: row.get(5)?,
                    balance_after: row.get(6)?,
                    created_at: parse_ts(&created_at),
                })
            })?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to read credit ledger")?;
        Ok(entries)
    }
}

/// Change a balance inside an open transaction and write the ledger row.
///
/// Fails with `InsufficientCredits` rather than letting the balance go negative.
pub(crate) fn adjust_credits(
    conn: &Connection,
    customer_id: &str,
    delta: i64,
    reason: CreditReason,
    plan: Option<&str>,
    release_id: Option<&str>,
) -> ReleaseResult<i64> {
    let balance: i64 = conn
        .query_row(
            "SELECT credits FROM customers WHERE id = ?1",
            params![customer_id],
            |row| row.get(0),
        )
        .optional()?
        .ok_or_else(|| ReleaseError::not_found("customer", customer_id))?;

    let new_balance = balance + delta;
    if new_balance < 0 {
        return Err(ReleaseError::InsufficientCredits {
            customer_id: customer_id.to_string(),
        });
    }

    conn.execute(
        "UPDATE customers SET credits = ?1 WHERE id = ?2",
        params![new_balance, customer_id],
    )?;
    conn.execute(
        r#"
        INSERT INTO credit_ledger (customer_id, delta, reason, plan, release_id, balance_after, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
        params![
            customer_id,
            delta,
            reason.as_str(),
            plan,
            release_id,
            new_balance,
            Utc::now().to_rfc3339(),
        ],
    )?;

    tracing::debug!(customer_id, delta, balance = new_balance, reason = reason.as_str(), "Credits adjusted");
    Ok(new_balance)
}

const CUSTOMER_SELECT: &str = r#"
    SELECT id, email, company_name, contact_name, api_key, credits, free_credit_granted_at, created_at
    FROM customers
"#;

fn load_customer(conn: &Connection, column: &str, value: &str) -> ReleaseResult<Option<Customer>> {
    let sql = format!("{} WHERE {} = ?1", CUSTOMER_SELECT, column);
    Ok(conn
        .query_row(&sql, params![value], row_to_customer)
        .optional()?)
}

fn row_to_customer(row: &rusqlite::Row) -> rusqlite::Result<Customer> {
    let created_at: String = row.get(7)?;
    Ok(Customer {
        id: row.get(0)?,
        email: row.get(1)?,
        company_name: row.get(2)?,
        contact_name: row.get(3)?,
        api_key: row.get(4)?,
        credits: row.get(5)?,
        free_credit_granted_at: parse_ts_opt(row.get(6)?),
        created_at: parse_ts(&created_at),
    })
}

fn generate_api_key() -> String {
    format!("pr_{}", uuid::Uuid::new_v4().simple())
}

/// Lowercased, trimmed email with a minimal shape check
pub(crate) fn normalize_email(email: &str) -> ReleaseResult<String> {
    let email = email.trim().to_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.contains(char::is_whitespace)
        }
        None => false,
    };
    if valid {
        Ok(email)
    } else {
        Err(ReleaseError::Validation(format!("invalid email address '{}'", email)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> CustomerManager {
        CustomerManager::new(&PressroomDb::open_in_memory().unwrap())
    }

    fn form(email: &str) -> NewCustomer {
        NewCustomer {
            email: email.to_string(),
            company_name: "Acme Corp".to_string(),
            contact_name: None,
        }
    }

    #[test]
    fn test_signup_grants_free_credits_once() {
        let customers = manager();
        let customer = customers.signup(form("Ops@Acme.com "), 1).unwrap();
        assert_eq!(customer.email, "ops@acme.com");
        assert_eq!(customer.credits, 1);
        assert!(customer.free_credit_granted_at.is_some());
        assert!(customer.api_key.starts_with("pr_"));

        assert!(!customers.grant_free_credits(&customer.id, 1).unwrap());
        assert_eq!(customers.get(&customer.id).unwrap().credits, 1);
        assert_eq!(customers.ledger(&customer.id).unwrap().len(), 1);
    }

    #[test]
    fn test_duplicate_email_rejected() {
        let customers = manager();
        customers.signup(form("a@acme.com"), 1).unwrap();
        let err = customers.signup(form("A@acme.com"), 1).unwrap_err();
        assert!(matches!(err, ReleaseError::Validation(_)));
    }

    #[test]
    fn test_invalid_email_rejected() {
        for bad in ["", "no-at-sign", "@acme.com", "a@acme", "a b@acme.com"] {
            assert!(normalize_email(bad).is_err(), "{} accepted", bad);
        }
    }

    #[test]
    fn test_purchase_plan_adds_catalog_credits() {
        let customers = manager();
        let customer = customers.signup(form("buyer@acme.com"), 0).unwrap();
        let plan = pricing::find_plan("growth").unwrap();

        let updated = customers.purchase_plan(&customer.id, "growth").unwrap();
        assert_eq!(updated.credits, plan.credits);

        let ledger = customers.ledger(&customer.id).unwrap();
        assert_eq!(ledger[0].reason, CreditReason::PlanPurchase);
        assert_eq!(ledger[0].plan.as_deref(), Some("growth"));
        assert_eq!(ledger[0].balance_after, plan.credits);

        assert!(customers.purchase_plan(&customer.id, "platinum").is_err());
    }

    #[test]
    fn test_adjust_never_goes_negative() {
        let customers = manager();
        let customer = customers.signup(form("neg@acme.com"), 1).unwrap();
        let err = customers.adjust(&customer.id, -2).unwrap_err();
        assert!(matches!(err, ReleaseError::InsufficientCredits { .. }));
        assert_eq!(customers.adjust(&customer.id, -1).unwrap().credits, 0);
    }

    #[test]
    fn test_lookup_by_api_key() {
        let customers = manager();
        let customer = customers.signup(form("key@acme.com"), 1).unwrap();
        let found = customers.find_by_api_key(&customer.api_key).unwrap().unwrap();
        assert_eq!(found.id, customer.id);
        assert!(customers.find_by_api_key("pr_wrong").unwrap().is_none());
        assert!(matches!(
            customers.get("missing"),
            Err(ReleaseError::NotFound { .. })
        ));
    }
}
