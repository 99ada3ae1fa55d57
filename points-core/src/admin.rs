//! Admin point adjustments
//!
//! Manual corrections outside the redemption flow. The ledger entry and its audit record
//! are committed in one write, so the audit log never misses an adjustment and never
//! records one that did not happen.

use crate::{
    actor::StoreHandle,
    config::HistoryConfig,
    ledger::Ledger,
    types::{
        AdminAction, AdminActionKind, AdminTarget, AuthContext, LedgerEntry, Points, Posting,
        UserId,
    },
    Error, Result,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Adjustment request body as received
#[derive(Debug, Deserialize)]
struct RawAdjustPointsRequest {
    user_id: Option<String>,
    amount: Option<i64>,
    reason: Option<String>,
}

/// Validated adjustment request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdjustPointsRequest {
    /// Account to adjust
    pub target_user_id: UserId,
    /// Signed amount, never zero
    pub amount: i64,
    /// Operator-supplied reason, never blank
    pub reason: String,
}

impl AdjustPointsRequest {
    /// Validate the fields of an adjustment
    pub fn new(target_user_id: UserId, amount: i64, reason: impl Into<String>) -> Result<Self> {
        let reason: String = reason.into();
        let reason = reason.trim().to_string();
        if target_user_id.as_str().trim().is_empty() {
            return Err(Error::InvalidInput("user_id is required".to_string()));
        }
        if amount == 0 {
            return Err(Error::InvalidAmount("adjustment must be non-zero".to_string()));
        }
        if reason.is_empty() {
            return Err(Error::InvalidInput("reason is required".to_string()));
        }
        Ok(Self {
            target_user_id,
            amount,
            reason,
        })
    }

    /// Parse and validate a JSON body `{"user_id", "amount", "reason"}`
    pub fn from_json(body: &str) -> Result<Self> {
        let raw: RawAdjustPointsRequest = serde_json::from_str(body)
            .map_err(|e| Error::InvalidInput(format!("Malformed request body: {}", e)))?;

        match (raw.user_id, raw.amount, raw.reason) {
            (Some(user_id), Some(amount), Some(reason)) => {
                Self::new(UserId::new(user_id), amount, reason)
            }
            _ => Err(Error::InvalidInput(
                "Missing required fields: user_id, amount, reason".to_string(),
            )),
        }
    }
}

/// Result of an adjustment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustPointsResponse {
    /// Balance after the adjustment
    pub new_balance: Points,
}

/// Admin adjustment service
#[derive(Clone)]
pub struct AdminService {
    ledger: Ledger,
    store: StoreHandle,
    history: HistoryConfig,
}

impl AdminService {
    /// Create service
    pub fn new(ledger: Ledger, store: StoreHandle, history: HistoryConfig) -> Self {
        Self {
            ledger,
            store,
            history,
        }
    }

    /// Apply a signed adjustment and write its audit record.
    ///
    /// A negative amount larger than the balance fails with `InsufficientFunds`.
    pub async fn adjust(
        &self,
        admin: &AuthContext,
        request: AdjustPointsRequest,
    ) -> Result<AdjustPointsResponse> {
        admin.require_admin()?;

        let AdjustPointsRequest {
            target_user_id,
            amount,
            reason,
        } = request;

        let entry = LedgerEntry::adjusted(
            target_user_id.clone(),
            amount,
            format!("Admin adjustment: {}", reason),
            Some(admin.user_id.to_string()),
        );
        let audit = AdminAction {
            id: Uuid::now_v7(),
            admin_id: admin.user_id.clone(),
            action: AdminActionKind::AdjustPoints,
            target: AdminTarget::User(target_user_id.clone()),
            amount,
            reason,
            resulting_balance: 0,
            created_at: Utc::now(),
        };

        let account = self
            .ledger
            .post(Posting {
                entry,
                audit: Some(audit),
            })
            .await?;

        tracing::info!(
            admin_id = %admin.user_id,
            user_id = %target_user_id,
            amount,
            balance = account.balance,
            "Points adjusted by admin"
        );

        Ok(AdjustPointsResponse {
            new_balance: account.balance,
        })
    }

    /// Audit log, newest first
    pub fn recent_actions(
        &self,
        admin: &AuthContext,
        limit: Option<usize>,
    ) -> Result<Vec<AdminAction>> {
        admin.require_admin()?;
        self.store
            .reader()
            .admin_actions(self.history.resolve(limit))
    }
}
