//! Membership lifecycle hooks
//!
//! Billing owns the subscription; it calls into this module when a payment clears or a
//! subscription ends. Only the member status and the monthly point grant live here.

use crate::{
    actor::StoreHandle,
    ledger::Ledger,
    types::{AccountBalance, Member, MembershipStatus, Points, UserId},
    Error, Result,
};

/// Points granted per billing period
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionGrant {
    /// Regular monthly allowance
    pub points_per_month: Points,
    /// Plan bonus on top of the allowance
    pub bonus_points: Points,
}

impl SubscriptionGrant {
    /// Total points credited for one period
    pub fn total(&self) -> Result<Points> {
        self.points_per_month
            .checked_add(self.bonus_points)
            .ok_or_else(|| Error::InvalidAmount("subscription grant overflows".to_string()))
    }

    fn description(&self) -> String {
        if self.bonus_points > 0 {
            format!(
                "Monthly subscription: {} points + {} bonus",
                group_thousands(self.points_per_month),
                group_thousands(self.bonus_points)
            )
        } else {
            format!(
                "Monthly subscription: {} points",
                group_thousands(self.points_per_month)
            )
        }
    }
}

/// `6500000` -> `6,500,000`
fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    grouped
}

/// Membership service
#[derive(Clone)]
pub struct MembershipService {
    store: StoreHandle,
    ledger: Ledger,
}

impl MembershipService {
    /// Create service
    pub fn new(store: StoreHandle, ledger: Ledger) -> Self {
        Self { store, ledger }
    }

    /// New user: zero balance and `GUEST` status
    pub async fn enroll(&self, user_id: &UserId) -> Result<Member> {
        self.ledger.open_account(user_id).await?;
        let member = self
            .store
            .set_member_status(user_id.clone(), MembershipStatus::Guest)
            .await?;
        tracing::info!(user_id = %user_id, "Member enrolled");
        Ok(member)
    }

    /// Subscription became active
    pub async fn activate_membership(&self, user_id: &UserId) -> Result<Member> {
        self.transition(user_id, MembershipStatus::ActiveMember).await
    }

    /// Subscription cancelled or lapsed. The balance is kept.
    pub async fn deactivate_membership(&self, user_id: &UserId) -> Result<Member> {
        self.transition(user_id, MembershipStatus::Guest).await
    }

    async fn transition(&self, user_id: &UserId, status: MembershipStatus) -> Result<Member> {
        let previous = self.status(user_id)?;
        let member = self
            .store
            .set_member_status(user_id.clone(), status)
            .await?;
        tracing::info!(
            user_id = %user_id,
            from = ?previous,
            to = ?status,
            "Membership status changed"
        );
        Ok(member)
    }

    /// Stored status, `None` for users never enrolled
    pub fn status(&self, user_id: &UserId) -> Result<Option<MembershipStatus>> {
        Ok(self
            .store
            .reader()
            .member(user_id)?
            .map(|member| member.status))
    }

    /// A subscription payment cleared: activate the member and credit the period's points.
    ///
    /// The credit references the subscription so a period's grant can be traced back to billing.
    pub async fn record_subscription_payment(
        &self,
        user_id: &UserId,
        grant: SubscriptionGrant,
        subscription_id: &str,
    ) -> Result<AccountBalance> {
        let total = grant.total()?;
        if total == 0 {
            return Err(Error::InvalidAmount("subscription grant is empty".to_string()));
        }
        self.activate_membership(user_id).await?;

        let account = self
            .ledger
            .credit(
                user_id,
                total,
                &grant.description(),
                Some(subscription_id.to_string()),
            )
            .await?;

        tracing::info!(
            user_id = %user_id,
            subscription_id,
            amount = total,
            balance = account.balance,
            "Subscription points credited"
        );
        Ok(account)
    }
}
