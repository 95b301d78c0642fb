//! Per-actor reward-point ledger.
//!
//! Accounts are sharded in a `DashMap`; a credit or debit mutates the account
//! under its entry lock, so the balance check and the write are one atomic
//! step with respect to concurrent debits on the same actor. Entries are
//! append-only and carry the resulting balance for audit.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::debug;

use crate::errors::{EngineError, Result};
use crate::policy::EnginePolicy;
use crate::types::{ActorId, LedgerEntry, LedgerReason};

#[derive(Debug, Default)]
struct Account {
    balance: i64,
    entries: Vec<LedgerEntry>,
}

pub struct Ledger {
    accounts: DashMap<ActorId, Account>,
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}

impl Ledger {
    pub fn new() -> Self {
        Self {
            accounts: DashMap::new(),
        }
    }

    /// Add `amount` points to the actor's balance. Creates the account on
    /// first touch.
    pub fn credit(
        &self,
        actor_id: ActorId,
        amount: i64,
        reason: LedgerReason,
        now: DateTime<Utc>,
    ) -> Result<LedgerEntry> {
        if amount <= 0 {
            return Err(EngineError::Validation(format!(
                "credit amount must be positive, got {amount}"
            )));
        }
        let mut account = self.accounts.entry(actor_id).or_default();
        account.balance += amount;
        let entry = LedgerEntry {
            actor_id,
            delta: amount,
            reason,
            balance_after: account.balance,
            at: now,
        };
        account.entries.push(entry.clone());
        debug!(actor_id, amount, balance = account.balance, "ledger credit");
        Ok(entry)
    }

    /// Remove `amount` points. Fails with [`EngineError::InsufficientBalance`]
    /// and leaves the balance untouched if the actor holds fewer points; the
    /// balance never goes negative.
    pub fn debit(
        &self,
        actor_id: ActorId,
        amount: i64,
        reason: LedgerReason,
        now: DateTime<Utc>,
    ) -> Result<LedgerEntry> {
        if amount <= 0 {
            return Err(EngineError::Validation(format!(
                "debit amount must be positive, got {amount}"
            )));
        }
        let mut account = self.accounts.entry(actor_id).or_default();
        if amount > account.balance {
            return Err(EngineError::InsufficientBalance {
                balance: account.balance,
                requested: amount,
            });
        }
        account.balance -= amount;
        let entry = LedgerEntry {
            actor_id,
            delta: -amount,
            reason,
            balance_after: account.balance,
            at: now,
        };
        account.entries.push(entry.clone());
        debug!(actor_id, amount, balance = account.balance, "ledger debit");
        Ok(entry)
    }

    /// Spend `points` for a marketplace discount.
    ///
    /// Debits first; the discount percent is only computed once the debit
    /// succeeds. The formula is `floor(points / step) * step_percent`, capped
    /// at 100 — with the defaults, 100 points ⇒ 10%.
    pub fn redeem(
        &self,
        actor_id: ActorId,
        points: i64,
        policy: &EnginePolicy,
        now: DateTime<Utc>,
    ) -> Result<u32> {
        self.debit(actor_id, points, LedgerReason::Redemption, now)?;
        let steps = points / policy.points_per_discount_step;
        let percent = (steps as u32).saturating_mul(policy.discount_step_percent);
        Ok(percent.min(100))
    }

    /// Current balance; 0 for actors the ledger has never seen.
    pub fn balance(&self, actor_id: ActorId) -> i64 {
        self.accounts
            .get(&actor_id)
            .map(|account| account.balance)
            .unwrap_or(0)
    }

    /// The actor's full entry history, oldest first.
    pub fn entries(&self, actor_id: ActorId) -> Vec<LedgerEntry> {
        self.accounts
            .get(&actor_id)
            .map(|account| account.entries.clone())
            .unwrap_or_default()
    }
}
