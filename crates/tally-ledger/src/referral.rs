//! Referral reward application.
//!
//! All five checks and both wallet mutations run inside one pair-locked,
//! atomically committed operation; any rejection aborts without side
//! effects.

use chrono::{NaiveTime, Utc};
use serde::Serialize;

use tally_core::{
    CreditRecord, Referral, ReferralStatus, UserId, REFERRAL_IP_DAILY_LIMIT,
    REFERRAL_MONTHLY_CREDIT_CAP, REFERRED_REWARD_CREDITS, REFERRER_REWARD_CREDITS,
};
use tally_store::{LedgerCommit, Store};

use crate::engine::{BalanceSnapshot, LedgerEngine};
use crate::error::{LedgerError, Result};
use crate::locks::acquire;

/// Request context for anti-fraud checks.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Client IP of the redeeming request.
    pub ip_address: String,

    /// User agent of the redeeming request, if present.
    pub user_agent: Option<String>,
}

/// Result of a successful referral application.
#[derive(Debug, Clone, Serialize)]
pub struct ReferralOutcome {
    /// Credits granted to the referrer.
    pub referrer_awarded: i64,

    /// Credits granted to the referred user.
    pub referred_awarded: i64,

    /// The referred user's balance after the reward.
    pub balance: BalanceSnapshot,
}

impl<S: Store> LedgerEngine<S> {
    /// Apply a referral: reward both the referrer and the referred user.
    ///
    /// Checks, in order:
    /// 1. the referred user is not the referrer (`SELF_REFERRAL`)
    /// 2. the referred user has never been referred (`ALREADY_APPLIED`)
    /// 3. the referrer is under the monthly credit cap (`MONTHLY_LIMIT`)
    /// 4. the requesting IP is under the daily completion cap
    ///    (`IP_LIMIT`)
    ///
    /// # Errors
    ///
    /// One of the typed rejections above, [`LedgerError::UserNotFound`]
    /// for either party, or [`LedgerError::Storage`] on storage failure.
    pub fn apply_referral_code(
        &self,
        referred_id: UserId,
        referrer_id: UserId,
        ctx: &RequestContext,
    ) -> Result<ReferralOutcome> {
        if referred_id == referrer_id {
            return Err(LedgerError::SelfReferral);
        }

        let (first, second) = self.locks.pair(referred_id, referrer_id);
        let _guard_first = acquire(&first);
        let _guard_second = acquire(&second);
        let now = Utc::now();

        let mut referred = self
            .store()
            .get_wallet(&referred_id)?
            .ok_or(LedgerError::UserNotFound {
                user_id: referred_id,
            })?;
        let mut referrer = self
            .store()
            .get_wallet(&referrer_id)?
            .ok_or(LedgerError::UserNotFound {
                user_id: referrer_id,
            })?;

        if self.store().get_referral_by_referred(&referred_id)?.is_some() {
            return Err(LedgerError::ReferralAlreadyApplied {
                user_id: referred_id.to_string(),
            });
        }

        referrer.rollover_referral_month(now);
        if referrer.referral_month_credits >= REFERRAL_MONTHLY_CREDIT_CAP {
            return Err(LedgerError::ReferralMonthlyLimit);
        }

        let day_start = now.date_naive().and_time(NaiveTime::MIN).and_utc();
        let completions_today = self
            .store()
            .count_referrals_from_ip_since(&ctx.ip_address, day_start)?;
        if completions_today >= REFERRAL_IP_DAILY_LIMIT {
            tracing::warn!(
                ip = %ctx.ip_address,
                completions_today,
                "referral rejected by IP daily limit"
            );
            return Err(LedgerError::ReferralIpLimit);
        }

        referred.apply_daily_reset(now);
        referrer.apply_daily_reset(now);

        let referrer_before = referrer.total_available();
        referrer.bonus_credits += REFERRER_REWARD_CREDITS;
        referrer.referral_month_credits += REFERRER_REWARD_CREDITS;
        referrer.lifetime_referral_credits += REFERRER_REWARD_CREDITS;
        referrer.referral_count += 1;
        referrer.touch(now);

        let referred_before = referred.total_available();
        referred.bonus_credits += REFERRED_REWARD_CREDITS;
        referred.touch(now);

        let referral = Referral {
            referrer_id,
            referred_id,
            referrer_credits: REFERRER_REWARD_CREDITS,
            referred_credits: REFERRED_REWARD_CREDITS,
            ip_address: ctx.ip_address.clone(),
            user_agent: ctx.user_agent.clone(),
            status: ReferralStatus::Completed,
            created_at: now,
        };

        let commit = LedgerCommit {
            wallets: vec![referrer.clone(), referred.clone()],
            records: vec![
                CreditRecord::referral_inviter(
                    referrer_id,
                    REFERRER_REWARD_CREDITS,
                    referrer_before,
                    referred_id,
                ),
                CreditRecord::referral_invitee(
                    referred_id,
                    REFERRED_REWARD_CREDITS,
                    referred_before,
                    referrer_id,
                ),
            ],
            order: None,
            referral: Some(referral),
        };

        self.store().commit(commit)?;

        tracing::info!(
            referrer = %referrer_id,
            referred = %referred_id,
            referrer_awarded = REFERRER_REWARD_CREDITS,
            referred_awarded = REFERRED_REWARD_CREDITS,
            "referral applied"
        );

        Ok(ReferralOutcome {
            referrer_awarded: REFERRER_REWARD_CREDITS,
            referred_awarded: REFERRED_REWARD_CREDITS,
            balance: Self::snapshot(&referred, now),
        })
    }
}
