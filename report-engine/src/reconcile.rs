//! Balance reconciliation
//!
//! For every account over a reporting period the identity
//! `beginning + net_change == ending` must hold, where the beginning and
//! ending balances come from trial balance snapshots and the net change from
//! general ledger activity. A mismatch flags the account, it never fails
//! the report.
//!
//! Profit-and-loss accounts reset at fiscal year start: in fiscal period 1
//! their beginning balance is forced to zero before the check. Both the
//! totals block and the check flag go through [`effective_beginning`], so
//! the two can never disagree.

use chrono::NaiveDate;
use report_core::{period, types::TrialBalanceRow, Storage};
use rust_decimal::Decimal;

use crate::error::Result;

/// Financial report class marking profit-and-loss accounts
pub const PROFIT_AND_LOSS: &str = "PL";

/// Outcome of one account's reconciliation
#[derive(Debug, Clone, PartialEq)]
pub struct BalanceCheck {
    /// Beginning balance after any fiscal-year reset
    pub beginning: Decimal,
    /// Net change from ledger activity (debits minus credits)
    pub net_change: Decimal,
    /// Ending balance from the trial balance
    pub ending: Decimal,
    /// Whether `beginning + net_change == ending` held exactly
    pub balanced: bool,
}

/// Beginning balance with the fiscal-year reset applied.
///
/// PL accounts restart from zero in fiscal period 1; balance-sheet accounts
/// always carry forward.
pub fn effective_beginning(
    beginning: Decimal,
    financial_report: Option<&str>,
    fiscal_period: Option<u32>,
) -> Decimal {
    let is_pl = financial_report
        .map(|fr| fr.trim().eq_ignore_ascii_case(PROFIT_AND_LOSS))
        .unwrap_or(false);
    if is_pl && fiscal_period == Some(1) {
        Decimal::ZERO
    } else {
        beginning
    }
}

/// Run the reconciliation identity for one account.
pub fn check(
    beginning: Decimal,
    net_change: Decimal,
    ending: Decimal,
    financial_report: Option<&str>,
    fiscal_period: Option<u32>,
) -> BalanceCheck {
    let beginning = effective_beginning(beginning, financial_report, fiscal_period);
    let balanced = beginning + net_change == ending;
    if !balanced {
        tracing::debug!(
            %beginning,
            %net_change,
            %ending,
            "Balance reconciliation mismatch"
        );
    }
    BalanceCheck {
        beginning,
        net_change,
        ending,
        balanced,
    }
}

/// Trial balance of one account as of a date, in debit-minus-credit
/// orientation. `None` when the account has no snapshot in that month.
pub fn tb_balance_at(
    storage: &Storage,
    tenant_id: i64,
    company_id: &str,
    account_uid: &str,
    as_of: NaiveDate,
) -> Result<Option<Decimal>> {
    let month_start = period::month_floor(as_of);
    let rows = storage.live_rows::<TrialBalanceRow>(tenant_id, company_id, month_start, as_of)?;
    let account_uid = account_uid.trim();
    Ok(rows
        .iter()
        .find(|r| r.account_uid.trim() == account_uid)
        .map(|r| {
            r.debit.unwrap_or(Decimal::ZERO) - r.credit.unwrap_or(Decimal::ZERO)
        }))
}
