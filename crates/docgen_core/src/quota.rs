//! crates/docgen_core/src/quota.rs
//!
//! Per-plan usage limits checked when a generation request is submitted.

use chrono::{DateTime, Datelike, TimeZone, Utc};

use crate::domain::{GenerationRequirements, PlanLimits};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QuotaViolation {
    #[error("Monthly document limit of {limit} reached for the {plan} plan")]
    MonthlyLimitReached { plan: String, limit: u32 },
    #[error("The {plan} plan allows at most {limit} words per document")]
    TooManyWords { plan: String, limit: u32 },
    #[error("The {plan} plan does not support charts")]
    ChartsNotSupported { plan: String },
    #[error("The {plan} plan does not support formulas")]
    FormulasNotSupported { plan: String },
}

/// Checks one request against the plan, given how many tasks the user
/// already submitted this month.
pub fn check_request(
    limits: &PlanLimits,
    used_this_month: u32,
    requirements: &GenerationRequirements,
) -> Result<(), QuotaViolation> {
    let plan = || limits.plan_name.clone();

    if used_this_month >= limits.max_documents_per_month {
        return Err(QuotaViolation::MonthlyLimitReached {
            plan: plan(),
            limit: limits.max_documents_per_month,
        });
    }
    if requirements.word_count > limits.max_words_per_document {
        return Err(QuotaViolation::TooManyWords {
            plan: plan(),
            limit: limits.max_words_per_document,
        });
    }
    if requirements.include_charts && !limits.supports_charts {
        return Err(QuotaViolation::ChartsNotSupported { plan: plan() });
    }
    if requirements.include_formulas && !limits.supports_formulas {
        return Err(QuotaViolation::FormulasNotSupported { plan: plan() });
    }
    Ok(())
}

/// The first instant of the UTC calendar month containing `now`.
pub fn month_start(now: DateTime<Utc>) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
        .single()
        .unwrap_or(now)
}
