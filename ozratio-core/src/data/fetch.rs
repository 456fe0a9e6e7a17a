//! Fetch orchestration: one symbol under a retry policy, or an ordered list of
//! fallback symbols where the first success wins.

use chrono::NaiveDate;
use rand::Rng;
use tracing::{info, warn};

use super::provider::DataProvider;
use super::retry::{FetchOutcome, Pause, RetryPolicy};
use crate::domain::DailyBar;
use crate::error::PipelineError;

/// Everything a fetch needs besides the symbol and range.
pub struct FetchContext<'a, R: Rng> {
    pub provider: &'a dyn DataProvider,
    pub policy: &'a RetryPolicy,
    pub pause: &'a dyn Pause,
    pub rng: &'a mut R,
}

/// Fetch one symbol, retrying transient failures per the policy.
///
/// Exhausting the policy is `PipelineError::DataUnavailable`.
pub fn fetch_series<R: Rng>(
    ctx: &mut FetchContext<'_, R>,
    symbol: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<DailyBar>, PipelineError> {
    let provider = ctx.provider;
    let outcome = ctx.policy.run(ctx.pause, &mut *ctx.rng, |attempt| {
        if attempt > 1 {
            info!(symbol, attempt, "retrying {}", provider.name());
        }
        provider.fetch(symbol, start, end).map(|r| r.bars)
    });

    match outcome {
        FetchOutcome::Fetched { value, attempts } => {
            info!(symbol, attempts, bars = value.len(), "fetched");
            Ok(value)
        }
        FetchOutcome::Failed {
            attempts,
            last_error,
        } => Err(PipelineError::DataUnavailable {
            symbols: vec![symbol.to_string()],
            attempts,
            reason: last_error.to_string(),
        }),
    }
}

/// Try each symbol in order; return the first one that yields data.
///
/// A symbol that runs out of attempts is logged and the next one is tried.
/// When every candidate fails the error names all of them.
pub fn fetch_with_fallback<R: Rng>(
    ctx: &mut FetchContext<'_, R>,
    symbols: &[String],
    start: NaiveDate,
    end: NaiveDate,
) -> Result<(String, Vec<DailyBar>), PipelineError> {
    let mut total_attempts = 0;
    let mut reasons = Vec::with_capacity(symbols.len());

    for symbol in symbols {
        match fetch_series(ctx, symbol, start, end) {
            Ok(bars) => {
                info!(symbol = symbol.as_str(), "source used: {symbol}");
                return Ok((symbol.clone(), bars));
            }
            Err(PipelineError::DataUnavailable {
                attempts, reason, ..
            }) => {
                warn!(symbol = symbol.as_str(), "failed for {symbol}: {reason}");
                total_attempts += attempts;
                reasons.push(format!("{symbol}: {reason}"));
            }
            Err(other) => return Err(other),
        }
    }

    Err(PipelineError::DataUnavailable {
        symbols: symbols.to_vec(),
        attempts: total_attempts,
        reason: if reasons.is_empty() {
            "no symbols configured".to_string()
        } else {
            reasons.join("; ")
        },
    })
}
