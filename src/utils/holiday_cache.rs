use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use chrono::NaiveDate;
use futures_util::StreamExt;
use moka::future::Cache;
use once_cell::sync::{Lazy, OnceCell};
use sqlx::MySqlPool;

use crate::payslip::month::YearMonth;

const DEFAULT_TTL_SECS: u64 = 3600;

static TTL: OnceCell<Duration> = OnceCell::new();

/// Bumped on every invalidation so a load that raced a holiday change can
/// tell its result may be stale.
static CHANGES: AtomicU64 = AtomicU64::new(0);

/// Holiday dates per month. Payslip runs hit the same month for every
/// employee, so one query serves the whole batch.
static HOLIDAY_CACHE: Lazy<Cache<YearMonth, Arc<Vec<NaiveDate>>>> = Lazy::new(|| {
    Cache::builder()
        .max_capacity(240)
        .time_to_live(
            *TTL.get()
                .unwrap_or(&Duration::from_secs(DEFAULT_TTL_SECS)),
        )
        .build()
});

/// Sets the entry lifetime. Only effective before the first cache access.
pub fn configure(ttl: Duration) {
    let _ = TTL.set(ttl);
}

async fn load_month(pool: &MySqlPool, month: YearMonth) -> Result<Arc<Vec<NaiveDate>>> {
    let dates = sqlx::query_scalar::<_, NaiveDate>(
        "SELECT date FROM holidays WHERE date BETWEEN ? AND ? ORDER BY date",
    )
    .bind(month.first_day())
    .bind(month.last_day())
    .fetch_all(pool)
    .await
    .with_context(|| format!("loading holidays for {month}"))?;

    Ok(Arc::new(dates))
}

/// Holidays falling in `month`, served from cache when possible. Concurrent
/// misses for the same month share one query.
pub async fn holidays_in(pool: &MySqlPool, month: YearMonth) -> Result<Arc<Vec<NaiveDate>>> {
    let seen = CHANGES.load(Ordering::Acquire);

    let dates = HOLIDAY_CACHE
        .try_get_with(month, load_month(pool, month))
        .await
        .map_err(|e| anyhow!("{e:#}"))?;

    if CHANGES.load(Ordering::Acquire) != seen {
        // a holiday changed while this month was loading
        HOLIDAY_CACHE.invalidate(&month).await;
        return load_month(pool, month).await;
    }

    Ok(dates)
}

/// Drops cached months. Call after the holiday write has been applied.
pub async fn invalidate(months: &[YearMonth]) {
    CHANGES.fetch_add(1, Ordering::AcqRel);
    for month in months {
        HOLIDAY_CACHE.invalidate(month).await;
    }
}

/// Months whose cached holidays go stale when a holiday moves from `old`
/// to `new`.
pub fn affected_months(old: NaiveDate, new: NaiveDate) -> Vec<YearMonth> {
    let (old, new) = (YearMonth::of(old), YearMonth::of(new));
    if old == new { vec![old] } else { vec![old, new] }
}

/// Buckets dates by month, each bucket sorted and free of repeats.
pub fn group_by_month(
    dates: impl IntoIterator<Item = NaiveDate>,
) -> Vec<(YearMonth, Vec<NaiveDate>)> {
    let mut months: BTreeMap<YearMonth, Vec<NaiveDate>> = BTreeMap::new();
    for date in dates {
        months.entry(YearMonth::of(date)).or_default().push(date);
    }
    months
        .into_iter()
        .map(|(month, mut dates)| {
            dates.sort_unstable();
            dates.dedup();
            (month, dates)
        })
        .collect()
}

/// Preloads every month from `from` onwards that has at least one holiday.
pub async fn warmup_holiday_cache(pool: &MySqlPool, from: YearMonth) -> Result<()> {
    let seen = CHANGES.load(Ordering::Acquire);

    let mut stream = sqlx::query_scalar::<_, NaiveDate>(
        "SELECT date FROM holidays WHERE date >= ? ORDER BY date",
    )
    .bind(from.first_day())
    .fetch(pool);

    let mut dates = Vec::new();
    while let Some(row) = stream.next().await {
        dates.push(row?);
    }
    let total = dates.len();
    let months = group_by_month(dates);

    if CHANGES.load(Ordering::Acquire) != seen {
        log::info!("Holiday cache warmup skipped: holidays changed while loading");
        return Ok(());
    }

    for (month, dates) in &months {
        HOLIDAY_CACHE.insert(*month, Arc::new(dates.clone())).await;
    }

    log::info!(
        "Holiday cache warmup complete: {} holidays across {} months",
        total,
        months.len()
    );

    Ok(())
}
