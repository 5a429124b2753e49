use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use sqlx::SqlitePool;

use crate::db::SlotOccupancyRepository;
use crate::error::AppResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReserveOutcome {
    Reserved,
    Full,
}

/// The capacity ledger. `reserve` must be atomic with respect to concurrent
/// reservers of the same (date, slot_start) key: implementations do a single
/// check-and-increment, never read-count-then-write. `release` is floored at
/// zero and idempotent.
///
/// The lifecycle manager only sees this trait, so the concrete concurrency
/// primitive (guarded SQL update, in-memory mutex map) stays swappable.
#[async_trait]
pub trait CapacityStore: Send + Sync {
    async fn reserve(
        &self,
        date: NaiveDate,
        slot_start: NaiveTime,
        capacity: i64,
    ) -> AppResult<ReserveOutcome>;

    async fn release(&self, date: NaiveDate, slot_start: NaiveTime) -> AppResult<()>;

    async fn occupancy(&self, date: NaiveDate, slot_start: NaiveTime) -> AppResult<i64>;

    /// Occupancy per slot start for one day. Untracked slots are simply absent.
    async fn day_occupancy(&self, date: NaiveDate) -> AppResult<HashMap<NaiveTime, i64>>;

    /// Occupancy for every tracked slot in `[from, to]`.
    async fn range_occupancy(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> AppResult<HashMap<(NaiveDate, NaiveTime), i64>>;
}

// ============================================================================
// SQLite-backed store
// ============================================================================

/// Capacity store over the `slot_occupancy` table. The atomicity of
/// `reserve` comes from the guarded single-statement upsert in
/// [`SlotOccupancyRepository::reserve`].
pub struct SqliteCapacityStore {
    pool: SqlitePool,
}

impl SqliteCapacityStore {
    pub fn new(pool: SqlitePool) -> Self {
        SqliteCapacityStore { pool }
    }
}

#[async_trait]
impl CapacityStore for SqliteCapacityStore {
    async fn reserve(
        &self,
        date: NaiveDate,
        slot_start: NaiveTime,
        capacity: i64,
    ) -> AppResult<ReserveOutcome> {
        let reserved = SlotOccupancyRepository::reserve(&self.pool, date, slot_start, capacity)
            .await?;

        Ok(if reserved {
            ReserveOutcome::Reserved
        } else {
            ReserveOutcome::Full
        })
    }

    async fn release(&self, date: NaiveDate, slot_start: NaiveTime) -> AppResult<()> {
        SlotOccupancyRepository::release(&self.pool, date, slot_start).await
    }

    async fn occupancy(&self, date: NaiveDate, slot_start: NaiveTime) -> AppResult<i64> {
        SlotOccupancyRepository::occupancy(&self.pool, date, slot_start).await
    }

    async fn day_occupancy(&self, date: NaiveDate) -> AppResult<HashMap<NaiveTime, i64>> {
        let rows = SlotOccupancyRepository::day_occupancy(&self.pool, date).await?;
        Ok(rows.into_iter().collect())
    }

    async fn range_occupancy(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> AppResult<HashMap<(NaiveDate, NaiveTime), i64>> {
        let rows = SlotOccupancyRepository::range_occupancy(&self.pool, from, to).await?;
        Ok(rows
            .into_iter()
            .map(|(date, slot_start, occupied)| ((date, slot_start), occupied))
            .collect())
    }
}

// ============================================================================
// In-memory store
// ============================================================================

/// Mutex-map capacity store. The critical section per call keeps
/// check-and-increment atomic without any database underneath; used by tests
/// and useful as a reference implementation of the ledger contract.
#[derive(Default)]
pub struct InMemoryCapacityStore {
    slots: Mutex<HashMap<(NaiveDate, NaiveTime), i64>>,
}

impl InMemoryCapacityStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CapacityStore for InMemoryCapacityStore {
    async fn reserve(
        &self,
        date: NaiveDate,
        slot_start: NaiveTime,
        capacity: i64,
    ) -> AppResult<ReserveOutcome> {
        let mut slots = self.slots.lock().expect("capacity map poisoned");
        let occupied = slots.entry((date, slot_start)).or_insert(0);

        if *occupied < capacity {
            *occupied += 1;
            Ok(ReserveOutcome::Reserved)
        } else {
            Ok(ReserveOutcome::Full)
        }
    }

    async fn release(&self, date: NaiveDate, slot_start: NaiveTime) -> AppResult<()> {
        let mut slots = self.slots.lock().expect("capacity map poisoned");
        if let Some(occupied) = slots.get_mut(&(date, slot_start)) {
            if *occupied > 0 {
                *occupied -= 1;
            }
        }
        Ok(())
    }

    async fn occupancy(&self, date: NaiveDate, slot_start: NaiveTime) -> AppResult<i64> {
        let slots = self.slots.lock().expect("capacity map poisoned");
        Ok(slots.get(&(date, slot_start)).copied().unwrap_or(0))
    }

    async fn day_occupancy(&self, date: NaiveDate) -> AppResult<HashMap<NaiveTime, i64>> {
        let slots = self.slots.lock().expect("capacity map poisoned");
        Ok(slots
            .iter()
            .filter(|((d, _), _)| *d == date)
            .map(|((_, t), occupied)| (*t, *occupied))
            .collect())
    }

    async fn range_occupancy(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> AppResult<HashMap<(NaiveDate, NaiveTime), i64>> {
        let slots = self.slots.lock().expect("capacity map poisoned");
        Ok(slots
            .iter()
            .filter(|((d, _), _)| *d >= from && *d <= to)
            .map(|(key, occupied)| (*key, *occupied))
            .collect())
    }
}
