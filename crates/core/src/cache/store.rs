use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as SyncMutex, MutexGuard as SyncMutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{Mutex, MutexGuard, RwLock};

use super::{
    CacheEntry, CacheError, CacheStats, Tally, TicketPage, TicketQuery, TicketSummary, Updated,
};
use crate::codec::TicketCodec;
use crate::config::CacheConfig;
use crate::ticket::TicketRecord;

/// One cache key: the encoded entry behind an async lock, plus its tally
/// behind a short synchronous one.
struct Slot {
    entry: Mutex<CacheEntry>,
    tally: SyncMutex<Tally>,
    /// Population this slot was created in.
    generation: u64,
}

impl Slot {
    fn new(entry: CacheEntry, tally: Tally, generation: u64) -> Arc<Slot> {
        Arc::new(Slot {
            entry: Mutex::new(entry),
            tally: SyncMutex::new(tally),
            generation,
        })
    }

    fn tally(&self) -> SyncMutexGuard<'_, Tally> {
        lock_sync(&self.tally)
    }
}

/// Population counters, tagged with the population they describe.
struct Counters {
    generation: u64,
    stats: CacheStats,
}

// Never held across an await; a poisoned guard still holds consistent counts.
fn lock_sync<T>(mutex: &SyncMutex<T>) -> SyncMutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Shared in-memory cache of encoded ticket records.
///
/// All mutation goes through [`update_with`](Self::update_with) (or its
/// [`update`](Self::update) shorthand), which holds the key's lock across
/// decode, mutate, encode and store. Writes to an existing key always go
/// through that key's slot; only [`replace_all`](Self::replace_all) swaps slots.
pub struct TicketCache {
    entries: RwLock<HashMap<String, Arc<Slot>>>,
    counters: SyncMutex<Counters>,
    next_generation: AtomicU64,
    codec: TicketCodec,
    lock_timeout: Duration,
}

impl TicketCache {
    /// Create an empty cache.
    pub fn new(codec: TicketCodec, lock_timeout: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            counters: SyncMutex::new(Counters {
                generation: 0,
                stats: CacheStats::empty(),
            }),
            next_generation: AtomicU64::new(0),
            codec,
            lock_timeout,
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(
            TicketCodec::new(config.compression_level),
            Duration::from_millis(config.lock_timeout_ms),
        )
    }

    pub fn codec(&self) -> &TicketCodec {
        &self.codec
    }

    /// Longest wait for a single key's lock.
    pub fn lock_timeout(&self) -> Duration {
        self.lock_timeout
    }

    /// Number of cached tickets.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    pub async fn contains(&self, code: &str) -> bool {
        self.entries.read().await.contains_key(code)
    }

    /// All cached ticket codes, sorted.
    pub async fn codes(&self) -> Vec<String> {
        let mut codes: Vec<String> = self.entries.read().await.keys().cloned().collect();
        codes.sort();
        codes
    }

    async fn slot(&self, code: &str) -> Option<Arc<Slot>> {
        self.entries.read().await.get(code).cloned()
    }

    async fn lock<'a>(
        &self,
        code: &str,
        slot: &'a Slot,
    ) -> Result<MutexGuard<'a, CacheEntry>, CacheError> {
        tokio::time::timeout(self.lock_timeout, slot.entry.lock())
            .await
            .map_err(|_| CacheError::LockTimeout(code.to_string()))
    }

    /// Decode the record cached under `code`.
    pub async fn get(&self, code: &str) -> Result<Option<TicketRecord>, CacheError> {
        let Some(slot) = self.slot(code).await else {
            return Ok(None);
        };
        let entry = self.lock(code, &slot).await?;
        Ok(Some(self.codec.decode(&entry.bytes)?))
    }

    /// Current version of the entry under `code`.
    pub async fn snapshot_version(&self, code: &str) -> Result<Option<u64>, CacheError> {
        let Some(slot) = self.slot(code).await else {
            return Ok(None);
        };
        let entry = self.lock(code, &slot).await?;
        Ok(Some(entry.version))
    }

    /// Replace the record under `code` with `mutator(record)`.
    pub async fn update<F>(&self, code: &str, mutator: F) -> Result<TicketRecord, CacheError>
    where
        F: FnOnce(TicketRecord) -> TicketRecord,
    {
        self.update_with(code, |record| {
            *record = mutator(record.clone());
        })
        .await
        .map(|updated| updated.record)
    }

    /// Mutate the record under `code` in place inside the key's critical section.
    ///
    /// The record is re-encoded and its version bumped only if `f` changed it.
    pub async fn update_with<F, T>(&self, code: &str, f: F) -> Result<Updated<T>, CacheError>
    where
        F: FnOnce(&mut TicketRecord) -> T,
    {
        let slot = self
            .slot(code)
            .await
            .ok_or_else(|| CacheError::NotFound(code.to_string()))?;
        let mut entry = self.lock(code, &slot).await?;

        let before = self.codec.decode(&entry.bytes)?;
        let mut record = before.clone();
        let output = f(&mut record);

        if record.code() != code {
            return Err(CacheError::KeyChanged {
                from: code.to_string(),
                to: record.code().to_string(),
            });
        }

        let changed = record != before;
        if changed {
            let bytes = self.codec.encode(&record)?;
            self.write_entry(&slot, &mut entry, bytes, Tally::of(&record));
        }

        Ok(Updated {
            record,
            output,
            version: entry.version,
            changed,
        })
    }

    /// Insert a record under its own code, or overwrite the cached one.
    ///
    /// A new code starts at version 0. Overwriting waits for the key's lock and
    /// bumps the version like any other write.
    pub async fn insert(&self, record: TicketRecord) -> Result<(), CacheError> {
        let code = record.code().to_string();
        let tally = Tally::of(&record);
        let bytes = self.codec.encode(&record)?;

        let existing = {
            let mut entries = self.entries.write().await;
            let existing = entries.get(&code).cloned();
            match existing {
                Some(slot) => slot,
                None => {
                    let mut counters = lock_sync(&self.counters);
                    counters.stats.add(&tally);
                    let slot = Slot::new(CacheEntry::new(bytes), tally, counters.generation);
                    entries.insert(code, slot);
                    return Ok(());
                }
            }
        };

        let mut entry = self.lock(&code, &existing).await?;
        self.write_entry(&existing, &mut entry, bytes, tally);
        Ok(())
    }

    /// Insert a record only if its code is not cached yet.
    ///
    /// Returns false (and leaves the live entry alone) when the code exists.
    pub async fn insert_new(&self, record: TicketRecord) -> Result<bool, CacheError> {
        let tally = Tally::of(&record);
        let entry = CacheEntry::new(self.codec.encode(&record)?);

        let mut entries = self.entries.write().await;
        if entries.contains_key(record.code()) {
            return Ok(false);
        }
        let mut counters = lock_sync(&self.counters);
        counters.stats.add(&tally);
        let slot = Slot::new(entry, tally, counters.generation);
        entries.insert(record.code().to_string(), slot);
        Ok(true)
    }

    /// Overwrite a corrupt entry with `record`, keeping the entry's slot.
    ///
    /// Concurrent repairs of one ticket are serialized on its lock and only the
    /// first writes; later callers get `false` and see the repaired record. A
    /// code missing from the cache is inserted fresh.
    pub async fn repair(&self, record: TicketRecord) -> Result<bool, CacheError> {
        let code = record.code().to_string();
        let Some(slot) = self.slot(&code).await else {
            return self.insert_new(record).await;
        };

        let mut entry = self.lock(&code, &slot).await?;
        if self.codec.decode(&entry.bytes).is_ok() {
            return Ok(false);
        }

        let bytes = self.codec.encode(&record)?;
        self.write_entry(&slot, &mut entry, bytes, Tally::of(&record));
        Ok(true)
    }

    /// Swap in a whole new population.
    ///
    /// The new map is encoded before the write lock is taken; readers see either
    /// the old population or the new one. Fails without touching the cache if
    /// any code appears twice or any record fails to encode.
    pub async fn replace_all<I>(&self, records: I) -> Result<usize, CacheError>
    where
        I: IntoIterator<Item = TicketRecord>,
    {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed) + 1;
        let mut population: HashMap<String, Arc<Slot>> = HashMap::new();
        let mut stats = CacheStats::empty();

        for record in records {
            let code = record.code().to_string();
            if population.contains_key(&code) {
                return Err(CacheError::DuplicateCode(code));
            }
            let tally = Tally::of(&record);
            stats.add(&tally);
            let entry = CacheEntry::new(self.codec.encode(&record)?);
            population.insert(code, Slot::new(entry, tally, generation));
        }

        let count = population.len();
        let mut entries = self.entries.write().await;
        *entries = population;
        *lock_sync(&self.counters) = Counters { generation, stats };
        Ok(count)
    }

    /// One sorted page of tickets matching `query`.
    ///
    /// Filtering reads only the per-key tallies; just the page itself is
    /// decoded. Entries that are corrupt or locked past the timeout are left
    /// out of the page but still counted in the total.
    pub async fn page(&self, query: &TicketQuery) -> TicketPage {
        let mut matching: Vec<(String, Arc<Slot>)> = self
            .entries
            .read()
            .await
            .iter()
            .filter(|(_, slot)| slot.tally().matches(query.kind, query.state))
            .map(|(code, slot)| (code.clone(), Arc::clone(slot)))
            .collect();
        matching.sort_by(|a, b| a.0.cmp(&b.0));

        let total = matching.len();
        let mut tickets = Vec::new();
        for (code, slot) in matching.into_iter().skip(query.offset).take(query.limit) {
            match self.summarize(&code, &slot).await {
                Ok(summary) => tickets.push(summary),
                Err(e) => tracing::warn!("Skipping {} in listing: {}", code, e),
            }
        }

        TicketPage { tickets, total }
    }

    async fn summarize(&self, code: &str, slot: &Slot) -> Result<TicketSummary, CacheError> {
        let (bytes, version, last_write) = {
            let entry = self.lock(code, slot).await?;
            (entry.bytes.clone(), entry.version, entry.last_write)
        };
        let record = self.codec.decode(&bytes)?;
        Ok(TicketSummary {
            code: code.to_string(),
            kind: record.kind(),
            people: record.people(),
            version,
            last_write,
        })
    }

    /// Counts by ticket kind and by person state.
    pub fn stats(&self) -> CacheStats {
        lock_sync(&self.counters).stats.clone()
    }

    /// Store freshly encoded bytes in a locked entry and move its tally.
    fn write_entry(&self, slot: &Slot, entry: &mut CacheEntry, bytes: Vec<u8>, tally: Tally) {
        entry.bytes = bytes;
        entry.version += 1;
        entry.last_write = Utc::now();

        let previous = std::mem::replace(&mut *slot.tally(), tally.clone());
        if previous == tally {
            return;
        }
        let mut counters = lock_sync(&self.counters);
        // Slots orphaned by a replaced population no longer count.
        if counters.generation == slot.generation {
            counters.stats.remove(&previous);
            counters.stats.add(&tally);
        }
    }

    /// Overwrite the raw bytes of an entry. Test hook for corruption scenarios.
    #[doc(hidden)]
    pub async fn corrupt_entry_for_tests(&self, code: &str, bytes: Vec<u8>) -> bool {
        match self.slot(code).await {
            Some(slot) => {
                slot.entry.lock().await.bytes = bytes;
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{scan_record, ScanOutcome, ScanType};
    use crate::testing::fixtures;
    use crate::ticket::{EntryState, TicketKind};

    fn cache() -> TicketCache {
        TicketCache::new(TicketCodec::default(), Duration::from_millis(250))
    }

    #[tokio::test]
    async fn test_get_missing_is_none() {
        let cache = cache();
        assert!(cache.get("NOPE").await.unwrap().is_none());
        assert!(cache.snapshot_version("NOPE").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_insert_then_get() {
        let cache = cache();
        let record = fixtures::concert_ticket("C-1");
        cache.insert(record.clone()).await.unwrap();

        assert_eq!(cache.get("C-1").await.unwrap(), Some(record));
        assert_eq!(cache.snapshot_version("C-1").await.unwrap(), Some(0));
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_insert_new_keeps_existing_entry() {
        let cache = cache();
        assert!(cache.insert_new(fixtures::concert_ticket("C-1")).await.unwrap());
        cache
            .update("C-1", |mut r| {
                if let TicketRecord::Concert(c) = &mut r {
                    c.last_entry_state = EntryState::EnteredGate;
                }
                r
            })
            .await
            .unwrap();

        assert!(!cache.insert_new(fixtures::concert_ticket("C-1")).await.unwrap());
        assert_eq!(cache.snapshot_version("C-1").await.unwrap(), Some(1));
    }

    #[tokio::test]
    async fn test_update_missing_is_not_found() {
        let cache = cache();
        let result = cache.update("NOPE", |r| r).await;
        assert!(matches!(result, Err(CacheError::NotFound(code)) if code == "NOPE"));
    }

    #[tokio::test]
    async fn test_update_bumps_version_only_on_change() {
        let cache = cache();
        cache.insert(fixtures::concert_ticket("C-1")).await.unwrap();

        let first = cache
            .update_with("C-1", |r| scan_record(r, None, ScanType::Gate).unwrap())
            .await
            .unwrap();
        assert!(first.changed);
        assert_eq!(first.version, 1);
        assert_eq!(first.output.outcome, ScanOutcome::Accepted);

        let second = cache
            .update_with("C-1", |r| scan_record(r, None, ScanType::Gate).unwrap())
            .await
            .unwrap();
        assert!(!second.changed);
        assert_eq!(second.version, 1);
        assert_eq!(second.output.outcome, ScanOutcome::RejectedDuplicate);
    }

    #[tokio::test]
    async fn test_update_with_whole_record_mutator() {
        let cache = cache();
        cache.insert(fixtures::team_ticket("T-1", &["m-1"])).await.unwrap();

        let updated = cache
            .update("T-1", |mut record| {
                if let TicketRecord::Team(team) = &mut record {
                    team.members[0].last_entry_state = EntryState::EnteredGate;
                }
                record
            })
            .await
            .unwrap();

        assert_eq!(updated.people()[0].state, EntryState::EnteredGate);
        assert_eq!(cache.get("T-1").await.unwrap(), Some(updated));
        assert_eq!(cache.snapshot_version("T-1").await.unwrap(), Some(1));
    }

    #[tokio::test]
    async fn test_update_rejects_code_change() {
        let cache = cache();
        cache.insert(fixtures::concert_ticket("C-1")).await.unwrap();

        let result = cache
            .update("C-1", |record| match record {
                TicketRecord::Concert(mut c) => {
                    c.code = "C-2".to_string();
                    TicketRecord::Concert(c)
                }
                other => other,
            })
            .await;
        assert!(matches!(result, Err(CacheError::KeyChanged { .. })));
        assert_eq!(cache.snapshot_version("C-1").await.unwrap(), Some(0));
    }

    #[tokio::test]
    async fn test_corrupt_entry_surfaces_codec_error() {
        let cache = cache();
        cache.insert(fixtures::concert_ticket("C-1")).await.unwrap();
        assert!(cache.corrupt_entry_for_tests("C-1", vec![1, 2, 3]).await);

        assert!(matches!(cache.get("C-1").await, Err(CacheError::Codec(_))));
        assert!(matches!(
            cache.update("C-1", |r| r).await,
            Err(CacheError::Codec(_))
        ));
    }

    #[tokio::test]
    async fn test_lock_timeout() {
        let cache = TicketCache::new(TicketCodec::default(), Duration::from_millis(20));
        cache.insert(fixtures::concert_ticket("C-1")).await.unwrap();

        let slot = cache.slot("C-1").await.unwrap();
        let _held = slot.entry.lock().await;

        let result = cache.update("C-1", |r| r).await;
        assert!(matches!(result, Err(CacheError::LockTimeout(code)) if code == "C-1"));
    }

    #[tokio::test]
    async fn test_unrelated_keys_not_blocked_by_held_lock() {
        let cache = TicketCache::new(TicketCodec::default(), Duration::from_millis(20));
        cache.insert(fixtures::concert_ticket("C-1")).await.unwrap();
        cache.insert(fixtures::concert_ticket("C-2")).await.unwrap();

        let slot = cache.slot("C-1").await.unwrap();
        let _held = slot.entry.lock().await;

        let updated = cache
            .update_with("C-2", |r| scan_record(r, None, ScanType::Gate).unwrap())
            .await
            .unwrap();
        assert_eq!(updated.output.outcome, ScanOutcome::Accepted);
    }

    #[tokio::test]
    async fn test_replace_all_swaps_population() {
        let cache = cache();
        cache.insert(fixtures::concert_ticket("OLD")).await.unwrap();

        let count = cache
            .replace_all(vec![
                fixtures::concert_ticket("C-1"),
                fixtures::team_ticket("T-1", &["m-1"]),
            ])
            .await
            .unwrap();

        assert_eq!(count, 2);
        assert_eq!(cache.codes().await, vec!["C-1".to_string(), "T-1".to_string()]);
        assert!(!cache.contains("OLD").await);
    }

    #[tokio::test]
    async fn test_replace_all_duplicate_leaves_cache_untouched() {
        let cache = cache();
        cache.insert(fixtures::concert_ticket("OLD")).await.unwrap();

        let result = cache
            .replace_all(vec![
                fixtures::concert_ticket("DUP"),
                fixtures::team_ticket("DUP", &["m-1"]),
            ])
            .await;

        assert!(matches!(result, Err(CacheError::DuplicateCode(code)) if code == "DUP"));
        assert_eq!(cache.codes().await, vec!["OLD".to_string()]);
    }

    #[tokio::test]
    async fn test_page_filters_and_counts() {
        let cache = cache();
        cache
            .replace_all(vec![
                fixtures::concert_ticket("C-1"),
                fixtures::concert_ticket("C-2"),
                fixtures::team_ticket("T-1", &["m-1", "m-2", "m-3"]),
            ])
            .await
            .unwrap();
        cache
            .update_with("C-1", |r| scan_record(r, None, ScanType::Gate).unwrap())
            .await
            .unwrap();

        let all = cache
            .page(&TicketQuery {
                limit: 2,
                ..Default::default()
            })
            .await;
        assert_eq!(all.total, 3);
        assert_eq!(all.tickets.len(), 2);
        assert_eq!(all.tickets[0].code, "C-1");
        assert_eq!(all.tickets[0].version, 1);
        assert!(all.tickets[0].has_person_in(EntryState::EnteredGate));

        let inside = cache
            .page(&TicketQuery {
                state: Some(EntryState::EnteredGate),
                limit: 10,
                ..Default::default()
            })
            .await;
        assert_eq!(inside.total, 1);
        assert_eq!(inside.tickets[0].code, "C-1");

        let teams = cache
            .page(&TicketQuery {
                kind: Some(TicketKind::Team),
                offset: 1,
                limit: 10,
                ..Default::default()
            })
            .await;
        assert_eq!(teams.total, 1);
        assert!(teams.tickets.is_empty());
    }

    #[tokio::test]
    async fn test_page_counts_corrupt_entry_without_listing_it() {
        let cache = cache();
        cache.insert(fixtures::concert_ticket("C-1")).await.unwrap();
        cache.insert(fixtures::concert_ticket("C-2")).await.unwrap();
        cache.corrupt_entry_for_tests("C-1", vec![7]).await;

        let page = cache
            .page(&TicketQuery {
                limit: 10,
                ..Default::default()
            })
            .await;
        assert_eq!(page.total, 2);
        assert_eq!(page.tickets.len(), 1);
        assert_eq!(page.tickets[0].code, "C-2");
    }

    #[tokio::test]
    async fn test_stats_follow_every_write() {
        let cache = cache();
        cache
            .replace_all(vec![
                fixtures::concert_ticket("C-1"),
                fixtures::team_ticket("T-1", &["m-1", "m-2", "m-3"]),
            ])
            .await
            .unwrap();
        cache
            .update_with("C-1", |r| scan_record(r, None, ScanType::Gate).unwrap())
            .await
            .unwrap();
        cache
            .update_with("T-1", |r| scan_record(r, Some("m-2"), ScanType::Gate).unwrap())
            .await
            .unwrap();
        cache.insert(fixtures::concert_ticket("C-2")).await.unwrap();

        let stats = cache.stats();
        assert_eq!(stats.tickets, 3);
        assert_eq!(stats.team_tickets, 1);
        assert_eq!(stats.concert_tickets, 2);
        assert_eq!(stats.people, 5);
        assert_eq!(stats.people_by_state[&EntryState::NotEntered], 3);
        assert_eq!(stats.people_by_state[&EntryState::EnteredGate], 2);
        assert_eq!(stats.people_by_state[&EntryState::Exited], 0);

        // Overwriting C-1 moves its guest back without adding a ticket.
        cache.insert(fixtures::concert_ticket("C-1")).await.unwrap();
        let stats = cache.stats();
        assert_eq!(stats.tickets, 3);
        assert_eq!(stats.people_by_state[&EntryState::EnteredGate], 1);

        cache
            .replace_all(vec![fixtures::concert_ticket("C-9")])
            .await
            .unwrap();
        let stats = cache.stats();
        assert_eq!(stats.tickets, 1);
        assert_eq!(stats.people_by_state[&EntryState::NotEntered], 1);
        assert_eq!(stats.people_by_state[&EntryState::EnteredGate], 0);
    }

    #[tokio::test]
    async fn test_writes_to_orphaned_slot_do_not_move_counters() {
        let cache = cache();
        cache.insert(fixtures::concert_ticket("C-1")).await.unwrap();
        let orphan = cache.slot("C-1").await.unwrap();

        cache
            .replace_all(vec![fixtures::concert_ticket("C-1")])
            .await
            .unwrap();
        let mut entry = orphan.entry.lock().await;
        let record = fixtures::concert_ticket_in("C-1", EntryState::EnteredGate);
        let bytes = cache.codec().encode(&record).unwrap();
        cache.write_entry(&orphan, &mut entry, bytes, Tally::of(&record));

        assert_eq!(cache.stats().people_by_state[&EntryState::EnteredGate], 0);
        assert_eq!(cache.stats().people_by_state[&EntryState::NotEntered], 1);
    }

    #[tokio::test]
    async fn test_insert_over_existing_code_keeps_slot() {
        let cache = cache();
        cache.insert(fixtures::concert_ticket("C-1")).await.unwrap();
        let before = cache.slot("C-1").await.unwrap();

        cache
            .insert(fixtures::concert_ticket_in("C-1", EntryState::EnteredGate))
            .await
            .unwrap();

        let after = cache.slot("C-1").await.unwrap();
        assert!(Arc::ptr_eq(&before, &after));
        assert_eq!(cache.snapshot_version("C-1").await.unwrap(), Some(1));
    }

    #[tokio::test]
    async fn test_repair_writes_only_once() {
        let cache = cache();
        cache.insert(fixtures::concert_ticket("C-1")).await.unwrap();
        let slot = cache.slot("C-1").await.unwrap();
        cache.corrupt_entry_for_tests("C-1", vec![0xde, 0xad]).await;

        assert!(cache.repair(fixtures::concert_ticket("C-1")).await.unwrap());
        let updated = cache
            .update_with("C-1", |r| scan_record(r, None, ScanType::Gate).unwrap())
            .await
            .unwrap();
        assert_eq!(updated.output.outcome, ScanOutcome::Accepted);

        // A second repair with the store's stale copy must not undo the scan.
        assert!(!cache.repair(fixtures::concert_ticket("C-1")).await.unwrap());
        let Some(TicketRecord::Concert(concert)) = cache.get("C-1").await.unwrap() else {
            panic!("expected concert ticket");
        };
        assert_eq!(concert.last_entry_state, EntryState::EnteredGate);
        assert!(Arc::ptr_eq(&slot, &cache.slot("C-1").await.unwrap()));
        assert_eq!(cache.snapshot_version("C-1").await.unwrap(), Some(2));
    }

    #[tokio::test]
    async fn test_repair_of_missing_code_inserts() {
        let cache = cache();
        assert!(cache.repair(fixtures::concert_ticket("C-1")).await.unwrap());
        assert_eq!(cache.snapshot_version("C-1").await.unwrap(), Some(0));
        assert_eq!(cache.stats().tickets, 1);
    }
}
