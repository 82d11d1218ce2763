//! Same-ticket scans are linearized by the per-key lock, including while a
//! corrupt entry is repaired or the whole population is resynced.

use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::mpsc;

use gatekeeper_core::{
    cache::TicketCache,
    config::{CacheConfig, WriteBackConfig},
    create_entry_log_system,
    entry_log::EntryLogHandle,
    testing::{fixtures, next_fact, MockTicketRepository},
    Hydrator, ScanCoordinator, ScanOutcome, ScanRequest, ScanType, TicketRecord,
    WriteBackMessage,
};

const SCANNERS: usize = 100;

/// Coordinator over the shipped cache configuration, with a raw fact queue.
async fn coordinator_with(
    record: TicketRecord,
) -> (Arc<ScanCoordinator>, mpsc::Receiver<WriteBackMessage>) {
    let cache = Arc::new(TicketCache::from_config(&CacheConfig::default()));
    cache.insert(record.clone()).await.unwrap();

    let (tx, rx) = mpsc::channel(SCANNERS * 2);
    let coordinator = ScanCoordinator::new(
        cache,
        Arc::new(MockTicketRepository::with_tickets(vec![record])),
        EntryLogHandle::new(tx),
    );
    (Arc::new(coordinator), rx)
}

fn gate_scan(code: &str, device: usize) -> ScanRequest {
    ScanRequest {
        code: code.to_string(),
        scan_type: ScanType::Gate,
        device_id: format!("gate-{}", device),
        member_id: None,
    }
}

async fn scan_concurrently(
    coordinator: &Arc<ScanCoordinator>,
    code: &str,
    scanners: usize,
) -> Vec<ScanOutcome> {
    let scans = (0..scanners).map(|i| {
        let coordinator = Arc::clone(coordinator);
        let request = gate_scan(code, i);
        tokio::spawn(async move { coordinator.scan(request).await.outcome })
    });
    join_all(scans)
        .await
        .into_iter()
        .map(|r| r.expect("scan task panicked"))
        .collect()
}

fn count(outcomes: &[ScanOutcome], wanted: ScanOutcome) -> usize {
    outcomes.iter().filter(|o| **o == wanted).count()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn hundred_simultaneous_gate_scans_accept_once() {
    let (coordinator, mut facts) = coordinator_with(fixtures::concert_ticket("TICKET-9")).await;

    let outcomes = scan_concurrently(&coordinator, "TICKET-9", SCANNERS).await;

    assert_eq!(count(&outcomes, ScanOutcome::Accepted), 1);
    assert_eq!(
        count(&outcomes, ScanOutcome::RejectedDuplicate),
        SCANNERS - 1
    );
    assert_eq!(
        coordinator
            .cache()
            .snapshot_version("TICKET-9")
            .await
            .unwrap(),
        Some(1)
    );

    drop(coordinator);
    let mut logged = 0;
    while next_fact(&mut facts).await.is_some() {
        logged += 1;
    }
    assert_eq!(logged, SCANNERS);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn members_of_one_team_do_not_interfere() {
    let member_ids: Vec<String> = (0..20).map(|i| format!("m-{}", i)).collect();
    let ids: Vec<&str> = member_ids.iter().map(String::as_str).collect();
    let (coordinator, _facts) = coordinator_with(fixtures::team_ticket("TEAM-1", &ids)).await;

    let scans = member_ids.iter().cloned().map(|member| {
        let coordinator = Arc::clone(&coordinator);
        tokio::spawn(async move {
            coordinator
                .scan(ScanRequest {
                    code: "TEAM-1".to_string(),
                    scan_type: ScanType::Gate,
                    device_id: "gate-1".to_string(),
                    member_id: Some(member),
                })
                .await
                .outcome
        })
    });
    let outcomes = join_all(scans).await;

    assert!(outcomes
        .into_iter()
        .all(|o| o.expect("scan task panicked") == ScanOutcome::Accepted));
    assert_eq!(
        coordinator.cache().snapshot_version("TEAM-1").await.unwrap(),
        Some(member_ids.len() as u64)
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn scans_racing_on_a_corrupt_entry_accept_once() {
    for _ in 0..100 {
        let (coordinator, _facts) = coordinator_with(fixtures::concert_ticket("TICKET-7")).await;
        coordinator
            .cache()
            .corrupt_entry_for_tests("TICKET-7", vec![0xff, 0x00, 0x13])
            .await;

        let outcomes = scan_concurrently(&coordinator, "TICKET-7", 4).await;

        assert_eq!(count(&outcomes, ScanOutcome::Accepted), 1, "{:?}", outcomes);
        assert_eq!(count(&outcomes, ScanOutcome::RejectedDuplicate), 3);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn resync_keeps_transitions_whose_writes_are_still_retrying() {
    let repository = Arc::new(MockTicketRepository::with_tickets(vec![
        fixtures::concert_ticket("TICKET-1"),
    ]));
    repository.fail_next_writes(1);

    let cache = Arc::new(TicketCache::from_config(&CacheConfig::default()));
    let policy = WriteBackConfig {
        initial_backoff_ms: 300,
        max_backoff_ms: 300,
        ..Default::default()
    };
    let (entry_log, writer) = create_entry_log_system(repository.clone(), policy);
    tokio::spawn(writer.with_cache(cache.clone()).run());

    let hydrator = Hydrator::new(repository.clone()).with_entry_log(entry_log.clone());
    hydrator.hydrate(&cache).await.unwrap();
    let coordinator = ScanCoordinator::new(cache, repository.clone(), entry_log);

    let first = coordinator.scan(gate_scan("TICKET-1", 1)).await;
    assert_eq!(first.outcome, ScanOutcome::Accepted);

    // The fact is still in its retry backoff when the resync starts.
    coordinator.resync(&hydrator).await.unwrap();

    let second = coordinator.scan(gate_scan("TICKET-1", 2)).await;
    assert_eq!(second.outcome, ScanOutcome::RejectedDuplicate);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn scans_during_resync_never_accept_twice() {
    let repository = Arc::new(MockTicketRepository::with_tickets(vec![
        fixtures::concert_ticket("TICKET-2"),
    ]));
    let cache = Arc::new(TicketCache::from_config(&CacheConfig::default()));
    let policy = WriteBackConfig {
        initial_backoff_ms: 1,
        max_backoff_ms: 5,
        ..Default::default()
    };
    let (entry_log, writer) = create_entry_log_system(repository.clone(), policy);
    tokio::spawn(writer.with_cache(cache.clone()).run());

    let hydrator = Arc::new(Hydrator::new(repository.clone()).with_entry_log(entry_log.clone()));
    hydrator.hydrate(&cache).await.unwrap();
    let coordinator = Arc::new(ScanCoordinator::new(cache, repository.clone(), entry_log));

    let resyncs = (0..5).map(|_| {
        let coordinator = Arc::clone(&coordinator);
        let hydrator = Arc::clone(&hydrator);
        tokio::spawn(async move { coordinator.resync(&hydrator).await.map(|_| ()) })
    });
    let scans = scan_concurrently(&coordinator, "TICKET-2", 40);
    let (outcomes, resynced) = tokio::join!(scans, join_all(resyncs));

    for result in resynced {
        result.expect("resync task panicked").unwrap();
    }
    assert!(count(&outcomes, ScanOutcome::Accepted) <= 1, "{:?}", outcomes);

    // A later scan still sees the single admission.
    let late = coordinator.scan(gate_scan("TICKET-2", 99)).await;
    let total_accepted = count(&outcomes, ScanOutcome::Accepted)
        + usize::from(late.outcome == ScanOutcome::Accepted);
    assert_eq!(total_accepted, 1, "{:?} then {:?}", outcomes, late.outcome);
}
