use std::sync::Arc;
use std::time::Duration;

use super::*;
use crate::sample::{CheckKind, Sample};
use crate::verification::COMPLETION_PREFIX;
use crate::worker::{MockBehavior, MockWorkerFactory};

fn completion(think: &str, answer: &str) -> String {
    format!(
        "{}<think>{}</think>\n<answer>{}</answer><|im_end|>",
        COMPLETION_PREFIX, think, answer
    )
}

fn good_sample() -> Sample {
    Sample::new(completion("\nreasoning\n", "3+4*2"), "11").with_nums(vec![3, 4, 2])
}

fn mock_pool(workers: usize, factory: &Arc<MockWorkerFactory>) -> VerifierPool {
    VerifierPool::with_factory(PoolConfig::for_testing(workers), factory.clone()).unwrap()
}

mod load_tracker {
    use super::*;

    #[test]
    fn test_acquire_prefers_lowest_index_on_ties() {
        let mut loads = LoadTracker::new(3);
        assert_eq!(loads.acquire(), Some(0));
        assert_eq!(loads.acquire(), Some(1));
        assert_eq!(loads.acquire(), Some(2));
        assert_eq!(loads.acquire(), Some(0));
        assert_eq!(loads.snapshot(), vec![2, 1, 1]);
    }

    #[test]
    fn test_acquire_picks_least_loaded() {
        let mut loads = LoadTracker::new(3);
        for _ in 0..6 {
            loads.acquire();
        }
        loads.release(1);
        loads.release(1);
        assert_eq!(loads.acquire(), Some(1));
    }

    #[test]
    fn test_spread_stays_within_one_while_only_acquiring() {
        let mut loads = LoadTracker::new(4);
        for _ in 0..23 {
            loads.acquire();
            assert!(loads.spread() <= 1, "loads: {:?}", loads.snapshot());
        }
        assert_eq!(loads.total(), 23);
    }

    #[test]
    fn test_release_saturates_at_zero() {
        let mut loads = LoadTracker::new(2);
        loads.release(0);
        loads.release(7);
        assert_eq!(loads.snapshot(), vec![0, 0]);
    }

    #[test]
    fn test_reset_and_clear() {
        let mut loads = LoadTracker::new(2);
        loads.acquire();
        loads.acquire();
        loads.acquire();
        loads.reset(0);
        assert_eq!(loads.get(0), Some(0));
        assert_eq!(loads.get(1), Some(1));

        loads.clear();
        assert!(loads.is_empty());
        assert_eq!(loads.acquire(), None);
    }
}

mod pool_config {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PoolConfig::default();
        assert_eq!(config.name, DEFAULT_POOL_NAME);
        assert!(config.num_workers >= 1);
        assert_eq!(config.task_timeout, Duration::from_secs(30));
        assert_eq!(config.max_attempts, 2);
        assert!(!config.write_failed);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_worst_case_latency() {
        let config = PoolConfig::with_workers(4);
        // Two 30s timeouts plus one 5s backoff.
        assert_eq!(config.worst_case_latency(), Duration::from_secs(65));
    }

    #[test]
    fn test_validate_rejects_nonsense() {
        let mut config = PoolConfig::with_workers(0);
        assert!(matches!(
            config.validate(),
            Err(PoolError::InvalidConfig { .. })
        ));

        config.num_workers = 1;
        config.max_attempts = 0;
        assert!(config.validate().is_err());

        config.max_attempts = 2;
        config.task_timeout = Duration::ZERO;
        assert!(config.validate().is_err());

        config.task_timeout = Duration::from_secs(1);
        config.backoff_min = Duration::from_secs(2);
        config.backoff_max = Duration::from_secs(1);
        assert!(config.validate().is_err());
    }
}

mod dispatch {
    use super::*;

    #[test]
    fn test_initialize_rejects_zero_workers() {
        let err = VerifierPool::initialize(0).unwrap_err();
        assert!(matches!(err, PoolError::InvalidConfig { .. }));
    }

    #[test]
    fn test_one_worker_per_slot() {
        let factory = Arc::new(MockWorkerFactory::new(MockBehavior::Verify));
        let pool = mock_pool(3, &factory);

        assert_eq!(factory.created_count(), 3);
        assert_eq!(pool.num_workers(), 3);

        let stats = pool.stats();
        assert_eq!(stats.slots.len(), 3);
        assert!(stats.slots.iter().all(|s| s.generation == 0 && s.load == 0));
        assert_eq!(stats.slots[1].worker_id, "mock_1_1");
    }

    #[tokio::test]
    async fn test_success_releases_load() {
        let factory = Arc::new(MockWorkerFactory::new(MockBehavior::Verify));
        let pool = mock_pool(2, &factory);

        let result = pool.dispatch(&good_sample(), CheckKind::Format).await;
        assert_eq!(result.reward_format, Some(1.0));
        assert_eq!(result.reward_equation, None);
        assert_eq!(pool.loads(), vec![0, 0]);

        let stats = pool.stats();
        assert_eq!(stats.dispatched, 1);
        assert_eq!(stats.succeeded, 1);
        assert_eq!(stats.failed_attempts, 0);
    }

    #[tokio::test]
    async fn test_failed_worker_is_replaced_and_retried() {
        let factory = Arc::new(
            MockWorkerFactory::new(MockBehavior::Verify)
                .with_slot_plan(0, vec![MockBehavior::Fail, MockBehavior::Verify]),
        );
        let pool = mock_pool(1, &factory);

        let result = pool.dispatch(&good_sample(), CheckKind::Equation).await;
        assert_eq!(result.reward_equation, Some(1.0));

        assert_eq!(factory.created_for(0), 2);
        let stats = pool.stats();
        assert_eq!(stats.failed_attempts, 1);
        assert_eq!(stats.replacements, 1);
        assert_eq!(stats.exhausted, 0);
        assert_eq!(stats.slots[0].generation, 1);
        assert_eq!(stats.slots[0].worker_id, "mock_0_1");
        assert_eq!(pool.loads(), vec![0]);
    }

    #[tokio::test]
    async fn test_exhausted_attempts_return_zero_reward() {
        let factory = Arc::new(MockWorkerFactory::new(MockBehavior::Crash));
        let pool = mock_pool(2, &factory);
        let sample = good_sample();

        let result = pool.dispatch(&sample, CheckKind::Equation).await;
        assert_eq!(result.reward_equation, Some(0.0));
        assert_eq!(result.sample_text, sample.sample_text);

        let stats = pool.stats();
        assert_eq!(stats.failed_attempts, 2);
        assert_eq!(stats.exhausted, 1);
        assert_eq!(stats.replacements, 2);
        assert_eq!(factory.created_count(), 4);
        assert_eq!(pool.loads(), vec![0, 0]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_counts_as_failure() {
        let factory = Arc::new(MockWorkerFactory::new(MockBehavior::Hang));
        let pool = mock_pool(1, &factory);
        let config = pool.config().clone();

        let started = tokio::time::Instant::now();
        let result = pool.dispatch(&good_sample(), CheckKind::Format).await;
        let elapsed = started.elapsed();

        assert_eq!(result.reward_format, Some(0.0));
        assert!(elapsed >= config.task_timeout * 2);
        assert!(elapsed <= config.worst_case_latency());
        assert_eq!(pool.stats().failed_attempts, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_slot_does_not_block_other_slots() {
        let factory = Arc::new(
            MockWorkerFactory::new(MockBehavior::Verify).with_slot_default(0, MockBehavior::Hang),
        );
        let pool = mock_pool(2, &factory);
        let sample = good_sample();

        let started = tokio::time::Instant::now();
        let results = futures_util::future::join_all(
            (0..4).map(|_| pool.dispatch(&sample, CheckKind::Format)),
        )
        .await;

        assert_eq!(results.len(), 4);
        let succeeded = results
            .iter()
            .filter(|r| r.reward_format == Some(1.0))
            .count();
        assert!(succeeded >= 2, "only {} succeeded", succeeded);
        assert!(started.elapsed() <= pool.config().worst_case_latency());
        assert!(pool.stats().replacements >= 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_loads_stay_balanced_while_in_flight() {
        let factory = Arc::new(MockWorkerFactory::new(MockBehavior::Delay(
            Duration::from_secs(10),
        )));
        let mut config = PoolConfig::for_testing(3);
        config.task_timeout = Duration::from_secs(60);
        let pool = Arc::new(VerifierPool::with_factory(config, factory.clone()).unwrap());

        let handles: Vec<_> = (0..7)
            .map(|_| {
                let pool = Arc::clone(&pool);
                tokio::spawn(async move { pool.dispatch(&good_sample(), CheckKind::Format).await })
            })
            .collect();

        while pool.stats().dispatched < 7 {
            tokio::task::yield_now().await;
        }
        let loads = pool.loads();
        assert_eq!(loads.iter().sum::<usize>(), 7);
        let spread = loads.iter().max().unwrap() - loads.iter().min().unwrap();
        assert!(spread <= 1, "loads: {:?}", loads);

        for handle in handles {
            let result = handle.await.unwrap();
            assert_eq!(result.reward_format, Some(1.0));
        }
        assert_eq!(pool.loads(), vec![0, 0, 0]);
    }

    #[tokio::test]
    async fn test_concurrent_failures_replace_slot_once() {
        let factory = Arc::new(MockWorkerFactory::new(MockBehavior::Verify).with_slot_plan(
            0,
            vec![
                MockBehavior::FailAfter(Duration::from_millis(50)),
                MockBehavior::Verify,
            ],
        ));
        let pool = mock_pool(1, &factory);
        let sample = good_sample();

        let (a, b) = tokio::join!(
            pool.dispatch(&sample, CheckKind::Format),
            pool.dispatch(&sample, CheckKind::Format),
        );

        assert_eq!(a.reward_format, Some(1.0));
        assert_eq!(b.reward_format, Some(1.0));
        assert_eq!(factory.created_for(0), 2);

        let stats = pool.stats();
        assert_eq!(stats.failed_attempts, 2);
        assert_eq!(stats.replacements, 1);
        assert_eq!(stats.slots[0].generation, 1);
        assert_eq!(pool.loads(), vec![0]);
    }

    #[tokio::test]
    async fn test_failed_attempt_is_audited() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = PoolConfig::for_testing(1);
        config.write_failed = true;
        config.audit_path = dir.path().join("failed.jsonl");

        let factory = Arc::new(
            MockWorkerFactory::new(MockBehavior::Verify)
                .with_slot_plan(0, vec![MockBehavior::Fail, MockBehavior::Verify]),
        );
        let pool = VerifierPool::with_factory(config, factory).unwrap();
        let sample = good_sample();

        let result = pool.dispatch(&sample, CheckKind::Format).await;
        assert_eq!(result.reward_format, Some(1.0));

        pool.flush_audit().await;
        let records = pool.audit_log().unwrap().read_all().unwrap();
        assert_eq!(records, vec![sample]);
    }

    #[tokio::test]
    async fn test_held_audit_lock_does_not_delay_retries() {
        use fs2::FileExt;

        let dir = tempfile::tempdir().unwrap();
        let mut config = PoolConfig::for_testing(1);
        config.task_timeout = Duration::from_millis(200);
        config.write_failed = true;
        config.audit_path = dir.path().join("failed.jsonl");
        config.audit_lock_timeout = Duration::from_secs(1);
        let budget = config.worst_case_latency();

        let pool = VerifierPool::with_factory(
            config,
            Arc::new(MockWorkerFactory::new(MockBehavior::Fail)),
        )
        .unwrap();

        let holder = std::fs::OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(pool.audit_log().unwrap().lock_path())
            .unwrap();
        holder.lock_exclusive().unwrap();

        let started = std::time::Instant::now();
        let result = pool.dispatch(&good_sample(), CheckKind::Format).await;
        let elapsed = started.elapsed();

        assert_eq!(result.reward_format, Some(0.0));
        assert!(elapsed <= budget, "took {:?}, budget {:?}", elapsed, budget);

        // Both writes time out on the held lock and are dropped.
        pool.flush_audit().await;
        assert!(pool.audit_log().unwrap().read_all().unwrap().is_empty());
        FileExt::unlock(&holder).unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_dispatch_gives_load_back() {
        let factory = Arc::new(MockWorkerFactory::new(MockBehavior::Delay(
            Duration::from_secs(5),
        )));
        let pool = mock_pool(2, &factory);

        for _ in 0..3 {
            let cancelled = tokio::time::timeout(
                Duration::from_millis(10),
                pool.dispatch(&good_sample(), CheckKind::Format),
            )
            .await;
            assert!(cancelled.is_err());
        }
        assert_eq!(pool.loads(), vec![0, 0]);

        let sample = good_sample();
        let mut first = Box::pin(pool.dispatch(&sample, CheckKind::Format));
        assert!(futures_util::poll!(first.as_mut()).is_pending());
        assert_eq!(pool.loads(), vec![1, 0]);
        drop(first);
        assert_eq!(pool.loads(), vec![0, 0]);

        assert_eq!(pool.stats().replacements, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_balanced_check_gives_load_back() {
        let factory = Arc::new(MockWorkerFactory::new(MockBehavior::Hang));
        let pool = mock_pool(2, &factory);

        let dropped =
            tokio::time::timeout(Duration::from_millis(10), pool.verify_balanced(good_sample()))
                .await;
        assert!(dropped.is_err());
        assert_eq!(pool.loads(), vec![0, 0]);
    }

    #[test]
    fn test_audit_disabled_by_default() {
        let factory = Arc::new(MockWorkerFactory::new(MockBehavior::Verify));
        let pool = mock_pool(1, &factory);
        assert!(pool.audit_log().is_none());
    }

    #[tokio::test]
    async fn test_shutdown_rejects_new_work() {
        let factory = Arc::new(MockWorkerFactory::new(MockBehavior::Verify));
        let pool = mock_pool(2, &factory);

        assert_eq!(pool.shutdown(), 2);
        assert_eq!(pool.shutdown(), 0);
        assert!(pool.is_shut_down());
        assert_eq!(pool.num_workers(), 0);

        let result = pool.dispatch(&good_sample(), CheckKind::Equation).await;
        assert_eq!(result.reward_equation, Some(0.0));
        assert_eq!(factory.call_count(), 0);

        let stats = pool.stats();
        assert!(stats.shut_down);
        assert!(stats.slots.is_empty());
    }
}

mod balanced {
    use super::*;

    #[tokio::test]
    async fn test_rewards_are_combined() {
        let factory = Arc::new(MockWorkerFactory::new(MockBehavior::Verify));
        let pool = mock_pool(2, &factory);

        let result = pool.verify_balanced(good_sample()).await;
        assert_eq!(result.reward_format, Some(1.0));
        assert_eq!(result.reward_equation, Some(1.0));
        assert_eq!(result.reward, Some(2.0));
    }

    #[tokio::test]
    async fn test_format_failure_keeps_equation_reward() {
        let factory = Arc::new(MockWorkerFactory::new(MockBehavior::Verify));
        let pool = mock_pool(2, &factory);
        let sample = Sample::new(
            format!("{}<answer>3+4*2</answer><|im_end|>", COMPLETION_PREFIX),
            "11",
        )
        .with_nums(vec![3, 4, 2]);

        let result = pool.verify_balanced(sample).await;
        assert_eq!(result.reward_format, Some(0.0));
        assert_eq!(result.reward_equation, Some(1.0));
        assert_eq!(result.reward, Some(1.0));
    }

    #[tokio::test]
    async fn test_worker_failure_is_confined_to_its_check() {
        let factory = Arc::new(MockWorkerFactory::new(MockBehavior::FailMatching {
            kind: CheckKind::Equation,
            marker: "poisoned".to_string(),
        }));
        let pool = mock_pool(2, &factory);

        let poisoned =
            Sample::new(completion("poisoned", "3+4*2"), "11").with_nums(vec![3, 4, 2]);
        let (a, b) = tokio::join!(
            pool.verify_balanced(poisoned),
            pool.verify_balanced(good_sample()),
        );

        assert_eq!(a.reward_format, Some(1.0));
        assert_eq!(a.reward_equation, Some(0.0));
        assert_eq!(a.reward, Some(1.0));

        assert_eq!(b.reward_format, Some(1.0));
        assert_eq!(b.reward_equation, Some(1.0));
        assert_eq!(b.reward, Some(2.0));
    }

    #[tokio::test]
    async fn test_batch_preserves_order() {
        let factory = Arc::new(MockWorkerFactory::new(MockBehavior::Verify));
        let pool = mock_pool(3, &factory);

        let samples = vec![
            Sample::new(completion("a", "3+4*2"), "11").with_nums(vec![3, 4, 2]),
            Sample::new(completion("b", "3+4*2"), "14").with_nums(vec![3, 4, 2]),
            Sample::new("garbage", "0"),
        ];
        let results = pool.verify_batch(samples.clone()).await;

        assert_eq!(results.len(), 3);
        for (input, output) in samples.iter().zip(&results) {
            assert_eq!(input.gt_answer, output.gt_answer);
            assert_eq!(input.sample_text, output.sample_text);
        }
        assert_eq!(results[0].reward, Some(2.0));
        assert_eq!(results[1].reward, Some(1.0));
        assert_eq!(results[2].reward, Some(0.0));
    }

    #[tokio::test]
    async fn test_thread_backed_pool_end_to_end() {
        let pool = VerifierPool::new(PoolConfig::for_testing(2)).unwrap();

        let result = pool.verify_balanced(good_sample()).await;
        assert_eq!(result.reward, Some(2.0));
        assert_eq!(pool.stats().succeeded, 2);

        pool.shutdown();
    }
}

mod named_pools {
    use super::*;

    #[test]
    fn test_same_name_shares_pool() {
        let registry = PoolRegistry::new();
        let factory = Arc::new(MockWorkerFactory::new(MockBehavior::Verify));
        let config = PoolConfig::for_testing(2);

        let a = registry
            .get_or_create_with(config.clone(), factory.clone())
            .unwrap();
        let b = registry
            .get_or_create_with(config.clone(), factory.clone())
            .unwrap();

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(factory.created_count(), 2);
        assert_eq!(registry.names(), vec![config.name.clone()]);
    }

    #[test]
    fn test_distinct_names_get_distinct_pools() {
        let registry = PoolRegistry::new();
        let factory = Arc::new(MockWorkerFactory::new(MockBehavior::Verify));

        let a = registry
            .get_or_create_with(PoolConfig::for_testing(1), factory.clone())
            .unwrap();
        let b = registry
            .get_or_create_with(PoolConfig::for_testing(1), factory.clone())
            .unwrap();

        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(registry.names().len(), 2);
    }

    #[test]
    fn test_remove_shuts_pool_down() {
        let registry = PoolRegistry::new();
        let factory = Arc::new(MockWorkerFactory::new(MockBehavior::Verify));
        let config = PoolConfig::for_testing(1);

        let pool = registry.get_or_create_with(config.clone(), factory).unwrap();
        let removed = registry.remove(&config.name).unwrap();

        assert!(Arc::ptr_eq(&pool, &removed));
        assert!(pool.is_shut_down());
        assert!(registry.get(&config.name).is_none());
        assert!(registry.remove(&config.name).is_none());
    }

    #[test]
    fn test_shut_down_pool_is_rebuilt() {
        let registry = PoolRegistry::new();
        let factory = Arc::new(MockWorkerFactory::new(MockBehavior::Verify));
        let config = PoolConfig::for_testing(2);

        let stale = registry
            .get_or_create_with(config.clone(), factory.clone())
            .unwrap();
        stale.shutdown();

        let fresh = registry
            .get_or_create_with(config.clone(), factory.clone())
            .unwrap();
        assert!(!Arc::ptr_eq(&stale, &fresh));
        assert!(!fresh.is_shut_down());
        assert_eq!(fresh.num_workers(), 2);
        assert_eq!(factory.created_count(), 4);

        let found = registry.get(&config.name).unwrap();
        assert!(Arc::ptr_eq(&fresh, &found));
    }

    #[test]
    fn test_invalid_config_is_not_registered() {
        let registry = PoolRegistry::new();
        let factory = Arc::new(MockWorkerFactory::new(MockBehavior::Verify));
        let config = PoolConfig::for_testing(0);

        assert!(registry.get_or_create_with(config.clone(), factory).is_err());
        assert!(registry.get(&config.name).is_none());
    }

    #[test]
    fn test_global_registry_is_process_wide() {
        let factory = Arc::new(MockWorkerFactory::new(MockBehavior::Verify));
        let config = PoolConfig::for_testing(1);

        let pool = global_registry()
            .get_or_create_with(config.clone(), factory)
            .unwrap();
        let found = global_registry().get(&config.name).unwrap();
        assert!(Arc::ptr_eq(&pool, &found));

        global_registry().remove(&config.name);
    }
}
