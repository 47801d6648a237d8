#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use chrono::Utc;
    use collector_core::*;
    use collector_dispatcher::{CollectionExecutor, ExecutorConfig, TierManager};
    use collector_infrastructure::MetricsCollector;
    use collector_testing_utils::{
        assignments_for_tier, fast_retry_policy, lenient_breaker, CollectBehavior,
        MockDataCollector, MockFeaturePipeline, MockTierStore,
    };

    struct Harness {
        collector: MockDataCollector,
        store: MockTierStore,
        features: MockFeaturePipeline,
        executor: CollectionExecutor,
    }

    fn harness_with(
        assignments: Vec<AssetTierAssignment>,
        retry: RetryPolicy,
        breaker: CircuitBreaker,
        config: ExecutorConfig,
    ) -> Harness {
        let collector = MockDataCollector::new();
        let store = MockTierStore::with_assignments(assignments);
        let features = MockFeaturePipeline::new();
        let tier_manager = Arc::new(
            TierManager::new(TierConfig::default_tiers(), Arc::new(store.clone())).unwrap(),
        );

        let executor = CollectionExecutor::new(
            tier_manager,
            Arc::new(collector.clone()),
            Arc::new(store.clone()),
            Some(Arc::new(features.clone())),
            retry,
            breaker,
            config,
            Arc::new(MetricsCollector::new()),
        );

        Harness {
            collector,
            store,
            features,
            executor,
        }
    }

    fn fast_config(sub_batch_size: usize) -> ExecutorConfig {
        ExecutorConfig {
            sub_batch_size,
            sub_batch_delay: Duration::ZERO,
            max_in_flight_jobs: 20,
        }
    }

    fn harness() -> Harness {
        harness_with(vec![], fast_retry_policy(3), lenient_breaker(), fast_config(5))
    }

    fn schedule(tier: TierId, timeframe: Timeframe, assets: &[&str]) -> CollectionSchedule {
        CollectionSchedule::new(
            tier,
            tier,
            timeframe,
            assets.iter().map(|a| a.to_string()).collect(),
            300,
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn test_partial_failures_still_complete_batch() {
        let h = harness();
        let assets: Vec<String> = (0..10).map(|i| format!("A{i}")).collect();
        for i in [0, 3, 6, 9] {
            h.collector
                .set_behavior(&assets[i], CollectBehavior::FailPermanent);
        }
        let refs: Vec<&str> = assets.iter().map(String::as_str).collect();

        let batch = h
            .executor
            .execute_schedule(&schedule(2, Timeframe::OneHour, &refs))
            .await;

        assert_eq!(batch.status, BatchStatus::Completed);
        assert_eq!(batch.success_count, 6);
        assert_eq!(batch.failure_count, 4);
        assert_eq!(batch.success_count + batch.failure_count, 10);
        assert_eq!(batch.total_records, 60);
        assert!(batch.jobs.iter().all(|job| job.status.is_terminal()));

        // 永久错误不重试
        assert_eq!(h.collector.call_count("A0"), 1);
        let failed = batch.jobs.iter().find(|j| j.asset_id == "A3").unwrap();
        assert_eq!(failed.retry_count, 0);
        assert!(failed.error_message.is_some());
    }

    #[tokio::test]
    async fn test_transient_failure_recovers_within_attempts() {
        let h = harness();
        h.collector
            .set_behavior("ETH", CollectBehavior::FailTimesThenSucceed(2));

        let job = h
            .executor
            .execute_job(CollectionJob::new(1, Timeframe::FiveMinutes, "ETH", Utc::now()))
            .await;

        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.retry_count, 2);
        assert_eq!(h.collector.call_count("ETH"), 3);
        assert!(job.started_at.is_some());
        assert!(job.completed_at.is_some());
    }

    #[tokio::test]
    async fn test_exhausted_retries_fail_job() {
        let h = harness();
        h.collector.set_behavior("BTC", CollectBehavior::FailTransient);

        let job = h
            .executor
            .execute_job(CollectionJob::new(1, Timeframe::OneMinute, "BTC", Utc::now()))
            .await;

        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.retry_count, 2);
        assert_eq!(h.collector.call_count("BTC"), 3);
        assert!(job.error_message.unwrap().contains("connection reset"));
    }

    #[tokio::test]
    async fn test_rejected_collection_is_retried() {
        let h = harness();
        h.collector.set_behavior("XRP", CollectBehavior::Reject);

        let job = h
            .executor
            .execute_job(CollectionJob::new(2, Timeframe::OneHour, "XRP", Utc::now()))
            .await;

        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(h.collector.call_count("XRP"), 3);
    }

    #[tokio::test]
    async fn test_lookback_uses_tier_retention() {
        let h = harness();
        h.executor
            .execute_job(CollectionJob::new(1, Timeframe::FifteenMinutes, "SOL", Utc::now()))
            .await;
        h.executor
            .execute_job(CollectionJob::new(4, Timeframe::OneDay, "SOL", Utc::now()))
            .await;

        let calls = h.collector.calls();
        assert_eq!(calls[0].lookback_days, 7);
        assert_eq!(calls[1].lookback_days, 365);
    }

    #[tokio::test]
    async fn test_count_failure_degrades_to_zero_records() {
        let h = harness();
        h.store.set_fail_counts(true);

        let job = h
            .executor
            .execute_job(CollectionJob::new(1, Timeframe::OneMinute, "BTC", Utc::now()))
            .await;

        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.records_collected, 0);
    }

    #[tokio::test]
    async fn test_feature_pipeline_receives_successful_assets() {
        let h = harness();
        h.collector.set_behavior("BAD", CollectBehavior::FailPermanent);

        h.executor
            .execute_schedule(&schedule(2, Timeframe::OneHour, &["BTC", "BAD", "ETH"]))
            .await;

        let triggers = h.features.triggers();
        assert_eq!(triggers.len(), 1);
        assert_eq!(triggers[0].tier, 2);
        assert_eq!(triggers[0].timeframe, Timeframe::OneHour);
        assert_eq!(triggers[0].asset_ids, vec!["BTC", "ETH"]);
    }

    #[tokio::test]
    async fn test_feature_failure_does_not_change_outcome() {
        let h = harness();
        h.features.set_fail(true);

        let batch = h
            .executor
            .execute_schedule(&schedule(2, Timeframe::OneHour, &["BTC"]))
            .await;

        assert_eq!(batch.status, BatchStatus::Completed);
        assert_eq!(h.features.triggers().len(), 1);
    }

    #[tokio::test]
    async fn test_no_feature_trigger_when_all_jobs_fail() {
        let h = harness();
        h.collector
            .set_default_behavior(CollectBehavior::FailPermanent);

        let batch = h
            .executor
            .execute_schedule(&schedule(2, Timeframe::OneHour, &["A", "B"]))
            .await;

        assert_eq!(batch.status, BatchStatus::Failed);
        assert!(h.features.triggers().is_empty());
    }

    #[tokio::test]
    async fn test_sub_batches_bound_concurrency() {
        let h = harness_with(vec![], fast_retry_policy(1), lenient_breaker(), fast_config(2));
        h.collector.set_latency(Duration::from_millis(30));

        let batch = h
            .executor
            .execute_schedule(&schedule(3, Timeframe::OneHour, &["A", "B", "C", "D", "E"]))
            .await;

        assert_eq!(batch.jobs.len(), 5);
        assert_eq!(batch.success_count, 5);
        assert_eq!(h.collector.peak_concurrency(), 2);
    }

    #[tokio::test]
    async fn test_sub_batch_delay_is_applied_between_sub_batches() {
        let h = harness_with(
            vec![],
            fast_retry_policy(1),
            lenient_breaker(),
            ExecutorConfig {
                sub_batch_size: 1,
                sub_batch_delay: Duration::from_millis(50),
                max_in_flight_jobs: 5,
            },
        );

        let started = std::time::Instant::now();
        h.executor
            .execute_schedule(&schedule(3, Timeframe::OneHour, &["A", "B", "C"]))
            .await;

        // 两次间隔，最后一个子批次之后不等待
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(100), "{elapsed:?}");
        assert!(elapsed < Duration::from_millis(150 + 500), "{elapsed:?}");
    }

    #[tokio::test]
    async fn test_open_circuit_fails_fast_without_calling_upstream() {
        let breaker = CircuitBreaker::with_config(
            "upstream",
            CircuitBreakerConfig {
                failure_threshold: 2,
                recovery_timeout: Duration::from_secs(60),
                ..Default::default()
            },
        );
        let h = harness_with(vec![], fast_retry_policy(3), breaker, fast_config(1));
        h.collector
            .set_default_behavior(CollectBehavior::FailTransient);

        let batch = h
            .executor
            .execute_schedule(&schedule(2, Timeframe::OneHour, &["A", "B", "C"]))
            .await;

        assert_eq!(batch.status, BatchStatus::Failed);
        assert_eq!(h.collector.total_calls(), 2);
        assert_eq!(h.executor.breaker().state().await, CircuitState::Open);

        let rejected = &batch.jobs[2];
        assert_eq!(rejected.retry_count, 0);
        assert!(rejected.error_message.as_deref().unwrap().contains("熔断"));
    }

    #[tokio::test]
    async fn test_permanent_asset_failures_leave_upstream_available() {
        let breaker = CircuitBreaker::with_config(
            "upstream",
            CircuitBreakerConfig {
                failure_threshold: 2,
                recovery_timeout: Duration::from_secs(60),
                ..Default::default()
            },
        );
        let h = harness_with(vec![], fast_retry_policy(3), breaker, fast_config(1));
        h.collector
            .set_behavior("DELISTED1", CollectBehavior::FailPermanent);
        h.collector
            .set_behavior("DELISTED2", CollectBehavior::FailPermanent);

        let batch = h
            .executor
            .execute_schedule(&schedule(
                2,
                Timeframe::OneHour,
                &["DELISTED1", "DELISTED2", "BTC", "ETH"],
            ))
            .await;

        assert_eq!(batch.success_count, 2);
        assert_eq!(batch.failure_count, 2);
        assert_eq!(batch.status, BatchStatus::Completed);
        assert_eq!(h.collector.call_count("DELISTED1"), 1);
        assert_eq!(h.collector.call_count("BTC"), 1);

        let stats = h.executor.breaker().stats().await;
        assert_eq!(stats.state, CircuitState::Closed);
        assert_eq!(stats.consecutive_failures, 0);
        assert_eq!(stats.rejected_calls, 0);

        for job in &batch.jobs[2..] {
            assert_eq!(job.status, JobStatus::Completed);
        }
    }

    #[tokio::test]
    async fn test_call_timeout_bounds_job() {
        let breaker = CircuitBreaker::with_config(
            "upstream",
            CircuitBreakerConfig {
                call_timeout: Duration::from_millis(50),
                ..Default::default()
            },
        );
        let h = harness_with(vec![], fast_retry_policy(2), breaker, fast_config(5));
        h.collector
            .set_behavior("SLOW", CollectBehavior::Delay(Duration::from_secs(5)));

        let started = std::time::Instant::now();
        let job = h
            .executor
            .execute_job(CollectionJob::new(1, Timeframe::OneMinute, "SLOW", Utc::now()))
            .await;

        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.retry_count, 1);
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_execute_immediately_produces_one_batch_per_timeframe() {
        let h = harness_with(
            assignments_for_tier("HOT", 1, 3),
            fast_retry_policy(3),
            lenient_breaker(),
            fast_config(5),
        );

        let batches = h.executor.execute_immediately(1, None).await.unwrap();

        let timeframes: Vec<Timeframe> = batches.iter().map(|b| b.timeframe).collect();
        assert_eq!(
            timeframes,
            vec![
                Timeframe::OneMinute,
                Timeframe::FiveMinutes,
                Timeframe::FifteenMinutes
            ]
        );
        assert!(batches.iter().all(|b| b.jobs.len() == 3));
        assert!(batches.iter().all(|b| b.status == BatchStatus::Completed));
        assert_eq!(h.collector.total_calls(), 9);
    }

    #[tokio::test]
    async fn test_execute_immediately_single_timeframe() {
        let h = harness_with(
            assignments_for_tier("ACT", 2, 2),
            fast_retry_policy(3),
            lenient_breaker(),
            fast_config(5),
        );

        let batches = h
            .executor
            .execute_immediately(2, Some(Timeframe::OneHour))
            .await
            .unwrap();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].timeframe, Timeframe::OneHour);
    }

    #[tokio::test]
    async fn test_execute_immediately_with_no_assets() {
        let h = harness();
        let batches = h.executor.execute_immediately(4, None).await.unwrap();
        assert_eq!(batches.len(), 1);
        assert!(batches[0].jobs.is_empty());
        assert_eq!(h.collector.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_execute_immediately_rejects_bad_requests() {
        let h = harness();
        assert!(matches!(
            h.executor.execute_immediately(9, None).await,
            Err(CollectorError::TierNotFound { tier: 9 })
        ));
        assert!(matches!(
            h.executor
                .execute_immediately(1, Some(Timeframe::OneDay))
                .await,
            Err(CollectorError::Configuration(_))
        ));
    }
}
