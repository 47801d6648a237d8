//! Mock implementations of the collaborator traits
//!
//! All mocks are cheap to clone and share their state, so a test can keep a
//! handle for assertions after passing an `Arc` of the mock to the code under test.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use collector_core::{
    AssetTierAssignment, CollectorError, CollectorResult, DataCollector, FeaturePipeline, TierId,
    TierStore, Timeframe,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Scripted behaviour of [`MockDataCollector`] for one asset
#[derive(Debug, Clone, PartialEq)]
pub enum CollectBehavior {
    /// `Ok(true)`
    Succeed,
    /// `Ok(false)`
    Reject,
    /// Always a retryable network error
    FailTransient,
    /// Always a permanent invalid-asset error
    FailPermanent,
    /// Retryable failures for the first `n` calls, then success
    FailTimesThenSucceed(u32),
    /// Sleep before succeeding
    Delay(Duration),
}

/// A single recorded `collect` call
#[derive(Debug, Clone, PartialEq)]
pub struct CollectCall {
    pub asset_id: String,
    pub timeframe: Timeframe,
    pub lookback_days: u32,
}

/// Mock implementation of DataCollector for testing
#[derive(Debug, Clone)]
pub struct MockDataCollector {
    behaviors: Arc<Mutex<HashMap<String, CollectBehavior>>>,
    default_behavior: Arc<Mutex<CollectBehavior>>,
    calls: Arc<Mutex<Vec<CollectCall>>>,
    latency: Arc<Mutex<Duration>>,
    active: Arc<AtomicUsize>,
    peak_concurrency: Arc<AtomicUsize>,
}

impl MockDataCollector {
    pub fn new() -> Self {
        Self {
            behaviors: Arc::new(Mutex::new(HashMap::new())),
            default_behavior: Arc::new(Mutex::new(CollectBehavior::Succeed)),
            calls: Arc::new(Mutex::new(Vec::new())),
            latency: Arc::new(Mutex::new(Duration::ZERO)),
            active: Arc::new(AtomicUsize::new(0)),
            peak_concurrency: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn set_behavior(&self, asset_id: &str, behavior: CollectBehavior) {
        self.behaviors
            .lock()
            .unwrap()
            .insert(asset_id.to_string(), behavior);
    }

    pub fn set_default_behavior(&self, behavior: CollectBehavior) {
        *self.default_behavior.lock().unwrap() = behavior;
    }

    /// Latency applied to every call, before the scripted behaviour
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().unwrap() = latency;
    }

    pub fn calls(&self) -> Vec<CollectCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn call_count(&self, asset_id: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|call| call.asset_id == asset_id)
            .count()
    }

    /// Highest number of `collect` calls observed running at once
    pub fn peak_concurrency(&self) -> usize {
        self.peak_concurrency.load(Ordering::SeqCst)
    }

    fn behavior_for(&self, asset_id: &str) -> CollectBehavior {
        self.behaviors
            .lock()
            .unwrap()
            .get(asset_id)
            .cloned()
            .unwrap_or_else(|| self.default_behavior.lock().unwrap().clone())
    }
}

impl Default for MockDataCollector {
    fn default() -> Self {
        Self::new()
    }
}

struct ActiveGuard(Arc<AtomicUsize>);

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl DataCollector for MockDataCollector {
    async fn collect(
        &self,
        asset_id: &str,
        timeframe: Timeframe,
        lookback_days: u32,
    ) -> CollectorResult<bool> {
        let attempt = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(CollectCall {
                asset_id: asset_id.to_string(),
                timeframe,
                lookback_days,
            });
            calls.iter().filter(|call| call.asset_id == asset_id).count() as u32
        };

        let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        let _guard = ActiveGuard(self.active.clone());
        self.peak_concurrency.fetch_max(now_active, Ordering::SeqCst);

        let latency = *self.latency.lock().unwrap();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        match self.behavior_for(asset_id) {
            CollectBehavior::Succeed => Ok(true),
            CollectBehavior::Reject => Ok(false),
            CollectBehavior::FailTransient => Err(CollectorError::Network(format!(
                "connection reset while collecting {asset_id}"
            ))),
            CollectBehavior::FailPermanent => Err(CollectorError::InvalidAsset(asset_id.to_string())),
            CollectBehavior::FailTimesThenSucceed(n) if attempt <= n => Err(
                CollectorError::Timeout(format!("attempt {attempt} for {asset_id} timed out")),
            ),
            CollectBehavior::FailTimesThenSucceed(_) => Ok(true),
            CollectBehavior::Delay(delay) => {
                tokio::time::sleep(delay).await;
                Ok(true)
            }
        }
    }
}

/// Mock implementation of TierStore for testing
#[derive(Debug, Clone)]
pub struct MockTierStore {
    assignments: Arc<Mutex<Vec<AssetTierAssignment>>>,
    records_per_asset: Arc<Mutex<i64>>,
    fail_assignments: Arc<AtomicBool>,
    fail_counts: Arc<AtomicBool>,
    assignment_reads: Arc<AtomicUsize>,
}

impl MockTierStore {
    pub fn new() -> Self {
        Self::with_assignments(Vec::new())
    }

    pub fn with_assignments(assignments: Vec<AssetTierAssignment>) -> Self {
        Self {
            assignments: Arc::new(Mutex::new(assignments)),
            records_per_asset: Arc::new(Mutex::new(10)),
            fail_assignments: Arc::new(AtomicBool::new(false)),
            fail_counts: Arc::new(AtomicBool::new(false)),
            assignment_reads: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn set_assignments(&self, assignments: Vec<AssetTierAssignment>) {
        *self.assignments.lock().unwrap() = assignments;
    }

    /// Value returned by every `count_records_since` call
    pub fn set_records_per_asset(&self, records: i64) {
        *self.records_per_asset.lock().unwrap() = records;
    }

    pub fn set_fail_assignments(&self, fail: bool) {
        self.fail_assignments.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_counts(&self, fail: bool) {
        self.fail_counts.store(fail, Ordering::SeqCst);
    }

    pub fn assignment_reads(&self) -> usize {
        self.assignment_reads.load(Ordering::SeqCst)
    }
}

impl Default for MockTierStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TierStore for MockTierStore {
    async fn get_tier_assignments(&self) -> CollectorResult<Vec<AssetTierAssignment>> {
        self.assignment_reads.fetch_add(1, Ordering::SeqCst);
        if self.fail_assignments.load(Ordering::SeqCst) {
            return Err(CollectorError::Connection("mock store unavailable".to_string()));
        }
        Ok(self.assignments.lock().unwrap().clone())
    }

    async fn count_records_since(
        &self,
        _asset_id: &str,
        _timeframe: Timeframe,
        _since: DateTime<Utc>,
    ) -> CollectorResult<i64> {
        if self.fail_counts.load(Ordering::SeqCst) {
            return Err(CollectorError::Query("mock count failed".to_string()));
        }
        Ok(*self.records_per_asset.lock().unwrap())
    }
}

/// A single recorded feature trigger
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureTrigger {
    pub tier: TierId,
    pub timeframe: Timeframe,
    pub asset_ids: Vec<String>,
}

/// Mock implementation of FeaturePipeline for testing
#[derive(Debug, Clone, Default)]
pub struct MockFeaturePipeline {
    triggers: Arc<Mutex<Vec<FeatureTrigger>>>,
    fail: Arc<AtomicBool>,
}

impl MockFeaturePipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn triggers(&self) -> Vec<FeatureTrigger> {
        self.triggers.lock().unwrap().clone()
    }
}

#[async_trait]
impl FeaturePipeline for MockFeaturePipeline {
    async fn trigger(
        &self,
        tier: TierId,
        timeframe: Timeframe,
        asset_ids: &[String],
    ) -> CollectorResult<()> {
        self.triggers.lock().unwrap().push(FeatureTrigger {
            tier,
            timeframe,
            asset_ids: asset_ids.to_vec(),
        });
        if self.fail.load(Ordering::SeqCst) {
            return Err(CollectorError::Upstream("feature service down".to_string()));
        }
        Ok(())
    }
}
