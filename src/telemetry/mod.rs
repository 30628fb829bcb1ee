//! Telemetry for the retrieval pipeline
//!
//! Collects per-stage latencies and outcomes so the CLI can print a session
//! summary. Structured logs go through `tracing`; this collector only keeps
//! counters and a bounded event history.

use colored::Colorize;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::errors::PipelineStage;

const MAX_EVENTS: usize = 1024;

/// Telemetry event types
#[derive(Debug, Clone)]
pub enum TelemetryEvent {
    /// One pipeline stage finished successfully
    StageCompleted {
        stage: PipelineStage,
        duration: Duration,
        items: usize,
        timestamp: Instant,
    },
    /// A full `retrieve` call returned results
    RetrievalCompleted {
        duration: Duration,
        results: usize,
        reranked: bool,
        timestamp: Instant,
    },
    /// A `retrieve` call failed at the given stage
    RetrievalFailed {
        stage: PipelineStage,
        timestamp: Instant,
    },
}

/// Telemetry statistics
#[derive(Debug, Clone, Default)]
pub struct TelemetryStats {
    pub retrievals: usize,
    pub reranked_retrievals: usize,
    pub failures: usize,
    pub embedding_time: Duration,
    pub search_time: Duration,
    pub rerank_time: Duration,
    pub total_time: Duration,
}

impl TelemetryStats {
    /// Mean end-to-end latency of successful retrievals
    pub fn mean_latency(&self) -> Duration {
        if self.retrievals == 0 {
            Duration::ZERO
        } else {
            self.total_time / self.retrievals as u32
        }
    }
}

/// Telemetry collector, cheap to clone and share
#[derive(Clone)]
pub struct RetrievalTelemetry {
    events: Arc<Mutex<VecDeque<TelemetryEvent>>>,
    stats: Arc<Mutex<TelemetryStats>>,
    start_time: Instant,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl RetrievalTelemetry {
    pub fn new() -> Self {
        Self {
            events: Arc::new(Mutex::new(VecDeque::with_capacity(MAX_EVENTS))),
            stats: Arc::new(Mutex::new(TelemetryStats::default())),
            start_time: Instant::now(),
        }
    }

    /// Record an event
    pub fn record(&self, event: TelemetryEvent) {
        {
            let mut stats = lock(&self.stats);
            match &event {
                TelemetryEvent::StageCompleted {
                    stage, duration, ..
                } => match stage {
                    PipelineStage::Embedding => stats.embedding_time += *duration,
                    PipelineStage::Store => stats.search_time += *duration,
                    PipelineStage::Rerank => stats.rerank_time += *duration,
                    PipelineStage::Validation | PipelineStage::Other => {}
                },
                TelemetryEvent::RetrievalCompleted {
                    duration, reranked, ..
                } => {
                    stats.retrievals += 1;
                    stats.total_time += *duration;
                    if *reranked {
                        stats.reranked_retrievals += 1;
                    }
                }
                TelemetryEvent::RetrievalFailed { .. } => {
                    stats.failures += 1;
                }
            }
        }

        let mut events = lock(&self.events);
        if events.len() == MAX_EVENTS {
            events.pop_front();
        }
        events.push_back(event);
    }

    /// Shorthand for a successful stage
    pub fn stage(&self, stage: PipelineStage, started: Instant, items: usize) {
        self.record(TelemetryEvent::StageCompleted {
            stage,
            duration: started.elapsed(),
            items,
            timestamp: Instant::now(),
        });
    }

    /// Get current statistics
    pub fn get_stats(&self) -> TelemetryStats {
        lock(&self.stats).clone()
    }

    /// Get elapsed time since start
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Get event count
    pub fn event_count(&self) -> usize {
        lock(&self.events).len()
    }

    /// Get recent events (last n)
    pub fn recent_events(&self, n: usize) -> Vec<TelemetryEvent> {
        let events = lock(&self.events);
        let start = events.len().saturating_sub(n);
        events.iter().skip(start).cloned().collect()
    }

    /// Fraction of retrievals that succeeded
    pub fn success_rate(&self) -> f64 {
        let stats = lock(&self.stats);
        let total = stats.retrievals + stats.failures;
        if total == 0 {
            1.0
        } else {
            stats.retrievals as f64 / total as f64
        }
    }

    /// Print summary statistics
    pub fn display_summary(&self) {
        let stats = self.get_stats();

        println!("\n{}", "Retrieval Summary".bold());
        println!("─────────────────────────────────────");
        println!("Session:           {:?}", self.elapsed());
        println!("Retrievals:        {} ({} reranked)", stats.retrievals, stats.reranked_retrievals);
        println!("Failures:          {}", stats.failures);
        println!("Success rate:      {:.1}%", self.success_rate() * 100.0);
        println!("Mean latency:      {:?}", stats.mean_latency());
        println!("  embedding:       {:?}", stats.embedding_time);
        println!("  vector search:   {:?}", stats.search_time);
        println!("  reranking:       {:?}", stats.rerank_time);
        println!();
    }
}

impl Default for RetrievalTelemetry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn completed(ms: u64, reranked: bool) -> TelemetryEvent {
        TelemetryEvent::RetrievalCompleted {
            duration: Duration::from_millis(ms),
            results: 5,
            reranked,
            timestamp: Instant::now(),
        }
    }

    #[test]
    fn test_collector_creation() {
        let telemetry = RetrievalTelemetry::new();
        assert_eq!(telemetry.event_count(), 0);
        assert_eq!(telemetry.get_stats().retrievals, 0);
        assert_eq!(telemetry.success_rate(), 1.0);
    }

    #[test]
    fn test_stage_times_accumulate() {
        let telemetry = RetrievalTelemetry::new();
        for stage in [PipelineStage::Embedding, PipelineStage::Rerank, PipelineStage::Rerank] {
            telemetry.record(TelemetryEvent::StageCompleted {
                stage,
                duration: Duration::from_millis(10),
                items: 20,
                timestamp: Instant::now(),
            });
        }
        let stats = telemetry.get_stats();
        assert_eq!(stats.embedding_time, Duration::from_millis(10));
        assert_eq!(stats.rerank_time, Duration::from_millis(20));
        assert_eq!(stats.search_time, Duration::ZERO);
    }

    #[test]
    fn test_success_rate_and_mean_latency() {
        let telemetry = RetrievalTelemetry::new();
        telemetry.record(completed(100, true));
        telemetry.record(completed(300, false));
        telemetry.record(TelemetryEvent::RetrievalFailed {
            stage: PipelineStage::Store,
            timestamp: Instant::now(),
        });

        let stats = telemetry.get_stats();
        assert_eq!(stats.retrievals, 2);
        assert_eq!(stats.reranked_retrievals, 1);
        assert_eq!(stats.mean_latency(), Duration::from_millis(200));
        assert!((telemetry.success_rate() - 0.666).abs() < 0.01);
    }

    #[test]
    fn test_event_history_is_bounded() {
        let telemetry = RetrievalTelemetry::new();
        for _ in 0..(MAX_EVENTS + 10) {
            telemetry.record(completed(1, false));
        }
        assert_eq!(telemetry.event_count(), MAX_EVENTS);
        assert_eq!(telemetry.recent_events(3).len(), 3);
        assert_eq!(telemetry.get_stats().retrievals, MAX_EVENTS + 10);
    }

    #[test]
    fn test_full_history_drops_oldest_event() {
        let telemetry = RetrievalTelemetry::new();
        telemetry.record(completed(7, true));
        for _ in 0..MAX_EVENTS {
            telemetry.record(completed(1, false));
        }
        let oldest = telemetry.recent_events(MAX_EVENTS);
        assert_eq!(oldest.len(), MAX_EVENTS);
        assert!(oldest.iter().all(|event| matches!(
            event,
            TelemetryEvent::RetrievalCompleted { reranked: false, .. }
        )));

        telemetry.record(TelemetryEvent::RetrievalFailed {
            stage: PipelineStage::Rerank,
            timestamp: Instant::now(),
        });
        let last = telemetry.recent_events(1);
        assert!(matches!(
            last[0],
            TelemetryEvent::RetrievalFailed { stage: PipelineStage::Rerank, .. }
        ));
        assert_eq!(telemetry.event_count(), MAX_EVENTS);
        assert_eq!(telemetry.get_stats().retrievals, MAX_EVENTS + 1);
        assert_eq!(telemetry.get_stats().failures, 1);
    }

    #[test]
    fn test_clones_share_state() {
        let telemetry = RetrievalTelemetry::new();
        let clone = telemetry.clone();
        clone.record(completed(5, true));
        assert_eq!(telemetry.get_stats().retrievals, 1);
    }
}
