//! Tick loop and fan-out.
//!
//! `TelemetryBroadcaster` owns the simulator, the subscriber registry and
//! the sink registry. One tick:
//! 1. advances the simulator by the configured interval
//! 2. encodes the new sample into ARINC 429 words
//! 3. offers the push message to every live subscriber
//! 4. starts one POST per enabled external sink
//!
//! Step 3 never waits on a subscriber and step 4 never waits on a response,
//! so a slow or broken consumer cannot stall the loop.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use arinc_core::{FlightDynamics, FlightSample, SimulationSettings};
use arinc_protocol::{
    encode_all, encode_message, Arinc429Word, ArincSnapshot, CodecError, ExternalSinkConfig,
    SinkPayload, TelemetryMessage,
};
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::sinks::{ExternalSinkError, RegistryError, SinkDispatcher, SinkRegistry};
use crate::statistics::{BroadcastStatistics, StatisticsCollector};
use crate::subscription::{SubscriberId, SubscriberRegistry, SubscriberSendError, Subscription};

/// Errors raised while building or running the broadcaster.
#[derive(Debug, Error)]
pub enum BroadcastError {
    #[error("failed to build sink client: {0}")]
    SinkClient(#[from] ExternalSinkError),

    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// One tick's output, shared by every subscriber.
#[derive(Debug, Clone)]
pub struct TelemetryFrame {
    pub sequence: u64,
    pub sample: FlightSample,
    pub words: Vec<Arinc429Word>,
    /// Serialized push message.
    pub message: String,
}

impl TelemetryFrame {
    /// Encode a sample into words and the push message.
    pub fn new(sequence: u64, sample: FlightSample) -> Result<Self, CodecError> {
        let words = encode_all(&sample);
        let message = encode_message(&TelemetryMessage::new(&sample, &words))?;
        Ok(Self {
            sequence,
            sample,
            words,
            message,
        })
    }
}

/// Summary of one tick.
#[derive(Debug, Clone)]
pub struct TickReport {
    pub sequence: u64,
    pub sample: FlightSample,
    pub words: usize,
    pub delivered: usize,
    pub dropped: Vec<(SubscriberId, SubscriberSendError)>,
    pub sinks_dispatched: usize,
}

/// Drives the simulation and distributes every sample.
pub struct TelemetryBroadcaster {
    simulator: RwLock<FlightDynamics>,
    subscribers: SubscriberRegistry,
    sinks: SinkRegistry,
    dispatcher: SinkDispatcher,
    stats: Arc<StatisticsCollector>,
    settings: SimulationSettings,
    sequence: AtomicU64,
    shutdown: CancellationToken,
}

impl TelemetryBroadcaster {
    pub fn new(
        settings: SimulationSettings,
        simulator: FlightDynamics,
    ) -> Result<Self, BroadcastError> {
        let dispatcher = SinkDispatcher::new(settings.sink_timeout, settings.max_concurrent_sinks)?;
        Ok(Self {
            simulator: RwLock::new(simulator),
            subscribers: SubscriberRegistry::new(settings.subscriber_buffer),
            sinks: SinkRegistry::new(),
            dispatcher,
            stats: Arc::new(StatisticsCollector::new()),
            settings,
            sequence: AtomicU64::new(0),
            shutdown: CancellationToken::new(),
        })
    }

    pub fn settings(&self) -> &SimulationSettings {
        &self.settings
    }

    /// Token cancelled when the broadcaster stops.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Run one tick: advance, encode, publish, dispatch.
    pub async fn tick(&self) -> TickReport {
        let dt = self.settings.tick_interval.as_secs_f64();
        let sample = self.simulator.write().await.advance(dt);
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;

        let frame = match TelemetryFrame::new(sequence, sample.clone()) {
            Ok(frame) => Arc::new(frame),
            Err(e) => {
                error!(sequence, "Failed to serialize tick: {}", e);
                self.stats.record_serialize_failure();
                return TickReport {
                    sequence,
                    sample,
                    words: 0,
                    delivered: 0,
                    dropped: Vec::new(),
                    sinks_dispatched: 0,
                };
            }
        };
        let encode_failures = arinc_core::Field::ALL.len() - frame.words.len();

        let publish = self.subscribers.publish(Arc::clone(&frame)).await;
        self.stats.record_dropped(publish.dropped.len());
        self.stats.set_subscribers(self.subscribers.len().await);

        let sinks = self.sinks.enabled().await;
        let sinks_dispatched = if sinks.is_empty() {
            0
        } else {
            match encode_message(&SinkPayload::new(&frame.sample, &frame.words)) {
                Ok(body) => self
                    .dispatcher
                    .dispatch(sinks, Arc::new(body), &self.shutdown, &self.stats),
                Err(e) => {
                    warn!(sequence, "Failed to encode sink payload: {}", e);
                    0
                }
            }
        };

        self.stats.record_tick(encode_failures);
        debug!(
            sequence,
            words = frame.words.len(),
            delivered = publish.delivered,
            sinks = sinks_dispatched,
            "Tick complete"
        );

        TickReport {
            sequence,
            sample,
            words: frame.words.len(),
            delivered: publish.delivered,
            dropped: publish.dropped,
            sinks_dispatched,
        }
    }

    /// Spawn the periodic tick loop.
    pub fn start(self: &Arc<Self>) -> BroadcasterHandle {
        let this = Arc::clone(self);
        let shutdown = self.shutdown.clone();
        let task = tokio::spawn(async move { this.run().await });
        BroadcasterHandle { shutdown, task }
    }

    async fn run(&self) {
        let mut interval = time::interval(self.settings.tick_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(
            interval_ms = self.settings.tick_interval.as_millis() as u64,
            "Broadcaster started"
        );

        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                _ = interval.tick() => {}
            }
            // a tick in progress always completes
            self.tick().await;
        }

        self.subscribers.clear().await;
        self.sinks.clear().await;
        self.stats.set_subscribers(0);
        info!("Broadcaster stopped");
    }

    /// Register a live subscriber.
    pub async fn connect(&self) -> Subscription {
        let subscription = self.subscribers.connect().await;
        self.stats.set_subscribers(self.subscribers.len().await);
        subscription
    }

    pub async fn disconnect(&self, id: SubscriberId) -> bool {
        let removed = self.subscribers.disconnect(id).await;
        self.stats.set_subscribers(self.subscribers.len().await);
        removed
    }

    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.len().await
    }

    /// Most recent sample, `None` before the first tick.
    pub async fn latest(&self) -> Option<FlightSample> {
        self.simulator.read().await.latest().cloned()
    }

    /// Up to `limit` most recent samples, oldest first.
    pub async fn history(&self, limit: Option<usize>) -> Vec<FlightSample> {
        self.simulator.read().await.history(limit)
    }

    /// Latest sample together with its encoding. Does not advance the simulation.
    pub async fn snapshot(&self) -> Option<ArincSnapshot> {
        let sample = self.latest().await?;
        let words = encode_all(&sample);
        Some(ArincSnapshot::new(&sample, &words))
    }

    pub async fn set_rates(&self, heading_rate: f64, altitude_rate: f64, speed_rate: f64) {
        self.simulator
            .write()
            .await
            .set_rates(heading_rate, altitude_rate, speed_rate);
    }

    pub async fn reset_position(&self, latitude: f64, longitude: f64) {
        self.simulator
            .write()
            .await
            .reset_position(latitude, longitude);
    }

    pub async fn sinks(&self) -> Vec<ExternalSinkConfig> {
        self.sinks.list().await
    }

    pub async fn add_sink(&self, config: ExternalSinkConfig) -> Result<usize, RegistryError> {
        self.sinks.add(config).await
    }

    pub async fn remove_sink(&self, index: usize) -> Result<ExternalSinkConfig, RegistryError> {
        self.sinks.remove(index).await
    }

    pub fn statistics(&self) -> BroadcastStatistics {
        self.stats.snapshot()
    }
}

/// Handle to a running tick loop.
pub struct BroadcasterHandle {
    shutdown: CancellationToken,
    task: JoinHandle<()>,
}

impl BroadcasterHandle {
    /// Stop the loop after the current tick and wait for it to finish.
    pub async fn stop(self) {
        self.shutdown.cancel();
        if let Err(e) = self.task.await {
            error!("Broadcaster task failed: {}", e);
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arinc_core::{Perturbation, RateMode};
    use std::time::Duration;

    fn settings() -> SimulationSettings {
        SimulationSettings {
            tick_interval: Duration::from_millis(20),
            history_capacity: 5,
            rate_mode: RateMode::Held,
            ..SimulationSettings::default()
        }
    }

    fn broadcaster() -> TelemetryBroadcaster {
        let settings = settings();
        let sim = FlightDynamics::with_seed(&settings, 7).with_perturbation(Perturbation::none());
        TelemetryBroadcaster::new(settings, sim).unwrap()
    }

    #[tokio::test]
    async fn test_no_sample_before_first_tick() {
        let b = broadcaster();
        assert!(b.latest().await.is_none());
        assert!(b.snapshot().await.is_none());
        assert!(b.history(None).await.is_empty());
    }

    #[tokio::test]
    async fn test_tick_publishes_frame() {
        let b = broadcaster();
        let mut sub = b.connect().await;

        let report = b.tick().await;
        assert_eq!(report.sequence, 1);
        assert_eq!(report.words, 6);
        assert_eq!(report.delivered, 1);

        let frame = sub.recv().await.unwrap();
        assert_eq!(frame.sequence, 1);
        let json: serde_json::Value = serde_json::from_str(&frame.message).unwrap();
        assert_eq!(json["type"], "flight_data");
        assert_eq!(json["arinc_messages"].as_array().unwrap().len(), 6);
        assert_eq!(b.statistics().ticks, 1);
    }

    #[tokio::test]
    async fn test_snapshot_does_not_advance() {
        let b = broadcaster();
        b.tick().await;
        let before = b.latest().await.unwrap();

        let snapshot = b.snapshot().await.unwrap();
        assert_eq!(snapshot.raw_data.len(), 6);
        assert_eq!(b.history(None).await.len(), 1);
        assert_eq!(b.latest().await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_history_is_bounded() {
        let b = broadcaster();
        for _ in 0..8 {
            b.tick().await;
        }
        assert_eq!(b.history(None).await.len(), 5);
        assert_eq!(b.history(Some(2)).await.len(), 2);
    }

    #[tokio::test]
    async fn test_set_rates_and_reset() {
        let b = broadcaster();
        b.set_rates(0.0, 600.0, 0.0).await;
        let sample = b.tick().await.sample;
        assert_eq!(sample.vertical_speed, 600.0);

        b.reset_position(10.0, 20.0).await;
        let sample = b.tick().await.sample;
        assert!((sample.latitude - 10.0).abs() < 0.01);
        assert!((sample.longitude - 20.0).abs() < 0.01);
    }

    #[tokio::test]
    async fn test_stop_releases_subscribers() {
        let b = Arc::new(broadcaster());
        let mut sub = b.connect().await;
        let handle = b.start();

        assert!(sub.recv().await.is_some());
        handle.stop().await;

        assert_eq!(b.subscriber_count().await, 0);
        while sub.recv().await.is_some() {}
    }

    #[tokio::test]
    async fn test_stop_completes_tick_in_progress() {
        let settings = SimulationSettings {
            tick_interval: Duration::from_secs(60),
            ..settings()
        };
        let sim = FlightDynamics::with_seed(&settings, 9);
        let b = Arc::new(TelemetryBroadcaster::new(settings, sim).unwrap());

        // the first tick fires immediately and blocks on the simulator lock
        let guard = b.simulator.read().await;
        let handle = b.start();
        tokio::time::sleep(Duration::from_millis(100)).await;

        let stopping = tokio::spawn(handle.stop());
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!stopping.is_finished());

        drop(guard);
        stopping.await.unwrap();

        assert_eq!(b.history(None).await.len(), 1);
        assert_eq!(b.statistics().ticks, 1);
        assert_eq!(b.subscriber_count().await, 0);
    }
}
