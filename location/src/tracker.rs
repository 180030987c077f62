use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{debug, error, info, trace};

use crate::{LocationBackend, LocationDelegate, Position, Provider, ProviderReading, UpdateConfig};

/// What [`LocationTracker::current_position_string`] returns when no
/// position is known.
pub const UNKNOWN_POSITION: &str = "null";

#[derive(Debug, Default)]
struct TrackerState {
    position: Option<Position>,
    // Set by the first live reading and never cleared. Once set, cached fixes
    // are ignored.
    has_live: bool,
}

/// The position cell shared between the tracker and its subscriptions.
#[derive(Default)]
struct PositionCell {
    state: Mutex<TrackerState>,
}

impl PositionCell {
    fn lock(&self) -> MutexGuard<'_, TrackerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for PositionCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PositionCell")
            .field("position", &self.lock().position)
            .finish()
    }
}

impl LocationDelegate for PositionCell {
    fn on_reading(&self, reading: ProviderReading) {
        trace!("{} reported {}", reading.provider, reading.position);
        let mut state = self.lock();
        state.position = Some(reading.position);
        state.has_live = true;
    }
}

/// Tracks the device position from the GPS and network providers.
///
/// The latest live reading from either provider wins, regardless of which
/// provider it came from. Until a live reading arrives the tracker falls back
/// to the GPS provider's cached fix, then the network provider's.
#[derive(Debug)]
pub struct LocationTracker<B> {
    backend: B,
    config: UpdateConfig,
    cell: Arc<PositionCell>,
    subscribed: Mutex<Vec<Provider>>,
}

impl<B: LocationBackend> LocationTracker<B> {
    /// Create a tracker with the default update thresholds.
    pub fn new(backend: B) -> Self {
        Self::with_config(backend, UpdateConfig::default())
    }

    /// Create a tracker with custom update thresholds.
    pub fn with_config(backend: B, config: UpdateConfig) -> Self {
        Self {
            backend,
            config,
            cell: Arc::default(),
            subscribed: Mutex::new(Vec::new()),
        }
    }

    /// The update thresholds in use.
    pub const fn config(&self) -> &UpdateConfig {
        &self.config
    }

    /// Subscribe to every enabled provider and seed the position from cache.
    ///
    /// The cache is only consulted while no live reading has ever arrived.
    /// Does nothing if neither provider is enabled. A provider that rejects
    /// the subscription is logged and skipped; the other one is still tried.
    /// Providers already subscribed by an earlier call are left as they are.
    pub fn start_updates(&self) {
        let enabled: Vec<Provider> = Provider::ALL
            .into_iter()
            .filter(|p| self.backend.is_provider_enabled(*p))
            .collect();

        if enabled.is_empty() {
            info!("no location provider enabled, not starting updates");
            return;
        }

        let delegate: Arc<dyn LocationDelegate> = self.cell.clone();
        {
            let mut subscribed = self.subscribed();
            for provider in enabled {
                if subscribed.contains(&provider) {
                    continue;
                }
                match self
                    .backend
                    .subscribe(provider, &self.config, Arc::clone(&delegate))
                {
                    Ok(()) => {
                        debug!("requested location updates from {provider}");
                        subscribed.push(provider);
                    }
                    Err(err) => error!("requesting location updates from {provider} failed: {err}"),
                }
            }
        }

        self.seed_from_cache();
    }

    /// Unsubscribe from every provider. The last known position is kept.
    pub fn stop_updates(&self) {
        let providers: Vec<Provider> = self.subscribed().drain(..).collect();
        for provider in providers {
            self.backend.unsubscribe(provider);
            debug!("stopped location updates from {provider}");
        }
    }

    /// Whether any provider subscription is active.
    pub fn is_updating(&self) -> bool {
        !self.subscribed().is_empty()
    }

    /// The best known position, if any.
    pub fn current_position(&self) -> Option<Position> {
        self.cell.lock().position
    }

    /// The best known position as `latitude,longitude`, or
    /// [`UNKNOWN_POSITION`] if there is none.
    pub fn current_position_string(&self) -> String {
        self.current_position().map_or_else(
            || {
                debug!("current position is unknown");
                UNKNOWN_POSITION.to_string()
            },
            |position| position.to_string(),
        )
    }

    /// Great-circle distance in kilometers. See [`crate::distance_km`].
    #[must_use]
    pub fn distance_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
        crate::distance_km(lat1, lon1, lat2, lon2)
    }

    fn seed_from_cache(&self) {
        if self.cell.lock().has_live {
            return;
        }

        let cached = self
            .backend
            .last_known_location(Provider::Gps)
            .or_else(|| self.backend.last_known_location(Provider::Network));

        let Some(position) = cached else {
            debug!("no cached location available");
            return;
        };

        let mut state = self.cell.lock();
        if state.has_live {
            return;
        }
        state.position = Some(position);
    }

    fn subscribed(&self) -> MutexGuard<'_, Vec<Provider>> {
        self.subscribed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::thread;

    use super::*;
    use crate::LocationError;

    #[derive(Default)]
    struct FakeBackend {
        enabled: Vec<Provider>,
        rejecting: Vec<Provider>,
        cached: HashMap<Provider, Position>,
        delegates: Mutex<HashMap<Provider, Arc<dyn LocationDelegate>>>,
        subscribe_calls: Mutex<Vec<Provider>>,
        unsubscribe_calls: Mutex<Vec<Provider>>,
        // A reading the OS delivers synchronously while subscribing.
        immediate: Option<ProviderReading>,
    }

    impl FakeBackend {
        fn enabled(providers: &[Provider]) -> Self {
            Self {
                enabled: providers.to_vec(),
                ..Self::default()
            }
        }

        fn cache(mut self, provider: Provider, position: Position) -> Self {
            self.cached.insert(provider, position);
            self
        }

        fn deliver(&self, provider: Provider, latitude: f64, longitude: f64) {
            let delegate = self.delegates.lock().unwrap().get(&provider).cloned();
            delegate
                .expect("provider not subscribed")
                .on_reading(ProviderReading {
                    provider,
                    position: Position::new(latitude, longitude),
                });
        }

        fn subscribe_calls(&self) -> Vec<Provider> {
            self.subscribe_calls.lock().unwrap().clone()
        }
    }

    impl LocationBackend for FakeBackend {
        fn is_provider_enabled(&self, provider: Provider) -> bool {
            self.enabled.contains(&provider)
        }

        fn subscribe(
            &self,
            provider: Provider,
            config: &UpdateConfig,
            delegate: Arc<dyn LocationDelegate>,
        ) -> Result<(), LocationError> {
            assert_eq!(*config, UpdateConfig::default());
            self.subscribe_calls.lock().unwrap().push(provider);
            if self.rejecting.contains(&provider) {
                return Err(LocationError::SubscriptionFailed {
                    provider,
                    reason: "SecurityException".into(),
                });
            }
            if let Some(reading) = self.immediate {
                delegate.on_reading(reading);
            }
            self.delegates.lock().unwrap().insert(provider, delegate);
            Ok(())
        }

        fn unsubscribe(&self, provider: Provider) {
            self.unsubscribe_calls.lock().unwrap().push(provider);
            self.delegates.lock().unwrap().remove(&provider);
        }

        fn last_known_location(&self, provider: Provider) -> Option<Position> {
            self.cached.get(&provider).copied()
        }
    }

    #[test]
    fn unknown_without_readings_or_cache() {
        let backend = FakeBackend::enabled(&Provider::ALL);
        let tracker = LocationTracker::new(&backend);

        assert_eq!(tracker.current_position_string(), "null");
        tracker.start_updates();
        assert_eq!(tracker.current_position(), None);
        assert_eq!(tracker.current_position_string(), UNKNOWN_POSITION);
    }

    #[test]
    fn single_reading_is_reported() {
        let backend = FakeBackend::enabled(&Provider::ALL);
        let tracker = LocationTracker::new(&backend);
        tracker.start_updates();

        backend.deliver(Provider::Network, 37.5, 127.0);
        assert_eq!(tracker.current_position_string(), "37.5,127.0");
    }

    #[test]
    fn latest_reading_wins_across_providers() {
        let backend = FakeBackend::enabled(&Provider::ALL);
        let tracker = LocationTracker::new(&backend);
        tracker.start_updates();

        backend.deliver(Provider::Gps, 37.5, 127.0);
        backend.deliver(Provider::Network, 35.1, 129.0);
        assert_eq!(tracker.current_position_string(), "35.1,129.0");

        backend.deliver(Provider::Gps, 37.6, 127.1);
        assert_eq!(tracker.current_position(), Some(Position::new(37.6, 127.1)));
    }

    #[test]
    fn gps_cache_preferred_over_network_cache() {
        let backend = FakeBackend::enabled(&Provider::ALL)
            .cache(Provider::Gps, Position::new(1.0, 2.0))
            .cache(Provider::Network, Position::new(3.0, 4.0));
        let tracker = LocationTracker::new(&backend);
        tracker.start_updates();

        assert_eq!(tracker.current_position(), Some(Position::new(1.0, 2.0)));
    }

    #[test]
    fn network_cache_used_when_gps_has_none() {
        let backend = FakeBackend::enabled(&[Provider::Gps])
            .cache(Provider::Network, Position::new(3.0, 4.0));
        let tracker = LocationTracker::new(&backend);
        tracker.start_updates();

        assert_eq!(tracker.current_position_string(), "3.0,4.0");
    }

    #[test]
    fn cache_never_replaces_live_reading() {
        let mut backend =
            FakeBackend::enabled(&Provider::ALL).cache(Provider::Gps, Position::new(1.0, 2.0));
        backend.immediate = Some(ProviderReading {
            provider: Provider::Network,
            position: Position::new(5.0, 6.0),
        });
        let tracker = LocationTracker::new(&backend);
        tracker.start_updates();

        assert_eq!(tracker.current_position(), Some(Position::new(5.0, 6.0)));
    }

    #[test]
    fn restart_keeps_live_reading() {
        let backend =
            FakeBackend::enabled(&Provider::ALL).cache(Provider::Gps, Position::new(1.0, 2.0));
        let tracker = LocationTracker::new(&backend);
        tracker.start_updates();
        assert_eq!(tracker.current_position(), Some(Position::new(1.0, 2.0)));

        backend.deliver(Provider::Network, 10.0, 20.0);
        tracker.start_updates();
        assert_eq!(tracker.current_position(), Some(Position::new(10.0, 20.0)));

        tracker.stop_updates();
        tracker.start_updates();
        assert_eq!(tracker.current_position(), Some(Position::new(10.0, 20.0)));
    }

    #[test]
    fn disabled_providers_are_left_alone() {
        let backend = FakeBackend::default().cache(Provider::Gps, Position::new(1.0, 2.0));
        let tracker = LocationTracker::new(&backend);
        tracker.start_updates();

        assert!(backend.subscribe_calls().is_empty());
        assert_eq!(tracker.current_position(), None);
        assert!(!tracker.is_updating());
    }

    #[test]
    fn disabled_start_keeps_previous_position() {
        let backend = FakeBackend::enabled(&Provider::ALL);
        let tracker = LocationTracker::new(&backend);
        tracker.start_updates();
        backend.deliver(Provider::Gps, 10.0, 20.0);

        let disabled = FakeBackend::default();
        let other = LocationTracker {
            backend: &disabled,
            config: UpdateConfig::default(),
            cell: Arc::clone(&tracker.cell),
            subscribed: Mutex::new(Vec::new()),
        };
        other.start_updates();

        assert!(disabled.subscribe_calls().is_empty());
        assert_eq!(tracker.current_position(), Some(Position::new(10.0, 20.0)));
    }

    #[test]
    fn only_enabled_provider_is_subscribed() {
        let backend = FakeBackend::enabled(&[Provider::Network]);
        let tracker = LocationTracker::new(&backend);
        tracker.start_updates();

        assert_eq!(backend.subscribe_calls(), vec![Provider::Network]);
    }

    #[test]
    fn rejected_subscription_does_not_block_the_other() {
        let mut backend = FakeBackend::enabled(&Provider::ALL);
        backend.rejecting = vec![Provider::Gps];
        let tracker = LocationTracker::new(&backend);
        tracker.start_updates();

        assert_eq!(backend.subscribe_calls(), vec![Provider::Gps, Provider::Network]);
        backend.deliver(Provider::Network, 37.5, 127.0);
        assert_eq!(tracker.current_position_string(), "37.5,127.0");
    }

    #[test]
    fn restart_does_not_duplicate_subscriptions() {
        let backend = FakeBackend::enabled(&Provider::ALL);
        let tracker = LocationTracker::new(&backend);
        tracker.start_updates();
        tracker.start_updates();

        assert_eq!(backend.subscribe_calls(), vec![Provider::Gps, Provider::Network]);
    }

    #[test]
    fn stop_unsubscribes_and_keeps_position() {
        let backend = FakeBackend::enabled(&Provider::ALL);
        let tracker = LocationTracker::new(&backend);
        tracker.start_updates();
        backend.deliver(Provider::Gps, 37.5, 127.0);

        tracker.stop_updates();
        tracker.stop_updates();

        assert_eq!(
            *backend.unsubscribe_calls.lock().unwrap(),
            vec![Provider::Gps, Provider::Network]
        );
        assert!(!tracker.is_updating());
        assert_eq!(tracker.current_position_string(), "37.5,127.0");
    }

    #[test]
    fn readings_from_other_threads() {
        let backend = Arc::new(FakeBackend::enabled(&Provider::ALL));
        let tracker = LocationTracker::new(Arc::clone(&backend));
        tracker.start_updates();

        let handles: Vec<_> = Provider::ALL
            .into_iter()
            .map(|provider| {
                let backend = Arc::clone(&backend);
                thread::spawn(move || {
                    for i in 0..100 {
                        backend.deliver(provider, f64::from(i), f64::from(i));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(tracker.current_position(), Some(Position::new(99.0, 99.0)));
    }
}
