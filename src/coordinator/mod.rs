//! Single-radio mode coordinator
//!
//! [`ModeCoordinator`] owns the radio, the session store and the uplink
//! scheduler, and runs every piece of work from one event queue. Radio
//! receive callbacks and the uplink timer only enqueue [`Event`]s; the
//! dispatcher drains them one at a time, so relaying, uplinks and mode
//! switches never overlap.
//!
//! A dual-role node spends its time in relay mode. Each uplink tick borrows
//! the radio for one joined-network transmission:
//!
//! 1. configure the joined-network profile
//! 2. restore the session and load it into the radio
//! 3. send one uplink
//! 4. save the session
//! 5. configure the relay profile again
//!
//! Every reconfiguration starts a new radio epoch, so frames received while
//! the switch was under way are recognised as stale and dropped (and
//! logged) when they reach the front of the queue.

mod event;
mod state;

pub use self::event::{CoordinatorHandle, Event, Upstream, UpstreamRoute};
pub use self::state::{CoordinatorState, Phase, RadioHolder, StateInfo, Stats};

use std::ops::ControlFlow;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::core::{
    DeviceRole, Error, Frame, NodeIdentity, RelayConfig, Result, MAX_FRAME_SIZE,
};
use crate::radio::{RadioController, RadioDriver, RadioProfile, ReceivedFrame};
use crate::relay::{HopRelay, RelayDecision};
use crate::session::{Credentials, Joiner, Session, SessionStore};
use crate::uplink::{PeriodicTimer, TimerHandle, UplinkScheduler};
use crate::util::to_hex;

/// Capacity of the dispatcher queue
pub const QUEUE_CAPACITY: usize = 32;

/// State machine arbitrating the node's single radio
pub struct ModeCoordinator<D: RadioDriver, S: SessionStore> {
    identity: NodeIdentity,
    relay: HopRelay,
    relay_profile: RadioProfile,
    joined_profile: RadioProfile,
    radio: RadioController<D>,
    store: S,
    scheduler: UplinkScheduler,
    upstream: UpstreamRoute,
    state: CoordinatorState,
    events_tx: Option<mpsc::Sender<Event>>,
    events_rx: Option<mpsc::Receiver<Event>>,
    timer: Option<TimerHandle>,
}

impl<D: RadioDriver, S: SessionStore> ModeCoordinator<D, S> {
    pub fn new(
        identity: NodeIdentity,
        relay_profile: RadioProfile,
        joined_profile: RadioProfile,
        driver: D,
        store: S,
    ) -> Self {
        ModeCoordinator {
            relay: HopRelay::new(identity.level),
            identity,
            relay_profile,
            joined_profile,
            radio: RadioController::new(driver),
            store,
            scheduler: UplinkScheduler::default(),
            upstream: UpstreamRoute::default(),
            state: CoordinatorState::default(),
            events_tx: None,
            events_rx: None,
            timer: None,
        }
    }

    /// Builds a coordinator from validated configuration
    pub fn from_config(config: &RelayConfig, driver: D, store: S) -> Result<Self> {
        config.validate()?;
        let identity = config.identity()?;
        let scheduler = if identity.role.originates() {
            UplinkScheduler::new(config.uplink_period)?
        } else {
            UplinkScheduler::default()
        };
        Ok(Self::new(
            identity,
            config.relay_profile()?,
            config.joined_profile()?,
            driver,
            store,
        )
        .with_scheduler(scheduler))
    }

    pub fn with_scheduler(mut self, scheduler: UplinkScheduler) -> Self {
        self.scheduler = scheduler;
        self
    }

    /// Sends forwarded frames to `upstream` instead of re-transmitting them
    pub fn with_upstream(mut self, upstream: impl Upstream + 'static) -> Self {
        self.upstream = UpstreamRoute::Collaborator(Box::new(upstream));
        self
    }

    /// Brings the node online in the mode its role calls for.
    ///
    /// Roles that originate uplinks join with `credentials` and save the
    /// session; without credentials a previously saved session is reused.
    pub fn start(&mut self, joiner: &mut dyn Joiner, credentials: Option<&Credentials>) -> Result<()> {
        if !self.state.phase.is_idle() {
            return Err(Error::invalid_state(format!(
                "coordinator already {}",
                self.state.phase
            )));
        }

        match self.activate(joiner, credentials) {
            Ok(()) => {
                self.state.enter(Phase::active(self.identity.role));
                info!(
                    id = %self.identity.id,
                    level = %self.identity.level,
                    role = ?self.identity.role,
                    "Relay node online, radio at {}",
                    self.relay_profile
                );
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "Failed to start");
                if let Err(cleanup) = self.teardown() {
                    warn!(error = %cleanup, "Cleanup after failed start");
                }
                Err(e)
            }
        }
    }

    fn activate(&mut self, joiner: &mut dyn Joiner, credentials: Option<&Credentials>) -> Result<()> {
        let role = self.identity.role;
        let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);

        if role.originates() {
            let session = self.open_session(joiner, credentials)?;
            self.store.save(&session)?;
        }

        if role.relays() {
            info!(
                "Setting up the radio at {} MHz using {}",
                crate::util::format_frequency_mhz(self.relay_profile.frequency),
                self.relay_profile.data_rate
            );
            self.radio.configure(&self.relay_profile)?;

            let frames = tx.clone();
            self.radio.register_receive_handler(move |received| {
                match frames.try_send(Event::FrameReceived(received)) {
                    Ok(()) => {}
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        warn!("Event queue full, received frame dropped");
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => {
                        debug!("Frame received after shutdown dropped");
                    }
                }
            });
        } else {
            self.radio.configure(&self.joined_profile)?;
        }

        if role.originates() {
            self.timer = Some(PeriodicTimer::spawn(
                self.scheduler.period(),
                tx.clone(),
                || Event::UplinkTick,
            ));
            info!(period = ?self.scheduler.period(), "Node uplinks scheduled");
        }

        self.events_tx = Some(tx);
        self.events_rx = Some(rx);
        Ok(())
    }

    fn open_session(&mut self, joiner: &mut dyn Joiner, credentials: Option<&Credentials>) -> Result<Session> {
        match credentials {
            Some(credentials) => joiner.join(credentials.mode(), credentials),
            None => self.store.restore().map_err(|e| match e {
                Error::SessionUnavailable(_) => {
                    Error::config("no join credentials and no saved session")
                }
                other => other,
            }),
        }
    }

    /// Handle for stopping the coordinator while [`run`](Self::run) owns it
    pub fn handle(&self) -> Option<CoordinatorHandle> {
        self.events_tx.as_ref().map(|tx| CoordinatorHandle {
            events: tx.clone(),
        })
    }

    /// Dispatches events until stopped
    pub async fn run(&mut self) -> Result<()> {
        if self.events_rx.is_none() {
            return Err(Error::invalid_state("coordinator is not started"));
        }

        loop {
            let event = match self.events_rx.as_mut() {
                Some(rx) => rx.recv().await,
                None => None,
            };
            match event {
                Some(event) => {
                    if let ControlFlow::Break(result) = self.dispatch(event) {
                        return result;
                    }
                }
                None => return self.stop(),
            }
        }
    }

    /// Dispatches whatever is queued right now without waiting for more.
    ///
    /// Returns the number of events handled.
    pub fn dispatch_pending(&mut self) -> usize {
        let mut handled = 0;
        loop {
            let event = match self.events_rx.as_mut().map(|rx| rx.try_recv()) {
                Some(Ok(event)) => event,
                _ => return handled,
            };
            handled += 1;
            if let ControlFlow::Break(result) = self.dispatch(event) {
                if let Err(e) = result {
                    warn!(error = %e, "Stop failed");
                }
                return handled;
            }
        }
    }

    /// Handles one event; breaks with the stop result once idle
    fn dispatch(&mut self, event: Event) -> ControlFlow<Result<()>> {
        match event {
            Event::FrameReceived(received) => self.handle_frame(received),
            Event::UplinkTick => self.handle_tick(),
            Event::Stop(ack) => {
                let result = self.stop();
                let _ = ack.send(());
                return ControlFlow::Break(result);
            }
        }
        ControlFlow::Continue(())
    }

    fn handle_frame(&mut self, received: ReceivedFrame) {
        self.state.stats.frames_received += 1;

        if !self.radio.accepts(&received) {
            self.state.stats.frames_stale += 1;
            warn!(
                epoch = received.epoch,
                current = self.radio.epoch(),
                len = received.frame.len(),
                "Frame from before radio reconfiguration dropped"
            );
            return;
        }

        let frame = received.frame;
        if frame.len() > MAX_FRAME_SIZE {
            self.state.stats.frames_malformed += 1;
            warn!(len = frame.len(), "Oversized frame dropped");
            return;
        }

        match self.relay.decide(&frame) {
            Ok(RelayDecision::Forward(out)) => match self.send_upstream(&out) {
                Ok(()) => {
                    self.state.stats.frames_forwarded += 1;
                    info!(packet = %to_hex(out.as_bytes()), "Sent uplink packet");
                }
                Err(e) => {
                    self.state.stats.forward_failures += 1;
                    warn!(error = %e, "Failed in uplink packet");
                }
            },
            Ok(RelayDecision::Drop { marker }) => {
                self.state.stats.frames_dropped += 1;
                debug!(
                    marker = marker.value(),
                    origin = marker.origin_level(),
                    "Frame not from the level below, dropped"
                );
            }
            Err(e) => {
                self.state.stats.frames_malformed += 1;
                warn!(error = %e, "Malformed frame dropped");
            }
        }
    }

    fn send_upstream(&mut self, frame: &Frame) -> Result<()> {
        match &mut self.upstream {
            UpstreamRoute::OverAir => self.radio.send(frame.as_bytes()),
            UpstreamRoute::Collaborator(upstream) => upstream.send_upstream(frame),
        }
    }

    fn handle_tick(&mut self) {
        match self.state.phase {
            Phase::NodeActive => self.uplink(),
            Phase::BothActive(RadioHolder::Relay) => {
                self.state.enter(Phase::BothActive(RadioHolder::Uplink));
                debug!("Switching radio to joined-network mode");
                match self.radio.configure(&self.joined_profile) {
                    Ok(()) => self.uplink(),
                    Err(e) => {
                        self.state.stats.uplinks_failed += 1;
                        let counter = self.scheduler.skip();
                        warn!(counter, error = %e, "Could not switch to joined-network mode");
                    }
                }
                if let Err(e) = self.radio.configure(&self.relay_profile) {
                    error!(error = %e, "Could not switch back to relay mode");
                }
                self.state.enter(Phase::BothActive(RadioHolder::Relay));
            }
            phase => debug!(%phase, "Uplink tick ignored"),
        }
    }

    /// One joined-network uplink; the radio is already in joined mode
    fn uplink(&mut self) {
        let mut session = match self.store.restore() {
            Ok(session) => session,
            Err(e) => {
                self.state.stats.uplinks_skipped += 1;
                let counter = self.scheduler.skip();
                warn!(counter, error = %e, "No session, uplink skipped");
                return;
            }
        };
        if let Err(e) = self.radio.load_session(&session) {
            self.state.stats.uplinks_failed += 1;
            let counter = self.scheduler.skip();
            warn!(counter, error = %e, "Could not load session, uplink skipped");
            return;
        }

        match self.scheduler.fire(&mut self.radio) {
            Ok(_) => {
                self.state.stats.uplinks_sent += 1;
                session.record_uplink();
            }
            Err(_) => self.state.stats.uplinks_failed += 1,
        }

        if let Err(e) = self.store.save(&session) {
            warn!(error = %e, "Failed to save session");
        }
    }

    /// Returns to idle.
    ///
    /// The receive handler is removed and the timer cancelled before
    /// anything else; queued events are discarded, never dispatched. Once
    /// this returns no callback or tick is handled.
    pub fn stop(&mut self) -> Result<()> {
        if self.state.phase.is_idle() {
            return Ok(());
        }
        info!("Stopping...");
        let result = self.teardown();
        self.state.enter(Phase::Idle);
        result
    }

    fn teardown(&mut self) -> Result<()> {
        self.radio.unregister_receive_handler();
        if let Some(mut timer) = self.timer.take() {
            timer.cancel();
        }
        self.events_tx = None;

        if let Some(mut rx) = self.events_rx.take() {
            rx.close();
            let mut discarded = 0;
            while let Ok(event) = rx.try_recv() {
                match event {
                    Event::Stop(ack) => {
                        let _ = ack.send(());
                    }
                    _ => discarded += 1,
                }
            }
            if discarded > 0 {
                info!(discarded, "Queued events discarded at shutdown");
            }
            self.state.stats.events_discarded += discarded;
        }

        self.radio.sleep()
    }

    pub fn identity(&self) -> &NodeIdentity {
        &self.identity
    }

    pub fn role(&self) -> DeviceRole {
        self.identity.role
    }

    pub fn phase(&self) -> Phase {
        self.state.phase
    }

    pub fn info(&self) -> StateInfo {
        self.state.info()
    }

    pub fn radio(&self) -> &RadioController<D> {
        &self.radio
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn scheduler(&self) -> &UplinkScheduler {
        &self.scheduler
    }
}

impl<D: RadioDriver, S: SessionStore> Drop for ModeCoordinator<D, S> {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            warn!(error = %e, "Stop on drop failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use tokio_test::assert_ok;

    use crate::core::{GatewayId, TreeLevel};
    use crate::radio::sim::{SimRadioHandle, SimulatedRadio};
    use crate::radio::RadioMode;
    use crate::session::{AbpJoiner, MemorySessionStore};

    type TestCoordinator = ModeCoordinator<SimulatedRadio, MemorySessionStore>;

    fn identity(role: DeviceRole, level: u8) -> NodeIdentity {
        NodeIdentity {
            id: GatewayId::from_mac([0x24, 0x0A, 0xC4, 1, 2, 3]),
            level: TreeLevel::new(level).unwrap(),
            max_depth: TreeLevel::new(15).unwrap(),
            role,
        }
    }

    fn credentials() -> Credentials {
        Credentials::Abp {
            dev_addr: 0x2601_160C,
            nwk_skey: [0x58; 16],
            app_skey: [0x4B; 16],
        }
    }

    fn joiner() -> AbpJoiner {
        AbpJoiner::new(crate::session::single_frequency_plan(903_900_000, 72, 0, 3), 3)
    }

    fn coordinator(role: DeviceRole, level: u8) -> (TestCoordinator, SimRadioHandle) {
        let sim = SimulatedRadio::new();
        let handle = sim.handle();
        let coordinator = ModeCoordinator::new(
            identity(role, level),
            RadioProfile::relay(903_900_000, "SF7BW125".parse().unwrap()),
            RadioProfile::joined(903_900_000, 3, "SF7BW125".parse().unwrap()),
            sim,
            MemorySessionStore::new(),
        );
        (coordinator, handle)
    }

    fn started(role: DeviceRole, level: u8) -> (TestCoordinator, SimRadioHandle) {
        let (mut coordinator, handle) = coordinator(role, level);
        coordinator.start(&mut joiner(), Some(&credentials())).unwrap();
        (coordinator, handle)
    }

    /// Starts a role and steps the clock just past the timer's phase so
    /// sleeps of whole periods land after each tick
    async fn started_paused(role: DeviceRole, level: u8) -> (TestCoordinator, SimRadioHandle) {
        let started = started(role, level);
        tokio::time::sleep(Duration::from_millis(100)).await;
        started
    }

    const JOINED: RadioMode = RadioMode::JoinedNetwork { data_rate_index: 3 };

    #[derive(Clone, Default)]
    struct RecordingUpstream(Arc<Mutex<Vec<Frame>>>);

    impl Upstream for RecordingUpstream {
        fn send_upstream(&mut self, frame: &Frame) -> Result<()> {
            self.0.lock().unwrap().push(frame.clone());
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_forwarder_relays_frame_from_below() {
        let (mut coordinator, radio) = started(DeviceRole::Forwarder, 3);
        assert_eq!(coordinator.phase(), Phase::ForwarderActive);
        assert!(radio.is_listening());

        assert!(radio.inject(vec![64, 0xAA]));
        assert!(radio.inject(vec![35, 64, 0xAA]));
        assert_eq!(coordinator.dispatch_pending(), 2);

        let sent = radio.sent_in(RadioMode::RawRelay);
        assert_eq!(sent.len(), 1);
        assert_eq!(&sent[0][..], &[35, 64, 0xAA]);

        let stats = coordinator.info().stats;
        assert_eq!(stats.frames_received, 2);
        assert_eq!(stats.frames_forwarded, 1);
        assert_eq!(stats.frames_dropped, 1);
    }

    #[tokio::test]
    async fn test_malformed_frames_do_not_stop_dispatch() {
        let (mut coordinator, radio) = started(DeviceRole::Forwarder, 2);

        radio.inject(Vec::new());
        radio.inject(vec![3]);
        radio.inject(vec![64; MAX_FRAME_SIZE + 1]);
        radio.inject(vec![64, 7]);
        assert_eq!(coordinator.dispatch_pending(), 4);

        let stats = coordinator.info().stats;
        assert_eq!(stats.frames_malformed, 3);
        assert_eq!(stats.frames_forwarded, 1);
        assert_eq!(radio.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_collaborator_receives_forwarded_frames() {
        let upstream = RecordingUpstream::default();
        let (coordinator, radio) = coordinator(DeviceRole::Forwarder, 2);
        let mut coordinator = coordinator.with_upstream(upstream.clone());
        coordinator.start(&mut joiner(), None).unwrap();

        radio.inject(vec![64, 1, 2]);
        coordinator.dispatch_pending();

        let frames = upstream.0.lock().unwrap().clone();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].as_bytes(), &[18, 64, 1, 2]);
        assert!(radio.sent().is_empty());
    }

    #[tokio::test]
    async fn test_forward_failure_is_counted() {
        let (mut coordinator, radio) = started(DeviceRole::Forwarder, 2);
        radio.fail_next_sends(1);
        radio.inject(vec![64, 1]);
        radio.inject(vec![64, 2]);
        coordinator.dispatch_pending();

        let stats = coordinator.info().stats;
        assert_eq!(stats.forward_failures, 1);
        assert_eq!(stats.frames_forwarded, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_node_sends_counter_every_period() {
        let (mut coordinator, radio) = started_paused(DeviceRole::Node, 2).await;
        assert_eq!(coordinator.phase(), Phase::NodeActive);
        assert!(!radio.is_listening());

        for expected in 1..=3u32 {
            tokio::time::sleep(Duration::from_secs(7)).await;
            assert_eq!(coordinator.dispatch_pending(), 1);
            let sent = radio.sent_in(JOINED);
            assert_eq!(sent.len() as u32, expected);
            assert_eq!(&sent[sent.len() - 1][..], &expected.to_be_bytes());
        }

        let session = coordinator.store().restore().unwrap();
        assert_eq!(session.uplink_counter, 3);
        assert_eq!(radio.loaded_sessions().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transmit_failure_skips_one_period() {
        let (mut coordinator, radio) = started_paused(DeviceRole::Node, 2).await;

        radio.fail_next_sends(1);
        tokio::time::sleep(Duration::from_secs(7)).await;
        coordinator.dispatch_pending();
        assert!(radio.sent().is_empty());

        tokio::time::sleep(Duration::from_secs(7)).await;
        coordinator.dispatch_pending();
        let sent = radio.sent_in(JOINED);
        assert_eq!(sent.len(), 1);
        assert_eq!(&sent[0][..], &2u32.to_be_bytes());

        let stats = coordinator.info().stats;
        assert_eq!(stats.uplinks_failed, 1);
        assert_eq!(stats.uplinks_sent, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dual_role_switches_and_returns_to_relay() {
        let (mut coordinator, radio) = started_paused(DeviceRole::Both, 2).await;
        assert_eq!(coordinator.phase(), Phase::BothActive(RadioHolder::Relay));

        tokio::time::sleep(Duration::from_secs(7)).await;
        coordinator.dispatch_pending();

        let modes: Vec<_> = radio.configurations().iter().map(|p| p.mode).collect();
        assert_eq!(modes, vec![RadioMode::RawRelay, JOINED, RadioMode::RawRelay]);
        assert_eq!(radio.sent_in(JOINED).len(), 1);
        assert_eq!(radio.current_profile().map(|p| p.mode), Some(RadioMode::RawRelay));
        assert_eq!(coordinator.phase(), Phase::BothActive(RadioHolder::Relay));

        // Relaying resumes after the switch
        radio.inject(vec![64, 9]);
        coordinator.dispatch_pending();
        assert_eq!(radio.sent_in(RadioMode::RawRelay).len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_frames_queued_across_switch_are_dropped_and_counted() {
        let (mut coordinator, radio) = started_paused(DeviceRole::Both, 2).await;

        tokio::time::sleep(Duration::from_secs(7)).await;
        // Received in relay mode but still queued behind the tick
        radio.inject(vec![64, 1]);
        assert_eq!(coordinator.dispatch_pending(), 2);

        let stats = coordinator.info().stats;
        assert_eq!(stats.frames_stale, 1);
        assert_eq!(stats.uplinks_sent, 1);
        assert!(radio.sent_in(RadioMode::RawRelay).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dual_role_session_survives_switches() {
        let (mut coordinator, radio) = started_paused(DeviceRole::Both, 2).await;

        for _ in 0..4 {
            tokio::time::sleep(Duration::from_secs(7)).await;
            coordinator.dispatch_pending();
        }

        let restored = coordinator.store().restore().unwrap();
        assert_eq!(restored.uplink_counter, 4);
        assert_eq!(restored.dev_addr, 0x2601_160C);
        let loaded = radio.loaded_sessions();
        assert_eq!(loaded.len(), 4);
        assert_eq!(loaded[3].uplink_counter, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_session_skips_uplink() {
        let (mut coordinator, radio) = started_paused(DeviceRole::Node, 2).await;
        let session = coordinator.store().restore().unwrap();
        coordinator.store.clear().unwrap();

        tokio::time::sleep(Duration::from_secs(7)).await;
        coordinator.dispatch_pending();

        assert!(radio.sent().is_empty());
        assert_eq!(coordinator.info().stats.uplinks_skipped, 1);
        assert_eq!(coordinator.phase(), Phase::NodeActive);

        // The skipped period still used up a counter value
        coordinator.store.save(&session).unwrap();
        tokio::time::sleep(Duration::from_secs(7)).await;
        coordinator.dispatch_pending();

        let sent = radio.sent_in(JOINED);
        assert_eq!(sent.len(), 1);
        assert_eq!(&sent[0][..], &[0, 0, 0, 2]);
        assert_eq!(coordinator.scheduler().counter(), 2);
    }

    #[tokio::test]
    async fn test_forwards_use_normal_iq() {
        let (mut coordinator, radio) = started(DeviceRole::Forwarder, 2);
        radio.inject(vec![64, 1]);
        coordinator.dispatch_pending();

        let sent = radio.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].mode, RadioMode::RawRelay);
        assert!(!sent[0].iq_invert);
    }

    #[tokio::test]
    async fn test_dispatch_pending_honours_stop_request() {
        let (mut coordinator, radio) = started(DeviceRole::Forwarder, 2);
        let handle = coordinator.handle().unwrap();

        radio.inject(vec![64, 3]);
        let (_, handled) = tokio::join!(handle.stop(), async { coordinator.dispatch_pending() });

        assert_eq!(handled, 2);
        assert_eq!(coordinator.phase(), Phase::Idle);
        assert_eq!(coordinator.info().stats.frames_forwarded, 1);
        assert!(radio.is_asleep());
        assert!(!handle.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_nothing_dispatched_after_stop() {
        let (mut coordinator, radio) = started_paused(DeviceRole::Both, 2).await;

        tokio::time::sleep(Duration::from_secs(7)).await;
        radio.inject(vec![64, 1]);
        assert_ok!(coordinator.stop());

        assert_eq!(coordinator.phase(), Phase::Idle);
        assert!(radio.is_asleep());
        assert!(!radio.is_listening());
        assert!(!radio.inject(vec![64, 2]));
        assert_eq!(coordinator.info().stats.events_discarded, 2);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(coordinator.dispatch_pending(), 0);
        assert!(radio.sent().is_empty());
        assert_eq!(coordinator.info().stats.frames_received, 0);
    }

    #[tokio::test]
    async fn test_run_until_handle_stops() {
        let (coordinator, radio) = started(DeviceRole::Forwarder, 2);
        let mut coordinator = coordinator;
        let handle = coordinator.handle().unwrap();

        let task = tokio::spawn(async move {
            coordinator.run().await.unwrap();
            coordinator
        });

        radio.inject(vec![64, 5]);
        handle.stop().await;
        assert!(!handle.is_running());

        let coordinator = task.await.unwrap();
        assert_eq!(coordinator.phase(), Phase::Idle);
        assert_eq!(coordinator.info().stats.frames_forwarded, 1);
        assert!(radio.is_asleep());

        // Stopping twice is harmless
        handle.stop().await;
    }

    #[tokio::test]
    async fn test_start_twice_rejected() {
        let (mut coordinator, _radio) = started(DeviceRole::Forwarder, 2);
        let err = coordinator.start(&mut joiner(), None).unwrap_err();
        assert!(matches!(err, Error::InvalidState(_)));
    }

    #[tokio::test]
    async fn test_node_without_credentials_or_session_fails() {
        let (mut coordinator, radio) = coordinator(DeviceRole::Node, 2);
        let err = coordinator.start(&mut joiner(), None).unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(coordinator.phase(), Phase::Idle);
        assert!(radio.sent().is_empty());
    }

    #[tokio::test]
    async fn test_restart_after_stop_reuses_saved_session() {
        let (mut coordinator, _radio) = started(DeviceRole::Node, 2);
        coordinator.stop().unwrap();
        coordinator.start(&mut joiner(), None).unwrap();
        assert_eq!(coordinator.phase(), Phase::NodeActive);
    }

    #[tokio::test]
    async fn test_from_config() {
        let config = RelayConfig {
            role: 3,
            tree_level: 4,
            uplink_period: Duration::from_secs(30),
            join: Some(credentials()),
            ..Default::default()
        };
        let coordinator =
            ModeCoordinator::from_config(&config, SimulatedRadio::new(), MemorySessionStore::new())
                .unwrap();
        assert_eq!(coordinator.role(), DeviceRole::Both);
        assert_eq!(coordinator.identity().level.level(), 4);
        assert_eq!(coordinator.scheduler().period(), Duration::from_secs(30));

        let bad = RelayConfig { tree_level: 0, ..config };
        assert!(
            ModeCoordinator::from_config(&bad, SimulatedRadio::new(), MemorySessionStore::new())
                .is_err()
        );
    }
}
