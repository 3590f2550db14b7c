//! Fan-out of committed registry transitions to the mirrors.
//!
//! Every mutation enters through [`Dispatcher::apply`]; the registry decides
//! under its lock whether anything changed and which mirrors to notify, so
//! the origin-exclusion invariant lives in exactly one place instead of at
//! every call site.

use std::sync::Arc;

use relay_common::{
    ApplyOutcome, ChannelValue, CurrentReading, DeviceSnapshot, LoadChannel, LoadRegistry, Origin,
    RegistryError,
};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};

/// Drives the physical outputs. Receives every committed transition and
/// never originates one; repeated calls with the same value must be
/// harmless.
pub trait Actuator: Send + Sync {
    fn actuate(&self, channel: LoadChannel, value: ChannelValue);
}

/// Push interface shared by the local display and the remote channel.
///
/// Implementations hold no canonical state, only a cached copy used to
/// skip needless redraws and publishes. They must not block: network sends
/// are enqueued, display writes take a short-lived lock.
pub trait Mirror: Send + Sync {
    fn on_change(&self, channel: LoadChannel, value: ChannelValue);
}

/// A state change requested by a mirror, tagged with its origin.
#[derive(Debug, Clone, Copy)]
pub struct ChangeRequest {
    pub channel: LoadChannel,
    pub value: ChannelValue,
    pub origin: Origin,
}

pub type RequestSender = mpsc::UnboundedSender<ChangeRequest>;
pub type RequestReceiver = mpsc::UnboundedReceiver<ChangeRequest>;

pub fn request_queue() -> (RequestSender, RequestReceiver) {
    mpsc::unbounded_channel()
}

/// The hub: owns the registry lock and pushes committed changes outward.
pub struct Dispatcher {
    registry: Mutex<LoadRegistry>,
    actuator: Arc<dyn Actuator>,
    local_ui: Arc<dyn Mirror>,
    remote: Arc<dyn Mirror>,
}

impl Dispatcher {
    pub fn new(
        registry: LoadRegistry,
        actuator: Arc<dyn Actuator>,
        local_ui: Arc<dyn Mirror>,
        remote: Arc<dyn Mirror>,
    ) -> Self {
        Self {
            registry: Mutex::new(registry),
            actuator,
            local_ui,
            remote,
        }
    }

    /// Applies a change and fans it out to every mirror except the origin.
    ///
    /// The compare/replace/revision step happens under the registry lock;
    /// the pushes happen after it is released, so a slow mirror never holds
    /// up a concurrent apply. Identical values propagate nothing.
    pub async fn apply(
        &self,
        channel: LoadChannel,
        value: ChannelValue,
        origin: Origin,
    ) -> Result<ApplyOutcome, RegistryError> {
        let outcome = self.registry.lock().await.apply(channel, value, origin)?;

        if let ApplyOutcome::Applied {
            value,
            revision,
            targets,
        } = outcome
        {
            debug!(%channel, %value, revision, ?origin, "state change committed");
            self.actuator.actuate(channel, value);
            if targets.local_ui {
                self.local_ui.on_change(channel, value);
            }
            if targets.remote {
                self.remote.on_change(channel, value);
            }
        }

        Ok(outcome)
    }

    pub async fn read(&self, channel: LoadChannel) -> ChannelValue {
        self.registry.lock().await.read(channel)
    }

    pub async fn snapshot(&self) -> DeviceSnapshot {
        self.registry.lock().await.snapshot()
    }

    pub async fn update_current(&self, reading: CurrentReading) {
        self.registry.lock().await.update_current(reading);
    }

    pub async fn latest_current(&self) -> CurrentReading {
        self.registry.lock().await.latest_current()
    }
}

/// Drains mirror change requests into `apply`.
///
/// Requests are fire-and-forget for the mirrors; queue order gives
/// last-write-wins per channel. A rejected request is a caller bug, logged
/// and skipped so the loop keeps serving.
pub async fn run_request_loop(dispatcher: Arc<Dispatcher>, mut requests: RequestReceiver) {
    while let Some(request) = requests.recv().await {
        if let Err(err) = dispatcher
            .apply(request.channel, request.value, request.origin)
            .await
        {
            warn!("change request rejected: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;

    use relay_common::{FanLevel, LoadState};

    use super::*;

    #[derive(Default)]
    struct Recorder {
        calls: StdMutex<Vec<(LoadChannel, ChannelValue)>>,
    }

    impl Recorder {
        fn calls(&self) -> Vec<(LoadChannel, ChannelValue)> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, channel: LoadChannel, value: ChannelValue) {
            self.calls.lock().unwrap().push((channel, value));
        }
    }

    impl Mirror for Recorder {
        fn on_change(&self, channel: LoadChannel, value: ChannelValue) {
            self.record(channel, value);
        }
    }

    impl Actuator for Recorder {
        fn actuate(&self, channel: LoadChannel, value: ChannelValue) {
            self.record(channel, value);
        }
    }

    struct Rig {
        dispatcher: Arc<Dispatcher>,
        actuator: Arc<Recorder>,
        local_ui: Arc<Recorder>,
        remote: Arc<Recorder>,
    }

    fn rig() -> Rig {
        let actuator = Arc::new(Recorder::default());
        let local_ui = Arc::new(Recorder::default());
        let remote = Arc::new(Recorder::default());
        let dispatcher = Arc::new(Dispatcher::new(
            LoadRegistry::new(),
            actuator.clone(),
            local_ui.clone(),
            remote.clone(),
        ));
        Rig {
            dispatcher,
            actuator,
            local_ui,
            remote,
        }
    }

    #[tokio::test]
    async fn remote_command_reaches_everything_but_the_remote() {
        let rig = rig();
        rig.dispatcher
            .apply(LoadChannel::Heater, LoadState::On.into(), Origin::Remote)
            .await
            .unwrap();

        let expected = vec![(LoadChannel::Heater, ChannelValue::from(LoadState::On))];
        assert_eq!(rig.actuator.calls(), expected);
        assert_eq!(rig.local_ui.calls(), expected);
        assert_eq!(rig.remote.calls(), vec![]);
        assert_eq!(
            rig.dispatcher.read(LoadChannel::Heater).await,
            LoadState::On.into()
        );
    }

    #[tokio::test]
    async fn local_request_for_current_value_propagates_nothing() {
        let rig = rig();
        rig.dispatcher
            .apply(LoadChannel::Fan, FanLevel::Medium.into(), Origin::Remote)
            .await
            .unwrap();
        let before_actuator = rig.actuator.calls().len();
        let before_remote = rig.remote.calls().len();

        let outcome = rig
            .dispatcher
            .apply(LoadChannel::Fan, FanLevel::Medium.into(), Origin::LocalUi)
            .await
            .unwrap();

        assert_eq!(outcome, ApplyOutcome::Unchanged);
        assert_eq!(rig.actuator.calls().len(), before_actuator);
        assert_eq!(rig.remote.calls().len(), before_remote);
    }

    #[tokio::test]
    async fn repeated_apply_fans_out_exactly_once() {
        let rig = rig();
        for _ in 0..3 {
            rig.dispatcher
                .apply(LoadChannel::Light, LoadState::On.into(), Origin::Hardware)
                .await
                .unwrap();
        }

        assert_eq!(rig.actuator.calls().len(), 1);
        assert_eq!(rig.local_ui.calls().len(), 1);
        assert_eq!(rig.remote.calls().len(), 1);
    }

    #[tokio::test]
    async fn every_origin_is_excluded_from_its_own_fan_out() {
        for (origin, ui_calls, remote_calls) in [
            (Origin::Hardware, 1, 1),
            (Origin::LocalUi, 0, 1),
            (Origin::Remote, 1, 0),
        ] {
            let rig = rig();
            rig.dispatcher
                .apply(LoadChannel::Light, LoadState::On.into(), origin)
                .await
                .unwrap();

            assert_eq!(rig.actuator.calls().len(), 1, "actuator for {origin:?}");
            assert_eq!(rig.local_ui.calls().len(), ui_calls, "local ui for {origin:?}");
            assert_eq!(rig.remote.calls().len(), remote_calls, "remote for {origin:?}");
        }
    }

    #[tokio::test]
    async fn status_indicator_is_not_drawn_locally() {
        let rig = rig();
        rig.dispatcher
            .apply(
                LoadChannel::StatusIndicator,
                LoadState::On.into(),
                Origin::Hardware,
            )
            .await
            .unwrap();

        assert_eq!(rig.actuator.calls().len(), 1);
        assert_eq!(rig.local_ui.calls(), vec![]);
        assert_eq!(rig.remote.calls().len(), 1);
    }

    #[tokio::test]
    async fn kind_mismatch_propagates_and_touches_no_mirror() {
        let rig = rig();
        let err = rig
            .dispatcher
            .apply(LoadChannel::Heater, FanLevel::High.into(), Origin::LocalUi)
            .await
            .unwrap_err();

        assert!(matches!(err, RegistryError::KindMismatch { .. }));
        assert_eq!(rig.actuator.calls(), vec![]);
        assert_eq!(rig.local_ui.calls(), vec![]);
        assert_eq!(rig.remote.calls(), vec![]);
    }

    #[tokio::test]
    async fn request_loop_applies_tagged_requests_in_order() {
        let rig = rig();
        let (tx, rx) = request_queue();

        tx.send(ChangeRequest {
            channel: LoadChannel::Fan,
            value: FanLevel::High.into(),
            origin: Origin::LocalUi,
        })
        .unwrap();
        tx.send(ChangeRequest {
            channel: LoadChannel::Fan,
            value: FanLevel::Low.into(),
            origin: Origin::Remote,
        })
        .unwrap();
        drop(tx);

        run_request_loop(rig.dispatcher.clone(), rx).await;

        // Last write wins; the queue preserved arrival order.
        assert_eq!(
            rig.dispatcher.read(LoadChannel::Fan).await,
            FanLevel::Low.into()
        );
        assert_eq!(rig.actuator.calls().len(), 2);
    }
}
