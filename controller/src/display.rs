//! Local display mirror and input gestures.
//!
//! The rendering surface is not reentrant, so the panel and the cached copy
//! of what it shows live behind a single lock; every path that touches a
//! cell acquires it and the guard releases it on all exits. The cache lets
//! a refresh pass skip cells that already show the right text.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use relay_common::{
    ChannelValue, CurrentReading, DeviceSnapshot, FanLevel, LoadChannel, LoadState, Origin,
};
use tracing::warn;

use crate::dispatch::{ChangeRequest, Mirror, RequestSender};

pub const COL_LABEL: usize = 0;
pub const COL_VALUE: usize = 1;

pub const ROW_LIGHT: usize = 0;
pub const ROW_CURRENT: usize = 1;
pub const ROW_FAN: usize = 2;
pub const ROW_HEATER: usize = 3;

/// Display surface: a small text table addressed by row and column.
pub trait Panel: Send {
    fn set_cell_text(&mut self, row: usize, col: usize, text: &str);
}

#[derive(Default)]
struct Cells {
    text: HashMap<(usize, usize), String>,
    writes: usize,
}

/// Host panel that stores the cell grid.
///
/// Hardware integration point: the board build renders through the TFT
/// widget table instead.
#[derive(Default)]
pub struct TablePanel {
    cells: Arc<Mutex<Cells>>,
}

impl TablePanel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared read view of the grid for tests and diagnostics.
    pub fn probe(&self) -> PanelProbe {
        PanelProbe(self.cells.clone())
    }
}

impl Panel for TablePanel {
    fn set_cell_text(&mut self, row: usize, col: usize, text: &str) {
        let mut cells = self.cells.lock().unwrap();
        cells.text.insert((row, col), text.to_string());
        cells.writes += 1;
    }
}

#[derive(Clone)]
pub struct PanelProbe(Arc<Mutex<Cells>>);

impl PanelProbe {
    pub fn text(&self, row: usize, col: usize) -> Option<String> {
        self.0.lock().unwrap().text.get(&(row, col)).cloned()
    }

    pub fn writes(&self) -> usize {
        self.0.lock().unwrap().writes
    }
}

/// A local input action, as delivered by the button/touch layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gesture {
    LightToggle,
    HeaterToggle,
    /// Advance the fan one level, wrapping back to off past the top.
    FanStep,
}

#[derive(Default)]
struct UiCache {
    light: Option<LoadState>,
    heater: Option<LoadState>,
    fan: Option<FanLevel>,
    current_ma: Option<u32>,
}

struct UiState<P: Panel> {
    panel: P,
    cache: UiCache,
}

impl<P: Panel> UiState<P> {
    fn reconcile_light(&mut self, state: LoadState) {
        if self.cache.light != Some(state) {
            self.cache.light = Some(state);
            self.panel.set_cell_text(ROW_LIGHT, COL_VALUE, state.as_str());
        }
    }

    fn reconcile_heater(&mut self, state: LoadState) {
        if self.cache.heater != Some(state) {
            self.cache.heater = Some(state);
            self.panel.set_cell_text(ROW_HEATER, COL_VALUE, state.as_str());
        }
    }

    fn reconcile_fan(&mut self, level: FanLevel) {
        if self.cache.fan != Some(level) {
            self.cache.fan = Some(level);
            self.panel.set_cell_text(ROW_FAN, COL_VALUE, level.as_str());
        }
    }

    fn reconcile_current(&mut self, reading: CurrentReading) {
        if self.cache.current_ma != Some(reading.milliamps) {
            self.cache.current_ma = Some(reading.milliamps);
            self.panel
                .set_cell_text(ROW_CURRENT, COL_VALUE, &reading.milliamps.to_string());
        }
    }
}

/// Reflects registry state on the display and turns gestures into change
/// requests tagged with the local-UI origin.
pub struct LocalUiMirror<P: Panel> {
    state: Mutex<UiState<P>>,
    requests: RequestSender,
}

impl<P: Panel> LocalUiMirror<P> {
    pub fn new(mut panel: P, requests: RequestSender) -> Self {
        panel.set_cell_text(ROW_LIGHT, COL_LABEL, "Light");
        panel.set_cell_text(ROW_CURRENT, COL_LABEL, "Current");
        panel.set_cell_text(ROW_FAN, COL_LABEL, "Fan state");
        panel.set_cell_text(ROW_HEATER, COL_LABEL, "Heater");

        let mut state = UiState {
            panel,
            cache: UiCache::default(),
        };
        state.reconcile_light(LoadState::Off);
        state.reconcile_heater(LoadState::Off);
        state.reconcile_fan(FanLevel::Off);
        state.reconcile_current(CurrentReading::default());

        Self {
            state: Mutex::new(state),
            requests,
        }
    }

    /// Repaints every row from a registry snapshot. The refresh loop calls
    /// this each period, which also converges the display after changes
    /// this mirror originated itself and was therefore not pushed.
    pub fn render_snapshot(&self, snapshot: DeviceSnapshot) {
        let mut state = self.state.lock().unwrap();
        state.reconcile_light(snapshot.light);
        state.reconcile_heater(snapshot.heater);
        state.reconcile_fan(snapshot.fan);
        state.reconcile_current(snapshot.current);
    }

    /// Requests a state change on behalf of the local user.
    pub fn request_change(&self, channel: LoadChannel, value: ChannelValue) {
        let request = ChangeRequest {
            channel,
            value,
            origin: Origin::LocalUi,
        };
        if self.requests.send(request).is_err() {
            warn!(%channel, "dispatcher gone, dropping local change request");
        }
    }

    /// Maps a gesture onto a change request against what the display
    /// currently shows.
    pub fn handle_gesture(&self, gesture: Gesture) {
        let (channel, value) = {
            let state = self.state.lock().unwrap();
            match gesture {
                Gesture::LightToggle => {
                    let shown = state.cache.light.unwrap_or(LoadState::Off);
                    (LoadChannel::Light, ChannelValue::from(shown.toggled()))
                }
                Gesture::HeaterToggle => {
                    let shown = state.cache.heater.unwrap_or(LoadState::Off);
                    (LoadChannel::Heater, ChannelValue::from(shown.toggled()))
                }
                Gesture::FanStep => {
                    let shown = state.cache.fan.unwrap_or(FanLevel::Off);
                    let next = if shown == FanLevel::VeryHigh {
                        FanLevel::Off
                    } else {
                        shown.step_up()
                    };
                    (LoadChannel::Fan, ChannelValue::from(next))
                }
            }
        };
        self.request_change(channel, value);
    }
}

/// Display refresh loop: repaints from the registry snapshot each period,
/// picking up the latest current reading opportunistically.
pub async fn run_display_refresh<P: Panel + 'static>(
    dispatcher: Arc<crate::dispatch::Dispatcher>,
    mirror: Arc<LocalUiMirror<P>>,
    period: std::time::Duration,
) {
    let mut interval = tokio::time::interval(period);
    loop {
        interval.tick().await;
        let snapshot = dispatcher.snapshot().await;
        mirror.render_snapshot(snapshot);
    }
}

impl<P: Panel> Mirror for LocalUiMirror<P> {
    fn on_change(&self, channel: LoadChannel, value: ChannelValue) {
        let mut state = self.state.lock().unwrap();
        match (channel, value) {
            (LoadChannel::Light, ChannelValue::Binary(load)) => state.reconcile_light(load),
            (LoadChannel::Heater, ChannelValue::Binary(load)) => state.reconcile_heater(load),
            (LoadChannel::Fan, ChannelValue::Level(level)) => state.reconcile_fan(level),
            // The status indicator has no row on the local display.
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::dispatch::{request_queue, RequestReceiver};

    use super::*;

    fn mirror() -> (LocalUiMirror<TablePanel>, PanelProbe, RequestReceiver) {
        let (tx, rx) = request_queue();
        let panel = TablePanel::new();
        let probe = panel.probe();
        (LocalUiMirror::new(panel, tx), probe, rx)
    }

    #[test]
    fn construction_paints_labels_and_defaults() {
        let (_mirror, probe, _rx) = mirror();

        assert_eq!(probe.text(ROW_LIGHT, COL_LABEL).as_deref(), Some("Light"));
        assert_eq!(probe.text(ROW_CURRENT, COL_LABEL).as_deref(), Some("Current"));
        assert_eq!(probe.text(ROW_FAN, COL_LABEL).as_deref(), Some("Fan state"));
        assert_eq!(probe.text(ROW_HEATER, COL_LABEL).as_deref(), Some("Heater"));

        assert_eq!(probe.text(ROW_LIGHT, COL_VALUE).as_deref(), Some("OFF"));
        assert_eq!(probe.text(ROW_FAN, COL_VALUE).as_deref(), Some("OFF"));
        assert_eq!(probe.text(ROW_CURRENT, COL_VALUE).as_deref(), Some("0"));
    }

    #[test]
    fn on_change_redraws_only_the_changed_cell() {
        let (mirror, probe, _rx) = mirror();
        let baseline = probe.writes();

        mirror.on_change(LoadChannel::Light, LoadState::On.into());
        assert_eq!(probe.text(ROW_LIGHT, COL_VALUE).as_deref(), Some("ON"));
        assert_eq!(probe.writes(), baseline + 1);

        // Already showing ON; no redraw.
        mirror.on_change(LoadChannel::Light, LoadState::On.into());
        assert_eq!(probe.writes(), baseline + 1);
    }

    #[test]
    fn snapshot_render_reconciles_all_rows() {
        let (mirror, probe, _rx) = mirror();
        mirror.render_snapshot(DeviceSnapshot {
            heater: LoadState::On,
            light: LoadState::Off,
            fan: FanLevel::High,
            status_indicator: LoadState::On,
            current: CurrentReading {
                raw: 1000,
                millivolts: 740,
                milliamps: 740,
                calibrated: true,
            },
        });

        assert_eq!(probe.text(ROW_HEATER, COL_VALUE).as_deref(), Some("ON"));
        assert_eq!(probe.text(ROW_LIGHT, COL_VALUE).as_deref(), Some("OFF"));
        assert_eq!(probe.text(ROW_FAN, COL_VALUE).as_deref(), Some("HIGH"));
        assert_eq!(probe.text(ROW_CURRENT, COL_VALUE).as_deref(), Some("740"));
    }

    #[test]
    fn light_gesture_requests_the_toggled_state() {
        let (mirror, _probe, mut rx) = mirror();
        mirror.handle_gesture(Gesture::LightToggle);

        let request = rx.try_recv().unwrap();
        assert_eq!(request.channel, LoadChannel::Light);
        assert_eq!(request.value, ChannelValue::Binary(LoadState::On));
        assert_eq!(request.origin, Origin::LocalUi);
    }

    #[test]
    fn fan_gesture_steps_and_wraps() {
        let (mirror, _probe, mut rx) = mirror();

        mirror.handle_gesture(Gesture::FanStep);
        assert_eq!(
            rx.try_recv().unwrap().value,
            ChannelValue::Level(FanLevel::Low)
        );

        mirror.on_change(LoadChannel::Fan, FanLevel::VeryHigh.into());
        mirror.handle_gesture(Gesture::FanStep);
        assert_eq!(
            rx.try_recv().unwrap().value,
            ChannelValue::Level(FanLevel::Off)
        );
    }

    #[test]
    fn status_indicator_pushes_are_ignored() {
        let (mirror, probe, _rx) = mirror();
        let baseline = probe.writes();

        mirror.on_change(LoadChannel::StatusIndicator, LoadState::On.into());
        assert_eq!(probe.writes(), baseline);
    }
}
