// controller.rs — per-viewport interaction state machine
//
// idle --pointer_down--> dragging --pointer_move--> dragging --pointer_up--> idle
// Wheel and key events are accepted in either state.

use crate::buffer::{OutputBuffer, SourceImage};
use crate::config::ViewConfig;
use crate::error::{Result, ViewerError};
use crate::panorama::{Algorithm, ViewDelta, ViewportParameters};
use crate::projector::Projector;
use crate::timing::{TimingKind, TimingStats};

use std::sync::Arc;
use std::time::{Duration, Instant};

/// Keys the viewport reacts to. Everything else maps to `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewKey {
    PageUp,
    PageDown,
    End,
    Home,
    ArrowLeft,
    ArrowRight,
    ArrowUp,
    ArrowDown,
    Multiply,
    Divide,
    /// A typed digit; consecutive digits set a new step size.
    Digit(u8),
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    PointerDown { x: f64, y: f64 },
    PointerMove { x: f64, y: f64 },
    PointerUp,
    Wheel { delta: f64 },
    KeyDown(ViewKey),
}

/// What the host should do after an event was handled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventResponse {
    /// The output buffer was re-rendered and should be presented.
    pub redrawn: bool,
    /// The host must not run its default action (page scroll, focus move…).
    pub suppress_default: bool,
}

impl EventResponse {
    const IGNORED: Self = Self {
        redrawn: false,
        suppress_default: false,
    };
    const CONSUMED: Self = Self {
        redrawn: true,
        suppress_default: true,
    };
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DragState {
    pub is_dragging: bool,
    pub last_x: f64,
    pub last_y: f64,
}

pub struct ViewportController {
    params: ViewportParameters,
    drag: DragState,
    view: ViewConfig,
    source: Arc<SourceImage>,
    output: OutputBuffer,
    projector: Projector,
    last_render: Duration,
    render_stats: TimingStats,
    entering_step: bool,
}

impl ViewportController {
    /// Sets up the viewport and renders the first frame.
    pub fn new(
        source: Arc<SourceImage>,
        view: ViewConfig,
        width: u32,
        height: u32,
        algorithm: Algorithm,
    ) -> Result<Self> {
        if !view.initial.is_finite() || !view.step.is_finite() {
            return Err(ViewerError::Config(format!(
                "non-finite initial view {:?} / step {}",
                view.initial, view.step
            )));
        }
        let mut controller = Self {
            params: view.initial.clamped(),
            drag: DragState::default(),
            view,
            source,
            output: OutputBuffer::new(width, height)?,
            projector: Projector::new(algorithm),
            last_render: Duration::ZERO,
            render_stats: TimingStats::new(),
            entering_step: false,
        };
        controller.render();
        Ok(controller)
    }

    pub fn params(&self) -> &ViewportParameters {
        &self.params
    }

    pub fn drag_state(&self) -> &DragState {
        &self.drag
    }

    pub fn output(&self) -> &OutputBuffer {
        &self.output
    }

    pub fn source(&self) -> &Arc<SourceImage> {
        &self.source
    }

    pub fn algorithm(&self) -> Algorithm {
        self.projector.algorithm()
    }

    pub fn last_render_time(&self) -> Duration {
        self.last_render
    }

    /// Every render this controller performed, including the ones between
    /// two presented frames.
    pub fn render_stats(&self) -> &TimingStats {
        &self.render_stats
    }

    /// Degrees applied per wheel tick or key press.
    pub fn step(&self) -> f64 {
        self.view.step
    }

    pub fn viewport_size(&self) -> (u32, u32) {
        (self.output.width(), self.output.height())
    }

    pub fn handle(&mut self, event: InputEvent) -> Result<EventResponse> {
        match event {
            InputEvent::PointerDown { x, y } => self.pointer_down(x, y),
            InputEvent::PointerMove { x, y } => self.pointer_move(x, y),
            InputEvent::PointerUp => Ok(self.pointer_up()),
            InputEvent::Wheel { delta } => self.wheel(delta),
            InputEvent::KeyDown(key) => Ok(self.key_down(key)),
        }
    }

    pub fn pointer_down(&mut self, x: f64, y: f64) -> Result<EventResponse> {
        ensure_finite("pointer down", &[x, y])?;
        self.drag = DragState {
            is_dragging: true,
            last_x: x,
            last_y: y,
        };
        Ok(EventResponse::IGNORED)
    }

    pub fn pointer_move(&mut self, x: f64, y: f64) -> Result<EventResponse> {
        if !self.drag.is_dragging {
            return Ok(EventResponse::IGNORED);
        }
        ensure_finite("pointer move", &[x, y])?;

        let (width, height) = self.viewport_size();
        let fov = self.params.fov;
        // finite coordinates far apart can still overflow the difference
        let yaw = self.params.yaw + (self.drag.last_x - x) / width as f64 * fov;
        let pitch = self.params.pitch - (self.drag.last_y - y) / height as f64 * fov;
        ensure_finite("pointer move", &[yaw, pitch])?;

        self.params.yaw = yaw;
        self.params.pitch = pitch;
        self.drag.last_x = x;
        self.drag.last_y = y;

        self.commit();
        Ok(EventResponse {
            redrawn: true,
            suppress_default: false,
        })
    }

    pub fn pointer_up(&mut self) -> EventResponse {
        self.drag.is_dragging = false;
        EventResponse::IGNORED
    }

    /// Positive delta (wheel rolled away from the user) zooms in.
    pub fn wheel(&mut self, delta: f64) -> Result<EventResponse> {
        ensure_finite("wheel", &[delta])?;
        self.params.fov -= sign(delta) * self.view.step;
        self.commit();
        Ok(EventResponse::CONSUMED)
    }

    pub fn key_down(&mut self, key: ViewKey) -> EventResponse {
        if let ViewKey::Digit(d @ 0..=9) = key {
            let d = f64::from(d);
            self.view.step = if self.entering_step {
                (self.view.step * 10.0 + d).min(STEP_MAX)
            } else {
                d
            };
            self.entering_step = true;
            return EventResponse {
                redrawn: false,
                suppress_default: true,
            };
        }
        self.entering_step = false;

        let step = self.view.step;
        let p = &mut self.params;
        match key {
            // PageUp/End and PageDown/Home share a direction
            ViewKey::PageUp | ViewKey::End => p.roll -= step,
            ViewKey::PageDown | ViewKey::Home => p.roll += step,
            ViewKey::ArrowLeft => p.yaw -= step,
            ViewKey::ArrowRight => p.yaw += step,
            ViewKey::ArrowUp => p.pitch += step,
            ViewKey::ArrowDown => p.pitch -= step,
            ViewKey::Multiply => p.fov -= step,
            ViewKey::Divide => p.fov += step,
            ViewKey::Digit(_) | ViewKey::Other => return EventResponse::IGNORED,
        }
        self.commit();
        log::debug!(
            "{:?}: {:.1} fps",
            key,
            1.0 / self.last_render.as_secs_f64().max(1e-6)
        );
        EventResponse::CONSUMED
    }

    /// Applies one frame of automatic rotation.
    pub fn advance(&mut self, delta: ViewDelta) -> Result<()> {
        let p = &self.params;
        let next = [p.yaw + delta.yaw, p.pitch + delta.pitch, p.roll + delta.roll];
        ensure_finite("view delta", &[delta.yaw, delta.pitch, delta.roll])?;
        ensure_finite("advanced view", &next)?;

        [self.params.yaw, self.params.pitch, self.params.roll] = next;
        self.commit();
        Ok(())
    }

    pub fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        if (width, height) == self.viewport_size() {
            return Ok(());
        }
        self.output = OutputBuffer::new(width, height)?;
        self.render();
        Ok(())
    }

    /// Swaps the panorama and starts over from the initial view.
    pub fn set_source(&mut self, source: Arc<SourceImage>) {
        self.source = source;
        self.drag = DragState::default();
        self.params = self.view.initial.clamped();
        self.render();
    }

    pub fn reset_view(&mut self) {
        self.params = self.view.initial.clamped();
        self.render();
    }

    pub fn set_algorithm(&mut self, algorithm: Algorithm) {
        if algorithm != self.projector.algorithm() {
            self.projector.set_algorithm(algorithm);
            self.render();
        }
    }

    fn commit(&mut self) {
        self.params.clamp();
        self.render();
    }

    fn render(&mut self) {
        let start = Instant::now();
        self.projector
            .render_into(&self.source, &self.params, &mut self.output);
        self.last_render = start.elapsed();
        self.render_stats.add(TimingKind::Render, self.last_render);
        log::trace!(
            "rendered {}x{} ({}) in {:?}",
            self.output.width(),
            self.output.height(),
            self.projector.algorithm().label(),
            self.last_render
        );
    }
}

fn ensure_finite(what: &str, values: &[f64]) -> Result<()> {
    if values.iter().all(|v| v.is_finite()) {
        Ok(())
    } else {
        Err(ViewerError::InvalidEvent(format!(
            "{what} carries non-finite values {values:?}"
        )))
    }
}

const STEP_MAX: f64 = 360.0;

/// Like `f64::signum`, but zero stays zero.
fn sign(v: f64) -> f64 {
    if v > 0.0 {
        1.0
    } else if v < 0.0 {
        -1.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projector::tests::{coordinate_source, decode};

    fn controller(width: u32, height: u32) -> ViewportController {
        ViewportController::new(
            Arc::new(coordinate_source(64, 32)),
            ViewConfig::default(),
            width,
            height,
            Algorithm::Serial,
        )
        .unwrap()
    }

    #[test]
    fn starts_from_default_view() {
        let c = controller(40, 30);
        assert_eq!(*c.params(), ViewportParameters::new(0.0, 0.0, 0.0, 90.0));
        assert!(!c.drag_state().is_dragging);
    }

    #[test]
    fn drag_pans_by_fraction_of_fov() {
        let mut c = controller(400, 300);
        let down = c.handle(InputEvent::PointerDown { x: 100.0, y: 100.0 }).unwrap();
        assert!(!down.redrawn);
        let moved = c.handle(InputEvent::PointerMove { x: 50.0, y: 100.0 }).unwrap();
        assert!(moved.redrawn);
        assert!((c.params().yaw - 11.25).abs() < 1e-12);
        assert_eq!(c.params().pitch, 0.0);
        assert_eq!(c.drag_state().last_x, 50.0);
    }

    #[test]
    fn vertical_drag_tilts() {
        let mut c = controller(400, 300);
        c.pointer_down(0.0, 150.0).unwrap();
        c.pointer_move(0.0, 180.0).unwrap();
        // dragging down by 30 px of 300 at fov 90 raises pitch by 9
        assert!((c.params().pitch - 9.0).abs() < 1e-12);
    }

    #[test]
    fn move_without_drag_is_ignored() {
        let mut c = controller(40, 30);
        let before = c.output().clone();
        let r = c.pointer_move(10.0, 10.0).unwrap();
        assert_eq!(r, EventResponse::default());
        assert_eq!(*c.params(), ViewportParameters::default());
        assert_eq!(c.output(), &before);
    }

    #[test]
    fn pointer_up_ends_drag() {
        let mut c = controller(40, 30);
        c.pointer_down(5.0, 5.0).unwrap();
        c.pointer_up();
        c.pointer_move(30.0, 30.0).unwrap();
        assert_eq!(c.params().yaw, 0.0);
    }

    #[test]
    fn wheel_zooms_in_steps_and_stops_at_minimum() {
        let mut c = controller(40, 30);
        let r = c.wheel(120.0).unwrap();
        assert_eq!(r, EventResponse { redrawn: true, suppress_default: true });
        assert_eq!(c.params().fov, 80.0);

        c.params.fov = 15.0;
        for _ in 0..10 {
            c.wheel(3.0).unwrap();
        }
        assert_eq!(c.params().fov, 10.0);

        c.wheel(-1.0).unwrap();
        assert_eq!(c.params().fov, 20.0);
        c.wheel(0.0).unwrap();
        assert_eq!(c.params().fov, 20.0);
    }

    #[test]
    fn key_bindings() {
        let cases = [
            (ViewKey::PageUp, ViewportParameters::new(0.0, 0.0, 350.0, 90.0)),
            (ViewKey::End, ViewportParameters::new(0.0, 0.0, 350.0, 90.0)),
            (ViewKey::PageDown, ViewportParameters::new(0.0, 0.0, 10.0, 90.0)),
            (ViewKey::Home, ViewportParameters::new(0.0, 0.0, 10.0, 90.0)),
            (ViewKey::ArrowLeft, ViewportParameters::new(-10.0, 0.0, 0.0, 90.0)),
            (ViewKey::ArrowRight, ViewportParameters::new(10.0, 0.0, 0.0, 90.0)),
            (ViewKey::ArrowUp, ViewportParameters::new(0.0, 10.0, 0.0, 90.0)),
            (ViewKey::ArrowDown, ViewportParameters::new(0.0, -10.0, 0.0, 90.0)),
            (ViewKey::Multiply, ViewportParameters::new(0.0, 0.0, 0.0, 80.0)),
            (ViewKey::Divide, ViewportParameters::new(0.0, 0.0, 0.0, 100.0)),
        ];
        for (key, expected) in cases {
            let mut c = controller(40, 30);
            let r = c.key_down(key);
            assert!(r.redrawn && r.suppress_default, "{key:?}");
            assert_eq!(*c.params(), expected, "{key:?}");
        }
    }

    #[test]
    fn unknown_key_does_not_render() {
        let mut c = controller(40, 30);
        assert_eq!(c.key_down(ViewKey::Other), EventResponse::default());
        assert_eq!(*c.params(), ViewportParameters::default());
    }

    #[test]
    fn repeated_keys_respect_limits() {
        let mut c = controller(40, 30);
        for _ in 0..20 {
            c.key_down(ViewKey::ArrowUp);
            c.key_down(ViewKey::ArrowRight);
        }
        assert_eq!(c.params().pitch, 90.0);
        // 200 degrees of yaw wraps to -160
        assert_eq!(c.params().yaw, -160.0);
    }

    #[test]
    fn rejects_nan_coordinates() {
        let mut c = controller(40, 30);
        assert!(matches!(
            c.pointer_down(f64::NAN, 1.0),
            Err(ViewerError::InvalidEvent(_))
        ));
        c.pointer_down(1.0, 1.0).unwrap();
        assert!(c.pointer_move(1.0, f64::INFINITY).is_err());
        assert!(c.wheel(f64::NAN).is_err());
        assert_eq!(*c.params(), ViewportParameters::default());
    }

    #[test]
    fn output_tracks_parameters() {
        let mut c = controller(1, 1);
        assert_eq!(decode(c.output().pixel(0, 0)), (32, 16));
        c.key_down(ViewKey::ArrowRight);
        c.key_down(ViewKey::ArrowRight);
        c.key_down(ViewKey::ArrowRight);
        // 30 degrees right of centre on a 64 px wide panorama
        let (x, _) = decode(c.output().pixel(0, 0));
        assert!(x.abs_diff(37) <= 1, "x = {x}");
    }

    #[test]
    fn new_source_resets_view() {
        let mut c = controller(20, 10);
        c.key_down(ViewKey::ArrowLeft);
        c.pointer_down(1.0, 1.0).unwrap();
        c.set_source(Arc::new(coordinate_source(32, 16)));
        assert_eq!(*c.params(), ViewportParameters::default());
        assert!(!c.drag_state().is_dragging);
        assert_eq!(c.source().width(), 32);
    }

    #[test]
    fn resize_reallocates_output() {
        let mut c = controller(20, 10);
        c.resize(8, 6).unwrap();
        assert_eq!(c.viewport_size(), (8, 6));
        assert_eq!(c.output().as_bytes().len(), 8 * 6 * 4);
        assert!(c.resize(0, 6).is_err());
    }

    #[test]
    fn advance_applies_deltas() {
        let mut c = controller(20, 10);
        let d = ViewDelta { yaw: 100.0, pitch: 50.0, roll: -30.0 };
        c.advance(d).unwrap();
        c.advance(d).unwrap();
        assert_eq!(*c.params(), ViewportParameters::new(-160.0, 90.0, 300.0, 90.0));
    }

    #[test]
    fn advance_rejects_non_finite_deltas() {
        let mut c = controller(20, 10);
        let nan = ViewDelta { yaw: f64::NAN, pitch: 0.0, roll: 0.0 };
        assert!(matches!(c.advance(nan), Err(ViewerError::InvalidEvent(_))));
        let huge = ViewDelta { yaw: f64::MAX, pitch: 0.0, roll: f64::MAX };
        c.params.roll = f64::MAX;
        assert!(c.advance(huge).is_err());
        c.params.roll = 0.0;
        assert_eq!(*c.params(), ViewportParameters::default());
        assert!(c.params().is_valid());
    }

    #[test]
    fn overflowing_drag_is_rejected() {
        let mut c = controller(40, 30);
        c.pointer_down(-1e308, 0.0).unwrap();
        assert!(matches!(
            c.pointer_move(1e308, 0.0),
            Err(ViewerError::InvalidEvent(_))
        ));
        assert_eq!(*c.params(), ViewportParameters::default());
        assert!(c.params().is_valid());

        // the view keeps working afterwards
        c.key_down(ViewKey::ArrowLeft);
        assert_eq!(c.params().yaw, -10.0);
    }

    #[test]
    fn typed_digits_set_the_step() {
        let mut c = controller(40, 30);
        let r = c.key_down(ViewKey::Digit(2));
        assert_eq!(r, EventResponse { redrawn: false, suppress_default: true });
        c.key_down(ViewKey::Digit(5));
        assert_eq!(c.step(), 25.0);
        c.key_down(ViewKey::ArrowRight);
        assert_eq!(c.params().yaw, 25.0);

        // a new run of digits starts over once another key ended the last one
        c.key_down(ViewKey::Digit(5));
        assert_eq!(c.step(), 5.0);
        c.wheel(1.0).unwrap();
        assert_eq!(c.params().fov, 85.0);

        c.key_down(ViewKey::Other);
        for d in [9, 9, 9, 9] {
            c.key_down(ViewKey::Digit(d));
        }
        assert_eq!(c.step(), 360.0);
    }

    #[test]
    fn every_render_is_counted() {
        let mut c = controller(20, 10);
        assert_eq!(c.render_stats().count(TimingKind::Render), 1);
        c.pointer_down(0.0, 0.0).unwrap();
        for x in 1..=5 {
            c.pointer_move(x as f64, 0.0).unwrap();
        }
        c.key_down(ViewKey::Other);
        assert_eq!(c.render_stats().count(TimingKind::Render), 6);
    }

    #[test]
    fn zero_sized_viewport_fails_at_setup() {
        let r = ViewportController::new(
            Arc::new(coordinate_source(8, 4)),
            ViewConfig::default(),
            0,
            0,
            Algorithm::Parallel,
        );
        assert!(matches!(r, Err(ViewerError::InvalidDimensions { .. })));
    }
}
