//! Floating menu buttons that can be dragged around, and the triangle marker
//! that glides toward background clicks.

use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use crate::dom::{Element, ElementCache, Viewport, CLASS_ACTIVE, CLASS_VISIBLE};
use crate::navigation::Page;
use crate::transition::FRAME;
use crate::{log_debug, log_warn};

const ENABLE_LOGS: bool = true;

pub const BUTTON_SIZE: f64 = 56.0;
pub const BUTTON_MARGIN: f64 = 24.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FloatingButton {
    Questions,
    Settings,
    Feedback,
}

impl FloatingButton {
    pub const ALL: [FloatingButton; 3] = [
        FloatingButton::Questions,
        FloatingButton::Settings,
        FloatingButton::Feedback,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FloatingButton::Questions => "questions",
            FloatingButton::Settings => "settings",
            FloatingButton::Feedback => "feedback",
        }
    }
}

fn set_position(cache: &ElementCache, element: Element, x: f64, y: f64) -> Result<()> {
    cache.set_style(element, "left", Some(&format!("{x:.0}px")))?;
    cache.set_style(element, "top", Some(&format!("{y:.0}px")))
}

/// Home positions of the floating buttons.
pub struct FloatingLayout;

impl FloatingLayout {
    pub fn positions(viewport: Viewport) -> [(FloatingButton, (f64, f64)); 3] {
        let bottom = (viewport.height - BUTTON_SIZE - BUTTON_MARGIN).max(0.0);
        [
            (
                FloatingButton::Questions,
                (((viewport.width - BUTTON_SIZE) / 2.0).max(0.0), BUTTON_MARGIN),
            ),
            (FloatingButton::Settings, (BUTTON_MARGIN, bottom)),
            (
                FloatingButton::Feedback,
                ((viewport.width - BUTTON_SIZE - BUTTON_MARGIN).max(0.0), bottom),
            ),
        ]
    }

    /// Moves every button to its home position; also run on resize.
    pub fn apply(cache: &ElementCache) -> Result<()> {
        for (button, (x, y)) in Self::positions(cache.viewport()) {
            set_position(cache, Element::FloatingButton(button), x, y)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
struct Gesture {
    button: FloatingButton,
    start: (f64, f64),
    offset: (f64, f64),
    size: (f64, f64),
}

#[derive(Default)]
struct DragState {
    gesture: Option<Gesture>,
    was_dragged: bool,
}

/// Pointer handling for the floating buttons. A drag never doubles as a
/// click: the click the platform synthesises after pointer-up is swallowed.
pub struct DragController {
    cache: Arc<ElementCache>,
    state: Mutex<DragState>,
}

impl DragController {
    pub fn new(cache: Arc<ElementCache>) -> Self {
        Self {
            cache,
            state: Mutex::new(DragState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, DragState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Starts a drag. Ignored unless the menu page is showing.
    pub fn pointer_down(&self, button: FloatingButton, x: f64, y: f64) -> Result<bool> {
        if !self.cache.has_class(Element::Page(Page::Menu), CLASS_ACTIVE)? {
            return Ok(false);
        }
        let rect = self.cache.rect(Element::FloatingButton(button))?;
        let mut state = self.lock();
        state.gesture = Some(Gesture {
            button,
            start: (x, y),
            offset: (x - rect.x, y - rect.y),
            size: (rect.width, rect.height),
        });
        state.was_dragged = false;
        Ok(true)
    }

    pub fn pointer_move(&self, x: f64, y: f64) -> Result<()> {
        let gesture = {
            let mut state = self.lock();
            let Some(gesture) = state.gesture else {
                return Ok(());
            };
            if (x, y) != gesture.start {
                state.was_dragged = true;
            }
            gesture
        };

        let viewport = self.cache.viewport();
        let left = (x - gesture.offset.0).clamp(0.0, (viewport.width - gesture.size.0).max(0.0));
        let top = (y - gesture.offset.1).clamp(0.0, (viewport.height - gesture.size.1).max(0.0));
        set_position(
            &self.cache,
            Element::FloatingButton(gesture.button),
            left,
            top,
        )
    }

    pub fn pointer_up(&self) {
        if let Some(gesture) = self.lock().gesture.take() {
            log_debug!("Released {} button", gesture.button.as_str());
        }
    }

    /// Whether a click on `button` should run its action. The first click
    /// after a drag is consumed.
    pub fn click(&self, button: FloatingButton) -> bool {
        let mut state = self.lock();
        if state.was_dragged {
            state.was_dragged = false;
            log_debug!("Suppressed click on {} after drag", button.as_str());
            return false;
        }
        true
    }
}

/// Rotation to face `(dx, dy)`, in degrees, continuing from `current` the
/// short way round so the marker never spins more than half a turn.
pub fn shortest_rotation(current: f64, dx: f64, dy: f64) -> f64 {
    // The marker artwork points up; 0deg means "towards negative y".
    let heading = dy.atan2(dx).to_degrees() + 90.0;
    let delta = (heading - current).rem_euclid(360.0);
    let delta = if delta > 180.0 { delta - 360.0 } else { delta };
    current + delta
}

#[derive(Debug, Clone, Copy, Default)]
struct MarkerState {
    position: Option<(f64, f64)>,
    rotation: f64,
}

pub struct TriangleMarker {
    cache: Arc<ElementCache>,
    state: Mutex<MarkerState>,
    glide: Mutex<Option<JoinHandle<()>>>,
    speed: f64,
}

impl TriangleMarker {
    pub fn new(cache: Arc<ElementCache>, speed: f64) -> Self {
        Self {
            cache,
            state: Mutex::new(MarkerState::default()),
            glide: Mutex::new(None),
            speed: speed.max(0.1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MarkerState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn lock_glide(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        match self.glide.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn position(&self) -> Option<(f64, f64)> {
        self.lock().position
    }

    pub fn rotation(&self) -> f64 {
        self.lock().rotation
    }

    fn render(&self, (x, y): (f64, f64), rotation: f64) -> Result<()> {
        set_position(&self.cache, Element::Triangle, x, y)?;
        self.cache.set_style(
            Element::Triangle,
            "transform",
            Some(&format!("translate(-50%, -50%) rotate({rotation:.1}deg)")),
        )
    }

    /// Shows the marker where it was last left, or centred on first display.
    pub fn show(&self) -> Result<()> {
        let (position, rotation) = {
            let mut state = self.lock();
            let position = *state
                .position
                .get_or_insert_with(|| self.cache.viewport().center());
            (position, state.rotation)
        };
        self.render(position, rotation)?;
        self.cache.add_class(Element::Triangle, CLASS_VISIBLE)
    }

    pub fn is_visible(&self) -> bool {
        self.cache
            .has_class(Element::Triangle, CLASS_VISIBLE)
            .unwrap_or(false)
    }

    /// Glides toward `(x, y)` at constant speed; a new target replaces the
    /// running glide.
    pub fn glide_to(self: &Arc<Self>, x: f64, y: f64) {
        let mut glide = self.lock_glide();
        if let Some(handle) = glide.take() {
            handle.abort();
        }

        let from = {
            let mut state = self.lock();
            let from = state
                .position
                .unwrap_or_else(|| self.cache.viewport().center());
            state.rotation = shortest_rotation(state.rotation, x - from.0, y - from.1);
            from
        };
        if from == (x, y) {
            return;
        }

        let marker = self.clone();
        *glide = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(FRAME);
            loop {
                interval.tick().await;
                if !marker.step_toward((x, y)) {
                    break;
                }
            }
        }));
    }

    /// Advances one frame. Returns `false` on arrival.
    fn step_toward(&self, target: (f64, f64)) -> bool {
        let (position, rotation, arrived) = {
            let mut state = self.lock();
            let current = state.position.unwrap_or(target);
            let (dx, dy) = (target.0 - current.0, target.1 - current.1);
            let distance = dx.hypot(dy);
            let next = if distance <= self.speed {
                target
            } else {
                (
                    current.0 + dx / distance * self.speed,
                    current.1 + dy / distance * self.speed,
                )
            };
            state.position = Some(next);
            (next, state.rotation, next == target)
        };

        if let Err(err) = self.render(position, rotation) {
            log_warn!("Triangle glide stopped: {err:#}");
            return false;
        }
        !arrived
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::VirtualDom;
    use std::time::Duration;

    fn menu_dom() -> Arc<VirtualDom> {
        let dom = Arc::new(VirtualDom::with_app_markup());
        let cache = ElementCache::new(dom.clone());
        cache.add_class(Element::Page(Page::Menu), CLASS_ACTIVE).unwrap();
        dom
    }

    #[test]
    fn layout_anchors_buttons_to_the_viewport() {
        let positions = FloatingLayout::positions(Viewport {
            width: 1000.0,
            height: 600.0,
        });
        assert_eq!(positions[0], (FloatingButton::Questions, (472.0, 24.0)));
        assert_eq!(positions[1], (FloatingButton::Settings, (24.0, 520.0)));
        assert_eq!(positions[2], (FloatingButton::Feedback, (920.0, 520.0)));
    }

    #[test]
    fn drag_suppresses_the_following_click_only() {
        let dom = menu_dom();
        let cache = Arc::new(ElementCache::new(dom.clone()));
        FloatingLayout::apply(&cache).unwrap();
        let drag = DragController::new(cache);

        // Settings rests at (24, 720); the grab point is kept under the pointer.
        assert!(drag.pointer_down(FloatingButton::Settings, 30.0, 730.0).unwrap());
        drag.pointer_move(130.0, 630.0).unwrap();
        drag.pointer_up();

        let button = Element::FloatingButton(FloatingButton::Settings);
        assert_eq!(dom.element_style(button, "left").as_deref(), Some("124px"));
        assert_eq!(dom.element_style(button, "top").as_deref(), Some("620px"));
        assert!(!drag.click(FloatingButton::Settings));
        assert!(drag.click(FloatingButton::Settings));
    }

    #[test]
    fn plain_click_runs_the_action() {
        let dom = menu_dom();
        let drag = DragController::new(Arc::new(ElementCache::new(dom)));
        drag.pointer_down(FloatingButton::Feedback, 10.0, 10.0).unwrap();
        drag.pointer_up();
        assert!(drag.click(FloatingButton::Feedback));
    }

    #[test]
    fn drags_are_clamped_and_menu_only() {
        let dom = Arc::new(VirtualDom::with_app_markup());
        let cache = Arc::new(ElementCache::new(dom.clone()));
        let drag = DragController::new(cache.clone());
        assert!(!drag.pointer_down(FloatingButton::Questions, 5.0, 5.0).unwrap());

        cache.add_class(Element::Page(Page::Menu), CLASS_ACTIVE).unwrap();
        assert!(drag.pointer_down(FloatingButton::Questions, 5.0, 5.0).unwrap());
        drag.pointer_move(5_000.0, -300.0).unwrap();
        let button = Element::FloatingButton(FloatingButton::Questions);
        assert_eq!(dom.element_style(button, "left").as_deref(), Some("1224px"));
        assert_eq!(dom.element_style(button, "top").as_deref(), Some("0px"));
    }

    #[test]
    fn rotation_takes_the_short_way_round() {
        // Facing right (90deg), then asked to face up: turn back by 90.
        assert!(shortest_rotation(90.0, 0.0, -1.0).abs() < 1e-9);
        // From 350deg to "right" is +100, not -260.
        assert!((shortest_rotation(350.0, 1.0, 0.0) - 450.0).abs() < 1e-9);
        assert!((shortest_rotation(0.0, -1.0, 0.0) - -90.0).abs() < 1e-9);
    }

    #[tokio::test(start_paused = true)]
    async fn marker_glides_at_constant_speed_and_remembers_position() {
        let dom = Arc::new(VirtualDom::with_app_markup());
        let marker = Arc::new(TriangleMarker::new(Arc::new(ElementCache::new(dom.clone())), 10.0));
        marker.show().unwrap();
        assert_eq!(marker.position(), Some((640.0, 400.0)));

        marker.glide_to(700.0, 400.0);
        // First tick fires immediately, then one per frame.
        tokio::time::sleep(FRAME * 2 + Duration::from_millis(1)).await;
        assert_eq!(marker.position(), Some((670.0, 400.0)));

        tokio::time::sleep(FRAME * 10).await;
        assert_eq!(marker.position(), Some((700.0, 400.0)));
        assert_eq!(marker.rotation(), 90.0);

        marker.glide_to(700.0, 300.0);
        marker.glide_to(800.0, 400.0);
        tokio::time::sleep(FRAME * 20).await;
        assert_eq!(marker.position(), Some((800.0, 400.0)));
    }
}
