use super::{Flow, Recognizer};
use crate::actions::Button;
use crate::config::Flag;
use crate::engine::gcr::Owner;
use crate::engine::state::WindowMode;
use crate::engine::{Ctx, Pose};

/// Fist drag: left button held between `grab_on` and `grab_off`.
pub struct Drag;

fn end(ctx: &mut Ctx<'_>) {
    if !ctx.state.drag.dragging {
        return;
    }
    ctx.input("drag release", |s| s.release(Button::Left));
    ctx.state.drag.dragging = false;
    ctx.release_if(Owner::Drag);
    ctx.tutor("Drag end");
}

impl Recognizer for Drag {
    fn name(&self) -> &'static str {
        "drag"
    }

    fn on_frame(&self, ctx: &mut Ctx<'_>, pose: &Pose<'_>) -> Flow {
        let th = &ctx.settings.thresholds;

        if ctx.state.drag.dragging {
            // extending fingers ends a drag even while the grip reads high
            if pose.grab <= th.grab_off || pose.ext > 1 || !ctx.is_on(Flag::Drag) {
                end(ctx);
            }
            return Flow::Continue;
        }

        let eligible = ctx.is_on(Flag::Drag)
            && pose.ext <= 1
            && pose.grab >= th.grab_on
            && ctx.state.window.mode == WindowMode::None
            && ctx.state.last_palm_vel < th.still_vel;
        if !eligible {
            return Flow::Continue;
        }
        // a tightening grip turns an index pinch into a drag
        if ctx.state.gcr.current() == Some(Owner::Pinch) {
            ctx.state.gcr.release();
        }
        if ctx.claim(Owner::Drag, pose.ext) && ctx.input("drag press", |s| s.press(Button::Left)) {
            ctx.state.drag.dragging = true;
            ctx.tutor("Drag start");
        } else {
            ctx.release_if(Owner::Drag);
        }
        Flow::Continue
    }

    fn on_hand_lost(&self, ctx: &mut Ctx<'_>) {
        end(ctx);
    }
}

#[cfg(test)]
mod tests {
    use crate::actions::Button;
    use crate::config::Flag;
    use crate::engine::gcr::Owner;
    use crate::testing::{Call, HandBuilder, frame, test_engine};

    #[test]
    fn moving_hand_does_not_start_drag() {
        let (mut e, _rx) = test_engine();
        let f = frame(vec![HandBuilder::new().ext(0).grab(0.9).velocity([200.0, 0.0, 0.0]).build()]);
        e.on_frame(&f, 0);
        assert!(!e.state().drag.dragging);
        let still = frame(vec![HandBuilder::new().ext(0).grab(0.9).build()]);
        e.on_frame(&still, 10);
        assert!(e.state().drag.dragging);
        assert_eq!(e.state().gcr.current(), Some(Owner::Drag));
    }

    #[test]
    fn opening_hand_ends_drag_and_frees_lock() {
        let (mut e, _rx) = test_engine();
        e.on_frame(&frame(vec![HandBuilder::new().ext(1).grab(0.8).build()]), 0);
        assert!(e.state().drag.dragging);
        e.on_frame(&frame(vec![HandBuilder::new().ext(4).grab(0.1).build()]), 20);
        assert!(!e.state().drag.dragging);
        assert_ne!(e.state().gcr.current(), Some(Owner::Drag));
        assert_eq!(e.sink().count(|c| *c == Call::Release(Button::Left)), 1);
    }

    #[test]
    fn extending_fingers_ends_drag_despite_grip() {
        let (mut e, _rx) = test_engine();
        e.on_frame(&frame(vec![HandBuilder::new().ext(1).grab(0.8).build()]), 0);
        e.on_frame(&frame(vec![HandBuilder::new().ext(2).grab(0.8).build()]), 20);
        assert!(!e.state().drag.dragging);
        assert_eq!(e.sink().count(|c| *c == Call::Release(Button::Left)), 1);
    }

    #[test]
    fn flag_off_ends_drag() {
        let (mut e, _rx) = test_engine();
        e.on_frame(&frame(vec![HandBuilder::new().ext(1).grab(0.8).build()]), 0);
        e.set_gesture(Flag::Drag, false);
        e.on_frame(&frame(vec![HandBuilder::new().ext(1).grab(0.8).build()]), 10);
        assert!(!e.state().drag.dragging);
        assert_eq!(e.state().gcr.current(), None);
    }

    #[test]
    fn failed_press_leaves_state_clean() {
        let (mut e, _rx) = test_engine();
        e.sink_mut().fail = true;
        e.on_frame(&frame(vec![HandBuilder::new().ext(1).grab(0.8).build()]), 0);
        assert!(!e.state().drag.dragging);
        assert_ne!(e.state().gcr.current(), Some(Owner::Drag));
    }
}
