use super::{Flow, Recognizer};
use crate::actions::Button;
use crate::config::Flag;
use crate::engine::gcr::Owner;
use crate::engine::{Ctx, Pose};

/// Left button held for as long as exactly three fingers are extended.
pub struct ThreeFingerDrag;

fn end(ctx: &mut Ctx<'_>) {
    if ctx.state.drag.three {
        ctx.input("three-finger release", |s| s.release(Button::Left));
        ctx.state.drag.three = false;
        ctx.tutor("3-finger drag end");
    }
    ctx.release_if(Owner::ThreeDrag);
}

impl Recognizer for ThreeFingerDrag {
    fn name(&self) -> &'static str {
        "three_finger_drag"
    }

    fn on_frame(&self, ctx: &mut Ctx<'_>, pose: &Pose<'_>) -> Flow {
        let enabled = ctx.settings.options.three_finger_drag && ctx.is_on(Flag::ThreeFingerDrag);
        if !(enabled && pose.ext == 3 && !ctx.state.drag.dragging) {
            end(ctx);
            return Flow::Continue;
        }
        if ctx.state.drag.three || !ctx.claim(Owner::ThreeDrag, pose.ext) {
            return Flow::Continue;
        }
        if ctx.input("three-finger press", |s| s.press(Button::Left)) {
            ctx.state.drag.three = true;
            ctx.tutor("3-finger drag");
        } else {
            ctx.release_if(Owner::ThreeDrag);
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

    fn three() -> crate::frame::Frame {
        frame(vec![HandBuilder::new().ext(3).build()])
    }

    #[test]
    fn press_on_three_release_on_exit() {
        let (mut e, _rx) = test_engine();
        e.on_frame(&three(), 0);
        e.on_frame(&three(), 10);
        assert!(e.state().drag.three);
        assert_eq!(e.state().gcr.current(), Some(Owner::ThreeDrag));
        assert_eq!(e.sink().presses(), vec![Button::Left]);

        e.on_frame(&frame(vec![HandBuilder::new().ext(2).build()]), 20);
        assert!(!e.state().drag.three);
        assert_ne!(e.state().gcr.current(), Some(Owner::ThreeDrag));
        assert_eq!(e.sink().count(|c| *c == Call::Release(Button::Left)), 1);
    }

    #[test]
    fn released_when_flag_disabled() {
        let (mut e, _rx) = test_engine();
        e.on_frame(&three(), 0);
        e.set_gesture(Flag::ThreeFingerDrag, false);
        e.on_frame(&three(), 10);
        assert!(!e.state().drag.three);
        assert_eq!(e.state().gcr.current(), None);
        assert_eq!(e.sink().count(|c| *c == Call::Release(Button::Left)), 1);
    }

    #[test]
    fn released_on_hand_loss() {
        let (mut e, _rx) = test_engine();
        e.on_frame(&three(), 0);
        e.on_frame(&frame(vec![]), 10);
        assert!(!e.state().drag.three);
        assert_eq!(e.state().gcr.current(), None);
        assert_eq!(e.sink().count(|c| *c == Call::Release(Button::Left)), 1);
    }

    #[test]
    fn profile_override_disables() {
        let (mut e, _rx) = test_engine();
        e.focus("firefox", 0);
        e.on_frame(&three(), 10);
        assert!(!e.state().drag.three);
        assert!(e.sink().presses().is_empty());
    }
}
