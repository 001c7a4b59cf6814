use log::debug;

use super::{Flow, Recognizer, SwipeDir, cooled};
use crate::engine::{Ctx, Pose};

/// Three-finger flick dispatching the active profile's `three_swipe.<dir>`
/// binding. Only live while three-finger drag is off.
pub struct ThreeFingerBinding;

impl Recognizer for ThreeFingerBinding {
    fn name(&self) -> &'static str {
        "three_swipe"
    }

    fn on_frame(&self, ctx: &mut Ctx<'_>, pose: &Pose<'_>) -> Flow {
        let th = &ctx.settings.thresholds;
        if ctx.settings.options.three_finger_drag || pose.ext != 3 || pose.grab > th.swipe_max_grab {
            return Flow::Continue;
        }
        let Some(dir) = SwipeDir::from_velocity(pose.palm_velocity(), th.swipe_min_vel) else {
            return Flow::Continue;
        };
        if !cooled(ctx.state.swipe.last_three_ts, ctx.now, th.three_swipe_cooldown_ms) {
            return Flow::Continue;
        }
        let name = format!("three_swipe.{}", dir.as_str());
        let Some(binding) = ctx.profile.binding(&name) else {
            debug!("no binding for {name} in profile {}", ctx.profile.id);
            return Flow::Continue;
        };
        ctx.state.swipe.last_three_ts = Some(ctx.now);
        if ctx.input(&name, |s| binding.run(s)) {
            ctx.tutor(format!("3-finger swipe: {}", dir.as_str()));
        }
        Flow::Consumed
    }

    fn on_hand_lost(&self, ctx: &mut Ctx<'_>) {
        ctx.state.swipe.last_three_ts = None;
    }
}

#[cfg(test)]
mod tests {
    use crate::actions::Button;
    use crate::keys::Key;
    use crate::testing::{HandBuilder, TestEngine, frame, test_engine};

    fn flick(e: &mut TestEngine, v: [f64; 3], now: u64) {
        let h = HandBuilder::new().ext(3).velocity(v).build();
        e.on_frame(&frame(vec![h]), now);
    }

    #[test]
    fn firefox_binding_fires_with_cooldown() {
        let (mut e, _rx) = test_engine();
        e.focus("firefox", 0);
        flick(&mut e, [1200.0, 0.0, 0.0], 10);
        assert_eq!(e.sink().keys_down(), vec![Key::Ctrl, Key::Tab]);
        flick(&mut e, [1200.0, 0.0, 0.0], 500);
        assert_eq!(e.sink().keys_down().len(), 2);
        flick(&mut e, [-1200.0, 0.0, 0.0], 800);
        assert_eq!(
            e.sink().keys_down()[2..].to_vec(),
            vec![Key::Ctrl, Key::Shift, Key::Tab]
        );
        // consumed: three-finger drag never pressed
        assert!(e.sink().presses().is_empty());
    }

    #[test]
    fn mouse_binding_clicks() {
        let (mut e, _rx) = test_engine();
        e.focus("google-chrome", 0);
        flick(&mut e, [0.0, 1500.0, 0.0], 10);
        assert_eq!(e.sink().presses(), vec![Button::Middle]);
    }

    #[test]
    fn inactive_while_three_finger_drag_enabled() {
        let (mut e, _rx) = test_engine();
        flick(&mut e, [1200.0, 0.0, 0.0], 10);
        assert!(e.sink().keys_down().is_empty());
        assert!(e.state().drag.three);
    }

    #[test]
    fn unbound_direction_falls_through() {
        let (mut e, _rx) = test_engine();
        e.focus("google-chrome", 0);
        // chrome binds no "down"
        flick(&mut e, [0.0, -1500.0, 0.0], 10);
        assert!(e.sink().keys_down().is_empty());
        assert_eq!(e.state().swipe.last_three_ts, None);
    }
}
