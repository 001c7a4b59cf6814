use super::{Flow, Recognizer};
use crate::config::Flag;
use crate::engine::state::WindowMode;
use crate::engine::{Ctx, Pose};

/// Open five-finger hold shows the desktop; a hard pinch with the hand open
/// opens the launcher.
pub struct FiveFinger;

fn reset(ctx: &mut Ctx<'_>) {
    ctx.state.five.open_since = None;
    ctx.state.five.fired = false;
}

impl Recognizer for FiveFinger {
    fn name(&self) -> &'static str {
        "five_finger"
    }

    fn on_frame(&self, ctx: &mut Ctx<'_>, pose: &Pose<'_>) -> Flow {
        if pose.ext < 5 || ctx.state.window.mode == WindowMode::Resize {
            reset(ctx);
            return Flow::Continue;
        }
        let settings = ctx.settings;
        let th = &settings.thresholds;
        let now = ctx.now;

        let since = *ctx.state.five.open_since.get_or_insert(now);
        if !ctx.state.five.fired && now.saturating_sub(since) >= th.five_hold_ms {
            ctx.state.five.fired = true;
            if ctx.is_on(Flag::ShowDesktop) && ctx.chord(&settings.keys.show_desktop) {
                ctx.tutor("Show Desktop");
            }
        }

        if pose.pinch > th.launchpad_pinch
            && ctx
                .state
                .five
                .last_pinch_ts
                .is_none_or(|t| now.saturating_sub(t) >= th.launchpad_cooldown_ms)
        {
            ctx.state.five.last_pinch_ts = Some(now);
            if ctx.is_on(Flag::Launchpad) && ctx.chord(&settings.keys.launchpad) {
                ctx.tutor("Launchpad");
            }
        }
        Flow::Continue
    }

    fn on_hand_lost(&self, ctx: &mut Ctx<'_>) {
        reset(ctx);
    }
}

#[cfg(test)]
mod tests {
    use crate::config::Flag;
    use crate::keys::Key;
    use crate::testing::{HandBuilder, TestEngine, frame, test_engine};

    fn hand(e: &mut TestEngine, ext: usize, pinch: f64, now: u64) {
        let h = HandBuilder::new().ext(ext).pinch(pinch).build();
        e.on_frame(&frame(vec![h]), now);
    }

    #[test]
    fn hold_shows_desktop_once_per_hold() {
        let (mut e, _rx) = test_engine();
        for t in [0, 200, 399] {
            hand(&mut e, 5, 0.0, t);
        }
        assert!(e.sink().keys_down().is_empty());
        hand(&mut e, 5, 0.0, 400);
        assert_eq!(e.sink().keys_down(), vec![Key::Super, Key::Letter('D')]);
        hand(&mut e, 5, 0.0, 900);
        assert_eq!(e.sink().keys_down().len(), 2);

        // dropping below five fingers restarts the hold
        hand(&mut e, 4, 0.0, 950);
        hand(&mut e, 5, 0.0, 1000);
        hand(&mut e, 5, 0.0, 1400);
        assert_eq!(e.sink().keys_down().len(), 4);
    }

    #[test]
    fn hand_loss_resets_hold() {
        let (mut e, _rx) = test_engine();
        hand(&mut e, 5, 0.0, 0);
        e.on_frame(&frame(vec![]), 300);
        hand(&mut e, 5, 0.0, 350);
        hand(&mut e, 5, 0.0, 500);
        assert!(e.sink().keys_down().is_empty());
        assert_eq!(e.state().five.open_since, Some(350));
    }

    #[test]
    fn hard_pinch_opens_launcher_with_cooldown() {
        let (mut e, _rx) = test_engine();
        // otherwise the pinch enters resize mode first
        e.set_gesture(Flag::WindowResize, false);
        e.set_gesture(Flag::ShowDesktop, false);
        hand(&mut e, 5, 0.95, 0);
        assert_eq!(e.sink().keys_down(), vec![Key::Super, Key::Letter('A')]);
        hand(&mut e, 5, 0.95, 600);
        assert_eq!(e.sink().keys_down().len(), 2);
        hand(&mut e, 5, 0.95, 1300);
        assert_eq!(e.sink().keys_down().len(), 4);
    }

    #[test]
    fn launcher_rearms_exactly_at_cooldown() {
        let (mut e, _rx) = test_engine();
        e.set_gesture(Flag::WindowResize, false);
        e.set_gesture(Flag::ShowDesktop, false);
        hand(&mut e, 5, 0.95, 100);
        hand(&mut e, 5, 0.95, 1299);
        assert_eq!(e.sink().keys_down().len(), 2);
        hand(&mut e, 5, 0.95, 1300);
        assert_eq!(e.sink().keys_down().len(), 4);
    }

    #[test]
    fn resize_mode_suppresses() {
        let (mut e, _rx) = test_engine();
        hand(&mut e, 5, 0.95, 0);
        hand(&mut e, 5, 0.95, 500);
        assert!(e.sink().keys_down().is_empty());
        assert_eq!(e.state().five.open_since, None);
    }
}
