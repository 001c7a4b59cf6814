use super::{Flow, Recognizer, SwipeDir, cooled};
use crate::config::Flag;
use crate::engine::gcr::Owner;
use crate::engine::state::WindowMode;
use crate::engine::{Ctx, Pose};

/// Open-hand flick: desktop switching and overview.
pub struct OsSwipe;

impl Recognizer for OsSwipe {
    fn name(&self) -> &'static str {
        "os_swipe"
    }

    fn on_frame(&self, ctx: &mut Ctx<'_>, pose: &Pose<'_>) -> Flow {
        let th = &ctx.settings.thresholds;
        let lock_ok = matches!(ctx.state.gcr.current(), None | Some(Owner::WindowMove));
        if !(ctx.is_on(Flag::OsSwipes)
            && pose.ext >= 4
            && pose.grab <= th.swipe_max_grab
            && ctx.state.window.mode == WindowMode::None
            && lock_ok)
        {
            return Flow::Continue;
        }
        let Some(dir) = SwipeDir::from_velocity(pose.palm_velocity(), th.swipe_min_vel) else {
            return Flow::Continue;
        };
        if !cooled(ctx.state.swipe.last_os_ts, ctx.now, th.swipe_cooldown_ms) {
            return Flow::Continue;
        }
        ctx.state.swipe.last_os_ts = Some(ctx.now);

        let keys = &ctx.settings.keys;
        let chord = match dir {
            SwipeDir::Left => keys.prev_desktop.clone(),
            SwipeDir::Right => keys.next_desktop.clone(),
            SwipeDir::Up => keys.overview_up.clone(),
            SwipeDir::Down => keys.overview_down.clone(),
        };
        if ctx.chord(&chord) {
            ctx.tutor(format!("OS swipe: {}", dir.as_str()));
        }
        Flow::Continue
    }

    fn on_hand_lost(&self, ctx: &mut Ctx<'_>) {
        ctx.state.swipe.last_os_ts = None;
    }
}
