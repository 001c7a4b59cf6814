use super::{Flow, Recognizer, SwipeDir, cooled};
use crate::config::Flag;
use crate::engine::state::WindowMode;
use crate::engine::{Ctx, Pose};
use crate::window::SnapPosition;

/// Move-mode snapping: a pinch tap steps through the snap order, a flick
/// snaps to the matching edge.
pub struct SnapCycle;

fn snap(ctx: &mut Ctx<'_>, pos: SnapPosition) {
    ctx.state.snap.last_ts = Some(ctx.now);
    if ctx.window_op("snap", |w| w.snap(pos)) {
        ctx.tutor(format!("Snap: {}", pos.as_str()));
    }
}

impl Recognizer for SnapCycle {
    fn name(&self) -> &'static str {
        "snap_cycle"
    }

    fn on_frame(&self, ctx: &mut Ctx<'_>, pose: &Pose<'_>) -> Flow {
        let th = &ctx.settings.thresholds;
        let in_band = pose.pinch >= th.pinch_on && pose.pinch <= th.snap_tap_max;
        if !(ctx.is_on(Flag::SnapCycle)
            && ctx.state.window.mode == WindowMode::Move
            && pose.ext == 4)
        {
            ctx.state.snap.in_band = true;
            return Flow::Continue;
        }

        let rising = in_band && !ctx.state.snap.in_band;
        ctx.state.snap.in_band = in_band;
        if !cooled(ctx.state.snap.last_ts, ctx.now, th.snap_cooldown_ms) {
            return Flow::Continue;
        }

        if rising {
            let order = &ctx.state.snap.order;
            if order.is_empty() {
                return Flow::Continue;
            }
            let pos = order[ctx.state.snap.index % order.len()];
            ctx.state.snap.index = ctx.state.snap.index.wrapping_add(1);
            snap(ctx, pos);
        } else if let Some(dir) = SwipeDir::from_velocity(pose.palm_velocity(), th.move_snap_swipe_vel) {
            let pos = match dir {
                SwipeDir::Left => SnapPosition::Left,
                SwipeDir::Right => SnapPosition::Right,
                SwipeDir::Up => SnapPosition::Top,
                SwipeDir::Down => SnapPosition::Bottom,
            };
            snap(ctx, pos);
        }
        Flow::Continue
    }

    fn on_hand_lost(&self, ctx: &mut Ctx<'_>) {
        ctx.state.snap.in_band = true;
    }
}
