use log::debug;

use super::{Flow, Recognizer};
use crate::actions::Button;
use crate::config::Flag;
use crate::engine::gcr::Owner;
use crate::engine::state::WindowMode;
use crate::engine::{Ctx, Pose};

/// Index-only taps. Taps within `double_pinch_ms` of each other accumulate;
/// the count resolves to one click once the debounce deadline passes.
pub struct PinchClick;

fn pinch_signal(ctx: &mut Ctx<'_>, pose: &Pose<'_>) -> bool {
    let th = &ctx.settings.thresholds;
    if !(ctx.is_on(Flag::PinchClick)
        && pose.ext == 1
        && pose.index_only(th.index_grip_min)
        && !ctx.state.drag.dragging)
    {
        return false;
    }
    ctx.state.tap.is_pinching || ctx.claim(Owner::Pinch, pose.ext)
}

fn release(ctx: &mut Ctx<'_>) {
    ctx.state.tap.is_pinching = false;
    ctx.release_if(Owner::Pinch);
}

impl Recognizer for PinchClick {
    fn name(&self) -> &'static str {
        "pinch_click"
    }

    fn on_frame(&self, ctx: &mut Ctx<'_>, pose: &Pose<'_>) -> Flow {
        let down = pinch_signal(ctx, pose);
        let pos = ctx.state.cursor.pos;

        if down && !ctx.state.tap.is_pinching {
            let tap = &mut ctx.state.tap;
            tap.is_pinching = true;
            tap.pinch_start_ts = ctx.now;
            tap.pinch_start_pos = pos;
            return Flow::Continue;
        }
        if down || !ctx.state.tap.is_pinching {
            return Flow::Continue;
        }

        release(ctx);
        let th = &ctx.settings.thresholds;
        let tap = &ctx.state.tap;
        let dur = ctx.now.saturating_sub(tap.pinch_start_ts);
        let moved = tap.pinch_start_pos.dist(pos);
        let valid = dur <= th.pinch_tap_ms
            && moved < th.tap_move_px
            && !ctx.state.drag.dragging
            && ctx.state.window.mode == WindowMode::None;
        if !valid {
            debug!("pinch not a tap: {dur}ms, {moved:.1}px");
            return Flow::Continue;
        }

        let window = ctx.settings.clicks.double_pinch_ms;
        let now = ctx.now;
        let tap = &mut ctx.state.tap;
        tap.tap_count = match tap.last_tap_ts {
            Some(t) if now.saturating_sub(t) <= window => tap.tap_count + 1,
            _ => 1,
        };
        tap.last_tap_ts = Some(now);
        // replaces any pending click
        tap.deadline = Some(now + window);
        Flow::Continue
    }

    fn on_tick(&self, ctx: &mut Ctx<'_>) {
        let Some(deadline) = ctx.state.tap.deadline else {
            return;
        };
        if ctx.now < deadline {
            return;
        }
        let count = ctx.state.tap.tap_count;
        ctx.state.tap.deadline = None;
        ctx.state.tap.tap_count = 0;

        let (button, label) = if count >= 3 && ctx.settings.clicks.enable_middle_triple {
            (Button::Middle, "Middle click")
        } else if count == 2 {
            (Button::Right, "Right click")
        } else {
            (Button::Left, "Click")
        };
        if ctx.input("click", |s| s.click(button)) {
            ctx.tutor(label);
        }
    }

    fn on_hand_lost(&self, ctx: &mut Ctx<'_>) {
        release(ctx);
    }
}
