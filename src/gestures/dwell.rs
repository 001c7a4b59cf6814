use log::trace;

use super::{Flow, Recognizer};
use crate::actions::Button;
use crate::config::Flag;
use crate::engine::state::WindowMode;
use crate::engine::{Ctx, Pose};

/// Left click after the pointer rests inside `radius_px` for `ms`.
pub struct DwellClick;

fn stop(ctx: &mut Ctx<'_>) {
    ctx.state.dwell.anchor = None;
    ctx.state.dwell.start_ts = 0;
}

impl Recognizer for DwellClick {
    fn name(&self) -> &'static str {
        "dwell_click"
    }

    fn on_frame(&self, ctx: &mut Ctx<'_>, pose: &Pose<'_>) -> Flow {
        let cfg = &ctx.settings.dwell;
        let busy = ctx.state.drag.dragging
            || ctx.state.drag.three
            || ctx.state.window.mode != WindowMode::None
            || ctx.state.tap.is_pinching;
        if !(ctx.is_on(Flag::DwellClick) && cfg.enabled && !pose.clutch) || busy {
            stop(ctx);
            return Flow::Continue;
        }
        if ctx.state.last_palm_vel > ctx.settings.thresholds.still_vel {
            stop(ctx);
            return Flow::Continue;
        }
        if ctx.now < ctx.state.dwell.cooldown_until {
            return Flow::Continue;
        }

        let pos = ctx.state.cursor.pos;
        match ctx.state.dwell.anchor {
            Some(a) if a.dist(pos) <= cfg.radius_px => {}
            _ => {
                trace!("dwell anchor at {:.0},{:.0}", pos.x, pos.y);
                ctx.state.dwell.anchor = Some(pos);
                ctx.state.dwell.start_ts = ctx.now;
            }
        }

        if ctx.now.saturating_sub(ctx.state.dwell.start_ts) >= cfg.ms {
            ctx.state.dwell.cooldown_until = ctx.now + cfg.cooldown_ms;
            stop(ctx);
            if ctx.input("dwell click", |s| s.click(Button::Left)) {
                ctx.tutor("Dwell click");
            }
        }
        Flow::Continue
    }

    fn on_hand_lost(&self, ctx: &mut Ctx<'_>) {
        stop(ctx);
        ctx.state.dwell.cooldown_until = 0;
    }
}
