use log::trace;

use super::{Flow, Recognizer};
use crate::actions::with_chord;
use crate::engine::gcr::Owner;
use crate::engine::{Ctx, Pose};
use crate::frame::{FingerKind, Hand, InteractionBox};

/// Two-finger spread/pinch sent as modifier+wheel.
pub struct Zoom;

/// Normalised distance between thumb and index, or the first two extended tips.
fn spread(hand: &Hand, ibox: &InteractionBox) -> Option<f64> {
    let thumb = hand.finger(FingerKind::Thumb);
    let index = hand.index_finger();
    let (a, b) = if thumb.extended && index.extended {
        (thumb.tip, index.tip)
    } else {
        let mut ext = hand.extended();
        (ext.next()?.tip, ext.next()?.tip)
    };
    let a = ibox.normalize_point(a, true);
    let b = ibox.normalize_point(b, true);
    Some((a[0] - b[0]).hypot(a[1] - b[1]))
}

fn reset(ctx: &mut Ctx<'_>) {
    ctx.state.zoom.active = false;
    ctx.state.zoom.last_dist = None;
}

impl Recognizer for Zoom {
    fn name(&self) -> &'static str {
        "zoom"
    }

    fn on_frame(&self, ctx: &mut Ctx<'_>, pose: &Pose<'_>) -> Flow {
        if !ctx.settings.options.zoom_with_modifier_scroll || pose.ext != 2 {
            reset(ctx);
            return Flow::Continue;
        }
        let Some(dist) = spread(pose.hand, &pose.ibox) else {
            reset(ctx);
            return Flow::Continue;
        };

        let settings = ctx.settings;
        let z = &settings.zoom;
        let zs = &mut ctx.state.zoom;
        if !zs.active && pose.pinch >= z.pinch_on && dist >= z.dist_on {
            zs.active = true;
        } else if zs.active && (pose.pinch <= z.pinch_off || dist <= z.dist_off) {
            zs.active = false;
        }
        if !zs.active {
            zs.last_dist = Some(dist);
            return Flow::Continue;
        }
        if !ctx.claim(Owner::Scroll, pose.ext) {
            return Flow::Continue;
        }
        // two-finger scroll restarts from scratch after a zoom
        ctx.state.scroll.last_center = None;

        let Some(prev) = ctx.state.zoom.last_dist else {
            ctx.state.zoom.last_dist = Some(dist);
            return Flow::Consumed;
        };
        let step = ((dist - prev) * z.dist_to_wheel).round() as i32;
        if step == 0 {
            return Flow::Consumed;
        }
        ctx.state.zoom.last_dist = Some(dist);
        trace!("zoom step {step} (dist {dist:.3})");

        let chord = &settings.keys.zoom_modifier;
        let ok = ctx.input("zoom", |s| with_chord(s, chord, |s| s.scroll_vertical(step)));
        if ok {
            ctx.tutor(if step > 0 { "Zoom in" } else { "Zoom out" });
        }
        Flow::Consumed
    }

    fn on_hand_lost(&self, ctx: &mut Ctx<'_>) {
        reset(ctx);
    }
}
