use log::trace;

use super::{Flow, Recognizer};
use crate::config::{Flag, ScrollTuning};
use crate::engine::gcr::Owner;
use crate::engine::{Ctx, Pose};

/// Two-finger scroll. The midpoint of the two extended tips is tracked in
/// screen pixels; displacement and velocity both feed the wheel.
pub struct Scroll;

fn reset(ctx: &mut Ctx<'_>) {
    ctx.state.scroll = Default::default();
}

/// Signed wheel notches for one axis.
fn notches(t: &ScrollTuning, delta: f64, vel: f64, ramp: f64) -> i32 {
    let shape = |v: f64, gain: f64| v.signum() * (v.abs() * gain).powf(t.expo) * ramp;
    let raw = shape(delta, t.flick_gain) + shape(vel, t.flick_gain * t.velocity_gain);
    let n = raw.abs().round() as i32;
    if n == 0 {
        return 0;
    }
    raw.signum() as i32 * n.clamp(t.step_min, t.step_max)
}

impl Recognizer for Scroll {
    fn name(&self) -> &'static str {
        "scroll"
    }

    fn on_frame(&self, ctx: &mut Ctx<'_>, pose: &Pose<'_>) -> Flow {
        if pose.ext != 2 || !ctx.is_on(Flag::Scroll) {
            reset(ctx);
            ctx.release_if(Owner::Scroll);
            return Flow::Continue;
        }
        if !ctx.claim(Owner::Scroll, pose.ext) {
            return Flow::Continue;
        }

        let mut tips = pose.hand.extended().map(|f| pose.ibox.normalize_point(f.tip, true));
        let (Some(a), Some(b)) = (tips.next(), tips.next()) else {
            return Flow::Continue;
        };
        let center = ctx.map((a[0] + b[0]) / 2.0, (a[1] + b[1]) / 2.0);

        let now = ctx.now;
        let track = &mut ctx.state.scroll;
        let (Some(last), Some(last_ts)) = (track.last_center, track.last_ts) else {
            track.last_center = Some(center);
            track.last_ts = Some(now);
            track.ramp = 0;
            return Flow::Continue;
        };
        track.last_center = Some(center);
        track.last_ts = Some(now);

        let t = &ctx.settings.scroll;
        track.ramp = (track.ramp + 1).min(t.ramp_ticks.max(1));
        let ramp = track.ramp as f64 / t.ramp_ticks.max(1) as f64;

        let dx = center.x - last.x;
        // screen Y grows downward, wheel up is positive
        let dy = last.y - center.y;
        let norm = t.frame_ms / now.saturating_sub(last_ts).max(1) as f64;
        let sx = notches(t, dx, dx * norm, ramp);
        let sy = notches(t, dy, dy * norm, ramp);
        if sx == 0 && sy == 0 {
            return Flow::Continue;
        }
        trace!("scroll {sx},{sy} (ramp {ramp:.2})");

        if sy != 0 {
            ctx.input("scroll", |s| s.scroll_vertical(sy));
        }
        if sx != 0 {
            ctx.input("scroll", |s| s.scroll_horizontal(sx));
        }
        let settings = ctx.settings;
        if settings.scroll_inertia.enabled {
            ctx.state.inertia.seed(sx, sy, settings.scroll.inertia_boost);
        }
        Flow::Continue
    }

    fn on_hand_lost(&self, ctx: &mut Ctx<'_>) {
        reset(ctx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Call, HandBuilder, TestEngine, frame, test_engine};

    fn two(e: &mut TestEngine, dy_mm: f64, now: u64) {
        let h = HandBuilder::new().ext(2).offset(0.0, dy_mm).build();
        e.on_frame(&frame(vec![h]), now);
    }

    fn vertical(e: &TestEngine) -> Vec<i32> {
        e.sink()
            .calls
            .iter()
            .filter_map(|c| match c {
                Call::ScrollV(n) => Some(*n),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn notch_quantization() {
        let t = ScrollTuning::default();
        assert_eq!(notches(&t, 0.5, 0.5, 1.0), 0);
        assert_eq!(notches(&t, -400.0, -400.0, 1.0), -t.step_max);
        assert_eq!(notches(&t, 3.0, 0.0, 1.0), 1);
    }

    #[test]
    fn lifting_fingers_scrolls_up_with_ramp() {
        let (mut e, _rx) = test_engine();
        two(&mut e, 0.0, 0);
        assert!(e.sink().calls.is_empty());
        two(&mut e, 10.0, 16);
        two(&mut e, 20.0, 32);
        assert_eq!(vertical(&e), vec![2, 4]);
        assert_eq!(e.sink().count(|c| matches!(c, Call::ScrollH(_))), 0);
        assert!(e.state().inertia.active);
    }

    #[test]
    fn leaving_pose_releases_lock_and_inertia_coasts() {
        let (mut e, _rx) = test_engine();
        two(&mut e, 0.0, 0);
        two(&mut e, 10.0, 16);
        two(&mut e, 20.0, 32);
        assert_eq!(e.state().gcr.current(), Some(Owner::Scroll));

        e.on_frame(&frame(vec![HandBuilder::new().ext(4).build()]), 48);
        assert_eq!(e.state().gcr.current(), None);
        assert!(e.state().scroll.last_center.is_none());

        let before = e.sink().vertical_total();
        for t in 0..30 {
            e.on_tick(50 + t * 8);
        }
        assert!(e.sink().vertical_total() > before);
        assert!(!e.state().inertia.active);
    }

    #[test]
    fn profile_without_inertia_does_not_coast() {
        let (mut e, _rx) = test_engine();
        e.focus("gimp", 0);
        two(&mut e, 0.0, 10);
        two(&mut e, 10.0, 26);
        let before = e.sink().vertical_total();
        assert!(before > 0);
        for t in 0..30 {
            e.on_tick(30 + t * 8);
        }
        assert_eq!(e.sink().vertical_total(), before);
    }

    #[test]
    fn disabled_flag_releases_lock() {
        let (mut e, _rx) = test_engine();
        two(&mut e, 0.0, 0);
        assert_eq!(e.state().gcr.current(), Some(Owner::Scroll));
        e.set_gesture(Flag::Scroll, false);
        two(&mut e, 10.0, 16);
        assert_eq!(e.state().gcr.current(), None);
        assert!(vertical(&e).is_empty());
    }
}
