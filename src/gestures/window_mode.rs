use log::debug;

use super::{Flow, Recognizer};
use crate::config::Flag;
use crate::engine::gcr::Owner;
use crate::engine::state::{Attitude, WindowMode};
use crate::display::Point;
use crate::engine::{Ctx, Pose};

/// none / move / resize. Entry at a firm pinch with 4 (move) or 5 (resize)
/// fingers, exit when the pinch relaxes or the hand closes.
pub struct WindowModes;

fn owner_for(mode: WindowMode) -> Option<Owner> {
    match mode {
        WindowMode::Move => Some(Owner::WindowMove),
        WindowMode::Resize => Some(Owner::WindowResize),
        WindowMode::None => None,
    }
}

fn enter(ctx: &mut Ctx<'_>, pose: &Pose<'_>, mode: WindowMode) {
    let guard = ctx.settings.thresholds.window_enter_guard_ms;
    if let Some(t) = ctx.state.window.last_enter
        && ctx.now.saturating_sub(t) < guard
    {
        return;
    }
    let Some(owner) = owner_for(mode) else {
        return;
    };
    // leaving the other window mode frees its lock first
    let prev = ctx.state.window.mode;
    if let Some(prev_owner) = owner_for(prev) {
        ctx.release_if(prev_owner);
    }
    if !ctx.claim(owner, pose.ext) {
        return;
    }
    let w = &mut ctx.state.window;
    w.mode = mode;
    w.ref_pt = Some(pose.local);
    w.baseline = Attitude {
        roll: pose.hand.roll,
        pitch: pose.hand.pitch,
    };
    w.last_enter = Some(ctx.now);
    ctx.tutor(match mode {
        WindowMode::Move => "Window: Move mode",
        _ => "Window: Resize mode",
    });
}

pub(super) fn exit(ctx: &mut Ctx<'_>) {
    let mode = ctx.state.window.mode;
    if mode == WindowMode::None {
        return;
    }
    if let Some(owner) = owner_for(mode) {
        ctx.release_if(owner);
    }
    let w = &mut ctx.state.window;
    w.mode = WindowMode::None;
    w.ref_pt = None;
    ctx.tutor("Window mode off");
}

fn tick(ctx: &mut Ctx<'_>, pose: &Pose<'_>) {
    let mode = ctx.state.window.mode;
    if mode == WindowMode::None {
        return;
    }
    let th = &ctx.settings.thresholds;
    if let Some(t) = ctx.state.window.last_tick
        && ctx.now.saturating_sub(t) < th.window_tick_ms
    {
        return;
    }
    ctx.state.window.last_tick = Some(ctx.now);

    match mode {
        WindowMode::Move => {
            let Some(r) = ctx.state.window.ref_pt else {
                ctx.state.window.ref_pt = Some(pose.local);
                return;
            };
            let scale = ctx.settings.window.move_scale;
            let dx = (pose.local.x - r.x) * scale;
            let dy = (pose.local.y - r.y) * scale;
            if dx.abs() > th.move_jitter_px || dy.abs() > th.move_jitter_px {
                let (ix, iy) = (dx.round() as i32, dy.round() as i32);
                ctx.window_op("move", |w| w.move_by(ix, iy));
                // only what was emitted; the sub-pixel rest carries over
                ctx.state.window.ref_pt = Some(Point::new(
                    r.x + f64::from(ix) / scale,
                    r.y + f64::from(iy) / scale,
                ));
            }
        }
        WindowMode::Resize => {
            let base = ctx.state.window.baseline;
            let scale = ctx.settings.window.resize_scale;
            let (roll, pitch) = (pose.hand.roll, pose.hand.pitch);
            let dw = (roll - base.roll) * th.resize_roll_gain * scale;
            // pitching down grows height
            let dh = -(pitch - base.pitch) * th.resize_pitch_gain * scale;
            if dw.abs() > th.resize_jitter_px || dh.abs() > th.resize_jitter_px {
                let (iw, ih) = (dw.round() as i32, dh.round() as i32);
                ctx.window_op("resize", |w| w.resize_by(iw, ih));
                ctx.state.window.baseline = Attitude { roll, pitch };
            }
        }
        WindowMode::None => {}
    }
}

impl Recognizer for WindowModes {
    fn name(&self) -> &'static str {
        "window_mode"
    }

    fn on_frame(&self, ctx: &mut Ctx<'_>, pose: &Pose<'_>) -> Flow {
        let th = &ctx.settings.thresholds;
        let (on, off) = (th.window_pinch_on, th.window_pinch_off);
        let mode = ctx.state.window.mode;

        if (mode == WindowMode::Move && !ctx.is_on(Flag::WindowMove))
            || (mode == WindowMode::Resize && !ctx.is_on(Flag::WindowResize))
        {
            debug!("window mode {} disabled", mode.as_str());
            exit(ctx);
        } else if pose.ext == 4 && ctx.is_on(Flag::WindowMove) {
            if pose.pinch >= on && mode != WindowMode::Move {
                enter(ctx, pose, WindowMode::Move);
            } else if pose.pinch <= off && mode == WindowMode::Move {
                exit(ctx);
            }
        } else if pose.ext >= 5 && ctx.is_on(Flag::WindowResize) {
            if pose.pinch >= on && mode != WindowMode::Resize {
                enter(ctx, pose, WindowMode::Resize);
            } else if pose.pinch <= off && mode == WindowMode::Resize {
                exit(ctx);
            }
        } else if pose.ext <= 3 {
            exit(ctx);
        }

        tick(ctx, pose);
        Flow::Continue
    }

    fn on_hand_lost(&self, ctx: &mut Ctx<'_>) {
        exit(ctx);
    }
}

#[cfg(test)]
mod tests {
    use crate::config::Flag;
    use crate::engine::gcr::Owner;
    use crate::engine::state::WindowMode;
    use crate::testing::{HandBuilder, TestEngine, WinCall, frame, test_engine};

    fn four(e: &mut TestEngine, pinch: f64, nx: f64, now: u64) {
        let h = HandBuilder::new().ext(4).pinch(pinch).index_at(nx, 0.5).build();
        e.on_frame(&frame(vec![h]), now);
    }

    #[test]
    fn move_mode_moves_window_and_releases_lock_on_relax() {
        let (mut e, _rx) = test_engine();
        four(&mut e, 0.85, 0.5, 0);
        assert_eq!(e.window_mode(), WindowMode::Move);
        assert_eq!(e.state().gcr.current(), Some(Owner::WindowMove));

        // inside the tick interval nothing is applied
        four(&mut e, 0.85, 0.6, 10);
        assert!(e.window().calls.is_empty());
        four(&mut e, 0.85, 0.6, 30);
        assert_eq!(e.window().calls, vec![WinCall::MoveBy(192, 0)]);

        // between off and on: stays in move mode
        four(&mut e, 0.7, 0.6, 60);
        assert_eq!(e.window_mode(), WindowMode::Move);

        four(&mut e, 0.6, 0.6, 90);
        assert_eq!(e.window_mode(), WindowMode::None);
        assert_eq!(e.state().gcr.current(), None);
    }

    #[test]
    fn sub_jitter_motion_does_not_advance_reference() {
        let (mut e, _rx) = test_engine();
        four(&mut e, 0.85, 0.5, 0);
        // 0.0001 * 1920 = 0.19px per step, below the jitter floor
        four(&mut e, 0.85, 0.5001, 30);
        four(&mut e, 0.85, 0.5002, 60);
        assert!(e.window().calls.is_empty());
        four(&mut e, 0.85, 0.5003, 90);
        // 0.58px accumulated against the untouched reference
        assert_eq!(e.window().calls, vec![WinCall::MoveBy(1, 0)]);
    }

    #[test]
    fn slow_axis_drift_accumulates_during_move() {
        let (mut e, _rx) = test_engine();
        let at = |e: &mut TestEngine, nx: f64, ny: f64, now: u64| {
            let h = HandBuilder::new().ext(4).pinch(0.85).index_at(nx, ny).build();
            e.on_frame(&frame(vec![h]), now);
        };
        at(&mut e, 0.5, 0.5, 0);
        // about 0.32px of vertical drift per tick
        at(&mut e, 0.6, 0.5003, 30);
        at(&mut e, 0.7, 0.5006, 60);
        let dy: i32 = e
            .window()
            .calls
            .iter()
            .map(|c| match c {
                WinCall::MoveBy(_, dy) => *dy,
                _ => 0,
            })
            .sum();
        assert_eq!(e.window().calls.len(), 2);
        assert_eq!(dy.abs(), 1);
    }

    #[test]
    fn closing_hand_exits_mode() {
        let (mut e, _rx) = test_engine();
        four(&mut e, 0.9, 0.5, 0);
        let h = HandBuilder::new().ext(2).pinch(0.9).build();
        e.on_frame(&frame(vec![h]), 20);
        assert_eq!(e.window_mode(), WindowMode::None);
        assert_ne!(e.state().gcr.current(), Some(Owner::WindowMove));
    }

    #[test]
    fn resize_follows_roll_and_pitch() {
        let (mut e, _rx) = test_engine();
        let h = |roll, pitch, pinch| {
            frame(vec![HandBuilder::new().ext(5).pinch(pinch).roll_pitch(roll, pitch).build()])
        };
        e.on_frame(&h(0.0, 0.0, 0.9), 0);
        assert_eq!(e.window_mode(), WindowMode::Resize);
        assert_eq!(e.state().gcr.current(), Some(Owner::WindowResize));
        e.on_frame(&h(0.1, -0.1, 0.9), 30);
        assert_eq!(e.window().calls, vec![WinCall::ResizeBy(80, 60)]);
        // baseline re-anchored: same attitude applies nothing
        e.on_frame(&h(0.1, -0.1, 0.9), 60);
        assert_eq!(e.window().calls.len(), 1);
        e.on_frame(&h(0.1, -0.1, 0.5), 90);
        assert_eq!(e.window_mode(), WindowMode::None);
        assert_eq!(e.state().gcr.current(), None);
    }

    #[test]
    fn entries_are_rate_limited() {
        let (mut e, _rx) = test_engine();
        four(&mut e, 0.9, 0.5, 0);
        four(&mut e, 0.5, 0.5, 20);
        assert_eq!(e.window_mode(), WindowMode::None);
        four(&mut e, 0.9, 0.5, 60);
        assert_eq!(e.window_mode(), WindowMode::None);
        four(&mut e, 0.9, 0.5, 130);
        assert_eq!(e.window_mode(), WindowMode::Move);
    }

    #[test]
    fn disabling_flag_exits_and_releases() {
        let (mut e, _rx) = test_engine();
        four(&mut e, 0.9, 0.5, 0);
        e.set_gesture(Flag::WindowMove, false);
        four(&mut e, 0.9, 0.5, 30);
        assert_eq!(e.window_mode(), WindowMode::None);
        assert_eq!(e.state().gcr.current(), None);
    }
}
