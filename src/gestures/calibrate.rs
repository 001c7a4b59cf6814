use super::{Flow, Recognizer};
use crate::engine::calibration::{CalStep, Capture};
use crate::engine::{CalEvent, CalMode, Ctx, DaemonEvent, Pose};

/// Owns every frame while a calibration session runs.
pub struct Calibration;

impl Recognizer for Calibration {
    fn name(&self) -> &'static str {
        "calibration"
    }

    fn on_frame(&self, ctx: &mut Ctx<'_>, pose: &Pose<'_>) -> Flow {
        if !ctx.state.calibration.is_active() {
            return Flow::Continue;
        }
        let th = &ctx.settings.thresholds;
        match ctx.state.calibration.feed(
            pose.norm,
            pose.pinch,
            th.calibration_pinch,
            th.calibration_min_span,
        ) {
            Capture::Ignored => {}
            Capture::PointA => {
                ctx.events
                    .send(DaemonEvent::Calibration(CalEvent::at(CalMode::Progress, CalStep::B)));
                ctx.tutor("Calibration: pinch top-right");
            }
            Capture::Finished(rect) => ctx.state.calibration.finished = Some(rect),
        }
        Flow::Consumed
    }

    fn on_hand_lost(&self, ctx: &mut Ctx<'_>) {
        ctx.state.calibration.rearm();
    }
}
