use std::cmp::Ordering;

use crate::models::device_config::Mode;

const MIN_PREFERRED_FPS: f32 = 25.0;
const MAX_PREFERRED_WIDTH: u32 = 1920;
const MAX_PREFERRED_HEIGHT: u32 = 1080;

/// Choose the default capture mode for a newly added device.
///
/// Order of preference: at least 25 fps, the largest frame that fits in
/// 1080p, the highest frame rate, then pixel format rank. Modes above
/// 1080p are only picked when nothing else is offered.
pub fn pick_best_mode(modes: &[Mode]) -> Option<Mode> {
    modes.iter().max_by(|a, b| compare(a, b)).cloned()
}

fn compare(a: &Mode, b: &Mode) -> Ordering {
    let fits = |m: &Mode| m.width <= MAX_PREFERRED_WIDTH && m.height <= MAX_PREFERRED_HEIGHT;
    let smooth = |m: &Mode| m.frame_rate >= MIN_PREFERRED_FPS;

    smooth(a)
        .cmp(&smooth(b))
        .then_with(|| fits(a).cmp(&fits(b)))
        .then_with(|| {
            let (area_a, area_b) = (a.resolution().area(), b.resolution().area());
            if fits(a) {
                area_a.cmp(&area_b)
            } else {
                // Both oversized: the smaller is cheaper to decode.
                area_b.cmp(&area_a)
            }
        })
        .then_with(|| a.frame_rate.total_cmp(&b.frame_rate))
        .then_with(|| a.pixel_format.rank().cmp(&b.pixel_format.rank()))
}
