use std::time::{Duration, Instant};

use crate::theme::Rgb;

/// Duration of the status bar tint change when a dialog opens or closes
pub const TRANSITION_DURATION: Duration = Duration::from_millis(200);

/// A timed color change of the top status bar
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TintTransition {
    pub from: Rgb,
    pub to: Rgb,
    pub started: Instant,
    pub duration: Duration,
}

impl TintTransition {
    pub fn new(from: Rgb, to: Rgb, started: Instant) -> Self {
        TintTransition {
            from,
            to,
            started,
            duration: TRANSITION_DURATION,
        }
    }

    /// Darken the given tint, as done when a modal dialog opens
    pub fn darken(tint: Rgb, started: Instant) -> Self {
        Self::new(tint, tint.dimmed(), started)
    }

    /// Undo [`TintTransition::darken`]
    pub fn lighten(tint: Rgb, started: Instant) -> Self {
        Self::new(tint.dimmed(), tint, started)
    }

    pub fn color_at(&self, now: Instant) -> Rgb {
        self.from.blend(self.to, self.fraction(now))
    }

    pub fn is_finished(&self, now: Instant) -> bool {
        self.fraction(now) >= 1.0
    }

    fn fraction(&self, now: Instant) -> f32 {
        if self.duration.is_zero() {
            return 1.0;
        }
        let elapsed = now.saturating_duration_since(self.started);
        (elapsed.as_secs_f32() / self.duration.as_secs_f32()).min(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transition_interpolates_over_duration() {
        let start = Instant::now();
        let t = TintTransition::new(Rgb(0, 0, 0), Rgb(200, 100, 0), start);

        assert_eq!(t.color_at(start), Rgb(0, 0, 0));
        assert_eq!(t.color_at(start + Duration::from_millis(100)), Rgb(100, 50, 0));
        assert_eq!(t.color_at(start + Duration::from_millis(200)), Rgb(200, 100, 0));
        assert_eq!(t.color_at(start + Duration::from_secs(5)), Rgb(200, 100, 0));
        assert!(!t.is_finished(start + Duration::from_millis(199)));
        assert!(t.is_finished(start + TRANSITION_DURATION));
    }

    #[test]
    fn lighten_reverses_darken() {
        let start = Instant::now();
        let tint = Rgb(0x80, 0x20, 0x40);
        let end = start + TRANSITION_DURATION;
        assert_eq!(TintTransition::darken(tint, start).color_at(end), tint.dimmed());
        assert_eq!(TintTransition::lighten(tint, start).color_at(end), tint);
    }
}
