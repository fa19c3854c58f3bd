use std::collections::HashMap;
use std::time::{Duration, Instant};

pub type Easing = fn(f32) -> f32;

pub fn ease_out_cubic(t: f32) -> f32 {
    1.0 - (1.0 - t).powi(3)
}

#[derive(Debug, Clone, Copy)]
pub struct ScrollAnimation {
    pub from: f32,
    pub to: f32,
    pub start: Instant,
    pub duration: Duration,
    pub easing: Easing,
}

impl ScrollAnimation {
    pub fn new(from: f32, to: f32, start: Instant, duration: Duration) -> Self {
        Self {
            from,
            to,
            start,
            duration,
            easing: ease_out_cubic,
        }
    }

    /// Linear progress in [0, 1]
    pub fn progress(&self, now: Instant) -> f32 {
        if self.duration.is_zero() {
            return 1.0;
        }
        let elapsed = now.saturating_duration_since(self.start);
        (elapsed.as_secs_f32() / self.duration.as_secs_f32()).clamp(0.0, 1.0)
    }

    pub fn value_at(&self, now: Instant) -> f32 {
        let t = self.progress(now);
        if t >= 1.0 {
            return self.to;
        }
        self.from + (self.to - self.from) * (self.easing)(t)
    }

    pub fn is_finished(&self, now: Instant) -> bool {
        self.progress(now) >= 1.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScrollTarget {
    Vertical,
    Horizontal(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScrollUpdate {
    pub target: ScrollTarget,
    pub value: f32,
}

/// Vertical offset animation plus at most one running horizontal (per category) animation.
pub struct ScrollAnimator {
    vertical: Option<ScrollAnimation>,
    horizontal: HashMap<String, ScrollAnimation>,
    duration: Duration,
}

impl ScrollAnimator {
    pub fn new(duration: Duration) -> Self {
        Self {
            vertical: None,
            horizontal: HashMap::new(),
            duration,
        }
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn animate_vertical(&mut self, from: f32, to: f32, now: Instant) {
        self.vertical = Some(ScrollAnimation::new(from, to, now, self.duration));
    }

    /// Starts a horizontal animation for `category`, stopping any other horizontal one.
    pub fn animate_horizontal(&mut self, category: &str, from: f32, to: f32, now: Instant) {
        if let Some(stopped) = self.horizontal.keys().find(|c| c.as_str() != category) {
            log::debug!("[ScrollAnimator] stopping horizontal animation of '{}'", stopped);
        }
        self.horizontal.clear();
        self.horizontal.insert(category.to_string(), ScrollAnimation::new(from, to, now, self.duration));
    }

    pub fn vertical(&self) -> Option<&ScrollAnimation> {
        self.vertical.as_ref()
    }

    pub fn horizontal(&self, category: &str) -> Option<&ScrollAnimation> {
        self.horizontal.get(category)
    }

    pub fn horizontal_count(&self) -> usize {
        self.horizontal.len()
    }

    pub fn is_animating(&self) -> bool {
        self.vertical.is_some() || !self.horizontal.is_empty()
    }

    /// Current values of every running animation. Finished animations report
    /// their final value once and are dropped.
    pub fn tick(&mut self, now: Instant) -> Vec<ScrollUpdate> {
        let mut updates = Vec::new();
        if let Some(anim) = self.vertical {
            updates.push(ScrollUpdate {
                target: ScrollTarget::Vertical,
                value: anim.value_at(now),
            });
            if anim.is_finished(now) {
                self.vertical = None;
            }
        }
        for (category, anim) in &self.horizontal {
            updates.push(ScrollUpdate {
                target: ScrollTarget::Horizontal(category.clone()),
                value: anim.value_at(now),
            });
        }
        self.horizontal.retain(|_, anim| !anim.is_finished(now));
        updates
    }

    pub fn stop_all(&mut self) {
        self.vertical = None;
        self.horizontal.clear();
    }
}
