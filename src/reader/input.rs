//! Keyboard and swipe input, reduced to page turns.

/// Minimum horizontal travel for a swipe, in pixels.
pub const SWIPE_THRESHOLD_PX: f32 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputAction {
    Next,
    Prev,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    ArrowRight,
    ArrowLeft,
    Other,
}

impl Key {
    pub fn action(self) -> Option<InputAction> {
        match self {
            Key::ArrowRight => Some(InputAction::Next),
            Key::ArrowLeft => Some(InputAction::Prev),
            Key::Other => None,
        }
    }
}

/// A touch gesture from its start point to its end point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Swipe {
    pub start: (f32, f32),
    pub end: (f32, f32),
}

impl Swipe {
    pub fn new(start: (f32, f32), end: (f32, f32)) -> Self {
        Self { start, end }
    }

    /// Swipe left turns forward, swipe right turns back. Short or mostly
    /// vertical gestures do nothing.
    pub fn action(&self) -> Option<InputAction> {
        let dx = self.end.0 - self.start.0;
        let dy = self.end.1 - self.start.1;
        if dx.abs() < SWIPE_THRESHOLD_PX || dx.abs() <= dy.abs() {
            return None;
        }
        if dx < 0.0 {
            Some(InputAction::Next)
        } else {
            Some(InputAction::Prev)
        }
    }
}
