use crate::guard::Guard;

/// A directed transition between two steps, optionally guarded.
#[derive(Debug, Clone)]
pub struct Transition {
    /// Source step name.
    pub from: String,
    /// Destination step name.
    pub to: String,
    /// Guard that must hold for the transition to be taken.
    pub guard: Option<Guard>,
}

impl Transition {
    /// Create an unconditional transition.
    pub fn always(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            guard: None,
        }
    }

    /// Create a guarded transition.
    pub fn guarded(from: impl Into<String>, to: impl Into<String>, guard: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            guard: Some(Guard::new(guard)),
        }
    }

    /// Whether this transition loops back to its source.
    pub fn is_self_loop(&self) -> bool {
        self.from == self.to
    }
}
