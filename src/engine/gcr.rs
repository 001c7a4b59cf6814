//! Gesture conflict resolver: at most one recognizer owns a hand pose.

/// Recognizers that take exclusive ownership of a pose.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Owner {
    Pinch,
    Drag,
    ThreeDrag,
    /// Two-finger episode; zoom and scroll share it.
    Scroll,
    WindowMove,
    WindowResize,
}

impl Owner {
    pub fn as_str(&self) -> &'static str {
        match self {
            Owner::Pinch => "pinch",
            Owner::Drag => "drag",
            Owner::ThreeDrag => "threeDrag",
            Owner::Scroll => "scroll",
            Owner::WindowMove => "windowMove",
            Owner::WindowResize => "windowResize",
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct Gcr {
    lock: Option<Owner>,
    lock_ts: u64,
    last_ext: usize,
}

impl Gcr {
    pub fn acquire(&mut self, name: Owner, ext: usize, now: u64) -> bool {
        match self.lock {
            None => {
                self.lock = Some(name);
                self.lock_ts = now;
                self.last_ext = ext;
                true
            }
            Some(owner) => owner == name,
        }
    }

    /// A changed finger count always reopens arbitration.
    pub fn can_switch(&mut self, ext: usize) -> bool {
        if self.lock.is_none() {
            return true;
        }
        if self.last_ext != ext {
            self.release();
            return true;
        }
        false
    }

    pub fn release(&mut self) {
        self.lock = None;
        self.lock_ts = 0;
        self.last_ext = 0;
    }

    pub fn current(&self) -> Option<Owner> {
        self.lock
    }

    pub fn held_since(&self) -> Option<u64> {
        self.lock.map(|_| self.lock_ts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exclusive_while_ext_unchanged() {
        let mut g = Gcr::default();
        assert!(g.acquire(Owner::Drag, 1, 10));
        assert!(!g.acquire(Owner::Pinch, 1, 11));
        assert!(!g.acquire(Owner::Scroll, 1, 12));
        assert!(!g.can_switch(1));
        assert_eq!(g.current(), Some(Owner::Drag));
        assert_eq!(g.held_since(), Some(10));
        // re-acquire by the owner is idempotent
        assert!(g.acquire(Owner::Drag, 1, 13));
    }

    #[test]
    fn pose_change_reopens_arbitration() {
        let mut g = Gcr::default();
        g.acquire(Owner::Scroll, 2, 0);
        assert!(g.can_switch(3));
        assert_eq!(g.current(), None);
        assert!(g.acquire(Owner::ThreeDrag, 3, 1));
    }

    #[test]
    fn release_is_unconditional() {
        let mut g = Gcr::default();
        g.acquire(Owner::WindowMove, 4, 0);
        g.release();
        assert_eq!(g.current(), None);
        assert!(g.can_switch(4));
    }
}
