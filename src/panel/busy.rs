/// Single process-wide gate for dispatcher actions. While engaged, every
/// action-triggering key binding is disabled (dimmed and ignored).
#[derive(Debug, Default)]
pub struct BusyLock {
    engaged: bool,
}

impl BusyLock {
    pub fn engage(&mut self) {
        self.engaged = true;
    }

    pub fn release(&mut self) {
        self.engaged = false;
    }

    pub fn is_engaged(&self) -> bool {
        self.engaged
    }

    /// Whether action-triggering controls currently accept input.
    pub fn controls_enabled(&self) -> bool {
        !self.engaged
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engage_disables_controls() {
        let mut lock = BusyLock::default();
        assert!(lock.controls_enabled());
        lock.engage();
        assert!(lock.is_engaged());
        assert!(!lock.controls_enabled());
        lock.release();
        assert!(lock.controls_enabled());
    }
}
