//! Lock-free cells the audio thread publishes loop state through.

use atomic_float::AtomicF32;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

/// Cache-line aligned atomic f32.
#[derive(Debug)]
#[repr(align(64))]
pub struct AtomicFloat {
    value: AtomicF32,
}

impl AtomicFloat {
    pub fn new(value: f32) -> Self {
        Self {
            value: AtomicF32::new(value),
        }
    }

    #[inline]
    pub fn get(&self) -> f32 {
        self.value.load(Ordering::Acquire)
    }

    #[inline]
    pub fn set(&self, value: f32) {
        self.value.store(value, Ordering::Release);
    }
}

impl Default for AtomicFloat {
    fn default() -> Self {
        Self::new(0.0)
    }
}

/// Cache-line aligned atomic bool.
///
/// Doubles as a sticky flag: the audio thread [`raise`](AtomicFlag::raise)s it and a
/// reader [`take`](AtomicFlag::take)s it. A raise landing between two takes is seen once;
/// a raise racing a take may be seen one poll late.
#[derive(Debug)]
#[repr(align(64))]
pub struct AtomicFlag {
    value: AtomicBool,
}

impl AtomicFlag {
    pub fn new(value: bool) -> Self {
        Self {
            value: AtomicBool::new(value),
        }
    }

    #[inline]
    pub fn get(&self) -> bool {
        self.value.load(Ordering::Acquire)
    }

    #[inline]
    pub fn set(&self, value: bool) {
        self.value.store(value, Ordering::Release);
    }

    /// Sets the flag if `value` is true, never clears it.
    #[inline]
    pub fn raise(&self, value: bool) {
        if value {
            self.value.store(true, Ordering::Release);
        }
    }

    /// Reads and clears.
    #[inline]
    pub fn take(&self) -> bool {
        self.value.swap(false, Ordering::AcqRel)
    }
}

impl Default for AtomicFlag {
    fn default() -> Self {
        Self::new(false)
    }
}

/// Cache-line aligned frame counter.
#[derive(Debug)]
#[repr(align(64))]
pub struct AtomicFrame {
    value: AtomicI64,
}

impl AtomicFrame {
    pub fn new(value: i64) -> Self {
        Self {
            value: AtomicI64::new(value),
        }
    }

    #[inline]
    pub fn get(&self) -> i64 {
        self.value.load(Ordering::Acquire)
    }

    #[inline]
    pub fn set(&self, value: i64) {
        self.value.store(value, Ordering::Release);
    }
}

impl Default for AtomicFrame {
    fn default() -> Self {
        Self::new(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_sticky_flag_is_consumed_once() {
        let flag = AtomicFlag::default();
        flag.raise(false);
        assert!(!flag.get());
        flag.raise(true);
        flag.raise(false);
        assert!(flag.take());
        assert!(!flag.take());
    }

    #[test]
    fn test_cross_thread_publish() {
        let level = Arc::new(AtomicFloat::new(0.0));
        let frame = Arc::new(AtomicFrame::default());
        let (l, f) = (Arc::clone(&level), Arc::clone(&frame));
        std::thread::spawn(move || {
            l.set(0.5);
            f.set(-256);
        })
        .join()
        .unwrap();
        assert_eq!(level.get(), 0.5);
        assert_eq!(frame.get(), -256);
    }

    #[test]
    fn test_alignment() {
        assert_eq!(core::mem::align_of::<AtomicFlag>(), 64);
        assert_eq!(core::mem::align_of::<AtomicFrame>(), 64);
    }
}
