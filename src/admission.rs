use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Counting permit pool bounding how many connections are handled at once.
///
/// Acquisition never blocks: when every permit is out the caller is expected
/// to turn the connection away.
#[derive(Clone)]
pub struct Admission {
    inner: Arc<Inner>,
}

struct Inner {
    capacity: usize,
    in_use: AtomicUsize,
    peak: AtomicUsize,
}

impl Admission {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                capacity,
                in_use: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            }),
        }
    }

    /// Takes a permit if one is free.
    pub fn try_acquire(&self) -> Option<Permit> {
        let capacity = self.inner.capacity;
        let previous = self
            .inner
            .in_use
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < capacity).then_some(n + 1)
            })
            .ok()?;
        self.inner.peak.fetch_max(previous + 1, Ordering::AcqRel);
        Some(Permit {
            inner: Arc::clone(&self.inner),
        })
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    /// Permits currently held.
    pub fn in_use(&self) -> usize {
        self.inner.in_use.load(Ordering::Acquire)
    }

    /// Highest number of permits ever held at the same time.
    pub fn peak(&self) -> usize {
        self.inner.peak.load(Ordering::Acquire)
    }
}

/// One admitted connection. The slot is returned when this is dropped,
/// including while a panicking handler unwinds.
pub struct Permit {
    inner: Arc<Inner>,
}

impl Drop for Permit {
    fn drop(&mut self) {
        self.inner.in_use.fetch_sub(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn fails_fast_when_exhausted() {
        let admission = Admission::new(2);
        let a = admission.try_acquire().unwrap();
        let _b = admission.try_acquire().unwrap();
        assert!(admission.try_acquire().is_none());
        assert_eq!(admission.in_use(), 2);

        drop(a);
        assert_eq!(admission.in_use(), 1);
        assert!(admission.try_acquire().is_some());
    }

    #[test]
    fn no_leak_after_many_sequential_permits() {
        let admission = Admission::new(3);
        for _ in 0..1000 {
            let permit = admission.try_acquire();
            assert!(permit.is_some());
        }
        assert_eq!(admission.in_use(), 0);
        assert_eq!(admission.peak(), 1);
    }

    #[test]
    fn panicking_holder_releases_permit() {
        let admission = Admission::new(1);
        let pool = admission.clone();
        let result = thread::spawn(move || {
            let _permit = pool.try_acquire().unwrap();
            panic!("handler blew up");
        })
        .join();
        assert!(result.is_err());
        assert_eq!(admission.in_use(), 0);
        assert!(admission.try_acquire().is_some());
    }

    #[test]
    fn never_exceeds_capacity_under_contention() {
        let admission = Admission::new(4);
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let admission = admission.clone();
                thread::spawn(move || {
                    for _ in 0..500 {
                        if let Some(_permit) = admission.try_acquire() {
                            assert!(admission.in_use() <= admission.capacity());
                            thread::yield_now();
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert!(admission.peak() <= 4);
        assert_eq!(admission.in_use(), 0);
    }
}
