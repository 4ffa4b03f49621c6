use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, PoisonError};

type Make<T> = Box<dyn Fn() -> T + Send + Sync>;
type Reset<T> = Box<dyn Fn(&mut T) + Send + Sync>;

/// Checkout/return pool of reusable values, scoped to one run.
///
/// Each checked-out value is owned by a single [`Pooled`] guard and goes back
/// to the pool, after `reset`, when the guard drops.
pub struct Pool<T> {
    idle: Mutex<Vec<T>>,
    max_idle: usize,
    make: Make<T>,
    reset: Reset<T>,
}

impl<T: Send> Pool<T> {
    pub fn new(
        max_idle: usize,
        make: impl Fn() -> T + Send + Sync + 'static,
        reset: impl Fn(&mut T) + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            idle: Mutex::new(Vec::new()),
            max_idle,
            make: Box::new(make),
            reset: Box::new(reset),
        })
    }

    pub fn checkout(self: &Arc<Self>) -> Pooled<T> {
        let reused = self.idle.lock().unwrap_or_else(PoisonError::into_inner).pop();
        let item = reused.unwrap_or_else(|| (self.make)());
        Pooled {
            pool: Arc::clone(self),
            item: Some(item),
        }
    }

    /// Values currently waiting for reuse.
    pub fn idle(&self) -> usize {
        self.idle.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn give_back(&self, mut item: T) {
        (self.reset)(&mut item);
        let mut idle = self.idle.lock().unwrap_or_else(PoisonError::into_inner);
        if idle.len() < self.max_idle {
            idle.push(item);
        }
    }
}

pub struct Pooled<T: Send> {
    pool: Arc<Pool<T>>,
    item: Option<T>,
}

impl<T: Send> Deref for Pooled<T> {
    type Target = T;

    fn deref(&self) -> &T {
        // Only `Drop` takes the item out.
        self.item.as_ref().unwrap_or_else(|| unreachable!())
    }
}

impl<T: Send> DerefMut for Pooled<T> {
    fn deref_mut(&mut self) -> &mut T {
        self.item.as_mut().unwrap_or_else(|| unreachable!())
    }
}

impl<T: Send> Drop for Pooled<T> {
    fn drop(&mut self) {
        if let Some(item) = self.item.take() {
            self.pool.give_back(item);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn values_are_reused_after_reset() {
        let made = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&made);
        let pool = Pool::new(
            4,
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
                Vec::<u8>::with_capacity(16)
            },
            Vec::clear,
        );

        {
            let mut buf = pool.checkout();
            buf.extend_from_slice(b"abc");
        }
        assert_eq!(pool.idle(), 1);

        let buf = pool.checkout();
        assert!(buf.is_empty());
        assert!(buf.capacity() >= 16);
        assert_eq!(made.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn concurrent_checkouts_get_distinct_values() {
        let pool = Pool::new(8, Vec::<u8>::new, Vec::clear);
        let mut a = pool.checkout();
        let mut b = pool.checkout();
        a.push(1);
        b.push(2);
        assert_eq!((a[0], b[0]), (1, 2));
    }

    #[test]
    fn idle_values_are_capped() {
        let pool = Pool::new(1, || 0u32, |_| {});
        let a = pool.checkout();
        let b = pool.checkout();
        drop(a);
        drop(b);
        assert_eq!(pool.idle(), 1);
    }
}
