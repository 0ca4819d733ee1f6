use std::collections::VecDeque;
use std::sync::Mutex;

pub const DEFAULT_CAPACITY: usize = 100_000;

/// FIFO shared between the serial reader (only producer) and the interpreter
/// (only consumer).
///
/// The capacity is soft: when a push takes the length past it, the oldest
/// third of the contents is dropped in the same critical section. Pushing
/// never blocks on the consumer and never fails.
pub struct ByteQueue<T = u8> {
    capacity: usize,
    items: Mutex<VecDeque<T>>,
}

impl<T> Default for ByteQueue<T> {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl<T> ByteQueue<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            items: Mutex::new(VecDeque::new()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn push(&self, item: T) {
        let mut items = self.lock();
        items.push_back(item);
        Self::trim(&mut items, self.capacity);
    }

    /// Pushes a whole read chunk under one lock, trimming after every item so
    /// the result is the same as pushing them one by one.
    pub fn push_all(&self, chunk: &[T])
    where
        T: Clone,
    {
        let mut items = self.lock();
        for item in chunk {
            items.push_back(item.clone());
            Self::trim(&mut items, self.capacity);
        }
    }

    pub fn pop(&self) -> Option<T> {
        self.lock().pop_front()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn trim(items: &mut VecDeque<T>, capacity: usize) {
        let len = items.len();
        if len > capacity {
            // keep index len/3 onward
            items.drain(..len / 3);
        }
    }

    // a panic while holding the lock cannot leave the deque half-updated,
    // so a poisoned lock is still safe to use
    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<T>> {
        self.items.lock().unwrap_or_else(|e| e.into_inner())
    }
}
