//! Test doubles for queues and items

use parking_lot::Mutex;
use scope_link::pipeline::HandoffQueue;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Mutex-guarded `VecDeque` queue, to run stages over a second
/// `HandoffQueue` implementation.
pub struct VecQueue<T> {
    name: &'static str,
    items: Mutex<VecDeque<T>>,
}

impl<T> VecQueue<T> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            items: Mutex::new(VecDeque::new()),
        }
    }
}

impl<T: Send> HandoffQueue<T> for VecQueue<T> {
    fn name(&self) -> &str {
        self.name
    }

    fn push(&self, item: T) {
        self.items.lock().push_back(item);
    }

    fn pop(&self) -> Option<T> {
        self.items.lock().pop_front()
    }

    fn drain_all(&self, f: &mut dyn FnMut(T)) -> usize {
        let drained: Vec<T> = self.items.lock().drain(..).collect();
        let n = drained.len();
        drained.into_iter().for_each(|item| f(item));
        n
    }

    fn len(&self) -> usize {
        self.items.lock().len()
    }
}

/// Item that counts its own drops.
pub struct Tracked {
    pub id: usize,
    drops: Arc<AtomicUsize>,
}

impl Drop for Tracked {
    fn drop(&mut self) {
        self.drops.fetch_add(1, Ordering::SeqCst);
    }
}

/// Factory for [`Tracked`] items sharing one drop counter.
#[derive(Clone, Default)]
pub struct DropCounter {
    drops: Arc<AtomicUsize>,
}

impl DropCounter {
    pub fn item(&self, id: usize) -> Tracked {
        Tracked {
            id,
            drops: Arc::clone(&self.drops),
        }
    }

    pub fn dropped(&self) -> usize {
        self.drops.load(Ordering::SeqCst)
    }
}
