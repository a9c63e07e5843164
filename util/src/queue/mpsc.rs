use std::cell::UnsafeCell;
use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};
use std::sync::Arc;

/// Creates an unbounded multi-producer single-consumer queue.
///
/// Intrusive linked list with a stub node (Vyukov). Producers atomically
/// exchange the head pointer, then release-store the `next` link of the
/// previous node. The consumer walks the tail, taking node ownership back and
/// freeing the node it just left. A `pop` between a producer's exchange and
/// its `next` store observes the queue as momentarily empty.
pub fn channel<T>() -> (Sender<T>, Receiver<T>) {
    let stub = Box::into_raw(Box::new(Node::<T> {
        data: None,
        next: AtomicPtr::new(ptr::null_mut()),
    }));

    let inner = Arc::new(Inner {
        head: AtomicPtr::new(stub),
        tail: UnsafeCell::new(stub),
    });

    (
        Sender {
            inner: Arc::clone(&inner),
        },
        Receiver { inner },
    )
}

struct Node<T> {
    data: Option<T>,
    next: AtomicPtr<Node<T>>,
}

struct Inner<T> {
    /// Most recently pushed node; producers contend here.
    head: AtomicPtr<Node<T>>,
    /// Oldest node (consumed stub); consumer-owned.
    tail: UnsafeCell<*mut Node<T>>,
}

unsafe impl<T: Send> Send for Inner<T> {}
unsafe impl<T: Send> Sync for Inner<T> {}

impl<T> Drop for Inner<T> {
    fn drop(&mut self) {
        unsafe {
            let mut node = *self.tail.get();
            while !node.is_null() {
                let next = (*node).next.load(Ordering::Relaxed);
                drop(Box::from_raw(node));
                node = next;
            }
        }
    }
}

pub struct Sender<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for Sender<T> {
    fn clone(&self) -> Self {
        Sender {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Sender<T> {
    pub fn push(&self, item: T) {
        let node = Box::into_raw(Box::new(Node {
            data: Some(item),
            next: AtomicPtr::new(ptr::null_mut()),
        }));

        let prev = self.inner.head.swap(node, Ordering::AcqRel);
        unsafe {
            (*prev).next.store(node, Ordering::Release);
        }
    }
}

pub struct Receiver<T> {
    inner: Arc<Inner<T>>,
}

unsafe impl<T: Send> Send for Receiver<T> {}

impl<T> Receiver<T> {
    pub fn pop(&mut self) -> Option<T> {
        unsafe {
            let tail = *self.inner.tail.get();
            let next = (*tail).next.load(Ordering::Acquire);
            if next.is_null() {
                return None;
            }

            *self.inner.tail.get() = next;
            let item = (*next).data.take();
            drop(Box::from_raw(tail));
            item
        }
    }

    pub fn is_empty(&self) -> bool {
        unsafe {
            let tail = *self.inner.tail.get();
            (*tail).next.load(Ordering::Acquire).is_null()
        }
    }
}
