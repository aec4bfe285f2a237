//! Observer list for "messages updated" style notifications.
//!
//! Listeners are called synchronously, in registration order, on the emitting task.

/// Handle returned by [`Subscribers::subscribe`]; pass it to `unsubscribe` to detach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener<T> = Box<dyn Fn(&T) + Send + 'static>;

/// Registered listeners for payloads of type `T` (may be unsized, e.g. a slice).
pub struct Subscribers<T: ?Sized> {
    next_id: u64,
    listeners: Vec<(SubscriptionId, Listener<T>)>,
}

impl<T: ?Sized> Default for Subscribers<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> Subscribers<T> {
    pub fn new() -> Self {
        Self {
            next_id: 0,
            listeners: Vec::new(),
        }
    }

    pub fn subscribe(&mut self, listener: impl Fn(&T) + Send + 'static) -> SubscriptionId {
        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Detach one listener. Returns false if the id was not registered.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(sid, _)| *sid != id);
        self.listeners.len() != before
    }

    pub fn clear(&mut self) {
        self.listeners.clear();
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Call every listener with `payload`.
    pub fn emit(&self, payload: &T) {
        for (_, listener) in &self.listeners {
            listener(payload);
        }
    }
}

impl<T: ?Sized> std::fmt::Debug for Subscribers<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscribers")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn emit_reaches_every_listener_in_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut subs: Subscribers<[u32]> = Subscribers::new();
        let a = seen.clone();
        subs.subscribe(move |p: &[u32]| a.lock().unwrap().push(("a", p.len())));
        let b = seen.clone();
        subs.subscribe(move |p: &[u32]| b.lock().unwrap().push(("b", p.len())));
        subs.emit(&[1, 2, 3]);
        assert_eq!(*seen.lock().unwrap(), vec![("a", 3), ("b", 3)]);
    }

    #[test]
    fn unsubscribe_detaches_only_that_listener() {
        let count = Arc::new(Mutex::new(0));
        let mut subs: Subscribers<str> = Subscribers::new();
        let c1 = count.clone();
        let first = subs.subscribe(move |_: &str| *c1.lock().unwrap() += 1);
        let c2 = count.clone();
        subs.subscribe(move |_: &str| *c2.lock().unwrap() += 10);
        assert!(subs.unsubscribe(first));
        assert!(!subs.unsubscribe(first));
        subs.emit("hi");
        assert_eq!(*count.lock().unwrap(), 10);
        assert_eq!(subs.len(), 1);
    }

    #[test]
    fn clear_removes_all() {
        let mut subs: Subscribers<str> = Subscribers::default();
        subs.subscribe(|_: &str| {});
        subs.subscribe(|_: &str| {});
        subs.clear();
        assert!(subs.is_empty());
        subs.emit("nobody listening");
    }
}
