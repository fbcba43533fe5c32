// ember-core-client/ember-client
//
// Copyright: 2023, Marc Bauer <mb@nesium.com>
// License: Mozilla Public License v2.0 (MPL v2.0)

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DelegateHandle(u64);

type Handler<E> = Box<dyn FnMut(&E) + Send>;

/// A list of callbacks that are all invoked, in registration order, on `broadcast`.
pub struct MulticastDelegate<E> {
    next_handle: u64,
    handlers: Vec<(DelegateHandle, Handler<E>)>,
}

impl<E> MulticastDelegate<E> {
    pub fn new() -> Self {
        MulticastDelegate {
            next_handle: 0,
            handlers: vec![],
        }
    }

    pub fn add<F>(&mut self, handler: F) -> DelegateHandle
    where
        F: FnMut(&E) + Send + 'static,
    {
        self.next_handle += 1;
        let handle = DelegateHandle(self.next_handle);
        self.handlers.push((handle, Box::new(handler)));
        handle
    }

    pub fn remove(&mut self, handle: DelegateHandle) -> bool {
        let count = self.handlers.len();
        self.handlers.retain(|(h, _)| *h != handle);
        self.handlers.len() != count
    }

    pub fn clear(&mut self) {
        self.handlers.clear()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn broadcast(&mut self, event: &E) {
        for (_, handler) in self.handlers.iter_mut() {
            (handler)(event)
        }
    }
}

impl<E> Default for MulticastDelegate<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for MulticastDelegate<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MulticastDelegate")
            .field("handlers", &self.handlers.len())
            .finish()
    }
}
