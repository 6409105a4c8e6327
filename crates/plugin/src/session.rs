//! Per-executor engine state
//!
//! Engines never keep cursors or result sets in shared state. An open hook
//! returns a [`Session`] holding whatever the engine needs; the executor
//! owns it and lends it to every `next` call, then hands it to the close
//! hook. Two executors reading the same table therefore never see each
//! other's position.
//!
//! When an engine declares no open hook the executor starts from
//! [`Session::empty`], and the engine's `next` hook creates its state on
//! first use with [`Session::get_or_insert_with`].

use std::any::Any;
use std::fmt;

/// Type-erased state owned by one executor instance
pub struct Session {
    state: Option<Box<dyn Any + Send>>,
}

impl Session {
    /// A session holding no state
    pub fn empty() -> Self {
        Self { state: None }
    }

    /// A session holding `state`
    pub fn new<T: Any + Send>(state: T) -> Self {
        Self {
            state: Some(Box::new(state)),
        }
    }

    /// Check if the session holds no state
    pub fn is_empty(&self) -> bool {
        self.state.is_none()
    }

    /// Borrow the state as `T`
    pub fn get<T: Any>(&self) -> Option<&T> {
        self.state.as_ref().and_then(|s| s.downcast_ref::<T>())
    }

    /// Mutably borrow the state as `T`
    pub fn get_mut<T: Any>(&mut self) -> Option<&mut T> {
        self.state.as_mut().and_then(|s| s.downcast_mut::<T>())
    }

    /// Borrow the state as `T`, replacing an empty or differently typed
    /// session with `init()` first
    pub fn get_or_insert_with<T: Any + Send, F: FnOnce() -> T>(&mut self, init: F) -> &mut T {
        let holds_t = self.state.as_ref().map(|s| s.is::<T>()).unwrap_or(false);
        if !holds_t {
            self.state = Some(Box::new(init()));
        }
        match self.state.as_mut().and_then(|s| s.downcast_mut::<T>()) {
            Some(state) => state,
            None => unreachable!("session state was set to the requested type"),
        }
    }

    /// Take the state out as `T`
    pub fn into_inner<T: Any>(self) -> Option<T> {
        self.state
            .and_then(|s| s.downcast::<T>().ok())
            .map(|b| *b)
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("empty", &self.is_empty())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default, PartialEq)]
    struct Cursor {
        pos: usize,
    }

    #[test]
    fn test_empty_session() {
        let session = Session::empty();
        assert!(session.is_empty());
        assert!(session.get::<Cursor>().is_none());
    }

    #[test]
    fn test_get_and_get_mut() {
        let mut session = Session::new(Cursor { pos: 3 });
        assert_eq!(session.get::<Cursor>().map(|c| c.pos), Some(3));
        session.get_mut::<Cursor>().unwrap().pos = 4;
        assert_eq!(session.get::<Cursor>().map(|c| c.pos), Some(4));
        assert!(session.get::<String>().is_none());
    }

    #[test]
    fn test_get_or_insert_with_initialises_once() {
        let mut session = Session::empty();
        session.get_or_insert_with(Cursor::default).pos += 1;
        session.get_or_insert_with(Cursor::default).pos += 1;
        assert_eq!(session.get::<Cursor>().map(|c| c.pos), Some(2));
    }

    #[test]
    fn test_get_or_insert_with_replaces_other_type() {
        let mut session = Session::new(String::from("stale"));
        let cursor = session.get_or_insert_with(Cursor::default);
        assert_eq!(cursor.pos, 0);
        assert!(session.get::<String>().is_none());
    }

    #[test]
    fn test_into_inner() {
        let session = Session::new(Cursor { pos: 9 });
        assert_eq!(session.into_inner::<Cursor>(), Some(Cursor { pos: 9 }));
        assert_eq!(Session::empty().into_inner::<Cursor>(), None);
    }
}
