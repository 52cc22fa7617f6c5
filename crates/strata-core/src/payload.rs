//! Opaque, clonable payloads carried by states, perceived data and
//! regular influences.
//!
//! Models know the concrete type they put in a [`Payload`] and get it back
//! with [`Payload::downcast_ref`]. Any `Clone + Debug + Send + Sync` type
//! qualifies through the blanket [`Datum`] impl.

use std::any::Any;
use std::fmt;

/// Object-safe view of a payload value.
///
/// Implemented for every `T: Any + Clone + Debug + Send + Sync`; there is
/// no need to implement it by hand.
pub trait Datum: Any + Send + Sync + fmt::Debug {
    /// Clone into a fresh box.
    fn clone_datum(&self) -> Box<dyn Datum>;
    /// Upcast for downcasting.
    fn as_any(&self) -> &dyn Any;
    /// Mutable upcast for downcasting.
    fn as_any_mut(&mut self) -> &mut dyn Any;
    /// `std::any::type_name` of the concrete type.
    fn type_name(&self) -> &'static str;
}

impl<T> Datum for T
where
    T: Any + Clone + fmt::Debug + Send + Sync,
{
    fn clone_datum(&self) -> Box<dyn Datum> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }
}

/// A type-erased value with deep-copy semantics.
pub struct Payload(Box<dyn Datum>);

impl Payload {
    /// Wrap a value.
    pub fn new<T>(value: T) -> Self
    where
        T: Any + Clone + fmt::Debug + Send + Sync,
    {
        Self(Box::new(value))
    }

    /// The empty payload (`()`).
    pub fn empty() -> Self {
        Self::new(())
    }

    /// Whether this is the empty payload.
    pub fn is_empty(&self) -> bool {
        self.is::<()>()
    }

    /// Whether the payload holds a `T`.
    pub fn is<T: Any>(&self) -> bool {
        self.0.as_any().is::<T>()
    }

    /// Borrow the payload as a `T`, if it is one.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.as_any().downcast_ref::<T>()
    }

    /// Mutably borrow the payload as a `T`, if it is one.
    pub fn downcast_mut<T: Any>(&mut self) -> Option<&mut T> {
        self.0.as_any_mut().downcast_mut::<T>()
    }

    /// Name of the concrete type held.
    pub fn type_name(&self) -> &'static str {
        self.0.type_name()
    }
}

impl Clone for Payload {
    fn clone(&self) -> Self {
        Self(self.0.clone_datum())
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

impl Default for Payload {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug, PartialEq)]
    struct Energy(f64);

    #[test]
    fn downcast_round_trip() {
        let mut p = Payload::new(Energy(2.5));
        assert!(p.is::<Energy>());
        assert!(!p.is_empty());
        assert_eq!(p.downcast_ref::<Energy>(), Some(&Energy(2.5)));
        p.downcast_mut::<Energy>().unwrap().0 = 3.0;
        assert_eq!(p.downcast_ref::<Energy>(), Some(&Energy(3.0)));
        assert!(p.downcast_ref::<u32>().is_none());
    }

    #[test]
    fn clone_is_deep() {
        let original = Payload::new(vec![1, 2, 3]);
        let mut copy = original.clone();
        copy.downcast_mut::<Vec<i32>>().unwrap().push(4);
        assert_eq!(original.downcast_ref::<Vec<i32>>().unwrap().len(), 3);
        assert_eq!(copy.downcast_ref::<Vec<i32>>().unwrap().len(), 4);
    }

    #[test]
    fn debug_delegates_to_value() {
        assert_eq!(format!("{:?}", Payload::new(Energy(1.0))), "Energy(1.0)");
        assert_eq!(format!("{:?}", Payload::empty()), "()");
    }
}
