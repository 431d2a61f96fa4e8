use std::collections::HashSet;

/// Identity of an introspected value, used for cycle detection.
///
/// `Address` is derived from where a value lives in memory plus its concrete
/// type, so a struct and its first field never collide. Graphs stored in an
/// arena should hand out `Handle`s instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Identity {
    Address { addr: usize, type_name: &'static str },
    Handle(u64),
}

impl Identity {
    /// Identity of the value behind `value`.
    pub fn of<T: ?Sized>(value: &T) -> Self {
        Identity::Address {
            addr: value as *const T as *const () as usize,
            type_name: std::any::type_name::<T>(),
        }
    }

    pub fn handle(id: u64) -> Self {
        Identity::Handle(id)
    }
}

/// The identities currently on the active recursion path.
///
/// Holds ancestors only: an identity is pushed before its members are walked
/// and popped right after, so a value reachable through two sibling branches
/// is not mistaken for a cycle.
#[derive(Debug, Default)]
pub struct Ancestry {
    path: HashSet<Identity>,
}

impl Ancestry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, identity: &Identity) -> bool {
        self.path.contains(identity)
    }

    pub fn len(&self) -> usize {
        self.path.len()
    }

    pub fn is_empty(&self) -> bool {
        self.path.is_empty()
    }

    /// Runs `f` with `identity` pushed onto the path, popping it afterwards
    /// whether or not `f` succeeded.
    pub fn scoped<R>(&mut self, identity: Identity, f: impl FnOnce(&mut Self) -> R) -> R {
        let inserted = self.path.insert(identity);
        let result = f(self);
        if inserted {
            self.path.remove(&identity);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Outer {
        inner: Inner,
    }

    struct Inner {
        _value: u32,
    }

    #[test]
    fn struct_and_first_field_differ() {
        let outer = Outer {
            inner: Inner { _value: 1 },
        };
        assert_ne!(Identity::of(&outer), Identity::of(&outer.inner));
        assert_eq!(Identity::of(&outer), Identity::of(&outer));
    }

    #[test]
    fn scoped_pops_after_return() {
        let mut ancestry = Ancestry::new();
        let id = Identity::handle(7);
        let seen = ancestry.scoped(id, |a| a.contains(&id));
        assert!(seen);
        assert!(ancestry.is_empty());
    }

    #[test]
    fn scoped_pops_after_failure() {
        let mut ancestry = Ancestry::new();
        let result: Result<(), &str> = ancestry.scoped(Identity::handle(1), |_| Err("failed"));
        assert!(result.is_err());
        assert!(ancestry.is_empty());
    }

    #[test]
    fn nested_scopes_track_path() {
        let mut ancestry = Ancestry::new();
        ancestry.scoped(Identity::handle(1), |a| {
            a.scoped(Identity::handle(2), |a| assert_eq!(a.len(), 2));
            assert_eq!(a.len(), 1);
            assert!(!a.contains(&Identity::handle(2)));
        });
    }
}
