use bytemuck::{Pod, Zeroable};

/// A reference to an entity owned by the external entity store.
///
/// The store assigns ids and bumps the version when an id slot is reused, so
/// a stale reference never aliases a newer entity. The core only ever refers
/// to entities; it never owns them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Pod, Zeroable)]
#[repr(C)]
pub struct EntityRef {
    pub id: i32,
    pub version: i32,
}

impl EntityRef {
    /// The reserved "no entity" value.
    pub const NULL: Self = Self {
        id: -1,
        version: 0,
    };

    pub fn new(id: i32, version: i32) -> Self {
        Self { id, version }
    }

    pub fn is_null(&self) -> bool {
        self.id == -1
    }
}

impl Default for EntityRef {
    fn default() -> Self {
        Self::NULL
    }
}

impl std::fmt::Display for EntityRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_null() {
            write!(f, "Entity(null)")
        } else {
            write!(f, "Entity({}v{})", self.id, self.version)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_is_id_minus_one() {
        assert!(EntityRef::NULL.is_null());
        assert!(EntityRef::new(-1, 3).is_null());
        assert!(!EntityRef::new(0, 0).is_null());
    }

    #[test]
    fn ordering_compares_both_fields() {
        let a = EntityRef::new(1, 1);
        let b = EntityRef::new(1, 2);
        let c = EntityRef::new(2, 0);
        assert!(a < b);
        assert!(b < c);
        assert_ne!(a, b);
    }
}
