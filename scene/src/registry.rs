use crate::object::ObjectId;

/// Ordered set of the objects currently taking part in ray tracing.
///
/// Holds handles only. The objects themselves are owned elsewhere and a handle may outlive
/// its object, so readers must tolerate lookups that fail.
#[derive(Clone, Debug, Default)]
pub struct ObjectRegistry {
    objects: Vec<ObjectId>,
}

impl ObjectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `id`. Registering the same handle twice keeps both entries.
    pub fn register(&mut self, id: ObjectId) {
        self.objects.push(id);
    }

    /// Removes the first entry matching `id`. Returns whether anything was removed.
    pub fn unregister(&mut self, id: ObjectId) -> bool {
        match self.objects.iter().position(|registered| *registered == id) {
            Some(index) => {
                self.objects.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn enumerate(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.objects.iter().copied()
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.objects.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn clear(&mut self) {
        self.objects.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_keeps_insertion_order() {
        let mut registry = ObjectRegistry::new();
        registry.register(ObjectId(3));
        registry.register(ObjectId(1));
        registry.register(ObjectId(2));
        assert_eq!(registry.enumerate().collect::<Vec<_>>(), vec![ObjectId(3), ObjectId(1), ObjectId(2)]);
    }

    #[test]
    fn test_unregister_removes_entry() {
        let mut registry = ObjectRegistry::new();
        registry.register(ObjectId(1));
        registry.register(ObjectId(2));
        assert!(registry.unregister(ObjectId(1)));
        assert!(!registry.contains(ObjectId(1)));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_unregister_unknown_is_noop() {
        let mut registry = ObjectRegistry::new();
        registry.register(ObjectId(1));
        assert!(!registry.unregister(ObjectId(5)));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_double_registration_is_kept() {
        // re-activating without a matching deactivate leaves two entries
        let mut registry = ObjectRegistry::new();
        registry.register(ObjectId(7));
        registry.register(ObjectId(7));
        assert_eq!(registry.len(), 2);

        assert!(registry.unregister(ObjectId(7)));
        assert_eq!(registry.enumerate().collect::<Vec<_>>(), vec![ObjectId(7)]);

        assert!(registry.unregister(ObjectId(7)));
        assert!(registry.is_empty());
    }
}
