// Copyright 2024 Saptak Santra
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Persistent views: joins backed by an incrementally maintained index.
//!
//! The registry keeps one dense entity set per (include, exclude)
//! signature and updates it on every relevant assign, remove and destroy.
//! Iteration walks that set directly, with no per-element filtering.

use std::marker::PhantomData;
use std::ptr::NonNull;

use crate::entity::Entity;
use crate::multi::ViewSet;
use crate::pool::Component;
use crate::registry::Registry;
use crate::sparse::{EntityIter, SparseSet};

/// Read-only persistent view. Obtained once the backing index exists; see
/// [`Registry::try_persistent_view`].
pub struct PersistentView<'a, S: ViewSet<'a>> {
    set: &'a SparseSet,
    pools: S::Ptrs,
}

impl<'a, S: ViewSet<'a>> PersistentView<'a, S> {
    pub(crate) fn new(set: &'a SparseSet, pools: S::Ptrs) -> Self {
        Self { set, pools }
    }

    /// Exact number of matching entities.
    pub fn len(&self) -> usize {
        self.set.len()
    }

    /// True when no entity matches the signature.
    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }

    /// True when `entity` matches the signature.
    pub fn contains(&self, entity: Entity) -> bool {
        self.set.contains(entity)
    }

    /// Component of type `U` for `entity`, or None when absent.
    pub fn get<U: Component>(&self, entity: Entity) -> Option<&'a U> {
        let pool = S::pool_ptr::<U>(self.pools)?;
        // SAFETY: the pools are shared-borrowed for 'a through the registry.
        unsafe { (*pool.as_ptr()).get(entity) }
    }

    /// Every component of `entity`, or None unless the entity owns them
    /// all.
    pub fn get_all(&self, entity: Entity) -> Option<S::Refs> {
        // SAFETY: as in `get`.
        unsafe { S::refs(self.pools, entity) }
    }

    /// Dense entity array of the index, insertion order at the front.
    pub fn data(&self) -> &'a [Entity] {
        self.set.data()
    }

    /// Entity at reverse position `i`.
    pub fn at(&self, i: usize) -> Option<Entity> {
        self.set.at(i)
    }

    /// Iterate matching entities, newest index member first.
    pub fn iter(&self) -> EntityIter<'a> {
        EntityIter {
            dense: self.set.data(),
            remaining: self.set.len(),
        }
    }

    /// Iterator positioned at `entity`, sweeping the rest of the index
    /// order; exhausted when the entity does not match.
    pub fn find(&self, entity: Entity) -> EntityIter<'a> {
        EntityIter {
            dense: self.set.data(),
            remaining: self.set.index_of(entity).map_or(0, |slot| slot + 1),
        }
    }

    /// Invoke `f` with every matching entity and its components, exactly
    /// once each, in index order.
    pub fn each<F>(&self, mut f: F)
    where
        F: FnMut(Entity, S::Refs),
    {
        for entity in self.iter() {
            // SAFETY: index members own every include component.
            if let Some(refs) = unsafe { S::refs(self.pools, entity) } {
                f(entity, refs);
            }
        }
    }
}

impl<'a, S: ViewSet<'a>> IntoIterator for PersistentView<'a, S> {
    type Item = Entity;
    type IntoIter = EntityIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Read-write persistent view. Creation registers the signature and
/// populates the index; the registry stays exclusively borrowed while the
/// view lives.
pub struct PersistentViewMut<'a, S: ViewSet<'a>> {
    set: NonNull<SparseSet>,
    pools: S::Ptrs,
    _registry: PhantomData<&'a mut Registry>,
}

impl<'a, S: ViewSet<'a>> PersistentViewMut<'a, S> {
    pub(crate) fn new(set: NonNull<SparseSet>, pools: S::Ptrs) -> Self {
        Self {
            set,
            pools,
            _registry: PhantomData,
        }
    }

    fn set_ref(&self) -> &SparseSet {
        // SAFETY: the index lives inside the exclusively borrowed registry
        // and nothing else can touch it while the view exists.
        unsafe { self.set.as_ref() }
    }

    /// Exact number of matching entities.
    pub fn len(&self) -> usize {
        self.set_ref().len()
    }

    /// True when no entity matches the signature.
    pub fn is_empty(&self) -> bool {
        self.set_ref().is_empty()
    }

    /// True when `entity` matches the signature.
    pub fn contains(&self, entity: Entity) -> bool {
        self.set_ref().contains(entity)
    }

    /// Component of type `U` for `entity`, or None when absent.
    pub fn get<U: Component>(&self, entity: Entity) -> Option<&U> {
        let pool = S::pool_ptr::<U>(self.pools)?;
        // SAFETY: shared access tied to &self.
        unsafe { (*pool.as_ptr()).get(entity) }
    }

    /// Mutable component of type `U` for `entity`, or None when absent.
    pub fn get_mut<U: Component>(&mut self, entity: Entity) -> Option<&mut U> {
        let pool = S::pool_ptr::<U>(self.pools)?;
        // SAFETY: exclusive access tied to &mut self.
        unsafe { (*pool.as_ptr()).get_mut(entity) }
    }

    /// Every component of `entity`, or None unless the entity owns them
    /// all.
    pub fn get_all(&self, entity: Entity) -> Option<S::Refs> {
        // SAFETY: shared access tied to &self.
        unsafe { S::refs(self.pools, entity) }
    }

    /// Dense entity array of the index.
    pub fn data(&self) -> &[Entity] {
        self.set_ref().data()
    }

    /// Entity at reverse position `i`.
    pub fn at(&self, i: usize) -> Option<Entity> {
        self.set_ref().at(i)
    }

    /// Iterate matching entities, newest index member first.
    pub fn iter(&self) -> EntityIter<'_> {
        self.set_ref().iter()
    }

    /// Iterator positioned at `entity`, sweeping the rest of the index
    /// order.
    pub fn find(&self, entity: Entity) -> EntityIter<'_> {
        self.set_ref().find(entity)
    }

    /// Invoke `f` with every matching entity and shared component
    /// references.
    pub fn each<F>(&self, mut f: F)
    where
        F: FnMut(Entity, S::Refs),
    {
        for entity in self.set_ref().iter() {
            // SAFETY: index members own every include component.
            if let Some(refs) = unsafe { S::refs(self.pools, entity) } {
                f(entity, refs);
            }
        }
    }

    /// Invoke `f` with every matching entity and mutable component
    /// references.
    pub fn each_mut<F>(&mut self, mut f: F)
    where
        F: FnMut(Entity, S::RefsMut),
    {
        let set = self.set;
        // SAFETY: the index's dense array and the component arrays are
        // distinct allocations; each iteration hands out references to a
        // different entity's components.
        let dense = unsafe { set.as_ref() }.data();
        for slot in (0..dense.len()).rev() {
            let entity = dense[slot];
            // SAFETY: exclusive registry borrow held by the view.
            if let Some(refs) = unsafe { S::refs_mut(self.pools, entity) } {
                f(entity, refs);
            }
        }
    }

    /// Reorder the index to follow the dense order of the pool for `U`, so
    /// that iterating the view afterwards matches iterating that pool.
    ///
    /// `U` must belong to the include list; the call is a no-op otherwise.
    pub fn sort<U: Component>(&mut self) {
        if let Some(pool) = S::pool_ptr::<U>(self.pools) {
            // SAFETY: the pool's dense array and the index are distinct
            // structures; exclusive registry borrow held by the view.
            let order = unsafe { (*pool.as_ptr()).data() };
            unsafe { self.set.as_mut() }.respect(order);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::registry::Registry;

    #[derive(Debug, PartialEq)]
    struct Health(u32);

    #[derive(Debug, PartialEq)]
    struct Armor(u32);

    #[test]
    fn test_index_survives_view_reacquisition() {
        let mut registry = Registry::new();
        let e = registry.create();
        registry.assign(e, Health(1)).unwrap();
        registry.assign(e, Armor(2)).unwrap();

        assert_eq!(registry.persistent_view::<(Health, Armor)>().len(), 1);

        // The shared flavour sees the same index without recomputation.
        let view = registry.try_persistent_view::<(Health, Armor)>().unwrap();
        assert!(view.contains(e));
        assert_eq!(view.get::<Armor>(e), Some(&Armor(2)));
    }

    #[test]
    fn test_index_populated_from_existing_entities() {
        let mut registry = Registry::new();
        let matching = registry.create();
        registry.assign(matching, Health(10)).unwrap();
        registry.assign(matching, Armor(0)).unwrap();
        let health_only = registry.create();
        registry.assign(health_only, Health(20)).unwrap();

        let view = registry.persistent_view::<(Health, Armor)>();
        assert_eq!(view.len(), 1);
        assert!(view.contains(matching));
        assert!(!view.contains(health_only));
    }

    #[test]
    fn test_each_visits_every_member_once() {
        let mut registry = Registry::new();
        for i in 0..3 {
            let e = registry.create();
            registry.assign(e, Health(i)).unwrap();
            registry.assign(e, Armor(i)).unwrap();
        }

        let mut view = registry.persistent_view::<(Health, Armor)>();
        let mut visited = 0;
        view.each(|_, (health, armor)| {
            assert_eq!(health.0, armor.0);
            visited += 1;
        });
        assert_eq!(visited, 3);

        view.each_mut(|_, (health, _)| {
            health.0 += 100;
        });
        let total: u32 = (0..3)
            .map(|i| view.at(i).map(|e| view.get::<Health>(e).unwrap().0).unwrap())
            .sum();
        assert_eq!(total, 303);
    }
}
