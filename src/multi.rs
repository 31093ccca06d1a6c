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

//! Multi-component views: on-the-fly joins over two or more pools.
//!
//! Iteration is driven by the smallest pool of the set and filtered against
//! the others; no intermediate entity set is materialised.

use std::any::TypeId;
use std::marker::PhantomData;
use std::ptr::NonNull;

use smallvec::{smallvec, SmallVec};

use crate::entity::Entity;
use crate::pool::{Component, Pool};
use crate::registry::{ComponentId, Registry};

/// Maximum number of component types supported per view signature
pub const MAX_VIEW_COMPONENTS: usize = 8;

/// Component-id list of a view signature.
pub type ComponentIdSet = SmallVec<[ComponentId; MAX_VIEW_COMPONENTS]>;

/// A tuple of component types viewed together.
///
/// Implemented for tuples of up to five component types. The associated
/// functions operate on raw pool pointers so the same set works for both
/// the shared and the exclusive view flavours.
///
/// # Safety
/// Implementations must hand out references only into the pools named by
/// `Ptrs`, and `Ptrs` must keep one pointer per tuple element, in tuple
/// order. Callers of the `unsafe` functions must guarantee the pointed-at
/// pools are alive and not mutated for the duration of `'a`.
pub unsafe trait ViewSet<'a>: 'static + Sized {
    /// One pool pointer per component type, in tuple order.
    type Ptrs: Copy;
    /// Tuple of shared component references.
    type Refs;
    /// Tuple of mutable component references.
    type RefsMut;

    /// Number of component types in the set.
    fn arity() -> usize;

    /// Resolve the pool pointers, or None when any pool does not exist.
    fn pools(registry: &Registry) -> Option<Self::Ptrs>;

    /// Resolve the pool pointers, creating missing pools.
    fn assure(registry: &mut Registry) -> Self::Ptrs;

    /// Component ids of the set, assigned on first use.
    fn ids(registry: &mut Registry) -> ComponentIdSet;

    /// Component ids of the set, or None when any type was never used.
    fn registered_ids(registry: &Registry) -> Option<ComponentIdSet>;

    /// Dense length of the pool at tuple position `slot`.
    unsafe fn pool_len(ptrs: Self::Ptrs, slot: usize) -> usize;

    /// Dense entity array of the pool at tuple position `slot`.
    unsafe fn dense(ptrs: Self::Ptrs, slot: usize) -> &'a [Entity];

    /// Dense position of `entity` in the pool at tuple position `slot`.
    unsafe fn index_in(ptrs: Self::Ptrs, slot: usize, entity: Entity) -> Option<usize>;

    /// True when every pool of the set contains `entity`.
    unsafe fn contains_all(ptrs: Self::Ptrs, entity: Entity) -> bool;

    /// Shared references to every component of `entity`, or None when the
    /// entity is missing from any pool.
    unsafe fn refs(ptrs: Self::Ptrs, entity: Entity) -> Option<Self::Refs>;

    /// Mutable references to every component of `entity`, or None when the
    /// entity is missing from any pool.
    unsafe fn refs_mut(ptrs: Self::Ptrs, entity: Entity) -> Option<Self::RefsMut>;

    /// Pointer to the pool storing `U`, when `U` belongs to the set.
    fn pool_ptr<U: Component>(ptrs: Self::Ptrs) -> Option<NonNull<Pool<U>>>;
}

macro_rules! impl_view_set {
    ($($T:ident),+) => {
        unsafe impl<'a, $($T: Component),+> ViewSet<'a> for ($($T,)+) {
            type Ptrs = ($(NonNull<Pool<$T>>,)+);
            type Refs = ($(&'a $T,)+);
            type RefsMut = ($(&'a mut $T,)+);

            fn arity() -> usize {
                let mut count = 0;
                $(
                    let _ = TypeId::of::<$T>();
                    count += 1;
                )+
                count
            }

            fn pools(registry: &Registry) -> Option<Self::Ptrs> {
                Some(($(NonNull::from(registry.pool::<$T>()?),)+))
            }

            #[allow(non_snake_case)]
            fn assure(registry: &mut Registry) -> Self::Ptrs {
                debug_assert!(
                    distinct_types(&[$(TypeId::of::<$T>()),+]),
                    "view signature repeats a component type"
                );
                $(let $T = NonNull::from(registry.assure_pool::<$T>());)+
                ($($T,)+)
            }

            fn ids(registry: &mut Registry) -> ComponentIdSet {
                smallvec![$(registry.component_id::<$T>()),+]
            }

            fn registered_ids(registry: &Registry) -> Option<ComponentIdSet> {
                Some(smallvec![$(registry.registered_component_id::<$T>()?),+])
            }

            #[allow(non_snake_case)]
            unsafe fn pool_len(ptrs: Self::Ptrs, slot: usize) -> usize {
                let ($($T,)+) = ptrs;
                let mut current = 0;
                $(
                    if slot == current {
                        return (*$T.as_ptr()).len();
                    }
                    current += 1;
                )+
                let _ = current;
                0
            }

            #[allow(non_snake_case)]
            unsafe fn dense(ptrs: Self::Ptrs, slot: usize) -> &'a [Entity] {
                let ($($T,)+) = ptrs;
                let mut current = 0;
                $(
                    if slot == current {
                        return (*$T.as_ptr()).data();
                    }
                    current += 1;
                )+
                let _ = current;
                &[]
            }

            #[allow(non_snake_case)]
            unsafe fn index_in(ptrs: Self::Ptrs, slot: usize, entity: Entity) -> Option<usize> {
                let ($($T,)+) = ptrs;
                let mut current = 0;
                $(
                    if slot == current {
                        return (*$T.as_ptr()).index_of(entity);
                    }
                    current += 1;
                )+
                let _ = current;
                None
            }

            #[allow(non_snake_case)]
            unsafe fn contains_all(ptrs: Self::Ptrs, entity: Entity) -> bool {
                let ($($T,)+) = ptrs;
                $((*$T.as_ptr()).contains(entity))&&+
            }

            #[allow(non_snake_case)]
            unsafe fn refs(ptrs: Self::Ptrs, entity: Entity) -> Option<Self::Refs> {
                let ($($T,)+) = ptrs;
                Some(($((*$T.as_ptr()).get(entity)?,)+))
            }

            #[allow(non_snake_case)]
            unsafe fn refs_mut(ptrs: Self::Ptrs, entity: Entity) -> Option<Self::RefsMut> {
                let ($($T,)+) = ptrs;
                Some(($((*$T.as_ptr()).get_mut(entity)?,)+))
            }

            #[allow(non_snake_case)]
            fn pool_ptr<U: Component>(ptrs: Self::Ptrs) -> Option<NonNull<Pool<U>>> {
                let ($($T,)+) = ptrs;
                $(
                    if TypeId::of::<U>() == TypeId::of::<$T>() {
                        return Some($T.cast());
                    }
                )+
                None
            }
        }
    };
}

impl_view_set!(A);
impl_view_set!(A, B);
impl_view_set!(A, B, C);
impl_view_set!(A, B, C, D);
impl_view_set!(A, B, C, D, E);

/// The empty set, used as the default exclude list of persistent views.
unsafe impl<'a> ViewSet<'a> for () {
    type Ptrs = ();
    type Refs = ();
    type RefsMut = ();

    fn arity() -> usize {
        0
    }

    fn pools(_registry: &Registry) -> Option<Self::Ptrs> {
        Some(())
    }

    fn assure(_registry: &mut Registry) -> Self::Ptrs {}

    fn ids(_registry: &mut Registry) -> ComponentIdSet {
        SmallVec::new()
    }

    fn registered_ids(_registry: &Registry) -> Option<ComponentIdSet> {
        Some(SmallVec::new())
    }

    unsafe fn pool_len(_ptrs: Self::Ptrs, _slot: usize) -> usize {
        0
    }

    unsafe fn dense(_ptrs: Self::Ptrs, _slot: usize) -> &'a [Entity] {
        &[]
    }

    unsafe fn index_in(_ptrs: Self::Ptrs, _slot: usize, _entity: Entity) -> Option<usize> {
        None
    }

    unsafe fn contains_all(_ptrs: Self::Ptrs, _entity: Entity) -> bool {
        true
    }

    unsafe fn refs(_ptrs: Self::Ptrs, _entity: Entity) -> Option<Self::Refs> {
        Some(())
    }

    unsafe fn refs_mut(_ptrs: Self::Ptrs, _entity: Entity) -> Option<Self::RefsMut> {
        Some(())
    }

    fn pool_ptr<U: Component>(_ptrs: Self::Ptrs) -> Option<NonNull<Pool<U>>> {
        None
    }
}

fn distinct_types(types: &[TypeId]) -> bool {
    let mut seen: SmallVec<[TypeId; MAX_VIEW_COMPONENTS]> = SmallVec::new();
    for &type_id in types {
        if seen.contains(&type_id) {
            return false;
        }
        seen.push(type_id);
    }
    true
}

/// Tuple position of the smallest pool. Ties go to the leftmost type.
pub(crate) fn driver_slot<'a, S: ViewSet<'a>>(ptrs: S::Ptrs) -> usize {
    let mut driver = 0;
    let mut smallest = usize::MAX;
    for slot in 0..S::arity() {
        // SAFETY: slot is within the set's arity and the pointers are valid
        // for the lifetime of the borrow that produced them.
        let len = unsafe { S::pool_len(ptrs, slot) };
        if len < smallest {
            smallest = len;
            driver = slot;
        }
    }
    driver
}

/// Read-only join view over the pools of `S`.
///
/// A view over a set with a missing pool is empty; it is re-acquired from
/// the registry after mutations rather than kept alive across them.
pub struct MultiView<'a, S: ViewSet<'a>> {
    ptrs: Option<S::Ptrs>,
    driver: usize,
    _registry: PhantomData<&'a Registry>,
}

impl<'a, S: ViewSet<'a>> MultiView<'a, S> {
    pub(crate) fn new(ptrs: Option<S::Ptrs>) -> Self {
        let driver = ptrs.map_or(0, |ptrs| driver_slot::<S>(ptrs));
        Self {
            ptrs,
            driver,
            _registry: PhantomData,
        }
    }

    /// Size of the driving pool: an upper bound on the number of matches.
    pub fn len(&self) -> usize {
        match self.ptrs {
            // SAFETY: pointers live for 'a under a shared registry borrow.
            Some(ptrs) => unsafe { S::pool_len(ptrs, self.driver) },
            None => 0,
        }
    }

    /// True when no entity matches the whole set. Unlike `len`, this is
    /// exact.
    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }

    /// True when every pool of the set contains `entity`.
    pub fn contains(&self, entity: Entity) -> bool {
        match self.ptrs {
            // SAFETY: pointers live for 'a under a shared registry borrow.
            Some(ptrs) => unsafe { S::contains_all(ptrs, entity) },
            None => false,
        }
    }

    /// Component of type `U` for `entity`, or None when absent.
    pub fn get<U: Component>(&self, entity: Entity) -> Option<&'a U> {
        let pool = S::pool_ptr::<U>(self.ptrs?)?;
        // SAFETY: pointers live for 'a under a shared registry borrow.
        unsafe { (*pool.as_ptr()).get(entity) }
    }

    /// Every component of `entity`, or None unless the entity matches the
    /// whole set.
    pub fn get_all(&self, entity: Entity) -> Option<S::Refs> {
        // SAFETY: pointers live for 'a under a shared registry borrow.
        unsafe { S::refs(self.ptrs?, entity) }
    }

    /// Iterate matching entities in the driving pool's order.
    pub fn iter(&self) -> MultiViewIter<'a, S> {
        match self.ptrs {
            Some(ptrs) => {
                // SAFETY: pointers live for 'a under a shared registry borrow.
                let dense = unsafe { S::dense(ptrs, self.driver) };
                MultiViewIter {
                    ptrs: Some(ptrs),
                    dense,
                    remaining: dense.len(),
                }
            }
            None => MultiViewIter::empty(),
        }
    }

    /// Iterator positioned at `entity`, sweeping forward through the
    /// driving pool's remaining scan order; exhausted when the entity does
    /// not match.
    pub fn find(&self, entity: Entity) -> MultiViewIter<'a, S> {
        match self.ptrs {
            // SAFETY: pointers live for 'a under a shared registry borrow.
            Some(ptrs) if unsafe { S::contains_all(ptrs, entity) } => {
                let (dense, slot) = unsafe {
                    (
                        S::dense(ptrs, self.driver),
                        S::index_in(ptrs, self.driver, entity),
                    )
                };
                MultiViewIter {
                    ptrs: Some(ptrs),
                    dense,
                    remaining: slot.map_or(0, |slot| slot + 1),
                }
            }
            _ => MultiViewIter::empty(),
        }
    }

    /// Invoke `f` with every matching entity and its components.
    pub fn each<F>(&self, mut f: F)
    where
        F: FnMut(Entity, S::Refs),
    {
        let Some(ptrs) = self.ptrs else {
            return;
        };
        // SAFETY: pointers live for 'a under a shared registry borrow.
        let dense = unsafe { S::dense(ptrs, self.driver) };
        for slot in (0..dense.len()).rev() {
            let entity = dense[slot];
            // SAFETY: as above; a None result is an entity filtered out by
            // one of the secondary pools.
            if let Some(refs) = unsafe { S::refs(ptrs, entity) } {
                f(entity, refs);
            }
        }
    }
}

/// Read-write join view over the pools of `S`. Creates missing pools on
/// construction and borrows the registry exclusively.
pub struct MultiViewMut<'a, S: ViewSet<'a>> {
    ptrs: S::Ptrs,
    driver: usize,
    _registry: PhantomData<&'a mut Registry>,
}

impl<'a, S: ViewSet<'a>> MultiViewMut<'a, S> {
    pub(crate) fn new(ptrs: S::Ptrs) -> Self {
        Self {
            ptrs,
            driver: driver_slot::<S>(ptrs),
            _registry: PhantomData,
        }
    }

    /// Size of the driving pool: an upper bound on the number of matches.
    pub fn len(&self) -> usize {
        // SAFETY: the registry is exclusively borrowed by this view.
        unsafe { S::pool_len(self.ptrs, self.driver) }
    }

    /// True when no entity matches the whole set.
    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }

    /// True when every pool of the set contains `entity`.
    pub fn contains(&self, entity: Entity) -> bool {
        // SAFETY: the registry is exclusively borrowed by this view.
        unsafe { S::contains_all(self.ptrs, entity) }
    }

    /// Component of type `U` for `entity`, or None when absent.
    pub fn get<U: Component>(&self, entity: Entity) -> Option<&U> {
        let pool = S::pool_ptr::<U>(self.ptrs)?;
        // SAFETY: shared access tied to &self; no mutation can happen while
        // the returned reference lives.
        unsafe { (*pool.as_ptr()).get(entity) }
    }

    /// Mutable component of type `U` for `entity`, or None when absent.
    pub fn get_mut<U: Component>(&mut self, entity: Entity) -> Option<&mut U> {
        let pool = S::pool_ptr::<U>(self.ptrs)?;
        // SAFETY: exclusive access tied to &mut self.
        unsafe { (*pool.as_ptr()).get_mut(entity) }
    }

    /// Every component of `entity`, or None unless the entity matches the
    /// whole set.
    pub fn get_all(&self, entity: Entity) -> Option<S::Refs> {
        // SAFETY: shared access tied to &self.
        unsafe { S::refs(self.ptrs, entity) }
    }

    /// Iterate matching entities in the driving pool's order.
    pub fn iter(&self) -> MultiViewIter<'a, S> {
        // SAFETY: the registry is exclusively borrowed by this view.
        let dense = unsafe { S::dense(self.ptrs, self.driver) };
        MultiViewIter {
            ptrs: Some(self.ptrs),
            dense,
            remaining: dense.len(),
        }
    }

    /// Iterator positioned at `entity`, sweeping forward through the
    /// driving pool's remaining scan order.
    pub fn find(&self, entity: Entity) -> MultiViewIter<'a, S> {
        // SAFETY: the registry is exclusively borrowed by this view.
        unsafe {
            if !S::contains_all(self.ptrs, entity) {
                return MultiViewIter::empty();
            }
            let dense = S::dense(self.ptrs, self.driver);
            let slot = S::index_in(self.ptrs, self.driver, entity);
            MultiViewIter {
                ptrs: Some(self.ptrs),
                dense,
                remaining: slot.map_or(0, |slot| slot + 1),
            }
        }
    }

    /// Invoke `f` with every matching entity and shared component
    /// references.
    pub fn each<F>(&self, mut f: F)
    where
        F: FnMut(Entity, S::Refs),
    {
        // SAFETY: shared access tied to &self.
        let dense = unsafe { S::dense(self.ptrs, self.driver) };
        for slot in (0..dense.len()).rev() {
            let entity = dense[slot];
            // SAFETY: as above.
            if let Some(refs) = unsafe { S::refs(self.ptrs, entity) } {
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
        // SAFETY: the dense entity array and the component arrays are
        // distinct allocations, and each iteration hands out references to
        // a different entity's components.
        let dense = unsafe { S::dense(self.ptrs, self.driver) };
        for slot in (0..dense.len()).rev() {
            let entity = dense[slot];
            // SAFETY: as above; exclusive registry borrow held by the view.
            if let Some(refs) = unsafe { S::refs_mut(self.ptrs, entity) } {
                f(entity, refs);
            }
        }
    }
}

/// Iterator over the driving pool's dense array, newest first, filtered
/// against the other pools of the set.
pub struct MultiViewIter<'a, S: ViewSet<'a>> {
    ptrs: Option<S::Ptrs>,
    dense: &'a [Entity],
    remaining: usize,
}

impl<'a, S: ViewSet<'a>> MultiViewIter<'a, S> {
    fn empty() -> Self {
        Self {
            ptrs: None,
            dense: &[],
            remaining: 0,
        }
    }
}

impl<'a, S: ViewSet<'a>> Iterator for MultiViewIter<'a, S> {
    type Item = Entity;

    fn next(&mut self) -> Option<Entity> {
        let ptrs = self.ptrs?;
        while self.remaining > 0 {
            self.remaining -= 1;
            let entity = self.dense[self.remaining];
            // SAFETY: the pointers were produced under a registry borrow
            // that outlives this iterator.
            if unsafe { S::contains_all(ptrs, entity) } {
                return Some(entity);
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.remaining))
    }
}

#[cfg(test)]
mod tests {
    use crate::registry::Registry;

    #[derive(Debug, PartialEq)]
    struct Position(i32);

    #[derive(Debug, PartialEq)]
    struct Velocity(i32);

    #[test]
    fn test_driver_is_smallest_pool() {
        let mut registry = Registry::new();
        for i in 0..3 {
            let e = registry.create();
            registry.assign(e, Position(i)).unwrap();
            if i == 0 {
                registry.assign(e, Velocity(i)).unwrap();
            }
        }

        let view = registry.multi_view::<(Position, Velocity)>();
        // Velocity has one entry, so it drives and bounds the size.
        assert_eq!(view.len(), 1);
        assert_eq!(view.iter().count(), 1);
    }

    #[test]
    fn test_holes_are_filtered_out() {
        let mut registry = Registry::new();
        let e0 = registry.create();
        let e1 = registry.create();
        let e2 = registry.create();

        registry.assign(e0, Position(0)).unwrap();
        registry.assign(e1, Position(1)).unwrap();
        registry.assign(e0, Velocity(0)).unwrap();
        registry.assign(e2, Velocity(2)).unwrap();

        let view = registry.multi_view::<(Position, Velocity)>();
        let matched: Vec<_> = view.iter().collect();
        assert_eq!(matched, vec![e0]);

        let mut visited = 0;
        view.each(|entity, (position, velocity)| {
            assert_eq!(entity, e0);
            assert_eq!(position, &Position(0));
            assert_eq!(velocity, &Velocity(0));
            visited += 1;
        });
        assert_eq!(visited, 1);
    }

    #[test]
    fn test_find_sweeps_driver_order() {
        let mut registry = Registry::new();
        let entities: Vec<_> = (0..4)
            .map(|i| {
                let e = registry.create();
                registry.assign(e, Position(i)).unwrap();
                registry.assign(e, Velocity(i)).unwrap();
                e
            })
            .collect();
        registry.remove::<Position>(entities[1]).unwrap();

        // Position dense order is now [e0, e3, e2] and drives the view.
        let view = registry.multi_view::<(Position, Velocity)>();
        let from_e2: Vec<_> = view.find(entities[2]).collect();
        assert_eq!(from_e2, vec![entities[2], entities[3], entities[0]]);
        assert_eq!(view.find(entities[1]).next(), None);
    }

    #[test]
    fn test_missing_pool_means_empty_view() {
        let mut registry = Registry::new();
        let e = registry.create();
        registry.assign(e, Position(0)).unwrap();

        let view = registry.multi_view::<(Position, Velocity)>();
        assert!(view.is_empty());
        assert_eq!(view.len(), 0);
        assert!(!view.contains(e));
    }

    #[test]
    fn test_each_mut_writes_through() {
        let mut registry = Registry::new();
        let e = registry.create();
        registry.assign(e, Position(1)).unwrap();
        registry.assign(e, Velocity(2)).unwrap();

        let mut view = registry.multi_view_mut::<(Position, Velocity)>();
        view.each_mut(|_, (position, velocity)| {
            position.0 += velocity.0;
        });
        assert_eq!(view.get::<Position>(e), Some(&Position(3)));

        assert_eq!(registry.get::<Position>(e), Ok(&Position(3)));
    }
}
