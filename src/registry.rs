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

//! Registry: central entity allocator, pool owner and view factory.

use std::any::TypeId;
use std::cmp::Ordering;
use std::ptr::NonNull;

use ahash::AHashMap;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

#[cfg(feature = "profiling")]
use tracing::info_span;

use crate::entity::Entity;
use crate::error::{EcsError, Result};
use crate::multi::{ComponentIdSet, MultiView, MultiViewMut, ViewSet};
use crate::persistent::{PersistentView, PersistentViewMut};
use crate::pool::{Component, Pool, PoolStorage};
use crate::runtime::RuntimeView;
use crate::sparse::SparseSet;
use crate::view::{RawView, RawViewMut, View, ViewMut};

/// Stable small-integer identifier assigned to a component type on first
/// use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ComponentId(usize);

impl ComponentId {
    /// Position of the component's pool slot inside the registry.
    pub fn index(self) -> usize {
        self.0
    }
}

/// Signature key for persistent-view indices: sorted include and exclude
/// id lists.
type IndexKey = (ComponentIdSet, ComponentIdSet);

/// A persistent-view index: the dense set of entities matching a fixed
/// (include, exclude) signature, kept coherent with pool mutations.
pub(crate) struct ViewIndex {
    include: ComponentIdSet,
    exclude: ComponentIdSet,
    pub(crate) set: SparseSet,
}

/// Central ECS registry.
///
/// Owns one component pool per registered type and every persistent-view
/// index. All mutations route through the registry, which forwards them to
/// the indices whose signature mentions the affected type; pools hold no
/// back-pointers.
pub struct Registry {
    /// Slot `i` holds the live handle with index `i`, or the bumped handle
    /// that the next recycle of the slot will issue.
    entities: Vec<Entity>,

    /// Recycled entity slots.
    free: Vec<u32>,

    /// Component ids assigned on first use.
    component_ids: FxHashMap<TypeId, ComponentId>,

    /// Pools indexed by component id; a slot stays None until the pool is
    /// forced into existence by assign, reserve or a mutable view.
    pools: Vec<Option<Box<dyn PoolStorage>>>,

    /// Persistent-view indices, in creation order.
    indices: Vec<ViewIndex>,

    /// Signature lookup into `indices`.
    index_lookup: AHashMap<IndexKey, usize>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            entities: Vec::new(),
            free: Vec::new(),
            component_ids: FxHashMap::default(),
            pools: Vec::new(),
            indices: Vec::new(),
            index_lookup: AHashMap::new(),
        }
    }

    /// Create an empty registry with room for `capacity` entities.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entities: Vec::with_capacity(capacity),
            ..Self::new()
        }
    }

    // ---- entity lifecycle ----

    /// Create a new entity, recycling a destroyed slot when one exists.
    pub fn create(&mut self) -> Entity {
        match self.free.pop() {
            // The stored handle already carries the bumped version.
            Some(slot) => self.entities[slot as usize],
            None => {
                let entity = Entity::new(self.entities.len() as u32, 0);
                self.entities.push(entity);
                entity
            }
        }
    }

    /// Destroy `entity`: erase it from every pool and every persistent
    /// index, then bump the slot version so stale handles go dead.
    pub fn destroy(&mut self, entity: Entity) -> Result<()> {
        if !self.alive(entity) {
            return Err(EcsError::EntityNotFound);
        }
        #[cfg(feature = "profiling")]
        let span = info_span!("registry.destroy", pool_count = self.pools.len());
        #[cfg(feature = "profiling")]
        let _span_guard = span.enter();

        for slot in &mut self.pools {
            if let Some(pool) = slot.as_deref_mut() {
                if pool.contains(entity) {
                    pool.erase(entity);
                }
            }
        }
        for index in &mut self.indices {
            if index.set.contains(entity) {
                index.set.erase(entity);
            }
        }

        let slot = entity.index();
        self.entities[slot] = Entity::new(slot as u32, entity.version().wrapping_add(1));
        self.free.push(slot as u32);
        Ok(())
    }

    /// True when `entity` has been created and not destroyed since.
    pub fn alive(&self, entity: Entity) -> bool {
        self.entities
            .get(entity.index())
            .map_or(false, |&stored| stored == entity)
    }

    /// Number of live entities.
    pub fn entity_count(&self) -> usize {
        self.entities.len() - self.free.len()
    }

    /// Destroy every entity and component. Registered component ids and
    /// persistent-view signatures survive; handles issued before the call
    /// must not be reused.
    pub fn clear(&mut self) {
        self.entities.clear();
        self.free.clear();
        for slot in &mut self.pools {
            if let Some(pool) = slot.as_deref_mut() {
                pool.clear();
            }
        }
        for index in &mut self.indices {
            index.set.clear();
        }
    }

    // ---- component types and pools ----

    /// Stable identifier of component type `T`, assigned on first use.
    pub fn component_id<T: Component>(&mut self) -> ComponentId {
        let type_id = TypeId::of::<T>();
        if let Some(&id) = self.component_ids.get(&type_id) {
            return id;
        }
        let id = ComponentId(self.component_ids.len());
        self.component_ids.insert(type_id, id);
        if self.pools.len() <= id.0 {
            self.pools.resize_with(id.0 + 1, || None);
        }
        id
    }

    /// Identifier of `T`, or None when the type was never used.
    pub fn registered_component_id<T: Component>(&self) -> Option<ComponentId> {
        self.component_ids.get(&TypeId::of::<T>()).copied()
    }

    /// Make sure the pool for `T` exists and can hold `additional` more
    /// components.
    pub fn reserve<T: Component>(&mut self, additional: usize) {
        self.assure_pool::<T>().reserve(additional);
    }

    pub(crate) fn pool<T: Component>(&self) -> Option<&Pool<T>> {
        let id = self.registered_component_id::<T>()?;
        self.pools
            .get(id.0)
            .and_then(|slot| slot.as_deref())
            .and_then(|pool| pool.as_any().downcast_ref::<Pool<T>>())
    }

    pub(crate) fn pool_mut<T: Component>(&mut self) -> Option<&mut Pool<T>> {
        let id = self.registered_component_id::<T>()?;
        self.pools
            .get_mut(id.0)
            .and_then(|slot| slot.as_deref_mut())
            .and_then(|pool| pool.as_any_mut().downcast_mut::<Pool<T>>())
    }

    pub(crate) fn assure_pool<T: Component>(&mut self) -> &mut Pool<T> {
        let id = self.component_id::<T>();
        let slot = &mut self.pools[id.0];
        if slot.is_none() {
            *slot = Some(Box::new(Pool::<T>::new()));
        }
        match slot
            .as_deref_mut()
            .and_then(|pool| pool.as_any_mut().downcast_mut::<Pool<T>>())
        {
            Some(pool) => pool,
            None => unreachable!("component id registered with a different pool type"),
        }
    }

    fn pool_len_by_id(&self, id: ComponentId) -> usize {
        self.pools
            .get(id.0)
            .and_then(|slot| slot.as_deref())
            .map_or(0, PoolStorage::len)
    }

    // ---- component access ----

    /// Attach `value` to `entity` and return a reference to it.
    ///
    /// Fails when the entity is dead or already owns a `T`.
    pub fn assign<T: Component>(&mut self, entity: Entity, value: T) -> Result<&mut T> {
        if !self.alive(entity) {
            return Err(EcsError::EntityNotFound);
        }
        #[cfg(feature = "profiling")]
        let span = info_span!("registry.assign", component = std::any::type_name::<T>());
        #[cfg(feature = "profiling")]
        let _span_guard = span.enter();

        let id = self.component_id::<T>();
        let pool = self.assure_pool::<T>();
        if pool.contains(entity) {
            return Err(EcsError::ComponentAlreadyPresent);
        }
        pool.insert(entity, value);
        self.refresh_on_assign(id, entity);
        self.pool_mut::<T>()
            .and_then(|pool| pool.get_mut(entity))
            .ok_or(EcsError::ComponentNotFound)
    }

    /// Detach and return the `T` of `entity`.
    pub fn remove<T: Component>(&mut self, entity: Entity) -> Result<T> {
        if !self.alive(entity) {
            return Err(EcsError::EntityNotFound);
        }
        let id = self
            .registered_component_id::<T>()
            .ok_or(EcsError::ComponentNotFound)?;
        let pool = self.pool_mut::<T>().ok_or(EcsError::ComponentNotFound)?;
        if !pool.contains(entity) {
            return Err(EcsError::ComponentNotFound);
        }
        let value = pool.erase(entity);
        self.refresh_on_remove(id, entity);
        Ok(value)
    }

    /// The `T` of `entity`.
    pub fn get<T: Component>(&self, entity: Entity) -> Result<&T> {
        if !self.alive(entity) {
            return Err(EcsError::EntityNotFound);
        }
        self.pool::<T>()
            .and_then(|pool| pool.get(entity))
            .ok_or(EcsError::ComponentNotFound)
    }

    /// The `T` of `entity`, mutably.
    pub fn get_mut<T: Component>(&mut self, entity: Entity) -> Result<&mut T> {
        if !self.alive(entity) {
            return Err(EcsError::EntityNotFound);
        }
        self.pool_mut::<T>()
            .and_then(|pool| pool.get_mut(entity))
            .ok_or(EcsError::ComponentNotFound)
    }

    /// True when `entity` owns a `T`.
    pub fn has<T: Component>(&self, entity: Entity) -> bool {
        self.pool::<T>().map_or(false, |pool| pool.contains(entity))
    }

    /// True when `entity` owns every component type of the set `S`.
    pub fn has_all<'r, S: ViewSet<'r>>(&'r self, entity: Entity) -> bool {
        // SAFETY: pointers come from a shared borrow of this registry.
        S::pools(self).map_or(false, |ptrs| unsafe { S::contains_all(ptrs, entity) })
    }

    /// Reorder the pool for `T` so that view iteration follows `cmp`
    /// ascending. Invalidates the ordering of persistent views built on
    /// `T`; follow up with their `sort` to realign them.
    pub fn sort_by<T, F>(&mut self, cmp: F) -> Result<()>
    where
        T: Component,
        F: FnMut(&T, &T) -> Ordering,
    {
        let pool = self.pool_mut::<T>().ok_or(EcsError::PoolNotFound)?;
        pool.sort_by(cmp);
        Ok(())
    }

    // ---- views ----

    /// Read-only view over the dense component array of `T`. Empty when the
    /// pool does not exist.
    pub fn raw_view<T: Component>(&self) -> RawView<'_, T> {
        RawView::new(self.pool::<T>())
    }

    /// Read-write view over the dense component array of `T`, creating the
    /// pool when missing.
    pub fn raw_view_mut<T: Component>(&mut self) -> RawViewMut<'_, T> {
        RawViewMut::new(self.assure_pool::<T>())
    }

    /// Read-only view over the entities owning a `T`. Empty when the pool
    /// does not exist.
    pub fn view<T: Component>(&self) -> View<'_, T> {
        View::new(self.pool::<T>())
    }

    /// Read-write view over the entities owning a `T`, creating the pool
    /// when missing.
    pub fn view_mut<T: Component>(&mut self) -> ViewMut<'_, T> {
        ViewMut::new(self.assure_pool::<T>())
    }

    /// Read-only join view over the pools of `S`. Empty when any pool does
    /// not exist.
    pub fn multi_view<'r, S: ViewSet<'r>>(&'r self) -> MultiView<'r, S> {
        MultiView::new(S::pools(self))
    }

    /// Read-write join view over the pools of `S`, creating missing pools.
    pub fn multi_view_mut<'r, S: ViewSet<'r>>(&'r mut self) -> MultiViewMut<'r, S> {
        MultiViewMut::new(S::assure(self))
    }

    /// Persistent view over the entities owning every component of `S`.
    ///
    /// The backing index is created on the first request of the signature
    /// and maintained for the registry's lifetime; later requests return
    /// the same index.
    pub fn persistent_view<'r, S: ViewSet<'r>>(&'r mut self) -> PersistentViewMut<'r, S> {
        self.persistent_view_excluding::<S, ()>()
    }

    /// Persistent view over the entities owning every component of `S` and
    /// none of `E`.
    pub fn persistent_view_excluding<'r, S, E>(&'r mut self) -> PersistentViewMut<'r, S>
    where
        S: ViewSet<'r>,
        E: ViewSet<'r>,
    {
        // Excluded pools take part in index maintenance, so they must exist
        // up front as well.
        let _ = E::assure(self);
        let ptrs = S::assure(self);
        let include = S::ids(self);
        let exclude = E::ids(self);
        let slot = self.index_slot(include, exclude);
        // SAFETY: the index set and the pools are distinct registry fields;
        // the exclusive borrow of self keeps both alive and unaliased for
        // the view's lifetime.
        let set = NonNull::from(&mut self.indices[slot].set);
        PersistentViewMut::new(set, ptrs)
    }

    /// Read-only flavour of [`persistent_view`](Self::persistent_view);
    /// None until the signature's index has been created.
    pub fn try_persistent_view<'r, S: ViewSet<'r>>(&'r self) -> Option<PersistentView<'r, S>> {
        self.try_persistent_view_excluding::<S, ()>()
    }

    /// Read-only flavour of
    /// [`persistent_view_excluding`](Self::persistent_view_excluding).
    pub fn try_persistent_view_excluding<'r, S, E>(&'r self) -> Option<PersistentView<'r, S>>
    where
        S: ViewSet<'r>,
        E: ViewSet<'r>,
    {
        let ptrs = S::pools(self)?;
        let include = S::registered_ids(self)?;
        let exclude = E::registered_ids(self)?;
        let slot = *self.index_lookup.get(&index_key(&include, &exclude))?;
        Some(PersistentView::new(&self.indices[slot].set, ptrs))
    }

    /// Join view over pools named by runtime component ids.
    ///
    /// An empty id list, or any id whose pool does not exist when the view
    /// is built, collapses the view to permanently empty.
    pub fn runtime_view(&self, types: &[ComponentId]) -> RuntimeView<'_> {
        if types.is_empty() {
            return RuntimeView::new(None);
        }
        let mut pools = SmallVec::new();
        for &id in types {
            match self.pools.get(id.0).and_then(|slot| slot.as_deref()) {
                Some(pool) => pools.push(pool),
                None => return RuntimeView::new(None),
            }
        }
        RuntimeView::new(Some(pools))
    }

    // ---- persistent-index maintenance ----

    /// Find or create the index for a signature. A fresh index is populated
    /// by scanning the smallest include pool.
    fn index_slot(&mut self, include: ComponentIdSet, exclude: ComponentIdSet) -> usize {
        let key = index_key(&include, &exclude);
        if let Some(&slot) = self.index_lookup.get(&key) {
            return slot;
        }

        #[cfg(feature = "profiling")]
        let span = info_span!("registry.index_populate", include_count = include.len());
        #[cfg(feature = "profiling")]
        let _span_guard = span.enter();

        let mut set = SparseSet::new();
        let driver = include
            .iter()
            .copied()
            .min_by_key(|&id| self.pool_len_by_id(id));
        if let Some(driver) = driver {
            if let Some(pool) = self.pools.get(driver.0).and_then(|slot| slot.as_deref()) {
                for &entity in pool.data() {
                    if signature_matches(&self.pools, &include, &exclude, entity) {
                        set.insert(entity);
                    }
                }
            }
        }

        self.indices.push(ViewIndex {
            include,
            exclude,
            set,
        });
        let slot = self.indices.len() - 1;
        self.index_lookup.insert(key, slot);
        slot
    }

    fn refresh_on_assign(&mut self, id: ComponentId, entity: Entity) {
        for slot in 0..self.indices.len() {
            if self.indices[slot].include.contains(&id) {
                let matched = signature_matches(
                    &self.pools,
                    &self.indices[slot].include,
                    &self.indices[slot].exclude,
                    entity,
                );
                let set = &mut self.indices[slot].set;
                if matched && !set.contains(entity) {
                    set.insert(entity);
                }
            } else if self.indices[slot].exclude.contains(&id) {
                let set = &mut self.indices[slot].set;
                if set.contains(entity) {
                    set.erase(entity);
                }
            }
        }
    }

    fn refresh_on_remove(&mut self, id: ComponentId, entity: Entity) {
        for slot in 0..self.indices.len() {
            if self.indices[slot].include.contains(&id) {
                let set = &mut self.indices[slot].set;
                if set.contains(entity) {
                    set.erase(entity);
                }
            } else if self.indices[slot].exclude.contains(&id) {
                let matched = signature_matches(
                    &self.pools,
                    &self.indices[slot].include,
                    &self.indices[slot].exclude,
                    entity,
                );
                let set = &mut self.indices[slot].set;
                if matched && !set.contains(entity) {
                    set.insert(entity);
                }
            }
        }
    }
}

/// True when `entity` is in every include pool and in no exclude pool.
fn signature_matches(
    pools: &[Option<Box<dyn PoolStorage>>],
    include: &[ComponentId],
    exclude: &[ComponentId],
    entity: Entity,
) -> bool {
    include.iter().all(|id| {
        pools
            .get(id.0)
            .and_then(|slot| slot.as_deref())
            .map_or(false, |pool| pool.contains(entity))
    }) && exclude.iter().all(|id| {
        pools
            .get(id.0)
            .and_then(|slot| slot.as_deref())
            .map_or(true, |pool| !pool.contains(entity))
    })
}

fn index_key(include: &ComponentIdSet, exclude: &ComponentIdSet) -> IndexKey {
    let mut include = include.clone();
    let mut exclude = exclude.clone();
    include.sort_unstable();
    exclude.sort_unstable();
    (include, exclude)
}
