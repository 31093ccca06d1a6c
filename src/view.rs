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

//! Single-pool views: raw component views and entity views.
//!
//! Both walk one pool's dense arrays directly. Iteration runs newest to
//! oldest; `data()` and `raw()` expose the underlying arrays in insertion
//! order.

use std::iter::Rev;
use std::slice;

use crate::entity::Entity;
use crate::pool::{Component, Pool};
use crate::sparse::EntityIter;

/// Read-only view over the dense component array of one pool. Empty when
/// the pool does not exist.
pub struct RawView<'a, T: Component> {
    pool: Option<&'a Pool<T>>,
}

impl<'a, T: Component> RawView<'a, T> {
    pub(crate) fn new(pool: Option<&'a Pool<T>>) -> Self {
        Self { pool }
    }

    /// Number of stored components.
    pub fn len(&self) -> usize {
        self.pool.map_or(0, Pool::len)
    }

    /// True when the view has nothing to yield.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Dense entity array, parallel to `raw`.
    pub fn data(&self) -> &'a [Entity] {
        self.pool.map_or(&[], Pool::data)
    }

    /// Dense component array, parallel to `data`.
    pub fn raw(&self) -> &'a [T] {
        self.pool.map_or(&[], Pool::raw)
    }

    /// Component at reverse position `i` (position 0 is the most recently
    /// inserted).
    pub fn at(&self, i: usize) -> Option<&'a T> {
        self.pool.and_then(|pool| pool.at(i))
    }

    /// Iterate component references, newest first.
    pub fn iter(&self) -> Rev<slice::Iter<'a, T>> {
        self.raw().iter().rev()
    }

    /// Invoke `f` with every component.
    pub fn each<F>(&self, mut f: F)
    where
        F: FnMut(&T),
    {
        for component in self.iter() {
            f(component);
        }
    }
}

impl<'a, T: Component> IntoIterator for RawView<'a, T> {
    type Item = &'a T;
    type IntoIter = Rev<slice::Iter<'a, T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Read-write view over the dense component array of one pool. Creates the
/// pool on construction; mutation through the iterator is observable in
/// place.
pub struct RawViewMut<'a, T: Component> {
    pool: &'a mut Pool<T>,
}

impl<'a, T: Component> RawViewMut<'a, T> {
    pub(crate) fn new(pool: &'a mut Pool<T>) -> Self {
        Self { pool }
    }

    /// Number of stored components.
    pub fn len(&self) -> usize {
        self.pool.len()
    }

    /// True when the view has nothing to yield.
    pub fn is_empty(&self) -> bool {
        self.pool.is_empty()
    }

    /// Dense entity array, parallel to `raw`.
    pub fn data(&self) -> &[Entity] {
        self.pool.data()
    }

    /// Dense component array, parallel to `data`.
    pub fn raw(&self) -> &[T] {
        self.pool.raw()
    }

    /// Mutable dense component array.
    pub fn raw_mut(&mut self) -> &mut [T] {
        self.pool.raw_mut()
    }

    /// Component at reverse position `i`.
    pub fn at(&self, i: usize) -> Option<&T> {
        self.pool.at(i)
    }

    /// Iterate component references, newest first.
    pub fn iter(&self) -> Rev<slice::Iter<'_, T>> {
        self.pool.raw().iter().rev()
    }

    /// Iterate mutable component references, newest first.
    pub fn iter_mut(&mut self) -> Rev<slice::IterMut<'_, T>> {
        self.pool.raw_mut().iter_mut().rev()
    }

    /// Invoke `f` with every component.
    pub fn each<F>(&self, mut f: F)
    where
        F: FnMut(&T),
    {
        for component in self.iter() {
            f(component);
        }
    }

    /// Invoke `f` with every component, mutably.
    pub fn each_mut<F>(&mut self, mut f: F)
    where
        F: FnMut(&mut T),
    {
        for component in self.iter_mut() {
            f(component);
        }
    }
}

/// Read-only view over the entities owning one component type. Empty when
/// the pool does not exist.
pub struct View<'a, T: Component> {
    pool: Option<&'a Pool<T>>,
}

impl<'a, T: Component> View<'a, T> {
    pub(crate) fn new(pool: Option<&'a Pool<T>>) -> Self {
        Self { pool }
    }

    /// Number of entities in the view.
    pub fn len(&self) -> usize {
        self.pool.map_or(0, Pool::len)
    }

    /// True when the view has nothing to yield.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True when `entity` owns a `T`.
    pub fn contains(&self, entity: Entity) -> bool {
        self.pool.map_or(false, |pool| pool.contains(entity))
    }

    /// Component of `entity`, or None when absent.
    pub fn get(&self, entity: Entity) -> Option<&'a T> {
        self.pool.and_then(|pool| pool.get(entity))
    }

    /// Dense entity array, parallel to `raw`.
    pub fn data(&self) -> &'a [Entity] {
        self.pool.map_or(&[], Pool::data)
    }

    /// Dense component array, parallel to `data`.
    pub fn raw(&self) -> &'a [T] {
        self.pool.map_or(&[], Pool::raw)
    }

    /// Entity at reverse position `i` (position 0 is the most recently
    /// inserted).
    pub fn at(&self, i: usize) -> Option<Entity> {
        let data = self.data();
        let len = data.len();
        if i < len {
            Some(data[len - 1 - i])
        } else {
            None
        }
    }

    /// Iterate entities, newest first.
    pub fn iter(&self) -> EntityIter<'a> {
        EntityIter {
            dense: self.data(),
            remaining: self.len(),
        }
    }

    /// Iterator positioned at `entity`, sweeping the rest of the iteration
    /// order; exhausted when the entity is not in the view.
    pub fn find(&self, entity: Entity) -> EntityIter<'a> {
        match self.pool {
            Some(pool) => pool_find(pool, entity),
            None => EntityIter::empty(),
        }
    }

    /// Invoke `f` with every entity and its component.
    pub fn each<F>(&self, mut f: F)
    where
        F: FnMut(Entity, &T),
    {
        let (data, raw) = (self.data(), self.raw());
        for slot in (0..data.len()).rev() {
            f(data[slot], &raw[slot]);
        }
    }
}

impl<'a, T: Component> IntoIterator for View<'a, T> {
    type Item = Entity;
    type IntoIter = EntityIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Read-write view over the entities owning one component type. Creates the
/// pool on construction.
pub struct ViewMut<'a, T: Component> {
    pool: &'a mut Pool<T>,
}

impl<'a, T: Component> ViewMut<'a, T> {
    pub(crate) fn new(pool: &'a mut Pool<T>) -> Self {
        Self { pool }
    }

    /// Number of entities in the view.
    pub fn len(&self) -> usize {
        self.pool.len()
    }

    /// True when the view has nothing to yield.
    pub fn is_empty(&self) -> bool {
        self.pool.is_empty()
    }

    /// True when `entity` owns a `T`.
    pub fn contains(&self, entity: Entity) -> bool {
        self.pool.contains(entity)
    }

    /// Component of `entity`, or None when absent.
    pub fn get(&self, entity: Entity) -> Option<&T> {
        self.pool.get(entity)
    }

    /// Mutable component of `entity`, or None when absent.
    pub fn get_mut(&mut self, entity: Entity) -> Option<&mut T> {
        self.pool.get_mut(entity)
    }

    /// Dense entity array, parallel to `raw`.
    pub fn data(&self) -> &[Entity] {
        self.pool.data()
    }

    /// Dense component array, parallel to `data`.
    pub fn raw(&self) -> &[T] {
        self.pool.raw()
    }

    /// Entity at reverse position `i`.
    pub fn at(&self, i: usize) -> Option<Entity> {
        let data = self.pool.data();
        let len = data.len();
        if i < len {
            Some(data[len - 1 - i])
        } else {
            None
        }
    }

    /// Iterate entities, newest first.
    pub fn iter(&self) -> EntityIter<'_> {
        self.pool.entities()
    }

    /// Iterator positioned at `entity`, sweeping the rest of the iteration
    /// order.
    pub fn find(&self, entity: Entity) -> EntityIter<'_> {
        pool_find(self.pool, entity)
    }

    /// Invoke `f` with every entity and its component.
    pub fn each<F>(&self, mut f: F)
    where
        F: FnMut(Entity, &T),
    {
        let (data, raw) = (self.pool.data(), self.pool.raw());
        for slot in (0..data.len()).rev() {
            f(data[slot], &raw[slot]);
        }
    }

    /// Invoke `f` with every entity and its component, mutably.
    pub fn each_mut<F>(&mut self, mut f: F)
    where
        F: FnMut(Entity, &mut T),
    {
        let (data, raw) = self.pool.pairs_mut();
        for slot in (0..data.len()).rev() {
            f(data[slot], &mut raw[slot]);
        }
    }
}

fn pool_find<T: Component>(pool: &Pool<T>, entity: Entity) -> EntityIter<'_> {
    EntityIter {
        dense: pool.data(),
        remaining: pool.index_of(entity).map_or(0, |slot| slot + 1),
    }
}
