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

//! Runtime views: joins over pools named by runtime component ids.
//!
//! Component access stays with the caller, who can go back to the registry
//! with the ids in hand; the view itself only yields entities.

use smallvec::SmallVec;

use crate::entity::Entity;
use crate::multi::MAX_VIEW_COMPONENTS;
use crate::pool::PoolStorage;

pub(crate) type ErasedPools<'a> = SmallVec<[&'a dyn PoolStorage; MAX_VIEW_COMPONENTS]>;

/// Join view over a runtime-supplied list of component types.
///
/// Pool existence is checked once, at construction: a missing pool or an
/// empty type list collapses the view to permanently empty, even if the
/// pool comes into existence afterwards.
pub struct RuntimeView<'a> {
    pools: Option<ErasedPools<'a>>,
    driver: usize,
}

impl<'a> RuntimeView<'a> {
    pub(crate) fn new(pools: Option<ErasedPools<'a>>) -> Self {
        let driver = pools.as_ref().map_or(0, |pools| {
            let mut driver = 0;
            let mut smallest = usize::MAX;
            for (slot, pool) in pools.iter().enumerate() {
                if pool.len() < smallest {
                    smallest = pool.len();
                    driver = slot;
                }
            }
            driver
        });
        Self { pools, driver }
    }

    /// Size of the driving pool: an upper bound on the number of matches.
    /// Zero for a collapsed view.
    pub fn len(&self) -> usize {
        self.pools
            .as_ref()
            .map_or(0, |pools| pools[self.driver].len())
    }

    /// True when no entity matches every named type.
    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }

    /// True when every named pool contains `entity`.
    pub fn contains(&self, entity: Entity) -> bool {
        self.pools
            .as_ref()
            .map_or(false, |pools| pools.iter().all(|pool| pool.contains(entity)))
    }

    /// Iterate matching entities in the driving pool's order.
    pub fn iter(&self) -> RuntimeViewIter<'a> {
        match &self.pools {
            Some(pools) => RuntimeViewIter {
                pools: pools.clone(),
                dense: pools[self.driver].data(),
                remaining: pools[self.driver].len(),
            },
            None => RuntimeViewIter {
                pools: SmallVec::new(),
                dense: &[],
                remaining: 0,
            },
        }
    }

    /// Invoke `f` with every matching entity.
    pub fn each<F>(&self, mut f: F)
    where
        F: FnMut(Entity),
    {
        for entity in self.iter() {
            f(entity);
        }
    }
}

impl<'a> IntoIterator for RuntimeView<'a> {
    type Item = Entity;
    type IntoIter = RuntimeViewIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over the driving pool's dense array, newest first, filtered
/// against the other named pools.
pub struct RuntimeViewIter<'a> {
    pools: ErasedPools<'a>,
    dense: &'a [Entity],
    remaining: usize,
}

impl<'a> Iterator for RuntimeViewIter<'a> {
    type Item = Entity;

    fn next(&mut self) -> Option<Entity> {
        while self.remaining > 0 {
            self.remaining -= 1;
            let entity = self.dense[self.remaining];
            if self.pools.iter().all(|pool| pool.contains(entity)) {
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

    #[test]
    fn test_joins_named_pools() {
        let mut registry = Registry::new();
        registry.reserve::<i32>(0);
        registry.reserve::<char>(0);

        let e0 = registry.create();
        registry.assign(e0, 'a').unwrap();
        let e1 = registry.create();
        registry.assign(e1, 0i32).unwrap();
        registry.assign(e1, 'b').unwrap();

        let types = [
            registry.component_id::<i32>(),
            registry.component_id::<char>(),
        ];
        let view = registry.runtime_view(&types);

        assert!(!view.is_empty());
        assert_eq!(view.len(), 1);
        let matched: Vec<_> = view.iter().collect();
        assert_eq!(matched, vec![e1]);
        assert!(view.contains(e1));
        assert!(!view.contains(e0));
    }

    #[test]
    fn test_missing_pool_collapses_the_view() {
        let mut registry = Registry::new();
        let e0 = registry.create();
        registry.assign(e0, 1i32).unwrap();

        let types = [
            registry.component_id::<i32>(),
            registry.component_id::<char>(),
        ];
        // char has an id but no pool yet.
        let view = registry.runtime_view(&types);
        assert!(view.is_empty());
        assert_eq!(view.len(), 0);
        assert!(!view.contains(e0));
        view.each(|_| panic!("collapsed view yielded an entity"));
    }

    #[test]
    fn test_empty_type_list_is_empty() {
        let mut registry = Registry::new();
        let e0 = registry.create();
        registry.assign(e0, 1i32).unwrap();

        let view = registry.runtime_view(&[]);
        assert!(view.is_empty());
        assert_eq!(view.len(), 0);
        assert!(!view.contains(e0));
        assert_eq!(view.iter().next(), None);
    }

    #[test]
    fn test_same_ids_same_sequence() {
        let mut registry = Registry::new();
        for i in 0..8 {
            let e = registry.create();
            registry.assign(e, i as u16).unwrap();
            if i % 2 == 0 {
                registry.assign(e, i as u8).unwrap();
            }
        }

        let types = [
            registry.component_id::<u16>(),
            registry.component_id::<u8>(),
        ];
        let first: Vec<_> = registry.runtime_view(&types).iter().collect();
        let second: Vec<_> = registry.runtime_view(&types).iter().collect();
        assert_eq!(first, second);
        assert_eq!(first.len(), 4);
    }
}
