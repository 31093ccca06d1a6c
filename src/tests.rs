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

//! End-to-end scenarios across the registry and every view kind.

use crate::prelude::*;

#[test]
fn test_persistent_view_tracks_assign_and_remove() {
    let mut registry = Registry::new();

    let e0 = registry.create();
    registry.assign(e0, 'c').unwrap();

    let e1 = registry.create();
    registry.assign(e1, 1i32).unwrap();
    registry.assign(e1, 'd').unwrap();

    {
        let view = registry.persistent_view::<(i32, char)>();
        assert_eq!(view.len(), 1);
        let members: Vec<_> = view.iter().collect();
        assert_eq!(members, vec![e1]);
    }

    registry.assign(e0, 0i32).unwrap();
    assert_eq!(registry.persistent_view::<(i32, char)>().len(), 2);

    registry.remove::<i32>(e0).unwrap();
    {
        let view = registry.persistent_view::<(i32, char)>();
        assert_eq!(view.len(), 1);
        let members: Vec<_> = view.iter().collect();
        assert_eq!(members, vec![e1]);
    }
}

#[test]
fn test_persistent_view_exclude_maintenance() {
    let mut registry = Registry::new();

    let e0 = registry.create();
    registry.assign(e0, 0i32).unwrap();
    let e1 = registry.create();
    registry.assign(e1, 1i32).unwrap();
    registry.assign(e1, 'x').unwrap();

    // Register the signature before two more entities show up.
    assert_eq!(
        registry.persistent_view_excluding::<(i32,), (char,)>().len(),
        1
    );

    let e2 = registry.create();
    registry.assign(e2, 2i32).unwrap();
    let e3 = registry.create();
    registry.assign(e3, 3i32).unwrap();
    registry.assign(e3, 'x').unwrap();

    {
        let view = registry.persistent_view_excluding::<(i32,), (char,)>();
        let mut members: Vec<_> = view.iter().collect();
        members.sort();
        assert_eq!(members, vec![e0, e2]);
        assert_eq!(view.get::<i32>(e0), Some(&0));
        assert_eq!(view.get::<i32>(e2), Some(&2));
    }

    registry.assign(e0, 'x').unwrap();
    registry.assign(e2, 'x').unwrap();
    assert!(registry
        .persistent_view_excluding::<(i32,), (char,)>()
        .is_empty());

    registry.remove::<char>(e1).unwrap();
    registry.remove::<char>(e3).unwrap();
    {
        let view = registry.persistent_view_excluding::<(i32,), (char,)>();
        let mut members: Vec<_> = view.iter().collect();
        members.sort();
        assert_eq!(members, vec![e1, e3]);
        assert_eq!(view.get::<i32>(e1), Some(&1));
        assert_eq!(view.get::<i32>(e3), Some(&3));
    }
}

#[test]
fn test_multi_view_find_follows_driver_scan_order() {
    let mut registry = Registry::new();
    let entities: Vec<_> = (0..4)
        .map(|i| {
            let e = registry.create();
            registry.assign(e, i as i32).unwrap();
            registry.assign(e, char::from(b'a' + i)).unwrap();
            e
        })
        .collect();
    registry.remove::<i32>(entities[1]).unwrap();

    let view = registry.multi_view::<(i32, char)>();
    assert!(view.contains(entities[0]));
    assert!(!view.contains(entities[1]));

    let swept: Vec<_> = view.find(entities[2]).collect();
    assert_eq!(swept, vec![entities[2], entities[3], entities[0]]);

    let mut tail = view.find(entities[0]);
    assert_eq!(tail.next(), Some(entities[0]));
    assert_eq!(tail.next(), None);
}

#[test]
fn test_sort_propagates_to_persistent_view() {
    let mut registry = Registry::new();
    let entities: Vec<_> = (0..3).map(|_| registry.create()).collect();

    for (value, &e) in entities.iter().enumerate() {
        registry.assign(e, value as u32).unwrap();
    }
    for (value, &e) in entities.iter().enumerate() {
        registry.assign(e, value as i32).unwrap();
    }

    // Reverse insertion order before any sort.
    {
        let view = registry.persistent_view::<(i32, u32)>();
        let values: Vec<_> = view
            .iter()
            .map(|e| *view.get::<u32>(e).unwrap())
            .collect();
        assert_eq!(values, vec![2, 1, 0]);
    }

    registry.sort_by::<u32, _>(|a, b| a.cmp(b)).unwrap();
    let mut view = registry.persistent_view::<(i32, u32)>();
    view.sort::<u32>();

    let unsigned: Vec<_> = view.iter().map(|e| *view.get::<u32>(e).unwrap()).collect();
    let signed: Vec<_> = view.iter().map(|e| *view.get::<i32>(e).unwrap()).collect();
    assert_eq!(unsigned, vec![0, 1, 2]);
    assert_eq!(signed, vec![0, 1, 2]);
}

#[test]
fn test_destroy_reindexes_persistent_view() {
    let mut registry = Registry::new();
    let e0 = registry.create();
    let e1 = registry.create();

    registry.assign(e0, 0u32).unwrap();
    registry.assign(e1, 1u32).unwrap();
    registry.assign(e0, 0i32).unwrap();
    registry.assign(e1, 1i32).unwrap();

    registry.persistent_view::<(i32, u32)>();
    registry.destroy(e0).unwrap();
    let recycled = registry.create();
    registry.assign(recycled, 42i32).unwrap();

    let view = registry.persistent_view::<(i32, u32)>();
    assert_eq!(view.len(), 1);
    assert_eq!(view.at(0), Some(e1));
    assert_eq!(view.get::<i32>(e1), Some(&1));
    assert_eq!(view.get::<u32>(e1), Some(&1));

    view.each(|entity, (signed, unsigned)| {
        assert_eq!(entity, e1);
        assert_eq!(*signed, 1);
        assert_eq!(*unsigned, 1);
    });
}

#[test]
fn test_persistent_index_waits_for_missing_include_type() {
    let mut registry = Registry::new();
    let e = registry.create();
    registry.assign(e, 1i32).unwrap();

    // No entity owns a char yet, so the index starts empty even though the
    // other include type is covered.
    assert!(registry.persistent_view::<(i32, char)>().is_empty());

    registry.assign(e, 'c').unwrap();
    let view = registry.persistent_view::<(i32, char)>();
    assert_eq!(view.len(), 1);
    assert!(view.contains(e));
}

#[test]
fn test_multi_and_persistent_views_agree() {
    let mut registry = Registry::new();
    for i in 0..16u32 {
        let e = registry.create();
        if i % 2 == 0 {
            registry.assign(e, i).unwrap();
        }
        if i % 3 == 0 {
            registry.assign(e, i as u64).unwrap();
        }
    }

    let mut persistent: Vec<_> = registry
        .persistent_view::<(u32, u64)>()
        .iter()
        .collect();
    let mut on_the_fly: Vec<_> = registry.multi_view::<(u32, u64)>().iter().collect();

    persistent.sort();
    on_the_fly.sort();
    assert_eq!(persistent, on_the_fly);
}

#[test]
fn test_views_never_yield_destroyed_entities() {
    let mut registry = Registry::new();
    let keep = registry.create();
    registry.assign(keep, 1i32).unwrap();
    registry.assign(keep, 'k').unwrap();
    let doomed = registry.create();
    registry.assign(doomed, 2i32).unwrap();
    registry.assign(doomed, 'd').unwrap();

    registry.persistent_view::<(i32, char)>();
    registry.destroy(doomed).unwrap();

    assert!(!registry.view::<i32>().contains(doomed));
    assert!(!registry.multi_view::<(i32, char)>().contains(doomed));
    assert!(!registry
        .try_persistent_view::<(i32, char)>()
        .unwrap()
        .contains(doomed));

    let survivors: Vec<_> = registry.view::<i32>().iter().collect();
    assert_eq!(survivors, vec![keep]);
}
