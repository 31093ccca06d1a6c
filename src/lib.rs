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

//! Sparse-set Entity Component System
//!
//! A single-world registry stores one densely packed pool per component
//! type and vends transient views over them: raw component views, entity
//! views, multi-component joins, persistent (indexed) joins and
//! runtime-typed views.

pub mod entity;
pub mod error;
pub mod multi;
pub mod persistent;
pub mod pool;
pub mod prelude;
pub mod registry;
pub mod runtime;
pub mod sparse;
pub mod view;

// Re-exports for convenience
pub use entity::Entity;
pub use error::{EcsError, Result};
pub use multi::{MultiView, MultiViewIter, MultiViewMut, ViewSet, MAX_VIEW_COMPONENTS};
pub use persistent::{PersistentView, PersistentViewMut};
pub use pool::{Component, Pool, PoolStorage};
pub use registry::{ComponentId, Registry};
pub use runtime::{RuntimeView, RuntimeViewIter};
pub use sparse::{EntityIter, SparseSet};
pub use view::{RawView, RawViewMut, View, ViewMut};

#[cfg(test)]
mod tests;
