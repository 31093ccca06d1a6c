//! Convenience re-exports.

pub use crate::entity::Entity;
pub use crate::error::{EcsError, Result};
pub use crate::multi::{MultiView, MultiViewMut, ViewSet};
pub use crate::persistent::{PersistentView, PersistentViewMut};
pub use crate::pool::Component;
pub use crate::registry::{ComponentId, Registry};
pub use crate::runtime::RuntimeView;
pub use crate::view::{RawView, RawViewMut, View, ViewMut};
