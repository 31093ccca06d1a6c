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

//! Entity identifiers.

/// Opaque entity handle: a dense index plus a version tag bumped on every
/// recycle, so stale handles never match live storage entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Entity {
    index: u32,
    version: u32,
}

impl Entity {
    pub(crate) fn new(index: u32, version: u32) -> Self {
        Self { index, version }
    }

    /// Index portion of the handle, the key into sparse arrays.
    pub fn index(self) -> usize {
        self.index as usize
    }

    /// Recycling tag. Two handles with equal indices but different versions
    /// refer to different generations of the same slot.
    pub fn version(self) -> u32 {
        self.version
    }
}
