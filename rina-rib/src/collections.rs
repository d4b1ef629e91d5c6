//
// Copyright (c) The RINA Daemon Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::BTreeMap;

use generational_arena::Index;
use rina_utils::ApplicationName;

use crate::error::Error;
use crate::flow::FlowRequest;

pub type FlowReqIndex = Index;

/// Thin wrapper over `generational_arena::Arena` so flow requests can be
/// referenced by a stable index from timeout callbacks without holding a
/// borrow of the collection itself, the same indirection
/// `holo-isis::collections::Arena` uses for adjacencies.
#[derive(Debug)]
pub struct Arena<T>(generational_arena::Arena<T>);

impl<T> Default for Arena<T> {
    fn default() -> Arena<T> {
        Arena(Default::default())
    }
}

impl<T> std::ops::Index<Index> for Arena<T> {
    type Output = T;

    fn index(&self, index: Index) -> &T {
        &self.0[index]
    }
}

impl<T> std::ops::IndexMut<Index> for Arena<T> {
    fn index_mut(&mut self, index: Index) -> &mut T {
        &mut self.0[index]
    }
}

impl<T> Arena<T> {
    pub fn insert(&mut self, value: T) -> Index {
        self.0.insert(value)
    }

    pub fn remove(&mut self, index: Index) -> Option<T> {
        self.0.remove(index)
    }

    pub fn get(&self, index: Index) -> Option<&T> {
        self.0.get(index)
    }

    pub fn get_mut(&mut self, index: Index) -> Option<&mut T> {
        self.0.get_mut(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Index, &T)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Outstanding flow-allocation requests, indexed by both a stable arena
/// slot and the requesting application's name (a `fa_req` for an
/// application already pending is a re-request, not a new one).
#[derive(Debug, Default)]
pub struct FlowRequests {
    arena: Arena<FlowRequest>,
    name_tree: BTreeMap<ApplicationName, FlowReqIndex>,
}

impl FlowRequests {
    pub fn insert(&mut self, req: FlowRequest) -> FlowReqIndex {
        let name = req.remote_appl.clone();
        let idx = self.arena.insert(req);
        self.name_tree.insert(name, idx);
        idx
    }

    pub fn remove(&mut self, idx: FlowReqIndex) -> Option<FlowRequest> {
        let req = self.arena.remove(idx)?;
        self.name_tree.remove(&req.remote_appl);
        Some(req)
    }

    pub fn get(&self, idx: FlowReqIndex) -> Option<&FlowRequest> {
        self.arena.get(idx)
    }

    pub fn get_mut(&mut self, idx: FlowReqIndex) -> Option<&mut FlowRequest> {
        self.arena.get_mut(idx)
    }

    pub fn get_by_name(&self, name: &ApplicationName) -> Option<&FlowRequest> {
        self.name_tree.get(name).and_then(|idx| self.arena.get(*idx))
    }

    pub fn index_by_name(&self, name: &ApplicationName) -> Option<FlowReqIndex> {
        self.name_tree.get(name).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (FlowReqIndex, &FlowRequest)> {
        self.arena.iter()
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn lookup(
        &self,
        name: &ApplicationName,
    ) -> Result<FlowReqIndex, Error> {
        self.index_by_name(name)
            .ok_or_else(|| Error::FlowRequestNotFound(name.clone()))
    }
}
