//
// Copyright (c) The RINA Daemon Contributors
//
// SPDX-License-Identifier: MIT
//

/// The RIB object classes a CDAP message can target, named after the
/// `obj_class`/`obj_name` namespaces in the reference implementation.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RibObject {
    AData,
    Dft,
    Neighbors,
    Enrollment,
    Status,
    Address,
    Lfdb,
    Flows,
}

impl RibObject {
    pub fn obj_class(&self) -> &'static str {
        match self {
            RibObject::AData => "adata",
            RibObject::Dft => "dft",
            RibObject::Neighbors => "neighbors",
            RibObject::Enrollment => "enrollment",
            RibObject::Status => "status",
            RibObject::Address => "address",
            RibObject::Lfdb => "lfdb",
            RibObject::Flows => "flows",
        }
    }

    pub fn container_name(&self) -> &'static str {
        match self {
            RibObject::AData => "/adata",
            RibObject::Dft => "/dft",
            RibObject::Neighbors => "/neighbors",
            RibObject::Enrollment => "/enrollment",
            RibObject::Status => "/status",
            RibObject::Address => "/address",
            RibObject::Lfdb => "/lfdb",
            RibObject::Flows => "/flows",
        }
    }
}

const OBJECTS: &[RibObject] = &[
    RibObject::AData,
    RibObject::Dft,
    RibObject::Neighbors,
    RibObject::Enrollment,
    RibObject::Status,
    RibObject::Address,
    RibObject::Lfdb,
    RibObject::Flows,
];

/// Dispatches an incoming CDAP message to a RIB object class.
///
/// Matches first by `obj_class` (an exact match on the object's own
/// name), and only falls back to a container-prefix match against
/// `obj_name` (e.g. `/dft/rina.apps.echo` falling back to the `/dft`
/// container handler) when no handler is registered under the specific
/// name — the same exact-then-container-fallback rule the RIB dispatcher
/// uses for per-entry object updates versus whole-container
/// creates/reads.
pub fn dispatch(obj_class: &str, obj_name: &str) -> Option<RibObject> {
    if let Some(object) = OBJECTS.iter().find(|o| o.obj_class() == obj_class) {
        return Some(*object);
    }
    OBJECTS
        .iter()
        .find(|o| obj_name.starts_with(o.container_name()))
        .copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_obj_class_match_wins() {
        assert_eq!(dispatch("dft", "/dft/rina.apps.echo"), Some(RibObject::Dft));
    }

    #[test]
    fn container_prefix_is_fallback() {
        assert_eq!(
            dispatch("unknown-class", "/lfdb/1/2"),
            Some(RibObject::Lfdb)
        );
    }

    #[test]
    fn unmatched_object_is_none() {
        assert_eq!(dispatch("unknown-class", "/nope"), None);
    }
}
