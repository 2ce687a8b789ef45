// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

// Per-client object registry.
//
// Owns every entity a client created, applies the REUSE/REPLACE creation
// rules, and keeps child -> parent links so deletion tears down whole
// subtrees (deepest first).

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::entity::{DataReader, DataWriter, Entity};
use crate::error::{OpResult, XrceError};
use crate::middleware::Middleware;
use crate::object::{CreationFlags, ObjectId, ObjectKind, ObjectVariant};
use crate::reader::{AllowAll, DeliveryGate};

#[derive(Default)]
struct RegistryInner {
    objects: HashMap<ObjectId, Entity>,
    /// child -> parent
    parents: HashMap<ObjectId, ObjectId>,
}

impl RegistryInner {
    /// Remove `id` and its whole subtree, deepest entities first.
    fn remove_subtree(&mut self, id: ObjectId) -> usize {
        let mut order = vec![id];
        let mut next = 0;
        while next < order.len() {
            let current = order[next];
            order.extend(
                self.parents
                    .iter()
                    .filter(|(_, parent)| **parent == current)
                    .map(|(child, _)| *child),
            );
            next += 1;
        }

        let mut removed = 0;
        for victim in order.into_iter().rev() {
            self.parents.remove(&victim);
            if let Some(entity) = self.objects.remove(&victim) {
                drop(entity);
                removed += 1;
            }
        }
        removed
    }
}

/// Registry of the entities owned by one client.
pub struct ObjectRegistry {
    middleware: Arc<dyn Middleware>,
    gate: Arc<dyn DeliveryGate>,
    inner: Mutex<RegistryInner>,
}

impl ObjectRegistry {
    pub fn new(middleware: Arc<dyn Middleware>) -> Self {
        Self::with_gate(middleware, Arc::new(AllowAll))
    }

    /// Registry whose readers consult `gate` before delivering each sample.
    pub fn with_gate(middleware: Arc<dyn Middleware>, gate: Arc<dyn DeliveryGate>) -> Self {
        Self {
            middleware,
            gate,
            inner: Mutex::new(RegistryInner::default()),
        }
    }

    /// Middleware instance backing this registry's entities.
    pub fn middleware(&self) -> &Arc<dyn Middleware> {
        &self.middleware
    }

    // -----------------------------------------------------------------------
    // Creation
    // -----------------------------------------------------------------------

    /// Create (or reuse/replace) the entity `id` as described by `variant`.
    pub fn create(&self, id: ObjectId, variant: ObjectVariant, flags: CreationFlags) -> OpResult {
        let kind = variant.kind();
        if id.kind_nibble() != kind.as_u8() {
            log::warn!(
                "[XRCE] create {}: kind nibble 0x{:x} does not match {:?}",
                id,
                id.kind_nibble(),
                kind
            );
            return OpResult::InvalidDataError;
        }

        let mut inner = self.inner.lock();

        if let Some(existing) = inner.objects.get(&id) {
            if flags.reuse() {
                if existing.matched(&variant) {
                    log::debug!("[XRCE] reusing {:?} {}", kind, id);
                    return OpResult::OkMatched;
                }
                if !flags.replace() {
                    log::warn!("[XRCE] {:?} {} exists with a different representation", kind, id);
                    return OpResult::MismatchError;
                }
            } else if !flags.replace() {
                log::warn!("[XRCE] {:?} {} already exists", kind, id);
                return OpResult::AlreadyExistsError;
            }
        }

        if let Some(parent) = variant.parent_id() {
            let expected = kind.parent_kind();
            let actual = inner.objects.get(&parent).map(Entity::kind);
            if actual.is_none() || actual != expected {
                log::warn!(
                    "[XRCE] create {:?} {}: parent {} is not a live {:?}",
                    kind,
                    id,
                    parent,
                    expected
                );
                return OpResult::UnknownReferenceError;
            }
        }

        // Nothing is torn down for a request the middleware would refuse.
        if let Err(e) = self.middleware.validate_creation(&variant) {
            log::warn!("[XRCE] create {:?} {} rejected: {}", kind, id, e);
            return OpResult::UnknownReferenceError;
        }

        if inner.objects.contains_key(&id) {
            let removed = inner.remove_subtree(id);
            log::info!("[XRCE] replacing {:?} {} ({} entities torn down)", kind, id, removed);
        }

        match Entity::create(id, &variant, &self.middleware, &self.gate) {
            Ok(entity) => {
                inner.objects.insert(id, entity);
                if let Some(parent) = variant.parent_id() {
                    inner.parents.insert(id, parent);
                }
                OpResult::Ok
            }
            Err(e) => {
                log::warn!("[XRCE] create {:?} {} failed: {}", kind, id, e);
                match e {
                    XrceError::ThreadSpawn(_) => OpResult::ResourcesError,
                    _ => OpResult::UnknownReferenceError,
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Deletion
    // -----------------------------------------------------------------------

    /// Delete `id` and everything created under it.
    pub fn delete(&self, id: ObjectId) -> OpResult {
        let mut inner = self.inner.lock();
        if !inner.objects.contains_key(&id) {
            log::warn!("[XRCE] delete {}: no such object", id);
            return OpResult::UnknownReferenceError;
        }
        let removed = inner.remove_subtree(id);
        log::info!("[XRCE] deleted {} ({} entities)", id, removed);
        OpResult::Ok
    }

    /// Tear down every entity, leaves first.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        let roots: Vec<ObjectId> = inner
            .objects
            .keys()
            .filter(|id| !inner.parents.contains_key(id))
            .copied()
            .collect();
        for root in roots {
            inner.remove_subtree(root);
        }
        // Anything left had a dangling parent link.
        inner.parents.clear();
        inner.objects.clear();
    }

    // -----------------------------------------------------------------------
    // Lookup
    // -----------------------------------------------------------------------

    pub fn matched(&self, id: ObjectId, variant: &ObjectVariant) -> bool {
        self.inner
            .lock()
            .objects
            .get(&id)
            .is_some_and(|e| e.matched(variant))
    }

    pub fn len(&self) -> usize {
        self.inner.lock().objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().objects.is_empty()
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.inner.lock().objects.contains_key(&id)
    }

    pub fn kind_of(&self, id: ObjectId) -> Option<ObjectKind> {
        self.inner.lock().objects.get(&id).map(Entity::kind)
    }

    pub fn parent_of(&self, id: ObjectId) -> Option<ObjectId> {
        self.inner.lock().parents.get(&id).copied()
    }

    /// Run `f` against the writer `id` while the registry is locked.
    pub fn with_datawriter<R>(
        &self,
        id: ObjectId,
        f: impl FnOnce(&DataWriter) -> R,
    ) -> Result<R, XrceError> {
        let inner = self.inner.lock();
        let entity = inner.objects.get(&id).ok_or(XrceError::ObjectNotFound(id))?;
        let writer = entity
            .as_datawriter()
            .ok_or(XrceError::ObjectKindMismatch {
                id,
                expected: ObjectKind::DataWriter,
                actual: entity.kind(),
            })?;
        Ok(f(writer))
    }

    /// Run `f` against the reader `id` while the registry is locked.
    pub fn with_datareader<R>(
        &self,
        id: ObjectId,
        f: impl FnOnce(&DataReader) -> R,
    ) -> Result<R, XrceError> {
        let inner = self.inner.lock();
        let entity = inner.objects.get(&id).ok_or(XrceError::ObjectNotFound(id))?;
        let reader = entity
            .as_datareader()
            .ok_or(XrceError::ObjectKindMismatch {
                id,
                expected: ObjectKind::DataReader,
                actual: entity.kind(),
            })?;
        Ok(f(reader))
    }
}

impl Drop for ObjectRegistry {
    fn drop(&mut self) {
        self.clear();
    }
}
