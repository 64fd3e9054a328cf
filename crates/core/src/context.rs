//! Rendering contexts, their identity, and the make-current transition.
//!
//! A [`Platform`] bundles the collaborators every context needs: the driver
//! backend, the [`ContextRegistry`] and an [`IdentityGenerator`]. Contexts
//! created from one platform can share objects with each other; contexts
//! from different platforms cannot.
//!
//! The registry names contexts by identity. Moving a [`RenderingContext`]
//! keeps its identity, so a context that was current before a move is still
//! current afterwards without any driver call.

use crate::backend::{BindBackend, ContextBackend, ObjectKind, ObjectName};
use crate::cache::{BindTarget, StateCache, TextureTarget, Viewport};
use crate::error::ContextError;
use crate::identity::{
    AtomicIdentityGenerator, ContextId, IdentityGenerator, SharingGroupId, SurfaceId,
};
use crate::registry::{ContextRegistry, CurrentBinding};
use crate::sharing::{Missed, SharingGroup};
use crate::surface::{PixelFormat, Surface};
use serde::Serialize;
use std::sync::Arc;
use std::thread;

/// Collaborators shared by every context of one process-level setup.
pub struct Platform<B> {
    backend: Arc<B>,
    registry: Arc<ContextRegistry>,
    ids: Arc<dyn IdentityGenerator>,
}

impl<B> Clone for Platform<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            registry: Arc::clone(&self.registry),
            ids: Arc::clone(&self.ids),
        }
    }
}

impl<B> Platform<B> {
    /// Creates a platform with a fresh registry and identity counter.
    pub fn new(backend: B) -> Self {
        Self::from_parts(
            Arc::new(backend),
            Arc::new(ContextRegistry::new()),
            Arc::new(AtomicIdentityGenerator::new()),
        )
    }

    /// Creates a platform from explicitly supplied collaborators.
    pub fn from_parts(
        backend: Arc<B>,
        registry: Arc<ContextRegistry>,
        ids: Arc<dyn IdentityGenerator>,
    ) -> Self {
        Self {
            backend,
            registry,
            ids,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn registry(&self) -> &ContextRegistry {
        &self.registry
    }

    /// Context and surface current on the calling thread, if any.
    pub fn get_current(&self) -> Option<CurrentBinding> {
        self.registry.current()
    }
}

impl<B: ContextBackend> Platform<B> {
    /// Shorthand for [`RenderingContext::create`].
    pub fn create_context(
        &self,
        surface: &impl Surface,
        share: Option<&RenderingContext<B>>,
    ) -> Result<RenderingContext<B>, ContextError> {
        RenderingContext::create(self, surface, share)
    }

    /// Releases the calling thread's current context, if it has one.
    pub fn unset_current(&self) -> Result<(), ContextError> {
        release_thread(&*self.backend, &self.registry)
    }
}

fn release_thread<B: ContextBackend>(
    backend: &B,
    registry: &ContextRegistry,
) -> Result<(), ContextError> {
    let Some(binding) = registry.current() else {
        return Ok(());
    };
    backend
        .release_current()
        .map_err(|reason| ContextError::Release { reason })?;
    registry.clear_current();
    log::debug!("released {} from {}", binding.context, binding.surface);
    Ok(())
}

/// Counts of bind-style calls routed through a context's cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct BindStats {
    /// Calls that reached the driver.
    pub issued: u64,
    /// Calls skipped because the cache already matched.
    pub elided: u64,
}

impl BindStats {
    pub fn total(&self) -> u64 {
        self.issued + self.elided
    }
}

/// A native rendering context with its identity, sharing group and state cache.
pub struct RenderingContext<B: ContextBackend> {
    id: ContextId,
    group: Arc<SharingGroup>,
    format: PixelFormat,
    /// Always `Some` until `drop` takes it.
    handle: Option<B::Handle>,
    cache: StateCache,
    /// Group deletion generation already applied to `cache`.
    seen_deletions: u64,
    stats: BindStats,
    backend: Arc<B>,
    registry: Arc<ContextRegistry>,
}

impl<B: ContextBackend> RenderingContext<B> {
    /// Creates a context for `surface`, optionally sharing objects with `share`.
    ///
    /// A shared context joins `share`'s sharing group, so groups propagate
    /// through chains of shared construction.
    ///
    /// # Errors
    ///
    /// - [`ContextError::InvalidFormat`] if the surface format is malformed.
    /// - [`ContextError::ForeignPlatform`] if `share` came from another platform.
    /// - [`ContextError::IdentityExhausted`] if no identity is left.
    /// - [`ContextError::Creation`] if the driver refuses.
    pub fn create(
        platform: &Platform<B>,
        surface: &impl Surface,
        share: Option<&RenderingContext<B>>,
    ) -> Result<Self, ContextError> {
        let descriptor = surface.descriptor();
        descriptor.format.validate()?;

        if let Some(share) = share {
            if !Arc::ptr_eq(&share.registry, &platform.registry) {
                return Err(ContextError::ForeignPlatform);
            }
        }

        let id = ContextId::new(platform.ids.generate()?);
        let handle = platform
            .backend
            .create(&descriptor, share.map(|s| s.native()))
            .map_err(|reason| ContextError::Creation { reason })?;

        let group = match share {
            Some(share) => Arc::clone(&share.group),
            None => Arc::new(SharingGroup::new(SharingGroupId::from(id))),
        };
        log::debug!("created {id} in {} for {}", group.id(), descriptor.id);

        Ok(Self {
            id,
            seen_deletions: group.deletion_generation(),
            group,
            format: descriptor.format,
            handle: Some(handle),
            cache: StateCache::new(),
            stats: BindStats::default(),
            backend: Arc::clone(&platform.backend),
            registry: Arc::clone(&platform.registry),
        })
    }

    fn native(&self) -> &B::Handle {
        self.handle
            .as_ref()
            .expect("native handle is only taken during drop")
    }

    pub fn id(&self) -> ContextId {
        self.id
    }

    pub fn sharing_group_id(&self) -> SharingGroupId {
        self.group.id()
    }

    pub fn sharing_group(&self) -> &SharingGroup {
        &self.group
    }

    /// Number of live contexts in this context's sharing group.
    pub fn sharing_group_members(&self) -> usize {
        Arc::strong_count(&self.group)
    }

    /// Returns `true` if both contexts share one object namespace.
    pub fn shares_with(&self, other: &RenderingContext<B>) -> bool {
        Arc::ptr_eq(&self.group, &other.group)
    }

    pub fn pixel_format(&self) -> PixelFormat {
        self.format
    }

    /// Makes this context current on the calling thread, targeting `surface`.
    ///
    /// Does nothing if the calling thread already has this exact context and
    /// surface current.
    ///
    /// # Errors
    ///
    /// - [`ContextError::CurrentElsewhere`] if another thread has this context current.
    /// - [`ContextError::Activation`] if the driver refuses; the calling
    ///   thread's registry entry is left as it was.
    pub fn make_current(&self, surface: &impl Surface) -> Result<(), ContextError> {
        let descriptor = surface.descriptor();
        if self.registry.is_current(self.id, descriptor.id) {
            log::trace!("{} already current on {}", self.id, descriptor.id);
            return Ok(());
        }

        let me = thread::current().id();
        if self.registry.holder_of(self.id).is_some_and(|t| t != me) {
            return Err(ContextError::CurrentElsewhere { context: self.id });
        }

        self.backend
            .make_current(self.native(), &descriptor)
            .map_err(|reason| ContextError::Activation {
                context: self.id,
                reason,
            })?;
        self.registry.set_current(CurrentBinding {
            context: self.id,
            surface: descriptor.id,
        });
        log::debug!("made {} current on {}", self.id, descriptor.id);
        Ok(())
    }

    /// Releases the calling thread's current context, whichever it is.
    ///
    /// Does nothing if the calling thread has no current context.
    pub fn unset_current(&self) -> Result<(), ContextError> {
        release_thread(&*self.backend, &self.registry)
    }

    /// Returns `true` if this context is current on the calling thread.
    pub fn is_current(&self) -> bool {
        self.registry.is_context_current(self.id)
    }

    /// Surface this context targets on the calling thread, if current.
    pub fn current_surface(&self) -> Option<SurfaceId> {
        self.registry
            .current()
            .filter(|b| b.context == self.id)
            .map(|b| b.surface)
    }

    fn ensure_current(&self) -> Result<(), ContextError> {
        if self.is_current() {
            Ok(())
        } else {
            Err(ContextError::NotCurrent { context: self.id })
        }
    }

    /// Checks currency and applies deletions made by other group members.
    fn prepare(&mut self) -> Result<(), ContextError> {
        self.ensure_current()?;
        let Some((generation, missed)) = self.group.deletions_since(self.seen_deletions) else {
            return Ok(());
        };
        match missed {
            Missed::Objects(objects) => {
                for (kind, name) in objects {
                    self.cache.invalidate_object(kind, name);
                }
            }
            Missed::TooMany => {
                log::debug!("{}: missed too many group deletions, dropping cache", self.id);
                self.cache.invalidate_all();
            }
        }
        self.seen_deletions = generation;
        Ok(())
    }

    /// The state cache, valid only while this context is current here.
    ///
    /// Slots naming objects deleted through another context of the group
    /// are refreshed by the next cached bind or [`state_mut`](Self::state_mut).
    pub fn state(&self) -> Result<&StateCache, ContextError> {
        self.ensure_current()?;
        Ok(&self.cache)
    }

    /// Mutable access to the state cache, valid only while current here.
    pub fn state_mut(&mut self) -> Result<&mut StateCache, ContextError> {
        self.prepare()?;
        Ok(&mut self.cache)
    }

    pub fn bind_stats(&self) -> BindStats {
        self.stats
    }

    /// Fails with [`ContextError::ForeignObject`] unless `group` is this
    /// context's sharing group.
    pub fn check_group(&self, kind: ObjectKind, group: SharingGroupId) -> Result<(), ContextError> {
        if group == self.group.id() {
            Ok(())
        } else {
            Err(ContextError::ForeignObject {
                kind,
                object_group: group,
                context: self.id,
                context_group: self.group.id(),
            })
        }
    }

    fn record(&mut self, issued: bool) -> bool {
        if issued {
            self.stats.issued += 1;
        } else {
            self.stats.elided += 1;
        }
        issued
    }
}

impl<B: ContextBackend + BindBackend> RenderingContext<B> {
    /// Binds `name` to `target` unless the cache says it already is.
    ///
    /// Returns whether a driver call was issued. Switching vertex arrays
    /// makes the element array buffer slot unknown.
    pub fn bind(
        &mut self,
        target: BindTarget,
        name: Option<ObjectName>,
    ) -> Result<bool, ContextError> {
        self.prepare()?;
        if self.cache.is_bound(target, name) {
            log::trace!("{}: elided bind of {target:?}", self.id);
            return Ok(self.record(false));
        }
        self.backend.bind(target, name);
        self.cache.set_bound(target, name);
        if target == BindTarget::VertexArray {
            self.cache.invalidate(BindTarget::ElementArrayBuffer);
        }
        Ok(self.record(true))
    }

    /// Selects a texture unit unless it is already active.
    pub fn select_texture_unit(&mut self, unit: u32) -> Result<bool, ContextError> {
        self.prepare()?;
        if self.cache.is_active_texture_unit(unit) {
            return Ok(self.record(false));
        }
        self.backend.active_texture(unit);
        self.cache.set_active_texture_unit(unit);
        Ok(self.record(true))
    }

    /// Binds a texture on `unit`, selecting the unit first if needed.
    ///
    /// Returns whether the texture bind itself reached the driver.
    pub fn bind_texture(
        &mut self,
        unit: u32,
        name: Option<ObjectName>,
        target: TextureTarget,
    ) -> Result<bool, ContextError> {
        self.prepare()?;
        if self.cache.is_texture_bound(unit, name, target) {
            return Ok(self.record(false));
        }
        self.select_texture_unit(unit)?;
        self.backend.bind_texture(target, name);
        self.cache.set_bound_texture(name, unit, target);
        Ok(self.record(true))
    }

    /// Sets the viewport unless it already matches.
    pub fn set_viewport(&mut self, viewport: Viewport) -> Result<bool, ContextError> {
        self.prepare()?;
        if self.cache.is_viewport(viewport) {
            return Ok(self.record(false));
        }
        self.backend.viewport(viewport);
        self.cache.set_viewport(viewport);
        Ok(self.record(true))
    }

    /// Allocates an object in this context's sharing group.
    pub fn create_object(&mut self, kind: ObjectKind) -> Result<ObjectName, ContextError> {
        self.prepare()?;
        let name = self
            .backend
            .create_object(kind)
            .map_err(|reason| ContextError::ObjectCreation { kind, reason })?;
        self.group.object_created();
        Ok(name)
    }

    /// Deletes an object of this context's sharing group and clears any
    /// cache slot naming it. Other members of the group stop trusting their
    /// slots for `name` before their next cached bind.
    pub fn delete_object(
        &mut self,
        kind: ObjectKind,
        group: SharingGroupId,
        name: ObjectName,
    ) -> Result<(), ContextError> {
        self.prepare()?;
        self.check_group(kind, group)?;
        self.backend.delete_object(kind, name);
        self.cache.forget_object(kind, name);
        self.group.object_deleted();
        self.group.record_deletion(kind, name);
        Ok(())
    }
}

impl<B: ContextBackend> Drop for RenderingContext<B> {
    fn drop(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };

        if self.is_current() {
            if let Err(err) = release_thread(&*self.backend, &self.registry) {
                log::error!("{}: {err}; leaking native handle", self.id);
                std::mem::forget(handle);
                return;
            }
        } else if self.registry.holder_of(self.id).is_some() {
            log::error!(
                "{} dropped while current on another thread; leaking native handle",
                self.id
            );
            std::mem::forget(handle);
            return;
        }

        self.backend.destroy(handle);
        log::debug!("destroyed {}", self.id);
    }
}

impl<B: ContextBackend> std::fmt::Debug for RenderingContext<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderingContext")
            .field("id", &self.id)
            .field("group", &self.group.id())
            .field("format", &self.format)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}
