//! In-memory driver for tests and diagnostics.
//!
//! [`HeadlessBackend`] implements both backend traits without touching a
//! GPU. It behaves like a strict driver: a handle can be current on one
//! thread at a time, a context only activates on surfaces with its own
//! pixel format, and share partners must agree on the format. A thread's
//! current handle is released when the thread exits, and deleted object
//! names are handed out again, lowest first. Every call is recorded so
//! tests can count exactly what reached the "driver".

use crate::backend::{BindBackend, ContextBackend, ObjectKind, ObjectName};
use crate::cache::{BindTarget, TextureTarget, Viewport};
use crate::identity::SurfaceId;
use crate::surface::{PixelFormat, Surface, SurfaceDescriptor};
use crate::thread_slots::ThreadSlots;
use serde::Serialize;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread;

/// One call that reached the headless driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverCall {
    Create {
        handle: u64,
        surface: SurfaceId,
        share: Option<u64>,
    },
    MakeCurrent {
        handle: u64,
        surface: SurfaceId,
    },
    ReleaseCurrent,
    Destroy {
        handle: u64,
    },
    CreateObject {
        kind: ObjectKind,
        name: ObjectName,
    },
    DeleteObject {
        kind: ObjectKind,
        name: ObjectName,
    },
    Bind {
        target: BindTarget,
        name: Option<ObjectName>,
    },
    ActiveTexture {
        unit: u32,
    },
    BindTexture {
        target: TextureTarget,
        name: Option<ObjectName>,
    },
    Viewport(Viewport),
}

/// Aggregate call counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct DriverStats {
    pub creates: usize,
    pub make_current: usize,
    pub release_current: usize,
    pub destroys: usize,
    pub object_creates: usize,
    pub object_deletes: usize,
    pub binds: usize,
    pub active_texture: usize,
    pub texture_binds: usize,
    pub viewports: usize,
    /// Destroy calls issued for a handle that was still current somewhere.
    pub destroyed_while_current: usize,
    /// Bind-style calls issued with no context current on the thread.
    pub calls_without_context: usize,
}

/// Native handle handed out by [`HeadlessBackend`].
#[derive(Debug, PartialEq, Eq)]
pub struct HeadlessHandle {
    id: u64,
}

impl HeadlessHandle {
    pub fn id(&self) -> u64 {
        self.id
    }
}

#[derive(Debug)]
struct NativeContext {
    format: PixelFormat,
}

#[derive(Debug, Default)]
struct DriverState {
    next_handle: u64,
    next_object: u32,
    free_objects: BinaryHeap<Reverse<u32>>,
    contexts: HashMap<u64, NativeContext>,
    calls: Vec<DriverCall>,
    fail_create: Option<String>,
    fail_make_current: Option<String>,
    fail_release: Option<String>,
    destroyed_while_current: usize,
    calls_without_context: usize,
}

/// Thread-aware, call-recording driver with no GPU behind it.
#[derive(Debug, Default)]
pub struct HeadlessBackend {
    state: Mutex<DriverState>,
    /// Handle current on each live thread.
    current: ThreadSlots<u64>,
}

impl HeadlessBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, DriverState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record_bind_call(&self, call: DriverCall) {
        let has_context = self.current.is_set();
        let mut state = self.state();
        if !has_context {
            state.calls_without_context += 1;
        }
        state.calls.push(call);
    }

    /// Every call recorded so far, in order.
    pub fn calls(&self) -> Vec<DriverCall> {
        self.state().calls.clone()
    }

    /// Number of recorded calls matching `predicate`.
    pub fn count(&self, predicate: impl Fn(&DriverCall) -> bool) -> usize {
        self.state().calls.iter().filter(|c| predicate(c)).count()
    }

    /// Forgets the recorded calls (driver state is kept).
    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    /// Number of native contexts created and not yet destroyed.
    pub fn live_contexts(&self) -> usize {
        self.state().contexts.len()
    }

    /// Handle current on the calling thread, as the driver sees it.
    pub fn current_handle(&self) -> Option<u64> {
        self.current.get()
    }

    /// Makes the next `create` fail with `reason`.
    pub fn fail_next_create(&self, reason: &str) {
        self.state().fail_create = Some(reason.to_string());
    }

    /// Makes the next `make_current` fail with `reason`.
    pub fn fail_next_make_current(&self, reason: &str) {
        self.state().fail_make_current = Some(reason.to_string());
    }

    /// Makes the next `release_current` fail with `reason`.
    pub fn fail_next_release(&self, reason: &str) {
        self.state().fail_release = Some(reason.to_string());
    }

    /// Summarises the recorded calls.
    pub fn stats(&self) -> DriverStats {
        let state = self.state();
        let mut stats = DriverStats {
            destroyed_while_current: state.destroyed_while_current,
            calls_without_context: state.calls_without_context,
            ..DriverStats::default()
        };
        for call in &state.calls {
            match call {
                DriverCall::Create { .. } => stats.creates += 1,
                DriverCall::MakeCurrent { .. } => stats.make_current += 1,
                DriverCall::ReleaseCurrent => stats.release_current += 1,
                DriverCall::Destroy { .. } => stats.destroys += 1,
                DriverCall::CreateObject { .. } => stats.object_creates += 1,
                DriverCall::DeleteObject { .. } => stats.object_deletes += 1,
                DriverCall::Bind { .. } => stats.binds += 1,
                DriverCall::ActiveTexture { .. } => stats.active_texture += 1,
                DriverCall::BindTexture { .. } => stats.texture_binds += 1,
                DriverCall::Viewport(_) => stats.viewports += 1,
            }
        }
        stats
    }
}

impl ContextBackend for HeadlessBackend {
    type Handle = HeadlessHandle;

    fn create(
        &self,
        surface: &SurfaceDescriptor,
        share: Option<&HeadlessHandle>,
    ) -> Result<HeadlessHandle, String> {
        let mut state = self.state();
        if let Some(reason) = state.fail_create.take() {
            return Err(reason);
        }
        if let Some(share) = share {
            let partner = state
                .contexts
                .get(&share.id)
                .ok_or_else(|| format!("share context {} does not exist", share.id))?;
            if partner.format != surface.format {
                return Err(format!(
                    "pixel format of {} is incompatible with share context {}",
                    surface.id, share.id
                ));
            }
        }

        state.next_handle += 1;
        let id = state.next_handle;
        state.contexts.insert(
            id,
            NativeContext {
                format: surface.format,
            },
        );
        state.calls.push(DriverCall::Create {
            handle: id,
            surface: surface.id,
            share: share.map(HeadlessHandle::id),
        });
        Ok(HeadlessHandle { id })
    }

    fn make_current(
        &self,
        handle: &HeadlessHandle,
        surface: &SurfaceDescriptor,
    ) -> Result<(), String> {
        let mut state = self.state();
        state.calls.push(DriverCall::MakeCurrent {
            handle: handle.id,
            surface: surface.id,
        });
        if let Some(reason) = state.fail_make_current.take() {
            return Err(reason);
        }

        let me = thread::current().id();
        let busy = self
            .current
            .find(|id| *id == handle.id)
            .is_some_and(|holder| holder != me);
        if busy {
            return Err(format!("handle {} is current on another thread", handle.id));
        }
        let native = state
            .contexts
            .get(&handle.id)
            .ok_or_else(|| format!("handle {} was destroyed", handle.id))?;
        if native.format != surface.format {
            return Err(format!(
                "{} does not match the pixel format of handle {}",
                surface.id, handle.id
            ));
        }

        self.current.set(handle.id);
        Ok(())
    }

    fn release_current(&self) -> Result<(), String> {
        let mut state = self.state();
        state.calls.push(DriverCall::ReleaseCurrent);
        if let Some(reason) = state.fail_release.take() {
            return Err(reason);
        }
        self.current.take();
        Ok(())
    }

    fn destroy(&self, handle: HeadlessHandle) {
        let mut state = self.state();
        if self.current.find(|id| *id == handle.id).is_some() {
            log::error!("headless: destroying handle {} while current", handle.id);
            state.destroyed_while_current += 1;
        }
        state.contexts.remove(&handle.id);
        state.calls.push(DriverCall::Destroy { handle: handle.id });
    }
}

impl BindBackend for HeadlessBackend {
    fn create_object(&self, kind: ObjectKind) -> Result<ObjectName, String> {
        let raw = {
            let mut state = self.state();
            match state.free_objects.pop() {
                Some(Reverse(raw)) => raw,
                None => {
                    state.next_object = state
                        .next_object
                        .checked_add(1)
                        .ok_or_else(|| "out of object names".to_string())?;
                    state.next_object
                }
            }
        };
        let name = ObjectName::from_raw(raw)
            .ok_or_else(|| "driver produced object name 0".to_string())?;
        self.record_bind_call(DriverCall::CreateObject { kind, name });
        Ok(name)
    }

    fn delete_object(&self, kind: ObjectKind, name: ObjectName) {
        self.state().free_objects.push(Reverse(name.get()));
        self.record_bind_call(DriverCall::DeleteObject { kind, name });
    }

    fn bind(&self, target: BindTarget, name: Option<ObjectName>) {
        self.record_bind_call(DriverCall::Bind { target, name });
    }

    fn active_texture(&self, unit: u32) {
        self.record_bind_call(DriverCall::ActiveTexture { unit });
    }

    fn bind_texture(&self, target: TextureTarget, name: Option<ObjectName>) {
        self.record_bind_call(DriverCall::BindTexture { target, name });
    }

    fn viewport(&self, viewport: Viewport) {
        self.record_bind_call(DriverCall::Viewport(viewport));
    }
}

/// Off-screen surface for use with [`HeadlessBackend`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeadlessSurface {
    id: SurfaceId,
    format: PixelFormat,
}

impl HeadlessSurface {
    pub fn new(id: u64, format: PixelFormat) -> Self {
        Self {
            id: SurfaceId::new(id),
            format,
        }
    }
}

impl Surface for HeadlessSurface {
    fn surface_id(&self) -> SurfaceId {
        self.id
    }

    fn pixel_format(&self) -> PixelFormat {
        self.format
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn surface(id: u64) -> SurfaceDescriptor {
        HeadlessSurface::new(id, PixelFormat::rgba8()).descriptor()
    }

    #[test]
    fn create_hands_out_distinct_handles() {
        let driver = HeadlessBackend::new();
        let a = driver.create(&surface(1), None).unwrap();
        let b = driver.create(&surface(1), Some(&a)).unwrap();
        assert_ne!(a.id(), b.id());
        assert_eq!(driver.live_contexts(), 2);
        assert_eq!(driver.stats().creates, 2);
    }

    #[test]
    fn create_refuses_share_with_different_format() {
        let driver = HeadlessBackend::new();
        let a = driver.create(&surface(1), None).unwrap();
        let hdr = HeadlessSurface::new(2, PixelFormat::rgba16f()).descriptor();
        let err = driver.create(&hdr, Some(&a)).unwrap_err();
        assert!(err.contains("incompatible"), "unexpected reason: {err}");
    }

    #[test]
    fn injected_create_failure_is_one_shot() {
        let driver = HeadlessBackend::new();
        driver.fail_next_create("out of memory");
        assert_eq!(driver.create(&surface(1), None).unwrap_err(), "out of memory");
        assert!(driver.create(&surface(1), None).is_ok());
    }

    #[test]
    fn make_current_refuses_handle_current_on_another_thread() {
        let driver = Arc::new(HeadlessBackend::new());
        let handle = Arc::new(driver.create(&surface(1), None).unwrap());
        driver.make_current(&handle, &surface(1)).unwrap();

        let remote_driver = Arc::clone(&driver);
        let remote_handle = Arc::clone(&handle);
        let result = thread::spawn(move || remote_driver.make_current(&remote_handle, &surface(1)))
            .join()
            .unwrap();
        assert!(result.is_err(), "driver must refuse cross-thread currency");
    }

    #[test]
    fn make_current_refuses_mismatched_surface_format() {
        let driver = HeadlessBackend::new();
        let handle = driver.create(&surface(1), None).unwrap();
        let msaa = HeadlessSurface::new(2, PixelFormat::msaa4()).descriptor();
        assert!(driver.make_current(&handle, &msaa).is_err());
        assert_eq!(driver.current_handle(), None);
    }

    #[test]
    fn destroy_while_current_is_counted() {
        let driver = HeadlessBackend::new();
        let handle = driver.create(&surface(1), None).unwrap();
        driver.make_current(&handle, &surface(1)).unwrap();
        driver.destroy(handle);
        assert_eq!(driver.stats().destroyed_while_current, 1);
    }

    #[test]
    fn bind_calls_without_context_are_counted() {
        let driver = HeadlessBackend::new();
        driver.bind(BindTarget::ArrayBuffer, None);
        assert_eq!(driver.stats().calls_without_context, 1);
        assert_eq!(driver.stats().binds, 1);
    }

    #[test]
    fn object_names_start_at_one() {
        let driver = HeadlessBackend::new();
        let name = driver.create_object(ObjectKind::Buffer).unwrap();
        assert_eq!(name.get(), 1);
    }

    #[test]
    fn deleted_names_are_reused_lowest_first() {
        let driver = HeadlessBackend::new();
        let names: Vec<_> = (0..3)
            .map(|_| driver.create_object(ObjectKind::Buffer).unwrap())
            .collect();
        driver.delete_object(ObjectKind::Buffer, names[2]);
        driver.delete_object(ObjectKind::Buffer, names[0]);

        assert_eq!(driver.create_object(ObjectKind::Texture).unwrap(), names[0]);
        assert_eq!(driver.create_object(ObjectKind::Texture).unwrap(), names[2]);
        assert_eq!(driver.create_object(ObjectKind::Texture).unwrap().get(), 4);
    }

    #[test]
    fn exiting_thread_releases_its_handle() {
        let driver = Arc::new(HeadlessBackend::new());
        let handle = Arc::new(driver.create(&surface(1), None).unwrap());

        let (remote_driver, remote_handle) = (Arc::clone(&driver), Arc::clone(&handle));
        thread::spawn(move || remote_driver.make_current(&remote_handle, &surface(1)))
            .join()
            .unwrap()
            .unwrap();

        driver
            .make_current(&handle, &surface(1))
            .expect("handle of an exited thread must be free again");
        assert_eq!(driver.current_handle(), Some(handle.id()));
    }
}
