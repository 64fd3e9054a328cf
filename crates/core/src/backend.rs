//! Driver-facing traits: the narrow interface this layer consumes.
//!
//! [`ContextBackend`] covers the native context primitive (create, make
//! current, release, destroy). [`BindBackend`] covers the bind-style calls
//! that resource wrappers issue against whichever context is current.
//! Real drivers are plugged in by implementing these traits; the crate ships
//! an in-memory [`HeadlessBackend`](crate::headless::HeadlessBackend) and,
//! with the `render` feature, a `glow`-based bind backend.

use crate::cache::{BindTarget, TextureTarget, Viewport};
use crate::surface::SurfaceDescriptor;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroU32;

/// Driver-assigned name of a GPU object.
///
/// Zero is reserved by GL drivers for "no object", so a name is always
/// non-zero; an unbound slot is `Option::<ObjectName>::None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectName(NonZeroU32);

impl ObjectName {
    /// Wraps a raw driver name. Returns `None` for `0`.
    pub fn from_raw(raw: u32) -> Option<Self> {
        NonZeroU32::new(raw).map(Self)
    }

    /// Wraps an already non-zero name.
    pub fn new(raw: NonZeroU32) -> Self {
        Self(raw)
    }

    /// Returns the raw driver name.
    pub fn get(self) -> u32 {
        self.0.get()
    }

    /// Returns the name as a `NonZeroU32`.
    pub fn non_zero(self) -> NonZeroU32 {
        self.0
    }
}

impl fmt::Display for ObjectName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kinds of GPU objects tracked by the state cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ObjectKind {
    Buffer,
    Texture,
    Framebuffer,
    Program,
    VertexArray,
}

impl ObjectKind {
    /// All object kinds.
    pub const ALL: [ObjectKind; 5] = [
        ObjectKind::Buffer,
        ObjectKind::Texture,
        ObjectKind::Framebuffer,
        ObjectKind::Program,
        ObjectKind::VertexArray,
    ];
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ObjectKind::Buffer => "buffer",
            ObjectKind::Texture => "texture",
            ObjectKind::Framebuffer => "framebuffer",
            ObjectKind::Program => "program",
            ObjectKind::VertexArray => "vertex array",
        };
        f.write_str(name)
    }
}

/// Native context primitive.
///
/// Failures are reported as the driver's own message; the layer above wraps
/// them into [`ContextError`](crate::error::ContextError) kinds.
pub trait ContextBackend {
    /// Opaque native context handle, exclusively owned by one
    /// [`RenderingContext`](crate::context::RenderingContext).
    type Handle;

    /// Creates a native context compatible with `surface`, sharing its
    /// object namespace with `share` when given.
    fn create(
        &self,
        surface: &SurfaceDescriptor,
        share: Option<&Self::Handle>,
    ) -> Result<Self::Handle, String>;

    /// Makes `handle` current on the calling thread, targeting `surface`.
    fn make_current(&self, handle: &Self::Handle, surface: &SurfaceDescriptor)
        -> Result<(), String>;

    /// Releases whatever context is current on the calling thread.
    fn release_current(&self) -> Result<(), String>;

    /// Destroys a native context. Never called while the handle is current.
    fn destroy(&self, handle: Self::Handle);
}

/// Bind-style driver calls. All of them act on the calling thread's current
/// context, which the caller has already verified.
pub trait BindBackend {
    /// Allocates a new object name of the given kind.
    fn create_object(&self, kind: ObjectKind) -> Result<ObjectName, String>;

    /// Deletes an object.
    fn delete_object(&self, kind: ObjectKind, name: ObjectName);

    /// Binds `name` (or nothing) to a scalar bind target.
    fn bind(&self, target: BindTarget, name: Option<ObjectName>);

    /// Selects the texture unit for subsequent texture binds.
    fn active_texture(&self, unit: u32);

    /// Binds a texture to the active texture unit.
    fn bind_texture(&self, target: TextureTarget, name: Option<ObjectName>);

    /// Sets the viewport rectangle.
    fn viewport(&self, viewport: Viewport);
}

/// Pairs a context provider with a separate bind provider.
///
/// Windowing libraries usually create contexts while a GL loader such as
/// `glow` issues the calls; this type lets both halves drive one
/// [`Platform`](crate::context::Platform).
#[derive(Debug)]
pub struct SplitBackend<C, G> {
    context: C,
    bindings: G,
}

impl<C, G> SplitBackend<C, G> {
    pub fn new(context: C, bindings: G) -> Self {
        Self { context, bindings }
    }

    pub fn context_backend(&self) -> &C {
        &self.context
    }

    pub fn bind_backend(&self) -> &G {
        &self.bindings
    }
}

impl<C: ContextBackend, G> ContextBackend for SplitBackend<C, G> {
    type Handle = C::Handle;

    fn create(
        &self,
        surface: &SurfaceDescriptor,
        share: Option<&Self::Handle>,
    ) -> Result<Self::Handle, String> {
        self.context.create(surface, share)
    }

    fn make_current(
        &self,
        handle: &Self::Handle,
        surface: &SurfaceDescriptor,
    ) -> Result<(), String> {
        self.context.make_current(handle, surface)
    }

    fn release_current(&self) -> Result<(), String> {
        self.context.release_current()
    }

    fn destroy(&self, handle: Self::Handle) {
        self.context.destroy(handle)
    }
}

impl<C, G: BindBackend> BindBackend for SplitBackend<C, G> {
    fn create_object(&self, kind: ObjectKind) -> Result<ObjectName, String> {
        self.bindings.create_object(kind)
    }

    fn delete_object(&self, kind: ObjectKind, name: ObjectName) {
        self.bindings.delete_object(kind, name)
    }

    fn bind(&self, target: BindTarget, name: Option<ObjectName>) {
        self.bindings.bind(target, name)
    }

    fn active_texture(&self, unit: u32) {
        self.bindings.active_texture(unit)
    }

    fn bind_texture(&self, target: TextureTarget, name: Option<ObjectName>) {
        self.bindings.bind_texture(target, name)
    }

    fn viewport(&self, viewport: Viewport) {
        self.bindings.viewport(viewport)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::{DriverCall, HeadlessBackend};

    #[test]
    fn object_name_rejects_zero() {
        assert!(ObjectName::from_raw(0).is_none());
        assert_eq!(ObjectName::from_raw(12).map(ObjectName::get), Some(12));
    }

    #[test]
    fn object_kind_display_is_lowercase() {
        assert_eq!(ObjectKind::VertexArray.to_string(), "vertex array");
        assert_eq!(ObjectKind::Framebuffer.to_string(), "framebuffer");
    }

    #[test]
    fn split_backend_routes_binds_to_bind_half() {
        let contexts = HeadlessBackend::new();
        let bindings = HeadlessBackend::new();
        let split = SplitBackend::new(contexts, bindings);

        split.bind(BindTarget::Program, ObjectName::from_raw(3));
        split.active_texture(2);

        assert_eq!(split.context_backend().calls().len(), 0);
        assert_eq!(
            split.bind_backend().calls(),
            vec![
                DriverCall::Bind {
                    target: BindTarget::Program,
                    name: ObjectName::from_raw(3),
                },
                DriverCall::ActiveTexture { unit: 2 },
            ]
        );
    }
}
