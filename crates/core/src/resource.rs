//! Typed wrappers for GPU objects whose binds go through the state cache.
//!
//! Each wrapper records the sharing group it was created in; using it with
//! a context from another group is a [`ContextError::ForeignObject`].
//! Wrappers do not delete themselves on drop because deletion needs a
//! current context: call `delete` explicitly.

use crate::backend::{BindBackend, ContextBackend, ObjectKind, ObjectName};
use crate::cache::{BindTarget, TextureTarget};
use crate::context::RenderingContext;
use crate::error::ContextError;
use crate::identity::SharingGroupId;

macro_rules! gpu_object {
    ($(#[$meta:meta])* $vis:vis struct $name:ident => $kind:expr) => {
        $(#[$meta])*
        #[derive(Debug, PartialEq, Eq)]
        $vis struct $name {
            name: ObjectName,
            group: SharingGroupId,
        }

        impl $name {
            pub const KIND: ObjectKind = $kind;

            /// Allocates a new object in `ctx`'s sharing group.
            pub fn create<B: ContextBackend + BindBackend>(
                ctx: &mut RenderingContext<B>,
            ) -> Result<Self, ContextError> {
                let name = ctx.create_object(Self::KIND)?;
                Ok(Self {
                    name,
                    group: ctx.sharing_group_id(),
                })
            }

            /// Adopts an object created outside this layer.
            pub fn from_raw(name: ObjectName, group: SharingGroupId) -> Self {
                Self { name, group }
            }

            pub fn name(&self) -> ObjectName {
                self.name
            }

            pub fn group(&self) -> SharingGroupId {
                self.group
            }

            /// Deletes the object. On error the driver object stays alive.
            pub fn delete<B: ContextBackend + BindBackend>(
                self,
                ctx: &mut RenderingContext<B>,
            ) -> Result<(), ContextError> {
                ctx.delete_object(Self::KIND, self.group, self.name)
            }
        }
    };
}

gpu_object!(
    /// A buffer object (vertex, index, uniform data).
    pub struct Buffer => ObjectKind::Buffer
);

gpu_object!(
    /// A framebuffer object.
    pub struct Framebuffer => ObjectKind::Framebuffer
);

gpu_object!(
    /// A linked shader program.
    pub struct Program => ObjectKind::Program
);

gpu_object!(
    /// A vertex array object.
    pub struct VertexArray => ObjectKind::VertexArray
);

/// Buffer bind points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferTarget {
    Array,
    ElementArray,
}

impl From<BufferTarget> for BindTarget {
    fn from(target: BufferTarget) -> Self {
        match target {
            BufferTarget::Array => BindTarget::ArrayBuffer,
            BufferTarget::ElementArray => BindTarget::ElementArrayBuffer,
        }
    }
}

impl Buffer {
    /// Binds this buffer to `target`. Returns whether the driver was called.
    pub fn bind<B: ContextBackend + BindBackend>(
        &self,
        ctx: &mut RenderingContext<B>,
        target: BufferTarget,
    ) -> Result<bool, ContextError> {
        ctx.check_group(Self::KIND, self.group)?;
        ctx.bind(target.into(), Some(self.name))
    }

    /// Clears `target`.
    pub fn unbind<B: ContextBackend + BindBackend>(
        ctx: &mut RenderingContext<B>,
        target: BufferTarget,
    ) -> Result<bool, ContextError> {
        ctx.bind(target.into(), None)
    }
}

/// Framebuffer bind points. `Both` sets draw and read together.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramebufferTarget {
    Draw,
    Read,
    Both,
}

impl Framebuffer {
    pub fn bind<B: ContextBackend + BindBackend>(
        &self,
        ctx: &mut RenderingContext<B>,
        target: FramebufferTarget,
    ) -> Result<bool, ContextError> {
        ctx.check_group(Self::KIND, self.group)?;
        bind_framebuffer(ctx, target, Some(self.name))
    }

    /// Binds the surface's default framebuffer.
    pub fn bind_default<B: ContextBackend + BindBackend>(
        ctx: &mut RenderingContext<B>,
        target: FramebufferTarget,
    ) -> Result<bool, ContextError> {
        bind_framebuffer(ctx, target, None)
    }
}

fn bind_framebuffer<B: ContextBackend + BindBackend>(
    ctx: &mut RenderingContext<B>,
    target: FramebufferTarget,
    name: Option<ObjectName>,
) -> Result<bool, ContextError> {
    match target {
        FramebufferTarget::Draw => ctx.bind(BindTarget::DrawFramebuffer, name),
        FramebufferTarget::Read => ctx.bind(BindTarget::ReadFramebuffer, name),
        FramebufferTarget::Both => {
            let draw = ctx.bind(BindTarget::DrawFramebuffer, name)?;
            let read = ctx.bind(BindTarget::ReadFramebuffer, name)?;
            Ok(draw || read)
        }
    }
}

impl Program {
    /// Makes this the active program.
    pub fn bind<B: ContextBackend + BindBackend>(
        &self,
        ctx: &mut RenderingContext<B>,
    ) -> Result<bool, ContextError> {
        ctx.check_group(Self::KIND, self.group)?;
        ctx.bind(BindTarget::Program, Some(self.name))
    }

    pub fn unbind<B: ContextBackend + BindBackend>(
        ctx: &mut RenderingContext<B>,
    ) -> Result<bool, ContextError> {
        ctx.bind(BindTarget::Program, None)
    }
}

impl VertexArray {
    pub fn bind<B: ContextBackend + BindBackend>(
        &self,
        ctx: &mut RenderingContext<B>,
    ) -> Result<bool, ContextError> {
        ctx.check_group(Self::KIND, self.group)?;
        ctx.bind(BindTarget::VertexArray, Some(self.name))
    }

    pub fn unbind<B: ContextBackend + BindBackend>(
        ctx: &mut RenderingContext<B>,
    ) -> Result<bool, ContextError> {
        ctx.bind(BindTarget::VertexArray, None)
    }
}

/// A texture object. Its target is fixed when it is created.
#[derive(Debug, PartialEq, Eq)]
pub struct Texture {
    name: ObjectName,
    group: SharingGroupId,
    target: TextureTarget,
}

impl Texture {
    pub const KIND: ObjectKind = ObjectKind::Texture;

    pub fn create<B: ContextBackend + BindBackend>(
        ctx: &mut RenderingContext<B>,
        target: TextureTarget,
    ) -> Result<Self, ContextError> {
        let name = ctx.create_object(Self::KIND)?;
        Ok(Self {
            name,
            group: ctx.sharing_group_id(),
            target,
        })
    }

    pub fn from_raw(name: ObjectName, group: SharingGroupId, target: TextureTarget) -> Self {
        Self {
            name,
            group,
            target,
        }
    }

    pub fn name(&self) -> ObjectName {
        self.name
    }

    pub fn group(&self) -> SharingGroupId {
        self.group
    }

    pub fn target(&self) -> TextureTarget {
        self.target
    }

    /// Binds this texture on `unit`. Returns whether the texture bind
    /// reached the driver.
    pub fn bind<B: ContextBackend + BindBackend>(
        &self,
        ctx: &mut RenderingContext<B>,
        unit: u32,
    ) -> Result<bool, ContextError> {
        ctx.check_group(Self::KIND, self.group)?;
        ctx.bind_texture(unit, Some(self.name), self.target)
    }

    /// Clears `target` on `unit`.
    pub fn unbind<B: ContextBackend + BindBackend>(
        ctx: &mut RenderingContext<B>,
        unit: u32,
        target: TextureTarget,
    ) -> Result<bool, ContextError> {
        ctx.bind_texture(unit, None, target)
    }

    /// Deletes the texture. On error the driver object stays alive.
    pub fn delete<B: ContextBackend + BindBackend>(
        self,
        ctx: &mut RenderingContext<B>,
    ) -> Result<(), ContextError> {
        ctx.delete_object(Self::KIND, self.group, self.name)
    }
}
