//! [`BindBackend`] implementation issuing real GL calls through `glow`.
//!
//! `GlowBindings` wraps a loaded `glow::Context`. It does not create or
//! activate contexts; pair it with a windowing library's context provider
//! through [`SplitBackend`](crate::backend::SplitBackend).

use crate::backend::{BindBackend, ObjectKind, ObjectName};
use crate::cache::{BindTarget, TextureTarget, Viewport};

/// Bind-style GL calls over a loaded `glow::Context`.
pub struct GlowBindings {
    gl: glow::Context,
}

impl GlowBindings {
    /// Wraps a `glow::Context` whose function pointers are already loaded.
    pub fn new(gl: glow::Context) -> Self {
        Self { gl }
    }

    /// Returns the underlying `glow::Context`.
    pub fn gl(&self) -> &glow::Context {
        &self.gl
    }

    /// Consumes this wrapper and returns the underlying `glow::Context`.
    pub fn into_gl(self) -> glow::Context {
        self.gl
    }

    /// Returns whether the driver advertises `extension`.
    pub fn supports_extension(&self, extension: &str) -> bool {
        use glow::HasContext;

        self.gl.supported_extensions().contains(extension)
    }
}

fn buffer(name: Option<ObjectName>) -> Option<glow::NativeBuffer> {
    name.map(|n| glow::NativeBuffer(n.non_zero()))
}

fn framebuffer(name: Option<ObjectName>) -> Option<glow::NativeFramebuffer> {
    name.map(|n| glow::NativeFramebuffer(n.non_zero()))
}

fn program(name: Option<ObjectName>) -> Option<glow::NativeProgram> {
    name.map(|n| glow::NativeProgram(n.non_zero()))
}

fn vertex_array(name: Option<ObjectName>) -> Option<glow::NativeVertexArray> {
    name.map(|n| glow::NativeVertexArray(n.non_zero()))
}

fn texture(name: Option<ObjectName>) -> Option<glow::NativeTexture> {
    name.map(|n| glow::NativeTexture(n.non_zero()))
}

/// `GL_TEXTURE0 + unit`, or `None` past the end of the enum range.
fn texture_unit_enum(unit: u32) -> Option<u32> {
    glow::TEXTURE0.checked_add(unit)
}

/// Viewport as GL's signed `(x, y, width, height)`, clamping sizes that do
/// not fit in an `i32`.
fn viewport_rect(viewport: Viewport) -> (i32, i32, i32, i32) {
    let clamp = |v: u32| i32::try_from(v).unwrap_or(i32::MAX);
    (
        viewport.origin.x,
        viewport.origin.y,
        clamp(viewport.size.x),
        clamp(viewport.size.y),
    )
}

impl BindBackend for GlowBindings {
    #[allow(unsafe_code)]
    fn create_object(&self, kind: ObjectKind) -> Result<ObjectName, String> {
        use glow::HasContext;

        // SAFETY: the caller has verified that the owning context is current
        // on this thread; object creation takes no pointers.
        let raw = unsafe {
            match kind {
                ObjectKind::Buffer => self.gl.create_buffer()?.0,
                ObjectKind::Texture => self.gl.create_texture()?.0,
                ObjectKind::Framebuffer => self.gl.create_framebuffer()?.0,
                ObjectKind::Program => self.gl.create_program()?.0,
                ObjectKind::VertexArray => self.gl.create_vertex_array()?.0,
            }
        };
        Ok(ObjectName::new(raw))
    }

    #[allow(unsafe_code)]
    fn delete_object(&self, kind: ObjectKind, name: ObjectName) {
        use glow::HasContext;

        let raw = name.non_zero();
        // SAFETY: `name` was produced by `create_object` in this sharing
        // group and the owning context is current.
        unsafe {
            match kind {
                ObjectKind::Buffer => self.gl.delete_buffer(glow::NativeBuffer(raw)),
                ObjectKind::Texture => self.gl.delete_texture(glow::NativeTexture(raw)),
                ObjectKind::Framebuffer => {
                    self.gl.delete_framebuffer(glow::NativeFramebuffer(raw))
                }
                ObjectKind::Program => self.gl.delete_program(glow::NativeProgram(raw)),
                ObjectKind::VertexArray => {
                    self.gl.delete_vertex_array(glow::NativeVertexArray(raw))
                }
            }
        }
    }

    #[allow(unsafe_code)]
    fn bind(&self, target: BindTarget, name: Option<ObjectName>) {
        use glow::HasContext;

        // SAFETY: the owning context is current; names are valid or None.
        unsafe {
            match target {
                BindTarget::ArrayBuffer => self.gl.bind_buffer(glow::ARRAY_BUFFER, buffer(name)),
                BindTarget::ElementArrayBuffer => self
                    .gl
                    .bind_buffer(glow::ELEMENT_ARRAY_BUFFER, buffer(name)),
                BindTarget::DrawFramebuffer => self
                    .gl
                    .bind_framebuffer(glow::DRAW_FRAMEBUFFER, framebuffer(name)),
                BindTarget::ReadFramebuffer => self
                    .gl
                    .bind_framebuffer(glow::READ_FRAMEBUFFER, framebuffer(name)),
                BindTarget::Program => self.gl.use_program(program(name)),
                BindTarget::VertexArray => self.gl.bind_vertex_array(vertex_array(name)),
            }
        }
    }

    #[allow(unsafe_code)]
    fn active_texture(&self, unit: u32) {
        use glow::HasContext;

        let Some(texture_unit) = texture_unit_enum(unit) else {
            log::error!("texture unit {unit} is out of range; not selected");
            return;
        };
        // SAFETY: the owning context is current.
        unsafe { self.gl.active_texture(texture_unit) }
    }

    #[allow(unsafe_code)]
    fn bind_texture(&self, target: TextureTarget, name: Option<ObjectName>) {
        use glow::HasContext;

        // SAFETY: the owning context is current; the name is valid or None.
        unsafe { self.gl.bind_texture(target.to_gl(), texture(name)) }
    }

    #[allow(unsafe_code)]
    fn viewport(&self, viewport: Viewport) {
        use glow::HasContext;

        let (x, y, width, height) = viewport_rect(viewport);
        // SAFETY: the owning context is current.
        unsafe { self.gl.viewport(x, y, width, height) }
    }
}
