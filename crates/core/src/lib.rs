#![deny(unsafe_code)]
//! Rendering-context identity and client-side bind-state caching.
//!
//! Provides `RenderingContext` (identity, sharing groups, make-current with
//! a per-thread fast path), the `ContextRegistry`, the per-context
//! `StateCache`, typed GPU object wrappers whose binds skip redundant driver
//! calls, the `ContextBackend`/`BindBackend` driver traits, and an in-memory
//! `HeadlessBackend` for tests and diagnostics.

pub mod backend;
pub mod cache;
pub mod context;
pub mod error;
pub mod headless;
pub mod identity;
pub mod registry;
pub mod resource;
pub mod sharing;
pub mod surface;
mod thread_slots;

#[cfg(all(feature = "render", not(target_arch = "wasm32")))]
pub mod render;

pub use backend::{BindBackend, ContextBackend, ObjectKind, ObjectName, SplitBackend};
pub use cache::{BindTarget, StateCache, TextureBinding, TextureTarget, Viewport};
pub use context::{BindStats, Platform, RenderingContext};
pub use error::ContextError;
pub use headless::{DriverCall, DriverStats, HeadlessBackend, HeadlessSurface};
pub use identity::{AtomicIdentityGenerator, ContextId, IdentityGenerator, SharingGroupId, SurfaceId};
pub use registry::{ContextRegistry, CurrentBinding};
pub use resource::{Buffer, BufferTarget, Framebuffer, FramebufferTarget, Program, Texture, VertexArray};
pub use sharing::SharingGroup;
pub use surface::{PixelFormat, Surface, SurfaceDescriptor};
