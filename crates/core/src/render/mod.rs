//! Real GL backend, available with the `render` feature.
//!
//! Only the bind half lives here: `glow` loads and calls GL functions but
//! does not own contexts. Context creation and activation come from the
//! windowing layer, combined with [`GlowBindings`] through
//! [`SplitBackend`](crate::backend::SplitBackend).
//!
//! Native targets only; WebGL object keys are not plain integers.

pub mod glow_bindings;

pub use glow_bindings::GlowBindings;
