//! Client-side mirror of a context's bind state.
//!
//! Every slot remembers the last value written through this layer. A slot
//! may also be *unknown* after [`StateCache::invalidate`], in which case it
//! reads as the default value but never allows a bind to be elided. A fresh
//! cache matches a fresh driver context: nothing bound, texture unit 0
//! active, zero viewport.

use crate::backend::{ObjectKind, ObjectName};
use glam::{IVec2, UVec2};
use serde::{Deserialize, Serialize};

const GL_ARRAY_BUFFER: u32 = 0x8892;
const GL_ELEMENT_ARRAY_BUFFER: u32 = 0x8893;
const GL_READ_FRAMEBUFFER: u32 = 0x8CA8;
const GL_DRAW_FRAMEBUFFER: u32 = 0x8CA9;
const GL_CURRENT_PROGRAM: u32 = 0x8B8D;
const GL_VERTEX_ARRAY_BINDING: u32 = 0x85B5;

/// Scalar bind slots tracked per context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BindTarget {
    ArrayBuffer,
    ElementArrayBuffer,
    DrawFramebuffer,
    ReadFramebuffer,
    Program,
    VertexArray,
}

impl BindTarget {
    /// Number of scalar slots.
    pub const COUNT: usize = 6;

    /// All targets in slot order.
    pub const ALL: [BindTarget; Self::COUNT] = [
        BindTarget::ArrayBuffer,
        BindTarget::ElementArrayBuffer,
        BindTarget::DrawFramebuffer,
        BindTarget::ReadFramebuffer,
        BindTarget::Program,
        BindTarget::VertexArray,
    ];

    fn index(self) -> usize {
        self as usize
    }

    /// Kind of object that can occupy this slot.
    pub fn object_kind(self) -> ObjectKind {
        match self {
            BindTarget::ArrayBuffer | BindTarget::ElementArrayBuffer => ObjectKind::Buffer,
            BindTarget::DrawFramebuffer | BindTarget::ReadFramebuffer => ObjectKind::Framebuffer,
            BindTarget::Program => ObjectKind::Program,
            BindTarget::VertexArray => ObjectKind::VertexArray,
        }
    }

    /// Maps a GL enum onto a slot.
    ///
    /// Buffers and framebuffers use their bind target enums; program and
    /// vertex array use their binding query enums.
    pub fn from_gl(raw: u32) -> Option<Self> {
        match raw {
            GL_ARRAY_BUFFER => Some(BindTarget::ArrayBuffer),
            GL_ELEMENT_ARRAY_BUFFER => Some(BindTarget::ElementArrayBuffer),
            GL_DRAW_FRAMEBUFFER => Some(BindTarget::DrawFramebuffer),
            GL_READ_FRAMEBUFFER => Some(BindTarget::ReadFramebuffer),
            GL_CURRENT_PROGRAM => Some(BindTarget::Program),
            GL_VERTEX_ARRAY_BINDING => Some(BindTarget::VertexArray),
            _ => None,
        }
    }

    /// Inverse of [`BindTarget::from_gl`].
    pub fn to_gl(self) -> u32 {
        match self {
            BindTarget::ArrayBuffer => GL_ARRAY_BUFFER,
            BindTarget::ElementArrayBuffer => GL_ELEMENT_ARRAY_BUFFER,
            BindTarget::DrawFramebuffer => GL_DRAW_FRAMEBUFFER,
            BindTarget::ReadFramebuffer => GL_READ_FRAMEBUFFER,
            BindTarget::Program => GL_CURRENT_PROGRAM,
            BindTarget::VertexArray => GL_VERTEX_ARRAY_BINDING,
        }
    }
}

/// Texture bind targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TextureTarget {
    Texture1D,
    #[default]
    Texture2D,
    Texture3D,
    Texture2DArray,
    CubeMap,
    Texture2DMultisample,
}

impl TextureTarget {
    /// GL enum for this target.
    pub fn to_gl(self) -> u32 {
        match self {
            TextureTarget::Texture1D => 0x0DE0,
            TextureTarget::Texture2D => 0x0DE1,
            TextureTarget::Texture3D => 0x806F,
            TextureTarget::Texture2DArray => 0x8C1A,
            TextureTarget::CubeMap => 0x8513,
            TextureTarget::Texture2DMultisample => 0x9100,
        }
    }
}

/// Contents of one texture unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TextureBinding {
    pub texture: Option<ObjectName>,
    pub target: TextureTarget,
}

impl TextureBinding {
    pub fn new(texture: Option<ObjectName>, target: TextureTarget) -> Self {
        Self { texture, target }
    }

    /// Returns `true` if a texture is attached.
    pub fn is_bound(&self) -> bool {
        self.texture.is_some()
    }
}

/// Viewport rectangle in framebuffer pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Viewport {
    pub origin: IVec2,
    pub size: UVec2,
}

impl Viewport {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            origin: IVec2::new(x, y),
            size: UVec2::new(width, height),
        }
    }
}

/// A value that is either known or has been invalidated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Cached<T>(Option<T>);

impl<T: Copy + PartialEq + Default> Cached<T> {
    fn known(value: T) -> Self {
        Cached(Some(value))
    }

    fn value(&self) -> T {
        self.0.unwrap_or_default()
    }

    fn set(&mut self, value: T) {
        self.0 = Some(value);
    }

    fn invalidate(&mut self) {
        self.0 = None;
    }

    /// An unknown value never matches.
    fn matches(&self, value: &T) -> bool {
        self.0.as_ref() == Some(value)
    }
}

impl<T: Copy + PartialEq + Default> Default for Cached<T> {
    fn default() -> Self {
        Cached::known(T::default())
    }
}

/// Per-context record of the last known bind state.
///
/// Authoritative only while the owning context is current; see
/// [`RenderingContext::state`](crate::context::RenderingContext::state).
#[derive(Debug, Clone, Default)]
pub struct StateCache {
    slots: [Cached<Option<ObjectName>>; BindTarget::COUNT],
    textures: Vec<Cached<TextureBinding>>,
    /// Value given to units the table has not reached yet.
    texture_fill: Cached<TextureBinding>,
    active_texture_unit: Cached<u32>,
    viewport: Cached<Viewport>,
}

impl StateCache {
    /// Creates a cache describing a fresh context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Last object bound to `target`, or `None`.
    pub fn get_bound(&self, target: BindTarget) -> Option<ObjectName> {
        self.slots[target.index()].value()
    }

    /// Records that `name` is now bound to `target`.
    pub fn set_bound(&mut self, target: BindTarget, name: Option<ObjectName>) {
        self.slots[target.index()].set(name);
    }

    /// Returns `true` if `target` is known to hold exactly `name`.
    pub fn is_bound(&self, target: BindTarget, name: Option<ObjectName>) -> bool {
        self.slots[target.index()].matches(&name)
    }

    /// Forgets what `target` holds, so the next bind is always issued.
    pub fn invalidate(&mut self, target: BindTarget) {
        self.slots[target.index()].invalidate();
    }

    /// [`get_bound`](Self::get_bound) keyed by a raw GL enum.
    ///
    /// Unrecognised enums read as `None`.
    pub fn get_bound_raw(&self, raw_target: u32) -> Option<ObjectName> {
        match BindTarget::from_gl(raw_target) {
            Some(target) => self.get_bound(target),
            None => {
                log::debug!("get_bound: ignoring unknown bind target 0x{raw_target:04X}");
                None
            }
        }
    }

    /// [`set_bound`](Self::set_bound) keyed by a raw GL enum.
    ///
    /// Unrecognised enums are ignored.
    pub fn set_bound_raw(&mut self, raw_target: u32, name: Option<ObjectName>) {
        match BindTarget::from_gl(raw_target) {
            Some(target) => self.set_bound(target, name),
            None => log::debug!("set_bound: ignoring unknown bind target 0x{raw_target:04X}"),
        }
    }

    /// Contents of `unit`. Units past the end of the table read as unbound
    /// and do not grow it.
    pub fn get_bound_texture(&self, unit: u32) -> TextureBinding {
        self.textures
            .get(unit as usize)
            .map(Cached::value)
            .unwrap_or_default()
    }

    /// Records a texture binding on `unit`, growing the table if needed.
    pub fn set_bound_texture(
        &mut self,
        texture: Option<ObjectName>,
        unit: u32,
        target: TextureTarget,
    ) {
        self.grow_to(unit);
        self.textures[unit as usize].set(TextureBinding::new(texture, target));
    }

    /// Returns `true` if `unit` is known to hold `texture` on `target`.
    pub fn is_texture_bound(
        &self,
        unit: u32,
        texture: Option<ObjectName>,
        target: TextureTarget,
    ) -> bool {
        let wanted = TextureBinding::new(texture, target);
        match self.textures.get(unit as usize) {
            Some(entry) => entry.matches(&wanted),
            None => self.texture_fill.matches(&wanted),
        }
    }

    /// Number of texture units the table currently holds.
    pub fn texture_unit_count(&self) -> usize {
        self.textures.len()
    }

    /// Currently selected texture unit.
    pub fn get_active_texture_unit(&self) -> u32 {
        self.active_texture_unit.value()
    }

    /// Selects `unit`, growing the table through `unit + 1` entries.
    pub fn set_active_texture_unit(&mut self, unit: u32) {
        self.grow_to(unit);
        self.active_texture_unit.set(unit);
    }

    /// Returns `true` if `unit` is known to be the active unit.
    pub fn is_active_texture_unit(&self, unit: u32) -> bool {
        self.active_texture_unit.matches(&unit)
    }

    pub fn get_viewport(&self) -> Viewport {
        self.viewport.value()
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport.set(viewport);
    }

    /// Returns `true` if the viewport is known to equal `viewport`.
    pub fn is_viewport(&self, viewport: Viewport) -> bool {
        self.viewport.matches(&viewport)
    }

    /// Marks every slot unknown, including texture units not yet seen.
    ///
    /// Call after code outside this layer has touched the driver state.
    pub fn invalidate_all(&mut self) {
        self.slots.iter_mut().for_each(Cached::invalidate);
        self.textures.iter_mut().for_each(Cached::invalidate);
        self.texture_fill.invalidate();
        self.active_texture_unit.invalidate();
        self.viewport.invalidate();
    }

    /// Clears every slot that names a deleted object.
    ///
    /// Drivers unbind a deleted object from the current context, so the
    /// cache follows. Deleting a bound vertex array also makes the element
    /// array buffer binding unknown, since that binding lives in the vertex
    /// array.
    pub fn forget_object(&mut self, kind: ObjectKind, name: ObjectName) {
        if kind == ObjectKind::Texture {
            for entry in &mut self.textures {
                if entry.0.is_some_and(|b| b.texture == Some(name)) {
                    let target = entry.value().target;
                    entry.set(TextureBinding::new(None, target));
                }
            }
            return;
        }

        for target in BindTarget::ALL {
            if target.object_kind() != kind || !self.is_bound(target, Some(name)) {
                continue;
            }
            self.set_bound(target, None);
            if target == BindTarget::VertexArray {
                self.invalidate(BindTarget::ElementArrayBuffer);
            }
        }
    }

    /// Marks every slot naming `name` unknown.
    ///
    /// For objects deleted through another context of the sharing group:
    /// this context's driver state may still hold the orphaned object, and
    /// the name may come back for a new one, so neither "bound" nor "unbound"
    /// is safe to assume.
    pub fn invalidate_object(&mut self, kind: ObjectKind, name: ObjectName) {
        if kind == ObjectKind::Texture {
            for entry in &mut self.textures {
                if entry.0.is_some_and(|b| b.texture == Some(name)) {
                    entry.invalidate();
                }
            }
            return;
        }

        for target in BindTarget::ALL {
            if target.object_kind() != kind || !self.is_bound(target, Some(name)) {
                continue;
            }
            self.invalidate(target);
            if target == BindTarget::VertexArray {
                self.invalidate(BindTarget::ElementArrayBuffer);
            }
        }
    }

    fn grow_to(&mut self, unit: u32) {
        let needed = unit as usize + 1;
        if self.textures.len() < needed {
            self.textures.resize(needed, self.texture_fill);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(raw: u32) -> Option<ObjectName> {
        ObjectName::from_raw(raw)
    }

    #[test]
    fn fresh_cache_reports_nothing_bound() {
        let cache = StateCache::new();
        for target in BindTarget::ALL {
            assert_eq!(cache.get_bound(target), None, "{target:?} should start unbound");
            assert!(cache.is_bound(target, None), "{target:?} unbound state should be known");
        }
        assert_eq!(cache.get_active_texture_unit(), 0);
        assert_eq!(cache.get_viewport(), Viewport::default());
        assert_eq!(cache.texture_unit_count(), 0);
    }

    #[test]
    fn set_bound_is_per_target() {
        let mut cache = StateCache::new();
        cache.set_bound(BindTarget::ArrayBuffer, name(4));
        cache.set_bound(BindTarget::Program, name(9));

        assert_eq!(cache.get_bound(BindTarget::ArrayBuffer), name(4));
        assert_eq!(cache.get_bound(BindTarget::Program), name(9));
        assert_eq!(cache.get_bound(BindTarget::ElementArrayBuffer), None);
        assert!(cache.is_bound(BindTarget::ArrayBuffer, name(4)));
        assert!(!cache.is_bound(BindTarget::ArrayBuffer, name(5)));
    }

    #[test]
    fn set_bound_texture_default_fills_lower_units() {
        let mut cache = StateCache::new();
        cache.set_bound_texture(name(11), 5, TextureTarget::CubeMap);

        assert_eq!(cache.texture_unit_count(), 6);
        for unit in 0..5 {
            assert_eq!(
                cache.get_bound_texture(unit),
                TextureBinding::default(),
                "unit {unit} should be default-filled"
            );
        }
        assert_eq!(
            cache.get_bound_texture(5),
            TextureBinding::new(name(11), TextureTarget::CubeMap)
        );
    }

    #[test]
    fn get_bound_texture_past_the_end_does_not_grow() {
        let mut cache = StateCache::new();
        cache.set_bound_texture(name(1), 1, TextureTarget::Texture2D);
        assert_eq!(cache.get_bound_texture(40), TextureBinding::default());
        assert_eq!(cache.texture_unit_count(), 2, "probing must not allocate");
    }

    #[test]
    fn selecting_a_texture_unit_grows_the_table() {
        let mut cache = StateCache::new();
        cache.set_active_texture_unit(3);
        assert_eq!(cache.get_active_texture_unit(), 3);
        assert_eq!(cache.texture_unit_count(), 4);
    }

    #[test]
    fn table_never_shrinks() {
        let mut cache = StateCache::new();
        cache.set_active_texture_unit(7);
        cache.set_active_texture_unit(1);
        cache.set_bound_texture(name(2), 0, TextureTarget::Texture2D);
        assert_eq!(cache.texture_unit_count(), 8);
    }

    #[test]
    fn viewport_round_trips_without_growth() {
        let mut cache = StateCache::new();
        let vp = Viewport::new(10, -4, 640, 480);
        cache.set_viewport(vp);
        assert_eq!(cache.get_viewport(), vp);
        assert!(cache.is_viewport(vp));
        assert_eq!(cache.texture_unit_count(), 0);
    }

    #[test]
    fn raw_targets_map_onto_slots() {
        let mut cache = StateCache::new();
        cache.set_bound_raw(0x8892, name(6));
        assert_eq!(cache.get_bound(BindTarget::ArrayBuffer), name(6));
        assert_eq!(cache.get_bound_raw(0x8892), name(6));
    }

    #[test]
    fn unknown_raw_targets_are_ignored() {
        let mut cache = StateCache::new();
        cache.set_bound_raw(0xDEAD, name(6));
        assert_eq!(cache.get_bound_raw(0xDEAD), None);
        for target in BindTarget::ALL {
            assert_eq!(cache.get_bound(target), None, "{target:?} was modified");
        }
    }

    #[test]
    fn bind_target_gl_enums_round_trip() {
        for target in BindTarget::ALL {
            assert_eq!(BindTarget::from_gl(target.to_gl()), Some(target));
        }
    }

    #[test]
    fn invalidated_slot_reads_default_but_never_matches() {
        let mut cache = StateCache::new();
        cache.set_bound(BindTarget::VertexArray, name(3));
        cache.invalidate(BindTarget::VertexArray);

        assert_eq!(cache.get_bound(BindTarget::VertexArray), None);
        assert!(!cache.is_bound(BindTarget::VertexArray, None));
        assert!(!cache.is_bound(BindTarget::VertexArray, name(3)));
    }

    #[test]
    fn invalidate_all_covers_units_not_yet_seen() {
        let mut cache = StateCache::new();
        cache.set_bound_texture(name(1), 0, TextureTarget::Texture2D);
        cache.invalidate_all();

        assert!(!cache.is_texture_bound(0, name(1), TextureTarget::Texture2D));
        assert!(!cache.is_texture_bound(9, None, TextureTarget::Texture2D));
        assert!(!cache.is_active_texture_unit(0));
        assert!(!cache.is_viewport(Viewport::default()));

        cache.set_active_texture_unit(4);
        assert!(
            !cache.is_texture_bound(4, None, TextureTarget::Texture2D),
            "units grown after invalidation must stay unknown"
        );
    }

    #[test]
    fn forget_object_clears_matching_buffer_slots_only() {
        let mut cache = StateCache::new();
        cache.set_bound(BindTarget::ArrayBuffer, name(5));
        cache.set_bound(BindTarget::ElementArrayBuffer, name(5));
        cache.set_bound(BindTarget::Program, name(5));

        cache.forget_object(ObjectKind::Buffer, name(5).unwrap());

        assert_eq!(cache.get_bound(BindTarget::ArrayBuffer), None);
        assert_eq!(cache.get_bound(BindTarget::ElementArrayBuffer), None);
        assert_eq!(
            cache.get_bound(BindTarget::Program),
            name(5),
            "program 5 is a different object than buffer 5"
        );
    }

    #[test]
    fn forget_vertex_array_invalidates_element_buffer() {
        let mut cache = StateCache::new();
        cache.set_bound(BindTarget::VertexArray, name(2));
        cache.set_bound(BindTarget::ElementArrayBuffer, name(8));

        cache.forget_object(ObjectKind::VertexArray, name(2).unwrap());

        assert!(cache.is_bound(BindTarget::VertexArray, None));
        assert!(!cache.is_bound(BindTarget::ElementArrayBuffer, name(8)));
    }

    #[test]
    fn forget_texture_keeps_unit_target() {
        let mut cache = StateCache::new();
        cache.set_bound_texture(name(4), 2, TextureTarget::Texture3D);
        cache.forget_object(ObjectKind::Texture, name(4).unwrap());
        assert_eq!(
            cache.get_bound_texture(2),
            TextureBinding::new(None, TextureTarget::Texture3D)
        );
    }

    #[test]
    fn invalidated_object_slots_never_elide() {
        let mut cache = StateCache::new();
        cache.set_bound(BindTarget::ArrayBuffer, name(5));
        cache.set_bound(BindTarget::Program, name(5));
        cache.set_bound_texture(name(5), 1, TextureTarget::Texture2D);

        cache.invalidate_object(ObjectKind::Buffer, name(5).unwrap());
        cache.invalidate_object(ObjectKind::Texture, name(5).unwrap());

        assert!(!cache.is_bound(BindTarget::ArrayBuffer, name(5)));
        assert!(
            !cache.is_bound(BindTarget::ArrayBuffer, None),
            "an orphaned binding is neither bound nor unbound"
        );
        assert!(!cache.is_texture_bound(1, name(5), TextureTarget::Texture2D));
        assert!(!cache.is_texture_bound(1, None, TextureTarget::Texture2D));
        assert!(cache.is_bound(BindTarget::Program, name(5)));
    }

    // -- Property-based tests --

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        /// Strategy for texture units (kept small so tables stay cheap).
        fn unit() -> impl Strategy<Value = u32> {
            0_u32..64
        }

        fn object() -> impl Strategy<Value = Option<ObjectName>> {
            (0_u32..16).prop_map(ObjectName::from_raw)
        }

        fn texture_target() -> impl Strategy<Value = TextureTarget> {
            prop_oneof![
                Just(TextureTarget::Texture1D),
                Just(TextureTarget::Texture2D),
                Just(TextureTarget::Texture3D),
                Just(TextureTarget::Texture2DArray),
                Just(TextureTarget::CubeMap),
                Just(TextureTarget::Texture2DMultisample),
            ]
        }

        proptest! {
            #[test]
            fn texture_table_length_is_max_touched_unit_plus_one(
                writes in prop::collection::vec((object(), unit(), texture_target()), 1..32),
            ) {
                let mut cache = StateCache::new();
                for &(tex, unit, target) in &writes {
                    cache.set_bound_texture(tex, unit, target);
                }
                let max_unit = writes.iter().map(|w| w.1).max().unwrap();
                prop_assert_eq!(cache.texture_unit_count(), max_unit as usize + 1);
            }

            #[test]
            fn last_texture_write_per_unit_wins(
                writes in prop::collection::vec((object(), unit(), texture_target()), 1..32),
                probe in unit(),
            ) {
                let mut cache = StateCache::new();
                for &(tex, unit, target) in &writes {
                    cache.set_bound_texture(tex, unit, target);
                }
                let expected = writes
                    .iter()
                    .rev()
                    .find(|w| w.1 == probe)
                    .map(|&(tex, _, target)| TextureBinding::new(tex, target))
                    .unwrap_or_default();
                prop_assert_eq!(cache.get_bound_texture(probe), expected);
            }

            #[test]
            fn probing_never_changes_table_length(
                selected in unit(),
                probes in prop::collection::vec(0_u32..10_000, 0..16),
            ) {
                let mut cache = StateCache::new();
                cache.set_active_texture_unit(selected);
                let before = cache.texture_unit_count();
                for probe in probes {
                    let _ = cache.get_bound_texture(probe);
                    let _ = cache.is_texture_bound(probe, None, TextureTarget::Texture2D);
                }
                prop_assert_eq!(cache.texture_unit_count(), before);
            }

            #[test]
            fn scalar_writes_do_not_leak_across_targets(
                target_idx in 0_usize..BindTarget::COUNT,
                tex in object(),
            ) {
                let mut cache = StateCache::new();
                let target = BindTarget::ALL[target_idx];
                cache.set_bound(target, tex);
                for other in BindTarget::ALL {
                    let expected = if other == target { tex } else { None };
                    prop_assert_eq!(cache.get_bound(other), expected);
                }
            }
        }
    }
}
