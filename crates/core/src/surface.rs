//! Surface descriptions consumed from the window/surface provider.
//!
//! This layer never creates windows. It only needs a stable identity for
//! each surface and the pixel format a compatible context must use.

use crate::error::ContextError;
use crate::identity::SurfaceId;
use serde::{Deserialize, Serialize};

/// Names of the built-in pixel format presets, in listing order.
const PRESET_NAMES: &[&str] = &["rgba8", "rgba8-d24s8", "rgba16f", "msaa4"];

/// Pixel layout of a surface's default framebuffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct PixelFormat {
    /// Bits per colour channel.
    pub color_bits: u8,
    /// Alpha channel bits.
    pub alpha_bits: u8,
    /// Depth buffer bits (0 for none).
    pub depth_bits: u8,
    /// Stencil buffer bits (0 for none).
    pub stencil_bits: u8,
    /// MSAA sample count (1 for single-sampled).
    pub samples: u8,
    /// Whether the default framebuffer is sRGB-encoded.
    pub srgb: bool,
    /// Whether colour channels hold half floats.
    pub float_color: bool,
}

impl Default for PixelFormat {
    fn default() -> Self {
        Self::rgba8()
    }
}

impl PixelFormat {
    /// 8-bit RGBA, no depth or stencil.
    pub fn rgba8() -> Self {
        Self {
            color_bits: 8,
            alpha_bits: 8,
            depth_bits: 0,
            stencil_bits: 0,
            samples: 1,
            srgb: false,
            float_color: false,
        }
    }

    /// 8-bit RGBA with a 24-bit depth and 8-bit stencil buffer.
    pub fn rgba8_depth_stencil() -> Self {
        Self {
            depth_bits: 24,
            stencil_bits: 8,
            ..Self::rgba8()
        }
    }

    /// Half-float RGBA for HDR output.
    pub fn rgba16f() -> Self {
        Self {
            color_bits: 16,
            alpha_bits: 16,
            float_color: true,
            ..Self::rgba8()
        }
    }

    /// 4x multisampled RGBA8 with depth and stencil.
    pub fn msaa4() -> Self {
        Self {
            samples: 4,
            ..Self::rgba8_depth_stencil()
        }
    }

    /// Looks up a preset by name.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::InvalidFormat`] for unknown names.
    pub fn from_name(name: &str) -> Result<Self, ContextError> {
        match name {
            "rgba8" => Ok(Self::rgba8()),
            "rgba8-d24s8" => Ok(Self::rgba8_depth_stencil()),
            "rgba16f" => Ok(Self::rgba16f()),
            "msaa4" => Ok(Self::msaa4()),
            _ => Err(ContextError::InvalidFormat(format!(
                "unknown preset '{name}' (expected one of: {})",
                PRESET_NAMES.join(", ")
            ))),
        }
    }

    /// Returns the names accepted by [`PixelFormat::from_name`].
    pub fn list_names() -> &'static [&'static str] {
        PRESET_NAMES
    }

    /// Parses a format from JSON. Missing fields take their `rgba8` values.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::InvalidFormat`] if the JSON is malformed or
    /// the resulting format fails [`PixelFormat::validate`].
    pub fn from_json(json: &str) -> Result<Self, ContextError> {
        let format: Self =
            serde_json::from_str(json).map_err(|e| ContextError::InvalidFormat(e.to_string()))?;
        format.validate()?;
        Ok(format)
    }

    /// Checks that the format describes something a driver could provide.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::InvalidFormat`] when colour bits are zero or
    /// the sample count is not a power of two in `1..=32`.
    pub fn validate(&self) -> Result<(), ContextError> {
        if self.color_bits == 0 {
            return Err(ContextError::InvalidFormat(
                "color_bits must be non-zero".to_string(),
            ));
        }
        if self.samples == 0 || self.samples > 32 || !self.samples.is_power_of_two() {
            return Err(ContextError::InvalidFormat(format!(
                "sample count {} is not a power of two in 1..=32",
                self.samples
            )));
        }
        if self.float_color && self.color_bits != 16 && self.color_bits != 32 {
            return Err(ContextError::InvalidFormat(format!(
                "float colour needs 16 or 32 bits per channel, got {}",
                self.color_bits
            )));
        }
        Ok(())
    }
}

/// What a native context primitive needs to know about a surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurfaceDescriptor {
    pub id: SurfaceId,
    pub format: PixelFormat,
}

/// A window or off-screen surface a context can render into.
pub trait Surface {
    /// Stable identity, unique among live surfaces.
    fn surface_id(&self) -> SurfaceId;

    /// Pixel format of the surface's default framebuffer.
    fn pixel_format(&self) -> PixelFormat;

    /// Bundles identity and format for the driver.
    fn descriptor(&self) -> SurfaceDescriptor {
        SurfaceDescriptor {
            id: self.surface_id(),
            format: self.pixel_format(),
        }
    }
}

impl Surface for SurfaceDescriptor {
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

    #[test]
    fn every_listed_preset_resolves_and_validates() {
        for name in PixelFormat::list_names() {
            let format = PixelFormat::from_name(name)
                .unwrap_or_else(|e| panic!("preset {name} failed to resolve: {e}"));
            assert!(format.validate().is_ok(), "preset {name} failed validation");
        }
    }

    #[test]
    fn unknown_preset_lists_alternatives() {
        let err = PixelFormat::from_name("rgb565").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("rgb565"), "missing name in: {msg}");
        assert!(msg.contains("rgba8"), "missing alternatives in: {msg}");
    }

    #[test]
    fn from_json_fills_missing_fields_from_rgba8() {
        let format = PixelFormat::from_json(r#"{"depth_bits": 24}"#).unwrap();
        assert_eq!(format.depth_bits, 24);
        assert_eq!(format.color_bits, 8);
        assert_eq!(format.samples, 1);
    }

    #[test]
    fn from_json_rejects_malformed_input() {
        let err = PixelFormat::from_json("{not json").unwrap_err();
        assert!(matches!(err, ContextError::InvalidFormat(_)));
    }

    #[test]
    fn validate_rejects_zero_color_bits() {
        let format = PixelFormat {
            color_bits: 0,
            ..PixelFormat::rgba8()
        };
        assert!(format.validate().is_err());
    }

    #[test]
    fn validate_rejects_odd_sample_counts() {
        for samples in [0, 3, 6, 64] {
            let format = PixelFormat {
                samples,
                ..PixelFormat::rgba8()
            };
            assert!(
                format.validate().is_err(),
                "sample count {samples} should be rejected"
            );
        }
    }

    #[test]
    fn validate_rejects_eight_bit_float_color() {
        let format = PixelFormat {
            float_color: true,
            ..PixelFormat::rgba8()
        };
        assert!(format.validate().is_err());
    }

    #[test]
    fn descriptor_reports_identity_and_format() {
        let desc = SurfaceDescriptor {
            id: SurfaceId::new(9),
            format: PixelFormat::msaa4(),
        };
        assert_eq!(desc.descriptor(), desc);
        assert_eq!(desc.surface_id(), SurfaceId::new(9));
        assert_eq!(desc.pixel_format().samples, 4);
    }
}
