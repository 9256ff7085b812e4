//! Color and color-space state (§3.3, §4.4 item "Graphics state").
//!
//! Grounded on `postforge/core/color_space.py`: the three device spaces plus
//! the generic `setcolor`/`currentcolor` entry points the rest of the
//! graphics-state machinery (and the font/glyph pipeline, for imagemask
//! glyphs) consume.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorSpace {
    DeviceGray,
    DeviceRGB,
    DeviceCMYK,
}

impl ColorSpace {
    pub fn num_components(self) -> usize {
        match self {
            ColorSpace::DeviceGray => 1,
            ColorSpace::DeviceRGB => 3,
            ColorSpace::DeviceCMYK => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub space: ColorSpace,
    pub components: [f64; 4],
}

impl Color {
    pub fn black() -> Self {
        Color { space: ColorSpace::DeviceGray, components: [0.0, 0.0, 0.0, 0.0] }
    }

    pub fn gray(g: f64) -> Self {
        Color { space: ColorSpace::DeviceGray, components: [g.clamp(0.0, 1.0), 0.0, 0.0, 0.0] }
    }

    pub fn rgb(r: f64, g: f64, b: f64) -> Self {
        Color {
            space: ColorSpace::DeviceRGB,
            components: [r.clamp(0.0, 1.0), g.clamp(0.0, 1.0), b.clamp(0.0, 1.0), 0.0],
        }
    }

    pub fn cmyk(c: f64, m: f64, y: f64, k: f64) -> Self {
        Color {
            space: ColorSpace::DeviceCMYK,
            components: [c.clamp(0.0, 1.0), m.clamp(0.0, 1.0), y.clamp(0.0, 1.0), k.clamp(0.0, 1.0)],
        }
    }

    /// Quantized to 3 decimals for the glyph-cache key (§4.6).
    pub fn quantized(&self) -> (i64, i64, i64, i64) {
        let q = |v: f64| (v * 1000.0).round() as i64;
        (q(self.components[0]), q(self.components[1]), q(self.components[2]), q(self.components[3]))
    }
}

impl Default for Color {
    fn default() -> Self {
        Color::black()
    }
}
