use std::collections::BTreeMap;

use palette::{Hsl, IntoColor, LinSrgb, Mix, Srgb};
use serde::Serialize;

// ---------------------------------------------------------------------------
// Toolkit-independent colour
// ---------------------------------------------------------------------------

/// 8-bit sRGB triple carried by chart descriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Rgb(pub [u8; 3]);

impl Rgb {
    pub const GRAY: Rgb = Rgb([160, 160, 160]);
    pub const STEEL_BLUE: Rgb = Rgb([70, 130, 180]);

    fn from_srgb(c: Srgb) -> Self {
        let c: Srgb<u8> = c.into_format();
        Rgb([c.red, c.green, c.blue])
    }

    fn to_linear(self) -> LinSrgb {
        let [r, g, b] = self.0;
        Srgb::new(r, g, b).into_format::<f32>().into_linear()
    }
}

// ---------------------------------------------------------------------------
// Color palette generator
// ---------------------------------------------------------------------------

/// Generates `n` visually distinct colours using evenly spaced hues.
pub fn generate_palette(n: usize) -> Vec<Rgb> {
    (0..n)
        .map(|i| {
            let hue = (i as f32 / n as f32) * 360.0;
            let hsl = Hsl::new(hue, 0.75, 0.55);
            Rgb::from_srgb(hsl.into_color())
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Color mapping: group label → Rgb
// ---------------------------------------------------------------------------

/// Assigns each group label (usually a city) a distinct colour. Labels are
/// sorted first so a city keeps its colour whatever order rows arrive in.
#[derive(Debug, Clone)]
pub struct ColorMap {
    mapping: BTreeMap<String, Rgb>,
    default_color: Rgb,
}

impl ColorMap {
    pub fn new<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let labels: std::collections::BTreeSet<String> = labels.into_iter().map(Into::into).collect();
        let palette = generate_palette(labels.len());
        ColorMap {
            mapping: labels.into_iter().zip(palette).collect(),
            default_color: Rgb::GRAY,
        }
    }

    /// Look up the colour for a label; unknown labels are grey.
    pub fn color_for(&self, label: &str) -> Rgb {
        self.mapping.get(label).copied().unwrap_or(self.default_color)
    }
}

// ---------------------------------------------------------------------------
// Diverging scale for correlation heatmaps
// ---------------------------------------------------------------------------

const COOL: Rgb = Rgb([59, 76, 192]);
const NEUTRAL: Rgb = Rgb([221, 221, 221]);
const WARM: Rgb = Rgb([180, 4, 38]);

/// Blue → light grey → red for `value` in `-1.0..=1.0` (clamped),
/// interpolated in linear RGB.
pub fn diverging(value: f64) -> Rgb {
    let v = value.clamp(-1.0, 1.0) as f32;
    let (from, to, t) = if v < 0.0 {
        (NEUTRAL, COOL, -v)
    } else {
        (NEUTRAL, WARM, v)
    };
    let mixed = from.to_linear().mix(to.to_linear(), t);
    Rgb::from_srgb(Srgb::from_linear(mixed))
}
