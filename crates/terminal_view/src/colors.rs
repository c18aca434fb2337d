//! Output palette.
//!
//! The 16 base colors follow the classic VGA-style table; the 256-color
//! extension adds a 6x6x6 cube and a 24-step grayscale ramp.

/// An opaque RGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// From `0xRRGGBB`.
    pub const fn from_hex(hex: u32) -> Self {
        Self {
            r: (hex >> 16) as u8,
            g: (hex >> 8) as u8,
            b: hex as u8,
        }
    }

    pub const fn to_hex(self) -> u32 {
        (self.r as u32) << 16 | (self.g as u32) << 8 | self.b as u32
    }

    pub const fn with_alpha(self, a: u8) -> Rgba {
        Rgba {
            r: self.r,
            g: self.g,
            b: self.b,
            a,
        }
    }
}

/// A color with alpha, used for fills.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    /// From `0xAARRGGBB`.
    pub const fn from_argb(argb: u32) -> Self {
        Self {
            a: (argb >> 24) as u8,
            r: (argb >> 16) as u8,
            g: (argb >> 8) as u8,
            b: argb as u8,
        }
    }

    pub const fn rgb(self) -> Rgb {
        Rgb::new(self.r, self.g, self.b)
    }
}

pub const DEFAULT_FOREGROUND: Rgb = Rgb::from_hex(0xFFFFFF);
pub const URL: Rgb = Rgb::from_hex(0x00AAFF);
pub const PROMPT: Rgb = Rgb::from_hex(0x4AF626);
pub const SUGGESTION: Rgb = Rgb::from_hex(0x666666);
pub const STATUS_TEXT: Rgb = Rgb::from_hex(0xAAAAAA);

pub const BACKGROUND: Rgba = Rgba::from_argb(0xFF000000);
pub const SELECTION: Rgba = Rgba::from_argb(0x80FFFFFF);
pub const STATUS_BACKGROUND: Rgba = Rgba::from_argb(0xFF202020);
pub const CURSOR: Rgba = Rgba::from_argb(0xFFFFFFFF);

/// Bracketed log-level tags.
pub mod keyword {
    use super::Rgb;

    pub const WARN: Rgb = Rgb::from_hex(0xFFA500);
    pub const ERROR: Rgb = Rgb::from_hex(0xFF0000);
    pub const INFO: Rgb = Rgb::from_hex(0x00FF00);
}

const STANDARD: [u32; 8] = [
    0x000000, 0xAA0000, 0x00AA00, 0xAA5500, 0x0000AA, 0xAA00AA, 0x00AAAA, 0xAAAAAA,
];

const BRIGHT: [u32; 8] = [
    0x555555, 0xFF5555, 0x55FF55, 0xFFFF55, 0x5555FF, 0xFF55FF, 0x55FFFF, 0xFFFFFF,
];

/// Step between adjacent levels of the color cube.
const CUBE_STEP: u8 = 51;

/// SGR 30-37 colors. Out-of-range indices fall back to the default foreground.
pub fn standard_color(index: u8) -> Rgb {
    STANDARD
        .get(index as usize)
        .map_or(DEFAULT_FOREGROUND, |&hex| Rgb::from_hex(hex))
}

/// SGR 90-97 colors.
pub fn bright_color(index: u8) -> Rgb {
    BRIGHT
        .get(index as usize)
        .map_or(DEFAULT_FOREGROUND, |&hex| Rgb::from_hex(hex))
}

/// Entry of the 256-color palette used by `38;5;N`.
pub fn indexed_color(index: u8) -> Rgb {
    match index {
        0..=7 => standard_color(index),
        8..=15 => bright_color(index - 8),
        16..=231 => {
            let i = index - 16;
            Rgb::new(
                i / 36 * CUBE_STEP,
                (i / 6) % 6 * CUBE_STEP,
                i % 6 * CUBE_STEP,
            )
        }
        232..=255 => {
            let level = 8 + (index - 232) * 10;
            Rgb::new(level, level, level)
        }
    }
}
