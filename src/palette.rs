//! C64 color palettes and the packed pixel lookup table
//!
//! The video stream carries 4-bit palette indices, two per payload byte.
//! Expansion to RGBA goes through a 256-entry table indexed by the raw
//! payload byte: entry `b` holds the fully expanded colors for both nibbles,
//! so the hot decode loop does one table read per two output pixels.
//!
//! # Lookup entry layout
//!
//! ```text
//! bits 63..32: RGBA for the high nibble (right screen pixel)
//! bits 31..0:  RGBA for the low nibble  (left screen pixel)
//! ```
//!
//! Each 32-bit half is `R<<24 | G<<16 | B<<8 | 0xFF` (alpha always opaque).

use crate::error::{Error, Result};

/// Number of colors in a palette
pub const PALETTE_SIZE: usize = 16;

/// Expected length of a user palette string: 16 six-digit triples + 15 commas
pub const USER_PALETTE_LEN: usize = PALETTE_SIZE * 6 + 15;

/// Palette scheme selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PaletteScheme {
    /// Canonical C64 colors
    #[default]
    Pal,
    /// Colors measured off a CRT monitor, warmer and less faithful
    Crt,
    /// User-supplied colors
    User,
}

impl PaletteScheme {
    /// Next scheme in cycle order (for the runtime palette-cycle event)
    pub fn next(self) -> Self {
        match self {
            PaletteScheme::Pal => PaletteScheme::Crt,
            PaletteScheme::Crt => PaletteScheme::User,
            PaletteScheme::User => PaletteScheme::Pal,
        }
    }

    /// Parse a scheme name as used in the config file
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "pal" => Ok(PaletteScheme::Pal),
            "crt" => Ok(PaletteScheme::Crt),
            "user" => Ok(PaletteScheme::User),
            other => Err(Error::InvalidParameter(format!(
                "unknown palette scheme '{}'",
                other
            ))),
        }
    }
}

/// A 16-color palette as three parallel component arrays
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    pub red: [u8; PALETTE_SIZE],
    pub green: [u8; PALETTE_SIZE],
    pub blue: [u8; PALETTE_SIZE],
}

/// Canonical C64 colors
pub const PAL: Palette = Palette {
    red: [
        0x00, 0xff, 0x68, 0x70, 0x6f, 0x58, 0x35, 0xb8, 0x6f, 0x43, 0x9a, 0x44, 0x6c, 0x9a, 0x6c,
        0x95,
    ],
    green: [
        0x00, 0xff, 0x37, 0xa4, 0x3d, 0x8d, 0x28, 0xc7, 0x4f, 0x39, 0x67, 0x44, 0x6c, 0xd2, 0x5e,
        0x95,
    ],
    blue: [
        0x00, 0xff, 0x2b, 0xb2, 0x86, 0x43, 0x79, 0x6f, 0x25, 0x00, 0x59, 0x44, 0x6c, 0x84, 0xb5,
        0x95,
    ],
};

/// Colors photographed off a CRT, white-corrected and averaged
pub const CRT: Palette = Palette {
    red: [
        0x06, 0xf2, 0xb6, 0xa2, 0xaf, 0x86, 0x00, 0xf8, 0xd0, 0x79, 0xfb, 0x5e, 0xa3, 0xd1, 0x6e,
        0xdc,
    ],
    green: [
        0x0a, 0xf1, 0x3c, 0xf7, 0x45, 0xf9, 0x3a, 0xfe, 0x6e, 0x4e, 0x91, 0x6e, 0xb6, 0xfc, 0xb3,
        0xe2,
    ],
    blue: [
        0x0b, 0xf1, 0x47, 0xed, 0xd7, 0x64, 0xf2, 0x8a, 0x28, 0x00, 0x8f, 0x69, 0xad, 0xc5, 0xff,
        0xdb,
    ],
};

impl Palette {
    /// Parse a user palette string: exactly 16 RGB triples of 6 hex digits,
    /// comma-separated ("000000,ffffff,...", 111 characters total).
    ///
    /// All-or-nothing: any deviation in length, delimiter placement or hex
    /// digits fails with `InvalidFormat` and produces no palette.
    pub fn parse_user(text: &str) -> Result<Self> {
        if !text.is_ascii() {
            return Err(Error::InvalidFormat(
                "non-ASCII characters in palette string".to_string(),
            ));
        }
        if text.len() != USER_PALETTE_LEN {
            return Err(Error::InvalidFormat(format!(
                "expected {} characters, got {}",
                USER_PALETTE_LEN,
                text.len()
            )));
        }

        let mut palette = Palette {
            red: [0; PALETTE_SIZE],
            green: [0; PALETTE_SIZE],
            blue: [0; PALETTE_SIZE],
        };

        for (i, triple) in text.split(',').enumerate() {
            if i >= PALETTE_SIZE {
                return Err(Error::InvalidFormat("too many color triples".to_string()));
            }
            if triple.len() != 6 {
                return Err(Error::InvalidFormat(format!(
                    "triple {} has length {}, expected 6 hex digits",
                    i,
                    triple.len()
                )));
            }
            let component = |range: std::ops::Range<usize>| -> Result<u8> {
                let digits = &triple[range];
                // from_str_radix also accepts a sign, which the format does not
                if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
                    return Err(Error::InvalidFormat(format!(
                        "bad hex digits in triple {}",
                        i
                    )));
                }
                u8::from_str_radix(digits, 16)
                    .map_err(|_| Error::InvalidFormat(format!("bad hex digits in triple {}", i)))
            };
            palette.red[i] = component(0..2)?;
            palette.green[i] = component(2..4)?;
            palette.blue[i] = component(4..6)?;
        }

        Ok(palette)
    }

    /// Render the palette back to the user-palette string format
    pub fn format(&self) -> String {
        let mut out = String::with_capacity(USER_PALETTE_LEN);
        for i in 0..PALETTE_SIZE {
            if i > 0 {
                out.push(',');
            }
            out.push_str(&format!(
                "{:02x}{:02x}{:02x}",
                self.red[i], self.green[i], self.blue[i]
            ));
        }
        out
    }

    /// Expand one palette index to an opaque RGBA value (`R<<24|G<<16|B<<8|FF`)
    #[inline]
    pub fn rgba(&self, index: usize) -> u32 {
        ((self.red[index] as u32) << 24)
            | ((self.green[index] as u32) << 16)
            | ((self.blue[index] as u32) << 8)
            | 0xff
    }
}

/// The three selectable palettes as one explicit value.
///
/// Owned by the caller and passed into [`ColorTable::select`], so tests can
/// construct isolated instances instead of sharing globals.
#[derive(Debug, Clone)]
pub struct PaletteSet {
    pub pal: Palette,
    pub crt: Palette,
    pub user: Palette,
}

impl Default for PaletteSet {
    fn default() -> Self {
        Self {
            pal: PAL,
            crt: CRT,
            // Placeholder until the user provides one
            user: PAL,
        }
    }
}

impl PaletteSet {
    /// Get the palette for a scheme
    pub fn get(&self, scheme: PaletteScheme) -> &Palette {
        match scheme {
            PaletteScheme::Pal => &self.pal,
            PaletteScheme::Crt => &self.crt,
            PaletteScheme::User => &self.user,
        }
    }

    /// Replace the user palette
    pub fn set_user(&mut self, palette: Palette) {
        self.user = palette;
    }
}

/// Number of entries in the packed pixel lookup table (one per payload byte)
pub const LOOKUP_SIZE: usize = 0x100;

/// Precomputed payload-byte to pixel-pair lookup table.
///
/// Must be rebuilt whenever the active palette changes; [`select`] does both
/// the scheme switch and the rebuild.
///
/// [`select`]: ColorTable::select
pub struct ColorTable {
    scheme: PaletteScheme,
    lookup: [u64; LOOKUP_SIZE],
}

impl ColorTable {
    /// Build a table for the given scheme
    pub fn new(scheme: PaletteScheme, palettes: &PaletteSet) -> Self {
        let mut table = Self {
            scheme,
            lookup: [0; LOOKUP_SIZE],
        };
        table.rebuild(palettes);
        table
    }

    /// Switch scheme and deterministically rebuild the lookup table
    pub fn select(&mut self, scheme: PaletteScheme, palettes: &PaletteSet) {
        self.scheme = scheme;
        self.rebuild(palettes);
    }

    /// Currently selected scheme
    pub fn scheme(&self) -> PaletteScheme {
        self.scheme
    }

    fn rebuild(&mut self, palettes: &PaletteSet) {
        let palette = palettes.get(self.scheme);
        for b in 0..LOOKUP_SIZE {
            let high = palette.rgba(b >> 4) as u64;
            let low = palette.rgba(b & 0x0f) as u64;
            self.lookup[b] = (high << 32) | low;
        }
    }

    /// Packed pixel pair for one payload byte
    #[inline]
    pub fn entry(&self, byte: u8) -> u64 {
        self.lookup[byte as usize]
    }

    /// Left (low nibble) pixel of an entry
    #[inline]
    pub fn left_pixel(entry: u64) -> u32 {
        entry as u32
    }

    /// Right (high nibble) pixel of an entry
    #[inline]
    pub fn right_pixel(entry: u64) -> u32 {
        (entry >> 32) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_matches_independent_expansion() {
        let palettes = PaletteSet::default();
        let table = ColorTable::new(PaletteScheme::Pal, &palettes);
        let palette = palettes.get(PaletteScheme::Pal);

        for b in 0..=255u8 {
            let entry = table.entry(b);
            let left = ColorTable::left_pixel(entry);
            let right = ColorTable::right_pixel(entry);
            assert_eq!(left, palette.rgba((b & 0x0f) as usize), "byte {:02x}", b);
            assert_eq!(right, palette.rgba((b >> 4) as usize), "byte {:02x}", b);
            // Alpha forced opaque in both halves
            assert_eq!(left & 0xff, 0xff);
            assert_eq!(right & 0xff, 0xff);
        }
    }

    #[test]
    fn test_selection_is_idempotent() {
        let palettes = PaletteSet::default();
        let mut table = ColorTable::new(PaletteScheme::Crt, &palettes);
        let first: Vec<u64> = (0..=255u8).map(|b| table.entry(b)).collect();
        table.select(PaletteScheme::Crt, &palettes);
        let second: Vec<u64> = (0..=255u8).map(|b| table.entry(b)).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_select_switches_palette() {
        let palettes = PaletteSet::default();
        let mut table = ColorTable::new(PaletteScheme::Pal, &palettes);
        let pal_white = table.entry(0x11);
        table.select(PaletteScheme::Crt, &palettes);
        let crt_white = table.entry(0x11);
        assert_ne!(pal_white, crt_white);
        assert_eq!(table.scheme(), PaletteScheme::Crt);
    }

    #[test]
    fn test_parse_user_palette() {
        let mut text = String::from("0000ff");
        for _ in 0..15 {
            text.push_str(",112233");
        }
        assert_eq!(text.len(), USER_PALETTE_LEN);

        let palette = Palette::parse_user(&text).unwrap();
        assert_eq!(palette.red[0], 0x00);
        assert_eq!(palette.green[0], 0x00);
        assert_eq!(palette.blue[0], 0xff);
        assert_eq!(palette.red[15], 0x11);
        assert_eq!(palette.green[15], 0x22);
        assert_eq!(palette.blue[15], 0x33);
    }

    #[test]
    fn test_parse_user_palette_rejects_bad_length() {
        assert!(matches!(
            Palette::parse_user("0000ff"),
            Err(crate::error::Error::InvalidFormat(_))
        ));
        let long = "0".repeat(USER_PALETTE_LEN + 1);
        assert!(Palette::parse_user(&long).is_err());
    }

    #[test]
    fn test_parse_user_palette_rejects_misplaced_delimiter() {
        // Right length, but a comma shifted by one position
        let mut text = String::from("0000f,f");
        for _ in 0..14 {
            text.push_str(",112233");
        }
        text.push_str("112233");
        assert_eq!(text.len(), USER_PALETTE_LEN);
        assert!(Palette::parse_user(&text).is_err());
    }

    #[test]
    fn test_parse_user_palette_rejects_non_ascii() {
        // Correct byte length, but the first triple hides a two-byte char
        let mut text = String::from("0é234");
        assert_eq!(text.len(), 6);
        for _ in 0..15 {
            text.push_str(",112233");
        }
        assert_eq!(text.len(), USER_PALETTE_LEN);
        assert!(matches!(
            Palette::parse_user(&text),
            Err(Error::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_parse_user_palette_rejects_signed_components() {
        // from_str_radix would happily take these
        let mut text = String::from("+1+2+3");
        for _ in 0..15 {
            text.push_str(",112233");
        }
        assert_eq!(text.len(), USER_PALETTE_LEN);
        assert!(Palette::parse_user(&text).is_err());
    }

    #[test]
    fn test_parse_user_palette_rejects_non_hex() {
        let mut text = String::from("zz0000");
        for _ in 0..15 {
            text.push_str(",112233");
        }
        assert!(Palette::parse_user(&text).is_err());
    }

    #[test]
    fn test_parse_failure_leaves_previous_palette() {
        let mut palettes = PaletteSet::default();
        let before = palettes.user.clone();
        // Failed parse returns Err and the caller never calls set_user
        if let Ok(p) = Palette::parse_user("not a palette") {
            palettes.set_user(p);
        }
        assert_eq!(palettes.user, before);
    }

    #[test]
    fn test_format_round_trip() {
        let text = PAL.format();
        assert_eq!(text.len(), USER_PALETTE_LEN);
        let parsed = Palette::parse_user(&text).unwrap();
        assert_eq!(parsed, PAL);
    }

    #[test]
    fn test_scheme_cycle() {
        let mut scheme = PaletteScheme::Pal;
        scheme = scheme.next();
        assert_eq!(scheme, PaletteScheme::Crt);
        scheme = scheme.next();
        assert_eq!(scheme, PaletteScheme::User);
        scheme = scheme.next();
        assert_eq!(scheme, PaletteScheme::Pal);
    }
}
