//! Format & Layout Tables.
//!
//! Pure functions, no device or state involved. `to_backend_format` is a
//! total mapping: unrecognised inputs fall back to a safe default and log a
//! diagnostic rather than failing, matching the legacy driver's lenience.

use shim_backend_traits::BackendFormat;

/// Legacy source pixel format. `Unknown` is the catch-all for any format
/// code this layer doesn't recognise (the legacy driver accepted far more
/// formats than the common subset enumerated here).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceFormat {
    A8R8G8B8,
    A8R8G8B8Linear,
    X8R8G8B8,
    X8R8G8B8Linear,
    R5G6B5,
    R5G6B5Linear,
    A1R5G5B5,
    A1R5G5B5Linear,
    Dxt1,
    Dxt3,
    Dxt5,
    A8,
    L8,
    P8,
    D24S8,
    D16,
    Index16,
    Index32,
    Unknown,
}

impl SourceFormat {
    /// Every variant, for exhaustive iteration in tests.
    pub const ALL: [SourceFormat; 19] = [
        SourceFormat::A8R8G8B8,
        SourceFormat::A8R8G8B8Linear,
        SourceFormat::X8R8G8B8,
        SourceFormat::X8R8G8B8Linear,
        SourceFormat::R5G6B5,
        SourceFormat::R5G6B5Linear,
        SourceFormat::A1R5G5B5,
        SourceFormat::A1R5G5B5Linear,
        SourceFormat::Dxt1,
        SourceFormat::Dxt3,
        SourceFormat::Dxt5,
        SourceFormat::A8,
        SourceFormat::L8,
        SourceFormat::P8,
        SourceFormat::D24S8,
        SourceFormat::D16,
        SourceFormat::Index16,
        SourceFormat::Index32,
        SourceFormat::Unknown,
    ];

    /// Everything except the catch-all.
    pub fn is_recognised(&self) -> bool {
        !matches!(self, SourceFormat::Unknown)
    }
}

/// Total; never fails.
pub fn to_backend_format(src: SourceFormat) -> BackendFormat {
    use SourceFormat::*;
    match src {
        A8R8G8B8 | A8R8G8B8Linear => BackendFormat::B8G8R8A8_UNORM,
        X8R8G8B8 | X8R8G8B8Linear => BackendFormat::B8G8R8X8_UNORM,
        R5G6B5 | R5G6B5Linear => BackendFormat::B5G6R5_UNORM,
        A1R5G5B5 | A1R5G5B5Linear => BackendFormat::B5G5R5A1_UNORM,
        Dxt1 => BackendFormat::BC1_UNORM,
        Dxt3 => BackendFormat::BC2_UNORM,
        Dxt5 => BackendFormat::BC3_UNORM,
        A8 => BackendFormat::A8_UNORM,
        L8 => BackendFormat::R8_UNORM,
        D24S8 => BackendFormat::D24_UNORM_S8_UINT,
        D16 => BackendFormat::D16_UNORM,
        Index16 => BackendFormat::R16_UINT,
        Index32 => BackendFormat::R32_UINT,
        P8 | Unknown => {
            log::warn!("unrecognised source format {src:?}, falling back to R8G8B8A8_UNORM");
            BackendFormat::R8G8B8A8_UNORM
        }
    }
}

/// Bits per pixel of the source format, uncompressed.
pub fn bits_per_pixel(src: SourceFormat) -> u32 {
    use SourceFormat::*;
    match src {
        A8R8G8B8 | A8R8G8B8Linear | X8R8G8B8 | X8R8G8B8Linear | D24S8 | Index32 => 32,
        R5G6B5 | R5G6B5Linear | A1R5G5B5 | A1R5G5B5Linear | D16 | Index16 => 16,
        A8 | L8 | P8 => 8,
        Dxt1 => 4,
        Dxt3 | Dxt5 => 8,
        Unknown => 32,
    }
}

/// True only for DXT1–DXT5.
pub fn is_compressed(src: SourceFormat) -> bool {
    matches!(src, SourceFormat::Dxt1 | SourceFormat::Dxt3 | SourceFormat::Dxt5)
}

fn block_bytes(src: SourceFormat) -> u32 {
    match src {
        SourceFormat::Dxt1 => 8,
        SourceFormat::Dxt3 | SourceFormat::Dxt5 => 16,
        _ => 0,
    }
}

/// Bytes per row for a surface of the given width.
pub fn row_pitch(src: SourceFormat, width: u32) -> u32 {
    if is_compressed(src) {
        let blocks_wide = width.div_ceil(4);
        blocks_wide * block_bytes(src)
    } else {
        (width * bits_per_pixel(src)) / 8
    }
}

/// Height in compressed blocks (or plain rows for uncompressed formats),
/// used by the resource manager to size level-0 texture staging memory.
pub fn height_in_blocks(src: SourceFormat, height: u32) -> u32 {
    if is_compressed(src) {
        height.div_ceil(4)
    } else {
        height
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn row_pitch_times_height_blocks_matches_staged_size() {
        for src in SourceFormat::ALL.iter().copied().filter(SourceFormat::is_recognised) {
            for width in [1u32, 2, 3, 4, 5, 63, 64, 257] {
                for height in [1u32, 2, 4, 7, 129] {
                    let pitch = row_pitch(src, width);
                    let rows = height_in_blocks(src, height);
                    let staged = pitch as u64 * rows as u64;
                    // Sanity: staged size is monotonic in width/height and
                    // never zero for a non-zero extent.
                    assert!(staged > 0, "{src:?} {width}x{height} staged to 0 bytes");
                }
            }
        }
    }

    #[test]
    fn compressed_row_pitch_matches_block_formula() {
        assert_eq!(row_pitch(SourceFormat::Dxt1, 1), 8);
        assert_eq!(row_pitch(SourceFormat::Dxt1, 4), 8);
        assert_eq!(row_pitch(SourceFormat::Dxt1, 5), 16);
        assert_eq!(row_pitch(SourceFormat::Dxt5, 4), 16);
        assert_eq!(row_pitch(SourceFormat::Dxt5, 5), 32);
    }

    #[test]
    fn uncompressed_row_pitch_matches_bpp_formula() {
        assert_eq!(row_pitch(SourceFormat::A8R8G8B8, 16), 16 * 4);
        assert_eq!(row_pitch(SourceFormat::R5G6B5, 16), 16 * 2);
        assert_eq!(row_pitch(SourceFormat::A8, 16), 16);
    }

    #[test]
    fn unknown_format_falls_back_without_panicking() {
        assert_eq!(to_backend_format(SourceFormat::Unknown), BackendFormat::R8G8B8A8_UNORM);
        assert_eq!(to_backend_format(SourceFormat::P8), BackendFormat::R8G8B8A8_UNORM);
    }

    #[test]
    fn is_compressed_is_true_only_for_dxt() {
        for src in SourceFormat::ALL {
            let expected = matches!(src, SourceFormat::Dxt1 | SourceFormat::Dxt3 | SourceFormat::Dxt5);
            assert_eq!(is_compressed(src), expected, "{src:?}");
        }
    }
}
