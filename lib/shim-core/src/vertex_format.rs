//! Legacy "FVF" vertex-format bitfield.

use bitflags::bitflags;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct VertexFormatFlags: u32 {
        const XYZ      = 0x002;
        const XYZRHW   = 0x004;
        const NORMAL   = 0x010;
        const DIFFUSE  = 0x040;
        const SPECULAR = 0x080;
        const TEX_COUNT_MASK = 0xF00;
    }
}

impl VertexFormatFlags {
    /// Number of texture coordinate sets encoded in bits 8–11.
    pub fn texture_count(self) -> u32 {
        (self.bits() & Self::TEX_COUNT_MASK.bits()) >> 8
    }

    pub fn has_position(self) -> bool {
        self.contains(Self::XYZ) || self.contains(Self::XYZRHW)
    }

    pub fn is_pretransformed(self) -> bool {
        self.contains(Self::XYZRHW)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn texture_count_reads_bits_8_to_11() {
        assert_eq!(VertexFormatFlags::from_bits_truncate(0x000).texture_count(), 0);
        assert_eq!(VertexFormatFlags::from_bits_truncate(0x100).texture_count(), 1);
        assert_eq!(VertexFormatFlags::from_bits_truncate(0x200).texture_count(), 2);
        assert_eq!(VertexFormatFlags::from_bits_truncate(0xF00).texture_count(), 15);
    }

    #[test]
    fn pretransformed_flag_wins_over_xyz() {
        let fvf = VertexFormatFlags::XYZ | VertexFormatFlags::XYZRHW;
        assert!(fvf.is_pretransformed());
        assert!(fvf.has_position());
    }
}
