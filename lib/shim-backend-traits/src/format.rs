/// Backend pixel format, the authoritative target set that legacy source
/// formats get mapped onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(non_camel_case_types)]
pub enum BackendFormat {
    B8G8R8A8_UNORM,
    B8G8R8X8_UNORM,
    B5G6R5_UNORM,
    B5G5R5A1_UNORM,
    BC1_UNORM,
    BC2_UNORM,
    BC3_UNORM,
    A8_UNORM,
    R8_UNORM,
    D24_UNORM_S8_UINT,
    D16_UNORM,
    R16_UINT,
    R32_UINT,
    R8G8B8A8_UNORM,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexFormat {
    U16,
    U32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveTopology {
    PointList,
    LineList,
    LineStrip,
    TriangleList,
    TriangleStrip,
}

/// Backend format of a single synthesized input-layout element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(non_camel_case_types)]
pub enum VertexElementFormat {
    R32G32B32A32_FLOAT,
    R32G32B32_FLOAT,
    R32G32_FLOAT,
    B8G8R8A8_UNORM,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputSemantic {
    Position,
    Normal,
    Color,
    TexCoord(u8),
}

#[derive(Debug, Clone, Copy)]
pub struct InputElement {
    pub semantic: InputSemantic,
    pub format: VertexElementFormat,
    pub offset: u32,
    pub slot: u32,
}
