//! Contract between the fixed-function translation engine and whatever
//! backs a D3D11-class immediate context.
//!
//! Construction of a concrete backend (the real device, swap chain, window)
//! is out of scope for this workspace; this crate only pins down the shape
//! of the handles and operations the engine drives. A backend implementor
//! picks its own representation for each associated handle type.

mod descriptors;
mod format;
mod state;

pub use descriptors::*;
pub use format::*;
pub use state::*;

use std::fmt::Debug;

/// Errors a backend can surface back through the trait boundary.
///
/// This is intentionally thin: the translation engine folds these into its
/// own [`ShimError::Backend`](https://docs.rs/shim-core) variant rather than
/// matching on backend specifics.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("backend resource creation failed: {0}")]
    CreateFailed(String),
    #[error("backend operation failed: {0}")]
    OperationFailed(String),
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Usage hint for a buffer or texture allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceUsage {
    /// GPU read/write, no CPU access outside of `update_subresource`.
    Default,
    /// CPU-writable every frame (the common case for streamed vertex data).
    Dynamic,
    /// Set once at creation, never updated.
    Immutable,
}

/// Description of a 2D texture to create. Only level 0 is ever staged on the
/// CPU side by the resource manager.
#[derive(Debug, Clone)]
pub struct Texture2DDesc {
    pub width: u32,
    pub height: u32,
    pub mip_levels: u32,
    pub format: BackendFormat,
    pub usage: ResourceUsage,
}

/// The operations the fixed-function translation engine needs from a
/// D3D11-class immediate context. Method names follow the D3D11 stage
/// prefixes (`ia_`/`vs_`/`ps_`/`om_`/`rs_`), grouping methods by pipeline
/// stage.
pub trait BackendDevice: Debug {
    type Buffer: Debug + Clone;
    type Texture2D: Debug + Clone;
    type ShaderResourceView: Debug + Clone;
    type BlendState: Debug + Clone;
    type DepthStencilState: Debug + Clone;
    type RasterizerState: Debug + Clone;
    type SamplerState: Debug + Clone;
    type InputLayout: Debug + Clone;
    type VertexShader: Debug + Clone;
    type PixelShader: Debug + Clone;

    // -- resource creation --------------------------------------------
    fn create_vertex_buffer(&self, size: u32, usage: ResourceUsage) -> BackendResult<Self::Buffer>;
    fn create_index_buffer(&self, size: u32, usage: ResourceUsage) -> BackendResult<Self::Buffer>;
    fn create_constant_buffer(&self, size: u32) -> BackendResult<Self::Buffer>;
    fn create_texture2d(
        &self,
        desc: &Texture2DDesc,
    ) -> BackendResult<(Self::Texture2D, Self::ShaderResourceView)>;

    // -- CPU upload ------------------------------------------------------
    /// Full-resource upload, mirroring `update_subresource` for buffers.
    fn update_buffer(&self, buffer: &Self::Buffer, data: &[u8]) -> BackendResult<()>;
    /// Upload into mip level 0 of a texture.
    fn update_texture_level0(
        &self,
        texture: &Self::Texture2D,
        data: &[u8],
        row_pitch: u32,
        slice_pitch: u32,
    ) -> BackendResult<()>;
    /// Maps a constant buffer for a discard-write, returning a CPU pointer
    /// valid for `size` bytes. The engine writes through it and calls
    /// [`unmap`](Self::unmap).
    fn map_discard(&self, buffer: &Self::Buffer, size: u32) -> BackendResult<*mut u8>;
    fn unmap(&self, buffer: &Self::Buffer);

    // -- state object creation -------------------------------------------
    fn create_blend_state(&self, desc: &BlendStateDesc) -> BackendResult<Self::BlendState>;
    fn create_depth_stencil_state(
        &self,
        desc: &DepthStencilStateDesc,
    ) -> BackendResult<Self::DepthStencilState>;
    fn create_rasterizer_state(
        &self,
        desc: &RasterizerStateDesc,
    ) -> BackendResult<Self::RasterizerState>;
    fn create_sampler_state(&self, desc: &SamplerStateDesc) -> BackendResult<Self::SamplerState>;
    fn create_input_layout(
        &self,
        elements: &[InputElement],
        vertex_shader: &Self::VertexShader,
    ) -> BackendResult<Self::InputLayout>;

    // -- static shaders, created once ------------------------------------
    fn create_vertex_shader(&self) -> BackendResult<Self::VertexShader>;
    fn create_pixel_shader(&self) -> BackendResult<Self::PixelShader>;

    // -- input assembler ---------------------------------------------------
    fn ia_set_vertex_buffer(&self, buffer: &Self::Buffer, stride: u32, offset: u32);
    fn ia_set_index_buffer(&self, buffer: &Self::Buffer, format: IndexFormat, offset: u32);
    fn ia_set_primitive_topology(&self, topology: PrimitiveTopology);
    fn ia_set_input_layout(&self, layout: &Self::InputLayout);

    // -- shader stages -----------------------------------------------------
    fn vs_set_shader(&self, shader: &Self::VertexShader);
    fn ps_set_shader(&self, shader: &Self::PixelShader);
    fn vs_set_constant_buffer(&self, slot: u32, buffer: &Self::Buffer);
    fn ps_set_constant_buffer(&self, slot: u32, buffer: &Self::Buffer);
    fn ps_set_shader_resource(&self, slot: u32, srv: Option<&Self::ShaderResourceView>);
    fn ps_set_sampler(&self, slot: u32, sampler: &Self::SamplerState);

    // -- output merger / rasterizer ------------------------------------------
    fn om_set_blend_state(&self, state: &Self::BlendState, blend_factor: [f32; 4], sample_mask: u32);
    fn om_set_depth_stencil_state(&self, state: &Self::DepthStencilState, stencil_ref: u32);
    fn rs_set_state(&self, state: &Self::RasterizerState);
    fn rs_set_viewport(&self, viewport: &Viewport);

    // -- target clears / draws / present --------------------------------------
    fn clear_render_target_view(&self, color: [f32; 4]);
    fn clear_depth_stencil_view(&self, clear_depth: bool, clear_stencil: bool, depth: f32, stencil: u8);
    fn draw(&self, vertex_count: u32, start_vertex: u32);
    fn draw_indexed(&self, index_count: u32, start_index: u32, base_vertex: i32);
    fn present(&self, sync_interval: u32);
}
