//! A backend that keeps everything in host memory and records what it was
//! asked to do, instead of talking to a GPU.
//!
//! A real, always-available implementation rather than a test-only shim —
//! useful for headless or dedicated-server builds that still need a
//! `BackendDevice` to satisfy the translation engine. It is what this
//! crate's own test suite and `tests/scenarios.rs` drive against, since
//! constructing a real D3D11 device is outside this workspace's scope.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use shim_backend_traits::{
    BackendDevice, BackendResult, BlendStateDesc, DepthStencilStateDesc, IndexFormat, InputElement,
    PrimitiveTopology, RasterizerStateDesc, ResourceUsage, SamplerStateDesc, Texture2DDesc, Viewport,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NullHandle(pub u64);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawCall {
    pub indexed: bool,
    pub count: u32,
    pub start: u32,
    pub base_vertex: i32,
    pub topology: PrimitiveTopology,
}

#[derive(Default)]
struct Counters {
    blend_state: u32,
    depth_stencil_state: u32,
    rasterizer_state: u32,
    sampler_state: u32,
    input_layout: u32,
}

pub struct RecordingBackend {
    next_id: Cell<u64>,
    counters: RefCell<Counters>,
    scratch: RefCell<HashMap<u64, Vec<u8>>>,
    pub bound_viewport: Cell<Option<Viewport>>,
    pub bound_topology: Cell<Option<PrimitiveTopology>>,
    pub bound_blend_factor: Cell<Option<[f32; 4]>>,
    pub bound_stencil_ref: Cell<Option<u32>>,
    pub cleared_color: Cell<Option<[f32; 4]>>,
    pub cleared_depth: Cell<Option<(bool, bool, f32, u8)>>,
    pub draw_calls: RefCell<Vec<DrawCall>>,
    pub present_count: Cell<u32>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self {
            next_id: Cell::new(1),
            counters: RefCell::new(Counters::default()),
            scratch: RefCell::new(HashMap::new()),
            bound_viewport: Cell::new(None),
            bound_topology: Cell::new(None),
            bound_blend_factor: Cell::new(None),
            bound_stencil_ref: Cell::new(None),
            cleared_color: Cell::new(None),
            cleared_depth: Cell::new(None),
            draw_calls: RefCell::new(Vec::new()),
            present_count: Cell::new(0),
        }
    }

    fn alloc_id(&self) -> u64 {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        id
    }

    fn alloc_scratch(&self, size: u32) -> NullHandle {
        let id = self.alloc_id();
        self.scratch.borrow_mut().insert(id, vec![0u8; size as usize]);
        NullHandle(id)
    }

    /// Test accessor: current bytes behind a buffer/texture handle.
    pub fn bytes_of(&self, handle: NullHandle) -> Vec<u8> {
        self.scratch.borrow().get(&handle.0).cloned().unwrap_or_default()
    }

    pub fn blend_state_creations(&self) -> u32 {
        self.counters.borrow().blend_state
    }
    pub fn depth_stencil_state_creations(&self) -> u32 {
        self.counters.borrow().depth_stencil_state
    }
    pub fn rasterizer_state_creations(&self) -> u32 {
        self.counters.borrow().rasterizer_state
    }
    pub fn sampler_state_creations(&self) -> u32 {
        self.counters.borrow().sampler_state
    }
}

impl Default for RecordingBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RecordingBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordingBackend").finish_non_exhaustive()
    }
}

impl BackendDevice for RecordingBackend {
    type Buffer = NullHandle;
    type Texture2D = NullHandle;
    type ShaderResourceView = NullHandle;
    type BlendState = NullHandle;
    type DepthStencilState = NullHandle;
    type RasterizerState = NullHandle;
    type SamplerState = NullHandle;
    type InputLayout = NullHandle;
    type VertexShader = NullHandle;
    type PixelShader = NullHandle;

    fn create_vertex_buffer(&self, size: u32, _usage: ResourceUsage) -> BackendResult<Self::Buffer> {
        Ok(self.alloc_scratch(size))
    }

    fn create_index_buffer(&self, size: u32, _usage: ResourceUsage) -> BackendResult<Self::Buffer> {
        Ok(self.alloc_scratch(size))
    }

    fn create_constant_buffer(&self, size: u32) -> BackendResult<Self::Buffer> {
        Ok(self.alloc_scratch(size))
    }

    fn create_texture2d(
        &self,
        desc: &Texture2DDesc,
    ) -> BackendResult<(Self::Texture2D, Self::ShaderResourceView)> {
        let tex = NullHandle(self.alloc_id());
        let srv = NullHandle(self.alloc_id());
        let _ = desc;
        Ok((tex, srv))
    }

    fn update_buffer(&self, buffer: &Self::Buffer, data: &[u8]) -> BackendResult<()> {
        self.scratch.borrow_mut().insert(buffer.0, data.to_vec());
        Ok(())
    }

    fn update_texture_level0(
        &self,
        texture: &Self::Texture2D,
        data: &[u8],
        _row_pitch: u32,
        _slice_pitch: u32,
    ) -> BackendResult<()> {
        self.scratch.borrow_mut().insert(texture.0, data.to_vec());
        Ok(())
    }

    fn map_discard(&self, buffer: &Self::Buffer, size: u32) -> BackendResult<*mut u8> {
        let mut scratch = self.scratch.borrow_mut();
        let entry = scratch.entry(buffer.0).or_insert_with(Vec::new);
        entry.clear();
        entry.resize(size as usize, 0);
        Ok(entry.as_mut_ptr())
    }

    fn unmap(&self, _buffer: &Self::Buffer) {}

    fn create_blend_state(&self, _desc: &BlendStateDesc) -> BackendResult<Self::BlendState> {
        self.counters.borrow_mut().blend_state += 1;
        Ok(NullHandle(self.alloc_id()))
    }

    fn create_depth_stencil_state(
        &self,
        _desc: &DepthStencilStateDesc,
    ) -> BackendResult<Self::DepthStencilState> {
        self.counters.borrow_mut().depth_stencil_state += 1;
        Ok(NullHandle(self.alloc_id()))
    }

    fn create_rasterizer_state(&self, _desc: &RasterizerStateDesc) -> BackendResult<Self::RasterizerState> {
        self.counters.borrow_mut().rasterizer_state += 1;
        Ok(NullHandle(self.alloc_id()))
    }

    fn create_sampler_state(&self, _desc: &SamplerStateDesc) -> BackendResult<Self::SamplerState> {
        self.counters.borrow_mut().sampler_state += 1;
        Ok(NullHandle(self.alloc_id()))
    }

    fn create_input_layout(
        &self,
        _elements: &[InputElement],
        _vertex_shader: &Self::VertexShader,
    ) -> BackendResult<Self::InputLayout> {
        self.counters.borrow_mut().input_layout += 1;
        Ok(NullHandle(self.alloc_id()))
    }

    fn create_vertex_shader(&self) -> BackendResult<Self::VertexShader> {
        Ok(NullHandle(self.alloc_id()))
    }

    fn create_pixel_shader(&self) -> BackendResult<Self::PixelShader> {
        Ok(NullHandle(self.alloc_id()))
    }

    fn ia_set_vertex_buffer(&self, _buffer: &Self::Buffer, _stride: u32, _offset: u32) {}
    fn ia_set_index_buffer(&self, _buffer: &Self::Buffer, _format: IndexFormat, _offset: u32) {}

    fn ia_set_primitive_topology(&self, topology: PrimitiveTopology) {
        self.bound_topology.set(Some(topology));
    }

    fn ia_set_input_layout(&self, _layout: &Self::InputLayout) {}

    fn vs_set_shader(&self, _shader: &Self::VertexShader) {}
    fn ps_set_shader(&self, _shader: &Self::PixelShader) {}
    fn vs_set_constant_buffer(&self, _slot: u32, _buffer: &Self::Buffer) {}
    fn ps_set_constant_buffer(&self, _slot: u32, _buffer: &Self::Buffer) {}
    fn ps_set_shader_resource(&self, _slot: u32, _srv: Option<&Self::ShaderResourceView>) {}
    fn ps_set_sampler(&self, _slot: u32, _sampler: &Self::SamplerState) {}

    fn om_set_blend_state(&self, _state: &Self::BlendState, blend_factor: [f32; 4], _sample_mask: u32) {
        self.bound_blend_factor.set(Some(blend_factor));
    }

    fn om_set_depth_stencil_state(&self, _state: &Self::DepthStencilState, stencil_ref: u32) {
        self.bound_stencil_ref.set(Some(stencil_ref));
    }

    fn rs_set_state(&self, _state: &Self::RasterizerState) {}

    fn rs_set_viewport(&self, viewport: &Viewport) {
        self.bound_viewport.set(Some(*viewport));
    }

    fn clear_render_target_view(&self, color: [f32; 4]) {
        self.cleared_color.set(Some(color));
    }

    fn clear_depth_stencil_view(&self, clear_depth: bool, clear_stencil: bool, depth: f32, stencil: u8) {
        self.cleared_depth.set(Some((clear_depth, clear_stencil, depth, stencil)));
    }

    fn draw(&self, vertex_count: u32, start_vertex: u32) {
        self.draw_calls.borrow_mut().push(DrawCall {
            indexed: false,
            count: vertex_count,
            start: start_vertex,
            base_vertex: 0,
            topology: self.bound_topology.get().unwrap_or(PrimitiveTopology::TriangleList),
        });
    }

    fn draw_indexed(&self, index_count: u32, start_index: u32, base_vertex: i32) {
        self.draw_calls.borrow_mut().push(DrawCall {
            indexed: true,
            count: index_count,
            start: start_index,
            base_vertex,
            topology: self.bound_topology.get().unwrap_or(PrimitiveTopology::TriangleList),
        });
    }

    fn present(&self, _sync_interval: u32) {
        self.present_count.set(self.present_count.get() + 1);
    }
}
