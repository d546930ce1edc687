//! Device Façade.
//!
//! Presents the operations a relinked legacy vtable would route to: it owns
//! the state store, the state-object cache and the pipeline emulator, and
//! sequences them correctly around every draw. The literal vtable/ABI
//! adapter that exposes these as a function-pointer table to game code is
//! an external collaborator and is not part of this crate.

use std::cell::RefCell;
use std::sync::Arc;

use bitflags::bitflags;

use shim_backend_traits::{BackendDevice, IndexFormat, PrimitiveTopology, ResourceUsage, Viewport};

use crate::color::unpack_argb;
use crate::config::ShimOptions;
use crate::error::{ShimError, ShimResult};
use crate::legacy_ids::{color_op, tss};
use crate::pipeline::PipelineEmulator;
use crate::resource::{IndexBuffer, Texture2D, VertexBuffer};
use crate::state_object::StateObjectCache;
use crate::state_store::{Light, Material, Matrix4, StateStore, MAX_STAGES};
use crate::vertex_format::VertexFormatFlags;

bitflags! {
    /// `Clear` target flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ClearFlags: u32 {
        const TARGET  = 0x1;
        const ZBUFFER = 0x2;
        const STENCIL = 0x4;
    }
}

/// Legacy primitive types, each with its own vertex-count formula.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveType {
    PointList,
    LineList,
    LineStrip,
    TriangleList,
    TriangleStrip,
    /// No backend-native fan exists; conservatively emulated as a triangle
    /// list, assuming caller data is already fan-ordered.
    TriangleFan,
}

pub fn vertex_count_for(prim_type: PrimitiveType, prim_count: u32) -> u32 {
    match prim_type {
        PrimitiveType::PointList => prim_count,
        PrimitiveType::LineList => prim_count * 2,
        PrimitiveType::LineStrip => prim_count + 1,
        PrimitiveType::TriangleList => prim_count * 3,
        PrimitiveType::TriangleStrip => prim_count + 2,
        PrimitiveType::TriangleFan => prim_count * 3,
    }
}

fn topology_for(prim_type: PrimitiveType) -> PrimitiveTopology {
    match prim_type {
        PrimitiveType::PointList => PrimitiveTopology::PointList,
        PrimitiveType::LineList => PrimitiveTopology::LineList,
        PrimitiveType::LineStrip => PrimitiveTopology::LineStrip,
        PrimitiveType::TriangleList | PrimitiveType::TriangleFan => PrimitiveTopology::TriangleList,
        PrimitiveType::TriangleStrip => PrimitiveTopology::TriangleStrip,
    }
}

/// Opaque handle stored by `SetVertexShader`/`SetPixelShader`. The emulator
/// never inspects it — it always draws with the static fixed-function
/// shaders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShaderHandle(pub u32);

struct DeviceInner<B: BackendDevice> {
    store: StateStore,
    state_objects: StateObjectCache<B>,
    pipeline: PipelineEmulator<B>,
    scene_in_progress: bool,
    current_fvf: VertexFormatFlags,
    vertex_shader: Option<ShaderHandle>,
    pixel_shader: Option<ShaderHandle>,
    bound_vertex_buffer: Option<Arc<VertexBuffer<B>>>,
    bound_vertex_stride: u32,
    bound_index_buffer: Option<Arc<IndexBuffer<B>>>,
    bound_index_base_vertex: i32,
    bound_textures: Vec<Option<Arc<Texture2D<B>>>>,
}

/// One per process, owns the backend context and every cache the
/// translation engine needs.
pub struct Device<B: BackendDevice> {
    backend: B,
    pub backbuffer_width: u32,
    pub backbuffer_height: u32,
    options: ShimOptions,
    inner: RefCell<DeviceInner<B>>,
}

impl<B: BackendDevice> Device<B> {
    pub fn new(backend: B, backbuffer_width: u32, backbuffer_height: u32) -> ShimResult<Arc<Self>> {
        Self::with_options(backend, backbuffer_width, backbuffer_height, ShimOptions::default())
    }

    pub fn with_options(
        backend: B,
        backbuffer_width: u32,
        backbuffer_height: u32,
        options: ShimOptions,
    ) -> ShimResult<Arc<Self>> {
        let store = StateStore::new(backbuffer_width, backbuffer_height);
        let pipeline = PipelineEmulator::new(&backend)?;
        let state_objects = StateObjectCache::new(MAX_STAGES);

        Ok(Arc::new(Self {
            backend,
            backbuffer_width,
            backbuffer_height,
            options,
            inner: RefCell::new(DeviceInner {
                store,
                state_objects,
                pipeline,
                scene_in_progress: false,
                current_fvf: VertexFormatFlags::empty(),
                vertex_shader: None,
                pixel_shader: None,
                bound_vertex_buffer: None,
                bound_vertex_stride: 0,
                bound_index_buffer: None,
                bound_index_base_vertex: 0,
                bound_textures: vec![None; MAX_STAGES],
            }),
        }))
    }

    // -- scene / present ---------------------------------------------------

    pub fn begin_scene(&self) {
        self.inner.borrow_mut().scene_in_progress = true;
    }

    pub fn end_scene(&self) {
        self.inner.borrow_mut().scene_in_progress = false;
    }

    pub fn is_scene_in_progress(&self) -> bool {
        self.inner.borrow().scene_in_progress
    }

    /// Escape hatch to the backend handle, mainly useful for tests driving
    /// a [`crate::backend_null::RecordingBackend`] directly.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// `rects` are not modelled; the whole target is always cleared.
    pub fn clear(&self, flags: ClearFlags, argb_color: u32, z: f32, stencil: u8) {
        if flags.contains(ClearFlags::TARGET) {
            self.backend.clear_render_target_view(unpack_argb(argb_color));
        }
        if flags.intersects(ClearFlags::ZBUFFER | ClearFlags::STENCIL) {
            self.backend.clear_depth_stencil_view(
                flags.contains(ClearFlags::ZBUFFER),
                flags.contains(ClearFlags::STENCIL),
                z,
                stencil,
            );
        }
    }

    pub fn present(&self) {
        self.backend.present(1);
    }

    // -- state store passthroughs -------------------------------------------

    pub fn set_render_state(&self, id: u32, value: u32) {
        if self.options.validate_state_transitions && id as usize >= crate::state_store::MAX_RENDER_STATES {
            log::debug!(target: self.options.log_category, "SetRenderState({id}, {value}) is out of range and is ignored, matching legacy lenience");
        }
        self.inner.borrow_mut().store.set_render_state(id, value);
    }

    pub fn render_state(&self, id: u32) -> u32 {
        self.inner.borrow().store.render_state(id)
    }

    pub fn set_texture_stage_state(&self, stage: u32, id: u32, value: u32) -> ShimResult<()> {
        self.inner.borrow_mut().store.set_texture_stage_state(stage, id, value)
    }

    pub fn texture_stage_state(&self, stage: u32, id: u32) -> ShimResult<u32> {
        self.inner.borrow().store.texture_stage_state(stage, id)
    }

    pub fn set_transform(&self, id: u32, matrix: Matrix4) -> ShimResult<()> {
        self.inner.borrow_mut().store.set_transform(id, matrix)
    }

    pub fn transform(&self, id: u32) -> ShimResult<Matrix4> {
        self.inner.borrow().store.transform(id)
    }

    pub fn set_viewport(&self, viewport: Viewport) {
        self.inner.borrow_mut().store.set_viewport(&self.backend, viewport);
    }

    pub fn viewport(&self) -> Viewport {
        self.inner.borrow().store.viewport()
    }

    pub fn set_material(&self, material: Material) {
        self.inner.borrow_mut().store.set_material(material);
    }

    pub fn material(&self) -> Material {
        self.inner.borrow().store.material()
    }

    pub fn set_light(&self, index: u32, light: Light) -> ShimResult<()> {
        self.inner.borrow_mut().store.set_light(index, light)
    }

    pub fn light(&self, index: u32) -> ShimResult<Light> {
        self.inner.borrow().store.light(index)
    }

    pub fn light_enable(&self, index: u32, enable: bool) -> ShimResult<()> {
        self.inner.borrow_mut().store.light_enable(index, enable)
    }

    pub fn is_light_enabled(&self, index: u32) -> bool {
        self.inner.borrow().store.is_light_enabled(index)
    }

    pub fn set_fvf(&self, fvf: u32) {
        self.inner.borrow_mut().current_fvf = VertexFormatFlags::from_bits_truncate(fvf);
    }

    pub fn fvf(&self) -> u32 {
        self.inner.borrow().current_fvf.bits()
    }

    pub fn set_vertex_shader_handle(&self, handle: ShaderHandle) {
        self.inner.borrow_mut().vertex_shader = Some(handle);
    }

    pub fn vertex_shader_handle(&self) -> Option<ShaderHandle> {
        self.inner.borrow().vertex_shader
    }

    pub fn set_pixel_shader_handle(&self, handle: ShaderHandle) {
        self.inner.borrow_mut().pixel_shader = Some(handle);
    }

    pub fn pixel_shader_handle(&self) -> Option<ShaderHandle> {
        self.inner.borrow().pixel_shader
    }

    // -- textures / streams --------------------------------------------------

    pub fn set_texture(&self, stage: u32, texture: Option<Arc<Texture2D<B>>>) -> ShimResult<()> {
        let mut inner = self.inner.borrow_mut();
        match &texture {
            Some(tex) => {
                self.backend.ps_set_shader_resource(stage, Some(&tex.backend_srv()));
                let current = inner.store.texture_stage_state(stage, tss::COLOROP)?;
                if current == color_op::DISABLE || current == 0 {
                    inner.store.set_texture_stage_state(stage, tss::COLOROP, color_op::MODULATE)?;
                }
            }
            None => {
                self.backend.ps_set_shader_resource(stage, None);
                inner.store.set_texture_stage_state(stage, tss::COLOROP, color_op::DISABLE)?;
            }
        }
        let slot = inner
            .bound_textures
            .get_mut(stage as usize)
            .ok_or(ShimError::InvalidArgument("texture stage index out of range"))?;
        *slot = texture;
        Ok(())
    }

    /// Only stream 0 has any effect.
    pub fn set_stream_source(&self, stream: u32, buffer: Option<Arc<VertexBuffer<B>>>, stride: u32) {
        if stream != 0 {
            return;
        }
        let mut inner = self.inner.borrow_mut();
        if let Some(vb) = &buffer {
            self.backend.ia_set_vertex_buffer(&vb.backend_buffer(), stride, 0);
        }
        inner.bound_vertex_buffer = buffer;
        inner.bound_vertex_stride = stride;
    }

    pub fn set_indices(&self, buffer: Option<Arc<IndexBuffer<B>>>, base_vertex_index: i32) {
        let mut inner = self.inner.borrow_mut();
        if let Some(ib) = &buffer {
            self.backend.ia_set_index_buffer(&ib.backend_buffer(), ib.index_format, 0);
        }
        inner.bound_index_buffer = buffer;
        inner.bound_index_base_vertex = base_vertex_index;
    }

    // -- draws ---------------------------------------------------------------

    pub fn draw_primitive(&self, prim_type: PrimitiveType, start_vertex: u32, prim_count: u32) -> ShimResult<()> {
        let vertex_count = vertex_count_for(prim_type, prim_count);
        let mut inner = self.inner.borrow_mut();
        let DeviceInner { pipeline, store, state_objects, current_fvf, .. } = &mut *inner;
        pipeline.prepare_draw(&self.backend, *current_fvf, store)?;
        state_objects.apply(&self.backend, store)?;
        self.backend.ia_set_primitive_topology(topology_for(prim_type));
        self.backend.draw(vertex_count, start_vertex);
        Ok(())
    }

    pub fn draw_indexed_primitive(
        &self,
        prim_type: PrimitiveType,
        start_index: u32,
        prim_count: u32,
    ) -> ShimResult<()> {
        let index_count = vertex_count_for(prim_type, prim_count);
        let mut inner = self.inner.borrow_mut();
        let base_vertex = inner.bound_index_base_vertex;
        let DeviceInner { pipeline, store, state_objects, current_fvf, .. } = &mut *inner;
        pipeline.prepare_draw(&self.backend, *current_fvf, store)?;
        state_objects.apply(&self.backend, store)?;
        self.backend.ia_set_primitive_topology(topology_for(prim_type));
        self.backend.draw_indexed(index_count, start_index, base_vertex);
        Ok(())
    }

    /// A transient immutable vertex buffer initialised from user memory,
    /// bound, drawn, released, with the previous binding restored.
    pub fn draw_primitive_up(&self, prim_type: PrimitiveType, prim_count: u32, vertex_data: &[u8], stride: u32) -> ShimResult<()> {
        let vertex_count = vertex_count_for(prim_type, prim_count);
        let transient = VertexBuffer::create(&self.backend, vertex_data.len() as u32, ResourceUsage::Immutable, 0)?;
        unsafe {
            let ptr = transient.lock()?;
            std::ptr::copy_nonoverlapping(vertex_data.as_ptr(), ptr, vertex_data.len());
        }
        transient.unlock(&self.backend)?;

        let mut inner = self.inner.borrow_mut();
        let previous = inner.bound_vertex_buffer.clone();
        let previous_stride = inner.bound_vertex_stride;

        self.backend.ia_set_vertex_buffer(&transient.backend_buffer(), stride, 0);
        let DeviceInner { pipeline, store, state_objects, current_fvf, .. } = &mut *inner;
        pipeline.prepare_draw(&self.backend, *current_fvf, store)?;
        state_objects.apply(&self.backend, store)?;
        self.backend.ia_set_primitive_topology(topology_for(prim_type));
        self.backend.draw(vertex_count, 0);

        if let Some(vb) = &previous {
            self.backend.ia_set_vertex_buffer(&vb.backend_buffer(), previous_stride, 0);
        }
        drop(transient);
        Ok(())
    }

    pub fn draw_indexed_primitive_up(
        &self,
        prim_type: PrimitiveType,
        prim_count: u32,
        vertex_data: &[u8],
        stride: u32,
        index_data: &[u8],
        index_format: IndexFormat,
    ) -> ShimResult<()> {
        let index_count = vertex_count_for(prim_type, prim_count);

        let transient_vb = VertexBuffer::create(&self.backend, vertex_data.len() as u32, ResourceUsage::Immutable, 0)?;
        unsafe {
            let ptr = transient_vb.lock()?;
            std::ptr::copy_nonoverlapping(vertex_data.as_ptr(), ptr, vertex_data.len());
        }
        transient_vb.unlock(&self.backend)?;

        let transient_ib = IndexBuffer::create(&self.backend, index_data.len() as u32, ResourceUsage::Immutable, index_format)?;
        unsafe {
            let ptr = transient_ib.lock()?;
            std::ptr::copy_nonoverlapping(index_data.as_ptr(), ptr, index_data.len());
        }
        transient_ib.unlock(&self.backend)?;

        let mut inner = self.inner.borrow_mut();
        let previous_vb = inner.bound_vertex_buffer.clone();
        let previous_stride = inner.bound_vertex_stride;
        let previous_ib = inner.bound_index_buffer.clone();

        self.backend.ia_set_vertex_buffer(&transient_vb.backend_buffer(), stride, 0);
        self.backend.ia_set_index_buffer(&transient_ib.backend_buffer(), index_format, 0);

        let DeviceInner { pipeline, store, state_objects, current_fvf, .. } = &mut *inner;
        pipeline.prepare_draw(&self.backend, *current_fvf, store)?;
        state_objects.apply(&self.backend, store)?;
        self.backend.ia_set_primitive_topology(topology_for(prim_type));
        self.backend.draw_indexed(index_count, 0, 0);

        if let Some(vb) = &previous_vb {
            self.backend.ia_set_vertex_buffer(&vb.backend_buffer(), previous_stride, 0);
        }
        if let Some(ib) = &previous_ib {
            self.backend.ia_set_index_buffer(&ib.backend_buffer(), ib.index_format, 0);
        }
        drop(transient_vb);
        drop(transient_ib);
        Ok(())
    }

    // -- ABI boilerplate accepted but not implemented -------------------------

    /// Accepted to satisfy the ABI. No off-screen render target or swap
    /// chain resize is modelled — see the open-question decision in
    /// `DESIGN.md`.
    pub fn reset(&self, backbuffer_width: u32, backbuffer_height: u32) {
        log::debug!("Reset accepted as a no-op ({backbuffer_width}x{backbuffer_height} ignored)");
    }

    pub fn create_render_target(&self) -> ShimResult<()> {
        Err(ShimError::InvalidArgument("off-screen render targets are not implemented"))
    }

    pub fn create_depth_stencil_surface(&self) -> ShimResult<()> {
        Err(ShimError::InvalidArgument("secondary depth-stencil surfaces are not implemented"))
    }

    pub fn set_render_target(&self) -> ShimResult<()> {
        Err(ShimError::InvalidArgument("only the default render target is supported"))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::backend_null::RecordingBackend;
    use crate::format::SourceFormat;
    use crate::legacy_ids::rs;

    fn new_device() -> Arc<Device<RecordingBackend>> {
        Device::new(RecordingBackend::new(), 640, 480).unwrap()
    }

    #[test]
    fn begin_end_scene_toggles_flag() {
        let device = new_device();
        assert!(!device.is_scene_in_progress());
        device.begin_scene();
        assert!(device.is_scene_in_progress());
        device.end_scene();
        assert!(!device.is_scene_in_progress());
    }

    #[test]
    fn clear_target_only_sets_color_not_depth() {
        let device = new_device();
        device.clear(ClearFlags::TARGET, 0xFF112233, 1.0, 0);
        assert!(device.backend.cleared_color.get().is_some());
        assert!(device.backend.cleared_depth.get().is_none());
    }

    #[test]
    fn clear_zbuffer_only_sets_depth_not_color() {
        let device = new_device();
        device.clear(ClearFlags::ZBUFFER, 0, 1.0, 0);
        assert!(device.backend.cleared_color.get().is_none());
        let (clear_depth, clear_stencil, _, _) = device.backend.cleared_depth.get().unwrap();
        assert!(clear_depth);
        assert!(!clear_stencil);
    }

    #[test]
    fn viewport_applies_eagerly_without_a_draw() {
        let device = new_device();
        let viewport = Viewport { x: 100.0, y: 100.0, width: 200.0, height: 150.0, min_depth: 0.0, max_depth: 1.0 };
        device.set_viewport(viewport);
        assert_eq!(device.backend.bound_viewport.get(), Some(viewport));
    }

    #[test]
    fn set_texture_flips_disabled_stage_to_modulate() {
        let device = new_device();
        let tex = Texture2D::create(&device.backend, 2, 2, 1, ResourceUsage::Default, SourceFormat::A8R8G8B8).unwrap();
        assert_eq!(device.texture_stage_state(0, tss::COLOROP).unwrap(), 0);
        device.set_texture(0, Some(tex)).unwrap();
        assert_eq!(device.texture_stage_state(0, tss::COLOROP).unwrap(), color_op::MODULATE);

        device.set_texture(0, None).unwrap();
        assert_eq!(device.texture_stage_state(0, tss::COLOROP).unwrap(), color_op::DISABLE);
    }

    #[test]
    fn draw_primitive_counts_match_vertex_count_per_primitive() {
        let device = new_device();
        device.set_fvf(0x004 | 0x040); // XYZRHW | DIFFUSE
        device.draw_primitive(PrimitiveType::TriangleList, 0, 2).unwrap();
        let calls = device.backend.draw_calls.borrow();
        assert_eq!(calls.last().unwrap().count, 6);
    }

    #[test]
    fn state_cache_reuse_across_repeated_draws_with_identical_state() {
        let device = new_device();
        device.set_fvf(0x004 | 0x040);
        device.set_render_state(rs::ALPHABLENDENABLE, 0);
        for _ in 0..3 {
            device.draw_primitive(PrimitiveType::TriangleList, 0, 1).unwrap();
        }
        assert_eq!(device.backend.blend_state_creations(), 1);
    }

    #[test]
    fn with_options_accepts_validation_toggle() {
        let device = Device::with_options(
            RecordingBackend::new(),
            640,
            480,
            crate::config::ShimOptions { validate_state_transitions: true, log_category: "test" },
        )
        .unwrap();
        device.set_render_state(10_000, 0xDEADBEEF);
        assert_eq!(device.render_state(10_000), 0);
    }

    #[test]
    fn draw_primitive_up_restores_previous_binding() {
        let device = new_device();
        device.set_fvf(0x004 | 0x040);
        let vb = VertexBuffer::create(&device.backend, 60, ResourceUsage::Dynamic, 0).unwrap();
        device.set_stream_source(0, Some(vb), 20);

        let data = vec![0u8; 20 * 3];
        device.draw_primitive_up(PrimitiveType::TriangleList, 1, &data, 20).unwrap();

        assert_eq!(device.inner.borrow().bound_vertex_stride, 20);
    }
}
