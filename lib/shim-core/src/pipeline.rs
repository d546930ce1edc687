//! Pipeline Emulator.
//!
//! Owns the two static shaders, the input-layout cache, and the two
//! constant buffers the shaders read. `prepare_draw` is the one entry point
//! the Façade calls before every draw.

use std::collections::VecDeque;

use shim_backend_traits::{BackendDevice, InputElement, InputSemantic, VertexElementFormat};

use crate::color::unpack_argb;
use crate::error::{ShimError, ShimResult};
use crate::legacy_ids::{color_op, rs, transform, tss};
use crate::state_store::{Matrix4, StateStore, IDENTITY};
use crate::vertex_format::VertexFormatFlags;

const LAYOUT_CACHE_CAPACITY: usize = 16;
const MAX_INPUT_ELEMENTS: usize = 8;

/// 16 `f32` WVP matrix + screen width/height + a flags word.
const VERTEX_CB_SIZE: u32 = 16 * 4 + 4 + 4 + 4;
/// TEXTUREFACTOR RGBA + alpha_ref + flags + raw alpha-func.
const PIXEL_CB_SIZE: u32 = 4 * 4 + 4 + 4 + 4;

fn mat4_mul(a: Matrix4, b: Matrix4) -> Matrix4 {
    let mut out = [0.0f32; 16];
    for row in 0..4 {
        for col in 0..4 {
            let mut sum = 0.0;
            for k in 0..4 {
                sum += a[row * 4 + k] * b[k * 4 + col];
            }
            out[row * 4 + col] = sum;
        }
    }
    out
}

fn mat4_transpose(m: Matrix4) -> Matrix4 {
    let mut out = [0.0f32; 16];
    for row in 0..4 {
        for col in 0..4 {
            out[col * 4 + row] = m[row * 4 + col];
        }
    }
    out
}

/// Input-layout synthesis. Errors (rather than skipping
/// silently) when the format carries no position attribute, so callers can
/// log and skip the draw instead of submitting a meaningless one.
pub fn synthesize_layout(fvf: VertexFormatFlags) -> ShimResult<(Vec<InputElement>, u32)> {
    if !fvf.has_position() {
        log::warn!("fvf {:#x} has no position attribute, skipping draw", fvf.bits());
        return Err(ShimError::InvalidArgument("vertex format has no position attribute"));
    }

    let mut elements = Vec::with_capacity(MAX_INPUT_ELEMENTS);
    let mut offset = 0u32;

    if fvf.contains(VertexFormatFlags::XYZRHW) {
        elements.push(InputElement {
            semantic: InputSemantic::Position,
            format: VertexElementFormat::R32G32B32A32_FLOAT,
            offset,
            slot: 0,
        });
        offset += 16;
    } else {
        elements.push(InputElement {
            semantic: InputSemantic::Position,
            format: VertexElementFormat::R32G32B32_FLOAT,
            offset,
            slot: 0,
        });
        offset += 12;
    }

    if fvf.contains(VertexFormatFlags::NORMAL) {
        elements.push(InputElement {
            semantic: InputSemantic::Normal,
            format: VertexElementFormat::R32G32B32_FLOAT,
            offset,
            slot: 0,
        });
        offset += 12;
    }

    if fvf.contains(VertexFormatFlags::DIFFUSE) {
        elements.push(InputElement {
            semantic: InputSemantic::Color,
            format: VertexElementFormat::B8G8R8A8_UNORM,
            offset,
            slot: 0,
        });
        offset += 4;
    }

    if fvf.contains(VertexFormatFlags::SPECULAR) {
        offset += 4;
    }

    for i in 0..fvf.texture_count() {
        elements.push(InputElement {
            semantic: InputSemantic::TexCoord(i as u8),
            format: VertexElementFormat::R32G32_FLOAT,
            offset,
            slot: 0,
        });
        offset += 8;
    }

    if elements.len() > MAX_INPUT_ELEMENTS {
        log::warn!("fvf {:#x} synthesizes {} input elements, exceeding the cap of {MAX_INPUT_ELEMENTS}", fvf.bits(), elements.len());
        return Err(ShimError::InvalidArgument("vertex format synthesizes too many input elements"));
    }

    Ok((elements, offset))
}

pub struct PipelineEmulator<B: BackendDevice> {
    vertex_shader: B::VertexShader,
    pixel_shader: B::PixelShader,
    vertex_cb: B::Buffer,
    pixel_cb: B::Buffer,
    layout_cache: VecDeque<(u32, B::InputLayout)>,
}

impl<B: BackendDevice> PipelineEmulator<B> {
    /// Compiles the two static shaders and allocates the constant buffers,
    /// once, at device initialization.
    pub fn new(backend: &B) -> ShimResult<Self> {
        let vertex_shader = backend.create_vertex_shader()?;
        let pixel_shader = backend.create_pixel_shader()?;
        let vertex_cb = backend.create_constant_buffer(VERTEX_CB_SIZE)?;
        let pixel_cb = backend.create_constant_buffer(PIXEL_CB_SIZE)?;
        Ok(Self {
            vertex_shader,
            pixel_shader,
            vertex_cb,
            pixel_cb,
            layout_cache: VecDeque::with_capacity(LAYOUT_CACHE_CAPACITY),
        })
    }

    fn layout_for(&mut self, backend: &B, fvf: VertexFormatFlags) -> ShimResult<B::InputLayout> {
        if let Some((_, layout)) = self.layout_cache.iter().find(|(bits, _)| *bits == fvf.bits()) {
            return Ok(layout.clone());
        }
        let (elements, _stride) = synthesize_layout(fvf)?;
        let layout = backend.create_input_layout(&elements, &self.vertex_shader)?;
        if self.layout_cache.len() >= LAYOUT_CACHE_CAPACITY {
            self.layout_cache.pop_front();
        }
        self.layout_cache.push_back((fvf.bits(), layout.clone()));
        Ok(layout)
    }

    /// Pre-draw finalization.
    pub fn prepare_draw(&mut self, backend: &B, fvf: VertexFormatFlags, store: &StateStore) -> ShimResult<()> {
        backend.vs_set_shader(&self.vertex_shader);
        backend.ps_set_shader(&self.pixel_shader);

        let layout = self.layout_for(backend, fvf)?;
        backend.ia_set_input_layout(&layout);

        let pretransformed = fvf.is_pretransformed();
        let wvp = if pretransformed {
            IDENTITY
        } else {
            let world = store.transform(transform::WORLD)?;
            let view = store.transform(transform::VIEW)?;
            let projection = store.transform(transform::PROJECTION)?;
            mat4_mul(mat4_mul(world, view), projection)
        };
        let wvp_transposed = mat4_transpose(wvp);

        let viewport = store.viewport();
        let mut vs_flags = 0u32;
        if pretransformed {
            vs_flags |= 1 << 0;
        }
        if fvf.contains(VertexFormatFlags::DIFFUSE) {
            vs_flags |= 1 << 1;
        }
        if fvf.texture_count() > 0 {
            vs_flags |= 1 << 2;
        }

        let mut vertex_cb_bytes = Vec::with_capacity(VERTEX_CB_SIZE as usize);
        for component in wvp_transposed {
            vertex_cb_bytes.extend_from_slice(&component.to_le_bytes());
        }
        vertex_cb_bytes.extend_from_slice(&viewport.width.to_le_bytes());
        vertex_cb_bytes.extend_from_slice(&viewport.height.to_le_bytes());
        vertex_cb_bytes.extend_from_slice(&vs_flags.to_le_bytes());

        let ptr = backend.map_discard(&self.vertex_cb, VERTEX_CB_SIZE)?;
        unsafe { std::ptr::copy_nonoverlapping(vertex_cb_bytes.as_ptr(), ptr, vertex_cb_bytes.len()) };
        backend.unmap(&self.vertex_cb);

        let texture_factor = unpack_argb(store.render_state(rs::TEXTUREFACTOR));
        let alpha_ref = store.render_state(rs::ALPHAREF) as f32 / 255.0;
        let stage0_color_op = store.texture_stage_state(0, tss::COLOROP).unwrap_or(0);
        let stage0_active = stage0_color_op != 0 && stage0_color_op != color_op::DISABLE;
        let alpha_test_enabled = store.render_state(rs::ALPHATESTENABLE) != 0;

        let mut ps_flags = 0u32;
        if stage0_active {
            ps_flags |= 1 << 0;
        }
        if alpha_test_enabled {
            ps_flags |= 1 << 1;
        }
        let alpha_func = store.render_state(rs::ALPHAFUNC);

        let mut pixel_cb_bytes = Vec::with_capacity(PIXEL_CB_SIZE as usize);
        for channel in texture_factor {
            pixel_cb_bytes.extend_from_slice(&channel.to_le_bytes());
        }
        pixel_cb_bytes.extend_from_slice(&alpha_ref.to_le_bytes());
        pixel_cb_bytes.extend_from_slice(&ps_flags.to_le_bytes());
        pixel_cb_bytes.extend_from_slice(&alpha_func.to_le_bytes());

        let ptr = backend.map_discard(&self.pixel_cb, PIXEL_CB_SIZE)?;
        unsafe { std::ptr::copy_nonoverlapping(pixel_cb_bytes.as_ptr(), ptr, pixel_cb_bytes.len()) };
        backend.unmap(&self.pixel_cb);

        backend.vs_set_constant_buffer(0, &self.vertex_cb);
        backend.ps_set_constant_buffer(0, &self.pixel_cb);

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::backend_null::RecordingBackend;

    #[test]
    fn synthesize_layout_rejects_missing_position() {
        assert!(synthesize_layout(VertexFormatFlags::DIFFUSE).is_err());
    }

    #[test]
    fn synthesize_layout_stride_matches_fvf_bits() {
        let fvf = VertexFormatFlags::XYZRHW | VertexFormatFlags::DIFFUSE;
        let (elements, stride) = synthesize_layout(fvf).unwrap();
        assert_eq!(stride, 20);
        assert_eq!(elements.len(), 2);
    }

    #[test]
    fn synthesize_layout_is_idempotent() {
        let fvf = VertexFormatFlags::XYZ | VertexFormatFlags::NORMAL | VertexFormatFlags::from_bits_truncate(0x200);
        let (a, stride_a) = synthesize_layout(fvf).unwrap();
        let (b, stride_b) = synthesize_layout(fvf).unwrap();
        assert_eq!(stride_a, stride_b);
        assert_eq!(a.len(), b.len());
    }

    #[test]
    fn layout_cache_evicts_fifo_past_capacity() {
        let backend = RecordingBackend::new();
        let mut pipeline = PipelineEmulator::new(&backend).unwrap();
        let store = StateStore::new(640, 480);

        for tex_bits in 0..(LAYOUT_CACHE_CAPACITY as u32 + 2) {
            let fvf = VertexFormatFlags::XYZRHW | VertexFormatFlags::from_bits_truncate(tex_bits << 8);
            pipeline.prepare_draw(&backend, fvf, &store).unwrap();
        }
        assert_eq!(pipeline.layout_cache.len(), LAYOUT_CACHE_CAPACITY);
    }

    #[test]
    fn pretransformed_draw_writes_identity_wvp() {
        let backend = RecordingBackend::new();
        let mut pipeline = PipelineEmulator::new(&backend).unwrap();
        let store = StateStore::new(640, 480);
        pipeline
            .prepare_draw(&backend, VertexFormatFlags::XYZRHW | VertexFormatFlags::DIFFUSE, &store)
            .unwrap();

        let bytes = backend.bytes_of(pipeline.vertex_cb);
        let mut wvp = [0.0f32; 16];
        for (i, chunk) in bytes[0..64].chunks_exact(4).enumerate() {
            wvp[i] = f32::from_le_bytes(chunk.try_into().unwrap());
        }
        assert_eq!(wvp, IDENTITY);
    }
}
