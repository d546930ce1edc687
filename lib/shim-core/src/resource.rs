//! Resource Manager.
//!
//! Creates, locks/unlocks, and uploads vertex buffers, index buffers and 2D
//! textures. Owns the CPU staging memory backing each resource's Lock/Unlock
//! cycle.

use std::cell::RefCell;
use std::sync::Arc;

use shim_backend_traits::{BackendDevice, IndexFormat, ResourceUsage, Texture2DDesc};

use crate::error::{ShimError, ShimResult};
use crate::format::{self, SourceFormat};

struct VertexBufferInner<B: BackendDevice> {
    backend_buffer: B::Buffer,
    sys_mem: Vec<u8>,
    locked: bool,
    dirty: bool,
}

/// Vertex buffer resource.
pub struct VertexBuffer<B: BackendDevice> {
    pub size: u32,
    pub fvf_hint: u32,
    pub usage: ResourceUsage,
    inner: RefCell<VertexBufferInner<B>>,
}

impl<B: BackendDevice> VertexBuffer<B> {
    pub fn create(backend: &B, size: u32, usage: ResourceUsage, fvf_hint: u32) -> ShimResult<Arc<Self>> {
        if size == 0 {
            return Err(ShimError::InvalidArgument("vertex buffer size must be non-zero"));
        }
        let backend_buffer = backend.create_vertex_buffer(size, usage)?;
        Ok(Arc::new(Self {
            size,
            fvf_hint,
            usage,
            inner: RefCell::new(VertexBufferInner {
                backend_buffer,
                sys_mem: vec![0u8; size as usize],
                locked: false,
                dirty: false,
            }),
        }))
    }

    /// Returns a raw pointer into the staging region. The pointer remains
    /// valid until the matching [`Self::unlock`] — staging memory is never
    /// reallocated between creation and drop — but aliasing it past that
    /// point, or locking twice, is the caller's responsibility to avoid.
    pub unsafe fn lock(&self) -> ShimResult<*mut u8> {
        let mut inner = self.inner.borrow_mut();
        if inner.locked {
            return Err(ShimError::InvalidArgument("vertex buffer already locked"));
        }
        inner.locked = true;
        Ok(inner.sys_mem.as_mut_ptr())
    }

    pub fn unlock(&self, backend: &B) -> ShimResult<()> {
        let mut inner = self.inner.borrow_mut();
        if !inner.locked {
            return Err(ShimError::InvalidArgument("vertex buffer not locked"));
        }
        inner.locked = false;
        inner.dirty = true;
        backend.update_buffer(&inner.backend_buffer, &inner.sys_mem)?;
        inner.dirty = false;
        Ok(())
    }

    pub fn backend_buffer(&self) -> B::Buffer {
        self.inner.borrow().backend_buffer.clone()
    }

    /// Test/debug accessor: a copy of the current staging contents.
    pub fn staged_bytes(&self) -> Vec<u8> {
        self.inner.borrow().sys_mem.clone()
    }
}

struct IndexBufferInner<B: BackendDevice> {
    backend_buffer: B::Buffer,
    sys_mem: Vec<u8>,
    locked: bool,
    dirty: bool,
}

/// Index buffer resource.
pub struct IndexBuffer<B: BackendDevice> {
    pub size: u32,
    pub usage: ResourceUsage,
    pub index_format: IndexFormat,
    inner: RefCell<IndexBufferInner<B>>,
}

impl<B: BackendDevice> IndexBuffer<B> {
    pub fn create(
        backend: &B,
        size: u32,
        usage: ResourceUsage,
        index_format: IndexFormat,
    ) -> ShimResult<Arc<Self>> {
        if size == 0 {
            return Err(ShimError::InvalidArgument("index buffer size must be non-zero"));
        }
        let backend_buffer = backend.create_index_buffer(size, usage)?;
        Ok(Arc::new(Self {
            size,
            usage,
            index_format,
            inner: RefCell::new(IndexBufferInner {
                backend_buffer,
                sys_mem: vec![0u8; size as usize],
                locked: false,
                dirty: false,
            }),
        }))
    }

    pub unsafe fn lock(&self) -> ShimResult<*mut u8> {
        let mut inner = self.inner.borrow_mut();
        if inner.locked {
            return Err(ShimError::InvalidArgument("index buffer already locked"));
        }
        inner.locked = true;
        Ok(inner.sys_mem.as_mut_ptr())
    }

    pub fn unlock(&self, backend: &B) -> ShimResult<()> {
        let mut inner = self.inner.borrow_mut();
        if !inner.locked {
            return Err(ShimError::InvalidArgument("index buffer not locked"));
        }
        inner.locked = false;
        inner.dirty = true;
        backend.update_buffer(&inner.backend_buffer, &inner.sys_mem)?;
        inner.dirty = false;
        Ok(())
    }

    pub fn backend_buffer(&self) -> B::Buffer {
        self.inner.borrow().backend_buffer.clone()
    }

    pub fn staged_bytes(&self) -> Vec<u8> {
        self.inner.borrow().sys_mem.clone()
    }
}

struct Texture2DInner<B: BackendDevice> {
    backend_texture: B::Texture2D,
    backend_srv: B::ShaderResourceView,
    sys_mem: Vec<u8>,
    locked: bool,
    dirty: bool,
}

/// Texture resource. Only mip level 0 is staged in CPU memory (see the
/// mip-level open question, resolved in `DESIGN.md`).
pub struct Texture2D<B: BackendDevice> {
    pub width: u32,
    pub height: u32,
    pub mip_levels: u32,
    pub source_format: SourceFormat,
    pub pitch: u32,
    slice_pitch: u32,
    inner: RefCell<Texture2DInner<B>>,
}

impl<B: BackendDevice> Texture2D<B> {
    pub fn create(
        backend: &B,
        width: u32,
        height: u32,
        levels: u32,
        usage: ResourceUsage,
        source_format: SourceFormat,
    ) -> ShimResult<Arc<Self>> {
        if width == 0 || height == 0 {
            return Err(ShimError::InvalidArgument("texture dimensions must be non-zero"));
        }
        let backend_format = format::to_backend_format(source_format);
        let pitch = format::row_pitch(source_format, width);
        let height_blocks = format::height_in_blocks(source_format, height);
        let slice_pitch = pitch * height_blocks;
        let mip_levels = levels.max(1);

        let desc = Texture2DDesc {
            width,
            height,
            mip_levels,
            format: backend_format,
            usage,
        };
        let (backend_texture, backend_srv) = backend.create_texture2d(&desc)?;

        Ok(Arc::new(Self {
            width,
            height,
            mip_levels,
            source_format,
            pitch,
            slice_pitch,
            inner: RefCell::new(Texture2DInner {
                backend_texture,
                backend_srv,
                sys_mem: vec![0u8; slice_pitch as usize],
                locked: false,
                dirty: false,
            }),
        }))
    }

    /// Returns `(pointer, row pitch)`, matching the legacy `Lock` contract
    /// for textures.
    pub unsafe fn lock(&self) -> ShimResult<(*mut u8, u32)> {
        let mut inner = self.inner.borrow_mut();
        if inner.locked {
            return Err(ShimError::InvalidArgument("texture already locked"));
        }
        inner.locked = true;
        Ok((inner.sys_mem.as_mut_ptr(), self.pitch))
    }

    pub fn unlock(&self, backend: &B) -> ShimResult<()> {
        let mut inner = self.inner.borrow_mut();
        if !inner.locked {
            return Err(ShimError::InvalidArgument("texture not locked"));
        }
        inner.locked = false;
        inner.dirty = true;
        backend.update_texture_level0(&inner.backend_texture, &inner.sys_mem, self.pitch, self.slice_pitch)?;
        inner.dirty = false;
        Ok(())
    }

    pub fn backend_srv(&self) -> B::ShaderResourceView {
        self.inner.borrow().backend_srv.clone()
    }

    pub fn staged_bytes(&self) -> Vec<u8> {
        self.inner.borrow().sys_mem.clone()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::backend_null::RecordingBackend;

    #[test]
    fn lock_unlock_round_trips_staging_bytes() {
        let backend = RecordingBackend::new();
        let vb = VertexBuffer::create(&backend, 16, ResourceUsage::Dynamic, 0).unwrap();

        let written = [1u8, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16];
        unsafe {
            let ptr = vb.lock().unwrap();
            std::ptr::copy_nonoverlapping(written.as_ptr(), ptr, written.len());
        }
        vb.unlock(&backend).unwrap();
        assert_eq!(vb.staged_bytes(), written);

        unsafe {
            let ptr = vb.lock().unwrap();
            let readback = std::slice::from_raw_parts(ptr, written.len());
            assert_eq!(readback, &written);
        }
        vb.unlock(&backend).unwrap();
    }

    #[test]
    fn lock_while_locked_fails_and_preserves_state() {
        let backend = RecordingBackend::new();
        let vb = VertexBuffer::create(&backend, 16, ResourceUsage::Dynamic, 0).unwrap();
        unsafe {
            let _first = vb.lock().unwrap();
            assert!(vb.lock().is_err());
        }
        vb.unlock(&backend).unwrap();
    }

    #[test]
    fn unlock_without_lock_fails() {
        let backend = RecordingBackend::new();
        let vb = VertexBuffer::create(&backend, 16, ResourceUsage::Dynamic, 0).unwrap();
        assert!(vb.unlock(&backend).is_err());
    }

    #[test]
    fn texture_staging_size_matches_pitch_times_height() {
        let backend = RecordingBackend::new();
        let tex = Texture2D::create(&backend, 8, 8, 1, ResourceUsage::Default, SourceFormat::A8R8G8B8).unwrap();
        assert_eq!(tex.pitch, 8 * 4);
        assert_eq!(tex.staged_bytes().len(), (8 * 4 * 8) as usize);
    }

    #[test]
    fn compressed_texture_staging_size_uses_block_height() {
        let backend = RecordingBackend::new();
        let tex = Texture2D::create(&backend, 8, 5, 1, ResourceUsage::Default, SourceFormat::Dxt1).unwrap();
        assert_eq!(tex.pitch, 16); // ceil(8/4) * 8
        assert_eq!(tex.staged_bytes().len(), (16 * 2) as usize); // ceil(5/4) == 2 blocks tall
    }

    #[test]
    fn refcount_discipline_releases_backend_buffer_once() {
        let backend = RecordingBackend::new();
        let vb = VertexBuffer::create(&backend, 16, ResourceUsage::Dynamic, 0).unwrap();
        assert_eq!(crate::refcount::add_ref(&vb), 2);
        assert_eq!(crate::refcount::add_ref(&vb), 3);
        assert_eq!(crate::refcount::release(Arc::clone(&vb)), 2);
        assert_eq!(crate::refcount::release(Arc::clone(&vb)), 1);
        assert_eq!(crate::refcount::release(vb), 0);
    }
}
