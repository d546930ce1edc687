//! Fixed-function translation engine: the emulated device state, the
//! FFP-to-programmable pipeline emulator, the state-object translator, and
//! resource management with CPU-staged lock/unlock semantics.
//!
//! The legacy vtable/ABI adapter that exposes these operations to relinked
//! game code, and construction of the concrete `BackendDevice` (real device,
//! swap chain, window), are external collaborators and live outside this
//! crate.

pub mod backend_null;
pub mod color;
pub mod config;
pub mod device;
pub mod error;
pub mod format;
pub mod legacy_ids;
pub mod pipeline;
pub mod refcount;
pub mod resource;
pub mod state_object;
pub mod state_store;
pub mod vertex_format;

pub use config::ShimOptions;
pub use device::{ClearFlags, Device, PrimitiveType, ShaderHandle};
pub use error::{ShimError, ShimResult};
pub use format::SourceFormat;
pub use resource::{IndexBuffer, Texture2D, VertexBuffer};
pub use vertex_format::VertexFormatFlags;
