//! Device State Store.
//!
//! Flat, enum-indexed stores for render states, per-stage texture-stage
//! states, transforms, viewport, material and lights. Plain setters/getters;
//! the only setter with an eager backend effect is [`StateStore::set_viewport`].

use shim_backend_traits::{BackendDevice, Viewport};

use crate::error::{ShimError, ShimResult};
use crate::legacy_ids::{cmp_func, cull_mode, fill_mode, rs, shade_mode};

pub const MAX_RENDER_STATES: usize = 256;
pub const MAX_STAGES: usize = 4;
pub const MAX_TSS_PER_STAGE: usize = 32;
pub const MAX_TRANSFORMS: usize = 512;
pub const MAX_LIGHTS: usize = 64;

pub type Matrix4 = [f32; 16];

pub const IDENTITY: Matrix4 = [
    1.0, 0.0, 0.0, 0.0, //
    0.0, 1.0, 0.0, 0.0, //
    0.0, 0.0, 1.0, 0.0, //
    0.0, 0.0, 0.0, 1.0,
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Material {
    pub diffuse: [f32; 4],
    pub ambient: [f32; 4],
    pub specular: [f32; 4],
    pub emissive: [f32; 4],
    pub power: f32,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            diffuse: [1.0, 1.0, 1.0, 1.0],
            ambient: [0.0, 0.0, 0.0, 1.0],
            specular: [0.0, 0.0, 0.0, 1.0],
            emissive: [0.0, 0.0, 0.0, 1.0],
            power: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightType {
    Point,
    Spot,
    Directional,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Light {
    pub light_type: LightType,
    pub diffuse: [f32; 4],
    pub specular: [f32; 4],
    pub ambient: [f32; 4],
    pub position: [f32; 3],
    pub direction: [f32; 3],
    pub range: f32,
    pub falloff: f32,
    pub attenuation: [f32; 3],
    pub theta: f32,
    pub phi: f32,
}

impl Default for Light {
    fn default() -> Self {
        Self {
            light_type: LightType::Directional,
            diffuse: [1.0, 1.0, 1.0, 1.0],
            specular: [0.0, 0.0, 0.0, 0.0],
            ambient: [0.0, 0.0, 0.0, 0.0],
            position: [0.0, 0.0, 0.0],
            direction: [0.0, 0.0, 1.0],
            range: f32::MAX,
            falloff: 1.0,
            attenuation: [1.0, 0.0, 0.0],
            theta: 0.0,
            phi: 0.0,
        }
    }
}

pub struct StateStore {
    render_states: [u32; MAX_RENDER_STATES],
    tss: [[u32; MAX_TSS_PER_STAGE]; MAX_STAGES],
    transforms: [Matrix4; MAX_TRANSFORMS],
    viewport: Viewport,
    material: Material,
    lights: Vec<Option<Light>>,
    lights_enabled: Vec<bool>,
}

impl StateStore {
    /// Legacy initial defaults.
    pub fn new(backbuffer_width: u32, backbuffer_height: u32) -> Self {
        let mut render_states = [0u32; MAX_RENDER_STATES];
        render_states[rs::ZENABLE as usize] = 1;
        render_states[rs::ZWRITEENABLE as usize] = 1;
        render_states[rs::ZFUNC as usize] = cmp_func::LESSEQUAL;
        render_states[rs::FILLMODE as usize] = fill_mode::SOLID;
        render_states[rs::SHADEMODE as usize] = shade_mode::GOURAUD;
        render_states[rs::CULLMODE as usize] = cull_mode::CCW;
        render_states[rs::ALPHABLENDENABLE as usize] = 0;
        render_states[rs::SRCBLEND as usize] = crate::legacy_ids::blend_factor::ONE;
        render_states[rs::DESTBLEND as usize] = crate::legacy_ids::blend_factor::ZERO;
        render_states[rs::ALPHATESTENABLE as usize] = 0;
        render_states[rs::ALPHAFUNC as usize] = cmp_func::ALWAYS;
        render_states[rs::ALPHAREF as usize] = 0;
        render_states[rs::STENCILENABLE as usize] = 0;
        render_states[rs::COLORWRITEENABLE as usize] =
            shim_backend_traits::ColorWriteMask::ALL.bits() as u32;

        Self {
            render_states,
            tss: [[0u32; MAX_TSS_PER_STAGE]; MAX_STAGES],
            transforms: [IDENTITY; MAX_TRANSFORMS],
            viewport: Viewport {
                x: 0.0,
                y: 0.0,
                width: backbuffer_width as f32,
                height: backbuffer_height as f32,
                min_depth: 0.0,
                max_depth: 1.0,
            },
            material: Material::default(),
            lights: vec![None; MAX_LIGHTS],
            lights_enabled: vec![false; MAX_LIGHTS],
        }
    }

    /// Writes the slot if `id < 256`; out-of-range identifiers are silently
    /// ignored, matching legacy lenience.
    pub fn set_render_state(&mut self, id: u32, value: u32) {
        if let Some(slot) = self.render_states.get_mut(id as usize) {
            *slot = value;
        }
    }

    pub fn render_state(&self, id: u32) -> u32 {
        self.render_states.get(id as usize).copied().unwrap_or(0)
    }

    pub fn set_texture_stage_state(&mut self, stage: u32, id: u32, value: u32) -> ShimResult<()> {
        let slot = self
            .tss
            .get_mut(stage as usize)
            .and_then(|s| s.get_mut(id as usize))
            .ok_or(ShimError::InvalidArgument("texture stage state index out of range"))?;
        *slot = value;
        Ok(())
    }

    pub fn texture_stage_state(&self, stage: u32, id: u32) -> ShimResult<u32> {
        self.tss
            .get(stage as usize)
            .and_then(|s| s.get(id as usize))
            .copied()
            .ok_or(ShimError::InvalidArgument("texture stage state index out of range"))
    }

    pub fn set_transform(&mut self, id: u32, matrix: Matrix4) -> ShimResult<()> {
        let slot = self
            .transforms
            .get_mut(id as usize)
            .ok_or(ShimError::InvalidArgument("transform index out of range"))?;
        *slot = matrix;
        Ok(())
    }

    pub fn transform(&self, id: u32) -> ShimResult<Matrix4> {
        self.transforms
            .get(id as usize)
            .copied()
            .ok_or(ShimError::InvalidArgument("transform index out of range"))
    }

    /// The one setter with an eager backend effect: pushes the viewport to
    /// the backend immediately because it is not part of any state-object
    /// hash.
    pub fn set_viewport<B: BackendDevice>(&mut self, backend: &B, viewport: Viewport) {
        self.viewport = viewport;
        backend.rs_set_viewport(&viewport);
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn set_material(&mut self, material: Material) {
        self.material = material;
    }

    pub fn material(&self) -> Material {
        self.material
    }

    pub fn set_light(&mut self, index: u32, light: Light) -> ShimResult<()> {
        let slot = self
            .lights
            .get_mut(index as usize)
            .ok_or(ShimError::InvalidArgument("light index out of range"))?;
        *slot = Some(light);
        Ok(())
    }

    pub fn light(&self, index: u32) -> ShimResult<Light> {
        self.lights
            .get(index as usize)
            .ok_or(ShimError::InvalidArgument("light index out of range"))?
            .ok_or(ShimError::InvalidArgument("light index not set"))
    }

    pub fn light_enable(&mut self, index: u32, enable: bool) -> ShimResult<()> {
        let slot = self
            .lights_enabled
            .get_mut(index as usize)
            .ok_or(ShimError::InvalidArgument("light index out of range"))?;
        *slot = enable;
        Ok(())
    }

    pub fn is_light_enabled(&self, index: u32) -> bool {
        self.lights_enabled.get(index as usize).copied().unwrap_or(false)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn render_state_round_trips_for_all_in_range_indices() {
        let mut store = StateStore::new(640, 480);
        for id in 0..MAX_RENDER_STATES as u32 {
            store.set_render_state(id, id * 7 + 1);
        }
        for id in 0..MAX_RENDER_STATES as u32 {
            assert_eq!(store.render_state(id), id * 7 + 1);
        }
    }

    #[test]
    fn render_state_out_of_range_is_silently_ignored() {
        let mut store = StateStore::new(640, 480);
        store.set_render_state(10_000, 0xDEADBEEF);
        assert_eq!(store.render_state(10_000), 0);
    }

    #[test]
    fn texture_stage_state_round_trips_and_bounds_checks() {
        let mut store = StateStore::new(640, 480);
        for stage in 0..MAX_STAGES as u32 {
            for id in 0..MAX_TSS_PER_STAGE as u32 {
                store.set_texture_stage_state(stage, id, stage * 100 + id).unwrap();
            }
        }
        for stage in 0..MAX_STAGES as u32 {
            for id in 0..MAX_TSS_PER_STAGE as u32 {
                assert_eq!(store.texture_stage_state(stage, id).unwrap(), stage * 100 + id);
            }
        }
        assert!(store.set_texture_stage_state(4, 0, 1).is_err());
        assert!(store.set_texture_stage_state(0, 32, 1).is_err());
    }

    #[test]
    fn transform_round_trips_and_starts_identity() {
        let mut store = StateStore::new(640, 480);
        assert_eq!(store.transform(crate::legacy_ids::transform::WORLD).unwrap(), IDENTITY);
        let m = [2.0; 16];
        store.set_transform(crate::legacy_ids::transform::WORLD, m).unwrap();
        assert_eq!(store.transform(crate::legacy_ids::transform::WORLD).unwrap(), m);
    }

    #[test]
    fn material_and_light_round_trip() {
        let mut store = StateStore::new(640, 480);
        let mat = Material { power: 42.0, ..Material::default() };
        store.set_material(mat);
        assert_eq!(store.material(), mat);

        let light = Light { theta: 1.5, ..Light::default() };
        store.set_light(3, light).unwrap();
        assert_eq!(store.light(3).unwrap(), light);

        assert!(!store.is_light_enabled(3));
        store.light_enable(3, true).unwrap();
        assert!(store.is_light_enabled(3));
    }

    #[test]
    fn initial_defaults_match_legacy_table() {
        let store = StateStore::new(640, 480);
        assert_eq!(store.render_state(rs::ZENABLE), 1);
        assert_eq!(store.render_state(rs::ZWRITEENABLE), 1);
        assert_eq!(store.render_state(rs::ZFUNC), cmp_func::LESSEQUAL);
        assert_eq!(store.render_state(rs::FILLMODE), fill_mode::SOLID);
        assert_eq!(store.render_state(rs::SHADEMODE), shade_mode::GOURAUD);
        assert_eq!(store.render_state(rs::CULLMODE), cull_mode::CCW);
        assert_eq!(store.render_state(rs::ALPHABLENDENABLE), 0);
        assert_eq!(store.render_state(rs::ALPHATESTENABLE), 0);
        assert_eq!(store.render_state(rs::ALPHAFUNC), cmp_func::ALWAYS);
        assert_eq!(store.render_state(rs::STENCILENABLE), 0);
    }
}
