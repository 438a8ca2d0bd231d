use bytemuck::{Pod, Zeroable};
use framegraph_common::{EntityId, SplitMix64};
use framegraph_ecs::{ComponentStore, ErosionParams, Heightfield, Resource, ResourceKind};

/// Iteration count after which the parameters are re-rolled.
pub const RESET_AFTER_ITERATIONS: u32 = 1000;

/// GPU layout of the erosion shader's `Params` uniform.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct ErosionUniforms {
    pub rain_rate: f32,
    pub evaporation_rate: f32,
    pub sediment_capacity: f32,
    pub min_slope: f32,
    pub gravity: f32,
    pub iterations: f32,
    _pad: [f32; 2],
}

impl ErosionUniforms {
    pub fn to_bytes(&self) -> Vec<u8> {
        bytemuck::bytes_of(self).to_vec()
    }
}

impl From<&ErosionParams> for ErosionUniforms {
    fn from(p: &ErosionParams) -> Self {
        Self {
            rain_rate: p.rain_rate,
            evaporation_rate: p.evaporation_rate,
            sediment_capacity: p.sediment_capacity,
            min_slope: p.min_slope,
            gravity: p.gravity,
            iterations: p.iterations as f32,
            _pad: [0.0; 2],
        }
    }
}

/// Advances erosion parameters once per frame.
///
/// Only entities carrying both `ErosionParams` and `Heightfield` are touched.
/// Every `RESET_AFTER_ITERATIONS` steps the rain and evaporation rates are
/// re-rolled from the seeded generator, so runs are reproducible.
#[derive(Debug, Clone)]
pub struct ErosionSystem {
    rng: SplitMix64,
}

impl ErosionSystem {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: SplitMix64::new(seed),
        }
    }

    /// Step every eligible entity; returns how many were updated.
    pub fn step(&mut self, store: &mut ComponentStore) -> usize {
        let targets: Vec<EntityId> = store
            .components_of_type::<ErosionParams>()
            .iter()
            .map(|(e, _)| *e)
            .filter(|e| store.has_component::<Heightfield>(*e))
            .collect();

        for &entity in &targets {
            let Some(params) = store.get_component_mut::<ErosionParams>(entity) else {
                continue;
            };
            params.iterations += 1;
            if params.iterations > RESET_AFTER_ITERATIONS {
                params.iterations = 0;
                params.rain_rate = self.rng.next_f32() * 0.01;
                params.evaporation_rate = 0.01 + self.rng.next_f32() * 0.02;
                tracing::debug!(
                    %entity,
                    rain = params.rain_rate,
                    evaporation = params.evaporation_rate,
                    "erosion parameters re-rolled"
                );
            }
            let encoded = ErosionUniforms::from(&*params).to_bytes();

            if let Some(buffer) = store.get_component_mut::<Resource>(entity)
                && buffer.kind == ResourceKind::Buffer
            {
                buffer.data = Some(encoded);
            }
        }
        targets.len()
    }
}
