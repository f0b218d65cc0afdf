//! Demo driver: schedules a synthetic prop scene against a logging backend.

use glam::{Affine3A, Mat4, Vec3};
use model_fastpath::asset::{HardwareData, LodMetricTable, ModelCache, ModelFlags, Skeleton};
use model_fastpath::scene::{BoneMask, Drawable, LightingModel, ModelRenderable, StencilState};
use model_fastpath::scheduler::backend::{
    ArraySubmission, CacheHandle, DecalHandle, FlashlightInfo, LightingQuery, LightingResults,
    MaterialHandle, ModelInstanceHandle, RenderBackend, StaticLightingQuery,
    StaticLightingResults, TextureHandle, ViewProjector,
};
use model_fastpath::scheduler::{FallbackResources, ModelRenderScheduler, RenderMode};
use model_fastpath::{ModelAsset, RenderInstance, ScheduleSettings};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;

struct LoggingBackend;

impl RenderBackend for LoggingBackend {
    fn compute_lighting(&mut self, queries: &[LightingQuery]) -> LightingResults {
        log::info!("standard lighting query for {} instances", queries.len());
        LightingResults {
            states: vec![Default::default(); queries.len()],
            env_cubemaps: vec![None; queries.len()],
        }
    }

    fn compute_static_lighting(
        &mut self,
        queries: &[StaticLightingQuery],
    ) -> StaticLightingResults {
        log::info!("static lighting query for {} instances", queries.len());
        StaticLightingResults {
            states: vec![Default::default(); queries.len()],
            decal_states: vec![Default::default(); queries.len()],
            color_meshes: vec![None; queries.len()],
            env_cubemaps: vec![None; queries.len()],
            cache_handles: vec![CacheHandle(0)],
        }
    }

    fn decal_handles(&mut self, instances: &[ModelInstanceHandle]) -> Vec<DecalHandle> {
        vec![DecalHandle::INVALID; instances.len()]
    }

    fn flashlight_info(&mut self, _: &[ModelInstanceHandle], _: usize) -> FlashlightInfo {
        FlashlightInfo::default()
    }

    fn forced_material_override(&mut self, material: Option<MaterialHandle>) {
        log::info!("material override -> {:?}", material);
    }

    fn end_depth_prepass(&mut self) {
        log::info!("depth prepass barrier");
    }

    fn draw_model_array(&mut self, submission: &ArraySubmission<'_>) {
        log::info!(
            "draw_model_array: {} groups, {} instances, flags {:?}",
            submission.groups.len(),
            submission.instances.len(),
            submission.flags
        );
        for group in submission.groups {
            let name = submission
                .models
                .get(group.model)
                .map(|m| m.name.as_str())
                .unwrap_or("<unknown>");
            log::info!(
                "  group '{}': {} instances{}",
                name,
                group.instance_count,
                if group.wants_stencil { " [stencil]" } else { "" }
            );
        }
    }

    fn draw_shadow_array(&mut self, submission: &ArraySubmission<'_>) {
        log::info!(
            "draw_shadow_array: {} groups, {} instances, flags {:?}",
            submission.groups.len(),
            submission.instances.len(),
            submission.flags
        );
    }

    fn release_static_lighting(&mut self, handles: &[CacheHandle]) {
        log::info!("released {} color mesh handles", handles.len());
    }
}

struct PropDrawable {
    origin: Vec3,
    instance: ModelInstanceHandle,
    skin: i32,
    body: i32,
}

impl Drawable for PropDrawable {
    fn render_origin(&self) -> Vec3 {
        self.origin
    }

    fn to_world(&self) -> Affine3A {
        Affine3A::from_translation(self.origin)
    }

    fn skin(&self) -> i32 {
        self.skin
    }

    fn body(&self) -> i32 {
        self.body
    }

    fn model_instance(&self) -> ModelInstanceHandle {
        self.instance
    }

    fn setup_bones(&self, _mask: BoneMask, _time: f32, out: &mut [Affine3A]) -> bool {
        for m in out.iter_mut() {
            *m = Affine3A::from_translation(self.origin);
        }
        true
    }
}

struct PropRenderable {
    lighting: LightingModel,
    stencil: bool,
}

impl ModelRenderable for PropRenderable {
    fn lighting_model(&self) -> LightingModel {
        self.lighting
    }

    fn stencil_state(&self) -> Option<StencilState> {
        self.stencil.then(StencilState::default)
    }
}

fn build_models(cache: &mut ModelCache) -> Vec<model_fastpath::Handle<ModelAsset>> {
    let hardware = |lods: usize| HardwareData {
        lod_count: lods,
        root_lod: 0,
        metric: LodMetricTable::new(100.0, (1..lods).map(|i| i as f32 * 4.0).collect()),
    };

    vec![
        cache.insert(
            ModelAsset::new(
                "props/crate",
                ModelFlags::VERTEX_LIT | ModelFlags::USES_ENV_CUBEMAP,
                Skeleton::single_bone(),
            )
            .with_hardware(hardware(3)),
        ),
        cache.insert(
            ModelAsset::new(
                "props/barrel",
                ModelFlags::STATIC_LIT | ModelFlags::HAS_SHADOW_LOD,
                Skeleton::with_bones(2),
            )
            .with_hardware(hardware(4)),
        ),
        cache.insert(
            ModelAsset::new("props/banned", ModelFlags::RENDER_DISABLED, Skeleton::single_bone())
                .with_hardware(hardware(1)),
        ),
        // Deliberately missing hardware data: exercises the fail-soft path.
        cache.insert(ModelAsset::new(
            "props/corrupt",
            ModelFlags::VERTEX_LIT,
            Skeleton::single_bone(),
        )),
    ]
}

fn build_scene(
    models: &[model_fastpath::Handle<ModelAsset>],
    rng: &mut SmallRng,
) -> Vec<RenderInstance> {
    let mut instances = Vec::new();
    for i in 0..48 {
        let model = models[i % models.len()];
        let origin = Vec3::new(
            rng.gen_range(-64.0..64.0),
            rng.gen_range(-64.0..64.0),
            rng.gen_range(-256.0..-16.0),
        );
        let drawable = Arc::new(PropDrawable {
            origin,
            instance: ModelInstanceHandle(i as u32),
            skin: rng.gen_range(0..3),
            body: rng.gen_range(0..2),
        });
        let lighting = if i % models.len() == 1 {
            LightingModel::StaticProp
        } else {
            LightingModel::Standard
        };
        let mut instance = RenderInstance::new(model, drawable).with_renderable(Arc::new(
            PropRenderable {
                lighting,
                stencil: i % 16 == 0,
            },
        ));
        // A few attached children to exercise dependency ordering.
        if i % 12 == 5 {
            instance = instance.attached_to(i - 1);
        }
        instances.push(instance);
    }
    instances
}

fn main() {
    let _ = env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .try_init();

    let mut cache = ModelCache::new();
    let models = build_models(&mut cache);
    let mut rng = SmallRng::seed_from_u64(7);
    let instances = build_scene(&models, &mut rng);

    let mut settings = ScheduleSettings::load_from_path("settings.json");
    settings.deferred_stencil = true;

    let mut scheduler = ModelRenderScheduler::new(
        settings,
        FallbackResources {
            default_cubemap: TextureHandle(0),
            debug_material: MaterialHandle(0),
            shadow_build_material: MaterialHandle(1),
        },
    );

    let projector = ViewProjector {
        view_proj: Mat4::perspective_rh(1.0, 16.0 / 9.0, 1.0, 4096.0)
            * Mat4::look_at_rh(Vec3::ZERO, Vec3::NEG_Z, Vec3::Y),
        view_up: Vec3::Y,
        viewport_height: 1080.0,
    };

    let mut backend = LoggingBackend;
    for mode in [
        RenderMode::Standard,
        RenderMode::ShadowDepth {
            include_translucent: false,
        },
        RenderMode::RttShadow,
    ] {
        let summary = scheduler.draw_models(&instances, &cache, mode, &mut backend, &projector, 0.0);
        log::info!(
            "{:?}: {} groups, {} drawn, {} submissions, {} pose bases",
            mode,
            summary.group_count,
            summary.drawn_instance_count,
            summary.submissions,
            summary.basis_conversions
        );
    }
}
