//! Demo: load glTF models into a scene and wait until they are ready
//!
//! Usage: `asset_stage [asset_root] [model.glb ...]`

use std::path::Path;

use asset_stage::prelude::*;

/// Optional config file read from the working directory
const CONFIG_FILE: &str = "asset_stage.ron";

/// Frames to wait before giving up on outstanding handles
const MAX_FRAMES: u64 = 600;

fn load_config() -> StageConfig {
    if !Path::new(CONFIG_FILE).exists() {
        return StageConfig::default();
    }
    match StageConfig::load(CONFIG_FILE) {
        Ok(config) => {
            log::info!("Loaded config from {CONFIG_FILE}");
            config
        }
        Err(e) => {
            log::warn!("Ignoring {CONFIG_FILE}: {e}");
            StageConfig::default()
        }
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut args = std::env::args().skip(1);
    let mut config = load_config();
    if let Some(root) = args.next() {
        config = config.with_asset_root(root);
    }
    let models: Vec<String> = args.collect();

    log::info!("Asset root: {}", config.asset_root.display());
    let stage = AssetStage::new(config.clone(), GltfSource::new(config.asset_root.clone()));

    // Two requests per model; both share one fetch
    let mut handles = Vec::new();
    for (i, model) in models.iter().enumerate() {
        let stem = Path::new(model)
            .file_stem()
            .map_or_else(|| model.clone(), |stem| stem.to_string_lossy().into_owned());
        for copy in 0..2 {
            let request = InstanceRequest::new(model.as_str(), format!("{stem}#models"))
                .with_position(Vec3::new(i as f32 * 2.0, 0.0, copy as f32 * 2.0));
            match stage.create_instance(request) {
                Ok(handle) => {
                    stage.when_ready(handle.clone(), {
                        let handle = handle.clone();
                        move |ready| log::info!("{handle} ready: {ready:?}")
                    });
                    handles.push(handle);
                }
                Err(e) => log::error!("Request for {model} rejected: {e}"),
            }
        }
    }

    while stage.frame() < MAX_FRAMES {
        stage.tick();
        let settled = handles.iter().all(|handle| {
            stage.is_ready(handle)
                || matches!(
                    handle.name().and_then(|name| stage.request_state(name)),
                    Some(RequestState::Failed(_))
                )
        });
        if settled {
            break;
        }
    }

    let ready = handles.iter().filter(|handle| stage.is_ready(*handle)).count();
    log::info!(
        "{ready}/{} handles ready after {} frames",
        handles.len(),
        stage.frame()
    );
    for handle in handles.iter().filter(|handle| !stage.is_ready(*handle)) {
        if let Some(state) = handle.name().and_then(|name| stage.request_state(name)) {
            log::warn!("{handle}: {state:?}");
        }
    }

    stage.with_scene(|scene| {
        log::info!("Scene: {} entities, {} named instances", scene.len(), scene.names().count());
        for name in scene.names() {
            log::info!("  {name}");
        }
    });
    log::info!("{}", stage.stats().format_stats());

    stage.shutdown();
}
