//! step-ngin
//!
//! Loading and reviewing STEP (ISO 10303) CAD models on native and WASM.
//! A STEP source (a URL or bytes already in memory) is fetched, handed to a
//! geometry engine for tessellation, turned into a scene graph of coloured
//! meshes and cached per URL. A [`viewer::StepViewer`] drives that pipeline
//! for one view: it supersedes stale requests, centres and frames the model
//! and exposes camera and orbit controls to a wgpu renderer.
//!
//! High-level modules
//! - `camera`: camera, orbit controls and model framing
//! - `cancel`: cooperative cancellation of in-flight loads
//! - `data_structures`: transforms, meshes, bounding boxes and the scene graph
//! - `engine`: the geometry engine binding and its conversion result
//! - `error`: the error taxonomy of the loading pipeline
//! - `load`: request bookkeeping and model centring
//! - `pipelines`: the wgpu mesh pipeline and lighting uniforms
//! - `render`: GPU upload and drawing of a scene graph
//! - `resources`: fetcher, mesh builder, model cache and the [`StepLoader`]
//! - `viewer`: the per-view load orchestrator
//!

pub mod camera;
pub mod cancel;
pub mod data_structures;
pub mod engine;
pub mod error;
pub mod load;
pub mod pipelines;
pub mod render;
pub mod resources;
pub mod viewer;

// Re-exports commonly used types for convenience in downstream code.
pub use cgmath::*;
pub use error::{EngineInitError, LoadError, LoadResult};
pub use resources::{StepLoader, fetch::SourceReference};
pub use viewer::{StepViewer, ViewerConfig};
pub use winit::event::WindowEvent;

/// Installs the platform logger: `env_logger` natively (honouring
/// `RUST_LOG`), the browser console on wasm32. Calling it twice is harmless.
pub fn init_logging() {
    #[cfg(not(target_arch = "wasm32"))]
    {
        if let Err(e) = env_logger::try_init() {
            println!("Warning: Could not initialize logger: {}", e);
        };
    }

    #[cfg(target_arch = "wasm32")]
    {
        if let Err(e) = console_log::init_with_level(log::Level::Info) {
            web_sys::console::warn_1(&format!("Could not initialize logger: {}", e).into());
        }
    }
}
