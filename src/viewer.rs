//! The per-viewer load orchestrator.
//!
//! A [`StepViewer`] owns what is on screen: the current model, the loading
//! indicator, the camera and its controls. Each call to
//! [`set_source`](StepViewer::set_source) supersedes the previous one; a
//! superseded or disposed request never touches any of that state.

use std::{
    any::Any,
    cell::{Cell, Ref, RefCell},
    future::Future,
    rc::Rc,
    time::Duration,
};

use cgmath::{Deg, Point3};
use futures::future::{self, FutureExt, LocalBoxFuture};
use instant::Instant;
use winit::event::WindowEvent;

use crate::{
    camera::{Camera, ControlsConfig, OrbitController, fit_camera_to_object},
    data_structures::scene_graph::SceneNode,
    error::LoadError,
    load::{LoadOutcome, LoadState, RequestTracker, center_model},
    resources::{StepLoader, fetch::SourceReference},
};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewerConfig {
    pub camera_position: Point3<f32>,
    pub fovy: Deg<f32>,
    /// Margin factor when framing a model; `1.5` leaves 50 % around it.
    pub fit_offset: f32,
    pub controls: ControlsConfig,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            camera_position: Point3::new(10.0, 10.0, 80.0),
            fovy: Deg(75.0),
            fit_offset: 1.5,
            controls: ControlsConfig::default(),
        }
    }
}

pub struct StepViewer {
    loader: Rc<StepLoader>,
    config: ViewerConfig,
    requests: RequestTracker,
    state: Cell<LoadState>,
    loading: Cell<bool>,
    model: RefCell<Option<Box<dyn SceneNode>>>,
    model_version: Cell<u64>,
    camera: RefCell<Camera>,
    controls: RefCell<OrbitController>,
    last_frame: Cell<Instant>,
}

impl StepViewer {
    /// Creates a viewer and starts the conversion engine in the background.
    /// A failed start is only logged here; the first load reports it.
    pub fn new(loader: Rc<StepLoader>, config: ViewerConfig) -> Self {
        let preload = loader.start_preload();
        #[cfg(target_arch = "wasm32")]
        wasm_bindgen_futures::spawn_local(async move {
            match preload.await {
                Ok(()) => log::info!("STEP loader preloaded"),
                Err(e) => log::error!("Failed to preload STEP loader: {}", e),
            }
        });
        // Without a local executor the started engine future is picked up by the first load.
        #[cfg(not(target_arch = "wasm32"))]
        drop(preload);

        Self {
            loader,
            requests: RequestTracker::new(),
            state: Cell::new(LoadState::Idle),
            loading: Cell::new(false),
            model: RefCell::new(None),
            model_version: Cell::new(0),
            camera: RefCell::new(Camera::new(config.camera_position, config.fovy)),
            controls: RefCell::new(OrbitController::new(config.controls)),
            last_frame: Cell::new(Instant::now()),
            config,
        }
    }

    /// Warms up the conversion engine. Failures are logged; the first real
    /// load will report them again.
    pub async fn preload(&self) {
        match self.loader.preload().await {
            Ok(()) => log::info!("STEP loader preloaded"),
            Err(e) => log::error!("Failed to preload STEP loader: {}", e),
        }
    }

    /// Starts loading `source` and returns the future that drives it.
    ///
    /// The previous request is cancelled and the viewer marked as loading
    /// before this returns. When the returned future completes with
    /// [`LoadOutcome::Ready`], the new model is centred, displayed and framed.
    /// On failure the previous model stays. A cancelled request changes nothing.
    pub fn set_source(&self, source: SourceReference) -> impl Future<Output = LoadOutcome> + '_ {
        let request = self.requests.begin();
        if request.is_some() {
            self.state.set(LoadState::Loading);
            self.loading.set(true);
        }

        async move {
            let Some(request) = request else {
                return LoadOutcome::Cancelled;
            };
            let result = self.loader.load_step(&source, &request.token).await;
            if !self.requests.is_current(&request) {
                log::debug!("Discarding result of superseded request {}", request.generation);
                return LoadOutcome::Cancelled;
            }
            match result {
                Ok(mut model) => {
                    center_model(model.as_mut());
                    fit_camera_to_object(
                        &mut self.camera.borrow_mut(),
                        Some(&mut self.controls.borrow_mut()),
                        model.as_ref(),
                        self.config.fit_offset,
                    );
                    log::info!("Displaying STEP model with {} meshes", model.mesh_count());
                    self.replace_model(Some(model));
                    self.finish(LoadState::Ready);
                    LoadOutcome::Ready
                }
                Err(e) if e.is_cancelled() => {
                    log::debug!("STEP load {} cancelled", request.generation);
                    LoadOutcome::Cancelled
                }
                Err(e) => {
                    log::error!("Failed to load STEP model: {}", e);
                    self.finish(LoadState::Failed);
                    LoadOutcome::Failed(e)
                }
            }
        }
    }

    /// Like [`set_source`](Self::set_source) for a value of unknown type.
    /// Values that are neither a URL nor binary data clear the viewer without
    /// touching the network.
    pub fn set_source_any(&self, value: Box<dyn Any>) -> LocalBoxFuture<'_, LoadOutcome> {
        match SourceReference::from_any(value) {
            Ok(source) => self.set_source(source).boxed_local(),
            Err(e) => future::ready(self.reject(e)).boxed_local(),
        }
    }

    /// The `JsValue` counterpart of [`set_source_any`](Self::set_source_any).
    #[cfg(target_arch = "wasm32")]
    pub fn set_source_js(&self, value: &wasm_bindgen::JsValue) -> LocalBoxFuture<'_, LoadOutcome> {
        match SourceReference::from_js(value) {
            Ok(source) => self.set_source(source).boxed_local(),
            Err(e) => future::ready(self.reject(e)).boxed_local(),
        }
    }

    fn reject(&self, e: LoadError) -> LoadOutcome {
        log::warn!("Invalid STEP source: {}", e);
        if self.requests.begin().is_some() {
            self.replace_model(None);
            self.finish(LoadState::Idle);
        }
        LoadOutcome::Rejected(e)
    }

    fn finish(&self, state: LoadState) {
        self.state.set(state);
        self.loading.set(false);
    }

    fn replace_model(&self, model: Option<Box<dyn SceneNode>>) {
        *self.model.borrow_mut() = model;
        self.model_version.set(self.model_version.get() + 1);
    }

    /// Cancels any in-flight request. Nothing is applied afterwards.
    pub fn dispose(&self) {
        if self.requests.is_disposed() {
            return;
        }
        self.requests.dispose();
        if self.loading.get() {
            self.finish(LoadState::Cancelled);
        }
    }

    pub fn state(&self) -> LoadState {
        self.state.get()
    }

    pub fn is_loading(&self) -> bool {
        self.loading.get()
    }

    pub fn model(&self) -> Ref<'_, Option<Box<dyn SceneNode>>> {
        self.model.borrow()
    }

    /// Bumped every time the displayed model is swapped or cleared.
    pub fn model_version(&self) -> u64 {
        self.model_version.get()
    }

    pub fn camera(&self) -> Ref<'_, Camera> {
        self.camera.borrow()
    }

    pub fn controls(&self) -> Ref<'_, OrbitController> {
        self.controls.borrow()
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    pub fn loader(&self) -> &Rc<StepLoader> {
        &self.loader
    }

    /// Tells the viewer the size of its surface. Hosts call this once the
    /// surface exists; later `Resized` events keep it current.
    pub fn resize(&self, width: u32, height: u32) {
        self.camera.borrow_mut().resize(width, height);
        self.controls.borrow_mut().set_viewport(width, height);
    }

    /// Feeds input to the controls and keeps the camera aspect in sync.
    pub fn handle_window_event(&self, event: &WindowEvent) -> bool {
        if let WindowEvent::Resized(size) = event {
            self.camera.borrow_mut().resize(size.width, size.height);
        }
        self.controls.borrow_mut().process_window_event(event)
    }

    /// Advances the damped controls by one frame. Returns the time since the
    /// previous tick.
    pub fn tick(&self) -> Duration {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_frame.replace(now));
        self.controls
            .borrow_mut()
            .update_camera(&mut self.camera.borrow_mut());
        elapsed
    }
}

impl Drop for StepViewer {
    fn drop(&mut self) {
        self.requests.dispose();
    }
}
