//! Bookkeeping for source changes: which request is current, and what became of it.

use std::cell::{Cell, RefCell};

use cgmath::EuclideanSpace;

use crate::{
    cancel::CancelToken,
    data_structures::{bounds::BoundingBox, scene_graph::SceneNode},
    error::LoadError,
};

/// Where the newest request of a viewer stands.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum LoadState {
    #[default]
    Idle,
    Loading,
    Ready,
    Failed,
    Cancelled,
}

/// How a single request ended.
#[derive(Clone, Debug, PartialEq)]
pub enum LoadOutcome {
    /// The model was swapped in.
    Ready,
    /// The load failed; the previous model stays on screen.
    Failed(LoadError),
    /// A newer request or disposal superseded this one. Nothing was applied.
    Cancelled,
    /// The source could not be classified. The viewer was cleared.
    Rejected(LoadError),
}

impl LoadOutcome {
    pub fn state(&self) -> LoadState {
        match self {
            LoadOutcome::Ready => LoadState::Ready,
            LoadOutcome::Failed(_) => LoadState::Failed,
            LoadOutcome::Cancelled => LoadState::Cancelled,
            LoadOutcome::Rejected(_) => LoadState::Idle,
        }
    }
}

/// Handle of one in-flight request.
#[derive(Clone, Debug)]
pub struct Request {
    pub generation: u64,
    pub token: CancelToken,
}

/// Hands out requests so that only the newest one may touch viewer state.
#[derive(Debug, Default)]
pub struct RequestTracker {
    generation: Cell<u64>,
    current: RefCell<Option<CancelToken>>,
    disposed: Cell<bool>,
}

impl RequestTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancels the current request, if any, and starts a new one.
    /// Returns `None` once the tracker has been disposed.
    pub fn begin(&self) -> Option<Request> {
        if self.disposed.get() {
            return None;
        }
        let token = CancelToken::new();
        if let Some(previous) = self.current.replace(Some(token.clone())) {
            previous.cancel();
        }
        let generation = self.generation.get() + 1;
        self.generation.set(generation);
        Some(Request { generation, token })
    }

    /// Whether `request` may still apply its result.
    pub fn is_current(&self, request: &Request) -> bool {
        !self.disposed.get()
            && self.generation.get() == request.generation
            && !request.token.is_cancelled()
    }

    pub fn generation(&self) -> u64 {
        self.generation.get()
    }

    /// Cancels the current request and refuses any new ones.
    pub fn dispose(&self) {
        self.disposed.set(true);
        if let Some(current) = self.current.take() {
            current.cancel();
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.get()
    }
}

/// Moves `model` so that its bounding-box centre sits at the origin.
/// Returns the box as it was before centring.
pub fn center_model(model: &mut dyn SceneNode) -> BoundingBox {
    let bbox = model.bounding_box();
    if bbox.is_empty() {
        return bbox;
    }
    let mut local = *model.get_local_transform();
    local.position -= bbox.center().to_vec();
    model.set_local_transform(local);
    model.update_world_transform_all();
    bbox
}
