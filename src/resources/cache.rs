//! Memoised conversion results, keyed by source URL.
//!
//! The cache owns one template scene per URL and only ever hands out deep
//! clones, so a viewer moving or re-centring its copy never affects anyone
//! else's. Entries live until [`StepModelCache::clear`]; there is no eviction.

use std::{cell::RefCell, collections::HashMap, future::Future};

use crate::{data_structures::scene_graph::SceneNode, error::LoadResult};

#[derive(Default)]
pub struct StepModelCache {
    templates: RefCell<HashMap<String, Box<dyn SceneNode>>>,
}

impl StepModelCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// A fresh clone of the template stored under `url`, if any.
    pub fn get(&self, url: &str) -> Option<Box<dyn SceneNode>> {
        self.templates.borrow().get(url).map(|template| template.clone_node())
    }

    /// Stores `template` under `url`, replacing any previous entry.
    pub fn insert(&self, url: &str, template: Box<dyn SceneNode>) {
        self.templates.borrow_mut().insert(url.to_string(), template);
    }

    /// Returns a clone of the cached template for `url`, or runs `build`,
    /// stores its result as the template and returns a clone of it.
    ///
    /// No lock is held while `build` runs: two callers missing the same URL
    /// at once both build, and the last one to finish wins the slot.
    pub async fn get_or_build<F, Fut>(&self, url: &str, build: F) -> LoadResult<Box<dyn SceneNode>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = LoadResult<Box<dyn SceneNode>>>,
    {
        if let Some(hit) = self.get(url) {
            log::debug!("STEP cache hit for {}", url);
            return Ok(hit);
        }
        log::debug!("STEP cache miss for {}", url);
        let template = build().await?;
        let model = template.clone_node();
        self.insert(url, template);
        Ok(model)
    }

    pub fn contains(&self, url: &str) -> bool {
        self.templates.borrow().contains_key(url)
    }

    pub fn len(&self) -> usize {
        self.templates.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.borrow().is_empty()
    }

    /// Drops every template.
    pub fn clear(&self) {
        self.templates.borrow_mut().clear();
    }
}
