use std::{future::Future, rc::Rc};

use futures::FutureExt;

use crate::{
    cancel::CancelToken,
    data_structures::scene_graph::SceneNode,
    engine::EngineBinding,
    error::{EngineInitError, LoadResult},
    resources::{
        cache::StepModelCache,
        fetch::{BinaryFetcher, SourceReference, fetch_binary},
        mesh::build_scene,
    },
};

/**
 * This module contains all logic for turning STEP sources into scene graphs:
 * fetching bytes, running the conversion engine, building meshes and caching
 * the results.
 */
pub mod cache;
pub mod fetch;
pub mod mesh;

/// The fetch → convert → build pipeline shared by every viewer on a page.
pub struct StepLoader {
    engine: Rc<EngineBinding>,
    fetcher: Box<dyn BinaryFetcher>,
    cache: StepModelCache,
}

#[cfg(target_arch = "wasm32")]
thread_local! {
    static SHARED: Rc<StepLoader> = Rc::new(StepLoader::new(
        crate::engine::occt::occt_binding(),
        fetch::HttpFetcher::default(),
    ));
}

impl StepLoader {
    pub fn new(engine: Rc<EngineBinding>, fetcher: impl BinaryFetcher + 'static) -> Self {
        Self {
            engine,
            fetcher: Box::new(fetcher),
            cache: StepModelCache::new(),
        }
    }

    /// The page-wide loader: `occt-import-js` engine, HTTP fetcher, one cache.
    #[cfg(target_arch = "wasm32")]
    pub fn shared() -> Rc<StepLoader> {
        SHARED.with(Rc::clone)
    }

    /// Starts the engine ahead of the first load.
    pub async fn preload(&self) -> Result<(), EngineInitError> {
        self.start_preload().await
    }

    /// Starts the engine now and returns a future for its outcome that does
    /// not borrow the loader.
    pub fn start_preload(&self) -> impl Future<Output = Result<(), EngineInitError>> + 'static {
        self.engine.start().map(|engine| engine.map(|_| ()))
    }

    pub fn engine(&self) -> &Rc<EngineBinding> {
        &self.engine
    }

    pub fn cache(&self) -> &StepModelCache {
        &self.cache
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Loads `source` into a scene graph owned by the caller.
    ///
    /// URL sources are served from the cache after their first successful
    /// build; binary sources are always converted and never cached. A
    /// conversion that finishes after `token` was cancelled is still cached,
    /// but the caller gets [`LoadError::Cancelled`](crate::error::LoadError::Cancelled).
    pub async fn load_step(
        &self,
        source: &SourceReference,
        token: &CancelToken,
    ) -> LoadResult<Box<dyn SceneNode>> {
        token.run_until_cancelled(self.engine.ensure_engine()).await??;

        let model = match source.cache_key() {
            Some(url) => {
                self.cache
                    .get_or_build(url, || self.convert(source, token))
                    .await?
            }
            None => self.convert(source, token).await?,
        };
        token.check()?;
        Ok(model)
    }

    async fn convert(
        &self,
        source: &SourceReference,
        token: &CancelToken,
    ) -> LoadResult<Box<dyn SceneNode>> {
        let bytes = fetch_binary(source, self.fetcher.as_ref(), token).await?;
        token.check()?;
        let result = self.engine.convert(&bytes).await?;
        build_scene(&result, &model_name(source))
    }
}

fn model_name(source: &SourceReference) -> String {
    match source {
        SourceReference::Url(url) => url
            .rsplit('/')
            .next()
            .filter(|name| !name.is_empty())
            .unwrap_or(url)
            .to_string(),
        SourceReference::Binary(_) => "step_model".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_names_come_from_the_url_path() {
        let source = SourceReference::url("https://cdn.test/parts/bracket.step").unwrap();
        assert_eq!(model_name(&source), "bracket.step");
        assert_eq!(model_name(&SourceReference::from(vec![0u8])), "step_model");
    }
}
