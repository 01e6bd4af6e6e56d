//! Cached remote questionnaires
//!
//! Prior submissions are fetched once per key and reused until the TTL
//! passes or a save invalidates them.

use crate::api::QuestionnaireApi;
use crate::config::SessionConfig;
use crate::error::ApiResult;
use moka::future::Cache;
use naavi_draft::DraftDocument;
use naavi_model::DraftKey;
use std::sync::Arc;

/// Remote snapshot cache in front of a [`QuestionnaireApi`]
#[derive(Clone)]
pub struct RemoteSnapshots {
    api: Arc<dyn QuestionnaireApi>,
    cache: Cache<DraftKey, Arc<DraftDocument>>,
}

impl std::fmt::Debug for RemoteSnapshots {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteSnapshots")
            .field("entries", &self.cache.entry_count())
            .finish_non_exhaustive()
    }
}

impl RemoteSnapshots {
    /// Cache sized and timed by `config`
    #[must_use]
    pub fn new(api: Arc<dyn QuestionnaireApi>, config: &SessionConfig) -> Self {
        Self {
            api,
            cache: Cache::builder()
                .max_capacity(config.remote_cache_capacity)
                .time_to_live(config.remote_cache_ttl())
                .build(),
        }
    }

    /// Backend behind the cache
    #[must_use]
    pub fn api(&self) -> &Arc<dyn QuestionnaireApi> {
        &self.api
    }

    /// Snapshot for `key`, fetched on a miss
    ///
    /// Failed fetches are not cached.
    ///
    /// # Errors
    /// Propagates the backend error.
    pub async fn fetch(&self, key: &DraftKey) -> ApiResult<Arc<DraftDocument>> {
        if let Some(doc) = self.cache.get(key).await {
            tracing::debug!(key = %key, "remote snapshot cache hit");
            return Ok(doc);
        }
        let doc = Arc::new(self.api.fetch_questionnaire(key).await?);
        self.cache.insert(key.clone(), Arc::clone(&doc)).await;
        Ok(doc)
    }

    /// Drop the cached snapshot for `key`
    pub async fn invalidate(&self, key: &DraftKey) {
        self.cache.invalidate(key).await;
    }
}
