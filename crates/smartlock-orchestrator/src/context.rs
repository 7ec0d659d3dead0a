use crate::{
    arbiter::UnlockArbiter, enrollment::Enroller, known_faces::KnownFaceCache,
    merge::ArtifactMerger, remote::RemoteHandler, settings::PipelineSettings,
};
use smartlock_hardware::{CommandSink, FaceRecognizer};
use smartlock_storage::{PersistenceGateway, StorageResult};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Everything the orchestrator's workers share.
///
/// Built once at startup and cloned into each task. There is no global
/// state: the serial writer, recognizer, gateway and known-face cache all
/// travel through this value.
pub struct OrchestratorContext<G> {
    pub sink: Arc<dyn CommandSink>,
    pub recognizer: Arc<dyn FaceRecognizer>,
    pub merger: Arc<dyn ArtifactMerger>,
    pub gateway: Arc<G>,
    pub known_faces: Arc<KnownFaceCache>,
    pub settings: PipelineSettings,
    pub cancel: CancellationToken,
}

impl<G> Clone for OrchestratorContext<G> {
    fn clone(&self) -> Self {
        Self {
            sink: Arc::clone(&self.sink),
            recognizer: Arc::clone(&self.recognizer),
            merger: Arc::clone(&self.merger),
            gateway: Arc::clone(&self.gateway),
            known_faces: Arc::clone(&self.known_faces),
            settings: self.settings.clone(),
            cancel: self.cancel.clone(),
        }
    }
}

impl<G: PersistenceGateway + 'static> OrchestratorContext<G> {
    pub fn new(
        sink: Arc<dyn CommandSink>,
        recognizer: Arc<dyn FaceRecognizer>,
        merger: Arc<dyn ArtifactMerger>,
        gateway: Arc<G>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            sink,
            recognizer,
            merger,
            gateway,
            known_faces: Arc::new(KnownFaceCache::default()),
            settings,
            cancel: CancellationToken::new(),
        }
    }

    /// Use an externally owned shutdown token.
    pub fn with_cancel_token(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn arbiter(&self) -> UnlockArbiter<G> {
        UnlockArbiter::new(Arc::clone(&self.sink), Arc::clone(&self.gateway))
    }

    pub fn remote_handler(&self) -> RemoteHandler<G> {
        RemoteHandler::new(
            self.arbiter(),
            Arc::clone(&self.gateway),
            self.settings.refresh_days,
        )
    }

    pub fn enroller(&self) -> Enroller<G> {
        Enroller::new(
            Arc::clone(&self.recognizer),
            Arc::clone(&self.gateway),
            Arc::clone(&self.known_faces),
        )
    }

    /// Re-read enrolled faces from storage into the shared cache.
    pub async fn reload_known_faces(&self) -> StorageResult<usize> {
        self.known_faces.reload(self.gateway.as_ref()).await
    }
}
