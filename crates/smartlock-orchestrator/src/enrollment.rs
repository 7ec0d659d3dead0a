use crate::{
    error::{OrchestratorError, Result},
    known_faces::KnownFaceCache,
};
use smartlock_hardware::FaceRecognizer;
use smartlock_storage::{EnrollmentRecord, PersistenceGateway};
use std::{path::Path, sync::Arc};
use tracing::{debug, info, warn};

/// Adds face embeddings for named identities.
pub struct Enroller<G> {
    recognizer: Arc<dyn FaceRecognizer>,
    gateway: Arc<G>,
    known_faces: Arc<KnownFaceCache>,
}

impl<G: PersistenceGateway + 'static> Enroller<G> {
    pub fn new(
        recognizer: Arc<dyn FaceRecognizer>,
        gateway: Arc<G>,
        known_faces: Arc<KnownFaceCache>,
    ) -> Self {
        Self {
            recognizer,
            gateway,
            known_faces,
        }
    }

    /// Enroll the face in `image` under `name`.
    ///
    /// When the image shows several faces the first one is used. The identity
    /// is created on first enrollment and reused afterwards. On success the
    /// known-face set is reloaded so the next episode can match the new face.
    ///
    /// # Errors
    ///
    /// [`OrchestratorError::NoFaceFound`] when the image has no face;
    /// recognizer and storage failures otherwise.
    pub async fn enroll(&self, name: &str, image: &Path) -> Result<EnrollmentRecord> {
        let recognizer = Arc::clone(&self.recognizer);
        let path = image.to_path_buf();
        let encodings =
            tokio::task::spawn_blocking(move || recognizer.encode_artifact(&path)).await??;

        if encodings.len() > 1 {
            debug!(faces = encodings.len(), image = %image.display(), "Several faces, using the first");
        }
        let Some(encoding) = encodings.into_iter().next() else {
            return Err(OrchestratorError::NoFaceFound {
                path: image.to_path_buf(),
            });
        };

        let record = self
            .gateway
            .enroll_embedding(name, &encoding, &image.display().to_string())
            .await?;
        info!(
            identity = %name,
            identity_id = record.identity_id,
            created = record.identity_created,
            "Face enrolled"
        );

        if let Err(e) = self.known_faces.reload(self.gateway.as_ref()).await {
            warn!(error = %e, "Enrolled, but reloading known faces failed");
        }
        Ok(record)
    }
}
