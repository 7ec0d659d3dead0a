//! Recognition worker: the single consumer of the frame slot.

use crate::{
    arbiter::UnlockArbiter,
    episode::Episode,
    frame_slot::FrameSlot,
    known_faces::{KnownFaceCache, KnownFaceSet},
};
use smartlock_hardware::{FaceRecognizer, Frame};
use smartlock_storage::{AccessGrant, PersistenceGateway};
use std::{path::PathBuf, sync::Arc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

/// A live frame and the episode it was captured in.
#[derive(Debug, Clone)]
pub struct TaggedFrame {
    pub episode: Arc<Episode>,
    pub frame: Frame,
}

/// Find the identity shown in `frame`, if any.
///
/// Each face in the frame is compared against every known encoding; only the
/// closest known encoding is considered, and it is accepted only when the
/// recognizer calls it a match. Faces are tried in detection order.
pub fn identify(
    recognizer: &dyn FaceRecognizer,
    known: &KnownFaceSet,
    frame: &Frame,
    downsample_factor: u32,
) -> smartlock_hardware::Result<Option<String>> {
    let small = frame.downsample(downsample_factor);
    let locations = recognizer.locate_faces(&small)?;
    if locations.is_empty() {
        return Ok(None);
    }
    let encodings = recognizer.encode_faces(&small, &locations)?;

    for candidate in &encodings {
        let closest = known
            .iter()
            .map(|face| (face, recognizer.compare(&face.encoding, candidate)))
            .min_by(|(_, a), (_, b)| a.distance.total_cmp(&b.distance));

        if let Some((face, verdict)) = closest
            && verdict.is_match
        {
            trace!(identity = %face.name, distance = verdict.distance, "Closest known face");
            return Ok(Some(face.name.clone()));
        }
    }
    Ok(None)
}

pub struct RecognitionWorker<G> {
    frames: Arc<FrameSlot<TaggedFrame>>,
    known_faces: Arc<KnownFaceCache>,
    recognizer: Arc<dyn FaceRecognizer>,
    arbiter: UnlockArbiter<G>,
    output_dir: PathBuf,
    downsample_factor: u32,
    cancel: CancellationToken,
}

impl<G: PersistenceGateway + 'static> RecognitionWorker<G> {
    pub fn new(
        frames: Arc<FrameSlot<TaggedFrame>>,
        known_faces: Arc<KnownFaceCache>,
        recognizer: Arc<dyn FaceRecognizer>,
        arbiter: UnlockArbiter<G>,
        output_dir: PathBuf,
        downsample_factor: u32,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            frames,
            known_faces,
            recognizer,
            arbiter,
            output_dir,
            downsample_factor,
            cancel,
        }
    }

    /// Consume frames until shutdown or until the slot is closed.
    pub async fn run(self) -> crate::Result<()> {
        debug!("Recognition worker started");
        loop {
            let tagged = tokio::select! {
                _ = self.cancel.cancelled() => break,
                tagged = self.frames.take() => match tagged {
                    Some(tagged) => tagged,
                    None => break,
                },
            };
            self.process(tagged).await;
        }
        debug!("Recognition worker stopped");
        Ok(())
    }

    async fn process(&self, tagged: TaggedFrame) {
        let TaggedFrame { episode, frame } = tagged;
        if !episode.wants_frames() {
            return;
        }

        let known = self.known_faces.snapshot();
        if known.is_empty() {
            episode.mark_undetectable();
            info!(token = %episode.token(), "No enrolled faces, skipping episode");
            return;
        }

        let recognizer = Arc::clone(&self.recognizer);
        let factor = self.downsample_factor;
        let result = tokio::task::spawn_blocking(move || {
            identify(recognizer.as_ref(), &known, &frame, factor)
        })
        .await;

        let name = match result {
            Ok(Ok(Some(name))) => name,
            Ok(Ok(None)) => return,
            Ok(Err(e)) => {
                warn!(token = %episode.token(), error = %e, "Recognition failed, frame skipped");
                return;
            }
            Err(e) => {
                error!(token = %episode.token(), error = %e, "Recognition task panicked");
                return;
            }
        };

        if !episode.try_authorize() {
            debug!(token = %episode.token(), "Episode already authorized");
            return;
        }

        let artifact = self
            .output_dir
            .join(episode.token().merged_file_name())
            .display()
            .to_string();
        info!(token = %episode.token(), identity = %name, "Face recognized");
        self.arbiter.grant(AccessGrant::face(name, artifact)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::known_faces::KnownFace;
    use smartlock_hardware::mock::MockRecognizer;

    fn known(faces: &[(&str, u8)]) -> KnownFaceSet {
        KnownFaceSet::new(
            faces
                .iter()
                .map(|(name, seed)| KnownFace {
                    name: name.to_string(),
                    encoding: MockRecognizer::encoding_for(*seed),
                })
                .collect(),
        )
    }

    #[test]
    fn test_identify_picks_closest_match() {
        let (recognizer, handle) = MockRecognizer::new();
        handle.show_face(40, MockRecognizer::encoding_for(2));

        let set = known(&[("alice", 1), ("bob", 2)]);
        let frame = Frame::solid(20, 20, 40);
        let name = identify(&recognizer, &set, &frame, 5).unwrap();
        assert_eq!(name.as_deref(), Some("bob"));
    }

    #[test]
    fn test_identify_rejects_stranger() {
        let (recognizer, handle) = MockRecognizer::new();
        handle.show_face(40, MockRecognizer::encoding_for(9));

        let set = known(&[("alice", 1)]);
        let name = identify(&recognizer, &set, &Frame::solid(20, 20, 40), 5).unwrap();
        assert_eq!(name, None);
    }

    #[test]
    fn test_identify_second_face_can_match() {
        let (recognizer, handle) = MockRecognizer::new();
        handle.show_face(40, MockRecognizer::encoding_for(9));
        handle.show_face(40, MockRecognizer::encoding_for(1));

        let set = known(&[("alice", 1)]);
        let name = identify(&recognizer, &set, &Frame::solid(20, 20, 40), 5).unwrap();
        assert_eq!(name.as_deref(), Some("alice"));
    }

    #[test]
    fn test_identify_without_faces() {
        let (recognizer, _handle) = MockRecognizer::new();
        let set = known(&[("alice", 1)]);
        let name = identify(&recognizer, &set, &Frame::solid(20, 20, 3), 5).unwrap();
        assert_eq!(name, None);
    }

    #[test]
    fn test_identify_propagates_unavailable() {
        let (recognizer, handle) = MockRecognizer::new();
        handle.set_unavailable(true);
        let set = known(&[("alice", 1)]);
        assert!(identify(&recognizer, &set, &Frame::solid(4, 4, 0), 1).is_err());
    }
}
