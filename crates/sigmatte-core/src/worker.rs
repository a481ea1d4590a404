//! Off-thread matting behind a message-passing boundary
//!
//! A request moves the uploaded image bytes into the worker, which decodes,
//! mattes and crops them; the reply moves the encoded PNG back out. Dropping a [`PendingMatte`] before it resolves is
//! the cancellation: the worker notices the closed reply channel and skips
//! the job (or discards the result if it was already running).

use crate::error::MatteError;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

/// One encoded image (PNG or JPEG) to matte, owned by the request
#[derive(Debug)]
pub struct MatteRequest {
    pub encoded: Vec<u8>,
    pub strength: f32,
}

pub type MatteReply = Result<Vec<u8>, MatteError>;

#[derive(Debug)]
struct Job {
    request: MatteRequest,
    reply: oneshot::Sender<MatteReply>,
}

/// Handle to a dedicated matting thread. Cheap to clone; the thread exits
/// once every handle is dropped.
#[derive(Debug, Clone)]
pub struct MatteWorker {
    tx: mpsc::Sender<Job>,
}

impl MatteWorker {
    /// Start the worker thread with a bounded request queue
    pub fn spawn(queue_depth: usize) -> std::io::Result<Self> {
        let (tx, mut rx) = mpsc::channel::<Job>(queue_depth.max(1));

        std::thread::Builder::new()
            .name("sigmatte-worker".to_string())
            .spawn(move || {
                while let Some(job) = rx.blocking_recv() {
                    if job.reply.is_closed() {
                        debug!("matte request abandoned before start");
                        continue;
                    }
                    let result =
                        crate::remove_background(&job.request.encoded, job.request.strength);
                    if job.reply.send(result).is_err() {
                        debug!("matte result discarded, caller went away");
                    }
                }
                info!("matte worker stopped");
            })?;

        Ok(Self { tx })
    }

    /// Queue a request. Waits only for queue space, not for the result.
    pub async fn submit(&self, request: MatteRequest) -> Result<PendingMatte, MatteError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Job { request, reply })
            .await
            .map_err(|_| MatteError::WorkerGone)?;
        Ok(PendingMatte { rx })
    }

    /// Queue a request and wait for its PNG
    pub async fn run(&self, request: MatteRequest) -> MatteReply {
        self.submit(request).await?.wait().await
    }
}

/// A queued matte job; drop it to cancel
#[derive(Debug)]
pub struct PendingMatte {
    rx: oneshot::Receiver<MatteReply>,
}

impl PendingMatte {
    pub async fn wait(self) -> MatteReply {
        self.rx.await.map_err(|_| MatteError::WorkerGone)?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::RasterImage;

    fn ink_on_paper() -> Vec<u8> {
        // 10x10 white page with a 3x2 dark stroke
        let mut pixels = vec![255u8; 10 * 10 * 4];
        for y in 4..6 {
            for x in 2..5 {
                let i = (y * 10 + x) * 4;
                pixels[i..i + 3].copy_from_slice(&[10, 10, 10]);
            }
        }
        RasterImage::from_rgba(10, 10, pixels)
            .unwrap()
            .encode_png()
            .unwrap()
    }

    #[tokio::test]
    async fn test_worker_returns_cropped_png() {
        let worker = MatteWorker::spawn(4).unwrap();
        let png = worker
            .run(MatteRequest {
                encoded: ink_on_paper(),
                strength: 1.5,
            })
            .await
            .unwrap();

        let out = RasterImage::decode(&png).unwrap();
        assert_eq!((out.width(), out.height()), (3, 2));
        assert_eq!(out.pixel(1, 1), [0, 0, 0, 255]);
    }

    #[tokio::test]
    async fn test_worker_surfaces_empty_signature() {
        let worker = MatteWorker::spawn(1).unwrap();
        let blank = RasterImage::from_rgba(3, 3, vec![200; 36])
            .unwrap()
            .encode_png()
            .unwrap();
        let err = worker
            .run(MatteRequest {
                encoded: blank,
                strength: 1.0,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, MatteError::EmptySignature));
    }

    #[tokio::test]
    async fn test_worker_rejects_undecodable_bytes() {
        let worker = MatteWorker::spawn(1).unwrap();
        let err = worker
            .run(MatteRequest {
                encoded: b"not an image".to_vec(),
                strength: 1.0,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, MatteError::DecodeError(_)));
    }

    #[tokio::test]
    async fn test_dropped_request_does_not_stall_worker() {
        let worker = MatteWorker::spawn(2).unwrap();
        let abandoned = worker
            .submit(MatteRequest {
                encoded: ink_on_paper(),
                strength: 1.0,
            })
            .await
            .unwrap();
        drop(abandoned);

        let png = worker
            .run(MatteRequest {
                encoded: ink_on_paper(),
                strength: 1.0,
            })
            .await
            .unwrap();
        assert!(!png.is_empty());
    }
}
