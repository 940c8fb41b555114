use crate::capture::{CancellationToken, Capturer};
use crate::encoder::EncodedImage;
use crate::geometry::PageMetrics;
use crate::page::CaptureTarget;
use crate::{Error, Result};
use std::sync::mpsc::{self, Sender};
use std::thread;
use tokio::sync::oneshot;

enum Command {
    FullPage(CancellationToken, oneshot::Sender<Result<EncodedImage>>),
    Visible(oneshot::Sender<Result<EncodedImage>>),
    Metrics(oneshot::Sender<Result<PageMetrics>>),
    Close(oneshot::Sender<Result<()>>),
}

/// An async-friendly capturer backed by a dedicated worker thread.
///
/// The worker thread owns the page target and the synchronous [`Capturer`]
/// and executes commands sent from async tasks. Since there is exactly one
/// worker per target, captures requested concurrently run one after the
/// other, never interleaved on the same viewport.
#[derive(Clone)]
pub struct AsyncCapturer {
    cmd_tx: Sender<Command>,
}

impl AsyncCapturer {
    /// Spawn the worker. `make_target` runs on the worker thread so targets
    /// that are not `Send` (browser tabs, for instance) can be used.
    pub async fn new<T, F>(capturer: Capturer, make_target: F) -> Result<Self>
    where
        T: CaptureTarget + 'static,
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        let (cmd_tx, cmd_rx) = mpsc::channel::<Command>();
        let (init_tx, init_rx): (oneshot::Sender<Result<()>>, oneshot::Receiver<Result<()>>) =
            oneshot::channel();

        thread::spawn(move || {
            let mut target = match make_target() {
                Ok(t) => t,
                Err(err) => {
                    let _ = init_tx.send(Err(err));
                    return;
                }
            };

            let _ = init_tx.send(Ok(()));

            while let Ok(cmd) = cmd_rx.recv() {
                match cmd {
                    Command::FullPage(cancel, resp) => {
                        let res = capturer.capture_full_page_cancellable(&mut target, &cancel);
                        let _ = resp.send(res);
                    }
                    Command::Visible(resp) => {
                        let res = capturer.capture_visible(&mut target);
                        let _ = resp.send(res);
                    }
                    Command::Metrics(resp) => {
                        let res = target.metrics();
                        let _ = resp.send(res);
                    }
                    Command::Close(resp) => {
                        drop(target);
                        let _ = resp.send(Ok(()));
                        break;
                    }
                }
            }
        });

        init_rx
            .await
            .map_err(|e| Error::Other(format!("Worker init canceled: {}", e)))??;

        Ok(Self { cmd_tx })
    }

    /// Capture the full page. Triggering `cancel` aborts between segments.
    pub async fn capture_full_page(&self, cancel: CancellationToken) -> Result<EncodedImage> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::FullPage(cancel, tx))?;
        rx.await
            .map_err(|e| Error::Other(format!("Capture canceled: {}", e)))?
    }

    /// Capture only the visible viewport.
    pub async fn capture_visible(&self) -> Result<EncodedImage> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Visible(tx))?;
        rx.await
            .map_err(|e| Error::Other(format!("Visible capture canceled: {}", e)))?
    }

    /// Current page metrics, read on the worker.
    pub async fn metrics(&self) -> Result<PageMetrics> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Metrics(tx))?;
        rx.await
            .map_err(|e| Error::Other(format!("Metrics canceled: {}", e)))?
    }

    /// Shut the worker down and drop the target.
    pub async fn close(self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Close(tx))?;
        rx.await
            .map_err(|e| Error::Other(format!("Close canceled: {}", e)))?
    }

    fn send(&self, cmd: Command) -> Result<()> {
        self.cmd_tx
            .send(cmd)
            .map_err(|_| Error::Other("Capture worker has shut down".into()))
    }
}
