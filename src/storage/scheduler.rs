use std::sync::mpsc;
use std::thread;

use tokio::sync::oneshot;

use crate::error::Result;
use crate::storage::page::{PageBuf, PageId};
use crate::storage::DiskManager;

/// A single disk I/O operation. `data` is the shared buffer cell of
/// the target frame: reads fill it, writes drain it. The callback is
/// fulfilled with the outcome once the operation completes.
pub struct DiskRequest {
    pub is_write: bool,
    pub data: PageBuf,
    pub page_id: PageId,
    pub callback: oneshot::Sender<Result<()>>,
}

/// Serializes disk I/O onto a background worker thread. Callers queue
/// requests with schedule and block on the promise half created with
/// create_promise. Dropping the scheduler shuts the worker down after
/// it drains the queue.
pub struct DiskScheduler {
    queue: mpsc::Sender<Option<DiskRequest>>,
    worker: Option<thread::JoinHandle<()>>,
}

impl DiskScheduler {
    pub fn new(mut disk: Box<dyn DiskManager>) -> DiskScheduler {
        let (tx, rx) = mpsc::channel::<Option<DiskRequest>>();
        let worker = thread::spawn(move || {
            while let Ok(Some(request)) = rx.recv() {
                Self::dispatch(disk.as_mut(), request);
            }
        });
        DiskScheduler { queue: tx, worker: Some(worker) }
    }

    /// Create the completion promise for a request: the sender goes
    /// into the request, the receiver is what the issuer blocks on.
    pub fn create_promise() -> (oneshot::Sender<Result<()>>, oneshot::Receiver<Result<()>>) {
        oneshot::channel()
    }

    pub fn schedule(&self, request: DiskRequest) -> Result<()> {
        self.queue.send(Some(request))?;
        Ok(())
    }

    fn dispatch(disk: &mut dyn DiskManager, request: DiskRequest) {
        let result = if request.is_write {
            let data = request.data.read();
            disk.write_page(request.page_id, &data)
        } else {
            let mut data = request.data.write();
            disk.read_page(request.page_id, &mut data)
        };
        let _ = request.callback.send(result);
    }
}

impl Drop for DiskScheduler {
    fn drop(&mut self) {
        let _ = self.queue.send(None);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}
