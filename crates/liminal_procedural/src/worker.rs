//! # Generation Worker
//!
//! Optional background thread for maze generation. Only the tile carving
//! runs here: island resolution happens before a job is submitted, and the
//! spawn pass and corruption update happen after the result comes back, on
//! the thread that owns the chunk manager.
//!
//! One worker, one FIFO job queue: results arrive in submission order.

use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::{unbounded, Receiver, Sender, TryRecvError};
use liminal_core::{ChunkCoord, LevelId, TileGrid};

use crate::error::GenerationError;
use crate::maze::{MazeRequest, TileGenerator};

/// A chunk to carve.
#[derive(Clone, Debug)]
pub struct GenerationJob {
    /// Level of the chunk.
    pub level: LevelId,
    /// Everything the generator needs.
    pub request: MazeRequest,
}

impl GenerationJob {
    /// Chunk coordinate of the job.
    #[inline]
    #[must_use]
    pub const fn coord(&self) -> ChunkCoord {
        self.request.coord
    }
}

/// A finished job.
#[derive(Debug)]
pub struct GenerationOutput {
    /// The job as submitted.
    pub job: GenerationJob,
    /// Carved tiles, or why carving failed.
    pub result: Result<TileGrid, GenerationError>,
}

/// Handle to the background generation thread.
///
/// Dropping the handle closes the job channel and joins the thread after it
/// finishes the job in hand.
pub struct GenerationWorker {
    jobs: Option<Sender<GenerationJob>>,
    results: Receiver<GenerationOutput>,
    handle: Option<JoinHandle<()>>,
}

impl GenerationWorker {
    /// Starts the worker thread.
    ///
    /// # Errors
    ///
    /// Returns an error if the OS refuses to spawn the thread.
    pub fn spawn(generator: Arc<dyn TileGenerator>) -> std::io::Result<Self> {
        let (job_tx, job_rx) = unbounded::<GenerationJob>();
        let (result_tx, result_rx) = unbounded::<GenerationOutput>();

        let handle = std::thread::Builder::new()
            .name("liminal-gen".into())
            .spawn(move || run(&*generator, &job_rx, &result_tx))?;

        tracing::debug!("generation worker started");
        Ok(Self {
            jobs: Some(job_tx),
            results: result_rx,
            handle: Some(handle),
        })
    }

    /// Queues a job.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationError::WorkerDisconnected`] if the thread is gone.
    pub fn submit(&self, job: GenerationJob) -> Result<(), GenerationError> {
        self.jobs
            .as_ref()
            .ok_or(GenerationError::WorkerDisconnected)?
            .send(job)
            .map_err(|_| GenerationError::WorkerDisconnected)
    }

    /// Takes one finished job, if any.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationError::WorkerDisconnected`] if the thread died.
    pub fn try_recv(&self) -> Result<Option<GenerationOutput>, GenerationError> {
        match self.results.try_recv() {
            Ok(output) => Ok(Some(output)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(GenerationError::WorkerDisconnected),
        }
    }

    /// Blocks until the next finished job.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationError::WorkerDisconnected`] if the thread died.
    pub fn recv(&self) -> Result<GenerationOutput, GenerationError> {
        self.results.recv().map_err(|_| GenerationError::WorkerDisconnected)
    }
}

impl Drop for GenerationWorker {
    fn drop(&mut self) {
        drop(self.jobs.take());
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::warn!("generation worker panicked");
            }
        }
    }
}

impl std::fmt::Debug for GenerationWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationWorker")
            .field("pending_results", &self.results.len())
            .finish_non_exhaustive()
    }
}

fn run(generator: &dyn TileGenerator, jobs: &Receiver<GenerationJob>, results: &Sender<GenerationOutput>) {
    for job in jobs {
        let result = generator.generate_tiles(&job.request);
        if results.send(GenerationOutput { job, result }).is_err() {
            break;
        }
    }
}
