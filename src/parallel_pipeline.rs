// THEORY:
// A converter never changes after it is built, so many frames can be converted
// at the same time from one shared instance without a single lock. The
// `ParallelConverter` puts that to work: a pool of Tokio worker tasks, each
// holding an `Arc` of the same converter, is fed through a round-robin
// dispatcher, and every frame gets its own one-shot reply channel.
//
// Ordering is the caller's guarantee, not the workers'. Results are awaited in
// submission order (`convert_all`) or through an ordered `buffered` stream
// (`convert_stream`), so a slow frame delays the ones behind it but never
// swaps places with them. As with `receive`, a failed frame ends a stream.
//
// The pool must be created from inside a Tokio runtime.

use crate::core_modules::converter::{Frame, PhotoreceptorConverter, ReceptorGrid};
use crate::core_modules::error::{ConverterError, ConverterResult};
use futures::future;
use futures::stream::{Stream, StreamExt};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

/// Configuration for the ParallelConverter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParallelConfig {
    /// Number of worker tasks converting frames.
    pub workers: usize,
}

impl Default for ParallelConfig {
    fn default() -> Self {
        Self {
            workers: num_cpus::get().max(1),
        }
    }
}

pub struct FrameTask {
    pub frame_id: u64,
    pub frame: Frame,
    pub result_sender: oneshot::Sender<ConverterResult<ReceptorGrid>>,
}

pub struct WorkerPool {
    task_sender: mpsc::UnboundedSender<FrameTask>,
    dispatcher: JoinHandle<()>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn new(converter: Arc<PhotoreceptorConverter>, worker_count: usize) -> Self {
        let worker_count = worker_count.max(1);
        let (task_sender, mut task_receiver) = mpsc::unbounded_channel::<FrameTask>();

        let (worker_senders, worker_receivers): (Vec<_>, Vec<_>) = (0..worker_count)
            .map(|_| mpsc::unbounded_channel::<FrameTask>())
            .unzip();

        // Dropping `task_sender` ends this loop, which drops every worker queue.
        let dispatcher = tokio::spawn(async move {
            let mut worker_idx = 0;
            while let Some(task) = task_receiver.recv().await {
                if worker_senders[worker_idx].send(task).is_err() {
                    warn!(worker = worker_idx, "worker queue closed");
                }
                worker_idx = (worker_idx + 1) % worker_count;
            }
        });

        let workers = worker_receivers
            .into_iter()
            .enumerate()
            .map(|(worker, mut worker_receiver)| {
                let converter = Arc::clone(&converter);
                tokio::spawn(async move {
                    while let Some(task) = worker_receiver.recv().await {
                        let result = converter.apply(&task.frame);
                        trace!(
                            worker,
                            frame = task.frame_id,
                            ok = result.is_ok(),
                            "worker converted frame"
                        );
                        // The caller may have stopped waiting.
                        let _ = task.result_sender.send(result);
                    }
                })
            })
            .collect();

        debug!(workers = worker_count, "started worker pool");
        Self {
            task_sender,
            dispatcher,
            workers,
        }
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Queues one frame and returns the channel its result will arrive on.
    pub fn submit(
        &self,
        frame_id: u64,
        frame: Frame,
    ) -> ConverterResult<oneshot::Receiver<ConverterResult<ReceptorGrid>>> {
        let (result_sender, result_receiver) = oneshot::channel();
        let task = FrameTask {
            frame_id,
            frame,
            result_sender,
        };
        self.task_sender
            .send(task)
            .map_err(|_| ConverterError::WorkerPoolClosed)?;
        Ok(result_receiver)
    }

    /// Stops accepting frames and waits for the workers to drain their queues.
    pub async fn shutdown(self) {
        drop(self.task_sender);
        if let Err(err) = self.dispatcher.await {
            warn!(%err, "dispatcher task failed");
        }
        for worker in self.workers {
            if let Err(err) = worker.await {
                warn!(%err, "worker task failed");
            }
        }
    }
}

async fn await_result(
    receiver: oneshot::Receiver<ConverterResult<ReceptorGrid>>,
) -> ConverterResult<ReceptorGrid> {
    // A dropped sender means the worker went away before replying.
    receiver
        .await
        .unwrap_or(Err(ConverterError::WorkerPoolClosed))
}

/// Converts frames concurrently on a worker pool while keeping input order.
pub struct ParallelConverter {
    converter: Arc<PhotoreceptorConverter>,
    worker_pool: WorkerPool,
    frame_counter: AtomicU64,
}

impl ParallelConverter {
    pub fn new(converter: PhotoreceptorConverter, config: ParallelConfig) -> Self {
        let converter = Arc::new(converter);
        let worker_pool = WorkerPool::new(Arc::clone(&converter), config.workers);
        Self {
            converter,
            worker_pool,
            frame_counter: AtomicU64::new(0),
        }
    }

    pub fn converter(&self) -> &PhotoreceptorConverter {
        &self.converter
    }

    pub fn workers(&self) -> usize {
        self.worker_pool.worker_count()
    }

    fn next_frame_id(&self) -> u64 {
        self.frame_counter.fetch_add(1, Ordering::Relaxed)
    }

    pub async fn process_frame(&self, frame: Frame) -> ConverterResult<ReceptorGrid> {
        let receiver = self.worker_pool.submit(self.next_frame_id(), frame)?;
        await_result(receiver).await
    }

    /// Converts every frame, in order. The first failure (in input order) is
    /// returned and the remaining results are discarded.
    pub async fn convert_all<I>(&self, frames: I) -> ConverterResult<Vec<ReceptorGrid>>
    where
        I: IntoIterator<Item = Frame>,
    {
        // Everything is queued before anything is awaited so the workers stay busy.
        let receivers = frames
            .into_iter()
            .map(|frame| self.worker_pool.submit(self.next_frame_id(), frame))
            .collect::<ConverterResult<Vec<_>>>()?;

        let mut grids = Vec::with_capacity(receivers.len());
        for receiver in receivers {
            grids.push(await_result(receiver).await?);
        }
        Ok(grids)
    }

    /// Converts a stream of frames with up to `workers` frames in flight.
    /// Results come out in input order and the stream ends after a failure.
    pub fn convert_stream<'a, St>(
        &'a self,
        frames: St,
    ) -> impl Stream<Item = ConverterResult<ReceptorGrid>> + 'a
    where
        St: Stream<Item = Frame> + 'a,
    {
        frames
            .map(move |frame| self.process_frame(frame))
            .buffered(self.workers())
            .scan(false, |failed, result| {
                if *failed {
                    return future::ready(None);
                }
                *failed = result.is_err();
                future::ready(Some(result))
            })
    }

    pub async fn shutdown(self) {
        self.worker_pool.shutdown().await;
    }
}

#[cfg(test)]
mod tests {
    use super::{ParallelConfig, ParallelConverter};
    use crate::core_modules::converter::{Frame, PhotoreceptorConverter};
    use crate::core_modules::error::ConverterError;
    use futures::stream::{self, StreamExt};
    use ndarray::{Array2, array};

    fn movie(len: usize) -> Vec<Frame> {
        (0..len).map(|i| Array2::from_elem((3, 3), i as f64)).collect()
    }

    fn parallel(workers: usize) -> ParallelConverter {
        let converter =
            PhotoreceptorConverter::new(Array2::ones((3, 3)), (3, 3), 1).expect("valid converter");
        ParallelConverter::new(converter, ParallelConfig { workers })
    }

    #[test]
    fn default_config_has_workers() {
        assert!(ParallelConfig::default().workers >= 1);
    }

    #[tokio::test]
    async fn single_frame_round_trip() {
        let pool = parallel(2);
        let grid = pool
            .process_frame(Array2::ones((3, 3)))
            .await
            .expect("converted");
        assert_eq!(grid, array![[9.0]]);
        pool.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn convert_all_keeps_input_order() {
        let pool = parallel(4);
        assert_eq!(pool.workers(), 4);
        let grids = pool.convert_all(movie(40)).await.expect("converted");
        assert_eq!(grids.len(), 40);
        for (i, grid) in grids.iter().enumerate() {
            assert_eq!(grid, &array![[9.0 * i as f64]]);
        }
        pool.shutdown().await;
    }

    #[tokio::test]
    async fn convert_all_reports_shape_mismatch() {
        let pool = parallel(2);
        let mut frames = movie(4);
        frames[2] = Array2::zeros((2, 3));
        assert_eq!(
            pool.convert_all(frames).await,
            Err(ConverterError::ShapeMismatch {
                expected: (3, 3),
                actual: (2, 3)
            })
        );
        pool.shutdown().await;
    }

    #[tokio::test]
    async fn convert_stream_is_ordered_and_stops_on_error() {
        let pool = parallel(3);
        let mut frames = movie(8);
        frames[5] = Array2::zeros((1, 1));

        let results: Vec<_> = pool.convert_stream(stream::iter(frames)).collect().await;
        assert_eq!(results.len(), 6);
        for (i, result) in results.iter().take(5).enumerate() {
            assert_eq!(result.as_ref().expect("converted"), &array![[9.0 * i as f64]]);
        }
        assert!(matches!(results[5], Err(ConverterError::ShapeMismatch { .. })));
        pool.shutdown().await;
    }

    #[tokio::test]
    async fn shared_converter_matches_direct_apply() {
        let pool = parallel(2);
        let frame = array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0], [7.0, 8.0, 9.0]];
        let direct = pool.converter().apply(&frame).expect("converted");
        let pooled = pool.process_frame(frame).await.expect("converted");
        assert_eq!(direct, pooled);
        pool.shutdown().await;
    }
}
