use std::sync::mpsc;

use camino::Utf8PathBuf;
use chrono::{SecondsFormat, Utc};
use rayon::ThreadPoolBuilder;
use serde::Serialize;
use tracing::info;

use crate::config::ConversionConfig;
use crate::domain::{ConversionOutcome, ConversionTask};
use crate::error::ConvertError;
use crate::source::DatasetReader;
use crate::worker::ConversionWorker;
use crate::zarr::DatasetWriter;

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub outcome: ConversionOutcome,
    /// Outcomes received so far, this one included.
    pub completed: usize,
    pub total: usize,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

#[derive(Debug, Clone, Serialize)]
pub struct FailedFile {
    pub input: Utf8PathBuf,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: Vec<FailedFile>,
    pub started_at: String,
    pub finished_at: String,
}

impl BatchSummary {
    fn start(total: usize) -> Self {
        Self {
            total,
            succeeded: 0,
            skipped: 0,
            failed: Vec::new(),
            started_at: now(),
            finished_at: String::new(),
        }
    }

    fn record(&mut self, outcome: &ConversionOutcome) {
        match outcome {
            ConversionOutcome::Success { .. } => self.succeeded += 1,
            ConversionOutcome::Skipped { .. } => self.skipped += 1,
            ConversionOutcome::Failed { input, message } => self.failed.push(FailedFile {
                input: input.clone(),
                message: message.clone(),
            }),
        }
    }

    pub fn completed(&self) -> usize {
        self.succeeded + self.skipped + self.failed.len()
    }
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[derive(Clone)]
pub struct App<R: DatasetReader, W: DatasetWriter> {
    reader: R,
    writer: W,
}

impl<R: DatasetReader, W: DatasetWriter> App<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        Self { reader, writer }
    }

    /// Converts every input on a pool of `config.workers` threads.
    ///
    /// Outcomes reach `sink` on the calling thread in completion order. A
    /// failing file never stops the batch; the only error is a pool that
    /// cannot be started.
    pub fn convert_all(
        &self,
        inputs: Vec<Utf8PathBuf>,
        config: &ConversionConfig,
        sink: &dyn ProgressSink,
    ) -> Result<BatchSummary, ConvertError> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(config.workers)
            .thread_name(|index| format!("h5zarr-worker-{index}"))
            .build()
            .map_err(|err| ConvertError::ThreadPool(err.to_string()))?;

        let tasks: Vec<ConversionTask> = inputs
            .into_iter()
            .map(|input| ConversionTask::new(input, config.output_dir.as_deref(), config.overwrite))
            .collect();
        let total = tasks.len();
        let mut summary = BatchSummary::start(total);
        info!(total, workers = config.workers, "starting batch");

        let worker = ConversionWorker::new(&self.reader, &self.writer);
        let (tx, rx) = mpsc::channel::<ConversionOutcome>();

        pool.in_place_scope(|scope| {
            for task in &tasks {
                let tx = tx.clone();
                let worker = &worker;
                scope.spawn(move |_| {
                    // The receiver outlives the scope, so sending cannot fail.
                    let _ = tx.send(worker.convert(task));
                });
            }
            drop(tx);

            for outcome in rx.iter() {
                summary.record(&outcome);
                sink.event(ProgressEvent {
                    outcome,
                    completed: summary.completed(),
                    total,
                });
            }
        });

        summary.finished_at = now();
        info!(
            succeeded = summary.succeeded,
            skipped = summary.skipped,
            failed = summary.failed.len(),
            "batch finished"
        );
        Ok(summary)
    }
}
