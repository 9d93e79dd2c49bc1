use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use tracing::{debug, warn};

use crate::domain::{ConversionOutcome, ConversionTask};
use crate::error::ConvertError;
use crate::plan::plan_encoding;
use crate::source::DatasetReader;
use crate::zarr::DatasetWriter;

/// Converts one input file into one artifact.
///
/// Every failure, including a panic inside the reader or writer, ends up in
/// [`ConversionOutcome::Failed`]; `convert` itself never fails.
pub struct ConversionWorker<'a, R: DatasetReader, W: DatasetWriter> {
    reader: &'a R,
    writer: &'a W,
}

impl<'a, R: DatasetReader, W: DatasetWriter> ConversionWorker<'a, R, W> {
    pub fn new(reader: &'a R, writer: &'a W) -> Self {
        Self { reader, writer }
    }

    pub fn convert(&self, task: &ConversionTask) -> ConversionOutcome {
        if !task.overwrite && task.output.exists() {
            debug!(input = %task.input, output = %task.output, "output exists, skipping");
            return ConversionOutcome::Skipped {
                input: task.input.clone(),
                output: task.output.clone(),
            };
        }

        let result = panic::catch_unwind(AssertUnwindSafe(|| self.run(task)))
            .unwrap_or_else(|payload| Err(ConvertError::Panicked(panic_message(payload))));

        match result {
            Ok(()) => {
                debug!(input = %task.input, output = %task.output, "converted");
                ConversionOutcome::Success {
                    input: task.input.clone(),
                    output: task.output.clone(),
                }
            }
            Err(err) => {
                warn!(input = %task.input, error = %err, "conversion failed");
                ConversionOutcome::Failed {
                    input: task.input.clone(),
                    message: err.to_string(),
                }
            }
        }
    }

    fn run(&self, task: &ConversionTask) -> Result<(), ConvertError> {
        let dataset = self.reader.read(&task.input)?;
        let plan = plan_encoding(&dataset)?;
        self.writer.write(&dataset, &plan, &task.output)
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|msg| msg.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown cause".to_string())
}
