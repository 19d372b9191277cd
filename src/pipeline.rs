//! Pipeline execution.
//!
//! A [`Pipeline`] owns an ordered, non-empty chain of operators and
//! streams chunks through them in order:
//!
//! 1. Each input chunk enters operator 0; any emitted chunk threads
//!    through the downstream operators. A `None` output is the legal
//!    "buffering, nothing yet" signal; a `done` flag from any operator
//!    stops further input.
//! 2. After input is exhausted, operators are finished left-to-right;
//!    a chunk emitted from `finish` threads through the **downstream**
//!    operators only.
//!
//! Any error short-circuits the run and is returned to the caller; no
//! partial materialization is guaranteed. Chunks are contract-checked
//! at the boundary (schema match, strictly increasing selection) before
//! they enter the chain.
//!
//! The async variant pulls from a [`ChunkSource`] and can suspend only
//! between chunks, where it also checks a cooperative [`CancelToken`].

use crate::chunk::Chunk;
use crate::operator::Operator;
use crate::schema::SchemaRef;
use crate::{Error, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Row accounting and wall time for one pipeline run.
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    /// Total logical rows fed in.
    pub rows_in: u64,
    /// Total logical rows emitted.
    pub rows_out: u64,
    /// Wall time of the run.
    pub elapsed: Duration,
}

/// The chunks and stats produced by one pipeline run.
#[derive(Debug)]
pub struct PipelineOutput {
    /// Emitted chunks in order.
    pub chunks: Vec<Chunk>,
    /// Row accounting and timing.
    pub stats: PipelineStats,
}

/// An async producer of input chunks.
#[async_trait]
pub trait ChunkSource: Send {
    /// Pull the next chunk; `None` ends the stream.
    async fn next_chunk(&mut self) -> Result<Option<Chunk>>;
}

/// Cooperative cancellation flag, checked between chunks.
#[derive(Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// A fresh, un-cancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// An ordered chain of operators.
pub struct Pipeline {
    operators: Vec<Box<dyn Operator>>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("operators", &self.operators.iter().map(|op| op.name()).collect::<Vec<_>>())
            .finish()
    }
}

impl Pipeline {
    /// Build a pipeline; at least one operator is required.
    pub fn new(operators: Vec<Box<dyn Operator>>) -> Result<Self> {
        if operators.is_empty() {
            return Err(Error::InvalidPipeline(
                "pipeline requires at least one operator".to_string(),
            ));
        }
        Ok(Self { operators })
    }

    /// The schema of the pipeline's output chunks.
    pub fn output_schema(&self) -> &SchemaRef {
        self.operators
            .last()
            .expect("pipeline is never empty")
            .output_schema()
    }

    /// Reset every operator for another run.
    pub fn reset(&mut self) {
        for operator in &mut self.operators {
            operator.reset();
        }
    }

    // Thread one chunk through operators[start..]. Returns true when
    // some operator signaled done.
    fn push_chunk(
        &mut self,
        start: usize,
        chunk: Chunk,
        outputs: &mut Vec<Chunk>,
    ) -> Result<bool> {
        let mut current = Some(chunk);
        let mut done = false;
        for operator in self.operators[start..].iter_mut() {
            let Some(chunk) = current.take() else { break };
            let result = operator.process(chunk)?;
            if result.done {
                debug!(operator = operator.name(), "operator signaled done");
                done = true;
            }
            current = result.chunk;
        }
        if let Some(chunk) = current {
            outputs.push(chunk);
        }
        Ok(done)
    }

    fn finish_all(&mut self, outputs: &mut Vec<Chunk>) -> Result<()> {
        for index in 0..self.operators.len() {
            let result = self.operators[index].finish()?;
            if let Some(chunk) = result.chunk {
                self.push_chunk(index + 1, chunk, outputs)?;
            }
        }
        Ok(())
    }

    fn admit(&self, chunk: &Chunk) -> Result<()> {
        let expected = self.operators[0].input_schema();
        if !chunk.schema().matches(expected) {
            return Err(Error::SchemaMismatch(
                "input chunk does not match the pipeline input schema"
                    .to_string(),
            ));
        }
        chunk.validate_selection()
    }

    /// Run the pipeline over a fixed set of input chunks.
    pub fn execute(&mut self, chunks: Vec<Chunk>) -> Result<PipelineOutput> {
        let start = Instant::now();
        let mut outputs = Vec::new();
        let mut rows_in = 0u64;

        for chunk in chunks {
            self.admit(&chunk)?;
            rows_in += chunk.row_count() as u64;
            debug!(rows = chunk.row_count(), "processing chunk");
            if self.push_chunk(0, chunk, &mut outputs)? {
                break;
            }
        }
        self.finish_all(&mut outputs)?;

        let stats = PipelineStats {
            rows_in,
            rows_out: outputs
                .iter()
                .map(|chunk| chunk.row_count() as u64)
                .sum(),
            elapsed: start.elapsed(),
        };
        info!(
            rows_in = stats.rows_in,
            rows_out = stats.rows_out,
            elapsed_ms = stats.elapsed.as_millis() as u64,
            "pipeline complete"
        );
        Ok(PipelineOutput { chunks: outputs, stats })
    }

    /// Run the pipeline over an async chunk source.
    ///
    /// Suspension happens only at the chunk boundary, where the cancel
    /// token is also checked; operator internals run to completion per
    /// chunk.
    pub async fn execute_source(
        &mut self,
        source: &mut dyn ChunkSource,
        cancel: &CancelToken,
    ) -> Result<PipelineOutput> {
        let start = Instant::now();
        let mut outputs = Vec::new();
        let mut rows_in = 0u64;

        loop {
            if cancel.is_cancelled() {
                return Err(Error::ExecutionFailed(
                    "execution cancelled".to_string(),
                ));
            }
            let Some(chunk) = source.next_chunk().await? else { break };
            self.admit(&chunk)?;
            rows_in += chunk.row_count() as u64;
            if self.push_chunk(0, chunk, &mut outputs)? {
                break;
            }
        }
        self.finish_all(&mut outputs)?;

        let stats = PipelineStats {
            rows_in,
            rows_out: outputs
                .iter()
                .map(|chunk| chunk.row_count() as u64)
                .sum(),
            elapsed: start.elapsed(),
        };
        info!(
            rows_in = stats.rows_in,
            rows_out = stats.rows_out,
            elapsed_ms = stats.elapsed.as_millis() as u64,
            "pipeline complete"
        );
        Ok(PipelineOutput { chunks: outputs, stats })
    }
}
