use std::{io::Write, thread::JoinHandle};

use anyhow::{ensure, Context, Result};
use clap::ArgEnum;
use log::{debug, info, warn};

use crate::{
    collector::{CollectSummary, Collector},
    dispatcher::Dispatcher,
    errors::TrimError,
    metrics::{RunMetrics, TrimMetrics},
    opts::{Opts, TrimConfig},
    sink::FastqWriter,
    thread_reader::{FastqSource, ThreadReader},
    utils::is_stdio,
    worker::WorkerPool,
};

/// Run the trimmer described by `opts`, returning the merged metrics of all workers.
pub fn run(opts: Opts) -> Result<TrimMetrics> {
    let config = opts.to_config()?;

    // Preflight checks
    ensure!(
        is_stdio(&opts.input) || opts.input.exists(),
        "Input FASTQ does not exist: {}",
        opts.input.to_string_lossy()
    );
    let cores = num_cpus::get();
    if config.workers > cores {
        warn!("Using {} workers on a machine with {} cores", config.workers, cores);
    }

    let matcher_name = config
        .matcher
        .kind
        .to_possible_value()
        .map(|v| v.get_name().to_owned())
        .unwrap_or_default();
    info!(
        "Trimming {} with the {} matcher on {} workers",
        opts.input.to_string_lossy(),
        matcher_name,
        config.workers
    );

    info!("Creating writer for {}", opts.output.to_string_lossy());
    let mut writer = FastqWriter::create(&opts.output, opts.compressor_threads)?;
    let source = FastqSource::Path {
        path: opts.input.clone(),
        decompression_threads: opts.decompression_threads,
    };
    let metrics = run_pipeline(&config, source, &mut writer)?;
    writer.finish().context("Failed to flush and finish writing.")?;

    info!(
        "Trimmed {} reads, found the adapter in {} ({:.2}%), shaved {} to the target length",
        metrics.reads,
        metrics.matched,
        100.0 * metrics.fraction_matched(),
        metrics.shaved
    );
    if let Some(path) = &opts.metrics {
        info!("Writing stats");
        RunMetrics::new(&matcher_name, &metrics).to_file(path)?;
    }
    Ok(metrics)
}

/// Read `source`, trim it on `config.workers` threads and write the result to `writer`.
///
/// The first error that is not merely a disconnected channel is returned, looking at the
/// reader, then the collector, then the workers.
pub fn run_pipeline<W: Write>(
    config: &TrimConfig,
    source: FastqSource,
    writer: &mut W,
) -> Result<TrimMetrics> {
    info!("Creating worker threads");
    let WorkerPool { inputs, outputs, handles } = WorkerPool::spawn(config)?;

    info!("Creating reader thread");
    let reader = ThreadReader::new(
        source,
        config.chunksize,
        config.debug_limit,
        Dispatcher::new(inputs),
    )?;

    info!("Processing data");
    let collected = Collector::new(&outputs, writer).collect(config.collect);
    // Workers blocked on a stopped collector fail their next send once the outputs are gone.
    drop(outputs);

    info!("Joining reader and worker threads");
    let mut errors = vec![];
    let records_read = join(reader.handle).unwrap_or_else(|err| {
        errors.push(err);
        0
    });
    let summary = collected.unwrap_or_else(|err| {
        errors.push(err);
        CollectSummary::default()
    });
    let mut metrics = TrimMetrics::default();
    for (index, handle) in handles.into_iter().enumerate() {
        match join(handle) {
            Ok(worker_metrics) => {
                debug!("Worker {} trimmed {} reads", index, worker_metrics.reads);
                metrics.update_with(&worker_metrics);
            }
            Err(err) => errors.push(err.into()),
        }
    }
    if let Some(err) = first_root_cause(errors) {
        return Err(err);
    }

    ensure!(
        summary.records == records_read,
        "Read {} records but wrote {}",
        records_read,
        summary.records
    );
    ensure!(
        metrics.reads == records_read,
        "Read {} records but the workers trimmed {}",
        records_read,
        metrics.reads
    );
    debug!("Wrote {} records in {} chunks", summary.records, summary.chunks);
    Ok(metrics)
}

fn join<T>(handle: JoinHandle<T>) -> T {
    match handle.join() {
        Ok(result) => result,
        Err(e) => std::panic::resume_unwind(e),
    }
}

fn is_disconnect(err: &anyhow::Error) -> bool {
    err.downcast_ref::<TrimError>().map_or(false, TrimError::is_disconnect)
}

/// The first error that is not a disconnect, or else the first error.
fn first_root_cause(errors: Vec<anyhow::Error>) -> Option<anyhow::Error> {
    let mut first = None;
    for err in errors {
        if !is_disconnect(&err) {
            return Some(err);
        }
        first.get_or_insert(err);
    }
    first
}
