//! A library of functionality for trimming 3' adapters from small-RNA FASTQ files.
//!
//! # Overview
//!
//! The flow of data is as follows:
//!
//! - The [`thread_reader::ThreadReader`] parses the input FASTQ, groups the records into
//!   [`chunk::Chunk`]s with a [`partitioner::Partitioner`] and hands them out round robin through
//!   a [`dispatcher::Dispatcher`].
//! - Each [`worker::Worker`] searches every read of its chunks for the adapter with a
//!   [`matcher::Matcher`] and cuts it down with a [`trimmer::Trimmer`].
//! - The [`collector::Collector`] drains the workers' output channels into a
//!   [`sink::FastqWriter`].
//! - [`metrics`] are collected on the worker threads, collated when those threads are joined.
#![deny(unsafe_code)]
#![allow(
    clippy::must_use_candidate,
    clippy::missing_panics_doc,
    clippy::missing_errors_doc,
    clippy::module_name_repetitions
)]
pub mod chunk;
pub mod collector;
pub mod dispatcher;
pub mod distance;
pub mod errors;
pub mod matcher;
pub mod metrics;
pub mod opts;
pub mod partitioner;
pub mod run;
pub mod sink;
pub mod thread_reader;
pub mod trimmer;
pub mod utils;
pub mod worker;
