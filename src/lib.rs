//! PixelPad — a pixel-art painting surface with a fixed logical grid.
//!
//! The library half of the crate holds everything testable: the raster
//! canvas and its coordinate mapping, the filter passes, the snapshot
//! codec, the key-value persistence layer, and the background image
//! loader. The binary wires these into an eframe shell or, with
//! `--input`, into a headless one-shot pipeline.

#![allow(clippy::too_many_arguments)]

#[macro_use]
pub mod logger;

pub mod app;
pub mod canvas;
pub mod cli;
pub mod color;
pub mod io;
pub mod loader;
pub mod ops;
pub mod storage;
