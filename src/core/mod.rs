//! Core library modules for streamget
//!
//! This module contains the internal implementation details of the streamget library.

pub mod error;
pub mod options;
pub mod request;
pub mod progress;
pub mod redirect;
pub mod sink;
pub mod downloader;
