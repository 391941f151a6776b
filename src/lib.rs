pub mod acquisition;
pub mod aggregate;
pub mod config;
pub mod data_io;
pub mod dataset;
pub mod derive;
pub mod error;
pub mod logging;
pub mod naming;
pub mod pipeline;
pub mod resample;
pub mod time_utils;

pub use error::{DownsampleError, Result};
