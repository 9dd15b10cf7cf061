//! hrp Core - chart types shared by the repository backends
//!
//! - `ChartMetadata`: the contents of a chart's `Chart.yaml`
//! - `archive`: reading metadata and digests out of packaged `.tgz` charts
//! - `ChartName`: validated, path-traversal-safe chart filenames

pub mod archive;
pub mod chart;
pub mod error;
pub mod name;

pub use chart::{ChartDependency, ChartMetadata, Maintainer, parse_version};
pub use error::{CoreError, Result};
pub use name::{ChartName, INDEX_FILENAME};
