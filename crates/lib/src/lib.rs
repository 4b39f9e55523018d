//! stagehand-lib: stage, compile, test and package a curated file set.
//!
//! The pipeline is built from small stages that each own one concern:
//! - `registry`: which files take part, and where they go
//! - `stage`: the disposable staging area and its guaranteed cleanup
//! - `compile`: per-group compiler calls over a growing search path
//! - `test_runner`: test discovery and the harness call
//! - `package`: the zip archive of the original files
//! - `pipeline`: orchestration and the error taxonomy
//!
//! External tools are reached only through [`process::ProcessRunner`].

pub mod compile;
pub mod package;
pub mod pipeline;
pub mod process;
pub mod registry;
pub mod stage;
pub mod test_runner;
pub mod toolchain;
pub mod util;

pub use pipeline::{AssembleOptions, AssemblyReport, PipelineError, assemble};
pub use registry::{FileGroup, GroupRole, Registry};
pub use toolchain::Toolchain;
