//! Riverscapes projects: a fixed directory layout holding a tool's inputs and the outputs of each
//! run ("realization"), described by an XML project file.

#[macro_use]
extern crate anyhow;
#[macro_use]
extern crate log;

mod dataset;
mod metadata;
mod project;

pub use crate::dataset::{copy_dataset, DatasetKind};
pub use crate::metadata::{
    new_guid, run_metadata_file_name, timestamp, Dataset, MetadataSink, ProjectXml, Realization,
    RealizationInput, RunMetadata, PRODUCT_VERSION, REALIZATION_TAG,
};
pub use crate::project::{
    create_project, huc_id, project_dir, realization_id, relative_project_dir,
    write_realization_dirs, write_root, OutputDir, ProjectDir, INPUTS, PROJECT_FILE,
    PROJECT_TYPE, REALIZATIONS,
};
