//! Table access, feature preparation, sampling, encoding, and artifact export
//! for the propensity pipeline.

mod domain;
mod encode;
mod error;
mod prepare;
mod reader;
mod sample;
mod source;
mod writer;

pub use domain::{Cell, Column, ColumnKind, CombinedSample, Partition, Record, RowBinder, Schema};
pub use encode::{Coding, FeatureEncoder, FeatureGroup};
pub use error::IoError;
pub use prepare::{FeaturePlan, Transform, prepare};
pub use reader::SchemaReader;
pub use sample::SampleConfig;
pub use source::{Connection, Frame, Predicate, TableHandle, TableQuery};
pub use writer::{
    ArtifactWriter, FORMAT_VERSION, PARTITION_COLUMN, PREDICTIONS_FILE, PredictionColumn,
    SAMPLE_CSV_FILE, SCHEMA_SAMPLE_FILE,
};
