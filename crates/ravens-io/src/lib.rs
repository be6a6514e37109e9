pub mod labels;
pub mod nifti_io;
pub mod ops;

pub use labels::{LabelEntry, LabelManifest};
pub use nifti_io::{read_volume, write_volume, Volume};
