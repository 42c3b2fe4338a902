//! Field I/O: local snapshots, container files and interchange formats.
//!
//! Interchange formats implement the [`FieldWriter`] / [`FieldReader`]
//! traits; the container file and snapshot modules expose their own
//! path-based APIs because they address named groups or whole files.

pub mod container;
pub mod snapshot;
pub mod structured;
pub mod vtk;
pub mod xdmf;

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::Path;

use crate::data::field::Field;
use crate::mesh_error::MeshFieldError;

/// Writes a set of fields to an interchange format.
pub trait FieldWriter {
    fn write<W: Write>(&self, writer: W, fields: &[&Field]) -> Result<(), MeshFieldError>;

    fn write_path(&self, path: impl AsRef<Path>, fields: &[&Field]) -> Result<(), MeshFieldError> {
        let mut bytes = Vec::new();
        self.write(&mut bytes, fields)?;
        write_atomic(path.as_ref(), &bytes)
    }
}

/// Reads the fields stored in an interchange format.
pub trait FieldReader {
    fn read<R: Read>(&self, reader: R) -> Result<Vec<Field>, MeshFieldError>;

    fn read_path(&self, path: impl AsRef<Path>) -> Result<Vec<Field>, MeshFieldError> {
        self.read(File::open(path)?)
    }
}

/// Write `bytes` to a temporary sibling of `path`, flush it, then rename over `path`.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), MeshFieldError> {
    let file_name = path
        .file_name()
        .ok_or_else(|| MeshFieldError::MeshIoParse(format!("{} has no file name", path.display())))?;
    let mut tmp_name = std::ffi::OsString::from(".");
    tmp_name.push(file_name);
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);
    let result = (|| -> Result<(), MeshFieldError> {
        let mut file = File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        fs::rename(&tmp, path)?;
        Ok(())
    })();
    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    result
}
