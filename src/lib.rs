#![cfg_attr(docsrs, feature(doc_cfg))]
//! # mesh-field
//!
//! mesh-field stores and queries spatial fields: physical quantities sampled
//! on finite-element meshes, with units, and organized into time series.
//!
//! ## Features
//! - Unstructured meshes of triangles, quads, tetrahedra and hexahedra, and a
//!   structured grid with index-arithmetic point location
//! - Shape-function interpolation of vertex-based fields and constant lookup
//!   of cell-based fields at arbitrary points, with unit-aware positions
//! - Out-of-core ("heavy") meshes and fields that load on first access
//! - [`TemporalField`](store::TemporalField): an append-only, time-indexed
//!   directory store that writes each distinct mesh once
//! - Legacy VTK, XDMF and local snapshot I/O
//!
//! ## Usage
//!
//! ```toml
//! [dependencies]
//! mesh-field = "0.3"
//! # features = ["rayon"]   # parallel batch evaluation
//! ```
//!
//! The library logs through the [`log`] facade and never installs a logger.

pub mod data;
pub mod geometry;
pub mod heavy;
pub mod io;
pub mod mesh;
pub mod mesh_error;
pub mod stable_hash;
pub mod store;
pub mod units;

/// A convenient prelude to import the most-used traits & types:
pub mod prelude {
    pub use crate::data::field::{Field, Position};
    pub use crate::data::field_id::FieldId;
    pub use crate::data::value_type::{FieldType, ValueType};
    pub use crate::geometry::{BBox, CellGeometry, DEFAULT_EPS};
    pub use crate::heavy::HeavyRef;
    pub use crate::io::container::{Container, MeshPlacement};
    pub use crate::io::structured::StructuredPointsReader;
    pub use crate::io::vtk::{VtkReader, VtkWriter};
    pub use crate::io::xdmf::{XdmfReader, XdmfWriter};
    pub use crate::io::{FieldReader, FieldWriter};
    pub use crate::mesh::{Cell, Mesh, UniformGrid, UnstructuredMesh, Vertex};
    pub use crate::mesh_error::MeshFieldError;
    pub use crate::store::{CachePolicy, StoreConfig, TemporalField};
    pub use crate::units::{Quantity, Unit};
}

// Meshes and fields are shared across threads behind `Arc`.
static_assertions::assert_impl_all!(mesh::Mesh: Send, Sync);
static_assertions::assert_impl_all!(data::field::Field: Send, Sync);
static_assertions::assert_impl_all!(store::TemporalField: Send, Sync);
