//! Geometry kernel for mesh-field.
//!
//! Cell geometry tags, shape functions and isoparametric mappings, plus
//! axis-aligned bounding boxes used to prefilter point location.

pub mod bbox;
pub mod cell_type;
pub mod metrics;

pub use bbox::BBox;
pub use cell_type::CellGeometry;
pub use metrics::DEFAULT_EPS;
