//! Legacy VTK (`.vtk`) reader/writer for fields on unstructured grids.
//!
//! Both `ASCII` and `BINARY` (big-endian) encodings are supported. Vertex
//! based fields go to `POINT_DATA`, cell based fields to `CELL_DATA`, as
//! `SCALARS`/`VECTORS`/`TENSORS` named after the field id. Everything VTK
//! has no slot for (field unit, time, mesh unit and dimension, labels) is
//! kept in a dataset-level `FIELD` block so it survives a round trip.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::sync::Arc;

use itertools::Itertools;
use log::warn;

use crate::data::field::Field;
use crate::data::field_id::FieldId;
use crate::data::value_type::{FieldType, ValueType};
use crate::geometry::cell_type::CellGeometry;
use crate::io::{FieldReader, FieldWriter};
use crate::mesh::{Cell, Mesh, Vertex};
use crate::mesh_error::MeshFieldError;
use crate::units::{Quantity, Unit};

const TITLE: &str = "mesh-field";
const FIELD_META_PREFIX: &str = "mf|";
const FIELD_MESH_PREFIX: &str = "mf.mesh|";
const FIELD_VERTEX_LABELS: &str = "mf.vertex_labels";
const FIELD_CELL_LABELS: &str = "mf.cell_labels";

/// Data encoding of a legacy VTK file.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum VtkEncoding {
    #[default]
    Ascii,
    Binary,
}

#[derive(Debug, Default, Clone)]
pub struct VtkWriter {
    encoding: VtkEncoding,
}

#[derive(Debug, Default, Clone)]
pub struct VtkReader;

impl VtkWriter {
    pub fn new(encoding: VtkEncoding) -> Self {
        Self { encoding }
    }

    pub fn ascii() -> Self {
        Self::new(VtkEncoding::Ascii)
    }

    pub fn binary() -> Self {
        Self::new(VtkEncoding::Binary)
    }
}

/// Escape a string so it survives as one whitespace-free VTK name token.
pub(crate) fn encode_name(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '%' => out.push_str("%25"),
            '|' => out.push_str("%7C"),
            c if c.is_whitespace() => out.push_str("%20"),
            c => out.push(c),
        }
    }
    out
}

pub(crate) fn decode_name(s: &str) -> String {
    s.replace("%20", " ").replace("%7C", "|").replace("%25", "%")
}

/// Writes data values in the chosen encoding.
struct Encoder<W: Write> {
    writer: W,
    encoding: VtkEncoding,
}

impl<W: Write> Encoder<W> {
    fn header(&mut self, line: &str) -> Result<(), MeshFieldError> {
        writeln!(self.writer, "{line}")?;
        Ok(())
    }

    fn f64s(&mut self, values: &[f64]) -> Result<(), MeshFieldError> {
        match self.encoding {
            VtkEncoding::Ascii => self.wrapped(values.iter().map(|v| v.to_string())),
            VtkEncoding::Binary => {
                for v in values {
                    self.writer.write_all(&v.to_be_bytes())?;
                }
                writeln!(self.writer)?;
                Ok(())
            }
        }
    }

    fn i32s(&mut self, values: &[i32]) -> Result<(), MeshFieldError> {
        match self.encoding {
            VtkEncoding::Ascii => self.wrapped(values.iter().map(|v| v.to_string())),
            VtkEncoding::Binary => {
                for v in values {
                    self.writer.write_all(&v.to_be_bytes())?;
                }
                writeln!(self.writer)?;
                Ok(())
            }
        }
    }

    fn i64s(&mut self, values: &[i64]) -> Result<(), MeshFieldError> {
        match self.encoding {
            VtkEncoding::Ascii => self.wrapped(values.iter().map(|v| v.to_string())),
            VtkEncoding::Binary => {
                for v in values {
                    self.writer.write_all(&v.to_be_bytes())?;
                }
                writeln!(self.writer)?;
                Ok(())
            }
        }
    }

    fn wrapped(&mut self, values: impl Iterator<Item = String>) -> Result<(), MeshFieldError> {
        let mut line_len = 0usize;
        for value in values {
            if line_len > 0 && line_len + value.len() + 1 > 70 {
                writeln!(self.writer)?;
                line_len = 0;
            }
            if line_len > 0 {
                write!(self.writer, " ")?;
                line_len += 1;
            }
            write!(self.writer, "{value}")?;
            line_len += value.len();
        }
        writeln!(self.writer)?;
        Ok(())
    }
}

impl FieldWriter for VtkWriter {
    fn write<W: Write>(&self, writer: W, fields: &[&Field]) -> Result<(), MeshFieldError> {
        let first = fields
            .first()
            .ok_or_else(|| MeshFieldError::MeshIoParse("VTK export needs at least one field".into()))?;
        let mesh = first.mesh();
        let digest = mesh.digest()?;
        for field in fields {
            if !Arc::ptr_eq(field.mesh(), mesh) && field.mesh().digest()? != digest {
                return Err(MeshFieldError::InvalidGeometry(
                    "fields written to one VTK file must share a mesh".into(),
                ));
            }
        }
        let grid = mesh.to_unstructured()?;
        let mut out = Encoder {
            writer,
            encoding: self.encoding,
        };

        out.header("# vtk DataFile Version 3.0")?;
        out.header(TITLE)?;
        out.header(match self.encoding {
            VtkEncoding::Ascii => "ASCII",
            VtkEncoding::Binary => "BINARY",
        })?;
        out.header("DATASET UNSTRUCTURED_GRID")?;

        out.header(&format!("POINTS {} double", grid.number_of_vertices()))?;
        let coords: Vec<f64> = grid.vertices().iter().flat_map(|v| v.position()).collect();
        out.f64s(&coords)?;

        let total: usize = grid.cells().iter().map(|c| c.vertices().len() + 1).sum();
        out.header(&format!("CELLS {} {}", grid.number_of_cells(), total))?;
        match self.encoding {
            VtkEncoding::Ascii => {
                for cell in grid.cells() {
                    out.header(&format!(
                        "{} {}",
                        cell.vertices().len(),
                        cell.vertices().iter().join(" ")
                    ))?;
                }
            }
            VtkEncoding::Binary => {
                let mut flat = Vec::with_capacity(total);
                for cell in grid.cells() {
                    flat.push(cell.vertices().len() as i32);
                    flat.extend(cell.vertices().iter().map(|&v| v as i32));
                }
                out.i32s(&flat)?;
            }
        }

        out.header(&format!("CELL_TYPES {}", grid.number_of_cells()))?;
        let types: Vec<i32> = grid.cells().iter().map(|c| c.geometry().vtk_code()).collect();
        out.i32s(&types)?;

        // Unique array names: the field id, suffixed `~k` on repeats.
        let mut seen: HashMap<FieldId, usize> = HashMap::new();
        let names: Vec<String> = fields
            .iter()
            .map(|f| {
                let count = seen.entry(f.field_id()).or_insert(0);
                let name = if *count == 0 {
                    f.field_id().name().to_string()
                } else {
                    format!("{}~{}", f.field_id().name(), count)
                };
                *count += 1;
                name
            })
            .collect();

        let mesh_unit = grid.unit().map(Unit::name).unwrap_or("");
        out.header(&format!("FIELD FieldData {}", 3 + fields.len()))?;
        out.header(&format!(
            "{FIELD_MESH_PREFIX}{}|{} 1 1 double",
            grid.dimension(),
            encode_name(mesh_unit)
        ))?;
        out.f64s(&[grid.dimension() as f64])?;
        out.header(&format!(
            "{FIELD_VERTEX_LABELS} 1 {} long",
            grid.number_of_vertices()
        ))?;
        let labels: Vec<i64> = grid.vertices().iter().map(Vertex::label).collect();
        out.i64s(&labels)?;
        out.header(&format!("{FIELD_CELL_LABELS} 1 {} long", grid.number_of_cells()))?;
        let labels: Vec<i64> = grid.cells().iter().map(Cell::label).collect();
        out.i64s(&labels)?;
        for (field, name) in fields.iter().zip(&names) {
            out.header(&format!(
                "{FIELD_META_PREFIX}{}|{}|{} 1 1 double",
                name,
                encode_name(field.unit().name()),
                encode_name(field.time().unit.name())
            ))?;
            out.f64s(&[field.time().value])?;
        }

        for (location, field_type, count) in [
            ("POINT_DATA", FieldType::VertexBased, grid.number_of_vertices()),
            ("CELL_DATA", FieldType::CellBased, grid.number_of_cells()),
        ] {
            let selected: Vec<(&&Field, &String)> = fields
                .iter()
                .zip(&names)
                .filter(|(f, _)| f.field_type() == field_type)
                .collect();
            if selected.is_empty() {
                continue;
            }
            out.header(&format!("{location} {count}"))?;
            for (field, name) in selected {
                match field.value_type() {
                    ValueType::Scalar => {
                        out.header(&format!("SCALARS {name} double 1"))?;
                        out.header("LOOKUP_TABLE default")?;
                    }
                    ValueType::Vector => out.header(&format!("VECTORS {name} double"))?,
                    ValueType::Tensor => out.header(&format!("TENSORS {name} double"))?,
                }
                out.f64s(field.values()?)?;
            }
        }
        Ok(())
    }
}

/// Byte-level tokenizer for legacy VTK files with mixed text and binary data.
pub(crate) struct Scanner<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Scanner<'a> {
    pub(crate) fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    pub(crate) fn token(&mut self) -> Result<Option<&'a str>, MeshFieldError> {
        while self.pos < self.bytes.len() && self.bytes[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
        if self.pos >= self.bytes.len() {
            return Ok(None);
        }
        let start = self.pos;
        while self.pos < self.bytes.len() && !self.bytes[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
        std::str::from_utf8(&self.bytes[start..self.pos])
            .map(Some)
            .map_err(|_| MeshFieldError::MeshIoParse("invalid UTF-8 token".into()))
    }

    pub(crate) fn expect(&mut self, what: &str) -> Result<&'a str, MeshFieldError> {
        self.token()?
            .ok_or_else(|| MeshFieldError::MeshIoParse(format!("missing {what}")))
    }

    pub(crate) fn parse<T: std::str::FromStr>(&mut self, what: &str) -> Result<T, MeshFieldError> {
        let token = self.expect(what)?;
        token
            .parse()
            .map_err(|_| MeshFieldError::MeshIoParse(format!("invalid {what} `{token}`")))
    }

    /// Remainder of the current line, newline consumed.
    pub(crate) fn line(&mut self) -> Result<&'a str, MeshFieldError> {
        let start = self.pos;
        while self.pos < self.bytes.len() && self.bytes[self.pos] != b'\n' {
            self.pos += 1;
        }
        let end = self.pos;
        if self.pos < self.bytes.len() {
            self.pos += 1;
        }
        std::str::from_utf8(&self.bytes[start..end])
            .map(|s| s.trim_end_matches('\r'))
            .map_err(|_| MeshFieldError::MeshIoParse("invalid UTF-8 line".into()))
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], MeshFieldError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.bytes.len())
            .ok_or_else(|| MeshFieldError::MeshIoParse("truncated binary data".into()))?;
        let out = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    /// Read `count` values of VTK type `data_type`.
    pub(crate) fn values(
        &mut self,
        count: usize,
        data_type: &str,
        binary: bool,
    ) -> Result<Vec<f64>, MeshFieldError> {
        if !binary {
            // Every ASCII value occupies at least one byte.
            if count > self.bytes.len() - self.pos {
                return Err(MeshFieldError::MeshIoParse(format!(
                    "{count} values announced, but only {} bytes remain",
                    self.bytes.len() - self.pos
                )));
            }
            return (0..count).map(|_| self.parse::<f64>("data value")).collect();
        }
        // Binary payload starts after the header line's newline.
        while self.pos < self.bytes.len() && self.bytes[self.pos] != b'\n' {
            self.pos += 1;
        }
        self.pos += 1;
        let width = match data_type {
            "float" | "int" | "unsigned_int" => 4,
            "double" | "long" | "unsigned_long" | "vtktypeint64" => 8,
            other => {
                return Err(MeshFieldError::MeshIoParse(format!(
                    "unsupported binary data type {other}"
                )));
            }
        };
        let bytes = self.take(array_len(count, width, "binary array")?)?;
        let values = bytes
            .chunks_exact(width)
            .map(|chunk| {
                let mut b8 = [0u8; 8];
                let mut b4 = [0u8; 4];
                match data_type {
                    "float" => {
                        b4.copy_from_slice(chunk);
                        f32::from_be_bytes(b4) as f64
                    }
                    "int" => {
                        b4.copy_from_slice(chunk);
                        i32::from_be_bytes(b4) as f64
                    }
                    "unsigned_int" => {
                        b4.copy_from_slice(chunk);
                        u32::from_be_bytes(b4) as f64
                    }
                    "double" => {
                        b8.copy_from_slice(chunk);
                        f64::from_be_bytes(b8)
                    }
                    "unsigned_long" => {
                        b8.copy_from_slice(chunk);
                        u64::from_be_bytes(b8) as f64
                    }
                    _ => {
                        b8.copy_from_slice(chunk);
                        i64::from_be_bytes(b8) as f64
                    }
                }
            })
            .collect();
        Ok(values)
    }
}

/// `a * b` for counts read from a file header.
pub(crate) fn array_len(a: usize, b: usize, what: &str) -> Result<usize, MeshFieldError> {
    a.checked_mul(b)
        .ok_or_else(|| MeshFieldError::MeshIoParse(format!("{what} size {a} x {b} overflows")))
}

/// A connectivity entry as a vertex number or count.
fn index_value(value: f64, what: &str) -> Result<usize, MeshFieldError> {
    if value.is_finite() && value >= 0.0 && value.fract() == 0.0 && value <= u32::MAX as f64 {
        Ok(value as usize)
    } else {
        Err(MeshFieldError::MeshIoParse(format!("invalid {what} {value}")))
    }
}

/// A data array found under `POINT_DATA` or `CELL_DATA`.
#[derive(Debug)]
pub(crate) struct DataArray {
    pub(crate) name: String,
    pub(crate) components: usize,
    pub(crate) values: Vec<f64>,
}

/// Parse one `SCALARS`/`VECTORS`/`TENSORS` block whose keyword was just read.
pub(crate) fn read_attribute(
    scanner: &mut Scanner<'_>,
    keyword: &str,
    tuples: usize,
    binary: bool,
) -> Result<DataArray, MeshFieldError> {
    let (name, data_type, components) = match keyword {
        "SCALARS" => {
            let line = scanner.line()?;
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() < 2 {
                return Err(MeshFieldError::MeshIoParse(format!("malformed SCALARS line `{line}`")));
            }
            let components = match parts.get(2) {
                Some(n) => n.parse().map_err(|_| {
                    MeshFieldError::MeshIoParse(format!("invalid component count `{n}`"))
                })?,
                None => 1,
            };
            if scanner.expect("LOOKUP_TABLE")? != "LOOKUP_TABLE" {
                return Err(MeshFieldError::MeshIoParse("expected LOOKUP_TABLE".into()));
            }
            scanner.expect("lookup table name")?;
            (parts[0].to_string(), parts[1].to_string(), components)
        }
        "VECTORS" | "TENSORS" => {
            let name = scanner.expect("array name")?.to_string();
            let data_type = scanner.expect("data type")?.to_string();
            (name, data_type, if keyword == "VECTORS" { 3 } else { 9 })
        }
        other => {
            return Err(MeshFieldError::MeshIoParse(format!(
                "unexpected attribute {other}"
            )));
        }
    };
    let values = scanner.values(array_len(tuples, components, &name)?, &data_type, binary)?;
    Ok(DataArray {
        name,
        components,
        values,
    })
}

/// Parse the common header; returns `(binary, dataset type)`.
pub(crate) fn read_header(scanner: &mut Scanner<'_>) -> Result<(bool, String), MeshFieldError> {
    let version = scanner.line()?;
    if !version.starts_with("# vtk DataFile") {
        return Err(MeshFieldError::MeshIoParse("missing VTK header".into()));
    }
    scanner.line()?;
    let binary = match scanner.line()?.trim() {
        "ASCII" => false,
        "BINARY" => true,
        other => {
            return Err(MeshFieldError::MeshIoParse(format!("unknown VTK encoding {other}")));
        }
    };
    if scanner.expect("DATASET")? != "DATASET" {
        return Err(MeshFieldError::MeshIoParse("expected DATASET".into()));
    }
    let dataset = scanner.expect("dataset type")?.to_string();
    Ok((binary, dataset))
}

#[derive(Clone, Copy, PartialEq)]
enum Location {
    Dataset,
    Point(usize),
    Cell(usize),
}

impl FieldReader for VtkReader {
    fn read<R: Read>(&self, mut reader: R) -> Result<Vec<Field>, MeshFieldError> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        let mut scanner = Scanner::new(&bytes);
        let (binary, dataset) = read_header(&mut scanner)?;
        if dataset != "UNSTRUCTURED_GRID" {
            return Err(MeshFieldError::MeshIoParse(format!(
                "expected UNSTRUCTURED_GRID, found {dataset}"
            )));
        }

        let mut points = Vec::new();
        let mut connectivity = Vec::new();
        let mut cell_types = Vec::new();
        let mut metadata: HashMap<String, Vec<f64>> = HashMap::new();
        let mut arrays: Vec<(FieldType, DataArray)> = Vec::new();
        let mut location = Location::Dataset;

        while let Some(token) = scanner.token()? {
            match token {
                "POINTS" => {
                    let n: usize = scanner.parse("point count")?;
                    let data_type = scanner.expect("point data type")?;
                    points = scanner.values(array_len(n, 3, "POINTS")?, data_type, binary)?;
                }
                "CELLS" => {
                    let _cells: usize = scanner.parse("cell count")?;
                    let size: usize = scanner.parse("cell list size")?;
                    connectivity = scanner.values(size, "int", binary)?;
                }
                "CELL_TYPES" => {
                    let n: usize = scanner.parse("cell type count")?;
                    cell_types = scanner.values(n, "int", binary)?;
                }
                "POINT_DATA" => location = Location::Point(scanner.parse("point data count")?),
                "CELL_DATA" => location = Location::Cell(scanner.parse("cell data count")?),
                "METADATA" => {
                    // VTK 5+ writers emit `METADATA` / `INFORMATION 0`.
                    scanner.expect("INFORMATION")?;
                    scanner.parse::<usize>("information count")?;
                }
                "FIELD" => {
                    scanner.expect("field name")?;
                    let count: usize = scanner.parse("field array count")?;
                    for _ in 0..count {
                        let name = scanner.expect("field array name")?.to_string();
                        let components: usize = scanner.parse("field components")?;
                        let tuples: usize = scanner.parse("field tuples")?;
                        let data_type = scanner.expect("field data type")?;
                        let len = array_len(components, tuples, &name)?;
                        let values = scanner.values(len, data_type, binary)?;
                        match location {
                            Location::Dataset => {
                                metadata.insert(name, values);
                            }
                            Location::Point(_) | Location::Cell(_) => {
                                let field_type = if matches!(location, Location::Point(_)) {
                                    FieldType::VertexBased
                                } else {
                                    FieldType::CellBased
                                };
                                arrays.push((
                                    field_type,
                                    DataArray {
                                        name,
                                        components,
                                        values,
                                    },
                                ));
                            }
                        }
                    }
                }
                "SCALARS" | "VECTORS" | "TENSORS" => {
                    let (field_type, tuples) = match location {
                        Location::Point(n) => (FieldType::VertexBased, n),
                        Location::Cell(n) => (FieldType::CellBased, n),
                        Location::Dataset => {
                            return Err(MeshFieldError::MeshIoParse(format!(
                                "{token} outside POINT_DATA/CELL_DATA"
                            )));
                        }
                    };
                    arrays.push((field_type, read_attribute(&mut scanner, token, tuples, binary)?));
                }
                other => {
                    return Err(MeshFieldError::MeshIoParse(format!(
                        "unexpected token {other}"
                    )));
                }
            }
        }

        let mesh = Arc::new(build_mesh(&points, &connectivity, &cell_types, &metadata)?);
        let field_meta = field_metadata(&metadata)?;
        let mut fields = Vec::with_capacity(arrays.len());
        for (field_type, array) in arrays {
            let base = array.name.split('~').next().unwrap_or(&array.name);
            let Ok(field_id) = base.parse::<FieldId>() else {
                warn!("skipping VTK array `{}`: not a known field id", array.name);
                continue;
            };
            let value_type = ValueType::from_record_size(array.components)?;
            let (unit, time) = match field_meta.get(&array.name) {
                Some((unit, time)) => (unit.clone(), time.clone()),
                None => (Unit::dimensionless(), Quantity::new(0.0, Unit::second())),
            };
            fields.push(Field::new(
                mesh.clone(),
                field_id,
                value_type,
                unit,
                time,
                Some(array.values),
                field_type,
            )?);
        }
        Ok(fields)
    }
}

fn build_mesh(
    points: &[f64],
    connectivity: &[f64],
    cell_types: &[f64],
    metadata: &HashMap<String, Vec<f64>>,
) -> Result<Mesh, MeshFieldError> {
    let (dim, unit) = match metadata.keys().find(|k| k.starts_with(FIELD_MESH_PREFIX)) {
        Some(key) => {
            let rest = &key[FIELD_MESH_PREFIX.len()..];
            let (dim, unit) = rest
                .split_once('|')
                .ok_or_else(|| MeshFieldError::MeshIoParse(format!("malformed mesh metadata `{key}`")))?;
            let dim: usize = dim
                .parse()
                .map_err(|_| MeshFieldError::MeshIoParse(format!("invalid mesh dimension `{dim}`")))?;
            let unit = decode_name(unit);
            let unit = if unit.is_empty() {
                None
            } else {
                Some(Unit::parse(&unit)?)
            };
            (dim.clamp(1, 3), unit)
        }
        None => (3, None),
    };
    let vertex_labels = metadata.get(FIELD_VERTEX_LABELS);
    let cell_labels = metadata.get(FIELD_CELL_LABELS);

    let vertices = points
        .chunks_exact(3)
        .enumerate()
        .map(|(i, xyz)| {
            let label = vertex_labels
                .and_then(|l| l.get(i))
                .map_or(i as i64, |&l| l as i64);
            Vertex::new(i, label, &xyz[..dim])
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut cells = Vec::with_capacity(cell_types.len());
    let mut cursor = 0usize;
    for (i, &code) in cell_types.iter().enumerate() {
        let geometry = CellGeometry::from_vtk_code(code as i32).ok_or_else(|| {
            MeshFieldError::MeshIoParse(format!("unsupported VTK cell type {code}"))
        })?;
        let truncated = || MeshFieldError::MeshIoParse("truncated CELLS list".into());
        let n = index_value(*connectivity.get(cursor).ok_or_else(truncated)?, "cell size")?;
        let end = (cursor + 1).checked_add(n).ok_or_else(truncated)?;
        let ids = connectivity.get(cursor + 1..end).ok_or_else(truncated)?;
        cursor = end;
        let label = cell_labels
            .and_then(|l| l.get(i))
            .map_or(i as i64, |&l| l as i64);
        cells.push(Cell::new(
            i,
            label,
            geometry,
            ids.iter()
                .map(|&v| index_value(v, "vertex number"))
                .collect::<Result<_, _>>()?,
        )?);
    }
    Mesh::unstructured(vertices, cells, unit)
}

/// Array name -> (unit, time) from the `mf|name|unit|time unit` entries.
fn field_metadata(
    metadata: &HashMap<String, Vec<f64>>,
) -> Result<HashMap<String, (Unit, Quantity)>, MeshFieldError> {
    let mut out = HashMap::new();
    for (key, values) in metadata {
        let Some(rest) = key.strip_prefix(FIELD_META_PREFIX) else {
            continue;
        };
        let parts: Vec<&str> = rest.split('|').collect();
        if parts.len() != 3 {
            return Err(MeshFieldError::MeshIoParse(format!(
                "malformed field metadata `{key}`"
            )));
        }
        let unit = Unit::parse(&decode_name(parts[1]))?;
        let time_unit = Unit::parse(&decode_name(parts[2]))?;
        let time = values.first().copied().unwrap_or(0.0);
        out.insert(parts[0].to_string(), (unit, Quantity::new(time, time_unit)));
    }
    Ok(out)
}
