//! XDMF (XML) temporal collections of fields.
//!
//! The writer emits one `Uniform` grid per time step inside a
//! `CollectionType="Temporal"` collection, with inline XML `DataItem`
//! payloads, a `Mixed` topology and `XYZ` geometry. Field units, the time
//! unit and the mesh unit travel as `Information` elements.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::sync::Arc;

use itertools::Itertools;
use log::warn;
use roxmltree::{Document, Node};

use crate::data::field::Field;
use crate::data::field_id::FieldId;
use crate::data::value_type::{FieldType, ValueType};
use crate::geometry::cell_type::CellGeometry;
use crate::io::{FieldReader, FieldWriter};
use crate::mesh::{Cell, Mesh, Vertex};
use crate::mesh_error::MeshFieldError;
use crate::units::{Quantity, Unit};

const INFO_UNIT: &str = "unit";
const INFO_TIME_UNIT: &str = "time_unit";
const INFO_MESH_UNIT: &str = "mesh_unit";
const INFO_MESH_DIM: &str = "mesh_dim";

#[derive(Debug, Default, Clone)]
pub struct XdmfReader;

#[derive(Debug, Clone)]
pub struct XdmfWriter {
    collection_name: String,
}

impl Default for XdmfWriter {
    fn default() -> Self {
        Self {
            collection_name: "TimeSeries".to_string(),
        }
    }
}

impl XdmfWriter {
    /// Name of the temporal collection grid.
    pub fn with_collection_name(mut self, name: impl Into<String>) -> Self {
        self.collection_name = name.into();
        self
    }

    fn write_data_item<W: Write>(
        writer: &mut W,
        indent: &str,
        dimensions: &str,
        number_type: &str,
        values: impl Iterator<Item = String>,
    ) -> Result<(), MeshFieldError> {
        let precision = if number_type == "Float" {
            " Precision=\"8\""
        } else {
            ""
        };
        writeln!(
            writer,
            "{indent}<DataItem Dimensions=\"{dimensions}\" NumberType=\"{number_type}\"{precision} Format=\"XML\">"
        )?;
        writeln!(writer, "{indent}  {}", values.format(" "))?;
        writeln!(writer, "{indent}</DataItem>")?;
        Ok(())
    }

    fn write_step<W: Write>(
        writer: &mut W,
        index: usize,
        fields: &[&Field],
    ) -> Result<(), MeshFieldError> {
        let Some(first) = fields.first() else {
            return Ok(());
        };
        let grid = first.mesh().to_unstructured()?;
        let time = first.time();
        writeln!(writer, "      <Grid Name=\"step_{index}\" GridType=\"Uniform\">")?;
        writeln!(writer, "        <Time Value=\"{}\"/>", time.value)?;
        writeln!(
            writer,
            "        <Information Name=\"{INFO_TIME_UNIT}\" Value=\"{}\"/>",
            escape_xml(time.unit.name())
        )?;
        writeln!(
            writer,
            "        <Information Name=\"{INFO_MESH_DIM}\" Value=\"{}\"/>",
            grid.dimension()
        )?;
        if let Some(unit) = grid.unit() {
            writeln!(
                writer,
                "        <Information Name=\"{INFO_MESH_UNIT}\" Value=\"{}\"/>",
                escape_xml(unit.name())
            )?;
        }

        let mut topology = Vec::new();
        for cell in grid.cells() {
            topology.push(cell.geometry().xdmf_code());
            topology.extend(cell.vertices().iter().map(|&v| v as i64));
        }
        writeln!(
            writer,
            "        <Topology TopologyType=\"Mixed\" NumberOfElements=\"{}\">",
            grid.number_of_cells()
        )?;
        Self::write_data_item(
            writer,
            "          ",
            &topology.len().to_string(),
            "Int",
            topology.iter().map(|v| v.to_string()),
        )?;
        writeln!(writer, "        </Topology>")?;

        writeln!(writer, "        <Geometry GeometryType=\"XYZ\">")?;
        Self::write_data_item(
            writer,
            "          ",
            &format!("{} 3", grid.number_of_vertices()),
            "Float",
            grid.vertices()
                .iter()
                .flat_map(|v| v.position())
                .map(|c| c.to_string()),
        )?;
        writeln!(writer, "        </Geometry>")?;

        for field in fields {
            let attribute_type = match field.value_type() {
                ValueType::Scalar => "Scalar",
                ValueType::Vector => "Vector",
                ValueType::Tensor => "Tensor",
            };
            let center = match field.field_type() {
                FieldType::VertexBased => "Node",
                FieldType::CellBased => "Cell",
            };
            writeln!(
                writer,
                "        <Attribute Name=\"{}\" AttributeType=\"{attribute_type}\" Center=\"{center}\">",
                field.field_id().name()
            )?;
            writeln!(
                writer,
                "          <Information Name=\"{INFO_UNIT}\" Value=\"{}\"/>",
                escape_xml(field.unit().name())
            )?;
            Self::write_data_item(
                writer,
                "          ",
                &format!("{} {}", field.record_count()?, field.record_size()),
                "Float",
                field.values()?.iter().map(|v| v.to_string()),
            )?;
            writeln!(writer, "        </Attribute>")?;
        }
        writeln!(writer, "      </Grid>")?;
        Ok(())
    }
}

impl FieldWriter for XdmfWriter {
    /// Consecutive fields with the same time and mesh share one step grid.
    fn write<W: Write>(&self, mut writer: W, fields: &[&Field]) -> Result<(), MeshFieldError> {
        let keyed = fields
            .iter()
            .map(|f| {
                Ok((
                    (f.time().si_value().to_bits(), f.mesh().digest()?),
                    *f,
                ))
            })
            .collect::<Result<Vec<_>, MeshFieldError>>()?;

        writeln!(writer, "<?xml version=\"1.0\" ?>")?;
        writeln!(writer, "<Xdmf Version=\"3.0\">")?;
        writeln!(writer, "  <Domain>")?;
        writeln!(
            writer,
            "    <Grid Name=\"{}\" GridType=\"Collection\" CollectionType=\"Temporal\">",
            escape_xml(&self.collection_name)
        )?;
        let steps = keyed.into_iter().chunk_by(|(key, _)| *key);
        for (index, (_, step)) in steps.into_iter().enumerate() {
            let step: Vec<&Field> = step.map(|(_, f)| f).collect();
            Self::write_step(&mut writer, index, &step)?;
        }
        writeln!(writer, "    </Grid>")?;
        writeln!(writer, "  </Domain>")?;
        writeln!(writer, "</Xdmf>")?;
        Ok(())
    }
}

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

impl XdmfReader {
    fn parse_numbers<T: std::str::FromStr>(node: Node<'_, '_>) -> Result<Vec<T>, MeshFieldError> {
        let format = node.attribute("Format").unwrap_or("XML").trim();
        if !format.eq_ignore_ascii_case("XML") {
            return Err(MeshFieldError::MeshIoParse(format!(
                "unsupported DataItem format {format}"
            )));
        }
        node.text()
            .unwrap_or("")
            .split_whitespace()
            .map(|v| {
                v.parse::<T>()
                    .map_err(|_| MeshFieldError::MeshIoParse(format!("invalid number {v}")))
            })
            .collect()
    }

    fn child<'a, 'input>(
        node: Node<'a, 'input>,
        tag: &str,
    ) -> Result<Node<'a, 'input>, MeshFieldError> {
        node.children()
            .find(|n| n.has_tag_name(tag))
            .ok_or_else(|| MeshFieldError::MeshIoParse(format!("missing {tag}")))
    }

    fn information<'a>(node: Node<'a, '_>, name: &str) -> Option<&'a str> {
        node.children()
            .find(|n| n.has_tag_name("Information") && n.attribute("Name") == Some(name))
            .and_then(|n| n.attribute("Value"))
    }

    fn read_mesh(grid: Node<'_, '_>) -> Result<Mesh, MeshFieldError> {
        let dim = Self::information(grid, INFO_MESH_DIM)
            .and_then(|d| d.parse::<usize>().ok())
            .unwrap_or(3)
            .clamp(1, 3);
        let unit = Self::information(grid, INFO_MESH_UNIT)
            .map(Unit::parse)
            .transpose()?;

        let geometry = Self::child(grid, "Geometry")?;
        let coords: Vec<f64> = Self::parse_numbers(Self::child(geometry, "DataItem")?)?;
        let vertices = coords
            .chunks_exact(3)
            .enumerate()
            .map(|(i, xyz)| Vertex::new(i, i as i64, &xyz[..dim]))
            .collect::<Result<Vec<_>, _>>()?;

        let topology = Self::child(grid, "Topology")?;
        let topology_type = topology.attribute("TopologyType").unwrap_or("Mixed");
        if topology_type != "Mixed" {
            return Err(MeshFieldError::MeshIoParse(format!(
                "unsupported topology type {topology_type}"
            )));
        }
        let codes: Vec<i64> = Self::parse_numbers(Self::child(topology, "DataItem")?)?;
        let mut cells = Vec::new();
        let mut cursor = 0usize;
        while cursor < codes.len() {
            let geometry = CellGeometry::from_xdmf_code(codes[cursor]).ok_or_else(|| {
                MeshFieldError::MeshIoParse(format!(
                    "unsupported XDMF mixed cell code {}",
                    codes[cursor]
                ))
            })?;
            let n = geometry.vertex_count();
            let ids = codes
                .get(cursor + 1..cursor + 1 + n)
                .ok_or_else(|| MeshFieldError::MeshIoParse("truncated topology".into()))?;
            let number = cells.len();
            cells.push(Cell::new(
                number,
                number as i64,
                geometry,
                ids.iter().map(|&v| v as usize).collect(),
            )?);
            cursor += n + 1;
        }
        Mesh::unstructured(vertices, cells, unit)
    }
}

impl FieldReader for XdmfReader {
    fn read<R: Read>(&self, mut reader: R) -> Result<Vec<Field>, MeshFieldError> {
        let mut input = String::new();
        reader.read_to_string(&mut input)?;
        let doc = Document::parse(&input)
            .map_err(|err| MeshFieldError::MeshIoParse(format!("XML parse error: {err}")))?;

        let mut fields = Vec::new();
        let mut meshes: HashMap<u64, Arc<Mesh>> = HashMap::new();
        for grid in doc
            .descendants()
            .filter(|n| n.has_tag_name("Grid") && n.attribute("GridType") != Some("Collection"))
        {
            let time_value: f64 = Self::child(grid, "Time")?
                .attribute("Value")
                .ok_or_else(|| MeshFieldError::MeshIoParse("Time without Value".into()))?
                .parse()
                .map_err(|_| MeshFieldError::MeshIoParse("invalid Time value".into()))?;
            let time_unit = match Self::information(grid, INFO_TIME_UNIT) {
                Some(name) => Unit::parse(name)?,
                None => Unit::second(),
            };
            let mesh = Self::read_mesh(grid)?;
            let mesh = meshes
                .entry(mesh.digest()?)
                .or_insert_with(|| Arc::new(mesh))
                .clone();

            for attribute in grid.children().filter(|n| n.has_tag_name("Attribute")) {
                let name = attribute.attribute("Name").unwrap_or("");
                let Ok(field_id) = name.parse::<FieldId>() else {
                    warn!("skipping XDMF attribute `{name}`: not a known field id");
                    continue;
                };
                let field_type = match attribute.attribute("Center").unwrap_or("Node") {
                    "Node" => FieldType::VertexBased,
                    "Cell" => FieldType::CellBased,
                    other => {
                        warn!("skipping XDMF attribute `{name}` centered on {other}");
                        continue;
                    }
                };
                let value_type = match attribute.attribute("AttributeType").unwrap_or("Scalar") {
                    "Scalar" => ValueType::Scalar,
                    "Vector" => ValueType::Vector,
                    "Tensor" => ValueType::Tensor,
                    other => {
                        return Err(MeshFieldError::MeshIoParse(format!(
                            "unsupported attribute type {other}"
                        )));
                    }
                };
                let unit = match Self::information(attribute, INFO_UNIT) {
                    Some(name) => Unit::parse(name)?,
                    None => Unit::dimensionless(),
                };
                let values: Vec<f64> = Self::parse_numbers(Self::child(attribute, "DataItem")?)?;
                fields.push(Field::new(
                    mesh.clone(),
                    field_id,
                    value_type,
                    unit,
                    Quantity::new(time_value, time_unit.clone()),
                    Some(values),
                    field_type,
                )?);
            }
        }
        Ok(fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_attribute_values() {
        assert_eq!(escape_xml("a<b & \"c\""), "a&lt;b &amp; &quot;c&quot;");
    }

    #[test]
    fn reads_minimal_temporal_collection() {
        let xml = r#"<?xml version="1.0" ?>
<Xdmf Version="3.0">
  <Domain>
    <Grid Name="ts" GridType="Collection" CollectionType="Temporal">
      <Grid Name="step_0" GridType="Uniform">
        <Time Value="2.5"/>
        <Information Name="mesh_dim" Value="2"/>
        <Topology TopologyType="Mixed" NumberOfElements="1">
          <DataItem Dimensions="4" NumberType="Int" Format="XML">4 0 1 2</DataItem>
        </Topology>
        <Geometry GeometryType="XYZ">
          <DataItem Dimensions="3 3" NumberType="Float" Format="XML">0 0 0 1 0 0 0 1 0</DataItem>
        </Geometry>
        <Attribute Name="FID_Temperature" AttributeType="Scalar" Center="Node">
          <Information Name="unit" Value="K"/>
          <DataItem Dimensions="3 1" NumberType="Float" Format="XML">1 2 3</DataItem>
        </Attribute>
      </Grid>
    </Grid>
  </Domain>
</Xdmf>"#;
        let fields = XdmfReader.read(xml.as_bytes()).unwrap();
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].time().value, 2.5);
        assert_eq!(fields[0].unit().name(), "K");
        assert_eq!(fields[0].mesh().vertex(1).unwrap().coords(), &[1.0, 0.0]);
    }
}
