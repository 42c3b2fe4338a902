//! Physical-quantity tags for fields.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::mesh_error::MeshFieldError;

macro_rules! field_ids {
    ($($variant:ident => $name:literal,)*) => {
        /// Identifies the physical quantity a field carries.
        ///
        /// Every variant has a stable external name (`FID_*`) used by the
        /// on-disk formats.
        #[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
        pub enum FieldId {
            $($variant,)*
        }

        impl FieldId {
            pub const ALL: &'static [FieldId] = &[$(FieldId::$variant,)*];

            /// Stable external name, e.g. `FID_Temperature`.
            pub fn name(self) -> &'static str {
                match self {
                    $(FieldId::$variant => $name,)*
                }
            }
        }
    };
}

field_ids! {
    Displacement => "FID_Displacement",
    Strain => "FID_Strain",
    Stress => "FID_Stress",
    Temperature => "FID_Temperature",
    Humidity => "FID_Humidity",
    Concentration => "FID_Concentration",
    ThermalAbsorptionVolume => "FID_Thermal_absorption_volume",
    ThermalAbsorptionSurface => "FID_Thermal_absorption_surface",
    MaterialNumber => "FID_Material_number",
    BucklingShape => "FID_BucklingShape",
    FibreOrientation => "FID_FibreOrientation",
    DomainNumber => "FID_DomainNumber",
    Permeability => "FID_Permeability",
    Velocity => "FID_Velocity",
    Pressure => "FID_Pressure",
    Porosity => "FID_Porosity",
    MisesStress => "FID_Mises_Stress",
    MaxPrincipalStress => "FID_MaxPrincipal_Stress",
    MidPrincipalStress => "FID_MidPrincipal_Stress",
    MinPrincipalStress => "FID_MinPrincipal_Stress",
    MaxPrincipalStrain => "FID_MaxPrincipal_Strain",
    MidPrincipalStrain => "FID_MidPrincipal_Strain",
    MinPrincipalStrain => "FID_MinPrincipal_Strain",
}

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FieldId {
    type Err = MeshFieldError;

    /// Accepts the external name, with or without the `FID_` prefix.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        FieldId::ALL
            .iter()
            .copied()
            .find(|id| id.name() == s || id.name().strip_prefix("FID_") == Some(s))
            .ok_or_else(|| MeshFieldError::MeshIoParse(format!("unknown field id `{s}`")))
    }
}
