//! Stellar type classification.

use serde::{Deserialize, Serialize};

/// Evolutionary classification of a star.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StellarType {
    /// Deeply or fully convective main sequence star, M <= 0.7 M☉.
    MsLte07,
    /// Main sequence star, M > 0.7 M☉.
    MsGt07,
    /// Chemically homogeneous main sequence star.
    Che,
    HertzsprungGap,
    FirstGiantBranch,
    CoreHeliumBurning,
    EarlyAsymptoticGiantBranch,
    HeliumWhiteDwarf,
    CarbonOxygenWhiteDwarf,
    OxygenNeonWhiteDwarf,
    NeutronStar,
    BlackHole,
    MasslessRemnant,
}

impl StellarType {
    /// Zero-age main sequence type for a star of the given mass.
    pub fn zams(mass: f64) -> Self {
        if mass <= 0.7 {
            StellarType::MsLte07
        } else {
            StellarType::MsGt07
        }
    }

    /// Numeric code written to record files.
    pub fn code(&self) -> u8 {
        match self {
            StellarType::MsLte07 => 0,
            StellarType::MsGt07 => 1,
            StellarType::HertzsprungGap => 2,
            StellarType::FirstGiantBranch => 3,
            StellarType::CoreHeliumBurning => 4,
            StellarType::EarlyAsymptoticGiantBranch => 5,
            StellarType::HeliumWhiteDwarf => 10,
            StellarType::CarbonOxygenWhiteDwarf => 11,
            StellarType::OxygenNeonWhiteDwarf => 12,
            StellarType::NeutronStar => 13,
            StellarType::BlackHole => 14,
            StellarType::MasslessRemnant => 15,
            StellarType::Che => 16,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            StellarType::MsLte07 => "Main_Sequence_<=_0.7",
            StellarType::MsGt07 => "Main_Sequence_>_0.7",
            StellarType::Che => "Chemically_Homogeneous",
            StellarType::HertzsprungGap => "Hertzsprung_Gap",
            StellarType::FirstGiantBranch => "First_Giant_Branch",
            StellarType::CoreHeliumBurning => "Core_Helium_Burning",
            StellarType::EarlyAsymptoticGiantBranch => "Early_Asymptotic_Giant_Branch",
            StellarType::HeliumWhiteDwarf => "Helium_White_Dwarf",
            StellarType::CarbonOxygenWhiteDwarf => "Carbon-Oxygen_White_Dwarf",
            StellarType::OxygenNeonWhiteDwarf => "Oxygen-Neon_White_Dwarf",
            StellarType::NeutronStar => "Neutron_Star",
            StellarType::BlackHole => "Black_Hole",
            StellarType::MasslessRemnant => "Massless_Remnant",
        }
    }

    pub fn is_main_sequence(&self) -> bool {
        matches!(
            self,
            StellarType::MsLte07 | StellarType::MsGt07 | StellarType::Che
        )
    }

    /// Giant-branch types with a deep convective envelope.
    pub fn is_giant(&self) -> bool {
        matches!(
            self,
            StellarType::FirstGiantBranch
                | StellarType::CoreHeliumBurning
                | StellarType::EarlyAsymptoticGiantBranch
        )
    }

    pub fn is_white_dwarf(&self) -> bool {
        matches!(
            self,
            StellarType::HeliumWhiteDwarf
                | StellarType::CarbonOxygenWhiteDwarf
                | StellarType::OxygenNeonWhiteDwarf
        )
    }

    /// Neutron star or black hole.
    pub fn is_compact_object(&self) -> bool {
        matches!(self, StellarType::NeutronStar | StellarType::BlackHole)
    }

    /// Any end state: white dwarf, compact object or massless remnant.
    pub fn is_remnant(&self) -> bool {
        self.is_white_dwarf() || self.is_compact_object() || *self == StellarType::MasslessRemnant
    }
}

impl std::fmt::Display for StellarType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}
