//! Material catalogue.
//!
//! A cell stores only a compact [`Material`] code. Air is code 0 so that a
//! zeroed cell array is empty space.

use serde::{Deserialize, Serialize};

/// Compact material code stored in every cell.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Material(pub u16);

/// Catalogue entry for one material.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MaterialDef {
    /// Stable lookup name.
    pub name: &'static str,
    /// Display color for consumers that draw the world.
    pub color: [u8; 3],
}

/// All known materials. The position in this table is the material code.
pub const MATERIALS: [MaterialDef; 15] = [
    MaterialDef { name: "air", color: [0, 0, 0] },
    MaterialDef { name: "grass", color: [84, 140, 60] },
    MaterialDef { name: "dirt", color: [120, 86, 56] },
    MaterialDef { name: "stone", color: [128, 128, 128] },
    MaterialDef { name: "moon", color: [200, 200, 190] },
    MaterialDef { name: "asteroid", color: [96, 88, 80] },
    MaterialDef { name: "sun", color: [255, 220, 90] },
    MaterialDef { name: "blue_block", color: [40, 70, 200] },
    MaterialDef { name: "blue_sand", color: [110, 140, 220] },
    MaterialDef { name: "purple_block", color: [120, 40, 170] },
    MaterialDef { name: "purple_sand", color: [170, 120, 210] },
    MaterialDef { name: "red_block", color: [190, 40, 40] },
    MaterialDef { name: "red_sand", color: [220, 120, 110] },
    MaterialDef { name: "yellow_block", color: [220, 200, 40] },
    MaterialDef { name: "yellow_sand", color: [235, 220, 140] },
];

impl Material {
    pub const AIR: Self = Self(0);
    pub const GRASS: Self = Self(1);
    pub const DIRT: Self = Self(2);
    pub const STONE: Self = Self(3);
    pub const MOON: Self = Self(4);
    pub const ASTEROID: Self = Self(5);
    pub const SUN: Self = Self(6);
    pub const BLUE_BLOCK: Self = Self(7);
    pub const BLUE_SAND: Self = Self(8);
    pub const PURPLE_BLOCK: Self = Self(9);
    pub const PURPLE_SAND: Self = Self(10);
    pub const RED_BLOCK: Self = Self(11);
    pub const RED_SAND: Self = Self(12);
    pub const YELLOW_BLOCK: Self = Self(13);
    pub const YELLOW_SAND: Self = Self(14);

    /// Whether this is empty space.
    pub fn is_air(self) -> bool {
        self == Self::AIR
    }

    /// Catalogue entry, or `None` for codes outside the catalogue.
    pub fn def(self) -> Option<&'static MaterialDef> {
        MATERIALS.get(usize::from(self.0))
    }

    /// Catalogue name, or `None` for codes outside the catalogue.
    pub fn name(self) -> Option<&'static str> {
        self.def().map(|d| d.name)
    }

    /// Look up a material by its catalogue name.
    pub fn from_name(name: &str) -> Option<Self> {
        MATERIALS
            .iter()
            .position(|d| d.name == name)
            .map(|i| Self(i as u16))
    }
}
