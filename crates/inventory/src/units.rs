//! Unit converter: presentation counts ↔ base units.
//!
//! The ledger only ever stores base units. Presentation counts exist at the
//! edges (request lines, receiving input, display) and are normalized here
//! before anything touches a balance.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use medstock_catalog::Presentation;
use medstock_core::{PresentationId, Quantity};

use crate::error::{InventoryError, InventoryResult};

/// The unit a quantity is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "unit", rename_all = "snake_case")]
pub enum UnitOfMeasure {
    /// Base units of the product; conversion is the identity.
    Base,
    /// Whole packages of a presentation.
    Presentation {
        presentation_id: PresentationId,
        units_per_presentation: Decimal,
    },
}

impl UnitOfMeasure {
    pub fn of(presentation: &Presentation) -> InventoryResult<Self> {
        let unit = Self::Presentation {
            presentation_id: presentation.id,
            units_per_presentation: presentation.units_per_presentation,
        };
        unit.validate()?;
        Ok(unit)
    }

    pub fn presentation_id(&self) -> Option<PresentationId> {
        match self {
            Self::Base => None,
            Self::Presentation {
                presentation_id, ..
            } => Some(*presentation_id),
        }
    }

    /// Base units contained in one unit of this measure.
    pub fn factor(&self) -> Decimal {
        match self {
            Self::Base => Decimal::ONE,
            Self::Presentation {
                units_per_presentation,
                ..
            } => *units_per_presentation,
        }
    }

    fn validate(&self) -> InventoryResult<()> {
        if let Self::Presentation {
            presentation_id,
            units_per_presentation,
        } = self
        {
            if *units_per_presentation <= Decimal::ZERO {
                return Err(InventoryError::invalid_presentation(
                    *presentation_id,
                    format!("units per presentation must be positive, got {units_per_presentation}"),
                ));
            }
        }
        Ok(())
    }

    /// `count` of this unit expressed in base units.
    pub fn to_base(&self, count: Quantity) -> InventoryResult<Quantity> {
        self.validate()?;
        count
            .checked_mul(self.factor())
            .ok_or_else(|| InventoryError::invalid_quantity("quantity overflow converting to base units"))
    }

    /// Exact count of this unit for `base` units; may be fractional.
    pub fn from_base(&self, base: Quantity) -> InventoryResult<Quantity> {
        self.validate()?;
        base.checked_div(self.factor())
            .ok_or_else(|| InventoryError::invalid_quantity("quantity overflow converting from base units"))
    }

    /// Count of this unit fully covered by `base` units.
    ///
    /// Presentation counts are truncated toward zero to whole packages; base
    /// units pass through untouched. Used wherever a conversion must never
    /// over-report (decrementing a request line).
    pub fn covered_by(&self, base: Quantity) -> InventoryResult<Quantity> {
        match self {
            Self::Base => Ok(base),
            Self::Presentation { .. } => Ok(self.from_base(base)?.trunc()),
        }
    }
}

/// `count` presentations in base units.
pub fn to_base_units(presentation: &Presentation, count: Quantity) -> InventoryResult<Quantity> {
    UnitOfMeasure::of(presentation)?.to_base(count)
}

/// `base_units` expressed as (possibly fractional) presentation count.
///
/// Display / interpretation only; ledger storage is always in base units.
pub fn from_base_units(presentation: &Presentation, base_units: Quantity) -> InventoryResult<Quantity> {
    UnitOfMeasure::of(presentation)?.from_base(base_units)
}
