//! Stock movements: caller input, validated shape, and the immutable record.
//!
//! A movement goes through three stages:
//!
//! 1. `MovementDraft` is the loosely shaped input (what an HTTP body carries).
//! 2. `MovementDraft::validate` turns it into a `NewMovement`, whose
//!    `MovementKind` carries exactly the locations its type needs.
//! 3. Once the engine has normalised the quantity to base units and pinned a
//!    batch, it holds a `ResolvedMovement`, which knows its ledger deltas and
//!    becomes a `StockMovement` after those deltas are applied.

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

use medstock_core::{BatchId, LocationId, MovementId, PresentationId, ProductId, Quantity, TenantId};

use crate::error::{InventoryError, InventoryResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementType {
    In,
    Out,
    Transfer,
    Adjustment,
}

impl MovementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementType::In => "IN",
            MovementType::Out => "OUT",
            MovementType::Transfer => "TRANSFER",
            MovementType::Adjustment => "ADJUSTMENT",
        }
    }
}

impl core::fmt::Display for MovementType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Location shape of a movement, one variant per type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementKind {
    In { to: LocationId },
    Out { from: LocationId },
    Transfer { from: LocationId, to: LocationId },
    /// Signed correction at a single location.
    Adjustment { location: LocationId },
}

impl MovementKind {
    pub fn movement_type(&self) -> MovementType {
        match self {
            MovementKind::In { .. } => MovementType::In,
            MovementKind::Out { .. } => MovementType::Out,
            MovementKind::Transfer { .. } => MovementType::Transfer,
            MovementKind::Adjustment { .. } => MovementType::Adjustment,
        }
    }

    /// Every location this movement touches.
    pub fn locations(&self) -> Vec<LocationId> {
        match *self {
            MovementKind::In { to } => vec![to],
            MovementKind::Out { from } => vec![from],
            MovementKind::Transfer { from, to } => vec![from, to],
            MovementKind::Adjustment { location } => vec![location],
        }
    }
}

/// Quantity as supplied by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MovementQuantity {
    BaseUnits(Quantity),
    Presentations {
        presentation_id: PresentationId,
        count: Quantity,
    },
}

impl MovementQuantity {
    pub fn amount(&self) -> Quantity {
        match self {
            MovementQuantity::BaseUnits(q) => *q,
            MovementQuantity::Presentations { count, .. } => *count,
        }
    }
}

/// Free-form link to the business document that caused a movement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovementReference {
    pub reference_type: Option<String>,
    pub reference_id: Option<String>,
}

impl MovementReference {
    pub fn new(reference_type: impl Into<String>, reference_id: impl ToString) -> Self {
        Self {
            reference_type: Some(reference_type.into()),
            reference_id: Some(reference_id.to_string()),
        }
    }
}

/// Unvalidated movement input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovementDraft {
    pub movement_type: MovementType,
    pub product_id: ProductId,
    pub batch_id: Option<BatchId>,
    pub from_location_id: Option<LocationId>,
    pub to_location_id: Option<LocationId>,
    /// Positive magnitude; signed for adjustments. Presentation count when
    /// `presentation_id` is set, base units otherwise.
    pub quantity: Quantity,
    pub presentation_id: Option<PresentationId>,
    pub reference: MovementReference,
    pub note: Option<String>,
}

impl MovementDraft {
    /// Quantity first, then the location combination.
    pub fn validate(self) -> InventoryResult<NewMovement> {
        validate_quantity(self.movement_type, self.quantity)?;
        let kind = self.kind()?;

        let quantity = match self.presentation_id {
            Some(presentation_id) => MovementQuantity::Presentations {
                presentation_id,
                count: self.quantity,
            },
            None => MovementQuantity::BaseUnits(self.quantity),
        };

        Ok(NewMovement {
            kind,
            product_id: self.product_id,
            batch_id: self.batch_id,
            quantity,
            reference: self.reference,
            note: self.note,
        })
    }

    fn kind(&self) -> InventoryResult<MovementKind> {
        let ty = self.movement_type;
        match (ty, self.from_location_id, self.to_location_id) {
            (MovementType::In, None, Some(to)) => Ok(MovementKind::In { to }),
            (MovementType::In, _, _) => Err(InventoryError::missing_location(
                ty,
                "requires toLocationId and no fromLocationId",
            )),

            (MovementType::Out, Some(from), None) => Ok(MovementKind::Out { from }),
            (MovementType::Out, _, _) => Err(InventoryError::missing_location(
                ty,
                "requires fromLocationId and no toLocationId",
            )),

            (MovementType::Transfer, Some(from), Some(to)) if from != to => {
                Ok(MovementKind::Transfer { from, to })
            }
            (MovementType::Transfer, Some(_), Some(_)) => Err(InventoryError::missing_location(
                ty,
                "source and destination must differ",
            )),
            (MovementType::Transfer, _, _) => Err(InventoryError::missing_location(
                ty,
                "requires both fromLocationId and toLocationId",
            )),

            (MovementType::Adjustment, Some(from), Some(to)) if from != to => Err(
                InventoryError::missing_location(ty, "applies to a single location"),
            ),
            (MovementType::Adjustment, Some(location), _) | (MovementType::Adjustment, None, Some(location)) => {
                Ok(MovementKind::Adjustment { location })
            }
            (MovementType::Adjustment, None, None) => Err(InventoryError::missing_location(
                ty,
                "requires fromLocationId or toLocationId",
            )),
        }
    }
}

/// Positive for IN/OUT/TRANSFER, non-zero for ADJUSTMENT.
pub fn validate_quantity(movement_type: MovementType, quantity: Quantity) -> InventoryResult<()> {
    match movement_type {
        MovementType::Adjustment if quantity.is_zero() => Err(InventoryError::invalid_quantity(
            "adjustment quantity must be non-zero",
        )),
        MovementType::Adjustment => Ok(()),
        _ if !quantity.is_positive() => Err(InventoryError::invalid_quantity(format!(
            "{movement_type} quantity must be positive, got {quantity}"
        ))),
        _ => Ok(()),
    }
}

/// Validated movement; the quantity may still be a presentation count and the
/// batch may still be unresolved (OUT only).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMovement {
    pub kind: MovementKind,
    pub product_id: ProductId,
    pub batch_id: Option<BatchId>,
    pub quantity: MovementQuantity,
    pub reference: MovementReference,
    pub note: Option<String>,
}

impl NewMovement {
    /// A TRANSFER of base units between two locations.
    pub fn transfer(
        product_id: ProductId,
        batch_id: BatchId,
        from: LocationId,
        to: LocationId,
        quantity: Quantity,
    ) -> InventoryResult<Self> {
        MovementDraft {
            movement_type: MovementType::Transfer,
            product_id,
            batch_id: Some(batch_id),
            from_location_id: Some(from),
            to_location_id: Some(to),
            quantity,
            presentation_id: None,
            reference: MovementReference::default(),
            note: None,
        }
        .validate()
    }

    pub fn with_reference(mut self, reference: MovementReference) -> Self {
        self.reference = reference;
        self
    }

    pub fn with_note(mut self, note: Option<String>) -> Self {
        self.note = note;
        self
    }

    pub fn movement_type(&self) -> MovementType {
        self.kind.movement_type()
    }

    /// Pin the batch and the base-unit quantity.
    pub fn resolve(self, batch_id: BatchId, base_quantity: Quantity) -> InventoryResult<ResolvedMovement> {
        validate_quantity(self.movement_type(), base_quantity)?;
        Ok(ResolvedMovement {
            kind: self.kind,
            product_id: self.product_id,
            batch_id,
            quantity: base_quantity,
            reference: self.reference,
            note: self.note,
        })
    }
}

/// A movement ready to hit the ledger: base units, concrete batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedMovement {
    pub kind: MovementKind,
    pub product_id: ProductId,
    pub batch_id: BatchId,
    /// Base units. Positive magnitude except for adjustments.
    pub quantity: Quantity,
    pub reference: MovementReference,
    pub note: Option<String>,
}

impl ResolvedMovement {
    /// Ledger deltas in application order (debit before credit).
    pub fn deltas(&self) -> Vec<(LocationId, Quantity)> {
        let q = self.quantity;
        match self.kind {
            MovementKind::In { to } => vec![(to, q)],
            MovementKind::Out { from } => vec![(from, -q)],
            MovementKind::Transfer { from, to } => vec![(from, -q), (to, q)],
            MovementKind::Adjustment { location } => vec![(location, q)],
        }
    }
}

/// Per tenant, per calendar year movement sequence number.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MovementNumber {
    pub year: i32,
    pub number: u64,
}

impl core::fmt::Display for MovementNumber {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "MOV-{}-{:06}", self.year, self.number)
    }
}

/// Immutable record of one ledger-affecting event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockMovement {
    pub id: MovementId,
    pub tenant_id: TenantId,
    pub number: MovementNumber,
    #[serde(rename = "type")]
    pub movement_type: MovementType,
    pub product_id: ProductId,
    pub batch_id: BatchId,
    pub from_location_id: Option<LocationId>,
    pub to_location_id: Option<LocationId>,
    /// Signed per type: OUT negative, IN and TRANSFER positive, ADJUSTMENT as applied.
    pub quantity: Quantity,
    #[serde(flatten)]
    pub reference: MovementReference,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl StockMovement {
    pub fn record(
        tenant_id: TenantId,
        number: MovementNumber,
        movement: ResolvedMovement,
        created_at: DateTime<Utc>,
    ) -> Self {
        let (from_location_id, to_location_id, quantity) = match movement.kind {
            MovementKind::In { to } => (None, Some(to), movement.quantity),
            MovementKind::Out { from } => (Some(from), None, -movement.quantity),
            MovementKind::Transfer { from, to } => (Some(from), Some(to), movement.quantity),
            MovementKind::Adjustment { location } if movement.quantity.is_negative() => {
                (Some(location), None, movement.quantity)
            }
            MovementKind::Adjustment { location } => (None, Some(location), movement.quantity),
        };

        Self {
            id: MovementId::new(),
            tenant_id,
            number,
            movement_type: movement.kind.movement_type(),
            product_id: movement.product_id,
            batch_id: movement.batch_id,
            from_location_id,
            to_location_id,
            quantity,
            reference: movement.reference,
            note: movement.note,
            created_at,
        }
    }

    /// `MOV-<year>-<number>` as shown to users.
    pub fn display_number(&self) -> String {
        self.number.to_string()
    }
}

/// Year used for movement numbering.
pub fn numbering_year(at: DateTime<Utc>) -> i32 {
    at.year()
}
