use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use carestock_core::{ActorId, DomainError, DomainResult, Entity, ItemId, MovementId, SubjectId};

const MAX_REMARK_LEN: usize = 500;

/// Category of a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementKind {
    /// Goods received; increases stock.
    Restock,
    /// Goods handed to a resident; decreases stock.
    Issue,
    /// Goods consumed while providing a service to a resident; decreases stock.
    Service,
}

impl MovementKind {
    pub const ALL: [MovementKind; 3] = [
        MovementKind::Restock,
        MovementKind::Issue,
        MovementKind::Service,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            MovementKind::Restock => "RESTOCK",
            MovementKind::Issue => "ISSUE",
            MovementKind::Service => "SERVICE",
        }
    }

    pub fn is_inbound(self) -> bool {
        matches!(self, MovementKind::Restock)
    }

    /// ISSUE and SERVICE must name the resident they are for.
    pub fn requires_subject(self) -> bool {
        !self.is_inbound()
    }

    /// Effect of `magnitude` units of this kind on the on-hand quantity.
    pub fn signed(self, magnitude: i64) -> i64 {
        if self.is_inbound() { magnitude } else { -magnitude }
    }
}

impl core::fmt::Display for MovementKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for MovementKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "RESTOCK" => Ok(MovementKind::Restock),
            "ISSUE" => Ok(MovementKind::Issue),
            "SERVICE" => Ok(MovementKind::Service),
            _ => Err(DomainError::invalid_kind(s)),
        }
    }
}

/// A validated request to move stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementRequest {
    pub item_id: ItemId,
    pub kind: MovementKind,
    /// Unsigned magnitude; the sign comes from `kind`.
    pub quantity: i64,
    pub actor_id: ActorId,
    pub subject_id: Option<SubjectId>,
    pub remark: Option<String>,
    /// Stamped at append time when absent.
    pub occurred_at: Option<DateTime<Utc>>,
}

impl MovementRequest {
    pub fn restock(item_id: ItemId, quantity: i64, actor_id: ActorId) -> Self {
        Self::build(item_id, MovementKind::Restock, quantity, actor_id, None)
    }

    pub fn issue(item_id: ItemId, quantity: i64, actor_id: ActorId, subject_id: SubjectId) -> Self {
        Self::build(item_id, MovementKind::Issue, quantity, actor_id, Some(subject_id))
    }

    pub fn service(
        item_id: ItemId,
        quantity: i64,
        actor_id: ActorId,
        subject_id: SubjectId,
    ) -> Self {
        Self::build(item_id, MovementKind::Service, quantity, actor_id, Some(subject_id))
    }

    fn build(
        item_id: ItemId,
        kind: MovementKind,
        quantity: i64,
        actor_id: ActorId,
        subject_id: Option<SubjectId>,
    ) -> Self {
        Self {
            item_id,
            kind,
            quantity,
            actor_id,
            subject_id,
            remark: None,
            occurred_at: None,
        }
    }

    pub fn with_remark(mut self, remark: impl Into<String>) -> Self {
        self.remark = Some(remark.into());
        self
    }

    pub fn at(mut self, occurred_at: DateTime<Utc>) -> Self {
        self.occurred_at = Some(occurred_at);
        self
    }

    /// Per-kind rules: positive quantity, subject present exactly when the
    /// kind consumes stock for a resident.
    pub fn validate(&self) -> DomainResult<()> {
        if self.quantity <= 0 {
            return Err(DomainError::constraint(format!(
                "quantity must be positive (got {})",
                self.quantity
            )));
        }

        match (self.kind.requires_subject(), self.subject_id) {
            (true, None) => {
                return Err(DomainError::constraint(format!(
                    "{} requires a subject",
                    self.kind
                )));
            }
            (false, Some(_)) => {
                return Err(DomainError::constraint(format!(
                    "{} must not carry a subject",
                    self.kind
                )));
            }
            _ => {}
        }

        if let Some(remark) = &self.remark {
            if remark.chars().count() > MAX_REMARK_LEN {
                return Err(DomainError::constraint(format!(
                    "remark exceeds {MAX_REMARK_LEN} characters"
                )));
            }
        }

        Ok(())
    }

    /// Signed effect on the on-hand quantity.
    pub fn delta(&self) -> i64 {
        self.kind.signed(self.quantity)
    }

    /// Resolve into the row to append, stamping `now` if no time was given.
    pub fn into_new(self, now: DateTime<Utc>) -> NewMovement {
        NewMovement {
            item_id: self.item_id,
            kind: self.kind,
            quantity: self.quantity,
            actor_id: self.actor_id,
            subject_id: self.subject_id,
            remark: self.remark.filter(|r| !r.trim().is_empty()),
            occurred_at: self.occurred_at.unwrap_or(now),
        }
    }
}

/// Untyped movement as submitted by a form.
///
/// Decoding into a [`MovementRequest`] is where an unknown kind is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementForm {
    pub item_id: i64,
    pub kind: String,
    pub quantity: i64,
    pub actor_id: i64,
    #[serde(default)]
    pub subject_id: Option<i64>,
    #[serde(default)]
    pub remark: Option<String>,
    #[serde(default)]
    pub occurred_at: Option<DateTime<Utc>>,
}

impl TryFrom<MovementForm> for MovementRequest {
    type Error = DomainError;

    fn try_from(form: MovementForm) -> Result<Self, Self::Error> {
        let kind: MovementKind = form.kind.parse()?;
        let request = MovementRequest {
            item_id: ItemId::new(form.item_id)?,
            kind,
            quantity: form.quantity,
            actor_id: ActorId::new(form.actor_id)?,
            subject_id: form.subject_id.map(SubjectId::new).transpose()?,
            remark: form.remark,
            occurred_at: form.occurred_at,
        };
        request.validate()?;
        Ok(request)
    }
}

/// A movement ready to be appended (no identifier yet).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMovement {
    pub item_id: ItemId,
    pub kind: MovementKind,
    pub quantity: i64,
    pub actor_id: ActorId,
    pub subject_id: Option<SubjectId>,
    pub remark: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

impl NewMovement {
    pub fn into_record(self, id: MovementId) -> MovementRecord {
        MovementRecord {
            id,
            item_id: self.item_id,
            kind: self.kind,
            quantity: self.quantity,
            actor_id: self.actor_id,
            subject_id: self.subject_id,
            remark: self.remark,
            occurred_at: self.occurred_at,
        }
    }
}

/// An appended ledger entry. Never updated or deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementRecord {
    pub id: MovementId,
    pub item_id: ItemId,
    pub kind: MovementKind,
    pub quantity: i64,
    pub actor_id: ActorId,
    pub subject_id: Option<SubjectId>,
    pub remark: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

impl MovementRecord {
    pub fn signed_delta(&self) -> i64 {
        self.kind.signed(self.quantity)
    }
}

impl Entity for MovementRecord {
    type Id = MovementId;

    fn id(&self) -> MovementId {
        self.id
    }
}

/// Selection over the movement log.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum MovementFilter {
    All,
    Item(ItemId),
    Kind(MovementKind),
    Subject(SubjectId),
}

impl MovementFilter {
    pub fn matches(&self, movement: &MovementRecord) -> bool {
        match *self {
            MovementFilter::All => true,
            MovementFilter::Item(id) => movement.item_id == id,
            MovementFilter::Kind(kind) => movement.kind == kind,
            MovementFilter::Subject(id) => movement.subject_id == Some(id),
        }
    }
}

/// Order for every history query: newest first, later appends first on ties.
pub fn sort_most_recent_first(movements: &mut [MovementRecord]) {
    movements.sort_by(|a, b| b.occurred_at.cmp(&a.occurred_at).then(b.id.cmp(&a.id)));
}

/// Net quantity per item implied by a movement history.
///
/// Fails if any item's running total leaves the `i64` range.
pub fn net_balances<'a, I>(movements: I) -> DomainResult<BTreeMap<ItemId, i64>>
where
    I: IntoIterator<Item = &'a MovementRecord>,
{
    let mut totals = BTreeMap::new();
    for m in movements {
        let total = totals.entry(m.item_id).or_insert(0i64);
        *total = total.checked_add(m.signed_delta()).ok_or_else(|| {
            DomainError::constraint(format!(
                "movement log of stock item {} overflows the quantity range",
                m.item_id
            ))
        })?;
    }
    Ok(totals)
}
