//! Per-domain workflow definitions
//!
//! One table-driven state machine serves both domains. A definition lists the
//! legal transitions, the preconditions checked before entering a status and
//! the side-effects applied when entering it. Definitions are rebuilt from the
//! settings on every call, so toggles and custom statuses apply immediately.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::db::models::WorkflowEntity;
use crate::error::{Result, WorkflowError};
use crate::workflow::payload::{non_blank, TransitionPayload};
use crate::workflow::settings::WorkflowSettings;
use crate::workflow::status::{BuiltinStatus, EntityKind, Status};

/// Requirement checked before entering a status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Precondition {
    /// Numeric delivered quantity >= 0 (defective quantity, if given, too)
    DeliveredQuantity,
    /// Non-empty package and ticket numbers
    WarehouseReceipt,
    /// Non-empty notes explaining the request
    Reason,
    /// A machine or other resource must already be assigned
    AssignedResource,
}

impl Precondition {
    pub fn check(&self, entity: &WorkflowEntity, payload: &TransitionPayload) -> Result<()> {
        match self {
            Precondition::DeliveredQuantity => {
                match payload.delivered_quantity {
                    Some(q) if q.is_finite() && q >= 0.0 => {}
                    _ => {
                        return Err(WorkflowError::validation(
                            "a delivered quantity of zero or more is required",
                        ))
                    }
                }
                if let Some(defective) = payload.defective_quantity {
                    if !defective.is_finite() || defective < 0.0 {
                        return Err(WorkflowError::validation(
                            "defective quantity must be zero or more",
                        ));
                    }
                }
                Ok(())
            }
            Precondition::WarehouseReceipt => {
                if non_blank(payload.package_number.as_deref()).is_none() {
                    return Err(WorkflowError::validation("package number is required"));
                }
                if non_blank(payload.ticket_number.as_deref()).is_none() {
                    return Err(WorkflowError::validation("ticket number is required"));
                }
                Ok(())
            }
            Precondition::Reason => match payload.notes() {
                Some(_) => Ok(()),
                None => Err(WorkflowError::validation(
                    "notes explaining the cancellation request are required",
                )),
            },
            Precondition::AssignedResource => {
                match non_blank(entity.assigned_resource.as_deref()) {
                    Some(_) => Ok(()),
                    None => Err(WorkflowError::validation(
                        "assign a machine before starting production",
                    )),
                }
            }
        }
    }
}

/// Field update applied when entering a status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Effect {
    /// `approved_by = actor`, only the first time
    RecordApprover,
    /// Copy delivered/defective quantities from the payload
    RecordDelivery,
    /// `received_date = now` unless already set
    RecordReceivedDate,
    /// Receiver plus package and ticket numbers
    RecordWarehouseReceipt,
}

impl Effect {
    pub fn apply(
        &self,
        entity: &mut WorkflowEntity,
        payload: &TransitionPayload,
        actor: &str,
        now: &str,
    ) {
        match self {
            Effect::RecordApprover => {
                if entity.approved_by.is_none() {
                    entity.approved_by = Some(actor.to_string());
                }
            }
            Effect::RecordDelivery => {
                entity.delivered_quantity = payload.delivered_quantity;
                if payload.defective_quantity.is_some() {
                    entity.defective_quantity = payload.defective_quantity;
                }
            }
            Effect::RecordReceivedDate => {
                if entity.received_date.is_none() {
                    entity.received_date = Some(now.to_string());
                }
            }
            Effect::RecordWarehouseReceipt => {
                entity.received_in_warehouse_by = Some(actor.to_string());
                entity.package_number =
                    non_blank(payload.package_number.as_deref()).map(str::to_string);
                entity.ticket_number =
                    non_blank(payload.ticket_number.as_deref()).map(str::to_string);
            }
        }
    }
}

/// State machine of one entity kind
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowDefinition {
    pub kind: EntityKind,
    pub initial: Status,
    states: BTreeSet<Status>,
    transitions: BTreeMap<Status, BTreeSet<Status>>,
    preconditions: BTreeMap<Status, Vec<Precondition>>,
    effects: BTreeMap<Status, Vec<Effect>>,
}

impl WorkflowDefinition {
    fn empty(kind: EntityKind) -> Self {
        let mut states = BTreeSet::new();
        states.insert(Status::PENDING);
        Self {
            kind,
            initial: Status::PENDING,
            states,
            transitions: BTreeMap::new(),
            preconditions: BTreeMap::new(),
            effects: BTreeMap::new(),
        }
    }

    /// Build the definition of a kind from its current settings
    pub fn for_kind(kind: EntityKind, settings: &WorkflowSettings) -> Self {
        match kind {
            EntityKind::PurchaseRequest => Self::purchase_request(settings),
            EntityKind::ProductionOrder => Self::production_order(settings),
        }
    }

    fn purchase_request(settings: &WorkflowSettings) -> Self {
        use BuiltinStatus::*;

        let mut def = Self::empty(EntityKind::PurchaseRequest);
        def.edges(Pending, &[Approved, Canceled, CancellationRequest]);
        def.edges(Approved, &[Ordered, Canceled, CancellationRequest]);
        def.edges(Ordered, &[Received, Canceled, CancellationRequest]);
        def.edges(CancellationRequest, &[Canceled]);
        if settings.warehouse_step_enabled {
            def.edges(Received, &[ReceivedInWarehouse]);
        }

        def.require(Received, Precondition::DeliveredQuantity);
        def.require(ReceivedInWarehouse, Precondition::WarehouseReceipt);
        def.require(CancellationRequest, Precondition::Reason);

        def.effect(Approved, Effect::RecordApprover);
        def.effect(Received, Effect::RecordDelivery);
        def.effect(Received, Effect::RecordReceivedDate);
        def.effect(ReceivedInWarehouse, Effect::RecordWarehouseReceipt);
        def.effect(ReceivedInWarehouse, Effect::RecordReceivedDate);
        def
    }

    fn production_order(settings: &WorkflowSettings) -> Self {
        use BuiltinStatus::*;

        let mut def = Self::empty(EntityKind::ProductionOrder);
        def.edges(Pending, &[Approved, Canceled, CancellationRequest]);
        def.edges(Approved, &[InProgress, OnHold, Canceled, CancellationRequest]);
        def.edges(InProgress, &[OnHold, Completed, Canceled, CancellationRequest]);
        def.edges(OnHold, &[InProgress, Canceled, CancellationRequest]);
        def.edges(CancellationRequest, &[Canceled]);
        if settings.warehouse_step_enabled {
            def.edges(Completed, &[ReceivedInWarehouse]);
        }

        let customs: Vec<Status> = settings.custom_statuses.iter().map(|c| c.status()).collect();
        for custom in &customs {
            def.states.insert(custom.clone());
            for from in [Approved, InProgress, OnHold] {
                def.edge(Status::Builtin(from), custom.clone());
            }
            for to in [InProgress, OnHold, Completed, Canceled, CancellationRequest] {
                def.edge(custom.clone(), Status::Builtin(to));
            }
            for other in customs.iter().filter(|other| *other != custom) {
                def.edge(custom.clone(), other.clone());
            }
        }

        def.require(Completed, Precondition::DeliveredQuantity);
        def.require(ReceivedInWarehouse, Precondition::WarehouseReceipt);
        def.require(CancellationRequest, Precondition::Reason);
        if settings.require_assignment_before_start {
            def.require(InProgress, Precondition::AssignedResource);
        }

        def.effect(Approved, Effect::RecordApprover);
        def.effect(Completed, Effect::RecordDelivery);
        def.effect(ReceivedInWarehouse, Effect::RecordWarehouseReceipt);
        def.effect(ReceivedInWarehouse, Effect::RecordReceivedDate);
        def
    }

    fn edge(&mut self, from: Status, to: Status) {
        self.states.insert(from.clone());
        self.states.insert(to.clone());
        self.transitions.entry(from).or_default().insert(to);
    }

    fn edges(&mut self, from: BuiltinStatus, targets: &[BuiltinStatus]) {
        for to in targets {
            self.edge(Status::Builtin(from), Status::Builtin(*to));
        }
    }

    fn require(&mut self, status: BuiltinStatus, precondition: Precondition) {
        self.preconditions
            .entry(Status::Builtin(status))
            .or_default()
            .push(precondition);
    }

    fn effect(&mut self, status: BuiltinStatus, effect: Effect) {
        self.effects
            .entry(Status::Builtin(status))
            .or_default()
            .push(effect);
    }

    /// Every status of this kind's enumeration
    pub fn states(&self) -> impl Iterator<Item = &Status> {
        self.states.iter()
    }

    pub fn is_known(&self, status: &Status) -> bool {
        self.states.contains(status)
    }

    /// Legal targets from a status
    pub fn targets_from(&self, from: &Status) -> Vec<Status> {
        self.transitions
            .get(from)
            .map(|targets| targets.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn allows(&self, from: &Status, to: &Status) -> bool {
        self.transitions
            .get(from)
            .map_or(false, |targets| targets.contains(to))
    }

    pub fn preconditions_for(&self, status: &Status) -> &[Precondition] {
        self.preconditions
            .get(status)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn effects_for(&self, status: &Status) -> &[Effect] {
        self.effects.get(status).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Validate a transition and compute the entity state after it
    ///
    /// Pure: nothing is written. Fails with `InvalidTransition` for illegal
    /// targets and `Validation` for unmet preconditions.
    pub fn apply(
        &self,
        entity: &WorkflowEntity,
        target: &Status,
        payload: &TransitionPayload,
        actor: &str,
        now: &str,
    ) -> Result<WorkflowEntity> {
        let current = entity.current_status()?;
        if !self.is_known(target) || !self.allows(&current, target) {
            return Err(WorkflowError::invalid_transition(&current, target));
        }

        for precondition in self.preconditions_for(target) {
            precondition.check(entity, payload)?;
        }

        let mut next = entity.clone();
        next.status = target.to_string();
        next.previous_status = if target.is_cancellation() {
            if current.is_cancellation() {
                entity.previous_status.clone()
            } else {
                Some(current.to_string())
            }
        } else {
            None
        };
        next.last_status_update_by = Some(actor.to_string());
        next.last_status_update_notes = payload.notes().map(str::to_string);

        for effect in self.effects_for(target) {
            effect.apply(&mut next, payload, actor, now);
        }

        next.updated_at = now.to_string();
        Ok(next)
    }

    /// Send a terminal entity back to the initial status
    pub fn reopen(
        &self,
        entity: &WorkflowEntity,
        actor: &str,
        notes: Option<&str>,
        now: &str,
    ) -> Result<WorkflowEntity> {
        let current = entity.current_status()?;
        if !current.is_terminal() {
            return Err(WorkflowError::invalid_transition(&current, &self.initial));
        }

        let mut next = entity.clone();
        next.status = self.initial.to_string();
        next.reopened = true;
        next.previous_status = None;
        next.last_status_update_by = Some(actor.to_string());
        next.last_status_update_notes = non_blank(notes).map(str::to_string);
        next.updated_at = now.to_string();
        Ok(next)
    }

    /// Restore the status held before a cancellation request
    pub fn reject_cancellation(
        &self,
        entity: &WorkflowEntity,
        actor: &str,
        notes: Option<&str>,
        now: &str,
    ) -> Result<WorkflowEntity> {
        let current = entity.current_status()?;
        if current != Status::CANCELLATION_REQUEST {
            return Err(WorkflowError::invalid_transition(
                &current,
                "previous status (cancellation rejected)",
            ));
        }

        let restored = entity.previous()?.ok_or_else(|| {
            WorkflowError::InvalidState(format!(
                "{} has no status to restore after a rejected cancellation",
                entity.consecutive
            ))
        })?;

        let mut next = entity.clone();
        next.status = restored.to_string();
        next.previous_status = None;
        next.last_status_update_by = Some(actor.to_string());
        next.last_status_update_notes = non_blank(notes).map(str::to_string);
        next.updated_at = now.to_string();
        Ok(next)
    }
}
