//! # Capacity Tracker
//!
//! Seat counters on batches and internship positions.
//!
//! The `registered` counter on a target is a cached projection of its
//! Approved registrations. [`reserve`] and [`release`] move it by one inside
//! the caller's write transaction, and [`reconcile`] rebuilds it by recount.
//!
//! Concurrent reservations cannot over-book: the check and the increment
//! share one redb write transaction, and redb runs write transactions one
//! at a time.

use crate::storage::{Reader, StoreTxn};
use crate::{Batch, CertisError, Program, ProgramKind, Registration, RegistrationStatus, Target};
use serde::Serialize;

/// Seat numbers for one target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CapacityView {
    pub target: Target,
    pub quota: u32,
    pub registered: u32,
    pub remaining: u32,
}

/// Result of a recount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Reconciliation {
    pub target: Target,
    pub before: u32,
    pub after: u32,
}

impl Reconciliation {
    #[must_use]
    pub fn drifted(&self) -> bool {
        self.before != self.after
    }
}

/// The record holding a target's counter.
enum Seats {
    Batch(Batch),
    Position(Program),
}

impl Seats {
    fn load(r: &impl Reader, target: Target) -> Result<Self, CertisError> {
        match target {
            Target::Batch(id) => Ok(Seats::Batch(r.require(id.0)?)),
            Target::Position(id) => {
                let program: Program = r.require(id.0)?;
                if program.kind != ProgramKind::Internship {
                    return Err(CertisError::validation(
                        "target",
                        format!(
                            "program {} is a certification; its seats are held by batches",
                            id
                        ),
                    ));
                }
                Ok(Seats::Position(program))
            }
        }
    }

    fn quota(&self) -> u32 {
        match self {
            Seats::Batch(b) => b.quota,
            Seats::Position(p) => p.quota,
        }
    }

    fn registered(&self) -> u32 {
        match self {
            Seats::Batch(b) => b.registered,
            Seats::Position(p) => p.registered,
        }
    }

    fn set_registered(&mut self, registered: u32) {
        match self {
            Seats::Batch(b) => b.registered = registered,
            Seats::Position(p) => p.registered = registered,
        }
    }

    fn store(&self, tx: &StoreTxn) -> Result<(), CertisError> {
        match self {
            Seats::Batch(b) => tx.put(b),
            Seats::Position(p) => tx.put(p),
        }
    }

    fn view(&self, target: Target) -> CapacityView {
        CapacityView {
            target,
            quota: self.quota(),
            registered: self.registered(),
            remaining: self.quota().saturating_sub(self.registered()),
        }
    }
}

/// Take one seat on `target`, or fail with `CapacityExceeded`.
pub fn reserve(tx: &StoreTxn, target: Target) -> Result<CapacityView, CertisError> {
    let mut seats = Seats::load(tx, target)?;
    if seats.registered() >= seats.quota() {
        return Err(CertisError::CapacityExceeded {
            target,
            quota: seats.quota(),
            registered: seats.registered(),
        });
    }
    seats.set_registered(seats.registered() + 1);
    seats.store(tx)?;
    Ok(seats.view(target))
}

/// Give one seat back. The counter never goes below zero.
pub fn release(tx: &StoreTxn, target: Target) -> Result<CapacityView, CertisError> {
    let mut seats = Seats::load(tx, target)?;
    seats.set_registered(seats.registered().saturating_sub(1));
    seats.store(tx)?;
    Ok(seats.view(target))
}

pub fn get_capacity(r: &impl Reader, target: Target) -> Result<CapacityView, CertisError> {
    Ok(Seats::load(r, target)?.view(target))
}

/// Approved registrations currently on `target`.
pub fn count_approved(r: &impl Reader, target: Target) -> Result<u32, CertisError> {
    let mut approved: u32 = 0;
    for id in r.registrations_on(target)? {
        let registration: Registration = r.require(id.0)?;
        if registration.status == RegistrationStatus::Approved {
            approved = approved.saturating_add(1);
        }
    }
    Ok(approved)
}

/// Rewrite the counter on `target` from a recount.
pub fn reconcile(tx: &StoreTxn, target: Target) -> Result<Reconciliation, CertisError> {
    let mut seats = Seats::load(tx, target)?;
    let before = seats.registered();
    let after = count_approved(tx, target)?;
    if before != after {
        seats.set_registered(after);
        seats.store(tx)?;
    }
    Ok(Reconciliation {
        target,
        before,
        after,
    })
}

/// Reconcile every batch and internship position.
pub fn reconcile_all(tx: &StoreTxn) -> Result<Vec<Reconciliation>, CertisError> {
    let mut targets: Vec<Target> = tx
        .scan::<Batch>()?
        .into_iter()
        .map(|b| Target::Batch(b.id))
        .collect();
    targets.extend(
        tx.scan::<Program>()?
            .into_iter()
            .filter(|p| p.kind == ProgramKind::Internship)
            .map(|p| Target::Position(p.id)),
    );

    targets
        .into_iter()
        .map(|target| reconcile(tx, target))
        .collect()
}

// =============================================================================
// TESTS
// =============================================================================
