//! One-shot reconciliation of a container towards its declared intent.
//!
//! A run first plans every operation against the initial observed state so
//! that contradictions abort before anything touches the disk. It then walks
//! the operations in order, re-probing the system after each action so later
//! predicates see what earlier actions did.

use crate::conditions::{Action, Conditions, Decision, Observed, Operation};
use crate::error::{CryptdevError, CryptdevResult};
use crate::intent::Intent;
use cryptdev_provider::ContainerOps;
use log::{debug, info, warn};
use serde::Serialize;

/// Result reported to the host after a successful run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunOutcome {
    pub changed: bool,
    /// Name of the mapping the run opened or found open.
    pub name: Option<String>,
}

/// Side-effect free preview of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    pub actions: Vec<Action>,
    pub observed: Observed,
    /// Mapping name already open under the requested name, if any.
    existing_name: Option<String>,
}

impl Plan {
    pub fn changed(&self) -> bool {
        !self.actions.is_empty()
    }

    /// Outcome a real run would report, as far as it is known up front.
    ///
    /// A generated mapping name is only known once the open actually runs.
    pub fn outcome(&self) -> RunOutcome {
        let planned_name = self.actions.iter().find_map(|action| match action {
            Action::Open { name, .. } => name.clone(),
            _ => None,
        });
        RunOutcome {
            changed: self.changed(),
            name: planned_name.or_else(|| self.existing_name.clone()),
        }
    }
}

/// Drives a [`ContainerOps`] backend towards an [`Intent`].
#[derive(Debug, Clone)]
pub struct Reconciler<O> {
    ops: O,
}

impl<O> Reconciler<O>
where
    O: ContainerOps<Error = CryptdevError>,
{
    pub fn new(ops: O) -> Self {
        Self { ops }
    }

    /// Evaluate all predicates against the current state without acting.
    pub fn plan(&self, intent: &Intent) -> CryptdevResult<Plan> {
        let observed = Observed::probe(&self.ops, intent)?;
        let conditions = Conditions::new(intent);
        let mut actions = Vec::new();
        let mut existing_name = None;

        for operation in Operation::ALL {
            match conditions.evaluate(operation, &observed) {
                Decision::Run(action) => actions.push(action),
                Decision::Skip => {
                    if operation == Operation::Open && intent.requests_open() {
                        existing_name = observed.name_by_device.clone();
                    }
                }
                Decision::Abort(reason) => return Err(contradiction(operation, reason)),
            }
        }

        Ok(Plan {
            actions,
            observed,
            existing_name,
        })
    }

    /// Bring the system in line with `intent`.
    ///
    /// Stops at the first contradiction or tool failure; actions that already
    /// completed are not rolled back.
    pub fn apply(&self, intent: &Intent) -> CryptdevResult<RunOutcome> {
        let plan = self.plan(intent)?;
        if !plan.changed() {
            debug!("nothing to do; container already matches the declared state");
            return Ok(plan.outcome());
        }

        let conditions = Conditions::new(intent);
        let mut observed = plan.observed;
        let mut outcome = RunOutcome::default();

        for operation in Operation::ALL {
            match conditions.evaluate(operation, &observed) {
                Decision::Skip => {
                    debug!("{operation}: skipped");
                    if operation == Operation::Open && intent.requests_open() {
                        if let Some(name) = &observed.name_by_device {
                            outcome.name = Some(name.clone());
                        }
                    }
                }
                Decision::Abort(reason) => return Err(contradiction(operation, reason)),
                Decision::Run(action) => {
                    if let Some(name) = self.execute(&action)? {
                        outcome.name = Some(name);
                    }
                    outcome.changed = true;
                    observed = Observed::probe(&self.ops, intent)?;
                }
            }
        }

        Ok(outcome)
    }

    /// Perform one action, returning the mapping name when it opened one.
    fn execute(&self, action: &Action) -> CryptdevResult<Option<String>> {
        match action {
            Action::Create { device, key } => {
                info!("creating container on {device}");
                self.ops.create_container(device, key)?;
            }
            Action::Open { device, key, name } => {
                let name = match name {
                    Some(name) => name.clone(),
                    None => self.ops.generate_name(device)?,
                };
                info!("opening container on {device} as {name}");
                self.ops.open_container(device, key, &name)?;
                return Ok(Some(name));
            }
            Action::Close { name } => {
                info!("closing container {name}");
                self.ops.close_container(name)?;
            }
            Action::AddKey {
                device,
                key,
                new_key,
            } => {
                info!("adding key {} to {device}", new_key.display());
                self.ops.add_key(device, key, new_key)?;
            }
            Action::RemoveKey { device, key } => {
                info!("removing key {} from {device}", key.display());
                self.ops.remove_key(device, key)?;
            }
            Action::Destroy { device } => {
                info!("destroying container on {device}");
                self.ops.destroy_container(device)?;
            }
        }
        Ok(None)
    }
}

fn contradiction(operation: Operation, reason: String) -> CryptdevError {
    warn!("{operation}: refusing contradictory request: {reason}");
    CryptdevError::Contradiction(reason)
}
