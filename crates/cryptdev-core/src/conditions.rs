//! Decision layer: one predicate per container operation.
//!
//! Every predicate is a pure function of the declared [`Intent`] and an
//! [`Observed`] snapshot of the system. The snapshot is gathered by
//! [`Observed::probe`], which only issues the queries some predicate will
//! actually consult for the given intent.

use crate::intent::Intent;
use cryptdev_provider::ContainerOps;
use log::debug;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// The six operations, in the order a run evaluates them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Create,
    Open,
    Close,
    AddKey,
    RemoveKey,
    Destroy,
}

impl Operation {
    pub const ALL: [Operation; 6] = [
        Operation::Create,
        Operation::Open,
        Operation::Close,
        Operation::AddKey,
        Operation::RemoveKey,
        Operation::Destroy,
    ];
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Operation::Create => "create",
            Operation::Open => "open",
            Operation::Close => "close",
            Operation::AddKey => "add-key",
            Operation::RemoveKey => "remove-key",
            Operation::Destroy => "destroy",
        };
        f.write_str(label)
    }
}

/// Concrete side effect a predicate asks the run to perform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    Create {
        device: String,
        key: PathBuf,
    },
    /// `name: None` means the mapping name is generated from the device UUID.
    Open {
        device: String,
        key: PathBuf,
        name: Option<String>,
    },
    Close {
        name: String,
    },
    AddKey {
        device: String,
        key: PathBuf,
        new_key: PathBuf,
    },
    RemoveKey {
        device: String,
        key: PathBuf,
    },
    Destroy {
        device: String,
    },
}

impl Action {
    pub fn operation(&self) -> Operation {
        match self {
            Action::Create { .. } => Operation::Create,
            Action::Open { .. } => Operation::Open,
            Action::Close { .. } => Operation::Close,
            Action::AddKey { .. } => Operation::AddKey,
            Action::RemoveKey { .. } => Operation::RemoveKey,
            Action::Destroy { .. } => Operation::Destroy,
        }
    }
}

/// Outcome of a single predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Run(Action),
    Skip,
    /// The request contradicts itself or the observed state.
    Abort(String),
}

impl Decision {
    pub fn is_run(&self) -> bool {
        matches!(self, Decision::Run(_))
    }

    pub fn is_skip(&self) -> bool {
        matches!(self, Decision::Skip)
    }

    pub fn is_abort(&self) -> bool {
        matches!(self, Decision::Abort(_))
    }
}

/// Snapshot of the live container state relevant to one intent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Observed {
    /// Whether the declared device carries a container header.
    pub is_container: bool,
    /// Name of the mapping currently backed by the declared device.
    pub name_by_device: Option<String>,
    /// Backing device of the declared mapping name, when it is open.
    pub device_by_name: Option<String>,
}

impl Observed {
    /// Query the facts the predicates will need for `intent`.
    ///
    /// Queries nobody consults are not issued, so a missing device only errors
    /// when an operation actually depends on inspecting it.
    pub fn probe<O>(ops: &O, intent: &Intent) -> Result<Self, O::Error>
    where
        O: ContainerOps + ?Sized,
    {
        let mut observed = Observed::default();

        if let Some(device) = intent.device() {
            let create_considered = intent.key().is_some() && intent.is_present();
            if create_considered || intent.is_absent() {
                observed.is_container = ops.is_container(device)?;
            }

            let open_considered = intent.key().is_some() && intent.requests_open();
            if intent.is_present() && (open_considered || intent.requests_close()) {
                observed.name_by_device = ops.name_by_device(device)?;
            }
        }

        if let Some(name) = intent.name() {
            if intent.is_present() && intent.requests_close() {
                observed.device_by_name = ops.device_by_name(name)?;
            }
        }

        debug!("observed container state: {observed:?}");
        Ok(observed)
    }
}

/// Predicates bound to one declared intent.
#[derive(Debug, Clone, Copy)]
pub struct Conditions<'a> {
    intent: &'a Intent,
}

impl<'a> Conditions<'a> {
    pub fn new(intent: &'a Intent) -> Self {
        Self { intent }
    }

    /// Dispatch to the predicate for `operation`.
    pub fn evaluate(&self, operation: Operation, observed: &Observed) -> Decision {
        match operation {
            Operation::Create => self.should_create(observed),
            Operation::Open => self.should_open(observed),
            Operation::Close => self.should_close(observed),
            Operation::AddKey => self.should_add_key(),
            Operation::RemoveKey => self.should_remove_key(),
            Operation::Destroy => self.should_destroy(observed),
        }
    }

    pub fn should_create(&self, observed: &Observed) -> Decision {
        let intent = self.intent;
        match (intent.device(), intent.key()) {
            (Some(device), Some(key)) if intent.is_present() && !observed.is_container => {
                Decision::Run(Action::Create {
                    device: device.to_string(),
                    key: key.to_path_buf(),
                })
            }
            _ => Decision::Skip,
        }
    }

    pub fn should_open(&self, observed: &Observed) -> Decision {
        let intent = self.intent;
        let (Some(device), Some(key)) = (intent.device(), intent.key()) else {
            return Decision::Skip;
        };
        if !intent.requests_open() {
            return Decision::Skip;
        }

        if intent.is_absent() {
            return Decision::Abort(
                "container is declared 'absent' and 'open' at the same time".to_string(),
            );
        }

        match observed.name_by_device.as_deref() {
            // An unset declared name never matches, even when the live name
            // was generated by an earlier run.
            Some(current) if Some(current) == intent.name() => Decision::Skip,
            Some(current) => Decision::Abort(format!(
                "container on `{device}` is already open under different name '{current}'"
            )),
            None => Decision::Run(Action::Open {
                device: device.to_string(),
                key: key.to_path_buf(),
                name: intent.name.clone(),
            }),
        }
    }

    pub fn should_close(&self, observed: &Observed) -> Decision {
        let intent = self.intent;
        if intent.device().is_none() && intent.name().is_none() {
            return Decision::Skip;
        }
        if !intent.requests_close() || !intent.is_present() {
            return Decision::Skip;
        }

        let open_by_device = intent
            .device()
            .and(observed.name_by_device.as_deref());
        let open_by_name = intent
            .name()
            .filter(|_| observed.device_by_name.is_some());

        match open_by_device.or(open_by_name) {
            Some(name) => Decision::Run(Action::Close {
                name: name.to_string(),
            }),
            None => Decision::Skip,
        }
    }

    pub fn should_add_key(&self) -> Decision {
        let intent = self.intent;
        let (Some(device), Some(key), Some(new_key)) =
            (intent.device(), intent.key(), intent.new_key())
        else {
            return Decision::Skip;
        };

        if intent.is_absent() {
            return Decision::Abort("asking to add a key to an 'absent' container".to_string());
        }

        Decision::Run(Action::AddKey {
            device: device.to_string(),
            key: key.to_path_buf(),
            new_key: new_key.to_path_buf(),
        })
    }

    pub fn should_remove_key(&self) -> Decision {
        let intent = self.intent;
        let (Some(device), Some(remove_key)) = (intent.device(), intent.remove_key()) else {
            return Decision::Skip;
        };

        if intent.is_absent() {
            return Decision::Abort(
                "asking to remove a key from an 'absent' container".to_string(),
            );
        }

        Decision::Run(Action::RemoveKey {
            device: device.to_string(),
            key: remove_key.to_path_buf(),
        })
    }

    pub fn should_destroy(&self, observed: &Observed) -> Decision {
        match self.intent.device() {
            Some(device) if self.intent.is_absent() && observed.is_container => {
                Decision::Run(Action::Destroy {
                    device: device.to_string(),
                })
            }
            _ => Decision::Skip,
        }
    }
}
