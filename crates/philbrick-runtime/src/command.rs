//! Requests understood by the machine service.

use crossbeam_channel::Sender;
use log::warn;
use philbrick::{CircuitDef, ComponentId, EngineStateError, Error, Machine, Params, Result};

/// One-shot reply channel carried by each request
pub type Reply<T> = Sender<Result<T>>;

/// Outcome of a `run` request
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunSummary {
    /// Steps asked for
    pub requested: u64,
    /// Steps actually taken
    pub completed: u64,
    /// True if a cancel or shutdown cut the run short
    pub cancelled: bool,
    /// Clock after the last completed step
    pub time: f64,
}

/// A consistent between-steps view of the machine
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub circuit: CircuitDef,
    pub steps: u64,
    pub time: f64,
}

#[derive(Debug)]
pub enum Command {
    AddComponent {
        kind: String,
        name: String,
        params: Params,
        reply: Reply<ComponentId>,
    },
    Remove {
        name: String,
        reply: Reply<()>,
    },
    Connect {
        source: String,
        dest: String,
        reply: Reply<()>,
    },
    Disconnect {
        source: String,
        dest: String,
        reply: Reply<()>,
    },
    DisconnectAll {
        reply: Reply<()>,
    },
    Instantiate {
        template: String,
        instance: String,
        reply: Reply<()>,
    },
    Step {
        reply: Reply<f64>,
    },
    Run {
        steps: u64,
        reply: Reply<RunSummary>,
    },
    Reset {
        reply: Reply<()>,
    },
    ReadPort {
        port: String,
        reply: Reply<f64>,
    },
    CurrentTime {
        reply: Reply<f64>,
    },
    Snapshot {
        name: String,
        reply: Reply<Snapshot>,
    },
    Cancel,
    Shutdown,
}

impl Command {
    /// Short verb phrase used in logs and rejections
    pub fn describe(&self) -> &'static str {
        match self {
            Command::AddComponent { .. } => "add a component",
            Command::Remove { .. } => "remove a component",
            Command::Connect { .. } => "connect ports",
            Command::Disconnect { .. } => "disconnect ports",
            Command::DisconnectAll { .. } => "disconnect all ports",
            Command::Instantiate { .. } => "instantiate a subcircuit",
            Command::Step { .. } => "step",
            Command::Run { .. } => "start another run",
            Command::Reset { .. } => "reset",
            Command::ReadPort { .. } => "read a port",
            Command::CurrentTime { .. } => "read the clock",
            Command::Snapshot { .. } => "take a snapshot",
            Command::Cancel => "cancel",
            Command::Shutdown => "shut down",
        }
    }

    /// Answer a read request; anything else is handed back
    pub(crate) fn answer_read(self, machine: &Machine) -> Option<Command> {
        match self {
            Command::ReadPort { port, reply } => {
                let _ = reply.send(machine.read_port(&port).map_err(Error::from));
            }
            Command::CurrentTime { reply } => {
                let _ = reply.send(Ok(machine.current_time()));
            }
            Command::Snapshot { name, reply } => {
                let _ = reply.send(Ok(snapshot(machine, &name)));
            }
            other => return Some(other),
        }
        None
    }

    /// Refuse an edit or clock request because a run is executing
    pub(crate) fn reject_during_run(self) {
        let what = self.describe();
        warn!("rejected request to {} during a run", what);
        match self {
            Command::AddComponent { reply, .. } => refuse(reply, what),
            Command::Remove { reply, .. }
            | Command::Connect { reply, .. }
            | Command::Disconnect { reply, .. }
            | Command::DisconnectAll { reply }
            | Command::Instantiate { reply, .. }
            | Command::Reset { reply } => refuse(reply, what),
            Command::Step { reply }
            | Command::ReadPort { reply, .. }
            | Command::CurrentTime { reply } => refuse(reply, what),
            Command::Run { reply, .. } => refuse(reply, what),
            Command::Snapshot { reply, .. } => refuse(reply, what),
            Command::Cancel | Command::Shutdown => {}
        }
    }
}

fn refuse<T>(reply: Reply<T>, what: &'static str) {
    let _ = reply.send(Err(Error::from(EngineStateError::RunInProgress(what))));
}

pub(crate) fn snapshot(machine: &Machine, name: &str) -> Snapshot {
    Snapshot {
        circuit: machine.to_circuit(name),
        steps: machine.steps(),
        time: machine.current_time(),
    }
}
