//! A machine running on its own thread behind a command queue.

use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender};
use log::{debug, info, warn};
use philbrick::{ComponentId, EngineStateError, Error, Machine, Params, Result};

use crate::command::{Command, Reply, RunSummary, Snapshot};

/// Owns the service thread. Dropping it without calling
/// [`shutdown`](Self::shutdown) stops the thread once every handle is gone.
#[derive(Debug)]
pub struct MachineService {
    handle: MachineHandle,
    thread: Option<JoinHandle<Machine>>,
}

impl MachineService {
    /// Move `machine` onto a new thread and start serving requests
    pub fn spawn(machine: Machine) -> std::io::Result<Self> {
        let (sender, receiver) = crossbeam_channel::unbounded();
        let thread = std::thread::Builder::new()
            .name("philbrick-machine".to_string())
            .spawn(move || serve(machine, receiver))?;
        info!("machine service started");
        Ok(Self {
            handle: MachineHandle { sender },
            thread: Some(thread),
        })
    }

    /// A new handle onto this service
    pub fn handle(&self) -> MachineHandle {
        self.handle.clone()
    }

    /// Stop the service and take the machine back.
    ///
    /// A run in progress stops after its current step.
    pub fn shutdown(mut self) -> Result<Machine> {
        let _ = self.handle.sender.send(Command::Shutdown);
        let thread = self.thread.take().ok_or(EngineStateError::ServiceStopped)?;
        thread
            .join()
            .map_err(|_| Error::from(EngineStateError::ServiceStopped))
    }
}

impl std::ops::Deref for MachineService {
    type Target = MachineHandle;

    fn deref(&self) -> &MachineHandle {
        &self.handle
    }
}

/// Cloneable client side of a [`MachineService`]
#[derive(Debug, Clone)]
pub struct MachineHandle {
    sender: Sender<Command>,
}

impl MachineHandle {
    fn request<T>(&self, make: impl FnOnce(Reply<T>) -> Command) -> Result<T> {
        let (reply, response) = crossbeam_channel::bounded(1);
        self.sender
            .send(make(reply))
            .map_err(|_| EngineStateError::ServiceStopped)?;
        response
            .recv()
            .map_err(|_| EngineStateError::ServiceStopped)?
    }

    fn notify(&self, command: Command) -> Result<()> {
        self.sender
            .send(command)
            .map_err(|_| EngineStateError::ServiceStopped.into())
    }

    pub fn add_component(&self, kind: &str, name: &str, params: Params) -> Result<ComponentId> {
        self.request(|reply| Command::AddComponent {
            kind: kind.to_string(),
            name: name.to_string(),
            params,
            reply,
        })
    }

    pub fn remove(&self, name: &str) -> Result<()> {
        self.request(|reply| Command::Remove {
            name: name.to_string(),
            reply,
        })
    }

    pub fn connect(&self, source: &str, dest: &str) -> Result<()> {
        self.request(|reply| Command::Connect {
            source: source.to_string(),
            dest: dest.to_string(),
            reply,
        })
    }

    pub fn disconnect(&self, source: &str, dest: &str) -> Result<()> {
        self.request(|reply| Command::Disconnect {
            source: source.to_string(),
            dest: dest.to_string(),
            reply,
        })
    }

    pub fn disconnect_all(&self) -> Result<()> {
        self.request(|reply| Command::DisconnectAll { reply })
    }

    pub fn instantiate(&self, template: &str, instance: &str) -> Result<()> {
        self.request(|reply| Command::Instantiate {
            template: template.to_string(),
            instance: instance.to_string(),
            reply,
        })
    }

    /// Advance one step; returns the new clock value
    pub fn step(&self) -> Result<f64> {
        self.request(|reply| Command::Step { reply })
    }

    /// Advance `steps` steps. Blocks until the run finishes or is cancelled.
    pub fn run(&self, steps: u64) -> Result<RunSummary> {
        self.request(|reply| Command::Run { steps, reply })
    }

    pub fn reset(&self) -> Result<()> {
        self.request(|reply| Command::Reset { reply })
    }

    pub fn read_port(&self, port: &str) -> Result<f64> {
        self.request(|reply| Command::ReadPort {
            port: port.to_string(),
            reply,
        })
    }

    pub fn current_time(&self) -> Result<f64> {
        self.request(|reply| Command::CurrentTime { reply })
    }

    /// Export the circuit and clock between steps
    pub fn snapshot(&self, name: &str) -> Result<Snapshot> {
        self.request(|reply| Command::Snapshot {
            name: name.to_string(),
            reply,
        })
    }

    /// Stop the current run, if any, after its current step
    pub fn cancel(&self) -> Result<()> {
        self.notify(Command::Cancel)
    }

    /// Ask the service thread to exit without waiting for it
    pub fn request_shutdown(&self) -> Result<()> {
        self.notify(Command::Shutdown)
    }
}

/// Service loop: one request at a time, in arrival order
fn serve(mut machine: Machine, receiver: Receiver<Command>) -> Machine {
    while let Ok(command) = receiver.recv() {
        let Some(command) = command.answer_read(&machine) else {
            continue;
        };
        match command {
            Command::AddComponent {
                kind,
                name,
                params,
                reply,
            } => {
                let result = machine.add_component(&kind, &name, &params);
                let _ = reply.send(result.map_err(Error::from));
            }
            Command::Remove { name, reply } => {
                let _ = reply.send(machine.remove(&name).map_err(Error::from));
            }
            Command::Connect {
                source,
                dest,
                reply,
            } => {
                let _ = reply.send(machine.connect(&source, &dest).map_err(Error::from));
            }
            Command::Disconnect {
                source,
                dest,
                reply,
            } => {
                let _ = reply.send(machine.disconnect(&source, &dest).map_err(Error::from));
            }
            Command::DisconnectAll { reply } => {
                machine.disconnect_all();
                let _ = reply.send(Ok(()));
            }
            Command::Instantiate {
                template,
                instance,
                reply,
            } => {
                let _ = reply.send(machine.instantiate(&template, &instance));
            }
            Command::Step { reply } => {
                machine.step();
                let _ = reply.send(Ok(machine.current_time()));
            }
            Command::Run { steps, reply } => {
                let (summary, shutdown) = run(&mut machine, steps, &receiver);
                let _ = reply.send(Ok(summary));
                if shutdown {
                    break;
                }
            }
            Command::Reset { reply } => {
                machine.reset();
                let _ = reply.send(Ok(()));
            }
            // answered above
            Command::ReadPort { .. } | Command::CurrentTime { .. } | Command::Snapshot { .. } => {}
            Command::Cancel => debug!("cancel with no run in progress"),
            Command::Shutdown => break,
        }
    }
    info!("machine service stopped at t = {}", machine.current_time());
    machine
}

/// Execute a run, serving the queue between steps.
///
/// Returns the summary and whether a shutdown arrived meanwhile.
fn run(machine: &mut Machine, steps: u64, receiver: &Receiver<Command>) -> (RunSummary, bool) {
    let mut cancelled = false;
    let mut shutdown = false;
    let completed = machine.run_while(steps, |m| {
        while let Ok(command) = receiver.try_recv() {
            match command {
                Command::Cancel => cancelled = true,
                Command::Shutdown => shutdown = true,
                other => {
                    if let Some(edit) = other.answer_read(m) {
                        edit.reject_during_run();
                    }
                    continue;
                }
            }
            // leave whatever follows queued for after the run
            break;
        }
        !(cancelled || shutdown)
    });

    let cancelled = cancelled || shutdown;
    if cancelled {
        warn!("run cancelled after {} of {} steps", completed, steps);
    } else {
        debug!("run of {} steps finished", steps);
    }
    let summary = RunSummary {
        requested: steps,
        completed,
        cancelled,
        time: machine.current_time(),
    };
    (summary, shutdown)
}
