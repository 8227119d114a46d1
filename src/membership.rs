//! Purpose: Translate cluster membership events into handler callbacks.
//! Exports: `Handler`, `Member`, `MemberEvent`, `Membership`, `RPC_ADDR_TAG`.
//! Role: Discovery adaptor between a gossip event stream and the serving
//! layer; carries no knowledge of the log.
//! Invariants: Events about the local node are filtered out before dispatch.
//! Invariants: Handler failures are logged and never stop the event loop.

use std::collections::HashMap;
use std::sync::mpsc::Receiver;
use std::thread::{self, JoinHandle};

use tracing::error;

use crate::core::error::Error;

/// Member tag holding the address the serving layer should dial.
pub const RPC_ADDR_TAG: &str = "rpc_addr";

/// Callbacks invoked as peers enter and leave the cluster.
pub trait Handler: Send + 'static {
    fn join(&self, id: &str, addr: &str) -> Result<(), Error>;

    fn leave(&self, id: &str) -> Result<(), Error>;
}

#[derive(Clone, Debug, Default)]
pub struct Member {
    pub name: String,
    pub tags: HashMap<String, String>,
}

impl Member {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tags: HashMap::new(),
        }
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn rpc_addr(&self) -> Option<&str> {
        self.tags.get(RPC_ADDR_TAG).map(String::as_str)
    }
}

#[derive(Clone, Debug)]
pub enum MemberEvent {
    Join(Vec<Member>),
    /// A graceful departure.
    Leave(Vec<Member>),
    /// A peer declared dead by the failure detector; handled like a leave.
    Failed(Vec<Member>),
}

/// Drains a membership event stream on a dedicated thread, invoking the
/// handler for every remote peer. The loop ends when the sender side of the
/// stream is dropped; `shutdown` (or drop) then joins the thread.
pub struct Membership {
    local_name: String,
    worker: Option<JoinHandle<()>>,
}

impl Membership {
    pub fn start(
        local_name: impl Into<String>,
        handler: impl Handler,
        events: Receiver<MemberEvent>,
    ) -> Self {
        let local_name = local_name.into();
        let worker_name = local_name.clone();
        let worker = thread::spawn(move || event_loop(&worker_name, &handler, events));
        Self {
            local_name,
            worker: Some(worker),
        }
    }

    pub fn local_name(&self) -> &str {
        &self.local_name
    }

    /// Blocks until the event stream has been closed and the worker exits.
    pub fn shutdown(mut self) {
        self.join_worker();
    }

    fn join_worker(&mut self) {
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

impl Drop for Membership {
    fn drop(&mut self) {
        self.join_worker();
    }
}

fn event_loop(local_name: &str, handler: &impl Handler, events: Receiver<MemberEvent>) {
    for event in events {
        match event {
            MemberEvent::Join(members) => {
                for member in remote_members(local_name, members) {
                    let addr = member.rpc_addr().unwrap_or_default();
                    if let Err(err) = handler.join(&member.name, addr) {
                        error!(
                            name = %member.name,
                            rpc_addr = addr,
                            error = %err,
                            "membership join handler failed"
                        );
                    }
                }
            }
            MemberEvent::Leave(members) | MemberEvent::Failed(members) => {
                for member in remote_members(local_name, members) {
                    if let Err(err) = handler.leave(&member.name) {
                        error!(
                            name = %member.name,
                            error = %err,
                            "membership leave handler failed"
                        );
                    }
                }
            }
        }
    }
}

fn remote_members(local_name: &str, members: Vec<Member>) -> impl Iterator<Item = Member> + '_ {
    members
        .into_iter()
        .filter(move |member| member.name != local_name)
}
