//! Scripted devices and backends for unit tests.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{broadcast, Notify};

use fleetlink_core::{event::Signal, types::Id};

use crate::device::{Device, DeviceCapability, DeviceError, Result};
use crate::discovery::{DiscoveryBackend, DiscoveryEvent};
use crate::message::{CommandKind, DeviceAction, DeviceCommand, ResponseMessage};

/// Give spawned listener tasks a chance to run.
pub(crate) async fn settle() {
    tokio::time::sleep(Duration::from_millis(20)).await;
}

#[derive(Debug)]
pub(crate) struct MockDevice {
    identifier: Id,
    name: String,
    allowed: BTreeSet<CommandKind>,
    capabilities: Vec<DeviceCapability>,
    removed: Signal<()>,
    commands: Mutex<Vec<DeviceCommand>>,
    disconnects: AtomicUsize,
    fail_commands: bool,
    remove_on_disconnect: bool,
}

impl MockDevice {
    pub(crate) fn new(identity: &str) -> Self {
        Self {
            identifier: Id::from(identity),
            name: format!("Mock {}", identity),
            allowed: [CommandKind::Stop, CommandKind::Scalar].into_iter().collect(),
            capabilities: vec![
                DeviceCapability::new(CommandKind::Scalar, 1).with_step_count(20),
            ],
            removed: Signal::new(),
            commands: Mutex::new(Vec::new()),
            disconnects: AtomicUsize::new(0),
            fail_commands: false,
            remove_on_disconnect: false,
        }
    }

    pub(crate) fn with_allowed(mut self, kinds: impl IntoIterator<Item = CommandKind>) -> Self {
        self.allowed = kinds.into_iter().collect();
        self
    }

    pub(crate) fn with_failing_commands(mut self) -> Self {
        self.fail_commands = true;
        self
    }

    /// Emit the removal signal when disconnected, like a real link teardown.
    pub(crate) fn removed_on_disconnect(mut self) -> Self {
        self.remove_on_disconnect = true;
        self
    }

    pub(crate) fn into_arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub(crate) fn commands(&self) -> Vec<DeviceCommand> {
        self.commands.lock().unwrap().clone()
    }

    pub(crate) fn disconnect_count(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }

    pub(crate) fn signal_removed(&self) {
        self.removed.emit(());
    }
}

#[async_trait]
impl Device for MockDevice {
    fn identifier(&self) -> &Id {
        &self.identifier
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn allowed_messages(&self) -> &BTreeSet<CommandKind> {
        &self.allowed
    }

    fn capabilities(&self) -> &[DeviceCapability] {
        &self.capabilities
    }

    async fn handle_command(&self, command: DeviceCommand) -> Result<ResponseMessage> {
        self.commands.lock().unwrap().push(command.clone());
        if self.fail_commands {
            return Err(DeviceError::CommunicationError("link lost".to_string()));
        }

        let device_index = command.device_index.unwrap_or_default();
        Ok(match command.action {
            DeviceAction::SensorRead { sensor } => ResponseMessage::SensorReading {
                id: command.id,
                device_index,
                sensor,
                data: vec![42],
            },
            DeviceAction::RawRead { endpoint, .. } => ResponseMessage::RawReading {
                id: command.id,
                device_index,
                endpoint,
                data: vec![0xde, 0xad],
            },
            _ => ResponseMessage::ok(command.id),
        })
    }

    async fn disconnect(&self) -> Result<()> {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        if self.remove_on_disconnect {
            self.removed.emit(());
        }
        Ok(())
    }

    fn removal_signal(&self) -> broadcast::Receiver<()> {
        self.removed.subscribe()
    }
}

#[derive(Debug)]
pub(crate) struct MockBackend {
    name: String,
    discovering: AtomicBool,
    fail_start: bool,
    fail_stop: bool,
    finish_on_start: bool,
    start_gate: Option<Arc<Notify>>,
    starts: AtomicUsize,
    stops: AtomicUsize,
    events: Signal<DiscoveryEvent>,
    journal: Option<Arc<Mutex<Vec<String>>>>,
}

impl MockBackend {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            discovering: AtomicBool::new(false),
            fail_start: false,
            fail_stop: false,
            finish_on_start: false,
            start_gate: None,
            starts: AtomicUsize::new(0),
            stops: AtomicUsize::new(0),
            events: Signal::new(),
            journal: None,
        }
    }

    pub(crate) fn failing_start(mut self) -> Self {
        self.fail_start = true;
        self
    }

    pub(crate) fn failing_stop(mut self) -> Self {
        self.fail_stop = true;
        self
    }

    /// Find nothing and report finished before the start call returns.
    pub(crate) fn finishing_on_start(mut self) -> Self {
        self.finish_on_start = true;
        self
    }

    /// Hold every start call until the gate is notified.
    pub(crate) fn with_start_gate(mut self, gate: Arc<Notify>) -> Self {
        self.start_gate = Some(gate);
        self
    }

    /// Record start entry and completion into a journal shared between backends.
    pub(crate) fn with_journal(mut self, journal: Arc<Mutex<Vec<String>>>) -> Self {
        self.journal = Some(journal);
        self
    }

    pub(crate) fn into_arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub(crate) fn start_count(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub(crate) fn stop_count(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    pub(crate) fn set_discovering(&self, discovering: bool) {
        self.discovering.store(discovering, Ordering::SeqCst);
    }

    pub(crate) fn discover(&self, device: Arc<dyn Device>) {
        self.events.emit(DiscoveryEvent::DeviceDiscovered(device));
    }

    /// Go idle on its own and report it.
    pub(crate) fn finish(&self) {
        self.set_discovering(false);
        self.events.emit(DiscoveryEvent::DiscoveryFinished);
    }

    fn record(&self, entry: String) {
        if let Some(journal) = &self.journal {
            journal.lock().unwrap().push(entry);
        }
    }
}

#[async_trait]
impl DiscoveryBackend for MockBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn start_discovery(&self) -> Result<()> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        self.record(format!("start:{}", self.name));
        tokio::task::yield_now().await;
        if let Some(gate) = &self.start_gate {
            gate.notified().await;
        }

        if self.fail_start {
            return Err(DeviceError::CommunicationError("radio busy".to_string()));
        }

        self.record(format!("started:{}", self.name));
        if self.finish_on_start {
            self.finish();
        } else {
            self.set_discovering(true);
        }
        Ok(())
    }

    async fn stop_discovery(&self) -> Result<()> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        if self.fail_stop {
            return Err(DeviceError::InvalidState("adapter wedged".to_string()));
        }

        self.finish();
        Ok(())
    }

    fn is_discovering(&self) -> bool {
        self.discovering.load(Ordering::SeqCst)
    }

    fn events(&self) -> broadcast::Receiver<DiscoveryEvent> {
        self.events.subscribe()
    }
}
