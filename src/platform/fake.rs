//! In-memory process table for pipeline tests.

use std::collections::HashMap;

use super::{ProcessSource, SocketOwner};
use crate::error::WitrError;
use crate::types::{FileContext, ProcessRecord, ResourceContext, SocketInfo};

#[derive(Default)]
pub struct FakeSource {
    records: Vec<ProcessRecord>,
    ports: HashMap<u16, SocketOwner>,
    env: HashMap<u32, Vec<String>>,
    socket_info: Option<SocketInfo>,
    resources: Option<ResourceContext>,
    files: Option<FileContext>,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, record: ProcessRecord) -> Self {
        self.records.push(record);
        self
    }

    /// Add a plain record with the given identity.
    pub fn process(self, pid: u32, ppid: u32, command: &str) -> Self {
        self.with(ProcessRecord::new(pid, ppid, command))
    }

    pub fn with_port(mut self, port: u16, owner: SocketOwner) -> Self {
        self.ports.insert(port, owner);
        self
    }

    pub fn with_env(mut self, pid: u32, env: &[&str]) -> Self {
        self.env
            .insert(pid, env.iter().map(|s| s.to_string()).collect());
        self
    }

    pub fn with_contexts(
        mut self,
        socket_info: Option<SocketInfo>,
        resources: Option<ResourceContext>,
        files: Option<FileContext>,
    ) -> Self {
        self.socket_info = socket_info;
        self.resources = resources;
        self.files = files;
        self
    }
}

impl ProcessSource for FakeSource {
    fn get(&self, pid: u32) -> Result<ProcessRecord, WitrError> {
        self.records
            .iter()
            .find(|r| r.pid == pid)
            .cloned()
            .ok_or_else(|| WitrError::NotFound(format!("no process with pid {pid}")))
    }

    fn list(&self) -> Result<Vec<ProcessRecord>, WitrError> {
        Ok(self.records.clone())
    }

    fn owner_of(&self, port: u16) -> Result<SocketOwner, WitrError> {
        Ok(self.ports.get(&port).cloned().unwrap_or(SocketOwner::NoSocket))
    }

    fn environment(&self, pid: u32) -> Result<Vec<String>, WitrError> {
        self.get(pid)?;
        Ok(self.env.get(&pid).cloned().unwrap_or_default())
    }

    fn socket_info(&self, _port: u16) -> Option<SocketInfo> {
        self.socket_info.clone()
    }

    fn resource_context(&self, _pid: u32) -> Option<ResourceContext> {
        self.resources.clone()
    }

    fn file_context(&self, _pid: u32) -> Option<FileContext> {
        self.files.clone()
    }
}
