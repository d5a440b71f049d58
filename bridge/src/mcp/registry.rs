//! Aggregated tool lookup across connected servers
//!
//! Tool names form one flat namespace. When two servers expose the same
//! name, the most recently refreshed server wins; the other registration
//! stays listed under its own server and becomes visible again if the
//! winner is removed.

use std::collections::{BTreeMap, HashSet};

use super::types::ToolDescriptor;

#[derive(Debug, Clone)]
struct ServerTools {
    /// Refresh order, higher is newer
    generation: u64,
    tools: Vec<ToolDescriptor>,
}

#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    servers: BTreeMap<String, ServerTools>,
    generation: u64,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace every descriptor attributed to `server`
    pub fn refresh(&mut self, server: &str, tools: Vec<ToolDescriptor>) {
        self.generation += 1;
        let tools: Vec<ToolDescriptor> = tools
            .into_iter()
            .map(|mut tool| {
                tool.owning_server = server.to_string();
                tool
            })
            .collect();

        tracing::debug!("Registry: '{}' now provides {} tools", server, tools.len());
        self.servers.insert(
            server.to_string(),
            ServerTools {
                generation: self.generation,
                tools,
            },
        );
    }

    /// Drop a server's descriptors
    pub fn remove(&mut self, server: &str) {
        self.servers.remove(server);
    }

    pub fn clear(&mut self) {
        self.servers.clear();
    }

    /// Exact-name lookup
    pub fn resolve(&self, tool_name: &str) -> Option<&ToolDescriptor> {
        self.servers
            .values()
            .filter_map(|entry| {
                entry
                    .tools
                    .iter()
                    .find(|tool| tool.name == tool_name)
                    .map(|tool| (entry.generation, tool))
            })
            .max_by_key(|(generation, _)| *generation)
            .map(|(_, tool)| tool)
    }

    /// Server that would receive a call to `tool_name`
    pub fn owner_of(&self, tool_name: &str) -> Option<&str> {
        self.resolve(tool_name).map(|tool| tool.owning_server.as_str())
    }

    /// Effective descriptors, one per name, ordered by server then listing order
    pub fn all(&self) -> Vec<&ToolDescriptor> {
        let mut seen = HashSet::new();
        self.servers
            .iter()
            .flat_map(|(server, entry)| entry.tools.iter().map(move |tool| (server, tool)))
            .filter(|(server, tool)| self.owner_of(&tool.name) == Some(server.as_str()))
            .filter(|(_, tool)| seen.insert(tool.name.clone()))
            .map(|(_, tool)| tool)
            .collect()
    }

    /// Tool names per server, including shadowed duplicates
    pub fn grouped_by_server(&self) -> BTreeMap<String, Vec<String>> {
        self.servers
            .iter()
            .map(|(server, entry)| {
                (
                    server.clone(),
                    entry.tools.iter().map(|tool| tool.name.clone()).collect(),
                )
            })
            .collect()
    }

    pub fn servers(&self) -> impl Iterator<Item = &str> {
        self.servers.keys().map(String::as_str)
    }

    /// Number of effective (resolvable) tools
    pub fn len(&self) -> usize {
        self.all().len()
    }

    pub fn is_empty(&self) -> bool {
        self.servers.values().all(|entry| entry.tools.is_empty())
    }
}
