// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Allow-lists of well-known library types and members.
//!
//! This is configuration data: the engine consults it but never hardcodes a
//! type name of its own. Hosts extend the shipped table with
//! [`KnownTypes::from_json`] and [`KnownTypes::extend`].

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// A member of a well-known type, by fully qualified type name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberRef {
    pub type_name: String,
    pub member: String,
}

impl MemberRef {
    pub fn new(type_name: &str, member: &str) -> Self {
        Self {
            type_name: type_name.to_string(),
            member: member.to_string(),
        }
    }

    fn matches(&self, type_name: &str, member: &str) -> bool {
        self.type_name == type_name && self.member == member
    }
}

/// A constructor argument that decides whether the wrapper adopts its
/// resource argument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnershipSwitch {
    /// Parameter name, e.g. `leaveOpen`.
    pub parameter: String,
    /// Literal value of the argument that makes the caller keep ownership.
    pub retains_when: bool,
}

/// A type whose constructor adopts and later releases its resource argument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WrapperRule {
    pub type_name: String,
    #[serde(default)]
    pub ownership_switch: Option<OwnershipSwitch>,
}

impl WrapperRule {
    pub fn adopting(type_name: &str) -> Self {
        Self {
            type_name: type_name.to_string(),
            ownership_switch: None,
        }
    }

    pub fn switched(type_name: &str, parameter: &str, retains_when: bool) -> Self {
        Self {
            type_name: type_name.to_string(),
            ownership_switch: Some(OwnershipSwitch {
                parameter: parameter.to_string(),
                retains_when,
            }),
        }
    }
}

/// The known-type table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KnownTypes {
    /// Interface every releasable resource implements.
    pub resource_capability: String,
    /// Names of the release call, e.g. `Dispose`.
    pub release_methods: Vec<String>,
    pub adopting_wrappers: Vec<WrapperRule>,
    /// Types that release every item of their collection initializer.
    pub disposing_containers: Vec<String>,
    /// Members returning a shared instance the caller must not release.
    pub non_owning_members: Vec<MemberRef>,
    /// Members whose return value carries ownership of their argument.
    pub passthrough_members: Vec<MemberRef>,
    /// Members storing their argument in a container.
    pub storing_members: Vec<MemberRef>,
    /// Generic awaitables whose single type argument is the awaited value.
    pub awaitable_types: Vec<String>,
}

impl Default for KnownTypes {
    fn default() -> Self {
        let wrappers = [
            ("System.IO.BinaryReader", "leaveOpen"),
            ("System.IO.BinaryWriter", "leaveOpen"),
            ("System.IO.StreamReader", "leaveOpen"),
            ("System.IO.StreamWriter", "leaveOpen"),
            ("System.Security.Cryptography.CryptoStream", "leaveOpen"),
            ("System.IO.Compression.DeflateStream", "leaveOpen"),
            ("System.IO.Compression.GZipStream", "leaveOpen"),
        ];
        let mut adopting_wrappers: Vec<WrapperRule> = wrappers
            .iter()
            .map(|(ty, param)| WrapperRule::switched(ty, param, true))
            .collect();
        adopting_wrappers.push(WrapperRule::switched(
            "System.Net.Http.HttpClient",
            "disposeHandler",
            false,
        ));
        adopting_wrappers.push(WrapperRule::adopting("System.Reactive.Disposables.SingleAssignmentDisposable"));
        adopting_wrappers.push(WrapperRule::adopting("System.Reactive.Disposables.SerialDisposable"));
        adopting_wrappers.push(WrapperRule::adopting("System.Reactive.Disposables.CompositeDisposable"));

        Self {
            resource_capability: "System.IDisposable".to_string(),
            release_methods: vec!["Dispose".to_string()],
            adopting_wrappers,
            disposing_containers: vec!["System.Reactive.Disposables.CompositeDisposable".to_string()],
            non_owning_members: vec![
                MemberRef::new("System.Console", "Out"),
                MemberRef::new("System.Console", "Error"),
                MemberRef::new("System.Console", "In"),
                MemberRef::new("System.IO.Stream", "Null"),
                MemberRef::new("System.IO.TextWriter", "Null"),
                MemberRef::new("System.IO.StreamReader", "BaseStream"),
                MemberRef::new("System.Threading.Tasks.Task", "CompletedTask"),
                MemberRef::new("System.IServiceProvider", "GetService"),
            ],
            passthrough_members: vec![
                MemberRef::new("System.Threading.Tasks.Task", "FromResult"),
                MemberRef::new("System.Threading.Tasks.ValueTask", "FromResult"),
            ],
            storing_members: vec![
                MemberRef::new("System.Collections.Generic.List`1", "Add"),
                MemberRef::new("System.Collections.Generic.ICollection`1", "Add"),
                MemberRef::new("System.Collections.Generic.Dictionary`2", "Add"),
                MemberRef::new("System.Collections.Generic.Stack`1", "Push"),
                MemberRef::new("System.Collections.Generic.Queue`1", "Enqueue"),
            ],
            awaitable_types: vec![
                "System.Threading.Tasks.Task`1".to_string(),
                "System.Threading.Tasks.ValueTask`1".to_string(),
            ],
        }
    }
}

impl KnownTypes {
    /// Load a table from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let table: KnownTypes = serde_json::from_str(json)?;
        if table.resource_capability.is_empty() {
            return Err(ConfigError::EmptyName { field: "resource_capability" });
        }
        if table.adopting_wrappers.iter().any(|w| w.type_name.is_empty()) {
            return Err(ConfigError::EmptyName { field: "adopting_wrappers.type_name" });
        }
        Ok(table)
    }

    /// Add every entry of `other` not already present. The capability name
    /// of `self` is kept.
    pub fn extend(&mut self, other: KnownTypes) {
        fn merge<T: PartialEq>(into: &mut Vec<T>, from: Vec<T>) {
            for item in from {
                if !into.contains(&item) {
                    into.push(item);
                }
            }
        }
        merge(&mut self.release_methods, other.release_methods);
        merge(&mut self.adopting_wrappers, other.adopting_wrappers);
        merge(&mut self.disposing_containers, other.disposing_containers);
        merge(&mut self.non_owning_members, other.non_owning_members);
        merge(&mut self.passthrough_members, other.passthrough_members);
        merge(&mut self.storing_members, other.storing_members);
        merge(&mut self.awaitable_types, other.awaitable_types);
    }

    pub fn is_release_method(&self, name: &str) -> bool {
        self.release_methods.iter().any(|m| m == name)
    }

    pub fn wrapper(&self, type_name: &str) -> Option<&WrapperRule> {
        self.adopting_wrappers.iter().find(|w| w.type_name == type_name)
    }

    pub fn is_disposing_container(&self, type_name: &str) -> bool {
        self.disposing_containers.iter().any(|t| t == type_name)
    }

    pub fn is_non_owning(&self, type_name: &str, member: &str) -> bool {
        self.non_owning_members.iter().any(|m| m.matches(type_name, member))
    }

    pub fn is_passthrough(&self, type_name: &str, member: &str) -> bool {
        self.passthrough_members.iter().any(|m| m.matches(type_name, member))
    }

    pub fn is_storing(&self, type_name: &str, member: &str) -> bool {
        self.storing_members.iter().any(|m| m.matches(type_name, member))
    }

    pub fn is_awaitable(&self, type_name: &str) -> bool {
        self.awaitable_types.iter().any(|t| t == type_name)
    }
}
