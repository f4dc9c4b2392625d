//! Project types: identity, status, access, membership and structure

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use ulid::Ulid;

use crate::definition::ProjectDefinition;
use crate::error::{Error, Result};
use crate::extra::ProjectExtra;
use crate::limits::ProjectLimits;
use crate::validate::DefinitionValidator;

/// Format of the project version string clients echo back on upload
pub const VERSION_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Unique identifier for a project
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProjectId(pub Ulid);

impl ProjectId {
    pub fn new() -> Self {
        Self(Ulid::new())
    }

    pub fn from_string(s: &str) -> std::result::Result<Self, ulid::DecodeError> {
        Ok(Self(Ulid::from_string(s)?))
    }
}

impl Default for ProjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ProjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectStatus {
    #[default]
    Active,
    Trashed,
    Locked,
    Archived,
}

impl std::str::FromStr for ProjectStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "trashed" => Ok(Self::Trashed),
            "locked" => Ok(Self::Locked),
            "archived" => Ok(Self::Archived),
            other => Err(format!("unknown project status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectAccess {
    #[default]
    Public,
    Private,
}

/// Membership role of a user within a project
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectRole {
    Creator,
    Manager,
    Curator,
    Collector,
    Viewer,
}

impl ProjectRole {
    pub fn can_upload(&self) -> bool {
        !matches!(self, Self::Viewer)
    }
}

impl std::str::FromStr for ProjectRole {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "creator" => Ok(Self::Creator),
            "manager" => Ok(Self::Manager),
            "curator" => Ok(Self::Curator),
            "collector" => Ok(Self::Collector),
            "viewer" => Ok(Self::Viewer),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

/// A data-collection project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    /// Unique identifier
    pub id: ProjectId,

    /// Project name (alphanumeric with underscores/hyphens)
    pub name: String,

    #[serde(default)]
    pub status: ProjectStatus,

    #[serde(default)]
    pub access: ProjectAccess,

    /// Authored structure
    pub definition: ProjectDefinition,

    /// Compiled index of `definition`
    pub extra: ProjectExtra,

    /// Bumped on every structure change; clients must echo it back
    pub structure_last_updated: DateTime<Utc>,

    /// User id -> role
    #[serde(default)]
    pub members: HashMap<u64, ProjectRole>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl Project {
    /// Validate the name and definition and build a project from them
    pub fn from_definition(name: impl Into<String>, definition: ProjectDefinition, limits: &ProjectLimits) -> Result<Self> {
        let name = name.into();
        if !Self::validate_name(&name) {
            return Err(Error::InvalidProjectName(name));
        }
        let extra = DefinitionValidator::new(limits.clone()).validate(&definition)?;
        let now = Utc::now().trunc_subsecs(0);
        Ok(Self {
            id: ProjectId::new(),
            name,
            status: ProjectStatus::Active,
            access: ProjectAccess::Public,
            definition,
            extra,
            structure_last_updated: now,
            members: HashMap::new(),
            created_at: now,
        })
    }

    pub fn with_access(mut self, access: ProjectAccess) -> Self {
        self.access = access;
        self
    }

    pub fn with_member(mut self, user_id: u64, role: ProjectRole) -> Self {
        self.members.insert(user_id, role);
        self
    }

    /// The version string an upload must carry
    pub fn project_version(&self) -> String {
        self.structure_last_updated.format(VERSION_FORMAT).to_string()
    }

    pub fn is_active(&self) -> bool {
        self.status == ProjectStatus::Active
    }

    pub fn role_of(&self, user_id: u64) -> Option<ProjectRole> {
        self.members.get(&user_id).copied()
    }

    /// Re-validate a new definition and swap it in, bumping the version
    ///
    /// The version only has second precision, so an update within the same
    /// second as the last one moves it forward by one second.
    pub fn replace_structure(
        &mut self,
        definition: ProjectDefinition,
        limits: &ProjectLimits,
    ) -> Result<()> {
        let extra = DefinitionValidator::new(limits.clone()).validate(&definition)?;
        let now = Utc::now().trunc_subsecs(0);
        self.structure_last_updated = if now > self.structure_last_updated {
            now
        } else {
            self.structure_last_updated + chrono::Duration::seconds(1)
        };
        self.definition = definition;
        self.extra = extra;
        Ok(())
    }

    /// Validate project name (alphanumeric, underscores, hyphens only)
    pub fn validate_name(name: &str) -> bool {
        !name.is_empty()
            && name.len() <= 100
            && name
                .chars()
                .all(|c| c.is_alphanumeric() || c == '_' || c == '-')
    }
}
