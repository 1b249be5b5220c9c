use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Functional areas that permissions are granted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Section {
    CaseManagement,
    Judges,
    CaseTypes,
    Regions,
    Users,
    RolePermissions,
    Chat,
    Notifications,
}

impl Section {
    pub const ALL: [Section; 8] = [
        Section::CaseManagement,
        Section::Judges,
        Section::CaseTypes,
        Section::Regions,
        Section::Users,
        Section::RolePermissions,
        Section::Chat,
        Section::Notifications,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Section::CaseManagement => "CaseManagement",
            Section::Judges => "Judges",
            Section::CaseTypes => "CaseTypes",
            Section::Regions => "Regions",
            Section::Users => "Users",
            Section::RolePermissions => "RolePermissions",
            Section::Chat => "Chat",
            Section::Notifications => "Notifications",
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Section {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Section::ALL
            .into_iter()
            .find(|section| section.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown section '{}'", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Action {
    View,
    Create,
    Edit,
    Delete,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::View => "View",
            Action::Create => "Create",
            Action::Edit => "Edit",
            Action::Delete => "Delete",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "view" => Ok(Action::View),
            "create" => Ok(Action::Create),
            "edit" => Ok(Action::Edit),
            "delete" => Ok(Action::Delete),
            other => Err(format!("unknown action '{}'", other)),
        }
    }
}
