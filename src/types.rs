/// Shared types used across the codebase

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// The request shape being served. Exactly one is active per request and it
/// decides which field-producing method and which ability are used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RequestContext {
    Index,
    Detail,
    Create,
    Update,
    CreateInline,
    Attach,
    UpdateAttached,
    Action,
    Lens,
    PivotAction,
}

impl RequestContext {
    /// Classify a form request from the `editing` / `editMode` / `inline` flags.
    /// Returns None when the flags do not describe a form request.
    pub fn from_edit_flags(editing: bool, edit_mode: Option<&str>, inline: bool) -> Option<Self> {
        if !editing {
            return None;
        }
        match edit_mode? {
            "create" if inline => Some(RequestContext::CreateInline),
            "create" => Some(RequestContext::Create),
            "attach" => Some(RequestContext::Attach),
            "update" => Some(RequestContext::Update),
            "update-attached" => Some(RequestContext::UpdateAttached),
            _ => None,
        }
    }

    pub fn is_inline_create(self) -> bool {
        matches!(self, RequestContext::CreateInline)
    }

    pub fn is_create_or_attach(self) -> bool {
        matches!(
            self,
            RequestContext::Create | RequestContext::CreateInline | RequestContext::Attach
        )
    }

    pub fn is_update_or_update_attached(self) -> bool {
        matches!(self, RequestContext::Update | RequestContext::UpdateAttached)
    }

    pub fn is_attachment(self) -> bool {
        matches!(self, RequestContext::Attach | RequestContext::UpdateAttached)
    }

    pub fn is_form(self) -> bool {
        self.is_create_or_attach() || self.is_update_or_update_attached()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RequestContext::Index => "index",
            RequestContext::Detail => "detail",
            RequestContext::Create => "create",
            RequestContext::Update => "update",
            RequestContext::CreateInline => "createInline",
            RequestContext::Attach => "attach",
            RequestContext::UpdateAttached => "updateAttached",
            RequestContext::Action => "action",
            RequestContext::Lens => "lens",
            RequestContext::PivotAction => "pivotAction",
        }
    }
}

impl fmt::Display for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Soft-delete visibility requested through the `trashed` parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrashedStatus {
    #[default]
    Default,
    With,
    Only,
}

impl TrashedStatus {
    /// Unknown values behave like the empty string.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "with" => TrashedStatus::With,
            "only" => TrashedStatus::Only,
            _ => TrashedStatus::Default,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TrashedStatus::Default => "",
            TrashedStatus::With => "with",
            TrashedStatus::Only => "only",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn parse(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("desc") {
            SortDirection::Desc
        } else {
            SortDirection::Asc
        }
    }

    pub fn to_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// Which records a bulk request targets
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Selection {
    /// Every record matching the current index query
    #[default]
    All,
    Keys(Vec<Value>),
}
