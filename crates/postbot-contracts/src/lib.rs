use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TurnRequest {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
}

impl TurnRequest {
    pub fn text(message: &str) -> Self {
        Self {
            message: message.to_string(),
            ..Self::default()
        }
    }

    /// Both halves of the pair, or nothing.
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => Some((lat, lon)),
            _ => None,
        }
    }
}

/// A selectable option: either a bare label or a button carrying a value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum ReplyOption {
    Label(String),
    Button { text: String, value: String },
}

impl ReplyOption {
    pub fn button(text: impl Into<String>, value: impl Into<String>) -> Self {
        ReplyOption::Button {
            text: text.into(),
            value: value.into(),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            ReplyOption::Label(text) => text,
            ReplyOption::Button { text, .. } => text,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ChatReply {
    pub response: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<ReplyOption>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_data: Option<Vec<PostOffice>>,
}

impl ChatReply {
    pub fn text(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
            ..Self::default()
        }
    }

    pub fn with_options(mut self, options: Vec<ReplyOption>) -> Self {
        self.options = options;
        self
    }

    pub fn with_full_data(mut self, offices: Vec<PostOffice>) -> Self {
        self.full_data = Some(offices);
        self
    }
}

/// One office as reported by the directory provider. Fields other than the
/// name and branch type are carried through untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PostOffice {
    #[serde(rename = "Name", default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(
        rename = "BranchType",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub branch_type: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PostOffice {
    pub fn named(name: &str, branch_type: Option<&str>) -> Self {
        Self {
            name: Some(name.to_string()),
            branch_type: branch_type.map(|v| v.to_string()),
            extra: Map::new(),
        }
    }
}

/// Element of the array returned by the directory provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryPayload {
    #[serde(rename = "Status")]
    pub status: String,
    #[serde(rename = "Message", default)]
    pub message: Option<String>,
    #[serde(rename = "PostOffice", default)]
    pub post_office: Option<Vec<PostOffice>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DirectoryStatus {
    Success,
    Failure,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DirectoryRecord {
    pub status: DirectoryStatus,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub post_offices: Vec<PostOffice>,
}

impl DirectoryRecord {
    pub fn success(post_offices: Vec<PostOffice>) -> Self {
        Self {
            status: DirectoryStatus::Success,
            message: None,
            post_offices,
        }
    }

    pub fn failure(message: Option<&str>) -> Self {
        Self {
            status: DirectoryStatus::Failure,
            message: message.map(|v| v.to_string()),
            post_offices: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == DirectoryStatus::Success
    }
}

impl From<DirectoryPayload> for DirectoryRecord {
    fn from(payload: DirectoryPayload) -> Self {
        if payload.status == "Success" {
            Self {
                status: DirectoryStatus::Success,
                message: payload.message,
                post_offices: payload.post_office.unwrap_or_default(),
            }
        } else {
            Self {
                status: DirectoryStatus::Failure,
                message: payload.message,
                post_offices: Vec::new(),
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReverseGeocodePayload {
    #[serde(default)]
    pub address: Option<GeocodedAddress>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeocodedAddress {
    #[serde(default)]
    pub postcode: Option<String>,
}

impl ReverseGeocodePayload {
    pub fn postcode(&self) -> Option<&str> {
        self.address
            .as_ref()
            .and_then(|a| a.postcode.as_deref())
            .filter(|v| !v.trim().is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum Answer {
    Text(String),
    Choice {
        #[serde(default)]
        randomize: bool,
        #[serde(rename = "options", default)]
        candidates: Vec<String>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct KnowledgeEntry {
    pub keywords: Vec<String>,
    pub answer: Answer,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<ReplyOption>>,
}

impl KnowledgeEntry {
    /// Lowercases keywords and drops blank ones. Returns `None` when nothing
    /// is left to match on.
    pub fn normalized(mut self) -> Option<Self> {
        self.keywords = self
            .keywords
            .iter()
            .map(|k| k.trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();
        if self.keywords.is_empty() {
            None
        } else {
            Some(self)
        }
    }

    pub fn has_keyword(&self, keyword: &str) -> bool {
        self.keywords.iter().any(|k| k == keyword)
    }
}
