use std::{
    collections::{HashMap, HashSet},
    fmt,
    sync::Arc,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::comment::mutation::ReactionId;

/// Maximum number of body rows shown when a comment is rendered as a
/// non-interactive preview (inside the delete confirmation).
pub const PREVIEW_MAX_HEIGHT: u16 = 6;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommentId(Arc<str>);

impl CommentId {
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(Arc::<str>::from(id.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<u64> for CommentId {
    fn from(value: u64) -> Self {
        Self::new(value.to_string())
    }
}

impl From<&str> for CommentId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl fmt::Display for CommentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The collective (user or organisation) a reaction is sent on behalf of.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorId(Arc<str>);

impl ActorId {
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(Arc::<str>::from(id.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub id: ActorId,
    pub name: String,
}

/// The fixed reaction palette, laid out in two rows of four.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Emoji {
    #[serde(rename = "+1")]
    ThumbsUp,
    #[serde(rename = "-1")]
    ThumbsDown,
    #[serde(rename = "laugh")]
    Grinning,
    #[serde(rename = "hooray")]
    Party,
    #[serde(rename = "confused")]
    Confused,
    #[serde(rename = "heart")]
    Heart,
    #[serde(rename = "rocket")]
    Rocket,
    #[serde(rename = "eyes")]
    Eyes,
}

impl Emoji {
    pub const FIRST_ROW: [Emoji; 4] = [
        Emoji::ThumbsUp,
        Emoji::ThumbsDown,
        Emoji::Grinning,
        Emoji::Party,
    ];
    pub const SECOND_ROW: [Emoji; 4] = [Emoji::Confused, Emoji::Heart, Emoji::Rocket, Emoji::Eyes];
    pub const PALETTE: [Emoji; 8] = [
        Emoji::ThumbsUp,
        Emoji::ThumbsDown,
        Emoji::Grinning,
        Emoji::Party,
        Emoji::Confused,
        Emoji::Heart,
        Emoji::Rocket,
        Emoji::Eyes,
    ];

    pub fn symbol(self) -> &'static str {
        match self {
            Emoji::ThumbsUp => "👍️",
            Emoji::ThumbsDown => "👎",
            Emoji::Grinning => "😀",
            Emoji::Party => "🎉",
            Emoji::Confused => "😕",
            Emoji::Heart => "❤️",
            Emoji::Rocket => "🚀",
            Emoji::Eyes => "👀",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Emoji::ThumbsUp => "+1",
            Emoji::ThumbsDown => "-1",
            Emoji::Grinning => "laugh",
            Emoji::Party => "hooray",
            Emoji::Confused => "confused",
            Emoji::Heart => "heart",
            Emoji::Rocket => "rocket",
            Emoji::Eyes => "eyes",
        }
    }
}

impl fmt::Display for Emoji {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: CommentId,
    pub body: String,
    pub author: Author,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub reactions: HashMap<Emoji, u64>,
    /// Ids of the stored reactions behind `reactions`.
    #[serde(default)]
    pub reaction_ids: HashSet<ReactionId>,
    #[serde(default)]
    pub is_conversation_root: bool,
}

/// What the viewer may do with a comment. Resolved by the query layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    #[serde(default)]
    pub can_edit: bool,
    #[serde(default)]
    pub can_delete: bool,
}

impl Capabilities {
    pub const NONE: Capabilities = Capabilities {
        can_edit: false,
        can_delete: false,
    };

    pub fn any(self) -> bool {
        self.can_edit || self.can_delete
    }
}

/// A render-ready value describing one comment.
#[derive(Debug, Clone, PartialEq)]
pub struct CommentView {
    pub id: CommentId,
    pub author: Author,
    pub created_at: DateTime<Utc>,
    pub body: String,
    /// Non-zero counts in palette order.
    pub reactions: Vec<(Emoji, u64)>,
    pub capabilities: Capabilities,
    pub actions_enabled: bool,
    pub max_height: Option<u16>,
}

impl CommentView {
    /// The same comment with every capability stripped. This is what the
    /// delete confirmation shows; it is a plain value and can never open a
    /// confirmation of its own.
    pub fn preview(&self) -> Self {
        Self {
            capabilities: Capabilities::NONE,
            actions_enabled: false,
            max_height: Some(PREVIEW_MAX_HEIGHT),
            ..self.clone()
        }
    }

    pub fn has_actions(&self) -> bool {
        self.actions_enabled && self.capabilities.any()
    }

    pub fn posted_on(&self) -> String {
        format!("Posted on {}", self.created_at.format("%B %-d, %Y"))
    }
}
