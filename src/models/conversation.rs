use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationKind {
    Direct,
    Group,
    Campaign,
}

impl ConversationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConversationKind::Direct => "direct",
            ConversationKind::Group => "group",
            ConversationKind::Campaign => "campaign",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "direct" => Some(ConversationKind::Direct),
            "group" => Some(ConversationKind::Group),
            "campaign" => Some(ConversationKind::Campaign),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: Uuid,
    pub kind: ConversationKind,
    pub title: Option<String>,
    /// Opaque foreign id, present iff kind = campaign.
    pub campaign_ref: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
}

/// Normalize an unordered user pair for the direct-conversation unique index.
pub fn normalize_pair(a: Uuid, b: Uuid) -> (Uuid, Uuid) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_round_trips_through_strings() {
        for kind in [
            ConversationKind::Direct,
            ConversationKind::Group,
            ConversationKind::Campaign,
        ] {
            assert_eq!(ConversationKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(ConversationKind::parse("broadcast"), None);
    }

    #[test]
    fn pair_normalization_is_symmetric() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert_eq!(normalize_pair(a, b), normalize_pair(b, a));
        let (lo, hi) = normalize_pair(a, b);
        assert!(lo <= hi);
    }
}
