use std::collections::HashSet;

use async_trait::async_trait;

/// Boundary to the service that owns campaigns. Campaign-linked conversations
/// must point at a campaign that actually exists there.
#[async_trait]
pub trait CampaignDirectory: Send + Sync {
    async fn resolves(&self, campaign_ref: &str) -> bool;
}

/// Default binding: accept any non-empty reference. Used when the directory
/// service is not wired in (the reference stays opaque either way).
pub struct OpenCampaignDirectory;

#[async_trait]
impl CampaignDirectory for OpenCampaignDirectory {
    async fn resolves(&self, campaign_ref: &str) -> bool {
        !campaign_ref.trim().is_empty()
    }
}

/// Fixed-set directory for tests and closed deployments.
pub struct StaticCampaignDirectory {
    known: HashSet<String>,
}

impl StaticCampaignDirectory {
    pub fn new<I, S>(refs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            known: refs.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl CampaignDirectory for StaticCampaignDirectory {
    async fn resolves(&self, campaign_ref: &str) -> bool {
        self.known.contains(campaign_ref)
    }
}
