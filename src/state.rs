use std::sync::Arc;

use sqlx::{Pool, Postgres};

use crate::config::Config;
use crate::events::EventBus;
use crate::services::campaigns::CampaignDirectory;
use crate::services::media_store::MediaStore;
use crate::services::typing::TypingTracker;

#[derive(Clone)]
pub struct AppState {
    pub db: Pool<Postgres>,
    pub bus: Arc<dyn EventBus>,
    pub typing: TypingTracker,
    pub media: Arc<dyn MediaStore>,
    pub campaigns: Arc<dyn CampaignDirectory>,
    pub config: Arc<Config>,
}
