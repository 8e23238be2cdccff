use reqwest::Client;

use crate::{
    aliases::DbPool,
    api::{supabase_auth::SupabaseAuthClient, telegram::TelegramClient},
    config::Config,
    db,
};

/// State shared by every handler. Cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    pub db_pool: DbPool,
    pub telegram: TelegramClient,
    pub supabase_auth: SupabaseAuthClient,
}

impl AppState {
    pub fn new(config: &Config) -> Self {
        let http_client = Client::new();
        Self {
            db_pool: db::create_pool(&config.database),
            telegram: TelegramClient::new(http_client.clone(), config.telegram.clone()),
            supabase_auth: SupabaseAuthClient::new(http_client, config.supabase.clone()),
        }
    }
}
