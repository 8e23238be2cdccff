use anyhow::Result;
use campus_food_orders::{app_state::AppState, bootstrap, config, db};
use diesel_migrations::{EmbeddedMigrations, embed_migrations};

/// Migrations embedded into the binary which helps with streamlining image building process
const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

#[tokio::main]
async fn main() -> Result<()> {
    bootstrap::init_tracing();
    bootstrap::init_env();

    let config = config::load()?;

    if config.database.run_migrations {
        tracing::info!("Running migrations on {}...", config.database_url_masked());
        let migrations_count =
            db::run_migrations_blocking(MIGRATIONS, &config.database.url).await?;
        tracing::info!("Run {} new migrations successfully", migrations_count);
    }

    tracing::info!("Bootstrapping...");
    let state = AppState::new(&config);
    let app = bootstrap::build_app(state);
    bootstrap::serve(&config, app).await
}
