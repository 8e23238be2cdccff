//! Postgres-backed fixtures for tests that exercise the real queries.
//!
//! Tests using [`TestDb`] run only when `TEST_DATABASE_URL` points at a
//! disposable database. Every table is truncated when a test starts, so tests
//! take turns through a process-wide permit.

use axum::Router;
use campus_food_orders::{
    db,
    models::{CreateMenuItemEntity, MenuCategory},
    schema::{food_stalls, menu_items, orders, users},
};
use chrono::{DateTime, Utc};
use diesel::{ExpressionMethods, QueryDsl, sql_query};
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};
use diesel_migrations::{EmbeddedMigrations, embed_migrations};
use tokio::sync::{OnceCell, Semaphore, SemaphorePermit};
use uuid::Uuid;

use super::test_app;

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

static MIGRATED: OnceCell<()> = OnceCell::const_new();
static DB_PERMIT: Semaphore = Semaphore::const_new(1);

pub struct TestDb {
    pub url: String,
    pub conn: AsyncPgConnection,
    _permit: SemaphorePermit<'static>,
}

impl TestDb {
    /// Empty, migrated database, or `None` when `TEST_DATABASE_URL` is unset.
    pub async fn connect() -> Option<Self> {
        let Some(url) = std::env::var("TEST_DATABASE_URL")
            .ok()
            .filter(|url| !url.trim().is_empty())
        else {
            eprintln!("TEST_DATABASE_URL is not set, skipping");
            return None;
        };

        let permit = DB_PERMIT.acquire().await.unwrap();

        let migrate_url = url.as_str();
        MIGRATED
            .get_or_init(|| async move {
                db::run_migrations_blocking(MIGRATIONS, migrate_url)
                    .await
                    .unwrap();
            })
            .await;

        let mut conn = AsyncPgConnection::establish(&url).await.unwrap();
        sql_query(
            "TRUNCATE order_items, orders, menu_items, food_stalls, users RESTART IDENTITY CASCADE",
        )
        .execute(&mut conn)
        .await
        .unwrap();

        Some(Self {
            url,
            conn,
            _permit: permit,
        })
    }

    /// Router talking to this database, with extra env overrides.
    pub fn app(&self, extra: &[(&str, &str)]) -> Router {
        let mut vars = vec![
            ("DATABASE_URL", self.url.as_str()),
            ("DATABASE_CONNECTION_TIMEOUT", "5"),
        ];
        vars.extend_from_slice(extra);
        test_app(&vars)
    }

    pub async fn user(&mut self, id: &str, name: &str, telegram_id: Option<i64>) -> Uuid {
        let id = Uuid::parse_str(id).unwrap();
        diesel::insert_into(users::table)
            .values((
                users::id.eq(id),
                users::email.eq(format!("{id}@campus.test")),
                users::name.eq(name),
                users::telegram_id.eq(telegram_id),
            ))
            .execute(&mut self.conn)
            .await
            .unwrap();
        id
    }

    pub async fn stall(&mut self, name: &str, is_active: bool) -> i32 {
        diesel::insert_into(food_stalls::table)
            .values((
                food_stalls::name.eq(name),
                food_stalls::is_active.eq(is_active),
            ))
            .returning(food_stalls::id)
            .get_result(&mut self.conn)
            .await
            .unwrap()
    }

    pub async fn item(&mut self, stall_id: i32, name: &str, price: f64, is_available: bool) -> i32 {
        diesel::insert_into(menu_items::table)
            .values(CreateMenuItemEntity {
                stall_id,
                name: name.to_string(),
                description: None,
                price,
                category: MenuCategory::Main,
                is_available,
                image_url: None,
            })
            .returning(menu_items::id)
            .get_result(&mut self.conn)
            .await
            .unwrap()
    }

    pub async fn backdate_order(&mut self, order_id: i64, created_at: DateTime<Utc>) {
        diesel::update(orders::table.find(order_id as i32))
            .set(orders::created_at.eq(created_at))
            .execute(&mut self.conn)
            .await
            .unwrap();
    }
}
