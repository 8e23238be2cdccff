use std::{fmt, io::Write, str::FromStr};

use chrono::{DateTime, Utc};
use diesel::{
    AsChangeset, AsExpression, FromSqlRow, Selectable,
    deserialize::{self, FromSql},
    pg::{Pg, PgValue},
    prelude::{Identifiable, Insertable, Queryable},
    serialize::{self, IsNull, Output, ToSql},
    sql_types::Text,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::app_error::AppError;

pub const ROLE_ADMIN: &str = "admin";

#[derive(Debug, Error, PartialEq, Eq)]
#[error("'{value}' is not a valid {kind}")]
pub struct ParseEnumError {
    kind: &'static str,
    value: String,
}

impl From<ParseEnumError> for AppError {
    fn from(err: ParseEnumError) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

// Order status

/// Lifecycle state of an order. Stored as lowercase text.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    AsExpression,
    FromSqlRow,
    ToSchema,
)]
#[diesel(sql_type = Text)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Approved,
    Rejected,
    Ready,
    Completed,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 5] = [
        OrderStatus::Pending,
        OrderStatus::Approved,
        OrderStatus::Rejected,
        OrderStatus::Ready,
        OrderStatus::Completed,
    ];

    /// Statuses whose order total counts as revenue.
    pub const REVENUE: [OrderStatus; 3] = [
        OrderStatus::Approved,
        OrderStatus::Ready,
        OrderStatus::Completed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Approved => "approved",
            OrderStatus::Rejected => "rejected",
            OrderStatus::Ready => "ready",
            OrderStatus::Completed => "completed",
        }
    }

    /// The status an order must currently be in to move into `self`.
    /// `None` for `Pending`, which is only ever assigned at creation.
    pub fn required_predecessor(self) -> Option<OrderStatus> {
        match self {
            OrderStatus::Pending => None,
            OrderStatus::Approved | OrderStatus::Rejected => Some(OrderStatus::Pending),
            OrderStatus::Ready => Some(OrderStatus::Approved),
            OrderStatus::Completed => Some(OrderStatus::Ready),
        }
    }

    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        next.required_predecessor() == Some(self)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| ParseEnumError {
                kind: "order status",
                value: s.to_string(),
            })
    }
}

impl ToSql<Text, Pg> for OrderStatus {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        out.write_all(self.as_str().as_bytes())?;
        Ok(IsNull::No)
    }
}

impl FromSql<Text, Pg> for OrderStatus {
    fn from_sql(bytes: PgValue<'_>) -> deserialize::Result<Self> {
        Ok(std::str::from_utf8(bytes.as_bytes())?.parse()?)
    }
}

// Menu category

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    AsExpression,
    FromSqlRow,
    ToSchema,
)]
#[diesel(sql_type = Text)]
#[serde(rename_all = "lowercase")]
pub enum MenuCategory {
    Main,
    Snack,
    Beverage,
    Dessert,
}

impl MenuCategory {
    pub const ALL: [MenuCategory; 4] = [
        MenuCategory::Main,
        MenuCategory::Snack,
        MenuCategory::Beverage,
        MenuCategory::Dessert,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            MenuCategory::Main => "main",
            MenuCategory::Snack => "snack",
            MenuCategory::Beverage => "beverage",
            MenuCategory::Dessert => "dessert",
        }
    }
}

impl fmt::Display for MenuCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MenuCategory {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MenuCategory::ALL
            .into_iter()
            .find(|category| category.as_str() == s)
            .ok_or_else(|| ParseEnumError {
                kind: "menu category",
                value: s.to_string(),
            })
    }
}

impl ToSql<Text, Pg> for MenuCategory {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        out.write_all(self.as_str().as_bytes())?;
        Ok(IsNull::No)
    }
}

impl FromSql<Text, Pg> for MenuCategory {
    fn from_sql(bytes: PgValue<'_>) -> deserialize::Result<Self> {
        Ok(std::str::from_utf8(bytes.as_bytes())?.parse()?)
    }
}

// Users

#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, Clone, ToSchema)]
#[diesel(table_name = crate::schema::users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct UserEntity {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub telegram_id: Option<i64>,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::users)]
pub struct CreateUserEntity {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub phone: Option<String>,
}

/// Partial profile update. `None` fields are left untouched.
#[derive(AsChangeset, Debug, Default)]
#[diesel(table_name = crate::schema::users)]
pub struct UpdateUserEntity {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub telegram_id: Option<i64>,
}

impl UpdateUserEntity {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.phone.is_none() && self.telegram_id.is_none()
    }
}

// Stalls and menu

#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, Clone, ToSchema)]
#[diesel(table_name = crate::schema::food_stalls)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct FoodStallEntity {
    pub id: i32,
    pub name: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, Clone, ToSchema)]
#[diesel(table_name = crate::schema::menu_items)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct MenuItemEntity {
    pub id: i32,
    pub stall_id: i32,
    pub name: String,
    pub description: Option<String>,
    pub price: f64,
    pub category: MenuCategory,
    pub is_available: bool,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::menu_items)]
pub struct CreateMenuItemEntity {
    pub stall_id: i32,
    pub name: String,
    pub description: Option<String>,
    pub price: f64,
    pub category: MenuCategory,
    pub is_available: bool,
    pub image_url: Option<String>,
}

#[derive(AsChangeset, Debug, Default)]
#[diesel(table_name = crate::schema::menu_items)]
pub struct UpdateMenuItemEntity {
    pub name: Option<String>,
    pub price: Option<f64>,
    pub is_available: Option<bool>,
    pub image_url: Option<String>,
}

impl UpdateMenuItemEntity {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.price.is_none()
            && self.is_available.is_none()
            && self.image_url.is_none()
    }
}

// Orders

#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, Clone, ToSchema)]
#[diesel(table_name = crate::schema::orders)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct OrderEntity {
    pub id: i32,
    pub user_id: Uuid,
    pub stall_id: i32,
    pub status: OrderStatus,
    pub total_amount: f64,
    pub estimated_time: Option<i32>,
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::orders)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct CreateOrderEntity {
    pub user_id: Uuid,
    pub stall_id: i32,
    pub status: OrderStatus,
    pub total_amount: f64,
}

/// Columns written when an admin moves an order to a new status.
#[derive(AsChangeset, Debug)]
#[diesel(table_name = crate::schema::orders)]
pub struct OrderTransitionEntity {
    pub status: OrderStatus,
    pub estimated_time: Option<i32>,
    pub rejection_reason: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl OrderTransitionEntity {
    pub fn to(status: OrderStatus) -> Self {
        Self {
            status,
            estimated_time: None,
            rejection_reason: None,
            updated_at: Utc::now(),
        }
    }
}

#[derive(Queryable, Selectable, Serialize, Debug, Clone, ToSchema)]
#[diesel(table_name = crate::schema::order_items)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct OrderItemEntity {
    pub order_id: i32,
    pub menu_item_id: i32,
    pub quantity: i32,
    pub price_at_order: f64,
}

#[derive(Insertable, Debug, Clone, PartialEq)]
#[diesel(table_name = crate::schema::order_items)]
pub struct CreateOrderItemEntity {
    pub order_id: i32,
    pub menu_item_id: i32,
    pub quantity: i32,
    pub price_at_order: f64,
}
