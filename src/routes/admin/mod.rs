pub mod menu;
pub mod orders;
pub mod stats;

use chrono::{DateTime, Days, NaiveDate, Utc};
use utoipa_axum::router::OpenApiRouter;

use crate::{app_state::AppState, middleware};

/// Admin routes, all behind [`middleware::require_admin`].
pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().nest(
        "/admin",
        OpenApiRouter::new()
            .merge(orders::routes_with_openapi())
            .merge(menu::routes_with_openapi())
            .merge(stats::routes_with_openapi())
            .route_layer(axum::middleware::from_fn(middleware::require_admin)),
    )
}

/// Half-open `[start, end)` range covering one UTC calendar day.
pub fn utc_day_bounds(day: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = day.and_time(chrono::NaiveTime::MIN).and_utc();
    let end = day
        .checked_add_days(Days::new(1))
        .map(|next| next.and_time(chrono::NaiveTime::MIN).and_utc())
        .unwrap_or(DateTime::<Utc>::MAX_UTC);
    (start, end)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn day_bounds_span_midnight_to_midnight() {
        let day = NaiveDate::from_ymd_opt(2025, 3, 31).unwrap();
        let (start, end) = utc_day_bounds(day);

        assert_eq!(start.to_rfc3339(), "2025-03-31T00:00:00+00:00");
        assert_eq!(end.to_rfc3339(), "2025-04-01T00:00:00+00:00");
    }
}
