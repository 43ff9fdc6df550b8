//! Staff dashboard page and the JSON behind it

use axum::{
    extract::State,
    response::Html,
    Json,
};
use chrono::Utc;

use super::state::AppState;
use crate::domain::models::{AdminStats, ConversationCharts, DashboardAnalytics};
use crate::shared::errors::Result;

const DASHBOARD_PAGE: &str = include_str!("../../static/admin/dashboard.html");

/// GET /admin/dashboard, /admin/conversations, /admin/analytics
pub async fn dashboard_page_handler() -> Html<&'static str> {
    Html(DASHBOARD_PAGE)
}

/// GET /api/analytics/dashboard
pub async fn dashboard_analytics_handler(
    State(state): State<AppState>,
) -> Result<Json<DashboardAnalytics>> {
    Ok(Json(state.analytics.dashboard(Utc::now()).await?))
}

/// GET /admin/api/stats
pub async fn admin_stats_handler(State(state): State<AppState>) -> Result<Json<AdminStats>> {
    Ok(Json(state.analytics.admin_stats(Utc::now()).await?))
}

/// GET /admin/api/charts/conversations
pub async fn conversation_charts_handler(
    State(state): State<AppState>,
) -> Result<Json<ConversationCharts>> {
    Ok(Json(state.analytics.conversation_charts(Utc::now()).await?))
}
