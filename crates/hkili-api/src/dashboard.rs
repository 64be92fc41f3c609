//! Admin dashboard: a handful of independent reads reduced in process.

use axum::{Json, extract::State};

use hkili_db::models::UserBalanceRow;
use hkili_types::api::{DashboardResponse, RecentStory};
use hkili_types::models::UserStatus;

use crate::error::ApiResult;
use crate::middleware::RequireAdmin;
use crate::state::{AppState, with_db};

const RECENT_STORIES: u32 = 5;

pub async fn get_dashboard(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> ApiResult<Json<DashboardResponse>> {
    let (total_users, total_stories, total_characters, total_categories, balances, recent) = tokio::try_join!(
        with_db(&state, |db| db.count_users()),
        with_db(&state, |db| db.count_stories()),
        with_db(&state, |db| db.count_characters()),
        with_db(&state, |db| db.count_categories()),
        with_db(&state, |db| db.user_balances()),
        with_db(&state, |db| db.recent_stories(RECENT_STORIES)),
    )?;

    let recent_stories = recent
        .into_iter()
        .map(RecentStory::try_from)
        .collect::<anyhow::Result<Vec<_>>>()?;

    let totals = tally_balances(&balances)?;

    Ok(Json(DashboardResponse {
        total_users,
        total_stories,
        total_characters,
        total_categories,
        total_coins: totals.coins,
        active_users: totals.active,
        blocked_users: totals.blocked,
        recent_stories,
    }))
}

#[derive(Debug, Default, PartialEq)]
struct BalanceTotals {
    coins: i64,
    active: u64,
    blocked: u64,
}

/// Unknown statuses count toward neither bucket. A coin total that does not
/// fit in an `i64` is an error rather than a wrapped value.
fn tally_balances(rows: &[UserBalanceRow]) -> anyhow::Result<BalanceTotals> {
    rows.iter().try_fold(BalanceTotals::default(), |mut acc, row| -> anyhow::Result<_> {
        acc.coins = acc
            .coins
            .checked_add(row.coins)
            .ok_or_else(|| anyhow::anyhow!("total coin balance overflows i64"))?;
        match row.status.parse::<UserStatus>() {
            Ok(UserStatus::Active) => acc.active += 1,
            Ok(UserStatus::Blocked) => acc.blocked += 1,
            Err(_) => {}
        }
        Ok(acc)
    })
}
