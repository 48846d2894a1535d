//! Read-side projections: search, priority ranking and the filtered, sorted,
//! paginated admin listing.

use std::cmp::Ordering;

use housing_shared::constants::DEFAULT_ROWS_PER_PAGE;
use housing_shared::{Application, ApplicationStatus, Gender, Province, RoomType};
use serde::{Deserialize, Serialize};

use crate::backend::StorageBackend;
use crate::vault::Vault;

/// An application together with its priority score.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedApplication {
    #[serde(flatten)]
    pub application: Application,
    pub priority_score: u8,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    #[default]
    DateDesc,
    DateAsc,
    GpaDesc,
    GpaAsc,
    NameAsc,
    NameDesc,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApplicationQuery {
    #[serde(default, alias = "q")]
    pub search: Option<String>,
    #[serde(default)]
    pub gender: Option<Gender>,
    #[serde(default)]
    pub province: Option<Province>,
    #[serde(default)]
    pub status: Option<ApplicationStatus>,
    #[serde(default, alias = "roomType")]
    pub room_type: Option<RoomType>,
    #[serde(default)]
    pub sort: SortKey,
    /// 1-based.
    #[serde(default)]
    pub page: Option<usize>,
    #[serde(default, alias = "perPage")]
    pub per_page: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: usize,
    pub per_page: usize,
    pub total_items: usize,
    pub total_pages: usize,
}

impl<B: StorageBackend> Vault<B> {
    /// Case-insensitive substring match over name, national ID, reference
    /// number and phone. A blank query returns everything.
    pub fn search(&self, query: &str) -> Vec<&Application> {
        let needle = query.trim().to_lowercase();
        self.list()
            .iter()
            .filter(|app| needle.is_empty() || matches_search(app, &needle))
            .collect()
    }

    /// All applications by descending priority score. Ties keep stored order.
    pub fn ranked_by_priority(&self) -> Vec<RankedApplication> {
        let mut ranked: Vec<RankedApplication> = self
            .list()
            .iter()
            .map(|app| RankedApplication {
                priority_score: app.priority_score(),
                application: app.clone(),
            })
            .collect();
        // sort_by is stable
        ranked.sort_by(|a, b| b.priority_score.cmp(&a.priority_score));
        ranked
    }

    pub fn top_priority(&self, limit: usize) -> Vec<RankedApplication> {
        let mut ranked = self.ranked_by_priority();
        ranked.truncate(limit);
        ranked
    }

    pub fn query(&self, query: &ApplicationQuery) -> Page<Application> {
        let needle = query
            .search
            .as_deref()
            .map(|s| s.trim().to_lowercase())
            .unwrap_or_default();

        let mut matched: Vec<&Application> = self
            .list()
            .iter()
            .filter(|app| needle.is_empty() || matches_search(app, &needle))
            .filter(|app| query.gender.map_or(true, |g| app.form.gender == g))
            .filter(|app| query.province.as_ref().map_or(true, |p| &app.form.province == p))
            .filter(|app| query.status.map_or(true, |s| app.status == s))
            .filter(|app| query.room_type.as_ref().map_or(true, |r| &app.form.room_type == r))
            .collect();

        matched.sort_by(|a, b| compare(a, b, query.sort));

        let per_page = query
            .per_page
            .filter(|&n| n > 0)
            .unwrap_or(DEFAULT_ROWS_PER_PAGE);
        let total_items = matched.len();
        let total_pages = total_items.div_ceil(per_page).max(1);
        let page = query.page.unwrap_or(1).clamp(1, total_pages);

        let items = matched
            .into_iter()
            .skip((page - 1) * per_page)
            .take(per_page)
            .cloned()
            .collect();

        Page {
            items,
            page,
            per_page,
            total_items,
            total_pages,
        }
    }
}

fn matches_search(app: &Application, needle: &str) -> bool {
    app.form.full_name.to_lowercase().contains(needle)
        || app.form.national_id.contains(needle)
        || app.reference_number.to_lowercase().contains(needle)
        || app.form.phone.contains(needle)
}

fn compare(a: &Application, b: &Application, key: SortKey) -> Ordering {
    match key {
        SortKey::DateDesc => b.registration_date.cmp(&a.registration_date),
        SortKey::DateAsc => a.registration_date.cmp(&b.registration_date),
        SortKey::GpaDesc => b.form.gpa.total_cmp(&a.form.gpa),
        SortKey::GpaAsc => a.form.gpa.total_cmp(&b.form.gpa),
        SortKey::NameAsc => name_key(a).cmp(&name_key(b)),
        SortKey::NameDesc => name_key(b).cmp(&name_key(a)),
    }
}

fn name_key(app: &Application) -> String {
    app.form.full_name.to_lowercase()
}
