use serde::{Deserialize, Serialize};

use crate::response::SortOrder;

/// Filter value meaning "no filter".
const ALL: &str = "all";

/// What a list page holds in its controls.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ListViewState {
    pub page: u32,
    pub limit: u32,
    pub search_query: String,
    pub sort_by: String,
    pub filter_gender: String,
    pub filter_status: String,
    pub filter_age_group: String,
}

/// Query string sent to the list endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListParams {
    pub page: u32,
    pub limit: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub residency_status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age_group: Option<String>,
    #[serde(rename = "sortBy", skip_serializing_if = "Option::is_none")]
    pub sort_by: Option<&'static str>,
    #[serde(rename = "sortOrder", skip_serializing_if = "Option::is_none")]
    pub sort_order: Option<SortOrder>,
}

/// UI sort key to (column, direction).
pub fn sort_for(key: &str) -> Option<(&'static str, SortOrder)> {
    match key {
        "name" => Some(("full_name", SortOrder::Asc)),
        "date" => Some(("created_at", SortOrder::Desc)),
        "dob" => Some(("date_of_birth", SortOrder::Asc)),
        "household" => Some(("household_number", SortOrder::Asc)),
        _ => None,
    }
}

fn filter(value: &str) -> Option<String> {
    let v = value.trim();
    (!v.is_empty() && v != ALL).then(|| v.to_string())
}

impl ListParams {
    pub fn derive(state: &ListViewState) -> Self {
        let sort = sort_for(state.sort_by.trim());
        Self {
            page: state.page,
            limit: state.limit,
            search: Some(state.search_query.trim())
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            gender: filter(&state.filter_gender),
            residency_status: filter(&state.filter_status),
            age_group: filter(&state.filter_age_group),
            sort_by: sort.map(|(col, _)| col),
            sort_order: sort.map(|(_, order)| order),
        }
    }
}

/// Caches the last derived value and recomputes only when the input changes.
#[derive(Debug)]
pub struct Memo<I, O> {
    last: Option<(I, O)>,
}

impl<I, O> Default for Memo<I, O> {
    fn default() -> Self {
        Self { last: None }
    }
}

impl<I: PartialEq + Clone, O> Memo<I, O> {
    pub fn get(&mut self, input: &I, compute: impl FnOnce(&I) -> O) -> &O {
        if self.last.as_ref().is_some_and(|(prev, _)| prev != input) {
            self.last = None;
        }
        let (_, out) = self
            .last
            .get_or_insert_with(|| (input.clone(), compute(input)));
        out
    }
}

/// [`Memo`] specialised to list parameter derivation.
#[derive(Debug, Default)]
pub struct ListParamsMemo(Memo<ListViewState, ListParams>);

impl ListParamsMemo {
    pub fn params(&mut self, state: &ListViewState) -> &ListParams {
        self.0.get(state, ListParams::derive)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn derives_exact_query_object() {
        let state: ListViewState = serde_json::from_value(json!({
            "page": 2,
            "limit": 20,
            "searchQuery": " abc ",
            "sortBy": "date",
            "filterGender": "all",
            "filterStatus": "permanent"
        }))
        .unwrap();
        let params = ListParams::derive(&state);
        assert_eq!(
            serde_json::to_value(&params).unwrap(),
            json!({
                "page": 2,
                "limit": 20,
                "search": "abc",
                "residency_status": "permanent",
                "sortBy": "created_at",
                "sortOrder": "DESC"
            })
        );
    }

    #[test]
    fn blank_search_and_unknown_sort_are_omitted() {
        let state = ListViewState {
            page: 1,
            limit: 10,
            search_query: "   ".into(),
            sort_by: "shoe_size".into(),
            filter_age_group: "senior".into(),
            ..Default::default()
        };
        let value = serde_json::to_value(ListParams::derive(&state)).unwrap();
        assert_eq!(value, json!({ "page": 1, "limit": 10, "age_group": "senior" }));
    }

    #[test]
    fn sort_table() {
        assert_eq!(sort_for("name"), Some(("full_name", SortOrder::Asc)));
        assert_eq!(sort_for("dob"), Some(("date_of_birth", SortOrder::Asc)));
        assert_eq!(sort_for("household"), Some(("household_number", SortOrder::Asc)));
    }

    #[test]
    fn memo_recomputes_only_on_change() {
        let mut memo: Memo<ListViewState, usize> = Memo::default();
        let mut calls = 0;
        let mut state = ListViewState { page: 1, limit: 10, ..Default::default() };

        memo.get(&state, |_| { calls += 1; calls });
        memo.get(&state, |_| { calls += 1; calls });
        assert_eq!(calls, 1);

        state.page = 2;
        assert_eq!(*memo.get(&state, |_| { calls += 1; calls }), 2);
    }

    #[test]
    fn params_memo_tracks_state() {
        let mut memo = ListParamsMemo::default();
        let state = ListViewState { page: 3, limit: 50, sort_by: "name".into(), ..Default::default() };
        let params = memo.params(&state).clone();
        assert_eq!(params.sort_by, Some("full_name"));
        assert_eq!(memo.params(&state), &params);
    }
}
