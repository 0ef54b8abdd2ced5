//! Request body for the remote search endpoint.

use serde::Serialize;
use serde_json::Value;

use crate::models::ListingId;

/// Page size the search endpoint expects.
const PAGE_LIMIT: u32 = 50;

/// Search query understood by the listing API.
///
/// Every filter is left wide open; the query is narrowed only through
/// `sqlQuery.dossierId`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingQuery {
    want_libre: bool,
    want_occupe: bool,
    want_a_terme: bool,
    bouquet: Range,
    rente: Range,
    #[serde(rename = "where")]
    where_clauses: Vec<Value>,
    sql_query: SqlQuery,
    #[serde(rename = "_hashFieldDic")]
    hash_field_dic: HashFieldDic,
    get_labels_for: Option<Value>,
    is_extended_search: bool,
    is_fully_extended_search: bool,
    #[serde(rename = "Options")]
    legacy_options: Empty,
    #[serde(rename = "bien_type_id")]
    bien_type_id: i32,
    options: QueryOptions,
}

#[derive(Debug, Clone, Serialize)]
struct Range {
    min: i64,
    max: i64,
}

impl Range {
    fn unbounded() -> Self {
        Self { min: 0, max: -1 }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct SqlQuery {
    id: u32,
    dossier_id: Option<Vec<ListingId>>,
    mandat_ids: Option<Vec<u64>>,
    order_by: Empty,
    limit: u32,
    offset: u32,
    ignore_dossier_ids: Vec<ListingId>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct HashFieldDic {
    #[serde(rename = "where")]
    where_key: &'static str,
    want_occupe: &'static str,
    want_libre: &'static str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryOptions {
    force_count: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
struct Empty {}

impl ListingQuery {
    /// Query for exactly one listing.
    pub fn for_listing(id: ListingId) -> Self {
        Self {
            want_libre: false,
            want_occupe: false,
            want_a_terme: false,
            bouquet: Range::unbounded(),
            rente: Range::unbounded(),
            where_clauses: Vec::new(),
            sql_query: SqlQuery {
                id: 0,
                dossier_id: Some(vec![id]),
                mandat_ids: None,
                order_by: Empty::default(),
                limit: PAGE_LIMIT,
                offset: 0,
                ignore_dossier_ids: Vec::new(),
            },
            hash_field_dic: HashFieldDic {
                where_key: "w",
                want_occupe: "o",
                want_libre: "l",
            },
            get_labels_for: None,
            is_extended_search: false,
            is_fully_extended_search: false,
            legacy_options: Empty::default(),
            bien_type_id: -1,
            options: QueryOptions { force_count: true },
        }
    }

    pub fn to_value(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }

    /// Listing identifiers a query body asks for.
    #[cfg(test)]
    pub fn requested_ids(body: &Value) -> Vec<ListingId> {
        body.pointer("/sqlQuery/dossierId")
            .and_then(Value::as_array)
            .map(|ids| {
                ids.iter()
                    .filter_map(Value::as_u64)
                    .map(ListingId)
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_single_listing_body_shape() {
        let body = ListingQuery::for_listing(ListingId(1234)).to_value().unwrap();

        assert_eq!(body["sqlQuery"]["dossierId"], json!([1234]));
        assert_eq!(body["sqlQuery"]["ignoreDossierIds"], json!([]));
        assert_eq!(body["sqlQuery"]["mandatIds"], Value::Null);
        assert_eq!(body["sqlQuery"]["limit"], 50);
        assert_eq!(body["bouquet"], json!({ "min": 0, "max": -1 }));
        assert_eq!(body["where"], json!([]));
        assert_eq!(
            body["_hashFieldDic"],
            json!({ "where": "w", "wantOccupe": "o", "wantLibre": "l" })
        );
        assert_eq!(body["wantATerme"], false);
        assert_eq!(body["Options"], json!({}));
        assert_eq!(body["bien_type_id"], -1);
        assert_eq!(body["options"]["forceCount"], true);
        assert_eq!(body["getLabelsFor"], Value::Null);
    }

    #[test]
    fn test_requested_ids_round_trip() {
        let body = ListingQuery::for_listing(ListingId(9)).to_value().unwrap();
        assert_eq!(ListingQuery::requested_ids(&body), vec![ListingId(9)]);
        assert!(ListingQuery::requested_ids(&json!({})).is_empty());
    }
}
