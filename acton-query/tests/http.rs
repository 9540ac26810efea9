//! End-to-end tests: axum router, extractor, in-memory store and envelope

use acton_query::prelude::*;
use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use tower::ServiceExt;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Product {
    id: i64,
    name: String,
    status: String,
}

impl Record for Product {
    fn field(&self, name: &str) -> Option<FilterValue> {
        match name {
            "id" => Some(self.id.into()),
            "name" => Some(self.name.as_str().into()),
            "status" => Some(self.status.as_str().into()),
            _ => None,
        }
    }
}

impl Identifiable for Product {
    fn id(&self) -> i64 {
        self.id
    }
}

fn product(id: i64, name: String, status: &str) -> Product {
    Product {
        id,
        name,
        status: status.to_string(),
    }
}

/// 25 active rows containing "foo", plus rows that fail one criterion each
fn catalog() -> MemoryStore<Product> {
    let mut rows: Vec<Product> = (1..=25)
        .map(|id| product(id, format!("foo widget {id:02}"), "active"))
        .collect();
    rows.extend((26..=30).map(|id| product(id, format!("foo gadget {id}"), "archived")));
    rows.extend((31..=35).map(|id| product(id, format!("plain bar {id}"), "active")));
    MemoryStore::new(rows)
}

fn products_query() -> QueryBuilder {
    QueryBuilder::default()
        .with_filter_fields(["id", "status", "name"])
        .with_sort_fields(["id", "name"])
        .with_searchable_columns(["name"])
        .with_default_sort([SortField::asc("id")])
}

async fn list_products(
    State(store): State<MemoryStore<Product>>,
    request: QueryRequest,
) -> QueryResult<Product> {
    products_query()
        .execute(store, &request)
        .await
        .unwrap_or_else(|never| match never {})
}

fn app() -> Router {
    Router::new()
        .route("/api/products", get(list_products))
        .with_state(catalog())
}

async fn get_json(uri: &str) -> QueryResult<Product> {
    let response = app()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn test_offset_page_with_filter_sort_and_search() {
    let result = get_json(
        "/api/products?type=offset&page=2&page_size=10&sort=-name&status%5Beq%5D=active&search=foo",
    )
    .await;

    let pagination = result.pagination.offset().unwrap();
    assert_eq!(pagination.page, 2);
    assert_eq!(pagination.page_size, 10);
    assert_eq!(pagination.total_items, 25);
    assert_eq!(pagination.total_pages, 3);
    assert!(pagination.has_next_page);
    assert!(pagination.has_prev_page);

    assert_eq!(result.data.len(), 10);
    assert_eq!(result.data[0].name, "foo widget 15");
    assert_eq!(result.data[9].name, "foo widget 06");

    let next = result.links.next.unwrap();
    assert!(next.contains("page=3"));
    assert!(next.contains("sort=-name"));
    assert!(next.contains("status%5Beq%5D=active"));
    assert!(next.contains("search=foo"));
    assert_eq!(
        next,
        "/api/products?sort=-name&status%5Beq%5D=active&search=foo&page_size=10&page=3"
    );
    assert!(result.links.prev.unwrap().ends_with("page=1"));
    assert!(result.links.last.unwrap().ends_with("page=3"));
}

#[tokio::test]
async fn test_non_whitelisted_filter_is_echoed_but_not_executed() {
    let result = get_json("/api/products?password%5Beq%5D=hunter2&page_size=5").await;

    assert_eq!(result.pagination.offset().unwrap().total_items, 35);
    assert_eq!(result.data.len(), 5);
    assert_eq!(result.applied_filters.len(), 1);
    assert_eq!(result.applied_filters[0].field, "password");
}

#[tokio::test]
async fn test_cursor_pages_follow_next_link() {
    let first = get_json("/api/products?type=cursor&page_size=10&sort=id&status%5Beq%5D=active").await;

    let meta = first.pagination.cursor().unwrap();
    assert!(meta.has_next_page);
    assert!(!meta.has_prev_page);
    assert_eq!(meta.count, 10);
    assert_eq!(first.data.last().map(|p| p.id), Some(10));
    assert!(first.links.first.is_none());

    let second = get_json(&first.links.next.unwrap()).await;
    let ids: Vec<i64> = second.data.iter().map(|p| p.id).collect();
    assert_eq!(ids, (11..=20).collect::<Vec<_>>());
    assert!(second.pagination.cursor().unwrap().has_prev_page);
}

#[tokio::test]
async fn test_malformed_cursor_restarts_from_first_row() {
    let result = get_json("/api/products?type=cursor&cursor=not-base64%21%21&page_size=5").await;
    assert_eq!(result.data.first().map(|p| p.id), Some(1));
    assert_eq!(result.data.len(), 5);
}

#[tokio::test]
async fn test_oversized_page_size_falls_back_to_default() {
    let result = get_json("/api/products?page_size=500").await;
    let pagination = result.pagination.offset().unwrap();
    assert_eq!(pagination.page_size, 20);
    assert_eq!(pagination.total_pages, 2);
    assert_eq!(result.data.len(), 20);
}

#[tokio::test]
async fn test_in_and_between_filters() {
    let result =
        get_json("/api/products?id%5Bbetween%5D=5&id%5Bbetween%5D=9&status%5Bin%5D=active,archived")
            .await;
    let ids: Vec<i64> = result.data.iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![5, 6, 7, 8, 9]);
}
