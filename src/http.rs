//! HTTP API for the stock-count ledger
//!
//! ## Sessions
//! - `GET /sessions` - sessions visible to the caller
//! - `POST /sessions` - create `{name, assignees?}`
//! - `GET /sessions/{id}`, `DELETE /sessions/{id}`
//! - `POST /sessions/{id}/complete`
//! - `GET /sessions/{id}/assignments`
//! - `GET|PUT /sessions/{id}/shops/{shop}/counts`
//! - `GET /sessions/{id}/export`, `GET /sessions/{id}/export.zip`
//!
//! ## Catalog
//! - `GET|POST /shops`, `DELETE /shops/{id}`, `GET|PUT /shops/{id}/items`
//! - `GET|POST /categories`
//! - `GET|POST /items`, `DELETE /items/{id}`
//! - `POST|DELETE /employees/{user}/shops/{shop}`
//! - `POST /import/items` - CSV (`text/csv`) or JSON `{rows: [...]}`
//!
//! ## Service
//! - `GET /health` - liveness, no auth
//! - `GET /stats` - row counts for the caller's tenant (managers)
//!
//! Every route except `/health` needs `Authorization: Bearer <jwt>`. In dev
//! mode `X-User-Id`, `X-User-Role` and `X-Tenant-Id` headers are accepted
//! instead.
//!
//! ## Example Usage
//!
//! ```bash
//! curl -X PUT -H "Authorization: Bearer $TOKEN" \
//!      -d '{"entries":[{"itemId":"...","boxes":3,"singles":0}]}' \
//!      http://localhost:8095/sessions/$SESSION/shops/$SHOP/counts
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::{BodyExt, Full, Limited};
use hyper::body::Body;
use hyper::header::{HeaderMap, AUTHORIZATION, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response};
use hyper_util::rt::TokioIo;
use serde::de::DeserializeOwned;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use crate::auth::{authorize, extract_token_from_header, Actor, JwtValidator, Role};
use crate::db::TenantContext;
use crate::error::LedgerError;
use crate::services::count_service::CountEntry;
use crate::services::import_service::ImportRow;
use crate::services::{
    attachment_response, created, error_response, method_not_allowed, no_content, not_found, ok,
    HandlerResult, Services,
};
use crate::views::{
    AssignmentView, CategoryView, CreateCategoryInputView, CreateItemInputView,
    CreateSessionInputView, CreateShopInputView, CreatedSessionView, HealthView,
    ImportItemsInputView, ImportResultView, ItemView, SaveCountsInputView, SessionView,
    SetShopItemsInputView, ShopView, StatsView, StockCountView, WorkbookView,
};

/// Largest accepted request body
const MAX_BODY_BYTES: usize = 8 * 1024 * 1024;

/// A parsed request target
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Health,
    Stats,
    ListSessions,
    CreateSession,
    GetSession(String),
    DeleteSession(String),
    CompleteSession(String),
    ListAssignments(String),
    GetCounts { session_id: String, shop_id: String },
    SaveCounts { session_id: String, shop_id: String },
    ExportSession(String),
    ExportSessionZip(String),
    ListShops,
    CreateShop,
    DeleteShop(String),
    ListShopItems(String),
    SetShopItems(String),
    ListCategories,
    CreateCategory,
    ListItems,
    CreateItem,
    DeleteItem(String),
    AssignEmployeeShop { user_id: String, shop_id: String },
    UnassignEmployeeShop { user_id: String, shop_id: String },
    ImportItems,
}

impl Route {
    /// Match a method and path; None when nothing is routed there
    pub fn parse(method: &Method, path: &str) -> Option<Route> {
        let segments: Vec<&str> = path.trim_matches('/').split('/').collect();

        let route = match (method, segments.as_slice()) {
            (&Method::GET, ["health"]) => Route::Health,
            (&Method::GET, ["stats"]) => Route::Stats,

            (&Method::GET, ["sessions"]) => Route::ListSessions,
            (&Method::POST, ["sessions"]) => Route::CreateSession,
            (&Method::GET, ["sessions", s]) => Route::GetSession(s.to_string()),
            (&Method::DELETE, ["sessions", s]) => Route::DeleteSession(s.to_string()),
            (&Method::POST, ["sessions", s, "complete"]) => Route::CompleteSession(s.to_string()),
            (&Method::GET, ["sessions", s, "assignments"]) => Route::ListAssignments(s.to_string()),
            (&Method::GET, ["sessions", s, "export"]) => Route::ExportSession(s.to_string()),
            (&Method::GET, ["sessions", s, "export.zip"]) => Route::ExportSessionZip(s.to_string()),
            (&Method::GET, ["sessions", s, "shops", shop, "counts"]) => Route::GetCounts {
                session_id: s.to_string(),
                shop_id: shop.to_string(),
            },
            (&Method::PUT, ["sessions", s, "shops", shop, "counts"]) => Route::SaveCounts {
                session_id: s.to_string(),
                shop_id: shop.to_string(),
            },

            (&Method::GET, ["shops"]) => Route::ListShops,
            (&Method::POST, ["shops"]) => Route::CreateShop,
            (&Method::DELETE, ["shops", s]) => Route::DeleteShop(s.to_string()),
            (&Method::GET, ["shops", s, "items"]) => Route::ListShopItems(s.to_string()),
            (&Method::PUT, ["shops", s, "items"]) => Route::SetShopItems(s.to_string()),

            (&Method::GET, ["categories"]) => Route::ListCategories,
            (&Method::POST, ["categories"]) => Route::CreateCategory,

            (&Method::GET, ["items"]) => Route::ListItems,
            (&Method::POST, ["items"]) => Route::CreateItem,
            (&Method::DELETE, ["items", s]) => Route::DeleteItem(s.to_string()),

            (&Method::POST, ["employees", user, "shops", shop]) => Route::AssignEmployeeShop {
                user_id: user.to_string(),
                shop_id: shop.to_string(),
            },
            (&Method::DELETE, ["employees", user, "shops", shop]) => Route::UnassignEmployeeShop {
                user_id: user.to_string(),
                shop_id: shop.to_string(),
            },

            (&Method::POST, ["import", "items"]) => Route::ImportItems,

            _ => return None,
        };

        // Empty segments ("/sessions//complete") never name a resource
        if segments.iter().any(|s| s.is_empty()) {
            return None;
        }

        Some(route)
    }
}

/// Run blocking database work off the async executor
async fn blocking<T, F>(f: F) -> Result<T, LedgerError>
where
    F: FnOnce() -> Result<T, LedgerError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| LedgerError::Internal(format!("Blocking task failed: {}", e)))?
}

async fn read_body<B>(req: Request<B>) -> Result<Bytes, LedgerError>
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    Ok(Limited::new(req.into_body(), MAX_BODY_BYTES)
        .collect()
        .await
        .map_err(|e| LedgerError::InvalidInput(format!("Failed to read request body: {}", e)))?
        .to_bytes())
}

async fn read_json<T, B>(req: Request<B>) -> Result<T, LedgerError>
where
    T: DeserializeOwned,
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let body = read_body(req).await?;
    Ok(serde_json::from_slice(&body)?)
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

fn list_view<T, V: From<T>>(rows: Vec<T>) -> Vec<V> {
    rows.into_iter().map(V::from).collect()
}

/// HTTP server state
pub struct HttpServer {
    services: Arc<Services>,
    jwt: JwtValidator,
    dev_mode: bool,
    bind_addr: SocketAddr,
}

impl HttpServer {
    /// Create a new HTTP server
    pub fn new(services: Arc<Services>, jwt: JwtValidator, bind_addr: SocketAddr) -> Self {
        Self {
            services,
            jwt,
            dev_mode: false,
            bind_addr,
        }
    }

    /// Accept identity headers in place of bearer tokens
    pub fn with_dev_mode(mut self, dev_mode: bool) -> Self {
        self.dev_mode = dev_mode;
        self
    }

    /// Run the HTTP server
    pub async fn run(self: Arc<Self>) -> Result<(), LedgerError> {
        let listener = TcpListener::bind(self.bind_addr).await?;
        info!(addr = %self.bind_addr, dev_mode = self.dev_mode, "HTTP server listening");

        loop {
            let (stream, remote_addr) = listener.accept().await?;
            let io = TokioIo::new(stream);
            let server = self.clone();

            tokio::spawn(async move {
                let service = service_fn(move |req| {
                    let server = server.clone();
                    async move { Ok::<_, hyper::Error>(server.handle(req).await) }
                });

                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    warn!(addr = %remote_addr, error = %err, "Connection error");
                }
            });
        }
    }

    /// Resolve the acting user from the request headers
    fn authenticate(&self, headers: &HeaderMap) -> Result<Actor, LedgerError> {
        let auth = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok());
        if let Some(token) = extract_token_from_header(auth) {
            return self.jwt.authenticate(token);
        }

        if self.dev_mode {
            if let Some(user_id) = header_str(headers, "x-user-id") {
                let role: Role = header_str(headers, "x-user-role")
                    .unwrap_or("employee")
                    .parse()?;
                let tenant = header_str(headers, "x-tenant-id")
                    .map(TenantContext::new)
                    .unwrap_or_default();
                return Ok(Actor::new(user_id, role, tenant));
            }
        }

        Err(LedgerError::Unauthenticated("Missing bearer token".into()))
    }

    /// Route one request and turn any error into a JSON error response
    pub async fn handle<B>(&self, req: Request<B>) -> Response<Full<Bytes>>
    where
        B: Body<Data = Bytes>,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let method = req.method().clone();
        let path = req.uri().path().to_string();

        debug!(method = %method, path = %path, "Incoming request");

        let Some(route) = Route::parse(&method, &path) else {
            let path_known = [Method::GET, Method::POST, Method::PUT, Method::DELETE]
                .iter()
                .any(|m| Route::parse(m, &path).is_some());
            return if path_known {
                method_not_allowed()
            } else {
                not_found("Route not found")
            };
        };

        match self.dispatch(route, req).await {
            Ok(response) => response,
            Err(e) => {
                debug!(method = %method, path = %path, code = e.code(), "Request rejected");
                error_response(e)
            }
        }
    }

    async fn dispatch<B>(&self, route: Route, req: Request<B>) -> HandlerResult
    where
        B: Body<Data = Bytes>,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        if route == Route::Health {
            return self.handle_health().await;
        }

        let actor = self.authenticate(req.headers())?;
        let services = self.services.clone();

        match route {
            Route::Health => self.handle_health().await,
            Route::Stats => {
                let stats = blocking(move || {
                    authorize(&actor, "read_stats")?;
                    services.db.stats(actor.ctx())
                })
                .await?;
                Ok(ok(&StatsView::from(stats)))
            }

            // Sessions
            Route::ListSessions => {
                let rows = blocking(move || services.sessions.visible_sessions(&actor)).await?;
                Ok(ok(&list_view::<_, SessionView>(rows)))
            }
            Route::CreateSession => {
                let input: CreateSessionInputView = read_json(req).await?;
                let result = blocking(move || {
                    services.sessions.create(&actor, &input.name, &input.assignees)
                })
                .await?;
                Ok(created(&CreatedSessionView::from(result)))
            }
            Route::GetSession(id) => {
                let session = blocking(move || services.sessions.get(&actor, &id)).await?;
                Ok(ok(&SessionView::from(session)))
            }
            Route::CompleteSession(id) => {
                let session = blocking(move || services.sessions.complete(&actor, &id)).await?;
                Ok(ok(&SessionView::from(session)))
            }
            Route::DeleteSession(id) => {
                blocking(move || services.sessions.delete(&actor, &id)).await?;
                Ok(no_content())
            }
            Route::ListAssignments(id) => {
                let rows = blocking(move || services.sessions.list_assignments(&actor, &id)).await?;
                Ok(ok(&list_view::<_, AssignmentView>(rows)))
            }

            // Counts
            Route::GetCounts { session_id, shop_id } => {
                let rows = blocking(move || {
                    services.counts.counts_for_shop(&actor, &session_id, &shop_id)
                })
                .await?;
                Ok(ok(&list_view::<_, StockCountView>(rows)))
            }
            Route::SaveCounts { session_id, shop_id } => {
                let input: SaveCountsInputView = read_json(req).await?;
                let entries: Vec<CountEntry> = input.entries.into_iter().map(Into::into).collect();
                let rows = blocking(move || {
                    services.counts.save_counts(&actor, &session_id, &shop_id, &entries)
                })
                .await?;
                Ok(ok(&list_view::<_, StockCountView>(rows)))
            }

            // Export
            Route::ExportSession(id) => {
                let workbook = blocking(move || services.export.workbook(&actor, &id)).await?;
                Ok(ok(&WorkbookView::from(workbook)))
            }
            Route::ExportSessionZip(id) => {
                let (file_name, bytes) =
                    blocking(move || services.export.archive(&actor, &id)).await?;
                Ok(attachment_response("application/zip", &file_name, bytes))
            }

            // Shops
            Route::ListShops => {
                let rows = blocking(move || services.counts.visible_shops(&actor)).await?;
                Ok(ok(&list_view::<_, ShopView>(rows)))
            }
            Route::CreateShop => {
                let input: CreateShopInputView = read_json(req).await?;
                let shop =
                    blocking(move || services.catalog.create_shop(&actor, input.into())).await?;
                Ok(created(&ShopView::from(shop)))
            }
            Route::DeleteShop(id) => {
                let deleted = blocking(move || services.catalog.delete_shop(&actor, &id)).await?;
                Ok(if deleted { no_content() } else { not_found("Shop not found") })
            }
            Route::ListShopItems(shop_id) => {
                let rows =
                    blocking(move || services.counts.items_for_shop(&actor, &shop_id)).await?;
                Ok(ok(&list_view::<_, ItemView>(rows)))
            }
            Route::SetShopItems(shop_id) => {
                let input: SetShopItemsInputView = read_json(req).await?;
                let response_shop_id = shop_id.clone();
                let item_ids = blocking(move || {
                    services.catalog.set_shop_items(&actor, &shop_id, &input.item_ids)
                })
                .await?;
                Ok(ok(&serde_json::json!({
                    "shopId": response_shop_id,
                    "itemIds": item_ids,
                })))
            }

            // Categories and items
            Route::ListCategories => {
                let rows = blocking(move || services.catalog.list_categories(&actor)).await?;
                Ok(ok(&list_view::<_, CategoryView>(rows)))
            }
            Route::CreateCategory => {
                let input: CreateCategoryInputView = read_json(req).await?;
                let category =
                    blocking(move || services.catalog.create_category(&actor, input.into())).await?;
                Ok(created(&CategoryView::from(category)))
            }
            Route::ListItems => {
                let rows = blocking(move || services.catalog.list_items(&actor)).await?;
                Ok(ok(&list_view::<_, ItemView>(rows)))
            }
            Route::CreateItem => {
                let input: CreateItemInputView = read_json(req).await?;
                let item =
                    blocking(move || services.catalog.create_item(&actor, input.into())).await?;
                Ok(created(&ItemView::from(item)))
            }
            Route::DeleteItem(id) => {
                let deleted = blocking(move || services.catalog.delete_item(&actor, &id)).await?;
                Ok(if deleted { no_content() } else { not_found("Item not found") })
            }

            // Employee shop assignments
            Route::AssignEmployeeShop { user_id, shop_id } => {
                let body = serde_json::json!({ "userId": user_id, "shopId": shop_id });
                let added = blocking(move || {
                    services.catalog.assign_employee_shop(&actor, &user_id, &shop_id)
                })
                .await?;
                Ok(if added { created(&body) } else { ok(&body) })
            }
            Route::UnassignEmployeeShop { user_id, shop_id } => {
                let removed = blocking(move || {
                    services.catalog.unassign_employee_shop(&actor, &user_id, &shop_id)
                })
                .await?;
                Ok(if removed { no_content() } else { not_found("Assignment not found") })
            }

            // Import
            Route::ImportItems => {
                let is_csv = header_str(req.headers(), CONTENT_TYPE.as_str())
                    .map(|ct| {
                        let ct = ct.to_ascii_lowercase();
                        ct.starts_with("text/csv") || ct.starts_with("text/plain")
                    })
                    .unwrap_or(false);
                let body = read_body(req).await?;

                let result = if is_csv {
                    let text = String::from_utf8(body.to_vec())
                        .map_err(|_| LedgerError::InvalidInput("CSV body is not UTF-8".into()))?;
                    blocking(move || services.import.import_csv(&actor, &text)).await?
                } else {
                    let input: ImportItemsInputView = serde_json::from_slice(&body)?;
                    let rows: Vec<ImportRow> = input.rows.into_iter().map(Into::into).collect();
                    blocking(move || services.import.import_rows(&actor, rows)).await?
                };
                Ok(ok(&ImportResultView::from(result)))
            }
        }
    }

    /// Liveness only; per-tenant figures live behind `/stats`
    async fn handle_health(&self) -> HandlerResult {
        let services = self.services.clone();
        blocking(move || services.db.conn().map(drop)).await?;
        Ok(ok(&HealthView::alive()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_parse() {
        assert_eq!(Route::parse(&Method::GET, "/health"), Some(Route::Health));
        assert_eq!(Route::parse(&Method::GET, "/stats"), Some(Route::Stats));
        assert_eq!(
            Route::parse(&Method::PUT, "/sessions/s1/shops/h1/counts"),
            Some(Route::SaveCounts {
                session_id: "s1".into(),
                shop_id: "h1".into()
            })
        );
        assert_eq!(
            Route::parse(&Method::GET, "/sessions/s1/export.zip"),
            Some(Route::ExportSessionZip("s1".into()))
        );
        assert_eq!(
            Route::parse(&Method::DELETE, "/employees/emp-1/shops/h1"),
            Some(Route::UnassignEmployeeShop {
                user_id: "emp-1".into(),
                shop_id: "h1".into()
            })
        );
    }

    #[test]
    fn test_route_parse_rejects_unknown() {
        assert_eq!(Route::parse(&Method::PATCH, "/sessions"), None);
        assert_eq!(Route::parse(&Method::GET, "/sessions/s1/reopen"), None);
        assert_eq!(Route::parse(&Method::POST, "/sessions//complete"), None);
    }

    #[test]
    fn test_dev_headers_resolve_actor() {
        let services = Arc::new(Services::in_memory().unwrap());
        let server = HttpServer::new(services, JwtValidator::new_dev(), ([127, 0, 0, 1], 0).into())
            .with_dev_mode(true);

        let mut headers = HeaderMap::new();
        headers.insert("x-user-id", "mgr-1".parse().unwrap());
        headers.insert("x-user-role", "manager".parse().unwrap());
        headers.insert("x-tenant-id", "north".parse().unwrap());

        let actor = server.authenticate(&headers).unwrap();
        assert!(actor.is_manager());
        assert_eq!(actor.tenant.tenant_id(), "north");
    }

    #[test]
    fn test_identity_headers_ignored_outside_dev_mode() {
        let services = Arc::new(Services::in_memory().unwrap());
        let server = HttpServer::new(services, JwtValidator::new_dev(), ([127, 0, 0, 1], 0).into());

        let mut headers = HeaderMap::new();
        headers.insert("x-user-id", "mgr-1".parse().unwrap());
        assert!(matches!(
            server.authenticate(&headers),
            Err(LedgerError::Unauthenticated(_))
        ));
    }
}
