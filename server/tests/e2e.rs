use axum::{
    body::Body,
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        Method, Request, StatusCode,
    },
    Router,
};
use chrono::{Datelike, Utc};
use hmac::{Hmac, Mac};
use http_body_util::BodyExt;
use keur_cache::CacheClient;
use keur_config::AppConfig;
use keur_database::initialize_database;
use keur_gateway::{create_router, GatewayState};
use keur_notify::Mailer;
use serde_json::{json, Value};
use sha2::Sha256;
use sqlx::SqlitePool;
use tempfile::TempDir;
use tower::ServiceExt;

const STRIPE_SECRET: &str = "whsec_test";
const MASTER_KEY: &str = "test-master-key";
// hex(sha512(MASTER_KEY)), what PayDunya sends in the payload hash field.
const MASTER_HASH: &str = "1f242d13fca84cf537ff47cd47971de7ad6d4dd244340c5d53815cef06464f0a111ec5dfc692ec7eb68d4265f55af149a3776969c3a1faba695b6b1c36358ede";
const ADMIN_SECRET: &str = "admin-secret";

struct TestApp {
    router: Router,
    pool: SqlitePool,
    _db_dir: TempDir,
}

impl TestApp {
    async fn new() -> Self {
        let db_dir = TempDir::new().expect("create temp dir");
        let db_path = db_dir.path().join("keurimmo-test.db");

        let mut config = AppConfig::default();
        config.database.url = format!("sqlite://{}", db_path.to_string_lossy());
        config.database.max_connections = 5;
        config.stripe.webhook_secret = Some(STRIPE_SECRET.to_string());
        config.paydunya.master_key = Some(MASTER_KEY.to_string());
        config.admin.catch_up_secret = Some(ADMIN_SECRET.to_string());

        let pool = initialize_database(&config.database)
            .await
            .expect("initialize database");

        let cache = CacheClient::memory("e2e");
        let mailer = Mailer::new(&config.mail);

        let state = GatewayState::new(pool.clone(), cache, mailer, config);
        let router = create_router(state);

        Self {
            router,
            pool,
            _db_dir: db_dir,
        }
    }

    async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> TestResponse {
        let app = self.router.clone();
        let mut builder = Request::builder().method(method).uri(uri);

        if let Some(token) = token {
            builder = builder.header(AUTHORIZATION, format!("Bearer {}", token));
        }

        let body = if let Some(json_body) = body {
            let bytes = serde_json::to_vec(&json_body).expect("serialize request body");
            builder = builder.header(CONTENT_TYPE, "application/json");
            Body::from(bytes)
        } else {
            Body::empty()
        };

        let response = app
            .oneshot(builder.body(body).expect("build request"))
            .await
            .expect("dispatch request");

        TestResponse::read(response).await
    }

    /// Dispatch a request with a raw body and explicit headers, for the
    /// webhook endpoints that do their own verification.
    async fn raw_request(
        &self,
        method: Method,
        uri: &str,
        content_type: &str,
        body: Vec<u8>,
        extra_headers: &[(&str, &str)],
    ) -> TestResponse {
        let app = self.router.clone();
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(CONTENT_TYPE, content_type);
        for (name, value) in extra_headers {
            builder = builder.header(*name, *value);
        }

        let response = app
            .oneshot(builder.body(Body::from(body)).expect("build request"))
            .await
            .expect("dispatch request");

        TestResponse::read(response).await
    }

    /// Register an owner account and return (session token, team public id).
    async fn register_owner(&self, email: &str, team_name: &str) -> (String, String) {
        let response = self
            .request(
                Method::POST,
                "/api/auth/register",
                Some(json!({
                    "email": email,
                    "display_name": "Test Owner",
                    "team_name": team_name
                })),
                None,
            )
            .await;

        assert_eq!(response.status, StatusCode::CREATED, "{}", response.text);
        let token = response
            .json
            .get("token")
            .and_then(Value::as_str)
            .expect("session token")
            .to_string();
        let team_id = response
            .json
            .get("team_id")
            .and_then(Value::as_str)
            .expect("team public id")
            .to_string();
        (token, team_id)
    }

    /// Create a lease through the API and return its public id.
    async fn create_lease(&self, token: &str, tenant_name: &str, email: Option<&str>) -> String {
        let response = self
            .request(
                Method::POST,
                "/api/rentals/leases",
                Some(json!({
                    "tenantName": tenant_name,
                    "tenantEmail": email,
                    "propertyAddress": "Villa 12, Almadies, Dakar",
                    "monthlyAmount": 250_000,
                    "billingDay": 1,
                    "startDate": "2025-01-01"
                })),
                Some(token),
            )
            .await;

        assert_eq!(response.status, StatusCode::CREATED, "{}", response.text);
        response
            .json
            .get("id")
            .and_then(Value::as_str)
            .expect("lease public id")
            .to_string()
    }

    fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

struct TestResponse {
    status: StatusCode,
    text: String,
    json: Value,
}

impl TestResponse {
    async fn read(response: axum::response::Response) -> Self {
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("collect response body")
            .to_bytes();
        let text = String::from_utf8(bytes.to_vec()).unwrap_or_default();
        let json = if text.is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::Null)
        };
        Self { status, text, json }
    }
}

/// Sign a Stripe payload the way the CLI does: `t=<ts>,v1=<hmac>`.
fn stripe_signature(payload: &[u8], timestamp: i64) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(STRIPE_SECRET.as_bytes()).expect("hmac key");
    mac.update(format!("{}.", timestamp).as_bytes());
    mac.update(payload);
    format!("t={},v1={}", timestamp, hex::encode(mac.finalize().into_bytes()))
}

fn paydunya_form(data: &Value) -> Vec<u8> {
    format!("data={}", urlencoding::encode(&data.to_string())).into_bytes()
}

#[tokio::test]
async fn health_check_returns_ok() {
    let app = TestApp::new().await;

    let response = app.request(Method::GET, "/api/health", None, None).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(
        response.json.get("status").and_then(Value::as_str),
        Some("ok")
    );
    assert!(response
        .json
        .get("timestamp")
        .and_then(Value::as_str)
        .is_some());
}

#[tokio::test]
async fn register_me_logout_flow() {
    let app = TestApp::new().await;
    let (token, team_id) = app.register_owner("owner@agence.sn", "Agence Plateau").await;

    let me = app
        .request(Method::GET, "/api/auth/me", None, Some(&token))
        .await;
    assert_eq!(me.status, StatusCode::OK);
    assert_eq!(
        me.json
            .get("user")
            .and_then(|u| u.get("email"))
            .and_then(Value::as_str),
        Some("owner@agence.sn")
    );
    let teams = me.json.get("teams").and_then(Value::as_array).expect("teams");
    assert_eq!(teams.len(), 1);
    assert_eq!(
        teams[0].get("id").and_then(Value::as_str),
        Some(team_id.as_str())
    );

    let logout = app
        .request(Method::POST, "/api/auth/logout", None, Some(&token))
        .await;
    assert_eq!(logout.status, StatusCode::NO_CONTENT);

    let after = app
        .request(Method::GET, "/api/auth/me", None, Some(&token))
        .await;
    assert_eq!(after.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn duplicate_email_conflicts() {
    let app = TestApp::new().await;
    app.register_owner("owner@agence.sn", "Agence A").await;

    let response = app
        .request(
            Method::POST,
            "/api/auth/register",
            Some(json!({
                "email": "owner@agence.sn",
                "team_name": "Agence B"
            })),
            None,
        )
        .await;
    assert_eq!(response.status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn rentals_require_authentication() {
    let app = TestApp::new().await;

    let response = app
        .request(Method::GET, "/api/rentals/leases", None, None)
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn lease_creation_and_listing() {
    let app = TestApp::new().await;
    let (token, _) = app.register_owner("owner@agence.sn", "Agence Plateau").await;

    let lease_id = app.create_lease(&token, "Awa Diop", None).await;

    let list = app
        .request(Method::GET, "/api/rentals/leases", None, Some(&token))
        .await;
    assert_eq!(list.status, StatusCode::OK);
    let leases = list.json.as_array().expect("lease array");
    assert_eq!(leases.len(), 1);
    assert_eq!(
        leases[0].get("id").and_then(Value::as_str),
        Some(lease_id.as_str())
    );
    assert_eq!(
        leases[0].get("tenantName").and_then(Value::as_str),
        Some("Awa Diop")
    );

    let bad_filter = app
        .request(
            Method::GET,
            "/api/rentals/leases?status=archived",
            None,
            Some(&token),
        )
        .await;
    assert_eq!(bad_filter.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn stripe_webhook_rejects_bad_signature() {
    let app = TestApp::new().await;
    let payload = json!({"id": "evt_1", "type": "ping", "data": {"object": {}}});
    let body = serde_json::to_vec(&payload).unwrap();

    let missing = app
        .raw_request(
            Method::POST,
            "/api/webhooks/stripe/subscriptions",
            "application/json",
            body.clone(),
            &[],
        )
        .await;
    assert_eq!(missing.status, StatusCode::BAD_REQUEST);

    let forged = app
        .raw_request(
            Method::POST,
            "/api/webhooks/stripe/subscriptions",
            "application/json",
            body,
            &[("stripe-signature", "t=0,v1=deadbeef")],
        )
        .await;
    assert_eq!(forged.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn stripe_checkout_activates_subscription() {
    let app = TestApp::new().await;
    let (_token, team_id) = app.register_owner("owner@agence.sn", "Agence Plateau").await;

    let payload = json!({
        "id": "evt_checkout_1",
        "type": "checkout.session.completed",
        "data": {
            "object": {
                "mode": "subscription",
                "customer": "cus_123",
                "subscription": "sub_123",
                "metadata": {"team_id": team_id}
            }
        }
    });
    let body = serde_json::to_vec(&payload).unwrap();
    let signature = stripe_signature(&body, Utc::now().timestamp());

    let response = app
        .raw_request(
            Method::POST,
            "/api/webhooks/stripe/subscriptions",
            "application/json",
            body,
            &[("stripe-signature", signature.as_str())],
        )
        .await;
    assert_eq!(response.status, StatusCode::OK, "{}", response.text);
    assert_eq!(
        response.json.get("received").and_then(Value::as_bool),
        Some(true)
    );

    let (status, customer): (String, Option<String>) = sqlx::query_as(
        "SELECT subscription_status, stripe_customer_id FROM teams WHERE public_id = ?",
    )
    .bind(&team_id)
    .fetch_one(app.pool())
    .await
    .unwrap();
    assert_eq!(status, "active");
    assert_eq!(customer.as_deref(), Some("cus_123"));
}

#[tokio::test]
async fn paydunya_webhook_requires_hash() {
    let app = TestApp::new().await;

    let empty = app
        .raw_request(
            Method::POST,
            "/api/paydunya/webhook",
            "application/x-www-form-urlencoded",
            b"other=1".to_vec(),
            &[],
        )
        .await;
    assert_eq!(empty.status, StatusCode::BAD_REQUEST);

    let forged = json!({
        "hash": "0000",
        "invoice": {"token": "PDY-1", "status": "completed"}
    });
    let response = app
        .raw_request(
            Method::POST,
            "/api/paydunya/webhook",
            "application/x-www-form-urlencoded",
            paydunya_form(&forged),
            &[],
        )
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn paydunya_rent_settlement_is_idempotent() {
    let app = TestApp::new().await;
    let (token, _) = app.register_owner("owner@agence.sn", "Agence Plateau").await;
    let lease_public_id = app.create_lease(&token, "Awa Diop", None).await;

    // Generate the current period so there is a pending transaction.
    let generate = app
        .raw_request(
            Method::POST,
            "/api/admin/generate-monthly-rentals",
            "application/json",
            Vec::new(),
            &[("x-admin-secret", ADMIN_SECRET)],
        )
        .await;
    assert_eq!(generate.status, StatusCode::OK, "{}", generate.text);

    let lease_id: i64 = sqlx::query_scalar("SELECT id FROM leases WHERE public_id = ?")
        .bind(&lease_public_id)
        .fetch_one(app.pool())
        .await
        .unwrap();

    let now = Utc::now();
    let payload = json!({
        "hash": MASTER_HASH,
        "invoice": {
            "token": "PDY-TOKEN-1",
            "status": "completed",
            "total_amount": 250_000.0
        },
        "custom_data": {
            "type": "rent",
            "lease_id": lease_id,
            "period_month": now.month(),
            "period_year": now.year()
        }
    });

    let first = app
        .raw_request(
            Method::POST,
            "/api/paydunya/webhook",
            "application/x-www-form-urlencoded",
            paydunya_form(&payload),
            &[],
        )
        .await;
    assert_eq!(first.status, StatusCode::OK, "{}", first.text);

    let (status, amount_paid, payment_ref): (String, Option<i64>, Option<String>) =
        sqlx::query_as(
            "SELECT status, amount_paid, payment_ref FROM rental_transactions WHERE lease_id = ?",
        )
        .bind(lease_id)
        .fetch_one(app.pool())
        .await
        .unwrap();
    assert_eq!(status, "paid");
    assert_eq!(amount_paid, Some(250_000));
    assert_eq!(payment_ref.as_deref(), Some("PDY-TOKEN-1"));

    // Redelivery acknowledges without touching the settled row.
    let second = app
        .raw_request(
            Method::POST,
            "/api/paydunya/webhook",
            "application/x-www-form-urlencoded",
            paydunya_form(&payload),
            &[],
        )
        .await;
    assert_eq!(second.status, StatusCode::OK);

    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM rental_transactions WHERE status = 'paid'")
            .fetch_one(app.pool())
            .await
            .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn cache_metrics_endpoint_shape() {
    let app = TestApp::new().await;

    let response = app.request(Method::GET, "/api/cache-metrics", None, None).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(
        response.json.get("success").and_then(Value::as_bool),
        Some(true)
    );
    let metrics = response.json.get("metrics").expect("metrics object");
    for field in ["hits", "misses", "errors", "total", "hitRate", "avgLatency"] {
        assert!(metrics.get(field).is_some(), "missing metric field {field}");
    }
    assert!(response
        .json
        .get("timestamp")
        .and_then(Value::as_str)
        .is_some());
}

#[tokio::test]
async fn admin_routes_require_secret() {
    let app = TestApp::new().await;

    let unauthenticated = app
        .raw_request(
            Method::POST,
            "/api/admin/catch-up-ged",
            "application/json",
            Vec::new(),
            &[],
        )
        .await;
    assert_eq!(unauthenticated.status, StatusCode::UNAUTHORIZED);

    let wrong = app
        .raw_request(
            Method::POST,
            "/api/admin/catch-up-ged",
            "application/json",
            Vec::new(),
            &[("x-admin-secret", "nope")],
        )
        .await;
    assert_eq!(wrong.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn document_catch_up_backfills_contracts() {
    let app = TestApp::new().await;
    let (token, _) = app.register_owner("owner@agence.sn", "Agence Plateau").await;
    app.create_lease(&token, "Awa Diop", None).await;

    let first = app
        .raw_request(
            Method::POST,
            "/api/admin/catch-up-ged",
            "application/json",
            Vec::new(),
            &[("x-admin-secret", ADMIN_SECRET)],
        )
        .await;
    assert_eq!(first.status, StatusCode::OK, "{}", first.text);
    assert_eq!(
        first.json.get("leasesGenerated").and_then(Value::as_i64),
        Some(1)
    );

    let second = app
        .raw_request(
            Method::POST,
            "/api/admin/catch-up-ged",
            "application/json",
            Vec::new(),
            &[("x-admin-secret", ADMIN_SECRET)],
        )
        .await;
    assert_eq!(
        second.json.get("leasesProcessed").and_then(Value::as_i64),
        Some(0)
    );
}

#[tokio::test]
async fn magic_link_tenant_flow() {
    let app = TestApp::new().await;
    let (token, _) = app.register_owner("owner@agence.sn", "Agence Plateau").await;
    let lease_id = app
        .create_lease(&token, "Awa Diop", Some("awa@locataire.sn"))
        .await;

    let issued = app
        .request(
            Method::POST,
            &format!("/api/rentals/leases/{}/access-link", lease_id),
            None,
            Some(&token),
        )
        .await;
    assert_eq!(issued.status, StatusCode::OK, "{}", issued.text);
    let access_token = issued
        .json
        .get("token")
        .and_then(Value::as_str)
        .expect("access token")
        .to_string();

    let validated = app
        .request(
            Method::POST,
            "/api/tenant/validate",
            Some(json!({"token": access_token})),
            None,
        )
        .await;
    assert_eq!(validated.status, StatusCode::OK);
    assert_eq!(
        validated.json.get("tenantName").and_then(Value::as_str),
        Some("Awa Diop")
    );
    assert_eq!(
        validated.json.get("verified").and_then(Value::as_bool),
        Some(false)
    );

    let mismatch = app
        .request(
            Method::POST,
            "/api/tenant/verify",
            Some(json!({"token": access_token, "lastName": "Ndiaye"})),
            None,
        )
        .await;
    assert_eq!(mismatch.status, StatusCode::UNAUTHORIZED);

    let verified = app
        .request(
            Method::POST,
            "/api/tenant/verify",
            Some(json!({"token": access_token, "lastName": "Diop"})),
            None,
        )
        .await;
    assert_eq!(verified.status, StatusCode::OK, "{}", verified.text);
    let session_token = verified
        .json
        .get("sessionToken")
        .and_then(Value::as_str)
        .expect("session token")
        .to_string();

    let dashboard = app
        .request(Method::GET, "/api/tenant/dashboard", None, Some(&session_token))
        .await;
    assert_eq!(dashboard.status, StatusCode::OK, "{}", dashboard.text);
    assert_eq!(
        dashboard
            .json
            .get("lease")
            .and_then(|l| l.get("tenant_name"))
            .and_then(Value::as_str),
        Some("Awa Diop")
    );

    // Tenant sessions cannot reach owner endpoints.
    let forbidden = app
        .request(Method::GET, "/api/rentals/leases", None, Some(&session_token))
        .await;
    assert_eq!(forbidden.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn public_listing_and_lead_flow() {
    let app = TestApp::new().await;
    let (token, team_id) = app.register_owner("owner@agence.sn", "Agence Plateau").await;

    let published = app
        .request(
            Method::POST,
            "/api/properties",
            Some(json!({
                "title": "Appartement F3 Plateau",
                "price": 45_000_000,
                "city": "Dakar",
                "images": []
            })),
            Some(&token),
        )
        .await;
    assert_eq!(published.status, StatusCode::CREATED, "{}", published.text);
    let property_id = published
        .json
        .get("id")
        .and_then(Value::as_str)
        .expect("property public id")
        .to_string();

    // Pending listings are not browsable.
    let browse = app.request(Method::GET, "/api/properties", None, None).await;
    assert_eq!(browse.status, StatusCode::OK);
    assert_eq!(browse.json.as_array().map(Vec::len), Some(0));

    let moderated = app
        .raw_request(
            Method::POST,
            &format!("/api/admin/properties/{}/validate", property_id),
            "application/json",
            serde_json::to_vec(&json!({"decision": "verified"})).unwrap(),
            &[("x-admin-secret", ADMIN_SECRET)],
        )
        .await;
    assert_eq!(moderated.status, StatusCode::OK, "{}", moderated.text);

    let browse = app.request(Method::GET, "/api/properties", None, None).await;
    assert_eq!(browse.json.as_array().map(Vec::len), Some(1));

    let lead = app
        .request(
            Method::POST,
            "/api/leads",
            Some(json!({
                "teamId": team_id,
                "propertyId": property_id,
                "name": "Moussa Fall",
                "phone": "+221770000000",
                "message": "Je suis interesse par ce bien."
            })),
            None,
        )
        .await;
    assert_eq!(lead.status, StatusCode::CREATED, "{}", lead.text);
    let lead_id = lead
        .json
        .get("id")
        .and_then(Value::as_str)
        .expect("lead public id")
        .to_string();

    let listed = app.request(Method::GET, "/api/leads", None, Some(&token)).await;
    assert_eq!(listed.status, StatusCode::OK);
    assert_eq!(listed.json.as_array().map(Vec::len), Some(1));

    let advanced = app
        .request(
            Method::POST,
            &format!("/api/leads/{}/status", lead_id),
            Some(json!({"status": "contacte"})),
            Some(&token),
        )
        .await;
    assert_eq!(advanced.status, StatusCode::OK, "{}", advanced.text);
    assert_eq!(
        advanced.json.get("status").and_then(Value::as_str),
        Some("contacte")
    );

    // Leads only move forward, never back to new.
    let backwards = app
        .request(
            Method::POST,
            &format!("/api/leads/{}/status", lead_id),
            Some(json!({"status": "contacte"})),
            Some(&token),
        )
        .await;
    assert_eq!(backwards.status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn review_flow_with_cached_reads() {
    let app = TestApp::new().await;
    let (token, _) = app.register_owner("owner@agence.sn", "Agence Plateau").await;

    let published = app
        .request(
            Method::POST,
            "/api/properties",
            Some(json!({"title": "Villa Ngor", "price": 90_000_000, "images": []})),
            Some(&token),
        )
        .await;
    let property_id = published
        .json
        .get("id")
        .and_then(Value::as_str)
        .expect("property public id")
        .to_string();

    let empty = app
        .request(
            Method::GET,
            &format!("/api/properties/{}/reviews", property_id),
            None,
            None,
        )
        .await;
    assert_eq!(empty.status, StatusCode::OK);
    assert_eq!(empty.json.as_array().map(Vec::len), Some(0));

    let posted = app
        .request(
            Method::POST,
            &format!("/api/properties/{}/reviews", property_id),
            Some(json!({"authorName": "Fatou", "rating": 5, "comment": "Tres belle villa"})),
            None,
        )
        .await;
    assert_eq!(posted.status, StatusCode::CREATED, "{}", posted.text);

    // Posting invalidates the cached list, so the new review shows up.
    let after = app
        .request(
            Method::GET,
            &format!("/api/properties/{}/reviews", property_id),
            None,
            None,
        )
        .await;
    assert_eq!(after.json.as_array().map(Vec::len), Some(1));

    let out_of_range = app
        .request(
            Method::POST,
            &format!("/api/properties/{}/reviews", property_id),
            Some(json!({"authorName": "Fatou", "rating": 6})),
            None,
        )
        .await;
    assert_eq!(out_of_range.status, StatusCode::BAD_REQUEST);
}
