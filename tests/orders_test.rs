//! Integration tests for the order lifecycle over HTTP.

mod common;

use std::sync::atomic::Ordering;

use common::{payload, signature_for, TestHarness};
use rp_core::config::Config;
use rp_core::Role;
use serde_json::{json, Value};

fn client() -> reqwest::Client {
    reqwest::Client::new()
}

async fn create_order(addr: &std::net::SocketAddr, token: &str, asset_id: &str) -> reqwest::Response {
    client()
        .post(format!("http://{addr}/api/orders"))
        .bearer_auth(token)
        .json(&json!({ "asset_id": asset_id }))
        .send()
        .await
        .unwrap()
}

async fn confirm(addr: &std::net::SocketAddr, token: &str, body: Value) -> reqwest::Response {
    client()
        .post(format!("http://{addr}/api/orders/confirm"))
        .bearer_auth(token)
        .json(&body)
        .send()
        .await
        .unwrap()
}

#[tokio::test]
async fn checkout_then_confirm_unlocks_streaming() {
    let (h, addr) = TestHarness::with_server().await;
    let (_buyer, tok) = h.create_user("buyer", Role::User);
    let asset = h.create_asset("film.mp4", 499, &payload(2048));
    let asset_id = asset.id.to_string();

    let access_url = format!("http://{addr}/api/access/{asset_id}");
    let before: Value = client()
        .get(&access_url)
        .bearer_auth(&tok)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(before["access"], false);

    let resp = create_order(&addr, &tok, &asset_id).await;
    assert_eq!(resp.status(), 201);
    let checkout: Value = resp.json().await.unwrap();
    assert_eq!(checkout["gateway_order"]["amount"], 49_900);
    assert_eq!(checkout["gateway_order"]["currency"], "INR");
    assert_eq!(checkout["asset"]["price"], 499);
    let order_id = checkout["order_id"].as_str().unwrap().to_string();
    let gateway_order_id = checkout["gateway_order"]["id"].as_str().unwrap().to_string();

    let pending: Value = client()
        .get(format!("http://{addr}/api/orders/{order_id}"))
        .bearer_auth(&tok)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(pending["status"], "pending");
    assert_eq!(pending["amount"], 499);

    let resp = confirm(
        &addr,
        &tok,
        json!({
            "asset_id": asset_id,
            "payment_ref": "pay_001",
            "gateway_order_id": gateway_order_id,
            "signature": signature_for(&gateway_order_id, "pay_001"),
        }),
    )
    .await;
    assert_eq!(resp.status(), 200);
    let paid: Value = resp.json().await.unwrap();
    assert_eq!(paid["id"], order_id.as_str());
    assert_eq!(paid["status"], "paid");
    assert_eq!(paid["payment_ref"], "pay_001");
    assert!(paid["paid_at"].is_string());

    let after: Value = client()
        .get(&access_url)
        .bearer_auth(&tok)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(after["access"], true);

    let resp = client()
        .get(format!("http://{addr}/api/stream/{asset_id}"))
        .bearer_auth(&tok)
        .header("Range", "bytes=0-15")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 206);
}

#[tokio::test]
async fn confirm_retry_is_idempotent_and_reference_is_not_transferable() {
    let (h, addr) = TestHarness::with_server().await;
    let (_a, tok_a) = h.create_user("alice", Role::User);
    let (_b, tok_b) = h.create_user("bob", Role::User);
    let asset = h.create_asset("film.mp4", 100, &payload(10));
    let asset_id = asset.id.to_string();

    let checkout: Value = create_order(&addr, &tok_a, &asset_id).await.json().await.unwrap();
    let gid = checkout["gateway_order"]["id"].as_str().unwrap();

    let body = json!({
        "asset_id": asset_id,
        "payment_ref": "pay_dup",
        "gateway_order_id": gid,
        "signature": signature_for(gid, "pay_dup"),
    });

    let first: Value = confirm(&addr, &tok_a, body.clone()).await.json().await.unwrap();
    let resp = confirm(&addr, &tok_a, body.clone()).await;
    assert_eq!(resp.status(), 200);
    let second: Value = resp.json().await.unwrap();
    assert_eq!(first["id"], second["id"]);

    let list: Value = client()
        .get(format!("http://{addr}/api/orders"))
        .bearer_auth(&tok_a)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(list.as_array().unwrap().len(), 1);

    let resp = confirm(&addr, &tok_b, body).await;
    assert_eq!(resp.status(), 409);
    let err: Value = resp.json().await.unwrap();
    assert_eq!(err["code"], "conflict");
}

#[tokio::test]
async fn confirm_rejects_missing_reference_and_bad_signature() {
    let (h, addr) = TestHarness::with_server().await;
    let (_u, tok) = h.create_user("buyer", Role::User);
    let asset = h.create_asset("film.mp4", 100, &payload(10));
    let asset_id = asset.id.to_string();

    let resp = confirm(&addr, &tok, json!({ "asset_id": asset_id, "payment_ref": "  " })).await;
    assert_eq!(resp.status(), 400);
    let err: Value = resp.json().await.unwrap();
    assert_eq!(err["code"], "missing_reference");

    let resp = confirm(
        &addr,
        &tok,
        json!({
            "asset_id": asset_id,
            "payment_ref": "pay_x",
            "gateway_order_id": "order_x",
            "signature": "00ff",
        }),
    )
    .await;
    assert_eq!(resp.status(), 401);
    let err: Value = resp.json().await.unwrap();
    assert_eq!(err["code"], "invalid_signature");

    let resp = confirm(&addr, &tok, json!({ "asset_id": asset_id, "payment_ref": "pay_y" })).await;
    assert_eq!(resp.status(), 401);

    let list: Value = client()
        .get(format!("http://{addr}/api/orders"))
        .bearer_auth(&tok)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(list.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn unsigned_confirm_allowed_when_policy_disables_signatures() {
    let mut config = Config::default();
    config.payment.require_signature = false;
    let (h, addr) = TestHarness::with_server_config(config).await;
    let (_u, tok) = h.create_user("buyer", Role::User);
    let asset = h.create_asset("film.mp4", 100, &payload(10));

    let resp = confirm(
        &addr,
        &tok,
        json!({ "asset_id": asset.id.to_string(), "payment_ref": "pay_plain" }),
    )
    .await;
    assert_eq!(resp.status(), 200);
    let paid: Value = resp.json().await.unwrap();
    assert_eq!(paid["status"], "paid");
    assert_eq!(paid["amount"], 100);
}

#[tokio::test]
async fn gateway_failure_is_502_and_writes_nothing() {
    let (h, addr) = TestHarness::with_server().await;
    let (_u, tok) = h.create_user("buyer", Role::User);
    let asset = h.create_asset("film.mp4", 100, &payload(10));
    h.gateway.fail.store(true, Ordering::SeqCst);

    let resp = create_order(&addr, &tok, &asset.id.to_string()).await;
    assert_eq!(resp.status(), 502);
    let err: Value = resp.json().await.unwrap();
    assert_eq!(err["code"], "gateway_error");
    assert_eq!(h.gateway.calls.load(Ordering::SeqCst), 1);

    let list: Value = client()
        .get(format!("http://{addr}/api/orders"))
        .bearer_auth(&tok)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(list.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn free_and_unknown_assets_cannot_be_checked_out() {
    let (h, addr) = TestHarness::with_server().await;
    let (_u, tok) = h.create_user("buyer", Role::User);
    let free = h.create_asset("free.mp4", 0, &payload(10));

    let resp = create_order(&addr, &tok, &free.id.to_string()).await;
    assert_eq!(resp.status(), 400);
    let err: Value = resp.json().await.unwrap();
    assert_eq!(err["code"], "invalid_amount");

    let resp = create_order(&addr, &tok, &rp_core::AssetId::new().to_string()).await;
    assert_eq!(resp.status(), 404);
    assert_eq!(h.gateway.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn cancel_pending_order_then_conflict() {
    let (h, addr) = TestHarness::with_server().await;
    let (_u, tok) = h.create_user("buyer", Role::User);
    let (_o, other_tok) = h.create_user("other", Role::User);
    let asset = h.create_asset("film.mp4", 100, &payload(10));

    let checkout: Value = create_order(&addr, &tok, &asset.id.to_string())
        .await
        .json()
        .await
        .unwrap();
    let order_id = checkout["order_id"].as_str().unwrap();
    let cancel_url = format!("http://{addr}/api/orders/{order_id}/cancel");

    let resp = client().post(&cancel_url).bearer_auth(&other_tok).send().await.unwrap();
    assert_eq!(resp.status(), 404);

    let resp = client().post(&cancel_url).bearer_auth(&tok).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    let cancelled: Value = resp.json().await.unwrap();
    assert_eq!(cancelled["status"], "failed");

    let resp = client().post(&cancel_url).bearer_auth(&tok).send().await.unwrap();
    assert_eq!(resp.status(), 409);
}

#[tokio::test]
async fn orders_are_visible_to_owner_and_admin_only() {
    let (h, addr) = TestHarness::with_server().await;
    let (_u, tok) = h.create_user("buyer", Role::User);
    let (_o, other_tok) = h.create_user("other", Role::User);
    let (_a, admin_tok) = h.create_user("root", Role::Admin);
    let asset = h.create_asset("film.mp4", 100, &payload(10));

    let checkout: Value = create_order(&addr, &tok, &asset.id.to_string())
        .await
        .json()
        .await
        .unwrap();
    let url = format!("http://{addr}/api/orders/{}", checkout["order_id"].as_str().unwrap());

    let status = |tok: String| {
        let url = url.clone();
        async move { client().get(&url).bearer_auth(tok).send().await.unwrap().status() }
    };
    assert_eq!(status(tok.clone()).await, 200);
    assert_eq!(status(admin_tok).await, 200);
    assert_eq!(status(other_tok).await, 404);

    let resp = client()
        .get(format!("http://{addr}/api/orders/garbage"))
        .bearer_auth(&tok)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn order_routes_are_rate_limited() {
    let mut config = Config::default();
    config.rate_limit.orders_per_minute = 2;
    let (h, addr) = TestHarness::with_server_config(config).await;
    let (_u, tok) = h.create_user("buyer", Role::User);

    let list = || async {
        client()
            .get(format!("http://{addr}/api/orders"))
            .bearer_auth(&tok)
            .send()
            .await
            .unwrap()
            .status()
    };

    assert_eq!(list().await, 200);
    assert_eq!(list().await, 200);
    assert_eq!(list().await, 429);

    // Streaming and access checks do not draw from the order quota.
    let asset = h.create_asset("film.mp4", 100, &payload(10));
    let resp = client()
        .get(format!("http://{addr}/api/access/{}", asset.id))
        .bearer_auth(&tok)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn order_routes_require_authentication() {
    let (_h, addr) = TestHarness::with_server().await;
    let resp = client()
        .post(format!("http://{addr}/api/orders"))
        .json(&json!({ "asset_id": rp_core::AssetId::new().to_string() }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
}

#[tokio::test]
async fn foreign_checkout_cannot_be_confirmed_for_another_asset() {
    let (h, addr) = TestHarness::with_server().await;
    let (_a, tok_a) = h.create_user("user42", Role::User);
    let (_b, tok_b) = h.create_user("user99", Role::User);
    let cheap = h.create_asset("cheap.mp4", 1, &payload(10));
    let pricey = h.create_asset("pricey.mp4", 500, &payload(10));

    let checkout: Value = create_order(&addr, &tok_a, &cheap.id.to_string())
        .await
        .json()
        .await
        .unwrap();
    let gid = checkout["gateway_order"]["id"].as_str().unwrap();

    let resp = confirm(
        &addr,
        &tok_b,
        json!({
            "asset_id": pricey.id.to_string(),
            "payment_ref": "pay_taken",
            "gateway_order_id": gid,
            "signature": signature_for(gid, "pay_taken"),
        }),
    )
    .await;
    assert_eq!(resp.status(), 409);

    let resp = client()
        .get(format!("http://{addr}/api/stream/{}", pricey.id))
        .bearer_auth(&tok_b)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);
}
