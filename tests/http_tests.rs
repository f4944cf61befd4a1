//! End-to-end HTTP flows over a live listener: guard redirects, signup and
//! login resolution, navigation actions and admin store management.

use ratestore::server::{build_router, AppState};
use serde_json::{json, Value};

const ADMIN_EMAIL: &str = "admin@ratestore.local";
const ADMIN_PASSWORD: &str = "Adm1n#Pass";

async fn spawn_server() -> String {
    let state = AppState::new();
    state.backend.seed_admin(ADMIN_EMAIL, ADMIN_PASSWORD).unwrap();
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn client() -> reqwest::Client {
    // Redirects are never followed so guard responses stay observable
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
}

fn session_cookie(resp: &reqwest::Response) -> String {
    let set = resp
        .headers()
        .get("set-cookie")
        .expect("set-cookie header")
        .to_str()
        .unwrap();
    set.split(';').next().unwrap().to_string()
}

async fn login(base: &str, http: &reqwest::Client, email: &str, password: &str) -> (String, Value) {
    let resp = http
        .post(format!("{base}/auth/login"))
        .json(&json!({"email": email, "password": password}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let cookie = session_cookie(&resp);
    let body: Value = resp.json().await.unwrap();
    (cookie, body)
}

async fn signup_user(base: &str, http: &reqwest::Client, name: &str, email: &str) {
    let resp = http
        .post(format!("{base}/auth/signup"))
        .json(&json!({
            "name": name,
            "email": email,
            "address": "12 Sample Street",
            "password": "Password#1",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
}

#[tokio::test]
async fn unauthenticated_dashboard_redirects_to_login() {
    let base = spawn_server().await;
    let http = client();

    let resp = http.get(format!("{base}/user/dashboard")).send().await.unwrap();
    assert_eq!(resp.status(), 303);
    assert_eq!(resp.headers().get("location").unwrap(), "/auth/login");
    // Replace semantics: the guarded page must not be revisitable from cache
    assert_eq!(resp.headers().get("cache-control").unwrap(), "no-store");
}

#[tokio::test]
async fn signup_then_login_resolves_user_role_and_actions() {
    let base = spawn_server().await;
    let http = client();

    signup_user(&base, &http, "Uma User", "uma@example.com").await;
    let (cookie, body) = login(&base, &http, "uma@example.com", "Password#1").await;
    assert_eq!(body["role"], "user");
    assert_eq!(body["redirect"], "/user/dashboard");

    let resp = http
        .get(format!("{base}/nav"))
        .header("Cookie", &cookie)
        .send()
        .await
        .unwrap();
    let nav: Value = resp.json().await.unwrap();
    assert_eq!(nav["role"], "user");
    assert_eq!(nav["session_active"], true);
    assert_eq!(nav["actions"], json!(["user-dashboard", "sign-out"]));

    let resp = http
        .get(format!("{base}/user/dashboard"))
        .header("Cookie", &cookie)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn anonymous_nav_shows_signin_and_signup() {
    let base = spawn_server().await;
    let http = client();

    let resp = http.get(format!("{base}/nav")).send().await.unwrap();
    let nav: Value = resp.json().await.unwrap();
    assert_eq!(nav["role"], "anonymous");
    assert_eq!(nav["session_active"], false);
    assert_eq!(nav["actions"], json!(["sign-in", "sign-up"]));
}

#[tokio::test]
async fn bad_credentials_surface_verbatim() {
    let base = spawn_server().await;
    let http = client();

    let resp = http
        .post(format!("{base}/auth/login"))
        .json(&json!({"email": "ghost@example.com", "password": "Password#1"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "Invalid login credentials");
}

#[tokio::test]
async fn signup_rejects_weak_password() {
    let base = spawn_server().await;
    let http = client();

    let resp = http
        .post(format!("{base}/auth/signup"))
        .json(&json!({
            "name": "Weak Password",
            "email": "weak@example.com",
            "address": "12 Sample Street",
            "password": "lowercase",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn admin_store_insert_is_visible_in_listing() {
    let base = spawn_server().await;
    let http = client();

    let (cookie, body) = login(&base, &http, ADMIN_EMAIL, ADMIN_PASSWORD).await;
    assert_eq!(body["role"], "admin");
    assert_eq!(body["redirect"], "/admin/dashboard");

    let resp = http
        .post(format!("{base}/admin/stores"))
        .header("Cookie", &cookie)
        .json(&json!({"name": "Corner Shop", "address": "1 Market Square"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let created: Value = resp.json().await.unwrap();
    let store_id = created["store"]["id"].as_str().unwrap().to_string();

    let resp = http.get(format!("{base}/stores")).send().await.unwrap();
    let listing: Value = resp.json().await.unwrap();
    let names: Vec<&str> = listing["stores"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["name"].as_str().unwrap())
        .collect();
    assert!(names.contains(&"Corner Shop"));

    let resp = http
        .get(format!("{base}/stores/{store_id}"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let resp = http
        .get(format!("{base}/admin/dashboard"))
        .header("Cookie", &cookie)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let dash: Value = resp.json().await.unwrap();
    assert!(dash["total_stores"].as_u64().unwrap() >= 1);
}

#[tokio::test]
async fn non_admin_cannot_manage_stores() {
    let base = spawn_server().await;
    let http = client();

    signup_user(&base, &http, "Uma User", "uma@example.com").await;
    let (cookie, _) = login(&base, &http, "uma@example.com", "Password#1").await;

    let resp = http
        .post(format!("{base}/admin/stores"))
        .header("Cookie", &cookie)
        .json(&json!({"name": "Rogue Shop", "address": "13 Nowhere"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);

    let resp = http
        .get(format!("{base}/admin/dashboard"))
        .header("Cookie", &cookie)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);
}

#[tokio::test]
async fn logout_invalidates_the_session() {
    let base = spawn_server().await;
    let http = client();

    signup_user(&base, &http, "Uma User", "uma@example.com").await;
    let (cookie, _) = login(&base, &http, "uma@example.com", "Password#1").await;

    let resp = http
        .post(format!("{base}/auth/logout"))
        .header("Cookie", &cookie)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    // The old cookie no longer opens the guarded page
    let resp = http
        .get(format!("{base}/user/dashboard"))
        .header("Cookie", &cookie)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 303);
}

#[tokio::test]
async fn rating_flow_updates_store_detail() {
    let base = spawn_server().await;
    let http = client();

    let (admin_cookie, _) = login(&base, &http, ADMIN_EMAIL, ADMIN_PASSWORD).await;
    let resp = http
        .post(format!("{base}/admin/stores"))
        .header("Cookie", &admin_cookie)
        .json(&json!({"name": "Rated Shop", "address": "2 Market Square"}))
        .send()
        .await
        .unwrap();
    let created: Value = resp.json().await.unwrap();
    let store_id = created["store"]["id"].as_str().unwrap().to_string();

    signup_user(&base, &http, "Rae Rater", "rae@example.com").await;
    let (cookie, _) = login(&base, &http, "rae@example.com", "Password#1").await;

    // Anonymous rating attempts are redirected to sign-in
    let resp = http
        .post(format!("{base}/stores/{store_id}/ratings"))
        .json(&json!({"score": 5, "comment": "great"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 303);

    let resp = http
        .post(format!("{base}/stores/{store_id}/ratings"))
        .header("Cookie", &cookie)
        .json(&json!({"score": 5, "comment": "great"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);

    // Out-of-range scores are rejected
    let resp = http
        .post(format!("{base}/stores/{store_id}/ratings"))
        .header("Cookie", &cookie)
        .json(&json!({"score": 9, "comment": "too good"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    let resp = http
        .get(format!("{base}/stores/{store_id}"))
        .send()
        .await
        .unwrap();
    let detail: Value = resp.json().await.unwrap();
    let ratings = detail["ratings"].as_array().unwrap();
    assert_eq!(ratings.len(), 1);
    assert_eq!(ratings[0]["score"], 5);
    assert_eq!(ratings[0]["user_name"], "Rae Rater");
    assert_eq!(detail["average_score"], 5.0);
}

#[tokio::test]
async fn owner_sees_ratings_on_owned_stores() {
    let base = spawn_server().await;
    let http = client();

    signup_user(&base, &http, "Olive Owner", "olive@example.com").await;
    signup_user(&base, &http, "Rae Rater", "rae@example.com").await;

    let (admin_cookie, _) = login(&base, &http, ADMIN_EMAIL, ADMIN_PASSWORD).await;

    // Promote Olive to owner
    let resp = http
        .get(format!("{base}/admin/dashboard"))
        .header("Cookie", &admin_cookie)
        .send()
        .await
        .unwrap();
    let dash: Value = resp.json().await.unwrap();
    let olive_id = dash["users"]
        .as_array()
        .unwrap()
        .iter()
        .find(|u| u["email"] == "olive@example.com")
        .unwrap()["id"]
        .as_str()
        .unwrap()
        .to_string();
    let resp = http
        .post(format!("{base}/admin/users/{olive_id}/role"))
        .header("Cookie", &admin_cookie)
        .json(&json!({"role": "owner"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    // Create a store owned by Olive
    let resp = http
        .post(format!("{base}/admin/stores"))
        .header("Cookie", &admin_cookie)
        .json(&json!({
            "name": "Olive's Shop",
            "address": "3 Market Square",
            "owner_email": "olive@example.com",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let created: Value = resp.json().await.unwrap();
    let store_id = created["store"]["id"].as_str().unwrap().to_string();

    // A customer leaves a rating
    let (rater_cookie, _) = login(&base, &http, "rae@example.com", "Password#1").await;
    let resp = http
        .post(format!("{base}/stores/{store_id}/ratings"))
        .header("Cookie", &rater_cookie)
        .json(&json!({"score": 4, "comment": "solid"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);

    // Olive logs in, resolves as owner, and sees the rating
    let (owner_cookie, body) = login(&base, &http, "olive@example.com", "Password#1").await;
    assert_eq!(body["role"], "owner");
    assert_eq!(body["redirect"], "/owner/dashboard");

    let resp = http
        .get(format!("{base}/nav"))
        .header("Cookie", &owner_cookie)
        .send()
        .await
        .unwrap();
    let nav: Value = resp.json().await.unwrap();
    assert_eq!(nav["actions"], json!(["owner-dashboard", "sign-out"]));

    let resp = http
        .get(format!("{base}/owner/dashboard"))
        .header("Cookie", &owner_cookie)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let dash: Value = resp.json().await.unwrap();
    let stores = dash["stores"].as_array().unwrap();
    assert_eq!(stores.len(), 1);
    assert_eq!(stores[0]["ratings"].as_array().unwrap().len(), 1);
    assert_eq!(stores[0]["average_score"], 4.0);
}
