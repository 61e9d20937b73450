use std::{fs, path::Path, time::Duration};

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header::CONTENT_TYPE},
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::ServiceExt;
use url::form_urlencoded;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path, query_param},
};

use hojokin_app::jgrants::JGrantsClient;
use hojokin_app::server::{AppState, build_api_router};
use hojokin_app::services::LocalSubsidySearcher;

const API_PREFIX: &str = "/exp/v1/public";

fn write_local_fixture(dir: &Path) {
    let data = json!({
        "metadata": {
            "source": "https://hojyokin-portal.jp/subsidies/list",
            "prefecture_id": 18,
            "scraped_at": "2025-05-01T09:00:00Z",
            "total_count": 2
        },
        "subsidies": [
            {
                "id": "5001",
                "url": "https://hojyokin-portal.jp/subsidies/5001",
                "status": "公募中",
                "title": "福井県：「創業チャレンジ補助金」",
                "prefecture": "福井県",
                "max_amount": "200万円",
                "tags": ["#創業"],
                "details": {"contact": "創業支援課", "subsidy_rate": "2分の1"}
            },
            {
                "id": "5002",
                "url": "https://hojyokin-portal.jp/subsidies/5002",
                "status": "公募終了",
                "title": "福井県：「創業塾受講補助」",
                "prefecture": "福井県"
            }
        ]
    });
    fs::write(
        dir.join("subsidies_pref_18.json"),
        serde_json::to_string_pretty(&data).expect("fixture serializes"),
    )
    .expect("write fixture");
}

struct Harness {
    server: MockServer,
    data_dir: TempDir,
    app: Router,
}

async fn harness() -> Harness {
    let server = MockServer::start().await;
    let data_dir = TempDir::new().expect("temp data dir");
    write_local_fixture(data_dir.path());

    let jgrants = JGrantsClient::new(
        &format!("{}{API_PREFIX}", server.uri()),
        Duration::from_secs(5),
    )
    .expect("client builds");
    let local = LocalSubsidySearcher::load(data_dir.path()).expect("local index loads");
    let app = build_api_router(AppState::new(jgrants, local));

    Harness {
        server,
        data_dir,
        app,
    }
}

fn search_request(fields: &[(&str, &str)]) -> Request<Body> {
    let body = form_urlencoded::Serializer::new(String::new())
        .extend_pairs(fields)
        .finish();
    Request::builder()
        .method("POST")
        .uri("/search")
        .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body))
        .expect("request builder must not fail")
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .expect("request builder must not fail")
}

async fn json_body(response: axum::response::Response) -> Value {
    let body_bytes = response
        .into_body()
        .collect()
        .await
        .expect("body must be collected")
        .to_bytes();
    let body_text = std::str::from_utf8(body_bytes.as_ref()).unwrap_or("<non-utf8>");
    serde_json::from_slice(body_bytes.as_ref())
        .unwrap_or_else(|err| panic!("invalid json: {err}; body={body_text}"))
}

#[tokio::test]
async fn index_renders_search_form() {
    let h = harness().await;
    let response = h.app.oneshot(get("/")).await.expect("handler should respond");

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.expect("body").to_bytes();
    let html = std::str::from_utf8(bytes.as_ref()).expect("utf-8 html");
    assert!(html.contains("id=\"search-form\""));
    assert!(html.contains("<option value=\"福井県\">福井県</option>"));
}

#[tokio::test]
async fn short_keyword_returns_400() {
    let h = harness().await;
    let response = h
        .app
        .oneshot(search_request(&[("keyword", "創")]))
        .await
        .expect("handler should respond");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let value = json_body(response).await;
    assert_eq!(value["success"], json!(false));
    assert_eq!(value["error"], json!("検索キーワードは2文字以上で入力してください"));
    assert_eq!(value["field"], json!("keyword"));
}

#[tokio::test]
async fn search_combines_api_and_local_rows() {
    let h = harness().await;
    Mock::given(method("GET"))
        .and(path(format!("{API_PREFIX}/subsidies")))
        .and(query_param("keyword", "創業"))
        .and(query_param("acceptance", "1"))
        .and(query_param("sort", "created_date"))
        .and(query_param("order", "DESC"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "metadata": {"resultset": {"count": 1}},
            "result": [{
                "id": "a0W5h00000ABCDEF",
                "name": "S-00000001",
                "title": "創業促進補助金",
                "target_area_search": "全国",
                "subsidy_max_limit": 150000000,
                "acceptance_start_datetime": "2025-04-01T00:00:00Z",
                "acceptance_end_datetime": "2025-07-31T08:00:00Z",
                "target_number_of_employees": "従業員数の制約なし"
            }]
        })))
        .expect(1)
        .mount(&h.server)
        .await;

    let response = h
        .app
        .clone()
        .oneshot(search_request(&[
            ("keyword", "創業"),
            ("sort", "created_date"),
            ("order", "DESC"),
            ("acceptance_only", "on"),
        ]))
        .await
        .expect("handler should respond");

    assert_eq!(response.status(), StatusCode::OK);
    let value = json_body(response).await;
    assert_eq!(value["success"], json!(true));
    assert_eq!(value["count"], json!(2));

    let rows = value["subsidies"].as_array().expect("subsidies array");
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["id"], json!("a0W5h00000ABCDEF"));
    assert_eq!(rows[0]["subsidy_max_limit"], json!("1.5億円"));
    assert_eq!(rows[1]["id"], json!("local_5001"));
    assert_eq!(rows[1]["status"], json!("公募中"));
    assert_eq!(rows[1]["subsidy_max_limit"], json!("200万円"));
    assert!(value.get("warning").is_none());
}

#[tokio::test]
async fn api_failure_falls_back_to_local_rows() {
    let h = harness().await;
    Mock::given(method("GET"))
        .and(path(format!("{API_PREFIX}/subsidies")))
        .respond_with(ResponseTemplate::new(502))
        .mount(&h.server)
        .await;

    let response = h
        .app
        .clone()
        .oneshot(search_request(&[("keyword", "創業")]))
        .await
        .expect("handler should respond");
    assert_eq!(response.status(), StatusCode::OK);
    let value = json_body(response).await;
    assert_eq!(value["count"], json!(2));
    assert!(
        value["warning"]
            .as_str()
            .is_some_and(|w| w.starts_with("API通信エラー"))
    );

    let response = h
        .app
        .oneshot(search_request(&[("keyword", "量子計算")]))
        .await
        .expect("handler should respond");
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let value = json_body(response).await;
    assert_eq!(value["success"], json!(false));
}

#[tokio::test]
async fn local_detail_resolves_from_index() {
    let h = harness().await;
    let response = h
        .app
        .clone()
        .oneshot(get("/detail/local_5001"))
        .await
        .expect("handler should respond");

    assert_eq!(response.status(), StatusCode::OK);
    let value = json_body(response).await;
    assert_eq!(value["subsidy"]["title"], json!("福井県：「創業チャレンジ補助金」"));
    assert_eq!(value["subsidy"]["subsidy_rate"], json!("2分の1"));
    assert_eq!(value["subsidy"]["contact"], json!("創業支援課"));
    assert_eq!(value["subsidy"]["industry"], json!("-"));

    let missing = h
        .app
        .oneshot(get("/detail/local_999"))
        .await
        .expect("handler should respond");
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn api_detail_maps_errors_to_status_codes() {
    let h = harness().await;
    Mock::given(method("GET"))
        .and(path(format!("{API_PREFIX}/subsidies/id/a0W5h00000ABCDEF")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "metadata": {"resultset": {"count": 1}},
            "result": [{
                "id": "a0W5h00000ABCDEF",
                "title": "創業促進補助金",
                "subsidy_catch_phrase": "新しい挑戦を応援",
                "subsidy_max_limit": 3000000,
                "workflow": [{"id": "wf1"}]
            }]
        })))
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{API_PREFIX}/subsidies/id/a0W5h00000EMPTY0")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": []})))
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{API_PREFIX}/subsidies/id/a0W5h00000BROKEN")))
        .respond_with(ResponseTemplate::new(500))
        .mount(&h.server)
        .await;

    let ok = h
        .app
        .clone()
        .oneshot(get("/detail/a0W5h00000ABCDEF"))
        .await
        .expect("handler should respond");
    assert_eq!(ok.status(), StatusCode::OK);
    let value = json_body(ok).await;
    assert_eq!(value["subsidy"]["catch_phrase"], json!("新しい挑戦を応援"));
    assert_eq!(value["subsidy"]["subsidy_max_limit"], json!("300万円"));
    assert_eq!(value["subsidy"]["workflow"], json!([{"id": "wf1"}]));

    let too_long = h
        .app
        .clone()
        .oneshot(get("/detail/0123456789abcdefghij"))
        .await
        .expect("handler should respond");
    assert_eq!(too_long.status(), StatusCode::BAD_REQUEST);

    let empty = h
        .app
        .clone()
        .oneshot(get("/detail/a0W5h00000EMPTY0"))
        .await
        .expect("handler should respond");
    assert_eq!(empty.status(), StatusCode::NOT_FOUND);

    let broken = h
        .app
        .oneshot(get("/detail/a0W5h00000BROKEN"))
        .await
        .expect("handler should respond");
    assert_eq!(broken.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn reload_picks_up_new_scrapes() {
    let h = harness().await;
    fs::write(
        h.data_dir.path().join("subsidies_pref_13.json"),
        json!([{"id": "7001", "url": "https://hojyokin-portal.jp/subsidies/7001", "title": "東京都：「創業助成事業」"}])
            .to_string(),
    )
    .expect("write second file");

    let response = h
        .app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/v1/local/reload")
                .body(Body::empty())
                .expect("request builder must not fail"),
        )
        .await
        .expect("handler should respond");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, json!({"success": true, "count": 3}));

    let detail = h
        .app
        .oneshot(get("/detail/local_7001"))
        .await
        .expect("handler should respond");
    assert_eq!(detail.status(), StatusCode::OK);
}

#[tokio::test]
async fn wrong_method_and_unknown_path_are_rejected() {
    let h = harness().await;
    let response = h
        .app
        .clone()
        .oneshot(get("/search"))
        .await
        .expect("handler should respond");
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);

    let response = h
        .app
        .oneshot(get("/v1/unknown"))
        .await
        .expect("handler should respond");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(response).await["code"], json!("not_found"));
}
