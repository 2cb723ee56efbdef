mod common;

use axum::http::{header, Method, StatusCode};
use common::{delete, get, json_request, Multipart, TestApp};
use docket::storage::models::DocumentRecord;
use serde_json::json;

fn pdf_bytes(len: usize) -> Vec<u8> {
    let mut data = b"%PDF-1.4\n".to_vec();
    data.extend((0..len.saturating_sub(data.len())).map(|i| (i % 251) as u8));
    data
}

#[tokio::test]
async fn test_health() {
    let app = TestApp::new();
    let (status, body) = app.send_json(get("/_internal/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");
    assert_eq!(body["data"]["status"], "ok");
}

#[tokio::test]
async fn test_upload_report_then_download() {
    let app = TestApp::new();
    let task_id = app.seed_tasks(7);
    assert_eq!(task_id, 7);
    let data = pdf_bytes(50 * 1024);

    let request = Multipart::new()
        .text("task_id", "7")
        .file("document_path", "report.pdf", &data)
        .request(Method::POST, "/api/v1/documentpaths");
    let (status, body) = app.send_json(request).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], "success");

    let document = &body["data"];
    let key = document["document_path"].as_str().unwrap();
    assert!(key.starts_with("uploads/"));
    assert!(key.ends_with(".pdf"));
    assert_eq!(document["task_id"], 7);
    assert_eq!(document["task"]["id"], 7);
    assert!(app.storage_root().join(key).is_file());

    let id = document["id"].as_u64().unwrap();
    let (status, headers, bytes) = app
        .send(get(&format!("/api/v1/documentpaths/{id}/download")))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_TYPE], "application/pdf");
    assert!(headers.get(header::CONTENT_DISPOSITION).is_none());
    assert_eq!(bytes.as_ref(), data.as_slice());
}

#[tokio::test]
async fn test_download_streams_attachment_outside_test_mode() {
    let app = TestApp::with_test_mode(false);
    let task_id = app.seed_tasks(1);

    let request = Multipart::new()
        .text("task_id", &task_id.to_string())
        .file("document_path", "notes.TXT", b"meeting notes")
        .request(Method::POST, "/api/v1/documentpaths");
    let (status, body) = app.send_json(request).await;
    assert_eq!(status, StatusCode::CREATED);
    let id = body["data"]["id"].as_u64().unwrap();
    let key = body["data"]["document_path"].as_str().unwrap().to_string();
    assert!(key.ends_with(".txt"));

    let (status, headers, bytes) = app
        .send(get(&format!("/api/v1/documentpaths/{id}/download")))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_TYPE], "text/plain");
    assert_eq!(headers[header::CONTENT_LENGTH], "13");
    let basename = key.rsplit('/').next().unwrap();
    assert_eq!(
        headers[header::CONTENT_DISPOSITION],
        format!("attachment; filename=\"{basename}\"").as_str()
    );
    assert_eq!(bytes.as_ref(), b"meeting notes");
}

#[tokio::test]
async fn test_rejected_extension_has_no_side_effects() {
    let app = TestApp::new();
    let task_id = app.seed_tasks(1);

    let request = Multipart::new()
        .text("task_id", &task_id.to_string())
        .file("document_path", "malware.exe", b"MZ\x90\x00")
        .request(Method::POST, "/api/v1/documentpaths");
    let (status, body) = app.send_json(request).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["status"], "fail");
    assert_eq!(body["data"]["code"], "VALIDATION_FAILED");
    assert!(body["data"]["errors"]["document_path"].is_array());

    assert!(app.blobs_in("uploads").is_empty());
    assert!(app.state.db.list::<DocumentRecord>().unwrap().is_empty());
}

#[tokio::test]
async fn test_oversized_upload_is_a_validation_failure() {
    let app = TestApp::new();
    let task_id = app.seed_tasks(1);
    let data = pdf_bytes(2048 * 1024 + 1);

    let request = Multipart::new()
        .text("task_id", &task_id.to_string())
        .file("document_path", "big.pdf", &data)
        .request(Method::POST, "/api/v1/documentpaths");
    let (status, body) = app.send_json(request).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["data"]["errors"]["document_path"].is_array());
    assert!(app.blobs_in("uploads").is_empty());
}

#[tokio::test]
async fn test_body_over_request_limit_is_payload_too_large() {
    let app = TestApp::with_limits(1024, 4096);
    let task_id = app.seed_tasks(1);
    let data = pdf_bytes(8 * 1024);

    let request = Multipart::new()
        .text("task_id", &task_id.to_string())
        .file("document_path", "big.pdf", &data)
        .request(Method::POST, "/api/v1/documentpaths");
    let (status, body) = app.send_json(request).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["status"], "fail");
    assert_eq!(body["data"]["code"], "PAYLOAD_TOO_LARGE");
    assert_eq!(body["data"]["message"], "Request body is too large");

    assert!(app.blobs_in("uploads").is_empty());
    assert!(app.state.db.list::<DocumentRecord>().unwrap().is_empty());
}

#[tokio::test]
async fn test_malformed_multipart_hides_parser_detail() {
    let app = TestApp::new();

    let request = axum::http::Request::builder()
        .method(Method::POST)
        .uri("/api/v1/documentpaths")
        .header(
            header::CONTENT_TYPE,
            "multipart/form-data; boundary=docket-test-boundary",
        )
        .body(axum::body::Body::from(
            "--docket-test-boundary\r\nContent-Disposition: form-data; name=\"task_id\"\r\n\r\n1",
        ))
        .unwrap();
    let (status, body) = app.send_json(request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["data"]["code"], "BAD_REQUEST");
    assert_eq!(body["data"]["message"], "Invalid multipart data");
}

#[tokio::test]
async fn test_unknown_task_is_rejected() {
    let app = TestApp::new();
    app.seed_tasks(1);

    let request = Multipart::new()
        .text("task_id", "99")
        .file("document_path", "report.pdf", b"%PDF")
        .request(Method::POST, "/api/v1/documentpaths");
    let (status, body) = app.send_json(request).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(
        body["data"]["errors"]["task_id"][0],
        "The selected task_id is invalid."
    );
    assert!(app.blobs_in("uploads").is_empty());
}

#[tokio::test]
async fn test_replace_twice_keeps_only_latest_blob() {
    let app = TestApp::new();
    let task_id = app.seed_tasks(1).to_string();

    let request = Multipart::new()
        .text("task_id", &task_id)
        .file("document_path", "v1.pdf", b"version one")
        .request(Method::POST, "/api/v1/documentpaths");
    let (status, body) = app.send_json(request).await;
    assert_eq!(status, StatusCode::CREATED);
    let id = body["data"]["id"].as_u64().unwrap();
    let uri = format!("/api/v1/documentpaths/{id}");

    let mut last_key = String::new();
    for (name, data) in [("v2.docx", b"version two".as_slice()), ("v3.txt", b"version three".as_slice())] {
        let request = Multipart::new()
            .text("task_id", &task_id)
            .file("document_path", name, data)
            .request(Method::PUT, &uri);
        let (status, body) = app.send_json(request).await;
        assert_eq!(status, StatusCode::OK);
        last_key = body["data"]["document_path"].as_str().unwrap().to_string();
    }

    assert!(last_key.ends_with(".txt"));
    let blobs = app.blobs_in("uploads");
    assert_eq!(blobs.len(), 1);
    assert_eq!(format!("uploads/{}", blobs[0]), last_key);
    assert_eq!(app.state.db.list::<DocumentRecord>().unwrap().len(), 1);

    let (_, _, bytes) = app.send(get(&format!("{uri}/download"))).await;
    assert_eq!(bytes.as_ref(), b"version three");
}

#[tokio::test]
async fn test_update_without_file_keeps_blob() {
    let app = TestApp::new();
    let first_task = app.seed_tasks(2) - 1;

    let request = Multipart::new()
        .text("task_id", &first_task.to_string())
        .file("document_path", "report.pdf", b"%PDF")
        .request(Method::POST, "/api/v1/documentpaths");
    let (_, body) = app.send_json(request).await;
    let id = body["data"]["id"].as_u64().unwrap();
    let key = body["data"]["document_path"].as_str().unwrap().to_string();

    let request = json_request(
        Method::PUT,
        &format!("/api/v1/documentpaths/{id}"),
        json!({"task_id": first_task + 1}),
    );
    let (status, body) = app.send_json(request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["task_id"], first_task + 1);
    assert_eq!(body["data"]["document_path"], key.as_str());
    assert!(app.storage_root().join(&key).is_file());
}

#[tokio::test]
async fn test_update_missing_document_is_not_found() {
    let app = TestApp::new();
    app.seed_tasks(1);

    let request = json_request(Method::PUT, "/api/v1/documentpaths/42", json!({"task_id": 1}));
    let (status, body) = app.send_json(request).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["data"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_delete_document_removes_row_and_blob() {
    let app = TestApp::new();
    let task_id = app.seed_tasks(1);

    let request = Multipart::new()
        .text("task_id", &task_id.to_string())
        .file("document_path", "report.pdf", b"%PDF")
        .request(Method::POST, "/api/v1/documentpaths");
    let (_, body) = app.send_json(request).await;
    let id = body["data"]["id"].as_u64().unwrap();
    let uri = format!("/api/v1/documentpaths/{id}");

    let (status, body) = app.send_json(delete(&uri)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["message"], "Document deleted successfully");
    assert!(app.blobs_in("uploads").is_empty());

    let (status, _) = app.send_json(get(&uri)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app.send_json(get(&format!("{uri}/download"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app.send_json(delete(&uri)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_download_with_missing_blob_is_not_found() {
    let app = TestApp::new();
    let task_id = app.seed_tasks(1);

    let request = Multipart::new()
        .text("task_id", &task_id.to_string())
        .file("document_path", "report.pdf", b"%PDF")
        .request(Method::POST, "/api/v1/documentpaths");
    let (_, body) = app.send_json(request).await;
    let id = body["data"]["id"].as_u64().unwrap();
    let key = body["data"]["document_path"].as_str().unwrap();
    std::fs::remove_file(app.storage_root().join(key)).unwrap();

    let (status, body) = app
        .send_json(get(&format!("/api/v1/documentpaths/{id}/download")))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["data"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_historique_lifecycle() {
    let app = TestApp::new();
    let task_id = app.seed_tasks(1).to_string();

    let request = Multipart::new()
        .text("task_id", &task_id)
        .text("description", "Revised budget")
        .text("change_date", "2024-03-05")
        .file("dochistorique_path", "rev.doc", b"doc bytes")
        .request(Method::POST, "/api/v1/historiques");
    let (status, body) = app.send_json(request).await;
    assert_eq!(status, StatusCode::CREATED);
    let entry = &body["data"];
    assert!(entry["dochistorique_path"]
        .as_str()
        .unwrap()
        .starts_with("historiques/"));
    assert_eq!(entry["change_date"], "2024-03-05T00:00:00+00:00");
    let id = entry["id"].as_u64().unwrap();

    let (status, headers, bytes) = app
        .send(get(&format!("/api/v1/historiques/{id}/download")))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_TYPE], "application/msword");
    assert_eq!(bytes.as_ref(), b"doc bytes");

    let (status, body) = app.send_json(get("/api/v1/historiques")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"][0]["task"]["title"], "Task 1");

    let (status, body) = app
        .send_json(delete(&format!("/api/v1/historiques/{id}")))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["message"], "Historique deleted successfully");
    assert!(app.blobs_in("historiques").is_empty());
}

#[tokio::test]
async fn test_missing_fields_reported_per_field() {
    let app = TestApp::new();

    let request = json_request(Method::POST, "/api/v1/historiques", json!({}));
    let (status, body) = app.send_json(request).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let errors = body["data"]["errors"].as_object().unwrap();
    let mut fields: Vec<&str> = errors.keys().map(String::as_str).collect();
    fields.sort();
    assert_eq!(
        fields,
        vec!["change_date", "description", "dochistorique_path", "task_id"]
    );
    assert_eq!(
        errors["description"][0],
        "The description field is required."
    );
}

#[tokio::test]
async fn test_file_field_sent_as_text_is_rejected() {
    let app = TestApp::new();
    let task_id = app.seed_tasks(1);

    let request = json_request(
        Method::POST,
        "/api/v1/documentpaths",
        json!({"task_id": task_id, "document_path": "uploads/elsewhere.pdf"}),
    );
    let (status, body) = app.send_json(request).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(
        body["data"]["errors"]["document_path"][0],
        "The document_path field must be a file."
    );
}

#[tokio::test]
async fn test_record_not_found() {
    let app = TestApp::new();

    for uri in [
        "/api/v1/documentpaths/999",
        "/api/v1/documentpaths/abc",
        "/api/v1/historiques/999/download",
        "/api/v1/tasks/0",
        "/api/v1/admins/5",
    ] {
        let (status, body) = app.send_json(get(uri)).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
        assert_eq!(body["status"], "fail");
        assert_eq!(body["data"]["code"], "NOT_FOUND");
    }
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let app = TestApp::new();

    let request = axum::http::Request::builder()
        .method(Method::POST)
        .uri("/api/v1/tasks")
        .header(header::CONTENT_TYPE, "application/json")
        .body(axum::body::Body::from("{not json"))
        .unwrap();
    let (status, body) = app.send_json(request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["data"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_task_crud() {
    let app = TestApp::new();

    let (status, body) = app
        .send_json(json_request(
            Method::POST,
            "/api/v1/divisions",
            json!({"division_nom": "Travaux", "division_responsable": "R. Idrissi", "password": "s3cret"}),
        ))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let division_id = body["data"]["id"].as_u64().unwrap();

    let (status, body) = app
        .send_json(json_request(
            Method::POST,
            "/api/v1/tasks",
            json!({"title": "Road repair", "division_id": division_id}),
        ))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let task_id = body["data"]["id"].as_u64().unwrap();
    assert_eq!(body["data"]["description"], serde_json::Value::Null);

    let (status, body) = app
        .send_json(json_request(
            Method::PUT,
            &format!("/api/v1/tasks/{task_id}"),
            json!({"title": "Road repair", "description": "North sector", "division_id": division_id}),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["description"], "North sector");

    let (status, body) = app
        .send_json(get(&format!("/api/v1/divisions/{division_id}?with_tasks=true")))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["tasks"][0]["title"], "Road repair");

    let (status, body) = app.send_json(get("/api/v1/divisions")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"][0].get("tasks").is_none());

    let (status, body) = app
        .send_json(delete(&format!("/api/v1/tasks/{task_id}")))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["message"], "Task deleted successfully");
}

#[tokio::test]
async fn test_accounts_never_echo_passwords() {
    let app = TestApp::new();

    let (status, body) = app
        .send_json(json_request(
            Method::POST,
            "/api/v1/superadmins",
            json!({"username": "gov", "password": "hunter2", "role": "governeur"}),
        ))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["role"], "governeur");
    assert!(body["data"].get("password").is_none());
    assert!(body["data"].get("password_hash").is_none());
    let superadmin_id = body["data"]["id"].as_u64().unwrap();

    let stored = app
        .state
        .db
        .get::<docket::storage::models::Superadmin>(superadmin_id)
        .unwrap()
        .unwrap();
    assert!(docket::credentials::verify_password("hunter2", &stored.password_hash));

    let (status, body) = app
        .send_json(json_request(
            Method::POST,
            "/api/v1/admins",
            json!({"username": "sec", "password": "pw", "role": "secretaire", "superadmin_id": superadmin_id}),
        ))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(body["data"].get("password_hash").is_none());
    assert_eq!(body["data"]["superadmin_id"], superadmin_id);
}

#[tokio::test]
async fn test_account_validation() {
    let app = TestApp::new();

    let (status, body) = app
        .send_json(json_request(
            Method::POST,
            "/api/v1/superadmins",
            json!({"username": "gov", "password": "pw", "role": "emperor"}),
        ))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["data"]["errors"]["role"][0], "The selected role is invalid.");

    let (status, body) = app
        .send_json(json_request(
            Method::POST,
            "/api/v1/admins",
            json!({"username": "sec", "password": "pw", "role": "secretaire", "superadmin_id": 12}),
        ))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(
        body["data"]["errors"]["superadmin_id"][0],
        "The selected superadmin_id is invalid."
    );
}

#[tokio::test]
async fn test_download_route_serves_inline_with_no_cache() {
    let app = TestApp::new();
    let path = app.mirror_root().join("images/logo.png");
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, b"\x89PNG").unwrap();

    let (status, headers, bytes) = app.send(get("/download/images/logo.png")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_TYPE], "image/png");
    assert_eq!(
        headers[header::CONTENT_DISPOSITION],
        "inline; filename=\"logo.png\""
    );
    assert_eq!(
        headers[header::CACHE_CONTROL],
        "no-cache, no-store, must-revalidate"
    );
    assert_eq!(headers[header::PRAGMA], "no-cache");
    assert_eq!(headers[header::EXPIRES], "0");
    assert_eq!(bytes.as_ref(), b"\x89PNG");
}

#[tokio::test]
async fn test_download_route_serves_uploaded_documents() {
    let app = TestApp::new();
    let task_id = app.seed_tasks(1);

    let request = Multipart::new()
        .text("task_id", &task_id.to_string())
        .file("document_path", "report.pdf", b"%PDF-1.4")
        .request(Method::POST, "/api/v1/documentpaths");
    let (_, body) = app.send_json(request).await;
    let key = body["data"]["document_path"].as_str().unwrap();

    let (status, headers, bytes) = app.send(get(&format!("/download/{key}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_TYPE], "application/pdf");
    assert_eq!(bytes.as_ref(), b"%PDF-1.4");
}

#[tokio::test]
async fn test_download_route_rejects_traversal() {
    let app = TestApp::new();
    std::fs::write(app.dir.path().join("secret.txt"), b"secret").unwrap();

    let (status, body) = app.send_json(get("/download/../secret.txt")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["data"]["code"], "FORBIDDEN");

    let (status, _) = app.send_json(get("/download/uploads/../../../etc/passwd")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app.send_json(get("/download/uploads/none.pdf")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["data"]["code"], "NOT_FOUND");
}
