use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use dojo_core::{AttendanceStatus, EntityKind};
use dojo_sync::{AttendanceSession, FailureKind, SessionConfig, SyncClient};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

#[derive(Debug, Clone)]
struct Seen {
    method: String,
    path: String,
    authorization: Option<String>,
    body: String,
}

type Route = fn(&str, &str, &str) -> (u16, String);

/// Minimal HTTP/1.1 server: one request per connection, answered by `route`.
async fn spawn_backend(route: Route) -> (SocketAddr, Arc<Mutex<Vec<Seen>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&seen);
    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                return;
            };
            let log = Arc::clone(&log);
            tokio::spawn(async move { serve(stream, route, log).await });
        }
    });
    (addr, seen)
}

async fn serve(mut stream: TcpStream, route: Route, log: Arc<Mutex<Vec<Seen>>>) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let header_end = loop {
        let n = stream.read(&mut chunk).await.expect("read request");
        if n == 0 {
            return;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };
    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let header = |name: &str| {
        head.lines().find_map(|line| {
            let (k, v) = line.split_once(':')?;
            k.trim().eq_ignore_ascii_case(name).then(|| v.trim().to_string())
        })
    };
    let content_length: usize = header("content-length")
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);
    while buf.len() < header_end + content_length {
        let n = stream.read(&mut chunk).await.expect("read body");
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    let body = String::from_utf8_lossy(&buf[header_end..]).to_string();

    let mut request_line = head.lines().next().unwrap_or_default().split_whitespace();
    let method = request_line.next().unwrap_or_default().to_string();
    let path = request_line.next().unwrap_or_default().to_string();
    let authorization = header("authorization");

    let (status, response_body) = route(&method, &path, &body);
    log.lock().unwrap().push(Seen {
        method,
        path,
        authorization,
        body,
    });

    let response = format!(
        "HTTP/1.1 {status} X\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{response_body}",
        response_body.len()
    );
    stream.write_all(response.as_bytes()).await.expect("write response");
    stream.shutdown().await.ok();
}

fn march_first() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
}

fn client(addr: SocketAddr) -> Arc<SyncClient> {
    Arc::new(SyncClient::new(format!("http://{addr}/api/")).with_token(Some("t0k3n".into())))
}

fn academy(method: &str, path: &str, body: &str) -> (u16, String) {
    match (method, path) {
        ("GET", "/api/attendance/coaches?date=2024-03-01") => (
            200,
            r#"{"coaches": [
                {"id": 11, "full_name": "Mei Tanaka", "branch_id": "b1",
                 "attendance": {"status": "present", "check_in_time": "2024-03-01T08:50:00"}},
                {"id": 12, "first_name": "Ravi", "last_name": "Patel", "branch_id": "b1"}
            ]}"#
            .to_string(),
        ),
        ("GET", "/api/attendance/students?date=2024-03-01") => (
            200,
            r#"{"students": [
                {"id": "s1", "full_name": "Ana"},
                {"id": "s2", "full_name": "Bo"}
            ]}"#
            .to_string(),
        ),
        ("POST", "/api/attendance/mark") if body.contains("\"user_id\":\"s2\"") => {
            (500, r#"{"detail": "database unavailable"}"#.to_string())
        }
        ("POST", "/api/attendance/mark") => (200, r#"{"message": "Attendance marked"}"#.to_string()),
        ("GET", "/api/attendance/stats?date=2024-03-01") => (404, "{}".to_string()),
        _ => (404, r#"{"detail": "no route"}"#.to_string()),
    }
}

#[tokio::test]
async fn coach_sheet_immediate_write_over_http() {
    let (addr, seen) = spawn_backend(academy).await;
    let session = AttendanceSession::open(
        client(addr),
        EntityKind::Coach,
        march_first(),
        SessionConfig::new("b1", "Branch Manager"),
    )
    .await
    .expect("open");

    let records = session.records();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].id, "11_2024-03-01");
    assert_eq!(records[0].status, AttendanceStatus::Present);
    assert_eq!(records[0].check_in_time.as_deref(), Some("08:50 AM"));
    assert_eq!(records[1].entity_name, "Ravi Patel");

    let marked = session
        .mark("12_2024-03-01", AttendanceStatus::Late)
        .await
        .expect("mark");
    assert_eq!(marked.status, AttendanceStatus::Late);
    assert_eq!(marked.notes.as_deref(), Some("Marked by Branch Manager"));

    let seen = seen.lock().unwrap().clone();
    assert_eq!(seen.len(), 2);
    assert!(seen.iter().all(|s| s.authorization.as_deref() == Some("Bearer t0k3n")));
    let post = &seen[1];
    assert_eq!(post.method, "POST");
    let body: serde_json::Value = serde_json::from_str(&post.body).unwrap();
    assert_eq!(body["user_id"], "12");
    assert_eq!(body["user_type"], "coach");
    assert_eq!(body["branch_id"], "b1");
    assert_eq!(body["status"], "late");
    assert_eq!(body["attendance_date"], "2024-03-01T09:00:00");
    assert!(body["check_in_time"].is_string());
    assert!(body["course_id"].is_null());
}

#[tokio::test]
async fn student_bulk_save_over_http_reports_partial_failure() {
    let (addr, seen) = spawn_backend(academy).await;
    let session = AttendanceSession::open(
        client(addr),
        EntityKind::Student,
        march_first(),
        SessionConfig::new("b1", "Sensei"),
    )
    .await
    .expect("open");

    session.stage("s1_2024-03-01", AttendanceStatus::Present).unwrap();
    session.stage("s2_2024-03-01", AttendanceStatus::Absent).unwrap();
    let outcome = session.save_all().await;
    let report = outcome.report().expect("completed");
    assert_eq!((report.success_count, report.error_count), (1, 1));
    assert_eq!(report.failures[0].kind, FailureKind::Transient);
    assert!(report.failures[0].message.contains("500"));
    assert!(!session.has_unsaved_changes());

    let posts = seen
        .lock()
        .unwrap()
        .iter()
        .filter(|s| s.method == "POST")
        .count();
    assert_eq!(posts, 2);

    // The stats endpoint 404s, so the summary is derived from the sheet.
    let summary = session.summary().await;
    assert_eq!((summary.total, summary.present, summary.absent), (2, 1, 1));
}

#[tokio::test]
async fn forbidden_roster_is_permission_denied() {
    fn deny(_: &str, _: &str, _: &str) -> (u16, String) {
        (403, r#"{"detail": "branch managers only"}"#.to_string())
    }
    let (addr, _) = spawn_backend(deny).await;
    let err = AttendanceSession::open(
        client(addr),
        EntityKind::Student,
        march_first(),
        SessionConfig::default(),
    )
    .await
    .err()
    .expect("forbidden");
    assert_eq!(err.kind(), FailureKind::PermissionDenied);
    assert!(err.to_string().contains("branch managers only"));
}

#[tokio::test]
async fn unauthorized_roster_requires_login() {
    fn unauthorized(_: &str, _: &str, _: &str) -> (u16, String) {
        (401, String::new())
    }
    let (addr, _) = spawn_backend(unauthorized).await;
    let err = AttendanceSession::open(
        client(addr),
        EntityKind::Coach,
        march_first(),
        SessionConfig::default(),
    )
    .await
    .err()
    .expect("unauthorized");
    assert_eq!(err.kind(), FailureKind::AuthRequired);
}
