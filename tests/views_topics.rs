use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn spawn_daemon(api_url: &str) -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_gurukuld");
    let mut child = Command::new(exe)
        .env("GURUKULD_API_URL", api_url)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn gurukuld");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({ "id": id, "method": method, "params": params });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

fn mount_fixture(rt: &tokio::runtime::Runtime, server: &MockServer) {
    rt.block_on(
        Mock::given(method("GET"))
            .and(path("/subjects"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"subid": 1, "subname": "Maths", "level": "L5"},
                {"subid": 2, "subname": "Sanskrit", "level": "L5"},
                {"subid": 3, "subname": "Music", "level": null}
            ])))
            .mount(server),
    );
    rt.block_on(
        Mock::given(method("GET"))
            .and(path("/topics"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"tid": 10, "tname": "Algebra", "subid": 1},
                {"tid": 11, "tname": "Geometry", "subid": 1},
                {"tid": 20, "tname": "Grammar", "subid": 2}
            ])))
            .mount(server),
    );
}

#[test]
fn topics_by_subject_filters_on_the_selected_parent() {
    let rt = tokio::runtime::Runtime::new().expect("tokio runtime");
    let server = rt.block_on(MockServer::start());
    mount_fixture(&rt, &server);

    let (_child, mut stdin, mut reader) = spawn_daemon(&server.uri());

    let r = request_ok(&mut stdin, &mut reader, "1", "views.topicsBySubject", json!({}));
    assert_eq!(r["subjects"].as_array().map(|a| a.len()), Some(3));
    assert_eq!(r["topics"], json!([]));

    let r = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "views.topicsBySubject",
        json!({ "subid": 1 }),
    );
    let names: Vec<&str> = r["topics"]
        .as_array()
        .map(|a| a.iter().filter_map(|t| t["tname"].as_str()).collect())
        .unwrap_or_default();
    assert_eq!(names, vec!["Algebra", "Geometry"]);

    // A subject that vanished after a refresh degrades to "no data".
    let r = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "views.topicsBySubject",
        json!({ "subid": 99 }),
    );
    assert_eq!(r["selectedSubject"], json!(null));
    assert_eq!(r["topics"], json!([]));
}

#[test]
fn topics_by_level_resolves_level_then_subject_then_topics() {
    let rt = tokio::runtime::Runtime::new().expect("tokio runtime");
    let server = rt.block_on(MockServer::start());
    mount_fixture(&rt, &server);

    let (_child, mut stdin, mut reader) = spawn_daemon(&server.uri());

    // Subjects without a level contribute no level option.
    let r = request_ok(&mut stdin, &mut reader, "1", "views.topicsByLevel", json!({}));
    assert_eq!(r["levels"], json!(["L5"]));
    assert_eq!(r["subjects"], json!([]));

    let r = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "views.topicsByLevel",
        json!({ "level": "L5" }),
    );
    let subject_ids: Vec<i64> = r["subjects"]
        .as_array()
        .map(|a| a.iter().filter_map(|s| s["id"].as_i64()).collect())
        .unwrap_or_default();
    assert_eq!(subject_ids, vec![1, 2]);
    assert_eq!(r["topics"], json!([]));

    let r = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "views.topicsByLevel",
        json!({ "level": "L5", "subid": 2 }),
    );
    let names: Vec<&str> = r["topics"]
        .as_array()
        .map(|a| a.iter().filter_map(|t| t["tname"].as_str()).collect())
        .unwrap_or_default();
    assert_eq!(names, vec!["Grammar"]);

    // Subject 3 has no level, so it cannot resolve under L5.
    let r = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "views.topicsByLevel",
        json!({ "level": "L5", "subid": 3 }),
    );
    assert_eq!(r["topics"], json!([]));
}
