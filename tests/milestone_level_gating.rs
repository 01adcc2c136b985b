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

fn request(
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
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

fn mount_fixture(rt: &tokio::runtime::Runtime, server: &MockServer) {
    rt.block_on(
        Mock::given(method("GET"))
            .and(path("/gurukul"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"gid": 1, "gname": "Veda"}
            ])))
            .mount(server),
    );
    rt.block_on(
        Mock::given(method("GET"))
            .and(path("/gurukul-offerings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"oid": 20, "gid": 1, "gtype": "G2"}
            ])))
            .mount(server),
    );
    rt.block_on(
        Mock::given(method("GET"))
            .and(path("/milestones"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"mid": 100, "class": 5, "level": "L5", "oid": 20},
                {"mid": 101, "class": 6, "level": "L6", "oid": 20}
            ])))
            .mount(server),
    );
}

#[test]
fn level_domain_is_gated_by_gtype_minus_consumed_levels() {
    let rt = tokio::runtime::Runtime::new().expect("tokio runtime");
    let server = rt.block_on(MockServer::start());
    mount_fixture(&rt, &server);

    let (_child, mut stdin, mut reader) = spawn_daemon(&server.uri());

    let resp = request(
        &mut stdin,
        &mut reader,
        "1",
        "milestones.levelOptions",
        json!({ "oid": 20 }),
    );
    assert_eq!(resp["result"]["levels"], json!(["L7", "L8"]));

    // While editing milestone 100, its own L5 stays on the menu.
    let resp = request(
        &mut stdin,
        &mut reader,
        "2",
        "milestones.levelOptions",
        json!({ "oid": 20, "excludeMid": 100 }),
    );
    assert_eq!(resp["result"]["levels"], json!(["L5", "L7", "L8"]));

    let resp = request(
        &mut stdin,
        &mut reader,
        "3",
        "milestones.levelOptions",
        json!({ "oid": 999 }),
    );
    assert_eq!(resp["error"]["code"], json!("not_found"));
}

#[test]
fn create_rejects_duplicates_and_out_of_domain_levels_client_side() {
    let rt = tokio::runtime::Runtime::new().expect("tokio runtime");
    let server = rt.block_on(MockServer::start());
    mount_fixture(&rt, &server);
    rt.block_on(
        Mock::given(method("POST"))
            .and(path("/milestones"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "mid": 102, "class": 7, "level": "L7", "oid": 20
            })))
            .mount(&server),
    );

    let (_child, mut stdin, mut reader) = spawn_daemon(&server.uri());

    let dup = request(
        &mut stdin,
        &mut reader,
        "1",
        "milestones.create",
        json!({ "class": 5, "level": "L5", "oid": 20 }),
    );
    assert_eq!(dup["error"]["code"], json!("duplicate"));

    // L1 belongs to G1 offerings; a G2 offering never gets it.
    let outside = request(
        &mut stdin,
        &mut reader,
        "2",
        "milestones.create",
        json!({ "class": 1, "level": "L1", "oid": 20 }),
    );
    assert_eq!(outside["error"]["code"], json!("bad_params"));

    let posts = rt
        .block_on(server.received_requests())
        .unwrap_or_default()
        .iter()
        .filter(|r| r.method.to_string().eq_ignore_ascii_case("POST"))
        .count();
    assert_eq!(posts, 0, "rejected creates must not reach the backend");

    let created = request(
        &mut stdin,
        &mut reader,
        "3",
        "milestones.create",
        json!({ "class": 7, "level": "L7", "oid": 20 }),
    );
    assert_eq!(created["ok"], json!(true), "valid create failed: {created}");

    let requests = rt.block_on(server.received_requests()).unwrap_or_default();
    let post = requests
        .iter()
        .find(|r| r.method.to_string().eq_ignore_ascii_case("POST"))
        .expect("create must POST");
    let body: serde_json::Value = serde_json::from_slice(&post.body).expect("post body json");
    assert_eq!(body, json!({ "class": 7, "level": "L7", "oid": 20 }));
}

#[test]
fn update_keeps_the_offering_pinned_and_sends_oid_with_level() {
    let rt = tokio::runtime::Runtime::new().expect("tokio runtime");
    let server = rt.block_on(MockServer::start());
    mount_fixture(&rt, &server);
    rt.block_on(
        Mock::given(method("PUT"))
            .and(path("/milestones/100"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "mid": 100, "class": 5, "level": "L7", "oid": 20
            })))
            .mount(&server),
    );

    let (_child, mut stdin, mut reader) = spawn_daemon(&server.uri());

    // Changing the level to a sibling's is blocked even though the value is
    // valid for the G-type.
    let clash = request(
        &mut stdin,
        &mut reader,
        "1",
        "milestones.update",
        json!({ "mid": 100, "level": "L6" }),
    );
    assert_eq!(clash["error"]["code"], json!("duplicate"));

    // Submitting the unchanged record is a no-op, not a PUT.
    let unchanged = request(
        &mut stdin,
        &mut reader,
        "2",
        "milestones.update",
        json!({ "mid": 100, "class": 5, "level": "L5" }),
    );
    assert_eq!(unchanged["result"]["changed"], json!(false));

    let moved = request(
        &mut stdin,
        &mut reader,
        "3",
        "milestones.update",
        json!({ "mid": 100, "level": "L7" }),
    );
    assert_eq!(moved["result"]["changed"], json!(true));

    let requests = rt.block_on(server.received_requests()).unwrap_or_default();
    let puts: Vec<_> = requests
        .iter()
        .filter(|r| r.method.to_string().eq_ignore_ascii_case("PUT"))
        .collect();
    assert_eq!(puts.len(), 1, "only the real change may PUT");
    let body: serde_json::Value = serde_json::from_slice(&puts[0].body).expect("put body json");
    assert_eq!(body, json!({ "level": "L7", "oid": 20 }));
}

#[test]
fn chain_exposes_gated_levels_for_the_selected_offering() {
    let rt = tokio::runtime::Runtime::new().expect("tokio runtime");
    let server = rt.block_on(MockServer::start());
    mount_fixture(&rt, &server);

    let (_child, mut stdin, mut reader) = spawn_daemon(&server.uri());

    let r = request(
        &mut stdin,
        &mut reader,
        "1",
        "milestones.chain.set",
        json!({ "scope": "create", "level": 0, "id": 1 }),
    );
    assert_eq!(r["result"]["selection"], json!([1, null]));
    assert_eq!(r["result"]["levels"], json!([]));

    let r = request(
        &mut stdin,
        &mut reader,
        "2",
        "milestones.chain.set",
        json!({ "scope": "create", "level": 1, "id": 20 }),
    );
    assert_eq!(r["result"]["levels"], json!(["L7", "L8"]));
    let milestone_ids: Vec<i64> = r["result"]["milestones"]
        .as_array()
        .map(|a| a.iter().filter_map(|o| o["id"].as_i64()).collect())
        .unwrap_or_default();
    assert_eq!(milestone_ids, vec![100, 101]);
}
