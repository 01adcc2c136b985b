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
                {"gid": 1, "gname": "Veda"},
                {"gid": 2, "gname": "Arya"}
            ])))
            .mount(server),
    );
    rt.block_on(
        Mock::given(method("GET"))
            .and(path("/gurukul-offerings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"oid": 10, "gid": 1, "gtype": "G1"},
                {"oid": 11, "gid": 1, "gtype": "G2"},
                {"oid": 12, "gid": 1, "gtype": "G3"},
                {"oid": 13, "gid": 1, "gtype": "G4"},
                {"oid": 20, "gid": 2, "gtype": "G2"}
            ])))
            .mount(server),
    );
}

fn count_posts(rt: &tokio::runtime::Runtime, server: &MockServer) -> usize {
    rt.block_on(server.received_requests())
        .unwrap_or_default()
        .iter()
        .filter(|r| r.method.to_string().eq_ignore_ascii_case("POST"))
        .count()
}

#[test]
fn duplicate_gtype_is_rejected_before_any_network_write() {
    let rt = tokio::runtime::Runtime::new().expect("tokio runtime");
    let server = rt.block_on(MockServer::start());
    mount_fixture(&rt, &server);

    let (_child, mut stdin, mut reader) = spawn_daemon(&server.uri());

    let resp = request(
        &mut stdin,
        &mut reader,
        "1",
        "offerings.create",
        json!({ "gid": 2, "gtype": "G2" }),
    );
    assert_eq!(resp["ok"], json!(false));
    assert_eq!(resp["error"]["code"], json!("duplicate"));
    assert_eq!(
        resp["error"]["message"],
        json!("Gurukul 2 already has a G2 offering.")
    );
    assert_eq!(count_posts(&rt, &server), 0, "guard must block the POST");

    // The next list still shows exactly one G2 under gurukul 2.
    let list = request(&mut stdin, &mut reader, "2", "offerings.list", json!({}));
    let g2_count = list["result"]["offerings"]
        .as_array()
        .map(|rows| {
            rows.iter()
                .filter(|r| r["gid"] == json!(2) && r["gtype"] == json!("G2"))
                .count()
        })
        .unwrap_or(0);
    assert_eq!(g2_count, 1);
}

#[test]
fn backend_conflict_is_surfaced_like_a_guard_failure() {
    let rt = tokio::runtime::Runtime::new().expect("tokio runtime");
    let server = rt.block_on(MockServer::start());
    mount_fixture(&rt, &server);
    rt.block_on(
        Mock::given(method("POST"))
            .and(path("/gurukul-offerings"))
            .respond_with(
                ResponseTemplate::new(409)
                    .set_body_json(json!({ "message": "Offering type already exists for this gurukul" })),
            )
            .mount(&server),
    );

    let (_child, mut stdin, mut reader) = spawn_daemon(&server.uri());

    // The local snapshot says G3 is free under gurukul 2, so the guard lets
    // the call through and the backend's 409 comes back as a conflict.
    let resp = request(
        &mut stdin,
        &mut reader,
        "1",
        "offerings.create",
        json!({ "gid": 2, "gtype": "G3" }),
    );
    assert_eq!(resp["ok"], json!(false));
    assert_eq!(resp["error"]["code"], json!("conflict"));
    assert_eq!(
        resp["error"]["message"],
        json!("Offering type already exists for this gurukul")
    );
    assert_eq!(resp["error"]["details"]["status"], json!(409));
}

#[test]
fn option_sets_skip_consumed_gtypes_and_full_gurukuls() {
    let rt = tokio::runtime::Runtime::new().expect("tokio runtime");
    let server = rt.block_on(MockServer::start());
    mount_fixture(&rt, &server);

    let (_child, mut stdin, mut reader) = spawn_daemon(&server.uri());

    let creatable = request(&mut stdin, &mut reader, "1", "offerings.creatable", json!({}));
    let gurukuls = creatable["result"]["gurukuls"].as_array().cloned().unwrap_or_default();
    // Gurukul 1 already offers all four G-types and must not be offered.
    assert_eq!(gurukuls.len(), 1);
    assert_eq!(gurukuls[0]["id"], json!(2));

    let free = request(
        &mut stdin,
        &mut reader,
        "2",
        "offerings.gtypeOptions",
        json!({ "gid": 2 }),
    );
    assert_eq!(free["result"]["gtypes"], json!(["G1", "G3", "G4"]));

    let invalid = request(
        &mut stdin,
        &mut reader,
        "3",
        "offerings.create",
        json!({ "gid": 2, "gtype": "G7" }),
    );
    assert_eq!(invalid["error"]["code"], json!("bad_params"));
}

#[test]
fn moving_an_offering_respects_the_target_gurukuls_set() {
    let rt = tokio::runtime::Runtime::new().expect("tokio runtime");
    let server = rt.block_on(MockServer::start());
    mount_fixture(&rt, &server);
    rt.block_on(
        Mock::given(method("PUT"))
            .and(path("/gurukul-offerings/20"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "oid": 20, "gid": 2, "gtype": "G2"
            })))
            .mount(&server),
    );

    let (_child, mut stdin, mut reader) = spawn_daemon(&server.uri());

    // Gurukul 1 already has G2: re-homing offering 20 there must be blocked.
    let resp = request(
        &mut stdin,
        &mut reader,
        "1",
        "offerings.update",
        json!({ "oid": 20, "gid": 1, "gtype": "G2" }),
    );
    assert_eq!(resp["error"]["code"], json!("duplicate"));

    // Keeping its own (gurukul, gtype) pair is not a conflict with itself.
    let resp = request(
        &mut stdin,
        &mut reader,
        "2",
        "offerings.update",
        json!({ "oid": 20, "gid": 2, "gtype": "G2" }),
    );
    assert_eq!(resp["ok"], json!(true), "self-identical update failed: {resp}");
}
