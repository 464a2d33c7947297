//! Cassette file format and store behavior.

use std::fs;

use serde_json::{json, Value};

use rpctape::cassette::codec::{encode_request, encode_response};
use rpctape::{Cassette, CassetteStore, Error, Field, Message, StoreConfig, CASSETTE_VERSION};

fn store(dir: &tempfile::TempDir) -> CassetteStore {
    CassetteStore::new(StoreConfig::new(dir.path()))
}

fn write_raw(store: &CassetteStore, name: &str, body: &str) {
    fs::create_dir_all(&store.config().cassette_dir).unwrap();
    fs::write(store.path_for(name).unwrap(), body).unwrap();
}

fn checkout() -> Cassette {
    let mut cassette = Cassette::new("checkout");
    let pairs = [(42, 9.99), (7, 0.5), (1000, 12.0)];
    for (sku, price) in pairs {
        let request = Message::new("shop.GetPriceRequest").with("sku", sku);
        let response = Message::new("shop.GetPriceResponse").with("price", price);
        cassette.append(
            encode_request("GetPrice", &request).unwrap(),
            encode_response(&response).unwrap(),
        );
    }
    cassette
}

#[test]
fn load_of_saved_cassette_keeps_order() {
    let dir = tempfile::tempdir().unwrap();
    let store = store(&dir);
    let cassette = checkout();
    store.save(&cassette).unwrap();

    let loaded = store.load("checkout").unwrap();
    assert_eq!(loaded.pairs(), cassette.pairs());
    assert_eq!(loaded.name(), "checkout");
}

#[test]
fn document_has_exactly_version_and_reqs() {
    let dir = tempfile::tempdir().unwrap();
    let store = store(&dir);
    let path = store.save(&checkout()).unwrap();

    let text = fs::read_to_string(path).unwrap();
    let doc: Value = serde_json::from_str(&text).unwrap();
    let keys: Vec<&String> = doc.as_object().unwrap().keys().collect();
    assert_eq!(keys, ["reqs", "version"]);
    assert_eq!(doc["version"], json!(2));

    let first = &doc["reqs"][0];
    assert_eq!(first.as_array().unwrap().len(), 2);
    assert_eq!(first[0]["method"], json!("GetPrice"));
    assert_eq!(first[0]["payload"]["fields"]["sku"], json!({"int": 42}));
    let price = &first[1]["payload"]["fields"]["price"];
    assert_eq!(price, &json!({"double": 9.99}));
}

#[test]
fn field_insertion_order_does_not_change_file_bytes() {
    let dir = tempfile::tempdir().unwrap();
    let store = store(&dir);
    let build = |forward: bool| {
        let mut fields: Vec<(&str, Field)> = vec![
            ("sku", 42.into()),
            ("currency", "EUR".into()),
            ("qty", 3.into()),
        ];
        if !forward {
            fields.reverse();
        }
        let mut msg = Message::new("shop.GetPriceRequest");
        for (name, value) in fields {
            msg.set(name, value);
        }
        let response = Message::new("shop.GetPriceResponse");
        let mut cassette = Cassette::new("ordered");
        cassette.append(
            encode_request("GetPrice", &msg).unwrap(),
            encode_response(&response).unwrap(),
        );
        cassette
    };

    let forward = store.save(&build(true)).unwrap();
    let a = fs::read(forward).unwrap();
    let backward = store.save(&build(false)).unwrap();
    let b = fs::read(backward).unwrap();
    assert_eq!(a, b);
}

#[test]
fn other_versions_are_unsupported_and_load_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let store = store(&dir);
    let pair = json!([{"method": "X", "payload": {}}, {"payload": {}}]);
    for version in [json!(1), json!(3), json!("2"), json!(2.5), json!(null)] {
        let doc = json!({"version": version, "reqs": [pair]});
        write_raw(&store, "old", &doc.to_string());
        match store.load("old") {
            Err(Error::UnsupportedVersion { found, expected }) => {
                assert_eq!(found, version);
                assert_eq!(expected, CASSETTE_VERSION);
            }
            other => panic!("expected UnsupportedVersion for {version}, got {other:?}"),
        }
    }
}

#[test]
fn malformed_documents_are_parse_errors() {
    let dir = tempfile::tempdir().unwrap();
    let store = store(&dir);
    let cases = [
        "",
        "{\"version\": 2, \"reqs\": [",
        "[]",
        r#"{"reqs": []}"#,
        r#"{"version": 2}"#,
        r#"{"version": 2, "reqs": [[{"method": "X", "payload": 1}]]}"#,
        r#"{"version": 2, "reqs": [], "extra": true}"#,
        r#"{"version": 2, "reqs": [[{"method": "X", "payload": {}, "at": 1}, {"payload": {}}]]}"#,
        r#"{"version": 2, "reqs": [[{"method": "X", "payload": {}}, {"payload": {}, "ms": 3}]]}"#,
    ];
    for body in cases {
        write_raw(&store, "broken", body);
        assert!(
            matches!(store.load("broken"), Err(Error::Parse { .. })),
            "expected Parse error for {body:?}"
        );
    }
}

#[test]
fn empty_cassette_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let store = store(&dir);
    store.save(&Cassette::new("empty")).unwrap();
    assert!(store.load("empty").unwrap().is_empty());
}

#[test]
fn custom_extension_is_used_for_paths_and_cleanup() {
    let dir = tempfile::tempdir().unwrap();
    let config = StoreConfig {
        cassette_dir: dir.path().to_path_buf(),
        extension: "cassette".into(),
    };
    let store = CassetteStore::new(config);
    let path = store.save(&checkout()).unwrap();

    assert_eq!(path, dir.path().join("checkout.cassette"));
    assert_eq!(store.list().unwrap(), ["checkout"]);
    assert_eq!(store.delete_all().unwrap(), 1);
    assert!(!store.exists("checkout"));
}
