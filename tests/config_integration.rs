use std::fs;

use upsync::SyncError;
use upsync::config;

fn scratch_dir(tag: &str) -> std::path::PathBuf {
    let base = std::env::temp_dir().join(format!("upsync-{}-{}", tag, std::process::id()));
    let _ = fs::remove_dir_all(&base);
    fs::create_dir_all(&base).expect("scratch dir");
    base
}

#[test]
fn discovery_walks_up_to_nearest_settings_document() {
    let base = scratch_dir("discover");
    let proj = base.join("proj");
    let nested = proj.join("src").join("deep");
    fs::create_dir_all(&nested).expect("nested dirs");
    fs::create_dir_all(proj.join(config::SETTINGS_DIR)).expect("settings dir");
    fs::write(
        proj.join(config::SETTINGS_DIR).join(config::SETTINGS_FILE),
        r#"{"name":"prod","username":"deploy","host":"example.com","remotePath":"/var/www"}"#,
    )
    .expect("write settings");

    let (settings_path, project_root) =
        config::discover(&nested.join("main.rs")).expect("found settings");
    assert_eq!(project_root, proj);
    assert!(settings_path.ends_with(".upsync/sftp.json"));

    let target = config::resolve_target(&nested.join("main.rs")).expect("valid target");
    assert_eq!(target.name, "prod");
    assert_eq!(target.project_root, proj);

    let _ = fs::remove_dir_all(&base);
}

#[test]
fn discovery_misses_when_no_document_exists() {
    let base = scratch_dir("miss");
    let nested = base.join("a").join("b");
    fs::create_dir_all(&nested).expect("dirs");

    assert!(config::discover(&nested.join("x.rs")).is_none());
    let err = config::resolve_target(&nested.join("x.rs")).expect_err("no settings");
    assert!(matches!(err, SyncError::Configuration(_)));

    let _ = fs::remove_dir_all(&base);
}

#[test]
fn load_reports_parse_failures_with_path_context() {
    let base = scratch_dir("badjson");
    let dir = base.join(config::SETTINGS_DIR);
    fs::create_dir_all(&dir).expect("dir");
    let doc = dir.join(config::SETTINGS_FILE);
    fs::write(&doc, "{not json").expect("write");

    let err = config::load(&doc, base.clone()).expect_err("parse fails");
    match err {
        SyncError::Configuration(msg) => {
            assert!(msg.contains("sftp.json"), "message carries the document path: {}", msg)
        }
        other => panic!("unexpected error kind: {:?}", other),
    }

    let _ = fs::remove_dir_all(&base);
}

#[test]
fn nested_document_shadows_outer_one() {
    let base = scratch_dir("shadow");
    let outer = base.join("outer");
    let inner = outer.join("vendor").join("pkg");
    fs::create_dir_all(inner.join("src")).expect("dirs");
    for (root, name) in [(&outer, "outer"), (&inner, "inner")] {
        fs::create_dir_all(root.join(config::SETTINGS_DIR)).expect("settings dir");
        fs::write(
            root.join(config::SETTINGS_DIR).join(config::SETTINGS_FILE),
            format!(
                r#"{{"name":"{}","username":"deploy","host":"example.com","remotePath":"/var/www"}}"#,
                name
            ),
        )
        .expect("write settings");
    }

    let target = config::resolve_target(&inner.join("src").join("lib.rs")).expect("resolves");
    assert_eq!(target.name, "inner", "nearest document wins");

    let _ = fs::remove_dir_all(&base);
}
