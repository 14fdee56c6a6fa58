use super::*;

#[test]
fn classify_comment_blank_and_declaration_lines() {
    let list = RequirementList::parse("# header\n\n   \nfastapi==0.110.0\n  # indented comment\n");

    let kinds: Vec<LineKind> = list.lines().iter().map(RequirementLine::kind).collect();
    assert_eq!(
        kinds,
        vec![
            LineKind::Comment,
            LineKind::Blank,
            LineKind::Blank,
            LineKind::Declaration,
            LineKind::Comment,
        ]
    );
}

#[test]
fn declarations_preserve_file_order() {
    let list = RequirementList::parse("pkgA==1.0\n# pin B below A\npkgB==2.0\n\npkgC>=3.0\n");

    let declarations: Vec<&str> = list.declarations().map(RequirementLine::trimmed).collect();
    assert_eq!(declarations, vec!["pkgA==1.0", "pkgB==2.0", "pkgC>=3.0"]);
    assert_eq!(list.declaration_count(), 3);
}

#[test]
fn final_line_without_trailing_newline_is_processed() {
    let list = RequirementList::parse("pkgA==1.0\npkgB==2.0");

    let declarations: Vec<&str> = list.declarations().map(RequirementLine::trimmed).collect();
    assert_eq!(declarations, vec!["pkgA==1.0", "pkgB==2.0"]);
}

#[test]
fn line_numbers_are_one_based_source_positions() {
    let list = RequirementList::parse("# header\n\npkgA==1.0\npkgB==2.0\n");

    let numbered: Vec<(usize, &str)> = list
        .declarations()
        .map(|line| (line.line_number(), line.trimmed()))
        .collect();
    assert_eq!(numbered, vec![(3, "pkgA==1.0"), (4, "pkgB==2.0")]);
}

#[test]
fn declaration_keeps_raw_text_and_trimmed_form() {
    let list = RequirementList::parse("  requests==2.32.0 \n");
    let line = &list.lines()[0];

    assert_eq!(line.raw(), "  requests==2.32.0 ");
    assert_eq!(line.trimmed(), "requests==2.32.0");
    assert!(line.is_declaration());
}

#[test]
fn empty_input_has_no_declarations() {
    let list = RequirementList::parse("");
    assert_eq!(list.declaration_count(), 0);
    assert!(list.lines().is_empty());
}

#[test]
fn parse_manifest_with_defaults() {
    let manifest = DeployManifest::from_toml_str("app = \"api.main:app\"\n").expect("must parse");

    assert_eq!(manifest.app, "api.main:app");
    assert_eq!(manifest.requirements, std::path::PathBuf::from("requirements.txt"));
    assert_eq!(manifest.python, "python3");
    assert_eq!(manifest.env_dir, std::path::PathBuf::from(".venv"));
    assert_eq!(manifest.server, ServerSettings::default());
}

#[test]
fn parse_manifest_with_full_server_section() {
    let content = r#"
app = "api.main:app"
requirements = "deploy/requirements.txt"
python = "python3.11"
env_dir = "envs/web"

[server]
host = "127.0.0.1"
port = 9000
workers = 4
"#;
    let manifest = DeployManifest::from_toml_str(content).expect("must parse");

    assert_eq!(manifest.python, "python3.11");
    assert_eq!(manifest.server.host, "127.0.0.1");
    assert_eq!(manifest.server.port, 9000);
    assert_eq!(manifest.server.workers, 4);
}

#[test]
fn manifest_rejects_entry_point_without_attribute() {
    let err = DeployManifest::from_toml_str("app = \"api.main\"\n").expect_err("must reject");
    assert!(
        err.to_string().contains("must use module:attribute form"),
        "unexpected error: {err}"
    );

    let err = DeployManifest::from_toml_str("app = \"api.main:\"\n").expect_err("must reject");
    assert!(
        err.to_string().contains("must name both a module and an attribute"),
        "unexpected error: {err}"
    );
}

#[test]
fn manifest_rejects_zero_port_and_zero_workers() {
    let err = DeployManifest::from_toml_str("app = \"api.main:app\"\n[server]\nport = 0\n")
        .expect_err("must reject");
    assert!(err.to_string().contains("port must not be 0"), "unexpected error: {err}");

    let err = DeployManifest::from_toml_str("app = \"api.main:app\"\n[server]\nworkers = 0\n")
        .expect_err("must reject");
    assert!(
        err.to_string().contains("workers must be at least 1"),
        "unexpected error: {err}"
    );
}

#[test]
fn load_optional_missing_manifest_reads_as_none() {
    let path = std::path::Path::new("stagehand-test-missing-manifest.toml");
    let loaded = DeployManifest::load_optional(path).expect("missing file must not error");
    assert!(loaded.is_none());
}
