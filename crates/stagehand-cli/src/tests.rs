use std::path::Path;

use stagehand_installer::{
    requirements_fingerprint, EnvLayout, InstallFailure, InstallReceipt, InstallReport,
    VerifyCheck, VerifyReport,
};

use crate::flows::{
    format_doctor_lines, install_report_json, probe_url, resolve_port, resolve_workers,
    verify_report_json,
};
use crate::render::{render_status_line, OutputStyle};

#[test]
fn port_resolution_prefers_flag_then_environment_then_fallback() {
    assert_eq!(
        resolve_port(Some(9000), Some("7000"), 8000).expect("must resolve"),
        9000
    );
    assert_eq!(
        resolve_port(None, Some("7000"), 8000).expect("must resolve"),
        7000
    );
    assert_eq!(resolve_port(None, None, 8000).expect("must resolve"), 8000);
}

#[test]
fn port_resolution_rejects_invalid_values() {
    let err = resolve_port(None, Some("not-a-port"), 8000).expect_err("must reject");
    assert!(
        format!("{err:#}").contains("invalid PORT value: not-a-port"),
        "unexpected error: {err:#}"
    );

    let err = resolve_port(None, Some("0"), 8000).expect_err("must reject");
    assert!(err.to_string().contains("PORT must not be 0"), "unexpected error: {err}");

    let err = resolve_port(Some(0), None, 8000).expect_err("must reject");
    assert!(err.to_string().contains("port must not be 0"), "unexpected error: {err}");
}

#[test]
fn worker_resolution_prefers_flag_then_environment_then_fallback() {
    assert_eq!(
        resolve_workers(Some(4), Some("2"), 1).expect("must resolve"),
        4
    );
    assert_eq!(resolve_workers(None, Some("2"), 1).expect("must resolve"), 2);
    assert_eq!(resolve_workers(None, None, 1).expect("must resolve"), 1);
}

#[test]
fn worker_resolution_rejects_zero_and_garbage() {
    let err = resolve_workers(None, Some("many"), 1).expect_err("must reject");
    assert!(
        format!("{err:#}").contains("invalid WORKERS value: many"),
        "unexpected error: {err:#}"
    );

    let err = resolve_workers(None, Some("0"), 1).expect_err("must reject");
    assert!(
        err.to_string().contains("WORKERS must be at least 1"),
        "unexpected error: {err}"
    );

    let err = resolve_workers(Some(0), None, 1).expect_err("must reject");
    assert!(
        err.to_string().contains("workers must be at least 1"),
        "unexpected error: {err}"
    );
}

#[test]
fn probe_url_routes_wildcard_binds_through_loopback() {
    assert_eq!(probe_url("0.0.0.0", 8000), "http://127.0.0.1:8000/");
    assert_eq!(probe_url("10.0.0.5", 9000), "http://10.0.0.5:9000/");
}

#[test]
fn plain_status_lines_align_the_status_tag() {
    assert_eq!(
        render_status_line(OutputStyle::Plain, None, "step", "installing pkgA==1.0"),
        "step installing pkgA==1.0"
    );
    assert_eq!(
        render_status_line(OutputStyle::Plain, None, "ok", "installed pkgA==1.0"),
        "  ok installed pkgA==1.0"
    );
}

#[test]
fn timestamped_status_lines_carry_the_clock_prefix() {
    assert_eq!(
        render_status_line(
            OutputStyle::Plain,
            Some("12:34:56".to_string()),
            "fail",
            "installation failed: pkgB==2.0"
        ),
        "12:34:56 fail installation failed: pkgB==2.0"
    );
}

#[test]
fn doctor_lines_without_receipt_report_fresh_state() {
    let layout = EnvLayout::new("/nonexistent/env");
    let lines = format_doctor_lines(&layout, None, None, Path::new("requirements.txt"));

    assert!(lines[0].starts_with("prefix: "));
    assert!(lines
        .iter()
        .any(|line| line.contains("interpreter:") && line.contains("missing")));
    assert!(lines.contains(&"no successful install recorded".to_string()));
}

#[test]
fn doctor_lines_detect_requirements_drift() {
    let layout = EnvLayout::new("/nonexistent/env");
    let installed_content = "pkgA==1.0\n";
    let receipt = InstallReceipt {
        requirements_sha256: requirements_fingerprint(installed_content),
        installed: vec!["pkgA==1.0".to_string()],
        completed_at_unix: 1_771_001_234,
    };

    let unchanged = format_doctor_lines(
        &layout,
        Some(&receipt),
        Some(installed_content),
        Path::new("requirements.txt"),
    );
    assert!(unchanged.contains(&"requirements unchanged since last install".to_string()));

    let drifted = format_doctor_lines(
        &layout,
        Some(&receipt),
        Some("pkgA==1.0\npkgB==2.0\n"),
        Path::new("requirements.txt"),
    );
    assert!(drifted.contains(&"requirements drift: file changed since last install".to_string()));

    let no_file = format_doctor_lines(&layout, Some(&receipt), None, Path::new("deploy/req.txt"));
    assert!(no_file.contains(&"requirements file not found: deploy/req.txt".to_string()));
}

#[test]
fn install_report_json_carries_failure_details() {
    let success = InstallReport {
        attempted: 2,
        installed: vec!["pkgA==1.0".to_string(), "pkgB==2.0".to_string()],
        failure: None,
    };
    let value = install_report_json(&success);
    assert_eq!(value["attempted"], 2);
    assert!(value["failure"].is_null());

    let aborted = InstallReport {
        attempted: 2,
        installed: vec!["pkgA==1.0".to_string()],
        failure: Some(InstallFailure {
            declaration: "pkgB==2.0".to_string(),
            line_number: 2,
            diagnostics: "ERROR: boom".to_string(),
        }),
    };
    let value = install_report_json(&aborted);
    assert_eq!(value["failure"]["declaration"], "pkgB==2.0");
    assert_eq!(value["failure"]["line"], 2);
    assert_eq!(value["installed"][0], "pkgA==1.0");
}

#[test]
fn verify_report_json_flags_overall_presence() {
    let report = VerifyReport {
        checks: vec![
            VerifyCheck {
                name: "pkga".to_string(),
                declaration: "pkga==1.0".to_string(),
                present: true,
            },
            VerifyCheck {
                name: "pkgb".to_string(),
                declaration: "pkgb==2.0".to_string(),
                present: false,
            },
        ],
    };
    let value = verify_report_json(&report);
    assert_eq!(value["all_present"], false);
    assert_eq!(value["checks"][1]["name"], "pkgb");
    assert_eq!(value["checks"][1]["present"], false);
}
