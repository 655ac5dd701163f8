mod common;

use common::{read_json, stderr_of, TestFixture};

#[test]
fn full_run_writes_all_three_pages() {
    let fixture = TestFixture::load("serum");
    let input = fixture.input_path();
    let out_dir = fixture.out_dir();
    let output = fixture.pforge(&[
        "run",
        "--input",
        input.to_str().expect("utf-8 path"),
        "--out-dir",
        out_dir.to_str().expect("utf-8 path"),
    ]);
    assert!(output.status.success(), "{}", stderr_of(&output));

    let faq = read_json(&out_dir.join("faq.json"));
    assert_eq!(faq["page_type"], "FAQ");
    let pairs = faq["qa_pairs"].as_array().expect("qa_pairs");
    assert_eq!(faq["total_questions"].as_u64(), Some(pairs.len() as u64));
    assert_eq!(
        faq["categories"],
        serde_json::json!(["Informational", "Safety", "Usage", "Purchase"])
    );

    let product = read_json(&out_dir.join("product_page.json"));
    assert_eq!(product["metadata"]["total_sections"], 6);
    assert_eq!(product["sections"][0]["section_name"], "Overview");

    let comparison = read_json(&out_dir.join("comparison_page.json"));
    assert!(!comparison["comparison_matrix"]
        .as_array()
        .expect("matrix")
        .is_empty());
    assert_eq!(comparison["product_a"]["product_name"], "GlowBoost Vitamin C Serum");
    assert_eq!(comparison["product_b"]["product_name"], "RadiantC Brightening Serum");

    let raw = std::fs::read_to_string(out_dir.join("product_page.json")).expect("read page");
    assert!(raw.contains("₹699"), "non-ASCII must be written as-is");

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.lines().count(), 3, "{stdout}");
}

#[test]
fn rate_limited_stage_recovers() {
    let fixture =
        TestFixture::load("serum").fail_schema("question_list", 2, "429 rate_limit exceeded");
    let input = fixture.input_path();
    let out_dir = fixture.out_dir();
    let lm_log = fixture.temp.path().join("lm.jsonl");
    let output = fixture.pforge(&[
        "run",
        "--input",
        input.to_str().expect("utf-8 path"),
        "--out-dir",
        out_dir.to_str().expect("utf-8 path"),
        "--lm-log",
        lm_log.to_str().expect("utf-8 path"),
    ]);
    assert!(output.status.success(), "{}", stderr_of(&output));
    assert!(out_dir.join("comparison_page.json").exists());

    let log = std::fs::read_to_string(&lm_log).expect("read lm log");
    let first: serde_json::Value =
        serde_json::from_str(log.lines().next().expect("first entry")).expect("parse entry");
    assert_eq!(first["schema"], "question_list");
    assert_eq!(first["attempts"], 3);
    assert_eq!(first["outcome"], "success");
    assert_eq!(log.lines().count(), 6);
}

#[test]
fn persistent_failure_halts_and_keeps_earlier_pages() {
    let fixture =
        TestFixture::load("serum").fail_schema("product_page_content", 100, "503 overloaded");
    let input = fixture.input_path();
    let out_dir = fixture.out_dir();
    let record_path = fixture.temp.path().join("record.json");
    let output = fixture.pforge(&[
        "run",
        "--input",
        input.to_str().expect("utf-8 path"),
        "--out-dir",
        out_dir.to_str().expect("utf-8 path"),
        "--record",
        record_path.to_str().expect("utf-8 path"),
    ]);
    assert!(!output.status.success());
    assert!(stderr_of(&output).contains("product_page"), "{}", stderr_of(&output));

    assert!(out_dir.join("faq.json").exists());
    assert!(!out_dir.join("product_page.json").exists());
    assert!(!out_dir.join("comparison_page.json").exists());

    let report = read_json(&record_path);
    assert_eq!(report["record"]["error"]["stage"], "product_page");
    assert_eq!(report["record"]["error"]["kind"], "generation");
    assert!(report["record"].get("competitor").is_none());
    assert_eq!(report["states"].as_array().expect("states").last(), Some(&serde_json::json!("FAILED")));
}

#[test]
fn empty_input_fails_at_parse() {
    let fixture = TestFixture::load("serum");
    let input = fixture.write_temp("empty.json", "{}");
    let out_dir = fixture.out_dir();
    let output = fixture.pforge(&[
        "run",
        "--input",
        input.to_str().expect("utf-8 path"),
        "--out-dir",
        out_dir.to_str().expect("utf-8 path"),
    ]);
    assert!(!output.status.success());
    assert!(
        stderr_of(&output).contains("No raw product data provided"),
        "{}",
        stderr_of(&output)
    );
    assert!(!out_dir.join("faq.json").exists());
}

#[test]
fn non_object_input_is_rejected() {
    let fixture = TestFixture::load("serum");
    let input = fixture.write_temp("list.json", r#"["GlowBoost"]"#);
    let output = fixture.pforge(&["run", "--input", input.to_str().expect("utf-8 path")]);
    assert!(!output.status.success());
    assert!(stderr_of(&output).contains("must be a JSON object"), "{}", stderr_of(&output));
}

#[test]
fn parse_prints_product_with_defaults() {
    let fixture = TestFixture::load("serum");
    let input = fixture.write_temp(
        "sparse.json",
        r#"{"product_name": "Test", "price": "₹500"}"#,
    );
    let output = fixture.pforge(&["parse", "--input", input.to_str().expect("utf-8 path")]);
    assert!(output.status.success(), "{}", stderr_of(&output));

    let product: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("parse stdout JSON");
    assert_eq!(product["product_name"], "Test");
    assert_eq!(product["price"], "₹500");
    assert_eq!(product["skin_type"], serde_json::json!([]));
}

#[test]
fn parse_rejects_wrong_field_type() {
    let fixture = TestFixture::load("serum");
    let input = fixture.write_temp("bad.json", r#"{"product_name": "Test", "price": 500}"#);
    let output = fixture.pforge(&["parse", "--input", input.to_str().expect("utf-8 path")]);
    assert!(!output.status.success());
    assert!(stderr_of(&output).contains("price"), "{}", stderr_of(&output));
}

#[test]
fn openai_backend_without_key_is_a_config_error() {
    let fixture = TestFixture::load("serum");
    let input = fixture.input_path();
    let output = fixture.pforge(&[
        "run",
        "--backend",
        "openai",
        "--input",
        input.to_str().expect("utf-8 path"),
    ]);
    assert!(!output.status.success());
    assert!(stderr_of(&output).contains("OPENAI_API_KEY"), "{}", stderr_of(&output));
}
