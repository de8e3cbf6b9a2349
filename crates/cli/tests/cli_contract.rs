use assert_cmd::cargo::cargo_bin_cmd;
use doc_model::{AnnotationKind, Rect};
use pdf_engine::{MemoryDocument, MemoryPage};
use predicates::prelude::*;
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Two-page document for the memory backend.
fn write_fixture(dir: &Path) -> PathBuf {
    let document = MemoryDocument::new(vec![
        MemoryPage::new(300.0, 200.0)
            .with_line(20.0, 20.0, "The quick brown fox", "Helvetica", 10.0)
            .with_line(20.0, 40.0, "jumps over the dog", "Times-Bold", 12.0)
            .with_annotation(AnnotationKind::Text, Rect::new(200.0, 100.0, 220.0, 120.0), Some("note")),
        MemoryPage::new(300.0, 200.0).with_line(20.0, 20.0, "another fox", "Courier", 9.0),
    ]);

    let path = dir.join("doc.json");
    std::fs::write(&path, document.to_json().expect("fixture should serialise"))
        .expect("fixture should be written");
    path
}

fn vellum(data_dir: &Path) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("vellum-cli");
    cmd.env("VELLUM_DATA_DIR", data_dir).arg("--backend").arg("memory");
    cmd
}

fn stdout_json(cmd: &mut assert_cmd::Command) -> Value {
    let output = cmd.assert().success().get_output().stdout.clone();
    serde_json::from_slice(&output).expect("stdout should contain valid json")
}

#[test]
fn info_reports_pages() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let file = write_fixture(temp.path());

    let value = stdout_json(vellum(temp.path()).arg("info").arg(&file));

    assert_eq!(value["page_count"], 2);
    assert_eq!(value["page_sizes"][1][0].as_f64(), Some(300.0));
    assert!(value["title"].is_null());
}

#[test]
fn search_emits_stable_json_contract() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let file = write_fixture(temp.path());

    let mut value = stdout_json(vellum(temp.path()).arg("search").arg(&file).arg("FOX"));

    let hits = value["hits"].as_array_mut().expect("hits should be an array");
    for hit in hits.iter_mut() {
        assert!(hit["rect"]["x1"].as_f64() > hit["rect"]["x0"].as_f64());
        hit.as_object_mut().expect("hit should be an object").remove("rect");
    }

    insta::assert_json_snapshot!("cli_search_fox", value);
}

#[test]
fn search_respects_case_sensitivity() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let file = write_fixture(temp.path());

    let value =
        stdout_json(vellum(temp.path()).arg("search").arg(&file).arg("FOX").arg("--case-sensitive"));
    assert_eq!(value["count"], 0);
}

#[test]
fn words_lists_page_words_in_reading_order() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let file = write_fixture(temp.path());

    let value = stdout_json(vellum(temp.path()).arg("words").arg(&file).arg("--page").arg("2"));

    let texts: Vec<_> = value["words"]
        .as_array()
        .expect("words should be an array")
        .iter()
        .map(|word| word["text"].as_str().unwrap_or_default().to_owned())
        .collect();
    assert_eq!(texts, vec!["another", "fox"]);
}

#[test]
fn edit_replaces_word_and_writes_output() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let file = write_fixture(temp.path());
    let output = temp.path().join("out").join("edited.json");

    let value = stdout_json(
        vellum(temp.path())
            .arg("edit")
            .arg(&file)
            .args(["--page", "1", "--word", "over", "--with", "under", "--output"])
            .arg(&output),
    );

    assert_eq!(value["removed"], "over");
    assert_eq!(value["inserted"], "under");
    assert_eq!(value["font"], "Times-Bold");
    assert!(output.exists());

    vellum(temp.path())
        .arg("extract-text")
        .arg(&output)
        .args(["--page", "1", "--rect", "0,35,300,60"])
        .assert()
        .success()
        .stdout(predicate::str::contains("jumps under the dog"));
}

#[test]
fn edit_fails_for_missing_word() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let file = write_fixture(temp.path());

    vellum(temp.path())
        .arg("edit")
        .arg(&file)
        .args(["--word", "cat", "--with", "dog"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found on page 1"));
}

#[test]
fn extract_text_joins_lines() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let file = write_fixture(temp.path());

    vellum(temp.path())
        .arg("extract-text")
        .arg(&file)
        .args(["--rect", "15,15,68,50"])
        .assert()
        .success()
        .stdout("The quick\njumps over\n");
}

#[test]
fn screenshot_writes_clipped_png() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let file = write_fixture(temp.path());
    let output = temp.path().join("shot.png");

    vellum(temp.path())
        .arg("screenshot")
        .arg(&file)
        .args(["--rect", "250,150,400,400", "--scale", "2", "--output"])
        .arg(&output)
        .assert()
        .success();

    let image = image::open(&output).expect("screenshot should be readable image");
    assert_eq!((image.width(), image.height()), (100, 100));
}

#[test]
fn render_writes_png_file() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let file = write_fixture(temp.path());
    let output = temp.path().join("page.png");

    vellum(temp.path())
        .arg("render")
        .arg(&file)
        .args(["--page", "2", "--scale", "1.5", "--debug", "--output"])
        .arg(&output)
        .assert()
        .success();

    let image = image::open(&output).expect("render should be readable image");
    assert_eq!((image.width(), image.height()), (450, 300));
}

#[test]
fn render_refuses_scales_that_would_exhaust_memory() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let file = write_fixture(temp.path());
    let output = temp.path().join("huge.png");

    vellum(temp.path())
        .arg("render")
        .arg(&file)
        .args(["--scale", "100000", "--output"])
        .arg(&output)
        .assert()
        .failure()
        .stderr(predicate::str::contains("exceeds the limit"));
    assert!(!output.exists());
}

#[test]
fn page_out_of_range_is_reported() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let file = write_fixture(temp.path());

    vellum(temp.path())
        .arg("words")
        .arg(&file)
        .args(["--page", "5"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("page 5 out of range"));
}

#[test]
fn open_supports_dry_run_for_tests() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let file = write_fixture(temp.path());

    cargo_bin_cmd!("vellum-cli")
        .arg("open")
        .arg(&file)
        .env("VELLUM_TEST_NO_SPAWN", "1")
        .assert()
        .success()
        .stdout(predicate::str::contains("open:"));
}

#[test]
fn info_fails_for_missing_file() {
    let temp = tempfile::tempdir().expect("temp dir should be created");

    vellum(temp.path())
        .arg("info")
        .arg(temp.path().join("missing.json"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("file does not exist"));
}

#[test]
fn info_fails_for_invalid_document() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let file = temp.path().join("broken.json");
    std::fs::write(&file, "{ not json").expect("fixture should be written");

    vellum(temp.path())
        .arg("info")
        .arg(&file)
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to open document"));
}

#[test]
fn info_fails_for_encrypted_marker_pdf() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let file = temp.path().join("locked.pdf");
    std::fs::write(&file, b"%PDF-1.7\n1 0 obj << /Encrypt 2 0 R >> endobj\n%%EOF")
        .expect("fixture should be written");

    cargo_bin_cmd!("vellum-cli")
        .env("VELLUM_DATA_DIR", temp.path())
        .args(["--backend", "pdfium", "info"])
        .arg(&file)
        .assert()
        .failure()
        .stderr(predicate::str::contains("encrypted PDFs are not supported"));
}

#[test]
fn version_prints_package_version() {
    cargo_bin_cmd!("vellum-cli")
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}
