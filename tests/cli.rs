mod common;

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

fn cli(cwd: &Path) -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_musicl"));
    command.current_dir(cwd).env_remove("RUST_LOG");
    command
}

fn stdout(output: &Output) -> String {
    String::from_utf8(output.stdout.clone()).expect("stdout UTF-8")
}

#[test]
fn version_flag_prints_version() {
    let dir = tempfile::tempdir().unwrap();
    for flag in ["-v", "--version"] {
        let output = cli(dir.path()).arg(flag).output().expect("run musicl");
        assert!(output.status.success(), "{} exited with {:?}", flag, output.status);
        assert_eq!(
            stdout(&output).trim(),
            format!("Current version is {}", env!("CARGO_PKG_VERSION"))
        );
    }
}

#[test]
fn help_lists_genres() {
    let dir = tempfile::tempdir().unwrap();
    let output = cli(dir.path()).arg("--help").output().expect("run musicl");
    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains("Recognizable genres: Country music, Pop music"));
    assert!(text.contains("Authors:"));
}

#[test]
fn help_follows_configured_genres() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("musicl.json"),
        r#"{ "genres": [ { "code": "pop", "label": "Popular" }, { "code": "jazz", "label": "Jazz" } ] }"#,
    )
    .unwrap();

    let output = cli(dir.path()).arg("--help").output().expect("run musicl");
    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains("Recognizable genres: Popular, Jazz"), "{}", text);
    assert!(!text.contains("Country music"));
}

#[test]
fn missing_path_is_a_usage_error() {
    let dir = tempfile::tempdir().unwrap();
    let output = cli(dir.path()).output().expect("run musicl");
    assert!(!output.status.success());
}

#[test]
fn classify_prints_sorted_table() {
    let dir = tempfile::tempdir().unwrap();
    common::write_model(dir.path());
    common::write_wav(
        &dir.path().join("demo_song.wav"),
        &common::click_track(22050, 2.0),
        22050,
    );

    let output = cli(dir.path())
        .arg("demo_song.wav")
        .output()
        .expect("run musicl");
    assert!(
        output.status.success(),
        "musicl exited with {:?}: {}",
        output.status.code(),
        String::from_utf8_lossy(&output.stderr)
    );

    let text = stdout(&output);
    // Progress line first, ended by a carriage return so the report overwrites it
    let report = text
        .strip_prefix("Feature counting...\r")
        .unwrap_or_else(|| panic!("missing progress line:\n{:?}", text));
    let lines: Vec<&str> = report.lines().collect();
    assert_eq!(lines[0], "Probability of classes for song demo_song");
    // header + 3 borders + column titles + 7 genres
    assert_eq!(lines.len(), 12, "unexpected output:\n{}", report);
    assert!(lines[1].starts_with("+---"));
    assert!(lines[2].contains("Genre") && lines[2].contains("Probability"));
    assert!(lines[4].contains("Pop music") && lines[4].contains("50.0%"));
    assert!(lines[5].contains("Rock music") && lines[5].contains("30.0%"));
    assert!(lines[6].contains("Metal") && lines[6].contains("20.0%"));
    assert!(lines[7].contains("Country music") && lines[7].contains("0.0%"));
}

#[test]
fn config_file_overrides_model_path() {
    let dir = tempfile::tempdir().unwrap();
    let models = dir.path().join("models");
    fs::create_dir(&models).unwrap();
    common::write_model(&models);
    fs::write(
        dir.path().join("musicl.json"),
        r#"{ "model": { "path": "models/RF_classifier.json" } }"#,
    )
    .unwrap();
    common::write_wav(
        &dir.path().join("song.wav"),
        &common::click_track(22050, 1.5),
        22050,
    );

    let output = cli(dir.path()).arg("song.wav").output().expect("run musicl");
    assert!(
        output.status.success(),
        "{}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(stdout(&output).contains("Pop music"));
}

#[test]
fn missing_song_exits_with_one() {
    let dir = tempfile::tempdir().unwrap();
    common::write_model(dir.path());

    let output = cli(dir.path())
        .arg("does_not_exist.mp3")
        .output()
        .expect("run musicl");
    assert_eq!(output.status.code(), Some(1));
    assert!(!stdout(&output).contains("Probability of classes"));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Error"));
}

#[test]
fn missing_model_exits_with_one() {
    let dir = tempfile::tempdir().unwrap();
    common::write_wav(
        &dir.path().join("song.wav"),
        &common::click_track(22050, 1.0),
        22050,
    );

    let output = cli(dir.path()).arg("song.wav").output().expect("run musicl");
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("RF_classifier.json"));
    // The model is loaded before any progress is shown
    assert!(stdout(&output).is_empty());
}
