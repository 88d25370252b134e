use std::fs;
use std::path::Path;
use std::process::Command;

const SCENE: &str = r#"{
    "figure": { "position": [0, 0, 320, 240] },
    "children": [
        { "type": "axes", "name": "ax", "children": [
            { "type": "surface", "name": "surf", "x": [0, 1], "y": [0, 1], "z": [[0, 1], [1, 0]] },
            { "type": "text", "name": "title", "content": "Peaks", "font_size": 11 }
        ] }
    ]
}"#;

fn write_scene(dir: &Path) -> String {
    let path = dir.join("scene.json");
    fs::write(&path, SCENE).expect("write scene");
    path.to_string_lossy().into_owned()
}

fn figtex() -> Command {
    Command::new(assert_cmd::cargo_bin!("figtex"))
}

fn stderr_of(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn help_prints_usage() {
    let output = figtex().arg("--help").output().expect("run figtex");
    assert_eq!(output.status.code(), Some(2));
    assert!(stderr_of(&output).contains("USAGE:"));
}

#[test]
fn missing_format_is_a_config_error() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let scene = write_scene(tmp.path());
    let out = tmp.path().join("figure");

    let output = figtex()
        .args([out.to_string_lossy().as_ref(), scene.as_str()])
        .output()
        .expect("run figtex");

    assert_eq!(output.status.code(), Some(2));
    assert!(stderr_of(&output).contains("no output format"));
    let entries: Vec<_> = fs::read_dir(tmp.path()).unwrap().collect();
    assert_eq!(entries.len(), 1, "only the scene file may exist");
}

#[test]
fn malformed_crop_is_rejected() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let scene = write_scene(tmp.path());
    let out = tmp.path().join("figure.pdf");

    let output = figtex()
        .args([out.to_string_lossy().as_ref(), scene.as_str(), "-crop", "0,0,1"])
        .output()
        .expect("run figtex");

    assert_eq!(output.status.code(), Some(2));
    assert!(stderr_of(&output).contains("malformed crop"));
}

#[test]
fn out_of_range_quality_is_rejected() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let scene = write_scene(tmp.path());
    let out = tmp.path().join("figure.jpg");

    let output = figtex()
        .args([out.to_string_lossy().as_ref(), scene.as_str(), "-q0"])
        .output()
        .expect("run figtex");

    assert_eq!(output.status.code(), Some(2));
    assert!(stderr_of(&output).contains("JPEG quality"));
}

#[test]
fn unknown_raster_object_is_rejected() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let scene = write_scene(tmp.path());
    let out = tmp.path().join("figure.png");

    let output = figtex()
        .args([
            out.to_string_lossy().as_ref(),
            scene.as_str(),
            "-rasterize",
            "surf,nope",
        ])
        .output()
        .expect("run figtex");

    assert_eq!(output.status.code(), Some(2));
    assert!(stderr_of(&output).contains("no object named `nope`"));
}

#[test]
fn empty_stdin_means_no_scene() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let out = tmp.path().join("figure.eps");

    assert_cmd::Command::new(assert_cmd::cargo_bin!("figtex"))
        .args([out.to_string_lossy().as_ref(), "-"])
        .write_stdin("")
        .assert()
        .code(2);
}

#[test]
fn unreadable_scene_file_is_a_precondition_error() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let out = tmp.path().join("figure.pdf");
    let missing = tmp.path().join("missing.json");

    let output = figtex()
        .args([out.to_string_lossy().as_ref(), missing.to_string_lossy().as_ref()])
        .output()
        .expect("run figtex");

    assert_eq!(output.status.code(), Some(2));
    assert!(stderr_of(&output).contains("cannot read scene from"));
    assert!(!out.exists());
}

#[cfg(unix)]
#[test]
fn missing_latex_fails_without_leftovers() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let scene = write_scene(tmp.path());
    let work = tmp.path().join("work");
    fs::create_dir_all(&work).unwrap();
    let out = tmp.path().join("figure.pdf");

    let output = figtex()
        .env("FIGTEX_LATEX", tmp.path().join("no-such-latex"))
        .env("TMPDIR", &work)
        .env_remove("FIGTEX_KEEP_TEMP")
        .args([out.to_string_lossy().as_ref(), scene.as_str()])
        .output()
        .expect("run figtex");

    assert_eq!(output.status.code(), Some(1));
    assert!(stderr_of(&output).contains("latex failed"));
    assert!(!out.exists());
    assert_eq!(fs::read_dir(&work).unwrap().count(), 0);
}
