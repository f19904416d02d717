//! End-to-end tests running the studio-rs binary on synthetic model files

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

#[path = "../../file-formats/graphics/studio-model/tests/common/mod.rs"]
mod common;

use common::{CHECKSUM, sample_mdl, sample_vtx, sample_vvd};

/// Write a model and its companions into a fresh directory
fn write_model(dir: &TempDir) -> PathBuf {
    let mdl = dir.path().join("crate.mdl");
    fs::write(&mdl, sample_mdl(48)).unwrap();
    fs::write(dir.path().join("crate.vvd"), sample_vvd(CHECKSUM, 6)).unwrap();
    fs::write(
        dir.path().join("crate.dx90.vtx"),
        sample_vtx(CHECKSUM, 2, false),
    )
    .unwrap();
    mdl
}

fn studio_rs() -> Command {
    Command::cargo_bin("studio-rs").unwrap()
}

#[test]
fn test_mdl_info() {
    let dir = TempDir::new().unwrap();
    let mdl = write_model(&dir);

    studio_rs()
        .args(["mdl", "info"])
        .arg(&mdl)
        .assert()
        .success()
        .stdout(predicate::str::contains("Name: props/crate"))
        .stdout(predicate::str::contains("Version: 48"))
        .stdout(predicate::str::contains("Bones: 4 (2 roots)"))
        .stdout(predicate::str::contains("Animations: 3"));
}

#[test]
fn test_mdl_tree() {
    let dir = TempDir::new().unwrap();
    let mdl = write_model(&dir);

    studio_rs()
        .args(["mdl", "tree", "--no-color"])
        .arg(&mdl)
        .assert()
        .success()
        .stdout(predicate::str::contains("crate.mdl"))
        .stdout(predicate::str::contains("[3] head"))
        .stdout(predicate::str::contains("crate_ref"))
        .stdout(predicate::str::contains("materials/models/props/crate_wood.vmt"));
}

#[test]
fn test_mdl_bones() {
    let dir = TempDir::new().unwrap();
    let mdl = write_model(&dir);

    studio_rs()
        .args(["mdl", "bones", "--world"])
        .arg(&mdl)
        .assert()
        .success()
        .stdout(predicate::str::contains("    [3] head (4.000, 0.000, 0.000)"))
        .stdout(predicate::str::contains("[2] prop (2.000, 0.000, 0.000)"));
}

#[test]
fn test_mdl_anims() {
    let dir = TempDir::new().unwrap();
    let mdl = write_model(&dir);

    studio_rs()
        .args(["mdl", "anims"])
        .arg(&mdl)
        .assert()
        .success()
        .stdout(predicate::str::contains("idle"))
        .stdout(predicate::str::contains("4 x 2 frames (1 external)"));

    studio_rs()
        .args(["mdl", "anims", "--anim", "idle", "--frame", "0"])
        .arg(&mdl)
        .assert()
        .success()
        .stdout(predicate::str::contains("'idle' frame 0/3"))
        .stdout(predicate::str::contains("pos (1.000, -2.000, 0.500)"));

    studio_rs()
        .args(["mdl", "anims", "--anim", "run", "--frame", "2"])
        .arg(&mdl)
        .assert()
        .success()
        .stdout(predicate::str::contains("external animation block 1"));

    studio_rs()
        .args(["mdl", "anims", "--anim", "walk"])
        .arg(&mdl)
        .assert()
        .failure()
        .stderr(predicate::str::contains("No animation named 'walk'"));
}

#[test]
fn test_mdl_check() {
    let dir = TempDir::new().unwrap();
    let mdl = write_model(&dir);

    studio_rs()
        .args(["mdl", "check"])
        .arg(&mdl)
        .assert()
        .success()
        .stdout(predicate::str::contains("MDL, VVD and VTX match"))
        .stdout(predicate::str::contains("body part 0 model 0 lod 0: 2 triangles"));
}

#[test]
fn test_mdl_check_checksum_mismatch() {
    let dir = TempDir::new().unwrap();
    let mdl = write_model(&dir);
    fs::write(dir.path().join("crate.vvd"), sample_vvd(1, 6)).unwrap();

    studio_rs()
        .args(["mdl", "check"])
        .arg(&mdl)
        .assert()
        .failure()
        .stderr(predicate::str::contains("VVD checksum"));
}

#[test]
fn test_vvd_info() {
    let dir = TempDir::new().unwrap();
    write_model(&dir);

    studio_rs()
        .args(["vvd", "info", "--lod", "0"])
        .arg(dir.path().join("crate.vvd"))
        .assert()
        .success()
        .stdout(predicate::str::contains("Vertices: 6"))
        .stdout(predicate::str::contains("[5] (5.000, 0.000, 0.000)"));
}

#[test]
fn test_vtx_info_and_tree() {
    let dir = TempDir::new().unwrap();
    write_model(&dir);
    let vtx = dir.path().join("crate.dx90.vtx");

    studio_rs()
        .args(["vtx", "info"])
        .arg(&vtx)
        .assert()
        .success()
        .stdout(predicate::str::contains("Strips: 2"))
        .stdout(predicate::str::contains("LOD 0 replaces material 1 with crate_lod1"));

    studio_rs()
        .args(["vtx", "tree", "--no-color"])
        .arg(&vtx)
        .assert()
        .success()
        .stdout(predicate::str::contains("strip group 0"));
}

#[test]
fn test_missing_file() {
    studio_rs()
        .args(["mdl", "info", "/nonexistent/crate.mdl"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load MDL model"));
}

#[test]
fn test_completions() {
    studio_rs()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("studio-rs"));
}
