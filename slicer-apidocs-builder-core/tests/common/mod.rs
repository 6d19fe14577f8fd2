//! Local git fixtures: bare "remote" repositories seeded from scratch work trees.
#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Run git in `dir`, panicking with stderr on failure.
pub fn git(dir: &Path, args: &[&str]) -> String {
    let out = Command::new("git")
        .args(["-c", "user.name=Fixture", "-c", "user.email=fixture@example.com"])
        .args(args)
        .current_dir(dir)
        .output()
        .expect("git should run");
    assert!(
        out.status.success(),
        "git {:?} failed in {}: {}",
        args,
        dir.display(),
        String::from_utf8_lossy(&out.stderr)
    );
    String::from_utf8_lossy(&out.stdout).into_owned()
}

/// Create an empty bare repository whose default branch is `main`.
pub fn init_bare(path: &Path) -> PathBuf {
    fs::create_dir_all(path).unwrap();
    git(path, &["init", "--bare", "."]);
    git(path, &["symbolic-ref", "HEAD", "refs/heads/main"]);
    path.to_path_buf()
}

/// Work tree used to push content into a bare remote.
pub struct Seeder {
    pub work: PathBuf,
    pub remote: PathBuf,
}

impl Seeder {
    pub fn new(work: &Path, remote: &Path) -> Self {
        fs::create_dir_all(work).unwrap();
        git(work, &["init", "."]);
        Self {
            work: work.to_path_buf(),
            remote: remote.to_path_buf(),
        }
    }

    /// Commit `files` on `branch` and push it; returns the new commit SHA.
    pub fn commit(&self, branch: &str, files: &[(&str, &str)], message: &str) -> String {
        git(&self.work, &["symbolic-ref", "HEAD", &format!("refs/heads/{branch}")]);
        for (name, content) in files {
            let path = self.work.join(name);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).unwrap();
            }
            fs::write(path, content).unwrap();
        }
        git(&self.work, &["add", "--all"]);
        git(&self.work, &["commit", "-m", message]);
        let remote = self.remote.to_string_lossy().into_owned();
        git(&self.work, &["push", &remote, &format!("HEAD:refs/heads/{branch}")]);
        git(&self.work, &["rev-parse", "HEAD"]).trim().to_string()
    }

    pub fn tag(&self, name: &str) {
        git(&self.work, &["tag", name]);
        let remote = self.remote.to_string_lossy().into_owned();
        git(&self.work, &["push", &remote, name]);
    }
}

/// Files tracked on `branch` of a bare repository.
pub fn tracked_files(bare: &Path, branch: &str) -> Vec<String> {
    let mut files: Vec<String> = git(bare, &["ls-tree", "-r", "--name-only", branch])
        .lines()
        .map(String::from)
        .collect();
    files.sort();
    files
}

pub fn cmake_lists(major: u32, minor: u32) -> String {
    format!(
        "cmake_minimum_required(VERSION 3.16)\nproject(Slicer)\n\
         set(Slicer_VERSION_MAJOR \"{major}\")\nset(Slicer_VERSION_MINOR \"{minor}\")\n\
         set(Slicer_VERSION_PATCH \"0\")\n"
    )
}

/// Write `html/index.html` with `body` into a Doxygen output directory.
pub fn write_html(output_dir: &Path, body: &str) {
    let html = output_dir.join("html");
    fs::create_dir_all(&html).unwrap();
    fs::write(html.join("index.html"), body).unwrap();
}
