//! Offline fixtures for driving the binary: bare remotes and a cmake stand-in.
#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

pub fn git(dir: &Path, args: &[&str]) -> String {
    let out = Command::new("git")
        .args(["-c", "user.name=Fixture", "-c", "user.email=fixture@example.com"])
        .args(args)
        .current_dir(dir)
        .output()
        .expect("git should run");
    assert!(
        out.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&out.stderr)
    );
    String::from_utf8_lossy(&out.stdout).into_owned()
}

/// Bare repository at `<root>/<name>` seeded with `files` on `branch`.
pub fn seed_remote(
    root: &Path,
    name: &str,
    branch: &str,
    files: &[(&str, &str)],
    tag: Option<&str>,
) -> PathBuf {
    let remote = root.join(name);
    fs::create_dir_all(&remote).unwrap();
    git(&remote, &["init", "--bare", "."]);
    git(&remote, &["symbolic-ref", "HEAD", &format!("refs/heads/{branch}")]);

    let work = root.join(format!("seed-{}", name.replace('/', "-")));
    fs::create_dir_all(&work).unwrap();
    git(&work, &["init", "."]);
    git(&work, &["symbolic-ref", "HEAD", &format!("refs/heads/{branch}")]);
    for (file, content) in files {
        fs::write(work.join(file), content).unwrap();
    }
    git(&work, &["add", "--all"]);
    git(&work, &["commit", "-m", "init"]);
    let url = remote.to_string_lossy().into_owned();
    git(&work, &["push", &url, &format!("HEAD:refs/heads/{branch}")]);
    if let Some(tag) = tag {
        git(&work, &["tag", tag]);
        git(&work, &["push", &url, tag]);
    }
    remote
}

pub fn cmake_lists(major: u32, minor: u32) -> String {
    format!(
        "cmake_minimum_required(VERSION 3.16)\nproject(Slicer)\n\
         set(Slicer_VERSION_MAJOR \"{major}\")\nset(Slicer_VERSION_MINOR \"{minor}\")\n"
    )
}

/// cmake stand-in: `--build` writes the Doxygen entry point, configure is a no-op.
#[cfg(unix)]
pub fn fake_cmake(dir: &Path) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("fake-cmake");
    fs::write(
        &path,
        concat!(
            "#!/bin/sh\nif [ \"$1\" = \"--build\" ]; then\n",
            "  mkdir -p Utilities/Doxygen/html\n",
            "  echo \"<html>docs</html>\" > Utilities/Doxygen/html/index.html\n",
            "fi\n",
        ),
    )
    .unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}
