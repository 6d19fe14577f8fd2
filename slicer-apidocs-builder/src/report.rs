//! Parameter reports printed around a build-and-publish run.
//!
//! The build prints a lot of text, so the same report is shown again once it
//! finishes.

use slicer_apidocs_builder_core::process::mask_secret;
use std::path::PathBuf;

/// Everything shown to the user before the pipeline starts.
#[derive(Clone)]
pub struct RunReport {
    pub repo_clone_url: String,
    pub repo_name: String,
    pub repo_branch: String,
    pub repo_tag: Option<String>,
    pub repo_dir: PathBuf,
    pub apidocs_src_dir: PathBuf,
    pub apidocs_build_dir: PathBuf,

    pub publish_username: String,
    pub publish_useremail: String,
    pub publish_repo_url: String,
    pub publish_repo_name: String,
    pub publish_repo_branch: String,
    pub publish_token: Option<String>,

    pub skip_clone: bool,
    pub skip_build: bool,
    pub skip_publish: Option<SkipPublish>,
}

/// Why publishing will not happen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipPublish {
    MissingToken,
    Requested,
}

impl SkipPublish {
    pub fn reason(&self) -> &'static str {
        match self {
            SkipPublish::MissingToken => "(missing GitHub token)",
            SkipPublish::Requested => "(--skip-publish argument)",
        }
    }
}

fn line(label: &str, value: impl std::fmt::Display) -> String {
    format!("  * {label:.<30}: {value}")
}

fn summary_line(label: &str, enabled: bool, reason: &str) -> String {
    format!("  * {label:.<30}: {enabled}   {reason}").trim_end().to_string()
}

impl RunReport {
    pub fn render(&self) -> String {
        let mut out = Vec::new();

        if !self.skip_build {
            out.push("\nApidocs building parameters".to_string());
            out.push(line("repo_clone_url ", &self.repo_clone_url));
            out.push(line("repo_name ", &self.repo_name));
            out.push(line("repo_branch ", &self.repo_branch));
            out.push(line(
                "repo_tag ",
                self.repo_tag.as_deref().unwrap_or("(none)"),
            ));
            out.push(line("repo_dir ", self.repo_dir.display()));
            out.push(line("apidocs_src_dir ", self.apidocs_src_dir.display()));
            out.push(line("apidocs_build_dir ", self.apidocs_build_dir.display()));
        }

        out.push("\nApidocs publishing parameters".to_string());
        out.push(line("username ", &self.publish_username));
        out.push(line("useremail ", &self.publish_useremail));
        out.push(line("repo_url ", &self.publish_repo_url));
        out.push(line("repo_name ", &self.publish_repo_name));
        out.push(line("repo_branch ", &self.publish_repo_branch));
        out.push(line(
            "github_token ",
            mask_secret(self.publish_token.as_deref()),
        ));

        let clone_reason = if self.skip_clone {
            format!("(found existing checkout: {})", self.repo_dir.display())
        } else {
            String::new()
        };
        let build_reason = if self.skip_build {
            "(--skip-build argument)"
        } else {
            ""
        };

        out.push("\nSummary:".to_string());
        out.push(summary_line(
            "cloning Slicer repository ",
            !self.skip_clone,
            &clone_reason,
        ));
        out.push(summary_line(
            "building doxygen ",
            !self.skip_build,
            build_reason,
        ));
        out.push(summary_line(
            "publishing on github.io ",
            self.skip_publish.is_none(),
            self.skip_publish.map_or("", |s| s.reason()),
        ));

        out.join("\n")
    }
}
