//! End-to-end clone runs against a local repository over `file://`.
//!
//! Skipped when `git` is not installed.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use pokeme_cloner::{CloneError, Cloner, Deploy};
use pokeme_core::{ClonerConfig, CommitId, Secrets};
use tempfile::TempDir;

fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args([
            "-c",
            "user.name=poke-me tests",
            "-c",
            "user.email=tests@poke-me.invalid",
            "-c",
            "commit.gpgsign=false",
        ])
        .args(args)
        .current_dir(dir)
        .output()
        .expect("spawn git");
    assert!(
        output.status.success(),
        "git {args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

struct Fixture {
    _root: TempDir,
    source: PathBuf,
    dest: PathBuf,
    config: ClonerConfig,
}

impl Fixture {
    fn new() -> Self {
        let root = TempDir::new().unwrap();
        let source = root.path().join("source");
        fs::create_dir_all(&source).unwrap();
        git(&source, &["init", "--quiet"]);

        let key = root.path().join("id_ed25519");
        fs::write(&key, "unused for file:// remotes").unwrap();

        let mut config = ClonerConfig::default();
        config.path = Some(root.path().join("deploy"));
        config.git.url = Some(format!("file://{}", source.display()));
        config.ssh.key = Some(key);

        Self {
            dest: root.path().join("deploy"),
            source,
            config,
            _root: root,
        }
    }

    fn commit(&self, files: &[(&str, &str)], message: &str) -> CommitId {
        for (rel, content) in files {
            let path = self.source.join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }
        git(&self.source, &["add", "--all"]);
        git(&self.source, &["commit", "--quiet", "-m", message]);
        CommitId::parse(&git(&self.source, &["rev-parse", "HEAD"])).unwrap()
    }

    fn cloner(&self) -> Cloner {
        Cloner::new(&self.config).unwrap()
    }
}

fn secrets() -> Secrets {
    [("db_password", "hunter2"), ("api_token", "tok-42")]
        .into_iter()
        .collect()
}

macro_rules! require_git {
    () => {
        if !git_available() {
            eprintln!("git not installed, skipping");
            return;
        }
    };
}

#[test]
fn clone_renders_placeholders_in_first_level_dirs() {
    require_git!();
    let fx = Fixture::new();
    let commit = fx.commit(
        &[
            ("README.md", "Uses {{db_password}}\n"),
            ("conf/app.env", "DB_PASSWORD={{db_password}}\nTOKEN={{ api_token }}\n"),
            ("conf/plain.txt", "nothing to see\n"),
        ],
        "initial",
    );

    let report = fx.cloner().deploy(&commit, &secrets(), false).unwrap();

    assert_eq!(
        fs::read_to_string(fx.dest.join("conf/app.env")).unwrap(),
        "DB_PASSWORD=hunter2\nTOKEN=tok-42\n"
    );
    assert_eq!(
        fs::read_to_string(fx.dest.join("conf/plain.txt")).unwrap(),
        "nothing to see\n"
    );
    assert_eq!(
        fs::read_to_string(fx.dest.join("README.md")).unwrap(),
        "Uses {{db_password}}\n",
        "top-level files are not rendered"
    );
    assert_eq!(report.commit, commit);
    assert_eq!(report.rendered, vec![fx.dest.join("conf/app.env")]);
    assert!(report.backup.is_none());
}

#[test]
fn redeploy_leaves_no_stale_files() {
    require_git!();
    let fx = Fixture::new();
    let first = fx.commit(&[("conf/old.env", "x=1\n")], "first");
    fx.cloner().deploy(&first, &secrets(), false).unwrap();
    assert!(fx.dest.join("conf/old.env").exists());

    git(&fx.source, &["rm", "--quiet", "conf/old.env"]);
    let second = fx.commit(&[("conf/new.env", "y=2\n")], "second");
    fx.cloner().deploy(&second, &secrets(), false).unwrap();

    assert!(!fx.dest.join("conf/old.env").exists());
    assert!(fx.dest.join("conf/new.env").exists());
}

#[test]
fn backup_preserves_previous_deployment() {
    require_git!();
    let fx = Fixture::new();
    let commit = fx.commit(&[("conf/app.env", "v={{api_token}}\n")], "initial");

    fs::create_dir_all(fx.dest.join("conf")).unwrap();
    fs::write(fx.dest.join("conf/local.env"), "hand edited\n").unwrap();

    let report = fx.cloner().deploy(&commit, &secrets(), true).unwrap();

    let backup = report.backup.expect("backup taken");
    assert_eq!(backup.parent(), fx.dest.parent());
    assert!(backup
        .file_name()
        .unwrap()
        .to_string_lossy()
        .starts_with("deploy."));
    assert_eq!(
        fs::read_to_string(backup.join("conf/local.env")).unwrap(),
        "hand edited\n"
    );
    assert!(!fx.dest.join("conf/local.env").exists());
    assert_eq!(
        fs::read_to_string(fx.dest.join("conf/app.env")).unwrap(),
        "v=tok-42\n"
    );
}

#[test]
fn backup_without_existing_destination_is_a_no_op() {
    require_git!();
    let fx = Fixture::new();
    let commit = fx.commit(&[("conf/a", "a\n")], "initial");
    let report = fx.cloner().deploy(&commit, &secrets(), true).unwrap();
    assert!(report.backup.is_none());
}

#[test]
fn missing_secret_fails_the_clone() {
    require_git!();
    let fx = Fixture::new();
    let commit = fx.commit(&[("conf/app.env", "X={{not_configured}}\n")], "initial");

    let err = fx.cloner().deploy(&commit, &secrets(), false).unwrap_err();

    assert!(matches!(err, CloneError::Render { .. }), "got {err}");
    assert_eq!(
        fs::read_to_string(fx.dest.join("conf/app.env")).unwrap(),
        "X={{not_configured}}\n",
        "the failing file is not half-rendered"
    );
}

#[test]
fn unknown_commit_fails_after_fresh_clone() {
    require_git!();
    let fx = Fixture::new();
    fx.commit(&[("conf/app.env", "v={{api_token}}\n")], "tip");

    fs::create_dir_all(fx.dest.join("conf")).unwrap();
    fs::write(fx.dest.join("conf/previous.env"), "old deployment\n").unwrap();

    let bogus = CommitId::parse("deadbeef").unwrap();
    let err = fx.cloner().deploy(&bogus, &secrets(), false).unwrap_err();

    assert!(matches!(err, CloneError::Git { op: "checkout", .. }), "got {err}");
    // Partial state: the branch tip as cloned, un-rendered, nothing old left.
    assert!(!fx.dest.join("conf/previous.env").exists());
    assert_eq!(
        fs::read_to_string(fx.dest.join("conf/app.env")).unwrap(),
        "v={{api_token}}\n"
    );
}

#[test]
fn unreachable_remote_is_a_clone_error() {
    require_git!();
    let fx = Fixture::new();
    let mut config = fx.config.clone();
    config.git.url = Some(format!("file://{}", fx.source.join("missing").display()));

    let commit = CommitId::parse("deadbeef").unwrap();
    let err = Cloner::new(&config)
        .unwrap()
        .deploy(&commit, &secrets(), false)
        .unwrap_err();
    assert!(matches!(err, CloneError::Git { op: "clone", .. }), "got {err}");
}

#[test]
fn configured_branch_is_cloned() {
    require_git!();
    let fx = Fixture::new();
    fx.commit(&[("conf/a", "main\n")], "main");
    git(&fx.source, &["checkout", "--quiet", "-b", "release"]);
    let release = fx.commit(&[("conf/a", "release {{api_token}}\n")], "release");
    git(&fx.source, &["checkout", "--quiet", "-"]);

    let mut config = fx.config.clone();
    config.git.branch = Some("release".to_string());
    Cloner::new(&config)
        .unwrap()
        .deploy(&release, &secrets(), false)
        .unwrap();

    assert_eq!(
        fs::read_to_string(fx.dest.join("conf/a")).unwrap(),
        "release tok-42\n"
    );
}
