/// The version log: a thin facade over an embedded git repository.
///
/// Commits are *scoped*: [`VersionLog::commit_scope`] stages exactly the
/// listed paths and records one commit, so per-element history stays clean
/// and [`VersionLog::history`] can answer folder-scoped queries. The
/// databases under `.aecos/` and the regulatory backups are ignored so the
/// working tree reflects only design content.
use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use git2::build::CheckoutBuilder;
use git2::{BranchType, DiffFormat, DiffOptions, IndexAddOption, Repository, Signature, Sort};
use serde::Serialize;

const COMMITTER_NAME: &str = "AEC OS";
const COMMITTER_EMAIL: &str = "aecos@localhost";

const DEFAULT_GITIGNORE: &str = "\
# AEC OS databases and temporaries
.aecos/
.regulatory_backups/
*.log
*.tmp

# Large binary outputs (track IFC via LFS instead)
*.obj
*.stl
*.fbx

# OS files
.DS_Store
Thumbs.db
";

const DEFAULT_GITATTRIBUTES: &str = "\
# Consistent line endings for text artifacts
*.json text eol=lf
*.md text eol=lf

# IFC files tracked via Git LFS when available
*.ifc filter=lfs diff=lfs merge=lfs -text
";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors produced by the version log.
#[derive(Debug)]
pub enum VersionError {
    /// An underlying git operation failed.
    Git(git2::Error),
    /// A filesystem operation outside git failed.
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    /// A merge stopped on conflicting changes; the merge state was cleaned
    /// up and the target branch left unchanged.
    MergeConflict {
        source_branch: String,
    },
}

impl fmt::Display for VersionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Git(e) => write!(f, "git error: {e}"),
            Self::Io { path, source } => write!(f, "I/O error at {}: {source}", path.display()),
            Self::MergeConflict { source_branch } => {
                write!(f, "merge of '{source_branch}' has conflicts")
            }
        }
    }
}

impl std::error::Error for VersionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Git(e) => Some(e),
            Self::Io { source, .. } => Some(source),
            Self::MergeConflict { .. } => None,
        }
    }
}

impl From<git2::Error> for VersionError {
    fn from(e: git2::Error) -> Self {
        Self::Git(e)
    }
}

/// A single entry from the scoped commit history, newest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    /// Short commit token.
    pub token: String,
    pub author: String,
    /// ISO-8601 commit instant.
    pub date: String,
    pub message: String,
}

// ---------------------------------------------------------------------------
// VersionLog
// ---------------------------------------------------------------------------

/// Scoped commit log over the project directory tree.
pub struct VersionLog {
    repo: Repository,
    workdir: PathBuf,
}

impl fmt::Debug for VersionLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VersionLog")
            .field("workdir", &self.workdir)
            .finish()
    }
}

impl VersionLog {
    /// Opens the repository at `path`, initialising one (with ignore and
    /// attribute defaults plus a root commit) when none exists.
    pub fn open_or_init(path: &Path) -> Result<Self, VersionError> {
        match Repository::open(path) {
            Ok(repo) => Ok(Self::wrap(repo, path)),
            Err(_) => Self::init(path),
        }
    }

    /// Initialises a repository with AEC OS defaults and a root commit.
    pub fn init(path: &Path) -> Result<Self, VersionError> {
        std::fs::create_dir_all(path).map_err(|source| VersionError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let repo = Repository::init(path)?;
        {
            let mut config = repo.config()?;
            config.set_str("user.name", COMMITTER_NAME)?;
            config.set_str("user.email", COMMITTER_EMAIL)?;
            config.set_str("commit.gpgsign", "false")?;
        }

        write_if_absent(&path.join(".gitignore"), DEFAULT_GITIGNORE)?;
        write_if_absent(&path.join(".gitattributes"), DEFAULT_GITATTRIBUTES)?;

        let log = Self::wrap(repo, path);
        log.commit_scope(
            &[PathBuf::from(".gitignore"), PathBuf::from(".gitattributes")],
            "chore: initialise repository",
        )?;
        Ok(log)
    }

    fn wrap(repo: Repository, path: &Path) -> Self {
        let workdir = repo
            .workdir()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| path.to_path_buf());
        Self { repo, workdir }
    }

    /// The repository working directory.
    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    fn signature(&self) -> Result<Signature<'static>, VersionError> {
        Ok(Signature::now(COMMITTER_NAME, COMMITTER_EMAIL)?)
    }

    /// Makes `path` relative to the working directory, as a pathspec string.
    fn pathspec(&self, path: &Path) -> String {
        let rel = path.strip_prefix(&self.workdir).unwrap_or(path);
        rel.components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }

    // -- Commits ------------------------------------------------------------

    /// Stages exactly `paths` (additions, modifications, and deletions) and
    /// records one commit.
    ///
    /// Returns the short commit token, or an empty string when the staged
    /// tree equals HEAD (no commit is created for an empty diff).
    pub fn commit_scope(&self, paths: &[PathBuf], message: &str) -> Result<String, VersionError> {
        let specs: Vec<String> = paths.iter().map(|p| self.pathspec(p)).collect();
        let mut index = self.repo.index()?;
        // update_all stages deletions and modifications of tracked files;
        // add_all picks up new files under the same pathspecs.
        index.update_all(specs.iter().map(String::as_str), None)?;
        index.add_all(specs.iter().map(String::as_str), IndexAddOption::DEFAULT, None)?;
        index.write()?;
        self.commit_index(message)
    }

    /// Stages every pending change in the working tree and records one
    /// commit. Returns the short token, or an empty string when clean.
    pub fn commit_all(&self, message: &str) -> Result<String, VersionError> {
        let mut index = self.repo.index()?;
        index.update_all(std::iter::once("."), None)?;
        index.add_all(std::iter::once("."), IndexAddOption::DEFAULT, None)?;
        index.write()?;
        self.commit_index(message)
    }

    fn commit_index(&self, message: &str) -> Result<String, VersionError> {
        let mut index = self.repo.index()?;
        let tree_id = index.write_tree()?;

        let parent = match self.repo.head() {
            Ok(head) => Some(head.peel_to_commit()?),
            Err(_) => None,
        };
        if let Some(parent_commit) = &parent {
            if parent_commit.tree_id() == tree_id {
                return Ok(String::new());
            }
        }

        let tree = self.repo.find_tree(tree_id)?;
        let sig = self.signature()?;
        let parents: Vec<&git2::Commit<'_>> = parent.iter().collect();
        let oid = self
            .repo
            .commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)?;
        Ok(short_token(oid))
    }

    // -- History and diffs --------------------------------------------------

    /// Returns the commit history touching `path`, newest first, bounded by
    /// `limit`.
    pub fn history(&self, path: &Path, limit: usize) -> Result<Vec<LogEntry>, VersionError> {
        let spec = self.pathspec(path);
        let mut walk = self.repo.revwalk()?;
        if walk.push_head().is_err() {
            return Ok(Vec::new());
        }
        walk.set_sorting(Sort::TIME)?;

        let mut entries = Vec::new();
        for oid in walk {
            if entries.len() >= limit {
                break;
            }
            let commit = self.repo.find_commit(oid?)?;
            if self.commit_touches(&commit, &spec)? {
                entries.push(LogEntry {
                    token: short_token(commit.id()),
                    author: commit.author().name().unwrap_or("").to_owned(),
                    date: iso_instant(commit.time().seconds()),
                    message: commit.summary().unwrap_or("").to_owned(),
                });
            }
        }
        Ok(entries)
    }

    fn commit_touches(&self, commit: &git2::Commit<'_>, spec: &str) -> Result<bool, VersionError> {
        let tree = commit.tree()?;
        let parent_tree = match commit.parent(0) {
            Ok(parent) => Some(parent.tree()?),
            Err(_) => None,
        };
        let mut opts = DiffOptions::new();
        opts.pathspec(spec);
        let diff =
            self.repo
                .diff_tree_to_tree(parent_tree.as_ref(), Some(&tree), Some(&mut opts))?;
        Ok(diff.deltas().len() > 0)
    }

    /// Returns a textual diff of `path` between two revision selectors.
    pub fn diff(&self, path: &Path, from: &str, to: &str) -> Result<String, VersionError> {
        let spec = self.pathspec(path);
        let from_tree = self.repo.revparse_single(from)?.peel_to_tree()?;
        let to_tree = self.repo.revparse_single(to)?.peel_to_tree()?;

        let mut opts = DiffOptions::new();
        opts.pathspec(spec.as_str());
        let diff =
            self.repo
                .diff_tree_to_tree(Some(&from_tree), Some(&to_tree), Some(&mut opts))?;

        let mut out = String::new();
        diff.print(DiffFormat::Patch, |_delta, _hunk, line| {
            let origin = line.origin();
            if origin == '+' || origin == '-' || origin == ' ' {
                out.push(origin);
            }
            if let Ok(content) = std::str::from_utf8(line.content()) {
                out.push_str(content);
            }
            true
        })?;
        Ok(out)
    }

    // -- Branch graph operations --------------------------------------------

    /// Creates a branch off `base` (or HEAD) and switches to it.
    pub fn branch(&self, name: &str, base: Option<&str>) -> Result<(), VersionError> {
        let target = match base {
            Some(rev) => self.repo.revparse_single(rev)?.peel_to_commit()?,
            None => self.repo.head()?.peel_to_commit()?,
        };
        self.repo.branch(name, &target, false)?;
        self.switch(name)
    }

    /// Switches to an existing branch.
    pub fn switch(&self, name: &str) -> Result<(), VersionError> {
        let refname = format!("refs/heads/{name}");
        // Refuse to clobber uncommitted changes (safe checkout).
        let obj = self.repo.revparse_single(&refname)?;
        self.repo
            .checkout_tree(&obj, Some(CheckoutBuilder::new().safe()))?;
        self.repo.set_head(&refname)?;
        Ok(())
    }

    /// Merges `source` into `target` (or the current branch) with a merge
    /// commit, returning the resulting short token.
    ///
    /// When `source` is already contained in the target, no commit is
    /// created and the current HEAD token is returned.
    pub fn merge(
        &self,
        source: &str,
        target: Option<&str>,
        message: Option<&str>,
    ) -> Result<String, VersionError> {
        if let Some(target_branch) = target {
            self.switch(target_branch)?;
        }

        let source_commit = self
            .repo
            .find_branch(source, BranchType::Local)?
            .get()
            .peel_to_commit()?;
        let annotated = self.repo.find_annotated_commit(source_commit.id())?;
        let (analysis, _) = self.repo.merge_analysis(&[&annotated])?;

        let head_commit = self.repo.head()?.peel_to_commit()?;
        if analysis.is_up_to_date() {
            return Ok(short_token(head_commit.id()));
        }

        self.repo.merge(&[&annotated], None, None)?;
        let mut index = self.repo.index()?;
        if index.has_conflicts() {
            self.repo.cleanup_state()?;
            return Err(VersionError::MergeConflict {
                source_branch: source.to_owned(),
            });
        }

        let tree_id = index.write_tree_to(&self.repo)?;
        let tree = self.repo.find_tree(tree_id)?;
        let sig = self.signature()?;
        let default_message = format!("Merge branch '{source}'");
        let message = message.unwrap_or(&default_message);
        let oid = self.repo.commit(
            Some("HEAD"),
            &sig,
            &sig,
            message,
            &tree,
            &[&head_commit, &source_commit],
        )?;
        self.repo.cleanup_state()?;
        self.repo
            .checkout_head(Some(CheckoutBuilder::new().force()))?;
        Ok(short_token(oid))
    }

    /// Lists local branch names.
    pub fn list_branches(&self) -> Result<Vec<String>, VersionError> {
        let mut names = Vec::new();
        for branch in self.repo.branches(Some(BranchType::Local))? {
            let (branch, _) = branch?;
            if let Some(name) = branch.name()? {
                names.push(name.to_owned());
            }
        }
        Ok(names)
    }

    /// Deletes a local branch (must not be the current branch).
    pub fn delete_branch(&self, name: &str) -> Result<(), VersionError> {
        let mut branch = self.repo.find_branch(name, BranchType::Local)?;
        branch.delete()?;
        Ok(())
    }

    /// The name of the current branch.
    pub fn current_branch(&self) -> Result<String, VersionError> {
        let head = self.repo.head()?;
        Ok(head.shorthand().unwrap_or("HEAD").to_owned())
    }

    // -- Tags ---------------------------------------------------------------

    /// Creates an annotated tag on HEAD.
    pub fn tag(&self, name: &str, message: &str) -> Result<(), VersionError> {
        let head = self.repo.head()?.peel(git2::ObjectType::Commit)?;
        let sig = self.signature()?;
        self.repo.tag(name, &head, &sig, message, false)?;
        Ok(())
    }

    /// Lists tag names, optionally filtered by a glob pattern.
    pub fn list_tags(&self, pattern: Option<&str>) -> Result<Vec<String>, VersionError> {
        let names = self.repo.tag_names(pattern)?;
        Ok(names.iter().flatten().map(str::to_owned).collect())
    }

    // -- Status -------------------------------------------------------------

    /// Returns `true` when the working tree equals HEAD.
    pub fn is_clean(&self) -> Result<bool, VersionError> {
        Ok(self.status_entries()?.is_empty())
    }

    /// A porcelain-style status listing, one `XY path` line per entry.
    pub fn status(&self) -> Result<String, VersionError> {
        let mut out = String::new();
        for (code, path) in self.status_entries()? {
            out.push_str(&format!("{code} {path}\n"));
        }
        Ok(out)
    }

    fn status_entries(&self) -> Result<Vec<(String, String)>, VersionError> {
        let mut opts = git2::StatusOptions::new();
        opts.include_untracked(true).recurse_untracked_dirs(true);
        let statuses = self.repo.statuses(Some(&mut opts))?;

        let mut entries = Vec::new();
        for entry in statuses.iter() {
            let status = entry.status();
            if status.is_ignored() {
                continue;
            }
            let code = status_code(status);
            let path = entry.path().unwrap_or("").to_owned();
            entries.push((code, path));
        }
        Ok(entries)
    }
}

fn write_if_absent(path: &Path, content: &str) -> Result<(), VersionError> {
    if path.exists() {
        return Ok(());
    }
    std::fs::write(path, content).map_err(|source| VersionError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn short_token(oid: git2::Oid) -> String {
    oid.to_string().chars().take(7).collect()
}

fn iso_instant(epoch_seconds: i64) -> String {
    DateTime::<Utc>::from_timestamp(epoch_seconds, 0)
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_default()
}

fn status_code(status: git2::Status) -> String {
    if status.is_wt_new() && !status.is_index_new() {
        return "??".to_owned();
    }
    let index = if status.is_index_new() {
        'A'
    } else if status.is_index_modified() {
        'M'
    } else if status.is_index_deleted() {
        'D'
    } else if status.is_index_renamed() {
        'R'
    } else {
        ' '
    };
    let worktree = if status.is_wt_modified() {
        'M'
    } else if status.is_wt_deleted() {
        'D'
    } else if status.is_wt_renamed() {
        'R'
    } else {
        ' '
    };
    format!("{index}{worktree}")
}
