//! Canonical borg `create` command construction and parsing
//!
//! A bundle's command line is stored in exactly one serialization: base
//! flags, `--exclude` pairs in input order, the `repo::name_format`
//! pivot, then include paths in input order. The inverse parse depends
//! on that ordering, and the serialized string doubles as the
//! dedup/matching key for bundle lookup.

/// Flags every generated `create` invocation carries, in order.
pub const CREATE_BASE_FLAGS: [&str; 4] = ["--list", "--stats", "--progress", "--one-file-system"];

/// Structured form of a borg `create` invocation.
///
/// Internally everything is discrete argv tokens; strings exist only at
/// the process-invocation and persistence boundaries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupCommand {
    pub repository_path: String,
    pub name_format: String,
    pub exclude_paths: Vec<String>,
    pub include_paths: Vec<String>,
}

impl BackupCommand {
    #[must_use]
    pub fn new(repository_path: impl Into<String>, name_format: impl Into<String>) -> Self {
        Self {
            repository_path: repository_path.into(),
            name_format: name_format.into(),
            exclude_paths: Vec::new(),
            include_paths: Vec::new(),
        }
    }

    /// Canonical argv. The leading token is always `borg`; a runner
    /// substitutes its actual binary path at execution time.
    #[must_use]
    pub fn to_argv(&self) -> Vec<String> {
        let mut argv = vec!["borg".to_string(), "create".to_string()];
        argv.extend(CREATE_BASE_FLAGS.iter().map(ToString::to_string));

        for path in &self.exclude_paths {
            argv.push("--exclude".to_string());
            argv.push(path.clone());
        }

        argv.push(format!("{}::{}", self.repository_path, self.name_format));
        argv.extend(self.include_paths.iter().cloned());
        argv
    }

    /// The canonical serialized form persisted on a bundle and used as
    /// the exact-match key when linking archives to bundles.
    #[must_use]
    pub fn to_command_line(&self) -> String {
        self.to_argv().join(" ")
    }

    /// Parse a stored or tool-reported command line back into its
    /// structured form.
    ///
    /// Tolerates an absolute borg binary path in the first token and
    /// unknown flags before the pivot (they are dropped on
    /// re-canonicalization). Returns `None` when the `create` token or
    /// the `repo::name_format` pivot is missing.
    #[must_use]
    pub fn parse(command_line: &str) -> Option<Self> {
        let tokens: Vec<&str> = command_line.split_whitespace().collect();
        let create_pos = tokens.iter().position(|token| *token == "create")?;

        let mut exclude_paths = Vec::new();
        let mut include_paths = Vec::new();
        let mut pivot = None;

        let mut iter = tokens[create_pos + 1..].iter();
        while let Some(token) = iter.next() {
            if pivot.is_some() {
                include_paths.push((*token).to_string());
                continue;
            }

            if *token == "--exclude" {
                exclude_paths.push((*iter.next()?).to_string());
                continue;
            }

            if let Some((repo, name)) = token.split_once("::") {
                if repo.is_empty() || name.is_empty() {
                    return None;
                }
                pivot = Some((repo.to_string(), name.to_string()));
            }
            // anything else before the pivot is a base flag
        }

        let (repository_path, name_format) = pivot?;
        Some(Self {
            repository_path,
            name_format,
            exclude_paths,
            include_paths,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NAME_FORMAT: &str = "{hostname}-{now:%Y-%m-%dT%H:%M:%S.%f}";

    fn sample() -> BackupCommand {
        BackupCommand {
            repository_path: "/mnt/backups/repo".to_string(),
            name_format: NAME_FORMAT.to_string(),
            exclude_paths: vec!["/home/user/cache".to_string(), "/tmp/scratch".to_string()],
            include_paths: vec!["/home/user".to_string(), "/etc".to_string()],
        }
    }

    #[test]
    fn argv_ordering_is_canonical() {
        let argv = sample().to_argv();
        assert_eq!(argv[0], "borg");
        assert_eq!(argv[1], "create");
        assert_eq!(&argv[2..6], CREATE_BASE_FLAGS);
        assert_eq!(argv[6], "--exclude");
        assert_eq!(argv[7], "/home/user/cache");
        assert_eq!(argv[8], "--exclude");
        assert_eq!(argv[9], "/tmp/scratch");
        assert_eq!(argv[10], format!("/mnt/backups/repo::{NAME_FORMAT}"));
        assert_eq!(&argv[11..], ["/home/user", "/etc"]);
    }

    #[test]
    fn round_trips_through_command_line() {
        let command = sample();
        let parsed = BackupCommand::parse(&command.to_command_line()).unwrap();
        assert_eq!(parsed, command);
    }

    #[test]
    fn round_trips_without_excludes() {
        let mut command = sample();
        command.exclude_paths.clear();
        let parsed = BackupCommand::parse(&command.to_command_line()).unwrap();
        assert_eq!(parsed, command);
    }

    #[test]
    fn parses_tool_reported_binary_path_and_extra_flags() {
        let line = format!(
            "/usr/bin/borg create --no-cache-sync --exclude /var/cache /repo::{NAME_FORMAT} /srv/data"
        );
        let parsed = BackupCommand::parse(&line).unwrap();
        assert_eq!(parsed.repository_path, "/repo");
        assert_eq!(parsed.name_format, NAME_FORMAT);
        assert_eq!(parsed.exclude_paths, ["/var/cache"]);
        assert_eq!(parsed.include_paths, ["/srv/data"]);
    }

    #[test]
    fn reparsed_canonical_form_is_stable() {
        let raw = "/usr/local/bin/borg create --stats --exclude /a /repo::archive-{now} /b /c";
        let canonical = BackupCommand::parse(raw).unwrap().to_command_line();
        let again = BackupCommand::parse(&canonical).unwrap().to_command_line();
        assert_eq!(canonical, again);
    }

    #[test]
    fn rejects_missing_create_token() {
        assert!(BackupCommand::parse("borg list --json /repo").is_none());
    }

    #[test]
    fn rejects_missing_pivot() {
        assert!(BackupCommand::parse("borg create --stats /just/a/path").is_none());
    }

    #[test]
    fn rejects_dangling_exclude_flag() {
        assert!(BackupCommand::parse("borg create --exclude").is_none());
    }

    #[test]
    fn rejects_empty_pivot_halves() {
        assert!(BackupCommand::parse("borg create ::name /data").is_none());
        assert!(BackupCommand::parse("borg create /repo:: /data").is_none());
    }
}
