//! Working-directory tracking for `cd` commands.

use std::path::{Component, Path, PathBuf};

/// The argument of a `cd` command line, if it is one. `cd` alone yields `""`.
pub fn cd_argument(command: &str) -> Option<&str> {
    let command = command.trim();
    if command == "cd" {
        return Some("");
    }
    let rest = command.strip_prefix("cd")?;
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    Some(unquote(rest.trim()))
}

fn unquote(arg: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = arg
            .strip_prefix(quote)
            .and_then(|a| a.strip_suffix(quote))
        {
            return inner;
        }
    }
    arg
}

/// Resolve a local `cd` target. Returns `None` when it is not an existing directory.
pub fn resolve_local(cwd: &Path, arg: &str) -> Option<PathBuf> {
    let home = dirs::home_dir();
    let target = match arg {
        "" | "~" => home?,
        _ => match arg.strip_prefix("~/").or_else(|| arg.strip_prefix("~\\")) {
            Some(rest) => home?.join(rest),
            None => cwd.join(arg),
        },
    };
    let target = normalize(&target);
    target.is_dir().then_some(target)
}

/// Collapse `.` and `..` without touching the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Resolve a remote `cd` target lexically. Paths under the home directory
/// keep their `~` prefix since the remote home is not known.
pub fn resolve_remote(cwd: &str, arg: &str) -> String {
    let joined = match arg {
        "" | "~" => return "~".to_string(),
        a if a.starts_with('/') || a.starts_with("~/") => a.to_string(),
        a => format!("{}/{}", cwd.trim_end_matches('/'), a),
    };

    let (root, rest) = if let Some(rest) = joined.strip_prefix('~') {
        ("~", rest)
    } else {
        ("", joined.as_str())
    };
    let mut segments: Vec<&str> = Vec::new();
    for segment in rest.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.last().is_some_and(|s| *s != "..") {
                    segments.pop();
                } else if root == "~" {
                    segments.push("..");
                }
            }
            s => segments.push(s),
        }
    }

    match (root, segments.is_empty()) {
        ("~", true) => "~".to_string(),
        ("~", false) => format!("~/{}", segments.join("/")),
        (_, _) => format!("/{}", segments.join("/")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    #[test_case("cd /tmp", Some("/tmp"))]
    #[test_case("  cd   projects  ", Some("projects"))]
    #[test_case("cd", Some(""))]
    #[test_case("cd \"My Files\"", Some("My Files"))]
    #[test_case("cdrom", None)]
    #[test_case("ls cd", None)]
    fn parses_cd_argument(command: &str, expected: Option<&str>) {
        assert_eq!(cd_argument(command), expected);
    }

    #[test]
    fn local_relative_and_parent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let sub = dir.path().join("sub");
        std::fs::create_dir(&sub).expect("mkdir");

        assert_eq!(resolve_local(dir.path(), "sub"), Some(sub.clone()));
        assert_eq!(
            resolve_local(&sub, ".."),
            Some(dir.path().to_path_buf())
        );
        assert_eq!(resolve_local(&sub, "./."), Some(sub.clone()));
    }

    #[test]
    fn local_missing_directory_is_none() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert_eq!(resolve_local(dir.path(), "nope"), None);
        std::fs::write(dir.path().join("file"), "").expect("write");
        assert_eq!(resolve_local(dir.path(), "file"), None);
    }

    #[test]
    fn local_absolute_ignores_cwd() {
        let dir = tempfile::tempdir().expect("tempdir");
        let abs = dir.path().to_string_lossy().into_owned();
        assert_eq!(
            resolve_local(Path::new("/definitely/not/here"), &abs),
            Some(dir.path().to_path_buf())
        );
    }

    #[test_case("~", "docs", "~/docs")]
    #[test_case("~/docs", "..", "~")]
    #[test_case("~", "..", "~/..")]
    #[test_case("/var/log", "../lib/./x", "/var/lib/x")]
    #[test_case("/var", "/etc", "/etc")]
    #[test_case("/", "..", "/")]
    #[test_case("/srv", "", "~")]
    #[test_case("/srv", "~/mc", "~/mc")]
    fn remote_paths(cwd: &str, arg: &str, expected: &str) {
        assert_eq!(resolve_remote(cwd, arg), expected);
    }
}
