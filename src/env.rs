use crate::command::ExitCode;
use std::collections::{BTreeMap, HashMap};

/// Mutable state visible to guest code for the duration of one evaluation.
///
/// The environment contains:
/// - `vars`: shell variables set by assignments.
/// - `files`: an in-memory file table used by redirections and file operands.
/// - `last_status`: the exit code of the most recent command, exposed as `$?`.
/// - `exit_requested`: set by `exit`; the interpreter stops once it is `Some`.
///
/// It always starts empty. Nothing is read from the host process environment
/// or filesystem, so two interpreters never observe each other's state.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    /// Shell variables.
    pub vars: HashMap<String, String>,
    /// In-memory files keyed by name.
    pub files: BTreeMap<String, Vec<u8>>,
    /// Exit code of the most recent command.
    pub last_status: ExitCode,
    /// Pending exit code requested by the guest.
    pub exit_requested: Option<ExitCode>,
}

impl Environment {
    /// Create an empty environment.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the value of a variable. `?` resolves to the last exit status.
    pub fn get_var(&self, key: &str) -> Option<String> {
        if key == "?" {
            return Some(self.last_status.to_string());
        }
        self.vars.get(key).cloned()
    }

    /// Set or override a variable.
    pub fn set_var(&mut self, key: impl Into<String>, val: impl Into<String>) {
        self.vars.insert(key.into(), val.into());
    }

    /// Remove a variable, returning its previous value.
    pub fn remove_var(&mut self, key: &str) -> Option<String> {
        self.vars.remove(key)
    }

    /// Contents of an in-memory file.
    pub fn read_file(&self, name: &str) -> Option<&[u8]> {
        self.files.get(name).map(Vec::as_slice)
    }

    /// Replace or append to an in-memory file, creating it if needed.
    pub fn write_file(&mut self, name: &str, data: &[u8], append: bool) {
        let file = self.files.entry(name.to_string()).or_default();
        if !append {
            file.clear();
        }
        file.extend_from_slice(data);
    }
}

#[cfg(test)]
mod tests {
    use crate::env::Environment;

    #[test]
    fn test_env_set_and_get_var() {
        let mut env = Environment::new();

        // initially absent
        assert_eq!(env.get_var("SOME_RANDOM_ENV_VAR_12345"), None);

        env.set_var("KEY", "VALUE");

        assert_eq!(env.get_var("KEY"), Some("VALUE".to_string()));
        assert_eq!(env.remove_var("KEY"), Some("VALUE".to_string()));
        assert_eq!(env.get_var("KEY"), None);
    }

    #[test]
    fn test_env_does_not_read_process_env() {
        let env = Environment::new();
        assert!(env.get_var("PATH").is_none());
    }

    #[test]
    fn test_env_question_mark_is_last_status() {
        let mut env = Environment::new();
        assert_eq!(env.get_var("?"), Some("0".to_string()));
        env.last_status = 3;
        assert_eq!(env.get_var("?"), Some("3".to_string()));
    }

    #[test]
    fn test_env_write_file_truncates_or_appends() {
        let mut env = Environment::new();
        env.write_file("notes", b"a\n", false);
        env.write_file("notes", b"b\n", true);
        assert_eq!(env.read_file("notes"), Some(&b"a\nb\n"[..]));

        env.write_file("notes", b"c\n", false);
        assert_eq!(env.read_file("notes"), Some(&b"c\n"[..]));
        assert_eq!(env.read_file("missing"), None);
    }
}
