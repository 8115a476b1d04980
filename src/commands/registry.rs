//! Command pattern registry
//!
//! Commands are kept in registration order; the matcher relies on that order
//! to break ties. Definitions can be imported from and exported to JSON
//! (`{"commands": [...]}`).

use super::normalize::normalize_phrase;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Action names used by the built-in commands
pub mod actions {
    pub const NAVIGATE_DASHBOARD: &str = "NAVIGATE_DASHBOARD";
    pub const NAVIGATE_ATTENDANCE: &str = "NAVIGATE_ATTENDANCE";
    pub const NAVIGATE_GRADES: &str = "NAVIGATE_GRADES";
    pub const NAVIGATE_INVENTORY: &str = "NAVIGATE_INVENTORY";
    pub const CREATE_QUIZ: &str = "CREATE_QUIZ";
    pub const MARK_ABSENT: &str = "MARK_ABSENT";
    pub const MARK_SICK: &str = "MARK_SICK";
    pub const MARK_EXCUSED: &str = "MARK_EXCUSED";
    pub const MARK_PRESENT: &str = "MARK_PRESENT";
    pub const SEARCH: &str = "SEARCH";
    pub const SET_GRADE: &str = "SET_GRADE";
    pub const SAVE: &str = "SAVE";
    pub const CANCEL: &str = "CANCEL";
    pub const HELP: &str = "HELP";
    pub const LOGOUT: &str = "LOGOUT";

    /// Actions whose free text names a student
    pub const ATTENDANCE: &[&str] = &[MARK_ABSENT, MARK_SICK, MARK_EXCUSED, MARK_PRESENT];
}

/// Registry errors
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Command id cannot be empty")]
    EmptyId,

    #[error("Command '{0}' has an empty action")]
    EmptyAction(String),

    #[error("Command '{0}' has no usable phrase patterns")]
    NoPatterns(String),

    #[error("Invalid command definitions: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Failed to read command file: {0}")]
    Io(#[from] std::io::Error),
}

/// A voice command definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandPattern {
    /// Unique identifier
    pub id: String,
    /// Phrase templates, matched in order
    pub patterns: Vec<String>,
    /// Symbolic action name handed to the host
    pub action: String,
    /// Language tag (`id`, `en`, ...)
    pub language: String,
}

impl CommandPattern {
    pub fn new(id: &str, action: &str, language: &str, patterns: &[&str]) -> Self {
        Self {
            id: id.to_string(),
            patterns: patterns.iter().map(|p| p.to_string()).collect(),
            action: action.to_string(),
            language: language.to_string(),
        }
    }

    /// Whether the command is meant for the given locale (`id-ID` matches `id`)
    pub fn matches_language(&self, language: &str) -> bool {
        primary_subtag(&self.language).eq_ignore_ascii_case(primary_subtag(language))
    }
}

fn primary_subtag(tag: &str) -> &str {
    tag.split(['-', '_']).next().unwrap_or(tag)
}

/// Serialised form of a set of commands
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct CommandSet {
    pub commands: Vec<CommandPattern>,
}

/// A registered command with its phrases pre-normalised
#[derive(Debug, Clone)]
pub(crate) struct RegisteredCommand {
    pub(crate) command: CommandPattern,
    pub(crate) phrases: Vec<String>,
}

impl RegisteredCommand {
    fn new(command: CommandPattern) -> Result<Self, RegistryError> {
        if command.id.trim().is_empty() {
            return Err(RegistryError::EmptyId);
        }
        if command.action.trim().is_empty() {
            return Err(RegistryError::EmptyAction(command.id));
        }

        let phrases: Vec<String> = command
            .patterns
            .iter()
            .map(|p| normalize_phrase(p))
            .filter(|p| !p.is_empty())
            .collect();
        if phrases.is_empty() {
            return Err(RegistryError::NoPatterns(command.id));
        }

        Ok(Self { command, phrases })
    }
}

/// Insertion-ordered command registry keyed by id
#[derive(Debug, Clone, Default)]
pub struct CommandRegistry {
    commands: IndexMap<String, RegisteredCommand>,
}

impl CommandRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in commands
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        for command in default_commands() {
            // Built-in definitions are static and always valid
            if let Err(e) = registry.insert(command) {
                tracing::error!("Invalid built-in command: {}", e);
            }
        }
        registry
    }

    /// Add or replace a command; a replaced id keeps its position
    pub fn insert(&mut self, command: CommandPattern) -> Result<(), RegistryError> {
        let registered = RegisteredCommand::new(command)?;
        let id = registered.command.id.clone();
        if self.commands.insert(id.clone(), registered).is_some() {
            tracing::debug!("Replaced command '{}'", id);
        }
        Ok(())
    }

    /// Remove a command, preserving the order of the rest
    pub fn remove(&mut self, id: &str) -> Option<CommandPattern> {
        self.commands.shift_remove(id).map(|r| r.command)
    }

    pub fn get(&self, id: &str) -> Option<&CommandPattern> {
        self.commands.get(id).map(|r| &r.command)
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn clear(&mut self) {
        self.commands.clear();
    }

    /// Commands in registration order
    pub fn iter(&self) -> impl Iterator<Item = &CommandPattern> {
        self.commands.values().map(|r| &r.command)
    }

    /// First registered command with the given action
    pub fn find_by_action(&self, action: &str) -> Option<&CommandPattern> {
        self.iter().find(|c| c.action == action)
    }

    pub(crate) fn entries(&self) -> impl Iterator<Item = &RegisteredCommand> {
        self.commands.values()
    }

    /// Normalised phrases of every command sharing the action, in registration order
    pub(crate) fn phrases_for_action(&self, action: &str) -> Vec<String> {
        self.commands
            .values()
            .filter(|r| r.command.action == action)
            .flat_map(|r| r.phrases.iter().cloned())
            .collect()
    }

    /// Import commands from JSON
    ///
    /// With `merge`, commands whose id is already registered are skipped;
    /// otherwise the registry is replaced. Invalid entries are skipped.
    /// Returns the number of commands imported.
    pub fn import_json(&mut self, json: &str, merge: bool) -> Result<usize, RegistryError> {
        let imported: CommandSet = serde_json::from_str(json)?;

        let mut valid = Vec::new();
        for command in imported.commands {
            match RegisteredCommand::new(command) {
                Ok(registered) => valid.push(registered),
                Err(e) => tracing::warn!("Skipping invalid command definition: {}", e),
            }
        }

        if !merge {
            self.commands.clear();
        }

        let mut import_count = 0;
        for registered in valid {
            if merge && self.commands.contains_key(&registered.command.id) {
                tracing::debug!(
                    "Skipping command '{}': id already registered",
                    registered.command.id
                );
                continue;
            }
            self.commands.insert(registered.command.id.clone(), registered);
            import_count += 1;
        }

        tracing::info!(
            "Imported {} commands (merge={}), total: {}",
            import_count,
            merge,
            self.commands.len()
        );
        Ok(import_count)
    }

    /// Export all commands as pretty-printed JSON
    pub fn export_json(&self) -> Result<String, RegistryError> {
        let set = CommandSet {
            commands: self.iter().cloned().collect(),
        };
        Ok(serde_json::to_string_pretty(&set)?)
    }

    /// Merge command definitions from a JSON file
    pub fn load_file(&mut self, path: &Path) -> Result<usize, RegistryError> {
        let contents = fs::read_to_string(path)?;
        let count = self.import_json(&contents, true)?;
        tracing::info!("Loaded {} custom commands from {:?}", count, path);
        Ok(count)
    }
}

/// Built-in bilingual command set
///
/// Absence is registered before presence: "tidak hadir" contains "hadir" and
/// equal scores go to the earlier command.
pub fn default_commands() -> Vec<CommandPattern> {
    use actions::*;

    vec![
        // Navigation
        CommandPattern::new(
            "nav-dashboard-id",
            NAVIGATE_DASHBOARD,
            "id",
            &["buka dashboard", "ke dashboard", "halaman utama", "beranda"],
        ),
        CommandPattern::new(
            "nav-dashboard-en",
            NAVIGATE_DASHBOARD,
            "en",
            &["open dashboard", "go to dashboard", "go home", "dashboard"],
        ),
        CommandPattern::new(
            "nav-attendance-id",
            NAVIGATE_ATTENDANCE,
            "id",
            &["buka absensi", "halaman absensi", "ke absensi", "absensi"],
        ),
        CommandPattern::new(
            "nav-attendance-en",
            NAVIGATE_ATTENDANCE,
            "en",
            &["open attendance", "go to attendance", "attendance page"],
        ),
        CommandPattern::new(
            "nav-grades-id",
            NAVIGATE_GRADES,
            "id",
            &["buka nilai", "halaman nilai", "lihat nilai", "daftar nilai"],
        ),
        CommandPattern::new(
            "nav-grades-en",
            NAVIGATE_GRADES,
            "en",
            &["open grades", "go to grades", "show grades", "gradebook"],
        ),
        CommandPattern::new(
            "nav-inventory-id",
            NAVIGATE_INVENTORY,
            "id",
            &["buka inventaris", "halaman inventaris", "inventaris"],
        ),
        CommandPattern::new(
            "nav-inventory-en",
            NAVIGATE_INVENTORY,
            "en",
            &["open inventory", "go to inventory", "inventory"],
        ),
        CommandPattern::new(
            "create-quiz-id",
            CREATE_QUIZ,
            "id",
            &["buat kuis", "buat quiz", "kuis baru"],
        ),
        CommandPattern::new(
            "create-quiz-en",
            CREATE_QUIZ,
            "en",
            &["create quiz", "new quiz", "make a quiz"],
        ),
        // Attendance marking
        CommandPattern::new(
            "mark-absent-id",
            MARK_ABSENT,
            "id",
            &["tidak hadir", "tandai absen", "absen", "alpa"],
        ),
        CommandPattern::new(
            "mark-absent-en",
            MARK_ABSENT,
            "en",
            &["mark absent", "is absent", "absent"],
        ),
        CommandPattern::new(
            "mark-sick-id",
            MARK_SICK,
            "id",
            &["tandai sakit", "sakit"],
        ),
        CommandPattern::new("mark-sick-en", MARK_SICK, "en", &["mark sick", "is sick", "sick"]),
        CommandPattern::new(
            "mark-excused-id",
            MARK_EXCUSED,
            "id",
            &["tandai izin", "izin", "ijin"],
        ),
        CommandPattern::new(
            "mark-excused-en",
            MARK_EXCUSED,
            "en",
            &["mark excused", "is excused", "excused"],
        ),
        CommandPattern::new(
            "mark-present-id",
            MARK_PRESENT,
            "id",
            &["tandai hadir", "hadir"],
        ),
        CommandPattern::new(
            "mark-present-en",
            MARK_PRESENT,
            "en",
            &["mark present", "is present", "present"],
        ),
        // Search
        CommandPattern::new("search-id", SEARCH, "id", &["cari", "temukan", "carikan"]),
        CommandPattern::new("search-en", SEARCH, "en", &["search for", "search", "find"]),
        // Grades
        CommandPattern::new(
            "set-grade-id",
            SET_GRADE,
            "id",
            &["set nilai", "beri nilai", "input nilai", "masukkan nilai"],
        ),
        CommandPattern::new(
            "set-grade-en",
            SET_GRADE,
            "en",
            &["set grade", "give grade", "enter grade"],
        ),
        // General
        CommandPattern::new("save-id", SAVE, "id", &["simpan", "simpan data"]),
        CommandPattern::new("save-en", SAVE, "en", &["save", "save changes"]),
        CommandPattern::new("cancel-id", CANCEL, "id", &["batal", "batalkan"]),
        CommandPattern::new("cancel-en", CANCEL, "en", &["cancel", "never mind"]),
        CommandPattern::new("help-id", HELP, "id", &["bantuan", "minta bantuan"]),
        CommandPattern::new("help-en", HELP, "en", &["help", "show help"]),
        CommandPattern::new("logout-id", LOGOUT, "id", &["keluar", "keluar akun"]),
        CommandPattern::new("logout-en", LOGOUT, "en", &["logout", "log out", "sign out"]),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // Registry tests
    // =========================================================================

    #[test]
    fn test_defaults_are_valid_and_unique() {
        let registry = CommandRegistry::with_defaults();
        assert_eq!(registry.len(), default_commands().len());
    }

    #[test]
    fn test_absent_registered_before_present() {
        let registry = CommandRegistry::with_defaults();
        let ids: Vec<_> = registry.iter().map(|c| c.id.as_str()).collect();
        let absent = ids.iter().position(|id| *id == "mark-absent-id").unwrap();
        let present = ids.iter().position(|id| *id == "mark-present-id").unwrap();
        assert!(absent < present);
    }

    #[test]
    fn test_replacing_keeps_position() {
        let mut registry = CommandRegistry::new();
        registry
            .insert(CommandPattern::new("a", "A", "en", &["alpha"]))
            .unwrap();
        registry
            .insert(CommandPattern::new("b", "B", "en", &["bravo"]))
            .unwrap();
        registry
            .insert(CommandPattern::new("a", "A2", "en", &["alpha two"]))
            .unwrap();

        let ids: Vec<_> = registry.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(registry.get("a").unwrap().action, "A2");
    }

    #[test]
    fn test_remove_preserves_order() {
        let mut registry = CommandRegistry::new();
        for id in ["a", "b", "c"] {
            registry
                .insert(CommandPattern::new(id, "X", "en", &[id]))
                .unwrap();
        }
        assert!(registry.remove("b").is_some());
        assert!(registry.remove("b").is_none());

        let ids: Vec<_> = registry.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
    }

    #[test]
    fn test_rejects_invalid_commands() {
        let mut registry = CommandRegistry::new();
        assert!(matches!(
            registry.insert(CommandPattern::new(" ", "X", "en", &["x"])),
            Err(RegistryError::EmptyId)
        ));
        assert!(matches!(
            registry.insert(CommandPattern::new("x", "", "en", &["x"])),
            Err(RegistryError::EmptyAction(_))
        ));
        assert!(matches!(
            registry.insert(CommandPattern::new("x", "X", "en", &["?!", " "])),
            Err(RegistryError::NoPatterns(_))
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_language_matching() {
        let command = CommandPattern::new("x", "X", "id", &["x"]);
        assert!(command.matches_language("id-ID"));
        assert!(command.matches_language("ID"));
        assert!(!command.matches_language("en-US"));
    }

    // =========================================================================
    // Import / export tests
    // =========================================================================

    #[test]
    fn test_import_merge_skips_existing_ids() {
        let mut registry = CommandRegistry::with_defaults();
        let before = registry.len();
        let json = r#"{"commands": [
            {"id": "save-en", "patterns": ["store"], "action": "SAVE", "language": "en"},
            {"id": "print", "patterns": ["print report"], "action": "PRINT", "language": "en"}
        ]}"#;

        let count = registry.import_json(json, true).unwrap();
        assert_eq!(count, 1);
        assert_eq!(registry.len(), before + 1);
        assert_eq!(registry.get("save-en").unwrap().patterns[0], "save");
    }

    #[test]
    fn test_import_replace_skips_invalid_entries() {
        let mut registry = CommandRegistry::with_defaults();
        let json = r#"{"commands": [
            {"id": "", "patterns": ["x"], "action": "X", "language": "en"},
            {"id": "print", "patterns": ["print report"], "action": "PRINT", "language": "en"}
        ]}"#;

        let count = registry.import_json(json, false).unwrap();
        assert_eq!(count, 1);
        assert_eq!(registry.len(), 1);
        assert!(registry.get("print").is_some());
    }

    #[test]
    fn test_import_invalid_json_leaves_registry_untouched() {
        let mut registry = CommandRegistry::with_defaults();
        let before = registry.len();
        assert!(matches!(
            registry.import_json("not json", false),
            Err(RegistryError::InvalidJson(_))
        ));
        assert_eq!(registry.len(), before);
    }

    #[test]
    fn test_export_then_import_preserves_order() {
        let registry = CommandRegistry::with_defaults();
        let json = registry.export_json().unwrap();

        let mut restored = CommandRegistry::new();
        restored.import_json(&json, false).unwrap();

        let original: Vec<_> = registry.iter().map(|c| c.id.clone()).collect();
        let copy: Vec<_> = restored.iter().map(|c| c.id.clone()).collect();
        assert_eq!(original, copy);
    }
}
