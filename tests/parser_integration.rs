//! Command parser integration tests.
//!
//! Exercises the parser end to end through the public API: built-in
//! commands, custom command files, and the output guarantees every parsed
//! command must meet.

use classvoice::commands::{
    actions, CommandParser, CommandPattern, ParsedVoiceCommand, RegistryError, GRADE_VALUE, QUERY,
    STUDENT_NAME,
};
use classvoice::config::ParserConfig;
use parking_lot::{Mutex, RwLock};
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

fn parse(text: &str) -> Option<ParsedVoiceCommand> {
    CommandParser::new().parse(text)
}

fn assert_output_is_safe(command: &ParsedVoiceCommand) {
    assert!((0.0..=1.0).contains(&command.confidence));
    let mut fields = vec![command.transcript.as_str()];
    if let Some(data) = &command.data {
        fields.extend(data.values().map(String::as_str));
    }
    for field in fields {
        assert!(!field.contains('<'), "raw '<' in {:?}", field);
        assert!(!field.contains('>'), "raw '>' in {:?}", field);
        assert!(!field.contains('"'), "raw '\"' in {:?}", field);
        assert!(!field.contains('\''), "raw quote in {:?}", field);
        for (i, _) in field.match_indices('&') {
            let rest = &field[i..];
            assert!(
                ["&amp;", "&lt;", "&gt;", "&quot;", "&#39;"]
                    .iter()
                    .any(|entity| rest.starts_with(entity)),
                "unescaped '&' in {:?}",
                field
            );
        }
    }
}

// =============================================================================
// Output guarantees
// =============================================================================

#[test]
fn test_blank_transcripts_never_parse() {
    let parser = CommandParser::new();
    for text in ["", " ", "   ", "\t", "\n \n"] {
        assert!(parser.parse(text).is_none(), "{:?}", text);
        assert!(!parser.is_command(text));
    }
}

#[test]
fn test_every_parsed_command_is_bounded_and_escaped() {
    let samples = [
        "buka dashboard",
        "hadir John",
        "Budi tidak hadir",
        "set John nilai 85",
        "cari <img src=x onerror=alert(1)>",
        "\"Siti\" & 'Ani' hadir",
        "<script>alert(1)</script>John hadir",
        "open the attendance page",
        "mark present O'Neil",
        "logout",
    ];

    for sample in samples {
        if let Some(command) = parse(sample) {
            assert_output_is_safe(&command);
        }
    }
}

#[test]
fn test_script_injection_never_survives() {
    let command = parse("<script>alert(1)</script>John hadir").unwrap();
    assert!(!command.transcript.contains("<script>"));
    for value in command.data.unwrap().values() {
        assert!(!value.contains("<script>"));
    }
}

// =============================================================================
// Built-in commands
// =============================================================================

#[test]
fn test_present_scenario() {
    let command = parse("hadir John").unwrap();
    assert_eq!(command.action, actions::MARK_PRESENT);
    assert_eq!(command.data_value(STUDENT_NAME), Some("John"));
}

#[test]
fn test_set_grade_scenario() {
    let command = parse("set John nilai 85").unwrap();
    assert_eq!(command.action, actions::SET_GRADE);
    assert_eq!(command.data_value(STUDENT_NAME), Some("John"));
    assert_eq!(command.data_value(GRADE_VALUE), Some("85"));
}

#[test]
fn test_bilingual_navigation() {
    let cases = [
        ("buka dashboard", actions::NAVIGATE_DASHBOARD),
        ("go to dashboard", actions::NAVIGATE_DASHBOARD),
        ("buka absensi", actions::NAVIGATE_ATTENDANCE),
        ("open attendance", actions::NAVIGATE_ATTENDANCE),
        ("lihat nilai", actions::NAVIGATE_GRADES),
        ("show grades", actions::NAVIGATE_GRADES),
        ("buka inventaris", actions::NAVIGATE_INVENTORY),
        ("buat kuis", actions::CREATE_QUIZ),
        ("create quiz", actions::CREATE_QUIZ),
    ];
    for (text, action) in cases {
        let command = parse(text).unwrap_or_else(|| panic!("{:?} did not parse", text));
        assert_eq!(command.action, action, "{:?}", text);
        assert_eq!(command.confidence, 1.0, "{:?}", text);
    }
}

#[test]
fn test_attendance_statuses() {
    let cases = [
        ("Andi sakit", actions::MARK_SICK, "Andi"),
        ("Rina izin", actions::MARK_EXCUSED, "Rina"),
        ("Dodi alpa", actions::MARK_ABSENT, "Dodi"),
        ("mark Peter absent", actions::MARK_ABSENT, "Peter"),
        ("Maria is excused", actions::MARK_EXCUSED, "Maria"),
    ];
    for (text, action, name) in cases {
        let command = parse(text).unwrap_or_else(|| panic!("{:?} did not parse", text));
        assert_eq!(command.action, action, "{:?}", text);
        assert_eq!(command.data_value(STUDENT_NAME), Some(name), "{:?}", text);
    }
}

#[test]
fn test_multi_word_names_keep_casing() {
    let command = parse("tandai hadir Siti Nurhaliza").unwrap();
    assert_eq!(command.data_value(STUDENT_NAME), Some("Siti Nurhaliza"));
}

#[test]
fn test_search_query_extracted() {
    let command = parse("search for Algebra Quiz").unwrap();
    assert_eq!(command.action, actions::SEARCH);
    assert_eq!(command.data_value(QUERY), Some("Algebra Quiz"));
}

#[test]
fn test_general_commands() {
    for (text, action) in [
        ("simpan", actions::SAVE),
        ("save changes", actions::SAVE),
        ("batalkan", actions::CANCEL),
        ("bantuan", actions::HELP),
        ("sign out", actions::LOGOUT),
    ] {
        assert_eq!(parse(text).unwrap().action, action, "{:?}", text);
    }
}

// =============================================================================
// Custom commands
// =============================================================================

#[test]
fn test_custom_commands_file_from_config() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("commands.json");
    fs::write(
        &path,
        r#"{"commands": [
            {"id": "print-report", "patterns": ["cetak rapor", "print report card"], "action": "PRINT_REPORT", "language": "id"}
        ]}"#,
    )
    .unwrap();

    let config = ParserConfig {
        custom_commands_path: Some(path),
        ..Default::default()
    };
    let parser = CommandParser::from_config(&config).unwrap();

    let command = parser.parse("cetak rapor").unwrap();
    assert_eq!(command.action, "PRINT_REPORT");
    assert!(parser
        .commands_for_language("id-ID")
        .iter()
        .any(|c| c.id == "print-report"));
}

#[test]
fn test_missing_commands_file_is_an_error() {
    let temp_dir = TempDir::new().unwrap();
    let mut parser = CommandParser::new();
    let result = parser.load_commands_file(&temp_dir.path().join("absent.json"));
    assert!(matches!(result, Err(RegistryError::Io(_))));
}

#[test]
fn test_export_import_round_trip_through_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("exported.json");

    let mut source = CommandParser::new();
    source
        .add_custom_command(CommandPattern::new(
            "open-library",
            "NAVIGATE_LIBRARY",
            "en",
            &["open library"],
        ))
        .unwrap();
    fs::write(&path, source.export_commands().unwrap()).unwrap();

    let mut target = CommandParser::with_commands(Vec::new()).unwrap();
    let imported = target.load_commands_file(&path).unwrap();

    assert_eq!(imported, source.commands().len());
    assert_eq!(
        target.parse("open library").unwrap().action,
        "NAVIGATE_LIBRARY"
    );
}

#[test]
fn test_replacing_default_command_changes_behaviour() {
    let mut parser = CommandParser::new();
    parser
        .add_custom_command(CommandPattern::new(
            "save-id",
            actions::SAVE,
            "id",
            &["simpan nilai"],
        ))
        .unwrap();

    assert_eq!(parser.parse("simpan nilai").unwrap().id, "save-id");
    assert_eq!(parser.get_command_by_id("save-id").unwrap().patterns, vec!["simpan nilai"]);
}

// =============================================================================
// Shared parser
// =============================================================================

#[test]
fn test_parser_shared_across_threads() {
    let parser = Arc::new(RwLock::new(CommandParser::new()));
    let results = Arc::new(Mutex::new(Vec::new()));

    let handles: Vec<_> = ["simpan", "batal", "bantuan", "keluar"]
        .into_iter()
        .map(|text| {
            let parser = Arc::clone(&parser);
            let results = Arc::clone(&results);
            std::thread::spawn(move || {
                let action = parser.read().parse(text).map(|c| c.action);
                results.lock().push(action);
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert!(results.lock().iter().all(Option::is_some));
}
