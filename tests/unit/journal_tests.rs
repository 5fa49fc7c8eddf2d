use mc_herd::persistence::journal::{log_file_name, stamp};
use mc_herd::persistence::{FileJournal, Journal, MemoryJournal};
use mc_herd::AppError;

#[test]
fn stamp_prefixes_iso_timestamp() {
    let line = stamp("spawned");
    assert!(line.starts_with('['));
    let (ts, rest) = line[1..].split_once("] ").expect("bracketed timestamp");
    assert_eq!(rest, "spawned");
    assert!(chrono::DateTime::parse_from_rfc3339(ts).is_ok(), "{ts}");
}

#[test]
fn log_file_names_cannot_escape_directory() {
    assert_eq!(log_file_name("bot_1"), "bot_1.log");
    assert_eq!(log_file_name("../etc/passwd"), "_etc_passwd.log");
    assert_eq!(log_file_name(""), "_.log");
}

#[test]
fn file_journal_appends_and_tails() {
    let dir = tempfile::tempdir().expect("tempdir");
    let journal = FileJournal::new(dir.path().join("logs"), dir.path().join("chatlog.txt"))
        .expect("journal");

    for i in 0..25 {
        journal.record("bot_1", &format!("event {i}")).expect("record");
    }
    journal.record("bot_2", "other").expect("record");

    let tail = journal.tail("bot_1", 20).expect("tail");
    assert_eq!(tail.len(), 20);
    assert!(tail[0].ends_with("] event 5"));
    assert!(tail[19].ends_with("] event 24"));

    let raw = std::fs::read_to_string(journal.log_path("bot_2")).expect("read");
    assert_eq!(raw.lines().count(), 1);
}

#[test]
fn file_journal_writes_transcript_lines_verbatim() {
    let dir = tempfile::tempdir().expect("tempdir");
    let chatlog = dir.path().join("nested").join("chatlog.txt");
    let journal = FileJournal::new(dir.path().join("logs"), chatlog.clone()).expect("journal");

    journal.transcript("[CHAT][bot_1] alice: hi").expect("write");
    journal.transcript("[BROADCAST] hello").expect("write");

    let raw = std::fs::read_to_string(chatlog).expect("read");
    assert_eq!(raw, "[CHAT][bot_1] alice: hi\n[BROADCAST] hello\n");
}

#[test]
fn tail_of_unknown_identity_is_not_found() {
    let dir = tempfile::tempdir().expect("tempdir");
    let journal = FileJournal::new(dir.path().join("logs"), dir.path().join("chat.txt"))
        .expect("journal");
    assert!(matches!(journal.tail("ghost", 20), Err(AppError::NotFound(_))));

    let memory = MemoryJournal::new();
    assert!(matches!(memory.tail("ghost", 20), Err(AppError::NotFound(_))));
}

#[test]
fn memory_journal_keeps_records_per_identity() {
    let journal = MemoryJournal::new();
    journal.record("a", "one").expect("record");
    journal.record("b", "two").expect("record");
    journal.record("a", "three").expect("record");

    assert_eq!(journal.records_for("a"), ["one", "three"]);
    assert_eq!(journal.tail("a", 1).expect("tail"), ["three"]);
}
