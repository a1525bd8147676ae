use super::*;
use crate::config::GenerationConfig;
use crate::generation::AutoAccept;
use serde_json::json;
use tempfile::TempDir;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_string_contains, method, path},
};

fn write_note(root: &Path, category: &str, title: &str, body: &str) {
    let dir = root.join(category);
    fs::create_dir_all(&dir).expect("Failed to create category dir");
    fs::write(dir.join(format!("{}.md", title)), body).expect("Failed to write note");
}

fn sample_notes() -> TempDir {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let root = temp_dir.path();
    write_note(root, "Places", "Ironhold", "\nA dwarven fortress.\n\n");
    write_note(root, "Places", "Café Ardent", "Tavern run by a retired paladin.");
    write_note(root, "People", "Brannoc", "King of Ironhold.");
    fs::write(root.join("Places").join("map.png"), [0u8, 1, 2]).expect("Failed to write image");
    fs::write(root.join("README.md"), "not a category").expect("Failed to write readme");
    fs::write(
        root.join(TAGS_FILE),
        "Ironhold = \"dwarves|fortress\"\nBrannoc = \"royalty\"\n",
    )
    .expect("Failed to write ledger");
    temp_dir
}

#[test]
fn loads_notes_sorted_with_ledger_tags() {
    let temp_dir = sample_notes();
    let notes = load_notes(temp_dir.path(), None).expect("Failed to load notes");

    let titles: Vec<(&str, &str)> = notes
        .iter()
        .map(|n| (n.category.as_str(), n.title.as_str()))
        .collect();
    assert_eq!(
        titles,
        vec![
            ("People", "Brannoc"),
            ("Places", "Café Ardent"),
            ("Places", "Ironhold"),
        ]
    );

    let ironhold = &notes[2];
    assert_eq!(ironhold.text, "A dwarven fortress.");
    assert_eq!(ironhold.tags, "dwarves|fortress");
    assert_eq!(notes[1].tags, "");
}

#[test]
fn notes_become_sanitized_entries() {
    let temp_dir = sample_notes();
    let entries: Vec<CorpusEntry> = load_notes(temp_dir.path(), None)
        .expect("Failed to load notes")
        .into_iter()
        .map(Note::into_entry)
        .collect();

    assert_eq!(entries[1].id, "Caf Ardent");
    assert_eq!(entries[1].title, "Café Ardent");
}

#[test]
fn missing_directory_is_an_error() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    assert!(load_notes(&temp_dir.path().join("nope"), None).is_err());
}

#[test]
fn ledger_round_trip() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let path = temp_dir.path().join(TAGS_FILE);

    let mut ledger = TagLedger::load(&path).expect("missing ledger is empty");
    assert!(ledger.is_empty());

    ledger.record("Café Ardent", "tavern|paladin").expect("Failed to record");
    let reloaded = TagLedger::load(&path).expect("Failed to reload");
    assert_eq!(reloaded.len(), 1);
    assert_eq!(reloaded.get("Café Ardent"), Some("tavern|paladin"));
}

#[tokio::test(flavor = "multi_thread")]
async fn untagged_notes_are_tagged_and_recorded() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_string_contains("retired paladin"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "message": { "role": "assistant", "content": " tavern|paladin \n" } }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = GenerationConfig {
        base_url: format!("{}/v1", server.uri()),
        ..GenerationConfig::default()
    };
    let client = GenerationClient::with_api_key(&config, "k".to_string(), Box::new(AutoAccept));

    let temp_dir = sample_notes();
    let notes = load_notes(temp_dir.path(), Some(&client)).expect("Failed to load notes");
    assert_eq!(notes[1].tags, "tavern|paladin");

    let ledger = TagLedger::load(temp_dir.path().join(TAGS_FILE)).expect("Failed to reload");
    assert_eq!(ledger.len(), 3);
    assert_eq!(ledger.get("Café Ardent"), Some("tavern|paladin"));
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_tagging_falls_back_to_empty_tags() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("busy"))
        .mount(&server)
        .await;

    let config = GenerationConfig {
        base_url: server.uri(),
        ..GenerationConfig::default()
    };
    let client = GenerationClient::with_api_key(&config, "k".to_string(), Box::new(AutoAccept));

    let temp_dir = sample_notes();
    let notes = load_notes(temp_dir.path(), Some(&client)).expect("tagging failure is not fatal");
    assert_eq!(notes[1].tags, "");

    let ledger = TagLedger::load(temp_dir.path().join(TAGS_FILE)).expect("Failed to reload");
    assert_eq!(ledger.get("Café Ardent"), None);
}
