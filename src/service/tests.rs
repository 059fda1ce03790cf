use super::*;
use crate::llm::{LlmError, TagModel, TagSuggestionRequest};
use crate::models::CaseStyle;
use crate::vault::Vault;
use async_trait::async_trait;
use std::fs;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;

struct ScriptedModel {
    tags: Vec<String>,
    calls: AtomicUsize,
    last_request: Mutex<Option<TagSuggestionRequest>>,
}

impl ScriptedModel {
    fn new(tags: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            tags: tags.iter().map(|t| t.to_string()).collect(),
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        })
    }
}

#[async_trait]
impl TagModel for ScriptedModel {
    fn label(&self) -> String {
        "scripted".to_string()
    }

    async fn generate_tags(&self, request: &TagSuggestionRequest) -> Result<Vec<String>, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some(request.clone());
        Ok(self.tags.clone())
    }
}

#[derive(Default)]
struct RecordingNotifier {
    messages: Mutex<Vec<String>>,
    errors: Mutex<Vec<String>>,
}

impl Notifier for RecordingNotifier {
    fn notify(&self, message: &str) {
        self.messages.lock().unwrap().push(message.to_string());
    }

    fn error(&self, message: &str) {
        self.errors.lock().unwrap().push(message.to_string());
    }
}

struct FixedReviewer {
    decision: ReviewDecision,
    accept_cost: bool,
}

impl TagReviewer for FixedReviewer {
    fn review(&self, _document: &Path, _suggestions: Vec<Tag>) -> ReviewDecision {
        self.decision.clone()
    }

    fn confirm_cost(&self, _model: &ModelDescriptor, _estimate: &CostEstimate) -> bool {
        self.accept_cost
    }
}

const NOTE: &str = "---\ntitle: Paris trip\ntags:\n  - travel\n---\nThe Eiffel Tower is in Paris, France.\nWe walked along the Seine.\n";

struct Fixture {
    dir: TempDir,
    vault: Arc<Vault>,
}

impl Fixture {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("paris.md"), NOTE).unwrap();
        fs::write(dir.path().join("other.md"), "Notes about #cooking and #travel\n").unwrap();
        let vault = Arc::new(Vault::new(dir.path()));
        Self { dir, vault }
    }

    fn read(&self, name: &str) -> String {
        fs::read_to_string(self.dir.path().join(name)).unwrap()
    }

    fn service(&self, model: Arc<ScriptedModel>, settings: Settings) -> TagService {
        let tagger = AutoTaggerBuilder::new()
            .client(model)
            .style(settings.tags_format)
            .add_prefix(settings.use_autotag_prefix)
            .build()
            .unwrap();
        TagService::new(self.vault.clone(), self.vault.clone(), tagger, settings)
    }
}

fn settings() -> Settings {
    Settings {
        api_key: "sk-test".to_string(),
        use_autotag_prefix: false,
        show_pre_update_dialog: false,
        check_cost_estimation: false,
        ..Settings::default()
    }
}

#[tokio::test]
async fn missing_credentials_fail_before_any_request() {
    let fixture = Fixture::new();
    let model = ScriptedModel::new(&["paris"]);
    let notifier = Arc::new(RecordingNotifier::default());
    let service = fixture
        .service(model.clone(), Settings {
            api_key: String::new(),
            ..settings()
        })
        .with_notifier(notifier.clone());

    let result = service.run(&TaggingRequest::new("paris.md")).await;

    assert!(matches!(result, Err(AutoTagError::Configuration(_))));
    assert_eq!(model.calls.load(Ordering::SeqCst), 0);
    assert_eq!(notifier.errors.lock().unwrap().len(), 1);
    assert_eq!(fixture.read("paris.md"), NOTE);
}

#[tokio::test]
async fn suggestions_are_appended_to_frontmatter() {
    let fixture = Fixture::new();
    let model = ScriptedModel::new(&["Eiffel Tower", "Paris", "France"]);
    let notifier = Arc::new(RecordingNotifier::default());
    let service = fixture
        .service(model, settings())
        .with_notifier(notifier.clone());

    let report = service.run(&TaggingRequest::new("paris.md")).await.unwrap();

    assert_eq!(report.status, TaggingStatus::Inserted);
    assert_eq!(report.inserted.len(), 3);

    let written = fixture.read("paris.md");
    assert!(written.contains("- travel\n- eiffel-tower\n- paris\n- france\n"), "{written}");
    assert!(written.contains("title: Paris trip"));
    assert!(written.ends_with("We walked along the Seine.\n"));

    let messages = notifier.messages.lock().unwrap();
    assert!(messages.iter().any(|m| m == "3 tags inserted"));
}

#[tokio::test]
async fn tags_already_on_the_document_are_filtered_out() {
    let fixture = Fixture::new();
    let model = ScriptedModel::new(&["travel", "Paris"]);
    let service = fixture.service(model, settings());

    let report = service.run(&TaggingRequest::new("paris.md")).await.unwrap();

    let suggested: Vec<&str> = report.suggested.iter().map(Tag::as_str).collect();
    assert_eq!(suggested, vec!["paris"]);
}

#[tokio::test]
async fn nothing_new_leaves_document_untouched() {
    let fixture = Fixture::new();
    let model = ScriptedModel::new(&["travel"]);
    let service = fixture.service(model, settings());

    let report = service.run(&TaggingRequest::new("paris.md")).await.unwrap();

    assert_eq!(report.status, TaggingStatus::NoNewTags);
    assert_eq!(fixture.read("paris.md"), NOTE);
}

#[tokio::test]
async fn vault_tags_are_sent_as_context_and_text_excludes_frontmatter() {
    let fixture = Fixture::new();
    let model = ScriptedModel::new(&["paris"]);
    let service = fixture.service(model.clone(), settings());

    service.run(&TaggingRequest::new("paris.md")).await.unwrap();

    let request = model.last_request.lock().unwrap().clone().unwrap();
    assert!(!request.text.contains("title:"));
    assert!(request.text.starts_with("The Eiffel Tower"));
    assert_eq!(request.known_tags, vec!["cooking", "travel", "travel"]);
}

#[tokio::test]
async fn selection_limits_text_and_places_inline_tags() {
    let fixture = Fixture::new();
    let model = ScriptedModel::new(&["seine"]);
    let service = fixture.service(model.clone(), settings());

    let request = TaggingRequest::new("paris.md")
        .with_selection(Selection::new(2, 2))
        .with_location(InsertLocation::AfterSelection);
    service.run(&request).await.unwrap();

    let sent = model.last_request.lock().unwrap().clone().unwrap();
    assert_eq!(sent.text, "We walked along the Seine.");
    assert!(fixture.read("paris.md").ends_with("We walked along the Seine.\n#seine\n"));
}

#[tokio::test]
async fn out_of_range_selection_is_document_state_error() {
    let fixture = Fixture::new();
    let service = fixture.service(ScriptedModel::new(&["x"]), settings());

    let request = TaggingRequest::new("paris.md").with_selection(Selection::new(5, 9));
    let result = service.run(&request).await;

    assert!(matches!(result, Err(AutoTagError::DocumentState(_))));
}

#[tokio::test]
async fn missing_document_is_document_state_error() {
    let fixture = Fixture::new();
    let service = fixture.service(ScriptedModel::new(&["x"]), settings());

    let result = service.run(&TaggingRequest::new("nope.md")).await;

    assert!(matches!(result, Err(AutoTagError::DocumentState(_))));
}

#[tokio::test]
async fn rejected_review_writes_nothing() {
    let fixture = Fixture::new();
    let service = fixture
        .service(ScriptedModel::new(&["paris"]), Settings {
            show_pre_update_dialog: true,
            ..settings()
        })
        .with_reviewer(Arc::new(FixedReviewer {
            decision: ReviewDecision::Reject,
            accept_cost: true,
        }));

    let report = service.run(&TaggingRequest::new("paris.md")).await.unwrap();

    assert_eq!(report.status, TaggingStatus::Rejected);
    assert_eq!(fixture.read("paris.md"), NOTE);
}

#[tokio::test]
async fn edited_review_writes_only_accepted_tags() {
    let fixture = Fixture::new();
    let edited = vec![Tag::parse("landmark").unwrap()];
    let service = fixture
        .service(ScriptedModel::new(&["paris", "france"]), Settings {
            show_pre_update_dialog: true,
            use_frontmatter_autotags_key: true,
            ..settings()
        })
        .with_reviewer(Arc::new(FixedReviewer {
            decision: ReviewDecision::Accept(edited.clone()),
            accept_cost: true,
        }));

    let report = service.run(&TaggingRequest::new("paris.md")).await.unwrap();

    assert_eq!(report.inserted, edited);
    let written = fixture.read("paris.md");
    assert!(written.contains("autotags:\n- landmark\n"), "{written}");
    assert!(!written.contains("france"));
}

#[tokio::test]
async fn deduped_tags_are_not_reported_as_inserted() {
    let fixture = Fixture::new();
    let notifier = Arc::new(RecordingNotifier::default());
    let service = fixture
        .service(ScriptedModel::new(&["Paris", "paris", "France"]), Settings {
            dedupe_against_existing: true,
            ..settings()
        })
        .with_notifier(notifier.clone());

    let report = service.run(&TaggingRequest::new("paris.md")).await.unwrap();

    let inserted: Vec<&str> = report.inserted.iter().map(Tag::as_str).collect();
    assert_eq!(inserted, vec!["paris", "france"]);
    assert_eq!(report.suggested.len(), 3);
    assert!(fixture.read("paris.md").contains("- travel\n- paris\n- france\n---"));

    let messages = notifier.messages.lock().unwrap();
    assert!(messages.iter().any(|m| m == "2 tags inserted"));
    assert!(messages.iter().any(|m| m.ends_with("#paris #france")));
}

#[tokio::test]
async fn accepted_tags_already_present_leave_nothing_to_insert() {
    let fixture = Fixture::new();
    let service = fixture
        .service(ScriptedModel::new(&["paris"]), Settings {
            show_pre_update_dialog: true,
            dedupe_against_existing: true,
            ..settings()
        })
        .with_reviewer(Arc::new(FixedReviewer {
            decision: ReviewDecision::Accept(vec![Tag::parse("travel").unwrap()]),
            accept_cost: true,
        }));

    let report = service.run(&TaggingRequest::new("paris.md")).await.unwrap();

    assert_eq!(report.status, TaggingStatus::NoNewTags);
    assert!(report.inserted.is_empty());
    assert_eq!(fixture.read("paris.md"), NOTE);
}

#[tokio::test]
async fn tags_under_autotags_key_are_not_suggested_again() {
    let fixture = Fixture::new();
    fs::write(
        fixture.dir.path().join("paris.md"),
        "---\nautotags:\n- eiffel-tower\n---\nThe Eiffel Tower is in Paris.\n",
    )
    .unwrap();
    let model = ScriptedModel::new(&["Eiffel Tower", "Paris"]);
    let service = fixture.service(model.clone(), Settings {
        use_frontmatter_autotags_key: true,
        ..settings()
    });

    let report = service.run(&TaggingRequest::new("paris.md")).await.unwrap();

    let inserted: Vec<&str> = report.inserted.iter().map(Tag::as_str).collect();
    assert_eq!(inserted, vec!["paris"]);
    assert_eq!(
        fixture.read("paris.md"),
        "---\nautotags:\n- eiffel-tower\n- paris\n---\nThe Eiffel Tower is in Paris.\n"
    );
    let sent = model.last_request.lock().unwrap().clone().unwrap();
    assert!(sent.known_tags.contains(&"eiffel-tower".to_string()));
}

#[tokio::test]
async fn declined_cost_estimate_skips_the_request() {
    let fixture = Fixture::new();
    let model = ScriptedModel::new(&["paris"]);
    let service = fixture
        .service(model.clone(), Settings {
            check_cost_estimation: true,
            ..settings()
        })
        .with_reviewer(Arc::new(FixedReviewer {
            decision: ReviewDecision::Reject,
            accept_cost: false,
        }));

    let report = service.run(&TaggingRequest::new("paris.md")).await.unwrap();

    assert_eq!(report.status, TaggingStatus::Cancelled);
    assert!(report.estimate.is_some());
    assert_eq!(model.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn prefix_and_style_come_from_settings() {
    let fixture = Fixture::new();
    let service = fixture.service(ScriptedModel::new(&["Eiffel Tower"]), Settings {
        use_autotag_prefix: true,
        tags_format: CaseStyle::Snake,
        ..settings()
    });

    let report = service.run(&TaggingRequest::new("paris.md")).await.unwrap();

    assert_eq!(report.inserted[0].as_str(), "autotag/eiffel_tower");
}

#[tokio::test]
async fn demo_mode_needs_no_credentials() {
    let fixture = Fixture::new();
    let service = TagService::from_settings(
        fixture.vault.clone(),
        fixture.vault.clone(),
        Settings {
            demo_mode: true,
            show_pre_update_dialog: false,
            use_autotag_prefix: false,
            ..Settings::default()
        },
        DebugLog::new(),
    )
    .unwrap();

    let report = service.run(&TaggingRequest::new("paris.md")).await.unwrap();

    let inserted: Vec<&str> = report.inserted.iter().map(Tag::as_str).collect();
    assert_eq!(inserted[0], "sample-tag-1");
    assert_eq!(inserted.len(), 5);
}

#[test]
fn estimate_uses_selected_model_pricing() {
    let fixture = Fixture::new();
    let service = fixture.service(ScriptedModel::new(&[]), settings());

    let estimate = service
        .estimate(&TaggingRequest::new("paris.md"))
        .unwrap()
        .unwrap();

    assert!(estimate.input_tokens > 0);
    assert!(estimate.cost_usd > 0.0);
}
