//! End-to-end composition tests against in-memory upstream workflows.

use forkbuild_workflow::{
    CheckoutRecognizer, CheckoutTarget, Composer, CompositionRequest, CompositionWarning,
    EnvelopeConfig, Error, ReleasePolicy, SourceSpec, StaticFetcher, WorkflowDocument,
    extract_jobs, rewrite_checkout,
};
use serde_yaml::Value;

const BUILD_A: &str = "\
name: Build A
on:
  push:
    branches: [master]
jobs:
  build-a:
    runs-on: ubuntu-latest
    steps:
      - uses: actions/checkout@v4
      - run: make -C a
";

const BUILD_B: &str = "\
name: Build B
on:
  pull_request: {}
jobs:
  build-b:
    runs-on: macos-latest
    needs: build-a
    steps:
      - name: Checkout
        uses: actions/checkout@v4
        with:
          submodules: recursive
      - run: make -C b
";

fn request(sources: Vec<SourceSpec>) -> CompositionRequest {
    CompositionRequest {
        upstream: "upstream/x".to_string(),
        tag: "v1.2.3".to_string(),
        sources,
        target: CheckoutTarget::new("fork/x", "build-v1.2.3"),
    }
}

fn jobs_of(document: &WorkflowDocument) -> &serde_yaml::Mapping {
    document
        .section("jobs")
        .and_then(Value::as_mapping)
        .expect("jobs section")
}

#[tokio::test]
async fn test_two_sources_compose_into_one_workflow() {
    let fetcher = StaticFetcher::new()
        .with_document("a.yml", BUILD_A)
        .with_document("b.yml", BUILD_B);
    let composer =
        Composer::new(EnvelopeConfig::new("Fork Build")).with_release(ReleasePolicy::Disabled);

    let composition = composer
        .compose(
            &fetcher,
            &request(vec![
                SourceSpec::new("build-a", "a.yml"),
                SourceSpec::new("build-b", "b.yml"),
            ]),
        )
        .await
        .unwrap();

    let document = &composition.document;
    let jobs = jobs_of(document);
    let ids: Vec<_> = jobs.keys().filter_map(Value::as_str).collect();
    assert_eq!(ids, ["build-a", "build-b"]);

    for id in ids {
        let checkout = &jobs[id]["steps"]
            .as_sequence()
            .unwrap()
            .iter()
            .find(|step| step["uses"] == Value::from("actions/checkout@v4"))
            .unwrap()["with"];
        assert_eq!(checkout["repository"], Value::from("fork/x"));
        assert_eq!(checkout["ref"], Value::from("build-v1.2.3"));
    }
    assert_eq!(
        jobs["build-b"]["steps"][0]["with"]["submodules"],
        Value::from("recursive")
    );

    assert_eq!(document.name(), Some("Fork Build"));
    let on = document.section("on").unwrap().as_mapping().unwrap();
    let triggers: Vec<_> = on.keys().filter_map(Value::as_str).collect();
    assert_eq!(triggers, ["workflow_dispatch"]);
    assert!(composition.warnings.is_empty());
}

#[tokio::test]
async fn test_output_parses_back() {
    let fetcher = StaticFetcher::new()
        .with_document("a.yml", BUILD_A)
        .with_document("b.yml", BUILD_B);
    let composition = Composer::new(EnvelopeConfig::new("Fork Build"))
        .compose(
            &fetcher,
            &request(vec![
                SourceSpec::new("build-a", "a.yml"),
                SourceSpec::new("build-b", "b.yml"),
            ]),
        )
        .await
        .unwrap();

    let reparsed = WorkflowDocument::parse("output", composition.yaml.as_bytes()).unwrap();
    assert_eq!(reparsed, composition.document);

    let jobs = extract_jobs(&reparsed, "output").unwrap();
    assert_eq!(jobs["create-release"].needs(), ["build-a", "build-b"]);
}

#[test]
fn test_untouched_document_round_trips() {
    let document = WorkflowDocument::parse("build-b", BUILD_B.as_bytes()).unwrap();
    let reparsed = WorkflowDocument::parse("again", &document.to_bytes().unwrap()).unwrap();
    assert_eq!(document, reparsed);
}

#[test]
fn test_rewrite_changes_only_checkout_inputs() {
    let document = WorkflowDocument::parse("build-b", BUILD_B.as_bytes()).unwrap();
    let original = extract_jobs(&document, "build-b").unwrap().shift_remove("build-b").unwrap();

    let rewrite = rewrite_checkout(
        original.clone(),
        &CheckoutRecognizer::default(),
        &CheckoutTarget::new("fork/x", "build-v1.2.3"),
    );
    assert_eq!(rewrite.rewritten_steps, [0]);

    let before = original.steps();
    let after = rewrite.job.steps();
    assert_eq!(before[1], after[1]);
    assert_eq!(after[0].name(), Some("Checkout"));
    assert_eq!(after[0].uses(), before[0].uses());
    assert_eq!(after[0].input("submodules"), before[0].input("submodules"));
    assert_eq!(original.runs_on(), rewrite.job.runs_on());
    assert_eq!(original.needs(), rewrite.job.needs());
}

#[tokio::test]
async fn test_job_without_checkout_warns() {
    let fetcher = StaticFetcher::new().with_document(
        "lint.yml",
        "jobs:\n  lint:\n    runs-on: ubuntu-latest\n    steps:\n      - run: echo ok\n",
    );
    let composition = Composer::new(EnvelopeConfig::new("Fork Build"))
        .with_release(ReleasePolicy::Disabled)
        .compose(&fetcher, &request(vec![SourceSpec::new("lint", "lint.yml")]))
        .await
        .unwrap();

    assert_eq!(
        composition.warnings,
        [CompositionWarning::NoCheckoutStepFound {
            label: "lint".to_string(),
            job: "lint".to_string(),
        }]
    );
}

#[tokio::test]
async fn test_unresolved_dependency_is_fatal() {
    let fetcher = StaticFetcher::new().with_document("b.yml", BUILD_B);
    let err = Composer::new(EnvelopeConfig::new("Fork Build"))
        .compose(&fetcher, &request(vec![SourceSpec::new("build-b", "b.yml")]))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        Error::UnresolvedDependency { ref job, ref reference } if job == "build-b" && reference == "build-a"
    ));
}

#[tokio::test]
async fn test_release_job_collision_is_fatal() {
    let fetcher = StaticFetcher::new().with_document("a.yml", BUILD_A);
    let err = Composer::new(EnvelopeConfig::new("Fork Build"))
        .with_release(ReleasePolicy::Standard {
            id: "build-a".to_string(),
        })
        .compose(&fetcher, &request(vec![SourceSpec::new("build-a", "a.yml")]))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::DuplicateJobIdentifier { ref id, .. } if id == "build-a"));
}

#[tokio::test]
async fn test_malformed_source_names_label() {
    let fetcher = StaticFetcher::new().with_document("bad.yml", "name: no jobs here\n");
    let err = Composer::new(EnvelopeConfig::new("Fork Build"))
        .compose(&fetcher, &request(vec![SourceSpec::new("windows", "bad.yml")]))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::MissingJobGraph { ref label } if label == "windows"));
}

#[tokio::test]
async fn test_job_prefix_keeps_output_references() {
    let fetcher = StaticFetcher::new().with_document(
        "linux.yml",
        r#"jobs:
  version:
    runs-on: ubuntu-latest
    outputs:
      v: ${{ steps.v.outputs.v }}
    steps:
      - id: v
        run: echo "v=1" >> "$GITHUB_OUTPUT"
  build:
    runs-on: ubuntu-latest
    needs: version
    if: ${{ needs.version.outputs.v == '1' }}
    steps:
      - uses: actions/checkout@v4
      - run: echo ${{ needs.version.outputs.v }}
"#,
    );
    let composition = Composer::new(EnvelopeConfig::new("Fork Build"))
        .with_release(ReleasePolicy::Disabled)
        .compose(
            &fetcher,
            &request(vec![
                SourceSpec::new("linux", "linux.yml").with_job_prefix("linux-"),
            ]),
        )
        .await
        .unwrap();

    assert!(!composition.yaml.contains("needs.version."));

    let jobs = jobs_of(&composition.document);
    let build = &jobs["linux-build"];
    assert_eq!(build["needs"], Value::from("linux-version"));
    assert_eq!(
        build["if"],
        Value::from("${{ needs.linux-version.outputs.v == '1' }}")
    );
    assert_eq!(
        build["steps"][1]["run"],
        Value::from("echo ${{ needs.linux-version.outputs.v }}")
    );
}
