use engine::{EngineConfig, Error, ModelKind, NormalizationMode};
use std::fs;
use std::path::Path;
use tempfile::tempdir;

const CORPUS_A: &str = "[[Paris]]
CATEGORIES: capital city
Paris is the capital of France
==References==
Guide to Paris
[[Danube]]
CATEGORIES: river
The Danube flows through Vienna and Budapest
";

const CORPUS_B: &str = "[[Vienna]]
CATEGORIES: capital city
Vienna is the capital of Austria [tpl]coord[/tpl]
[[File:Vienna skyline.jpg]]
capital of Austria
";

const QUESTIONS: &str = "Geography
capital of France
Paris

RIVERS
flows through Budapest
Danube

EUROPE
capital of Austria
Vienna

";

fn setup(root: &Path, mode: NormalizationMode, model: ModelKind) -> EngineConfig {
    let corpus = root.join("corpus");
    fs::create_dir_all(&corpus).unwrap();
    fs::write(corpus.join("a.txt"), CORPUS_A).unwrap();
    fs::write(corpus.join("b.txt"), CORPUS_B).unwrap();
    fs::write(root.join("questions.txt"), QUESTIONS).unwrap();
    let lemmas = root.join("lemmas.tsv");
    fs::write(&lemmas, "flows\tflow\ncities\tcity\n").unwrap();
    EngineConfig {
        normalization_mode: mode,
        scoring_model: model,
        index_path: root.join("index"),
        corpus_path: corpus,
        questions_path: root.join("questions.txt"),
        lemma_table: Some(lemmas),
        ..EngineConfig::default()
    }
}

#[test]
fn every_mode_and_model_answers_the_sample_questions() {
    let modes =
        [NormalizationMode::Verbatim, NormalizationMode::Stemmed, NormalizationMode::Lemmatized];
    let models =
        [ModelKind::Bm25, ModelKind::Boolean, ModelKind::JelinekMercer, ModelKind::ClassicTfidf];
    for mode in modes {
        for model in models {
            let tmp = tempdir().unwrap();
            let config = setup(tmp.path(), mode, model);
            let report = evaluator::run_evaluation(&config, false).unwrap();
            assert_eq!(report.total_questions, 3, "{mode} {model}");
            assert!(report.mrr() >= 0.0 && report.mrr() <= 1.0);
            assert!(report.mrr() >= report.precision_at_1());
            assert_eq!(report.precision_at_1_percent(), 100.0, "{mode} {model}");
            assert_eq!(report.mrr_percent(), 100.0, "{mode} {model}");
        }
    }
}

#[test]
fn second_run_reuses_the_index() {
    let tmp = tempdir().unwrap();
    let config = setup(tmp.path(), NormalizationMode::Verbatim, ModelKind::Bm25);
    let first = evaluator::run_evaluation(&config, false).unwrap();
    fs::remove_dir_all(&config.corpus_path).unwrap();
    let second = evaluator::run_evaluation(&config, false).unwrap();
    assert_eq!(first, second);
}

#[test]
fn query_returns_ranked_titles() {
    let tmp = tempdir().unwrap();
    let config = setup(tmp.path(), NormalizationMode::Verbatim, ModelKind::Boolean);
    let results = evaluator::run_query(&config, "capital city", false).unwrap();
    let titles: Vec<&str> = results.iter().map(|r| r.title.as_str()).collect();
    assert_eq!(titles, vec!["Paris", "Vienna"]);
    assert!(results.iter().all(|r| !r.title.starts_with("File:")));
}

#[test]
fn empty_question_file_is_fatal() {
    let tmp = tempdir().unwrap();
    let config = setup(tmp.path(), NormalizationMode::Verbatim, ModelKind::Bm25);
    fs::write(&config.questions_path, "").unwrap();
    let err = evaluator::run_evaluation(&config, false).unwrap_err();
    assert!(matches!(err.downcast_ref::<Error>(), Some(Error::Configuration(_))));
}

#[test]
fn missing_question_file_is_unavailable() {
    let tmp = tempdir().unwrap();
    let mut config = setup(tmp.path(), NormalizationMode::Verbatim, ModelKind::Bm25);
    config.questions_path = tmp.path().join("nope.txt");
    let err = evaluator::run_evaluation(&config, false).unwrap_err();
    assert!(matches!(err.downcast_ref::<Error>(), Some(Error::ResourceUnavailable { .. })));
}

#[test]
fn config_file_names_ignore_case() {
    let tmp = tempdir().unwrap();
    let base = setup(tmp.path(), NormalizationMode::Verbatim, ModelKind::Bm25);
    let config_path = tmp.path().join("engine.json");
    let json = format!(
        r#"{{"normalization_mode": "Stemmed", "scoring_model": "TFIDF", "index_path": {:?},
            "corpus_path": {:?}, "questions_path": {:?}}}"#,
        base.index_path, base.corpus_path, base.questions_path
    );
    fs::write(&config_path, json).unwrap();

    let config = EngineConfig::from_json_file(&config_path).unwrap();
    assert_eq!(config.normalization_mode, NormalizationMode::Stemmed);
    assert_eq!(config.scoring_model, ModelKind::ClassicTfidf);
    let report = evaluator::run_evaluation(&config, false).unwrap();
    assert_eq!(report.precision_at_1_percent(), 100.0);
}
