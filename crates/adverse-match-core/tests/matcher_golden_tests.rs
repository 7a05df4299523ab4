//! Golden tests for the medicine matcher.
//!
//! These tests run known queries against a fixed catalog.

use std::sync::Arc;
use std::thread;

use adverse_match_core::{EngineConfig, MatchEngine, MatchOptions, MedicineRecord, SqliteStore};

/// Test case from golden file.
struct GoldenCase {
    id: &'static str,
    query: &'static str,
    /// `None` when the query should match nothing
    expected_top_id: Option<&'static str>,
    expected_match_type: Option<&'static str>,
    min_score: f64,
}

fn get_golden_cases() -> Vec<GoldenCase> {
    vec![
        GoldenCase {
            id: "exact-brand",
            query: "tylenol",
            expected_top_id: Some("MED-001"),
            expected_match_type: Some("exact_name"),
            min_score: 1.0,
        },
        GoldenCase {
            id: "exact-brand-padded",
            query: "  Zyrtec  ",
            expected_top_id: Some("MED-006"),
            expected_match_type: Some("exact_name"),
            min_score: 1.0,
        },
        GoldenCase {
            id: "exact-multiword-brand",
            query: "Tylenol PM",
            expected_top_id: Some("MED-002"),
            expected_match_type: Some("exact_name"),
            min_score: 1.0,
        },
        GoldenCase {
            id: "exact-generic-shared",
            query: "IBUPROFEN",
            expected_top_id: Some("MED-003"),
            expected_match_type: Some("exact_generic"),
            min_score: 1.0,
        },
        GoldenCase {
            id: "exact-generic",
            query: "metformin",
            expected_top_id: Some("MED-005"),
            expected_match_type: Some("exact_generic"),
            min_score: 1.0,
        },
        GoldenCase {
            id: "typo-generic-product",
            query: "acetaminofen",
            expected_top_id: Some("MED-009"),
            expected_match_type: Some("high_similarity_name"),
            min_score: 0.4,
        },
        GoldenCase {
            id: "typo-brand",
            query: "lipitr",
            expected_top_id: Some("MED-007"),
            expected_match_type: Some("high_similarity_name"),
            min_score: 0.4,
        },
        GoldenCase {
            id: "partial-brand",
            query: "amox",
            expected_top_id: Some("MED-008"),
            expected_match_type: Some("prefix_contains_name"),
            min_score: 0.5,
        },
        GoldenCase {
            id: "nonsense",
            query: "xyzzy",
            expected_top_id: None,
            expected_match_type: None,
            min_score: 0.0,
        },
        GoldenCase {
            id: "empty",
            query: "",
            expected_top_id: None,
            expected_match_type: None,
            min_score: 0.0,
        },
        GoldenCase {
            id: "punctuation-only",
            query: " ;; ",
            expected_top_id: None,
            expected_match_type: None,
            min_score: 0.0,
        },
    ]
}

fn medicine(id: &str, name: &str, generic: Option<&str>, category: &str) -> MedicineRecord {
    let mut record = MedicineRecord::new(id.into(), name.into());
    record.generic_name = generic.map(String::from);
    record.category = category.into();
    record
}

fn catalog() -> Vec<MedicineRecord> {
    vec![
        medicine("MED-001", "Tylenol", Some("Acetaminophen"), "Analgesic"),
        medicine("MED-002", "Tylenol PM", Some("Acetaminophen; Diphenhydramine"), "Analgesic"),
        medicine("MED-003", "Advil", Some("Ibuprofen"), "NSAID"),
        medicine("MED-004", "Motrin", Some("Ibuprofen"), "NSAID"),
        medicine("MED-005", "Glucophage", Some("Metformin"), "Antidiabetic"),
        medicine("MED-006", "Zyrtec", Some("Cetirizine"), "Antihistamine"),
        medicine("MED-007", "Lipitor", Some("Atorvastatin"), "Statin"),
        medicine("MED-008", "Amoxil", Some("Amoxicillin"), "Antibiotic"),
        medicine("MED-009", "Acetaminophen", Some("Acetaminophen"), "Analgesic"),
    ]
}

fn setup_engine() -> (Arc<SqliteStore>, MatchEngine) {
    let store = Arc::new(SqliteStore::open_in_memory().unwrap());
    store
        .with_db(|db| {
            for record in catalog() {
                db.upsert_medicine(&record)?;
            }
            Ok(())
        })
        .unwrap();
    let engine = MatchEngine::new(store.clone(), EngineConfig::default()).unwrap();
    (store, engine)
}

#[test]
fn test_golden_cases() {
    let (_store, engine) = setup_engine();

    for case in get_golden_cases() {
        let results = engine.search_medicines(case.query, None).unwrap();

        match case.expected_top_id {
            None => assert!(
                results.is_empty(),
                "Case {}: expected no results, got {:?}",
                case.id,
                results.iter().map(|r| &r.candidate_id).collect::<Vec<_>>()
            ),
            Some(expected_id) => {
                assert!(!results.is_empty(), "Case {}: no results", case.id);
                let top = &results[0];
                assert_eq!(top.candidate_id, expected_id, "Case {}: top candidate mismatch", case.id);
                assert_eq!(
                    Some(top.match_type.to_string().as_str()),
                    case.expected_match_type,
                    "Case {}: match type mismatch",
                    case.id
                );
                assert!(
                    top.combined_score >= case.min_score,
                    "Case {}: score {} below {}",
                    case.id,
                    top.combined_score,
                    case.min_score
                );
            }
        }
    }
}

#[test]
fn test_exact_match_ranks_first_among_fuzzy_candidates() {
    let (_store, engine) = setup_engine();
    let options = MatchOptions {
        include_exact: false,
        min_score: 0.0,
        ..MatchOptions::default()
    };

    let results = engine.search_medicines("tylenol", Some(&options)).unwrap();
    assert!(results.len() >= 2);
    assert_eq!(results[0].candidate_id, "MED-001");
    assert_eq!(results[0].match_type.to_string(), "exact_name");
    assert_eq!(results[0].combined_score, 1.0);
    assert!(results[1..].iter().all(|r| r.combined_score < 1.0));
}

#[test]
fn test_shared_generic_tie_prefers_shorter_name() {
    let (_store, engine) = setup_engine();
    let options = MatchOptions {
        include_exact: false,
        ..MatchOptions::default()
    };

    let results = engine.search_medicines("ibuprofen", Some(&options)).unwrap();
    let ids: Vec<&str> = results.iter().map(|r| r.candidate_id.as_str()).collect();
    assert_eq!(&ids[..2], &["MED-003", "MED-004"]);
    assert_eq!(results[0].combined_score, results[1].combined_score);
}

#[test]
fn test_scores_bounded_and_sorted() {
    let (_store, engine) = setup_engine();
    let options = MatchOptions {
        include_exact: false,
        min_score: 0.0,
        max_results: 50,
    };

    for query in ["tyl", "acetaminophen", "ibuprofin", "statin", "pm", "a"] {
        let results = engine.search_medicines(query, Some(&options)).unwrap();
        for pair in results.windows(2) {
            assert!(pair[0].combined_score >= pair[1].combined_score, "query {query:?} not sorted");
        }
        for r in &results {
            assert!((0.0..=1.0).contains(&r.combined_score));
            assert!(r.per_metric_scores.values().all(|v| (0.0..=1.0).contains(v)));
            if r.combined_score == 1.0 {
                assert!(r.match_type.is_exact(), "query {query:?}: 1.0 without exact match");
            }
        }
    }
}

#[test]
fn test_malformed_record_does_not_block_matches() {
    let (store, engine) = setup_engine();
    store
        .with_db(|db| db.upsert_medicine(&MedicineRecord::new("MED-BAD".into(), "   ".into())))
        .unwrap();
    engine.force_refresh_index().unwrap();

    let results = engine.search_medicines("advil", None).unwrap();
    assert_eq!(results[0].candidate_id, "MED-003");
    assert_eq!(engine.index_stats().unwrap().record_count, catalog().len());
}

#[test]
fn test_deactivated_medicine_disappears_after_refresh() {
    let (store, engine) = setup_engine();
    assert_eq!(engine.search_medicines("zyrtec", None).unwrap()[0].candidate_id, "MED-006");

    store.with_db(|db| db.deactivate_medicine("MED-006")).unwrap();
    engine.force_refresh_index().unwrap();

    let results = engine.search_medicines("zyrtec", None).unwrap();
    assert!(results.iter().all(|r| r.candidate_id != "MED-006"));
}

#[test]
fn test_concurrent_queries_are_deterministic() {
    let (_store, engine) = setup_engine();
    let engine = Arc::new(engine);
    let options = MatchOptions {
        include_exact: false,
        min_score: 0.0,
        ..MatchOptions::default()
    };
    let expected = engine.search_medicines("tylenol", Some(&options)).unwrap();

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let engine = Arc::clone(&engine);
            let options = options.clone();
            thread::spawn(move || {
                if i % 4 == 0 {
                    engine.force_refresh_index().unwrap();
                }
                engine.search_medicines("tylenol", Some(&options)).unwrap()
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), expected);
    }
}

#[test]
fn test_suggestions() {
    let (_store, engine) = setup_engine();

    let suggestions = engine.get_suggestions("Tylenol", 5).unwrap();
    assert_eq!(suggestions[0].id, "MED-001");
    assert_eq!(suggestions[0].score, 1.0);
    assert!(suggestions.iter().any(|s| s.id == "MED-002"));

    let capped = engine.get_suggestions("tyl", 1).unwrap();
    assert_eq!(capped.len(), 1);
    assert!(engine.get_suggestions("  ", 5).unwrap().is_empty());
}

#[test]
fn test_forced_refresh_exposes_new_exact_record() {
    let (store, engine) = setup_engine();
    assert!(engine
        .search_medicines("Zyrtec-D", None)
        .unwrap()
        .iter()
        .all(|r| r.candidate_id != "MED-010"));

    store
        .with_db(|db| db.upsert_medicine(&medicine("MED-010", "Zyrtec-D", Some("Cetirizine; Pseudoephedrine"), "Antihistamine")))
        .unwrap();
    engine.force_refresh_index().unwrap();

    let results = engine.search_medicines("zyrtec-d", None).unwrap();
    assert_eq!(results[0].candidate_id, "MED-010");
    assert_eq!(results[0].match_type.to_string(), "exact_name");
    assert_eq!(results[0].combined_score, 1.0);
}
