use chrono::NaiveDate;
use pretty_assertions::assert_eq;
use transform::{extract_match, MatchListing, MatchRecord, TransformStats, WinningTeam};

fn listing_path() -> std::path::PathBuf {
    std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("../testfiles/all_matches.json")
}

fn at(day: u32, h: u32, m: u32, s: u32) -> chrono::NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 1, day)
        .unwrap()
        .and_hms_opt(h, m, s)
        .unwrap()
}

#[test]
fn listing_batches() {
    let listing = MatchListing::open(listing_path()).unwrap();

    let mut batches = listing.batches(2).unwrap();
    assert_eq!(5, batches.total());

    let first = batches.next().unwrap();
    let second = batches.next().unwrap();
    assert_eq!(None, batches.next());

    assert_eq!(
        vec![1001, 1002],
        first.iter().map(|m| m.match_id).collect::<Vec<_>>()
    );
    assert_eq!(
        vec![1004, 1005],
        second.iter().map(|m| m.match_id).collect::<Vec<_>>()
    );
    assert_eq!(
        TransformStats {
            processed: 4,
            skipped: 1,
            skipped_files: 0,
            skipped_existing: 0,
        },
        batches.stats()
    );

    assert_eq!(
        MatchRecord {
            match_id: 1001,
            map_id: "stmariedumont_warfare".to_owned(),
            map_name: "St. Marie Du Mont".to_owned(),
            map_short_name: "SMDM".to_owned(),
            game_mode: "warfare".to_owned(),
            environment: "day".to_owned(),
            allies_score: 5,
            axis_score: 0,
            winning_team: WinningTeam::Allies,
            start_time: at(10, 19, 0, 0),
            end_time: at(10, 20, 30, 15),
            match_duration: 5415,
        },
        first[0]
    );

    assert_eq!(WinningTeam::Tie, first[1].winning_team);
    assert_eq!(at(11, 19, 0, 0), first[1].start_time);
    assert_eq!(5400, first[1].match_duration);

    assert_eq!(WinningTeam::Axis, second[0].winning_team);
    assert_eq!(2730, second[0].match_duration);

    assert_eq!((0, 0), (second[1].allies_score, second[1].axis_score));
    assert_eq!(WinningTeam::Tie, second[1].winning_team);
    assert_eq!(0, second[1].match_duration);
}

#[test]
fn every_traversal_starts_over() {
    let listing = MatchListing::open(listing_path()).unwrap();

    let first = listing.batches(10).unwrap().flatten().count();
    let second = listing.batches(3).unwrap().flatten().count();

    assert_eq!(4, first);
    assert_eq!(first, second);
}

#[test]
fn zero_batch_size_still_makes_progress() {
    let listing = MatchListing::open(listing_path()).unwrap();

    let batches = listing.batches(0).unwrap().collect::<Vec<_>>();
    assert_eq!(4, batches.len());
    assert!(batches.iter().all(|b| b.len() == 1));
}

#[test]
fn missing_listing() {
    let err = MatchListing::open("/definitely/not/here/all_matches.json").unwrap_err();
    assert!(matches!(err, transform::Error::Io { .. }), "{err:?}");
}

#[test]
fn maps_must_be_a_list() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("all_matches.json");
    std::fs::write(&path, r#"{"result": {"maps": {"id": 1}}}"#).unwrap();

    let err = MatchListing::open(&path).unwrap().batches(10).unwrap_err();
    assert!(matches!(err, transform::Error::MalformedListing(_)), "{err:?}");
}

#[test]
fn empty_result_is_empty_listing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("all_matches.json");
    std::fs::write(&path, r#"{"result": null}"#).unwrap();

    let mut batches = MatchListing::open(&path).unwrap().batches(10).unwrap();
    assert_eq!(None, batches.next());
    assert_eq!(0, batches.total());
}

#[test]
fn required_fields() {
    let full = serde_json::json!({
        "id": 7,
        "map": {
            "id": 42,
            "map": { "pretty_name": "Kursk", "shortname": "KUR" },
            "game_mode": "warfare",
            "environment": "day"
        },
        "start": "2025-01-10T19:00:00",
        "end": "2025-01-10T19:10:00"
    });

    let record = extract_match(&full).unwrap();
    assert_eq!("42", record.map_id);
    assert_eq!(600, record.match_duration);

    for pointer in [
        "/id",
        "/map/id",
        "/map/map/pretty_name",
        "/map/map/shortname",
        "/map/game_mode",
        "/map/environment",
        "/start",
        "/end",
    ] {
        let mut broken = full.clone();
        *broken.pointer_mut(pointer).unwrap() = serde_json::Value::Null;
        assert_eq!(None, extract_match(&broken), "{pointer}");
    }

    let mut empty_name = full.clone();
    *empty_name.pointer_mut("/map/map/pretty_name").unwrap() = serde_json::json!("");
    assert_eq!(None, extract_match(&empty_name));

    let mut bad_time = full.clone();
    *bad_time.pointer_mut("/end").unwrap() = serde_json::json!("not a time");
    assert_eq!(None, extract_match(&bad_time));
}
