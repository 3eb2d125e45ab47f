use chrono::{Duration, Utc};
use nomad_types::EntryTimestamp;

#[test]
fn now_is_close_to_wall_clock() {
    let before = Utc::now();
    let ts = EntryTimestamp::now();
    let after = Utc::now();
    assert!(ts.as_datetime() >= before);
    assert!(ts.as_datetime() <= after);
}

#[test]
fn tick_is_strictly_increasing() {
    let mut ts = EntryTimestamp::now();
    for _ in 0..1000 {
        let next = ts.tick();
        assert!(next > ts);
        ts = next;
    }
}

#[test]
fn tick_from_future_timestamp_advances_past_it() {
    let future = EntryTimestamp::from_datetime(Utc::now() + Duration::hours(1));
    let next = future.tick();
    assert!(next > future);
    assert!(next.as_datetime() - future.as_datetime() <= Duration::milliseconds(1));
}

#[test]
fn from_millis_roundtrip() {
    let ts = EntryTimestamp::from_millis(1_700_000_000_000).unwrap();
    assert_eq!(ts.as_datetime().timestamp_millis(), 1_700_000_000_000);
}

#[test]
fn ordering_follows_time() {
    let a = EntryTimestamp::from_millis(100).unwrap();
    let b = EntryTimestamp::from_millis(200).unwrap();
    assert!(a < b);
}

#[test]
fn display_parse_roundtrip() {
    let ts = EntryTimestamp::now();
    let parsed: EntryTimestamp = ts.to_string().parse().unwrap();
    assert_eq!(ts, parsed);
}

#[test]
fn parse_rejects_garbage() {
    assert!("yesterday".parse::<EntryTimestamp>().is_err());
}

#[test]
fn serde_roundtrip() {
    let ts = EntryTimestamp::now();
    let json = serde_json::to_string(&ts).unwrap();
    let parsed: EntryTimestamp = serde_json::from_str(&json).unwrap();
    assert_eq!(ts, parsed);
}
