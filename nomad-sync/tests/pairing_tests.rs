use nomad_store::ExportedKey;
use nomad_sync::{PairingAnswer, PairingCode, PairingOffer, SyncError};
use nomad_types::MutablePointer;
use pretty_assertions::assert_eq;

fn make_key() -> ExportedKey {
    ExportedKey {
        id: MutablePointer::generate(),
        secret: "00".repeat(32),
    }
}

// ── PairingCode ──────────────────────────────────────────────────

#[test]
fn generated_code_has_two_halves() {
    let code = PairingCode::generate();
    assert_eq!(code.room().len(), 4);
    assert_eq!(code.password().len(), 4);
    assert_eq!(code.to_string().len(), 9);
}

#[test]
fn generated_codes_differ() {
    let codes: std::collections::HashSet<String> =
        (0..20).map(|_| PairingCode::generate().to_string()).collect();
    assert!(codes.len() > 1);
}

#[test]
fn parse_normalizes_input() {
    let code = PairingCode::parse(" ab12-cd34 ").unwrap();
    assert_eq!(code.room(), "AB12");
    assert_eq!(code.password(), "CD34");
    assert_eq!(code, PairingCode::parse("AB12CD34").unwrap());
}

#[test]
fn display_parse_roundtrip() {
    let code = PairingCode::generate();
    assert_eq!(PairingCode::parse(&code.to_string()).unwrap(), code);
}

#[test]
fn parse_rejects_bad_length() {
    assert!(matches!(
        PairingCode::parse("ABC"),
        Err(SyncError::InvalidPairingCode(_))
    ));
    assert!(PairingCode::parse("ABCD-EFGH-IJ").is_err());
}

#[test]
fn parse_rejects_symbols() {
    assert!(PairingCode::parse("AB!2CD34").is_err());
}

#[test]
fn hash_depends_on_both_halves() {
    let a = PairingCode::parse("AAAA-BBBB").unwrap();
    let b = PairingCode::parse("AAAA-BBBC").unwrap();
    assert_ne!(a.hash(), b.hash());
    assert_eq!(a.hash().len(), 64);
}

// ── Offer / answer ───────────────────────────────────────────────

#[test]
fn offer_verifies_against_its_code() {
    let code = PairingCode::generate();
    let offer = PairingOffer::new(&code, "docs", make_key(), MutablePointer::generate());
    assert!(offer.verify(&code).is_ok());
}

#[test]
fn offer_rejects_other_code() {
    let code = PairingCode::parse("AAAA-BBBB").unwrap();
    let other = PairingCode::parse("AAAA-CCCC").unwrap();
    let offer = PairingOffer::new(&code, "docs", make_key(), MutablePointer::generate());
    assert!(matches!(
        offer.verify(&other),
        Err(SyncError::PairingMismatch(_))
    ));
}

#[test]
fn answer_verifies_against_its_code() {
    let code = PairingCode::parse("WXYZ-2345").unwrap();
    let answer = PairingAnswer::new(&code, MutablePointer::generate(), MutablePointer::generate());
    assert!(answer.verify(&code).is_ok());
    assert!(answer.verify(&PairingCode::parse("WXYZ-2346").unwrap()).is_err());
}

#[test]
fn offer_serde_roundtrip() {
    let code = PairingCode::generate();
    let offer = PairingOffer::new(&code, "docs", make_key(), MutablePointer::generate());
    let json = serde_json::to_string(&offer).unwrap();
    let parsed: PairingOffer = serde_json::from_str(&json).unwrap();
    assert_eq!(offer, parsed);
}
