//! End-to-end sessions against the virtual card, raw bytes in and out

use gas_token::card::CardDataStore;
use gas_token::config::PersonalizationConfig;
use gas_token::station::{PurchaseInfo, PurchaseUpdate};
use gas_token::tlv::{decode_exact, tags};
use gas_token::VirtualCard;
use tempfile::TempDir;

const SELECT: &str = "00A4040006F05353475301";
const VERIFY: &str = "8001000003010203";

fn card_with_balance(balance: u64) -> VirtualCard {
    let config = PersonalizationConfig {
        initial_balance: balance,
        ..Default::default()
    };
    let mut store = CardDataStore::in_memory();
    store.load(&config).unwrap();
    let mut card = VirtualCard::new(store).unwrap();
    card.power_on();
    card
}

fn send(card: &mut VirtualCard, apdu: &str) -> Vec<u8> {
    card.process_apdu(&hex::decode(apdu).unwrap())
}

fn sw(response: &[u8]) -> String {
    hex::encode_upper(&response[response.len() - 2..])
}

fn update_apdu(station: &[u8; 5], time: &[u8; 6], amount: u32, price: u32) -> String {
    let data = PurchaseUpdate::new(PurchaseInfo {
        station_id: *station,
        buy_time: *time,
        amount,
        price,
    })
    .encode();
    format!("800200{:02X}{:02X}{}", 0, data.len(), hex::encode_upper(data))
}

#[test]
fn test_full_purchase_session() {
    let mut card = card_with_balance(1_000_000);
    assert_eq!(sw(&send(&mut card, SELECT)), "9000");
    assert_eq!(sw(&send(&mut card, VERIFY)), "9000");

    let resp = send(&mut card, &update_apdu(b"ST001", b"140403", 10, 5));
    assert_eq!(sw(&resp), "9000");

    let resp = send(&mut card, "8003010008");
    assert_eq!(hex::encode_upper(&resp), "00000000009999509000");

    let resp = send(&mut card, "8004000000");
    assert_eq!(sw(&resp), "9000");
    let ledger = decode_exact(&resp[..resp.len() - 2]).unwrap();
    assert_eq!(ledger.tag, tags::PURCHASE_HISTORIES);
    assert_eq!(ledger.length(), 29);

    // by station, hit and miss
    let resp = send(&mut card, "80060000055354303031");
    assert_eq!(sw(&resp), "9000");
    let resp = send(&mut card, "80060000055354303032");
    assert_eq!(sw(&resp), "6308");

    // by time
    let resp = send(&mut card, "8005000006313430343033");
    assert_eq!(sw(&resp), "9000");
    assert_eq!(resp.len(), 2 + 29 + 2);

    let resp = send(&mut card, "8007000000");
    assert_eq!(sw(&resp), "9000");
    assert_eq!(resp[0], 0xE2);
}

#[test]
fn test_failed_purchase_is_not_recorded() {
    let mut card = card_with_balance(30);
    send(&mut card, SELECT);
    send(&mut card, VERIFY);

    let resp = send(&mut card, &update_apdu(b"ST001", b"140403", 10, 5));
    assert_eq!(sw(&resp), "6302");

    let resp = send(&mut card, "8003020008");
    assert_eq!(hex::encode_upper(&resp), "00000000000000009000");
    assert_eq!(sw(&send(&mut card, "8004000000")), "6308");
}

#[test]
fn test_blocked_token_cannot_be_selected() {
    let mut card = card_with_balance(1_000_000);
    send(&mut card, SELECT);
    assert_eq!(sw(&send(&mut card, "8001000001FF")), "6300");
    assert_eq!(sw(&send(&mut card, "8001000001FF")), "6300");
    assert_eq!(sw(&send(&mut card, "8001000001FF")), "6983");
    assert_eq!(sw(&send(&mut card, VERIFY)), "6983");

    card.reset();
    assert_eq!(sw(&send(&mut card, SELECT)), "6999");
    assert_eq!(sw(&send(&mut card, "8003010008")), "6985");
}

#[test]
fn test_session_ends_on_power_cycle() {
    let mut card = card_with_balance(1_000_000);
    send(&mut card, SELECT);
    send(&mut card, VERIFY);
    card.power_off();
    assert_eq!(sw(&send(&mut card, "8004000000")), "6985");

    card.power_on();
    send(&mut card, SELECT);
    assert_eq!(sw(&send(&mut card, "8004000000")), "6301");
}

#[test]
fn test_ledger_survives_restart() {
    let temp_dir = TempDir::new().unwrap();
    let config = PersonalizationConfig {
        initial_balance: 1_000_000,
        ..Default::default()
    };

    {
        let mut store = CardDataStore::new(Some(temp_dir.path().to_path_buf()));
        store.load(&config).unwrap();
        let mut card = VirtualCard::new(store).unwrap();
        card.power_on();
        send(&mut card, SELECT);
        send(&mut card, VERIFY);
        for station in [b"ST001", b"ST002", b"ST001"] {
            let resp = send(&mut card, &update_apdu(station, b"140403", 1, 100));
            assert_eq!(sw(&resp), "9000");
        }
    }

    let mut store = CardDataStore::new(Some(temp_dir.path().to_path_buf()));
    assert!(store.load(&config).unwrap());
    let mut card = VirtualCard::new(store).unwrap();
    card.power_on();
    send(&mut card, SELECT);
    send(&mut card, VERIFY);

    let resp = send(&mut card, "8003020008");
    assert_eq!(hex::encode_upper(&resp), "00000000000F41149000");

    let resp = send(&mut card, "80060000055354303031");
    assert_eq!(sw(&resp), "9000");
    let found = decode_exact(&resp[..resp.len() - 2]).unwrap();
    assert_eq!(found.children().count(), 2);
}

#[test]
fn test_corrupt_state_keeps_blocked_token_out() {
    let temp_dir = TempDir::new().unwrap();
    let config = PersonalizationConfig::default();

    {
        let mut store = CardDataStore::new(Some(temp_dir.path().to_path_buf()));
        store.load(&config).unwrap();
        let mut card = VirtualCard::new(store).unwrap();
        card.power_on();
        send(&mut card, SELECT);
        for _ in 0..3 {
            send(&mut card, "8001000001FF");
        }
        assert_eq!(card.applet().tries_remaining(), 0);
    }

    let state_file = temp_dir.path().join("card_state.json");
    let mut content = std::fs::read(&state_file).unwrap();
    content.push(b'x');
    std::fs::write(&state_file, content).unwrap();

    let mut store = CardDataStore::new(Some(temp_dir.path().to_path_buf()));
    assert!(store.load(&config).is_err());
}
