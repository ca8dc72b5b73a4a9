//! Command shell for the virtual gas station token
//!
//! Powers the token on, sends each hex-encoded APDU and prints the response
//! in hex. APDUs come from the command line or, if none are given, one per
//! line on stdin.
//!
//! Usage:
//!   gas-token-shell 00A4040006F05353475301 8001000003010203 8003010008
//!   gas-token-shell --personalize --pin 01020304 --balance 1000000
//!   gas-token-shell --encode-purchase ST001:140403:10:5

use std::io::{self, BufRead};
use std::path::PathBuf;

use clap::Parser;
use log::info;

use gas_token::apdu::{ins, APDU};
use gas_token::card::CardDataStore;
use gas_token::config::PersonalizationConfig;
use gas_token::station::{PurchaseInfo, PurchaseUpdate};
use gas_token::VirtualCard;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Command APDUs in hex
    apdus: Vec<String>,

    /// Directory holding the card state
    #[arg(long)]
    storage_dir: Option<PathBuf>,

    /// Keep the card state in memory only
    #[arg(long, conflicts_with = "storage_dir")]
    in_memory: bool,

    /// Personalization settings (JSON)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Wipe the token and personalize it before running any APDU
    #[arg(long)]
    personalize: bool,

    /// Reference PIN in hex, overrides the config
    #[arg(long)]
    pin: Option<String>,

    /// Initial balance, overrides the config
    #[arg(long)]
    balance: Option<u64>,

    /// Print an UPDATE PURCHASE INFO APDU for STATION:TIME:AMOUNT:PRICE and exit
    #[arg(long, value_name = "PURCHASE")]
    encode_purchase: Option<String>,
}

fn parse_purchase(arg: &str) -> Result<PurchaseInfo, Box<dyn std::error::Error>> {
    let parts: Vec<&str> = arg.split(':').collect();
    let [station, time, amount, price] = parts.as_slice() else {
        return Err("expected STATION:TIME:AMOUNT:PRICE".into());
    };
    Ok(PurchaseInfo {
        station_id: station
            .as_bytes()
            .try_into()
            .map_err(|_| "station id must be 5 bytes")?,
        buy_time: time
            .as_bytes()
            .try_into()
            .map_err(|_| "buy time must be 6 bytes")?,
        amount: amount.parse()?,
        price: price.parse()?,
    })
}

fn personalization(cli: &Cli) -> Result<PersonalizationConfig, Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(path) => PersonalizationConfig::load(path)?,
        None => PersonalizationConfig::default(),
    };
    if let Some(pin) = &cli.pin {
        config.pin = hex::decode(pin)?;
    }
    if let Some(balance) = cli.balance {
        config.initial_balance = balance;
    }
    config.validate()?;
    Ok(config)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    if let Some(purchase) = &cli.encode_purchase {
        let data = PurchaseUpdate::new(parse_purchase(purchase)?).encode();
        let apdu = APDU::with_data(ins::CLA, ins::UPDATE_PURCHASE_INFO, 0x00, 0x00, data);
        println!("{}", hex::encode_upper(apdu.to_bytes()));
        return Ok(());
    }

    let config = personalization(&cli)?;
    let mut store = if cli.in_memory {
        CardDataStore::in_memory()
    } else {
        CardDataStore::new(cli.storage_dir.clone())
    };
    if cli.personalize {
        // Replaces whatever is stored, readable or not
        if !store.personalize(&config)? {
            return Err("failed to persist personalized state".into());
        }
        info!("Token personalized");
    } else {
        store.load(&config)?;
    }

    let mut card = VirtualCard::new(store)?;
    let atr = card.power_on();
    println!("ATR: {}", hex::encode_upper(atr));

    let lines: Vec<String> = if cli.apdus.is_empty() {
        io::stdin().lock().lines().collect::<Result<_, _>>()?
    } else {
        cli.apdus.clone()
    };

    for line in lines {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let command: String = line.split_whitespace().collect();
        let bytes = match hex::decode(&command) {
            Ok(bytes) => bytes,
            Err(e) => {
                eprintln!("{}: {}", command, e);
                continue;
            }
        };
        let response = card.process_apdu(&bytes);
        println!("> {}", hex::encode_upper(&bytes));
        println!("< {}", hex::encode_upper(response));
    }

    card.power_off();
    Ok(())
}
