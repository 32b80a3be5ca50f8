use core_logic::{CsvWalletLoader, WalletError, WalletLoader};
use std::io::Write;
use tempfile::NamedTempFile;

const HEADER: &str = "address,private_key,proxy,contracts_count,bridge_chain_id";

#[test]
fn test_parses_full_row() {
    let content = format!(
        "{}\n0xAAA,0xkey1,user:pw@1.2.3.4:8080,4,8453\n",
        HEADER
    );
    let wallets = CsvWalletLoader::parse(&content).unwrap();

    assert_eq!(wallets.len(), 1);
    let w = &wallets[0];
    assert_eq!(w.address, "0xAAA");
    assert_eq!(w.private_key(), "0xkey1");
    assert_eq!(w.contracts_count, 4);
    assert_eq!(w.bridge_chain_id, Some(8453));
    assert_eq!(w.proxy.as_ref().unwrap().url, "http://1.2.3.4:8080");
}

#[test]
fn test_defaults_and_skips() {
    let content = format!(
        "{}\n\
         0xA,0xk1,,,\n\
         ,0xk2,,1,\n\
         0xC,,,1,\n\
         0xD,0xk4,,many,\n\
         0xE,0xk5,not-a-proxy,2,\n",
        HEADER
    );
    let wallets = CsvWalletLoader::parse(&content).unwrap();

    let addresses: Vec<&str> = wallets.iter().map(|w| w.address.as_str()).collect();
    assert_eq!(addresses, vec!["0xA", "0xE"]);
    assert_eq!(wallets[0].contracts_count, 1);
    assert_eq!(wallets[0].bridge_chain_id, None);
    // Bad proxy keeps the wallet, just without a proxy.
    assert!(wallets[1].proxy.is_none());
}

#[test]
fn test_header_aliases_and_order() {
    let content = "Contracts Count,Private Key,Wallet Address\n3,0xk,0xW\n";
    let wallets = CsvWalletLoader::parse(content).unwrap();

    assert_eq!(wallets.len(), 1);
    assert_eq!(wallets[0].address, "0xW");
    assert_eq!(wallets[0].contracts_count, 3);
}

#[test]
fn test_row_wider_than_header_is_skipped() {
    let content = format!(
        "{}\n\
         0xA,0xk1,user:pa,ss@1.2.3.4:8080,2,\n\
         0xB,0xk2,user:pass@1.2.3.4:8080,2\n",
        HEADER
    );
    let wallets = CsvWalletLoader::parse(&content).unwrap();

    // The comma in 0xA's password would shift contracts_count into proxy.
    assert_eq!(wallets.len(), 1);
    assert_eq!(wallets[0].address, "0xB");
    assert_eq!(wallets[0].contracts_count, 2);
}

#[test]
fn test_missing_required_column() {
    let err = CsvWalletLoader::parse("address,proxy\n0xA,\n").unwrap_err();
    assert!(matches!(err, WalletError::MissingColumn { column } if column == "private_key"));
}

#[tokio::test]
async fn test_load_from_file() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "{}", HEADER).unwrap();
    writeln!(file, "0x1,0xk1,,2,").unwrap();
    writeln!(file, "# comment line").unwrap();
    writeln!(file, "0x2,0xk2,,1,10").unwrap();

    let wallets = CsvWalletLoader::new(file.path()).load_wallets().await.unwrap();
    assert_eq!(wallets.len(), 2);
    assert_eq!(wallets[1].bridge_chain_id, Some(10));
}

#[tokio::test]
async fn test_load_empty_file_is_error() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "{}", HEADER).unwrap();

    let result = CsvWalletLoader::new(file.path()).load_wallets().await;
    assert!(result.is_err());
}
