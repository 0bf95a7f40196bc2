//! CLI Types

use adasend_cardano::{
    format_ada, AssetId, ProtocolParameters, SealedTransaction, TokenBalance, TxOutput,
    WalletBalance,
};
use adasend_provider::TokenInfo;
use serde::Serialize;

/// `asset=quantity`, asset as a unit or `policy.name`.
pub fn parse_token(arg: &str) -> Result<(AssetId, u128), String> {
    let (asset, quantity) = arg
        .rsplit_once('=')
        .ok_or_else(|| format!("'{arg}' is not of the form asset=quantity"))?;
    let asset: AssetId = asset.parse().map_err(|e| format!("{e}"))?;
    let quantity = quantity
        .parse()
        .map_err(|e| format!("quantity '{quantity}': {e}"))?;
    Ok((asset, quantity))
}

#[derive(Debug, Serialize)]
pub struct OutputReport {
    pub address: String,
    pub lovelace: u128,
    pub ada: String,
    pub tokens: Vec<TokenBalance>,
    pub change: bool,
}

#[derive(Debug, Serialize)]
pub struct BuildReport {
    pub tx_id: String,
    pub fee: u64,
    pub size: usize,
    pub inputs: Vec<String>,
    pub outputs: Vec<OutputReport>,
    pub unsigned_cbor: String,
}

impl BuildReport {
    pub fn new(tx: &SealedTransaction) -> Self {
        let change = tx.change_output();
        let outputs = tx
            .outputs()
            .iter()
            .map(|o| output_report(o, change.is_some_and(|c| std::ptr::eq(c, o))))
            .collect();
        Self {
            tx_id: tx.id().to_string(),
            fee: tx.fee(),
            size: tx.estimated_size(),
            inputs: tx.inputs().iter().map(|u| u.reference.to_string()).collect(),
            outputs,
            unsigned_cbor: tx.unsigned_hex(),
        }
    }

    pub fn print(&self) {
        println!("Transaction {}", self.tx_id);
        println!("  fee:  {} lovelace ({} ADA)", self.fee, format_ada(self.fee as u128));
        println!("  size: {} bytes (signed estimate)", self.size);
        println!("  inputs:");
        for input in &self.inputs {
            println!("    {input}");
        }
        println!("  outputs:");
        for output in &self.outputs {
            let tag = if output.change { " (change)" } else { "" };
            println!("    {}{tag}", output.address);
            println!("      {} ADA", output.ada);
            for token in &output.tokens {
                println!("      {} {}", token.quantity, token.display_name);
            }
        }
        println!("\nUnsigned CBOR:\n{}", self.unsigned_cbor);
    }
}

fn output_report(output: &TxOutput, change: bool) -> OutputReport {
    let balance = WalletBalance::from_value(&output.value, 1);
    OutputReport {
        address: output.address.to_string(),
        lovelace: balance.lovelace,
        ada: balance.ada,
        tokens: balance.tokens,
        change,
    }
}

pub fn print_parameters(params: &ProtocolParameters) {
    println!("Protocol parameters");
    println!("  min_fee_a:      {}", params.min_fee_a);
    println!("  min_fee_b:      {}", params.min_fee_b);
    println!("  min_utxo rule:  {:?}", params.min_utxo);
    println!("  min_utxo_value: {}", params.min_utxo_value);
    println!("  max_tx_size:    {}", params.max_tx_size);
    println!("  max_value_size: {}", params.max_value_size);
    println!("  key_deposit:    {}", params.key_deposit);
    println!("  pool_deposit:   {}", params.pool_deposit);
}

pub fn print_balance(address: &str, balance: &WalletBalance) {
    println!("{address}");
    println!("  {} ADA across {} UTXOs", balance.ada, balance.utxo_count);
    for token in &balance.tokens {
        println!("  {} {} ({})", token.quantity, token.display_name, token.unit);
    }
}

pub fn print_tokens(page: u32, tokens: &[TokenInfo]) {
    println!("Tokens, page {page}");
    for token in tokens {
        let mark = if token.verified { "verified" } else { "unverified" };
        println!("  {:<12} {} ({mark})", token.symbol, token.name);
        println!("    {}", token.fingerprint);
        println!("    {}", token.unit);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const POLICY: &str = "b0d07d45fe9514f80213f4020e5a61241458be626841cde717cb38a7";

    #[test]
    fn test_parse_token_forms() {
        let (asset, quantity) = parse_token(&format!("{POLICY}.HOSKY=25")).unwrap();
        assert_eq!(asset.name.as_bytes(), b"HOSKY");
        assert_eq!(quantity, 25);

        let (unit, _) = parse_token(&format!("{POLICY}484f534b59=1")).unwrap();
        assert_eq!(unit, asset);
    }

    #[test]
    fn test_parse_token_rejects() {
        assert!(parse_token("HOSKY").is_err());
        assert!(parse_token(&format!("{POLICY}.HOSKY=many")).is_err());
        assert!(parse_token("abcd.HOSKY=1").is_err());
    }
}
