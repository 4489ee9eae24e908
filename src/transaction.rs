//! Transaction module; types live in `transaction/types.rs`

pub mod types;

pub use types::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_wire_format() {
        let tx = Transaction::new("Alice", "Bob", 23);
        let json = serde_json::to_value(&tx).unwrap();
        assert_eq!(json["sender"], "Alice");
        assert_eq!(json["recipient"], "Bob");
        assert_eq!(json["amount"], 23);
    }

    #[test]
    fn test_negative_amount_is_accepted() {
        let tx: Transaction =
            serde_json::from_str(r#"{"sender":"a","recipient":"b","amount":-7}"#).unwrap();
        assert_eq!(tx.amount, -7);
    }

    #[test]
    fn test_mining_reward() {
        let tx = Transaction::mining_reward("miner-1");
        assert!(tx.is_mining_reward());
        assert_eq!(tx.recipient, "miner-1");
        assert_eq!(tx.amount, MINING_REWARD);
        assert!(!Transaction::new("Alice", "Bob", 1).is_mining_reward());
    }
}
