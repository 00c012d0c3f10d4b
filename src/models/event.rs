//! Activity feed events from the indexer.
//!
//! The indexer returns one union-shaped record per event with fields
//! present or absent depending on the kind. Modeled as a tagged enum with
//! one variant per kind and a catch-all `Unknown` for kinds added to the
//! API after this crate was built.

use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ActivityEvent {
    #[serde(rename_all = "camelCase")]
    Pay {
        chain_id: u64,
        project_id: u64,
        timestamp: i64,
        tx_hash: String,
        from: String,
        /// Smallest-unit amount as a decimal string (exceeds JSON number range).
        amount: String,
        #[serde(default)]
        memo: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    CashOut {
        chain_id: u64,
        project_id: u64,
        timestamp: i64,
        tx_hash: String,
        from: String,
        cash_out_count: String,
        reclaim_amount: String,
    },
    #[serde(rename_all = "camelCase")]
    SendPayouts {
        chain_id: u64,
        project_id: u64,
        timestamp: i64,
        tx_hash: String,
        amount: String,
        amount_paid_out: String,
    },
    #[serde(rename_all = "camelCase")]
    DeployErc20 {
        chain_id: u64,
        project_id: u64,
        timestamp: i64,
        tx_hash: String,
        symbol: String,
    },
    #[serde(rename_all = "camelCase")]
    ProjectCreate {
        chain_id: u64,
        project_id: u64,
        timestamp: i64,
        tx_hash: String,
    },
    /// Event kind this crate does not know about yet.
    #[serde(other)]
    Unknown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pay_event_deserializes() {
        let json = r#"{
            "type": "pay",
            "chainId": 8453,
            "projectId": 7,
            "timestamp": 1715000000,
            "txHash": "0xabc",
            "from": "0xdef",
            "amount": "1000000000000000000",
            "memo": "gm"
        }"#;
        let event: ActivityEvent = serde_json::from_str(json).unwrap();
        match event {
            ActivityEvent::Pay {
                chain_id, amount, ..
            } => {
                assert_eq!(chain_id, 8453);
                assert_eq!(amount, "1000000000000000000");
            }
            other => panic!("expected pay event, got {:?}", other),
        }
    }

    #[test]
    fn unrecognized_kind_falls_back_to_unknown() {
        let json = r#"{"type": "autoIssue", "chainId": 1, "projectId": 2}"#;
        let event: ActivityEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event, ActivityEvent::Unknown);
    }
}
