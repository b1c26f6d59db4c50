//! Structural trust gate for provider responses.
//!
//! `validate` answers one question: does this JSON have the shape we expect for this kind
//! of response? It never coerces, never partially accepts, and never fails. A `false`
//! verdict is the caller's cue to treat the provider as a failed race candidate.

use serde_json::Value;

/// Response kinds the providers produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schema {
    /// JSON-RPC envelope whose `result` is a hex quantity (height, nonce, balance, eth_call).
    RpcHexResult,
    /// JSON-RPC envelope whose `result` is a transaction hash.
    RpcTxHash,
    /// Explorer `{status, message, result}` with a decimal string result.
    ExplorerDecimal,
    /// Explorer `{status, message, result}` with an array of transaction rows.
    ExplorerTxList,
    /// Aggregator `{data: {best_block_height}}`.
    AggregatorHeight,
    /// Aggregator fan-in balances for one address.
    AggregatorBalances,
    /// Aggregator cursor-paginated history page.
    AggregatorTxPage,
    /// Aggregator broadcast answer `{data: {transaction_hash}}`.
    AggregatorBroadcast,
}

/// Check `raw` against `schema`.
pub fn validate(raw: &Value, schema: Schema) -> bool {
    match schema {
        Schema::RpcHexResult => rpc_result(raw).is_some_and(is_hex_quantity),
        Schema::RpcTxHash => rpc_result(raw).is_some_and(is_tx_hash),
        Schema::ExplorerDecimal => {
            explorer_ok(raw) && raw.get("result").and_then(Value::as_str).is_some_and(is_decimal)
        }
        Schema::ExplorerTxList => explorer_tx_list(raw),
        Schema::AggregatorHeight => raw
            .get("data")
            .and_then(|d| d.get("best_block_height"))
            .is_some_and(|h| h.as_u64().is_some()),
        Schema::AggregatorBalances => aggregator_balances(raw),
        Schema::AggregatorTxPage => aggregator_tx_page(raw),
        Schema::AggregatorBroadcast => raw
            .get("data")
            .and_then(|d| d.get("transaction_hash"))
            .and_then(Value::as_str)
            .is_some_and(is_tx_hash),
    }
}

/// `0x` followed by at least one hex digit.
pub fn is_hex_quantity(s: &str) -> bool {
    s.strip_prefix("0x")
        .is_some_and(|d| !d.is_empty() && d.bytes().all(|b| b.is_ascii_hexdigit()))
}

/// Non-empty run of ASCII digits; no sign, no fraction.
pub fn is_decimal(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

pub fn is_tx_hash(s: &str) -> bool {
    s.len() == 66 && is_hex_quantity(s)
}

fn is_address(s: &str) -> bool {
    s.len() == 42 && is_hex_quantity(s)
}

fn rpc_result(raw: &Value) -> Option<&str> {
    if raw.get("error").is_some() {
        return None;
    }
    raw.get("result").and_then(Value::as_str)
}

fn explorer_ok(raw: &Value) -> bool {
    raw.get("status").and_then(Value::as_str) == Some("1")
}

fn explorer_tx_list(raw: &Value) -> bool {
    let Some(rows) = raw.get("result").and_then(Value::as_array) else {
        return false;
    };
    match raw.get("status").and_then(Value::as_str) {
        Some("1") => rows.iter().all(explorer_row),
        // Empty pages come back as status "0" on this API family.
        Some("0") => {
            rows.is_empty()
                && raw.get("message").and_then(Value::as_str) == Some("No transactions found")
        }
        _ => false,
    }
}

fn explorer_row(row: &Value) -> bool {
    let text = |key: &str| row.get(key).and_then(Value::as_str);
    text("hash").is_some_and(is_tx_hash)
        && text("blockNumber").is_some_and(is_decimal)
        && text("timeStamp").is_some_and(is_decimal)
        && text("from").is_some_and(is_address)
        && recipient(row)
        && text("value").is_some_and(is_decimal)
        && text("gasPrice").is_some_and(is_decimal)
        && text("gasUsed").is_some_and(is_decimal)
}

/// Contract creations have no recipient: `to` is absent, null or empty.
fn recipient(row: &Value) -> bool {
    match row.get("to") {
        None | Some(Value::Null) => true,
        Some(to) => to.as_str().is_some_and(|to| to.is_empty() || is_address(to)),
    }
}

fn aggregator_balances(raw: &Value) -> bool {
    let Some(addresses) = raw.get("data").and_then(Value::as_object) else {
        return false;
    };
    !addresses.is_empty()
        && addresses.values().all(|entry| {
            let native_ok = entry
                .get("address")
                .and_then(|a| a.get("balance"))
                .and_then(Value::as_str)
                .is_some_and(is_decimal);
            let tokens_ok = match entry.get("layer_2").and_then(|l| l.get("erc_20")) {
                None => true,
                Some(tokens) => tokens.as_array().is_some_and(|list| {
                    list.iter().all(|t| {
                        t.get("token_address").and_then(Value::as_str).is_some_and(is_address)
                            && t.get("balance").and_then(Value::as_str).is_some_and(is_decimal)
                    })
                }),
            };
            native_ok && tokens_ok
        })
}

fn aggregator_tx_page(raw: &Value) -> bool {
    let Some(payload) = raw.get("payload") else {
        return false;
    };
    let next_ok = match payload.get("next") {
        None | Some(Value::Null) => true,
        Some(v) => v.as_str().is_some_and(|s| !s.is_empty()),
    };
    next_ok
        && payload
            .get("records")
            .and_then(Value::as_array)
            .is_some_and(|rows| rows.iter().all(aggregator_row))
}

fn aggregator_row(row: &Value) -> bool {
    let text = |key: &str| row.get(key).and_then(Value::as_str);
    text("hash").is_some_and(is_tx_hash)
        && row.get("blockNumber").is_some_and(|n| n.as_u64().is_some())
        && row.get("timestamp").is_some_and(|n| n.as_u64().is_some())
        && text("from").is_some_and(is_address)
        && recipient(row)
        && text("value").is_some_and(is_decimal)
        && text("fee").is_some_and(is_decimal)
        && match row.get("contract") {
            None | Some(Value::Null) => true,
            Some(c) => c.as_str().is_some_and(is_address),
        }
}
