//! Context-aware error suggestions.
//!
//! Complements the static suggestions in the `codes` module with hints that
//! name the offending shard or method.

use serde_json::Value;

use super::codes::ErrorCode;

/// Generate a context-aware suggestion for an error.
///
/// Falls back to [`ErrorCode::suggestion`] when the context carries nothing
/// more specific.
pub fn suggest_for_error(code: ErrorCode, context: Option<&Value>) -> String {
    match code {
        ErrorCode::UnknownShard => suggest_unknown_shard(context),
        ErrorCode::UnknownMethod => suggest_unknown_method(context),
        _ => code.suggestion().to_string(),
    }
}

fn suggest_unknown_shard(context: Option<&Value>) -> String {
    let Some(shard) = context
        .and_then(|c| c.get("shard"))
        .and_then(Value::as_str)
    else {
        return ErrorCode::UnknownShard.suggestion().to_string();
    };

    format!(
        "Shard '{shard}' is not in the current statistics. Try:\n  - `shardsel shards` to list sources\n  - `shardsel shards --topics` if '{shard}' is a topic\n  - `shardsel rebuild` if documents for '{shard}' were imported recently"
    )
}

fn suggest_unknown_method(context: Option<&Value>) -> String {
    let name = context
        .and_then(|c| c.get("method"))
        .and_then(Value::as_str);

    match name {
        Some(name) => format!(
            "'{name}' is not a selection method. {}",
            ErrorCode::UnknownMethod.suggestion()
        ),
        None => ErrorCode::UnknownMethod.suggestion().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_shard_names_the_shard() {
        let ctx = serde_json::json!({ "shard": "arxiv" });
        let hint = suggest_for_error(ErrorCode::UnknownShard, Some(&ctx));
        assert!(hint.contains("'arxiv'"));
        assert!(hint.contains("shardsel shards --topics"));
    }

    #[test]
    fn unknown_shard_without_context_uses_static_hint() {
        let hint = suggest_for_error(ErrorCode::UnknownShard, None);
        assert_eq!(hint, ErrorCode::UnknownShard.suggestion());
    }

    #[test]
    fn unknown_method_lists_alternatives() {
        let ctx = serde_json::json!({ "method": "redde" });
        let hint = suggest_for_error(ErrorCode::UnknownMethod, Some(&ctx));
        assert!(hint.contains("'redde'"));
        assert!(hint.contains("crcs-exp"));
    }

    #[test]
    fn other_codes_fall_back_to_static() {
        let hint = suggest_for_error(ErrorCode::LockTimeout, None);
        assert_eq!(hint, ErrorCode::LockTimeout.suggestion());
    }
}
