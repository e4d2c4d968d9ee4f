use std::collections::HashMap;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::envelope::{CorrelationKey, Envelope, FrameKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PatchPolicy {
    /// Skip operations whose path cannot be resolved and keep applying the rest.
    #[default]
    Lenient,
    /// Reject the whole frame on the first failing operation.
    Strict,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PatchError {
    #[error("malformed patch body: {0}")]
    MalformedBody(String),
    #[error("`{0}` is not a valid JSON pointer")]
    InvalidPointer(String),
    #[error("path `{0}` does not exist")]
    MissingPath(String),
    #[error("array index in `{0}` is out of bounds")]
    IndexOutOfBounds(String),
    #[error("cannot remove the document root")]
    RemoveRoot,
    #[error("test failed at `{0}`")]
    TestFailed(String),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum PatchOperation {
    Add { path: String, value: Value },
    Remove { path: String },
    Replace { path: String, value: Value },
    Move { from: String, path: String },
    Copy { from: String, path: String },
    Test { path: String, value: Value },
}

impl PatchOperation {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Add { .. } => "add",
            Self::Remove { .. } => "remove",
            Self::Replace { .. } => "replace",
            Self::Move { .. } => "move",
            Self::Copy { .. } => "copy",
            Self::Test { .. } => "test",
        }
    }

    pub fn path(&self) -> &str {
        match self {
            Self::Add { path, .. }
            | Self::Remove { path }
            | Self::Replace { path, .. }
            | Self::Move { path, .. }
            | Self::Copy { path, .. }
            | Self::Test { path, .. } => path,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedEvent {
    pub key: CorrelationKey,
    pub kind: FrameKind,
    pub body: Value,
}

#[derive(Debug, Default)]
pub struct PatchEngine {
    documents: HashMap<CorrelationKey, Value>,
    policy: PatchPolicy,
}

impl PatchEngine {
    pub fn new(policy: PatchPolicy) -> Self {
        Self {
            documents: HashMap::new(),
            policy,
        }
    }

    pub fn apply_incoming(&mut self, envelope: Envelope) -> Vec<NormalizedEvent> {
        let key = envelope.correlation_key();

        match envelope.kind() {
            FrameKind::Snapshot => {
                self.documents.insert(key.clone(), envelope.body.clone());
                vec![NormalizedEvent {
                    key,
                    kind: FrameKind::Snapshot,
                    body: envelope.body,
                }]
            }
            FrameKind::Patch => {
                let operations = match parse_patch_operations(&envelope.body) {
                    Ok(operations) => operations,
                    Err(err) => {
                        tracing::warn!(key = %key, error = %err, "dropping undecodable patch frame");
                        return Vec::new();
                    }
                };

                let applied = match self.documents.get_mut(&key) {
                    Some(document) => {
                        apply_patch(document, &operations, self.policy).map(|_| document.clone())
                    }
                    // A rejected frame must not leave an empty document behind.
                    None => {
                        let mut document = Value::Object(Map::new());
                        apply_patch(&mut document, &operations, self.policy).map(|_| {
                            self.documents.insert(key.clone(), document.clone());
                            document
                        })
                    }
                };

                match applied {
                    Ok(body) => vec![NormalizedEvent {
                        key,
                        kind: FrameKind::Patch,
                        body,
                    }],
                    Err(err) => {
                        tracing::warn!(key = %key, error = %err, "dropping patch frame");
                        Vec::new()
                    }
                }
            }
            FrameKind::Other(kind) => {
                tracing::debug!(key = %key, kind = %kind, "dropping frame with unrecognized kind");
                Vec::new()
            }
        }
    }

    pub fn document(&self, key: &CorrelationKey) -> Option<&Value> {
        self.documents.get(key)
    }

    pub fn release(&mut self, key: &CorrelationKey) -> Option<Value> {
        self.documents.remove(key)
    }

    pub fn reset(&mut self) {
        self.documents.clear();
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

pub fn parse_patch_operations(body: &Value) -> Result<Vec<PatchOperation>, PatchError> {
    let raw = match body {
        Value::Object(map) => match map.get("patches") {
            Some(patches) => patches.clone(),
            None => Value::Array(vec![body.clone()]),
        },
        Value::Array(_) => body.clone(),
        other => {
            return Err(PatchError::MalformedBody(format!(
                "expected object or array, got {other}"
            )))
        }
    };

    serde_json::from_value::<Vec<PatchOperation>>(raw)
        .map_err(|err| PatchError::MalformedBody(err.to_string()))
}

/// Applies `operations` in order and returns how many were skipped.
///
/// Under [`PatchPolicy::Strict`] the document is left untouched when any
/// operation fails.
pub fn apply_patch(
    document: &mut Value,
    operations: &[PatchOperation],
    policy: PatchPolicy,
) -> Result<usize, PatchError> {
    match policy {
        PatchPolicy::Strict => {
            let mut working = document.clone();
            for operation in operations {
                apply_operation(&mut working, operation)?;
            }
            *document = working;
            Ok(0)
        }
        PatchPolicy::Lenient => {
            let mut skipped = 0usize;
            for operation in operations {
                if let Err(err) = apply_operation(document, operation) {
                    tracing::warn!(
                        op = operation.name(),
                        path = operation.path(),
                        error = %err,
                        "skipping patch operation"
                    );
                    skipped += 1;
                }
            }
            Ok(skipped)
        }
    }
}

fn apply_operation(document: &mut Value, operation: &PatchOperation) -> Result<(), PatchError> {
    match operation {
        PatchOperation::Add { path, value } => add_value(document, path, value.clone()),
        PatchOperation::Remove { path } => remove_value(document, path).map(|_| ()),
        PatchOperation::Replace { path, value } => {
            let tokens = parse_pointer(path)?;
            let target = resolve_mut(document, &tokens)
                .ok_or_else(|| PatchError::MissingPath(path.clone()))?;
            *target = value.clone();
            Ok(())
        }
        PatchOperation::Move { from, path } => {
            if from == path {
                return Ok(());
            }
            let value = remove_value(document, from)?;
            if let Err(err) = add_value(document, path, value.clone()) {
                add_value(document, from, value)?;
                return Err(err);
            }
            Ok(())
        }
        PatchOperation::Copy { from, path } => {
            let tokens = parse_pointer(from)?;
            let value = resolve(document, &tokens)
                .cloned()
                .ok_or_else(|| PatchError::MissingPath(from.clone()))?;
            add_value(document, path, value)
        }
        PatchOperation::Test { path, value } => {
            let tokens = parse_pointer(path)?;
            match resolve(document, &tokens) {
                Some(current) if current == value => Ok(()),
                _ => Err(PatchError::TestFailed(path.clone())),
            }
        }
    }
}

fn add_value(document: &mut Value, path: &str, value: Value) -> Result<(), PatchError> {
    let tokens = parse_pointer(path)?;
    let Some((last, parents)) = tokens.split_last() else {
        *document = value;
        return Ok(());
    };

    let parent =
        resolve_mut(document, parents).ok_or_else(|| PatchError::MissingPath(path.to_string()))?;

    match parent {
        Value::Object(map) => {
            map.insert(last.clone(), value);
            Ok(())
        }
        Value::Array(items) => {
            if last == "-" {
                items.push(value);
                return Ok(());
            }
            let index =
                parse_index(last).ok_or_else(|| PatchError::InvalidPointer(path.to_string()))?;
            if index > items.len() {
                return Err(PatchError::IndexOutOfBounds(path.to_string()));
            }
            items.insert(index, value);
            Ok(())
        }
        _ => Err(PatchError::MissingPath(path.to_string())),
    }
}

fn remove_value(document: &mut Value, path: &str) -> Result<Value, PatchError> {
    let tokens = parse_pointer(path)?;
    let Some((last, parents)) = tokens.split_last() else {
        return Err(PatchError::RemoveRoot);
    };

    let parent =
        resolve_mut(document, parents).ok_or_else(|| PatchError::MissingPath(path.to_string()))?;

    match parent {
        Value::Object(map) => map
            .remove(last)
            .ok_or_else(|| PatchError::MissingPath(path.to_string())),
        Value::Array(items) => {
            let index =
                parse_index(last).ok_or_else(|| PatchError::InvalidPointer(path.to_string()))?;
            if index >= items.len() {
                return Err(PatchError::IndexOutOfBounds(path.to_string()));
            }
            Ok(items.remove(index))
        }
        _ => Err(PatchError::MissingPath(path.to_string())),
    }
}

fn parse_pointer(path: &str) -> Result<Vec<String>, PatchError> {
    if path.is_empty() {
        return Ok(Vec::new());
    }

    let Some(rest) = path.strip_prefix('/') else {
        return Err(PatchError::InvalidPointer(path.to_string()));
    };

    Ok(rest
        .split('/')
        .map(|token| token.replace("~1", "/").replace("~0", "~"))
        .collect())
}

fn parse_index(token: &str) -> Option<usize> {
    if token.len() > 1 && token.starts_with('0') {
        return None;
    }
    token.parse::<usize>().ok()
}

fn resolve<'a>(document: &'a Value, tokens: &[String]) -> Option<&'a Value> {
    tokens.iter().try_fold(document, |target, token| match target {
        Value::Object(map) => map.get(token),
        Value::Array(items) => parse_index(token).and_then(|index| items.get(index)),
        _ => None,
    })
}

fn resolve_mut<'a>(document: &'a mut Value, tokens: &[String]) -> Option<&'a mut Value> {
    tokens.iter().try_fold(document, |target, token| match target {
        Value::Object(map) => map.get_mut(token),
        Value::Array(items) => parse_index(token).and_then(move |index| items.get_mut(index)),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::envelope::Header;

    fn envelope(service: &str, id: &str, kind: &str, body: Value) -> Envelope {
        Envelope {
            header: Header {
                service: service.to_string(),
                id: id.to_string(),
                ver: 0,
                kind: Some(kind.to_string()),
            },
            body,
        }
    }

    fn ops(value: Value) -> Vec<PatchOperation> {
        serde_json::from_value(value).expect("operations should decode")
    }

    #[test]
    fn quotes_snapshot_then_patch_reconstructs_last_price() {
        let mut engine = PatchEngine::default();

        let snapshot = engine.apply_incoming(envelope(
            "quotes",
            "generic",
            "snapshot",
            json!({"items": [{"symbol": "AAPL", "values": {"LAST": 150}}]}),
        ));
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].kind, FrameKind::Snapshot);

        let patched = engine.apply_incoming(envelope(
            "quotes",
            "generic",
            "patch",
            json!({"patches": [{"op": "replace", "path": "/items/0/values/LAST", "value": 151}]}),
        ));

        assert_eq!(patched.len(), 1);
        assert_eq!(
            patched[0].body,
            json!({"items": [{"symbol": "AAPL", "values": {"LAST": 151}}]})
        );
        assert_eq!(
            engine.document(&CorrelationKey::new("quotes", "generic", 0)),
            Some(&patched[0].body)
        );
    }

    #[test]
    fn sequential_patches_match_ordered_application() {
        let snapshot = json!({"items": [{"symbol": "MSFT", "values": {"BID": 1, "ASK": 2}}]});
        let patches = vec![
            json!([{"op": "replace", "path": "/items/0/values/BID", "value": 3}]),
            json!([{"op": "add", "path": "/items/-", "value": {"symbol": "SPY", "values": {}}}]),
            json!([{"op": "add", "path": "/items/1/values/LAST", "value": 500}]),
            json!([{"op": "remove", "path": "/items/0/values/ASK"}]),
        ];

        let mut engine = PatchEngine::default();
        engine.apply_incoming(envelope("quotes", "generic", "snapshot", snapshot.clone()));
        let mut last_body = Value::Null;
        for patch in &patches {
            let events =
                engine.apply_incoming(envelope("quotes", "generic", "patch", patch.clone()));
            last_body = events[0].body.clone();
        }

        let mut expected = snapshot;
        for patch in &patches {
            apply_patch(&mut expected, &ops(patch.clone()), PatchPolicy::Strict)
                .expect("patch should apply");
        }

        assert_eq!(last_body, expected);
        assert_eq!(
            last_body,
            json!({"items": [
                {"symbol": "MSFT", "values": {"BID": 3}},
                {"symbol": "SPY", "values": {"LAST": 500}}
            ]})
        );
    }

    #[test]
    fn patch_without_snapshot_starts_from_empty_object() {
        let mut engine = PatchEngine::default();
        let events = engine.apply_incoming(envelope(
            "user_properties",
            "props-1",
            "patch",
            json!({"patches": [{"op": "add", "path": "/theme", "value": "dark"}]}),
        ));

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].body, json!({"theme": "dark"}));
    }

    #[test]
    fn lenient_policy_skips_stale_paths_and_keeps_the_rest() {
        let mut document = json!({"values": {"LAST": 1}});
        let skipped = apply_patch(
            &mut document,
            &ops(json!([
                {"op": "replace", "path": "/values/MISSING", "value": 9},
                {"op": "remove", "path": "/items/4"},
                {"op": "replace", "path": "/values/LAST", "value": 2}
            ])),
            PatchPolicy::Lenient,
        )
        .expect("lenient patches never fail");

        assert_eq!(skipped, 2);
        assert_eq!(document, json!({"values": {"LAST": 2}}));
    }

    #[test]
    fn strict_policy_drops_the_whole_frame() {
        let mut engine = PatchEngine::new(PatchPolicy::Strict);
        engine.apply_incoming(envelope(
            "quotes",
            "generic",
            "snapshot",
            json!({"values": {"LAST": 1}}),
        ));

        let events = engine.apply_incoming(envelope(
            "quotes",
            "generic",
            "patch",
            json!({"patches": [
                {"op": "replace", "path": "/values/LAST", "value": 2},
                {"op": "replace", "path": "/values/MISSING", "value": 9}
            ]}),
        ));

        assert!(events.is_empty());
        assert_eq!(
            engine.document(&CorrelationKey::new("quotes", "generic", 0)),
            Some(&json!({"values": {"LAST": 1}}))
        );
    }

    #[test]
    fn strict_policy_rejects_patch_without_creating_a_document() {
        let mut engine = PatchEngine::new(PatchPolicy::Strict);

        let events = engine.apply_incoming(envelope(
            "quotes",
            "generic",
            "patch",
            json!([{"op": "replace", "path": "/missing", "value": 1}]),
        ));

        assert!(events.is_empty());
        assert!(engine.is_empty());
        assert_eq!(
            engine.document(&CorrelationKey::new("quotes", "generic", 0)),
            None
        );
    }

    #[test]
    fn unrecognized_kind_emits_nothing() {
        let mut engine = PatchEngine::default();
        let events = engine.apply_incoming(envelope("quotes", "generic", "error", json!({})));

        assert!(events.is_empty());
        assert!(engine.is_empty());
    }

    #[test]
    fn documents_are_isolated_per_correlation_key() {
        let mut engine = PatchEngine::default();
        engine.apply_incoming(envelope("chart", "chart-1", "snapshot", json!({"symbol": "AAPL"})));
        engine.apply_incoming(envelope("chart", "chart-2", "snapshot", json!({"symbol": "MSFT"})));
        engine.apply_incoming(envelope(
            "chart",
            "chart-2",
            "patch",
            json!([{"op": "replace", "path": "/symbol", "value": "SPY"}]),
        ));

        assert_eq!(
            engine.document(&CorrelationKey::new("chart", "chart-1", 0)),
            Some(&json!({"symbol": "AAPL"}))
        );
        assert_eq!(
            engine.document(&CorrelationKey::new("chart", "chart-2", 0)),
            Some(&json!({"symbol": "SPY"}))
        );

        engine.release(&CorrelationKey::new("chart", "chart-1", 0));
        assert_eq!(engine.len(), 1);
        engine.reset();
        assert!(engine.is_empty());
    }

    #[test]
    fn move_copy_and_test_follow_json_patch_semantics() {
        let mut document = json!({"a": {"b": 1}, "list": [1, 2, 3], "escaped/key": {"~": true}});

        apply_patch(
            &mut document,
            &ops(json!([
                {"op": "test", "path": "/escaped~1key/~0", "value": true},
                {"op": "copy", "from": "/a/b", "path": "/c"},
                {"op": "move", "from": "/list/0", "path": "/list/-"},
                {"op": "add", "path": "/list/0", "value": 0}
            ])),
            PatchPolicy::Strict,
        )
        .expect("patch should apply");

        assert_eq!(
            document,
            json!({"a": {"b": 1}, "c": 1, "list": [0, 2, 3, 1], "escaped/key": {"~": true}})
        );

        let failed = apply_patch(
            &mut document,
            &ops(json!([{"op": "test", "path": "/c", "value": 2}])),
            PatchPolicy::Strict,
        );
        assert_eq!(failed, Err(PatchError::TestFailed("/c".to_string())));
    }

    #[test]
    fn rejects_malformed_bodies_and_pointers() {
        assert!(matches!(
            parse_patch_operations(&json!("nope")),
            Err(PatchError::MalformedBody(_))
        ));
        assert!(matches!(
            parse_patch_operations(&json!({"patches": [{"op": "frobnicate", "path": "/a"}]})),
            Err(PatchError::MalformedBody(_))
        ));

        let single = parse_patch_operations(&json!({"op": "remove", "path": "/a"}))
            .expect("single operation object should decode");
        assert_eq!(
            single,
            vec![PatchOperation::Remove {
                path: "/a".to_string()
            }]
        );

        let mut document = json!({"a": [1]});
        assert_eq!(
            apply_patch(
                &mut document,
                &ops(json!([{"op": "add", "path": "a", "value": 1}])),
                PatchPolicy::Strict
            ),
            Err(PatchError::InvalidPointer("a".to_string()))
        );
        assert_eq!(
            apply_patch(
                &mut document,
                &ops(json!([{"op": "add", "path": "/a/5", "value": 1}])),
                PatchPolicy::Strict
            ),
            Err(PatchError::IndexOutOfBounds("/a/5".to_string()))
        );
        assert_eq!(
            apply_patch(
                &mut document,
                &ops(json!([{"op": "remove", "path": ""}])),
                PatchPolicy::Strict
            ),
            Err(PatchError::RemoveRoot)
        );
    }
}
