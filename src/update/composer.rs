// ============================================================================
// Update Composer
// ============================================================================
//
// Folds observed (Path, value) entries into one sparse partial-update
// document. Only touched branches are materialized; intermediate containers
// take the kind recorded in the path, never the runtime value's kind.
//
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};
use tracing::{Level, event};

use crate::core::codec::json_kind;
use crate::core::{CodecRegistry, ContainerKind, OdmError, Path, Result, Segment, Value};

/// One observed mutation: where it happened and the value written there.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateEntry {
    pub path: Path,
    pub value: Value,
}

impl UpdateEntry {
    pub fn new(path: Path, value: impl Into<Value>) -> Self {
        Self {
            path,
            value: value.into(),
        }
    }
}

/// Sparse nested mapping sent to the gateway as a partial update.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UpdateDocument(Map<String, Json>);

impl UpdateDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&Json> {
        self.0.get(field)
    }

    pub fn as_map(&self) -> &Map<String, Json> {
        &self.0
    }

    pub fn into_json(self) -> Json {
        Json::Object(self.0)
    }

    /// Folds one entry into the document. Returns false when the entry was skipped.
    pub fn apply(&mut self, entry: &UpdateEntry, codecs: &CodecRegistry) -> Result<bool> {
        if entry.path.touches_reserved() {
            event!(Level::DEBUG, path = %entry.path, "reserved path skipped");
            return Ok(false);
        }

        let wire = codecs.to_wire(&entry.value)?;
        let path = &entry.path;

        let Some((first, rest)) = path.steps().split_first() else {
            let name = root_name(path.leaf_segment(), path)?;
            self.0.insert(name.to_string(), wire);
            return Ok(true);
        };

        let name = root_name(&first.segment, path)?;
        let slot = self.0.entry(name.to_string()).or_insert(Json::Null);
        prepare_container(slot, first.kind);

        let mut cursor = slot;
        for step in rest {
            cursor = descend(cursor, &step.segment, step.kind, path)?;
        }
        assign(cursor, path.leaf_segment(), wire, path)?;
        Ok(true)
    }
}

impl From<UpdateDocument> for Json {
    fn from(document: UpdateDocument) -> Self {
        document.into_json()
    }
}

/// Composes entries in order into a single update document.
pub fn compose<'a, I>(entries: I, codecs: &CodecRegistry) -> Result<UpdateDocument>
where
    I: IntoIterator<Item = &'a UpdateEntry>,
{
    let mut document = UpdateDocument::new();
    for entry in entries {
        document.apply(entry, codecs)?;
    }
    Ok(document)
}

fn root_name<'s>(segment: &'s Segment, path: &Path) -> Result<&'s str> {
    segment.name().ok_or_else(|| {
        OdmError::PathConflict(format!(
            "path '{}' must start with a field name, not an index",
            path
        ))
    })
}

fn matches_kind(slot: &Json, kind: ContainerKind) -> bool {
    matches!(
        (slot, kind),
        (Json::Object(_), ContainerKind::Map) | (Json::Array(_), ContainerKind::Sequence)
    )
}

// Missing (or padding / scalar) slots become an empty container of the declared kind.
fn prepare_container(slot: &mut Json, kind: ContainerKind) {
    if !matches_kind(slot, kind) {
        *slot = kind.empty_wire();
    }
}

fn pad_to(items: &mut Vec<Json>, index: usize) {
    if items.len() <= index {
        items.resize(index + 1, Json::Null);
    }
}

fn descend<'j>(
    container: &'j mut Json,
    segment: &Segment,
    kind: ContainerKind,
    path: &Path,
) -> Result<&'j mut Json> {
    let slot = match (container, segment) {
        (Json::Object(map), Segment::Attribute(name) | Segment::Key(name)) => {
            map.entry(name.clone()).or_insert(Json::Null)
        }
        (Json::Array(items), Segment::Index(index)) => {
            pad_to(items, *index);
            &mut items[*index]
        }
        (other, segment) => return Err(conflict(other, segment, path)),
    };
    prepare_container(slot, kind);
    Ok(slot)
}

fn assign(container: &mut Json, leaf: &Segment, wire: Json, path: &Path) -> Result<()> {
    match (container, leaf) {
        (Json::Object(map), Segment::Attribute(name) | Segment::Key(name)) => {
            map.insert(name.clone(), wire);
        }
        (Json::Array(items), Segment::Index(index)) => {
            pad_to(items, *index);
            items[*index] = wire;
        }
        (other, segment) => return Err(conflict(other, segment, path)),
    }
    Ok(())
}

fn conflict(container: &Json, segment: &Segment, path: &Path) -> OdmError {
    OdmError::PathConflict(format!(
        "segment {} of path '{}' cannot address into a {}",
        segment,
        path,
        json_kind(container)
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Object;
    use serde_json::json;

    fn field(name: &str) -> Path {
        Path::leaf(Segment::attribute(name))
    }

    #[test]
    fn test_single_field_assigns_into_root() {
        let entry = UpdateEntry::new(field("online"), true);
        let document = compose([&entry], &CodecRegistry::new()).unwrap();
        assert_eq!(document.into_json(), json!({"online": true}));
    }

    #[test]
    fn test_nested_path_creates_declared_containers() {
        let path = Path::leaf(Segment::attribute("text"))
            .extend(ContainerKind::Map, Segment::Index(1))
            .extend(ContainerKind::Sequence, Segment::attribute("lines"));
        let entry = UpdateEntry::new(path, "hello");

        let document = compose([&entry], &CodecRegistry::new()).unwrap();
        assert_eq!(
            document.into_json(),
            json!({"lines": [null, {"text": "hello"}]})
        );
    }

    #[test]
    fn test_shared_prefix_and_last_write_wins() {
        let states = |leaf: &str| {
            Path::leaf(Segment::attribute(leaf))
                .extend(ContainerKind::Map, Segment::attribute("states"))
        };
        let entries = vec![
            UpdateEntry::new(states("clean"), true),
            UpdateEntry::new(states("status"), 1),
            UpdateEntry::new(states("status"), -1),
            UpdateEntry::new(field("online"), false),
        ];

        let document = compose(&entries, &CodecRegistry::new()).unwrap();
        assert_eq!(
            document.into_json(),
            json!({"states": {"clean": true, "status": -1}, "online": false})
        );
    }

    #[test]
    fn test_append_to_empty_sequence() {
        let path = Path::leaf(Segment::Index(0))
            .extend(ContainerKind::Sequence, Segment::attribute("tags"));
        let entry = UpdateEntry::new(path, "vip");
        let document = compose([&entry], &CodecRegistry::new()).unwrap();
        assert_eq!(document.into_json(), json!({"tags": ["vip"]}));
    }

    #[test]
    fn test_deeper_write_after_scalar_replaces_it() {
        let entries = vec![
            UpdateEntry::new(field("states"), Value::Null),
            UpdateEntry::new(
                Path::leaf(Segment::attribute("clean"))
                    .extend(ContainerKind::Map, Segment::attribute("states")),
                true,
            ),
        ];
        let document = compose(&entries, &CodecRegistry::new()).unwrap();
        assert_eq!(document.into_json(), json!({"states": {"clean": true}}));
    }

    #[test]
    fn test_objects_encoded_through_codecs() {
        let comment = Object::new("Comment").with("text", "nice").with("time", 12);
        let entry = UpdateEntry::new(field("comment"), comment);
        let document = compose([&entry], &CodecRegistry::new()).unwrap();
        assert_eq!(
            document.into_json(),
            json!({"comment": {"text": "nice", "time": 12}})
        );
    }

    #[test]
    fn test_reserved_root_skipped() {
        let entry = UpdateEntry::new(field(crate::core::META_ID_FIELD), "abc");
        let mut document = UpdateDocument::new();
        assert!(!document.apply(&entry, &CodecRegistry::new()).unwrap());
        assert!(document.is_empty());
    }

    #[test]
    fn test_key_into_sequence_conflicts() {
        let path = Path::leaf(Segment::key("name"))
            .extend(ContainerKind::Sequence, Segment::attribute("tags"));
        let err = compose([&UpdateEntry::new(path, 1)], &CodecRegistry::new()).unwrap_err();
        assert!(matches!(err, OdmError::PathConflict(_)));
    }

    #[test]
    fn test_index_root_conflicts() {
        let err = compose(
            [&UpdateEntry::new(Path::leaf(Segment::Index(0)), 1)],
            &CodecRegistry::new(),
        )
        .unwrap_err();
        assert!(matches!(err, OdmError::PathConflict(_)));
    }
}
