use std::collections::BTreeMap;

use crate::core::{ContainerKind, Object, OdmError, Result, Segment, Value};

use super::sink::{ChildUpdateSink, Link};

/// A value read out of a record or another wrapper.
///
/// Containers come back wrapped so writes into them are observed. Scalars
/// come back as plain read-only views; reserved metadata names bypass
/// tracking entirely.
#[derive(Debug)]
pub enum Tracked<'a> {
    Scalar(&'a Value),
    Untracked(&'a mut Value),
    Sequence(SequenceWrapper<'a>),
    Map(MapWrapper<'a>),
    Object(ObjectWrapper<'a>),
}

impl<'a> Tracked<'a> {
    /// Wraps `value`, reached from its owner under `segment`.
    pub fn wrap(
        value: &'a mut Value,
        segment: Segment,
        owner: &'a mut (dyn ChildUpdateSink + 'a),
    ) -> Self {
        if segment.is_reserved() {
            return Self::Untracked(value);
        }

        match value {
            Value::Sequence(items) => Self::Sequence(SequenceWrapper {
                items,
                owner: Link::new(owner, segment, ContainerKind::Sequence),
            }),
            Value::Map(entries) => Self::Map(MapWrapper {
                entries,
                owner: Link::new(owner, segment, ContainerKind::Map),
            }),
            Value::Object(object) => Self::Object(ObjectWrapper {
                object,
                owner: Link::new(owner, segment, ContainerKind::Map),
            }),
            scalar => Self::Scalar(&*scalar),
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Scalar(value) => value.type_name(),
            Self::Untracked(value) => value.type_name(),
            Self::Sequence(_) => "SEQUENCE",
            Self::Map(_) => "MAP",
            Self::Object(_) => "OBJECT",
        }
    }

    pub fn as_scalar(&self) -> Option<&Value> {
        match self {
            Self::Scalar(value) => Some(value),
            _ => None,
        }
    }

    pub fn into_sequence(self) -> Result<SequenceWrapper<'a>> {
        match self {
            Self::Sequence(wrapper) => Ok(wrapper),
            other => Err(mismatch("sequence", &other)),
        }
    }

    pub fn into_map(self) -> Result<MapWrapper<'a>> {
        match self {
            Self::Map(wrapper) => Ok(wrapper),
            other => Err(mismatch("map", &other)),
        }
    }

    pub fn into_object(self) -> Result<ObjectWrapper<'a>> {
        match self {
            Self::Object(wrapper) => Ok(wrapper),
            other => Err(mismatch("object", &other)),
        }
    }
}

fn mismatch(expected: &str, found: &Tracked<'_>) -> OdmError {
    OdmError::TypeMismatch(format!("expected {}, found {}", expected, found.kind_name()))
}

/// Observed view over a sequence.
#[derive(Debug)]
pub struct SequenceWrapper<'a> {
    items: &'a mut Vec<Value>,
    owner: Link<'a>,
}

impl<'a> SequenceWrapper<'a> {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.items.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<Tracked<'_>> {
        let item = self.items.get_mut(index)?;
        Some(Tracked::wrap(item, Segment::Index(index), &mut self.owner))
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Value> {
        self.items.iter()
    }

    pub fn as_slice(&self) -> &[Value] {
        self.items
    }

    pub fn set(&mut self, index: usize, value: impl Into<Value>) -> Result<()> {
        let len = self.items.len();
        let slot = self
            .items
            .get_mut(index)
            .ok_or(OdmError::IndexOutOfBounds { index, len })?;
        let value = value.into();
        *slot = value.clone();
        self.owner.report(Segment::Index(index), value)
    }

    /// Appends and reports the new element at its index.
    pub fn push(&mut self, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        self.items.push(value.clone());
        let index = self.items.len() - 1;
        self.owner.report(Segment::Index(index), value)
    }

    /// Appends all values, then reports each one at its index.
    pub fn extend<I, V>(&mut self, values: I) -> Result<()>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let start = self.items.len();
        self.items.extend(values.into_iter().map(Into::into));
        for index in start..self.items.len() {
            let value = self.items[index].clone();
            self.owner.report(Segment::Index(index), value)?;
        }
        Ok(())
    }

    // Edits below shift positions, so the whole sequence is reported.

    pub fn insert(&mut self, index: usize, value: impl Into<Value>) -> Result<()> {
        let len = self.items.len();
        if index > len {
            return Err(OdmError::IndexOutOfBounds { index, len });
        }
        self.items.insert(index, value.into());
        self.report_whole()
    }

    /// Removes the first element equal to `value`. Returns whether one was found.
    pub fn remove(&mut self, value: &Value) -> Result<bool> {
        let Some(position) = self.items.iter().position(|item| item == value) else {
            return Ok(false);
        };
        self.items.remove(position);
        self.report_whole()?;
        Ok(true)
    }

    pub fn remove_at(&mut self, index: usize) -> Result<Value> {
        let len = self.items.len();
        if index >= len {
            return Err(OdmError::IndexOutOfBounds { index, len });
        }
        let removed = self.items.remove(index);
        self.report_whole()?;
        Ok(removed)
    }

    pub fn pop(&mut self) -> Result<Option<Value>> {
        let Some(popped) = self.items.pop() else {
            return Ok(None);
        };
        self.report_whole()?;
        Ok(Some(popped))
    }

    pub fn clear(&mut self) -> Result<()> {
        self.items.clear();
        self.report_whole()
    }

    fn report_whole(&mut self) -> Result<()> {
        let whole = Value::Sequence(self.items.clone());
        self.owner.report_replaced(whole)
    }
}

/// Observed view over a key/value map.
#[derive(Debug)]
pub struct MapWrapper<'a> {
    entries: &'a mut BTreeMap<String, Value>,
    owner: Link<'a>,
}

impl<'a> MapWrapper<'a> {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<Tracked<'_>> {
        let value = self.entries.get_mut(key)?;
        Some(Tracked::wrap(value, Segment::key(key), &mut self.owner))
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }

    pub fn iter(&self) -> std::collections::btree_map::Iter<'_, String, Value> {
        self.entries.iter()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Result<Option<Value>> {
        let key = key.into();
        let value = value.into();
        let previous = self.entries.insert(key.clone(), value.clone());
        self.owner.report(Segment::Key(key), value)?;
        Ok(previous)
    }

    /// Removes `key`; the removal is reported as `null` at that key.
    pub fn remove(&mut self, key: &str) -> Result<Option<Value>> {
        let Some(removed) = self.entries.remove(key) else {
            return Ok(None);
        };
        self.owner.report(Segment::key(key), Value::Null)?;
        Ok(Some(removed))
    }
}

/// Observed view over a typed object, proxying attribute access.
#[derive(Debug)]
pub struct ObjectWrapper<'a> {
    object: &'a mut Object,
    owner: Link<'a>,
}

impl<'a> ObjectWrapper<'a> {
    pub fn type_name(&self) -> &str {
        self.object.type_name()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.object.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<Tracked<'_>> {
        let value = self.object.fields_mut().get_mut(name)?;
        Some(Tracked::wrap(value, Segment::attribute(name), &mut self.owner))
    }

    pub fn fields(&self) -> &BTreeMap<String, Value> {
        self.object.fields()
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Result<Option<Value>> {
        let name = name.into();
        let value = value.into();
        let previous = self.object.insert(name.clone(), value.clone());
        self.owner.report(Segment::Attribute(name), value)?;
        Ok(previous)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{META_ID_FIELD, Path};
    use crate::tracking::RecordingSink;

    fn tags_path(index: usize) -> Path {
        Path::leaf(Segment::Index(index))
            .extend(ContainerKind::Sequence, Segment::attribute("tags"))
    }

    #[test]
    fn test_push_reports_index_under_owner_segment() {
        let mut sink = RecordingSink::default();
        let mut value = Value::from(vec!["a"]);
        let mut tags = Tracked::wrap(&mut value, Segment::attribute("tags"), &mut sink)
            .into_sequence()
            .unwrap();

        tags.push("vip").unwrap();
        assert_eq!(tags.len(), 2);

        assert_eq!(sink.reports, vec![(tags_path(1), Value::from("vip"))]);
        assert_eq!(value, Value::from(vec!["a", "vip"]));
    }

    #[test]
    fn test_reads_never_report() {
        let mut sink = RecordingSink::default();
        let mut value = Value::from(vec![1, 2, 3]);
        {
            let mut seq = Tracked::wrap(&mut value, Segment::attribute("n"), &mut sink)
                .into_sequence()
                .unwrap();
            assert_eq!(seq.get(1), Some(&Value::Integer(2)));
            assert!(seq.get_mut(0).unwrap().as_scalar().is_some());
            assert_eq!(seq.iter().count(), 3);
        }
        assert!(sink.reports.is_empty());
    }

    #[test]
    fn test_nested_write_accumulates_full_path() {
        let mut sink = RecordingSink::default();
        let mut value = Value::Object(
            Object::new("Transcript").with(
                "lines",
                vec![Value::Object(Object::new("Line").with("text", "x"))],
            ),
        );

        {
            let mut transcript = Tracked::wrap(&mut value, Segment::attribute("transcript"), &mut sink)
                .into_object()
                .unwrap();
            let mut lines = transcript.get_mut("lines").unwrap().into_sequence().unwrap();
            let mut line = lines.get_mut(0).unwrap().into_object().unwrap();
            line.set("text", "hello").unwrap();
        }

        let expected = Path::leaf(Segment::attribute("text"))
            .extend(ContainerKind::Map, Segment::Index(0))
            .extend(ContainerKind::Sequence, Segment::attribute("lines"))
            .extend(ContainerKind::Map, Segment::attribute("transcript"));
        assert_eq!(sink.reports, vec![(expected, Value::from("hello"))]);
    }

    #[test]
    fn test_extend_reports_each_element() {
        let mut sink = RecordingSink::default();
        let mut value = Value::from(vec![0]);
        let mut seq = Tracked::wrap(&mut value, Segment::attribute("tags"), &mut sink)
            .into_sequence()
            .unwrap();
        seq.extend([7, 8]).unwrap();

        assert_eq!(
            sink.reports,
            vec![
                (tags_path(1), Value::Integer(7)),
                (tags_path(2), Value::Integer(8))
            ]
        );
    }

    #[test]
    fn test_structural_edits_report_whole_sequence() {
        let mut sink = RecordingSink::default();
        let mut value = Value::from(vec!["a", "b", "c"]);
        {
            let mut seq = Tracked::wrap(&mut value, Segment::attribute("tags"), &mut sink)
                .into_sequence()
                .unwrap();
            assert!(seq.remove(&Value::from("b")).unwrap());
            assert!(!seq.remove(&Value::from("zzz")).unwrap());
        }

        let whole = Path::leaf(Segment::attribute("tags"));
        assert_eq!(sink.reports, vec![(whole, Value::from(vec!["a", "c"]))]);
    }

    #[test]
    fn test_set_out_of_bounds_changes_nothing() {
        let mut sink = RecordingSink::default();
        let mut value = Value::from(vec![1]);
        {
            let mut seq = Tracked::wrap(&mut value, Segment::attribute("n"), &mut sink)
                .into_sequence()
                .unwrap();
            let err = seq.set(3, 9).unwrap_err();
            assert!(matches!(err, OdmError::IndexOutOfBounds { index: 3, len: 1 }));
        }
        assert!(sink.reports.is_empty());
        assert_eq!(value, Value::from(vec![1]));
    }

    #[test]
    fn test_map_insert_remove() {
        let mut sink = RecordingSink::default();
        let mut value = Value::Map(BTreeMap::new());
        {
            let mut map = Tracked::wrap(&mut value, Segment::attribute("meta"), &mut sink)
                .into_map()
                .unwrap();
            map.insert("k", 1).unwrap();
            map.remove("k").unwrap();
            assert_eq!(map.remove("missing").unwrap(), None);
        }

        let key = Path::leaf(Segment::key("k")).extend(ContainerKind::Map, Segment::attribute("meta"));
        assert_eq!(
            sink.reports,
            vec![(key.clone(), Value::Integer(1)), (key, Value::Null)]
        );
    }

    #[test]
    fn test_reserved_keys_bypass_tracking() {
        let mut sink = RecordingSink::default();
        let mut value = Value::Map(BTreeMap::new());
        {
            let mut map = Tracked::wrap(&mut value, Segment::attribute("meta"), &mut sink)
                .into_map()
                .unwrap();
            map.insert(META_ID_FIELD, Value::from(vec![1])).unwrap();
            match map.get_mut(META_ID_FIELD).unwrap() {
                Tracked::Untracked(raw) => *raw = Value::from("raw"),
                other => panic!("expected untracked, got {:?}", other),
            }
        }
        assert!(sink.reports.is_empty());
        assert_eq!(value.as_map().unwrap()[META_ID_FIELD], Value::from("raw"));
    }

    #[test]
    fn test_kind_accessor_mismatch() {
        let mut sink = RecordingSink::default();
        let mut value = Value::from(5);
        let err = Tracked::wrap(&mut value, Segment::attribute("n"), &mut sink)
            .into_sequence()
            .unwrap_err();
        assert!(matches!(err, OdmError::TypeMismatch(_)));
    }
}
