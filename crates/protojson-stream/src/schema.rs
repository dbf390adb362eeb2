//! Schema binder (design §4.7, §2 component 6): per-message JSON-name and
//! proto-name → field tables, built eagerly by recursive descent over every
//! message type reachable from the root descriptor.
//!
//! [`ParserMethod`] plays the role the design calls "parsermethod": it owns
//! the name tables and is reference-counted because several [`crate::
//! Parser`] instances may share one (§5, "Reference-counted ParserMethod").
//! [`ParserMethod::cached`] is the SPEC_FULL addition wrapping `new` with a
//! process-wide cache keyed by the root descriptor's fully qualified name.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};

use prost_reflect::{FieldDescriptor, Kind, MessageDescriptor};

/// Maps both a field's JSON name and (when it differs) its proto name to the
/// field descriptor, for one message descriptor.
#[derive(Debug)]
pub(crate) struct NameTable {
    by_name: HashMap<Box<str>, FieldDescriptor>,
}

impl NameTable {
    fn build(desc: &MessageDescriptor) -> Self {
        let mut by_name = HashMap::new();
        for field in desc.fields() {
            by_name.insert(field.json_name().into(), field.clone());
            if field.json_name() != field.name() {
                by_name.insert(field.name().into(), field.clone());
            }
        }
        Self { by_name }
    }

    pub(crate) fn lookup(&self, name: &str) -> Option<&FieldDescriptor> {
        self.by_name.get(name)
    }
}

/// Owns the per-message-descriptor name tables reachable from one root
/// message, shared (via `Arc`) across every `Parser` configured with it.
pub struct ParserMethod {
    root: MessageDescriptor,
    tables: HashMap<String, Arc<NameTable>>,
}

impl ParserMethod {
    /// Builds name tables for `root` and every message type reachable from
    /// it (through message-typed and map-entry fields), recursively.
    pub fn new(root: MessageDescriptor) -> Arc<Self> {
        let mut tables = HashMap::new();
        build_tables(&root, &mut tables);
        tracing::debug!(
            message = root.full_name(),
            messages = tables.len(),
            "built parser method name tables"
        );
        Arc::new(Self { root, tables })
    }

    /// Returns the shared [`ParserMethod`] for `root`'s fully qualified name,
    /// building and caching it on first use. See SPEC_FULL's "ParserMethod
    /// caching" supplement; this wraps [`ParserMethod::new`] rather than
    /// replacing it.
    pub fn cached(root: MessageDescriptor) -> Arc<Self> {
        static CACHE: OnceLock<Mutex<HashMap<String, Arc<ParserMethod>>>> = OnceLock::new();
        let cache = CACHE.get_or_init(|| Mutex::new(HashMap::new()));
        let key = root.full_name().to_owned();
        let mut guard = cache.lock().expect("parser method cache poisoned");
        if let Some(existing) = guard.get(&key) {
            return Arc::clone(existing);
        }
        let method = ParserMethod::new(root);
        guard.insert(key, Arc::clone(&method));
        method
    }

    pub(crate) fn root(&self) -> &MessageDescriptor {
        &self.root
    }

    pub(crate) fn table_for(&self, desc: &MessageDescriptor) -> &Arc<NameTable> {
        self.tables
            .get(desc.full_name())
            .expect("every reachable message descriptor has a table built eagerly")
    }
}

fn build_tables(desc: &MessageDescriptor, tables: &mut HashMap<String, Arc<NameTable>>) {
    if tables.contains_key(desc.full_name()) {
        return;
    }
    tables.insert(desc.full_name().to_owned(), Arc::new(NameTable::build(desc)));
    for field in desc.fields() {
        if let Kind::Message(child) = field.kind() {
            build_tables(&child, tables);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prost_reflect::DescriptorPool;
    use prost_types::{
        field_descriptor_proto::{Label, Type},
        DescriptorProto, FieldDescriptorProto, FileDescriptorProto, FileDescriptorSet,
    };

    fn scalar_field(name: &str, number: i32, ty: Type) -> FieldDescriptorProto {
        FieldDescriptorProto {
            name: Some(name.to_owned()),
            number: Some(number),
            label: Some(Label::Optional as i32),
            r#type: Some(ty as i32),
            json_name: Some(name.to_owned()),
            ..Default::default()
        }
    }

    fn build_pool() -> DescriptorPool {
        let msg = DescriptorProto {
            name: Some("Simple".to_owned()),
            field: vec![
                scalar_field("a", 1, Type::Int32),
                scalar_field("bField", 2, Type::String),
            ],
            ..Default::default()
        };
        let file = FileDescriptorProto {
            name: Some("simple.proto".to_owned()),
            package: Some("test".to_owned()),
            message_type: vec![msg],
            syntax: Some("proto3".to_owned()),
            ..Default::default()
        };
        DescriptorPool::from_file_descriptor_set(FileDescriptorSet { file: vec![file] })
            .expect("valid descriptor set")
    }

    #[test]
    fn builds_table_with_json_and_proto_names() {
        let pool = build_pool();
        let root = pool.get_message_by_name("test.Simple").unwrap();
        let method = ParserMethod::new(root.clone());
        let table = method.table_for(&root);
        assert!(table.lookup("a").is_some());
        assert!(table.lookup("bField").is_some());
        assert!(table.lookup("b_field").is_none());
    }

    #[test]
    fn cached_returns_same_arc_for_same_descriptor() {
        let pool = build_pool();
        let root = pool.get_message_by_name("test.Simple").unwrap();
        let m1 = ParserMethod::cached(root.clone());
        let m2 = ParserMethod::cached(root);
        assert!(Arc::ptr_eq(&m1, &m2));
    }
}
