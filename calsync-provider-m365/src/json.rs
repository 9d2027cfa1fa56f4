//! Named-member access to remote resources and an incremental JSON builder.

use serde_json::{Map, Value};

/// Read-only view of a remote JSON resource.
///
/// The engine never indexes raw JSON; every read goes through one of the
/// named-member accessors below, which treat `null` like an absent member.
#[derive(Debug, Clone, Copy)]
pub struct RemoteResource<'a> {
    value: &'a Value,
}

impl<'a> RemoteResource<'a> {
    pub fn new(value: &'a Value) -> Self {
        RemoteResource { value }
    }

    fn member(&self, name: &str) -> Option<&'a Value> {
        self.value.get(name).filter(|v| !v.is_null())
    }

    pub fn has_member(&self, name: &str) -> bool {
        self.member(name).is_some()
    }

    pub fn string_member(&self, name: &str) -> Option<&'a str> {
        self.member(name).and_then(Value::as_str)
    }

    /// Like `string_member`, but empty strings count as absent.
    pub fn non_empty_string_member(&self, name: &str) -> Option<&'a str> {
        self.string_member(name).filter(|s| !s.is_empty())
    }

    pub fn bool_member(&self, name: &str) -> Option<bool> {
        self.member(name).and_then(Value::as_bool)
    }

    pub fn i64_member(&self, name: &str) -> Option<i64> {
        self.member(name).and_then(Value::as_i64)
    }

    pub fn object_member(&self, name: &str) -> Option<RemoteResource<'a>> {
        self.member(name)
            .filter(|v| v.is_object())
            .map(RemoteResource::new)
    }

    /// Elements of an array member; empty when the member is absent.
    pub fn array_member(&self, name: &str) -> Vec<RemoteResource<'a>> {
        self.member(name)
            .and_then(Value::as_array)
            .map(|items| items.iter().map(RemoteResource::new).collect())
            .unwrap_or_default()
    }

    /// String elements of an array member, skipping anything that is not a string.
    pub fn string_array_member(&self, name: &str) -> Vec<&'a str> {
        self.member(name)
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }

    /// Follow a chain of object members, e.g. `["emailAddress", "address"]`.
    pub fn string_at(&self, path: &[&str]) -> Option<&'a str> {
        let (last, parents) = path.split_last()?;
        let mut current = *self;
        for name in parents {
            current = current.object_member(name)?;
        }
        current.string_member(last)
    }

    pub fn as_value(&self) -> &'a Value {
        self.value
    }
}

enum Frame {
    Object {
        name: Option<String>,
        members: Map<String, Value>,
    },
    Array {
        name: Option<String>,
        items: Vec<Value>,
    },
}

impl Frame {
    fn into_parts(self) -> (Option<String>, Value) {
        match self {
            Frame::Object { name, members } => (name, Value::Object(members)),
            Frame::Array { name, items } => (name, Value::Array(items)),
        }
    }
}

/// Incremental builder for an outbound JSON document.
///
/// Starts with an open root object. Nested objects and arrays are opened
/// with the `begin_*` calls and attached to their parent when the matching
/// `end_*` call closes them. Inside an array the member name is ignored.
pub struct JsonBuilder {
    stack: Vec<Frame>,
}

impl Default for JsonBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl JsonBuilder {
    pub fn new() -> Self {
        JsonBuilder {
            stack: vec![Frame::Object {
                name: None,
                members: Map::new(),
            }],
        }
    }

    pub fn begin_object_member(&mut self, name: &str) -> &mut Self {
        self.stack.push(Frame::Object {
            name: Some(name.to_string()),
            members: Map::new(),
        });
        self
    }

    /// Open an object element inside the current array.
    pub fn begin_object(&mut self) -> &mut Self {
        self.stack.push(Frame::Object {
            name: None,
            members: Map::new(),
        });
        self
    }

    pub fn end_object_member(&mut self) -> &mut Self {
        self.close();
        self
    }

    pub fn end_object(&mut self) -> &mut Self {
        self.close();
        self
    }

    pub fn begin_array_member(&mut self, name: &str) -> &mut Self {
        self.stack.push(Frame::Array {
            name: Some(name.to_string()),
            items: Vec::new(),
        });
        self
    }

    pub fn end_array_member(&mut self) -> &mut Self {
        self.close();
        self
    }

    pub fn add_member(&mut self, name: &str, value: impl Into<Value>) -> &mut Self {
        self.push_value(Some(name), value.into());
        self
    }

    pub fn add_null_member(&mut self, name: &str) -> &mut Self {
        self.push_value(Some(name), Value::Null);
        self
    }

    /// Append a value to the current array.
    pub fn add_element(&mut self, value: impl Into<Value>) -> &mut Self {
        self.push_value(None, value.into());
        self
    }

    /// Whether nothing has been added to the root object yet.
    pub fn is_empty(&self) -> bool {
        match self.stack.as_slice() {
            [Frame::Object { members, .. }] => members.is_empty(),
            _ => false,
        }
    }

    /// Close any frames left open and return the document.
    pub fn finish(mut self) -> Value {
        while self.stack.len() > 1 {
            self.close();
        }
        match self.stack.pop() {
            Some(frame) => frame.into_parts().1,
            None => Value::Object(Map::new()),
        }
    }

    fn push_value(&mut self, name: Option<&str>, value: Value) {
        match self.stack.last_mut() {
            Some(Frame::Object { members, .. }) => {
                if let Some(name) = name {
                    members.insert(name.to_string(), value);
                }
            }
            Some(Frame::Array { items, .. }) => items.push(value),
            None => {}
        }
    }

    fn close(&mut self) {
        // The root frame stays open until `finish`
        if self.stack.len() < 2 {
            return;
        }
        if let Some(frame) = self.stack.pop() {
            let (name, value) = frame.into_parts();
            self.push_value(name.as_deref(), value);
        }
    }
}
