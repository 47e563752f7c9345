//! The object inspector: a registry assigning stable identifiers to live
//! values, the `RemoteObject` encoder, on-demand property extraction and
//! group lifetimes.
//!
//! Registration is keyed by value identity. Handles are weak where the
//! value's kind admits weak references (functions) and strong otherwise
//! (collections and objects); releasing a group drops only the strong
//! entries, so weak entries stay discoverable for as long as their referent
//! is alive.

use std::collections::HashMap;
use std::sync::{Mutex, Weak};

use crate::protocol::{
    line_to_wire, FunctionDetails, Location, ObjectPreview, PropertyDescriptor,
    PropertyPreview, RemoteObject,
};
use crate::sync::lock;

pub mod eval;
pub mod value;

use self::value::{truncate, ArrayRef, FunctionValue, ObjectRef, Value};

/// Maximum visible characters in a wire description.
const DESCRIPTION_LIMIT: usize = 50;
/// Entries included in a structured preview.
const PREVIEW_ENTRIES: usize = 10;

/// How a registered value is held.
#[derive(Debug)]
enum Handle {
    Array(ArrayRef),
    Object(ObjectRef),
    Function(Weak<FunctionValue>),
}

impl Handle {
    /// True for handles that keep their referent alive.
    fn is_strong(&self) -> bool {
        !matches!(self, Self::Function(_))
    }

    /// Rebuilds the value, if the referent is still alive.
    fn resolve(&self) -> Option<Value> {
        match self {
            Self::Array(a) => Some(Value::Array(a.clone())),
            Self::Object(o) => Some(Value::Object(o.clone())),
            Self::Function(f) => f.upgrade().map(Value::Function),
        }
    }
}

/// Options for [`ObjectRegistry::encode`].
#[derive(Clone, Debug, Default)]
pub struct EncodeOptions {
    /// Attach a structured preview of the first entries.
    pub preview: bool,
    /// Group tag appended to for every id this encoding registers.
    pub group: Option<String>,
    /// Encode the whole value as a JSON literal instead of registering it.
    pub by_value: bool,
    /// Omit the object description. Only scope objects snapshot during
    /// frame extraction use this, to keep the traced thread's stop cheap.
    pub skip_description: bool,
}

impl EncodeOptions {
    /// Options used when a value crosses the wire with no client hints.
    pub fn plain() -> Self {
        Self::default()
    }

    /// Enables the structured preview.
    pub fn with_preview(mut self, preview: bool) -> Self {
        self.preview = preview;
        self
    }

    /// Tags registered ids with `group`.
    pub fn with_group(mut self, group: Option<&str>) -> Self {
        self.group = group.map(str::to_string);
        self
    }

    /// Switches to by-value encoding.
    pub fn by_value(mut self) -> Self {
        self.by_value = true;
        self
    }

    /// Skips description generation for objects.
    pub fn without_description(mut self) -> Self {
        self.skip_description = true;
        self
    }
}

/// The process-wide value registry.
#[derive(Debug, Default)]
pub struct ObjectRegistry {
    entries: Mutex<HashMap<usize, Handle>>,
    groups: Mutex<HashMap<String, Vec<usize>>>,
}

impl ObjectRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `value` and returns its id as a decimal string, or `None`
    /// for primitives, which cross the wire literally.
    ///
    /// Registering an already-registered value returns the stored id:
    /// identity is stable for as long as the value is alive.
    pub fn save(&self, value: &Value, group: Option<&str>) -> Option<String> {
        let id = value.identity()?;
        let mut entries = lock(&self.entries);
        entries.entry(id).or_insert_with(|| match value {
            Value::Array(a) => Handle::Array(a.clone()),
            Value::Object(o) => Handle::Object(o.clone()),
            Value::Function(f) => Handle::Function(std::sync::Arc::downgrade(f)),
            // identity() returned Some, so no other variant reaches here
            _ => unreachable!("primitive values have no identity"),
        });
        drop(entries);
        if let Some(group) = group {
            lock(&self.groups).entry(group.to_string()).or_default().push(id);
        }
        Some(id.to_string())
    }

    /// Resolves an id back to its value. A dead weak entry is pruned and
    /// reported as a miss.
    pub fn get(&self, object_id: &str) -> Option<Value> {
        let id: usize = object_id.parse().ok()?;
        let mut entries = lock(&self.entries);
        let resolved = entries.get(&id)?.resolve();
        if resolved.is_none() {
            entries.remove(&id);
        }
        resolved
    }

    /// Releases a group: every strongly-held entry is dropped from the
    /// registry, weak entries survive. An unknown group is a no-op.
    pub fn release_group(&self, group: &str) {
        let Some(ids) = lock(&self.groups).remove(group) else { return };
        let mut entries = lock(&self.entries);
        for id in ids {
            if entries.get(&id).is_some_and(Handle::is_strong) {
                entries.remove(&id);
            }
        }
    }

    /// Returns the declaration details of a registered function.
    pub fn function_details(&self, object_id: &str) -> Option<FunctionDetails> {
        match self.get(object_id)? {
            Value::Function(f) => Some(FunctionDetails {
                name: f.name().to_string(),
                display_name: f.name().to_string(),
                location: Location {
                    script_id: f.module().to_string(),
                    line_number: line_to_wire(f.line()),
                },
            }),
            _ => None,
        }
    }

    /// Encodes `value` into its wire shape.
    pub fn encode(&self, value: &Value, opts: &EncodeOptions) -> RemoteObject {
        if opts.by_value {
            return self.encode_literal(value);
        }
        let mut out = RemoteObject {
            kind: value.wire_type().to_string(),
            subtype: value.wire_subtype().map(str::to_string),
            class_name: Some(value.class_name()),
            ..Default::default()
        };
        match value {
            Value::Undefined => {
                out.description = Some("None".to_string());
                out.value = Some(serde_json::Value::Null);
            }
            Value::Bool(b) => {
                out.description = Some(value.description());
                out.value = Some(serde_json::Value::Bool(*b));
            }
            Value::Int(n) => {
                out.description = Some(value.description());
                out.value = Some(serde_json::Value::from(*n));
            }
            Value::Float(f) => {
                out.description = Some(value.description());
                out.value = Some(serde_json::Value::from(*f));
            }
            Value::Str(s) => {
                out.description = Some(truncate(s, DESCRIPTION_LIMIT));
                out.value = Some(serde_json::Value::String(s.clone()));
            }
            Value::Function(_) => {
                out.description = Some(truncate(&value.description(), DESCRIPTION_LIMIT));
                out.object_id = self.save(value, opts.group.as_deref());
            }
            Value::Array(_) => {
                out.description = Some(truncate(&value.description(), DESCRIPTION_LIMIT));
                out.object_id = self.save(value, opts.group.as_deref());
                if opts.preview {
                    out.preview = Some(self.preview(value));
                }
            }
            Value::Object(_) => {
                out.object_id = self.save(value, opts.group.as_deref());
                if !opts.skip_description {
                    out.description =
                        Some(truncate(&value.description(), DESCRIPTION_LIMIT));
                }
                if opts.preview {
                    out.preview = Some(self.preview(value));
                }
            }
        }
        out
    }

    /// Encodes `value` as a JSON literal: nothing is registered.
    fn encode_literal(&self, value: &Value) -> RemoteObject {
        RemoteObject {
            kind: value.wire_type().to_string(),
            subtype: value.wire_subtype().map(str::to_string),
            class_name: Some(value.class_name()),
            description: Some(truncate(&value.description(), DESCRIPTION_LIMIT)),
            value: Some(value.to_json(8)),
            ..Default::default()
        }
    }

    /// Builds the structured preview of the first entries.
    fn preview(&self, value: &Value) -> ObjectPreview {
        let entries: Vec<(String, Value)> = match value {
            Value::Array(a) => a
                .items()
                .into_iter()
                .enumerate()
                .map(|(i, v)| (i.to_string(), v))
                .collect(),
            Value::Object(o) => o.members(),
            _ => Vec::new(),
        };
        let overflow = entries.len() > PREVIEW_ENTRIES;
        let properties = entries
            .into_iter()
            .take(PREVIEW_ENTRIES)
            .map(|(name, v)| PropertyPreview {
                name,
                kind: v.wire_type().to_string(),
                value: truncate(&v.description(), DESCRIPTION_LIMIT),
            })
            .collect();
        ObjectPreview {
            kind: value.wire_type().to_string(),
            description: truncate(&value.description(), DESCRIPTION_LIMIT),
            overflow,
            properties,
        }
    }

    /// Extracts property descriptors from `value`.
    ///
    /// Data properties come from three sources in order: slot-listed
    /// attributes, per-instance attributes, then unshadowed type members.
    /// With `accessors_only` set, only type-level accessor pairs are
    /// yielded. Underscore-prefixed names are elided throughout, and
    /// getters are never invoked.
    pub fn properties(
        &self,
        value: &Value,
        accessors_only: bool,
    ) -> Vec<PropertyDescriptor> {
        match value {
            Value::Array(a) if !accessors_only => a
                .items()
                .into_iter()
                .enumerate()
                .map(|(i, v)| self.data_descriptor(i.to_string(), &v, true))
                .collect(),
            Value::Object(o) => {
                if accessors_only {
                    let Some(ty) = o.type_descriptor() else { return Vec::new() };
                    let shadowed: Vec<&str> =
                        o.slots().iter().map(|(n, _)| n.as_str()).collect();
                    let attrs = o.attrs();
                    ty.accessors()
                        .iter()
                        .filter(|(name, _)| !name.starts_with('_'))
                        .filter(|(name, _)| {
                            !shadowed.contains(&name.as_str())
                                && !attrs.iter().any(|(n, _)| n == name)
                        })
                        .map(|(name, acc)| PropertyDescriptor {
                            name: name.clone(),
                            get: acc.get.clone().map(|f| {
                                self.encode(&Value::Function(f), &EncodeOptions::plain())
                            }),
                            set: acc.set.clone().map(|f| {
                                self.encode(&Value::Function(f), &EncodeOptions::plain())
                            }),
                            enumerable: true,
                            is_own: false,
                            ..Default::default()
                        })
                        .collect()
                } else {
                    let mut seen: Vec<String> = Vec::new();
                    let mut out = Vec::new();
                    for (name, v) in
                        o.slots().iter().cloned().chain(o.attrs().into_iter())
                    {
                        if name.starts_with('_') || seen.contains(&name) {
                            continue;
                        }
                        seen.push(name.clone());
                        out.push(self.data_descriptor(name, &v, true));
                    }
                    if let Some(ty) = o.type_descriptor() {
                        for (name, v) in ty.data() {
                            if name.starts_with('_') || seen.contains(name) {
                                continue;
                            }
                            seen.push(name.clone());
                            out.push(self.data_descriptor(name.clone(), v, false));
                        }
                    }
                    out
                }
            }
            _ => Vec::new(),
        }
    }

    fn data_descriptor(
        &self,
        name: String,
        value: &Value,
        is_own: bool,
    ) -> PropertyDescriptor {
        PropertyDescriptor {
            name,
            value: Some(self.encode(value, &EncodeOptions::plain())),
            enumerable: true,
            is_own,
            ..Default::default()
        }
    }
}
