//! The value model the agent exposes to its host runtime.
//!
//! The wire protocol encodes values as a closed sum (§ [`Value`]); the host
//! runtime constructs these values for locals, globals and logged arguments
//! and hands them to the agent. Identity of aggregates is the [`Arc`]
//! allocation, which is what the object registry keys on.

use std::sync::{Arc, Mutex};

use crate::sync::lock;

/// Shared handle to a function value.
pub type FunctionRef = Arc<FunctionValue>;
/// Shared handle to an array value.
pub type ArrayRef = Arc<ArrayValue>;
/// Shared handle to an object value.
pub type ObjectRef = Arc<ObjectValue>;

/// A host-runtime value, as seen by the inspector.
#[derive(Clone, Debug)]
pub enum Value {
    /// The null value.
    Undefined,
    /// A boolean.
    Bool(bool),
    /// An integer.
    Int(i64),
    /// A floating point number.
    Float(f64),
    /// A string.
    Str(String),
    /// A function, bound or unbound.
    Function(FunctionRef),
    /// An ordered collection.
    Array(ArrayRef),
    /// Anything else.
    Object(ObjectRef),
}

impl Value {
    /// Returns the wire `type` of this value.
    pub fn wire_type(&self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Bool(_) => "boolean",
            Self::Int(_) | Self::Float(_) => "number",
            Self::Str(_) => "string",
            Self::Function(_) => "function",
            Self::Array(_) | Self::Object(_) => "object",
        }
    }

    /// Returns the wire `subtype`, if any.
    pub fn wire_subtype(&self) -> Option<&'static str> {
        match self {
            Self::Undefined => Some("null"),
            Self::Array(_) => Some("array"),
            _ => None,
        }
    }

    /// Returns the host-level class name.
    pub fn class_name(&self) -> String {
        match self {
            Self::Undefined => "NoneType".to_string(),
            Self::Bool(_) => "bool".to_string(),
            Self::Int(_) => "int".to_string(),
            Self::Float(_) => "float".to_string(),
            Self::Str(_) => "str".to_string(),
            Self::Function(_) => "function".to_string(),
            Self::Array(a) => a.class_name().to_string(),
            Self::Object(o) => o.class_name().to_string(),
        }
    }

    /// Stable identity for aggregates and functions; `None` for primitives.
    pub fn identity(&self) -> Option<usize> {
        match self {
            Self::Function(f) => Some(Arc::as_ptr(f) as usize),
            Self::Array(a) => Some(Arc::as_ptr(a) as usize),
            Self::Object(o) => Some(Arc::as_ptr(o) as usize),
            _ => None,
        }
    }

    /// Untruncated display string.
    ///
    /// Strings describe as themselves; everything else follows the host
    /// repr conventions (`None`, `True`, `list() [3]`, `def f(a):`).
    pub fn description(&self) -> String {
        match self {
            Self::Undefined => "None".to_string(),
            Self::Bool(true) => "True".to_string(),
            Self::Bool(false) => "False".to_string(),
            Self::Int(n) => n.to_string(),
            Self::Float(f) => f.to_string(),
            Self::Str(s) => s.clone(),
            Self::Function(f) => f.description(),
            Self::Array(a) => format!("{}() [{}]", a.class_name(), a.len()),
            Self::Object(o) => o.repr(),
        }
    }

    /// Serializes the value into a plain JSON literal, descending at most
    /// `depth` levels into aggregates.
    pub fn to_json(&self, depth: usize) -> serde_json::Value {
        match self {
            Self::Undefined => serde_json::Value::Null,
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Int(n) => serde_json::Value::from(*n),
            Self::Float(f) => serde_json::Value::from(*f),
            Self::Str(s) => serde_json::Value::String(s.clone()),
            Self::Function(f) => serde_json::Value::String(f.description()),
            Self::Array(a) => {
                if depth == 0 {
                    return serde_json::Value::String(self.description());
                }
                let items =
                    a.items().iter().map(|v| v.to_json(depth - 1)).collect::<Vec<_>>();
                serde_json::Value::Array(items)
            }
            Self::Object(o) => {
                if depth == 0 {
                    return serde_json::Value::String(self.description());
                }
                let mut map = serde_json::Map::new();
                for (name, value) in o.members() {
                    map.insert(name, value.to_json(depth - 1));
                }
                serde_json::Value::Object(map)
            }
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

/// How a function is attached to its owner.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FunctionKind {
    /// A plain function or bound/unbound method.
    #[default]
    Function,
    /// A class-method wrapper.
    ClassMethod,
    /// A static-method wrapper.
    StaticMethod,
}

/// A function value: enough metadata to describe and locate it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FunctionValue {
    name: String,
    params: Vec<String>,
    kind: FunctionKind,
    module: String,
    line: u32,
}

impl FunctionValue {
    /// Creates a function declared in `module` at 1-based `line`.
    pub fn new(
        name: impl Into<String>,
        module: impl Into<String>,
        line: u32,
    ) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            kind: FunctionKind::Function,
            module: module.into(),
            line,
        }
    }

    /// Sets the parameter names.
    pub fn with_params(mut self, params: &[&str]) -> Self {
        self.params = params.iter().map(|p| (*p).to_string()).collect();
        self
    }

    /// Sets the attachment kind.
    pub fn with_kind(mut self, kind: FunctionKind) -> Self {
        self.kind = kind;
        self
    }

    /// Wraps the value into a shared handle.
    pub fn share(self) -> FunctionRef {
        Arc::new(self)
    }

    /// The code-level name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The declaring module.
    pub fn module(&self) -> &str {
        &self.module
    }

    /// The 1-based first line of the declaration.
    pub fn line(&self) -> u32 {
        self.line
    }

    /// `def name(a, b):`, prefixed with the wrapper decorator if any.
    pub fn description(&self) -> String {
        let prefix = match self.kind {
            FunctionKind::Function => "",
            FunctionKind::ClassMethod => "@classmethod ",
            FunctionKind::StaticMethod => "@staticmethod ",
        };
        format!("{prefix}def {}({}):", self.name, self.params.join(", "))
    }
}

/// An ordered collection value.
#[derive(Debug)]
pub struct ArrayValue {
    class_name: String,
    items: Mutex<Vec<Value>>,
}

impl ArrayValue {
    /// Creates a collection with the default `list` class name.
    pub fn new(items: Vec<Value>) -> Self {
        Self { class_name: "list".to_string(), items: Mutex::new(items) }
    }

    /// Overrides the class name (`tuple`, `set`, …).
    pub fn with_class_name(mut self, name: impl Into<String>) -> Self {
        self.class_name = name.into();
        self
    }

    /// Wraps the value into a shared handle.
    pub fn share(self) -> ArrayRef {
        Arc::new(self)
    }

    /// The host-level class name.
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// Number of items.
    pub fn len(&self) -> usize {
        lock(&self.items).len()
    }

    /// True when the collection has no items.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the items.
    pub fn items(&self) -> Vec<Value> {
        lock(&self.items).clone()
    }

    /// The item at `index`, if present.
    pub fn get(&self, index: usize) -> Option<Value> {
        lock(&self.items).get(index).cloned()
    }

    /// Appends an item.
    pub fn push(&self, value: Value) {
        lock(&self.items).push(value);
    }
}

/// Accessor pair on a [`TypeDescriptor`].
#[derive(Clone, Debug, Default)]
pub struct Accessor {
    /// Getter, if any.
    pub get: Option<FunctionRef>,
    /// Setter, if any.
    pub set: Option<FunctionRef>,
}

/// Type-level members shared by all instances of a host type.
#[derive(Clone, Debug, Default)]
pub struct TypeDescriptor {
    name: String,
    data: Vec<(String, Value)>,
    accessors: Vec<(String, Accessor)>,
}

impl TypeDescriptor {
    /// Creates an empty descriptor for the named type.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), data: Vec::new(), accessors: Vec::new() }
    }

    /// Adds a type-level data member (a method, a class attribute).
    pub fn with_data(mut self, name: impl Into<String>, value: Value) -> Self {
        self.data.push((name.into(), value));
        self
    }

    /// Adds an accessor member.
    pub fn with_accessor(mut self, name: impl Into<String>, accessor: Accessor) -> Self {
        self.accessors.push((name.into(), accessor));
        self
    }

    /// Wraps the descriptor for sharing between instances.
    pub fn share(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// The type name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Type-level data members.
    pub fn data(&self) -> &[(String, Value)] {
        &self.data
    }

    /// Type-level accessor members.
    pub fn accessors(&self) -> &[(String, Accessor)] {
        &self.accessors
    }
}

/// A general object value: slots, an instance dictionary and an optional
/// shared type.
#[derive(Debug)]
pub struct ObjectValue {
    class_name: String,
    slots: Vec<(String, Value)>,
    attrs: Mutex<Vec<(String, Value)>>,
    ty: Option<Arc<TypeDescriptor>>,
    repr: Option<String>,
}

impl ObjectValue {
    /// Creates an object of the named class with no members.
    pub fn new(class_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            slots: Vec::new(),
            attrs: Mutex::new(Vec::new()),
            ty: None,
            repr: None,
        }
    }

    /// Adds a slot-listed attribute. Slots are fixed at construction.
    pub fn with_slot(mut self, name: impl Into<String>, value: Value) -> Self {
        self.slots.push((name.into(), value));
        self
    }

    /// Adds a per-instance attribute.
    pub fn with_attr(self, name: impl Into<String>, value: Value) -> Self {
        self.set_attr(name, value);
        self
    }

    /// Attaches the shared type descriptor.
    pub fn with_type(mut self, ty: Arc<TypeDescriptor>) -> Self {
        self.ty = Some(ty);
        self
    }

    /// Overrides the display string.
    pub fn with_repr(mut self, repr: impl Into<String>) -> Self {
        self.repr = Some(repr.into());
        self
    }

    /// Wraps the value into a shared handle.
    pub fn share(self) -> ObjectRef {
        Arc::new(self)
    }

    /// The host-level class name.
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// The slot-listed attributes.
    pub fn slots(&self) -> &[(String, Value)] {
        &self.slots
    }

    /// Snapshot of the per-instance attributes.
    pub fn attrs(&self) -> Vec<(String, Value)> {
        lock(&self.attrs).clone()
    }

    /// The shared type descriptor, if any.
    pub fn type_descriptor(&self) -> Option<&Arc<TypeDescriptor>> {
        self.ty.as_ref()
    }

    /// Inserts or updates a per-instance attribute.
    pub fn set_attr(&self, name: impl Into<String>, value: Value) {
        let name = name.into();
        let mut attrs = lock(&self.attrs);
        if let Some(entry) = attrs.iter_mut().find(|(n, _)| *n == name) {
            entry.1 = value;
        } else {
            attrs.push((name, value));
        }
    }

    /// Looks an attribute up across slots, instance attributes and
    /// type-level data members, in that order. Accessors are never invoked.
    pub fn attr(&self, name: &str) -> Option<Value> {
        if let Some((_, v)) = self.slots.iter().find(|(n, _)| n == name) {
            return Some(v.clone());
        }
        if let Some((_, v)) = lock(&self.attrs).iter().find(|(n, _)| n == name) {
            return Some(v.clone());
        }
        let ty = self.ty.as_ref()?;
        ty.data().iter().find(|(n, _)| n == name).map(|(_, v)| v.clone())
    }

    /// All data members visible on the instance, shadowing applied, in
    /// slot → instance → type order.
    pub fn members(&self) -> Vec<(String, Value)> {
        let mut seen = Vec::new();
        let mut out = Vec::new();
        for (name, value) in
            self.slots.iter().cloned().chain(lock(&self.attrs).iter().cloned())
        {
            if !seen.contains(&name) {
                seen.push(name.clone());
                out.push((name, value));
            }
        }
        if let Some(ty) = &self.ty {
            for (name, value) in ty.data() {
                if !seen.contains(name) {
                    seen.push(name.clone());
                    out.push((name.clone(), value.clone()));
                }
            }
        }
        out
    }

    /// The display string: the explicit repr when set, a host-style
    /// `<Class object at 0x…>` otherwise.
    pub fn repr(&self) -> String {
        match &self.repr {
            Some(r) => r.clone(),
            None => {
                format!("<{} object at {:#x}>", self.class_name, self as *const Self as usize)
            }
        }
    }
}

/// Truncates `text` to at most `max` visible characters, marking the cut
/// with an ellipsis.
pub(crate) fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}
