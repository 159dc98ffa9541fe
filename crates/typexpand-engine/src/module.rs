//! Compiled module catalog.
//!
//! A [`Module`] is what the compiler service hands back: a structured
//! catalog of type and function descriptors, one invocation entry point per
//! function, and the raw module image.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Reference to a type in a signature.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TypeRef {
    /// A descriptor of some type (not an instance of it).
    TypeDescriptor,
    /// A string value.
    String,
    /// No value.
    Unit,
    /// Any other named type.
    Named { name: String },
}

/// Where a function is declared.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    /// Module scope; callable without an instance.
    #[default]
    Module,
    /// Requires an instance of its declaring type.
    Instance,
}

/// A template a type accepts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TemplateRequest {
    /// Template name.
    pub name: String,
    /// Whether the type explicitly requests this template.
    #[serde(default)]
    pub explicit: bool,
}

impl TemplateRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            explicit: false,
        }
    }

    pub fn explicit(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            explicit: true,
        }
    }
}

/// Metadata tag attached to a type or function.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Attribute {
    /// Marks a type as an expansion target.
    Expandable { templates: Vec<TemplateRequest> },
    /// Marks a function as a generator for one template.
    Expander {
        template: String,
        #[serde(default)]
        explicit_use: bool,
    },
    /// Any attribute the engine does not interpret.
    Other { name: String },
}

/// Descriptor of a type declared in a module.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeInfo {
    /// Fully qualified name.
    pub full_name: String,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
}

impl TypeInfo {
    pub fn new(full_name: impl Into<String>) -> Self {
        Self {
            full_name: full_name.into(),
            attributes: Vec::new(),
        }
    }

    pub fn with_attribute(mut self, attribute: Attribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// Name without its namespace.
    pub fn short_name(&self) -> &str {
        short_name(&self.full_name)
    }
}

/// A function parameter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    pub ty: TypeRef,
}

/// Descriptor of a function declared in a module.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FunctionInfo {
    /// Fully qualified name.
    pub full_name: String,
    #[serde(default)]
    pub scope: Scope,
    #[serde(default)]
    pub params: Vec<Param>,
    pub returns: TypeRef,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
}

impl FunctionInfo {
    /// A module-scope function taking a type descriptor and returning a string.
    pub fn generator(full_name: impl Into<String>) -> Self {
        Self {
            full_name: full_name.into(),
            scope: Scope::Module,
            params: vec![Param {
                name: "ty".to_string(),
                ty: TypeRef::TypeDescriptor,
            }],
            returns: TypeRef::String,
            attributes: Vec::new(),
        }
    }

    pub fn with_attribute(mut self, attribute: Attribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    pub fn short_name(&self) -> &str {
        short_name(&self.full_name)
    }
}

fn short_name(full_name: &str) -> &str {
    let after_path = full_name.rsplit("::").next().unwrap_or(full_name);
    after_path.rsplit('.').next().unwrap_or(after_path)
}

/// Serializable catalog of a module's declarations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub types: Vec<TypeInfo>,
    #[serde(default)]
    pub functions: Vec<FunctionInfo>,
}

/// A runtime value passed to or returned from a module function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    TypeDescriptor(TypeInfo),
    String(String),
    Unit,
}

/// Runtime fault raised by an invoked function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fault {
    pub message: String,
}

impl Fault {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for Fault {}

/// Uniform call interface for a module function.
pub trait Invoke: Send + Sync {
    fn invoke(&self, args: &[Value]) -> Result<Value, Fault>;
}

impl<F> Invoke for F
where
    F: Fn(&[Value]) -> Result<Value, Fault> + Send + Sync,
{
    fn invoke(&self, args: &[Value]) -> Result<Value, Fault> {
        self(args)
    }
}

/// Visitor over a module's catalog.
pub trait CatalogVisitor {
    fn visit_type(&mut self, _ty: &TypeInfo) {}

    fn visit_function(&mut self, _function: &FunctionInfo, _entry: &Arc<dyn Invoke>) {}
}

/// A loaded, introspectable compiled module.
#[derive(Clone)]
pub struct Module {
    name: String,
    catalog: Catalog,
    entries: Vec<Arc<dyn Invoke>>,
    image: Arc<Vec<u8>>,
    location: Option<PathBuf>,
}

impl Module {
    /// Start building a module.
    pub fn builder(name: impl Into<String>) -> ModuleBuilder {
        ModuleBuilder {
            name: name.into(),
            catalog: Catalog::default(),
            entries: Vec::new(),
            image: Arc::default(),
            location: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Raw module image bytes.
    pub fn image(&self) -> &[u8] {
        &self.image
    }

    /// Artifact location, for modules compiled to disk.
    pub fn location(&self) -> Option<&Path> {
        self.location.as_deref()
    }

    pub fn with_location(mut self, location: impl Into<PathBuf>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Visit every type, then every function, in catalog order.
    pub fn walk<V: CatalogVisitor>(&self, visitor: &mut V) {
        for ty in &self.catalog.types {
            visitor.visit_type(ty);
        }
        for (function, entry) in self.catalog.functions.iter().zip(&self.entries) {
            visitor.visit_function(function, entry);
        }
    }
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Module")
            .field("name", &self.name)
            .field("types", &self.catalog.types.len())
            .field("functions", &self.catalog.functions.len())
            .field("image_len", &self.image.len())
            .field("location", &self.location)
            .finish()
    }
}

/// Builder for [`Module`].
pub struct ModuleBuilder {
    name: String,
    catalog: Catalog,
    entries: Vec<Arc<dyn Invoke>>,
    image: Arc<Vec<u8>>,
    location: Option<PathBuf>,
}

impl ModuleBuilder {
    pub fn image(mut self, image: Vec<u8>) -> Self {
        self.image = Arc::new(image);
        self
    }

    /// Use an image buffer that entry points also hold.
    pub fn shared_image(mut self, image: Arc<Vec<u8>>) -> Self {
        self.image = image;
        self
    }

    pub fn location(mut self, location: impl Into<PathBuf>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn ty(mut self, ty: TypeInfo) -> Self {
        self.catalog.types.push(ty);
        self
    }

    pub fn function(mut self, function: FunctionInfo, entry: impl Invoke + 'static) -> Self {
        self.catalog.functions.push(function);
        self.entries.push(Arc::new(entry));
        self
    }

    pub fn function_entry(mut self, function: FunctionInfo, entry: Arc<dyn Invoke>) -> Self {
        self.catalog.functions.push(function);
        self.entries.push(entry);
        self
    }

    pub fn build(self) -> Module {
        Module {
            name: self.name,
            catalog: self.catalog,
            entries: self.entries,
            image: self.image,
            location: self.location,
        }
    }
}
