//! Metadata scanner.
//!
//! Walks a module's catalog and collects expandable types and well-shaped
//! expander functions. Nothing discovered here is invoked.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::module::{
    Attribute, CatalogVisitor, Fault, FunctionInfo, Invoke, Module, Scope, TypeInfo, TypeRef,
    Value,
};

/// Typed generator entry point, bound once the shape filter has run.
pub type ExpanderFn = Arc<dyn Fn(&TypeInfo) -> Result<String, Fault> + Send + Sync>;

/// A type tagged as an expansion target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpandableType {
    pub info: TypeInfo,
    /// Template name -> explicitly requested.
    pub templates: BTreeMap<String, bool>,
}

impl ExpandableType {
    pub fn name(&self) -> &str {
        &self.info.full_name
    }

    /// Whether the type accepts a template at all.
    pub fn accepts(&self, template: &str) -> bool {
        self.templates.contains_key(template)
    }

    /// Whether the type explicitly requests a template.
    pub fn requests(&self, template: &str) -> bool {
        self.templates.get(template).copied().unwrap_or(false)
    }
}

/// A function tagged as a generator for one template.
#[derive(Clone)]
pub struct ExpanderFunction {
    pub name: String,
    pub template: String,
    pub explicit_use: bool,
    pub call: ExpanderFn,
}

impl ExpanderFunction {
    /// Build an expander from a plain closure.
    pub fn new<F>(name: impl Into<String>, template: impl Into<String>, explicit_use: bool, call: F) -> Self
    where
        F: Fn(&TypeInfo) -> Result<String, Fault> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            template: template.into(),
            explicit_use,
            call: Arc::new(call),
        }
    }

    pub fn invoke(&self, ty: &TypeInfo) -> Result<String, Fault> {
        (self.call)(ty)
    }
}

impl fmt::Debug for ExpanderFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExpanderFunction")
            .field("name", &self.name)
            .field("template", &self.template)
            .field("explicit_use", &self.explicit_use)
            .finish_non_exhaustive()
    }
}

/// Everything a scan found, in discovery order.
#[derive(Debug, Clone, Default)]
pub struct Scan {
    pub types: Vec<ExpandableType>,
    pub expanders: Vec<ExpanderFunction>,
}

/// Scan a module for expandable types and expander functions.
///
/// Discovery order is catalog order with a stable sort by full name applied
/// on top, so repeated scans of the same module agree.
pub fn scan(module: &Module) -> Scan {
    let mut collector = Collector::default();
    module.walk(&mut collector);

    let mut scan = collector.scan;
    scan.types.sort_by(|a, b| a.info.full_name.cmp(&b.info.full_name));
    scan.expanders.sort_by(|a, b| a.name.cmp(&b.name));

    tracing::debug!(
        module = module.name(),
        types = scan.types.len(),
        expanders = scan.expanders.len(),
        "scanned module"
    );

    scan
}

#[derive(Default)]
struct Collector {
    scan: Scan,
}

impl CatalogVisitor for Collector {
    fn visit_type(&mut self, ty: &TypeInfo) {
        let mut templates: BTreeMap<String, bool> = BTreeMap::new();
        let mut tagged = false;

        for attribute in &ty.attributes {
            if let Attribute::Expandable { templates: requests } = attribute {
                tagged = true;
                for request in requests {
                    let entry = templates.entry(request.name.clone()).or_insert(false);
                    *entry |= request.explicit;
                }
            }
        }

        if tagged {
            self.scan.types.push(ExpandableType {
                info: ty.clone(),
                templates,
            });
        }
    }

    fn visit_function(&mut self, function: &FunctionInfo, entry: &Arc<dyn Invoke>) {
        let Some((template, explicit_use)) = expander_tag(function) else {
            return;
        };

        if let Err(reason) = check_shape(function) {
            tracing::debug!(
                function = %function.full_name,
                reason,
                "skipping tagged function with unsupported shape"
            );
            return;
        }

        self.scan.expanders.push(ExpanderFunction {
            name: function.full_name.clone(),
            template: template.to_string(),
            explicit_use,
            call: bind(function.full_name.clone(), Arc::clone(entry)),
        });
    }
}

fn expander_tag(function: &FunctionInfo) -> Option<(&str, bool)> {
    function.attributes.iter().find_map(|attribute| match attribute {
        Attribute::Expander {
            template,
            explicit_use,
        } => Some((template.as_str(), *explicit_use)),
        _ => None,
    })
}

/// Module scope, exactly one type-descriptor parameter, string return.
fn check_shape(function: &FunctionInfo) -> Result<(), &'static str> {
    if function.scope != Scope::Module {
        return Err("not declared at module scope");
    }
    if function.returns != TypeRef::String {
        return Err("does not return a string");
    }
    match function.params.as_slice() {
        [param] if param.ty == TypeRef::TypeDescriptor => Ok(()),
        [_] => Err("parameter is not a type descriptor"),
        _ => Err("does not take exactly one parameter"),
    }
}

fn bind(name: String, entry: Arc<dyn Invoke>) -> ExpanderFn {
    Arc::new(move |ty: &TypeInfo| {
        match entry.invoke(&[Value::TypeDescriptor(ty.clone())])? {
            Value::String(text) => Ok(text),
            other => Err(Fault::new(format!(
                "{} returned {:?} instead of a string",
                name, other
            ))),
        }
    })
}
