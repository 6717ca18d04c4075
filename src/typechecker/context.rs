//! Mutable inference context: a stack of scope frames plus the global type
//! and external-binding tables, in the shape of `why_lib`'s
//! `Scope`/`Frame` (there keyed by name; here keyed by [`BinderId`] since
//! the desugarer has already resolved every local reference to a unique
//! binder, so shadowing is a non-issue by construction).

use std::collections::HashMap;
use std::rc::Rc;

use crate::core::BinderId;
use crate::types::{NominalDef, TypeScheme, VarGen};

#[derive(Clone, Debug)]
pub struct VarEntry {
    pub scheme: TypeScheme,
    pub mutable: bool,
}

#[derive(Debug, Default)]
struct Frame {
    variables: HashMap<BinderId, VarEntry>,
}

#[derive(Debug, Default)]
pub struct Scope {
    frames: Vec<Frame>,
}

impl Scope {
    fn new() -> Self {
        Scope {
            frames: vec![Frame::default()],
        }
    }

    fn enter(&mut self) {
        self.frames.push(Frame::default());
    }

    fn exit(&mut self) {
        self.frames.pop();
    }

    fn bind(&mut self, binder: BinderId, entry: VarEntry) {
        self.frames
            .last_mut()
            .expect("scope always has at least one frame")
            .variables
            .insert(binder, entry);
    }

    fn lookup(&self, binder: BinderId) -> Option<&VarEntry> {
        self.frames.iter().rev().find_map(|f| f.variables.get(&binder))
    }
}

pub struct Context {
    pub scope: Scope,
    pub types: HashMap<String, Rc<NominalDef>>,
    pub externals: HashMap<String, TypeScheme>,
    /// Constructor name -> (owning type name, index into its ctor list),
    /// populated whenever a variant `NominalDef` is registered so a bare
    /// `Some`/`Cons`/... pattern or expression can be resolved back to its
    /// type without searching every entry in `types`.
    pub variant_ctors: HashMap<String, (String, usize)>,
    pub gen: VarGen,
}

impl Default for Context {
    fn default() -> Self {
        Context::new()
    }
}

impl Context {
    pub fn new() -> Self {
        Context {
            scope: Scope::new(),
            types: HashMap::new(),
            externals: HashMap::new(),
            variant_ctors: HashMap::new(),
            gen: VarGen::new(),
        }
    }

    pub fn enter_scope(&mut self) {
        self.scope.enter();
    }

    pub fn exit_scope(&mut self) {
        self.scope.exit();
    }

    pub fn bind_variable(&mut self, binder: BinderId, scheme: TypeScheme, mutable: bool) {
        self.scope.bind(binder, VarEntry { scheme, mutable });
    }

    pub fn lookup_variable(&self, binder: BinderId) -> Option<&VarEntry> {
        self.scope.lookup(binder)
    }

    pub fn add_type(&mut self, def: Rc<NominalDef>) {
        if let crate::types::NominalShape::Variant(ctors) = &def.shape {
            for (i, ctor) in ctors.iter().enumerate() {
                self.variant_ctors.insert(ctor.name.clone(), (def.name.clone(), i));
            }
        }
        self.types.insert(def.name.clone(), def);
    }

    pub fn get_type(&self, name: &str) -> Option<Rc<NominalDef>> {
        self.types.get(name).cloned()
    }

    /// Resolve a bare constructor name (`Some`, `Cons`, ...) to its owning
    /// type and the constructor's field-type templates (still containing
    /// `Type::Param` placeholders for the owning type's own parameters).
    pub fn resolve_ctor(&self, ctor_name: &str) -> Option<(Rc<NominalDef>, Vec<crate::types::Type>)> {
        let (type_name, index) = self.variant_ctors.get(ctor_name)?;
        let def = self.types.get(type_name)?.clone();
        let crate::types::NominalShape::Variant(ctors) = &def.shape else {
            return None;
        };
        let fields = ctors[*index].fields.clone();
        Some((def, fields))
    }

    pub fn add_external(&mut self, name: String, scheme: TypeScheme) {
        self.externals.insert(name, scheme);
    }

    pub fn get_external(&self, name: &str) -> Option<&TypeScheme> {
        self.externals.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Type;

    #[test]
    fn test_enter_scope_shadows_inner_frame_first() {
        let mut ctx = Context::new();
        let b = BinderId(0);
        ctx.bind_variable(b, TypeScheme::monomorphic(Type::Int), false);
        ctx.enter_scope();
        ctx.bind_variable(b, TypeScheme::monomorphic(Type::Bool), false);
        assert!(matches!(ctx.lookup_variable(b).unwrap().scheme.ty, Type::Bool));
        ctx.exit_scope();
        assert!(matches!(ctx.lookup_variable(b).unwrap().scheme.ty, Type::Int));
    }

    #[test]
    fn test_lookup_missing_variable() {
        let ctx = Context::new();
        assert!(ctx.lookup_variable(BinderId(42)).is_none());
    }
}
