use std::{any::TypeId, rc::Rc};

use ahash::AHashMap;

use crate::{
    error::{Error, ErrorKind, RunResult},
    expressions::Expr,
};

/// Type names that exist in every registry.
pub(crate) const BUILTIN_TYPES: &[&str] = &["any", "empty", "bool", "number", "string", "blob", "array"];

/// A declared member of a user-defined type: a name and an optional
/// default-value expression, evaluated at instantiation time.
#[derive(Debug, Clone)]
pub(crate) struct Member {
    pub name: String,
    pub init: Option<Rc<Expr>>,
}

/// A registered type: builtin root, user-defined object type, or a
/// host-side native type.
///
/// The parent link is stored by name; lineage walks go back through the
/// registry, which guarantees the parent was registered first.
#[derive(Debug, Clone)]
pub(crate) struct TypeDef {
    pub name: String,
    pub parent: Option<String>,
    /// Host-language tag for native types.
    pub native: Option<TypeId>,
    /// Declared members in order; ordering is observable because default
    /// initializers may reference earlier members.
    pub members: Vec<Member>,
}

/// Registry of all user-visible type names known to one engine.
#[derive(Debug, Default)]
pub(crate) struct TypeRegistry {
    types: AHashMap<String, TypeDef>,
}

impl TypeRegistry {
    /// Creates a registry pre-populated with the builtin root types.
    pub fn new() -> Self {
        let mut registry = Self::default();
        for name in BUILTIN_TYPES {
            registry.register_builtin(name);
        }
        registry
    }

    fn register_builtin(&mut self, name: &str) {
        self.types.insert(
            name.to_owned(),
            TypeDef {
                name: name.to_owned(),
                parent: None,
                native: None,
                members: Vec::new(),
            },
        );
    }

    /// Registers a user-defined type with an optional parent and ordered
    /// member list. The parent must already exist.
    pub fn register_user(&mut self, name: &str, parent: Option<&str>, members: Vec<Member>) -> RunResult<()> {
        self.register(name, parent, None, members)
    }

    /// Registers a host-side type bound to a native tag.
    pub fn register_native(&mut self, name: &str, parent: Option<&str>, tag: TypeId) -> RunResult<()> {
        self.register(name, parent, Some(tag), Vec::new())
    }

    fn register(
        &mut self,
        name: &str,
        parent: Option<&str>,
        native: Option<TypeId>,
        members: Vec<Member>,
    ) -> RunResult<()> {
        if let Some(parent) = parent
            && !self.types.contains_key(parent)
        {
            return Err(Error::unknown_type(parent));
        }
        if self.types.contains_key(name) {
            return Err(Error::new(
                ErrorKind::TypeExists,
                format!("type '{name}' already exists"),
            ));
        }
        self.types.insert(
            name.to_owned(),
            TypeDef {
                name: name.to_owned(),
                parent: parent.map(str::to_owned),
                native,
                members,
            },
        );
        Ok(())
    }

    /// Looks a type up by name.
    pub fn lookup(&self, name: &str) -> Option<&TypeDef> {
        self.types.get(name)
    }

    /// Checks whether `sub` is in the lineage of `sup`.
    ///
    /// True when `sup` is `any`, when the names are equal, or when `sub`'s
    /// parent chain reaches `sup`. An unknown `sub` is an error; the check
    /// happens before the `any` shortcut, matching lookup-first semantics.
    pub fn is_a(&self, sub: &str, sup: &str) -> RunResult<bool> {
        let mut current = Some(self.lookup(sub).ok_or_else(|| Error::unknown_type(sub))?);
        if sup == "any" {
            return Ok(true);
        }
        while let Some(def) = current {
            if def.name == sup {
                return Ok(true);
            }
            current = def.parent.as_deref().and_then(|p| self.lookup(p));
        }
        Ok(false)
    }

    /// Maps a native tag back to its registered user-visible name.
    pub fn translate_native_tag(&self, tag: TypeId) -> RunResult<&str> {
        self.types
            .values()
            .find(|def| def.native == Some(tag))
            .map(|def| def.name.as_str())
            .ok_or_else(|| Error::new(ErrorKind::UnknownType, "native type is not registered"))
    }

    /// Collects the lineage of `name` from root ancestor to the type itself.
    pub fn lineage(&self, name: &str) -> RunResult<Vec<&TypeDef>> {
        let mut chain = Vec::new();
        let mut current = Some(self.lookup(name).ok_or_else(|| Error::unknown_type(name))?);
        while let Some(def) = current {
            chain.push(def);
            current = match def.parent.as_deref() {
                Some(parent) => Some(self.lookup(parent).ok_or_else(|| Error::unknown_type(parent))?),
                None => None,
            };
        }
        chain.reverse();
        Ok(chain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_roots_exist() {
        let registry = TypeRegistry::new();
        for name in BUILTIN_TYPES {
            assert!(registry.lookup(name).is_some(), "missing builtin {name}");
        }
    }

    #[test]
    fn lineage_walk() {
        let mut registry = TypeRegistry::new();
        registry.register_user("vehicle", None, Vec::new()).unwrap();
        registry.register_user("bike", Some("vehicle"), Vec::new()).unwrap();

        assert!(registry.is_a("bike", "vehicle").unwrap());
        assert!(registry.is_a("bike", "bike").unwrap());
        assert!(registry.is_a("bike", "any").unwrap());
        assert!(!registry.is_a("vehicle", "bike").unwrap());
        assert!(registry.is_a("number", "any").unwrap());

        let err = registry.is_a("ghost", "any").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownType);
    }

    #[test]
    fn native_tags_translate_back_to_names() {
        struct Marker;
        let mut registry = TypeRegistry::new();
        registry
            .register_native("marker", None, TypeId::of::<Marker>())
            .unwrap();
        assert_eq!(registry.translate_native_tag(TypeId::of::<Marker>()).unwrap(), "marker");
        let err = registry.translate_native_tag(TypeId::of::<String>()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownType);
    }

    #[test]
    fn duplicate_registration_fails() {
        let mut registry = TypeRegistry::new();
        registry.register_user("vehicle", None, Vec::new()).unwrap();
        let err = registry.register_user("vehicle", None, Vec::new()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TypeExists);
    }

    #[test]
    fn parent_must_exist_first() {
        let mut registry = TypeRegistry::new();
        let err = registry.register_user("bike", Some("vehicle"), Vec::new()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownType);
    }
}
