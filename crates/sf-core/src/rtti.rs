//! Runtime type identity used by typed catch clauses.

use crate::ty::Ty;
use serde::{Deserialize, Serialize};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, derive_more::Display,
)]
#[display("type#{_0}")]
pub struct TypeToken(pub u32);

/// Resolves a static type to the token the runtime compares exception objects against.
pub trait TypeInfoResolver: Send + Sync {
    fn type_token(&self, ty: &Ty) -> Option<TypeToken>;
}

/// Module-level table filled by the type subsystem before lowering.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RttiTable {
    types: Vec<Ty>,
}

impl RttiTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `ty`, returning the existing token when it is already known.
    pub fn register(&mut self, ty: Ty) -> TypeToken {
        if let Some(token) = self.type_token(&ty) {
            return token;
        }
        self.types.push(ty);
        TypeToken((self.types.len() - 1) as u32)
    }

    pub fn ty(&self, token: TypeToken) -> Option<&Ty> {
        self.types.get(token.0 as usize)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl TypeInfoResolver for RttiTable {
    fn type_token(&self, ty: &Ty) -> Option<TypeToken> {
        self.types
            .iter()
            .position(|known| known == ty)
            .map(|index| TypeToken(index as u32))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_is_stable() {
        let mut table = RttiTable::new();
        let err = table.register(Ty::Named("Error".into()));
        let num = table.register(Ty::F64);
        assert_eq!(table.register(Ty::Named("Error".into())), err);
        assert_ne!(err, num);
        assert_eq!(table.ty(num), Some(&Ty::F64));
        assert_eq!(table.type_token(&Ty::Bool), None);
    }
}
