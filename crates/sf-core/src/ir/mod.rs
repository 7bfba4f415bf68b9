//! Arena IR shared by the structured input and the lowered CFG.
//!
//! A [`Function`] owns every op, block, region and value; nodes refer to each other through
//! the index newtypes below and record their parent explicitly. Erased nodes stay in the
//! arena with `live == false` and are detached from every region.

pub mod builder;
pub mod edit;
pub mod kind;
pub mod pretty;
pub mod verify;
pub mod walk;

pub use builder::FunctionBuilder;
pub use edit::CloneMap;
pub use kind::{Callee, OpKind};
pub use verify::verify_lowered;

use crate::rtti::RttiTable;
use crate::span::Span;
use crate::ty::Ty;
use serde::{Deserialize, Serialize};

macro_rules! impl_index {
    ($($name:ident),*) => {
        $(
            impl $name {
                pub fn index(self) -> usize {
                    self.0 as usize
                }
            }
        )*
    };
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, derive_more::Display,
)]
#[display("op{_0}")]
pub struct OpId(pub u32);

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, derive_more::Display,
)]
#[display("bb{_0}")]
pub struct BlockId(pub u32);

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, derive_more::Display,
)]
#[display("region{_0}")]
pub struct RegionId(pub u32);

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, derive_more::Display,
)]
#[display("%{_0}")]
pub struct ValueId(pub u32);

impl_index!(OpId, BlockId, RegionId, ValueId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValueDef {
    OpResult { op: OpId, index: u32 },
    BlockArg { block: BlockId, index: u32 },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValueData {
    pub ty: Ty,
    pub def: ValueDef,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpData {
    pub kind: OpKind,
    pub operands: Vec<ValueId>,
    pub results: Vec<ValueId>,
    pub regions: Vec<RegionId>,
    pub parent: Option<BlockId>,
    pub span: Option<Span>,
    pub live: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockData {
    pub ops: Vec<OpId>,
    pub args: Vec<ValueId>,
    pub parent: Option<RegionId>,
    pub live: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionData {
    pub blocks: Vec<BlockId>,
    /// `None` only for the function body.
    pub parent: Option<OpId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionSig {
    pub params: Vec<Ty>,
    pub ret: Ty,
}

impl FunctionSig {
    pub fn new(params: Vec<Ty>, ret: Ty) -> Self {
        Self { params, ret }
    }

    pub fn void() -> Self {
        Self::new(Vec::new(), Ty::Void)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Function {
    pub name: String,
    pub sig: FunctionSig,
    pub ops: Vec<OpData>,
    pub blocks: Vec<BlockData>,
    pub regions: Vec<RegionData>,
    pub values: Vec<ValueData>,
    pub body: RegionId,
}

impl Function {
    /// A function whose body holds one entry block carrying the parameters as block arguments.
    pub fn new(name: impl Into<String>, sig: FunctionSig) -> Self {
        let mut func = Function {
            name: name.into(),
            sig,
            ops: Vec::new(),
            blocks: Vec::new(),
            regions: Vec::new(),
            values: Vec::new(),
            body: RegionId(0),
        };
        func.body = func.new_region(None);
        let params = func.sig.params.clone();
        let entry = func.new_block(&params);
        func.append_block(func.body, entry);
        func
    }

    pub fn op(&self, id: OpId) -> &OpData {
        &self.ops[id.index()]
    }

    pub fn op_mut(&mut self, id: OpId) -> &mut OpData {
        &mut self.ops[id.index()]
    }

    pub fn block(&self, id: BlockId) -> &BlockData {
        &self.blocks[id.index()]
    }

    pub fn block_mut(&mut self, id: BlockId) -> &mut BlockData {
        &mut self.blocks[id.index()]
    }

    pub fn region(&self, id: RegionId) -> &RegionData {
        &self.regions[id.index()]
    }

    pub fn region_mut(&mut self, id: RegionId) -> &mut RegionData {
        &mut self.regions[id.index()]
    }

    pub fn value(&self, id: ValueId) -> &ValueData {
        &self.values[id.index()]
    }

    pub fn value_ty(&self, id: ValueId) -> &Ty {
        &self.values[id.index()].ty
    }

    pub fn kind(&self, id: OpId) -> &OpKind {
        &self.ops[id.index()].kind
    }

    pub fn entry_block(&self) -> Option<BlockId> {
        self.region(self.body).blocks.first().copied()
    }

    pub fn params(&self) -> Vec<ValueId> {
        self.entry_block()
            .map(|entry| self.block(entry).args.clone())
            .unwrap_or_default()
    }

    pub fn result(&self, op: OpId) -> Option<ValueId> {
        self.op(op).results.first().copied()
    }

    /// The top-level blocks of the function body, in layout order.
    pub fn body_blocks(&self) -> &[BlockId] {
        &self.region(self.body).blocks
    }

    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Module {
    pub name: String,
    pub functions: Vec<Function>,
    pub rtti: RttiTable,
}

impl Module {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn function(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|func| func.name == name)
    }

    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
