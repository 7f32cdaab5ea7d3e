//! The parser's output contract (§6, external collaborator): a tagged
//! union with one case per statement kind, fed to [`crate::statement`] by
//! whatever lexer/parser embeds this crate. No lexing or parsing happens
//! here — these are plain data types plus a few ergonomic constructors,
//! the shape a hand-written recursive-descent parser would produce.

use crate::expr::{AggKind, ArithOp, CmpOp, ConjType};
use crate::value::{AttrType, DistanceType, Value};
use serde::{Deserialize, Serialize};

/// One FROM-clause relation: `name [AS alias]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationRef {
    pub name: String,
    pub alias: Option<String>,
}

impl RelationRef {
    pub fn new(name: &str, alias: Option<&str>) -> Self {
        Self { name: name.to_string(), alias: alias.map(str::to_string) }
    }
}

/// Pre-bind expression tree, as produced by the parser. [`crate::binder`]
/// turns this into a resolved [`crate::expr::Expr`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ExprAst {
    Star,
    Field { table: Option<String>, name: String },
    Value(Value),
    ValueList(Vec<ExprAst>),
    Cast(Box<ExprAst>, AttrType),
    Neg(Box<ExprAst>),
    Arith(ArithOp, Box<ExprAst>, Box<ExprAst>),
    /// Unbound aggregate call; `None` argument means `COUNT(*)`.
    Agg(AggKind, Option<Box<ExprAst>>),
    Comparison { op: CmpOp, left: Box<ExprAst>, right: Option<Box<ExprAst>> },
    Conjunction(ConjType, Vec<ExprAst>),
    Like { inner: Box<ExprAst>, pattern: String, negated: bool },
    VectorDistance { kind: DistanceType, left: Box<ExprAst>, right: Box<ExprAst> },
    IsNull(Box<ExprAst>),
    IsNotNull(Box<ExprAst>),
    IsTrue(Box<ExprAst>),
    IsFalse(Box<ExprAst>),
    Subquery(Box<SelectAst>),
    Placeholder,
}

impl ExprAst {
    pub fn field(name: &str) -> Self {
        ExprAst::Field { table: None, name: name.to_string() }
    }
    pub fn qfield(table: &str, name: &str) -> Self {
        ExprAst::Field { table: Some(table.to_string()), name: name.to_string() }
    }
    pub fn int(i: i32) -> Self {
        ExprAst::Value(Value::Int(i))
    }
    pub fn str_lit(s: &str) -> Self {
        ExprAst::Value(Value::Chars(std::rc::Rc::new(s.to_string())))
    }
    pub fn eq(left: ExprAst, right: ExprAst) -> Self {
        ExprAst::Comparison { op: CmpOp::Eq, left: Box::new(left), right: Some(Box::new(right)) }
    }
    pub fn cmp(op: CmpOp, left: ExprAst, right: ExprAst) -> Self {
        ExprAst::Comparison { op, left: Box::new(left), right: Some(Box::new(right)) }
    }
    pub fn and(children: Vec<ExprAst>) -> Self {
        ExprAst::Conjunction(ConjType::And, children)
    }
}

/// A single projection item: expression plus an optional output alias.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectItem {
    pub expr: ExprAst,
    pub alias: Option<String>,
}

impl SelectItem {
    pub fn new(expr: ExprAst, alias: Option<&str>) -> Self {
        Self { expr, alias: alias.map(str::to_string) }
    }
}

/// One ORDER BY key: expression plus `DESC` flag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderByItem {
    pub expr: ExprAst,
    pub desc: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SelectAst {
    pub relations: Vec<RelationRef>,
    pub expressions: Vec<SelectItem>,
    pub conditions: Vec<ExprAst>,
    pub group_by: Vec<ExprAst>,
    pub havings: Vec<ExprAst>,
    pub order_by: Vec<OrderByItem>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct InsertAst {
    pub table: String,
    pub columns: Option<Vec<String>>,
    pub rows: Vec<Vec<ExprAst>>,
}

#[derive(Debug, Clone)]
pub struct DeleteAst {
    pub table: String,
    pub alias: Option<String>,
    pub conditions: Vec<ExprAst>,
}

#[derive(Debug, Clone)]
pub struct UpdateAst {
    pub table: String,
    pub alias: Option<String>,
    pub assignments: Vec<(String, ExprAst)>,
    pub conditions: Vec<ExprAst>,
}

#[derive(Debug, Clone)]
pub struct ColumnDef {
    pub name: String,
    pub attr_type: AttrType,
    /// Declared length for `CHARS`; ignored for fixed-width types.
    pub len: Option<usize>,
    pub nullable: bool,
    pub vector_dim: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct CreateTableAst {
    pub table: String,
    pub columns: Vec<ColumnDef>,
}

#[derive(Debug, Clone)]
pub struct CreateViewAst {
    pub name: String,
    pub select: SelectAst,
    pub definition_sql: String,
}

#[derive(Debug, Clone)]
pub struct CreateIndexAst {
    pub name: String,
    pub table: String,
    pub columns: Vec<String>,
    pub unique: bool,
}

#[derive(Debug, Clone)]
pub struct CreateVectorIndexAst {
    pub name: String,
    pub table: String,
    pub column: String,
    pub distance: DistanceType,
    pub lists: u32,
    pub probes: u32,
}

#[derive(Debug, Clone)]
pub struct LoadDataAst {
    pub table: String,
    pub path: String,
}

/// One case per statement kind (§4.3), the full tagged union the external
/// parser hands to [`crate::statement::Statement::create`].
#[derive(Debug, Clone)]
pub enum SqlNode {
    Select(SelectAst),
    Insert(InsertAst),
    Delete(DeleteAst),
    Update(UpdateAst),
    CreateTable(CreateTableAst),
    CreateView(CreateViewAst),
    CreateIndex(CreateIndexAst),
    CreateVectorIndex(CreateVectorIndexAst),
    DropTable(String),
    DropIndex { table: String, name: String },
    DropVectorIndex { table: String, name: String },
    Explain(Box<SqlNode>),
    Calc(Vec<ExprAst>),
    DescTable(String),
    ShowTables,
    Begin,
    Commit,
    Rollback,
    Exit,
    Help,
    SetVariable { name: String, value: String },
    LoadData(LoadDataAst),
}
