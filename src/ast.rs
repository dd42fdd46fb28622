use std::sync::Arc;

use serde::Serialize;

/// 1-based source position. The filename is shared between all nodes of a
/// compilation via `Arc`, so cloning locations stays cheap.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Loc {
    pub file: Arc<str>,
    pub line: usize,
    pub column: usize,
}

impl Loc {
    pub fn new(file: Arc<str>, line: usize, column: usize) -> Self {
        Self { file, line, column }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Program {
    pub body: Vec<Stmt>,
    pub loc: Loc,
}

// --- Statements and block declarations ---

#[derive(Debug, Clone, Serialize)]
pub enum Stmt {
    // Core dialect blocks
    Server(ServerBlock),
    Browser(BrowserBlock),
    Shared(SharedBlock),

    // Plugin-owned blocks
    Form(FormDeclaration),
    Security(SecurityBlock),
    Deploy(DeployBlock),
    Cli(CliBlock),
    Edge(EdgeBlock),
    Concurrent(ConcurrentBlock),
    Bench(BenchBlock),

    // Server-side declarations
    Route(RouteDeclaration),
    RouteGroup(RouteGroup),
    Middleware(MiddlewareDeclaration),
    WebSocket(WebSocketDeclaration),
    Db(DbDeclaration),
    ServerConfig(ServerConfigDeclaration),

    // Browser-side declarations
    State(StateDeclaration),
    ComputedDecl(ComputedDeclaration),
    Effect(EffectDeclaration),
    Component(ComponentDeclaration),
    Store(StoreDeclaration),
    Style(StyleDeclaration),

    // General statements
    Assignment(Assignment),
    VarDecl(VarDeclaration),
    LetDestructure(LetDestructure),
    Function(FunctionDeclaration),
    TypeDecl(TypeDeclaration),
    If(IfStmt),
    For(ForStmt),
    While(WhileStmt),
    TryCatch(TryCatchStmt),
    Return(ReturnStmt),
    Break(Loc),
    Continue(Loc),
    Block(BlockStmt),
    Compound(CompoundAssignment),
    Import(ImportDeclaration),
    Export(ExportDeclaration),
    Expr(ExprStmt),
}

impl Stmt {
    pub fn loc(&self) -> &Loc {
        match self {
            Stmt::Server(n) => &n.loc,
            Stmt::Browser(n) => &n.loc,
            Stmt::Shared(n) => &n.loc,
            Stmt::Form(n) => &n.loc,
            Stmt::Security(n) => &n.loc,
            Stmt::Deploy(n) => &n.loc,
            Stmt::Cli(n) => &n.loc,
            Stmt::Edge(n) => &n.loc,
            Stmt::Concurrent(n) => &n.loc,
            Stmt::Bench(n) => &n.loc,
            Stmt::Route(n) => &n.loc,
            Stmt::RouteGroup(n) => &n.loc,
            Stmt::Middleware(n) => &n.loc,
            Stmt::WebSocket(n) => &n.loc,
            Stmt::Db(n) => &n.loc,
            Stmt::ServerConfig(n) => &n.loc,
            Stmt::State(n) => &n.loc,
            Stmt::ComputedDecl(n) => &n.loc,
            Stmt::Effect(n) => &n.loc,
            Stmt::Component(n) => &n.loc,
            Stmt::Store(n) => &n.loc,
            Stmt::Style(n) => &n.loc,
            Stmt::Assignment(n) => &n.loc,
            Stmt::VarDecl(n) => &n.loc,
            Stmt::LetDestructure(n) => &n.loc,
            Stmt::Function(n) => &n.loc,
            Stmt::TypeDecl(n) => &n.loc,
            Stmt::If(n) => &n.loc,
            Stmt::For(n) => &n.loc,
            Stmt::While(n) => &n.loc,
            Stmt::TryCatch(n) => &n.loc,
            Stmt::Return(n) => &n.loc,
            Stmt::Break(loc) => loc,
            Stmt::Continue(loc) => loc,
            Stmt::Block(n) => &n.loc,
            Stmt::Compound(n) => &n.loc,
            Stmt::Import(n) => &n.loc,
            Stmt::Export(n) => &n.loc,
            Stmt::Expr(n) => &n.loc,
        }
    }

    /// Discriminant name used by the analyzer's plugin visitor table.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Stmt::Server(_) => "ServerBlock",
            Stmt::Browser(_) => "BrowserBlock",
            Stmt::Shared(_) => "SharedBlock",
            Stmt::Form(_) => "FormDeclaration",
            Stmt::Security(_) => "SecurityBlock",
            Stmt::Deploy(_) => "DeployBlock",
            Stmt::Cli(_) => "CliBlock",
            Stmt::Edge(_) => "EdgeBlock",
            Stmt::Concurrent(_) => "ConcurrentBlock",
            Stmt::Bench(_) => "BenchBlock",
            Stmt::Route(_) => "RouteDeclaration",
            Stmt::RouteGroup(_) => "RouteGroup",
            Stmt::Middleware(_) => "MiddlewareDeclaration",
            Stmt::WebSocket(_) => "WebSocketDeclaration",
            Stmt::Db(_) => "DbDeclaration",
            Stmt::ServerConfig(_) => "ServerConfigDeclaration",
            Stmt::State(_) => "StateDeclaration",
            Stmt::ComputedDecl(_) => "ComputedDeclaration",
            Stmt::Effect(_) => "EffectDeclaration",
            Stmt::Component(_) => "ComponentDeclaration",
            Stmt::Store(_) => "StoreDeclaration",
            Stmt::Style(_) => "StyleDeclaration",
            Stmt::Assignment(_) => "Assignment",
            Stmt::VarDecl(_) => "VarDeclaration",
            Stmt::LetDestructure(_) => "LetDestructure",
            Stmt::Function(_) => "FunctionDeclaration",
            Stmt::TypeDecl(_) => "TypeDeclaration",
            Stmt::If(_) => "If",
            Stmt::For(_) => "For",
            Stmt::While(_) => "While",
            Stmt::TryCatch(_) => "TryCatch",
            Stmt::Return(_) => "Return",
            Stmt::Break(_) => "Break",
            Stmt::Continue(_) => "Continue",
            Stmt::Block(_) => "Block",
            Stmt::Compound(_) => "CompoundAssignment",
            Stmt::Import(_) => "ImportDeclaration",
            Stmt::Export(_) => "ExportDeclaration",
            Stmt::Expr(_) => "ExpressionStatement",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ServerBlock {
    pub name: Option<String>,
    pub body: Vec<Stmt>,
    pub loc: Loc,
}

#[derive(Debug, Clone, Serialize)]
pub struct BrowserBlock {
    pub body: Vec<Stmt>,
    pub loc: Loc,
}

#[derive(Debug, Clone, Serialize)]
pub struct SharedBlock {
    pub body: Vec<Stmt>,
    pub loc: Loc,
}

#[derive(Debug, Clone, Serialize)]
pub struct RouteDeclaration {
    pub method: String,
    pub path: String,
    pub handler: Expr,
    pub body_type: Option<TypeAnnotation>,
    pub loc: Loc,
}

#[derive(Debug, Clone, Serialize)]
pub struct RouteGroup {
    pub prefix: String,
    pub body: Vec<Stmt>,
    pub loc: Loc,
}

#[derive(Debug, Clone, Serialize)]
pub struct MiddlewareDeclaration {
    pub handler: Expr,
    pub loc: Loc,
}

#[derive(Debug, Clone, Serialize)]
pub struct WebSocketDeclaration {
    pub path: String,
    pub body: Vec<Stmt>,
    pub loc: Loc,
}

#[derive(Debug, Clone, Serialize)]
pub struct DbDeclaration {
    pub name: Option<String>,
    pub config: Option<Expr>,
    pub loc: Loc,
}

/// Server-scoped configuration declarations that share one statement shape:
/// `cors { ... }`, `auth { ... }`, `schedule "spec" handler`, `upload`,
/// `session { ... }`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ServerConfigKind {
    Cors,
    Auth,
    Schedule,
    Upload,
    Session,
}

impl ServerConfigKind {
    pub fn keyword(&self) -> &'static str {
        match self {
            ServerConfigKind::Cors => "cors",
            ServerConfigKind::Auth => "auth",
            ServerConfigKind::Schedule => "schedule",
            ServerConfigKind::Upload => "upload",
            ServerConfigKind::Session => "session",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ServerConfigDeclaration {
    pub kind: ServerConfigKind,
    pub args: Vec<Expr>,
    pub loc: Loc,
}

#[derive(Debug, Clone, Serialize)]
pub struct StateDeclaration {
    pub name: String,
    pub ty: Option<TypeAnnotation>,
    pub init: Expr,
    pub loc: Loc,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComputedDeclaration {
    pub name: String,
    pub body: Expr,
    pub loc: Loc,
}

#[derive(Debug, Clone, Serialize)]
pub struct EffectDeclaration {
    pub body: Vec<Stmt>,
    pub loc: Loc,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComponentDeclaration {
    pub name: String,
    pub params: Vec<Param>,
    pub body: Vec<Stmt>,
    pub docstring: Option<String>,
    pub loc: Loc,
}

#[derive(Debug, Clone, Serialize)]
pub struct StoreDeclaration {
    pub name: String,
    pub body: Vec<Stmt>,
    pub loc: Loc,
}

/// Raw CSS captured by the lexer from a `style { ... }` block.
#[derive(Debug, Clone, Serialize)]
pub struct StyleDeclaration {
    pub css: String,
    pub loc: Loc,
}

// --- Form dialect ---

#[derive(Debug, Clone, Serialize)]
pub struct FormDeclaration {
    pub name: String,
    pub members: Vec<FormMember>,
    pub loc: Loc,
}

#[derive(Debug, Clone, Serialize)]
pub enum FormMember {
    Field(FormFieldDeclaration),
    Group(FormGroup),
    Array(FormArray),
    Steps(StepsDeclaration),
}

#[derive(Debug, Clone, Serialize)]
pub struct FormFieldDeclaration {
    pub name: String,
    pub ty: Option<TypeAnnotation>,
    pub validators: Vec<ValidatorCall>,
    pub loc: Loc,
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidatorCall {
    pub name: String,
    pub args: Vec<Expr>,
    pub loc: Loc,
}

#[derive(Debug, Clone, Serialize)]
pub struct FormGroup {
    pub name: String,
    pub members: Vec<FormMember>,
    pub loc: Loc,
}

#[derive(Debug, Clone, Serialize)]
pub struct FormArray {
    pub name: String,
    pub members: Vec<FormMember>,
    pub loc: Loc,
}

#[derive(Debug, Clone, Serialize)]
pub struct StepsDeclaration {
    pub steps: Vec<FormStep>,
    pub loc: Loc,
}

#[derive(Debug, Clone, Serialize)]
pub struct FormStep {
    pub name: String,
    pub members: Vec<StepMemberRef>,
    pub loc: Loc,
}

#[derive(Debug, Clone, Serialize)]
pub struct StepMemberRef {
    pub name: String,
    pub loc: Loc,
}

// --- Security, deploy, cli, edge, concurrent, bench dialects ---

#[derive(Debug, Clone, Serialize)]
pub struct SecurityBlock {
    pub rules: Vec<SecurityRule>,
    pub loc: Loc,
}

#[derive(Debug, Clone, Serialize)]
pub struct SecurityRule {
    pub name: String,
    pub args: Vec<Expr>,
    pub loc: Loc,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeployBlock {
    pub fields: Vec<DeployField>,
    pub loc: Loc,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeployField {
    pub name: String,
    pub value: Expr,
    pub loc: Loc,
}

#[derive(Debug, Clone, Serialize)]
pub struct CliBlock {
    pub name: Option<String>,
    pub commands: Vec<CliCommand>,
    pub loc: Loc,
}

#[derive(Debug, Clone, Serialize)]
pub struct CliCommand {
    pub name: String,
    pub params: Vec<Param>,
    pub body: Vec<Stmt>,
    pub loc: Loc,
}

#[derive(Debug, Clone, Serialize)]
pub struct EdgeBlock {
    pub body: Vec<EdgeDeclaration>,
    pub loc: Loc,
}

#[derive(Debug, Clone, Serialize)]
pub enum EdgeDeclaration {
    Producer { queue: String, loc: Loc },
    Consumer { queue: String, handler: Expr, loc: Loc },
    Stmt(Stmt),
}

#[derive(Debug, Clone, Serialize)]
pub struct ConcurrentBlock {
    pub body: Vec<Stmt>,
    pub loc: Loc,
}

#[derive(Debug, Clone, Serialize)]
pub struct BenchBlock {
    pub name: Option<String>,
    pub body: Vec<Stmt>,
    pub loc: Loc,
}

// --- General statements ---

#[derive(Debug, Clone, Serialize)]
pub struct Assignment {
    pub target: Expr,
    pub value: Expr,
    pub loc: Loc,
}

#[derive(Debug, Clone, Serialize)]
pub struct VarDeclaration {
    pub name: String,
    pub ty: Option<TypeAnnotation>,
    pub value: Expr,
    pub loc: Loc,
}

#[derive(Debug, Clone, Serialize)]
pub enum DestructurePattern {
    Object { fields: Vec<ObjectDestructureField>, loc: Loc },
    Array { elements: Vec<Option<String>>, loc: Loc },
}

#[derive(Debug, Clone, Serialize)]
pub struct ObjectDestructureField {
    pub key: String,
    pub alias: Option<String>,
    pub loc: Loc,
}

#[derive(Debug, Clone, Serialize)]
pub struct LetDestructure {
    pub pattern: DestructurePattern,
    pub value: Expr,
    pub loc: Loc,
}

impl DestructurePattern {
    /// Names bound by this pattern, in source order.
    pub fn bound_names(&self) -> Vec<(String, Loc)> {
        match self {
            DestructurePattern::Object { fields, .. } => fields
                .iter()
                .map(|f| {
                    let name = f.alias.clone().unwrap_or_else(|| f.key.clone());
                    (name, f.loc.clone())
                })
                .collect(),
            DestructurePattern::Array { elements, loc } => elements
                .iter()
                .flatten()
                .map(|name| (name.clone(), loc.clone()))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Param {
    pub name: String,
    pub ty: Option<TypeAnnotation>,
    pub default: Option<Expr>,
    pub loc: Loc,
}

#[derive(Debug, Clone, Serialize)]
pub struct FunctionDeclaration {
    pub name: String,
    pub params: Vec<Param>,
    pub return_type: Option<TypeAnnotation>,
    pub body: Vec<Stmt>,
    pub docstring: Option<String>,
    pub loc: Loc,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecordField {
    pub name: String,
    pub ty: TypeAnnotation,
    pub loc: Loc,
}

#[derive(Debug, Clone, Serialize)]
pub struct VariantDef {
    pub name: String,
    pub fields: Vec<RecordField>,
    pub loc: Loc,
}

#[derive(Debug, Clone, Serialize)]
pub enum TypeDeclKind {
    Record(Vec<RecordField>),
    Union(Vec<VariantDef>),
}

#[derive(Debug, Clone, Serialize)]
pub struct TypeDeclaration {
    pub name: String,
    pub type_params: Vec<String>,
    pub kind: TypeDeclKind,
    pub loc: Loc,
}

#[derive(Debug, Clone, Serialize)]
pub struct IfStmt {
    pub branches: Vec<(Expr, Vec<Stmt>)>,
    pub else_body: Option<Vec<Stmt>>,
    pub loc: Loc,
}

/// Loop binding: `for x in ...` or `for k, v in ...`.
#[derive(Debug, Clone, Serialize)]
pub struct ForBinding {
    pub names: Vec<String>,
    pub loc: Loc,
}

#[derive(Debug, Clone, Serialize)]
pub struct ForStmt {
    pub binding: ForBinding,
    pub iterable: Expr,
    pub body: Vec<Stmt>,
    pub loc: Loc,
}

#[derive(Debug, Clone, Serialize)]
pub struct WhileStmt {
    pub condition: Expr,
    pub body: Vec<Stmt>,
    pub loc: Loc,
}

#[derive(Debug, Clone, Serialize)]
pub struct TryCatchStmt {
    pub body: Vec<Stmt>,
    pub catch_name: Option<String>,
    pub catch_body: Vec<Stmt>,
    pub finally_body: Option<Vec<Stmt>>,
    pub loc: Loc,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReturnStmt {
    pub value: Option<Expr>,
    pub loc: Loc,
}

#[derive(Debug, Clone, Serialize)]
pub struct BlockStmt {
    pub body: Vec<Stmt>,
    pub loc: Loc,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompoundAssignment {
    pub target: Expr,
    pub op: BinaryOp,
    pub value: Expr,
    pub loc: Loc,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportName {
    pub name: String,
    pub alias: Option<String>,
    pub loc: Loc,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportDeclaration {
    pub names: Vec<ImportName>,
    pub source: String,
    pub loc: Loc,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExportDeclaration {
    pub stmt: Box<Stmt>,
    pub loc: Loc,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExprStmt {
    pub expr: Expr,
    pub loc: Loc,
}

// --- Expressions ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
}

impl BinaryOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Pow => "**",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LogicalOp {
    And,
    Or,
    NullishCoalesce,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ComparisonOp {
    Eq,
    NotEq,
    Less,
    LessEq,
    Greater,
    GreaterEq,
}

impl ComparisonOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComparisonOp::Eq => "==",
            ComparisonOp::NotEq => "!=",
            ComparisonOp::Less => "<",
            ComparisonOp::LessEq => "<=",
            ComparisonOp::Greater => ">",
            ComparisonOp::GreaterEq => ">=",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub enum Expr {
    Nil(Loc),
    Bool(BoolLiteral),
    Int(IntLiteral),
    Float(FloatLiteral),
    Str(StringLiteral),
    Template(TemplateLiteral),
    Regex(RegexLiteral),
    Ident(Identifier),
    Binary(Box<BinaryExpression>),
    Unary(Box<UnaryExpression>),
    Logical(Box<LogicalExpression>),
    Chained(Box<ChainedComparison>),
    Membership(Box<MembershipExpression>),
    Call(Box<CallExpression>),
    Member(Box<MemberExpression>),
    Index(Box<IndexExpression>),
    OptionalChain(Box<OptionalChainExpression>),
    Pipe(Box<PipeExpression>),
    Lambda(Box<LambdaExpression>),
    Match(Box<MatchExpression>),
    Array(ArrayLiteral),
    Object(ObjectLiteral),
    ListComp(Box<ListComprehension>),
    DictComp(Box<DictComprehension>),
    Range(Box<RangeExpression>),
    Slice(Box<SliceExpression>),
    Spread(Box<SpreadExpression>),
    Propagate(Box<PropagateExpression>),
    IfExpr(Box<IfExpression>),
    Jsx(Box<JsxElement>),
    JsxFragment(Box<JsxFragment>),
}

impl Expr {
    pub fn loc(&self) -> &Loc {
        match self {
            Expr::Nil(loc) => loc,
            Expr::Bool(n) => &n.loc,
            Expr::Int(n) => &n.loc,
            Expr::Float(n) => &n.loc,
            Expr::Str(n) => &n.loc,
            Expr::Template(n) => &n.loc,
            Expr::Regex(n) => &n.loc,
            Expr::Ident(n) => &n.loc,
            Expr::Binary(n) => &n.loc,
            Expr::Unary(n) => &n.loc,
            Expr::Logical(n) => &n.loc,
            Expr::Chained(n) => &n.loc,
            Expr::Membership(n) => &n.loc,
            Expr::Call(n) => &n.loc,
            Expr::Member(n) => &n.loc,
            Expr::Index(n) => &n.loc,
            Expr::OptionalChain(n) => &n.loc,
            Expr::Pipe(n) => &n.loc,
            Expr::Lambda(n) => &n.loc,
            Expr::Match(n) => &n.loc,
            Expr::Array(n) => &n.loc,
            Expr::Object(n) => &n.loc,
            Expr::ListComp(n) => &n.loc,
            Expr::DictComp(n) => &n.loc,
            Expr::Range(n) => &n.loc,
            Expr::Slice(n) => &n.loc,
            Expr::Spread(n) => &n.loc,
            Expr::Propagate(n) => &n.loc,
            Expr::IfExpr(n) => &n.loc,
            Expr::Jsx(n) => &n.loc,
            Expr::JsxFragment(n) => &n.loc,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BoolLiteral {
    pub value: bool,
    pub loc: Loc,
}

#[derive(Debug, Clone, Serialize)]
pub struct IntLiteral {
    pub value: i64,
    pub loc: Loc,
}

#[derive(Debug, Clone, Serialize)]
pub struct FloatLiteral {
    pub value: f64,
    pub loc: Loc,
}

#[derive(Debug, Clone, Serialize)]
pub struct StringLiteral {
    pub value: String,
    pub loc: Loc,
}

#[derive(Debug, Clone, Serialize)]
pub enum TemplatePiece {
    Text(String),
    Expr(Expr),
}

#[derive(Debug, Clone, Serialize)]
pub struct TemplateLiteral {
    pub parts: Vec<TemplatePiece>,
    pub loc: Loc,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegexLiteral {
    pub pattern: String,
    pub flags: String,
    pub loc: Loc,
}

#[derive(Debug, Clone, Serialize)]
pub struct Identifier {
    pub name: String,
    pub loc: Loc,
}

#[derive(Debug, Clone, Serialize)]
pub struct BinaryExpression {
    pub op: BinaryOp,
    pub left: Expr,
    pub right: Expr,
    pub loc: Loc,
}

#[derive(Debug, Clone, Serialize)]
pub struct UnaryExpression {
    pub op: UnaryOp,
    pub operand: Expr,
    pub loc: Loc,
}

#[derive(Debug, Clone, Serialize)]
pub struct LogicalExpression {
    pub op: LogicalOp,
    pub left: Expr,
    pub right: Expr,
    pub loc: Loc,
}

/// `a < x < b` kept as one node; lowered to a conjunction semantically.
#[derive(Debug, Clone, Serialize)]
pub struct ChainedComparison {
    pub operands: Vec<Expr>,
    pub ops: Vec<ComparisonOp>,
    pub loc: Loc,
}

#[derive(Debug, Clone, Serialize)]
pub struct MembershipExpression {
    pub item: Expr,
    pub collection: Expr,
    pub negated: bool,
    pub loc: Loc,
}

#[derive(Debug, Clone, Serialize)]
pub enum CallArg {
    Positional(Expr),
    Named { name: String, value: Expr, loc: Loc },
    Spread(Expr),
}

#[derive(Debug, Clone, Serialize)]
pub struct CallExpression {
    pub callee: Expr,
    pub args: Vec<CallArg>,
    pub loc: Loc,
}

#[derive(Debug, Clone, Serialize)]
pub struct MemberExpression {
    pub object: Expr,
    pub property: String,
    pub loc: Loc,
}

#[derive(Debug, Clone, Serialize)]
pub struct IndexExpression {
    pub object: Expr,
    pub index: Expr,
    pub loc: Loc,
}

#[derive(Debug, Clone, Serialize)]
pub struct OptionalChainExpression {
    pub object: Expr,
    pub property: String,
    pub loc: Loc,
}

/// `a |> f(b)`; sugar for `f(a, b)`, kept explicit in the tree.
#[derive(Debug, Clone, Serialize)]
pub struct PipeExpression {
    pub value: Expr,
    pub call: Expr,
    pub loc: Loc,
}

#[derive(Debug, Clone, Serialize)]
pub enum LambdaBody {
    Expr(Expr),
    Block(Vec<Stmt>),
}

#[derive(Debug, Clone, Serialize)]
pub struct LambdaExpression {
    pub params: Vec<Param>,
    pub body: LambdaBody,
    pub loc: Loc,
}

#[derive(Debug, Clone, Serialize)]
pub enum MatchBody {
    Expr(Expr),
    Block(Vec<Stmt>),
}

#[derive(Debug, Clone, Serialize)]
pub struct MatchArm {
    pub pattern: Pattern,
    pub guard: Option<Expr>,
    pub body: MatchBody,
    pub loc: Loc,
}

#[derive(Debug, Clone, Serialize)]
pub struct MatchExpression {
    pub subject: Expr,
    pub arms: Vec<MatchArm>,
    pub loc: Loc,
}

#[derive(Debug, Clone, Serialize)]
pub struct ArrayLiteral {
    pub elements: Vec<Expr>,
    pub loc: Loc,
}

#[derive(Debug, Clone, Serialize)]
pub enum ObjectKey {
    Name(String),
    Str(String),
}

#[derive(Debug, Clone, Serialize)]
pub enum ObjectEntry {
    Property { key: ObjectKey, value: Expr, loc: Loc },
    Shorthand { name: String, loc: Loc },
    Spread { value: Expr, loc: Loc },
}

#[derive(Debug, Clone, Serialize)]
pub struct ObjectLiteral {
    pub entries: Vec<ObjectEntry>,
    pub loc: Loc,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListComprehension {
    pub element: Expr,
    pub binding: ForBinding,
    pub iterable: Expr,
    pub condition: Option<Expr>,
    pub loc: Loc,
}

#[derive(Debug, Clone, Serialize)]
pub struct DictComprehension {
    pub key: Expr,
    pub value: Expr,
    pub binding: ForBinding,
    pub iterable: Expr,
    pub condition: Option<Expr>,
    pub loc: Loc,
}

#[derive(Debug, Clone, Serialize)]
pub struct RangeExpression {
    pub start: Expr,
    pub end: Expr,
    pub inclusive: bool,
    pub loc: Loc,
}

#[derive(Debug, Clone, Serialize)]
pub struct SliceExpression {
    pub object: Expr,
    pub start: Option<Expr>,
    pub stop: Option<Expr>,
    pub step: Option<Expr>,
    pub loc: Loc,
}

#[derive(Debug, Clone, Serialize)]
pub struct SpreadExpression {
    pub value: Expr,
    pub loc: Loc,
}

/// `expr?`: unwrap-or-propagate on Result/Option shaped values.
#[derive(Debug, Clone, Serialize)]
pub struct PropagateExpression {
    pub value: Expr,
    pub loc: Loc,
}

#[derive(Debug, Clone, Serialize)]
pub struct IfExpression {
    pub branches: Vec<(Expr, Vec<Stmt>)>,
    pub else_body: Option<Vec<Stmt>>,
    pub loc: Loc,
}

// --- Patterns ---

#[derive(Debug, Clone, Serialize)]
pub enum Pattern {
    Wildcard { loc: Loc },
    Literal { value: Expr, loc: Loc },
    Range { start: Expr, end: Expr, inclusive: bool, loc: Loc },
    Binding { name: String, loc: Loc },
    Variant { name: String, fields: Vec<Pattern>, loc: Loc },
    Tuple { elements: Vec<Pattern>, loc: Loc },
    Record { fields: Vec<(String, Option<Pattern>)>, loc: Loc },
}

impl Pattern {
    pub fn loc(&self) -> &Loc {
        match self {
            Pattern::Wildcard { loc }
            | Pattern::Literal { loc, .. }
            | Pattern::Range { loc, .. }
            | Pattern::Binding { loc, .. }
            | Pattern::Variant { loc, .. }
            | Pattern::Tuple { loc, .. }
            | Pattern::Record { loc, .. } => loc,
        }
    }

    /// Names bound by this pattern, in source order.
    pub fn bound_names(&self) -> Vec<(String, Loc)> {
        match self {
            Pattern::Wildcard { .. } | Pattern::Literal { .. } | Pattern::Range { .. } => vec![],
            Pattern::Binding { name, loc } => vec![(name.clone(), loc.clone())],
            Pattern::Variant { fields, .. } => {
                fields.iter().flat_map(|p| p.bound_names()).collect()
            }
            Pattern::Tuple { elements, .. } => {
                elements.iter().flat_map(|p| p.bound_names()).collect()
            }
            Pattern::Record { fields, loc } => fields
                .iter()
                .flat_map(|(name, pattern)| match pattern {
                    Some(p) => p.bound_names(),
                    None => vec![(name.clone(), loc.clone())],
                })
                .collect(),
        }
    }
}

// --- JSX ---

#[derive(Debug, Clone, Serialize)]
pub enum JsxAttrValue {
    Str(String),
    Expr(Expr),
}

#[derive(Debug, Clone, Serialize)]
pub enum JsxAttribute {
    /// `name`, `name="s"` or `name={expr}`.
    Static { name: String, value: Option<JsxAttrValue>, loc: Loc },
    /// `on:click.prevent={...}`, `bind:value={...}`, `class:active={...}`,
    /// `use:action`, `transition:fade`, `in:fly`, `out:fade`.
    Directive {
        namespace: String,
        name: String,
        modifiers: Vec<String>,
        value: Option<JsxAttrValue>,
        loc: Loc,
    },
    /// `{...props}`
    Spread { value: Expr, loc: Loc },
}

#[derive(Debug, Clone, Serialize)]
pub enum JsxChild {
    Element(JsxElement),
    Fragment(JsxFragment),
    Expr(JsxExpression),
    Text { value: String, loc: Loc },
    For(JsxFor),
    If(JsxIf),
    Match(JsxMatch),
}

#[derive(Debug, Clone, Serialize)]
pub struct JsxExpression {
    pub expr: Expr,
    pub loc: Loc,
}

#[derive(Debug, Clone, Serialize)]
pub struct JsxElement {
    pub name: String,
    pub attributes: Vec<JsxAttribute>,
    pub children: Vec<JsxChild>,
    pub self_closing: bool,
    pub loc: Loc,
}

#[derive(Debug, Clone, Serialize)]
pub struct JsxFragment {
    pub children: Vec<JsxChild>,
    pub loc: Loc,
}

#[derive(Debug, Clone, Serialize)]
pub struct JsxFor {
    pub binding: ForBinding,
    pub iterable: Expr,
    pub body: Vec<JsxChild>,
    pub loc: Loc,
}

#[derive(Debug, Clone, Serialize)]
pub struct JsxIf {
    pub branches: Vec<(Expr, Vec<JsxChild>)>,
    pub else_body: Option<Vec<JsxChild>>,
    pub loc: Loc,
}

#[derive(Debug, Clone, Serialize)]
pub struct JsxMatchArm {
    pub pattern: Pattern,
    pub guard: Option<Expr>,
    pub body: Vec<JsxChild>,
    pub loc: Loc,
}

#[derive(Debug, Clone, Serialize)]
pub struct JsxMatch {
    pub subject: Expr,
    pub arms: Vec<JsxMatchArm>,
    pub loc: Loc,
}

// --- Type annotations ---

#[derive(Debug, Clone, Serialize)]
pub enum TypeAnnotation {
    Named { name: String, args: Vec<TypeAnnotation>, loc: Loc },
    Array { element: Box<TypeAnnotation>, loc: Loc },
    Tuple { elements: Vec<TypeAnnotation>, loc: Loc },
    Function { params: Vec<TypeAnnotation>, ret: Box<TypeAnnotation>, loc: Loc },
    Nullable { inner: Box<TypeAnnotation>, loc: Loc },
}

impl TypeAnnotation {
    pub fn loc(&self) -> &Loc {
        match self {
            TypeAnnotation::Named { loc, .. }
            | TypeAnnotation::Array { loc, .. }
            | TypeAnnotation::Tuple { loc, .. }
            | TypeAnnotation::Function { loc, .. }
            | TypeAnnotation::Nullable { loc, .. } => loc,
        }
    }
}

/// Structural walk over every expression in a program, used by plugin
/// pre-passes (secret collection, queue discovery) that need to see the
/// whole tree before the main traversal.
pub fn walk_program_exprs(program: &Program, f: &mut dyn FnMut(&Expr)) {
    for stmt in &program.body {
        walk_stmt_exprs(stmt, f);
    }
}

fn walk_all(body: &[Stmt], f: &mut dyn FnMut(&Expr)) {
    for s in body {
        walk_stmt_exprs(s, f);
    }
}

pub fn walk_stmt_exprs(stmt: &Stmt, f: &mut dyn FnMut(&Expr)) {
    match stmt {
        Stmt::Server(n) => walk_all(&n.body, f),
        Stmt::Browser(n) => walk_all(&n.body, f),
        Stmt::Shared(n) => walk_all(&n.body, f),
        Stmt::Form(n) => {
            for member in &n.members {
                walk_form_member_exprs(member, f);
            }
        }
        Stmt::Security(n) => {
            for rule in &n.rules {
                for arg in &rule.args {
                    walk_expr(arg, f);
                }
            }
        }
        Stmt::Deploy(n) => {
            for field in &n.fields {
                walk_expr(&field.value, f);
            }
        }
        Stmt::Cli(n) => {
            for command in &n.commands {
                for param in &command.params {
                    if let Some(default) = &param.default {
                        walk_expr(default, f);
                    }
                }
                walk_all(&command.body, f);
            }
        }
        Stmt::Edge(n) => {
            for decl in &n.body {
                match decl {
                    EdgeDeclaration::Producer { .. } => {}
                    EdgeDeclaration::Consumer { handler, .. } => walk_expr(handler, f),
                    EdgeDeclaration::Stmt(s) => walk_stmt_exprs(s, f),
                }
            }
        }
        Stmt::Concurrent(n) => walk_all(&n.body, f),
        Stmt::Bench(n) => walk_all(&n.body, f),
        Stmt::Route(n) => walk_expr(&n.handler, f),
        Stmt::RouteGroup(n) => walk_all(&n.body, f),
        Stmt::Middleware(n) => walk_expr(&n.handler, f),
        Stmt::WebSocket(n) => walk_all(&n.body, f),
        Stmt::Db(n) => {
            if let Some(config) = &n.config {
                walk_expr(config, f);
            }
        }
        Stmt::ServerConfig(n) => {
            for arg in &n.args {
                walk_expr(arg, f);
            }
        }
        Stmt::State(n) => walk_expr(&n.init, f),
        Stmt::ComputedDecl(n) => walk_expr(&n.body, f),
        Stmt::Effect(n) => walk_all(&n.body, f),
        Stmt::Component(n) => {
            for param in &n.params {
                if let Some(default) = &param.default {
                    walk_expr(default, f);
                }
            }
            walk_all(&n.body, f);
        }
        Stmt::Store(n) => walk_all(&n.body, f),
        Stmt::Style(_) => {}
        Stmt::Assignment(n) => {
            walk_expr(&n.target, f);
            walk_expr(&n.value, f);
        }
        Stmt::VarDecl(n) => walk_expr(&n.value, f),
        Stmt::LetDestructure(n) => walk_expr(&n.value, f),
        Stmt::Function(n) => {
            for param in &n.params {
                if let Some(default) = &param.default {
                    walk_expr(default, f);
                }
            }
            walk_all(&n.body, f);
        }
        Stmt::TypeDecl(_) => {}
        Stmt::If(n) => {
            for (condition, body) in &n.branches {
                walk_expr(condition, f);
                walk_all(body, f);
            }
            if let Some(body) = &n.else_body {
                walk_all(body, f);
            }
        }
        Stmt::For(n) => {
            walk_expr(&n.iterable, f);
            walk_all(&n.body, f);
        }
        Stmt::While(n) => {
            walk_expr(&n.condition, f);
            walk_all(&n.body, f);
        }
        Stmt::TryCatch(n) => {
            walk_all(&n.body, f);
            walk_all(&n.catch_body, f);
            if let Some(finally) = &n.finally_body {
                walk_all(finally, f);
            }
        }
        Stmt::Return(n) => {
            if let Some(value) = &n.value {
                walk_expr(value, f);
            }
        }
        Stmt::Break(_) | Stmt::Continue(_) => {}
        Stmt::Block(n) => walk_all(&n.body, f),
        Stmt::Compound(n) => {
            walk_expr(&n.target, f);
            walk_expr(&n.value, f);
        }
        Stmt::Import(_) => {}
        Stmt::Export(n) => walk_stmt_exprs(&n.stmt, f),
        Stmt::Expr(n) => walk_expr(&n.expr, f),
    }
}

fn walk_form_member_exprs(member: &FormMember, f: &mut dyn FnMut(&Expr)) {
    match member {
        FormMember::Field(field) => {
            for validator in &field.validators {
                for arg in &validator.args {
                    walk_expr(arg, f);
                }
            }
        }
        FormMember::Group(group) => {
            for m in &group.members {
                walk_form_member_exprs(m, f);
            }
        }
        FormMember::Array(array) => {
            for m in &array.members {
                walk_form_member_exprs(m, f);
            }
        }
        FormMember::Steps(_) => {}
    }
}

pub fn walk_expr(expr: &Expr, f: &mut dyn FnMut(&Expr)) {
    f(expr);
    match expr {
        Expr::Nil(_)
        | Expr::Bool(_)
        | Expr::Int(_)
        | Expr::Float(_)
        | Expr::Str(_)
        | Expr::Regex(_)
        | Expr::Ident(_) => {}
        Expr::Template(t) => {
            for part in &t.parts {
                if let TemplatePiece::Expr(e) = part {
                    walk_expr(e, f);
                }
            }
        }
        Expr::Binary(n) => {
            walk_expr(&n.left, f);
            walk_expr(&n.right, f);
        }
        Expr::Unary(n) => walk_expr(&n.operand, f),
        Expr::Logical(n) => {
            walk_expr(&n.left, f);
            walk_expr(&n.right, f);
        }
        Expr::Chained(n) => {
            for operand in &n.operands {
                walk_expr(operand, f);
            }
        }
        Expr::Membership(n) => {
            walk_expr(&n.item, f);
            walk_expr(&n.collection, f);
        }
        Expr::Call(n) => {
            walk_expr(&n.callee, f);
            for arg in &n.args {
                match arg {
                    CallArg::Positional(e) | CallArg::Spread(e) => walk_expr(e, f),
                    CallArg::Named { value, .. } => walk_expr(value, f),
                }
            }
        }
        Expr::Member(n) => walk_expr(&n.object, f),
        Expr::Index(n) => {
            walk_expr(&n.object, f);
            walk_expr(&n.index, f);
        }
        Expr::OptionalChain(n) => walk_expr(&n.object, f),
        Expr::Pipe(n) => {
            walk_expr(&n.value, f);
            walk_expr(&n.call, f);
        }
        Expr::Lambda(n) => {
            for param in &n.params {
                if let Some(default) = &param.default {
                    walk_expr(default, f);
                }
            }
            match &n.body {
                LambdaBody::Expr(e) => walk_expr(e, f),
                LambdaBody::Block(body) => walk_all(body, f),
            }
        }
        Expr::Match(n) => {
            walk_expr(&n.subject, f);
            for arm in &n.arms {
                if let Some(guard) = &arm.guard {
                    walk_expr(guard, f);
                }
                match &arm.body {
                    MatchBody::Expr(e) => walk_expr(e, f),
                    MatchBody::Block(body) => walk_all(body, f),
                }
            }
        }
        Expr::Array(n) => {
            for element in &n.elements {
                walk_expr(element, f);
            }
        }
        Expr::Object(n) => {
            for entry in &n.entries {
                match entry {
                    ObjectEntry::Property { value, .. } => walk_expr(value, f),
                    ObjectEntry::Shorthand { .. } => {}
                    ObjectEntry::Spread { value, .. } => walk_expr(value, f),
                }
            }
        }
        Expr::ListComp(n) => {
            walk_expr(&n.iterable, f);
            walk_expr(&n.element, f);
            if let Some(condition) = &n.condition {
                walk_expr(condition, f);
            }
        }
        Expr::DictComp(n) => {
            walk_expr(&n.iterable, f);
            walk_expr(&n.key, f);
            walk_expr(&n.value, f);
            if let Some(condition) = &n.condition {
                walk_expr(condition, f);
            }
        }
        Expr::Range(n) => {
            walk_expr(&n.start, f);
            walk_expr(&n.end, f);
        }
        Expr::Slice(n) => {
            walk_expr(&n.object, f);
            for part in [&n.start, &n.stop, &n.step].into_iter().flatten() {
                walk_expr(part, f);
            }
        }
        Expr::Spread(n) => walk_expr(&n.value, f),
        Expr::Propagate(n) => walk_expr(&n.value, f),
        Expr::IfExpr(n) => {
            for (condition, body) in &n.branches {
                walk_expr(condition, f);
                walk_all(body, f);
            }
            if let Some(body) = &n.else_body {
                walk_all(body, f);
            }
        }
        Expr::Jsx(n) => walk_jsx_element(n, f),
        Expr::JsxFragment(n) => {
            for child in &n.children {
                walk_jsx_child(child, f);
            }
        }
    }
}

fn walk_jsx_element(element: &JsxElement, f: &mut dyn FnMut(&Expr)) {
    for attribute in &element.attributes {
        match attribute {
            JsxAttribute::Static { value, .. } | JsxAttribute::Directive { value, .. } => {
                if let Some(JsxAttrValue::Expr(e)) = value {
                    walk_expr(e, f);
                }
            }
            JsxAttribute::Spread { value, .. } => walk_expr(value, f),
        }
    }
    for child in &element.children {
        walk_jsx_child(child, f);
    }
}

fn walk_jsx_child(child: &JsxChild, f: &mut dyn FnMut(&Expr)) {
    match child {
        JsxChild::Element(e) => walk_jsx_element(e, f),
        JsxChild::Fragment(fragment) => {
            for c in &fragment.children {
                walk_jsx_child(c, f);
            }
        }
        JsxChild::Expr(e) => walk_expr(&e.expr, f),
        JsxChild::Text { .. } => {}
        JsxChild::For(n) => {
            walk_expr(&n.iterable, f);
            for c in &n.body {
                walk_jsx_child(c, f);
            }
        }
        JsxChild::If(n) => {
            for (condition, body) in &n.branches {
                walk_expr(condition, f);
                for c in body {
                    walk_jsx_child(c, f);
                }
            }
            if let Some(body) = &n.else_body {
                for c in body {
                    walk_jsx_child(c, f);
                }
            }
        }
        JsxChild::Match(n) => {
            walk_expr(&n.subject, f);
            for arm in &n.arms {
                if let Some(guard) = &arm.guard {
                    walk_expr(guard, f);
                }
                for c in &arm.body {
                    walk_jsx_child(c, f);
                }
            }
        }
    }
}
