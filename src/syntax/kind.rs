//! Node kinds produced by the structural grammar

use std::fmt;

macro_rules! syntax_kinds {
    ($($kind:ident),* $(,)?) => {
        /// Kind of an interior node in the syntax tree.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum SyntaxKind {
            $($kind),*
        }

        impl SyntaxKind {
            /// Every kind, in declaration order.
            pub const ALL: &'static [SyntaxKind] = &[$(SyntaxKind::$kind),*];

            /// The kind's name as written in templates, e.g. `MethodDeclaration`.
            pub fn name(self) -> &'static str {
                match self {
                    $(SyntaxKind::$kind => stringify!($kind)),*
                }
            }
        }
    };
}

syntax_kinds! {
    CompilationUnit,
    Fragment,
    UsingDirective,
    NamespaceDeclaration,
    QualifiedName,
    Name,
    ClassDeclaration,
    StructDeclaration,
    InterfaceDeclaration,
    RecordDeclaration,
    EnumDeclaration,
    EnumMemberDeclaration,
    DelegateDeclaration,
    MethodDeclaration,
    ConstructorDeclaration,
    OperatorDeclaration,
    PropertyDeclaration,
    IndexerDeclaration,
    FieldDeclaration,
    VariableDeclarator,
    AttributeList,
    Type,
    TypeParameterList,
    ParameterList,
    AccessorList,
    Accessor,
    ArrowExpressionClause,
    Block,
    LocalDeclarationStatement,
    ExpressionStatement,
    ReturnStatement,
    ThrowStatement,
    IfStatement,
    ElseClause,
    WhileStatement,
    DoStatement,
    ForStatement,
    ForEachStatement,
    UsingStatement,
    LockStatement,
    FixedStatement,
    SwitchStatement,
    SwitchSection,
    TryStatement,
    CatchClause,
    FinallyClause,
    JumpStatement,
    EmptyStatement,
    LocalFunctionStatement,
    UnsafeStatement,
    Expression,
    ArgumentList,
    Argument,
    BracketedGroup,
    BraceGroup,
}

impl SyntaxKind {
    /// Look a kind up by its name. Matching is exact.
    pub fn from_name(name: &str) -> Option<SyntaxKind> {
        SyntaxKind::ALL.iter().copied().find(|k| k.name() == name)
    }

    /// Class, struct, interface, record and enum declarations.
    pub fn is_type_declaration(self) -> bool {
        matches!(
            self,
            SyntaxKind::ClassDeclaration
                | SyntaxKind::StructDeclaration
                | SyntaxKind::InterfaceDeclaration
                | SyntaxKind::RecordDeclaration
                | SyntaxKind::EnumDeclaration
        )
    }

    /// Anything that can appear as a member of a namespace or type.
    pub fn is_member_declaration(self) -> bool {
        self.is_type_declaration()
            || matches!(
                self,
                SyntaxKind::NamespaceDeclaration
                    | SyntaxKind::EnumMemberDeclaration
                    | SyntaxKind::DelegateDeclaration
                    | SyntaxKind::MethodDeclaration
                    | SyntaxKind::ConstructorDeclaration
                    | SyntaxKind::OperatorDeclaration
                    | SyntaxKind::PropertyDeclaration
                    | SyntaxKind::IndexerDeclaration
                    | SyntaxKind::FieldDeclaration
            )
    }

    pub fn is_statement(self) -> bool {
        matches!(
            self,
            SyntaxKind::Block
                | SyntaxKind::LocalDeclarationStatement
                | SyntaxKind::ExpressionStatement
                | SyntaxKind::ReturnStatement
                | SyntaxKind::ThrowStatement
                | SyntaxKind::IfStatement
                | SyntaxKind::WhileStatement
                | SyntaxKind::DoStatement
                | SyntaxKind::ForStatement
                | SyntaxKind::ForEachStatement
                | SyntaxKind::UsingStatement
                | SyntaxKind::LockStatement
                | SyntaxKind::FixedStatement
                | SyntaxKind::SwitchStatement
                | SyntaxKind::TryStatement
                | SyntaxKind::JumpStatement
                | SyntaxKind::EmptyStatement
                | SyntaxKind::LocalFunctionStatement
                | SyntaxKind::UnsafeStatement
        )
    }

    pub fn is_expression(self) -> bool {
        self == SyntaxKind::Expression
    }
}

impl fmt::Display for SyntaxKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Which grammar entry point parses replacement text for a given target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentKind {
    Member,
    Statement,
    Expression,
}

impl FragmentKind {
    /// Declarations take members, statements take statements, anything else
    /// is treated as an expression.
    pub fn for_target(kind: SyntaxKind) -> FragmentKind {
        if kind.is_member_declaration() {
            FragmentKind::Member
        } else if kind.is_statement() {
            FragmentKind::Statement
        } else {
            FragmentKind::Expression
        }
    }
}
