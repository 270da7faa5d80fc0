//! Structural grammar for C#-style sources using chumsky
//!
//! The grammar runs over significant tokens only and reports token-index
//! spans. It recognizes declarations and statements precisely and treats
//! expressions as balanced token runs with argument lists picked out, which
//! is all the structural editing layer needs. The resulting outline is then
//! laid over the trivia-carrying tokens to build the green tree.

use std::sync::Arc;

use chumsky::error::{RichPattern, RichReason};
use chumsky::input::{Stream, ValueInput};
use chumsky::prelude::*;

use super::green::{GreenElement, GreenNode, GreenToken, Trivia, TriviaKind};
use super::kind::{FragmentKind, SyntaxKind};
use super::lexer::{lex, Token};
use super::tree::{SyntaxNode, SyntaxTree};
use crate::error::{ParseError, Span};

type Extra<'a> = extra::Err<Rich<'a, Token>>;

/// Node kind over a range of significant-token indices.
#[derive(Debug, Clone)]
struct Outline {
    kind: SyntaxKind,
    span: Span,
    children: Vec<Outline>,
}

fn node(kind: SyntaxKind, span: SimpleSpan, children: Vec<Outline>) -> Outline {
    Outline {
        kind,
        span: span.into_range(),
        children,
    }
}

fn prepend(first: Outline, rest: Vec<Outline>) -> Vec<Outline> {
    let mut children = Vec::with_capacity(rest.len() + 1);
    children.push(first);
    children.extend(rest);
    children
}

#[derive(Debug, Clone, Copy)]
enum Entry {
    Unit,
    Fragment(FragmentKind),
}

const GROUP_DELIMITERS: [Token; 6] = [
    Token::LParen,
    Token::RParen,
    Token::LBracket,
    Token::RBracket,
    Token::LBrace,
    Token::RBrace,
];

const EXPRESSION_STOPS: [Token; 8] = [
    Token::LParen,
    Token::RParen,
    Token::LBracket,
    Token::RBracket,
    Token::LBrace,
    Token::RBrace,
    Token::Semicolon,
    Token::Comma,
];

const HEADER_STOPS: [Token; 8] = [
    Token::LParen,
    Token::RParen,
    Token::LBracket,
    Token::RBracket,
    Token::LBrace,
    Token::RBrace,
    Token::Semicolon,
    Token::FatArrow,
];

const LABEL_STOPS: [Token; 8] = [
    Token::LParen,
    Token::RParen,
    Token::LBracket,
    Token::RBracket,
    Token::LBrace,
    Token::RBrace,
    Token::Semicolon,
    Token::Colon,
];

const OPERATOR_STOPS: [Token; 7] = [
    Token::LParen,
    Token::RParen,
    Token::LBracket,
    Token::RBracket,
    Token::LBrace,
    Token::RBrace,
    Token::Semicolon,
];

const TYPE_PARAMETER_STOPS: [Token; 6] = [
    Token::Gt,
    Token::LParen,
    Token::RParen,
    Token::LBrace,
    Token::RBrace,
    Token::Semicolon,
];

/// Tokens after which `<...>` in an expression is a generic argument list
/// rather than a pair of comparisons.
const GENERIC_FOLLOWERS: [Token; 9] = [
    Token::LParen,
    Token::RParen,
    Token::RBracket,
    Token::LBrace,
    Token::RBrace,
    Token::Dot,
    Token::Semicolon,
    Token::Comma,
    Token::Colon,
];

fn outline_parser<'a, I>(entry: Entry) -> Boxed<'a, 'a, I, Vec<Outline>, Extra<'a>>
where
    I: ValueInput<'a, Token = Token, Span = SimpleSpan>,
{
    // Balanced token runs with no structure of their own
    let soup = recursive(|soup| {
        choice((
            soup.clone()
                .repeated()
                .delimited_by(just(Token::LParen), just(Token::RParen)),
            soup.clone()
                .repeated()
                .delimited_by(just(Token::LBracket), just(Token::RBracket)),
            soup.clone()
                .repeated()
                .delimited_by(just(Token::LBrace), just(Token::RBrace)),
            none_of(GROUP_DELIMITERS).ignored(),
        ))
    });

    let parens = soup
        .clone()
        .repeated()
        .delimited_by(just(Token::LParen), just(Token::RParen));
    let brackets = soup
        .clone()
        .repeated()
        .delimited_by(just(Token::LBracket), just(Token::RBracket));
    let braces = soup
        .clone()
        .repeated()
        .delimited_by(just(Token::LBrace), just(Token::RBrace));

    // Everything between a signature and its body: base lists, constraints,
    // constructor initializers
    let header = choice((
        parens.clone(),
        brackets.clone(),
        none_of(HEADER_STOPS).ignored(),
    ))
    .repeated();

    let type_ref = recursive(|type_ref| {
        let type_arguments = type_ref
            .clone()
            .separated_by(just(Token::Comma))
            .delimited_by(just(Token::Lt), just(Token::Gt));
        let segment = just(Token::Ident).then(type_arguments.or_not());
        let named = segment
            .separated_by(choice((just(Token::Dot), just(Token::ColonColon))))
            .at_least(1);
        let rank = just(Token::Comma)
            .repeated()
            .delimited_by(just(Token::LBracket), just(Token::RBracket));
        let suffix = choice((
            just(Token::Question).ignored(),
            just(Token::Star).ignored(),
            rank,
        ));

        choice((named, parens.clone()))
            .then(suffix.repeated())
            .map_with(|_, e| node(SyntaxKind::Type, e.span(), Vec::new()))
            .boxed()
    });

    let name = just(Token::Ident)
        .separated_by(just(Token::Dot))
        .at_least(1)
        .map_with(|_, e| node(SyntaxKind::Name, e.span(), Vec::new()));

    let expression = recursive(|expression| {
        let argument = expression
            .clone()
            .map_with(|expr, e| node(SyntaxKind::Argument, e.span(), vec![expr]));
        let argument_list = argument
            .separated_by(just(Token::Comma))
            .collect::<Vec<_>>()
            .delimited_by(just(Token::LParen), just(Token::RParen))
            .map_with(|args, e| node(SyntaxKind::ArgumentList, e.span(), args));
        let bracketed = brackets
            .clone()
            .map_with(|_, e| node(SyntaxKind::BracketedGroup, e.span(), Vec::new()));
        let braced = braces
            .clone()
            .map_with(|_, e| node(SyntaxKind::BraceGroup, e.span(), Vec::new()));
        let generic_arguments = just(Token::Lt)
            .then(type_ref.clone().separated_by(just(Token::Comma)).at_least(1))
            .then(just(Token::Gt))
            .then_ignore(one_of(GENERIC_FOLLOWERS).rewind());

        choice((
            argument_list.map(Some),
            bracketed.map(Some),
            braced.map(Some),
            generic_arguments.to(None),
            none_of(EXPRESSION_STOPS).to(None),
        ))
        .repeated()
        .at_least(1)
        .collect::<Vec<_>>()
        .map_with(|atoms, e| {
            node(
                SyntaxKind::Expression,
                e.span(),
                atoms.into_iter().flatten().collect(),
            )
        })
        .boxed()
    });

    let attribute_list = brackets
        .clone()
        .map_with(|_, e| node(SyntaxKind::AttributeList, e.span(), Vec::new()));
    let attributes = attribute_list.clone().repeated().collect::<Vec<_>>();
    let modifiers = one_of([Token::Modifier, Token::Unsafe]).repeated();

    let type_parameters = just(Token::Lt)
        .then(none_of(TYPE_PARAMETER_STOPS).repeated())
        .then(just(Token::Gt))
        .map_with(|_, e| node(SyntaxKind::TypeParameterList, e.span(), Vec::new()));
    let parameter_list = parens
        .clone()
        .map_with(|_, e| node(SyntaxKind::ParameterList, e.span(), Vec::new()));

    let arrow_clause = just(Token::FatArrow)
        .ignore_then(expression.clone())
        .map_with(|expr, e| node(SyntaxKind::ArrowExpressionClause, e.span(), vec![expr]));

    let declarator = just(Token::Ident)
        .then(brackets.clone().or_not())
        .ignore_then(just(Token::Eq).ignore_then(expression.clone()).or_not())
        .map_with(|init, e| {
            node(
                SyntaxKind::VariableDeclarator,
                e.span(),
                init.into_iter().collect(),
            )
        });
    let declarators = declarator
        .separated_by(just(Token::Comma))
        .at_least(1)
        .collect::<Vec<_>>();

    let statement = recursive(|statement| {
        let block = statement
            .clone()
            .repeated()
            .collect::<Vec<_>>()
            .delimited_by(just(Token::LBrace), just(Token::RBrace))
            .map_with(|stmts, e| node(SyntaxKind::Block, e.span(), stmts));
        let condition = expression
            .clone()
            .delimited_by(just(Token::LParen), just(Token::RParen));

        let if_statement = just(Token::If)
            .ignore_then(condition.clone())
            .then(statement.clone())
            .then(
                just(Token::Else)
                    .ignore_then(statement.clone())
                    .map_with(|body, e| node(SyntaxKind::ElseClause, e.span(), vec![body]))
                    .or_not(),
            )
            .map_with(|((cond, body), else_clause), e| {
                let mut children = vec![cond, body];
                children.extend(else_clause);
                node(SyntaxKind::IfStatement, e.span(), children)
            });

        let while_statement = just(Token::While)
            .ignore_then(condition.clone())
            .then(statement.clone())
            .map_with(|(cond, body), e| {
                node(SyntaxKind::WhileStatement, e.span(), vec![cond, body])
            });

        let do_statement = just(Token::Do)
            .ignore_then(statement.clone())
            .then_ignore(just(Token::While))
            .then(condition.clone())
            .then_ignore(just(Token::Semicolon))
            .map_with(|(body, cond), e| node(SyntaxKind::DoStatement, e.span(), vec![body, cond]));

        let for_statement = just(Token::For)
            .ignore_then(parens.clone())
            .ignore_then(statement.clone())
            .map_with(|body, e| node(SyntaxKind::ForStatement, e.span(), vec![body]));

        let foreach_statement = just(Token::ForEach)
            .ignore_then(parens.clone())
            .ignore_then(statement.clone())
            .map_with(|body, e| node(SyntaxKind::ForEachStatement, e.span(), vec![body]));

        let using_statement = just(Token::Using)
            .ignore_then(choice((
                parens.clone().ignore_then(statement.clone()),
                expression.clone().then_ignore(just(Token::Semicolon)),
            )))
            .map_with(|inner, e| node(SyntaxKind::UsingStatement, e.span(), vec![inner]));

        let lock_statement = just(Token::Lock)
            .ignore_then(condition.clone())
            .then(statement.clone())
            .map_with(|(cond, body), e| node(SyntaxKind::LockStatement, e.span(), vec![cond, body]));

        let fixed_statement = just(Token::Fixed)
            .ignore_then(parens.clone())
            .ignore_then(statement.clone())
            .map_with(|body, e| node(SyntaxKind::FixedStatement, e.span(), vec![body]));

        let label = choice((
            just(Token::Case)
                .ignore_then(
                    choice((
                        parens.clone(),
                        brackets.clone(),
                        braces.clone(),
                        none_of(LABEL_STOPS).ignored(),
                    ))
                    .repeated(),
                )
                .then_ignore(just(Token::Colon)),
            just(Token::Default).then(just(Token::Colon)).ignored(),
        ));
        let section = label
            .clone()
            .repeated()
            .at_least(1)
            .ignore_then(
                label
                    .clone()
                    .not()
                    .ignore_then(statement.clone())
                    .repeated()
                    .collect::<Vec<_>>(),
            )
            .map_with(|stmts, e| node(SyntaxKind::SwitchSection, e.span(), stmts));
        let switch_statement = just(Token::Switch)
            .ignore_then(condition.clone())
            .then(
                section
                    .repeated()
                    .collect::<Vec<_>>()
                    .delimited_by(just(Token::LBrace), just(Token::RBrace)),
            )
            .map_with(|(cond, sections), e| {
                node(SyntaxKind::SwitchStatement, e.span(), prepend(cond, sections))
            });

        let catch_clause = just(Token::Catch)
            .then(parens.clone().or_not())
            .then(just(Token::Ident).then(parens.clone()).or_not())
            .ignore_then(block.clone())
            .map_with(|body, e| node(SyntaxKind::CatchClause, e.span(), vec![body]));
        let finally_clause = just(Token::Finally)
            .ignore_then(block.clone())
            .map_with(|body, e| node(SyntaxKind::FinallyClause, e.span(), vec![body]));
        let try_statement = just(Token::Try)
            .ignore_then(block.clone())
            .then(catch_clause.repeated().collect::<Vec<_>>())
            .then(finally_clause.or_not())
            .map_with(|((body, catches), finally), e| {
                let mut children = prepend(body, catches);
                children.extend(finally);
                node(SyntaxKind::TryStatement, e.span(), children)
            });

        let return_statement = just(Token::Return)
            .ignore_then(expression.clone().or_not())
            .then_ignore(just(Token::Semicolon))
            .map_with(|value, e| {
                node(
                    SyntaxKind::ReturnStatement,
                    e.span(),
                    value.into_iter().collect(),
                )
            });

        let throw_statement = just(Token::Throw)
            .ignore_then(expression.clone().or_not())
            .then_ignore(just(Token::Semicolon))
            .map_with(|value, e| {
                node(
                    SyntaxKind::ThrowStatement,
                    e.span(),
                    value.into_iter().collect(),
                )
            });

        let jump_statement = one_of([Token::Break, Token::Continue, Token::Goto])
            .ignore_then(expression.clone().or_not())
            .then_ignore(just(Token::Semicolon))
            .map_with(|target, e| {
                node(
                    SyntaxKind::JumpStatement,
                    e.span(),
                    target.into_iter().collect(),
                )
            });

        let unsafe_statement = just(Token::Unsafe)
            .ignore_then(block.clone())
            .map_with(|body, e| node(SyntaxKind::UnsafeStatement, e.span(), vec![body]));

        let empty_statement = just(Token::Semicolon)
            .map_with(|_, e| node(SyntaxKind::EmptyStatement, e.span(), Vec::new()));

        let local_function = attributes
            .clone()
            .then_ignore(modifiers.clone())
            .then(type_ref.clone())
            .then(name.clone())
            .then(type_parameters.clone().or_not())
            .then(parameter_list.clone())
            .then_ignore(header.clone())
            .then(choice((
                block.clone(),
                arrow_clause.clone().then_ignore(just(Token::Semicolon)),
            )))
            .map_with(|(((((attrs, ty), name), type_params), params), body), e| {
                let mut children = attrs;
                children.push(ty);
                children.push(name);
                children.extend(type_params);
                children.push(params);
                children.push(body);
                node(SyntaxKind::LocalFunctionStatement, e.span(), children)
            });

        let local_declaration = modifiers
            .clone()
            .ignore_then(type_ref.clone())
            .then(declarators.clone())
            .then_ignore(just(Token::Semicolon))
            .map_with(|(ty, declarators), e| {
                node(
                    SyntaxKind::LocalDeclarationStatement,
                    e.span(),
                    prepend(ty, declarators),
                )
            });

        let expression_statement = expression
            .clone()
            .then_ignore(just(Token::Semicolon))
            .map_with(|expr, e| node(SyntaxKind::ExpressionStatement, e.span(), vec![expr]));

        // Order matters: keyword-led statements first, then declarations,
        // and expression statements last since they accept almost anything
        choice((
            block,
            if_statement,
            while_statement,
            do_statement,
            for_statement,
            foreach_statement,
            using_statement,
            lock_statement,
            fixed_statement,
            switch_statement,
            try_statement,
            return_statement,
            throw_statement,
            jump_statement,
            unsafe_statement,
            empty_statement,
            local_function,
            local_declaration,
            expression_statement,
        ))
        .boxed()
    });

    let block = statement
        .clone()
        .repeated()
        .collect::<Vec<_>>()
        .delimited_by(just(Token::LBrace), just(Token::RBrace))
        .map_with(|stmts, e| node(SyntaxKind::Block, e.span(), stmts));
    let body = choice((
        block.clone().map(|b| vec![b]),
        arrow_clause
            .clone()
            .then_ignore(just(Token::Semicolon))
            .map(|a| vec![a]),
        just(Token::Semicolon).to(Vec::new()),
    ));

    let member = recursive(|member| {
        let member_block = member
            .clone()
            .repeated()
            .collect::<Vec<_>>()
            .delimited_by(just(Token::LBrace), just(Token::RBrace))
            .then_ignore(just(Token::Semicolon).or_not());

        // `global using` arrives as an identifier followed by `using`
        let using_directive = just(Token::Ident)
            .or_not()
            .then(just(Token::Using))
            .then(none_of([Token::Semicolon, Token::LBrace, Token::RBrace]).repeated())
            .then(just(Token::Semicolon))
            .map_with(|_, e| node(SyntaxKind::UsingDirective, e.span(), Vec::new()));

        let qualified_name = just(Token::Ident)
            .separated_by(just(Token::Dot))
            .at_least(1)
            .map_with(|_, e| node(SyntaxKind::QualifiedName, e.span(), Vec::new()));
        let namespace = just(Token::Namespace)
            .ignore_then(qualified_name)
            .then(choice((
                member_block.clone(),
                just(Token::Semicolon).to(Vec::new()),
            )))
            .map_with(|(name, members), e| {
                node(
                    SyntaxKind::NamespaceDeclaration,
                    e.span(),
                    prepend(name, members),
                )
            });

        let type_keyword = choice((
            just(Token::Class).to(SyntaxKind::ClassDeclaration),
            just(Token::Struct).to(SyntaxKind::StructDeclaration),
            just(Token::Interface).to(SyntaxKind::InterfaceDeclaration),
            just(Token::Record)
                .then(one_of([Token::Class, Token::Struct]).or_not())
                .to(SyntaxKind::RecordDeclaration),
        ));
        let type_declaration = attributes
            .clone()
            .then_ignore(modifiers.clone())
            .then(type_keyword)
            .then(name.clone())
            .then(type_parameters.clone().or_not())
            .then_ignore(header.clone())
            .then(choice((
                member_block.clone(),
                just(Token::Semicolon).to(Vec::new()),
            )))
            .map_with(|((((attrs, kind), name), type_params), members), e| {
                let mut children = attrs;
                children.push(name);
                children.extend(type_params);
                children.extend(members);
                node(kind, e.span(), children)
            });

        let enum_member = attributes
            .clone()
            .then(name.clone())
            .then(just(Token::Eq).ignore_then(expression.clone()).or_not())
            .map_with(|((attrs, name), value), e| {
                let mut children = attrs;
                children.push(name);
                children.extend(value);
                node(SyntaxKind::EnumMemberDeclaration, e.span(), children)
            });
        let enum_declaration = attributes
            .clone()
            .then_ignore(modifiers.clone())
            .then_ignore(just(Token::Enum))
            .then(name.clone())
            .then_ignore(header.clone())
            .then(
                enum_member
                    .separated_by(just(Token::Comma))
                    .allow_trailing()
                    .collect::<Vec<_>>()
                    .delimited_by(just(Token::LBrace), just(Token::RBrace)),
            )
            .then_ignore(just(Token::Semicolon).or_not())
            .map_with(|((attrs, name), members), e| {
                let mut children = attrs;
                children.push(name);
                children.extend(members);
                node(SyntaxKind::EnumDeclaration, e.span(), children)
            });

        let delegate = attributes
            .clone()
            .then_ignore(modifiers.clone())
            .then_ignore(just(Token::Delegate))
            .then(type_ref.clone())
            .then(name.clone())
            .then(type_parameters.clone().or_not())
            .then(parameter_list.clone())
            .then_ignore(header.clone())
            .then_ignore(just(Token::Semicolon))
            .map_with(|((((attrs, ty), name), type_params), params), e| {
                let mut children = attrs;
                children.push(ty);
                children.push(name);
                children.extend(type_params);
                children.push(params);
                node(SyntaxKind::DelegateDeclaration, e.span(), children)
            });

        let constructor = attributes
            .clone()
            .then_ignore(modifiers.clone())
            .then_ignore(just(Token::Tilde).or_not())
            .then(name.clone())
            .then(parameter_list.clone())
            .then_ignore(header.clone())
            .then(body.clone())
            .map_with(|(((attrs, name), params), body), e| {
                let mut children = attrs;
                children.push(name);
                children.push(params);
                children.extend(body);
                node(SyntaxKind::ConstructorDeclaration, e.span(), children)
            });

        let method = attributes
            .clone()
            .then_ignore(modifiers.clone())
            .then(type_ref.clone())
            .then(name.clone())
            .then(type_parameters.clone().or_not())
            .then(parameter_list.clone())
            .then_ignore(header.clone())
            .then(body.clone())
            .map_with(|(((((attrs, ty), name), type_params), params), body), e| {
                let mut children = attrs;
                children.push(ty);
                children.push(name);
                children.extend(type_params);
                children.push(params);
                children.extend(body);
                node(SyntaxKind::MethodDeclaration, e.span(), children)
            });

        let operator = attributes
            .clone()
            .then_ignore(modifiers.clone())
            .then(type_ref.clone())
            .then_ignore(just(Token::Operator))
            .then_ignore(none_of(OPERATOR_STOPS).repeated())
            .then(parameter_list.clone())
            .then_ignore(header.clone())
            .then(body.clone())
            .map_with(|(((attrs, ty), params), body), e| {
                let mut children = attrs;
                children.push(ty);
                children.push(params);
                children.extend(body);
                node(SyntaxKind::OperatorDeclaration, e.span(), children)
            });

        let accessor = attributes
            .clone()
            .then_ignore(modifiers.clone())
            .then_ignore(just(Token::Ident))
            .then(body.clone())
            .map_with(|(attrs, body), e| {
                let mut children = attrs;
                children.extend(body);
                node(SyntaxKind::Accessor, e.span(), children)
            });
        let accessor_list = accessor
            .repeated()
            .collect::<Vec<_>>()
            .delimited_by(just(Token::LBrace), just(Token::RBrace))
            .map_with(|accessors, e| node(SyntaxKind::AccessorList, e.span(), accessors));
        let property_body = choice((
            accessor_list
                .clone()
                .then(
                    just(Token::Eq)
                        .ignore_then(expression.clone())
                        .then_ignore(just(Token::Semicolon))
                        .or_not(),
                )
                .map(|(list, init)| {
                    let mut children = vec![list];
                    children.extend(init);
                    children
                }),
            arrow_clause
                .clone()
                .then_ignore(just(Token::Semicolon))
                .map(|a| vec![a]),
        ));

        let indexer = attributes
            .clone()
            .then_ignore(modifiers.clone())
            .then(type_ref.clone())
            .then_ignore(just(Token::This))
            .then_ignore(brackets.clone())
            .then(property_body.clone())
            .map_with(|((attrs, ty), body), e| {
                let mut children = attrs;
                children.push(ty);
                children.extend(body);
                node(SyntaxKind::IndexerDeclaration, e.span(), children)
            });

        let property = attributes
            .clone()
            .then_ignore(modifiers.clone())
            .then(type_ref.clone())
            .then(name.clone())
            .then(property_body)
            .map_with(|(((attrs, ty), name), body), e| {
                let mut children = attrs;
                children.push(ty);
                children.push(name);
                children.extend(body);
                node(SyntaxKind::PropertyDeclaration, e.span(), children)
            });

        let field = attributes
            .clone()
            .then_ignore(modifiers.clone())
            .then(type_ref.clone())
            .then(declarators.clone())
            .then_ignore(just(Token::Semicolon))
            .map_with(|((attrs, ty), declarators), e| {
                let mut children = attrs;
                children.push(ty);
                children.extend(declarators);
                node(SyntaxKind::FieldDeclaration, e.span(), children)
            });

        choice((
            using_directive,
            namespace,
            type_declaration,
            enum_declaration,
            delegate,
            constructor,
            method,
            operator,
            indexer,
            property,
            field,
            // assembly-level attributes stand on their own
            attribute_list.clone(),
        ))
        .boxed()
    });

    match entry {
        Entry::Unit => member
            .repeated()
            .collect::<Vec<_>>()
            .then_ignore(end())
            .boxed(),
        Entry::Fragment(FragmentKind::Member) => {
            member.map(|m| vec![m]).then_ignore(end()).boxed()
        }
        Entry::Fragment(FragmentKind::Statement) => {
            statement.map(|s| vec![s]).then_ignore(end()).boxed()
        }
        Entry::Fragment(FragmentKind::Expression) => {
            expression.map(|x| vec![x]).then_ignore(end()).boxed()
        }
    }
}

/// Significant tokens with their trivia attached, plus the end-of-file token.
struct Tokens {
    kinds: Vec<Token>,
    green: Vec<Arc<GreenToken>>,
    spans: Vec<Span>,
    source_len: usize,
}

impl Tokens {
    /// Trailing trivia runs up to and including the first newline; any
    /// other trivia leads the next token.
    fn new(source: &str) -> Result<Self, ParseError> {
        let mut kinds = Vec::new();
        let mut green = Vec::new();
        let mut spans = Vec::new();
        let mut leading = Vec::new();

        let mut lexemes = lex(source)?.into_iter().peekable();
        while let Some((token, span)) = lexemes.next() {
            if let Some(kind) = TriviaKind::from_token(token) {
                leading.push(Trivia::new(kind, &source[span]));
                continue;
            }

            let mut trailing = Vec::new();
            while let Some((next, next_span)) = lexemes.peek() {
                let Some(kind) = TriviaKind::from_token(*next) else {
                    break;
                };
                trailing.push(Trivia::new(kind, &source[next_span.clone()]));
                lexemes.next();
                if kind == TriviaKind::Newline {
                    break;
                }
            }

            kinds.push(token);
            green.push(Arc::new(GreenToken::new(
                Some(token),
                &source[span.clone()],
                std::mem::take(&mut leading),
                trailing,
            )));
            spans.push(span);
        }
        green.push(Arc::new(GreenToken::new(None, "", leading, Vec::new())));

        Ok(Self {
            kinds,
            green,
            spans,
            source_len: source.len(),
        })
    }

    /// Byte span of a range of significant-token indices.
    fn byte_span(&self, range: Span) -> Span {
        if range.start >= self.spans.len() {
            return self.source_len..self.source_len;
        }
        let last = range.end.clamp(range.start + 1, self.spans.len()) - 1;
        self.spans[range.start].start..self.spans[last].end
    }

    fn outline(&self, entry: Entry) -> Result<Vec<Outline>, ParseError> {
        let len = self.kinds.len();
        let token_iter = self
            .kinds
            .iter()
            .copied()
            .enumerate()
            .map(|(index, tok)| (tok, SimpleSpan::from(index..index + 1)));
        let token_stream =
            Stream::from_iter(token_iter).map((len..len).into(), |(t, s): (_, _)| (t, s));

        outline_parser(entry)
            .parse(token_stream)
            .into_result()
            .map_err(|errs| match errs.into_iter().next() {
                Some(err) => self.error(err),
                None => ParseError::Syntax {
                    span: 0..self.source_len,
                    message: "Failed to parse".to_string(),
                    expected: Vec::new(),
                },
            })
    }

    fn error(&self, err: Rich<'_, Token>) -> ParseError {
        let span = self.byte_span(err.span().into_range());
        let message = match err.reason() {
            RichReason::Custom(msg) => msg.clone(),
            RichReason::ExpectedFound { found, .. } => match found {
                Some(tok) => format!("Unexpected {}", describe(**tok)),
                None => "Unexpected end of input".to_string(),
            },
        };
        let mut expected: Vec<String> = err
            .expected()
            .filter_map(|pattern| match pattern {
                RichPattern::Token(tok) => Some(describe(**tok)),
                RichPattern::Label(label) => Some(label.to_string()),
                RichPattern::EndOfInput => Some("end of input".to_string()),
                _ => None,
            })
            .collect();
        expected.sort();
        expected.dedup();
        ParseError::Syntax {
            span,
            message,
            expected,
        }
    }

    /// Lay the outline over the tokens. The root takes every token,
    /// end-of-file included.
    fn assemble(&self, root: SyntaxKind, children: Vec<Outline>) -> GreenNode {
        let outline = Outline {
            kind: root,
            span: 0..self.green.len(),
            children,
        };
        self.build(&outline)
    }

    fn build(&self, outline: &Outline) -> GreenNode {
        let mut nested: Vec<&Outline> = outline
            .children
            .iter()
            .filter(|child| !child.span.is_empty())
            .collect();
        nested.sort_by_key(|child| child.span.start);
        let mut nested = nested.into_iter().peekable();

        let mut children = Vec::new();
        let mut index = outline.span.start;
        while index < outline.span.end {
            match nested.peek() {
                Some(child) if child.span.start == index => {
                    children.push(GreenElement::Node(Arc::new(self.build(child))));
                    index = child.span.end;
                    nested.next();
                }
                Some(child) if child.span.start < index => {
                    nested.next();
                }
                _ => {
                    children.push(GreenElement::Token(self.green[index].clone()));
                    index += 1;
                }
            }
        }
        GreenNode::new(outline.kind, children)
    }
}

/// Human-readable token description for error messages
fn describe(tok: Token) -> String {
    let text = match tok {
        Token::Ident => "identifier",
        Token::Number => "number",
        Token::Literal => "literal",
        Token::Modifier => "modifier",
        Token::Punct => "operator",
        Token::LBrace => "'{'",
        Token::RBrace => "'}'",
        Token::LParen => "'('",
        Token::RParen => "')'",
        Token::LBracket => "'['",
        Token::RBracket => "']'",
        Token::Semicolon => "';'",
        Token::Comma => "','",
        Token::Dot => "'.'",
        Token::Colon => "':'",
        Token::ColonColon => "'::'",
        Token::Question => "'?'",
        Token::Eq => "'='",
        Token::FatArrow => "'=>'",
        Token::Lt => "'<'",
        Token::Gt => "'>'",
        Token::Star => "'*'",
        Token::Tilde => "'~'",
        other => return format!("keyword {:?}", other).to_lowercase(),
    };
    text.to_string()
}

/// Parse a whole source file into a lossless tree.
pub fn parse(source: &str) -> Result<SyntaxTree, ParseError> {
    let tokens = Tokens::new(source)?;
    let outline = tokens.outline(Entry::Unit)?;
    Ok(SyntaxTree::new(
        tokens.assemble(SyntaxKind::CompilationUnit, outline),
    ))
}

/// Parse a standalone member, statement or expression.
///
/// The returned node lives in a small tree of its own whose root also holds
/// any trivia after the fragment.
pub fn parse_fragment(source: &str, kind: FragmentKind) -> Result<SyntaxNode, ParseError> {
    let tokens = Tokens::new(source)?;
    let outline = tokens.outline(Entry::Fragment(kind))?;
    let tree = SyntaxTree::new(tokens.assemble(SyntaxKind::Fragment, outline));
    tree.root()
        .children()
        .into_iter()
        .next()
        .ok_or_else(|| ParseError::Syntax {
            span: 0..source.len(),
            message: format!("Expected a {:?} fragment", kind).to_lowercase(),
            expected: Vec::new(),
        })
}

pub fn parse_member(source: &str) -> Result<SyntaxNode, ParseError> {
    parse_fragment(source, FragmentKind::Member)
}

pub fn parse_statement(source: &str) -> Result<SyntaxNode, ParseError> {
    parse_fragment(source, FragmentKind::Statement)
}

pub fn parse_expression(source: &str) -> Result<SyntaxNode, ParseError> {
    parse_fragment(source, FragmentKind::Expression)
}
