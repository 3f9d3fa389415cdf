//! The ANSI dialect
//!
//! Lexer matchers, keyword sets and the grammar every other dialect would
//! start from. Names follow the `<Thing>Segment` / `<Thing>Grammar` split:
//! segments become typed nodes in the tree, grammars are inlined.

use smol_str::SmolStr;

use super::grammar::*;
use super::{Dialect, GrammarBuilder, LexMatcher, ParseMode};
use crate::errors::GrammarError;
use crate::segments::{MetaKind, TokenFlags};

pub const RESERVED_KEYWORDS: &[&str] = &[
    "ALL", "AND", "AS", "ASC", "BETWEEN", "BY", "CASE", "CAST", "CONSTRAINT", "CREATE", "CROSS", "DEFAULT",
    "DELETE", "DESC", "DISTINCT", "DROP", "ELSE", "END", "EXCEPT", "EXISTS", "FALSE", "FETCH", "FOREIGN", "FROM",
    "FULL", "GROUP", "HAVING", "IN", "INNER", "INSERT", "INTERSECT", "INTO", "IS", "JOIN", "LEFT", "LIKE", "LIMIT",
    "NATURAL", "NOT", "NULL", "OFFSET", "ON", "OR", "ORDER", "OUTER", "PRIMARY", "REFERENCES", "RIGHT", "SELECT",
    "SET", "TABLE", "THEN", "TRUE", "UNION", "UNIQUE", "UPDATE", "USING", "VALUES", "WHEN", "WHERE", "WITH",
];

pub const UNRESERVED_KEYWORDS: &[&str] = &[
    "CASCADE", "FIRST", "IF", "KEY", "LAST", "NULLS", "OVERWRITE", "RECURSIVE", "REPLACE", "RESTRICT",
    "TEMPORARY", "TEMP", "VALUE",
];

pub fn build() -> Result<Dialect, GrammarError> {
    let tables = grammar().compile()?;
    let dialect = Dialect::new(
        "ansi",
        tables,
        lexer_matchers()?,
        RESERVED_KEYWORDS.iter().map(|k| SmolStr::new(k)),
        UNRESERVED_KEYWORDS.iter().map(|k| SmolStr::new(k)),
    );
    tracing::debug!(grammars = dialect.tables().len(), "built ansi dialect");
    Ok(dialect)
}

// =============================================================================
// Lexer
// =============================================================================

pub fn lexer_matchers() -> Result<Vec<LexMatcher>, GrammarError> {
    let code = TokenFlags::CODE;
    let symbol = |name: &str, lit: &str| LexMatcher::literal(name, lit, name, code);
    Ok(vec![
        LexMatcher::regex("whitespace", r"[^\S\r\n]+", "whitespace", TokenFlags::WHITESPACE)?,
        LexMatcher::regex("inline_comment", r"(--|#)[^\n]*", "comment", TokenFlags::COMMENT)?,
        LexMatcher::regex("block_comment", r"/\*(?s:.)*?\*/", "comment", TokenFlags::COMMENT)?
            .with_subdivider(LexMatcher::regex("newline", r"\r\n|\n", "newline", TokenFlags::WHITESPACE)?)
            .with_trim_post_subdivide(LexMatcher::regex(
                "whitespace",
                r"[^\S\r\n]+",
                "whitespace",
                TokenFlags::WHITESPACE,
            )?),
        LexMatcher::regex("single_quote", r"'([^'\\]|\\.|'')*'", "single_quote", code)?,
        LexMatcher::regex("double_quote", r#""(""|[^"\\]|\\.)*""#, "double_quote", code)?,
        LexMatcher::regex("back_quote", r"`(?:[^`\\]|\\.)*`", "back_quote", code)?,
        LexMatcher::regex(
            "numeric_literal",
            r"(\d+\.\d+|\d+\.|\.\d+|\d+)([eE][+-]?\d+)?",
            "numeric_literal",
            code,
        )?,
        LexMatcher::regex("newline", r"\r\n|\n", "newline", TokenFlags::WHITESPACE)?,
        symbol("casting_operator", "::"),
        symbol("equals", "="),
        symbol("greater_than", ">"),
        symbol("less_than", "<"),
        symbol("not", "!"),
        symbol("dot", "."),
        symbol("comma", ","),
        symbol("plus", "+"),
        symbol("minus", "-"),
        symbol("divide", "/"),
        symbol("percent", "%"),
        symbol("question", "?"),
        symbol("ampersand", "&"),
        symbol("vertical_bar", "|"),
        symbol("caret", "^"),
        symbol("star", "*"),
        symbol("start_bracket", "("),
        symbol("end_bracket", ")"),
        symbol("start_square_bracket", "["),
        symbol("end_square_bracket", "]"),
        symbol("start_curly_bracket", "{"),
        symbol("end_curly_bracket", "}"),
        symbol("colon", ":"),
        symbol("semicolon", ";"),
        LexMatcher::regex("word", r"[0-9a-zA-Z_]+", "word", code)?,
    ])
}

// =============================================================================
// Grammar
// =============================================================================

fn reserved_pattern() -> String {
    RESERVED_KEYWORDS.join("|")
}

pub fn grammar() -> GrammarBuilder {
    let mut b = GrammarBuilder::new("FileSegment");
    symbols(&mut b);
    literals_and_identifiers(&mut b);
    expressions(&mut b);
    select(&mut b);
    statements(&mut b);

    b.add(
        "FileSegment",
        delimited([r("StatementSegment")])
            .delimiter(any_number_of([r("DelimiterGrammar")]).min_times(1))
            .allow_trailing(),
    );
    b
}

fn symbols(b: &mut GrammarBuilder) {
    b.add("CommaSegment", string(",", "comma"))
        .add("DotSegment", string(".", "dot"))
        .add("StarSegment", string("*", "star"))
        .add("SemicolonSegment", string(";", "statement_terminator"))
        .add("DelimiterGrammar", r("SemicolonSegment"))
        .add("StartBracketSegment", string("(", "start_bracket"))
        .add("EndBracketSegment", string(")", "end_bracket"))
        .add("StartSquareBracketSegment", string("[", "start_square_bracket"))
        .add("EndSquareBracketSegment", string("]", "end_square_bracket"))
        .add("CastOperatorSegment", string("::", "casting_operator"))
        .add("PlusSegment", string("+", "binary_operator"))
        .add("MinusSegment", string("-", "binary_operator"))
        .add("MultiplySegment", string("*", "binary_operator"))
        .add("DivideSegment", string("/", "binary_operator"))
        .add("ModuloSegment", string("%", "binary_operator"))
        .add_segment(
            "ConcatSegment",
            "binary_operator",
            seq([string("|", "pipe"), string("|", "pipe")]).allow_gaps(false),
        )
        .add("EqualsSegment", string("=", "comparison_operator"))
        .add("GreaterThanSegment", string(">", "comparison_operator"))
        .add("LessThanSegment", string("<", "comparison_operator"))
        .add_segment(
            "GreaterThanOrEqualToSegment",
            "comparison_operator",
            seq([string(">", "raw_comparison_operator"), string("=", "raw_comparison_operator")]).allow_gaps(false),
        )
        .add_segment(
            "LessThanOrEqualToSegment",
            "comparison_operator",
            seq([string("<", "raw_comparison_operator"), string("=", "raw_comparison_operator")]).allow_gaps(false),
        )
        .add_segment(
            "NotEqualToSegment",
            "comparison_operator",
            one_of([
                seq([string("!", "raw_comparison_operator"), string("=", "raw_comparison_operator")])
                    .allow_gaps(false),
                seq([string("<", "raw_comparison_operator"), string(">", "raw_comparison_operator")])
                    .allow_gaps(false),
            ]),
        )
        .bracket_pair("round", "StartBracketSegment", "EndBracketSegment", true)
        .bracket_pair("square", "StartSquareBracketSegment", "EndSquareBracketSegment", true);
}

fn literals_and_identifiers(b: &mut GrammarBuilder) {
    let reserved = reserved_pattern();
    b.add("NumericLiteralSegment", typed("numeric_literal", "numeric_literal"))
        .add("QuotedLiteralSegment", typed("single_quote", "quoted_literal"))
        .add("BooleanLiteralGrammar", multi_string(&["TRUE", "FALSE"], "boolean_literal"))
        .add("NullLiteralSegment", string("NULL", "null_literal"))
        .add(
            "LiteralGrammar",
            one_of([
                r("QuotedLiteralSegment"),
                r("NumericLiteralSegment"),
                r("BooleanLiteralGrammar"),
                r("NullLiteralSegment"),
            ]),
        )
        .add(
            "NakedIdentifierSegment",
            regex("[A-Z0-9_]*[A-Z][A-Z0-9_]*", "naked_identifier").anti_template(&reserved),
        )
        .add(
            "QuotedIdentifierSegment",
            typed("double_quote", "quoted_identifier").trim_chars(&["\""]),
        )
        .add(
            "BackQuotedIdentifierSegment",
            typed("back_quote", "quoted_identifier").trim_chars(&["`"]),
        )
        .add(
            "SingleIdentifierGrammar",
            one_of([
                r("NakedIdentifierSegment"),
                r("QuotedIdentifierSegment"),
                r("BackQuotedIdentifierSegment"),
            ]),
        )
        .add(
            "ObjectReferenceDelimiterGrammar",
            one_of([r("DotSegment"), seq([r("DotSegment"), r("DotSegment")]).allow_gaps(false)]),
        )
        .add_segment(
            "ObjectReferenceSegment",
            "object_reference",
            delimited([r("SingleIdentifierGrammar")])
                .delimiter(r("ObjectReferenceDelimiterGrammar"))
                .allow_gaps(false),
        )
        .add_segment(
            "TableReferenceSegment",
            "table_reference",
            delimited([r("SingleIdentifierGrammar")])
                .delimiter(r("ObjectReferenceDelimiterGrammar"))
                .allow_gaps(false),
        )
        .add_segment(
            "ColumnReferenceSegment",
            "column_reference",
            delimited([r("SingleIdentifierGrammar")])
                .delimiter(r("ObjectReferenceDelimiterGrammar"))
                .allow_gaps(false),
        )
        .add_segment(
            "WildcardIdentifierSegment",
            "wildcard_identifier",
            seq([
                any_number_of([seq([r("SingleIdentifierGrammar"), r("DotSegment")]).allow_gaps(false)]),
                r("StarSegment"),
            ])
            .allow_gaps(false),
        )
        .add_segment(
            "WildcardExpressionSegment",
            "wildcard_expression",
            seq([r("WildcardIdentifierSegment")]),
        )
        .add_segment(
            "AliasExpressionSegment",
            "alias_expression",
            seq([
                indent(),
                kw("AS").optional(),
                r("SingleIdentifierGrammar"),
                dedent(),
            ]),
        )
        .add(
            "DatatypeIdentifierSegment",
            regex("[A-Z][A-Z0-9_]*", "data_type_identifier").anti_template(&reserved),
        )
        .add_segment(
            "DatatypeSegment",
            "data_type",
            seq([
                r("DatatypeIdentifierSegment"),
                bracketed([delimited([r("NumericLiteralSegment")])])
                    .optional(),
            ]),
        );
}

fn expressions(b: &mut GrammarBuilder) {
    let reserved = reserved_pattern();
    b.add_segment("ExpressionSegment", "expression", r("Expression_A_Grammar"))
        .add(
            "ArithmeticBinaryOperatorGrammar",
            one_of([
                r("PlusSegment"),
                r("MinusSegment"),
                r("DivideSegment"),
                r("MultiplySegment"),
                r("ModuloSegment"),
            ]),
        )
        .add(
            "BooleanBinaryOperatorGrammar",
            one_of([string("AND", "binary_operator"), string("OR", "binary_operator")]),
        )
        .add(
            "ComparisonOperatorGrammar",
            one_of([
                r("EqualsSegment"),
                r("GreaterThanSegment"),
                r("LessThanSegment"),
                r("GreaterThanOrEqualToSegment"),
                r("LessThanOrEqualToSegment"),
                r("NotEqualToSegment"),
            ]),
        )
        .add(
            "BinaryOperatorGrammar",
            one_of([
                r("ArithmeticBinaryOperatorGrammar"),
                r("ConcatSegment"),
                r("BooleanBinaryOperatorGrammar"),
                r("ComparisonOperatorGrammar"),
            ]),
        )
        .add(
            "UnaryOperatorGrammar",
            one_of([
                kw("NOT"),
                string("-", "sign_indicator"),
                string("+", "sign_indicator"),
            ]),
        )
        .add(
            "Expression_A_Grammar",
            seq([
                r("Expression_C_Grammar"),
                any_number_of([one_of([
                    seq([r("BinaryOperatorGrammar"), r("Expression_C_Grammar")]),
                    seq([kw("NOT").optional(), kw("LIKE"), r("Expression_C_Grammar")]),
                    seq([
                        kw("NOT").optional(),
                        kw("IN"),
                        bracketed([one_of([
                            r("SelectableGrammar"),
                            delimited([r("ExpressionSegment")]),
                        ])]),
                    ]),
                    seq([
                        kw("IS"),
                        kw("NOT").optional(),
                        one_of([r("NullLiteralSegment"), r("BooleanLiteralGrammar")]),
                    ]),
                    seq([
                        kw("NOT").optional(),
                        kw("BETWEEN"),
                        r("Expression_C_Grammar"),
                        kw("AND"),
                        r("Expression_C_Grammar"),
                    ]),
                ])]),
            ]),
        )
        .add(
            "Expression_C_Grammar",
            seq([
                any_number_of([r("UnaryOperatorGrammar")]),
                r("Expression_D_Grammar"),
                any_number_of([seq([r("CastOperatorSegment"), r("DatatypeSegment")])]),
            ]),
        )
        .add(
            "Expression_D_Grammar",
            one_of([
                r("ExistsExpressionSegment"),
                r("CaseExpressionSegment"),
                r("CastExpressionSegment"),
                r("FunctionSegment"),
                bracketed([one_of([r("ExpressionSegment"), r("SelectableGrammar")])]),
                r("LiteralGrammar"),
                r("ColumnReferenceSegment"),
            ]),
        )
        .add_segment(
            "ExistsExpressionSegment",
            "exists_expression",
            seq([kw("EXISTS"), bracketed([r("SelectableGrammar")])]),
        )
        .add_segment(
            "CastExpressionSegment",
            "cast_expression",
            seq([
                kw("CAST"),
                bracketed([r("ExpressionSegment"), kw("AS"), r("DatatypeSegment")]),
            ]),
        )
        .add(
            "FunctionNameIdentifierSegment",
            regex("[A-Z_][A-Z0-9_]*", "function_name_identifier").anti_template(&reserved),
        )
        .add_segment(
            "FunctionNameSegment",
            "function_name",
            seq([
                any_number_of([seq([r("SingleIdentifierGrammar"), r("DotSegment")]).allow_gaps(false)]),
                r("FunctionNameIdentifierSegment"),
            ])
            .allow_gaps(false),
        )
        .add(
            "FunctionContentsGrammar",
            one_of([
                r("StarSegment"),
                seq([kw("DISTINCT").optional(), delimited([r("ExpressionSegment")])]),
            ]),
        )
        .add_segment(
            "FunctionSegment",
            "function",
            seq([
                r("FunctionNameSegment"),
                bracketed([r("FunctionContentsGrammar").optional()]).parse_mode(ParseMode::Greedy),
            ])
            .allow_gaps(false),
        )
        .add_segment(
            "CaseExpressionSegment",
            "case_expression",
            seq([
                kw("CASE"),
                implicit_indent(),
                r("ExpressionSegment").optional(),
                any_number_of([r("WhenClauseSegment")]).min_times(1),
                r("ElseClauseSegment").optional(),
                dedent(),
                kw("END"),
            ]),
        )
        .add_segment(
            "WhenClauseSegment",
            "when_clause",
            seq([
                kw("WHEN"),
                indent(),
                r("ExpressionSegment"),
                dedent(),
                kw("THEN"),
                indent(),
                r("ExpressionSegment"),
                dedent(),
            ]),
        )
        .add_segment(
            "ElseClauseSegment",
            "else_clause",
            seq([kw("ELSE"), indent(), r("ExpressionSegment"), dedent()]),
        );
}

fn select(b: &mut GrammarBuilder) {
    b.add_segment(
        "SetOperatorSegment",
        "set_operator",
        one_of([
            seq([kw("UNION"), one_of([kw("DISTINCT"), kw("ALL")]).optional()]),
            kw("INTERSECT"),
            kw("EXCEPT"),
        ]),
    )
    .add(
        "SelectClauseTerminatorGrammar",
        one_of([
            kw("FROM"),
            kw("WHERE"),
            seq([kw("ORDER"), kw("BY")]),
            kw("LIMIT"),
            r("SetOperatorSegment"),
        ]),
    )
    .add(
        "ClauseTerminatorGrammar",
        one_of([
            kw("WHERE"),
            seq([kw("GROUP"), kw("BY")]),
            kw("HAVING"),
            seq([kw("ORDER"), kw("BY")]),
            kw("LIMIT"),
            r("SetOperatorSegment"),
        ]),
    )
    .add(
        "SelectableGrammar",
        one_of([r("WithCompoundStatementSegment"), r("NonWithSelectableGrammar")]),
    )
    .add(
        "NonWithSelectableGrammar",
        one_of([r("SetExpressionSegment"), r("NonSetSelectableGrammar")]),
    )
    .add(
        "NonSetSelectableGrammar",
        one_of([r("SelectStatementSegment"), bracketed([r("SelectableGrammar")])]),
    )
    .add_segment(
        "SetExpressionSegment",
        "set_expression",
        seq([
            r("NonSetSelectableGrammar"),
            any_number_of([seq([r("SetOperatorSegment"), r("NonSetSelectableGrammar")])]).min_times(1),
            r("OrderByClauseSegment").optional(),
            r("LimitClauseSegment").optional(),
        ]),
    )
    .add_segment(
        "SelectStatementSegment",
        "select_statement",
        seq([
            r("SelectClauseSegment"),
            r("FromClauseSegment").optional(),
            r("WhereClauseSegment").optional(),
            r("GroupByClauseSegment").optional(),
            r("HavingClauseSegment").optional(),
            r("OrderByClauseSegment").optional(),
            r("LimitClauseSegment").optional(),
        ])
        .terminators([r("DelimiterGrammar"), r("SetOperatorSegment")])
        .parse_mode(ParseMode::GreedyOnceStarted),
    )
    .add_segment(
        "SelectClauseModifierSegment",
        "select_clause_modifier",
        one_of([kw("DISTINCT"), kw("ALL")]),
    )
    .add(
        "BaseExpressionElementGrammar",
        one_of([
            r("LiteralGrammar"),
            r("FunctionSegment"),
            r("ColumnReferenceSegment"),
            r("ExpressionSegment"),
        ]),
    )
    .add_segment(
        "SelectClauseElementSegment",
        "select_clause_element",
        one_of([
            r("WildcardExpressionSegment"),
            seq([
                r("BaseExpressionElementGrammar"),
                r("AliasExpressionSegment").optional(),
            ]),
        ]),
    )
    .add_segment(
        "SelectClauseSegment",
        "select_clause",
        seq([
            kw("SELECT"),
            r("SelectClauseModifierSegment").optional(),
            indent(),
            delimited([r("SelectClauseElementSegment")]).allow_trailing(),
            dedent(),
        ])
        .terminators([r("SelectClauseTerminatorGrammar")])
        .parse_mode(ParseMode::GreedyOnceStarted),
    )
    .add_segment(
        "FromClauseSegment",
        "from_clause",
        seq([
            kw("FROM"),
            indent(),
            delimited([r("FromExpressionSegment")]),
            dedent(),
        ])
        .terminators([r("ClauseTerminatorGrammar")])
        .parse_mode(ParseMode::GreedyOnceStarted),
    )
    .add_segment(
        "FromExpressionSegment",
        "from_expression",
        seq([
            r("FromExpressionElementSegment"),
            conditional(MetaKind::Indent, "indented_joins", "true"),
            any_number_of([r("JoinClauseSegment")]),
            conditional(MetaKind::Dedent, "indented_joins", "true"),
        ]),
    )
    .add_segment(
        "TableExpressionSegment",
        "table_expression",
        one_of([r("TableReferenceSegment"), bracketed([r("SelectableGrammar")])]),
    )
    .add_segment(
        "FromExpressionElementSegment",
        "from_expression_element",
        seq([
            r("TableExpressionSegment"),
            r("AliasExpressionSegment").optional(),
        ]),
    )
    .add(
        "JoinTypeKeywordsGrammar",
        one_of([
            kw("INNER"),
            seq([one_of([kw("LEFT"), kw("RIGHT"), kw("FULL")]), kw("OUTER").optional()]),
            kw("CROSS"),
            kw("NATURAL"),
        ]),
    )
    .add_segment(
        "JoinClauseSegment",
        "join_clause",
        seq([
            r("JoinTypeKeywordsGrammar").optional(),
            kw("JOIN"),
            indent(),
            r("FromExpressionElementSegment"),
            one_of([
                r("JoinOnConditionSegment"),
                seq([
                    kw("USING"),
                    bracketed([delimited([r("SingleIdentifierGrammar")])]),
                ]),
            ])
            .optional(),
            dedent(),
        ]),
    )
    .add_segment(
        "JoinOnConditionSegment",
        "join_on_condition",
        seq([kw("ON"), implicit_indent(), r("ExpressionSegment"), dedent()]),
    )
    .add_segment(
        "WhereClauseSegment",
        "where_clause",
        seq([kw("WHERE"), implicit_indent(), r("ExpressionSegment"), dedent()])
            .terminators([
                seq([kw("GROUP"), kw("BY")]),
                kw("HAVING"),
                seq([kw("ORDER"), kw("BY")]),
                kw("LIMIT"),
                r("SetOperatorSegment"),
            ])
            .parse_mode(ParseMode::GreedyOnceStarted),
    )
    .add(
        "GroupingExpressionGrammar",
        one_of([
            r("ColumnReferenceSegment"),
            r("NumericLiteralSegment"),
            r("ExpressionSegment"),
        ]),
    )
    .add_segment(
        "GroupByClauseSegment",
        "groupby_clause",
        seq([
            kw("GROUP"),
            kw("BY"),
            indent(),
            delimited([r("GroupingExpressionGrammar")]),
            dedent(),
        ])
        .terminators([
            kw("HAVING"),
            seq([kw("ORDER"), kw("BY")]),
            kw("LIMIT"),
            r("SetOperatorSegment"),
        ])
        .parse_mode(ParseMode::GreedyOnceStarted),
    )
    .add_segment(
        "HavingClauseSegment",
        "having_clause",
        seq([kw("HAVING"), implicit_indent(), r("ExpressionSegment"), dedent()])
            .terminators([seq([kw("ORDER"), kw("BY")]), kw("LIMIT")])
            .parse_mode(ParseMode::GreedyOnceStarted),
    )
    .add_segment(
        "OrderByClauseSegment",
        "orderby_clause",
        seq([
            kw("ORDER"),
            kw("BY"),
            indent(),
            delimited([seq([
                r("GroupingExpressionGrammar"),
                one_of([kw("ASC"), kw("DESC")]).optional(),
                seq([kw("NULLS"), one_of([kw("FIRST"), kw("LAST")])]).optional(),
            ])]),
            dedent(),
        ])
        .terminators([kw("LIMIT"), r("SetOperatorSegment")])
        .parse_mode(ParseMode::GreedyOnceStarted),
    )
    .add_segment(
        "LimitClauseSegment",
        "limit_clause",
        seq([
            kw("LIMIT"),
            indent(),
            one_of([r("NumericLiteralSegment"), kw("ALL")]),
            seq([kw("OFFSET"), r("NumericLiteralSegment")]).optional(),
            dedent(),
        ]),
    )
    .add_segment(
        "WithCompoundStatementSegment",
        "with_compound_statement",
        seq([
            kw("WITH"),
            kw("RECURSIVE").optional(),
            indent(),
            delimited([r("CTEDefinitionSegment")]).terminators([kw("SELECT")]),
            dedent(),
            r("NonWithSelectableGrammar"),
        ]),
    )
    .add_segment(
        "CTEColumnList",
        "cte_column_list",
        bracketed([delimited([r("SingleIdentifierGrammar")])]),
    )
    .add_segment(
        "CTEDefinitionSegment",
        "common_table_expression",
        seq([
            r("SingleIdentifierGrammar"),
            r("CTEColumnList").optional(),
            kw("AS"),
            bracketed([r("SelectableGrammar")]),
        ]),
    );
}

fn statements(b: &mut GrammarBuilder) {
    b.add_segment(
        "StatementSegment",
        "statement",
        one_of([
            r("SelectableGrammar"),
            r("InsertStatementSegment"),
            r("UpdateStatementSegment"),
            r("DeleteStatementSegment"),
            r("CreateTableStatementSegment"),
            r("DropTableStatementSegment"),
        ])
        .terminators([r("DelimiterGrammar")]),
    )
    .add(
        "BracketedColumnReferenceListGrammar",
        bracketed([delimited([r("ColumnReferenceSegment")])]),
    )
    .add_segment(
        "ValuesClauseSegment",
        "values_clause",
        seq([
            one_of([kw("VALUES"), kw("VALUE")]),
            delimited([bracketed([delimited([one_of([
                kw("DEFAULT"),
                r("ExpressionSegment"),
            ])])])]),
        ]),
    )
    .add_segment(
        "InsertStatementSegment",
        "insert_statement",
        seq([
            kw("INSERT"),
            kw("OVERWRITE").optional(),
            kw("INTO"),
            r("TableReferenceSegment"),
            r("BracketedColumnReferenceListGrammar").optional(),
            one_of([r("ValuesClauseSegment"), r("SelectableGrammar")]),
        ]),
    )
    .add_segment(
        "SetClauseSegment",
        "set_clause",
        seq([
            r("ColumnReferenceSegment"),
            r("EqualsSegment"),
            one_of([kw("DEFAULT"), r("ExpressionSegment")]),
        ]),
    )
    .add_segment(
        "SetClauseListSegment",
        "set_clause_list",
        seq([kw("SET"), indent(), delimited([r("SetClauseSegment")]), dedent()]),
    )
    .add_segment(
        "UpdateStatementSegment",
        "update_statement",
        seq([
            kw("UPDATE"),
            r("TableReferenceSegment"),
            r("AliasExpressionSegment").exclude(kw("SET")).optional(),
            r("SetClauseListSegment"),
            r("FromClauseSegment").optional(),
            r("WhereClauseSegment").optional(),
        ]),
    )
    .add_segment(
        "DeleteStatementSegment",
        "delete_statement",
        seq([
            kw("DELETE"),
            r("FromClauseSegment"),
            r("WhereClauseSegment").optional(),
        ]),
    )
    .add("IfExistsGrammar", seq([kw("IF"), kw("EXISTS")]))
    .add("IfNotExistsGrammar", seq([kw("IF"), kw("NOT"), kw("EXISTS")]))
    .add_segment(
        "ColumnConstraintSegment",
        "column_constraint_segment",
        one_of([
            seq([kw("NOT").optional(), kw("NULL")]),
            seq([kw("PRIMARY"), kw("KEY")]),
            kw("UNIQUE"),
            seq([kw("DEFAULT"), one_of([r("LiteralGrammar"), r("FunctionSegment")])]),
            seq([
                kw("REFERENCES"),
                r("TableReferenceSegment"),
                r("BracketedColumnReferenceListGrammar").optional(),
            ]),
        ]),
    )
    .add_segment(
        "ColumnDefinitionSegment",
        "column_definition",
        seq([
            r("SingleIdentifierGrammar"),
            r("DatatypeSegment"),
            any_number_of([r("ColumnConstraintSegment")]),
        ]),
    )
    .add_segment(
        "TableConstraintSegment",
        "table_constraint",
        seq([
            seq([kw("CONSTRAINT"), r("ObjectReferenceSegment")]).optional(),
            one_of([
                seq([kw("PRIMARY"), kw("KEY"), r("BracketedColumnReferenceListGrammar")]),
                seq([kw("UNIQUE"), r("BracketedColumnReferenceListGrammar")]),
                seq([
                    kw("FOREIGN"),
                    kw("KEY"),
                    r("BracketedColumnReferenceListGrammar"),
                    kw("REFERENCES"),
                    r("TableReferenceSegment"),
                    r("BracketedColumnReferenceListGrammar").optional(),
                ]),
            ]),
        ]),
    )
    .add_segment(
        "CreateTableStatementSegment",
        "create_table_statement",
        seq([
            kw("CREATE"),
            seq([kw("OR"), kw("REPLACE")]).optional(),
            one_of([kw("TEMPORARY"), kw("TEMP")]).optional(),
            kw("TABLE"),
            r("IfNotExistsGrammar").optional(),
            r("TableReferenceSegment"),
            one_of([
                bracketed([delimited([one_of([
                    r("TableConstraintSegment"),
                    r("ColumnDefinitionSegment"),
                ])])]),
                seq([kw("AS"), r("SelectableGrammar")]),
            ]),
        ]),
    )
    .add_segment(
        "DropTableStatementSegment",
        "drop_table_statement",
        seq([
            kw("DROP"),
            kw("TABLE"),
            r("IfExistsGrammar").optional(),
            delimited([r("TableReferenceSegment")]),
            one_of([kw("RESTRICT"), kw("CASCADE")]).optional(),
        ]),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ansi_grammar_compiles_and_validates() {
        let dialect = build().unwrap();
        let tables = dialect.tables();
        assert!(super::super::validate(tables).is_ok());
        assert_eq!(tables.segment_type(dialect.grammar("SelectStatementSegment").unwrap()), Some("select_statement"));
        assert_eq!(tables.root(), dialect.grammar("FileSegment").unwrap());
    }

    #[test]
    fn test_keyword_hint_prunes_statements() {
        let dialect = build().unwrap();
        let tables = dialect.tables();
        let insert = dialect.grammar("InsertStatementSegment").unwrap();
        assert!(tables.hint_accepts(insert, "INSERT", &[]));
        assert!(!tables.hint_accepts(insert, "SELECT", &[]));
    }

    #[test]
    fn test_keyword_sets() {
        let dialect = build().unwrap();
        assert!(dialect.is_reserved("from"));
        assert!(!dialect.is_reserved("nulls"));
        assert!(dialect.is_keyword("nulls"));
    }

    #[test]
    fn test_lexer_matchers_build() {
        let matchers = lexer_matchers().unwrap();
        assert_eq!(matchers.first().map(|m| m.name.as_str()), Some("whitespace"));
        assert!(matchers.iter().any(|m| m.subdivider.is_some()));
    }
}
