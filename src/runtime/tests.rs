#[cfg(test)]
mod tests {
    use crate::runtime::{
        run, CaseFolding, CharStream, DiagnosticKind, InvocationRequest, NativeChild,
        ParsingError, EOF, HIDDEN_CHANNEL,
    };
    use crate::testing::{load_grammar, EXPR, HELLO, KEYWORDS};
    use rstest::rstest;

    const NOTES: &str = r#"
grammar Notes;

notes : NAME+ EOF ;

NAME : [a-z]+ ;
COMMENT : '/*' .*? '*/' -> channel(HIDDEN) ;
WS : [ ]+ -> skip ;
"#;

    const TAGS: &str = r#"
lexer grammar Tags;

OPEN : '<' -> pushMode(TAG) ;
TEXT : ~[<]+ ;

mode TAG;
CLOSE : '>' -> popMode ;
ID : [a-z]+ ;
"#;

    const DOTTED: &str = r#"
grammar Dotted;

s : a ';' ;
a : ID | ID '.' ID ;

ID : [a-z]+ ;
WS : [ ]+ -> skip ;
"#;

    const TRAILING: &str = r#"
grammar Trailing;

s : ID* ID ';' ;
t : ID+? ID ID ';' ;

ID : [a-z]+ ;
WS : [ ]+ -> skip ;
"#;

    const NESTED: &str = r#"
grammar Nested;

e : '(' e ')' | ID ;

ID : [a-z]+ ;
"#;

    fn parse(grammar: (&str, &str), input: &str, request: &InvocationRequest) -> crate::runtime::NativeParseResult {
        let recognizer = load_grammar(grammar.0, grammar.1);
        run(&recognizer, CharStream::from_text(input), request).unwrap()
    }

    // ============================================================================
    // Lexer
    // ============================================================================

    #[test]
    fn test_tokenize_hello() {
        let recognizer = load_grammar("Hello", HELLO);
        let lexer = recognizer.registry().lexer("HelloLexer").unwrap();
        let stream = lexer.tokenize(&CharStream::from_text("hello World;"));

        let texts: Vec<&str> = stream.tokens.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["hello", "World", ";", "<EOF>"]);
        assert!(stream.diagnostics.is_empty());

        let vocabulary = lexer.vocabulary();
        assert_eq!(vocabulary.symbolic_name(stream.tokens[1].token_type), Some("NAME"));
        assert_eq!(vocabulary.literal_name(stream.tokens[0].token_type).as_deref(), Some("'hello'"));
        assert_eq!(stream.tokens[3].token_type, EOF);
    }

    #[test]
    fn test_token_positions() {
        let recognizer = load_grammar("Hello", HELLO);
        let lexer = recognizer.registry().lexer("HelloLexer").unwrap();
        let stream = lexer.tokenize(&CharStream::from_text("hello\n  World ;"));

        let name = &stream.tokens[1];
        assert_eq!(name.text, "World");
        assert_eq!((name.line, name.column), (2, 2));
        assert_eq!((name.start, name.end), (8, 13));
        assert_eq!(stream.tokens[2].column, 8);
    }

    #[test]
    fn test_keyword_literal_beats_identifier() {
        let recognizer = load_grammar("Hello", HELLO);
        let lexer = recognizer.registry().lexer("HelloLexer").unwrap();
        let stream = lexer.tokenize(&CharStream::from_text("hello helloworld"));

        let vocabulary = lexer.vocabulary();
        assert_eq!(vocabulary.literal_name(stream.tokens[0].token_type).as_deref(), Some("'hello'"));
        // Longest match wins over rule order
        assert_eq!(vocabulary.symbolic_name(stream.tokens[1].token_type), Some("NAME"));
        assert_eq!(stream.tokens[1].text, "helloworld");
    }

    #[test]
    fn test_token_recognition_error() {
        let recognizer = load_grammar("Hello", HELLO);
        let lexer = recognizer.registry().lexer("HelloLexer").unwrap();
        let stream = lexer.tokenize(&CharStream::from_text("hello W0rld;"));

        assert_eq!(stream.diagnostics.len(), 1);
        let diagnostic = &stream.diagnostics[0];
        assert_eq!(diagnostic.kind, DiagnosticKind::TokenRecognition);
        assert_eq!(diagnostic.message, "token recognition error at: '0'");
        assert_eq!((diagnostic.line, diagnostic.column), (1, 7));
        assert_eq!(diagnostic.to_string(), "line 1:7 token recognition error at: '0'");

        let texts: Vec<&str> = stream.tokens.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["hello", "W", "rld", ";", "<EOF>"]);
    }

    #[test]
    fn test_hidden_channel_and_shortest_match() {
        let recognizer = load_grammar("Notes", NOTES);
        let lexer = recognizer.registry().lexer("NotesLexer").unwrap();
        let stream = lexer.tokenize(&CharStream::from_text("a /* x */ b /* y */"));

        let texts: Vec<&str> = stream.tokens.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["a", "/* x */", "b", "/* y */", "<EOF>"]);
        assert_eq!(stream.tokens[1].channel, HIDDEN_CHANNEL);
        assert_eq!(stream.visible(), vec![0, 2, 4]);
    }

    #[test]
    fn test_lexer_modes() {
        let recognizer = load_grammar("Tags", TAGS);
        let lexer = recognizer.registry().lexer("Tags").unwrap();
        let stream = lexer.tokenize(&CharStream::from_text("a<b>c"));

        let vocabulary = lexer.vocabulary();
        let names: Vec<&str> = stream
            .tokens
            .iter()
            .map(|t| vocabulary.symbolic_name(t.token_type).unwrap())
            .collect();
        assert_eq!(names, vec!["TEXT", "OPEN", "ID", "CLOSE", "TEXT", "EOF"]);
        assert!(stream.diagnostics.is_empty());
    }

    // ============================================================================
    // Parser
    // ============================================================================

    #[test]
    fn test_parse_greeting() {
        let result = parse(("Hello", HELLO), "hello World;", &InvocationRequest::new());

        assert!(result.is_success());
        assert_eq!(result.entry_rule, "greeting");
        let root = result.root.as_ref().unwrap();
        assert_eq!(result.rule_name(root.rule_index), Some("greeting"));
        assert_eq!(root.child_count(), 3);
        assert_eq!(root.start, 0);
        assert_eq!(root.stop, Some(2));
        assert_eq!(result.to_string_tree().unwrap(), "(greeting hello World ;)");

        match &root.children[1] {
            NativeChild::Terminal(index) => {
                let token = result.token(*index).unwrap();
                assert_eq!(token.text, "World");
                assert_eq!(result.symbol(token), "NAME");
            }
            other => panic!("expected terminal, got {:?}", other),
        }
    }

    #[test]
    fn test_operator_precedence() {
        let result = parse(("Expr", EXPR), "1+2*3", &InvocationRequest::new());
        assert!(result.is_success());
        assert_eq!(
            result.to_string_tree().unwrap(),
            "(prog (expr (expr 1) + (expr (expr 2) * (expr 3))) <EOF>)"
        );
    }

    #[test]
    fn test_left_associativity() {
        let result = parse(("Expr", EXPR), "1-2-3", &InvocationRequest::new());
        assert_eq!(
            result.to_string_tree().unwrap(),
            "(prog (expr (expr (expr 1) - (expr 2)) - (expr 3)) <EOF>)"
        );
    }

    #[test]
    fn test_right_associativity() {
        let result = parse(("Expr", EXPR), "2^3^4", &InvocationRequest::new());
        assert_eq!(
            result.to_string_tree().unwrap(),
            "(prog (expr (expr 2) ^ (expr (expr 3) ^ (expr 4))) <EOF>)"
        );
    }

    #[test]
    fn test_parenthesized_primary() {
        let result = parse(("Expr", EXPR), "(1+2)*3", &InvocationRequest::new());
        assert!(result.is_success());
        assert_eq!(
            result.to_string_tree().unwrap(),
            "(prog (expr (expr ( (expr (expr 1) + (expr 2)) )) * (expr 3)) <EOF>)"
        );
    }

    #[test]
    fn test_entry_rule_override() {
        let request = InvocationRequest::new().entry_rule("expr");
        let result = parse(("Expr", EXPR), "4*5", &request);
        assert!(result.is_success());
        assert_eq!(result.entry_rule, "expr");
        assert_eq!(result.to_string_tree().unwrap(), "(expr (expr 4) * (expr 5))");
    }

    #[test]
    fn test_mismatched_input() {
        let result = parse(("Hello", HELLO), "hello World World", &InvocationRequest::new());

        assert!(result.root.is_none());
        assert!(result.has_errors());
        let diagnostic = &result.diagnostics[0];
        assert_eq!(diagnostic.kind, DiagnosticKind::MismatchedInput);
        assert_eq!(diagnostic.message, "mismatched input 'World' expecting ';'");
        assert_eq!((diagnostic.line, diagnostic.column), (1, 12));
    }

    #[test]
    fn test_mismatched_input_lists_alternatives() {
        let result = parse(("Expr", EXPR), "1+", &InvocationRequest::new());

        assert!(result.root.is_none());
        let message = &result.diagnostics[0].message;
        assert!(message.starts_with("mismatched input '<EOF>' expecting {"), "{}", message);
        assert!(message.contains("INT"));
        assert!(message.contains("'('"));
    }

    #[test]
    fn test_unknown_entry_rule() {
        let recognizer = load_grammar("Hello", HELLO);
        let request = InvocationRequest::new().entry_rule("farewell");
        let error = run(&recognizer, CharStream::from_text("hello x;"), &request).unwrap_err();
        assert!(matches!(
            error,
            ParsingError::UnknownEntryRule { ref rule, .. } if rule == "farewell"
        ));
    }

    #[test]
    fn test_unknown_parser_override() {
        let recognizer = load_grammar("Hello", HELLO);
        let request = InvocationRequest::new().parser("OtherParser");
        let error = run(&recognizer, CharStream::from_text("hello x;"), &request).unwrap_err();
        assert!(matches!(error, ParsingError::UnitNotFound { kind: "parser", .. }));
    }

    #[test]
    fn test_lexer_only_recognizer_has_no_parser() {
        let recognizer = load_grammar("Tags", TAGS);
        let error = run(&recognizer, CharStream::from_text("a"), &InvocationRequest::new()).unwrap_err();
        assert!(matches!(error, ParsingError::NoUnit { kind: "parser" }));
    }

    // ============================================================================
    // Backtracking
    // ============================================================================

    #[test]
    fn test_later_alternative_tried_when_rest_fails() {
        let result = parse(("Dotted", DOTTED), "x.y;", &InvocationRequest::new());
        assert!(result.is_success(), "{:?}", result.diagnostics);
        assert_eq!(result.to_string_tree().unwrap(), "(s (a x . y) ;)");

        let result = parse(("Dotted", DOTTED), "x;", &InvocationRequest::new());
        assert_eq!(result.to_string_tree().unwrap(), "(s (a x) ;)");
    }

    #[test]
    fn test_greedy_loop_gives_back_iterations() {
        let result = parse(("Trailing", TRAILING), "a b;", &InvocationRequest::new());
        assert!(result.is_success(), "{:?}", result.diagnostics);
        assert_eq!(result.to_string_tree().unwrap(), "(s a b ;)");

        let result = parse(("Trailing", TRAILING), "a b c d;", &InvocationRequest::new());
        assert!(result.is_success());
        assert_eq!(result.root.as_ref().unwrap().child_count(), 5);
    }

    #[test]
    fn test_lazy_loop_takes_what_the_rest_leaves() {
        let request = InvocationRequest::new().entry_rule("t");
        let result = parse(("Trailing", TRAILING), "a b c d;", &request);
        assert!(result.is_success(), "{:?}", result.diagnostics);
        assert_eq!(result.to_string_tree().unwrap(), "(t a b c d ;)");
    }

    #[test]
    fn test_failure_still_reported_after_backtracking() {
        let result = parse(("Dotted", DOTTED), "x.;", &InvocationRequest::new());
        assert!(result.root.is_none());
        assert_eq!(result.diagnostics[0].message, "mismatched input ';' expecting ID");
    }

    // ============================================================================
    // Nesting depth
    // ============================================================================

    fn nested(depth: usize) -> String {
        format!("{}x{}", "(".repeat(depth), ")".repeat(depth))
    }

    #[test]
    fn test_deep_nesting_parses() {
        let result = parse(("Nested", NESTED), &nested(2_000), &InvocationRequest::new());
        assert!(result.is_success(), "{:?}", result.diagnostics);

        let mut depth = 1;
        let mut ctx = result.root.as_ref().unwrap();
        while let Some(inner) = ctx.rule_children().next() {
            ctx = inner;
            depth += 1;
        }
        assert_eq!(depth, 2_001);
    }

    #[test]
    fn test_configured_depth_limit() {
        let recognizer = load_grammar("Nested", NESTED);
        let request = InvocationRequest::new().max_rule_depth(100);

        let shallow = run(&recognizer, CharStream::from_text(&nested(50)), &request).unwrap();
        assert!(shallow.is_success());

        let error = run(&recognizer, CharStream::from_text(&nested(300)), &request).unwrap_err();
        assert!(matches!(
            error,
            ParsingError::RecursionLimit { ref rule, limit: 100 } if rule == "e"
        ));
    }

    // ============================================================================
    // Case folding
    // ============================================================================

    #[rstest]
    #[case(CaseFolding::None, false)]
    #[case(CaseFolding::Upper, true)]
    #[case(CaseFolding::Lower, false)]
    fn test_case_folding_changes_matching_only(#[case] folding: CaseFolding, #[case] matches: bool) {
        let request = InvocationRequest::new().case_folding(folding);
        let result = parse(("Keywords", KEYWORDS), "select a from b", &request);

        assert_eq!(result.is_success(), matches);
        // Token text always comes from the original characters
        let texts: Vec<&str> = result.tokens.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["select", "a", "from", "b", "<EOF>"]);
    }

    #[test]
    fn test_stream_folding_kept_without_request() {
        let recognizer = load_grammar("Keywords", KEYWORDS);
        let input = CharStream::from_text("Select x From y").with_case_folding(CaseFolding::Upper);
        let result = run(&recognizer, input, &InvocationRequest::new()).unwrap();
        assert!(result.is_success());
        assert_eq!(result.to_string_tree().unwrap(), "(stmt Select x From y)");
    }

    #[test]
    fn test_case_folding_parse() {
        assert_eq!("upper".parse::<CaseFolding>(), Ok(CaseFolding::Upper));
        assert_eq!("NONE".parse::<CaseFolding>(), Ok(CaseFolding::None));
        assert!("title".parse::<CaseFolding>().is_err());
    }
}
