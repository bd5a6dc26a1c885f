#[cfg(test)]
mod tests {
    use crate::artifact::UnitOrigin;
    use crate::testing::{EXPR, HELLO};
    use crate::tool::analysis::{analyze, ParserRuleSpec};
    use crate::tool::grammar::{Element, GrammarKind, LexerCommand, RepeatKind};
    use crate::tool::{
        read_grammar, GenerationError, GenerationOptions, Generator, GrammarSource, GrammarTool,
        SourceError, DEFAULT_MODE, MAX_BLOCK_DEPTH,
    };
    use tempfile::TempDir;

    fn generate(files: &[(&str, &str)]) -> Result<crate::tool::GeneratedRecognizer, GenerationError> {
        let mut source = GrammarSource::new();
        for (name, text) in files {
            source = source.with_file(*name, *text);
        }
        GrammarTool::new().generate(&source, &GenerationOptions::default())
    }

    // ============================================================================
    // Reading
    // ============================================================================

    #[test]
    fn test_read_combined_grammar() {
        let (grammar, warnings) = read_grammar("Hello.g4", HELLO).unwrap();
        assert_eq!(grammar.name, "Hello");
        assert_eq!(grammar.kind, GrammarKind::Combined);
        assert_eq!(grammar.file, "Hello.g4");
        assert!(warnings.is_empty());

        let greeting = grammar.rule("greeting").unwrap();
        assert!(!greeting.is_lexer_rule());
        assert_eq!(
            greeting.alternatives[0].elements,
            vec![
                Element::Literal("hello".to_string()),
                Element::TokenRef("NAME".to_string()),
                Element::Literal(";".to_string()),
            ]
        );
        let ws = grammar.rule("WS").unwrap();
        assert_eq!(ws.alternatives[0].commands, vec![LexerCommand::Skip]);
    }

    #[test]
    fn test_read_prequel_and_modes() {
        let text = r#"
lexer grammar Tags;
options { caseInsensitive = true; }
tokens { MARKER }
channels { COMMENTS }
@members { int depth; }

OPEN : '<' -> pushMode(INSIDE) ;
TEXT : ~[<]+ ;

mode INSIDE;
CLOSE : '>' -> popMode ;
ID : [a-z]+ ;
"#;
        let (grammar, warnings) = read_grammar("Tags.g4", text).unwrap();
        assert_eq!(grammar.kind, GrammarKind::Lexer);
        assert_eq!(grammar.option("caseInsensitive"), Some("true"));
        assert_eq!(grammar.tokens, vec!["MARKER"]);
        assert_eq!(grammar.channels, vec!["COMMENTS"]);
        assert_eq!(grammar.modes, vec!["INSIDE"]);
        assert_eq!(grammar.rule("OPEN").unwrap().mode, DEFAULT_MODE);
        assert_eq!(grammar.rule("CLOSE").unwrap().mode, "INSIDE");
        assert_eq!(
            grammar.rule("OPEN").unwrap().alternatives[0].commands,
            vec![LexerCommand::PushMode("INSIDE".to_string())]
        );
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("named action ignored"));
    }

    #[test]
    fn test_read_non_greedy_loop() {
        let text = "lexer grammar C;\nCOMMENT : '/*' .*? '*/' -> channel(HIDDEN) ;\n";
        let (grammar, _) = read_grammar("C.g4", text).unwrap();
        let comment = grammar.rule("COMMENT").unwrap();
        assert!(matches!(
            &comment.alternatives[0].elements[1],
            Element::Repeat { kind: RepeatKind::ZeroOrMore, greedy: false, element } if **element == Element::Wildcard
        ));
    }

    #[test]
    fn test_read_syntax_error_location() {
        let error = read_grammar("Bad.g4", "grammar Bad;\nstart : 'a' \n").unwrap_err();
        match error {
            GenerationError::Syntax { file, line, .. } => {
                assert_eq!(file, "Bad.g4");
                assert!(line >= 2);
            }
            other => panic!("expected syntax error, got {:?}", other),
        }
    }

    #[test]
    fn test_block_nesting_limit() {
        let nested = |depth: usize| format!("grammar Deep;\nstart : {}A{} ;\nA : 'a' ;\n", "(".repeat(depth), ")".repeat(depth));

        let deepest = nested(MAX_BLOCK_DEPTH);
        let generated = generate(&[("Deep.g4", deepest.as_str())]).unwrap();
        assert_eq!(generated.parser.as_deref(), Some("DeepParser"));

        let error = read_grammar("Deep.g4", &nested(100_000)).unwrap_err();
        match error {
            GenerationError::Syntax { line, message, .. } => {
                assert_eq!(line, 2);
                assert!(message.starts_with("blocks nested too deep"), "{}", message);
            }
            other => panic!("expected syntax error, got {:?}", other),
        }
    }

    #[test]
    fn test_read_embedded_action_warns() {
        let text = "grammar Act;\nstart : A {count++;} ;\nA : 'a' ;\n";
        let (_, warnings) = read_grammar("Act.g4", text).unwrap();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].starts_with("Act.g4:2:"));
        assert!(warnings[0].contains("embedded action ignored"));
    }

    // ============================================================================
    // Analysis
    // ============================================================================

    #[test]
    fn test_implicit_literal_tokens_come_first() {
        let (grammar, _) = read_grammar("Expr.g4", EXPR).unwrap();
        let analysis = analyze(vec![grammar], None).unwrap();
        let lexer = &analysis.lexers[0];

        assert_eq!(lexer.unit, "ExprLexer");
        assert_eq!(lexer.vocabulary[0].name, "T__0");
        assert_eq!(lexer.vocabulary[0].token_type, 1);
        assert_eq!(lexer.vocabulary[0].literal.as_deref(), Some("^"));
        let int = lexer.vocabulary.iter().find(|t| t.name == "INT").unwrap();
        assert!(lexer.vocabulary.iter().all(|t| t.literal.is_none() || t.token_type < int.token_type));
    }

    #[test]
    fn test_literal_lexer_rule_is_reused() {
        let text = "grammar Semi;\nstmt : ID ';' ;\nSEMI : ';' ;\nID : [a-z]+ ;\n";
        let (grammar, _) = read_grammar("Semi.g4", text).unwrap();
        let analysis = analyze(vec![grammar], None).unwrap();
        let vocabulary = &analysis.lexers[0].vocabulary;

        assert!(vocabulary.iter().all(|t| !t.name.starts_with("T__")));
        let semi = vocabulary.iter().find(|t| t.name == "SEMI").unwrap();
        assert_eq!(semi.literal.as_deref(), Some(";"));
    }

    #[test]
    fn test_left_recursion_rewritten() {
        let (grammar, _) = read_grammar("Expr.g4", EXPR).unwrap();
        let analysis = analyze(vec![grammar], None).unwrap();
        let parser = &analysis.parsers[0];
        assert_eq!(parser.start_rule, "prog");

        let expr = parser.rules.iter().find(|r| r.name() == "expr").unwrap();
        match expr {
            ParserRuleSpec::LeftRecursive { primaries, suffixes, .. } => {
                assert_eq!(suffixes.len(), 3);
                assert_eq!(primaries.len(), 3);
                assert!(suffixes[0].right_assoc);
                assert!(suffixes[0].precedence > suffixes[2].precedence);
            }
            other => panic!("expected a left-recursive rule, got {:?}", other),
        }
    }

    #[test]
    fn test_mutual_left_recursion_rejected() {
        let text = "grammar Loop;\na : b 'x' | 'y' ;\nb : a 'z' | 'w' ;\n";
        let error = generate(&[("Loop.g4", text)]).unwrap_err();
        assert!(error.to_string().contains("mutually left-recursive [a, b]"), "{}", error);
    }

    #[test]
    fn test_undefined_rule_rejected() {
        let text = "grammar Missing;\nstart : other ;\nA : 'a' ;\n";
        let error = generate(&[("Missing.g4", text)]).unwrap_err();
        assert!(matches!(error, GenerationError::Rule { .. }));
        assert!(error.to_string().contains("reference to undefined rule: other"));
    }

    #[test]
    fn test_implicit_token_name_warns() {
        let text = "grammar Implicit;\nstart : A B ;\nA : 'a' ;\n";
        let generated = generate(&[("Implicit.g4", text)]).unwrap();
        assert_eq!(generated.warnings.len(), 1);
        assert!(generated.warnings[0].contains("implicit definition of token B in parser"));
    }

    // ============================================================================
    // Generation
    // ============================================================================

    #[test]
    fn test_combined_grammar_units() {
        let generated = generate(&[("Hello.g4", HELLO)]).unwrap();
        assert_eq!(generated.grammar_name, "Hello");
        assert_eq!(generated.lexer.as_deref(), Some("HelloLexer"));
        assert_eq!(generated.parser.as_deref(), Some("HelloParser"));

        let names: Vec<&str> = generated.units.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(names, vec!["HelloLexer", "HelloParser"]);
        assert!(generated.units.iter().all(|u| u.origin == UnitOrigin::Generated));

        let parser = generated.unit("HelloParser").unwrap();
        assert!(parser.source.starts_with(";; Generated by"));
        assert!(parser.source.contains("(vocab \"HelloLexer\")"));
        assert!(parser.source.contains("(start \"greeting\")"));
    }

    #[test]
    fn test_split_grammars_with_token_vocab() {
        let lexer = "lexer grammar CalcLexer;\nINT : [0-9]+ ;\nPLUS : '+' ;\nWS : [ ]+ -> skip ;\n";
        let parser = "parser grammar CalcParser;\noptions { tokenVocab = CalcLexer; }\nsum : INT (PLUS INT)* EOF ;\n";

        // Parser listed first: lexers are still analyzed before parsers
        let generated = generate(&[("CalcParser.g4", parser), ("CalcLexer.g4", lexer)]).unwrap();
        assert_eq!(generated.grammar_name, "CalcParser");
        assert_eq!(generated.parser.as_deref(), Some("CalcParser"));
        assert_eq!(generated.lexer.as_deref(), Some("CalcLexer"));
        assert!(generated.warnings.is_empty());
    }

    #[test]
    fn test_parser_grammar_without_vocab() {
        let parser = "parser grammar Lonely;\nstart : A ;\n";
        let error = generate(&[("Lonely.g4", parser)]).unwrap_err();
        assert!(error.to_string().contains("requires a tokenVocab option"));
    }

    #[test]
    fn test_imports_merge_rules() {
        let common = "grammar Common;\nID : [a-z]+ ;\nWS : [ ]+ -> skip ;\n";
        let main = "grammar Main;\nimport Common;\nstart : ID+ ;\n";
        let generated = generate(&[("Main.g4", main), ("Common.g4", common)]).unwrap();

        let names: Vec<&str> = generated.units.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(names, vec!["MainLexer", "MainParser"]);
        assert!(generated.unit("MainLexer").unwrap().source.contains("\"ID\""));

        let error = generate(&[("Main.g4", main)]).unwrap_err();
        assert!(matches!(error, GenerationError::MissingImport { .. }));
    }

    #[test]
    fn test_duplicate_grammar_rejected() {
        let error = generate(&[("A.g4", HELLO), ("B.g4", HELLO)]).unwrap_err();
        assert!(matches!(error, GenerationError::DuplicateGrammar(name) if name == "Hello"));
    }

    #[test]
    fn test_package_prefixes_units() {
        let options = GenerationOptions {
            package: Some("org.demo".to_string()),
            ..GenerationOptions::default()
        };
        let generated = GrammarTool::new()
            .generate(&GrammarSource::from_text("Hello.g4", HELLO), &options)
            .unwrap();
        assert_eq!(generated.parser.as_deref(), Some("org.demo.HelloParser"));
        assert!(generated
            .unit("org.demo.HelloParser")
            .unwrap()
            .source
            .contains("(vocab \"org.demo.HelloLexer\")"));
    }

    #[test]
    fn test_warnings_as_errors() {
        let text = "grammar Act;\nstart : A {x();} ;\nA : 'a' ;\n";
        let options = GenerationOptions {
            warnings_as_errors: true,
            ..GenerationOptions::default()
        };
        let error = GrammarTool::new()
            .generate(&GrammarSource::from_text("Act.g4", text), &options)
            .unwrap_err();
        assert!(matches!(error, GenerationError::WarningsAsErrors(w) if w.len() == 1));
    }

    #[test]
    fn test_empty_source_rejected() {
        let error = GrammarTool::new()
            .generate(&GrammarSource::new(), &GenerationOptions::default())
            .unwrap_err();
        assert!(matches!(error, GenerationError::NoGrammar));
    }

    // ============================================================================
    // Grammar sources on disk
    // ============================================================================

    #[test]
    fn test_source_from_directory() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("nested").join("Hello.g4"), HELLO).unwrap();
        std::fs::write(dir.path().join("Expr.g4"), EXPR).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "not a grammar").unwrap();

        let source = GrammarSource::from_directory(dir.path()).unwrap();
        assert_eq!(source.file_names(), vec!["Expr.g4", "Hello.g4"]);
    }

    #[test]
    fn test_source_from_empty_directory() {
        let dir = TempDir::new().unwrap();
        let error = GrammarSource::from_directory(dir.path()).unwrap_err();
        assert!(matches!(error, SourceError::Empty(_)));

        let error = GrammarSource::from_files([dir.path().join("Missing.g4")]).unwrap_err();
        assert!(matches!(error, SourceError::Io { .. }));
    }

    #[test]
    fn test_write_sources() {
        let dir = TempDir::new().unwrap();
        let generated = generate(&[("Hello.g4", HELLO)]).unwrap();
        let written = generated.write_sources(dir.path().join("out")).unwrap();
        assert_eq!(written.len(), 2);
        assert!(written[0].ends_with("HelloLexer.unit"));
    }
}
